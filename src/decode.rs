//! Profile-driven value decoding
//!
//! Turns the raw values of a data message into decoded fields by running
//! each field through the transform pipeline: profile lookup, sub-field
//! resolution, invalid-value masking, enumeration lookup, scale/offset, and
//! date-time conversion.  Fields the profile does not know still come out,
//! named `unknown_field_<id>`, with invalid masking and numeric promotion
//! applied but nothing else.

use std::collections::HashMap;
use std::sync::LazyLock;

use chrono::{DateTime, TimeDelta, Utc};

use crate::DecoderError;
use crate::decoded::{DecodedField, DecodedMessage};
use crate::message::{DataMessage, FieldDefinition, RawValue};
use crate::profile::{MessageInfo, Profile};
use crate::value::Value;

/// The origin of FIT timestamps.
static FIT_EPOCH: LazyLock<DateTime<Utc>> =
    LazyLock::new(|| "1989-12-31T00:00:00Z".parse::<DateTime<Utc>>().unwrap());

/// The profile type name whose values are seconds since the FIT epoch.
const DATE_TIME_TYPE: &str = "date_time";

/// Returns the FIT epoch, 1989-12-31T00:00:00Z.
pub fn fit_epoch() -> DateTime<Utc> {
    *FIT_EPOCH
}

/// Switches controlling the decoding pipeline.  Everything is on by
/// default.
#[derive(Clone, Copy, Debug)]
pub struct DecodeOptions {
    convert_datetime: bool,
    process_invalids: bool,
    apply_scale_offset: bool,
}

impl DecodeOptions {
    /// Convert `date_time` values into calendar timestamps.
    pub fn with_convert_datetime(mut self, convert_datetime: bool) -> Self {
        self.convert_datetime = convert_datetime;
        self
    }

    /// Replace invalid-sentinel values with null.
    pub fn with_process_invalids(mut self, process_invalids: bool) -> Self {
        self.process_invalids = process_invalids;
        self
    }

    /// Divide by the profile scale and subtract the profile offset.
    pub fn with_apply_scale_offset(mut self, apply_scale_offset: bool) -> Self {
        self.apply_scale_offset = apply_scale_offset;
        self
    }

    pub fn convert_datetime(&self) -> bool {
        self.convert_datetime
    }

    pub fn process_invalids(&self) -> bool {
        self.process_invalids
    }

    pub fn apply_scale_offset(&self) -> bool {
        self.apply_scale_offset
    }
}

impl Default for DecodeOptions {
    fn default() -> Self {
        Self {
            convert_datetime: true,
            process_invalids: true,
            apply_scale_offset: true,
        }
    }
}

/// Decodes data messages against a profile.
///
/// The profile is borrowed and never mutated, so one profile can back any
/// number of decoders.
pub struct MessageDecoder<'a> {
    profile: &'a Profile,
    options: DecodeOptions,
}

impl<'a> MessageDecoder<'a> {
    pub fn new(profile: &'a Profile, options: DecodeOptions) -> Self {
        Self { profile, options }
    }

    /// Decodes one data message.
    pub fn decode(&self, message: &DataMessage) -> Result<DecodedMessage, DecoderError> {
        let info = self.profile.message(message.global_mesg_num());
        let name = match info {
            Some(info) => info.name.clone(),
            None => format!("unknown_msg_{}", message.global_mesg_num()),
        };

        let mut decoded = DecodedMessage::new(name.clone());
        for (def, raw) in message.definition.fields.iter().zip(&message.fields) {
            let (field_name, field) = self.decode_field(message, info, &name, def, raw)?;
            decoded.insert(field_name, field);
        }

        // Developer payloads pass through as byte sequences.
        for (dev, raw) in message.definition.dev_fields.iter().zip(&message.dev_fields) {
            decoded.insert(
                format!("developer_field_{}", dev.field_number),
                DecodedField::new(Value::from_raw_element(raw, 0), ""),
            );
        }

        Ok(decoded)
    }

    fn decode_field(
        &self,
        message: &DataMessage,
        msg_info: Option<&MessageInfo>,
        message_name: &str,
        def: &FieldDefinition,
        raw: &RawValue,
    ) -> Result<(String, DecodedField), DecoderError> {
        let Some(info) = msg_info.and_then(|m| m.field(def.field_id)) else {
            // Unknown field (or unknown message): invalid masking and
            // numeric promotion only.
            let value = self.mask_and_promote(raw, def, None);
            return Ok((
                format!("unknown_field_{}", def.field_id),
                DecodedField::new(value, ""),
            ));
        };

        // Sub-field resolution runs against the raw values of the message,
        // first declared match wins and overrides name, units, type, scale,
        // and offset for the rest of the pipeline.
        let sub = info.sub_fields().iter().find(|s| s.matches(message));
        let (name, mut units, kind, scale, offset) = match sub {
            Some(s) => (s.name.as_str(), s.unit(), s.kind.as_str(), s.scale(), s.offset()),
            None => (
                info.name.as_str(),
                info.unit(),
                info.kind.as_str(),
                info.scale(),
                info.offset(),
            ),
        };

        let mut value = self.mask_and_promote(raw, def, self.profile.type_map(kind));

        if self.options.apply_scale_offset && value.admits_arithmetic() {
            let scale = scale.ok_or_else(|| DecoderError::NonUniformScale {
                message: message_name.to_owned(),
                field: name.to_owned(),
            })?;
            let offset = offset.ok_or_else(|| DecoderError::NonUniformOffset {
                message: message_name.to_owned(),
                field: name.to_owned(),
            })?;
            if scale == 0.0 {
                return Err(DecoderError::ZeroScale {
                    message: message_name.to_owned(),
                    field: name.to_owned(),
                });
            }
            value = apply_scale_offset(value, scale, offset);
        }

        if self.options.convert_datetime && kind == DATE_TIME_TYPE {
            if let Some(seconds) = value.as_f64() {
                value = Value::Time(*FIT_EPOCH + TimeDelta::seconds(seconds as i64));
                units = "";
            }
        }

        Ok((name.to_owned(), DecodedField::new(value, units)))
    }

    // Steps shared by known and unknown fields: sentinel masking, optional
    // enumeration lookup, promotion to 64-bit values, arity collapse.
    fn mask_and_promote(
        &self,
        raw: &RawValue,
        def: &FieldDefinition,
        type_map: Option<&HashMap<i64, String>>,
    ) -> Value {
        let mut elements = Vec::with_capacity(raw.len());
        for idx in 0..raw.len() {
            let mut value = if self.options.process_invalids
                && def.base_type.is_numeric()
                && raw.bits(idx) == Some(def.base_type.invalid())
            {
                Value::Null
            } else {
                Value::from_raw_element(raw, idx)
            };

            if let Some(map) = type_map {
                if let Some(label) = value.as_i64().and_then(|key| map.get(&key)) {
                    value = Value::Label(label.clone());
                }
            }

            elements.push(value);
        }

        if elements.len() == 1 {
            elements.pop().expect("one element")
        } else {
            Value::Array(elements)
        }
    }
}

// physical = raw / scale - offset, element-wise; nulls pass through and a
// unit scale with zero offset leaves values and types untouched.
fn apply_scale_offset(value: Value, scale: f64, offset: f64) -> Value {
    match value {
        Value::Array(elements) => Value::Array(
            elements
                .into_iter()
                .map(|e| apply_scale_offset(e, scale, offset))
                .collect(),
        ),
        Value::Null => Value::Null,
        value => {
            if scale == 1.0 && offset == 0.0 {
                return value;
            }
            let raw = value.as_f64().expect("gated on admits_arithmetic");
            Value::Float(raw / scale - offset)
        }
    }
}
