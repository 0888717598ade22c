//! In-memory model of the FIT global profile
//!
//! The profile is the schema catalog extracted from the vendor SDK: message
//! names and field records keyed by global message number, plus the
//! enumerated types that map raw values to labels.  Loading the profile
//! artefact from disk is a collaborator concern; with the `serde` feature
//! the model derives `Serialize`/`Deserialize` so a collaborator can ship it
//! as JSON.  The model is immutable once handed to a decoder and can be
//! shared between decoders.

use std::collections::HashMap;

use tracing::warn;

use crate::message::DataMessage;

fn normalized_unit<'a>(units: &'a [String], name: &str) -> &'a str {
    let mut nonempty = units.iter().filter(|u| !u.is_empty());
    let Some(first) = nonempty.next() else {
        return "";
    };
    if nonempty.any(|u| u != first) {
        warn!(field = name, "Per-element units disagree, using the first");
    }
    first
}

// A per-element sequence is only meaningful when every element agrees.
fn uniform(values: &[f64], default: f64) -> Option<f64> {
    match values.split_first() {
        None => Some(default),
        Some((first, rest)) => rest.iter().all(|v| v == first).then_some(*first),
    }
}

/// The schema catalog: messages by global number and enumerated types by
/// name.
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[derive(Clone, Default, Debug)]
pub struct Profile {
    #[cfg_attr(feature = "serde", serde(default))]
    messages: HashMap<u16, MessageInfo>,
    #[cfg_attr(feature = "serde", serde(default))]
    types: HashMap<String, HashMap<i64, String>>,
}

impl Profile {
    /// An empty profile.  Decoding against it yields `unknown_msg_*`
    /// messages with `unknown_field_*` fields.
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_message(&mut self, global_mesg_num: u16, message: MessageInfo) -> &mut Self {
        self.messages.insert(global_mesg_num, message);
        self
    }

    pub fn add_type(&mut self, name: &str, values: HashMap<i64, String>) -> &mut Self {
        self.types.insert(name.to_owned(), values);
        self
    }

    pub fn message(&self, global_mesg_num: u16) -> Option<&MessageInfo> {
        self.messages.get(&global_mesg_num)
    }

    /// The raw-value-to-label map of an enumerated type, if the profile
    /// defines one under this name.
    pub fn type_map(&self, name: &str) -> Option<&HashMap<i64, String>> {
        self.types.get(name)
    }
}

/// One message of the profile: its name and its fields by definition
/// number.
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[derive(Clone, Debug)]
pub struct MessageInfo {
    pub name: String,
    #[cfg_attr(feature = "serde", serde(default))]
    fields: HashMap<u8, FieldInfo>,
}

impl MessageInfo {
    pub fn new(name: &str) -> Self {
        Self {
            name: name.to_owned(),
            fields: HashMap::new(),
        }
    }

    pub fn add_field(&mut self, field_id: u8, field: FieldInfo) -> &mut Self {
        self.fields.insert(field_id, field);
        self
    }

    pub fn field(&self, field_id: u8) -> Option<&FieldInfo> {
        self.fields.get(&field_id)
    }
}

/// A field record: name, semantic type, units, scale/offset, and the
/// sub-fields that can reinterpret it.
///
/// Units, scale, and offset may be declared per element for array fields;
/// the accessors normalize them to a single value.
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[derive(Clone, Debug)]
pub struct FieldInfo {
    pub name: String,
    /// Semantic type name, either a base type or a profile-defined
    /// enumeration such as `date_time`.
    #[cfg_attr(feature = "serde", serde(rename = "type"))]
    pub kind: String,
    #[cfg_attr(feature = "serde", serde(default))]
    units: Vec<String>,
    #[cfg_attr(feature = "serde", serde(default))]
    scale: Vec<f64>,
    #[cfg_attr(feature = "serde", serde(default))]
    offset: Vec<f64>,
    #[cfg_attr(feature = "serde", serde(default))]
    sub_fields: Vec<SubField>,
    /// Whether the field packs component sub-values; component expansion is
    /// not performed by this decoder.
    #[cfg_attr(feature = "serde", serde(default))]
    pub components: bool,
}

impl FieldInfo {
    pub fn new(name: &str, kind: &str) -> Self {
        Self {
            name: name.to_owned(),
            kind: kind.to_owned(),
            units: Vec::new(),
            scale: Vec::new(),
            offset: Vec::new(),
            sub_fields: Vec::new(),
            components: false,
        }
    }

    pub fn with_units(mut self, units: &str) -> Self {
        self.units = vec![units.to_owned()];
        self
    }

    pub fn with_unit_sequence(mut self, units: Vec<String>) -> Self {
        self.units = units;
        self
    }

    pub fn with_scale(mut self, scale: f64) -> Self {
        self.scale = vec![scale];
        self
    }

    pub fn with_scale_sequence(mut self, scale: Vec<f64>) -> Self {
        self.scale = scale;
        self
    }

    pub fn with_offset(mut self, offset: f64) -> Self {
        self.offset = vec![offset];
        self
    }

    pub fn with_sub_field(mut self, sub_field: SubField) -> Self {
        self.sub_fields.push(sub_field);
        self
    }

    pub fn with_components(mut self, components: bool) -> Self {
        self.components = components;
        self
    }

    /// The field's unit, normalized from a possibly per-element sequence.
    pub fn unit(&self) -> &str {
        normalized_unit(&self.units, &self.name)
    }

    /// The field's scale, `None` when a per-element sequence disagrees.
    /// Unset means 1.
    pub fn scale(&self) -> Option<f64> {
        uniform(&self.scale, 1.0)
    }

    /// The field's offset, `None` when a per-element sequence disagrees.
    /// Unset means 0.
    pub fn offset(&self) -> Option<f64> {
        uniform(&self.offset, 0.0)
    }

    pub fn sub_fields(&self) -> &[SubField] {
        &self.sub_fields
    }
}

/// An alternate interpretation of a field, selected when its map conditions
/// hold against the raw values of the containing message.
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[derive(Clone, Debug)]
pub struct SubField {
    pub name: String,
    #[cfg_attr(feature = "serde", serde(rename = "type"))]
    pub kind: String,
    #[cfg_attr(feature = "serde", serde(default))]
    units: Vec<String>,
    #[cfg_attr(feature = "serde", serde(default))]
    scale: Vec<f64>,
    #[cfg_attr(feature = "serde", serde(default))]
    offset: Vec<f64>,
    #[cfg_attr(feature = "serde", serde(default))]
    conditions: Vec<SubFieldCondition>,
}

impl SubField {
    pub fn new(name: &str, kind: &str) -> Self {
        Self {
            name: name.to_owned(),
            kind: kind.to_owned(),
            units: Vec::new(),
            scale: Vec::new(),
            offset: Vec::new(),
            conditions: Vec::new(),
        }
    }

    pub fn with_units(mut self, units: &str) -> Self {
        self.units = vec![units.to_owned()];
        self
    }

    pub fn with_scale(mut self, scale: f64) -> Self {
        self.scale = vec![scale];
        self
    }

    pub fn with_offset(mut self, offset: f64) -> Self {
        self.offset = vec![offset];
        self
    }

    pub fn with_condition(mut self, field_id: u8, raw_value: i64) -> Self {
        self.conditions.push(SubFieldCondition {
            field_id,
            raw_value,
        });
        self
    }

    pub fn unit(&self) -> &str {
        normalized_unit(&self.units, &self.name)
    }

    pub fn scale(&self) -> Option<f64> {
        uniform(&self.scale, 1.0)
    }

    pub fn offset(&self) -> Option<f64> {
        uniform(&self.offset, 0.0)
    }

    /// Evaluates the map conditions against the raw values of a message.
    ///
    /// Conditions sharing a reference field combine with OR; conditions on
    /// distinct reference fields combine with AND.  A sub-field with no
    /// conditions never matches, and a missing reference field fails its
    /// group.
    pub fn matches(&self, message: &DataMessage) -> bool {
        if self.conditions.is_empty() {
            return false;
        }
        let mut seen: Vec<u8> = Vec::new();
        for condition in &self.conditions {
            if seen.contains(&condition.field_id) {
                continue;
            }
            seen.push(condition.field_id);

            let Some(raw) = message
                .field(condition.field_id)
                .and_then(|value| value.reference())
            else {
                return false;
            };
            let group_holds = self
                .conditions
                .iter()
                .any(|c| c.field_id == condition.field_id && c.raw_value == raw);
            if !group_holds {
                return false;
            }
        }
        true
    }
}

/// One map condition: the referenced field must carry this raw value.
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub struct SubFieldCondition {
    pub field_id: u8,
    pub raw_value: i64,
}
