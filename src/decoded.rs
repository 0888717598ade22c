//! Decoded output model
//!
//! A decoded message pairs each resolved field name with a value and unit;
//! a decoded file groups messages by message name, preserving the order in
//! which each name first appeared.

use std::collections::HashMap;
use std::fmt;
use std::ops::Index;

use crate::value::Value;

/// A decoded field: the value after the full transform pipeline, plus its
/// unit (possibly empty).
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
#[derive(Clone, PartialEq, Debug)]
pub struct DecodedField {
    pub value: Value,
    pub units: String,
}

impl DecodedField {
    pub fn new(value: Value, units: &str) -> Self {
        Self {
            value,
            units: units.to_owned(),
        }
    }
}

impl fmt::Display for DecodedField {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.units.is_empty() {
            write!(f, "{}", self.value)
        } else {
            write!(f, "{} {}", self.value, self.units)
        }
    }
}

/// A decoded data message: the resolved message name and its fields in
/// declaration order.
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
#[derive(Clone, PartialEq, Default, Debug)]
pub struct DecodedMessage {
    name: String,
    fields: Vec<(String, DecodedField)>,
}

impl DecodedMessage {
    pub fn new(name: String) -> Self {
        Self {
            name,
            fields: Vec::new(),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub(crate) fn insert(&mut self, name: String, field: DecodedField) {
        self.fields.push((name, field));
    }

    pub fn contains(&self, name: &str) -> bool {
        self.fields.iter().any(|(n, _)| n == name)
    }

    pub fn get(&self, name: &str) -> Option<&DecodedField> {
        self.fields
            .iter()
            .find(|(n, _)| n == name)
            .map(|(_, field)| field)
    }

    /// Fields in declaration order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &DecodedField)> {
        self.fields.iter().map(|(n, f)| (n.as_str(), f))
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }
}

impl Index<&str> for DecodedMessage {
    type Output = DecodedField;

    fn index(&self, name: &str) -> &DecodedField {
        self.get(name)
            .unwrap_or_else(|| panic!("no field named {name:?} in message {:?}", self.name))
    }
}

impl fmt::Display for DecodedMessage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "{}", self.name)?;
        for (name, field) in self.iter() {
            writeln!(f, "  {name}: {field}")?;
        }
        Ok(())
    }
}

/// All decoded messages of a file, grouped by message name.
///
/// Group keys keep the order in which each message name first appeared in
/// the file; within a group, messages keep file order.
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
#[derive(Clone, Default, Debug)]
pub struct DecodedFitFile {
    names: Vec<String>,
    groups: HashMap<String, Vec<DecodedMessage>>,
}

impl DecodedFitFile {
    pub fn new() -> Self {
        Self::default()
    }

    pub(crate) fn push(&mut self, message: DecodedMessage) {
        let name = message.name().to_owned();
        if !self.groups.contains_key(&name) {
            self.names.push(name.clone());
        }
        self.groups.entry(name).or_default().push(message);
    }

    /// Distinct message names in order of first appearance.
    pub fn names(&self) -> &[String] {
        &self.names
    }

    pub fn contains(&self, name: &str) -> bool {
        self.groups.contains_key(name)
    }

    pub fn get(&self, name: &str) -> Option<&[DecodedMessage]> {
        self.groups.get(name).map(Vec::as_slice)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &[DecodedMessage])> {
        self.names
            .iter()
            .map(|name| (name.as_str(), self.groups[name].as_slice()))
    }

    /// Total number of decoded messages across all groups.
    pub fn num_messages(&self) -> usize {
        self.groups.values().map(Vec::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.names.is_empty()
    }
}

impl Index<&str> for DecodedFitFile {
    type Output = [DecodedMessage];

    fn index(&self, name: &str) -> &[DecodedMessage] {
        self.get(name)
            .unwrap_or_else(|| panic!("no messages named {name:?}"))
    }
}

#[cfg(test)]
mod tests {
    use super::{DecodedField, DecodedFitFile, DecodedMessage};
    use crate::value::Value;

    fn message(name: &str, field: (&str, u64)) -> DecodedMessage {
        let mut msg = DecodedMessage::new(name.to_owned());
        msg.insert(
            field.0.to_owned(),
            DecodedField::new(Value::Uint(field.1), ""),
        );
        msg
    }

    #[test]
    fn message_lookup_and_order() {
        let mut msg = DecodedMessage::new("record".to_owned());
        msg.insert(
            "timestamp".to_owned(),
            DecodedField::new(Value::Uint(12), "s"),
        );
        msg.insert(
            "heart_rate".to_owned(),
            DecodedField::new(Value::Uint(140), "bpm"),
        );

        assert!(msg.contains("timestamp"));
        assert!(!msg.contains("cadence"));
        assert_eq!(msg["heart_rate"].value, Value::Uint(140));
        assert_eq!(msg["heart_rate"].units, "bpm");
        let names = msg.iter().map(|(n, _)| n).collect::<Vec<_>>();
        assert_eq!(names, vec!["timestamp", "heart_rate"]);
    }

    #[test]
    fn groups_preserve_first_appearance_order() {
        let mut file = DecodedFitFile::new();
        file.push(message("file_id", ("type", 4)));
        file.push(message("record", ("heart_rate", 130)));
        file.push(message("record", ("heart_rate", 131)));
        file.push(message("event", ("event", 0)));
        file.push(message("record", ("heart_rate", 132)));

        assert_eq!(file.names(), &["file_id", "record", "event"]);
        assert_eq!(file["record"].len(), 3);
        assert_eq!(file["record"][2]["heart_rate"].value, Value::Uint(132));
        assert_eq!(file.num_messages(), 5);
        assert!(file.contains("event"));
        assert!(!file.contains("lap"));
        assert!(file.get("lap").is_none());
    }

    #[test]
    fn display_renders_fields() {
        let mut msg = DecodedMessage::new("record".to_owned());
        msg.insert(
            "speed".to_owned(),
            DecodedField::new(Value::Float(2.5), "m/s"),
        );
        assert_eq!(msg.to_string(), "record\n  speed: 2.5 m/s\n");
    }
}
