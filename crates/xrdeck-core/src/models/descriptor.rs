//! Viewer descriptor model
//!
//! A KeyShot XR export embeds its viewer configuration in an HTML page as a run
//! of `var NAME = VALUE;` assignments. Once parsed, the configuration is opaque
//! to this system: it is stored on the product and handed back to the viewer.

use serde::ser::{Serialize, SerializeMap, Serializer};
use std::collections::BTreeMap;

/// A scalar value declared by the viewer descriptor
#[derive(Debug, Clone, PartialEq)]
pub enum DescriptorValue {
    Text(String),
    Number(f64),
    Bool(bool),
    /// The literal `{}` token.
    EmptyObject,
}

impl DescriptorValue {
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            DescriptorValue::Number(n) => Some(*n),
            _ => None,
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            DescriptorValue::Bool(b) => Some(*b),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            DescriptorValue::Text(s) => Some(s),
            _ => None,
        }
    }
}

impl Serialize for DescriptorValue {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            DescriptorValue::Text(s) => serializer.serialize_str(s),
            // Integral values keep their integer form so `uCount = 2` stays `2`, not `2.0`.
            DescriptorValue::Number(n)
                if n.fract() == 0.0 && n.is_finite() && n.abs() < i64::MAX as f64 =>
            {
                serializer.serialize_i64(*n as i64)
            }
            DescriptorValue::Number(n) => serializer.serialize_f64(*n),
            DescriptorValue::Bool(b) => serializer.serialize_bool(*b),
            DescriptorValue::EmptyObject => serializer.serialize_map(Some(0))?.end(),
        }
    }
}

/// Parsed viewer configuration: declared variable name to value.
#[derive(Debug, Clone, Default, PartialEq, serde::Serialize)]
#[serde(transparent)]
pub struct ViewerDescriptor {
    values: BTreeMap<String, DescriptorValue>,
}

impl ViewerDescriptor {
    pub fn new() -> Self {
        Self::default()
    }

    /// Later declarations of the same name win, as they would in the browser.
    pub fn insert(&mut self, name: impl Into<String>, value: DescriptorValue) {
        self.values.insert(name.into(), value);
    }

    pub fn get(&self, name: &str) -> Option<&DescriptorValue> {
        self.values.get(name)
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &DescriptorValue)> {
        self.values.iter()
    }

    /// Number of tile columns (`uCount`).
    pub fn column_count(&self) -> Option<u32> {
        self.count("uCount")
    }

    /// Number of tile rows (`vCount`).
    pub fn row_count(&self) -> Option<u32> {
        self.count("vCount")
    }

    fn count(&self, name: &str) -> Option<u32> {
        self.get(name)
            .and_then(DescriptorValue::as_f64)
            .filter(|n| *n >= 0.0 && n.fract() == 0.0 && *n <= u32::MAX as f64)
            .map(|n| n as u32)
    }

    pub fn to_json(&self) -> serde_json::Value {
        serde_json::to_value(self).unwrap_or_else(|_| serde_json::Value::Object(Default::default()))
    }
}
