//! Dynamic field maps and typed field definitions.
//!
//! Plugins declare their configurable properties as [`FieldDef`]s; API and
//! snapshot input arrives as a loose [`FieldMap`]. Validation coerces the
//! loose values into typed scalars: when `options` is set the value must
//! textually equal one of them, otherwise it is converted to the declared
//! type and range-checked against `min`/`max`.

use std::collections::HashMap;

use lattice_ua::{ids::data_type_id, NodeId, Scalar};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::{ProjectError, ProjectResult};

// =============================================================================
// FieldMap
// =============================================================================

/// A loose name → value property bag.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct FieldMap(pub HashMap<String, Value>);

impl FieldMap {
    /// Creates an empty map.
    pub fn new() -> Self {
        Self::default()
    }

    /// Inserts a field.
    pub fn insert(&mut self, name: impl Into<String>, value: impl Into<Value>) {
        self.0.insert(name.into(), value.into());
    }

    /// Returns `true` when `name` is present.
    pub fn contains(&self, name: &str) -> bool {
        self.0.contains_key(name)
    }

    /// Borrows the raw value of `name`.
    pub fn get(&self, name: &str) -> Option<&Value> {
        self.0.get(name)
    }

    /// Iterates over the entries.
    pub fn iter(&self) -> impl Iterator<Item = (&String, &Value)> {
        self.0.iter()
    }

    /// Number of entries.
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Returns `true` when empty.
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Normalizes keys from lowerCamel to UpperCamel, the property-name
    /// convention of the node model.
    pub fn normalize_field_names(&mut self) {
        let entries: Vec<(String, Value)> = self.0.drain().collect();
        for (key, value) in entries {
            self.0.insert(upper_camel(&key), value);
        }
    }

    /// Drops every field the plugin does not declare for `node_type`.
    pub fn retain_plugin_fields(
        &mut self,
        config: &crate::plugin::PluginConfig,
        node_type: crate::node_type::NodeType,
    ) {
        self.0.retain(|name, _| config.field_def(name, node_type).is_some());
    }

    /// Coerced string accessor.
    pub fn get_string(&self, name: &str) -> ProjectResult<String> {
        match self.0.get(name) {
            None => Err(ProjectError::NotFound),
            Some(Value::String(s)) => Ok(s.clone()),
            Some(Value::Bool(b)) => Ok(b.to_string()),
            Some(Value::Number(n)) => Ok(n.to_string()),
            Some(_) => Err(ProjectError::InvalidValue),
        }
    }

    /// Coerced boolean accessor.
    pub fn get_bool(&self, name: &str) -> ProjectResult<bool> {
        match self.0.get(name) {
            None => Err(ProjectError::NotFound),
            Some(Value::Bool(b)) => Ok(*b),
            Some(Value::String(s)) => match s.to_lowercase().as_str() {
                "true" | "1" => Ok(true),
                "false" | "0" => Ok(false),
                _ => Err(ProjectError::InvalidValue),
            },
            Some(Value::Number(n)) => Ok(n.as_f64().unwrap_or(0.0) != 0.0),
            Some(_) => Err(ProjectError::InvalidValue),
        }
    }

    /// Coerced f64 accessor.
    pub fn get_f64(&self, name: &str) -> ProjectResult<f64> {
        match self.0.get(name) {
            None => Err(ProjectError::NotFound),
            Some(v) => coerce_f64(v).ok_or(ProjectError::InvalidValue),
        }
    }

    /// Coerced i64 accessor.
    pub fn get_i64(&self, name: &str) -> ProjectResult<i64> {
        match self.0.get(name) {
            None => Err(ProjectError::NotFound),
            Some(Value::Number(n)) => n
                .as_i64()
                .or_else(|| n.as_f64().map(|f| f as i64))
                .ok_or(ProjectError::InvalidValue),
            Some(Value::String(s)) => s.parse().map_err(|_| ProjectError::InvalidValue),
            Some(Value::Bool(b)) => Ok(*b as i64),
            Some(_) => Err(ProjectError::InvalidValue),
        }
    }

    /// Coerced i16 accessor.
    pub fn get_i16(&self, name: &str) -> ProjectResult<i16> {
        let v = self.get_i64(name)?;
        i16::try_from(v).map_err(|_| ProjectError::ValueOutOfRange)
    }
}

impl FromIterator<(String, Value)> for FieldMap {
    fn from_iter<T: IntoIterator<Item = (String, Value)>>(iter: T) -> Self {
        FieldMap(iter.into_iter().collect())
    }
}

fn coerce_f64(value: &Value) -> Option<f64> {
    match value {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.parse().ok(),
        Value::Bool(b) => Some(if *b { 1.0 } else { 0.0 }),
        _ => None,
    }
}

fn upper_camel(name: &str) -> String {
    let mut chars = name.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().collect::<String>() + chars.as_str(),
        None => String::new(),
    }
}

// =============================================================================
// FieldDef
// =============================================================================

/// Declares one configurable field of a node type.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct FieldDef {
    /// The field must be non-empty.
    #[serde(default)]
    pub required: bool,
    /// The field (property) name.
    pub name: String,
    /// Display name for forms.
    #[serde(default, rename = "displayName")]
    pub display_name: String,
    /// Description for forms.
    #[serde(default)]
    pub description: String,
    /// Declared type name: `bool`, `string`, `byte`, `int16`, `int32`,
    /// `int64`, `uint16`, `uint32`, `uint64`, `float32`, `float64`.
    #[serde(rename = "type")]
    pub field_type: String,
    /// Inclusive lower bound for numeric types.
    #[serde(default)]
    pub min: Option<i64>,
    /// Inclusive upper bound for numeric types.
    #[serde(default)]
    pub max: Option<i64>,
    /// Admissible values; when set, validation is textual membership.
    #[serde(default)]
    pub options: Option<Vec<Value>>,
}

impl FieldDef {
    /// Creates a field definition of the given name and type.
    pub fn new(name: impl Into<String>, field_type: impl Into<String>) -> Self {
        Self { name: name.into(), field_type: field_type.into(), ..Default::default() }
    }

    /// Marks the field required.
    pub fn required(mut self) -> Self {
        self.required = true;
        self
    }

    /// Sets the numeric range.
    pub fn range(mut self, min: i64, max: i64) -> Self {
        self.min = Some(min);
        self.max = Some(max);
        self
    }

    /// Sets the admissible options.
    pub fn options(mut self, options: Vec<Value>) -> Self {
        self.options = Some(options);
        self
    }

    /// Validates and coerces `value` against this definition.
    ///
    /// With `options` set, the value must textually equal one of them and is
    /// returned coerced to the declared type. Otherwise the value is coerced
    /// to the declared type and range-checked.
    pub fn validate_value(&self, value: &Value) -> ProjectResult<Scalar> {
        if let Some(options) = &self.options {
            let text = loose_text(value);
            for opt in options {
                if loose_text(opt) == text {
                    return self.coerce(opt);
                }
            }
            return Err(ProjectError::InvalidValue);
        }
        let scalar = self.coerce(value)?;
        self.check_range(&scalar)?;
        if self.required {
            if let Scalar::String(s) = &scalar {
                if s.is_empty() {
                    return Err(ProjectError::FieldRequired);
                }
            }
        }
        Ok(scalar)
    }

    fn coerce(&self, value: &Value) -> ProjectResult<Scalar> {
        fn num(value: &Value) -> ProjectResult<f64> {
            coerce_f64(value).ok_or(ProjectError::InvalidValue)
        }
        fn int_in<T: TryFrom<i64>>(value: &Value) -> ProjectResult<T> {
            let f = num(value)?;
            let i = f as i64;
            if i as f64 != f {
                return Err(ProjectError::InvalidValue);
            }
            T::try_from(i).map_err(|_| ProjectError::ValueOutOfRange)
        }

        Ok(match self.field_type.as_str() {
            "string" => match value {
                Value::String(s) => Scalar::String(s.clone()),
                Value::Bool(b) => Scalar::String(b.to_string()),
                Value::Number(n) => Scalar::String(n.to_string()),
                _ => return Err(ProjectError::InvalidValue),
            },
            "bool" => match value {
                Value::Bool(b) => Scalar::Boolean(*b),
                Value::String(s) => match s.to_lowercase().as_str() {
                    "true" | "1" => Scalar::Boolean(true),
                    "false" | "0" => Scalar::Boolean(false),
                    _ => return Err(ProjectError::InvalidValue),
                },
                Value::Number(n) => Scalar::Boolean(n.as_f64().unwrap_or(0.0) != 0.0),
                _ => return Err(ProjectError::InvalidValue),
            },
            "byte" | "uint8" => Scalar::Byte(int_in::<u8>(value)? as u8),
            "sbyte" | "int8" => Scalar::SByte(int_in::<i8>(value)?),
            "int16" => Scalar::Int16(int_in::<i16>(value)?),
            "uint16" => Scalar::UInt16(int_in::<u16>(value)?),
            "int32" | "int" => Scalar::Int32(int_in::<i32>(value)?),
            "uint32" => Scalar::UInt32(int_in::<u32>(value)?),
            "int64" => Scalar::Int64(int_in::<i64>(value)?),
            "uint64" => Scalar::UInt64(int_in::<u64>(value)? as u64),
            "float32" => Scalar::Float(num(value)? as f32),
            "float64" => Scalar::Double(num(value)?),
            _ => return Err(ProjectError::InvalidField),
        })
    }

    fn check_range(&self, scalar: &Scalar) -> ProjectResult<()> {
        let v = match scalar.as_f64() {
            Some(v) => v,
            None => return Ok(()),
        };
        if matches!(scalar, Scalar::Boolean(_)) {
            return Ok(());
        }
        if let Some(min) = self.min {
            if v < min as f64 {
                return Err(ProjectError::ValueOutOfRange);
            }
        }
        if let Some(max) = self.max {
            if v > max as f64 {
                return Err(ProjectError::ValueOutOfRange);
            }
        }
        Ok(())
    }

    /// The standard data type node id matching the declared type.
    pub fn data_type_id(&self) -> NodeId {
        match self.field_type.as_str() {
            "bool" => data_type_id::BOOLEAN,
            "byte" | "uint8" => data_type_id::BYTE,
            "sbyte" | "int8" => data_type_id::SBYTE,
            "int16" => data_type_id::INT16,
            "uint16" => data_type_id::UINT16,
            "int32" | "int" => data_type_id::INT32,
            "uint32" => data_type_id::UINT32,
            "int64" => data_type_id::INT64,
            "uint64" => data_type_id::UINT64,
            "float32" => data_type_id::FLOAT,
            "float64" => data_type_id::DOUBLE,
            _ => data_type_id::STRING,
        }
    }
}

fn loose_text(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        Value::Bool(b) => b.to_string(),
        Value::Number(n) => n.to_string(),
        other => other.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn normalize_field_names_upper_camels_keys() {
        let mut fm = FieldMap::new();
        fm.insert("browseName", "Plc1");
        fm.insert("scanRate", 500);
        fm.normalize_field_names();
        assert!(fm.contains("BrowseName"));
        assert!(fm.contains("ScanRate"));
        assert!(!fm.contains("browseName"));
    }

    #[test]
    fn typed_accessors_coerce() {
        let mut fm = FieldMap::new();
        fm.insert("Rate", "250");
        fm.insert("Enabled", true);
        fm.insert("Scale", 2.5);
        assert_eq!(fm.get_i64("Rate").unwrap(), 250);
        assert_eq!(fm.get_string("Rate").unwrap(), "250");
        assert!(fm.get_bool("Enabled").unwrap());
        assert_eq!(fm.get_f64("Scale").unwrap(), 2.5);
        assert_eq!(fm.get_i64("Missing"), Err(ProjectError::NotFound));
    }

    #[test]
    fn validate_with_range() {
        let def = FieldDef::new("ScanRate", "int32").range(10, 10_000);
        assert_eq!(def.validate_value(&json!(500)).unwrap(), Scalar::Int32(500));
        assert_eq!(def.validate_value(&json!("500")).unwrap(), Scalar::Int32(500));
        assert_eq!(def.validate_value(&json!(5)), Err(ProjectError::ValueOutOfRange));
        assert_eq!(def.validate_value(&json!(20_000)), Err(ProjectError::ValueOutOfRange));
        assert_eq!(def.validate_value(&json!("abc")), Err(ProjectError::InvalidValue));
    }

    #[test]
    fn validate_with_options_is_textual() {
        let def = FieldDef::new("ByteOrder", "string")
            .options(vec![json!("BigEndian"), json!("LittleEndian")]);
        assert_eq!(
            def.validate_value(&json!("BigEndian")).unwrap(),
            Scalar::String("BigEndian".to_string())
        );
        assert_eq!(def.validate_value(&json!("MiddleEndian")), Err(ProjectError::InvalidValue));

        let numeric = FieldDef::new("Parity", "int32").options(vec![json!(0), json!(1), json!(2)]);
        assert_eq!(numeric.validate_value(&json!("1")).unwrap(), Scalar::Int32(1));
        assert_eq!(numeric.validate_value(&json!(3)), Err(ProjectError::InvalidValue));
    }

    #[test]
    fn required_string_rejects_empty() {
        let def = FieldDef::new("Name", "string").required();
        assert_eq!(def.validate_value(&json!("")), Err(ProjectError::FieldRequired));
        assert!(def.validate_value(&json!("ok")).is_ok());
    }
}
