//! boundary value representation
//!
//! Parsed documents and estimation maps are loosely typed. Before anything reaches the
//! typed usage model it is turned into a [Value]:
//! - boolean (true/false)
//! - integer (signed, i64)
//! - decimal (f64)
//! - string (utf-8)
//! - array ("list" of values)
//! - object (order-preserving "map"/"dictionary", where the key is of type string)
//!
//! Additionally:
//! - there is no `null`/`None` value. Nulls are dropped while converting, which makes
//!   `key: ~` and a missing key indistinguishable.
//! - the only lossless **implicit** conversion: every `integer` is also a `decimal`
//!
//! The typed accessors (`as_int`, `as_float`, ...) are the decode step used when a
//! usage item pulls its value out of a map.
use indexmap::IndexMap;
use serde::{
    ser::{SerializeMap, SerializeSeq},
    Serializer,
};

/// Ordered object as used by estimation callbacks
pub type ValueMap = IndexMap<String, Value>;

/// All possible value types
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Boolean(bool),
    Integer(i64),
    Decimal(f64),
    String(String),
    Array(Vec<Value>),
    Object(ValueMap),
}

#[derive(thiserror::Error, Debug, PartialEq)]
pub enum ValueError {
    #[error("mapping key must be a scalar, found {0}")]
    NonScalarKey(String),
    #[error("number {0} can not be represented")]
    NumberOutOfRange(String),
}

impl Value {
    /// Convert a parsed yaml value
    ///
    /// Returns `Ok(None)` for `null`. Tags are ignored and the tagged value is used.
    pub fn from_yaml(value: serde_yaml::Value) -> Result<Option<Self>, ValueError> {
        use serde_yaml::Value as Yaml;

        let value = match value {
            Yaml::Null => return Ok(None),
            Yaml::Bool(b) => b.into(),
            Yaml::Number(n) => match n.as_i64() {
                Some(int) => Value::Integer(int),
                None => match n.as_f64() {
                    Some(float) => Value::Decimal(float),
                    None => return Err(ValueError::NumberOutOfRange(n.to_string())),
                },
            },
            Yaml::String(s) => s.into(),
            Yaml::Sequence(sequence) => {
                let mut array = Vec::with_capacity(sequence.len());
                for element in sequence {
                    if let Some(element) = Value::from_yaml(element)? {
                        array.push(element);
                    }
                }
                Value::Array(array)
            }
            Yaml::Mapping(mapping) => {
                let mut object = ValueMap::with_capacity(mapping.len());
                for (key, value) in mapping {
                    let key = yaml_key(key)?;
                    match Value::from_yaml(value)? {
                        Some(value) => {
                            object.insert(key, value);
                        }
                        None => tracing::trace!(%key, "dropping null value"),
                    }
                }
                Value::Object(object)
            }
            Yaml::Tagged(tagged) => return Value::from_yaml(tagged.value),
        };

        Ok(Some(value))
    }

    /// Convert an evaluated hcl value
    ///
    /// Returns `Ok(None)` for `null`.
    pub fn from_hcl(value: hcl::Value) -> Result<Option<Self>, ValueError> {
        let value = match value {
            hcl::Value::Null => return Ok(None),
            hcl::Value::Bool(b) => b.into(),
            hcl::Value::Number(num) => {
                let value = if num.is_f64() {
                    num.as_f64().map(Value::Decimal)
                } else {
                    num.as_i64().map(Value::Integer).or_else(|| num.as_f64().map(Value::Decimal))
                };
                value.ok_or_else(|| ValueError::NumberOutOfRange(num.to_string()))?
            }
            hcl::Value::String(s) => s.into(),
            hcl::Value::Array(elements) => {
                let mut array = Vec::with_capacity(elements.len());
                for element in elements {
                    if let Some(element) = Value::from_hcl(element)? {
                        array.push(element);
                    }
                }
                Value::Array(array)
            }
            hcl::Value::Object(entries) => {
                let mut object = ValueMap::with_capacity(entries.len());
                for (key, value) in entries {
                    if let Some(value) = Value::from_hcl(value)? {
                        object.insert(key, value);
                    }
                }
                Value::Object(object)
            }
        };

        Ok(Some(value))
    }

    /// Integer view. Decimals are floored, numeric strings are parsed.
    pub fn as_int(&self) -> Option<i64> {
        match self {
            Value::Integer(int) => Some(*int),
            Value::Decimal(float) => float_to_int(*float),
            Value::String(s) => {
                let s = s.trim();
                s.parse::<i64>()
                    .ok()
                    .or_else(|| s.parse::<f64>().ok().and_then(float_to_int))
            }
            _ => None,
        }
    }

    /// Decimal view. Integers convert implicitly, numeric strings are parsed.
    pub fn as_float(&self) -> Option<f64> {
        match self {
            Value::Integer(int) => Some(*int as f64),
            Value::Decimal(float) => Some(*float),
            Value::String(s) => s.trim().parse::<f64>().ok(),
            _ => None,
        }
    }

    /// String view. Scalars are rendered, arrays and objects are not strings.
    pub fn as_string(&self) -> Option<String> {
        match self {
            Value::String(s) => Some(s.clone()),
            Value::Integer(int) => Some(int.to_string()),
            Value::Decimal(float) => Some(float.to_string()),
            Value::Boolean(b) => Some(b.to_string()),
            Value::Array(_) | Value::Object(_) => None,
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Value::Boolean(b) => Some(*b),
            Value::String(s) => s.trim().parse::<bool>().ok(),
            _ => None,
        }
    }

    /// Array of scalars as strings. A single element that is not a scalar rejects the whole array.
    pub fn as_string_array(&self) -> Option<Vec<String>> {
        let Value::Array(elements) = self else {
            return None;
        };

        elements.iter().map(Value::as_string).collect()
    }

    pub fn as_object(&self) -> Option<&ValueMap> {
        match self {
            Value::Object(object) => Some(object),
            _ => None,
        }
    }
}

fn float_to_int(float: f64) -> Option<i64> {
    let floored = float.floor();
    if floored.is_finite() && floored >= i64::MIN as f64 && floored <= i64::MAX as f64 {
        Some(floored as i64)
    } else {
        None
    }
}

fn yaml_key(key: serde_yaml::Value) -> Result<String, ValueError> {
    use serde_yaml::Value as Yaml;

    match key {
        Yaml::String(s) => Ok(s),
        Yaml::Number(n) => Ok(n.to_string()),
        Yaml::Bool(b) => Ok(b.to_string()),
        Yaml::Tagged(tagged) => yaml_key(tagged.value),
        other => Err(ValueError::NonScalarKey(format!("{other:?}"))),
    }
}

impl From<String> for Value {
    fn from(value: String) -> Self {
        Value::String(value)
    }
}

impl From<&str> for Value {
    fn from(value: &str) -> Self {
        Value::String(value.to_string())
    }
}

impl From<bool> for Value {
    fn from(value: bool) -> Self {
        Self::Boolean(value)
    }
}

impl From<i64> for Value {
    fn from(value: i64) -> Self {
        Self::Integer(value)
    }
}

impl From<f64> for Value {
    fn from(value: f64) -> Self {
        Self::Decimal(value)
    }
}

impl<T: Into<Value>> From<Vec<T>> for Value {
    fn from(value: Vec<T>) -> Self {
        Value::Array(value.into_iter().map(Into::into).collect())
    }
}

impl From<ValueMap> for Value {
    fn from(value: ValueMap) -> Self {
        Value::Object(value)
    }
}

impl serde::ser::Serialize for Value {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        match self {
            Value::Boolean(value) => serializer.serialize_bool(*value),
            Value::Integer(value) => serializer.serialize_i64(*value),
            Value::Decimal(value) => serializer.serialize_f64(*value),
            Value::String(value) => serializer.serialize_str(value),
            Value::Array(value) => {
                let mut ser = serializer.serialize_seq(Some(value.len()))?;
                for element in value {
                    ser.serialize_element(element)?;
                }
                ser.end()
            }
            Value::Object(value) => {
                let mut ser = serializer.serialize_map(Some(value.len()))?;
                for (element_key, element_value) in value {
                    ser.serialize_entry(element_key, element_value)?;
                }
                ser.end()
            }
        }
    }
}
