//! typed usage model
//!
//! A [UsageTree] is the usage of one resource (or one sub-resource). It holds [UsageItem]s in
//! insertion order; that order is the order the items are written back to disk.
//!
//! Every item carries its [UsageValueType]. The two optional values of an item ([UsageItem::value]
//! and [UsageItem::default_value]) always hold a [UsageValue] of the matching variant. Values
//! that arrive with a different type are converted with [UsageValue::coerce].
use crate::value::{Value, ValueMap};

/// The declared type of a usage item
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UsageValueType {
    Int64,
    Float64,
    String,
    StringArray,
    Bool,
    SubTree,
}

impl std::fmt::Display for UsageValueType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            UsageValueType::Int64 => f.write_str("int64"),
            UsageValueType::Float64 => f.write_str("float64"),
            UsageValueType::String => f.write_str("string"),
            UsageValueType::StringArray => f.write_str("string_array"),
            UsageValueType::Bool => f.write_str("bool"),
            UsageValueType::SubTree => f.write_str("sub_tree"),
        }
    }
}

/// A typed usage value
#[derive(Debug, Clone, PartialEq)]
pub enum UsageValue {
    Int64(i64),
    Float64(f64),
    String(String),
    StringArray(Vec<String>),
    Bool(bool),
    SubTree(UsageTree),
}

impl UsageValue {
    pub fn value_type(&self) -> UsageValueType {
        match self {
            UsageValue::Int64(_) => UsageValueType::Int64,
            UsageValue::Float64(_) => UsageValueType::Float64,
            UsageValue::String(_) => UsageValueType::String,
            UsageValue::StringArray(_) => UsageValueType::StringArray,
            UsageValue::Bool(_) => UsageValueType::Bool,
            UsageValue::SubTree(_) => UsageValueType::SubTree,
        }
    }

    /// Convert into `value_type`
    ///
    /// Numbers convert between each other (floats are floored), scalars convert to strings and
    /// a single string becomes a one element array. Everything else yields `None`.
    pub fn coerce(self, value_type: UsageValueType) -> Option<UsageValue> {
        if self.value_type() == value_type {
            return Some(self);
        }

        match (self, value_type) {
            (UsageValue::SubTree(_), _) => None,
            (other, UsageValueType::SubTree) => {
                tracing::debug!(value=?other, "scalar can not become a sub tree");
                None
            }
            (other, value_type) => Self::decode(&other.into_value(), value_type),
        }
    }

    /// Decode a boundary value according to `value_type`
    ///
    /// `key` names the sub-tree when decoding [UsageValueType::SubTree].
    pub fn decode_as(key: &str, value: &Value, value_type: UsageValueType) -> Option<UsageValue> {
        match value_type {
            UsageValueType::SubTree => value
                .as_object()
                .map(|object| UsageValue::SubTree(UsageTree::from_value_map(key, object))),
            scalar => Self::decode(value, scalar),
        }
    }

    fn decode(value: &Value, value_type: UsageValueType) -> Option<UsageValue> {
        match value_type {
            UsageValueType::Int64 => value.as_int().map(UsageValue::Int64),
            UsageValueType::Float64 => value.as_float().map(UsageValue::Float64),
            UsageValueType::String => value.as_string().map(UsageValue::String),
            UsageValueType::StringArray => match value {
                Value::String(s) => Some(UsageValue::StringArray(vec![s.clone()])),
                other => other.as_string_array().map(UsageValue::StringArray),
            },
            UsageValueType::Bool => value.as_bool().map(UsageValue::Bool),
            UsageValueType::SubTree => None,
        }
    }

    /// Infer the type from the value's form
    pub fn infer(key: &str, value: &Value) -> UsageValue {
        match value {
            Value::Boolean(b) => UsageValue::Bool(*b),
            Value::Integer(int) => UsageValue::Int64(*int),
            Value::Decimal(float) => UsageValue::Float64(*float),
            Value::String(s) => UsageValue::String(s.clone()),
            Value::Array(elements) => UsageValue::StringArray(
                elements
                    .iter()
                    .filter_map(|element| {
                        let s = element.as_string();
                        if s.is_none() {
                            tracing::debug!(%key, ?element, "dropping nested array element");
                        }
                        s
                    })
                    .collect(),
            ),
            Value::Object(object) => UsageValue::SubTree(UsageTree::from_value_map(key, object)),
        }
    }

    pub fn into_value(self) -> Value {
        match self {
            UsageValue::Int64(int) => Value::Integer(int),
            UsageValue::Float64(float) => Value::Decimal(float),
            UsageValue::String(s) => Value::String(s),
            UsageValue::StringArray(strings) => strings.into(),
            UsageValue::Bool(b) => Value::Boolean(b),
            UsageValue::SubTree(tree) => Value::Object(tree.to_value_map()),
        }
    }

    pub fn as_sub_tree(&self) -> Option<&UsageTree> {
        match self {
            UsageValue::SubTree(tree) => Some(tree),
            _ => None,
        }
    }

    pub fn as_sub_tree_mut(&mut self) -> Option<&mut UsageTree> {
        match self {
            UsageValue::SubTree(tree) => Some(tree),
            _ => None,
        }
    }
}

/// One named, typed usage assumption
#[derive(Debug, Clone, PartialEq)]
pub struct UsageItem {
    pub key: String,
    pub value_type: UsageValueType,
    /// The effective value. `None` falls back to [UsageItem::default_value].
    pub value: Option<UsageValue>,
    pub default_value: Option<UsageValue>,
    pub description: Option<String>,
}

impl UsageItem {
    pub fn new(key: impl Into<String>, value_type: UsageValueType) -> Self {
        Self {
            key: key.into(),
            value_type,
            value: None,
            default_value: None,
            description: None,
        }
    }

    /// Item with an active value; the type is taken from the value
    pub fn with_value(key: impl Into<String>, value: UsageValue) -> Self {
        let mut item = Self::new(key, value.value_type());
        item.value = Some(value);
        item
    }

    /// Item with only a default; the type is taken from the default
    pub fn with_default(key: impl Into<String>, default_value: UsageValue) -> Self {
        let mut item = Self::new(key, default_value.value_type());
        item.default_value = Some(default_value);
        item
    }

    pub fn described(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    /// Value if set, default otherwise
    pub fn effective_value(&self) -> Option<&UsageValue> {
        self.value.as_ref().or(self.default_value.as_ref())
    }

    /// `true` when the item holds an explicitly set value
    ///
    /// A sub tree only counts as active when one of its nested items is active.
    pub fn is_active(&self) -> bool {
        match &self.value {
            None => false,
            Some(UsageValue::SubTree(tree)) => tree.has_active_items(),
            Some(_) => true,
        }
    }

    /// Change the declared type, converting any held values
    pub fn retype(&mut self, value_type: UsageValueType) {
        if self.value_type == value_type {
            return;
        }

        tracing::trace!(key=%self.key, from=%self.value_type, to=%value_type, "retype");
        self.value_type = value_type;
        self.value = self.value.take().and_then(|v| v.coerce(value_type));
        self.default_value = self.default_value.take().and_then(|v| v.coerce(value_type));
    }

    /// Move the value into the default slot
    ///
    /// Used for catalogs that only ever provide defaults.
    pub fn demote_to_default(&mut self) {
        if let Some(value) = self.value.take() {
            self.default_value = Some(value);
        }

        if let Some(UsageValue::SubTree(tree)) = &mut self.default_value {
            tree.demote_to_defaults();
        }
    }
}

/// Ordered usage items of one resource or sub-resource
#[derive(Debug, Clone, PartialEq, Default, derive_new::new)]
pub struct UsageTree {
    pub name: String,
    #[new(default)]
    pub items: Vec<UsageItem>,
}

impl UsageTree {
    pub fn with_items(name: impl Into<String>, items: Vec<UsageItem>) -> Self {
        Self {
            name: name.into(),
            items,
        }
    }

    pub fn get(&self, key: &str) -> Option<&UsageItem> {
        self.items.iter().find(|item| item.key == key)
    }

    pub fn get_mut(&mut self, key: &str) -> Option<&mut UsageItem> {
        self.items.iter_mut().find(|item| item.key == key)
    }

    pub fn contains(&self, key: &str) -> bool {
        self.get(key).is_some()
    }

    /// Append an item
    ///
    /// Keys are unique within a tree, pushing a duplicate is a caller bug.
    pub fn push(&mut self, item: UsageItem) {
        debug_assert!(
            !self.contains(&item.key),
            "duplicate usage key {:?} in {:?}",
            item.key,
            self.name
        );
        self.items.push(item);
    }

    /// Existing item or a newly appended one of `value_type`
    pub fn get_or_insert(&mut self, key: &str, value_type: UsageValueType) -> &mut UsageItem {
        let index = match self.items.iter().position(|item| item.key == key) {
            Some(index) => index,
            None => {
                self.items.push(UsageItem::new(key, value_type));
                self.items.len() - 1
            }
        };

        &mut self.items[index]
    }

    pub fn iter(&self) -> std::slice::Iter<'_, UsageItem> {
        self.items.iter()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    /// `true` if any item, recursively, holds an explicit value
    pub fn has_active_items(&self) -> bool {
        self.items.iter().any(UsageItem::is_active)
    }

    /// Flatten the set values into an ordered map
    ///
    /// Unset scalars are left out. Sub trees always show up, as an empty map when unset, so
    /// estimators can fill them in.
    pub fn to_value_map(&self) -> ValueMap {
        let mut map = ValueMap::with_capacity(self.items.len());
        for item in &self.items {
            match (&item.value, item.value_type) {
                (Some(value), _) => {
                    map.insert(item.key.clone(), value.clone().into_value());
                }
                (None, UsageValueType::SubTree) => {
                    map.insert(item.key.clone(), Value::Object(ValueMap::new()));
                }
                (None, _) => {}
            }
        }
        map
    }

    /// Build a tree from a map, inferring each item's type from its value
    pub fn from_value_map(name: &str, map: &ValueMap) -> Self {
        Self::with_items(
            name,
            map.iter()
                .map(|(key, value)| {
                    UsageItem::with_value(key.clone(), UsageValue::infer(key, value))
                })
                .collect(),
        )
    }

    /// Recursively turn every value into a default
    pub fn demote_to_defaults(&mut self) {
        for item in &mut self.items {
            item.demote_to_default();
        }
    }
}

impl<'a> IntoIterator for &'a UsageTree {
    type Item = &'a UsageItem;
    type IntoIter = std::slice::Iter<'a, UsageItem>;

    fn into_iter(self) -> Self::IntoIter {
        self.items.iter()
    }
}
