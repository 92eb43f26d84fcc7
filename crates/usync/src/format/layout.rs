//! format independent render plan
//!
//! Decides what gets written and whether it is active. The back ends only decide how.
use crate::usage_tree::{UsageItem, UsageTree, UsageValue};

/// One key of the rendered document
#[derive(Debug, PartialEq)]
pub(crate) struct Entry {
    pub key: String,
    /// Explicitly set. Inactive entries are written as comments.
    pub active: bool,
    pub description: Option<String>,
    pub body: Body,
}

#[derive(Debug, PartialEq)]
pub(crate) enum Body {
    Int(i64),
    Float(f64),
    Bool(bool),
    String(String),
    Array(Vec<String>),
    Map(Vec<Entry>),
    /// Neither value nor default, only the key is shown
    Missing,
}

/// Entries of one document section, empty trees are skipped
pub(crate) fn section(trees: &[UsageTree]) -> Vec<Entry> {
    trees
        .iter()
        .filter(|tree| !tree.is_empty())
        .map(|tree| Entry {
            key: tree.name.clone(),
            active: tree.has_active_items(),
            description: None,
            body: Body::Map(tree.iter().map(item_entry).collect()),
        })
        .collect()
}

fn item_entry(item: &UsageItem) -> Entry {
    let default_tree = item.default_value.as_ref().and_then(UsageValue::as_sub_tree);

    let body = match (&item.value, &item.default_value) {
        (Some(UsageValue::SubTree(value)), _) => Body::Map(filled(value, default_tree)),
        (Some(value), _) => scalar(value),
        (None, Some(UsageValue::SubTree(default))) => Body::Map(filled(default, None)),
        (None, Some(default)) => scalar(default),
        (None, None) => Body::Missing,
    };

    Entry {
        key: item.key.clone(),
        active: item.is_active(),
        description: item.description.as_deref().map(single_line),
        body,
    }
}

/// Entries of `value`, completed with the default-only items of `default`
///
/// Default items come first and keep the default order, items only known to `value` follow.
fn filled(value: &UsageTree, default: Option<&UsageTree>) -> Vec<Entry> {
    let Some(default) = default else {
        return value.iter().map(item_entry).collect();
    };

    let mut entries: Vec<Entry> = default
        .iter()
        .map(|default_item| item_entry(value.get(&default_item.key).unwrap_or(default_item)))
        .collect();

    entries.extend(
        value
            .iter()
            .filter(|item| !default.contains(&item.key))
            .map(item_entry),
    );

    entries
}

fn scalar(value: &UsageValue) -> Body {
    match value {
        UsageValue::Int64(int) => Body::Int(*int),
        UsageValue::Float64(float) => Body::Float(*float),
        UsageValue::String(s) => Body::String(s.clone()),
        UsageValue::StringArray(strings) => Body::Array(strings.clone()),
        UsageValue::Bool(b) => Body::Bool(*b),
        UsageValue::SubTree(tree) => Body::Map(filled(tree, None)),
    }
}

fn single_line(description: &str) -> String {
    description.lines().map(str::trim).collect::<Vec<_>>().join(" ")
}

/// Float literal that always reads back as a float
///
/// Whole numbers get a `.0` so `50.0` doesn't turn into the integer `50`.
pub(crate) fn float_literal(float: f64) -> String {
    let literal = float.to_string();
    if literal.contains(['.', 'e', 'E']) || !float.is_finite() {
        literal
    } else {
        format!("{literal}.0")
    }
}
