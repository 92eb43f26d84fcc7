//! document formats of the usage file
//!
//! A usage file is written in one of two formats, both behind [DocumentFormat]:
//! - [yaml::YamlFormat] (default)
//! - [hcl::HclFormat] (files ending in `.hcl`)
//!
//! What gets written is decided once in [layout]; the back ends only decide the syntax.
//! Inactive entries are written as comments so they stay visible to humans but are invisible
//! to the parser. Descriptions are trailing line comments and are recovered by [comments].
mod comments;
pub mod hcl;
mod layout;
pub mod yaml;

use crate::usage_file::UsageFile;
use crate::usage_tree::UsageTree;
use crate::value::{Value, ValueError, ValueMap};
use std::path::Path;

pub const VERSION_KEY: &str = "version";
pub const RESOURCE_USAGE_KEY: &str = "resource_usage";
pub const RESOURCE_TYPE_USAGE_KEY: &str = "resource_type_default_usage";

/// Narrow interface between the usage model and a concrete syntax
pub trait DocumentFormat {
    fn render(&self, usage_file: &UsageFile) -> String;

    /// Parse a document
    ///
    /// The version is returned as found; checking it is up to the caller.
    fn parse(&self, text: &str) -> Result<UsageFile, ParseError>;
}

#[derive(clap::ValueEnum, Clone, Copy, Default, Debug, PartialEq, Eq)]
pub enum Format {
    #[default]
    Yaml,
    Hcl,
}

impl Format {
    /// Format by file extension, anything but `.hcl` is yaml
    pub fn from_path(path: &Path) -> Self {
        match path.extension().and_then(|extension| extension.to_str()) {
            Some(extension) if extension.eq_ignore_ascii_case("hcl") => Format::Hcl,
            _ => Format::Yaml,
        }
    }

    pub fn codec(self) -> &'static dyn DocumentFormat {
        match self {
            Format::Yaml => &yaml::YamlFormat,
            Format::Hcl => &hcl::HclFormat,
        }
    }
}

impl std::fmt::Display for Format {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Format::Yaml => f.write_str("yaml"),
            Format::Hcl => f.write_str("hcl"),
        }
    }
}

/// Build a usage file from the generic form of a parsed document
///
/// `comments` provides the descriptions of the items.
fn usage_file_from_document(
    mut document: ValueMap,
    comments: &comments::LineComments,
) -> Result<UsageFile, ParseError> {
    let version = document
        .shift_remove(VERSION_KEY)
        .and_then(|version| version.as_string())
        .unwrap_or_default();

    let resource_type_usages = section(&mut document, RESOURCE_TYPE_USAGE_KEY, comments)?;
    let resource_usages = section(&mut document, RESOURCE_USAGE_KEY, comments)?;

    for key in document.keys() {
        tracing::warn!(%key, "ignoring unknown key in usage file");
    }

    Ok(UsageFile {
        version,
        resource_type_usages,
        resource_usages,
    })
}

fn section(
    document: &mut ValueMap,
    key: &str,
    comments: &comments::LineComments,
) -> Result<Vec<UsageTree>, ParseError> {
    let Some(section) = document.shift_remove(key) else {
        return Ok(vec![]);
    };
    let Value::Object(entries) = section else {
        return Err(ParseError::NotAMapping(key.to_string()));
    };

    let mut trees = Vec::with_capacity(entries.len());
    for (name, usage) in entries {
        let Value::Object(usage) = usage else {
            return Err(ParseError::NotAMapping(format!("{key}.{name}")));
        };
        trees.push(UsageTree::from_value_map(&name, &usage));
    }

    comments.describe(key, &mut trees);
    Ok(trees)
}

#[derive(thiserror::Error, Debug)]
pub enum ParseError {
    #[error("Unable to parse yaml document")]
    Yaml(#[from] serde_yaml::Error),
    #[error("Unable to parse hcl document")]
    Hcl(#[from] hcl_edit::parser::Error),
    #[error("Unable to evaluate `{key}`")]
    HclEval {
        key: String,
        #[source]
        source: ::hcl::eval::Error,
    },
    #[error("Unsupported value")]
    Value(#[from] ValueError),
    #[error("`{0}` must be a mapping")]
    NotAMapping(String),
    #[error("Unknown block type `{0}`")]
    UnknownBlock(String),
    #[error("Block `{ident}` requires {expected} label(s)")]
    BlockLabels { ident: String, expected: usize },
}
