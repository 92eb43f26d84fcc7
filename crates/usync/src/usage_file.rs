//! the usage file
//!
//! A versioned, human edited document with two sections:
//! - `resource_usage`: usage per resource address (`module.app.aws_s3_bucket.b[0]`)
//! - `resource_type_default_usage`: usage per resource type (`aws_s3_bucket`), optional
//!
//! Only [MIN_VERSION] up to [MAX_VERSION] are understood. Anything else is rejected before any
//! resource is looked at.
use crate::format::{Format, ParseError};
use crate::reference::ReferenceCatalog;
use crate::usage_tree::{UsageItem, UsageTree, UsageValue};
use crate::value::ValueMap;
use indexmap::IndexMap;
use std::path::Path;

pub const MIN_VERSION: &str = "0.1";
pub const MAX_VERSION: &str = "0.1";

#[derive(Debug, Clone, PartialEq, Default)]
pub struct UsageFile {
    pub version: String,
    pub resource_type_usages: Vec<UsageTree>,
    pub resource_usages: Vec<UsageTree>,
}

impl UsageFile {
    /// Empty file of the latest version
    pub fn blank() -> Self {
        Self {
            version: MAX_VERSION.to_string(),
            ..Default::default()
        }
    }

    pub fn load(path: &Path, format: Format) -> Result<Self, LoadError> {
        tracing::info!(path=%path.display(), %format, "loading usage file");

        let text = std::fs::read_to_string(path)?;
        Self::parse(&text, format)
    }

    /// Load the file, a missing file is created blank
    pub fn load_or_create(path: &Path, format: Format) -> Result<Self, LoadError> {
        if path.exists() {
            return Self::load(path, format);
        }

        tracing::info!(path=%path.display(), "creating blank usage file");
        let usage_file = Self::blank();
        usage_file.write_to_path(path, format)?;
        Ok(usage_file)
    }

    /// Parse and check the version
    pub fn parse(text: &str, format: Format) -> Result<Self, LoadError> {
        let usage_file = format.codec().parse(text)?;
        usage_file.check_version()?;
        Ok(usage_file)
    }

    pub fn check_version(&self) -> Result<(), LoadError> {
        let supported = version_components(&self.version).is_some_and(|version| {
            version_components(MIN_VERSION).is_some_and(|min| version >= min)
                && version_components(MAX_VERSION).is_some_and(|max| version <= max)
        });

        if supported {
            Ok(())
        } else {
            Err(LoadError::InvalidVersion {
                found: self.version.clone(),
                min: MIN_VERSION,
                max: MAX_VERSION,
            })
        }
    }

    pub fn render(&self, format: Format) -> String {
        format.codec().render(self)
    }

    pub fn write_to_path(&self, path: &Path, format: Format) -> std::io::Result<()> {
        tracing::info!(path=%path.display(), %format, "writing usage file");
        std::fs::write(path, self.render(format))
    }

    pub fn find(&self, name: &str) -> Option<&UsageTree> {
        self.resource_usages.iter().find(|tree| tree.name == name)
    }

    pub fn find_resource_type(&self, resource_type: &str) -> Option<&UsageTree> {
        self.resource_type_usages
            .iter()
            .find(|tree| tree.name == resource_type)
    }

    /// Set values of every resource by address, the form cost calculations read usage in
    ///
    /// Type defaults are not applied, a sync has already folded them into the resources.
    pub fn to_usage_data_map(&self) -> IndexMap<String, ValueMap> {
        self.resource_usages
            .iter()
            .map(|tree| (tree.name.clone(), tree.to_value_map()))
            .collect()
    }

    /// Keys of `resource_usage` the reference catalog doesn't know, sorted and deduplicated
    ///
    /// Resources of a type missing from the catalog are not checked.
    pub fn invalid_keys(&self, reference: &ReferenceCatalog) -> Vec<String> {
        let mut invalid = vec![];

        for tree in &self.resource_usages {
            let Some(reference_tree) = reference.find_for_address(&tree.name) else {
                continue;
            };
            collect_invalid_keys(tree, reference_tree, &mut invalid);
        }

        invalid.sort();
        invalid.dedup();
        invalid
    }
}

fn collect_invalid_keys(tree: &UsageTree, reference: &UsageTree, invalid: &mut Vec<String>) {
    for item in tree {
        let Some(reference_item) = reference.get(&item.key) else {
            invalid.push(item.key.clone());
            continue;
        };

        if let (Some(UsageValue::SubTree(sub_tree)), Some(reference_sub_tree)) =
            (&item.value, reference_sub_tree(reference_item))
        {
            collect_invalid_keys(sub_tree, reference_sub_tree, invalid);
        }
    }
}

fn reference_sub_tree(item: &UsageItem) -> Option<&UsageTree> {
    item.effective_value().and_then(UsageValue::as_sub_tree)
}

/// `v0.1.2` -> `[0, 1, 2]`, trailing zeros are dropped so `0.1` and `0.1.0` compare equal
fn version_components(version: &str) -> Option<Vec<u64>> {
    let version = version.trim();
    let version = version.strip_prefix('v').unwrap_or(version);
    if version.is_empty() {
        return None;
    }

    let mut components = version
        .split('.')
        .map(|component| component.parse::<u64>().ok())
        .collect::<Option<Vec<_>>>()?;

    while components.last() == Some(&0) {
        components.pop();
    }

    Some(components)
}

#[derive(thiserror::Error, Debug)]
pub enum LoadError {
    #[error("IO error")]
    IoError(#[from] std::io::Error),
    #[error("Unable to parse usage file")]
    ParseFailed(#[from] ParseError),
    #[error("Invalid usage file version `{found}`. Supported versions are {min} ≤ x ≤ {max}")]
    InvalidVersion {
        found: String,
        min: &'static str,
        max: &'static str,
    },
}
