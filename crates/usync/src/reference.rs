//! reference catalog of usage shapes
//!
//! The catalog lists, per resource type, every usage key with its default and description. It
//! is a regular (yaml) usage file keyed by resource type instead of address. Everything in it
//! is a default, values never leak into a synced file as explicit values.
use crate::format::Format;
use crate::usage_file::{LoadError, UsageFile};
use crate::usage_tree::UsageTree;
use std::path::Path;

const BUNDLED: &str = include_str!("../reference/usage-reference.yml");

#[derive(Debug, Clone, Default, PartialEq)]
pub struct ReferenceCatalog {
    resource_types: Vec<UsageTree>,
}

impl ReferenceCatalog {
    /// Catalog shipped with this crate
    pub fn bundled() -> Result<Self, LoadError> {
        Self::parse(BUNDLED)
    }

    pub fn load(path: &Path) -> Result<Self, LoadError> {
        tracing::info!(path=%path.display(), "loading reference catalog");
        Self::parse(&std::fs::read_to_string(path)?)
    }

    pub fn parse(text: &str) -> Result<Self, LoadError> {
        let usage_file = UsageFile::parse(text, Format::Yaml)?;

        let mut resource_types = usage_file.resource_usages;
        for tree in &mut resource_types {
            tree.demote_to_defaults();
        }

        tracing::debug!(resource_types = resource_types.len(), "reference catalog");
        Ok(Self { resource_types })
    }

    pub fn find_type(&self, resource_type: &str) -> Option<&UsageTree> {
        self.resource_types
            .iter()
            .find(|tree| tree.name == resource_type)
    }

    /// Shape for the type of a resource address
    pub fn find_for_address(&self, address: &str) -> Option<&UsageTree> {
        self.find_type(resource_type(address))
    }

    pub fn resource_types(&self) -> impl Iterator<Item = &str> {
        self.resource_types.iter().map(|tree| tree.name.as_str())
    }
}

/// Resource type of an address
///
/// `module.app.aws_s3_bucket.b["x"]` -> `aws_s3_bucket`
pub fn resource_type(address: &str) -> &str {
    let address = strip_index(address);
    let mut segments = address.rsplit('.');
    let name = segments.next();
    match (name, segments.next()) {
        (Some(_), Some(resource_type)) => resource_type,
        _ => address,
    }
}

/// Address without its trailing `[...]` index
pub fn strip_index(address: &str) -> &str {
    if !address.ends_with(']') {
        return address;
    }

    match address.rfind('[') {
        Some(open) => &address[..open],
        None => address,
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::usage_tree::UsageValue;
    use pretty_assertions::assert_eq;

    #[test]
    fn resource_types_of_addresses() {
        assert_eq!(resource_type("aws_s3_bucket.b"), "aws_s3_bucket");
        assert_eq!(resource_type("aws_s3_bucket.b[0]"), "aws_s3_bucket");
        assert_eq!(resource_type("aws_s3_bucket.b[*]"), "aws_s3_bucket");
        assert_eq!(resource_type("module.app.aws_lambda_function.f"), "aws_lambda_function");
        assert_eq!(resource_type("data.aws_iam_policy.p"), "aws_iam_policy");
        assert_eq!(resource_type("aws_s3_bucket"), "aws_s3_bucket");
    }

    #[test]
    fn bundled_catalog_only_has_defaults() {
        let catalog = ReferenceCatalog::bundled().expect("bundled catalog is valid");

        let lambda = catalog
            .find_for_address("module.app.aws_lambda_function.f[0]")
            .expect("lambda is in the catalog");
        let monthly_requests = lambda.get("monthly_requests").expect("item");
        assert_eq!(monthly_requests.value, None);
        assert_eq!(monthly_requests.default_value, Some(UsageValue::Int64(0)));
        assert_eq!(
            monthly_requests.description.as_deref(),
            Some("Monthly requests to the Lambda function.")
        );

        let standard = catalog
            .find_type("aws_s3_bucket")
            .and_then(|tree| tree.get("standard"))
            .expect("standard storage class");
        assert_eq!(standard.value, None);
        let storage = standard
            .default_value
            .as_ref()
            .and_then(UsageValue::as_sub_tree)
            .and_then(|tree| tree.get("storage_gb"))
            .expect("storage_gb");
        assert_eq!(storage.default_value, Some(UsageValue::Float64(0.0)));
        assert!(!catalog.find_type("aws_s3_bucket").expect("bucket").has_active_items());
    }
}
