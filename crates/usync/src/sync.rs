//! synchronization of a usage file with a set of resources
//!
//! Every resource gets a fresh tree built from its sources, lowest precedence first:
//! 1. the reference catalog entry of its type
//! 2. its own usage schema (decides the item types)
//! 3. the existing entry of the usage file
//! 4. estimated values
//!
//! Entries of the usage file that don't belong to any resource are dropped, except for
//! wildcard entries (`aws_lambda_function.f[*]`) of counted resources.
use crate::estimate::{self, EstimationContext, EstimationError, Resource};
use crate::format::Format;
use crate::merge::{fold, overlay_estimates, FoldOptions};
use crate::reference::{strip_index, ReferenceCatalog};
use crate::usage_file::{LoadError, UsageFile};
use crate::usage_tree::UsageTree;
use crate::value::{Value, ValueMap};
use futures::StreamExt;
use indexmap::IndexMap;
use std::collections::{HashMap, HashSet};
use std::path::Path;

#[derive(Debug, Default)]
pub struct SyncResult {
    pub resource_count: usize,
    pub estimation_count: usize,
    /// Failed estimations by resource name
    pub estimation_errors: IndexMap<String, EstimationError>,
}

impl SyncResult {
    pub fn merge(&mut self, other: SyncResult) {
        self.resource_count += other.resource_count;
        self.estimation_count += other.estimation_count;
        self.estimation_errors.extend(other.estimation_errors);
    }

    /// Report for humans and machines
    pub fn summary(&self) -> Value {
        let errors: ValueMap = self
            .estimation_errors
            .iter()
            .map(|(name, error)| (name.clone(), Value::String(error_chain(error))))
            .collect();

        let mut summary = ValueMap::new();
        summary.insert("resources".into(), Value::Integer(self.resource_count as i64));
        summary.insert("estimations".into(), Value::Integer(self.estimation_count as i64));
        summary.insert("estimation_errors".into(), Value::Object(errors));
        Value::Object(summary)
    }
}

fn error_chain(error: &dyn std::error::Error) -> String {
    let mut message = error.to_string();
    let mut source = error.source();
    while let Some(cause) = source {
        message.push_str(": ");
        message.push_str(&cause.to_string());
        source = cause.source();
    }
    message
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SyncOptions {
    /// Resources synced at the same time
    pub concurrency: usize,
}

impl Default for SyncOptions {
    fn default() -> Self {
        let cpus = std::thread::available_parallelism().map_or(1, usize::from);
        Self {
            concurrency: (cpus * 4).clamp(4, 16),
        }
    }
}

/// Load (or create), synchronize and write back a usage file
pub async fn sync_usage_file(
    path: &Path,
    format: Format,
    resources: &[Box<dyn Resource>],
    reference: &ReferenceCatalog,
    ctx: &EstimationContext,
    options: SyncOptions,
) -> Result<SyncResult, LoadError> {
    let mut usage_file = UsageFile::load_or_create(path, format)?;

    let result = sync_usage_data(&mut usage_file, resources, reference, ctx, options).await;

    usage_file.write_to_path(path, format)?;
    Ok(result)
}

/// Replace the trees of `usage_file` with synchronized trees for `resources`
pub async fn sync_usage_data(
    usage_file: &mut UsageFile,
    resources: &[Box<dyn Resource>],
    reference: &ReferenceCatalog,
    ctx: &EstimationContext,
    options: SyncOptions,
) -> SyncResult {
    let existing_trees = std::mem::take(&mut usage_file.resource_usages);
    let existing_type_trees = std::mem::take(&mut usage_file.resource_type_usages);

    let existing = by_name(&existing_trees);
    let existing_types = by_name(&existing_type_trees);

    // resource type defaults, one tree per distinct type
    let mut types: IndexMap<&str, &dyn Resource> = IndexMap::new();
    for resource in resources {
        types
            .entry(resource.resource_type())
            .or_insert(resource.as_ref());
    }
    let mut type_trees: Vec<UsageTree> = types
        .values()
        .map(|resource| sync_resource_type(*resource, reference, &existing_types))
        .collect();
    sort_resource_usages(&mut type_trees, &names(&existing_type_trees));
    usage_file.resource_type_usages = type_trees;

    let mut trees = sync_wildcards(resources, reference, &existing);

    let mut results: Vec<(usize, UsageTree, SyncResult)> =
        futures::stream::iter(resources.iter().enumerate())
            .map(|(index, resource)| {
                let existing = &existing;
                async move {
                    let (tree, result) =
                        sync_resource(resource.as_ref(), reference, existing, ctx).await;
                    (index, tree, result)
                }
            })
            .buffer_unordered(options.concurrency.max(1))
            .collect()
            .await;
    results.sort_by_key(|(index, _, _)| *index);

    let mut sync_result = SyncResult::default();
    for (_, tree, result) in results {
        trees.push(tree);
        sync_result.merge(result);
    }

    sort_resource_usages(&mut trees, &names(&existing_trees));
    usage_file.resource_usages = trees;

    tracing::info!(
        resources = sync_result.resource_count,
        estimations = sync_result.estimation_count,
        errors = sync_result.estimation_errors.len(),
        "synchronized usage"
    );
    sync_result
}

fn by_name(trees: &[UsageTree]) -> HashMap<&str, &UsageTree> {
    trees.iter().map(|tree| (tree.name.as_str(), tree)).collect()
}

fn names(trees: &[UsageTree]) -> Vec<String> {
    trees.iter().map(|tree| tree.name.clone()).collect()
}

/// Reference, schema and existing layers of one tree
fn fold_layers(
    tree: &mut UsageTree,
    reference: Option<&UsageTree>,
    resource: &dyn Resource,
    existing: Option<&UsageTree>,
) {
    if let Some(reference) = reference {
        fold(tree, reference, FoldOptions::default());
    }

    let schema = UsageTree::with_items(tree.name.clone(), resource.usage_schema());
    fold(tree, &schema, FoldOptions::override_value_type());

    if let Some(existing) = existing {
        fold(tree, existing, FoldOptions::default());
    }
}

async fn sync_resource(
    resource: &dyn Resource,
    reference: &ReferenceCatalog,
    existing: &HashMap<&str, &UsageTree>,
    ctx: &EstimationContext,
) -> (UsageTree, SyncResult) {
    let name = resource.name();
    let mut tree = UsageTree::new(name.to_string());
    fold_layers(
        &mut tree,
        reference.find_for_address(name),
        resource,
        existing.get(name).copied(),
    );

    let mut result = SyncResult {
        resource_count: 1,
        ..Default::default()
    };

    let Some(estimator) = resource.estimator() else {
        return (tree, result);
    };

    result.estimation_count = 1;
    match estimate::estimate(estimator, ctx, &tree).await {
        Ok(estimated) => overlay_estimates(&mut tree, &estimated),
        Err(e) => {
            tracing::warn!(resource=%name, error=%error_chain(&e), "unable to estimate usage");
            result.estimation_errors.insert(name.to_string(), e);
        }
    }

    (tree, result)
}

fn sync_resource_type(
    resource: &dyn Resource,
    reference: &ReferenceCatalog,
    existing: &HashMap<&str, &UsageTree>,
) -> UsageTree {
    let resource_type = resource.resource_type();
    let mut tree = UsageTree::new(resource_type.to_string());
    fold_layers(
        &mut tree,
        reference.find_type(resource_type),
        resource,
        existing.get(resource_type).copied(),
    );
    tree
}

/// Refresh the `name[*]` entries that already exist for counted resources
fn sync_wildcards(
    resources: &[Box<dyn Resource>],
    reference: &ReferenceCatalog,
    existing: &HashMap<&str, &UsageTree>,
) -> Vec<UsageTree> {
    let mut seen = HashSet::new();
    let mut trees = vec![];

    for resource in resources {
        let name = resource.name();
        if !name.ends_with(']') {
            continue;
        }

        let wildcard = format!("{}[*]", strip_index(name));
        if !seen.insert(wildcard.clone()) {
            continue;
        }
        let Some(existing_tree) = existing.get(wildcard.as_str()).copied() else {
            continue;
        };

        tracing::debug!(%wildcard, "refreshing wildcard usage");
        let mut tree = UsageTree::new(wildcard);
        fold_layers(
            &mut tree,
            reference.find_for_address(name),
            resource.as_ref(),
            Some(existing_tree),
        );
        trees.push(tree);
    }

    trees
}

/// Order trees for writing
///
/// - trees that were in the file keep their order
/// - members of counted resources (`name[N]`) follow the last sibling found in the file
/// - new trees with values come before new trees without
/// - everything else by name
pub fn sort_resource_usages(trees: &mut [UsageTree], existing_order: &[String]) {
    trees.sort_by_cached_key(|tree| sort_key(tree, existing_order));
}

fn sort_key(tree: &UsageTree, existing_order: &[String]) -> (u8, usize, u8, String) {
    let name = tree.name.clone();

    if let Some(position) = existing_order.iter().position(|existing| *existing == tree.name) {
        return (0, position, 0, name);
    }

    if let Some(position) = sibling_position(&tree.name, existing_order) {
        return (0, position, 1, name);
    }

    let has_value = tree.iter().any(|item| item.value.is_some());
    (1, 0, u8::from(!has_value), name)
}

/// Position of the last entry sharing the `name[` prefix of a counted resource
fn sibling_position(name: &str, existing_order: &[String]) -> Option<usize> {
    if !name.ends_with(']') {
        return None;
    }

    let prefix = &name[..=name.rfind('[')?];
    existing_order
        .iter()
        .rposition(|existing| existing.starts_with(prefix))
}
