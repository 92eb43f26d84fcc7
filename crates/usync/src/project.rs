//! file declared projects
//!
//! Stands in for an infrastructure-as-code parser: a yaml file lists the resources, their usage
//! schema and optionally values that were fetched ahead of time (telemetry exports, billing
//! reports). Those values are handed out through the regular estimation interface.
//!
//! ```yaml
//! env:
//!   region: eu-west-1
//! resources:
//!   - name: aws_s3_bucket.b
//!     usage_schema:
//!       - key: standard
//!         type: sub_tree
//!         items:
//!           - key: storage_gb
//!             type: float64
//!             default: 0
//!             description: Total storage in GB.
//!     estimates:
//!       standard:
//!         storage_gb: 72.4
//! ```
use crate::estimate::{EstimateUsage, EstimationContext, Resource};
use crate::reference::resource_type;
use crate::usage_tree::{UsageItem, UsageTree, UsageValue, UsageValueType};
use crate::value::{Value, ValueError, ValueMap};
use async_trait::async_trait;
use indexmap::IndexMap;
use std::collections::BTreeMap;
use std::path::Path;

#[derive(Debug, serde::Deserialize)]
#[serde(deny_unknown_fields)]
struct ProjectDocument {
    #[serde(default)]
    env: BTreeMap<String, String>,
    #[serde(default)]
    resources: Vec<ResourceEntry>,
}

#[derive(Debug, serde::Deserialize)]
#[serde(deny_unknown_fields)]
struct ResourceEntry {
    name: String,
    /// Derived from the name when missing
    #[serde(rename = "type", default)]
    resource_type: Option<String>,
    #[serde(default)]
    usage_schema: Vec<SchemaEntry>,
    #[serde(default)]
    estimates: Option<serde_yaml::Value>,
}

#[derive(Debug, serde::Deserialize)]
#[serde(deny_unknown_fields)]
struct SchemaEntry {
    key: String,
    #[serde(rename = "type")]
    value_type: UsageValueType,
    #[serde(default)]
    default: Option<serde_yaml::Value>,
    #[serde(default)]
    description: Option<String>,
    /// Items of a `sub_tree`
    #[serde(default)]
    items: Vec<SchemaEntry>,
}

/// Resources of one project plus its estimation settings
pub struct Project {
    pub env: IndexMap<String, String>,
    pub resources: Vec<Box<dyn Resource>>,
}

impl Project {
    pub fn load(path: &Path) -> Result<Self, ProjectError> {
        tracing::info!(path=%path.display(), "loading project");
        Self::parse(&std::fs::read_to_string(path)?)
    }

    pub fn parse(text: &str) -> Result<Self, ProjectError> {
        let document: ProjectDocument = serde_yaml::from_str(text)?;

        let mut resources: Vec<Box<dyn Resource>> = Vec::with_capacity(document.resources.len());
        for resource in document.resources {
            resources.push(Box::new(ProjectResource::try_from(resource)?));
        }

        Ok(Self {
            env: document.env.into_iter().collect(),
            resources,
        })
    }

    /// `ctx` with the project's env added, entries already in `ctx` win
    pub fn estimation_context(&self, ctx: &EstimationContext) -> EstimationContext {
        let mut env = self.env.clone();
        env.extend(ctx.env.clone());

        EstimationContext {
            timeout: ctx.timeout,
            env,
        }
    }
}

/// A resource as declared in a project file
#[derive(Debug, Clone, PartialEq)]
pub struct ProjectResource {
    pub name: String,
    pub resource_type: String,
    pub usage_schema: Vec<UsageItem>,
    pub estimator: Option<StaticEstimator>,
}

impl TryFrom<ResourceEntry> for ProjectResource {
    type Error = ProjectError;

    fn try_from(entry: ResourceEntry) -> Result<Self, Self::Error> {
        let resource_type = entry
            .resource_type
            .unwrap_or_else(|| resource_type(&entry.name).to_string());

        let usage_schema = entry
            .usage_schema
            .into_iter()
            .map(schema_item)
            .collect::<Result<Vec<_>, _>>()?;

        let estimator = match entry.estimates {
            None => None,
            Some(estimates) => match Value::from_yaml(estimates)? {
                None => None,
                Some(Value::Object(values)) => Some(StaticEstimator::new(values)),
                Some(_) => return Err(ProjectError::EstimatesNotAMapping(entry.name)),
            },
        };

        Ok(Self {
            name: entry.name,
            resource_type,
            usage_schema,
            estimator,
        })
    }
}

fn schema_item(entry: SchemaEntry) -> Result<UsageItem, ProjectError> {
    let mut item = UsageItem::new(entry.key, entry.value_type);
    item.description = entry.description;

    if entry.value_type == UsageValueType::SubTree {
        let items = entry
            .items
            .into_iter()
            .map(schema_item)
            .collect::<Result<Vec<_>, _>>()?;
        item.default_value = Some(UsageValue::SubTree(UsageTree::with_items(
            item.key.clone(),
            items,
        )));
        return Ok(item);
    }

    if let Some(default) = entry.default {
        if let Some(default) = Value::from_yaml(default)? {
            item.default_value = Some(
                UsageValue::decode_as(&item.key, &default, entry.value_type).ok_or_else(|| {
                    ProjectError::InvalidDefault {
                        key: item.key.clone(),
                        value_type: entry.value_type,
                    }
                })?,
            );
        }
    }

    Ok(item)
}

impl Resource for ProjectResource {
    fn name(&self) -> &str {
        &self.name
    }

    fn resource_type(&self) -> &str {
        &self.resource_type
    }

    fn usage_schema(&self) -> Vec<UsageItem> {
        self.usage_schema.clone()
    }

    fn estimator(&self) -> Option<&dyn EstimateUsage> {
        self.estimator.as_ref().map(|estimator| estimator as &dyn EstimateUsage)
    }
}

/// Hands out values known in advance
#[derive(Debug, Clone, PartialEq, derive_new::new)]
pub struct StaticEstimator {
    values: ValueMap,
}

#[async_trait]
impl EstimateUsage for StaticEstimator {
    async fn estimate_usage(
        &self,
        _ctx: &EstimationContext,
        values: &mut ValueMap,
    ) -> anyhow::Result<()> {
        merge_values(values, &self.values);
        Ok(())
    }
}

/// Deep merge, maps are merged key by key and everything else is replaced
fn merge_values(dest: &mut ValueMap, src: &ValueMap) {
    for (key, value) in src {
        match (dest.get_mut(key), value) {
            (Some(Value::Object(dest_object)), Value::Object(src_object)) => {
                merge_values(dest_object, src_object)
            }
            _ => {
                dest.insert(key.clone(), value.clone());
            }
        }
    }
}

#[derive(thiserror::Error, Debug)]
pub enum ProjectError {
    #[error("IO error")]
    IoError(#[from] std::io::Error),
    #[error("Unable to parse project file")]
    ParseFailed(#[from] serde_yaml::Error),
    #[error("Unsupported value")]
    Value(#[from] ValueError),
    #[error("Default of `{key}` is not a valid {value_type}")]
    InvalidDefault {
        key: String,
        value_type: UsageValueType,
    },
    #[error("Estimates of `{0}` must be a mapping")]
    EstimatesNotAMapping(String),
}

#[cfg(test)]
mod test {
    use super::*;
    use pretty_assertions::assert_eq;

    const PROJECT: &str = r#"
env:
  region: eu-west-1
resources:
  - name: module.storage.aws_s3_bucket.b
    usage_schema:
      - key: standard
        type: sub_tree
        items:
          - key: storage_gb
            type: float64
            default: 0
            description: Total storage in GB.
      - key: object_tags
        type: int64
    estimates:
      standard:
        storage_gb: 72.4
  - name: aws_lambda_function.f
    type: aws_lambda_function
"#;

    #[test]
    fn parses_resources() {
        let project = Project::parse(PROJECT).expect("valid project");

        assert_eq!(project.env.get("region").map(String::as_str), Some("eu-west-1"));
        assert_eq!(project.resources.len(), 2);

        let bucket = &project.resources[0];
        assert_eq!(bucket.name(), "module.storage.aws_s3_bucket.b");
        assert_eq!(bucket.resource_type(), "aws_s3_bucket");
        assert!(bucket.estimator().is_some());

        let schema = bucket.usage_schema();
        assert_eq!(schema.len(), 2);
        let storage = schema[0]
            .default_value
            .as_ref()
            .and_then(UsageValue::as_sub_tree)
            .and_then(|standard| standard.get("storage_gb"))
            .expect("storage_gb");
        assert_eq!(storage.default_value, Some(UsageValue::Float64(0.0)));
        assert_eq!(storage.description.as_deref(), Some("Total storage in GB."));
        assert_eq!(schema[1].value_type, UsageValueType::Int64);
        assert_eq!(schema[1].default_value, None);

        assert!(project.resources[1].estimator().is_none());
    }

    #[test]
    fn rejects_bad_defaults() {
        let err = Project::parse(
            r#"
resources:
  - name: aws_lambda_function.f
    usage_schema:
      - key: monthly_requests
        type: int64
        default: lots
"#,
        )
        .err()
        .expect("invalid default");

        assert!(matches!(
            err,
            ProjectError::InvalidDefault { key, value_type: UsageValueType::Int64 }
                if key == "monthly_requests"
        ));
    }

    #[test]
    fn rejects_unknown_fields() {
        let err = Project::parse("resources:\n  - name: a.b\n    schema: []\n")
            .err()
            .expect("unknown field");
        assert!(matches!(err, ProjectError::ParseFailed(_)));
    }

    #[tokio::test]
    async fn static_estimates_merge_deep() {
        let mut estimates = ValueMap::new();
        estimates.insert(
            "standard".into(),
            Value::Object(ValueMap::from_iter([(
                "storage_gb".to_string(),
                Value::Decimal(72.4),
            )])),
        );
        let estimator = StaticEstimator::new(estimates);

        let mut values = ValueMap::from_iter([
            ("object_tags".to_string(), Value::Integer(3)),
            (
                "standard".to_string(),
                Value::Object(ValueMap::from_iter([(
                    "monthly_tier_1_requests".to_string(),
                    Value::Integer(10),
                )])),
            ),
        ]);

        estimator
            .estimate_usage(&EstimationContext::default(), &mut values)
            .await
            .expect("static estimates never fail");

        let standard = values["standard"].as_object().expect("map");
        assert_eq!(standard["monthly_tier_1_requests"], Value::Integer(10));
        assert_eq!(standard["storage_gb"], Value::Decimal(72.4));
        assert_eq!(values["object_tags"], Value::Integer(3));
    }

    #[test]
    fn cli_env_wins_over_project_env() {
        let project = Project::parse(PROJECT).expect("valid project");
        let ctx = EstimationContext::default().with_env("region", "us-east-1");

        let ctx = project.estimation_context(&ctx);

        assert_eq!(ctx.env("region"), Some("us-east-1"));
    }
}
