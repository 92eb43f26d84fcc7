//! resources and usage estimation
//!
//! A [Resource] declares the usage it understands ([Resource::usage_schema]) and may come with
//! an [EstimateUsage] implementation that fills in values from live data (cloud APIs, metrics).
//!
//! Estimation gets the flattened current values of the resource and changes them in place.
//! Everything it needs beyond that is passed in [EstimationContext]; nothing is read from the
//! environment.
use crate::usage_tree::{UsageItem, UsageTree};
use crate::value::ValueMap;
use async_trait::async_trait;
use indexmap::IndexMap;
use std::time::Duration;

pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);

/// Settings handed to every estimation call
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EstimationContext {
    /// Upper bound of a single call
    pub timeout: Duration,
    /// Project level settings (region, credentials profile names, ...)
    pub env: IndexMap<String, String>,
}

impl Default for EstimationContext {
    fn default() -> Self {
        Self {
            timeout: DEFAULT_TIMEOUT,
            env: IndexMap::new(),
        }
    }
}

impl EstimationContext {
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn with_env(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.env.insert(key.into(), value.into());
        self
    }

    pub fn env(&self, key: &str) -> Option<&str> {
        self.env.get(key).map(String::as_str)
    }
}

#[async_trait]
pub trait EstimateUsage: Send + Sync {
    /// Fill in estimated values
    ///
    /// `values` holds the explicitly set values; unset sub trees are empty maps. Keys left in
    /// the map after the call are applied on top of every other source. An error leaves the
    /// resource with its non-estimated values.
    async fn estimate_usage(
        &self,
        ctx: &EstimationContext,
        values: &mut ValueMap,
    ) -> anyhow::Result<()>;
}

/// A resource taking part in a synchronization
pub trait Resource: Send + Sync {
    /// Full address, `module.app.aws_s3_bucket.b[0]`
    fn name(&self) -> &str;

    fn resource_type(&self) -> &str;

    /// Items this resource understands, their types are authoritative
    fn usage_schema(&self) -> Vec<UsageItem>;

    fn estimator(&self) -> Option<&dyn EstimateUsage> {
        None
    }
}

#[derive(thiserror::Error, Debug)]
pub enum EstimationError {
    #[error("Estimation failed")]
    Failed(#[source] anyhow::Error),
    #[error("Estimation timed out after {0:?}")]
    TimedOut(Duration),
}

/// Run `estimator` on the values of `tree`
///
/// Returns the map as left behind by the estimator.
pub async fn estimate(
    estimator: &dyn EstimateUsage,
    ctx: &EstimationContext,
    tree: &UsageTree,
) -> Result<ValueMap, EstimationError> {
    let mut values = tree.to_value_map();

    match tokio::time::timeout(ctx.timeout, estimator.estimate_usage(ctx, &mut values)).await {
        Ok(Ok(())) => Ok(values),
        Ok(Err(e)) => Err(EstimationError::Failed(e)),
        Err(_) => Err(EstimationError::TimedOut(ctx.timeout)),
    }
}
