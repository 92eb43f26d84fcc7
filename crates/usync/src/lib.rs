//! # usync - usage file synchronization
//!
//! Cost estimates for infrastructure need assumptions that can't be read from the
//! infrastructure code: how many requests a function serves, how much data sits in a bucket.
//! These assumptions live in a human edited *usage file*. `usync` keeps that file in step with the
//! resources of a project.
//!
//! ## Introduction for developers
//!
//! ### Usage terms
//!
//! - a *resource* is addressed by name, `module.app.aws_s3_bucket.b[0]`
//! - its *resource type* is the second to last segment of the unindexed address, `aws_s3_bucket`
//! - a *usage item* is one named, typed assumption (`monthly_requests: int64`). It has an
//!   optional value and an optional default. Only items with a value are *active*.
//! - a *sub tree* item groups items (`standard: { storage_gb: ... }`)
//!
//! This is a valid (yaml) usage file:
//! ```yaml
//! version: 0.1
//! resource_usage:
//!   aws_lambda_function.f:
//!     monthly_requests: 100000 # Monthly requests to the Lambda function.
//!     # request_duration_ms: 0 # Average duration of each request in milliseconds.
//!   aws_s3_bucket.b:
//!     standard:
//!       storage_gb: 72.4 # Total storage in GB.
//! ```
//!
//! Inactive items are written as comments. That keeps every known key visible to the reader
//! while only explicit values count. Trailing comments are read back as descriptions.
//!
//! ### Loading files
//!
//! A document is parsed by its [format::Format] (yaml or hcl) into a [usage_file::UsageFile].
//! Each format goes through the same steps: text to [value::Value], value to
//! [usage_tree::UsageTree] (types are inferred), comments to descriptions. The version is
//! checked before anything else looks at the file.
//!
//! ### Synchronizing
//!
//! see [sync::sync_usage_data]
//!
//! Every resource gets a fresh tree. Sources are folded into it with [merge::fold], lowest
//! precedence first:
//!
//! | **source**                                    | **contributes**                         |
//! |-----------------------------------------------|-----------------------------------------|
//! | [reference::ReferenceCatalog]                 | keys, defaults and descriptions         |
//! | [estimate::Resource::usage_schema]            | authoritative item types                |
//! | the existing entry of the usage file          | values set by the user                  |
//! | [estimate::EstimateUsage::estimate_usage]     | values from live data                   |
//!
//! Estimations run concurrently and each is bound by a timeout. A failing estimation is
//! recorded in [sync::SyncResult] and leaves its resource with the values of the other sources.
//!
//! ### Output
//!
//! Trees are written back in a stable order: entries already in the file keep their position,
//! new entries follow. See [sync::sort_resource_usages].
//!
//! ### Extras
//!
//! - [tiers::calculate_tier_buckets] splits a quantity over pricing tiers
//! - [project::Project] declares resources in a file, for use without an infrastructure parser
pub mod estimate;
pub mod format;
pub mod merge;
pub mod project;
pub mod reference;
pub mod sync;
pub mod tiers;
pub mod usage_file;
pub mod usage_tree;
pub mod value;
