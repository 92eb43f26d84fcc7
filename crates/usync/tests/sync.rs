//! End to end synchronization
//!
//! A project file and an existing usage file go in, the rendered usage file comes out. A second
//! run over the written file must not change it.

use std::time::Duration;
use usync::estimate::EstimationContext;
use usync::format::Format;
use usync::project::Project;
use usync::reference::ReferenceCatalog;
use usync::sync::{sync_usage_data, sync_usage_file, SyncOptions};
use usync::usage_file::UsageFile;

const REFERENCE: &str = r#"version: 0.1
resource_usage:
  aws_s3_bucket:
    object_tags: 0 # Total object tags.
    standard:
      storage_gb: 0.0 # Total storage in GB.
  aws_lambda_function:
    monthly_requests: 0 # Monthly requests.
"#;

const PROJECT: &str = r#"
resources:
  - name: aws_s3_bucket.b
    estimates:
      standard:
        storage_gb: 72.4
  - name: aws_lambda_function.f
"#;

fn setup() -> (ReferenceCatalog, Project, EstimationContext) {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_env("USYNC_LOG"))
        .with_writer(std::io::stderr)
        .try_init();

    (
        ReferenceCatalog::parse(REFERENCE).expect("valid reference"),
        Project::parse(PROJECT).expect("valid project"),
        EstimationContext::default().with_timeout(Duration::from_secs(5)),
    )
}

#[tokio::test]
async fn yaml_sync_reaches_fixpoint() {
    let (reference, project, ctx) = setup();

    let mut usage_file = UsageFile::parse(
        r#"version: 0.1
resource_usage:
  aws_s3_bucket.b:
    standard:
      storage_gb: 50
  aws_s3_bucket.deleted:
    object_tags: 3
"#,
        Format::Yaml,
    )
    .expect("valid usage file");

    let result = sync_usage_data(
        &mut usage_file,
        &project.resources,
        &reference,
        &ctx,
        SyncOptions::default(),
    )
    .await;
    assert_eq!(result.resource_count, 2);
    assert_eq!(result.estimation_count, 1);
    assert!(result.estimation_errors.is_empty());

    let rendered = usage_file.render(Format::Yaml);
    insta::assert_snapshot!(rendered, @r###"
    version: 0.1
    # resource_type_default_usage:
      # aws_lambda_function:
      #   monthly_requests: 0 # Monthly requests.
      # aws_s3_bucket:
      #   object_tags: 0 # Total object tags.
      #   standard:
      #     storage_gb: 0.0 # Total storage in GB.
    resource_usage:
      aws_s3_bucket.b:
        # object_tags: 0 # Total object tags.
        standard:
          storage_gb: 72.4 # Total storage in GB.
      # aws_lambda_function.f:
      #   monthly_requests: 0 # Monthly requests.
    "###);

    let mut reloaded = UsageFile::parse(&rendered, Format::Yaml).expect("reads back");
    sync_usage_data(
        &mut reloaded,
        &project.resources,
        &reference,
        &ctx,
        SyncOptions::default(),
    )
    .await;
    pretty_assertions::assert_eq!(reloaded.render(Format::Yaml), rendered);
}

#[tokio::test]
async fn hcl_file_is_created_and_synced() {
    let (reference, project, ctx) = setup();
    let dir = tempfile::tempdir().expect("temp dir");
    let path = dir.path().join("infracost-usage.hcl");

    let result = sync_usage_file(
        &path,
        Format::from_path(&path),
        &project.resources,
        &reference,
        &ctx,
        SyncOptions { concurrency: 1 },
    )
    .await
    .expect("synced");
    assert_eq!(result.resource_count, 2);

    let written = std::fs::read_to_string(&path).expect("written");
    insta::assert_snapshot!(written, @r###"
    version = "0.1"

    # resource_type_default_usage "aws_lambda_function" {
    #   monthly_requests = 0 # Monthly requests.
    # }

    # resource_type_default_usage "aws_s3_bucket" {
    #   object_tags = 0 # Total object tags.
    #   standard {
    #     storage_gb = 0.0 # Total storage in GB.
    #   }
    # }

    resource_usage "aws_s3_bucket.b" {
      # object_tags = 0 # Total object tags.
      standard {
        storage_gb = 72.4 # Total storage in GB.
      }
    }

    # resource_usage "aws_lambda_function.f" {
    #   monthly_requests = 0 # Monthly requests.
    # }
    "###);

    sync_usage_file(
        &path,
        Format::Hcl,
        &project.resources,
        &reference,
        &ctx,
        SyncOptions::default(),
    )
    .await
    .expect("synced again");
    pretty_assertions::assert_eq!(std::fs::read_to_string(&path).expect("written"), written);
}

#[tokio::test]
async fn user_values_survive_without_estimates() {
    let (reference, _, ctx) = setup();
    let project = Project::parse("resources:\n  - name: aws_lambda_function.f\n")
        .expect("valid project");

    let mut usage_file = UsageFile::parse(
        r#"version: 0.1
resource_usage:
  aws_lambda_function.f:
    monthly_requests: 1000000 # hand tuned
"#,
        Format::Yaml,
    )
    .expect("valid usage file");

    sync_usage_data(
        &mut usage_file,
        &project.resources,
        &reference,
        &ctx,
        SyncOptions::default(),
    )
    .await;

    insta::assert_snapshot!(usage_file.render(Format::Yaml), @r###"
    version: 0.1
    # resource_type_default_usage:
      # aws_lambda_function:
      #   monthly_requests: 0 # Monthly requests.
    resource_usage:
      aws_lambda_function.f:
        monthly_requests: 1000000 # Monthly requests.
    "###);
}

#[test]
fn unsupported_version_is_rejected_before_sync() {
    let dir = tempfile::tempdir().expect("temp dir");
    let path = dir.path().join("infracost-usage.yml");
    std::fs::write(&path, "version: 9.9\nresource_usage: {}\n").expect("written");

    let err = UsageFile::load(&path, Format::Yaml).expect_err("unsupported");
    assert_eq!(
        err.to_string(),
        "Invalid usage file version `9.9`. Supported versions are 0.1 ≤ x ≤ 0.1"
    );
}
