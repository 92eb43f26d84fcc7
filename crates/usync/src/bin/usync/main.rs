mod cli;

use std::time::Duration;
use usync::estimate::EstimationContext;
use usync::project::Project;
use usync::reference::ReferenceCatalog;
use usync::sync::SyncOptions;
use usync::usage_file::UsageFile;
use usync::value::{Value, ValueMap};

fn main() {
    use clap::Parser;
    let cli = cli::Cli::parse();

    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_env("USYNC_LOG"))
        .with_writer(std::io::stderr)
        .init();

    for new_path in cli.directory.iter() {
        match new_path.canonicalize() {
            Err(e) => {
                eprintln!(
                    "Failed to resolve path for -C/--directory {}\n{}",
                    new_path.display(),
                    e
                );
                std::process::exit(1);
            }
            Ok(cwd) => {
                if let Err(err) = std::env::set_current_dir(&cwd) {
                    eprintln!("Failed to set work directory to {}\n{}", cwd.display(), err,);
                    std::process::exit(1);
                }

                tracing::info!(directory=%cwd.display(), "Changed working directory");
            }
        }
    }

    let command_result = match cli.command {
        cli::Command::Sync(sync_cli) => sync(sync_cli),
        cli::Command::Check(check_cli) => check(check_cli),
        cli::Command::Init(init_cli) => init(init_cli),
        cli::Command::Tiers(tiers_cli) => tiers(tiers_cli),
    };

    if let Err(e) = command_result {
        for error in e.chain() {
            eprintln!("{error}")
        }
        std::process::exit(1);
    }
}

pub fn sync(cli: cli::SyncCommand) -> anyhow::Result<()> {
    let reference = reference(&cli.reference)?;
    let project = Project::load(&cli.project)?;

    let mut ctx = EstimationContext::default().with_timeout(Duration::from_secs(cli.timeout_secs));
    for (key, value) in cli.env {
        ctx = ctx.with_env(key, value);
    }
    let ctx = project.estimation_context(&ctx);

    let mut options = SyncOptions::default();
    if let Some(concurrency) = cli.concurrency {
        anyhow::ensure!(concurrency > 0, "--concurrency must be at least 1");
        options.concurrency = concurrency;
    }

    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_time()
        .build()?;

    let result = runtime.block_on(usync::sync::sync_usage_file(
        &cli.usage_file.path,
        cli.usage_file.format(),
        &project.resources,
        &reference,
        &ctx,
        options,
    ))?;

    output(&cli.output, &result.summary())
}

pub fn check(cli: cli::CheckCommand) -> anyhow::Result<()> {
    let reference = reference(&cli.reference)?;
    let usage_file = UsageFile::load(&cli.usage_file.path, cli.usage_file.format())?;

    let invalid_keys = usage_file.invalid_keys(&reference);

    let mut report = ValueMap::new();
    report.insert("version".into(), Value::String(usage_file.version.clone()));
    report.insert(
        "resources".into(),
        Value::Integer(usage_file.resource_usages.len() as i64),
    );
    report.insert(
        "invalid_keys".into(),
        Value::Array(invalid_keys.iter().cloned().map(Value::String).collect()),
    );
    output(&cli.output, &Value::Object(report))?;

    anyhow::ensure!(
        invalid_keys.is_empty(),
        "{} unknown usage key(s) in {}",
        invalid_keys.len(),
        cli.usage_file.path.display()
    );
    Ok(())
}

pub fn init(cli: cli::InitCommand) -> anyhow::Result<()> {
    let path = &cli.usage_file.path;
    anyhow::ensure!(!path.exists(), "{} already exists", path.display());

    UsageFile::blank().write_to_path(path, cli.usage_file.format())?;
    Ok(())
}

pub fn tiers(cli: cli::TiersCommand) -> anyhow::Result<()> {
    let buckets = usync::tiers::calculate_tier_buckets(cli.quantity, &cli.boundaries);

    // exact decimals as strings
    let value = Value::Array(
        buckets
            .iter()
            .map(|bucket| Value::String(bucket.normalize().to_string()))
            .collect(),
    );
    output(&cli.output, &value)
}

fn reference(args: &cli::ReferenceArgs) -> anyhow::Result<ReferenceCatalog> {
    Ok(match &args.reference {
        Some(path) => ReferenceCatalog::load(path)?,
        None => ReferenceCatalog::bundled()?,
    })
}

fn output(output: &cli::OutputArgs, value: &Value) -> anyhow::Result<()> {
    match output.format {
        cli::OutputFormat::Yaml => serde_yaml::to_writer(std::io::stdout(), value)?,
        cli::OutputFormat::Json => {
            serde_json::to_writer_pretty(std::io::stdout(), value)?;
            println!();
        }
    };

    Ok(())
}
