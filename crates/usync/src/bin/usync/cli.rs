//! usync cli interface

use clap::{Parser, Subcommand, ValueEnum};
use std::fmt::Formatter;
use std::path::PathBuf;
use usync::format::Format;

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Change the work directory
    ///
    /// Can be specified multiple times. Note that all
    /// paths on the way to the final path must exist.
    ///
    /// This is equivalent to running { cd <directory>; usync ... }
    #[clap(short = 'C', long = "directory", global(true))]
    pub directory: Vec<PathBuf>,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Synchronize a usage file with the resources of a project
    ///
    /// A missing usage file is created.
    Sync(SyncCommand),

    /// Validate a usage file
    ///
    /// Checks the version and reports keys the reference catalog doesn't know
    Check(CheckCommand),

    /// Create a blank usage file
    Init(InitCommand),

    /// Split a quantity over pricing tiers
    Tiers(TiersCommand),
}

#[derive(Parser, Debug)]
pub struct UsageFileArgs {
    /// Usage file to work on
    #[clap(short = 'u', long = "usage-file", default_value = "infracost-usage.yml")]
    pub path: PathBuf,

    /// Document format, derived from the file extension when missing
    #[clap(long = "format")]
    pub format: Option<Format>,
}

impl UsageFileArgs {
    pub fn format(&self) -> Format {
        self.format.unwrap_or_else(|| Format::from_path(&self.path))
    }
}

#[derive(Parser, Debug)]
pub struct ReferenceArgs {
    /// Reference catalog to use instead of the bundled one
    #[clap(long = "reference")]
    pub reference: Option<PathBuf>,
}

#[derive(Parser, Debug)]
pub struct SyncCommand {
    #[clap(flatten)]
    pub usage_file: UsageFileArgs,

    #[clap(flatten)]
    pub reference: ReferenceArgs,

    #[clap(flatten)]
    pub output: OutputArgs,

    /// Project file declaring the resources
    #[clap(short = 'p', long = "project")]
    pub project: PathBuf,

    /// Upper bound of a single estimation
    #[clap(long = "timeout-secs", default_value_t = 30)]
    pub timeout_secs: u64,

    /// Resources synchronized at the same time
    ///
    /// Defaults to four per cpu, at least 4 and at most 16
    #[clap(long = "concurrency")]
    pub concurrency: Option<usize>,

    /// Estimation setting, overrides the project's env
    #[clap(short = 'e', long = "env", value_parser = parse_key_value)]
    pub env: Vec<(String, String)>,
}

fn parse_key_value(s: &str) -> Result<(String, String), String> {
    match s.split_once('=') {
        Some((key, value)) if !key.is_empty() => Ok((key.to_string(), value.to_string())),
        _ => Err(format!("expected KEY=VALUE, got `{s}`")),
    }
}

#[derive(Parser, Debug)]
pub struct CheckCommand {
    #[clap(flatten)]
    pub usage_file: UsageFileArgs,

    #[clap(flatten)]
    pub reference: ReferenceArgs,

    #[clap(flatten)]
    pub output: OutputArgs,
}

#[derive(Parser, Debug)]
pub struct InitCommand {
    #[clap(flatten)]
    pub usage_file: UsageFileArgs,
}

#[derive(Parser, Debug)]
pub struct TiersCommand {
    #[clap(flatten)]
    pub output: OutputArgs,

    /// Quantity to split, decimals are fine
    pub quantity: rust_decimal::Decimal,

    /// Cumulative upper bounds of the tiers
    pub boundaries: Vec<u64>,
}

#[derive(Parser, Debug)]
pub struct OutputArgs {
    #[arg(id = "output_format", short = 'F', long = "output-format", default_value_t)]
    pub format: OutputFormat,
}

#[derive(ValueEnum, Clone, Default, Debug)]
pub enum OutputFormat {
    Json,
    #[default]
    Yaml,
}

impl std::fmt::Display for OutputFormat {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            OutputFormat::Json => f.write_str("json"),
            OutputFormat::Yaml => f.write_str("yaml"),
        }
    }
}
