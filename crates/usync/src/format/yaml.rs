//! yaml usage files
//!
//! ```yaml
//! version: 0.1
//! resource_usage:
//!   aws_s3_bucket.b:
//!     standard:
//!       storage_gb: 50.0 # Total storage in GB.
//!       # monthly_tier_1_requests: 0 # Monthly PUT, COPY, POST, LIST requests.
//!   # aws_lambda_function.f:
//!   #   monthly_requests: 0 # Monthly requests to the Lambda function.
//! ```
use super::comments::LineComments;
use super::layout::{self, Body, Entry};
use super::{DocumentFormat, ParseError, RESOURCE_TYPE_USAGE_KEY, RESOURCE_USAGE_KEY, VERSION_KEY};
use crate::usage_file::UsageFile;
use crate::usage_tree::UsageTree;
use crate::value::{Value, ValueMap};

const INDENT: usize = 2;

#[derive(Debug, Clone, Copy, Default)]
pub struct YamlFormat;

impl DocumentFormat for YamlFormat {
    fn render(&self, usage_file: &UsageFile) -> String {
        let mut out = vec![format!(
            "{VERSION_KEY}: {}",
            version_literal(&usage_file.version)
        )];

        write_section(
            &mut out,
            RESOURCE_TYPE_USAGE_KEY,
            &usage_file.resource_type_usages,
            false,
        );
        write_section(&mut out, RESOURCE_USAGE_KEY, &usage_file.resource_usages, true);

        out.push(String::new());
        out.join("\n")
    }

    fn parse(&self, text: &str) -> Result<UsageFile, ParseError> {
        let document: serde_yaml::Value = serde_yaml::from_str(text)?;

        let document = match Value::from_yaml(document)? {
            None => ValueMap::new(),
            Some(Value::Object(document)) => document,
            Some(_) => return Err(ParseError::NotAMapping("document".to_string())),
        };

        super::usage_file_from_document(document, &LineComments::yaml(text))
    }
}

/// `required` sections are written as an empty mapping when there is nothing to write
fn write_section(out: &mut Vec<String>, key: &str, trees: &[UsageTree], required: bool) {
    let entries = layout::section(trees);
    if entries.is_empty() {
        if required {
            out.push(format!("{key}: {{}}"));
        }
        return;
    }

    if entries.iter().any(|entry| entry.active) {
        out.push(format!("{key}:"));
    } else {
        out.push(format!("# {key}:"));
    }

    for entry in &entries {
        write_entry(out, entry, INDENT, None);
    }
}

/// `comment_at` is the indentation of the `#` once an ancestor is commented
fn write_entry(out: &mut Vec<String>, entry: &Entry, indent: usize, comment_at: Option<usize>) {
    let comment_at = comment_at.or((!entry.active).then_some(indent));

    let key = yaml_string(&entry.key);
    let description = entry
        .description
        .as_ref()
        .map(|description| format!(" # {description}"))
        .unwrap_or_default();

    let inline = match &entry.body {
        Body::Int(int) => Some(int.to_string()),
        Body::Float(float) => Some(float_literal(*float)),
        Body::Bool(b) => Some(b.to_string()),
        Body::String(s) => Some(yaml_string(s)),
        Body::Array(elements) if elements.is_empty() => Some("[]".to_string()),
        Body::Map(children) if children.is_empty() => Some("{}".to_string()),
        Body::Array(_) | Body::Map(_) | Body::Missing => None,
    };

    match inline {
        Some(inline) => out.push(line(
            indent,
            comment_at,
            &format!("{key}: {inline}{description}"),
        )),
        None => out.push(line(indent, comment_at, &format!("{key}:{description}"))),
    }

    match &entry.body {
        Body::Array(elements) => {
            for element in elements {
                out.push(line(
                    indent + INDENT,
                    comment_at,
                    &format!("- {}", yaml_string(element)),
                ));
            }
        }
        Body::Map(children) => {
            for child in children {
                write_entry(out, child, indent + INDENT, comment_at);
            }
        }
        _ => {}
    }
}

fn line(indent: usize, comment_at: Option<usize>, content: &str) -> String {
    match comment_at {
        Some(at) => format!(
            "{}# {}{content}",
            " ".repeat(at),
            " ".repeat(indent.saturating_sub(at))
        ),
        None => format!("{}{content}", " ".repeat(indent)),
    }
}

/// A single line yaml scalar that reads back as the same string
fn yaml_string(s: &str) -> String {
    match serde_yaml::to_string(s) {
        Ok(rendered) if !rendered.trim_end().contains('\n') && !rendered.starts_with("---") => {
            rendered.trim_end().to_string()
        }
        // block scalars can't be followed by a comment, json strings are valid yaml
        _ => serde_json::Value::from(s).to_string(),
    }
}

fn float_literal(float: f64) -> String {
    if float.is_nan() {
        ".nan".to_string()
    } else if float == f64::INFINITY {
        ".inf".to_string()
    } else if float == f64::NEG_INFINITY {
        "-.inf".to_string()
    } else {
        layout::float_literal(float)
    }
}

/// Versions that read back as the same number are written unquoted (`version: 0.1`)
fn version_literal(version: &str) -> String {
    match version.parse::<f64>() {
        Ok(number) if number.to_string() == version => version.to_string(),
        _ => yaml_string(version),
    }
}
