//! hcl usage files
//!
//! Every tree is a labeled block, sub trees are nested blocks:
//! ```hcl
//! version = "0.1"
//!
//! resource_usage "aws_s3_bucket.b" {
//!   standard {
//!     storage_gb = 50.5 # Total storage in GB.
//!     # monthly_tier_1_requests = 0
//!   }
//! }
//! ```
//!
//! Attribute values are evaluated without any variables or functions, plain arithmetic
//! (`monthly_requests = 30 * 1000`) works.
use super::comments::LineComments;
use super::layout::{self, Body, Entry};
use super::{DocumentFormat, ParseError, RESOURCE_TYPE_USAGE_KEY, RESOURCE_USAGE_KEY, VERSION_KEY};
use crate::usage_file::UsageFile;
use crate::usage_tree::UsageTree;
use crate::value::{Value, ValueMap};
use ::hcl::eval::Evaluate;
use hcl_edit::structure::{Body as HclBody, Structure};
use hcl_edit::{Decorate, RawString};

const INDENT: usize = 2;

#[derive(Debug, Clone, Copy, Default)]
pub struct HclFormat;

impl DocumentFormat for HclFormat {
    fn render(&self, usage_file: &UsageFile) -> String {
        let mut out = vec![format!(
            "{VERSION_KEY} = {}",
            hcl_string(&usage_file.version)
        )];

        write_section(&mut out, RESOURCE_TYPE_USAGE_KEY, &usage_file.resource_type_usages);
        write_section(&mut out, RESOURCE_USAGE_KEY, &usage_file.resource_usages);

        out.push(String::new());
        out.join("\n")
    }

    fn parse(&self, text: &str) -> Result<UsageFile, ParseError> {
        let body = hcl_edit::parser::parse_body(text)?;

        let mut document = ValueMap::new();
        let mut comments = LineComments::default();
        for structure in body.iter() {
            match structure {
                Structure::Attribute(attribute) => {
                    let key = attribute.key.value().as_str();
                    if let Some(value) = evaluate(key, &attribute.value)? {
                        document.insert(key.to_string(), value);
                    }
                }
                Structure::Block(block) => {
                    let ident = block.ident.value().as_str();
                    if ident != RESOURCE_USAGE_KEY && ident != RESOURCE_TYPE_USAGE_KEY {
                        return Err(ParseError::UnknownBlock(ident.to_string()));
                    }

                    let [label] = block.labels.as_slice() else {
                        return Err(ParseError::BlockLabels {
                            ident: ident.to_string(),
                            expected: 1,
                        });
                    };
                    let name = label.as_str();
                    let mut path = vec![ident.to_string(), name.to_string()];
                    let usage = body_to_map(&block.body, &mut path, &mut comments)?;

                    let section = document
                        .entry(ident.to_string())
                        .or_insert_with(|| Value::Object(ValueMap::new()));
                    let Value::Object(section) = section else {
                        return Err(ParseError::NotAMapping(ident.to_string()));
                    };
                    section.insert(name.to_string(), Value::Object(usage));
                }
            }
        }

        super::usage_file_from_document(document, &comments)
    }
}

/// Attributes and nested (label-less) blocks of a tree body
///
/// Trailing comments of attributes and of opening block lines are collected into `comments`.
fn body_to_map(
    body: &HclBody,
    path: &mut Vec<String>,
    comments: &mut LineComments,
) -> Result<ValueMap, ParseError> {
    let mut map = ValueMap::new();

    for structure in body.iter() {
        match structure {
            Structure::Attribute(attribute) => {
                let key = attribute.key.value().as_str();
                path.push(key.to_string());

                if let Some(comment) = decor_comment(attribute.decor().suffix()) {
                    comments.insert(path.clone(), comment);
                }
                if let Some(value) = evaluate(&path.join("."), &attribute.value)? {
                    map.insert(key.to_string(), value);
                }

                path.pop();
            }
            Structure::Block(block) => {
                let key = block.ident.value().as_str();
                path.push(key.to_string());

                if !block.labels.is_empty() {
                    return Err(ParseError::BlockLabels {
                        ident: path.join("."),
                        expected: 0,
                    });
                }

                if let Some(comment) = decor_comment(block.body.decor().prefix()) {
                    comments.insert(path.clone(), comment);
                }
                let nested = body_to_map(&block.body, path, comments)?;
                map.insert(key.to_string(), Value::Object(nested));

                path.pop();
            }
        }
    }

    Ok(map)
}

/// Text of a `#` or `//` line comment held in decor
///
/// Attribute suffixes hold the whitespace and comment up to the line end, block body prefixes
/// the same after the opening brace.
fn decor_comment(decor: Option<&RawString>) -> Option<&str> {
    let decor = decor?.trim_start();
    let comment = decor
        .strip_prefix('#')
        .or_else(|| decor.strip_prefix("//"))?
        .lines()
        .next()?
        .trim();
    (!comment.is_empty()).then_some(comment)
}

fn evaluate(
    key: &str,
    expression: &hcl_edit::expr::Expression,
) -> Result<Option<Value>, ParseError> {
    let expression: ::hcl::Expression = expression.clone().into();
    let value = expression
        .evaluate(&::hcl::eval::Context::new())
        .map_err(|source| ParseError::HclEval {
            key: key.to_string(),
            source,
        })?;

    Ok(Value::from_hcl(value)?)
}

fn write_section(out: &mut Vec<String>, section: &str, trees: &[UsageTree]) {
    for entry in layout::section(trees) {
        let comment_at = (!entry.active).then_some(0);

        out.push(String::new());
        out.push(line(
            0,
            comment_at,
            &format!("{section} {} {{", hcl_string(&entry.key)),
        ));
        if let Body::Map(children) = &entry.body {
            for child in children {
                write_entry(out, child, INDENT, comment_at);
            }
        }
        out.push(line(0, comment_at, "}"));
    }
}

/// `comment_at` is the indentation of the `#` once an ancestor is commented
fn write_entry(out: &mut Vec<String>, entry: &Entry, indent: usize, comment_at: Option<usize>) {
    let comment_at = comment_at.or((!entry.active).then_some(indent));

    let key = hcl_key(&entry.key);
    let description = entry
        .description
        .as_ref()
        .map(|description| format!(" # {description}"))
        .unwrap_or_default();

    let value = match &entry.body {
        Body::Int(int) => int.to_string(),
        Body::Float(float) => layout::float_literal(*float),
        Body::Bool(b) => b.to_string(),
        Body::String(s) => hcl_string(s),
        Body::Array(elements) => {
            let elements: Vec<_> = elements.iter().map(|element| hcl_string(element)).collect();
            format!("[{}]", elements.join(", "))
        }
        Body::Missing => "null".to_string(),
        Body::Map(children) if children.is_empty() => {
            out.push(line(indent, comment_at, &format!("{key} {{}}{description}")));
            return;
        }
        Body::Map(children) => {
            out.push(line(indent, comment_at, &format!("{key} {{{description}")));
            for child in children {
                write_entry(out, child, indent + INDENT, comment_at);
            }
            out.push(line(indent, comment_at, "}"));
            return;
        }
    };

    out.push(line(indent, comment_at, &format!("{key} = {value}{description}")));
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

/// Quoted string literal, template sequences are escaped
fn hcl_string(s: &str) -> String {
    serde_json::Value::from(s)
        .to_string()
        .replace("${", "$${")
        .replace("%{", "%%{")
}

/// Attribute and block names have to be identifiers
fn hcl_key(key: &str) -> String {
    match ::hcl::Identifier::new(key) {
        Ok(ident) => ident.to_string(),
        Err(_) => {
            let sanitized = ::hcl::Identifier::sanitized(key);
            tracing::warn!(%key, %sanitized, "writing invalid hcl identifier sanitized");
            sanitized.to_string()
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::usage_tree::{UsageItem, UsageValue};
    use pretty_assertions::assert_eq;

    #[test]
    fn renders_defaults_as_comments() {
        let default = UsageTree::with_items(
            "standard",
            vec![
                UsageItem::with_default("storage_gb", UsageValue::Float64(0.0)),
                UsageItem::with_default("monthly_tier_1_requests", UsageValue::Int64(0))
                    .described("Monthly PUT requests."),
            ],
        );
        let mut standard = UsageItem::new("standard", crate::usage_tree::UsageValueType::SubTree);
        standard.default_value = Some(UsageValue::SubTree(default));

        let bucket = UsageTree::with_items(
            "aws_s3_bucket.b",
            vec![
                UsageItem::with_value("object_tags", UsageValue::Int64(4)),
                standard,
            ],
        );
        let lambda = UsageTree::with_items(
            "aws_lambda_function.f",
            vec![UsageItem::with_default("monthly_requests", UsageValue::Int64(0))],
        );

        let rendered = HclFormat.render(&UsageFile {
            version: "0.1".into(),
            resource_type_usages: vec![],
            resource_usages: vec![bucket, lambda],
        });

        assert_eq!(
            rendered,
            r#"version = "0.1"

resource_usage "aws_s3_bucket.b" {
  object_tags = 4
  # standard {
  #   storage_gb = 0.0
  #   monthly_tier_1_requests = 0 # Monthly PUT requests.
  # }
}

# resource_usage "aws_lambda_function.f" {
#   monthly_requests = 0
# }
"#
        );
    }

    #[test]
    fn active_document_round_trips_byte_identical() {
        let text = r#"version = "0.1"

resource_type_default_usage "aws_lambda_function" {
  monthly_requests = 100 # Monthly requests to the Lambda function.
}

resource_usage "aws_s3_bucket.b" {
  standard {
    storage_gb = 72.4 # Total storage in GB.
    monthly_tier_1_requests = 1000
  }
  regions = ["eu-west-1", "us-east-1"]
  versioning = true
  label = "nightly $${backup}"
}

resource_usage "module.app.aws_lambda_function.f[\"x\"]" {
  monthly_requests = 20000
}
"#;

        let parsed = HclFormat.parse(text).expect("valid hcl");
        assert_eq!(
            parsed.resource_usages[0]
                .get("label")
                .and_then(|item| item.value.clone()),
            Some(UsageValue::String("nightly ${backup}".into()))
        );
        assert_eq!(parsed.resource_usages[1].name, r#"module.app.aws_lambda_function.f["x"]"#);
        assert_eq!(HclFormat.render(&parsed), text);
    }

    #[test]
    fn evaluates_expressions() {
        let parsed = HclFormat
            .parse(
                r#"
version = "0.1"
resource_usage "aws_lambda_function.f" {
  monthly_requests = 30 * 1000
  request_duration_ms = 1.5
  ignored = null
}
"#,
            )
            .expect("valid hcl");

        let tree = &parsed.resource_usages[0];
        assert_eq!(tree.len(), 2);
        assert_eq!(
            tree.get("monthly_requests").and_then(|item| item.value.clone()),
            Some(UsageValue::Int64(30_000))
        );
        assert_eq!(
            tree.get("request_duration_ms").and_then(|item| item.value.clone()),
            Some(UsageValue::Float64(1.5))
        );
    }

    #[test]
    fn parse_errors() {
        let err = HclFormat
            .parse("data \"x\" {}\n")
            .expect_err("unknown block");
        assert!(matches!(err, ParseError::UnknownBlock(ident) if ident == "data"));

        let err = HclFormat
            .parse("resource_usage {}\n")
            .expect_err("missing label");
        assert!(matches!(err, ParseError::BlockLabels { expected: 1, .. }));

        let err = HclFormat
            .parse("resource_usage \"a\" {\n  x = var.nope\n}\n")
            .expect_err("unknown variable");
        assert!(matches!(err, ParseError::HclEval { key, .. } if key == "resource_usage.a.x"));

        let err = HclFormat.parse("not = valid = hcl").expect_err("syntax");
        assert!(matches!(err, ParseError::Hcl(_)));
    }

    #[test]
    fn descriptions_come_from_comments() {
        let parsed = HclFormat
            .parse(
                r#"version = "0.1"
resource_usage "aws_s3_bucket.b" {
  object_tags = 4 // Total object tags.
  standard { # Standard storage class.
    storage_gb = 72.4   #   Total storage in GB.
    monthly_tier_1_requests = 1000 #
  }
}
"#,
            )
            .expect("valid hcl");

        let bucket = &parsed.resource_usages[0];
        let description = |item: Option<&crate::usage_tree::UsageItem>| {
            item.and_then(|item| item.description.clone())
        };
        assert_eq!(
            description(bucket.get("object_tags")),
            Some("Total object tags.".into())
        );
        assert_eq!(
            description(bucket.get("standard")),
            Some("Standard storage class.".into())
        );

        let standard = bucket
            .get("standard")
            .and_then(|item| item.value.as_ref())
            .and_then(UsageValue::as_sub_tree)
            .expect("sub tree");
        assert_eq!(
            description(standard.get("storage_gb")),
            Some("Total storage in GB.".into())
        );
        assert_eq!(description(standard.get("monthly_tier_1_requests")), None);
    }

    #[test]
    fn heredoc_text_is_not_a_description() {
        let parsed = HclFormat
            .parse(
                r#"version = "0.1"
resource_usage "aws_lambda_function.f" {
  note = <<EOT
monthly_requests = 1 # not a description
EOT
  monthly_requests = 20
}
"#,
            )
            .expect("valid hcl");

        let lambda = &parsed.resource_usages[0];
        assert_eq!(
            lambda.get("note").and_then(|item| item.value.clone()),
            Some(UsageValue::String("monthly_requests = 1 # not a description\n".into()))
        );

        let requests = lambda.get("monthly_requests").expect("monthly_requests");
        assert_eq!(requests.value, Some(UsageValue::Int64(20)));
        assert_eq!(requests.description, None);
        assert!(HclFormat
            .render(&parsed)
            .lines()
            .any(|line| line == "  monthly_requests = 20"));
    }

    #[test]
    fn keys_and_strings() {
        assert_eq!(hcl_key("monthly_requests"), "monthly_requests");
        assert_eq!(hcl_key("monthly-requests"), "monthly-requests");
        assert_eq!(hcl_key("2xx requests"), "_2xx_requests");
        assert_eq!(hcl_string("a \"b\""), r#""a \"b\"""#);
        assert_eq!(hcl_string("${x} %{y}"), r#""$${x} %%{y}""#);
    }
}
