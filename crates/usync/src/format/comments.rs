//! item descriptions from trailing comments
//!
//! Descriptions are stored as trailing comments (`storage_gb: 50.0 # Total storage in GB`).
//! [LineComments] holds them keyed by the path of keys leading to the item, so they can be put
//! back on the parsed items.
//!
//! `serde_yaml` doesn't hand out comments, so for yaml a line based scan collects them. It only
//! understands the subset of yaml written by this crate plus plain hand edits. Anything it can't
//! follow is skipped, a missed comment only loses a description. The hcl parser keeps comments
//! in its decor; [super::hcl] reads them from there.
use crate::usage_tree::{UsageTree, UsageValue};
use std::collections::HashMap;

#[derive(Debug, Default)]
pub(crate) struct LineComments {
    by_path: HashMap<Vec<String>, String>,
}

impl LineComments {
    pub fn get(&self, path: &[String]) -> Option<&str> {
        self.by_path.get(path).map(String::as_str)
    }

    pub fn insert(&mut self, path: Vec<String>, comment: &str) {
        let comment = comment.trim();
        if !comment.is_empty() {
            self.by_path.insert(path, comment.to_string());
        }
    }

    /// Collect comments of an indentation based (yaml) document
    pub fn yaml(text: &str) -> Self {
        let mut comments = Self::default();
        let mut stack: Vec<(usize, String)> = vec![];

        for line in text.lines() {
            let trimmed = line.trim_start();
            if trimmed.is_empty()
                || trimmed.starts_with('#')
                || trimmed.starts_with('-')
                || trimmed.starts_with("...")
            {
                continue;
            }

            let indent = line.len() - trimmed.len();
            let Some((key, rest)) = split_yaml_key(trimmed) else {
                continue;
            };

            while stack.last().is_some_and(|(level, _)| *level >= indent) {
                stack.pop();
            }
            stack.push((indent, key));

            if let Some(comment) = trailing_comment(rest) {
                comments.insert(stack.iter().map(|(_, key)| key.clone()).collect(), comment);
            }
        }

        comments
    }

    /// Put comments on items that don't have a description yet
    ///
    /// `section` is the leading path element of every tree in `trees`.
    pub fn describe(&self, section: &str, trees: &mut [UsageTree]) {
        if self.by_path.is_empty() {
            return;
        }

        for tree in trees {
            let mut path = vec![section.to_string(), tree.name.clone()];
            self.describe_tree(&mut path, tree);
        }
    }

    fn describe_tree(&self, path: &mut Vec<String>, tree: &mut UsageTree) {
        for item in &mut tree.items {
            path.push(item.key.clone());

            if item.description.is_none() {
                item.description = self.get(path.as_slice()).map(str::to_string);
            }

            if let Some(UsageValue::SubTree(sub_tree)) = &mut item.value {
                self.describe_tree(path, sub_tree);
            }

            path.pop();
        }
    }
}

/// Split `key: rest` into the unquoted key and everything after the colon
fn split_yaml_key(line: &str) -> Option<(String, &str)> {
    let (key, rest) = match line.chars().next()? {
        quote @ ('"' | '\'') => {
            let end = closing_quote(line, quote)?;
            let key = unquote(&line[..=end], quote)?;
            (key, line[end + 1..].trim_start().strip_prefix(':')?)
        }
        _ => {
            let colon = line
                .match_indices(':')
                .map(|(index, _)| index)
                .find(|index| {
                    line[index + 1..]
                        .chars()
                        .next()
                        .map_or(true, char::is_whitespace)
                })?;
            (line[..colon].trim_end().to_string(), &line[colon + 1..])
        }
    };

    Some((key, rest))
}

fn unquote(quoted: &str, quote: char) -> Option<String> {
    if quote == '"' {
        serde_json::from_str(quoted).ok()
    } else {
        let inner = quoted.strip_prefix('\'')?.strip_suffix('\'')?;
        Some(inner.replace("''", "'"))
    }
}

/// Byte index of the quote that closes the string opened at index 0
fn closing_quote(text: &str, quote: char) -> Option<usize> {
    let mut chars = text.char_indices().skip(1).peekable();
    while let Some((index, c)) = chars.next() {
        match c {
            '\\' if quote == '"' => {
                chars.next();
            }
            c if c == quote => {
                // '' is an escaped quote in single quoted yaml
                if quote == '\'' && chars.peek().is_some_and(|(_, next)| *next == '\'') {
                    chars.next();
                    continue;
                }
                return Some(index);
            }
            _ => {}
        }
    }
    None
}

/// Comment text after a `#` that is outside of quotes and preceded by whitespace
fn trailing_comment(rest: &str) -> Option<&str> {
    find_comment_start(rest).map(|index| strip_comment_marker(&rest[index..]))
}

fn find_comment_start(text: &str) -> Option<usize> {
    let mut quote: Option<char> = None;
    let mut escaped = false;
    let mut previous = ' ';

    for (index, c) in text.char_indices() {
        match quote {
            Some(open) => {
                if escaped {
                    escaped = false;
                } else if c == '\\' && open == '"' {
                    escaped = true;
                } else if c == open {
                    quote = None;
                }
            }
            None => match c {
                '"' | '\'' if previous.is_whitespace() || "[{,:=".contains(previous) => {
                    quote = Some(c)
                }
                '#' if previous.is_whitespace() => return Some(index),
                _ => {}
            },
        }
        previous = c;
    }

    None
}

fn strip_comment_marker(comment: &str) -> &str {
    comment.strip_prefix('#').unwrap_or(comment).trim()
}

#[cfg(test)]
mod test {
    use super::*;
    use pretty_assertions::assert_eq;

    fn path(keys: &[&str]) -> Vec<String> {
        keys.iter().map(|key| key.to_string()).collect()
    }

    #[test]
    fn yaml_trailing_comments() {
        let comments = LineComments::yaml(
            r#"version: 0.1 # file version
resource_usage:
  aws_s3_bucket.b:
    standard: # Standard storage class
      storage_gb: 50.0 # Total storage in GB.
      # monthly_tier_1_requests: 0 # commented lines are skipped
    note: "a # inside quotes" # the real one
  'it''s':
    zones:
      - a # sequence entries are skipped
"#,
        );

        assert_eq!(comments.get(&path(&["version"])), Some("file version"));
        assert_eq!(
            comments.get(&path(&["resource_usage", "aws_s3_bucket.b", "standard"])),
            Some("Standard storage class")
        );
        assert_eq!(
            comments.get(&path(&[
                "resource_usage",
                "aws_s3_bucket.b",
                "standard",
                "storage_gb"
            ])),
            Some("Total storage in GB.")
        );
        assert_eq!(
            comments.get(&path(&["resource_usage", "aws_s3_bucket.b", "note"])),
            Some("the real one")
        );
        assert_eq!(
            comments.get(&path(&[
                "resource_usage",
                "aws_s3_bucket.b",
                "standard",
                "monthly_tier_1_requests"
            ])),
            None
        );
        assert_eq!(comments.get(&path(&["resource_usage", "it's", "zones"])), None);
    }

    #[test]
    fn yaml_hash_without_space_is_not_a_comment() {
        let comments = LineComments::yaml("resource_usage:\n  r:\n    tag: a#b\n");
        assert_eq!(comments.get(&path(&["resource_usage", "r", "tag"])), None);
    }
}
