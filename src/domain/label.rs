//! Partition labels
//!
//! A label names the proxy fleet a compiled API is distributed to. Labels are
//! parsed once from the document's label extension into a normalized,
//! validated set; anything that is not a string or a list of strings is
//! rejected instead of being defaulted.

use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeSet;
use std::fmt;
use std::str::FromStr;

use crate::{Error, Result};

/// Label every API lands in when it declares none
pub const DEFAULT_LABEL: &str = "default";

const MAX_LABEL_LEN: usize = 63;

static LABEL_PATTERN: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^[a-z0-9]([a-z0-9._-]*[a-z0-9])?$").expect("Label regex is valid at compile time")
});

/// A validated, lower-cased partition label
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Label(String);

impl Label {
    pub fn parse(raw: &str) -> Result<Self> {
        let normalized = raw.trim().to_ascii_lowercase();

        if normalized.is_empty() {
            return Err(Error::input_format("label cannot be empty"));
        }

        if normalized.len() > MAX_LABEL_LEN {
            return Err(Error::input_format(format!(
                "label '{}' exceeds {} characters",
                normalized, MAX_LABEL_LEN
            )));
        }

        if !LABEL_PATTERN.is_match(&normalized) {
            return Err(Error::input_format(format!(
                "label '{}' may only contain alphanumerics, '-', '_' and '.'",
                normalized
            )));
        }

        Ok(Self(normalized))
    }

    pub fn default_label() -> Self {
        Self(DEFAULT_LABEL.to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Label {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl FromStr for Label {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        Self::parse(s)
    }
}

impl TryFrom<String> for Label {
    type Error = Error;

    fn try_from(value: String) -> Result<Self> {
        Self::parse(&value)
    }
}

impl From<Label> for String {
    fn from(label: Label) -> Self {
        label.0
    }
}

impl AsRef<str> for Label {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

/// Non-empty, ordered set of labels
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct Labels(BTreeSet<Label>);

impl Labels {
    /// Parse the label extension value.
    ///
    /// `None` and an empty list yield `{"default"}`; a string yields a single
    /// label; a list must contain only strings.
    pub fn from_extension(value: Option<&Value>, field: &str) -> Result<Self> {
        let labels = match value {
            None | Some(Value::Null) => BTreeSet::new(),
            Some(Value::String(raw)) => {
                BTreeSet::from([Label::parse(raw).map_err(|e| with_field(e, field))?])
            }
            Some(Value::Array(items)) => items
                .iter()
                .map(|item| match item {
                    Value::String(raw) => Label::parse(raw).map_err(|e| with_field(e, field)),
                    other => Err(Error::input_format_field(
                        format!("label entries must be strings, found {}", json_kind(other)),
                        field,
                    )),
                })
                .collect::<Result<BTreeSet<_>>>()?,
            Some(other) => {
                return Err(Error::input_format_field(
                    format!(
                        "labels must be a string or a list of strings, found {}",
                        json_kind(other)
                    ),
                    field,
                ))
            }
        };

        if labels.is_empty() {
            return Ok(Self::default());
        }

        Ok(Self(labels))
    }

    pub fn contains(&self, label: &Label) -> bool {
        self.0.contains(label)
    }

    pub fn iter(&self) -> impl Iterator<Item = &Label> {
        self.0.iter()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl Default for Labels {
    fn default() -> Self {
        Self(BTreeSet::from([Label::default_label()]))
    }
}

impl FromIterator<Label> for Labels {
    fn from_iter<T: IntoIterator<Item = Label>>(iter: T) -> Self {
        let set: BTreeSet<Label> = iter.into_iter().collect();
        if set.is_empty() {
            Self::default()
        } else {
            Self(set)
        }
    }
}

impl<'a> IntoIterator for &'a Labels {
    type Item = &'a Label;
    type IntoIter = std::collections::btree_set::Iter<'a, Label>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.iter()
    }
}

fn with_field(err: Error, field: &str) -> Error {
    match err {
        Error::InputFormat { message, .. } => Error::input_format_field(message, field),
        other => other,
    }
}

fn json_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}
