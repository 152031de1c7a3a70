//! Core data models for jobmap
//!
//! Defines the fundamental data structures used throughout jobmap:
//! - `SourceProject`: identifier of a project in the definitions repository
//! - `ProjectBlock` / `JobEntry`: one parsed "project" stanza and its jobs
//! - `TemplateSpec`: a named job-name pattern with default parameters
//! - `ExpandedJobSet`: the per-project result of template expansion
//!
//! The YAML dialects are dynamically shaped (a job entry may be a bare
//! string or a single-key mapping; a parameter value may be a scalar or a
//! sequence). All of that variance is converted into tagged variants here,
//! once, at the parse boundary.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Identifier of a source project (hierarchical path, e.g. `"aai/babel"`).
///
/// Normalized on construction (surrounding slashes trimmed) so it can act
/// as a canonical cache key.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub struct SourceProject(String);

impl SourceProject {
    pub fn new(id: impl AsRef<str>) -> Self {
        Self(id.as_ref().trim_matches('/').to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Path segments, most significant first (`"aai/babel"` -> `aai`, `babel`).
    pub fn segments(&self) -> impl Iterator<Item = &str> {
        self.0.split('/').filter(|s| !s.is_empty())
    }
}

impl fmt::Display for SourceProject {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for SourceProject {
    fn from(id: &str) -> Self {
        Self::new(id)
    }
}

impl From<String> for SourceProject {
    fn from(id: String) -> Self {
        Self::new(id)
    }
}

/// A single scalar parameter value as found in the YAML dialects.
///
/// Non-string scalars are legal in both dialects and render to their plain
/// YAML string form when substituted into a job-name pattern.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(untagged)]
pub enum ScalarValue {
    Bool(bool),
    Int(i64),
    Float(f64),
    Str(String),
}

impl fmt::Display for ScalarValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ScalarValue::Bool(b) => write!(f, "{}", b),
            ScalarValue::Int(i) => write!(f, "{}", i),
            // A whole-number float keeps its decimal point, matching the
            // plain YAML form it was written in (`17.0`, not `17`).
            ScalarValue::Float(x) if x.is_finite() && x.fract() == 0.0 => {
                write!(f, "{:.1}", x)
            }
            ScalarValue::Float(x) => write!(f, "{}", x),
            ScalarValue::Str(s) => f.write_str(s),
        }
    }
}

impl From<&str> for ScalarValue {
    fn from(s: &str) -> Self {
        ScalarValue::Str(s.to_string())
    }
}

/// A parameter value: a single scalar, or an ordered sequence of scalars.
///
/// A sequence makes the parameter a matrix axis: expansion produces one job
/// name per element (an empty sequence therefore produces zero names).
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(untagged)]
pub enum ParamValue {
    Single(ScalarValue),
    Many(Vec<ScalarValue>),
}

impl ParamValue {
    pub fn is_list(&self) -> bool {
        matches!(self, ParamValue::Many(_))
    }

    pub fn scalar(value: impl Into<ScalarValue>) -> Self {
        ParamValue::Single(value.into())
    }

    pub fn list<I, V>(values: I) -> Self
    where
        I: IntoIterator<Item = V>,
        V: Into<ScalarValue>,
    {
        ParamValue::Many(values.into_iter().map(Into::into).collect())
    }
}

impl From<&str> for ParamValue {
    fn from(s: &str) -> Self {
        ParamValue::Single(ScalarValue::from(s))
    }
}

/// An insertion-ordered mapping of parameter name to value.
///
/// Declaration order is semantic: it decides the iteration order of matrix
/// axes during expansion, so a plain `HashMap`/`BTreeMap` would break the
/// determinism contract. Duplicate keys in the YAML replace the earlier
/// value but keep its position.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct ParamMap(Vec<(String, ParamValue)>);

impl ParamMap {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_pairs<I, K>(pairs: I) -> Self
    where
        I: IntoIterator<Item = (K, ParamValue)>,
        K: Into<String>,
    {
        let mut map = Self::new();
        for (name, value) in pairs {
            map.set(name.into(), value);
        }
        map
    }

    /// Replace the value for `name` in place, or append a new entry.
    pub fn set(&mut self, name: impl Into<String>, value: ParamValue) {
        let name = name.into();
        match self.0.iter_mut().find(|(n, _)| *n == name) {
            Some(entry) => entry.1 = value,
            None => self.0.push((name, value)),
        }
    }

    pub fn get(&self, name: &str) -> Option<&ParamValue> {
        self.0.iter().find(|(n, _)| n == name).map(|(_, v)| v)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &ParamValue)> {
        self.0.iter().map(|(n, v)| (n.as_str(), v))
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl<'de> Deserialize<'de> for ParamMap {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        struct MapVisitor;

        impl<'de> serde::de::Visitor<'de> for MapVisitor {
            type Value = ParamMap;

            fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str("a mapping of parameter names to scalar or list values")
            }

            fn visit_map<A>(self, mut access: A) -> Result<ParamMap, A::Error>
            where
                A: serde::de::MapAccess<'de>,
            {
                let mut map = ParamMap::new();
                while let Some((name, value)) = access.next_entry::<String, ParamValue>()? {
                    map.set(name, value);
                }
                Ok(map)
            }
        }

        deserializer.deserialize_map(MapVisitor)
    }
}

/// One job entry inside a project block: a template reference, optionally
/// with parameter overrides.
///
/// In the dialect a bare string means "template defaults, no overrides";
/// the mapping form carries overrides under a single key (the template
/// name). Both shapes are validated here, on load.
#[derive(Debug, Clone, PartialEq)]
pub enum JobEntry {
    /// `- maven-verify`
    Reference { template: String },
    /// `- maven-stage: { stream: [istanbul] }`
    ReferenceWithParams { template: String, overrides: ParamMap },
}

impl JobEntry {
    pub fn template(&self) -> &str {
        match self {
            JobEntry::Reference { template } => template,
            JobEntry::ReferenceWithParams { template, .. } => template,
        }
    }

    /// Override mapping; empty for a bare reference.
    pub fn overrides(&self) -> Option<&ParamMap> {
        match self {
            JobEntry::Reference { .. } => None,
            JobEntry::ReferenceWithParams { overrides, .. } => Some(overrides),
        }
    }
}

impl<'de> Deserialize<'de> for JobEntry {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        #[derive(Deserialize)]
        #[serde(untagged)]
        enum RawJobEntry {
            Reference(String),
            WithParams(std::collections::BTreeMap<String, ParamMap>),
        }

        match RawJobEntry::deserialize(deserializer)? {
            RawJobEntry::Reference(template) => Ok(JobEntry::Reference { template }),
            RawJobEntry::WithParams(map) => {
                let mut entries = map.into_iter();
                match (entries.next(), entries.next()) {
                    (Some((template, overrides)), None) => {
                        Ok(JobEntry::ReferenceWithParams { template, overrides })
                    }
                    _ => Err(serde::de::Error::custom(
                        "job entry mapping must have exactly one key (the template name)",
                    )),
                }
            }
        }
    }
}

/// A reusable job template: a unique name, a job-name pattern with
/// `{variable}` placeholders, and default parameter values.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct TemplateSpec {
    pub name: String,

    #[serde(rename = "name-pattern")]
    pub name_pattern: String,

    #[serde(default)]
    pub defaults: ParamMap,
}

impl TemplateSpec {
    pub fn new(name: impl Into<String>, name_pattern: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            name_pattern: name_pattern.into(),
            defaults: ParamMap::new(),
        }
    }

    pub fn with_default(mut self, name: impl Into<String>, value: ParamValue) -> Self {
        self.defaults.set(name, value);
        self
    }
}

/// One "project" stanza parsed from a definitions file.
#[derive(Debug, Clone, PartialEq)]
pub struct ProjectBlock {
    /// Block name (the stanza's `name` key).
    pub name: String,
    /// The source project this block binds to.
    pub source_project: SourceProject,
    /// Job entries in declaration order.
    pub jobs: Vec<JobEntry>,
}

/// The per-project expansion result: job names partitioned into fully
/// resolved names and names that still carry a `{placeholder}`.
///
/// A given name string lives in exactly one of the two sequences. Order is
/// insertion order of the parameter Cartesian product and is stable across
/// repeated calls with identical inputs. Duplicates are preserved: two
/// entries invoking the same template yield the name twice.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ExpandedJobSet {
    pub resolved: Vec<String>,
    pub unresolved: Vec<String>,
}

impl ExpandedJobSet {
    pub fn len(&self) -> usize {
        self.resolved.len() + self.unresolved.len()
    }

    pub fn is_empty(&self) -> bool {
        self.resolved.is_empty() && self.unresolved.is_empty()
    }

    /// All names, resolved first, each partition in its own order.
    pub fn iter_all(&self) -> impl Iterator<Item = &str> {
        self.resolved
            .iter()
            .chain(self.unresolved.iter())
            .map(String::as_str)
    }

    /// Append another set, preserving both partitions' orders.
    pub fn merge(&mut self, other: ExpandedJobSet) {
        self.resolved.extend(other.resolved);
        self.unresolved.extend(other.unresolved);
    }
}
