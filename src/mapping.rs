//! Mapping specifications and scope-resolved substitution rules.
//!
//! A mapping specification declares literal substitutions, each restricted
//! to a scope (`"."` for the whole project, a directory, or a single file):
//!
//! ```json
//! {
//!   "ignore-folders": ["secrets"],
//!   "map": [
//!     { "scope": ".", "list": [ { "Acme Corp": "COMPANY" } ] },
//!     { "scope": "deploy/prod.env", "list": [ { "hunter2": "PASSWORD" } ] }
//!   ]
//! }
//! ```
//!
//! The whole file is validated when it is loaded. A malformed specification
//! aborts the run before any file is transformed.
//!
//! Rules that apply to a file are always ordered longest key first, so a
//! short key can never consume part of a longer match: with `{"ab": "X"}` and
//! `{"a": "Y"}` in scope, `"ab"` becomes `"X"`, not `"Yb"`.

use crate::error::{PackError, Result};
use crate::paths::normalize_rel;

use serde::Deserialize;
use std::cmp::Reverse;
use std::collections::BTreeMap;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};

/// A single literal substitution, written as a one-key JSON object.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(try_from = "BTreeMap<String, String>")]
pub struct Substitution {
    pub from: String,
    pub to: String,
}

impl Substitution {
    pub fn new(from: impl Into<String>, to: impl Into<String>) -> Self {
        Self {
            from: from.into(),
            to: to.into(),
        }
    }
}

impl TryFrom<BTreeMap<String, String>> for Substitution {
    type Error = String;

    fn try_from(entry: BTreeMap<String, String>) -> std::result::Result<Self, Self::Error> {
        if entry.len() != 1 {
            return Err(format!(
                "substitution entries must have exactly one key, found {}",
                entry.len()
            ));
        }
        let (from, to) = entry.into_iter().next().ok_or("empty substitution entry")?;
        if from.is_empty() {
            return Err("substitution source must not be empty".to_string());
        }
        Ok(Self { from, to })
    }
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct RawGroup {
    #[serde(default)]
    scope: Option<String>,
    list: Vec<Substitution>,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct RawSpec {
    #[serde(rename = "ignore-folders", default)]
    ignore_folders: Vec<String>,
    #[serde(default)]
    map: Vec<RawGroup>,
}

/// Substitutions restricted to one scope.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScopedRuleGroup {
    /// Normalized scope; empty means the whole project.
    pub scope: String,
    pub substitutions: Vec<Substitution>,
}

impl ScopedRuleGroup {
    /// Check whether this group applies to `rel`: whole-project scope, the
    /// file itself, or a directory containing it. A scope of `src/a.txt`
    /// does not apply to `src/a.txt.bak` or `src/ab.txt`.
    pub fn applies_to(&self, rel: &str) -> bool {
        self.scope.is_empty()
            || self.scope == rel
            || rel
                .strip_prefix(self.scope.as_str())
                .is_some_and(|rest| rest.starts_with('/'))
    }
}

/// A loaded, validated mapping specification.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MappingSpec {
    pub ignore_folders: Vec<String>,
    pub rules: Vec<ScopedRuleGroup>,
}

/// One ordered replacement step.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Rule {
    pub pattern: String,
    pub replacement: String,
}

/// Rules for one file in the order they must be applied.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ResolvedRuleSet {
    rules: Vec<Rule>,
}

impl ResolvedRuleSet {
    /// Order `rules` longest pattern first. The sort is stable, so rules
    /// of equal length keep declaration order.
    fn ordered(mut rules: Vec<Rule>) -> Self {
        rules.sort_by_key(|rule| Reverse(rule.pattern.chars().count()));
        Self { rules }
    }

    pub fn rules(&self) -> &[Rule] {
        &self.rules
    }

    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }

    /// Apply every rule in order as a literal, global replacement.
    pub fn apply(&self, content: &[u8]) -> Vec<u8> {
        self.rules.iter().fold(content.to_vec(), |acc, rule| {
            replace_all(&acc, rule.pattern.as_bytes(), rule.replacement.as_bytes())
        })
    }

    pub fn apply_str(&self, content: &str) -> String {
        String::from_utf8_lossy(&self.apply(content.as_bytes())).into_owned()
    }
}

/// A placeholder produced by more than one source string in the same scope.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Ambiguity {
    pub placeholder: String,
    /// The source restored on inversion (first declared).
    pub kept: String,
    /// Sources that cannot be restored.
    pub dropped: Vec<String>,
}

/// Inverse rules plus the ambiguities found while building them.
#[derive(Debug, Clone, Default)]
pub struct InverseRuleSet {
    pub rules: ResolvedRuleSet,
    pub ambiguities: Vec<Ambiguity>,
}

/// Resolves which substitutions apply to a file, in either direction.
#[derive(Debug, Clone, Default)]
pub struct MappingResolver {
    spec: MappingSpec,
}

impl MappingResolver {
    pub fn new(spec: MappingSpec) -> Self {
        Self { spec }
    }

    /// Load and validate a mapping specification from disk.
    pub fn load(path: &Path) -> Result<Self> {
        let content = match fs::read_to_string(path) {
            Ok(content) => content,
            Err(err) if err.kind() == io::ErrorKind::NotFound => {
                return Err(PackError::MappingFileNotFound(path.to_path_buf()))
            }
            Err(err) => return Err(PackError::io(path, err)),
        };
        Self::parse(&content, path)
    }

    /// Validate a mapping specification; `origin` is used in error messages.
    ///
    /// A top-level array is accepted as shorthand for `{"map": [...]}`.
    pub fn parse(content: &str, origin: &Path) -> Result<Self> {
        let format_error = |reason: String| PackError::MappingFormat {
            path: PathBuf::from(origin),
            reason,
        };

        let value: serde_json::Value =
            serde_json::from_str(content).map_err(|err| format_error(err.to_string()))?;
        let value = match value {
            serde_json::Value::Array(groups) => {
                serde_json::json!({ "map": serde_json::Value::Array(groups) })
            }
            serde_json::Value::Object(_) => value,
            other => {
                return Err(format_error(format!(
                    "expected an object with \"map\", found {}",
                    json_kind(&other)
                )))
            }
        };

        let raw: RawSpec =
            serde_json::from_value(value).map_err(|err| format_error(err.to_string()))?;

        let ignore_folders = raw
            .ignore_folders
            .iter()
            .map(|folder| normalize_rel(folder))
            .filter(|folder| !folder.is_empty())
            .collect();
        let rules = raw
            .map
            .into_iter()
            .map(|group| ScopedRuleGroup {
                scope: normalize_rel(group.scope.as_deref().unwrap_or(".")),
                substitutions: group.list,
            })
            .collect();

        Ok(Self::new(MappingSpec {
            ignore_folders,
            rules,
        }))
    }

    pub fn spec(&self) -> &MappingSpec {
        &self.spec
    }

    pub fn ignore_folders(&self) -> &[String] {
        &self.spec.ignore_folders
    }

    /// Substitutions in scope for `rel`, in declaration order.
    fn in_scope<'a>(&'a self, rel: &'a str) -> impl Iterator<Item = &'a Substitution> + 'a {
        self.spec
            .rules
            .iter()
            .filter(move |group| group.applies_to(rel))
            .flat_map(|group| group.substitutions.iter())
    }

    /// Sensitive → placeholder rules for `rel`, longest source first.
    pub fn forward_rules(&self, rel: &str) -> ResolvedRuleSet {
        ResolvedRuleSet::ordered(
            self.in_scope(rel)
                .map(|sub| Rule {
                    pattern: sub.from.clone(),
                    replacement: sub.to.clone(),
                })
                .collect(),
        )
    }

    /// Placeholder → sensitive rules for `rel`, longest placeholder first.
    ///
    /// When a placeholder stands for several sources, the first declared
    /// source is restored and the conflict is reported as an [`Ambiguity`].
    pub fn inverse_rules(&self, rel: &str) -> InverseRuleSet {
        let mut kept: Vec<Rule> = Vec::new();
        let mut ambiguities: Vec<Ambiguity> = Vec::new();

        for sub in self.in_scope(rel) {
            // Empty placeholders cannot be searched for.
            if sub.to.is_empty() {
                continue;
            }
            match kept.iter().find(|rule| rule.pattern == sub.to) {
                None => kept.push(Rule {
                    pattern: sub.to.clone(),
                    replacement: sub.from.clone(),
                }),
                Some(rule) if rule.replacement == sub.from => {}
                Some(rule) => {
                    match ambiguities.iter_mut().find(|a| a.placeholder == sub.to) {
                        Some(existing) => {
                            if !existing.dropped.contains(&sub.from) {
                                existing.dropped.push(sub.from.clone());
                            }
                        }
                        None => ambiguities.push(Ambiguity {
                            placeholder: sub.to.clone(),
                            kept: rule.replacement.clone(),
                            dropped: vec![sub.from.clone()],
                        }),
                    }
                }
            }
        }

        InverseRuleSet {
            rules: ResolvedRuleSet::ordered(kept),
            ambiguities,
        }
    }

    /// Ambiguous placeholders for every declared scope, keyed by scope
    /// (`"."` for the whole project).
    pub fn ambiguities(&self) -> BTreeMap<String, Vec<Ambiguity>> {
        let mut found = BTreeMap::new();
        for group in &self.spec.rules {
            let ambiguities = self.inverse_rules(&group.scope).ambiguities;
            if !ambiguities.is_empty() {
                let label = if group.scope.is_empty() {
                    ".".to_string()
                } else {
                    group.scope.clone()
                };
                found.insert(label, ambiguities);
            }
        }
        found
    }
}

fn json_kind(value: &serde_json::Value) -> &'static str {
    match value {
        serde_json::Value::Null => "null",
        serde_json::Value::Bool(_) => "a boolean",
        serde_json::Value::Number(_) => "a number",
        serde_json::Value::String(_) => "a string",
        serde_json::Value::Array(_) => "an array",
        serde_json::Value::Object(_) => "an object",
    }
}

/// Literal, non-overlapping, left-to-right replacement of every `needle`.
fn replace_all(haystack: &[u8], needle: &[u8], replacement: &[u8]) -> Vec<u8> {
    if needle.is_empty() || haystack.len() < needle.len() {
        return haystack.to_vec();
    }

    let mut out = Vec::with_capacity(haystack.len());
    let mut i = 0;
    while i < haystack.len() {
        if haystack[i..].starts_with(needle) {
            out.extend_from_slice(replacement);
            i += needle.len();
        } else {
            out.push(haystack[i]);
            i += 1;
        }
    }
    out
}
