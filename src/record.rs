//! Selection record: the audit trail of one selection walk.

use crate::error::{PackError, Result};
use crate::filter::ExclusionReason;
use crate::tree;

use chrono::{DateTime, Utc};
use serde::Serialize;
use std::collections::BTreeSet;
use std::fs;
use std::path::Path;

/// Every include/exclude decision made during one walk.
///
/// Built by [`Selector::select`](crate::selector::Selector::select) and not
/// modified afterwards.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SelectionRecord {
    /// Files to package, in walk order.
    pub included: Vec<String>,
    /// Paths the decision source explicitly accepted. Directories accepted
    /// with "include all" appear here; the files pulled in by them only
    /// appear in `included`.
    pub include_choices: BTreeSet<String>,
    /// Paths the decision source explicitly rejected.
    pub exclude_choices: BTreeSet<String>,
    /// Paths removed by the path filter before any question was asked.
    pub filtered: Vec<(String, ExclusionReason)>,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct RecordMetadata<'a> {
    project_name: &'a str,
    timestamp: String,
    output_name: &'a str,
    files_tree: String,
}

#[derive(Serialize)]
struct FilteredEntry<'a> {
    path: &'a str,
    reason: ExclusionReason,
}

#[derive(Serialize)]
struct RecordDocument<'a> {
    metadata: RecordMetadata<'a>,
    files: &'a [String],
    include: &'a BTreeSet<String>,
    exclude: &'a BTreeSet<String>,
    filtered: Vec<FilteredEntry<'a>>,
}

impl SelectionRecord {
    /// Render the record as pretty JSON.
    pub fn to_json(
        &self,
        project_name: &str,
        output_name: &str,
        timestamp: DateTime<Utc>,
    ) -> Result<String> {
        let document = RecordDocument {
            metadata: RecordMetadata {
                project_name,
                timestamp: timestamp.to_rfc3339(),
                output_name,
                files_tree: tree::describe(&self.included),
            },
            files: &self.included,
            include: &self.include_choices,
            exclude: &self.exclude_choices,
            filtered: self
                .filtered
                .iter()
                .map(|(path, reason)| FilteredEntry {
                    path,
                    reason: *reason,
                })
                .collect(),
        };
        serde_json::to_string_pretty(&document)
            .map_err(|err| PackError::ArtifactFormat(format!("selection record: {}", err)))
    }

    /// Write the record next to the artifact.
    pub fn write(
        &self,
        path: &Path,
        project_name: &str,
        output_name: &str,
        timestamp: DateTime<Utc>,
    ) -> Result<()> {
        let json = self.to_json(project_name, output_name, timestamp)?;
        fs::write(path, json).map_err(|err| PackError::io(path, err))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_record_json_shape() {
        let record = SelectionRecord {
            included: vec!["src/a.rs".to_string(), "README.md".to_string()],
            include_choices: ["src".to_string(), "README.md".to_string()].into(),
            exclude_choices: ["target".to_string()].into(),
            filtered: vec![(".git".to_string(), ExclusionReason::Vcs)],
        };
        let timestamp = DateTime::parse_from_rfc3339("2024-05-01T12:00:00Z")
            .unwrap()
            .with_timezone(&Utc);
        let json = record.to_json("demo", "demo.portpack.json", timestamp).unwrap();
        let value: serde_json::Value = serde_json::from_str(&json).unwrap();

        assert_eq!(value["metadata"]["projectName"], "demo");
        assert_eq!(value["metadata"]["outputName"], "demo.portpack.json");
        assert_eq!(value["metadata"]["timestamp"], "2024-05-01T12:00:00+00:00");
        assert_eq!(value["metadata"]["filesTree"], "src/\n  a.rs\nREADME.md\n");
        assert_eq!(value["files"], serde_json::json!(["src/a.rs", "README.md"]));
        assert_eq!(value["include"], serde_json::json!(["README.md", "src"]));
        assert_eq!(value["exclude"], serde_json::json!(["target"]));
        assert_eq!(value["filtered"][0]["reason"], "vcs");
    }
}
