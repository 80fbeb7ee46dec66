//! End-to-end build and reconstruct operations.

use crate::archive::{ArchiveBuilder, Artifact, BuildFailure};
use crate::error::Result;
use crate::filter::PathFilter;
use crate::ignore_rules::{select_matcher, IgnoreOracle};
use crate::mapping::MappingResolver;
use crate::paths::rel_to_root;
use crate::reconstruct::{ArchiveReconstructor, OverwritePolicy, ReconstructReport};
use crate::record::SelectionRecord;
use crate::selector::{DecisionSource, Selector};

use chrono::Utc;
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

/// Inputs of a build.
#[derive(Debug, Clone)]
pub struct BuildOptions {
    pub root: PathBuf,
    pub output: PathBuf,
    pub mapping: Option<PathBuf>,
    pub include_vcs: bool,
    pub include_ignored: bool,
    pub ignore_oracle: IgnoreOracle,
    /// Write the selection record next to the artifact.
    pub write_record: bool,
    pub progress: bool,
}

impl BuildOptions {
    pub fn new(root: impl Into<PathBuf>, output: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            output: output.into(),
            mapping: None,
            include_vcs: false,
            include_ignored: false,
            ignore_oracle: IgnoreOracle::Auto,
            write_record: true,
            progress: false,
        }
    }
}

/// What a build produced.
#[derive(Debug)]
pub struct BuildSummary {
    pub output: PathBuf,
    pub record_path: Option<PathBuf>,
    pub record: SelectionRecord,
    pub files: usize,
    pub total_bytes: u64,
    pub failures: Vec<BuildFailure>,
}

/// Selection record path for an artifact: `x.portpack.json` → `x.portpack.selection.json`.
pub fn record_path_for(output: &Path) -> PathBuf {
    output.with_extension("selection.json")
}

/// Name of the project at `root` (its directory name).
pub fn project_name(root: &Path) -> String {
    root.canonicalize()
        .ok()
        .and_then(|p| p.file_name().map(|n| n.to_string_lossy().into_owned()))
        .unwrap_or_else(|| "project".to_string())
}

/// Select files under `options.root`, package them and write the artifact.
///
/// The mapping is loaded and validated before the walk starts, and nothing
/// is written until selection has finished, so an abort or a structural
/// error leaves no output behind.
pub fn build(options: &BuildOptions, source: &mut dyn DecisionSource) -> Result<BuildSummary> {
    let mapping = options
        .mapping
        .as_deref()
        .map(MappingResolver::load)
        .transpose()?;
    if let Some(mapping) = &mapping {
        for (scope, ambiguities) in mapping.ambiguities() {
            for ambiguity in ambiguities {
                warn!(
                    "scope {}: placeholder '{}' is used for several values; reconstruction cannot restore {:?}",
                    scope, ambiguity.placeholder, ambiguity.dropped
                );
            }
        }
    }

    let matcher = select_matcher(&options.root, options.ignore_oracle)?;
    debug!("ignore matcher: {}", matcher.name());

    let record_path = options.write_record.then(|| record_path_for(&options.output));
    let program = std::env::current_exe().ok();

    let filter = PathFilter::new()
        .with_self_path(program.as_deref().and_then(|p| rel_to_root(&options.root, p)))
        .with_self_path(rel_to_root(&options.root, &options.output))
        .with_self_path(record_path.as_deref().and_then(|p| rel_to_root(&options.root, p)))
        .with_mapping_path(options.mapping.as_deref().and_then(|p| rel_to_root(&options.root, p)))
        .with_ignore_folders(mapping.as_ref().map(|m| m.ignore_folders()).unwrap_or_default())
        .include_vcs(options.include_vcs)
        .include_ignored(options.include_ignored)
        .with_matcher(matcher);

    let record = Selector::new(&options.root, &filter).select(source)?;
    info!("selected {} files", record.included.len());

    let created = Utc::now();
    let project = project_name(&options.root);
    let outcome = ArchiveBuilder::new(&options.root, project.clone())
        .with_mapping(mapping.as_ref())
        .with_progress(options.progress)
        .build(&record.included, &created.to_rfc3339());

    outcome.artifact.write(&options.output)?;

    if let Some(record_path) = &record_path {
        let output_name = options
            .output
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();
        record.write(record_path, &project, &output_name, created)?;
    }

    Ok(BuildSummary {
        output: options.output.clone(),
        record_path,
        files: outcome.artifact.files.len(),
        total_bytes: outcome.total_bytes,
        failures: outcome.failures,
        record,
    })
}

/// Inputs of a reconstruction.
#[derive(Debug, Clone)]
pub struct ReconstructOptions {
    pub artifact: PathBuf,
    pub mapping: Option<PathBuf>,
    pub target: PathBuf,
}

/// Read an artifact and write its files under `options.target`.
pub fn reconstruct(
    options: &ReconstructOptions,
    policy: &mut dyn OverwritePolicy,
) -> Result<ReconstructReport> {
    let mapping = options
        .mapping
        .as_deref()
        .map(MappingResolver::load)
        .transpose()?;
    let artifact = Artifact::read(&options.artifact)?;
    debug!(
        "artifact {} from {} with {} files",
        options.artifact.display(),
        artifact.project,
        artifact.files.len()
    );

    ArchiveReconstructor::new(&options.target)
        .with_mapping(mapping.as_ref())
        .reconstruct(&artifact, policy)
}
