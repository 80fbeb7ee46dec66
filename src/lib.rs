//! portpack - Portable, reversibly redacted project packages
//!
//! portpack packages a chosen subset of a project's files into one
//! self-contained artifact and rebuilds them elsewhere. Text can be replaced
//! with placeholders on the way out and restored on the way back in, using a
//! mapping specification that never travels with the artifact.
//!
//! ## Pipeline
//!
//! - [`PathFilter`] decides which paths are eligible (self-exclusion,
//!   mapping file, `ignore-folders`, VCS metadata, ignore rules).
//! - [`Selector`] walks the tree and asks a [`DecisionSource`] what to
//!   include, producing a [`SelectionRecord`].
//! - [`ArchiveBuilder`] applies forward substitutions from the
//!   [`MappingResolver`] and encodes every file into an [`Artifact`].
//! - [`ArchiveReconstructor`] decodes, applies inverse substitutions and
//!   writes files, consulting an [`OverwritePolicy`] for existing ones.

pub mod archive;
pub mod config;
pub mod error;
pub mod filter;
pub mod ignore_rules;
pub mod mapping;
pub mod pack;
pub mod paths;
pub mod prompt;
pub mod reconstruct;
pub mod record;
pub mod selector;
pub mod tree;
pub mod vcs;

// Re-export commonly used items
pub use archive::{ArchiveBuilder, Artifact, ArtifactEntry, BuildOutcome};
pub use config::ProjectConfig;
pub use error::{PackError, Result};
pub use filter::{ExclusionReason, PathFilter};
pub use ignore_rules::{select_matcher, IgnoreMatcher, IgnoreOracle, PatternIgnore};
pub use mapping::{Ambiguity, MappingResolver, MappingSpec, ResolvedRuleSet};
pub use pack::{build, reconstruct, BuildOptions, BuildSummary, ReconstructOptions};
pub use prompt::TerminalPrompt;
pub use reconstruct::{
    ArchiveReconstructor, NeverOverwrite, Outcome, OverwriteAll, OverwriteDecision,
    OverwritePolicy, ReconstructReport,
};
pub use record::SelectionRecord;
pub use selector::{
    AcceptAll, DecisionSource, DirectoryDecision, FileDecision, ScriptedDecisions, Selector,
};
pub use vcs::GitCheckIgnore;
