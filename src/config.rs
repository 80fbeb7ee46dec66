//! Per-project defaults from `portpack.toml`.

use crate::error::{PackError, Result};
use crate::ignore_rules::IgnoreOracle;

use serde::Deserialize;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};

/// File name looked up in the project root.
pub const CONFIG_FILE: &str = "portpack.toml";

/// Defaults for `build`; command-line flags take precedence.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "kebab-case", deny_unknown_fields)]
pub struct ProjectConfig {
    pub output: Option<PathBuf>,
    pub mapping: Option<PathBuf>,
    #[serde(default)]
    pub include_vcs: bool,
    #[serde(default)]
    pub include_ignored: bool,
    pub ignore_oracle: Option<IgnoreOracle>,
}

impl ProjectConfig {
    /// Load `<root>/portpack.toml`; a missing file yields the defaults.
    ///
    /// Relative `output` and `mapping` paths are resolved against `root`,
    /// not the working directory.
    pub fn load(root: &Path) -> Result<Self> {
        let path = root.join(CONFIG_FILE);
        let content = match fs::read_to_string(&path) {
            Ok(content) => content,
            Err(err) if err.kind() == io::ErrorKind::NotFound => return Ok(Self::default()),
            Err(err) => return Err(PackError::io(path, err)),
        };
        let config: Self = toml::from_str(&content).map_err(|err| PackError::Config {
            path,
            reason: err.to_string(),
        })?;
        Ok(Self {
            output: config.output.map(|p| root.join(p)),
            mapping: config.mapping.map(|p| root.join(p)),
            ..config
        })
    }
}
