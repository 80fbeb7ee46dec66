//! Terminal prompts for selection and overwrite questions.

use crate::error::{PackError, Result};
use crate::reconstruct::{OverwriteDecision, OverwritePolicy};
use crate::selector::{DecisionSource, DirectoryDecision, FileDecision};

use dialoguer::theme::ColorfulTheme;
use dialoguer::Select;

/// Asks the operator on the terminal. Escape or `q` aborts the run.
pub struct TerminalPrompt {
    theme: ColorfulTheme,
}

impl TerminalPrompt {
    pub fn new() -> Self {
        Self {
            theme: ColorfulTheme::default(),
        }
    }

    fn choose(&self, prompt: &str, items: &[&str]) -> Result<usize> {
        Select::with_theme(&self.theme)
            .with_prompt(prompt)
            .items(items)
            .default(0)
            .interact_opt()
            .map_err(|err| {
                PackError::CapabilityUnavailable(format!(
                    "interactive terminal ({}); use --all for unattended runs",
                    err
                ))
            })?
            .ok_or(PackError::Aborted)
    }
}

impl Default for TerminalPrompt {
    fn default() -> Self {
        Self::new()
    }
}

impl DecisionSource for TerminalPrompt {
    fn ask_directory(&mut self, rel: &str) -> Result<DirectoryDecision> {
        let choice = self.choose(
            &format!("Directory {}/", rel),
            &["Ask for each entry", "Include everything", "Skip"],
        )?;
        Ok(match choice {
            0 => DirectoryDecision::AskEach,
            1 => DirectoryDecision::IncludeAll,
            _ => DirectoryDecision::Skip,
        })
    }

    fn ask_file(&mut self, rel: &str) -> Result<FileDecision> {
        let choice = self.choose(&format!("File {}", rel), &["Include", "Exclude"])?;
        Ok(if choice == 0 {
            FileDecision::Include
        } else {
            FileDecision::Exclude
        })
    }
}

impl OverwritePolicy for TerminalPrompt {
    fn confirm(&mut self, rel: &str) -> Result<OverwriteDecision> {
        let choice = self.choose(
            &format!("{} already exists. Overwrite?", rel),
            &["No", "Yes", "Yes to all"],
        )?;
        Ok(match choice {
            1 => OverwriteDecision::Yes,
            2 => OverwriteDecision::All,
            _ => OverwriteDecision::No,
        })
    }
}
