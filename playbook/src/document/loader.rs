//! Reading playbook documents from disk or text.

use super::playbook::Playbook;
use crate::errors::LoadError;
use crate::template::{resolve_params, EnvScope};
use serde_json::{Map, Value};
use std::collections::HashMap;
use std::path::Path;
use tracing::{debug, info};

/// Document syntax.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Format {
    /// YAML, the default.
    Yaml,
    /// JSON, chosen by a `.json` extension.
    Json,
}

impl Format {
    /// Picks the format from a file extension.
    #[must_use]
    pub fn from_path(path: &Path) -> Self {
        match path.extension().and_then(|e| e.to_str()) {
            Some(ext) if ext.eq_ignore_ascii_case("json") => Self::Json,
            _ => Self::Yaml,
        }
    }
}

impl Playbook {
    /// Parses and validates a document.
    ///
    /// # Errors
    ///
    /// `Yaml`/`Json` for malformed documents, `NoSteps` when the step list is
    /// absent or empty.
    pub fn parse(text: &str, format: Format) -> Result<Self, LoadError> {
        let playbook: Self = match format {
            Format::Yaml => serde_yaml::from_str(text)?,
            Format::Json => serde_json::from_str(text)?,
        };
        if playbook.steps.is_empty() {
            return Err(LoadError::NoSteps);
        }
        debug!(steps = playbook.steps.len(), "Parsed playbook");
        Ok(playbook)
    }

    /// Parses a YAML document.
    ///
    /// # Errors
    ///
    /// See [`Playbook::parse`].
    pub fn from_yaml_str(text: &str) -> Result<Self, LoadError> {
        Self::parse(text, Format::Yaml)
    }

    /// Reads and parses the document at `path`.
    ///
    /// # Errors
    ///
    /// `Read` if the file cannot be read, otherwise see [`Playbook::parse`].
    pub async fn load(path: impl AsRef<Path>) -> Result<Self, LoadError> {
        let path = path.as_ref();
        let text = tokio::fs::read_to_string(path)
            .await
            .map_err(|source| LoadError::Read {
                path: path.to_path_buf(),
                source,
            })?;
        let playbook = Self::parse(&text, Format::from_path(path))?;
        info!(
            playbook = %playbook.display_name(),
            path = %path.display(),
            steps = playbook.steps.len(),
            "Loaded playbook"
        );
        Ok(playbook)
    }

    /// Resolves `${env.*}` placeholders in the config section. Other
    /// placeholders are left as written.
    #[must_use]
    pub fn resolved_config(&self, env: &HashMap<String, String>) -> Map<String, Value> {
        resolve_params(&self.config, &EnvScope(env))
    }
}
