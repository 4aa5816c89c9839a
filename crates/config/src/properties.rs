//! Reader for `key = value` configuration files
//!
//! One setting per line. Blank lines and lines starting with `#` are
//! ignored, and whitespace around keys and values is trimmed. A line that
//! does not split into exactly two pieces on `=` is skipped with a warning.

use std::path::Path;
use tracing::warn;

use crate::{ConfigError, Result};

/// Settings read from a configuration file, in file order
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PropertiesFile {
    entries: Vec<(String, String)>,
    skipped: Vec<String>,
}

impl PropertiesFile {
    /// Read and parse a configuration file
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;

        Ok(Self::parse(&text))
    }

    /// Parse configuration text
    pub fn parse(text: &str) -> Self {
        let mut file = Self::default();

        for line in text.lines() {
            let line = line.trim();
            if line.is_empty() || line.starts_with('#') {
                continue;
            }

            let pieces: Vec<&str> = line.split('=').collect();
            if let [key, value] = pieces.as_slice() {
                file.entries
                    .push((key.trim().to_string(), value.trim().to_string()));
            } else {
                warn!(line = %line, "Too many pieces in the configuration file line; skipping");
                file.skipped.push(line.to_string());
            }
        }

        file
    }

    /// All accepted settings in file order
    pub fn entries(&self) -> &[(String, String)] {
        &self.entries
    }

    /// Lines that were rejected while parsing
    pub fn skipped(&self) -> &[String] {
        &self.skipped
    }

    /// Value of a setting; the last occurrence wins
    pub fn get(&self, key: &str) -> Option<&str> {
        self.entries
            .iter()
            .rev()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.as_str())
    }
}
