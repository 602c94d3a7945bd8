// src/config/file.rs
// File-based configuration from ~/.minerva/config.toml

use serde::Deserialize;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

/// Top-level config structure. Every field is optional; missing values fall
/// back to environment variables or built-in defaults.
#[derive(Debug, Deserialize, Default)]
pub struct MinervaConfig {
    /// OpenAI API key
    pub openai_api_key: Option<String>,

    /// SQLite database file
    pub db_path: Option<PathBuf>,

    /// Directory where image payloads are written
    pub images_dir: Option<PathBuf>,

    /// Model used for completions and summaries
    pub model: Option<String>,

    pub max_output_tokens: Option<u32>,

    /// Number of recent turns sent with each request
    pub context_limit: Option<usize>,

    /// Refresh the running summary every N messages
    pub summary_every_n: Option<usize>,

    /// Label stored in the sender column for assistant turns
    pub assistant_label: Option<String>,

    /// System persona sent as instructions
    pub persona: Option<String>,
}

impl MinervaConfig {
    /// Load config from ~/.minerva/config.toml
    pub fn load() -> Self {
        Self::load_from(&config_path())
    }

    /// Load config from an explicit path, falling back to defaults when the
    /// file is missing or unparsable.
    pub fn load_from(path: &Path) -> Self {
        match std::fs::read_to_string(path) {
            Ok(contents) => match toml::from_str(&contents) {
                Ok(config) => {
                    debug!(path = %path.display(), "Loaded config from file");
                    config
                }
                Err(e) => {
                    warn!(path = %path.display(), error = %e, "Failed to parse config file");
                    Self::default()
                }
            },
            Err(_) => {
                debug!(path = %path.display(), "Config file not found, using defaults");
                Self::default()
            }
        }
    }
}

/// Directory holding the database, images, history and config
pub fn data_dir() -> PathBuf {
    dirs::home_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(".minerva")
}

/// Get the config file path
pub fn config_path() -> PathBuf {
    data_dir().join("config.toml")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_config_default() {
        let config = MinervaConfig::default();
        assert!(config.openai_api_key.is_none());
        assert!(config.summary_every_n.is_none());
    }

    #[test]
    fn test_config_path() {
        let path = config_path();
        assert!(path.to_string_lossy().contains(".minerva"));
        assert!(path.to_string_lossy().ends_with("config.toml"));
    }

    #[test]
    fn test_load_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(
            &path,
            r#"
model = "gpt-5-mini"
summary_every_n = 4
images_dir = "/tmp/minerva-images"
"#,
        )
        .unwrap();

        let config = MinervaConfig::load_from(&path);
        assert_eq!(config.model.as_deref(), Some("gpt-5-mini"));
        assert_eq!(config.summary_every_n, Some(4));
        assert_eq!(config.images_dir, Some(PathBuf::from("/tmp/minerva-images")));
        assert!(config.db_path.is_none());
    }

    #[test]
    fn test_load_from_invalid_file_falls_back() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(&path, "summary_every_n = \"three\"").unwrap();

        let config = MinervaConfig::load_from(&path);
        assert!(config.summary_every_n.is_none());
    }

    #[test]
    fn test_load_from_missing_file() {
        let config = MinervaConfig::load_from(Path::new("/nonexistent/minerva/config.toml"));
        assert!(config.model.is_none());
    }
}
