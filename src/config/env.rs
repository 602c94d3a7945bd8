// src/config/env.rs
// Environment-based configuration

use std::path::{Path, PathBuf};
use tracing::debug;

/// Treat blank values (e.g. `OPENAI_API_KEY=` in a .env file) as unset
pub fn non_blank(value: Option<String>) -> Option<String> {
    value.filter(|v| !v.trim().is_empty())
}

/// Load `.env` from the data directory, or the current directory as a fallback.
/// Variables already set in the process environment win.
pub fn load_dotenv(data_dir: &Path) -> Option<PathBuf> {
    let path = data_dir.join(".env");
    if path.exists() {
        match dotenvy::from_path(&path) {
            Ok(()) => Some(path),
            Err(e) => {
                debug!(path = %path.display(), error = %e, "Failed to load .env");
                None
            }
        }
    } else {
        dotenvy::dotenv().ok()
    }
}
