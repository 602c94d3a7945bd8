// src/config/mod.rs
// Configuration structs passed explicitly to each component

pub mod env;
pub mod file;

pub use file::{MinervaConfig, config_path, data_dir};

use std::path::PathBuf;

pub const DEFAULT_MODEL: &str = "gpt-5-nano";
pub const DEFAULT_MAX_OUTPUT_TOKENS: u32 = 5000;
pub const DEFAULT_CONTEXT_LIMIT: usize = 5;
pub const DEFAULT_SUMMARY_EVERY_N: usize = 3;
pub const DEFAULT_ASSISTANT_LABEL: &str = "minerva";
pub const DEFAULT_PERSONA: &str = "Your name is Minerva, a helpful AI assistant. \
Answer the user's questions in clear, easy-to-understand language and provide toy examples when relevant.";

/// Where the conversation store keeps its data
#[derive(Debug, Clone)]
pub struct StoreConfig {
    pub db_path: PathBuf,
    pub images_dir: PathBuf,
    /// Sender label written for assistant turns; normalized back on read
    pub assistant_label: String,
}

impl StoreConfig {
    pub fn new(db_path: impl Into<PathBuf>, images_dir: impl Into<PathBuf>) -> Self {
        Self {
            db_path: db_path.into(),
            images_dir: images_dir.into(),
            assistant_label: DEFAULT_ASSISTANT_LABEL.to_string(),
        }
    }

    pub fn with_assistant_label(mut self, label: impl Into<String>) -> Self {
        self.assistant_label = label.into();
        self
    }
}

/// Settings for the chat loop and the completion client
#[derive(Debug, Clone)]
pub struct ChatSettings {
    pub model: String,
    pub max_output_tokens: u32,
    pub context_limit: usize,
    pub summary_every_n: usize,
    pub persona: String,
}

impl Default for ChatSettings {
    fn default() -> Self {
        Self {
            model: DEFAULT_MODEL.to_string(),
            max_output_tokens: DEFAULT_MAX_OUTPUT_TOKENS,
            context_limit: DEFAULT_CONTEXT_LIMIT,
            summary_every_n: DEFAULT_SUMMARY_EVERY_N,
            persona: DEFAULT_PERSONA.to_string(),
        }
    }
}

/// Values supplied on the command line (clap also fills these from env vars)
#[derive(Debug, Clone, Default)]
pub struct Overrides {
    pub db_path: Option<PathBuf>,
    pub images_dir: Option<PathBuf>,
    pub model: Option<String>,
    pub max_output_tokens: Option<u32>,
    pub context_limit: Option<usize>,
    pub summary_every_n: Option<usize>,
    pub openai_api_key: Option<String>,
}

/// Fully resolved configuration
#[derive(Debug, Clone)]
pub struct Settings {
    pub store: StoreConfig,
    pub chat: ChatSettings,
    pub openai_api_key: Option<String>,
}

impl Settings {
    /// Resolve values: CLI args > env vars (handled by clap) > config file > defaults
    pub fn resolve(overrides: Overrides, file: MinervaConfig, data_dir: PathBuf) -> Self {
        let defaults = ChatSettings::default();

        let db_path = overrides
            .db_path
            .or(file.db_path)
            .unwrap_or_else(|| data_dir.join("minerva.db"));
        let images_dir = overrides
            .images_dir
            .or(file.images_dir)
            .unwrap_or_else(|| data_dir.join("images"));

        let mut store = StoreConfig::new(db_path, images_dir);
        if let Some(label) = file.assistant_label.filter(|l| !l.trim().is_empty()) {
            store = store.with_assistant_label(label);
        }

        let chat = ChatSettings {
            model: overrides.model.or(file.model).unwrap_or(defaults.model),
            max_output_tokens: overrides
                .max_output_tokens
                .or(file.max_output_tokens)
                .unwrap_or(defaults.max_output_tokens),
            context_limit: overrides
                .context_limit
                .or(file.context_limit)
                .unwrap_or(defaults.context_limit),
            summary_every_n: overrides
                .summary_every_n
                .or(file.summary_every_n)
                .unwrap_or(defaults.summary_every_n),
            persona: file.persona.unwrap_or(defaults.persona),
        };

        Self {
            store,
            chat,
            openai_api_key: env::non_blank(overrides.openai_api_key)
                .or_else(|| env::non_blank(file.openai_api_key)),
        }
    }
}
