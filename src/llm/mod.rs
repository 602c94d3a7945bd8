// src/llm/mod.rs
// LLM module exports and submodule declarations

mod http_client;
pub mod openai;
pub mod prompt;
pub mod provider;

pub use http_client::LlmHttpClient;
pub use openai::OpenAiClient;
pub use prompt::{build_instructions, build_summary_prompt, format_transcript};
pub use provider::{CompletionClient, Summarizer};
