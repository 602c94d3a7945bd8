// src/llm/prompt.rs
// Prompt text for completion and summarization calls

use crate::db::{MessageKind, Turn};

/// Instruction placed ahead of the transcript when summarizing
const SUMMARY_INSTRUCTIONS: &str = "Craft a summary about the given messages. \
Keep the main points of the conversation while maintaining the context in a concise manner. \
Consider how the conversation has evolved over time.";

/// Rule between transcript entries
const TRANSCRIPT_SEPARATOR_WIDTH: usize = 40;

/// Render turns as `Sender / Content / Type / Timestamp` blocks, one per turn,
/// each closed by a dashed rule.
pub fn format_transcript(turns: &[Turn]) -> String {
    let rule = "-".repeat(TRANSCRIPT_SEPARATOR_WIDTH);
    turns
        .iter()
        .map(|turn| {
            let content = match (turn.kind(), turn.text_content()) {
                (_, Some(text)) => text,
                (MessageKind::Image, None) => "(image unavailable)",
                (MessageKind::Text, None) => "",
            };
            format!(
                "Sender: {}\nContent: {}\nType: {}\nTimestamp: {}\n{}",
                turn.sender,
                content,
                turn.kind(),
                turn.timestamp,
                rule
            )
        })
        .collect::<Vec<_>>()
        .join("\n")
}

/// Prompt asking for an updated running summary.
///
/// The existing summary is included so the result extends it rather than
/// replacing it with a summary of the latest turns only.
pub fn build_summary_prompt(existing: Option<&str>, turns: &[Turn]) -> String {
    let mut prompt = SUMMARY_INSTRUCTIONS.to_string();

    if let Some(existing) = existing.map(str::trim).filter(|s| !s.is_empty()) {
        prompt.push_str(
            "\n\nUpdate the current summary below with the new messages, \
             keeping anything from it that still matters.\n\nCurrent summary:\n",
        );
        prompt.push_str(existing);
    }

    prompt.push_str("\n\nMessages:\n");
    prompt.push_str(&format_transcript(turns));
    prompt
}

/// System instructions for a chat completion: persona, then the running
/// summary when there is one.
pub fn build_instructions(persona: &str, summary: Option<&str>) -> Option<String> {
    let persona = persona.trim();
    let summary = summary.map(str::trim).filter(|s| !s.is_empty());

    let mut parts = Vec::new();
    if !persona.is_empty() {
        parts.push(persona.to_string());
    }
    if let Some(summary) = summary {
        parts.push(format!("Summary of the conversation so far:\n{}", summary));
    }

    if parts.is_empty() {
        None
    } else {
        Some(parts.join("\n\n"))
    }
}
