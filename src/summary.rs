// src/summary.rs
// Running summary updater

use tracing::{debug, info, warn};

use crate::db::Store;
use crate::llm::Summarizer;

/// Outcome of a refresh check
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SummaryRefresh {
    /// Message count is not a multiple of the interval
    Skipped,
    /// New summary was saved
    Refreshed(String),
    /// Refresh was due but failed; the previous summary is untouched
    Failed,
}

/// Whether a session with `count` messages is due for a refresh
pub fn refresh_due(count: i64, every_n: usize) -> bool {
    every_n > 0 && count > 0 && count % every_n as i64 == 0
}

/// Refresh the running summary when the session's message count hits a
/// multiple of `every_n`.
///
/// Summarizes the last `every_n` turns, folding in the existing summary.
/// Errors are logged and reported as `Failed`; they never reach the caller.
pub async fn maybe_refresh_summary(
    store: &Store,
    summarizer: &dyn Summarizer,
    session_id: i64,
    every_n: usize,
) -> SummaryRefresh {
    let count = match store.count_messages(session_id) {
        Ok(count) => count,
        Err(e) => {
            warn!(session_id, error = %e, "Failed to count messages for summary refresh");
            return SummaryRefresh::Failed;
        }
    };

    if !refresh_due(count, every_n) {
        debug!(session_id, count, every_n, "Summary refresh not due");
        return SummaryRefresh::Skipped;
    }

    let window = match store.get_context(session_id, every_n) {
        Ok(window) => window,
        Err(e) => {
            warn!(session_id, error = %e, "Failed to load turns for summary refresh");
            return SummaryRefresh::Failed;
        }
    };

    let summary = match summarizer
        .summarize(window.summary.as_deref(), &window.turns)
        .await
    {
        Ok(summary) if !summary.trim().is_empty() => summary.trim().to_string(),
        Ok(_) => {
            warn!(session_id, "Summarizer returned an empty summary");
            return SummaryRefresh::Failed;
        }
        Err(e) => {
            warn!(session_id, error = %e, "Failed to update running summary");
            return SummaryRefresh::Failed;
        }
    };

    if let Err(e) = store.save_summary(session_id, &summary) {
        warn!(session_id, error = %e, "Failed to save running summary");
        return SummaryRefresh::Failed;
    }

    info!(session_id, count, "Running summary refreshed");
    SummaryRefresh::Refreshed(summary)
}
