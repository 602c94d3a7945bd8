//! Slash command parsing for the REPL

use std::path::PathBuf;

/// Default number of turns shown by /history
pub const DEFAULT_HISTORY_LIMIT: usize = 10;

/// A parsed line of REPL input
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    Help,
    Quit,
    /// `/image <path> [prompt]`
    Image {
        path: PathBuf,
        prompt: Option<String>,
    },
    Summary,
    History(usize),
    Session,
    /// Anything not starting with `/`
    Message(String),
    /// Recognized command used wrongly
    Usage(&'static str),
    Unknown(String),
}

impl Command {
    /// Parse a trimmed, non-empty input line
    pub fn parse(line: &str) -> Self {
        let line = line.trim();
        if !line.starts_with('/') {
            return Self::Message(line.to_string());
        }

        let (command, arg) = match line.split_once(char::is_whitespace) {
            Some((command, arg)) => (command, arg.trim()),
            None => (line, ""),
        };

        match command {
            "/help" | "/h" => Self::Help,
            "/quit" | "/q" | "/exit" => Self::Quit,
            "/summary" => Self::Summary,
            "/session" => Self::Session,
            "/history" => {
                if arg.is_empty() {
                    return Self::History(DEFAULT_HISTORY_LIMIT);
                }
                match arg.parse::<usize>() {
                    Ok(n) if n > 0 => Self::History(n),
                    _ => Self::Usage("Usage: /history [n]  (n > 0)"),
                }
            }
            "/image" => {
                if arg.is_empty() {
                    return Self::Usage("Usage: /image <path> [prompt]");
                }
                let (path, prompt) = match arg.split_once(char::is_whitespace) {
                    Some((path, prompt)) => (path, Some(prompt.trim())),
                    None => (arg, None),
                };
                Self::Image {
                    path: expand_home(path),
                    prompt: prompt.filter(|p| !p.is_empty()).map(str::to_string),
                }
            }
            other => Self::Unknown(other.to_string()),
        }
    }
}

/// Expand a leading `~/` to the home directory
fn expand_home(path: &str) -> PathBuf {
    match path.strip_prefix("~/") {
        Some(rest) => dirs::home_dir()
            .map(|home| home.join(rest))
            .unwrap_or_else(|| PathBuf::from(path)),
        None => PathBuf::from(path),
    }
}

pub const HELP: &str = "Commands:
  /help, /h                 - Show this help
  /image <path> [prompt]    - Send an image (png, jpeg, webp)
  /summary                  - Show the running summary
  /history [n]              - Show the last n messages (default 10)
  /session                  - Show session info
  /quit, /q, /exit          - Exit";

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_plain_message() {
        assert_eq!(
            Command::parse("  what is a monad? "),
            Command::Message("what is a monad?".into())
        );
    }

    #[test]
    fn test_aliases() {
        assert_eq!(Command::parse("/h"), Command::Help);
        assert_eq!(Command::parse("/help"), Command::Help);
        assert_eq!(Command::parse("/q"), Command::Quit);
        assert_eq!(Command::parse("/exit"), Command::Quit);
        assert_eq!(Command::parse("/summary"), Command::Summary);
        assert_eq!(Command::parse("/session"), Command::Session);
        assert_eq!(Command::parse("/nope"), Command::Unknown("/nope".into()));
    }

    #[test]
    fn test_history_limit() {
        assert_eq!(Command::parse("/history"), Command::History(DEFAULT_HISTORY_LIMIT));
        assert_eq!(Command::parse("/history 3"), Command::History(3));
        assert!(matches!(Command::parse("/history 0"), Command::Usage(_)));
        assert!(matches!(Command::parse("/history abc"), Command::Usage(_)));
    }

    #[test]
    fn test_image_args() {
        assert_eq!(
            Command::parse("/image shot.png"),
            Command::Image {
                path: PathBuf::from("shot.png"),
                prompt: None
            }
        );
        assert_eq!(
            Command::parse("/image /tmp/a.jpg  explain this diagram"),
            Command::Image {
                path: PathBuf::from("/tmp/a.jpg"),
                prompt: Some("explain this diagram".into())
            }
        );
        assert!(matches!(Command::parse("/image"), Command::Usage(_)));
    }
}
