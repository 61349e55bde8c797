//! Command allow-list
//!
//! Only the leading whitespace-delimited token is inspected. The command line
//! is handed to a shell afterwards, so anything chained after an allowed token
//! (`ffmpeg -version; rm x`, `echo a && b`, pipes) runs unchecked. This is a
//! known limitation; callers are expected to send a single command.

use std::collections::HashSet;
use tracing::warn;

/// Decides whether a command line may be started.
#[derive(Debug, Clone)]
pub struct CommandAuthorizer {
    allowed: HashSet<String>,
}

impl CommandAuthorizer {
    /// Build an authorizer from allowed leading tokens.
    pub fn new<I, S>(allowed: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let allowed = allowed
            .into_iter()
            .map(|s| s.as_ref().trim().to_string())
            .filter(|s| !s.is_empty())
            .collect();
        Self { allowed }
    }

    /// Leading token of a command line, if any.
    #[must_use]
    pub fn leading_token(command_line: &str) -> Option<&str> {
        command_line.split_whitespace().next()
    }

    /// Whether the command's leading token is in the allow-list.
    #[must_use]
    pub fn is_allowed(&self, command_line: &str) -> bool {
        let allowed = Self::leading_token(command_line)
            .map(|token| self.allowed.contains(token))
            .unwrap_or(false);
        if !allowed {
            warn!(command = %command_line, "Command rejected by allow-list");
        }
        allowed
    }

    /// Allowed tokens, sorted.
    #[must_use]
    pub fn allowed_commands(&self) -> Vec<&str> {
        let mut list: Vec<&str> = self.allowed.iter().map(String::as_str).collect();
        list.sort_unstable();
        list
    }
}
