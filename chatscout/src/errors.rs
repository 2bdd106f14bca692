/// This module defines the error types for chatscout, demonstrating Rust's error handling
/// compared to .NET's exception system.
///
/// # Rust vs .NET Error Handling
///
/// .NET would surface a bad pattern as an exception thrown from deep inside the search:
/// ```csharp
/// try {
///     engine.StartSearch(term);
/// } catch (ArgumentException ex) {
///     // Invalid pattern
/// }
/// ```
///
/// Rust returns the failure from the call that caused it:
/// ```rust,ignore
/// match engine.start_search(&corpus, term, options) {
///     Ok(session) => // Wait for events,
///     Err(SearchError::PatternCompile { offset, .. }) => // Point at the bad character,
///     Err(e) => // Handle other errors
/// }
/// ```
///
/// # Error Classes
///
/// 1. **Caller errors** (`PatternCompile`, `NoSuchGroup`, `ConfigError`) propagate
///    synchronously to whoever made the call.
/// 2. **Per-chat errors** (`ChatNotFound`, `PermissionDenied`, `EncodingError`,
///    `TranscriptUnavailable`, `IoError`) are produced while loading one transcript.
///    The search engine logs them, counts them and moves on to the next chat.
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Result type for chatscout operations
pub type Result<T> = std::result::Result<T, SearchError>;

/// Errors that can occur while compiling patterns, inspecting matches or scanning chats
#[derive(Error, Debug)]
pub enum SearchError {
    #[error("{}", describe_compile_error(.pattern, .offset, .message))]
    PatternCompile {
        pattern: String,
        offset: Option<usize>,
        message: String,
    },
    #[error("No such group: {0}")]
    NoSuchGroup(String),
    #[error("Chat transcript not found: {0}")]
    ChatNotFound(PathBuf),
    #[error("Permission denied: {0}")]
    PermissionDenied(PathBuf),
    #[error("Transcript {source_id} is unavailable: {reason}")]
    TranscriptUnavailable { source_id: String, reason: String },
    #[error("Archive error: {0}")]
    ArchiveError(String),
    #[error("Configuration error: {0}")]
    ConfigError(String),
    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),
    #[error("Invalid UTF-8 in transcript {path}: {source}")]
    EncodingError {
        path: PathBuf,
        source: std::string::FromUtf8Error,
    },
}

fn describe_compile_error(pattern: &str, offset: &Option<usize>, message: &str) -> String {
    match offset {
        Some(offset) => format!(
            "Invalid pattern '{}' at offset {}: {}",
            pattern, offset, message
        ),
        None => format!("Invalid pattern '{}': {}", pattern, message),
    }
}

impl SearchError {
    pub fn invalid_pattern(
        pattern: impl Into<String>,
        offset: Option<usize>,
        message: impl Into<String>,
    ) -> Self {
        Self::PatternCompile {
            pattern: pattern.into(),
            offset,
            message: message.into(),
        }
    }

    pub fn no_such_group(group: impl ToString) -> Self {
        Self::NoSuchGroup(group.to_string())
    }

    pub fn chat_not_found(path: impl Into<PathBuf>) -> Self {
        Self::ChatNotFound(path.into())
    }

    pub fn permission_denied(path: impl Into<PathBuf>) -> Self {
        Self::PermissionDenied(path.into())
    }

    pub fn transcript_unavailable(source_id: impl Into<String>, reason: impl ToString) -> Self {
        Self::TranscriptUnavailable {
            source_id: source_id.into(),
            reason: reason.to_string(),
        }
    }

    pub fn archive_error(msg: impl Into<String>) -> Self {
        Self::ArchiveError(msg.into())
    }

    pub fn config_error(msg: impl Into<String>) -> Self {
        Self::ConfigError(msg.into())
    }

    pub fn encoding_error(path: impl Into<PathBuf>, source: std::string::FromUtf8Error) -> Self {
        Self::EncodingError {
            path: path.into(),
            source,
        }
    }

    /// Maps an I/O failure on a transcript file to the matching variant
    pub fn from_io(path: &Path, err: std::io::Error) -> Self {
        match err.kind() {
            std::io::ErrorKind::NotFound => Self::chat_not_found(path),
            std::io::ErrorKind::PermissionDenied => Self::permission_denied(path),
            _ => Self::IoError(err),
        }
    }

    /// True for errors that only affect a single chat during a scan
    pub fn is_per_chat(&self) -> bool {
        matches!(
            self,
            Self::ChatNotFound(_)
                | Self::PermissionDenied(_)
                | Self::TranscriptUnavailable { .. }
                | Self::EncodingError { .. }
                | Self::IoError(_)
        )
    }
}
