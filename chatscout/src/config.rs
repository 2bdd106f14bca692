use config::{Config as ConfigBuilder, ConfigError, File};
use serde::{Deserialize, Serialize};
use std::num::NonZeroUsize;
use std::path::{Path, PathBuf};

use crate::pattern::PatternOptions;

/// Configuration for searching a transcript archive
///
/// # Configuration Locations
///
/// The configuration can be loaded from multiple locations in order of precedence:
/// 1. Custom config file specified via `--config` flag
/// 2. Local `.chatscout.yaml` in the current directory
/// 3. Global `$HOME/.config/chatscout/config.yaml`
///
/// # Configuration Format
///
/// ```yaml
/// # Default pattern flags
/// options:
///   case_insensitive: true
///   multiline: false
///
/// # "all" keeps every match per chat, "first" stops at the first one
/// match_mode: all
///
/// # Threads scanning the chats of one buddy (default: CPU cores)
/// thread_count: 4
///
/// # How to treat invalid UTF-8 in transcripts (failfast|lossy)
/// encoding_mode: lossy
///
/// # Transcript extensions loaded from an archive directory
/// file_extensions: ["txt", "log"]
///
/// # Log level (trace, debug, info, warn, error)
/// log_level: "info"
/// ```
///
/// Command-line arguments take precedence over config file values; see
/// [`SearchConfig::merge_with_cli`].
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SearchConfig {
    /// Pattern flags used when a search does not give its own
    #[serde(default)]
    pub options: PatternOptions,

    /// How many matches are kept per chat
    #[serde(default)]
    pub match_mode: MatchMode,

    /// Number of threads scanning the chats of one buddy
    #[serde(default = "default_thread_count")]
    pub thread_count: NonZeroUsize,

    /// How invalid UTF-8 in transcript files is handled
    #[serde(default)]
    pub encoding_mode: EncodingMode,

    /// Optional list of transcript extensions to load (e.g., ["txt", "log"])
    /// If None, every file in the archive is loaded
    #[serde(default)]
    pub file_extensions: Option<Vec<String>>,

    /// Log level (trace, debug, info, warn, error)
    #[serde(default = "default_log_level")]
    pub log_level: String,
}

/// How many matches the engine records for a chat
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MatchMode {
    /// Every match in the chat, with its capture groups
    #[default]
    All,
    /// Stop at the first match; the chat is reported with that one match
    First,
}

/// How to decode transcript bytes that are not valid UTF-8
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EncodingMode {
    /// Treat the chat as unreadable; the scan skips it
    FailFast,
    /// Replace invalid sequences with U+FFFD and keep going
    #[default]
    Lossy,
}

fn default_thread_count() -> NonZeroUsize {
    NonZeroUsize::new(num_cpus::get()).unwrap_or(NonZeroUsize::MIN)
}

fn default_log_level() -> String {
    "warn".to_string()
}

impl Default for SearchConfig {
    fn default() -> Self {
        Self {
            options: PatternOptions::default(),
            match_mode: MatchMode::default(),
            thread_count: default_thread_count(),
            encoding_mode: EncodingMode::default(),
            file_extensions: None,
            log_level: default_log_level(),
        }
    }
}

impl SearchConfig {
    /// Loads configuration from the default locations
    pub fn load() -> Result<Self, ConfigError> {
        Self::load_from(None)
    }

    /// Loads configuration, layering an explicit file over the default locations
    pub fn load_from(config_path: Option<&Path>) -> Result<Self, ConfigError> {
        let mut builder = ConfigBuilder::builder();

        let config_files = [
            dirs::config_dir().map(|p| p.join("chatscout/config.yaml")),
            Some(PathBuf::from(".chatscout.yaml")),
        ];

        for path in config_files.iter().flatten() {
            if path.exists() {
                builder = builder.add_source(File::from(path.as_path()));
            }
        }

        // An explicit file must exist
        if let Some(path) = config_path {
            builder = builder.add_source(File::from(path).required(true));
        }

        builder.build()?.try_deserialize()
    }

    /// Merges CLI arguments with configuration file values
    pub fn merge_with_cli(mut self, cli: CliOverrides) -> Self {
        if let Some(options) = cli.options {
            self.options = options;
        }
        if let Some(match_mode) = cli.match_mode {
            self.match_mode = match_mode;
        }
        if let Some(thread_count) = cli.thread_count {
            self.thread_count = thread_count;
        }
        if let Some(encoding_mode) = cli.encoding_mode {
            self.encoding_mode = encoding_mode;
        }
        if cli.file_extensions.is_some() {
            self.file_extensions = cli.file_extensions;
        }
        if let Some(log_level) = cli.log_level {
            self.log_level = log_level;
        }
        self
    }
}

/// Values given on the command line; `None` leaves the file value in place
#[derive(Debug, Clone, Default)]
pub struct CliOverrides {
    pub options: Option<PatternOptions>,
    pub match_mode: Option<MatchMode>,
    pub thread_count: Option<NonZeroUsize>,
    pub encoding_mode: Option<EncodingMode>,
    pub file_extensions: Option<Vec<String>>,
    pub log_level: Option<String>,
}
