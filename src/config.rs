//! Configuration types for the interactive session.
//!
//! This module provides CLI argument parsing via `arrrg` and the [`SessionConfig`] that a
//! session is built from.

use std::path::PathBuf;

use arrrg_derive::CommandLine;
use time::UtcOffset;

use crate::engine::DEFAULT_MODEL_KEY;

/// Default maximum response length.
pub const DEFAULT_RESPONSE_LIMIT: u32 = 512;

/// Default directory for conversation logs.
pub const DEFAULT_LOG_DIR: &str = "conv";

/// Default directory for extracted code artifacts.
pub const DEFAULT_ARTIFACT_DIR: &str = "code_artifacts";

/// Command-line arguments for the colloquy binary.
#[derive(CommandLine, Debug, Default, PartialEq, Eq)]
pub struct ChatArgs {
    /// Model key to start with.
    #[arrrg(optional, "Model key to use (default: haiku)", "KEY")]
    pub model: Option<String>,

    /// Maximum response length.
    #[arrrg(optional, "Max response length (default: 512)", "N")]
    pub lim: Option<u32>,

    /// Directory for conversation logs.
    #[arrrg(optional, "Directory for conversation logs (default: conv)", "DIR")]
    pub log_dir: Option<String>,

    /// Directory for extracted code artifacts.
    #[arrrg(
        optional,
        "Directory for code artifacts (default: code_artifacts)",
        "DIR"
    )]
    pub artifact_dir: Option<String>,

    /// Disable ANSI colors and styles.
    #[arrrg(flag, "Disable ANSI colors/styles")]
    pub no_color: bool,
}

/// Configuration for a session.
///
/// Holds the resolved values after applying defaults to command-line arguments.  The model key
/// is validated when the session is created, not here.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionConfig {
    /// The model key the session starts with.
    pub model_key: String,

    /// Maximum response length.
    pub response_limit: u32,

    /// Where conversation logs are written.
    pub log_dir: PathBuf,

    /// Where extracted code artifacts are written.
    pub artifact_dir: PathBuf,

    /// Whether to use ANSI colors and styles in output.
    pub use_color: bool,

    /// Offset used to name log files.
    pub utc_offset: UtcOffset,
}

impl SessionConfig {
    /// Creates a new SessionConfig with default values.
    ///
    /// Defaults:
    /// - Model key: haiku
    /// - Response limit: 512
    /// - Log directory: conv
    /// - Artifact directory: code_artifacts
    /// - Color: enabled
    /// - Log file offset: UTC
    pub fn new() -> Self {
        Self {
            model_key: DEFAULT_MODEL_KEY.to_string(),
            response_limit: DEFAULT_RESPONSE_LIMIT,
            log_dir: PathBuf::from(DEFAULT_LOG_DIR),
            artifact_dir: PathBuf::from(DEFAULT_ARTIFACT_DIR),
            use_color: true,
            utc_offset: UtcOffset::UTC,
        }
    }

    /// Sets the starting model key.
    pub fn with_model_key(mut self, key: impl Into<String>) -> Self {
        self.model_key = key.into();
        self
    }

    /// Sets the maximum response length.
    pub fn with_response_limit(mut self, limit: u32) -> Self {
        self.response_limit = limit;
        self
    }

    /// Sets the log directory.
    pub fn with_log_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.log_dir = dir.into();
        self
    }

    /// Sets the artifact directory.
    pub fn with_artifact_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.artifact_dir = dir.into();
        self
    }

    /// Disables ANSI color output.
    pub fn without_color(mut self) -> Self {
        self.use_color = false;
        self
    }

    /// Sets the offset log files are named in.
    pub fn with_utc_offset(mut self, offset: UtcOffset) -> Self {
        self.utc_offset = offset;
        self
    }
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self::new()
    }
}

impl From<ChatArgs> for SessionConfig {
    fn from(args: ChatArgs) -> Self {
        let defaults = SessionConfig::new();
        SessionConfig {
            model_key: args.model.unwrap_or(defaults.model_key),
            response_limit: args.lim.unwrap_or(defaults.response_limit),
            log_dir: args.log_dir.map(PathBuf::from).unwrap_or(defaults.log_dir),
            artifact_dir: args
                .artifact_dir
                .map(PathBuf::from)
                .unwrap_or(defaults.artifact_dir),
            use_color: !args.no_color,
            utc_offset: defaults.utc_offset,
        }
    }
}
