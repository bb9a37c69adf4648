//! Core conversation session state.
//!
//! This module provides the [`ConversationSession`] which owns the conversation log together
//! with the active model and response limit.  Everything that changes the session goes through
//! one of its methods.

use std::path::{Path, PathBuf};

use crate::attachment::{AttachmentPreparer, check_size, display_name};
use crate::config::SessionConfig;
use crate::engine::ModelRegistry;
use crate::error::{Error, Result};
use crate::logger::SessionLogger;
use crate::observability::{ATTACHMENT_ERRORS, ATTACHMENT_OVERSIZE, ATTACHMENTS};
use crate::types::{ContentBlock, ConversationLog, Message};

/// The mutable state of one session.
#[derive(Debug, Clone, PartialEq)]
pub struct SessionState {
    /// The ordered message history.
    pub log: ConversationLog,
    /// The vendor model identifier requests are sent to.
    pub model_id: String,
    /// Maximum response length requested from the engine.
    pub response_limit: u32,
}

/// What happened to one path passed to [`ConversationSession::attach`].
#[derive(Debug, Clone)]
pub struct AttachOutcome {
    /// The path as given.
    pub path: PathBuf,
    /// `Ok` with the kind of block produced, or the reason the path was skipped.
    pub result: Result<AttachedKind>,
}

impl AttachOutcome {
    /// True if the path produced a content block.
    pub fn is_attached(&self) -> bool {
        self.result.is_ok()
    }
}

/// The kind of block an attachment produced.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum AttachedKind {
    /// A text block (plain text or extracted PDF text).
    Text,
    /// An image block.
    Image,
}

/// A conversation session that owns its state.
pub struct ConversationSession {
    state: SessionState,
    models: ModelRegistry,
    preparer: AttachmentPreparer,
    logger: SessionLogger,
}

impl ConversationSession {
    /// Creates a new session using `models` to resolve model keys.
    ///
    /// Fails with [`Error::InvalidModelKey`] if the configured model key is not registered.
    pub fn new(config: &SessionConfig, models: ModelRegistry) -> Result<Self> {
        let model_id = models.resolve(&config.model_key)?.to_string();
        Ok(Self {
            state: SessionState {
                log: ConversationLog::new(),
                model_id,
                response_limit: config.response_limit,
            },
            models,
            preparer: AttachmentPreparer::new(),
            logger: SessionLogger::new(&config.log_dir).with_utc_offset(config.utc_offset),
        })
    }

    /// Attach files to the conversation.
    ///
    /// Each path is size-checked and then prepared; paths that fail are reported in the returned
    /// outcomes and skipped.  All prepared blocks go into a single user message, followed by one
    /// assistant acknowledgement that names the last file attached.  Nothing is appended when
    /// every path fails.
    pub fn attach<P: AsRef<Path>>(&mut self, paths: &[P]) -> Vec<AttachOutcome> {
        let mut blocks = Vec::new();
        let mut last_attached = None;
        let mut outcomes = Vec::with_capacity(paths.len());
        for path in paths {
            let path = path.as_ref();
            let result = self.prepare_guarded(path);
            let result = match result {
                Ok(block) => {
                    ATTACHMENTS.click();
                    let kind = if block.is_image() {
                        AttachedKind::Image
                    } else {
                        AttachedKind::Text
                    };
                    blocks.push(block);
                    last_attached = Some(display_name(path));
                    Ok(kind)
                }
                Err(err) => {
                    ATTACHMENT_ERRORS.click();
                    if matches!(err, Error::FileTooLarge { .. }) {
                        ATTACHMENT_OVERSIZE.click();
                    }
                    tracing::warn!(path = %path.display(), error = %err, "skipping attachment");
                    Err(err)
                }
            };
            outcomes.push(AttachOutcome {
                path: path.to_path_buf(),
                result,
            });
        }
        if let Some(name) = last_attached {
            self.state.log.push(Message::user_blocks(blocks));
            self.state.log.push(Message::assistant(acknowledgement(&name)));
        }
        outcomes
    }

    // The only place a file reaches the preparer: oversized and missing files stop here.
    fn prepare_guarded(&self, path: &Path) -> Result<ContentBlock> {
        check_size(path)?;
        self.preparer.prepare(path)
    }

    /// Switch to the model registered under `key`.
    ///
    /// Returns the new model identifier; on an unknown key the active model is unchanged.
    pub fn set_model(&mut self, key: &str) -> Result<&str> {
        let model_id = self.models.resolve(key)?.to_string();
        self.state.model_id = model_id;
        Ok(&self.state.model_id)
    }

    /// Set the maximum response length.
    pub fn set_limit(&mut self, limit: u32) {
        self.state.response_limit = limit;
    }

    /// Append a user message with plain text content.
    pub fn append_user_text(&mut self, text: impl Into<String>) {
        self.state.log.push(Message::user(text));
    }

    /// Append an assistant message with plain text content.
    pub fn commit_assistant_text(&mut self, text: impl Into<String>) {
        self.state.log.push(Message::assistant(text));
    }

    /// The conversation so far.
    pub fn log(&self) -> &ConversationLog {
        &self.state.log
    }

    /// The full session state.
    pub fn state(&self) -> &SessionState {
        &self.state
    }

    /// The active model identifier.
    pub fn model_id(&self) -> &str {
        &self.state.model_id
    }

    /// The active response limit.
    pub fn response_limit(&self) -> u32 {
        self.state.response_limit
    }

    /// Returns the number of messages in the conversation.
    pub fn message_count(&self) -> usize {
        self.state.log.len()
    }

    /// The registry model keys are resolved against.
    pub fn models(&self) -> &ModelRegistry {
        &self.models
    }

    /// Write the conversation log to a new file and return its path.
    pub fn flush_log(&self) -> Result<PathBuf> {
        self.logger.flush(&self.state.log)
    }
}

fn acknowledgement(name: &str) -> String {
    format!(
        "Thank you for sharing {name} with me. I understand it to be a file named {name} from your computer, and copied into the message window. However, I will consider to it as being 'imported'. What else can I help you with?"
    )
}
