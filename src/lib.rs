//! An interactive conversation session with a remote completion engine.
//!
//! Operator lines are interpreted as commands (`import`, `model`, `lim`, `help`) followed by a
//! prompt.  Prompts are streamed to a [`CompletionEngine`] while the response is accumulated and
//! committed to the conversation log.  Fenced code blocks in responses are saved as artifacts,
//! and the whole log is written out when the session ends.

// Public modules
pub mod artifact;
pub mod attachment;
pub mod collector;
pub mod command;
pub mod config;
pub mod engine;
pub mod error;
pub mod logger;
pub mod observability;
pub mod render;
pub mod session;
pub mod types;

// Re-exports
pub use artifact::{ArtifactExtractor, SavedArtifact};
pub use attachment::{AttachmentPreparer, FileKind, MAX_ATTACHMENT_BYTES};
pub use collector::{ResponseStream, StreamingResponseCollector};
pub use command::{Command, CommandInterpreter, Interpretation, parse_line};
pub use config::{ChatArgs, SessionConfig};
pub use engine::{AnthropicEngine, CompletionEngine, FragmentStream, ModelRegistry};
pub use error::{Error, Result};
pub use logger::SessionLogger;
pub use observability::register_biometrics;
pub use render::{PlainTextRenderer, Renderer};
pub use session::{AttachOutcome, AttachedKind, ConversationSession, SessionState};
pub use types::*;
