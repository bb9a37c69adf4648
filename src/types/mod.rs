// Public modules
pub mod content_block;
pub mod message;

// Re-exports
pub use content_block::{ContentBlock, ImageMediaType};
pub use message::{ConversationLog, Message, MessageContent, Role};
