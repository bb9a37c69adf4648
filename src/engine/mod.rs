//! The completion engine seam.
//!
//! The session core never talks to a network itself.  It asks a [`CompletionEngine`] to turn
//! the conversation log into text, either all at once or as a stream of fragments.  The engine
//! also owns the [`ModelRegistry`] that maps short model keys to vendor model identifiers.

use std::collections::BTreeMap;
use std::pin::Pin;

use futures::Stream;

use crate::error::{Error, Result};
use crate::types::Message;

mod anthropic;
mod sse;

pub use anthropic::AnthropicEngine;

/// A finite, non-restartable stream of response text fragments.
pub type FragmentStream = Pin<Box<dyn Stream<Item = Result<String>> + Send>>;

/// The model key selected when none is configured.
pub const DEFAULT_MODEL_KEY: &str = "haiku";

/// Maps short model keys to vendor-qualified model identifiers.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ModelRegistry {
    models: BTreeMap<String, String>,
}

impl ModelRegistry {
    /// Create a registry from `(key, model_id)` pairs.
    pub fn new<K, V>(entries: impl IntoIterator<Item = (K, V)>) -> Self
    where
        K: Into<String>,
        V: Into<String>,
    {
        Self {
            models: entries
                .into_iter()
                .map(|(key, id)| (key.into(), id.into()))
                .collect(),
        }
    }

    /// Resolve `key` to a model identifier.
    pub fn resolve(&self, key: &str) -> Result<&str> {
        self.models
            .get(key)
            .map(String::as_str)
            .ok_or_else(|| Error::invalid_model_key(key))
    }

    /// Iterate over `(key, model_id)` pairs in key order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.models.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    /// The registered keys in order.
    pub fn keys(&self) -> Vec<&str> {
        self.models.keys().map(String::as_str).collect()
    }
}

impl Default for ModelRegistry {
    fn default() -> Self {
        Self::new([
            ("opus", "claude-3-opus-20240229"),
            ("v1", "claude-v1"),
            ("instant", "claude-instant-v1"),
            ("v1.2", "claude-v1.2"),
            ("v1.3", "claude-v1.3"),
            ("sonnet", "claude-3-5-sonnet-20241022"),
            ("haiku", "claude-3-haiku-20240307"),
        ])
    }
}

/// A remote capability that turns an ordered message log into text.
#[async_trait::async_trait]
pub trait CompletionEngine: Send + Sync {
    /// The models this engine can serve.
    fn models(&self) -> &ModelRegistry;

    /// Resolve a short model key to a model identifier.
    fn resolve_model(&self, key: &str) -> Result<String> {
        self.models().resolve(key).map(str::to_string)
    }

    /// Produce the full response in one request.
    async fn complete_once(&self, messages: &[Message], model_id: &str, limit: u32)
    -> Result<String>;

    /// Produce the response as a stream of text fragments.
    async fn complete_streaming(
        &self,
        messages: &[Message],
        model_id: &str,
        limit: u32,
    ) -> Result<FragmentStream>;
}
