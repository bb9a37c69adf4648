//! Drives one exchange with a completion engine.
//!
//! A [`ResponseStream`] passes response fragments through to the caller as they arrive while
//! accumulating the full text.  When the engine's stream ends cleanly the accumulated text is
//! committed to the session as exactly one assistant message.  When it fails, nothing is
//! committed; the fragments already yielded stay visible to the caller.

use std::pin::Pin;
use std::task::{Context, Poll};

use futures::future::BoxFuture;
use futures::{FutureExt, Stream, StreamExt};

use crate::engine::{CompletionEngine, FragmentStream};
use crate::error::{Error, Result};
use crate::observability::{STREAM_COMMITS, STREAM_ERRORS, STREAM_FRAGMENTS};
use crate::session::ConversationSession;

/// Sends prompts to a completion engine on behalf of a session.
pub struct StreamingResponseCollector<'e> {
    engine: &'e dyn CompletionEngine,
}

impl<'e> StreamingResponseCollector<'e> {
    /// Create a collector that talks to `engine`.
    pub fn new(engine: &'e dyn CompletionEngine) -> Self {
        Self { engine }
    }

    /// Start a streaming exchange for `prompt`.
    ///
    /// The prompt is appended to the session as a user message before anything is sent.  The
    /// returned stream holds the session mutably until it is dropped.
    pub fn stream<'a>(
        &'a self,
        session: &'a mut ConversationSession,
        prompt: &str,
    ) -> ResponseStream<'a> {
        session.append_user_text(prompt);
        let messages = session.log().messages().to_vec();
        let model_id = session.model_id().to_string();
        let limit = session.response_limit();
        let engine = self.engine;
        let opening =
            async move { engine.complete_streaming(&messages, &model_id, limit).await }.boxed();
        ResponseStream {
            session,
            phase: Phase::Opening(opening),
            accumulated: String::new(),
            committed: false,
        }
    }

    /// Run a non-streaming exchange for `prompt` and return the full response.
    ///
    /// The log discipline matches [`Self::stream`]: the user message is appended first and the
    /// assistant message is committed only on success.
    pub async fn complete(
        &self,
        session: &mut ConversationSession,
        prompt: &str,
    ) -> Result<String> {
        session.append_user_text(prompt);
        let response = self
            .engine
            .complete_once(
                session.log().messages(),
                session.model_id(),
                session.response_limit(),
            )
            .await;
        match response {
            Ok(text) => {
                session.commit_assistant_text(text.clone());
                STREAM_COMMITS.click();
                Ok(text)
            }
            Err(err) => {
                STREAM_ERRORS.click();
                tracing::warn!(error = %err, "completion failed");
                Err(err)
            }
        }
    }
}

enum Phase<'a> {
    Opening(BoxFuture<'a, Result<FragmentStream>>),
    Streaming(FragmentStream),
    Done,
}

/// The fragments of one response, in arrival order.
///
/// Finite and not restartable.  Yields at most one error, after which it ends.
pub struct ResponseStream<'a> {
    session: &'a mut ConversationSession,
    phase: Phase<'a>,
    accumulated: String,
    committed: bool,
}

impl ResponseStream<'_> {
    /// The text received so far.
    pub fn accumulated(&self) -> &str {
        &self.accumulated
    }

    /// True once the response has been committed to the session.
    pub fn is_committed(&self) -> bool {
        self.committed
    }

    /// Consume the stream and return the accumulated text.
    pub fn into_accumulated(self) -> String {
        self.accumulated
    }

    fn fail(&mut self, err: Error) -> Poll<Option<Result<String>>> {
        STREAM_ERRORS.click();
        tracing::warn!(error = %err, received = self.accumulated.len(), "response stream failed");
        self.phase = Phase::Done;
        Poll::Ready(Some(Err(err)))
    }

    fn commit(&mut self) {
        self.phase = Phase::Done;
        self.session.commit_assistant_text(self.accumulated.clone());
        self.committed = true;
        STREAM_COMMITS.click();
    }
}

impl Stream for ResponseStream<'_> {
    type Item = Result<String>;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        let this = &mut *self;
        loop {
            match &mut this.phase {
                Phase::Opening(opening) => match opening.poll_unpin(cx) {
                    Poll::Ready(Ok(fragments)) => this.phase = Phase::Streaming(fragments),
                    Poll::Ready(Err(err)) => return this.fail(err),
                    Poll::Pending => return Poll::Pending,
                },
                Phase::Streaming(fragments) => match fragments.poll_next_unpin(cx) {
                    Poll::Ready(Some(Ok(fragment))) => {
                        STREAM_FRAGMENTS.click();
                        this.accumulated.push_str(&fragment);
                        return Poll::Ready(Some(Ok(fragment)));
                    }
                    Poll::Ready(Some(Err(err))) => return this.fail(err),
                    Poll::Ready(None) => {
                        this.commit();
                        return Poll::Ready(None);
                    }
                    Poll::Pending => return Poll::Pending,
                },
                Phase::Done => return Poll::Ready(None),
            }
        }
    }
}
