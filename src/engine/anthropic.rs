use std::borrow::Cow;
use std::env;
use std::time::Duration;

use reqwest::header::{self, HeaderMap, HeaderValue};
use reqwest::{Client as ReqwestClient, Response};
use serde::{Deserialize, Serialize};

use crate::engine::sse::{process_sse, text_fragments};
use crate::engine::{CompletionEngine, FragmentStream, ModelRegistry};
use crate::error::{Error, Result};
use crate::observability::STREAM_REQUESTS;
use crate::types::{ContentBlock, Message, MessageContent};

const DEFAULT_API_URL: &str = "https://api.anthropic.com/v1/";
const ANTHROPIC_API_VERSION: &str = "2023-06-01";
const DEFAULT_TIMEOUT: Duration = Duration::from_secs(60);
const API_KEY_VAR: &str = "ANTHROPIC_API_KEY";

/// Client for the Anthropic Messages API.
#[derive(Debug, Clone)]
pub struct AnthropicEngine {
    api_key: String,
    client: ReqwestClient,
    base_url: String,
    timeout: Duration,
    models: ModelRegistry,
}

impl AnthropicEngine {
    /// Create a new engine.
    ///
    /// The API key can be provided directly or read from the ANTHROPIC_API_KEY environment
    /// variable.
    pub fn new(api_key: Option<String>) -> Result<Self> {
        Self::with_options(api_key, None, None)
    }

    /// Create a new engine with custom settings.
    pub fn with_options(
        api_key: Option<String>,
        base_url: Option<String>,
        timeout: Option<Duration>,
    ) -> Result<Self> {
        let api_key = match api_key {
            Some(key) => key,
            None => env::var(API_KEY_VAR).map_err(|_| {
                Error::authentication(
                    "API key not provided and ANTHROPIC_API_KEY environment variable not set",
                )
            })?,
        };
        if HeaderValue::from_str(&api_key).is_err() {
            return Err(Error::authentication(
                "API key contains characters that are not valid in a header",
            ));
        }

        // The total timeout is applied per request in `complete_once`; streamed responses are
        // only bounded while connecting.
        let timeout = timeout.unwrap_or(DEFAULT_TIMEOUT);
        let client = ReqwestClient::builder()
            .connect_timeout(timeout)
            .build()
            .map_err(|e| {
                Error::completion_engine(
                    format!("Failed to build HTTP client: {e}"),
                    None,
                    Some(Box::new(e)),
                )
            })?;

        let mut base_url = base_url.unwrap_or_else(|| DEFAULT_API_URL.to_string());
        if !base_url.ends_with('/') {
            base_url.push('/');
        }

        Ok(Self {
            api_key,
            client,
            base_url,
            timeout,
            models: ModelRegistry::default(),
        })
    }

    /// Replace the model registry.
    pub fn with_models(mut self, models: ModelRegistry) -> Self {
        self.models = models;
        self
    }

    /// Create and return default headers for API requests.
    fn default_headers(&self) -> Result<HeaderMap> {
        let mut headers = HeaderMap::new();
        headers.insert(
            header::CONTENT_TYPE,
            HeaderValue::from_static("application/json"),
        );
        headers.insert(header::ACCEPT, HeaderValue::from_static("application/json"));
        headers.insert(
            "x-api-key",
            HeaderValue::from_str(&self.api_key)
                .map_err(|_| Error::authentication("API key is not a valid header value"))?,
        );
        headers.insert(
            "anthropic-version",
            HeaderValue::from_static(ANTHROPIC_API_VERSION),
        );
        Ok(headers)
    }

    /// Send a Messages request.  `total_timeout` bounds the whole exchange, body included.
    async fn post(
        &self,
        request: &MessagesRequest<'_>,
        headers: HeaderMap,
        total_timeout: Option<Duration>,
    ) -> Result<Response> {
        let url = format!("{}messages", self.base_url);
        let mut builder = self.client.post(&url).headers(headers).json(request);
        if let Some(total_timeout) = total_timeout {
            builder = builder.timeout(total_timeout);
        }
        let response = builder
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    Error::completion_engine(
                        format!(
                            "Request timed out after {} seconds: {e}",
                            self.timeout.as_secs_f64()
                        ),
                        None,
                        Some(Box::new(e)),
                    )
                } else if e.is_connect() {
                    Error::completion_engine(
                        format!("Connection error: {e}"),
                        None,
                        Some(Box::new(e)),
                    )
                } else {
                    Error::completion_engine(
                        format!("Request failed: {e}"),
                        None,
                        Some(Box::new(e)),
                    )
                }
            })?;

        if !response.status().is_success() {
            return Err(Self::process_error_response(response).await);
        }
        Ok(response)
    }

    /// Process API response errors and convert to our Error type
    async fn process_error_response(response: Response) -> Error {
        let status_code = response.status().as_u16();

        #[derive(Deserialize)]
        struct ErrorResponse {
            error: Option<ErrorDetail>,
        }

        #[derive(Deserialize)]
        struct ErrorDetail {
            #[serde(rename = "type")]
            error_type: Option<String>,
            message: Option<String>,
        }

        let error_body = match response.text().await {
            Ok(body) => body,
            Err(e) => {
                return Error::completion_engine(
                    format!("Failed to read error response: {e}"),
                    Some(status_code),
                    Some(Box::new(e)),
                );
            }
        };

        let detail = serde_json::from_str::<ErrorResponse>(&error_body)
            .ok()
            .and_then(|e| e.error);
        let message = match detail {
            Some(ErrorDetail {
                error_type: Some(error_type),
                message: Some(message),
            }) => format!("{error_type}: {message}"),
            Some(ErrorDetail {
                message: Some(message),
                ..
            }) => message,
            _ => error_body,
        };

        match status_code {
            401 => Error::authentication(message),
            _ => Error::completion_engine(message, Some(status_code), None),
        }
    }
}

#[async_trait::async_trait]
impl CompletionEngine for AnthropicEngine {
    fn models(&self) -> &ModelRegistry {
        &self.models
    }

    async fn complete_once(
        &self,
        messages: &[Message],
        model_id: &str,
        limit: u32,
    ) -> Result<String> {
        let request = MessagesRequest::new(messages, model_id, limit, false);
        let response = self
            .post(&request, self.default_headers()?, Some(self.timeout))
            .await?;
        let body = response.json::<MessagesResponse>().await.map_err(|e| {
            Error::completion_engine(
                format!("Failed to parse response: {e}"),
                None,
                Some(Box::new(e)),
            )
        })?;
        Ok(body.text())
    }

    async fn complete_streaming(
        &self,
        messages: &[Message],
        model_id: &str,
        limit: u32,
    ) -> Result<FragmentStream> {
        STREAM_REQUESTS.click();
        let request = MessagesRequest::new(messages, model_id, limit, true);
        let mut headers = self.default_headers()?;
        headers.insert(
            header::ACCEPT,
            HeaderValue::from_static("text/event-stream"),
        );
        let response = self.post(&request, headers, None).await?;
        Ok(text_fragments(process_sse(response.bytes_stream())))
    }
}

/// Prefix sent ahead of the text of an attached file.
pub(crate) fn attachment_preamble(label: &str) -> String {
    format!(
        "[I am pasting the contents of file {label}. For the rest of the conversation, refer to the following data by its file name] =>\n"
    )
}

#[derive(Debug, Serialize)]
struct MessagesRequest<'a> {
    model: &'a str,
    max_tokens: u32,
    messages: Vec<WireMessage<'a>>,
    #[serde(skip_serializing_if = "std::ops::Not::not")]
    stream: bool,
}

impl<'a> MessagesRequest<'a> {
    fn new(messages: &'a [Message], model: &'a str, max_tokens: u32, stream: bool) -> Self {
        Self {
            model,
            max_tokens,
            messages: messages.iter().map(WireMessage::from).collect(),
            stream,
        }
    }
}

#[derive(Debug, Serialize)]
struct WireMessage<'a> {
    role: &'static str,
    content: WireContent<'a>,
}

impl<'a> From<&'a Message> for WireMessage<'a> {
    fn from(message: &'a Message) -> Self {
        let content = match &message.content {
            MessageContent::Text(text) => WireContent::Text(text),
            MessageContent::Blocks(blocks) => {
                WireContent::Blocks(blocks.iter().map(WireBlock::from).collect())
            }
        };
        Self {
            role: message.role.as_str(),
            content,
        }
    }
}

#[derive(Debug, Serialize)]
#[serde(untagged)]
enum WireContent<'a> {
    Text(&'a str),
    Blocks(Vec<WireBlock<'a>>),
}

#[derive(Debug, Serialize)]
#[serde(tag = "type")]
enum WireBlock<'a> {
    #[serde(rename = "text")]
    Text { text: Cow<'a, str> },
    #[serde(rename = "image")]
    Image { source: WireImageSource<'a> },
}

impl<'a> From<&'a ContentBlock> for WireBlock<'a> {
    fn from(block: &'a ContentBlock) -> Self {
        match block {
            ContentBlock::Text {
                text,
                source_label: Some(label),
            } => WireBlock::Text {
                text: Cow::Owned(format!("{}{text}", attachment_preamble(label))),
            },
            ContentBlock::Text {
                text,
                source_label: None,
            } => WireBlock::Text {
                text: Cow::Borrowed(text),
            },
            ContentBlock::Image { media_type, data } => WireBlock::Image {
                source: WireImageSource {
                    r#type: "base64",
                    media_type: media_type.as_str(),
                    data,
                },
            },
        }
    }
}

#[derive(Debug, Serialize)]
struct WireImageSource<'a> {
    r#type: &'static str,
    media_type: &'static str,
    data: &'a str,
}

#[derive(Debug, Deserialize)]
struct MessagesResponse {
    content: Vec<ResponseBlock>,
}

#[derive(Debug, Deserialize)]
#[serde(tag = "type")]
enum ResponseBlock {
    #[serde(rename = "text")]
    Text { text: String },
    #[serde(other)]
    Other,
}

impl MessagesResponse {
    fn text(&self) -> String {
        self.content
            .iter()
            .filter_map(|block| match block {
                ResponseBlock::Text { text } => Some(text.as_str()),
                ResponseBlock::Other => None,
            })
            .collect()
    }
}
