use std::fmt;

use serde::{Deserialize, Serialize};

/// Supported image media types.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ImageMediaType {
    #[serde(rename = "image/jpeg")]
    Jpeg,

    #[serde(rename = "image/png")]
    Png,

    #[serde(rename = "image/gif")]
    Gif,

    #[serde(rename = "image/webp")]
    Webp,
}

impl ImageMediaType {
    /// Maps a file extension (without the dot, any case) to an image media type.
    pub fn from_extension(extension: &str) -> Option<Self> {
        match extension.to_ascii_lowercase().as_str() {
            "jpg" | "jpeg" => Some(ImageMediaType::Jpeg),
            "png" => Some(ImageMediaType::Png),
            "gif" => Some(ImageMediaType::Gif),
            "webp" => Some(ImageMediaType::Webp),
            _ => None,
        }
    }

    /// Returns the MIME string for this media type.
    pub fn as_str(&self) -> &'static str {
        match self {
            ImageMediaType::Jpeg => "image/jpeg",
            ImageMediaType::Png => "image/png",
            ImageMediaType::Gif => "image/gif",
            ImageMediaType::Webp => "image/webp",
        }
    }
}

impl fmt::Display for ImageMediaType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One unit of message content.
///
/// Blocks are produced by the attachment preparer and never modified afterwards.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "type")]
pub enum ContentBlock {
    /// A block of text, optionally annotated with the file it was read from.
    #[serde(rename = "text")]
    Text {
        /// The text content.
        text: String,
        /// Name of the originating file, when the text came from an attachment.
        #[serde(default, skip_serializing_if = "Option::is_none")]
        source_label: Option<String>,
    },

    /// A base64-encoded image.
    #[serde(rename = "image")]
    Image {
        /// The detected media type.
        media_type: ImageMediaType,
        /// Standard-alphabet base64 of the raw image bytes.
        data: String,
    },
}

impl ContentBlock {
    /// Create a text block with no source label.
    pub fn text(text: impl Into<String>) -> Self {
        ContentBlock::Text {
            text: text.into(),
            source_label: None,
        }
    }

    /// Create a text block annotated with the file it came from.
    pub fn labeled_text(text: impl Into<String>, source_label: impl Into<String>) -> Self {
        ContentBlock::Text {
            text: text.into(),
            source_label: Some(source_label.into()),
        }
    }

    /// Create an image block from already-encoded data.
    pub fn image(media_type: ImageMediaType, data: impl Into<String>) -> Self {
        ContentBlock::Image {
            media_type,
            data: data.into(),
        }
    }

    /// Returns true if this block is a text block
    pub fn is_text(&self) -> bool {
        matches!(self, ContentBlock::Text { .. })
    }

    /// Returns true if this block is an image block
    pub fn is_image(&self) -> bool {
        matches!(self, ContentBlock::Image { .. })
    }

    /// Renders the block for a human-readable transcript.
    ///
    /// Images are rendered as a type marker rather than their payload.
    pub fn render(&self) -> String {
        match self {
            ContentBlock::Text {
                text,
                source_label: Some(label),
            } => format!("[file: {label}]\n{text}"),
            ContentBlock::Text {
                text,
                source_label: None,
            } => text.clone(),
            ContentBlock::Image { media_type, .. } => format!("[image: {media_type}]"),
        }
    }
}
