//! Extraction of fenced code blocks from responses into files.

use std::fs;
use std::path::{Path, PathBuf};
use std::sync::LazyLock;

use regex::Regex;

use crate::error::{Error, Result};
use crate::observability::ARTIFACTS_SAVED;

/// Fence tags that are extracted, with the file extension each one is saved under.
///
/// Extraction visits tags in this order.
pub const FENCE_EXTENSIONS: &[(&str, &str)] = &[
    ("python", "py"),
    ("text", "txt"),
    ("bash", "sh"),
    ("java", "java"),
    ("markdown", "md"),
    ("html", "html"),
];

static FENCE_PATTERNS: LazyLock<Vec<(&'static str, &'static str, Regex)>> = LazyLock::new(|| {
    FENCE_EXTENSIONS
        .iter()
        .map(|(tag, extension)| {
            let pattern = format!(r"(?s)```{}\r?\n(.*?)\r?\n```", regex::escape(tag));
            let regex = Regex::new(&pattern).expect("fence patterns are built from a fixed table");
            (*tag, *extension, regex)
        })
        .collect()
});

/// A file written by [`ArtifactExtractor::extract`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SavedArtifact {
    /// Where the artifact was written.
    pub path: PathBuf,
    /// The fence tag of the block.
    pub tag: String,
    /// 1-based position of the block among blocks with the same tag.
    pub sequence: usize,
}

/// Saves fenced code blocks found in response text.
#[derive(Debug, Default, Clone, Copy)]
pub struct ArtifactExtractor;

impl ArtifactExtractor {
    /// Create a new extractor.
    pub fn new() -> Self {
        Self
    }

    /// Write every recognized fenced block in `response_text` under `output_dir`.
    ///
    /// Blocks are numbered per tag starting at 1 and written to `code_artifact_<n>.<ext>`,
    /// replacing any file of the same name.  The directory is created when it does not exist,
    /// even if the response has no blocks.
    pub fn extract(&self, response_text: &str, output_dir: &Path) -> Result<Vec<SavedArtifact>> {
        fs::create_dir_all(output_dir).map_err(|err| {
            Error::io(
                format!("could not create artifact directory {}", output_dir.display()),
                err,
            )
        })?;
        let mut saved = Vec::new();
        for (tag, extension, regex) in FENCE_PATTERNS.iter() {
            for (index, captures) in regex.captures_iter(response_text).enumerate() {
                let Some(body) = captures.get(1) else {
                    continue;
                };
                let sequence = index + 1;
                let path = output_dir.join(format!("code_artifact_{sequence}.{extension}"));
                fs::write(&path, body.as_str().trim()).map_err(|err| {
                    Error::io(format!("could not write artifact {}", path.display()), err)
                })?;
                ARTIFACTS_SAVED.click();
                tracing::debug!(path = %path.display(), tag = *tag, "saved code artifact");
                saved.push(SavedArtifact {
                    path,
                    tag: tag.to_string(),
                    sequence,
                });
            }
        }
        Ok(saved)
    }
}
