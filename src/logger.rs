//! Best-effort persistence of a conversation log.

use std::fs::{self, File, OpenOptions};
use std::io::{self, BufWriter, Write};
use std::path::{Path, PathBuf};

use serde::Serialize;
use time::{OffsetDateTime, UtcOffset};
use time::macros::format_description;

use crate::error::{Error, Result};
use crate::observability::{LOG_RECORDS_SKIPPED, LOG_RECORDS_WRITTEN};
use crate::types::{ConversationLog, Message};

/// One line of a session log file.
#[derive(Debug, Serialize)]
struct LogRecord<'a> {
    role: &'a str,
    content: String,
}

impl<'a> From<&'a Message> for LogRecord<'a> {
    fn from(message: &'a Message) -> Self {
        Self {
            role: message.role.as_str(),
            content: message.content.render(),
        }
    }
}

/// How many records a flush wrote and how many it had to skip.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct FlushSummary {
    /// Records written.
    pub written: usize,
    /// Records that failed to encode or write.
    pub skipped: usize,
}

/// Writes conversation logs as JSON lines under a log directory.
///
/// File names carry the flush time at a fixed UTC offset.  The local offset cannot be read
/// reliably once other threads are running, so callers that want local time determine it at
/// startup and pass it in with [`SessionLogger::with_utc_offset`].
#[derive(Debug, Clone)]
pub struct SessionLogger {
    log_dir: PathBuf,
    utc_offset: UtcOffset,
}

impl SessionLogger {
    /// Create a logger that writes under `log_dir`, naming files in UTC.
    pub fn new(log_dir: impl Into<PathBuf>) -> Self {
        Self {
            log_dir: log_dir.into(),
            utc_offset: UtcOffset::UTC,
        }
    }

    /// Name files by the time at `offset` instead of UTC.
    pub fn with_utc_offset(mut self, offset: UtcOffset) -> Self {
        self.utc_offset = offset;
        self
    }

    /// The offset file names are written in.
    pub fn utc_offset(&self) -> UtcOffset {
        self.utc_offset
    }

    /// The directory log files are written to.
    pub fn log_dir(&self) -> &Path {
        &self.log_dir
    }

    /// Write `log` to a new `conversation_<timestamp>.log` file and return its path.
    ///
    /// Records are written in log order.  A record that fails to encode or write is skipped and
    /// the rest are still written; only failing to create the file is an error.
    pub fn flush(&self, log: &ConversationLog) -> Result<PathBuf> {
        fs::create_dir_all(&self.log_dir).map_err(|err| {
            Error::io(
                format!("could not create log directory {}", self.log_dir.display()),
                err,
            )
        })?;
        let stamp = timestamp(OffsetDateTime::now_utc().to_offset(self.utc_offset));
        let (path, file) = self.create_unique(&stamp)?;
        let mut writer = BufWriter::new(file);
        let summary = write_records(&mut writer, log);
        writer
            .flush()
            .map_err(|err| Error::io(format!("could not flush {}", path.display()), err))?;
        tracing::debug!(
            path = %path.display(),
            written = summary.written,
            skipped = summary.skipped,
            "flushed conversation log"
        );
        Ok(path)
    }

    fn create_unique(&self, stamp: &str) -> Result<(PathBuf, File)> {
        let mut attempt = 0u32;
        loop {
            let name = if attempt == 0 {
                format!("conversation_{stamp}.log")
            } else {
                format!("conversation_{stamp}_{attempt}.log")
            };
            let path = self.log_dir.join(name);
            match OpenOptions::new().write(true).create_new(true).open(&path) {
                Ok(file) => return Ok((path, file)),
                Err(err) if err.kind() == io::ErrorKind::AlreadyExists => attempt += 1,
                Err(err) => {
                    return Err(Error::io(
                        format!("could not create {}", path.display()),
                        err,
                    ));
                }
            }
        }
    }
}

/// Write one JSON line per message to `writer`, skipping any record that fails.
pub fn write_records<W: Write>(writer: &mut W, log: &ConversationLog) -> FlushSummary {
    let mut summary = FlushSummary::default();
    for (index, message) in log.iter().enumerate() {
        match encode_record(message).and_then(|line| {
            writer
                .write_all(line.as_bytes())
                .map_err(|err| Error::io("could not write log record", err))
        }) {
            Ok(()) => {
                LOG_RECORDS_WRITTEN.click();
                summary.written += 1;
            }
            Err(err) => {
                LOG_RECORDS_SKIPPED.click();
                tracing::warn!(index, error = %err, "skipping conversation log record");
                summary.skipped += 1;
            }
        }
    }
    summary
}

fn encode_record(message: &Message) -> Result<String> {
    let mut line = serde_json::to_string(&LogRecord::from(message))?;
    line.push('\n');
    Ok(line)
}

fn timestamp(now: OffsetDateTime) -> String {
    let format = format_description!("[year][month][day]_[hour][minute][second]");
    now.format(&format)
        .unwrap_or_else(|_| now.unix_timestamp().to_string())
}
