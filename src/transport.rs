//! Chat transport boundary and the JSON Lines stdio adapter.
//!
//! The desk process is driven by a chat gateway that writes one
//! [`InboundMessage`] per line to stdin and reads [`OutboundEvent`]s from
//! stdout. Logs go to stderr so stdout stays a clean protocol stream.

use std::future::Future;
use std::path::PathBuf;

use serde::{Deserialize, Serialize};
use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncWrite, AsyncWriteExt};
use tokio::sync::Mutex;

use crate::error::PrintError;

/// A file the gateway already downloaded to local disk.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Attachment {
    pub file_name: String,
    pub path: PathBuf,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InboundMessage {
    pub sender: String,
    pub conversation_id: String,
    #[serde(default)]
    pub text: String,
    #[serde(default)]
    pub attachment: Option<Attachment>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum OutboundEvent {
    Reply { conversation_id: String, text: String },
    Edit { conversation_id: String, text: String },
}

pub trait ChatTransport: Send + Sync + 'static {
    fn reply(
        &self,
        conversation_id: &str,
        text: &str,
    ) -> impl Future<Output = Result<(), PrintError>> + Send;

    /// Replace the text of the last reply sent to the conversation.
    fn edit_last_reply(
        &self,
        conversation_id: &str,
        text: &str,
    ) -> impl Future<Output = Result<(), PrintError>> + Send;
}

/// Writes outbound events as JSON Lines to any async writer (stdout in `serve`).
pub struct StdioTransport<W> {
    out: Mutex<W>,
}

impl StdioTransport<tokio::io::Stdout> {
    pub fn stdout() -> Self {
        Self::new(tokio::io::stdout())
    }
}

impl<W> StdioTransport<W>
where
    W: AsyncWrite + Unpin + Send + 'static,
{
    pub fn new(out: W) -> Self {
        Self {
            out: Mutex::new(out),
        }
    }

    async fn emit(&self, event: &OutboundEvent) -> Result<(), PrintError> {
        let mut line = serde_json::to_string(event)?;
        line.push('\n');
        let mut out = self.out.lock().await;
        out.write_all(line.as_bytes())
            .await
            .map_err(|e| PrintError::Transport(e.to_string()))?;
        out.flush()
            .await
            .map_err(|e| PrintError::Transport(e.to_string()))
    }

    #[cfg(test)]
    async fn into_inner(self) -> W {
        self.out.into_inner()
    }
}

impl<W> ChatTransport for StdioTransport<W>
where
    W: AsyncWrite + Unpin + Send + 'static,
{
    async fn reply(&self, conversation_id: &str, text: &str) -> Result<(), PrintError> {
        self.emit(&OutboundEvent::Reply {
            conversation_id: conversation_id.to_string(),
            text: text.to_string(),
        })
        .await
    }

    async fn edit_last_reply(&self, conversation_id: &str, text: &str) -> Result<(), PrintError> {
        self.emit(&OutboundEvent::Edit {
            conversation_id: conversation_id.to_string(),
            text: text.to_string(),
        })
        .await
    }
}

/// Reads inbound messages line by line. Blank lines are skipped; a malformed
/// line is reported and skipped rather than ending the stream.
pub struct InboundReader<R> {
    lines: tokio::io::Lines<R>,
}

impl<R> InboundReader<R>
where
    R: AsyncBufRead + Unpin,
{
    pub fn new(reader: R) -> Self {
        Self {
            lines: reader.lines(),
        }
    }

    /// `Ok(None)` at end of input.
    pub async fn next(&mut self) -> Result<Option<Result<InboundMessage, PrintError>>, PrintError> {
        loop {
            let line = self
                .lines
                .next_line()
                .await
                .map_err(|e| PrintError::Transport(e.to_string()))?;
            match line {
                None => return Ok(None),
                Some(l) if l.trim().is_empty() => continue,
                Some(l) => {
                    return Ok(Some(
                        serde_json::from_str::<InboundMessage>(&l).map_err(PrintError::from),
                    ));
                }
            }
        }
    }
}
