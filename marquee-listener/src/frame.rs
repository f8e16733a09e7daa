//! `kind:payload` frames exchanged through the shared record.

use std::fmt;
use std::path::Path;

pub const DELIMITER: char = ':';

/// Payload written back when the record holds no delimiter.
pub const FORMAT_ERROR_MESSAGE: &str = "Communication not meeting format 'type:value'";

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum FrameError {
    #[error("frame {0:?} has no ':' delimiter")]
    MissingDelimiter(String),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FrameKind {
    /// Inbound request; payload is a free-text title.
    Query,
    /// Outbound response; payload is a local file path.
    Path,
    /// Outbound failure; payload is a human-readable message.
    Error,
    /// Anything else. Tolerated and ignored by the listener.
    Other(String),
}

impl FrameKind {
    pub fn as_str(&self) -> &str {
        match self {
            FrameKind::Query => "query",
            FrameKind::Path => "path",
            FrameKind::Error => "error",
            FrameKind::Other(s) => s,
        }
    }
}

impl From<&str> for FrameKind {
    fn from(s: &str) -> Self {
        match s {
            "query" => FrameKind::Query,
            "path" => FrameKind::Path,
            "error" => FrameKind::Error,
            other => FrameKind::Other(other.to_string()),
        }
    }
}

/// One message in the shared record.
///
/// ```
/// use marquee_listener::frame::{Frame, FrameKind};
///
/// let frame = Frame::decode("query:Law & Order: SVU").unwrap();
/// assert_eq!(frame.kind, FrameKind::Query);
/// assert_eq!(frame.payload, "Law & Order: SVU");
/// assert_eq!(frame.encode(), "query:Law & Order: SVU");
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Frame {
    pub kind: FrameKind,
    pub payload: String,
}

impl Frame {
    /// Split on the first delimiter only; the payload may contain more.
    pub fn decode(line: &str) -> Result<Self, FrameError> {
        let (kind, payload) = line
            .split_once(DELIMITER)
            .ok_or_else(|| FrameError::MissingDelimiter(line.to_string()))?;
        Ok(Self {
            kind: FrameKind::from(kind),
            payload: payload.to_string(),
        })
    }

    pub fn query(title: impl Into<String>) -> Self {
        Self {
            kind: FrameKind::Query,
            payload: title.into(),
        }
    }

    pub fn path(path: &Path) -> Self {
        Self {
            kind: FrameKind::Path,
            payload: path.display().to_string(),
        }
    }

    pub fn error(message: impl Into<String>) -> Self {
        Self {
            kind: FrameKind::Error,
            payload: message.into(),
        }
    }

    pub fn format_error() -> Self {
        Self::error(FORMAT_ERROR_MESSAGE)
    }

    /// Single-line wire form. Line breaks in the payload become spaces so the
    /// reader's first-line contract always sees the whole frame.
    pub fn encode(&self) -> String {
        let payload: String = self
            .payload
            .chars()
            .map(|c| if c == '\n' || c == '\r' { ' ' } else { c })
            .collect();
        format!("{}{DELIMITER}{payload}", self.kind.as_str())
    }
}

impl fmt::Display for Frame {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.encode())
    }
}
