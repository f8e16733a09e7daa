//! The shared record: a single text file used as a half-duplex mailbox.
//!
//! Writes replace the whole file through a temp-file rename, so a reader
//! never sees half a frame. Nothing arbitrates between several writers;
//! the record is meant for one external requester and this service.

use std::io;
use std::path::{Path, PathBuf};

use crate::frame::Frame;

#[derive(Debug, Clone)]
pub struct RequestChannel {
    path: PathBuf,
}

impl RequestChannel {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Create an empty record if none exists. Existing content is kept.
    pub fn ensure_exists(&self) -> io::Result<()> {
        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }
        match std::fs::OpenOptions::new()
            .write(true)
            .create_new(true)
            .open(&self.path)
        {
            Ok(_) => {
                tracing::info!(path = %self.path.display(), "channel.created");
                Ok(())
            }
            Err(e) if e.kind() == io::ErrorKind::AlreadyExists => Ok(()),
            Err(e) => Err(e),
        }
    }

    /// First line of the record without its line terminator, or `None`
    /// when that line is empty.
    pub fn read(&self) -> io::Result<Option<String>> {
        let bytes = std::fs::read(&self.path)?;
        let text = String::from_utf8_lossy(&bytes);
        let line = text.lines().next().unwrap_or("");
        if line.is_empty() {
            Ok(None)
        } else {
            Ok(Some(line.to_string()))
        }
    }

    /// Replace the whole record with `frame`.
    pub fn write(&self, frame: &Frame) -> io::Result<()> {
        marquee_common::fs::write_atomic(&self.path, frame.encode().as_bytes())
    }
}
