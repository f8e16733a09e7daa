//! Polling control loop over the shared record.
//!
//! Each cycle reads the record once and acts on what it finds:
//!
//! | read                        | action                                   | pause          |
//! |-----------------------------|------------------------------------------|----------------|
//! | empty                       | nothing                                  | poll interval  |
//! | no delimiter                | write the format-error frame             | standard wait  |
//! | kind other than `query`     | nothing                                  | standard wait  |
//! | `query:<title>`             | resolve, download, write `path:<file>`   | poll interval  |
//! | `query:<title>`, any failure| write `error:<message>`                  | standard wait  |
//!
//! No request failure stops the loop; only cancellation does.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use marquee_common::{MarqueeError, Result};
use marquee_config::MarqueeConfig;
use marquee_http::Fetcher;
use marquee_scrape::{Query, Resolver};
use tokio_util::sync::CancellationToken;

use crate::channel::RequestChannel;
use crate::frame::{Frame, FrameKind};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ListenerState {
    Idle,
    Decoding,
    Resolving,
    Responding,
    Waiting,
    FormatErrorHandling,
}

/// What a single poll cycle did.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PollOutcome {
    /// The record was empty.
    Empty,
    /// The record held a frame this service does not act on.
    Ignored { kind: FrameKind },
    /// The record held no delimiter; the format-error frame was written.
    FormatError,
    /// A query was served; the path frame was written.
    Responded { title: String, path: PathBuf },
    /// A query failed; an error frame carrying `message` was written.
    Failed { title: String, message: String },
}

#[derive(Debug, Clone, Copy)]
struct Timing {
    poll_interval: Duration,
    std_wait: Duration,
}

impl PollOutcome {
    fn pause(&self, timing: Timing) -> Duration {
        match self {
            PollOutcome::Empty | PollOutcome::Responded { .. } => timing.poll_interval,
            PollOutcome::Ignored { .. }
            | PollOutcome::FormatError
            | PollOutcome::Failed { .. } => timing.std_wait,
        }
    }

    fn resting_state(&self) -> ListenerState {
        match self {
            PollOutcome::Ignored { .. } | PollOutcome::Failed { .. } => ListenerState::Waiting,
            PollOutcome::FormatError => ListenerState::FormatErrorHandling,
            PollOutcome::Empty | PollOutcome::Responded { .. } => ListenerState::Idle,
        }
    }
}

pub struct Listener {
    channel: RequestChannel,
    dest_dir: PathBuf,
    resolver: Resolver,
    timing: Timing,
    state: ListenerState,
}

impl Listener {
    pub fn new(cfg: &MarqueeConfig, fetcher: Arc<dyn Fetcher>) -> Result<Self> {
        cfg.validate()?;
        Ok(Self {
            channel: RequestChannel::new(cfg.channel_path.clone()),
            dest_dir: cfg.dest_dir.clone(),
            resolver: Resolver::new(fetcher, cfg)?,
            timing: Timing {
                poll_interval: cfg.poll_interval(),
                std_wait: cfg.std_wait(),
            },
            state: ListenerState::Idle,
        })
    }

    pub fn channel(&self) -> &RequestChannel {
        &self.channel
    }

    pub fn state(&self) -> ListenerState {
        self.state
    }

    /// One-time setup: the shared record and the destination directory
    /// must exist before the first poll.
    pub fn prepare(&self) -> Result<()> {
        self.channel
            .ensure_exists()
            .map_err(|e| MarqueeError::channel(self.channel.path(), e))?;
        std::fs::create_dir_all(&self.dest_dir).map_err(|e| {
            MarqueeError::Setup(format!(
                "cannot create destination directory {}: {e}",
                self.dest_dir.display()
            ))
        })?;
        tracing::info!(
            channel = %self.channel.path().display(),
            dest_dir = %self.dest_dir.display(),
            "listener.ready"
        );
        Ok(())
    }

    fn enter(&mut self, next: ListenerState) {
        if self.state != next {
            tracing::trace!(from = ?self.state, to = ?next, "listener.state");
            self.state = next;
        }
    }

    /// Run one cycle without pausing. Channel I/O failures are returned;
    /// every other failure is answered through the channel.
    pub async fn poll_once(&mut self) -> Result<PollOutcome> {
        self.enter(ListenerState::Idle);
        let line = self
            .channel
            .read()
            .map_err(|e| MarqueeError::channel(self.channel.path(), e))?;
        let Some(line) = line else {
            return Ok(PollOutcome::Empty);
        };

        self.enter(ListenerState::Decoding);
        let outcome = match Frame::decode(&line) {
            Err(err) => {
                tracing::warn!(error = %err, "listener.format_error");
                self.respond(&Frame::format_error())?;
                PollOutcome::FormatError
            }
            Ok(Frame {
                kind: FrameKind::Query,
                payload,
            }) => self.serve(payload).await?,
            Ok(Frame { kind, .. }) => {
                tracing::info!(kind = kind.as_str(), "listener.waiting");
                PollOutcome::Ignored { kind }
            }
        };
        self.enter(outcome.resting_state());
        Ok(outcome)
    }

    async fn serve(&mut self, title: String) -> Result<PollOutcome> {
        self.enter(ListenerState::Resolving);
        let query = Query::new(title.as_str());
        tracing::info!(title = %title, "listener.query");

        let result = self.resolver.fetch_image(&query).await;

        self.enter(ListenerState::Responding);
        match result {
            Ok(resolved) => {
                self.respond(&Frame::path(&resolved.path))?;
                tracing::info!(
                    title = %title,
                    path = %resolved.path.display(),
                    source = %resolved.source_url,
                    "listener.success"
                );
                Ok(PollOutcome::Responded {
                    title,
                    path: resolved.path,
                })
            }
            Err(err) => {
                let message = err.to_string();
                tracing::warn!(
                    title = %title,
                    stage = ?err.stage(),
                    error = %message,
                    "listener.request_failed"
                );
                self.respond(&Frame::error(message.as_str()))?;
                Ok(PollOutcome::Failed { title, message })
            }
        }
    }

    fn respond(&self, frame: &Frame) -> Result<()> {
        self.channel
            .write(frame)
            .map_err(|e| MarqueeError::channel(self.channel.path(), e))
    }

    /// Poll until `cancel` fires. Cancellation is honoured between cycles
    /// and during pauses; a request already being served is finished first.
    pub async fn run(&mut self, cancel: CancellationToken) -> Result<()> {
        tracing::info!("listener.start");
        while !cancel.is_cancelled() {
            let pause = match self.poll_once().await {
                Ok(outcome) => outcome.pause(self.timing),
                Err(err) => {
                    tracing::warn!(error = %err, "listener.channel_error");
                    self.enter(ListenerState::Waiting);
                    self.timing.std_wait
                }
            };

            if pause.is_zero() {
                tokio::task::yield_now().await;
                continue;
            }
            tokio::select! {
                _ = cancel.cancelled() => break,
                _ = tokio::time::sleep(pause) => {}
            }
        }
        tracing::info!("listener.stopped");
        Ok(())
    }
}
