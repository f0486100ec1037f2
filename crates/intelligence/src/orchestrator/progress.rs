//! Advisory progress checkpoints for a recommendation cycle.

use serde::{Deserialize, Serialize};
use std::sync::Mutex;
use tokio::sync::mpsc;
use tracing::info;

/// Orchestrator states.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Stage {
    Unauthenticated,
    ResolvingIdentity,
    CacheCheck,
    BuildingProfile,
    CollectingExclusions,
    Sourcing,
    Selecting,
    Explaining,
    Persisting,
    Done,
    Fallback,
}

/// One checkpoint: where the cycle is and roughly how far along.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProgressUpdate {
    pub stage: Stage,
    pub percent: u8,
    pub message: String,
}

/// Receives checkpoints. Implementations must not block.
pub trait ProgressSink: Send + Sync {
    fn report(&self, update: &ProgressUpdate);
}

/// Logs each checkpoint through `tracing`.
#[derive(Debug, Default, Clone, Copy)]
pub struct LogProgress;

impl ProgressSink for LogProgress {
    fn report(&self, update: &ProgressUpdate) {
        info!(
            stage = ?update.stage,
            percent = update.percent,
            "{}",
            update.message
        );
    }
}

/// Forwards checkpoints to a channel for streaming callers. A closed
/// receiver is ignored.
#[derive(Debug, Clone)]
pub struct ChannelProgress {
    tx: mpsc::UnboundedSender<ProgressUpdate>,
}

impl ChannelProgress {
    pub fn new(tx: mpsc::UnboundedSender<ProgressUpdate>) -> Self {
        Self { tx }
    }

    pub fn channel() -> (Self, mpsc::UnboundedReceiver<ProgressUpdate>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self { tx }, rx)
    }
}

impl ProgressSink for ChannelProgress {
    fn report(&self, update: &ProgressUpdate) {
        let _ = self.tx.send(update.clone());
    }
}

/// Keeps every checkpoint in memory.
#[derive(Debug, Default)]
pub struct RecordingProgress {
    updates: Mutex<Vec<ProgressUpdate>>,
}

impl RecordingProgress {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn updates(&self) -> Vec<ProgressUpdate> {
        self.updates
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .clone()
    }
}

impl ProgressSink for RecordingProgress {
    fn report(&self, update: &ProgressUpdate) {
        self.updates
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .push(update.clone());
    }
}

/// Fans checkpoints out to the caller's sink and, optionally, a recorder
/// whose contents are returned with the picks.
pub(crate) struct Reporter<'a> {
    sink: &'a dyn ProgressSink,
    recorder: Option<RecordingProgress>,
}

impl<'a> Reporter<'a> {
    pub(crate) fn new(sink: &'a dyn ProgressSink, record: bool) -> Self {
        Self {
            sink,
            recorder: record.then(RecordingProgress::new),
        }
    }

    pub(crate) fn emit(&self, stage: Stage, percent: u8, message: impl Into<String>) {
        let update = ProgressUpdate {
            stage,
            percent: percent.min(100),
            message: message.into(),
        };
        self.sink.report(&update);
        if let Some(recorder) = &self.recorder {
            recorder.report(&update);
        }
    }

    pub(crate) fn recorded(&self) -> Vec<ProgressUpdate> {
        self.recorder
            .as_ref()
            .map(RecordingProgress::updates)
            .unwrap_or_default()
    }
}
