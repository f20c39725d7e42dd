use std::time::{Duration, Instant};

use tokio::sync::broadcast;
use tracing::{trace, warn};

use super::messages::ControlMessage;
use crate::domain::UploadProgress;

/// How long a finished or failed progress stays visible.
pub const CLEAR_DELAY: Duration = Duration::from_secs(3);

/// Best-effort broadcast of progress to the control surface.
///
/// Nobody listening is normal (the popup may be closed), so emitting never
/// fails.
#[derive(Clone)]
pub struct ProgressRelay {
    tx: broadcast::Sender<ControlMessage>,
}

impl ProgressRelay {
    pub fn new(capacity: usize) -> Self {
        let (tx, _) = broadcast::channel(capacity);
        Self { tx }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<ControlMessage> {
        self.tx.subscribe()
    }

    pub fn emit(&self, progress: UploadProgress) {
        trace!(phase = ?progress.phase, percent = progress.percent, "{}", progress.message);
        if self
            .tx
            .send(ControlMessage::ProgressUpdate { progress })
            .is_err()
        {
            trace!("no control surface listening, progress dropped");
        }
    }
}

impl Default for ProgressRelay {
    fn default() -> Self {
        Self::new(64)
    }
}

/// The control surface's view of the single current progress record.
#[derive(Debug)]
pub struct ProgressTracker {
    current: Option<UploadProgress>,
    settled_at: Option<Instant>,
    clear_after: Duration,
}

impl ProgressTracker {
    pub fn new(clear_after: Duration) -> Self {
        Self {
            current: None,
            settled_at: None,
            clear_after,
        }
    }

    /// Replace the current record.
    pub fn apply(&mut self, progress: UploadProgress) {
        self.settled_at = progress.is_terminal().then(Instant::now);
        self.current = Some(progress);
    }

    /// Time left before the terminal record is discarded; `None` while
    /// progress is still ongoing.
    pub fn expires_in(&self) -> Option<Duration> {
        self.settled_at
            .map(|settled_at| self.clear_after.saturating_sub(settled_at.elapsed()))
    }

    /// The current record, or `None` once a terminal record has expired.
    pub fn current(&mut self) -> Option<&UploadProgress> {
        if let Some(settled_at) = self.settled_at {
            if settled_at.elapsed() >= self.clear_after {
                self.current = None;
                self.settled_at = None;
            }
        }
        self.current.as_ref()
    }
}

impl Default for ProgressTracker {
    fn default() -> Self {
        Self::new(CLEAR_DELAY)
    }
}

/// Subscription to the relay that keeps a [`ProgressTracker`] up to date.
pub struct ProgressFeed {
    rx: broadcast::Receiver<ControlMessage>,
    tracker: ProgressTracker,
}

impl ProgressFeed {
    pub fn new(relay: &ProgressRelay, tracker: ProgressTracker) -> Self {
        Self {
            rx: relay.subscribe(),
            tracker,
        }
    }

    /// Wait for the next progress record. `None` once every sender is gone.
    pub async fn next(&mut self) -> Option<UploadProgress> {
        loop {
            match self.rx.recv().await {
                Ok(ControlMessage::ProgressUpdate { progress }) => {
                    self.tracker.apply(progress.clone());
                    return Some(progress);
                }
                Err(broadcast::error::RecvError::Lagged(skipped)) => {
                    warn!("progress feed lagged, {} updates skipped", skipped);
                }
                Err(broadcast::error::RecvError::Closed) => return None,
            }
        }
    }

    pub fn expires_in(&self) -> Option<Duration> {
        self.tracker.expires_in()
    }

    pub fn current(&mut self) -> Option<&UploadProgress> {
        self.tracker.current()
    }
}
