//! Messages exchanged between the page, background and control-surface
//! contexts, plus the [`Port`] that carries them.
//!
//! The DTOs serialize to the `action`-tagged camelCase JSON the browser
//! extension speaks, so the in-process channels can be swapped for a real
//! transport without touching the handlers.

use serde::{Deserialize, Serialize};
use tokio::sync::{mpsc, oneshot};
use tracing::trace;

use crate::domain::{AppError, Credential, DownloadRequest, LectureMetadata, UploadProgress};

const NO_RECEIVER: &str = "Could not establish connection. Receiving end does not exist.";

/// Accepted by the page context.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "action", rename_all = "camelCase")]
pub enum ContentMessage {
    DownloadVideo(DownloadRequest),
}

/// Accepted by the privileged background context.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "action", rename_all = "camelCase")]
pub enum BackgroundMessage {
    FetchAndUploadAudio(FetchAndUploadAudio),
    /// Progress from another context, relayed onward to the control surface.
    BackgroundProgress { progress: UploadProgress },
}

/// Delivered to the control surface.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "action", rename_all = "camelCase")]
pub enum ControlMessage {
    ProgressUpdate { progress: UploadProgress },
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FetchAndUploadAudio {
    pub audio_podcast_url: String,
    pub metadata: LectureMetadata,
    pub backend_url: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub session_token: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_key: Option<String>,
}

impl FetchAndUploadAudio {
    pub fn credential(&self) -> Credential {
        Credential::new(self.session_token.clone(), self.api_key.clone())
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FetchAndUploadAudioResponse {
    pub success: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub lecture_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl FetchAndUploadAudioResponse {
    pub fn succeeded(lecture_id: Option<String>) -> Self {
        Self {
            success: true,
            lecture_id,
            error: None,
        }
    }

    pub fn failed(error: impl Into<String>) -> Self {
        Self {
            success: false,
            lecture_id: None,
            error: Some(error.into()),
        }
    }
}

/// A message plus the slot its answer goes into.
pub struct Envelope<M, R> {
    pub message: M,
    pub reply: Reply<R>,
}

/// Answer slot of an [`Envelope`]; empty for fire-and-forget messages.
pub struct Reply<R>(Option<oneshot::Sender<R>>);

impl<R> Reply<R> {
    /// Answer the sender. A sender that stopped waiting is ignored.
    pub fn send(self, response: R) {
        if let Some(reply) = self.0 {
            let _ = reply.send(response);
        }
    }
}

/// Sending half of a context's inbox.
pub struct Port<M, R> {
    tx: mpsc::Sender<Envelope<M, R>>,
}

impl<M, R> Clone for Port<M, R> {
    fn clone(&self) -> Self {
        Self {
            tx: self.tx.clone(),
        }
    }
}

pub type Inbox<M, R> = mpsc::Receiver<Envelope<M, R>>;

impl<M, R> Port<M, R> {
    pub fn channel(capacity: usize) -> (Self, Inbox<M, R>) {
        let (tx, rx) = mpsc::channel(capacity);
        (Self { tx }, rx)
    }

    /// Send `message` and wait for the context's answer.
    pub async fn request(&self, message: M) -> Result<R, AppError> {
        let (reply, response) = oneshot::channel();
        self.tx
            .send(Envelope {
                message,
                reply: Reply(Some(reply)),
            })
            .await
            .map_err(|_| AppError::unknown(NO_RECEIVER))?;

        response
            .await
            .map_err(|_| AppError::unknown("The message port closed before a response was received."))
    }

    /// Fire-and-forget delivery; dropped when the inbox is gone or full.
    pub fn post(&self, message: M) {
        if self
            .tx
            .try_send(Envelope {
                message,
                reply: Reply(None),
            })
            .is_err()
        {
            trace!("message dropped, receiving context unavailable");
        }
    }
}
