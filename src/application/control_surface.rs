use tracing::{debug, error};

use super::contexts::ContentPort;
use super::messages::ContentMessage;
use super::progress::ProgressRelay;
use crate::domain::{DownloadRequest, DownloadResult, UploadPhase, UploadProgress};

const COURSE_REQUIRED: &str = "Please select a course first.";

/// User-facing side: starts downloads on the page context.
///
/// Every send ends with a terminal progress record on the relay, including
/// the attempts that never reach the page context.
#[derive(Clone)]
pub struct ControlSurface {
    content: ContentPort,
    progress: ProgressRelay,
}

impl ControlSurface {
    pub fn new(content: ContentPort, progress: ProgressRelay) -> Self {
        Self { content, progress }
    }

    /// Ask the page context to send its video to the backend.
    pub async fn send(&self, course_id: &str, session_token: Option<String>) -> DownloadResult {
        if course_id.trim().is_empty() {
            return self.fail(COURSE_REQUIRED);
        }

        self.progress.emit(UploadProgress::starting());
        debug!(course_id, "requesting download from page context");
        let request = DownloadRequest {
            course_id: course_id.to_string(),
            session_token,
        };

        match self.content.request(ContentMessage::DownloadVideo(request)).await {
            Ok(result) => result,
            Err(e) => {
                error!("Error sending message: {}", e);
                self.fail(e.to_string())
            }
        }
    }

    fn fail(&self, message: impl Into<String>) -> DownloadResult {
        let message = message.into();
        self.progress
            .emit(UploadProgress::new(UploadPhase::Error, 0, message.clone()));
        DownloadResult::failed(message)
    }
}
