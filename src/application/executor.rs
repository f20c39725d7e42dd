use std::sync::Arc;

use bytes::{Bytes, BytesMut};
use futures::StreamExt;
use reqwest::header::CONTENT_TYPE;
use thiserror::Error;
use tracing::{info, warn};

use super::messages::{FetchAndUploadAudio, FetchAndUploadAudioResponse};
use super::progress::ProgressRelay;
use crate::api::SiteSession;
use crate::backend::{BackendClient, BackendError};
use crate::domain::{UploadMethod, UploadPhase, UploadProgress};
use crate::utils::format_bytes;

const DOWNLOAD_START: u8 = 10;
const DOWNLOAD_END: u8 = 45;
const UPLOAD_START: u8 = 50;
const UPLOAD_SENT: u8 = 90;

#[derive(Error, Debug)]
enum ExecutorError {
    #[error("Failed to fetch audio: HTTP {0}")]
    FetchStatus(u16),

    #[error("Received a web page instead of audio. You may have been redirected to the Panopto login page; sign in and try again.")]
    LoginRedirect,

    #[error("Unexpected content type: {0}")]
    UnexpectedContentType(String),

    #[error("Failed to fetch audio: {0}")]
    Fetch(#[from] reqwest::Error),

    #[error("{0}")]
    Upload(#[from] BackendError),
}

/// Performs the credentialed audio fetch and the multipart upload.
///
/// Lives in the privileged context. Every failure is folded into the
/// response, so callers never see an error cross the boundary.
#[derive(Clone)]
pub struct AudioUploadExecutor {
    session: Arc<dyn SiteSession>,
    backend: BackendClient,
    progress: ProgressRelay,
}

impl AudioUploadExecutor {
    pub fn new(session: Arc<dyn SiteSession>, backend: BackendClient, progress: ProgressRelay) -> Self {
        Self {
            session,
            backend,
            progress,
        }
    }

    pub async fn fetch_and_upload(&self, request: FetchAndUploadAudio) -> FetchAndUploadAudioResponse {
        match self.try_fetch_and_upload(&request).await {
            Ok(lecture_id) => {
                info!(lecture_id = ?lecture_id, "audio uploaded");
                FetchAndUploadAudioResponse::succeeded(lecture_id)
            }
            Err(e) => {
                warn!("audio fetch/upload failed: {}", e);
                FetchAndUploadAudioResponse::failed(e.to_string())
            }
        }
    }

    fn report(&self, phase: UploadPhase, percent: u8, message: impl Into<String>) {
        self.progress
            .emit(UploadProgress::new(phase, percent, message).with_method(UploadMethod::Primary));
    }

    async fn try_fetch_and_upload(
        &self,
        request: &FetchAndUploadAudio,
    ) -> Result<Option<String>, ExecutorError> {
        let audio = self.download_audio(&request.audio_podcast_url).await?;
        let size = format_bytes(audio.len() as u64);

        self.report(
            UploadPhase::Uploading,
            UPLOAD_START,
            format!("Uploading {} to Study Buddy...", size),
        );

        let response = self
            .backend
            .upload_audio(
                &request.backend_url,
                &request.credential(),
                &request.metadata,
                audio,
            )
            .await?;

        self.report(UploadPhase::Processing, UPLOAD_SENT, "Upload received, processing...");

        Ok(response.lecture_id)
    }

    async fn download_audio(&self, url: &str) -> Result<Bytes, ExecutorError> {
        self.report(UploadPhase::Downloading, DOWNLOAD_START, "Downloading audio...");

        let response = self.session.get(url).await?;
        let status = response.status();
        if !status.is_success() {
            return Err(ExecutorError::FetchStatus(status.as_u16()));
        }

        let content_type = response
            .headers()
            .get(CONTENT_TYPE)
            .and_then(|value| value.to_str().ok())
            .unwrap_or_default()
            .to_ascii_lowercase();
        check_content_type(&content_type)?;

        let total = response.content_length().filter(|total| *total > 0);
        let mut stream = response.bytes_stream();
        let mut audio = BytesMut::new();
        let mut last_percent = DOWNLOAD_START;

        while let Some(chunk) = stream.next().await {
            audio.extend_from_slice(&chunk?);

            if let Some(total) = total {
                let span = f64::from(DOWNLOAD_END - DOWNLOAD_START);
                let fraction = (audio.len() as f64 / total as f64).min(1.0);
                let percent = DOWNLOAD_START + (fraction * span) as u8;
                if percent >= last_percent + 5 {
                    last_percent = percent;
                    self.report(
                        UploadPhase::Downloading,
                        percent,
                        format!(
                            "Downloading audio... {} of {}",
                            format_bytes(audio.len() as u64),
                            format_bytes(total)
                        ),
                    );
                }
            }
        }

        let audio = audio.freeze();
        self.report(
            UploadPhase::Downloading,
            DOWNLOAD_END,
            format!("Downloaded {}", format_bytes(audio.len() as u64)),
        );

        Ok(audio)
    }
}

/// HTML means the credentials expired and we got the login page, whatever
/// the status code said.
fn check_content_type(content_type: &str) -> Result<(), ExecutorError> {
    if content_type.contains("text/html") {
        return Err(ExecutorError::LoginRedirect);
    }

    if content_type.starts_with("audio/") || content_type.starts_with("video/") {
        return Ok(());
    }

    let shown = if content_type.is_empty() {
        "unknown"
    } else {
        content_type
    };
    Err(ExecutorError::UnexpectedContentType(shown.to_string()))
}
