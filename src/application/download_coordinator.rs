use tracing::{info, warn};
use url::Url;

use super::messages::{
    BackgroundMessage, FetchAndUploadAudio, FetchAndUploadAudioResponse, Port,
};
use super::progress::ProgressRelay;
use crate::api::ApiClient;
use crate::backend::{BackendClient, LectureDownloadPayload};
use crate::config::Settings;
use crate::domain::{
    AppError, Credential, DeliveryDescriptor, DownloadRequest, DownloadResult, LectureMetadata,
    UploadMethod, UploadPhase, UploadProgress,
};
use crate::utils::extract_video_id;

const PRIMARY_SUCCESS: &str = "Audio uploaded to Study Buddy!";
const FALLBACK_SUCCESS: &str = "Video sent to Study Buddy! Download started.";

pub type BackgroundPort = Port<BackgroundMessage, FetchAndUploadAudioResponse>;

/// Everything one download attempt needs, captured when the user clicks.
#[derive(Debug, Clone)]
pub struct DownloadJob {
    pub page_url: Url,
    pub request: DownloadRequest,
    pub settings: Settings,
}

impl DownloadJob {
    fn credential(&self) -> Credential {
        Credential::new(
            self.request.session_token.clone(),
            self.settings.api_key().map(str::to_string),
        )
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Completion {
    pub lecture_id: Option<String>,
    pub method: UploadMethod,
}

impl Completion {
    fn message(&self) -> &'static str {
        match self.method {
            UploadMethod::Primary => PRIMARY_SUCCESS,
            UploadMethod::Fallback => FALLBACK_SUCCESS,
        }
    }
}

/// States of one download attempt.
#[derive(Debug, Clone, PartialEq)]
pub enum PipelineState {
    Idle,
    ResolvingDescriptor,
    PrimaryAttempt(DeliveryDescriptor),
    FallbackAttempt(DeliveryDescriptor),
    Done(Completion),
    Failed(AppError),
}

impl PipelineState {
    /// Progress announced on entering this state. `Idle` announces nothing.
    fn progress(&self) -> Option<UploadProgress> {
        let progress = match self {
            PipelineState::Idle => return None,
            PipelineState::ResolvingDescriptor => {
                UploadProgress::new(UploadPhase::Processing, 0, "Fetching video info...")
            }
            PipelineState::PrimaryAttempt(_) => UploadProgress::new(
                UploadPhase::Downloading,
                5,
                "Audio podcast found, downloading...",
            )
            .with_method(UploadMethod::Primary),
            PipelineState::FallbackAttempt(_) => UploadProgress::new(
                UploadPhase::Processing,
                0,
                "Sending stream to Study Buddy for processing...",
            )
            .with_method(UploadMethod::Fallback),
            PipelineState::Done(completion) => {
                UploadProgress::new(UploadPhase::Done, 100, completion.message())
                    .with_method(completion.method)
            }
            PipelineState::Failed(err) => {
                UploadProgress::new(UploadPhase::Error, 0, err.to_string())
            }
        };
        Some(progress)
    }
}

/// Drives a download attempt from page URL to backend submission.
///
/// The audio podcast is tried first when it is ready; any failure there
/// falls through to handing the stream URL to the backend, exactly once.
#[derive(Clone)]
pub struct DownloadCoordinator {
    api_client: ApiClient,
    backend: BackendClient,
    background: BackgroundPort,
    progress: ProgressRelay,
}

impl DownloadCoordinator {
    pub fn new(
        api_client: ApiClient,
        backend: BackendClient,
        background: BackgroundPort,
        progress: ProgressRelay,
    ) -> Self {
        Self {
            api_client,
            backend,
            background,
            progress,
        }
    }

    /// Run the attempt to completion. Always yields a result.
    pub async fn run(&self, job: DownloadJob) -> DownloadResult {
        let mut state = PipelineState::Idle;

        loop {
            state = match state {
                PipelineState::Idle => {
                    if job.request.course_id.trim().is_empty() {
                        self.enter(PipelineState::Failed(AppError::CourseRequired))
                    } else {
                        self.enter(PipelineState::ResolvingDescriptor)
                    }
                }
                PipelineState::ResolvingDescriptor => match self.resolve(&job).await {
                    Ok(descriptor) if descriptor.is_audio_podcast_ready() => {
                        self.enter(PipelineState::PrimaryAttempt(descriptor))
                    }
                    Ok(descriptor) => self.enter(PipelineState::FallbackAttempt(descriptor)),
                    Err(e) => self.enter(PipelineState::Failed(e)),
                },
                PipelineState::PrimaryAttempt(descriptor) => {
                    match self.attempt_primary(&descriptor, &job).await {
                        Ok(lecture_id) => self.enter(PipelineState::Done(Completion {
                            lecture_id,
                            method: UploadMethod::Primary,
                        })),
                        Err(e) => {
                            warn!("primary upload failed, falling back to stream url: {}", e);
                            self.enter(PipelineState::FallbackAttempt(descriptor))
                        }
                    }
                }
                PipelineState::FallbackAttempt(descriptor) => {
                    match self.attempt_fallback(&descriptor, &job).await {
                        Ok(lecture_id) => self.enter(PipelineState::Done(Completion {
                            lecture_id,
                            method: UploadMethod::Fallback,
                        })),
                        Err(e) => self.enter(PipelineState::Failed(e)),
                    }
                }
                PipelineState::Done(completion) => {
                    return DownloadResult::succeeded(
                        completion.message(),
                        completion.lecture_id,
                        completion.method,
                    );
                }
                PipelineState::Failed(err) => return DownloadResult::failed(err.to_string()),
            };
        }
    }

    fn enter(&self, state: PipelineState) -> PipelineState {
        info!(state = state_name(&state), "download state changed");
        if let Some(progress) = state.progress() {
            self.progress.emit(progress);
        }
        state
    }

    async fn resolve(&self, job: &DownloadJob) -> Result<DeliveryDescriptor, AppError> {
        let identifier = extract_video_id(&job.page_url)?;
        self.api_client
            .resolve_descriptor(&job.page_url, &identifier)
            .await
    }

    async fn attempt_primary(
        &self,
        descriptor: &DeliveryDescriptor,
        job: &DownloadJob,
    ) -> Result<Option<String>, AppError> {
        let audio_podcast_url = descriptor
            .audio_podcast_url()
            .ok_or_else(|| AppError::PrimaryUpload {
                message: "Audio podcast URL missing".to_string(),
            })?;

        let credential = job.credential();
        let message = BackgroundMessage::FetchAndUploadAudio(FetchAndUploadAudio {
            audio_podcast_url: audio_podcast_url.to_string(),
            metadata: LectureMetadata::from_descriptor(descriptor, &job.request.course_id),
            backend_url: job.settings.resolved_backend_url(),
            session_token: credential.session_token,
            api_key: credential.api_key,
        });

        let response = self
            .background
            .request(message)
            .await
            .map_err(|e| AppError::PrimaryUpload {
                message: e.to_string(),
            })?;

        if response.success {
            Ok(response.lecture_id)
        } else {
            Err(AppError::PrimaryUpload {
                message: response
                    .error
                    .unwrap_or_else(|| "Audio upload failed".to_string()),
            })
        }
    }

    async fn attempt_fallback(
        &self,
        descriptor: &DeliveryDescriptor,
        job: &DownloadJob,
    ) -> Result<Option<String>, AppError> {
        let stream_url = descriptor
            .fallback_stream_url()
            .ok_or(AppError::NoStreamAvailable)?;

        let payload = LectureDownloadPayload {
            course_id: job.request.course_id.clone(),
            panopto_url: descriptor.source_url().to_string(),
            stream_url: stream_url.to_string(),
            title: Some(descriptor.session_name().to_string()),
        };

        let response = self
            .backend
            .submit_download_request(
                &job.settings.resolved_backend_url(),
                &job.credential(),
                &payload,
            )
            .await?;

        if response.lecture_id.is_none() {
            info!("backend accepted the stream without returning a lecture id");
        }
        Ok(response.lecture_id)
    }
}

fn state_name(state: &PipelineState) -> &'static str {
    match state {
        PipelineState::Idle => "idle",
        PipelineState::ResolvingDescriptor => "resolving_descriptor",
        PipelineState::PrimaryAttempt(_) => "primary_attempt",
        PipelineState::FallbackAttempt(_) => "fallback_attempt",
        PipelineState::Done(_) => "done",
        PipelineState::Failed(_) => "failed",
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use mockito::{Matcher, Mock, ServerGuard};
    use serde_json::json;
    use tokio::sync::broadcast;

    use super::*;
    use crate::api::{ApiConfig, CookieSession, SiteSession};
    use crate::application::contexts::BackgroundContext;
    use crate::application::executor::AudioUploadExecutor;
    use crate::application::messages::ControlMessage;

    const DELIVERY_PATH: &str = "/Panopto/Pages/Viewer/DeliveryInfo.aspx";

    fn coordinator(relay: &ProgressRelay) -> DownloadCoordinator {
        let session: Arc<dyn SiteSession> = Arc::new(CookieSession::new(None));
        let background = BackgroundContext::new(
            AudioUploadExecutor::new(session.clone(), BackendClient::default(), relay.clone()),
            relay.clone(),
        )
        .spawn();

        DownloadCoordinator::new(
            ApiClient::new(ApiConfig::default(), session),
            BackendClient::default(),
            background,
            relay.clone(),
        )
    }

    fn job(server: &ServerGuard, course_id: &str) -> DownloadJob {
        DownloadJob {
            page_url: Url::parse(&format!("{}/Panopto/Pages/Viewer.aspx?id=abc", server.url()))
                .unwrap(),
            request: DownloadRequest {
                course_id: course_id.to_string(),
                session_token: Some("tok".to_string()),
            },
            settings: Settings {
                backend_url: Some(server.url()),
                api_key: Some("key".to_string()),
            },
        }
    }

    async fn delivery_info(server: &mut ServerGuard, body: serde_json::Value) -> Mock {
        server
            .mock("POST", DELIVERY_PATH)
            .match_body("deliveryId=abc&isEmbed=true&responseType=json")
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(body.to_string())
            .create_async()
            .await
    }

    fn podcast_delivery(server: &ServerGuard, ready: bool) -> serde_json::Value {
        json!({
            "Delivery": {
                "PublicID": "pub-1",
                "SessionID": "sess-1",
                "SessionName": "Week 1",
                "Duration": 3000,
                "IsAudioPodcastEncodeComplete": ready,
                "PodcastStreams": [{"StreamUrl": format!("{}/podcast.mp4", server.url())}],
                "Streams": [{"StreamHttpUrl": "https://cdn/video.mp4"}]
            }
        })
    }

    fn drain(rx: &mut broadcast::Receiver<ControlMessage>) -> Vec<UploadProgress> {
        let mut seen = Vec::new();
        while let Ok(ControlMessage::ProgressUpdate { progress }) = rx.try_recv() {
            seen.push(progress);
        }
        seen
    }

    #[tokio::test]
    async fn test_primary_path_success() {
        let mut server = mockito::Server::new_async().await;
        let delivery = podcast_delivery(&server, true);
        delivery_info(&mut server, delivery).await;
        server
            .mock("GET", "/podcast.mp4")
            .with_status(200)
            .with_header("content-type", "audio/mp4")
            .with_body(vec![0u8; 2 * 1024 * 1024])
            .create_async()
            .await;
        let upload = server
            .mock("POST", "/api/lectures/audio")
            .match_header("authorization", "Bearer tok")
            .with_status(200)
            .with_body(r#"{"lecture_id":"L1","status":"ok"}"#)
            .expect(1)
            .create_async()
            .await;
        let submit = server
            .mock("POST", "/api/lectures/download")
            .expect(0)
            .create_async()
            .await;

        let relay = ProgressRelay::new(256);
        let mut rx = relay.subscribe();
        let result = coordinator(&relay).run(job(&server, "c1")).await;

        assert!(result.success);
        assert_eq!(result.lecture_id.as_deref(), Some("L1"));
        assert_eq!(result.method, Some(UploadMethod::Primary));
        upload.assert_async().await;
        submit.assert_async().await;

        let seen = drain(&mut rx);
        let last = seen.last().unwrap();
        assert_eq!(last.phase, UploadPhase::Done);
        assert_eq!(last.percent, 100);
        assert_eq!(seen[0].phase, UploadPhase::Processing);
        assert!(seen.iter().any(|p| p.message == "Downloaded 2.0 MB"));
    }

    #[tokio::test]
    async fn test_login_redirect_falls_back_to_stream_url() {
        let mut server = mockito::Server::new_async().await;
        let delivery = podcast_delivery(&server, true);
        delivery_info(&mut server, delivery).await;
        server
            .mock("GET", "/podcast.mp4")
            .with_status(200)
            .with_header("content-type", "text/html")
            .with_body("<html>login</html>")
            .create_async()
            .await;
        let upload = server
            .mock("POST", "/api/lectures/audio")
            .expect(0)
            .create_async()
            .await;
        let submit = server
            .mock("POST", "/api/lectures/download")
            .match_header("authorization", "Bearer tok")
            .match_body(Matcher::PartialJson(json!({
                "course_id": "c1",
                "stream_url": format!("{}/podcast.mp4", server.url()),
                "title": "Week 1"
            })))
            .with_status(200)
            .with_body(r#"{"lecture_id":"L2","status":"queued"}"#)
            .expect(1)
            .create_async()
            .await;

        let relay = ProgressRelay::new(256);
        let mut rx = relay.subscribe();
        let result = coordinator(&relay).run(job(&server, "c1")).await;

        assert_eq!(
            result,
            DownloadResult::succeeded(FALLBACK_SUCCESS, Some("L2".into()), UploadMethod::Fallback)
        );
        upload.assert_async().await;
        submit.assert_async().await;

        // The primary failure never surfaces as an error record.
        let seen = drain(&mut rx);
        assert!(seen.iter().all(|p| p.phase != UploadPhase::Error));
        let primary_at = seen
            .iter()
            .position(|p| p.method == Some(UploadMethod::Primary))
            .unwrap();
        let fallback_at = seen
            .iter()
            .position(|p| p.method == Some(UploadMethod::Fallback))
            .unwrap();
        assert!(primary_at < fallback_at);
        assert_eq!(seen.last().unwrap().phase, UploadPhase::Done);
    }

    #[tokio::test]
    async fn test_primary_upload_failure_triggers_exactly_one_fallback() {
        let mut server = mockito::Server::new_async().await;
        let delivery = podcast_delivery(&server, true);
        delivery_info(&mut server, delivery).await;
        server
            .mock("GET", "/podcast.mp4")
            .with_status(200)
            .with_header("content-type", "audio/mp4")
            .with_body("audio")
            .create_async()
            .await;
        server
            .mock("POST", "/api/lectures/audio")
            .with_status(500)
            .with_body(r#"{"detail":"disk full"}"#)
            .create_async()
            .await;
        let submit = server
            .mock("POST", "/api/lectures/download")
            .with_status(200)
            .with_body("not json")
            .expect(1)
            .create_async()
            .await;

        let relay = ProgressRelay::new(256);
        let result = coordinator(&relay).run(job(&server, "c1")).await;

        assert!(result.success);
        assert_eq!(result.method, Some(UploadMethod::Fallback));
        assert_eq!(result.lecture_id, None);
        submit.assert_async().await;
    }

    #[tokio::test]
    async fn test_unready_podcast_skips_primary() {
        let mut server = mockito::Server::new_async().await;
        let delivery = podcast_delivery(&server, false);
        delivery_info(&mut server, delivery).await;
        let podcast = server
            .mock("GET", "/podcast.mp4")
            .expect(0)
            .create_async()
            .await;
        server
            .mock("POST", "/api/lectures/download")
            .with_status(200)
            .with_body(r#"{"lecture_id":"L3","status":"queued"}"#)
            .create_async()
            .await;

        let relay = ProgressRelay::new(256);
        let mut rx = relay.subscribe();
        let result = coordinator(&relay).run(job(&server, "c1")).await;

        assert_eq!(result.method, Some(UploadMethod::Fallback));
        podcast.assert_async().await;
        assert!(drain(&mut rx)
            .iter()
            .all(|p| p.method != Some(UploadMethod::Primary)));
    }

    #[tokio::test]
    async fn test_upstream_error_stops_before_any_fetch() {
        let mut server = mockito::Server::new_async().await;
        delivery_info(
            &mut server,
            json!({"ErrorCode": 1, "ErrorMessage": "Session not found"}),
        )
        .await;
        let podcast = server.mock("GET", "/podcast.mp4").expect(0).create_async().await;
        let submit = server
            .mock("POST", "/api/lectures/download")
            .expect(0)
            .create_async()
            .await;

        let relay = ProgressRelay::new(256);
        let mut rx = relay.subscribe();
        let result = coordinator(&relay).run(job(&server, "c1")).await;

        assert_eq!(result, DownloadResult::failed("Session not found"));
        podcast.assert_async().await;
        submit.assert_async().await;

        let seen = drain(&mut rx);
        let last = seen.last().unwrap();
        assert_eq!(last.phase, UploadPhase::Error);
        assert_eq!(last.message, "Session not found");
    }

    #[tokio::test]
    async fn test_no_stream_available_submits_nothing() {
        let mut server = mockito::Server::new_async().await;
        delivery_info(
            &mut server,
            json!({"Delivery": {"IsAudioPodcastEncodeComplete": false, "Streams": []}}),
        )
        .await;
        let submit = server
            .mock("POST", "/api/lectures/download")
            .expect(0)
            .create_async()
            .await;

        let relay = ProgressRelay::new(256);
        let result = coordinator(&relay).run(job(&server, "c1")).await;

        assert_eq!(result, DownloadResult::failed("Stream URL not available"));
        submit.assert_async().await;
    }

    #[tokio::test]
    async fn test_fallback_failure_is_terminal() {
        let mut server = mockito::Server::new_async().await;
        delivery_info(
            &mut server,
            json!({"Delivery": {"Streams": [{"StreamHttpUrl": "https://cdn/video.mp4"}]}}),
        )
        .await;
        let submit = server
            .mock("POST", "/api/lectures/download")
            .with_status(403)
            .with_body(r#"{"detail":"Invalid API key"}"#)
            .expect(1)
            .create_async()
            .await;

        let relay = ProgressRelay::new(256);
        let mut rx = relay.subscribe();
        let result = coordinator(&relay).run(job(&server, "c1")).await;

        assert_eq!(result, DownloadResult::failed("Invalid API key"));
        submit.assert_async().await;
        assert_eq!(drain(&mut rx).last().unwrap().phase, UploadPhase::Error);
    }

    #[tokio::test]
    async fn test_blank_course_fails_without_network() {
        let mut server = mockito::Server::new_async().await;
        let delivery = server.mock("POST", DELIVERY_PATH).expect(0).create_async().await;

        let relay = ProgressRelay::new(16);
        let mut rx = relay.subscribe();
        let result = coordinator(&relay).run(job(&server, "")).await;

        assert_eq!(result, DownloadResult::failed("Course selection is required."));
        delivery.assert_async().await;

        let seen = drain(&mut rx);
        assert_eq!(seen.len(), 1);
        assert_eq!(seen[0].phase, UploadPhase::Error);
    }

    #[tokio::test]
    async fn test_missing_identifier_fails() {
        let server = mockito::Server::new_async().await;
        let mut missing = job(&server, "c1");
        missing.page_url =
            Url::parse(&format!("{}/Panopto/Pages/Viewer.aspx", server.url())).unwrap();

        let relay = ProgressRelay::new(16);
        let result = coordinator(&relay).run(missing).await;
        assert_eq!(result, DownloadResult::failed("Failed to get Lesson ID."));
    }

    #[test]
    fn test_each_state_announces_one_record() {
        assert!(PipelineState::Idle.progress().is_none());

        let failed = PipelineState::Failed(AppError::NoStreamAvailable)
            .progress()
            .unwrap();
        assert_eq!(failed.phase, UploadPhase::Error);
        assert_eq!(failed.message, "Stream URL not available");

        let done = PipelineState::Done(Completion {
            lecture_id: None,
            method: UploadMethod::Primary,
        })
        .progress()
        .unwrap();
        assert_eq!((done.phase, done.percent), (UploadPhase::Done, 100));
        assert_eq!(done.method, Some(UploadMethod::Primary));
    }
}
