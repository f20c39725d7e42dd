use bytes::Bytes;
use reqwest::multipart::{Form, Part};
use reqwest::{Body, Client, RequestBuilder, Response};
use thiserror::Error;
use tracing::{debug, warn};

use super::models::{
    CourseOption, CoursesPayload, ErrorBody, HealthStatus, LectureDownloadPayload, LectureResponse,
    RawCourse,
};
use crate::domain::{AppError, Credential, LectureMetadata};
use crate::utils::sanitize_filename;

const UNKNOWN_DETAIL: &str = "Unknown error";

#[derive(Error, Debug)]
pub enum BackendError {
    #[error("HTTP request failed: {0}")]
    RequestError(#[from] reqwest::Error),

    /// Non-2xx answer; `detail` comes from the JSON error body when present.
    #[error("{}", status_message(.detail, .status))]
    Status { status: u16, detail: Option<String> },

    #[error("Failed to encode metadata: {0}")]
    Encode(#[from] serde_json::Error),
}

fn status_message(detail: &Option<String>, status: &u16) -> String {
    detail.clone().unwrap_or_else(|| format!("HTTP {}", status))
}

impl From<BackendError> for AppError {
    fn from(err: BackendError) -> Self {
        match err {
            BackendError::Status { status, detail } => AppError::Submission { status, detail },
            other => AppError::unknown(other.to_string()),
        }
    }
}

pub type Result<T> = std::result::Result<T, BackendError>;

/// Client for the Study Buddy backend.
#[derive(Clone, Default)]
pub struct BackendClient {
    client: Client,
}

impl BackendClient {
    pub fn new(client: Client) -> Self {
        Self { client }
    }

    fn authorize(builder: RequestBuilder, credential: &Credential) -> RequestBuilder {
        match credential.bearer() {
            Some(token) => builder.bearer_auth(token),
            None => builder,
        }
    }

    async fn check_status(response: Response) -> Result<Response> {
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }

        let detail = match response.json::<ErrorBody>().await {
            Ok(body) => body.detail_message(),
            Err(_) => Some(UNKNOWN_DETAIL.to_string()),
        };
        Err(BackendError::Status {
            status: status.as_u16(),
            detail,
        })
    }

    /// Successful bodies that are not JSON still count as submitted.
    async fn lecture_response(response: Response) -> LectureResponse {
        match response.json::<LectureResponse>().await {
            Ok(body) => body,
            Err(e) => {
                warn!("backend accepted the request but the body was not JSON: {}", e);
                LectureResponse::default()
            }
        }
    }

    /// Hand a stream URL to the backend for server-side download.
    pub async fn submit_download_request(
        &self,
        backend_url: &str,
        credential: &Credential,
        payload: &LectureDownloadPayload,
    ) -> Result<LectureResponse> {
        let url = format!("{}/api/lectures/download", backend_url);
        debug!(%url, course_id = %payload.course_id, "submitting stream url");

        let request = Self::authorize(self.client.post(&url), credential).json(payload);
        let response = Self::check_status(request.send().await?).await?;

        Ok(Self::lecture_response(response).await)
    }

    /// Upload an audio file with its lecture metadata.
    pub async fn upload_audio(
        &self,
        backend_url: &str,
        credential: &Credential,
        metadata: &LectureMetadata,
        audio: Bytes,
    ) -> Result<LectureResponse> {
        let url = format!("{}/api/lectures/audio", backend_url);
        let file_name = format!("{}.m4a", sanitize_filename(&metadata.session_id));
        debug!(%url, %file_name, size = audio.len(), "uploading audio");

        let length = audio.len() as u64;
        let file = Part::stream_with_length(Body::from(audio), length)
            .file_name(file_name)
            .mime_str("audio/mp4")?;
        let form = Form::new()
            .part("file", file)
            .text("metadata", serde_json::to_string(metadata)?);

        let request = Self::authorize(self.client.post(&url), credential).multipart(form);
        let response = Self::check_status(request.send().await?).await?;

        Ok(Self::lecture_response(response).await)
    }

    /// Ask the backend's health endpoint whether it is up. Only the API key is sent.
    pub async fn check_health(&self, backend_url: &str, api_key: Option<&str>) -> HealthStatus {
        let url = format!("{}/api/health", backend_url.trim_end_matches('/'));
        let credential = Credential::new(None, api_key.map(str::to_string));
        debug!(%url, "checking backend health");

        match Self::authorize(self.client.get(&url), &credential).send().await {
            Ok(response) if response.status().is_success() => HealthStatus::Reachable,
            Ok(response) => {
                warn!("backend health check returned HTTP {}", response.status());
                HealthStatus::ErrorStatus(response.status().as_u16())
            }
            Err(e) => {
                warn!("backend health check failed: {}", e);
                HealthStatus::Unreachable(e.to_string())
            }
        }
    }

    /// List the user's courses, skipping entries without an identifier.
    pub async fn list_courses(
        &self,
        backend_url: &str,
        credential: &Credential,
    ) -> std::result::Result<Vec<CourseOption>, AppError> {
        let url = format!("{}/api/courses", backend_url);
        let request = Self::authorize(self.client.get(&url), credential);

        let response = request
            .send()
            .await
            .map_err(|e| AppError::unknown(e.to_string()))?;
        let status = response.status();
        if !status.is_success() {
            return Err(AppError::unknown(format!(
                "Failed to fetch courses (HTTP {})",
                status.as_u16()
            )));
        }

        let payload: CoursesPayload = response
            .json()
            .await
            .map_err(|e| AppError::unknown(format!("Invalid response format: {}", e)))?;

        Ok(payload
            .into_courses()
            .into_iter()
            .filter_map(RawCourse::normalize)
            .collect())
    }
}
