use serde::{Deserialize, Serialize};

use super::AppError;

/// Which query key carried the video identifier. The delivery-info endpoint
/// expects a different request body for each.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IdentifierKind {
    /// `?id=` on viewer and embed pages.
    Delivery,
    /// `?tid=` links.
    Tid,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VideoIdentifier {
    pub id: String,
    pub kind: IdentifierKind,
}

/// Raw inputs for a [`DeliveryDescriptor`], checked on conversion.
#[derive(Debug, Clone, Default)]
pub struct DescriptorParts {
    pub public_id: String,
    pub session_id: String,
    pub session_name: String,
    pub duration_seconds: f64,
    pub is_audio_podcast_ready: bool,
    pub audio_podcast_url: Option<String>,
    pub fallback_stream_url: Option<String>,
    pub source_url: String,
}

/// Normalized delivery info for one download attempt.
#[derive(Debug, Clone, PartialEq)]
pub struct DeliveryDescriptor {
    public_id: String,
    session_id: String,
    session_name: String,
    duration_seconds: f64,
    is_audio_podcast_ready: bool,
    audio_podcast_url: Option<String>,
    fallback_stream_url: Option<String>,
    source_url: String,
}

impl TryFrom<DescriptorParts> for DeliveryDescriptor {
    type Error = AppError;

    fn try_from(parts: DescriptorParts) -> Result<Self, Self::Error> {
        // Without a podcast there must be something to hand to the server.
        if !parts.is_audio_podcast_ready && parts.fallback_stream_url.is_none() {
            return Err(AppError::NoStreamAvailable);
        }

        Ok(Self {
            public_id: parts.public_id,
            session_id: parts.session_id,
            session_name: parts.session_name,
            duration_seconds: parts.duration_seconds,
            is_audio_podcast_ready: parts.is_audio_podcast_ready,
            audio_podcast_url: parts.audio_podcast_url,
            fallback_stream_url: parts.fallback_stream_url,
            source_url: parts.source_url,
        })
    }
}

impl DeliveryDescriptor {
    pub fn public_id(&self) -> &str {
        &self.public_id
    }

    pub fn session_id(&self) -> &str {
        &self.session_id
    }

    pub fn session_name(&self) -> &str {
        &self.session_name
    }

    pub fn duration_seconds(&self) -> f64 {
        self.duration_seconds
    }

    pub fn is_audio_podcast_ready(&self) -> bool {
        self.is_audio_podcast_ready
    }

    pub fn audio_podcast_url(&self) -> Option<&str> {
        self.audio_podcast_url.as_deref()
    }

    pub fn fallback_stream_url(&self) -> Option<&str> {
        self.fallback_stream_url.as_deref()
    }

    pub fn source_url(&self) -> &str {
        &self.source_url
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum UploadPhase {
    Idle,
    Downloading,
    Uploading,
    Processing,
    Done,
    Error,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum UploadMethod {
    Primary,
    Fallback,
}

impl UploadMethod {
    pub fn label(self) -> &'static str {
        match self {
            UploadMethod::Primary => "Direct upload",
            UploadMethod::Fallback => "Server processing",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UploadProgress {
    pub phase: UploadPhase,
    pub percent: u8,
    pub message: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub method: Option<UploadMethod>,
}

impl UploadProgress {
    pub fn new(phase: UploadPhase, percent: u8, message: impl Into<String>) -> Self {
        Self {
            phase,
            percent: percent.min(100),
            message: message.into(),
            method: None,
        }
    }

    pub fn with_method(mut self, method: UploadMethod) -> Self {
        self.method = Some(method);
        self
    }

    pub fn starting() -> Self {
        Self::new(UploadPhase::Processing, 0, "Starting...")
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self.phase, UploadPhase::Done | UploadPhase::Error)
    }

    /// Processing with no known percentage is shown as an indeterminate bar.
    pub fn is_indeterminate(&self) -> bool {
        self.phase == UploadPhase::Processing && self.percent == 0
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DownloadRequest {
    pub course_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub session_token: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DownloadResult {
    pub success: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub lecture_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub method: Option<UploadMethod>,
}

impl DownloadResult {
    pub fn succeeded(
        message: impl Into<String>,
        lecture_id: Option<String>,
        method: UploadMethod,
    ) -> Self {
        Self {
            success: true,
            message: Some(message.into()),
            error: None,
            lecture_id,
            method: Some(method),
        }
    }

    pub fn failed(error: impl Into<String>) -> Self {
        Self {
            success: false,
            error: Some(error.into()),
            ..Default::default()
        }
    }

    /// One-line summary for the control surface.
    pub fn status_line(&self) -> String {
        if !self.success {
            return self
                .error
                .clone()
                .unwrap_or_else(|| "Unknown error".to_string());
        }

        let lecture_hint = self
            .lecture_id
            .as_deref()
            .map(|id| format!(" (ID: {})", id))
            .unwrap_or_default();
        let method_hint = match self.method {
            Some(UploadMethod::Primary) => " [Direct]",
            _ => " [Server]",
        };

        format!(
            "{}{}{}",
            self.message.as_deref().unwrap_or("Upload complete!"),
            lecture_hint,
            method_hint
        )
    }
}

/// Metadata sent alongside the audio file on the primary path.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LectureMetadata {
    pub session_id: String,
    pub course_id: String,
    pub title: String,
    pub duration: f64,
    pub source_url: String,
}

impl LectureMetadata {
    pub fn from_descriptor(descriptor: &DeliveryDescriptor, course_id: &str) -> Self {
        Self {
            session_id: descriptor.session_id().to_string(),
            course_id: course_id.to_string(),
            title: descriptor.session_name().to_string(),
            duration: descriptor.duration_seconds(),
            source_url: descriptor.source_url().to_string(),
        }
    }
}

/// Backend authorization material, picked once per attempt.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Credential {
    pub session_token: Option<String>,
    pub api_key: Option<String>,
}

impl Credential {
    pub fn new(session_token: Option<String>, api_key: Option<String>) -> Self {
        Self {
            session_token,
            api_key,
        }
    }

    /// Session token wins over the stored API key; blank values count as absent.
    pub fn bearer(&self) -> Option<&str> {
        [self.session_token.as_deref(), self.api_key.as_deref()]
            .into_iter()
            .flatten()
            .find(|token| !token.is_empty())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parts() -> DescriptorParts {
        DescriptorParts {
            public_id: "pub".into(),
            session_id: "sess".into(),
            session_name: "Lecture 1".into(),
            duration_seconds: 3600.0,
            source_url: "https://uni.panopto.com/Panopto/Pages/Viewer.aspx?id=sess".into(),
            ..Default::default()
        }
    }

    #[test]
    fn test_descriptor_requires_fallback_without_podcast() {
        let err = DeliveryDescriptor::try_from(parts()).unwrap_err();
        assert_eq!(err, AppError::NoStreamAvailable);

        let descriptor = DeliveryDescriptor::try_from(DescriptorParts {
            fallback_stream_url: Some("https://cdn/stream.m3u8".into()),
            ..parts()
        })
        .unwrap();
        assert!(!descriptor.is_audio_podcast_ready());
        assert_eq!(descriptor.fallback_stream_url(), Some("https://cdn/stream.m3u8"));
    }

    #[test]
    fn test_descriptor_with_ready_podcast_allows_missing_fallback() {
        let descriptor = DeliveryDescriptor::try_from(DescriptorParts {
            is_audio_podcast_ready: true,
            ..parts()
        })
        .unwrap();
        assert!(descriptor.fallback_stream_url().is_none());
    }

    #[test]
    fn test_bearer_precedence() {
        let both = Credential::new(Some("session".into()), Some("key".into()));
        assert_eq!(both.bearer(), Some("session"));

        let key_only = Credential::new(None, Some("key".into()));
        assert_eq!(key_only.bearer(), Some("key"));

        let blank_session = Credential::new(Some(String::new()), Some("key".into()));
        assert_eq!(blank_session.bearer(), Some("key"));

        assert_eq!(Credential::default().bearer(), None);
    }

    #[test]
    fn test_progress_percent_is_clamped() {
        let progress = UploadProgress::new(UploadPhase::Uploading, 140, "x");
        assert_eq!(progress.percent, 100);
        assert!(UploadProgress::starting().is_indeterminate());
    }

    #[test]
    fn test_progress_wire_format() {
        let progress = UploadProgress::new(UploadPhase::Done, 100, "Done")
            .with_method(UploadMethod::Primary);
        let json = serde_json::to_value(&progress).unwrap();
        assert_eq!(
            json,
            serde_json::json!({"phase": "done", "percent": 100, "message": "Done", "method": "primary"})
        );
    }

    #[test]
    fn test_status_line() {
        let ok = DownloadResult::succeeded("Sent!", Some("L1".into()), UploadMethod::Primary);
        assert_eq!(ok.status_line(), "Sent! (ID: L1) [Direct]");

        let server = DownloadResult::succeeded("Sent!", None, UploadMethod::Fallback);
        assert_eq!(server.status_line(), "Sent! [Server]");

        assert_eq!(DownloadResult::failed("nope").status_line(), "nope");
    }
}
