use std::sync::Arc;

use thiserror::Error;
use tracing::{debug, warn};
use url::Url;

use super::models::{ApiConfig, DeliveryInfoResponse};
use super::session::SiteSession;
use crate::domain::{AppError, DeliveryDescriptor, DescriptorParts, IdentifierKind, VideoIdentifier};

const UNKNOWN_API_ERROR: &str = "Unknown error from Panopto API";
const UNTITLED_LECTURE: &str = "Untitled lecture";
const UNREADABLE_RESPONSE: &str = "Panopto returned an unreadable video info response";

#[derive(Error, Debug)]
pub enum ApiError {
    #[error("HTTP request failed: {0}")]
    RequestError(#[from] reqwest::Error),

    #[error("Delivery info request failed with HTTP {0}")]
    Status(u16),

    #[error("Invalid response format: {0}")]
    InvalidResponse(String),

    #[error("Invalid page URL: {0}")]
    InvalidUrl(#[from] url::ParseError),
}

impl From<ApiError> for AppError {
    fn from(err: ApiError) -> Self {
        match err {
            ApiError::Status(status) => AppError::DeliveryFetch { status },
            ApiError::InvalidResponse(_) => AppError::unknown(UNREADABLE_RESPONSE),
            other => AppError::unknown(other.to_string()),
        }
    }
}

pub type Result<T> = std::result::Result<T, ApiError>;

/// Client for the source site's delivery-info endpoint.
#[derive(Clone)]
pub struct ApiClient {
    config: ApiConfig,
    session: Arc<dyn SiteSession>,
}

impl ApiClient {
    pub fn new(config: ApiConfig, session: Arc<dyn SiteSession>) -> Self {
        Self { config, session }
    }

    fn delivery_info_url(&self, page_url: &Url) -> Result<Url> {
        Ok(page_url.join(&self.config.delivery_info_path)?)
    }

    /// The two key spaces take different field sets; both are sent verbatim.
    fn delivery_request_body(identifier: &VideoIdentifier) -> String {
        match identifier.kind {
            IdentifierKind::Tid => format!(
                "&tid={}&isLiveNotes=false&refreshAuthCookie=true&isActiveBroadcast=false&isEditing=false&isKollectiveAgentInstalled=false&isEmbed=false&responseType=json",
                identifier.id
            ),
            IdentifierKind::Delivery => format!(
                "deliveryId={}&isEmbed=true&responseType=json",
                identifier.id
            ),
        }
    }

    /// Fetch the raw delivery-info payload for `identifier`.
    pub async fn fetch_delivery_info(
        &self,
        page_url: &Url,
        identifier: &VideoIdentifier,
    ) -> Result<DeliveryInfoResponse> {
        let url = self.delivery_info_url(page_url)?;
        debug!(%url, kind = ?identifier.kind, "requesting delivery info");

        let response = self
            .session
            .post_form(url.as_str(), Self::delivery_request_body(identifier))
            .await?;

        let status = response.status();
        if !status.is_success() {
            return Err(ApiError::Status(status.as_u16()));
        }

        response.json().await.map_err(|e| {
            warn!("delivery info was not valid JSON: {}", e);
            ApiError::InvalidResponse(format!("JSON decode error: {}", e))
        })
    }

    /// Resolve the delivery descriptor for the video on `page_url`.
    pub async fn resolve_descriptor(
        &self,
        page_url: &Url,
        identifier: &VideoIdentifier,
    ) -> std::result::Result<DeliveryDescriptor, AppError> {
        let info = self.fetch_delivery_info(page_url, identifier).await?;
        build_descriptor(info, identifier, page_url.as_str())
    }
}

/// Normalize a delivery-info payload into a descriptor.
pub fn build_descriptor(
    info: DeliveryInfoResponse,
    identifier: &VideoIdentifier,
    source_url: &str,
) -> std::result::Result<DeliveryDescriptor, AppError> {
    if info.has_error() {
        let message = info
            .error_message
            .filter(|m| !m.is_empty())
            .unwrap_or_else(|| UNKNOWN_API_ERROR.to_string());
        return Err(AppError::DeliveryApi { message });
    }

    let delivery = info.delivery.unwrap_or_default();

    let audio_podcast_url = delivery
        .podcast_streams
        .first()
        .and_then(|stream| non_empty(&stream.stream_url));

    let primary_stream = delivery.streams.first();
    let fallback_stream_url = audio_podcast_url
        .clone()
        .or_else(|| primary_stream.and_then(|s| non_empty(&s.stream_http_url)))
        .or_else(|| {
            primary_stream
                .and_then(|s| s.stream_variants.first())
                .and_then(|variant| non_empty(&variant.stream_url))
        })
        .ok_or(AppError::NoStreamAvailable)?;

    let is_audio_podcast_ready = matches!(
        delivery.is_audio_podcast_encode_complete,
        Some(serde_json::Value::Bool(true))
    );

    DeliveryDescriptor::try_from(DescriptorParts {
        public_id: delivery.public_id.unwrap_or_else(|| identifier.id.clone()),
        session_id: delivery.session_id.unwrap_or_else(|| identifier.id.clone()),
        session_name: delivery
            .session_name
            .filter(|name| !name.trim().is_empty())
            .unwrap_or_else(|| UNTITLED_LECTURE.to_string()),
        duration_seconds: delivery.duration.unwrap_or_default(),
        is_audio_podcast_ready,
        audio_podcast_url,
        fallback_stream_url: Some(fallback_stream_url),
        source_url: source_url.to_string(),
    })
}

fn non_empty(value: &Option<String>) -> Option<String> {
    value.as_deref().filter(|v| !v.is_empty()).map(str::to_string)
}
