use thiserror::Error;

/// Failures visible at the orchestration boundary.
///
/// Every variant renders to a message that is safe to show the user as-is.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AppError {
    #[error("Failed to get Lesson ID.")]
    MissingIdentifier,

    #[error("Not on a Panopto page.")]
    UnsupportedHost,

    #[error("Navigate to a Panopto Viewer or Embed page.")]
    NotViewerPage,

    #[error("Course selection is required.")]
    CourseRequired,

    #[error("Failed to load delivery info (HTTP {status})")]
    DeliveryFetch { status: u16 },

    #[error("{message}")]
    DeliveryApi { message: String },

    #[error("Stream URL not available")]
    NoStreamAvailable,

    /// Recoverable: the coordinator answers this with the fallback path.
    #[error("{message}")]
    PrimaryUpload { message: String },

    #[error("{}", submission_message(.detail, .status))]
    Submission { status: u16, detail: Option<String> },

    #[error("{0}")]
    Unknown(String),
}

impl AppError {
    pub fn unknown(message: impl Into<String>) -> Self {
        let message = message.into();
        if message.trim().is_empty() {
            AppError::Unknown("Unknown error".to_string())
        } else {
            AppError::Unknown(message)
        }
    }

    pub fn is_recoverable(&self) -> bool {
        matches!(self, AppError::PrimaryUpload { .. })
    }
}

fn submission_message(detail: &Option<String>, status: &u16) -> String {
    match detail {
        Some(detail) if !detail.is_empty() => detail.clone(),
        _ => format!("HTTP {}", status),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_submission_message_prefers_detail() {
        let err = AppError::Submission {
            status: 422,
            detail: Some("Course not found".to_string()),
        };
        assert_eq!(err.to_string(), "Course not found");

        let err = AppError::Submission {
            status: 502,
            detail: None,
        };
        assert_eq!(err.to_string(), "HTTP 502");
    }

    #[test]
    fn test_unknown_never_blank() {
        assert_eq!(AppError::unknown("  ").to_string(), "Unknown error");
        assert_eq!(AppError::unknown("boom").to_string(), "boom");
    }

    #[test]
    fn test_only_primary_failures_are_recoverable() {
        assert!(AppError::PrimaryUpload {
            message: "x".into()
        }
        .is_recoverable());
        assert!(!AppError::NoStreamAvailable.is_recoverable());
    }
}
