pub mod client;
pub mod models;

pub use client::{BackendClient, BackendError};
pub use models::{CourseOption, HealthStatus, LectureDownloadPayload, LectureResponse};
