pub mod error;
pub mod model;

pub use error::AppError;
pub use model::{
    Credential, DeliveryDescriptor, DescriptorParts, DownloadRequest, DownloadResult,
    IdentifierKind, LectureMetadata, UploadMethod, UploadPhase, UploadProgress, VideoIdentifier,
};
