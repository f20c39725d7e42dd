pub mod contexts;
pub mod control_surface;
pub mod download_coordinator;
pub mod executor;
pub mod messages;
pub mod progress;

pub use contexts::{BackgroundContext, ContentPort, PageContext};
pub use control_surface::ControlSurface;
pub use download_coordinator::{BackgroundPort, DownloadCoordinator, DownloadJob, PipelineState};
pub use executor::AudioUploadExecutor;
pub use messages::{BackgroundMessage, ContentMessage, ControlMessage};
pub use progress::{ProgressFeed, ProgressRelay, ProgressTracker, CLEAR_DELAY};
