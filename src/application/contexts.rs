//! The page and background contexts as message-driven services.
//!
//! Each context owns its inbox and handles one message at a time.

use tracing::debug;
use url::Url;

use super::download_coordinator::{BackgroundPort, DownloadCoordinator, DownloadJob};
use super::executor::AudioUploadExecutor;
use super::messages::{
    BackgroundMessage, ContentMessage, Envelope, FetchAndUploadAudioResponse, Port,
};
use super::progress::ProgressRelay;
use crate::config::SettingsStore;
use crate::domain::{DownloadRequest, DownloadResult};

const INBOX_CAPACITY: usize = 16;

pub type ContentPort = Port<ContentMessage, DownloadResult>;

/// Privileged context: holds site credentials and performs the audio upload.
pub struct BackgroundContext {
    executor: AudioUploadExecutor,
    relay: ProgressRelay,
}

impl BackgroundContext {
    pub fn new(executor: AudioUploadExecutor, relay: ProgressRelay) -> Self {
        Self { executor, relay }
    }

    /// Returns a response only for messages that expect one.
    pub async fn handle(&self, message: BackgroundMessage) -> Option<FetchAndUploadAudioResponse> {
        match message {
            BackgroundMessage::FetchAndUploadAudio(request) => {
                Some(self.executor.fetch_and_upload(request).await)
            }
            BackgroundMessage::BackgroundProgress { progress } => {
                self.relay.emit(progress);
                None
            }
        }
    }

    pub fn spawn(self) -> BackgroundPort {
        let (port, mut inbox) = Port::channel(INBOX_CAPACITY);
        tokio::spawn(async move {
            while let Some(Envelope { message, reply }) = inbox.recv().await {
                if let Some(response) = self.handle(message).await {
                    reply.send(response);
                }
            }
            debug!("background context stopped");
        });
        port
    }
}

/// Page context: knows the current page and runs the download pipeline.
pub struct PageContext {
    coordinator: DownloadCoordinator,
    page_url: Url,
    settings: SettingsStore,
}

impl PageContext {
    pub fn new(coordinator: DownloadCoordinator, page_url: Url, settings: SettingsStore) -> Self {
        Self {
            coordinator,
            page_url,
            settings,
        }
    }

    pub async fn handle(&self, message: ContentMessage) -> DownloadResult {
        match message {
            ContentMessage::DownloadVideo(request) => self.download(request).await,
        }
    }

    async fn download(&self, request: DownloadRequest) -> DownloadResult {
        let job = DownloadJob {
            page_url: self.page_url.clone(),
            request,
            settings: self.settings.get(),
        };
        self.coordinator.run(job).await
    }

    pub fn spawn(self) -> ContentPort {
        let (port, mut inbox) = Port::channel(INBOX_CAPACITY);
        tokio::spawn(async move {
            while let Some(Envelope { message, reply }) = inbox.recv().await {
                reply.send(self.handle(message).await);
            }
            debug!("page context stopped");
        });
        port
    }
}
