// Upstream provider trait definition

use async_trait::async_trait;
use std::path::{Path, PathBuf};

use super::errors::DownloadError;
use super::models::{StreamDescriptor, VideoMetadata};
use super::progress::ProgressReporter;

/// The unstable metadata/extraction service the engine orchestrates
#[async_trait]
pub trait UpstreamProvider: Send + Sync {
    /// Name of the provider (for logging)
    fn name(&self) -> &'static str;

    /// Resolve an identifier to a title and its available encodings
    async fn fetch_metadata(&self, identifier: &str) -> Result<VideoMetadata, DownloadError>;

    /// Transfer one encoding into `destination`, reporting byte progress
    async fn open_transfer(
        &self,
        stream: &StreamDescriptor,
        destination: &Path,
        progress: &mut ProgressReporter,
    ) -> Result<PathBuf, DownloadError>;

    /// Best-effort, idempotent refresh of the extraction rules after the
    /// upstream format drifted
    async fn refresh_extraction_patterns(&self) -> Result<(), DownloadError>;
}
