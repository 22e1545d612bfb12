// Downloader module - resilient download orchestration

pub mod backends;
pub mod classifier;
pub mod errors;
pub mod format_selector;
pub mod models;
pub mod orchestrator;
pub mod progress;
pub mod retry;
pub mod tools;
pub mod traits;
pub mod utils;

pub use backends::YtDlpBackend;
pub use classifier::{classify, ErrorCategory, RestrictionReason, RetryStrategy};
pub use errors::DownloadError;
pub use format_selector::{FormatSelector, QualitySpec, STANDARD_RESOLUTIONS};
pub use models::{
    DownloadProgress, DownloadRequest, Outcome, RequestError, StreamDescriptor, TransferHandle,
    VideoMetadata, YtDlpConfig,
};
pub use orchestrator::Downloader;
pub use progress::{NoopSink, ProgressReporter, ProgressSink, TransferProgress};
pub use retry::{AttemptState, BackoffConfig, Phase, RetryController, Sleeper, TokioSleeper};
pub use tools::{ToolInfo, ToolManager};
pub use traits::UpstreamProvider;
