// Retry/backoff controller - the attempt loop behind `Downloader::download`
//
// States: Fetching → Selecting → Transferring → Succeeded | Failed,
// with Retrying looping back to Fetching.
//
// - ParseFailure: pattern recovery, then exponential backoff
// - TransientRejection: exponential backoff
// - Unknown: one retry after a fixed delay
// - RestrictedContent / NoMatchingStream: terminal, no wait

use async_trait::async_trait;
use std::fmt;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use super::classifier::{classify, ErrorCategory, RetryStrategy};
use super::errors::DownloadError;
use super::format_selector::{FormatSelector, QualitySpec};
use super::models::{DownloadRequest, Outcome, StreamDescriptor};
use super::progress::{ProgressReporter, ProgressSink};
use super::traits::UpstreamProvider;
use super::utils::{fallback_title, try_get_title};

/// Controller state, reported to sinks for status lines
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    Fetching,
    Selecting,
    Transferring,
    Retrying,
    Succeeded,
    Failed,
}

impl Phase {
    pub fn status_line(&self) -> &'static str {
        match self {
            Self::Fetching => "Fetching video information...",
            Self::Selecting => "Selecting stream...",
            Self::Transferring => "Downloading...",
            Self::Retrying => "Retrying...",
            Self::Succeeded => "Download complete!",
            Self::Failed => "Download failed!",
        }
    }
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.status_line())
    }
}

/// Timing knobs for the attempt loop
#[derive(Debug, Clone)]
pub struct BackoffConfig {
    /// First backoff wait; doubled after each backoff retry
    pub base_delay: Duration,
    /// Fixed wait before the single retry of an unknown error
    pub unknown_retry_delay: Duration,
}

impl Default for BackoffConfig {
    fn default() -> Self {
        Self {
            base_delay: Duration::from_secs(1),
            unknown_retry_delay: Duration::from_secs(1),
        }
    }
}

impl BackoffConfig {
    pub fn with_base_delay(mut self, delay: Duration) -> Self {
        self.base_delay = delay;
        self
    }

    pub fn with_unknown_retry_delay(mut self, delay: Duration) -> Self {
        self.unknown_retry_delay = delay;
        self
    }
}

/// Suspends the attempt loop between retries
#[async_trait]
pub trait Sleeper: Send + Sync {
    async fn sleep(&self, duration: Duration);
}

/// Real wall-clock waits
#[derive(Debug, Default, Clone, Copy)]
pub struct TokioSleeper;

#[async_trait]
impl Sleeper for TokioSleeper {
    async fn sleep(&self, duration: Duration) {
        tokio::time::sleep(duration).await;
    }
}

/// Mutable bookkeeping for one `download` call. Never shared.
#[derive(Debug, Clone)]
pub struct AttemptState {
    /// All retries taken, including the one-shot unknown-error retry
    pub retry_count: u32,
    /// Retries charged against `max_retries` (parse and transient failures)
    pub backoff_retries: u32,
    pub backoff: Duration,
    pub last_error: Option<ErrorCategory>,
    /// Quality actually requested from the selector (switches to highest after fallback)
    pub quality: QualitySpec,
    pub fallback_used: bool,
    pub unknown_retry_used: bool,
}

impl AttemptState {
    pub fn new(config: &BackoffConfig, quality: QualitySpec) -> Self {
        Self {
            retry_count: 0,
            backoff_retries: 0,
            backoff: config.base_delay,
            last_error: None,
            quality,
            fallback_used: false,
            unknown_retry_used: false,
        }
    }

    /// Total attempts started so far
    pub fn attempts(&self) -> u32 {
        self.retry_count + 1
    }

    /// Consume retry budget for `strategy`; `None` means give up.
    pub fn next_delay(
        &mut self,
        strategy: RetryStrategy,
        max_retries: u32,
        config: &BackoffConfig,
    ) -> Option<Duration> {
        match strategy {
            RetryStrategy::Terminal => None,
            RetryStrategy::Backoff | RetryStrategy::RecoverThenBackoff => {
                if self.backoff_retries >= max_retries {
                    return None;
                }
                self.backoff_retries += 1;
                self.retry_count += 1;
                let delay = self.backoff;
                self.backoff = self.backoff.saturating_mul(2);
                Some(delay)
            }
            RetryStrategy::RetryOnce => {
                if self.unknown_retry_used {
                    return None;
                }
                self.unknown_retry_used = true;
                self.retry_count += 1;
                Some(config.unknown_retry_delay)
            }
        }
    }
}

/// Drives one request to exactly one `Outcome`
pub struct RetryController<'a> {
    upstream: &'a dyn UpstreamProvider,
    sleeper: &'a dyn Sleeper,
    config: &'a BackoffConfig,
    sink: Arc<dyn ProgressSink>,
    cancel: &'a CancellationToken,
}

impl<'a> RetryController<'a> {
    pub fn new(
        upstream: &'a dyn UpstreamProvider,
        sleeper: &'a dyn Sleeper,
        config: &'a BackoffConfig,
        sink: Arc<dyn ProgressSink>,
        cancel: &'a CancellationToken,
    ) -> Self {
        Self {
            upstream,
            sleeper,
            config,
            sink,
            cancel,
        }
    }

    pub async fn run(&self, request: &DownloadRequest) -> Outcome {
        let mut state = AttemptState::new(self.config, request.quality().clone());

        loop {
            if self.cancel.is_cancelled() {
                return self.cancelled();
            }

            debug!(
                attempt = state.attempts(),
                max_retries = request.max_retries(),
                upstream = self.upstream.name(),
                "Starting attempt"
            );

            let error = match self.attempt(request, &mut state).await {
                Ok((path, title)) => {
                    info!(path = %path.display(), attempts = state.attempts(), "Download complete");
                    self.sink.on_phase(Phase::Succeeded);
                    return Outcome::Success {
                        path,
                        message: format!("Download complete: {}", title),
                    };
                }
                Err(error) => error,
            };

            let category = classify(&error);
            state.last_error = Some(category);
            let strategy = category.retry_strategy();

            let Some(delay) = state.next_delay(strategy, request.max_retries(), self.config) else {
                warn!(
                    category = %category,
                    attempts = state.attempts(),
                    error = %error,
                    "Giving up"
                );
                self.sink.on_phase(Phase::Failed);
                return Outcome::Failure {
                    category: Some(category),
                    message: category.terminal_message(&error, state.attempts()),
                };
            };

            warn!(
                category = %category,
                retry = state.retry_count,
                max_retries = request.max_retries(),
                delay_ms = delay.as_millis() as u64,
                error = %error,
                "Attempt failed, retrying"
            );

            if strategy == RetryStrategy::RecoverThenBackoff {
                self.recover_patterns().await;
            }

            if self.cancel.is_cancelled() {
                return self.cancelled();
            }
            self.sink.on_phase(Phase::Retrying);
            tokio::select! {
                _ = self.sleeper.sleep(delay) => {}
                _ = self.cancel.cancelled() => return self.cancelled(),
            }
        }
    }

    // Fetching → Selecting → Transferring. Returns path and display title.
    async fn attempt(
        &self,
        request: &DownloadRequest,
        state: &mut AttemptState,
    ) -> Result<(PathBuf, String), DownloadError> {
        self.sink.on_phase(Phase::Fetching);
        let metadata = self.upstream.fetch_metadata(request.identifier()).await?;

        let title = try_get_title(&metadata).unwrap_or_else(|| {
            let fallback = fallback_title(request.identifier());
            debug!(fallback = %fallback, "Title unavailable, using fallback label");
            fallback
        });

        self.sink.on_phase(Phase::Selecting);
        let stream = self.select_stream(&metadata.streams, request, state)?.clone();
        info!(
            title = %title,
            quality = %stream.quality,
            size = ?stream.size,
            "Selected stream"
        );

        self.sink.on_phase(Phase::Transferring);
        let mut reporter = ProgressReporter::new(self.sink.clone());
        reporter.begin(stream.size);
        let path = self
            .upstream
            .open_transfer(&stream, request.destination(), &mut reporter)
            .await?;

        Ok((path, title))
    }

    fn select_stream<'s>(
        &self,
        streams: &'s [StreamDescriptor],
        request: &DownloadRequest,
        state: &mut AttemptState,
    ) -> Result<&'s StreamDescriptor, DownloadError> {
        if let Some(stream) = FormatSelector::select(streams, &state.quality) {
            return Ok(stream);
        }

        let no_match = || DownloadError::NoMatchingStream {
            requested: request.quality().to_string(),
        };

        if state.quality.is_symbolic() || state.fallback_used {
            return Err(no_match());
        }

        warn!(
            requested = %state.quality,
            available = ?FormatSelector::available_labels(streams),
            "Requested quality not available, falling back to highest"
        );
        state.fallback_used = true;
        state.quality = QualitySpec::Highest;
        FormatSelector::select(streams, &state.quality).ok_or_else(no_match)
    }

    // Best-effort: failure is logged and never blocks the retry
    async fn recover_patterns(&self) {
        info!(upstream = self.upstream.name(), "Refreshing extraction patterns");
        match self.upstream.refresh_extraction_patterns().await {
            Ok(()) => debug!("Extraction patterns refreshed"),
            Err(e) => warn!(error = %e, "Pattern recovery failed, retrying anyway"),
        }
    }

    fn cancelled(&self) -> Outcome {
        info!("Download cancelled");
        self.sink.on_phase(Phase::Failed);
        Outcome::Failure {
            category: None,
            message: "Download cancelled".to_string(),
        }
    }
}
