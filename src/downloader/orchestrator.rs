// Download orchestrator - the public entry point for front ends

use std::sync::Arc;
use tokio_util::sync::CancellationToken;

use super::models::{DownloadRequest, Outcome};
use super::progress::{NoopSink, ProgressSink};
use super::retry::{BackoffConfig, RetryController, Sleeper, TokioSleeper};
use super::traits::UpstreamProvider;

/// Composes the upstream provider, retry controller and progress sink.
///
/// Holds no per-call state: every `download` builds a fresh controller, so one
/// `Downloader` can serve concurrent calls.
pub struct Downloader {
    upstream: Arc<dyn UpstreamProvider>,
    sleeper: Arc<dyn Sleeper>,
    backoff: BackoffConfig,
    sink: Arc<dyn ProgressSink>,
    cancel: CancellationToken,
}

impl Downloader {
    pub fn new(upstream: Arc<dyn UpstreamProvider>) -> Self {
        Self {
            upstream,
            sleeper: Arc::new(TokioSleeper),
            backoff: BackoffConfig::default(),
            sink: Arc::new(NoopSink),
            cancel: CancellationToken::new(),
        }
    }

    pub fn with_progress_sink(mut self, sink: Arc<dyn ProgressSink>) -> Self {
        self.sink = sink;
        self
    }

    pub fn with_sleeper(mut self, sleeper: Arc<dyn Sleeper>) -> Self {
        self.sleeper = sleeper;
        self
    }

    pub fn with_backoff(mut self, backoff: BackoffConfig) -> Self {
        self.backoff = backoff;
        self
    }

    pub fn with_cancel_token(mut self, cancel: CancellationToken) -> Self {
        self.cancel = cancel;
        self
    }

    pub fn cancel_token(&self) -> &CancellationToken {
        &self.cancel
    }

    /// Run one request to completion. Always returns exactly one `Outcome`;
    /// upstream failures never escape as errors.
    pub async fn download(&self, request: &DownloadRequest) -> Outcome {
        tracing::info!(
            url = request.identifier(),
            quality = %request.quality(),
            output = %request.destination().display(),
            max_retries = request.max_retries(),
            "Download requested"
        );

        RetryController::new(
            self.upstream.as_ref(),
            self.sleeper.as_ref(),
            &self.backoff,
            self.sink.clone(),
            &self.cancel,
        )
        .run(request)
        .await
    }
}
