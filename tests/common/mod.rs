// Scripted upstream and recording sleeper shared by the integration tests

#![allow(dead_code)]

use async_trait::async_trait;
use std::collections::VecDeque;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use tokio_util::sync::CancellationToken;
use tube_fetch_lib::downloader::{
    DownloadError, ProgressReporter, Sleeper, StreamDescriptor, TransferHandle,
    UpstreamProvider, VideoMetadata,
};

/// What one attempt sees from the upstream
#[derive(Debug, Clone)]
pub enum Step {
    FetchFails(DownloadError),
    Serve(VideoMetadata),
    TransferFails(VideoMetadata, DownloadError),
}

/// In-memory provider that replays `Step`s; the last one repeats forever
pub struct ScriptedUpstream {
    steps: Mutex<VecDeque<Step>>,
    pending_transfer_error: Mutex<Option<DownloadError>>,
    recovery_fails: bool,
    pub fetch_calls: AtomicU32,
    pub recoveries: AtomicU32,
    pub attempted: Mutex<Vec<String>>,
    pub transferred: Mutex<Vec<String>>,
}

impl ScriptedUpstream {
    pub fn new(steps: Vec<Step>) -> Self {
        assert!(!steps.is_empty(), "script needs at least one step");
        Self {
            steps: Mutex::new(steps.into()),
            pending_transfer_error: Mutex::new(None),
            recovery_fails: false,
            fetch_calls: AtomicU32::new(0),
            recoveries: AtomicU32::new(0),
            attempted: Mutex::new(Vec::new()),
            transferred: Mutex::new(Vec::new()),
        }
    }

    pub fn always(step: Step) -> Self {
        Self::new(vec![step])
    }

    pub fn with_failing_recovery(mut self) -> Self {
        self.recovery_fails = true;
        self
    }

    pub fn fetch_calls(&self) -> u32 {
        self.fetch_calls.load(Ordering::SeqCst)
    }

    pub fn recoveries(&self) -> u32 {
        self.recoveries.load(Ordering::SeqCst)
    }

    /// Qualities passed to `open_transfer`, successful or not
    pub fn attempted(&self) -> Vec<String> {
        self.attempted.lock().unwrap().clone()
    }

    pub fn transferred(&self) -> Vec<String> {
        self.transferred.lock().unwrap().clone()
    }

    fn next_step(&self) -> Step {
        let mut steps = self.steps.lock().unwrap();
        if steps.len() > 1 {
            steps.pop_front().unwrap()
        } else {
            steps.front().cloned().unwrap()
        }
    }
}

#[async_trait]
impl UpstreamProvider for ScriptedUpstream {
    fn name(&self) -> &'static str {
        "scripted"
    }

    async fn fetch_metadata(&self, _identifier: &str) -> Result<VideoMetadata, DownloadError> {
        self.fetch_calls.fetch_add(1, Ordering::SeqCst);
        match self.next_step() {
            Step::FetchFails(error) => Err(error),
            Step::Serve(metadata) => Ok(metadata),
            Step::TransferFails(metadata, error) => {
                *self.pending_transfer_error.lock().unwrap() = Some(error);
                Ok(metadata)
            }
        }
    }

    async fn open_transfer(
        &self,
        stream: &StreamDescriptor,
        destination: &Path,
        progress: &mut ProgressReporter,
    ) -> Result<PathBuf, DownloadError> {
        self.attempted.lock().unwrap().push(stream.quality.clone());
        if let Some(error) = self.pending_transfer_error.lock().unwrap().take() {
            return Err(error);
        }

        let total = stream.size.unwrap_or(0);
        progress.advance(total / 4);
        progress.advance(total);

        std::fs::create_dir_all(destination)?;
        let path = destination.join(&stream.handle.file_name);
        std::fs::write(&path, b"video bytes")?;
        self.transferred.lock().unwrap().push(stream.quality.clone());
        Ok(path)
    }

    async fn refresh_extraction_patterns(&self) -> Result<(), DownloadError> {
        self.recoveries.fetch_add(1, Ordering::SeqCst);
        if self.recovery_fails {
            Err(DownloadError::Execution("Update failed: pip3 not found".to_string()))
        } else {
            Ok(())
        }
    }
}

/// Sleeper that records requested waits and returns at once
#[derive(Default)]
pub struct RecordingSleeper {
    waits: Mutex<Vec<Duration>>,
    cancel_on_sleep: Option<CancellationToken>,
}

impl RecordingSleeper {
    pub fn new() -> Self {
        Self::default()
    }

    /// Cancel `token` as soon as the first wait starts
    pub fn cancelling(token: CancellationToken) -> Self {
        Self {
            waits: Mutex::new(Vec::new()),
            cancel_on_sleep: Some(token),
        }
    }

    pub fn waits(&self) -> Vec<Duration> {
        self.waits.lock().unwrap().clone()
    }
}

#[async_trait]
impl Sleeper for RecordingSleeper {
    async fn sleep(&self, duration: Duration) {
        self.waits.lock().unwrap().push(duration);
        if let Some(token) = &self.cancel_on_sleep {
            token.cancel();
        }
    }
}

pub fn secs(values: &[u64]) -> Vec<Duration> {
    values.iter().map(|v| Duration::from_secs(*v)).collect()
}

/// Metadata with one progressive stream per label, ranked by position
pub fn metadata(title: Option<&str>, labels: &[&str]) -> VideoMetadata {
    let streams = labels
        .iter()
        .enumerate()
        .map(|(i, label)| {
            let handle = TransferHandle::new(
                format!("https://cdn.example/{}", label),
                format!("{}_{}.mp4", title.unwrap_or("untitled"), label),
            );
            StreamDescriptor::new(*label, (i as u64 + 1) * 100, handle).with_size(200)
        })
        .collect();

    VideoMetadata {
        title: title.map(str::to_string),
        streams,
    }
}

pub fn shared<T>(value: T) -> Arc<T> {
    Arc::new(value)
}
