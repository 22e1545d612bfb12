// Common data models for downloader

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use super::classifier::ErrorCategory;
use super::format_selector::QualitySpec;

/// Upper bound accepted for `max_retries`; anything above is a caller bug.
pub const MAX_RETRIES_LIMIT: u32 = 20;

/// Precondition violations when building a request
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum RequestError {
    #[error("video URL or identifier must not be empty")]
    EmptyIdentifier,

    #[error("quality specifier must not be empty")]
    EmptyQuality,

    #[error("output directory must not be empty")]
    EmptyDestination,

    #[error("max retries {0} exceeds the limit of {max}", max = MAX_RETRIES_LIMIT)]
    TooManyRetries(u32),
}

/// One download job. Immutable once the attempt loop starts.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DownloadRequest {
    identifier: String,
    quality: QualitySpec,
    destination: PathBuf,
    max_retries: u32,
}

impl DownloadRequest {
    pub fn new(
        identifier: impl Into<String>,
        quality: QualitySpec,
        destination: impl Into<PathBuf>,
        max_retries: u32,
    ) -> Result<Self, RequestError> {
        let identifier = identifier.into().trim().to_string();
        if identifier.is_empty() {
            return Err(RequestError::EmptyIdentifier);
        }

        let destination = destination.into();
        if destination.as_os_str().is_empty() {
            return Err(RequestError::EmptyDestination);
        }

        if max_retries > MAX_RETRIES_LIMIT {
            return Err(RequestError::TooManyRetries(max_retries));
        }

        Ok(Self {
            identifier,
            quality,
            destination,
            max_retries,
        })
    }

    pub fn identifier(&self) -> &str {
        &self.identifier
    }

    pub fn quality(&self) -> &QualitySpec {
        &self.quality
    }

    pub fn destination(&self) -> &Path {
        &self.destination
    }

    pub fn max_retries(&self) -> u32 {
        self.max_retries
    }
}

/// How the upstream provider reaches the bytes of one encoding
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct TransferHandle {
    /// Direct media URL
    pub url: String,
    /// Target file name (sanitized, with extension)
    pub file_name: String,
    /// Extra HTTP headers the upstream requires for the transfer
    pub headers: Vec<(String, String)>,
}

impl TransferHandle {
    pub fn new(url: impl Into<String>, file_name: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            file_name: file_name.into(),
            headers: Vec::new(),
        }
    }

    pub fn with_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.push((name.into(), value.into()));
        self
    }
}

/// One available encoding of a resource
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StreamDescriptor {
    /// Quality label (e.g., "720p")
    pub quality: String,
    /// Size in bytes, when the upstream knows it
    pub size: Option<u64>,
    /// Upstream ranking; higher is better
    pub rank: u64,
    pub handle: TransferHandle,
}

impl StreamDescriptor {
    pub fn new(quality: impl Into<String>, rank: u64, handle: TransferHandle) -> Self {
        Self {
            quality: quality.into(),
            size: None,
            rank,
            handle,
        }
    }

    pub fn with_size(mut self, size: u64) -> Self {
        self.size = Some(size);
        self
    }
}

/// Metadata resolved for one identifier
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct VideoMetadata {
    /// Human-readable title, when the upstream could supply one
    pub title: Option<String>,
    /// Encodings in upstream order
    pub streams: Vec<StreamDescriptor>,
}

/// Terminal result of one `download` call
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outcome {
    Success {
        path: PathBuf,
        message: String,
    },
    Failure {
        /// `None` when the call was cancelled rather than classified
        category: Option<ErrorCategory>,
        message: String,
    },
}

impl Outcome {
    pub fn is_success(&self) -> bool {
        matches!(self, Self::Success { .. })
    }

    pub fn path(&self) -> Option<&Path> {
        match self {
            Self::Success { path, .. } => Some(path),
            Self::Failure { .. } => None,
        }
    }

    pub fn message(&self) -> &str {
        match self {
            Self::Success { message, .. } | Self::Failure { message, .. } => message,
        }
    }

    /// `(path | none, message)` pair for thin front ends
    pub fn into_parts(self) -> (Option<PathBuf>, String) {
        match self {
            Self::Success { path, message } => (Some(path), message),
            Self::Failure { message, .. } => (None, message),
        }
    }
}

/// Download progress information (GUI event payload)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DownloadProgress {
    pub percent: f64,
    pub status: String,
}

/// Configuration for the yt-dlp upstream provider
#[derive(Debug, Clone)]
pub struct YtDlpConfig {
    /// Explicit yt-dlp binary; auto-detected when `None`
    pub binary: Option<PathBuf>,
    /// SOCKS5/HTTP proxy URL (e.g., "socks5://127.0.0.1:1080")
    pub proxy: Option<String>,
    /// Path to cookies.txt file
    pub cookies_path: Option<PathBuf>,
    /// Browser to read cookies from (e.g., "chrome")
    pub cookies_from_browser: Option<String>,
    /// yt-dlp socket timeout in seconds
    pub socket_timeout: u32,
    /// Hard limit for one metadata command, in seconds
    pub command_timeout: u64,
}

impl Default for YtDlpConfig {
    fn default() -> Self {
        Self {
            binary: None,
            proxy: None,
            cookies_path: None,
            cookies_from_browser: None,
            socket_timeout: 30,
            command_timeout: 60,
        }
    }
}

impl YtDlpConfig {
    /// Defaults overridden by `YTDLP_PATH` and `TUBE_FETCH_PROXY`
    pub fn from_env() -> Self {
        let mut config = Self::default();
        if let Ok(path) = std::env::var("YTDLP_PATH") {
            if !path.trim().is_empty() {
                config.binary = Some(PathBuf::from(path));
            }
        }
        if let Ok(proxy) = std::env::var("TUBE_FETCH_PROXY") {
            if !proxy.trim().is_empty() {
                config.proxy = Some(proxy);
            }
        }
        config
    }

    pub fn with_binary(mut self, binary: Option<PathBuf>) -> Self {
        if binary.is_some() {
            self.binary = binary;
        }
        self
    }

    pub fn with_proxy(mut self, proxy: Option<String>) -> Self {
        if proxy.is_some() {
            self.proxy = proxy;
        }
        self
    }

    pub fn with_cookies_path(mut self, path: Option<PathBuf>) -> Self {
        self.cookies_path = path;
        self
    }

    pub fn with_cookies_from_browser(mut self, browser: Option<String>) -> Self {
        self.cookies_from_browser = browser;
        self
    }

    pub fn with_socket_timeout(mut self, seconds: u32) -> Self {
        self.socket_timeout = seconds;
        self
    }

    pub fn with_command_timeout(mut self, seconds: u64) -> Self {
        self.command_timeout = seconds;
        self
    }
}
