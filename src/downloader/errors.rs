// Error types surfaced by upstream providers

use lazy_static::lazy_static;
use regex::Regex;

use super::classifier::{self, RestrictionReason};

/// Failure signal raised by the upstream collaborator while fetching metadata
/// or transferring a stream. The controller never lets these escape; they are
/// classified and turned into an `Outcome`.
#[derive(Debug, Clone, thiserror::Error)]
pub enum DownloadError {
    /// Response structure no longer matches the extraction patterns
    #[error("Parse error: {0}")]
    Parse(String),

    /// Upstream answered with an HTTP failure
    #[error("HTTP error{}: {message}", .status.map(|s| format!(" {}", s)).unwrap_or_default())]
    Http {
        status: Option<u16>,
        message: String,
    },

    /// Connection-level failure (reset, refused, DNS)
    #[error("Network error: {0}")]
    Network(String),

    /// Network timeout while talking to the upstream service
    #[error("Network timeout: upstream is not responding")]
    NetworkTimeout,

    /// Access restricted by policy (age gate, region, DRM...)
    #[error("{}: {message}", .reason.description())]
    Restricted {
        reason: RestrictionReason,
        message: String,
    },

    /// No encoding satisfied the requested quality, even after fallback
    #[error("No video stream found with resolution {requested}")]
    NoMatchingStream { requested: String },

    /// yt-dlp (or python) not found in system
    #[error("Tool not found: {0}")]
    ToolNotFound(String),

    /// Command execution failed
    #[error("Execution error: {0}")]
    Execution(String),

    /// Local filesystem failure while writing the stream
    #[error("I/O error: {0}")]
    Io(String),

    /// Unknown error with details
    #[error("Unknown error: {0}")]
    Unknown(String),
}

impl DownloadError {
    /// Raw text carried by the error, used for message-based classification.
    pub fn detail(&self) -> String {
        match self {
            Self::Parse(msg)
            | Self::Network(msg)
            | Self::ToolNotFound(msg)
            | Self::Execution(msg)
            | Self::Io(msg)
            | Self::Unknown(msg) => msg.clone(),
            Self::Http { message, .. } | Self::Restricted { message, .. } => message.clone(),
            Self::NetworkTimeout => "timed out".to_string(),
            Self::NoMatchingStream { requested } => format!("no stream for {}", requested),
        }
    }
}

impl From<std::io::Error> for DownloadError {
    fn from(e: std::io::Error) -> Self {
        match e.kind() {
            std::io::ErrorKind::TimedOut => Self::NetworkTimeout,
            std::io::ErrorKind::NotFound => Self::Io(format!("path not found: {}", e)),
            _ => Self::Io(e.to_string()),
        }
    }
}

impl From<reqwest::Error> for DownloadError {
    fn from(e: reqwest::Error) -> Self {
        if e.is_timeout() {
            return Self::NetworkTimeout;
        }
        if let Some(status) = e.status() {
            return Self::Http {
                status: Some(status.as_u16()),
                message: e.to_string(),
            };
        }
        if e.is_connect() || e.is_request() || e.is_body() {
            return Self::Network(e.to_string());
        }
        Self::Unknown(e.to_string())
    }
}

lazy_static! {
    static ref HTTP_STATUS_RE: Regex = Regex::new(r"HTTP Error (\d{3})").unwrap();
}

// Route raw tool output (stderr) to a structured variant
impl From<String> for DownloadError {
    fn from(s: String) -> Self {
        let lower = s.to_lowercase();

        // Restrictions first: an age gate often arrives together with a 403
        if let Some(reason) = classifier::match_restriction(&lower) {
            return Self::Restricted { reason, message: s };
        }

        if classifier::looks_like_parse_failure(&lower) {
            return Self::Parse(s);
        }

        if let Some(caps) = HTTP_STATUS_RE.captures(&s) {
            let status = caps.get(1).and_then(|m| m.as_str().parse::<u16>().ok());
            return Self::Http { status, message: s };
        }

        if lower.contains("timeout") || lower.contains("timed out") {
            return Self::NetworkTimeout;
        }

        if lower.contains("connection reset")
            || lower.contains("connection refused")
            || lower.contains("network is unreachable")
            || lower.contains("name or service not known")
        {
            return Self::Network(s);
        }

        if lower.contains("failed to start")
            || lower.contains("no such file")
            || lower.contains("command not found")
        {
            return Self::ToolNotFound(s);
        }

        Self::Unknown(s)
    }
}

impl From<&str> for DownloadError {
    fn from(s: &str) -> Self {
        Self::from(s.to_string())
    }
}
