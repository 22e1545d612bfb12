// Error classifier - maps upstream failures to retry categories
//
// Analyzes a failure to determine:
// - Which category it belongs to (parse drift, transient rejection, restriction...)
// - What the controller should do about it
// - What to tell the user when it gives up
//
// Classification is pure: structured kind first, message text second.

use lazy_static::lazy_static;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::fmt;

use super::errors::DownloadError;

lazy_static! {
    // Status codes only where the text presents them as one (lowercased input)
    static ref TRANSIENT_STATUS_RE: Regex = Regex::new(
        r"(?:http error|status(?: code)?|response code|error code)[\s:=]*(?:400|403|429)\b|\((?:400|403|429) [a-z]"
    )
    .unwrap();
}

/// Fixed set of failure categories the controller reacts to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ErrorCategory {
    /// Page/response structure no longer matches the extraction patterns
    ParseFailure,
    /// Upstream rejected the request with a transient or ambiguous signal
    TransientRejection,
    /// Age-gated, region-blocked, private or otherwise unavailable by policy
    RestrictedContent,
    /// No usable encoding even after the quality fallback
    NoMatchingStream,
    /// Anything else
    Unknown,
}

/// What the controller does with a category
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RetryStrategy {
    /// Run the pattern-recovery action, then exponential backoff
    RecoverThenBackoff,
    /// Exponential backoff
    Backoff,
    /// Retry at most once after a short fixed delay
    RetryOnce,
    /// Give up immediately
    Terminal,
}

impl ErrorCategory {
    pub fn retry_strategy(&self) -> RetryStrategy {
        match self {
            Self::ParseFailure => RetryStrategy::RecoverThenBackoff,
            Self::TransientRejection => RetryStrategy::Backoff,
            Self::RestrictedContent | Self::NoMatchingStream => RetryStrategy::Terminal,
            Self::Unknown => RetryStrategy::RetryOnce,
        }
    }

    /// Human-readable description (used in logs and status lines)
    pub fn description(&self) -> &'static str {
        match self {
            Self::ParseFailure => "Could not parse the video page",
            Self::TransientRejection => "Request rejected by the video service",
            Self::RestrictedContent => "Video is restricted",
            Self::NoMatchingStream => "No matching video stream",
            Self::Unknown => "Unexpected error",
        }
    }

    /// Remediation hint shown after the final failure
    pub fn remediation(&self) -> &'static str {
        match self {
            Self::ParseFailure => {
                "The video service changed its page format and the extraction library \
                 needs updating.\n\
                 What to try:\n\
                 1) Update yt-dlp: yt-dlp -U (or pip3 install -U yt-dlp)\n\
                 2) Try again later, fixes are usually released within days"
            }
            Self::TransientRejection => {
                "The service is throttling or rejecting requests.\n\
                 What to try:\n\
                 1) Wait a few minutes and try again\n\
                 2) Increase --retries\n\
                 3) Use a proxy/VPN or a different network"
            }
            Self::RestrictedContent => {
                "This video cannot be downloaded without access rights.\n\
                 What to try:\n\
                 1) Use cookies from a logged-in browser (--cookies)\n\
                 2) Check that the video plays in a browser"
            }
            Self::NoMatchingStream => {
                "What to try:\n\
                 1) Choose a different resolution (e.g. highest)\n\
                 2) Check that the video is not audio-only or a live stream"
            }
            Self::Unknown => {
                "What to try:\n\
                 1) Check your internet connection\n\
                 2) Verify the URL is correct and the video is available\n\
                 3) Run with --verbose and inspect the log"
            }
        }
    }

    /// Final user-facing message for a call that ended in this category
    pub fn terminal_message(&self, error: &DownloadError, attempts: u32) -> String {
        let headline = match (self, error) {
            (Self::RestrictedContent, DownloadError::Restricted { reason, .. }) => {
                let mut text = format!("{}: {}", self.description(), reason.description());
                if let Some(explanation) = reason.user_explanation() {
                    text.push_str(&format!("\n\n{}", explanation));
                }
                text
            }
            (Self::NoMatchingStream, DownloadError::NoMatchingStream { requested }) => {
                format!("No video stream found with resolution {}", requested)
            }
            _ if attempts > 1 => format!("{} after {} attempts", self.description(), attempts),
            _ => self.description().to_string(),
        };

        let mut message = headline;
        if let Some(detail) = short_detail(&error.detail()) {
            message.push_str(&format!("\n\nDetails: {}", detail));
        }
        let hint = match error {
            DownloadError::Restricted { reason, .. } if reason.is_permanent() => {
                "No workaround is available for this video."
            }
            _ => self.remediation(),
        };
        message.push_str(&format!("\n\n{}", hint));
        message
    }
}

impl fmt::Display for ErrorCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::ParseFailure => write!(f, "parse-failure"),
            Self::TransientRejection => write!(f, "transient-rejection"),
            Self::RestrictedContent => write!(f, "restricted-content"),
            Self::NoMatchingStream => write!(f, "no-matching-stream"),
            Self::Unknown => write!(f, "unknown"),
        }
    }
}

/// Why a resource is restricted
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum RestrictionReason {
    /// Age-restricted content requiring login
    AgeRestricted,
    /// Geographic restriction
    GeoBlocked,
    /// Private video requiring authorization
    PrivateVideo,
    /// Video deleted or unavailable
    VideoUnavailable,
    /// DRM-protected or paid content
    DrmProtected,
    /// Member-only content (requires channel membership)
    MembersOnly,
}

impl RestrictionReason {
    pub fn description(&self) -> &'static str {
        match self {
            Self::AgeRestricted => "Age-restricted content",
            Self::GeoBlocked => "Geographic restriction",
            Self::PrivateVideo => "Private video",
            Self::VideoUnavailable => "Video unavailable",
            Self::DrmProtected => "DRM-protected content",
            Self::MembersOnly => "Members-only content",
        }
    }

    /// Check if this is a permanent restriction (no workaround)
    pub fn is_permanent(&self) -> bool {
        matches!(self, Self::DrmProtected | Self::VideoUnavailable)
    }

    pub fn user_explanation(&self) -> Option<&'static str> {
        match self {
            Self::DrmProtected => Some(
                "This video is DRM-protected and cannot be downloaded.\n\
                 This is a content protection measure, not an error.",
            ),
            Self::MembersOnly => Some(
                "This video requires a channel membership.\n\
                 Try using cookies from a browser where you're a member.",
            ),
            Self::VideoUnavailable => {
                Some("This video has been removed or is no longer available.")
            }
            Self::AgeRestricted => Some("Sign-in is required to confirm your age."),
            _ => None,
        }
    }
}

/// Classify a failure into a category. Pure and deterministic.
pub fn classify(error: &DownloadError) -> ErrorCategory {
    match error {
        DownloadError::Parse(_) => ErrorCategory::ParseFailure,
        DownloadError::Restricted { .. } => ErrorCategory::RestrictedContent,
        DownloadError::NoMatchingStream { .. } => ErrorCategory::NoMatchingStream,
        DownloadError::NetworkTimeout | DownloadError::Network(_) => {
            ErrorCategory::TransientRejection
        }
        DownloadError::Http {
            status: Some(status),
            message,
        } => classify_status(*status, message),
        DownloadError::Http {
            status: None,
            message,
        } => match classify_message(message) {
            ErrorCategory::Unknown => ErrorCategory::TransientRejection,
            other => other,
        },
        DownloadError::ToolNotFound(_) => ErrorCategory::Unknown,
        DownloadError::Execution(msg) | DownloadError::Io(msg) | DownloadError::Unknown(msg) => {
            classify_message(msg)
        }
    }
}

fn classify_status(status: u16, message: &str) -> ErrorCategory {
    let lower = message.to_lowercase();
    if match_restriction(&lower).is_some() {
        return ErrorCategory::RestrictedContent;
    }
    match status {
        401 | 451 => ErrorCategory::RestrictedContent,
        400..=599 => ErrorCategory::TransientRejection,
        _ => ErrorCategory::Unknown,
    }
}

/// Classify free-form error text (tool stderr, wrapped messages)
pub fn classify_message(message: &str) -> ErrorCategory {
    let lower = message.to_lowercase();

    if match_restriction(&lower).is_some() {
        return ErrorCategory::RestrictedContent;
    }
    if looks_like_parse_failure(&lower) {
        return ErrorCategory::ParseFailure;
    }
    if looks_transient(&lower) {
        return ErrorCategory::TransientRejection;
    }
    if lower.contains("requested format is not available") {
        return ErrorCategory::NoMatchingStream;
    }
    ErrorCategory::Unknown
}

/// Detect access restrictions in lowercased error text
pub fn match_restriction(lower: &str) -> Option<RestrictionReason> {
    // DRM protection (permanent restriction)
    if lower.contains("drm")
        || lower.contains("widevine")
        || lower.contains("playready")
        || lower.contains("fairplay")
        || lower.contains("requires purchase")
        || lower.contains("this video requires payment")
        || lower.contains("youtube premium")
    {
        return Some(RestrictionReason::DrmProtected);
    }

    if lower.contains("members only")
        || lower.contains("members-only")
        || lower.contains("join this channel")
        || lower.contains("available to members")
    {
        return Some(RestrictionReason::MembersOnly);
    }

    if lower.contains("age-restricted")
        || lower.contains("age restricted")
        || lower.contains("sign in to confirm your age")
        || lower.contains("age_verification")
    {
        return Some(RestrictionReason::AgeRestricted);
    }

    if lower.contains("private video")
        || lower.contains("video is private")
        || lower.contains("sign in if you've been granted access")
    {
        return Some(RestrictionReason::PrivateVideo);
    }

    if lower.contains("not available in your country")
        || lower.contains("blocked in your country")
        || lower.contains("geo-restrict")
        || lower.contains("geographic restriction")
    {
        return Some(RestrictionReason::GeoBlocked);
    }

    if lower.contains("video unavailable")
        || lower.contains("video has been removed")
        || lower.contains("this video is no longer available")
        || lower.contains("video is unavailable")
    {
        return Some(RestrictionReason::VideoUnavailable);
    }

    None
}

/// Extraction drift: markup or player script no longer matches
pub fn looks_like_parse_failure(lower: &str) -> bool {
    lower.contains("unable to extract")
        || lower.contains("unable to parse")
        || lower.contains("failed to parse")
        || lower.contains("regexmatcherror")
        || lower.contains("regex_search")
        || lower.contains("could not find match for")
        || lower.contains("nsig extraction failed")
        || lower.contains("signature extraction failed")
        || lower.contains("jsondecodeerror")
        || lower.contains("invalid json")
        || lower.contains("no formats array")
}

fn looks_transient(lower: &str) -> bool {
    TRANSIENT_STATUS_RE.is_match(lower)
        || lower.contains("too many requests")
        || lower.contains("rate limit")
        || lower.contains("bad request")
        || lower.contains("forbidden")
        || lower.contains("captcha")
        || lower.contains("unusual traffic")
        || lower.contains("not a bot")
        || lower.contains("timed out")
        || lower.contains("timeout")
        || lower.contains("connection reset")
        || lower.contains("temporarily")
        || lower.contains("service unavailable")
}

// First meaningful line of an error, trimmed for display
fn short_detail(detail: &str) -> Option<String> {
    let line = detail
        .lines()
        .map(|l| l.trim())
        .find(|l| l.starts_with("ERROR:"))
        .or_else(|| detail.lines().map(|l| l.trim()).find(|l| !l.is_empty()))?;

    Some(line.chars().take(200).collect())
}
