// Helper functions shared by the controller and providers

use lazy_static::lazy_static;
use regex::Regex;
use std::path::Path;
use std::process::Stdio;
use tokio::io::AsyncReadExt;
use tokio::process::Command as TokioCommand;
use tokio::time::{timeout, Duration};

use super::errors::DownloadError;
use super::models::{VideoMetadata, YtDlpConfig};

/// Prefix of the label used when no title can be resolved
pub const FALLBACK_TITLE_TAG: &str = "video_";

const MAX_FILE_STEM_CHARS: usize = 120;

lazy_static! {
    static ref VIDEO_ID_RE: Regex = Regex::new(
        r"(?:v=|youtu\.be/|/shorts/|/embed/|/live/|/v/)([A-Za-z0-9_-]{11})"
    )
    .unwrap();
    static ref BARE_ID_RE: Regex = Regex::new(r"^[A-Za-z0-9_-]{11}$").unwrap();
}

/// Title supplied by the upstream, if it is usable
pub fn try_get_title(metadata: &VideoMetadata) -> Option<String> {
    metadata
        .title
        .as_deref()
        .map(str::trim)
        .filter(|t| !t.is_empty())
        .map(str::to_string)
}

/// Deterministic label for when the title cannot be resolved
pub fn fallback_title(identifier: &str) -> String {
    format!("{}{}", FALLBACK_TITLE_TAG, extract_video_id(identifier))
}

/// Video id token from a URL or bare id; sanitized last path segment otherwise
pub fn extract_video_id(identifier: &str) -> String {
    let identifier = identifier.trim();
    if let Some(caps) = VIDEO_ID_RE.captures(identifier) {
        if let Some(id) = caps.get(1) {
            return id.as_str().to_string();
        }
    }
    if BARE_ID_RE.is_match(identifier) {
        return identifier.to_string();
    }

    let segment = identifier
        .split(['?', '#'])
        .next()
        .unwrap_or(identifier)
        .trim_end_matches('/')
        .rsplit('/')
        .next()
        .unwrap_or(identifier);
    let token: String = segment
        .chars()
        .filter(|c| c.is_ascii_alphanumeric() || *c == '-' || *c == '_')
        .take(32)
        .collect();

    if token.is_empty() {
        "unknown".to_string()
    } else {
        token
    }
}

/// File-system safe name: no separators or reserved characters, bounded length
pub fn sanitize_filename(name: &str) -> String {
    let cleaned: String = name
        .chars()
        .map(|c| match c {
            '/' | '\\' | ':' | '*' | '?' | '"' | '<' | '>' | '|' => '_',
            c if c.is_control() => '_',
            c => c,
        })
        .collect();

    let trimmed = cleaned.trim().trim_matches('.').trim();
    let bounded: String = trimmed.chars().take(MAX_FILE_STEM_CHARS).collect();
    let bounded = bounded.trim_end().to_string();

    if bounded.is_empty() {
        "video".to_string()
    } else {
        bounded
    }
}

/// Append `.part` to a final path for in-progress writes
pub fn partial_path(path: &Path) -> std::path::PathBuf {
    let mut name = path.as_os_str().to_owned();
    name.push(".part");
    name.into()
}

/// Network-related yt-dlp arguments (proxy, timeout, cookies)
pub fn network_args(config: &YtDlpConfig) -> Vec<String> {
    let mut args = vec![
        "--socket-timeout".to_string(),
        config.socket_timeout.to_string(),
    ];

    if let Some(proxy) = &config.proxy {
        args.push("--proxy".to_string());
        args.push(proxy.clone());
    }

    if let Some(path) = &config.cookies_path {
        args.push("--cookies".to_string());
        args.push(path.to_string_lossy().to_string());
    } else if let Some(browser) = &config.cookies_from_browser {
        args.push("--cookies-from-browser".to_string());
        args.push(browser.clone());
    }

    args
}

/// Run command with timeout, capturing stdout and stderr
pub async fn run_output_with_timeout(
    program: &Path,
    args: Vec<String>,
    timeout_secs: u64,
) -> Result<std::process::Output, DownloadError> {
    let display = program.display().to_string();
    let mut child = TokioCommand::new(program)
        .args(&args)
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .kill_on_drop(true)
        .spawn()
        .map_err(|e| DownloadError::ToolNotFound(format!("Failed to start {}: {}", display, e)))?;

    let mut stdout_pipe = child.stdout.take().ok_or_else(|| {
        DownloadError::Execution(format!("Failed to capture stdout from {}", display))
    })?;
    let mut stderr_pipe = child.stderr.take().ok_or_else(|| {
        DownloadError::Execution(format!("Failed to capture stderr from {}", display))
    })?;

    let stdout_task = tokio::spawn(async move {
        let mut buf = Vec::new();
        stdout_pipe.read_to_end(&mut buf).await.map(|_| buf)
    });
    let stderr_task = tokio::spawn(async move {
        let mut buf = Vec::new();
        stderr_pipe.read_to_end(&mut buf).await.map(|_| buf)
    });

    match timeout(Duration::from_secs(timeout_secs), child.wait()).await {
        Ok(status) => {
            let status = status?;
            let stdout = stdout_task
                .await
                .map_err(|e| DownloadError::Execution(format!("stdout task failed: {}", e)))??;
            let stderr = stderr_task
                .await
                .map_err(|e| DownloadError::Execution(format!("stderr task failed: {}", e)))??;
            Ok(std::process::Output {
                status,
                stdout,
                stderr,
            })
        }
        Err(_) => {
            let _ = child.kill().await;
            stdout_task.abort();
            stderr_task.abort();
            Err(DownloadError::NetworkTimeout)
        }
    }
}
