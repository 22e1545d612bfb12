// yt-dlp discovery, version and self-update

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::process::Command;
use tracing::{debug, info, warn};

use super::errors::DownloadError;
use super::utils::run_output_with_timeout;

const UPDATE_TIMEOUT_SECS: u64 = 180;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolInfo {
    pub name: String,
    pub version: Option<String>,
    pub path: Option<String>,
    pub is_available: bool,
}

pub struct ToolManager {
    binary: PathBuf,
}

impl ToolManager {
    /// Use an explicit binary, or search common locations
    pub fn new(binary: Option<PathBuf>) -> Self {
        Self {
            binary: binary.unwrap_or_else(find_ytdlp),
        }
    }

    pub fn binary(&self) -> &Path {
        &self.binary
    }

    pub fn tool_info(&self) -> ToolInfo {
        let version = self.version();
        ToolInfo {
            name: "yt-dlp".to_string(),
            is_available: version.is_some(),
            path: Some(self.binary.to_string_lossy().to_string()),
            version,
        }
    }

    pub fn version(&self) -> Option<String> {
        match Command::new(&self.binary).arg("--version").output() {
            Ok(output) if output.status.success() => {
                Some(String::from_utf8_lossy(&output.stdout).trim().to_string())
            }
            _ => None,
        }
    }

    /// Update yt-dlp so its extractors match the current site format.
    /// Tries the self-updater first, then pip.
    pub async fn update(&self) -> Result<String, DownloadError> {
        let self_update =
            run_output_with_timeout(&self.binary, vec!["-U".to_string()], UPDATE_TIMEOUT_SECS)
                .await;

        match self_update {
            Ok(out) if out.status.success() => {
                let summary = last_line(&out.stdout);
                info!(summary = %summary, "yt-dlp self-update finished");
                return Ok(summary);
            }
            Ok(out) => {
                debug!(
                    stderr = %String::from_utf8_lossy(&out.stderr).trim(),
                    "yt-dlp -U refused (package-managed install?)"
                );
            }
            Err(e) => debug!(error = %e, "yt-dlp -U could not run"),
        }

        let pip_args = vec![
            "install".to_string(),
            "-U".to_string(),
            "--user".to_string(),
            "yt-dlp".to_string(),
        ];
        let out = run_output_with_timeout(Path::new("pip3"), pip_args, UPDATE_TIMEOUT_SECS).await?;
        if out.status.success() {
            let summary = last_line(&out.stdout);
            info!(summary = %summary, "yt-dlp updated via pip");
            Ok(summary)
        } else {
            let stderr = String::from_utf8_lossy(&out.stderr).to_string();
            warn!(stderr = %stderr.trim(), "pip update of yt-dlp failed");
            Err(DownloadError::Execution(format!("Update failed: {}", stderr.trim())))
        }
    }
}

fn last_line(bytes: &[u8]) -> String {
    String::from_utf8_lossy(bytes)
        .lines()
        .rev()
        .find(|l| !l.trim().is_empty())
        .unwrap_or("")
        .trim()
        .to_string()
}

/// Find yt-dlp executable in common paths
pub fn find_ytdlp() -> PathBuf {
    let mut candidates = vec![
        PathBuf::from("/opt/homebrew/bin/yt-dlp"), // Homebrew on Apple Silicon
        PathBuf::from("/usr/local/bin/yt-dlp"),    // Homebrew on Intel Mac
        PathBuf::from("/usr/bin/yt-dlp"),          // System installation
    ];
    if let Some(home) = dirs::home_dir() {
        candidates.push(home.join(".local/bin/yt-dlp")); // pip --user
    }

    if let Some(found) = candidates.into_iter().find(|p| p.exists()) {
        return found;
    }

    if let Ok(output) = Command::new("which").arg("yt-dlp").output() {
        if output.status.success() {
            let path = String::from_utf8_lossy(&output.stdout).trim().to_string();
            if !path.is_empty() {
                return PathBuf::from(path);
            }
        }
    }

    // Last resort: hope it's in PATH
    PathBuf::from("yt-dlp")
}
