// Desktop front end: Tauri commands and progress events

use serde::Serialize;
use std::path::PathBuf;
use std::sync::Arc;
use tauri::Emitter;

use crate::downloader::{
    DownloadProgress, DownloadRequest, Downloader, Phase, ProgressSink, QualitySpec, ToolInfo,
    ToolManager, YtDlpBackend, YtDlpConfig, STANDARD_RESOLUTIONS,
};

/// Forwards progress and phase changes to the webview as events
struct TauriSink {
    app_handle: tauri::AppHandle,
}

impl ProgressSink for TauriSink {
    fn on_progress(&self, percentage: f64) {
        let _ = self.app_handle.emit(
            "download-progress",
            DownloadProgress {
                percent: percentage,
                status: format!("Downloading... {:.1}%", percentage),
            },
        );
    }

    fn on_phase(&self, phase: Phase) {
        let _ = self.app_handle.emit("download-status", phase.status_line());
    }
}

/// What the webview gets back from `start_download`
#[derive(Debug, Clone, Serialize)]
pub struct DownloadResult {
    pub success: bool,
    pub path: Option<String>,
    pub message: String,
}

#[tauri::command]
async fn start_download(
    url: String,
    resolution: String,
    output_path: String,
    retries: Option<u32>,
    proxy: Option<String>,
    app_handle: tauri::AppHandle,
) -> Result<DownloadResult, String> {
    let quality: QualitySpec = resolution.parse().map_err(|e| format!("{}", e))?;
    let request = DownloadRequest::new(url, quality, output_path, retries.unwrap_or(3))
        .map_err(|e| e.to_string())?;

    let backend = YtDlpBackend::new(YtDlpConfig::from_env().with_proxy(proxy))
        .map_err(|e| e.to_string())?;
    let downloader = Downloader::new(Arc::new(backend))
        .with_progress_sink(Arc::new(TauriSink { app_handle }));

    // Keep the transfer off the IPC thread
    let outcome = tokio::spawn(async move { downloader.download(&request).await })
        .await
        .map_err(|e| format!("Download task failed: {}", e))?;

    let success = outcome.is_success();
    let (path, message) = outcome.into_parts();
    Ok(DownloadResult {
        success,
        path: path.map(|p| p.to_string_lossy().to_string()),
        message,
    })
}

#[tauri::command]
async fn tool_status() -> Result<ToolInfo, String> {
    let binary = YtDlpConfig::from_env().binary;
    tokio::task::spawn_blocking(move || ToolManager::new(binary).tool_info())
        .await
        .map_err(|e| e.to_string())
}

#[tauri::command]
fn resolution_choices() -> Vec<&'static str> {
    STANDARD_RESOLUTIONS.to_vec()
}

#[tauri::command]
fn default_output_dir() -> String {
    dirs::download_dir()
        .or_else(|| dirs::home_dir().map(|h| h.join("Downloads")))
        .unwrap_or_else(|| PathBuf::from("downloads"))
        .to_string_lossy()
        .to_string()
}

#[tauri::command]
fn reveal_in_folder(path: String) -> Result<(), String> {
    tauri_plugin_opener::reveal_item_in_dir(&path).map_err(|e| e.to_string())
}

#[cfg_attr(mobile, tauri::mobile_entry_point)]
pub fn run() {
    if let Err(e) = tauri::Builder::default()
        .plugin(tauri_plugin_opener::init())
        .plugin(tauri_plugin_dialog::init())
        .invoke_handler(tauri::generate_handler![
            start_download,
            tool_status,
            resolution_choices,
            default_output_dir,
            reveal_in_folder,
        ])
        .run(tauri::generate_context!())
    {
        tracing::error!(error = %e, "Tauri application exited with an error");
    }
}
