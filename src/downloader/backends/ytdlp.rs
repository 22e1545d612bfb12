use async_trait::async_trait;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tokio::io::AsyncWriteExt;
use tracing::{debug, info};

use crate::downloader::errors::DownloadError;
use crate::downloader::models::{StreamDescriptor, TransferHandle, VideoMetadata, YtDlpConfig};
use crate::downloader::progress::ProgressReporter;
use crate::downloader::tools::ToolManager;
use crate::downloader::traits::UpstreamProvider;
use crate::downloader::utils::{
    fallback_title, network_args, partial_path, run_output_with_timeout, sanitize_filename,
};

const USER_AGENT: &str =
    "Mozilla/5.0 (Macintosh; Intel Mac OS X 10_15_7) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/121.0.0.0 Safari/537.36";

/// Upstream provider backed by the yt-dlp extractor.
///
/// Metadata comes from `yt-dlp --dump-json`; the selected progressive format is
/// then streamed directly over HTTP so byte progress can be reported.
pub struct YtDlpBackend {
    config: YtDlpConfig,
    tools: ToolManager,
    client: reqwest::Client,
}

impl YtDlpBackend {
    pub fn new(config: YtDlpConfig) -> Result<Self, DownloadError> {
        let mut builder = reqwest::Client::builder()
            .user_agent(USER_AGENT)
            .connect_timeout(Duration::from_secs(config.socket_timeout as u64));

        if let Some(proxy_url) = config.proxy.as_deref() {
            let proxy = reqwest::Proxy::all(proxy_url).map_err(|e| {
                DownloadError::Execution(format!("Invalid proxy URL {}: {}", proxy_url, e))
            })?;
            builder = builder.proxy(proxy);
        }

        let client = builder
            .build()
            .map_err(|e| DownloadError::Execution(format!("Failed to build HTTP client: {}", e)))?;

        Ok(Self {
            tools: ToolManager::new(config.binary.clone()),
            config,
            client,
        })
    }

    pub fn tools(&self) -> &ToolManager {
        &self.tools
    }

    fn metadata_args(&self, identifier: &str) -> Vec<String> {
        let mut args = vec![
            "--dump-json".to_string(),
            "--no-playlist".to_string(),
            "--no-warnings".to_string(),
        ];
        args.extend(network_args(&self.config));
        args.push(identifier.to_string());
        args
    }
}

/// Parse `--dump-json` output into metadata with progressive streams only
pub fn parse_metadata(stdout: &[u8], identifier: &str) -> Result<VideoMetadata, DownloadError> {
    let json_str = String::from_utf8_lossy(stdout);
    let json: serde_json::Value = serde_json::from_str(json_str.trim())
        .map_err(|e| DownloadError::Parse(format!("Invalid JSON: {}", e)))?;

    let formats = json["formats"]
        .as_array()
        .ok_or_else(|| DownloadError::Parse("No formats array in JSON".to_string()))?;

    let title = json["title"]
        .as_str()
        .map(str::trim)
        .filter(|t| !t.is_empty())
        .map(str::to_string);
    let stem = sanitize_filename(
        &title
            .clone()
            .unwrap_or_else(|| fallback_title(identifier)),
    );

    let streams = formats
        .iter()
        .filter_map(|f| parse_stream(f, &stem))
        .collect();

    Ok(VideoMetadata {
        title,
        streams,
    })
}

// Progressive (audio+video) HTTP formats with a known height
fn parse_stream(f: &serde_json::Value, stem: &str) -> Option<StreamDescriptor> {
    let has_track = |key: &str| f[key].as_str().map_or(false, |c| c != "none" && !c.is_empty());
    if !has_track("vcodec") || !has_track("acodec") {
        return None;
    }

    let protocol = f["protocol"].as_str().unwrap_or("https");
    if !protocol.starts_with("http") {
        return None;
    }

    let url = f["url"].as_str()?;
    let height = f["height"].as_u64()?;
    let ext = f["ext"].as_str().unwrap_or("mp4");
    let tbr = f["tbr"].as_f64().unwrap_or(0.0).clamp(0.0, 99_999.0) as u64;

    let mut handle = TransferHandle::new(url, format!("{}.{}", stem, ext));
    if let Some(headers) = f["http_headers"].as_object() {
        for (name, value) in headers {
            if let Some(value) = value.as_str() {
                handle = handle.with_header(name.as_str(), value);
            }
        }
    }

    let rank = height.saturating_mul(100_000).saturating_add(tbr);
    let mut stream = StreamDescriptor::new(format!("{}p", height), rank, handle);
    stream.size = f["filesize"].as_u64().or_else(|| f["filesize_approx"].as_u64());
    Some(stream)
}

/// Byte source for a transfer
#[async_trait]
trait ChunkSource: Send {
    async fn next_chunk(&mut self) -> Result<Option<Vec<u8>>, DownloadError>;
}

#[async_trait]
impl ChunkSource for reqwest::Response {
    async fn next_chunk(&mut self) -> Result<Option<Vec<u8>>, DownloadError> {
        Ok(self.chunk().await?.map(|bytes| bytes.to_vec()))
    }
}

/// Write `source` to `<final_path>.part` and rename it into place.
/// The part file never outlives a failed transfer.
async fn write_stream(
    source: &mut dyn ChunkSource,
    final_path: &Path,
    progress: &ProgressReporter,
) -> Result<u64, DownloadError> {
    let part_path = partial_path(final_path);
    let result = async {
        let downloaded = write_part(source, &part_path, progress).await?;
        tokio::fs::rename(&part_path, final_path).await?;
        Ok::<_, DownloadError>(downloaded)
    }
    .await;

    if result.is_err() {
        if let Err(e) = tokio::fs::remove_file(&part_path).await {
            debug!(path = %part_path.display(), error = %e, "Could not remove partial file");
        }
    }
    result
}

async fn write_part(
    source: &mut dyn ChunkSource,
    part_path: &Path,
    progress: &ProgressReporter,
) -> Result<u64, DownloadError> {
    let mut file = tokio::fs::File::create(part_path).await?;
    let mut downloaded: u64 = 0;
    while let Some(chunk) = source.next_chunk().await? {
        file.write_all(&chunk).await?;
        downloaded += chunk.len() as u64;
        progress.advance(downloaded);
    }
    file.flush().await?;
    Ok(downloaded)
}

#[async_trait]
impl UpstreamProvider for YtDlpBackend {
    fn name(&self) -> &'static str {
        "yt-dlp"
    }

    async fn fetch_metadata(&self, identifier: &str) -> Result<VideoMetadata, DownloadError> {
        let args = self.metadata_args(identifier);
        debug!(binary = %self.tools.binary().display(), args = ?args, "Fetching metadata");

        let output =
            run_output_with_timeout(self.tools.binary(), args, self.config.command_timeout).await?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr).to_string();
            return Err(DownloadError::from(stderr));
        }

        let metadata = parse_metadata(&output.stdout, identifier)?;
        debug!(
            title = ?metadata.title,
            streams = metadata.streams.len(),
            "Metadata resolved"
        );
        Ok(metadata)
    }

    async fn open_transfer(
        &self,
        stream: &StreamDescriptor,
        destination: &Path,
        progress: &mut ProgressReporter,
    ) -> Result<PathBuf, DownloadError> {
        let handle = &stream.handle;
        let mut request = self.client.get(&handle.url);
        for (name, value) in &handle.headers {
            request = request.header(name.as_str(), value.as_str());
        }

        let mut response = request.send().await?;
        let status = response.status();
        if !status.is_success() {
            return Err(DownloadError::Http {
                status: Some(status.as_u16()),
                message: format!("Transfer rejected: {}", status),
            });
        }

        progress.begin(response.content_length().or(stream.size));

        tokio::fs::create_dir_all(destination).await?;
        let final_path = destination.join(&handle.file_name);
        info!(path = %final_path.display(), total = ?progress.total(), "Transferring");

        let downloaded = write_stream(&mut response, &final_path, progress).await?;
        debug!(bytes = downloaded, "Transfer finished");
        Ok(final_path)
    }

    async fn refresh_extraction_patterns(&self) -> Result<(), DownloadError> {
        self.tools.update().await.map(|_| ())
    }
}
