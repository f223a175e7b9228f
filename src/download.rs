//! Model downloading for the known segmentation models
//!
//! Streams the ONNX file into a `.part` file next to its final location,
//! hashes it on the way and renames it into place once complete, so an
//! interrupted download never leaves a truncated model behind.

use crate::error::{BgRemovalError, Result};
use crate::models::{default_model_dir, KnownModel, KNOWN_MODELS};
use futures_util::StreamExt;
#[cfg(feature = "cli")]
use indicatif::{ProgressBar, ProgressStyle};
use reqwest::Client;
use sha2::{Digest, Sha256};
use std::path::{Path, PathBuf};
use tokio::io::AsyncWriteExt;

const PARTIAL_EXTENSION: &str = "part";

/// Progress bar abstraction that works with and without CLI features
#[derive(Debug)]
pub enum ProgressIndicator {
    #[cfg(feature = "cli")]
    Indicatif(ProgressBar),
    NoOp,
}

impl ProgressIndicator {
    pub fn set_message(&self, msg: String) {
        match self {
            #[cfg(feature = "cli")]
            Self::Indicatif(pb) => pb.set_message(msg),
            Self::NoOp => {},
        }
    }

    pub fn set_length(&self, len: u64) {
        match self {
            #[cfg(feature = "cli")]
            Self::Indicatif(pb) => pb.set_length(len),
            Self::NoOp => {},
        }
    }

    pub fn set_position(&self, pos: u64) {
        match self {
            #[cfg(feature = "cli")]
            Self::Indicatif(pb) => pb.set_position(pos),
            Self::NoOp => {},
        }
    }

    pub fn finish_with_message(&self, msg: String) {
        match self {
            #[cfg(feature = "cli")]
            Self::Indicatif(pb) => pb.finish_with_message(msg),
            Self::NoOp => {},
        }
    }
}

/// Summary of a finished download
#[derive(Debug, Clone)]
pub struct DownloadedModel {
    pub name: String,
    pub path: PathBuf,
    pub bytes: u64,
    /// Hex SHA-256 of the file, `None` when it was already present
    pub sha256: Option<String>,
}

/// Fetches known models into the model directory
#[derive(Debug)]
pub struct ModelDownloader {
    client: Client,
    model_dir: PathBuf,
}

impl ModelDownloader {
    /// Create a downloader writing into `model_dir`, or `~/.u2net` when `None`
    ///
    /// # Errors
    /// - Failed to create HTTP client
    /// - Home directory unavailable when `model_dir` is `None`
    pub fn new(model_dir: Option<&Path>) -> Result<Self> {
        let client = Client::builder()
            .timeout(instant::Duration::from_secs(300))
            .build()
            .map_err(|e| BgRemovalError::download(format!("Failed to create HTTP client: {e}")))?;

        let model_dir = match model_dir {
            Some(dir) => dir.to_path_buf(),
            None => default_model_dir()?,
        };

        Ok(Self { client, model_dir })
    }

    #[must_use]
    pub fn model_dir(&self) -> &Path {
        &self.model_dir
    }

    /// Final path of a known model
    #[must_use]
    pub fn model_path(&self, model: &KnownModel) -> PathBuf {
        self.model_dir.join(format!("{}.onnx", model.name))
    }

    /// Download a known model by name unless it is already present
    ///
    /// # Errors
    /// - Unknown model name
    /// - Network or HTTP errors
    /// - File system errors while writing the model
    pub async fn download_known(&self, name: &str, show_progress: bool) -> Result<DownloadedModel> {
        let model = KnownModel::find(name).ok_or_else(|| {
            BgRemovalError::download(format!(
                "No download location for '{}'. Known models: {}",
                name,
                KNOWN_MODELS.iter().map(|m| m.name).collect::<Vec<_>>().join(", ")
            ))
        })?;

        let destination = self.model_path(model);
        if let Ok(metadata) = tokio::fs::metadata(&destination).await {
            if metadata.len() > 0 {
                log::info!("Model already present: {}", destination.display());
                return Ok(DownloadedModel {
                    name: model.name.to_string(),
                    path: destination,
                    bytes: metadata.len(),
                    sha256: None,
                });
            }
        }

        validate_model_url(model.url)?;
        let progress = if show_progress {
            Self::create_progress_indicator()
        } else {
            ProgressIndicator::NoOp
        };
        progress.set_message(format!("Downloading {}", model.name));

        match self.download_file(model.url, &destination, &progress).await {
            Ok((bytes, sha256)) => {
                progress.finish_with_message(format!("Downloaded {}", model.name));
                log::info!(
                    "Downloaded {} ({} bytes, sha256 {}) to {}",
                    model.name,
                    bytes,
                    sha256,
                    destination.display()
                );
                Ok(DownloadedModel {
                    name: model.name.to_string(),
                    path: destination,
                    bytes,
                    sha256: Some(sha256),
                })
            },
            Err(e) => {
                progress.finish_with_message("Download failed".to_string());
                Err(e)
            },
        }
    }

    fn create_progress_indicator() -> ProgressIndicator {
        #[cfg(feature = "cli")]
        {
            let pb = ProgressBar::new(0);
            if let Ok(style) = ProgressStyle::default_bar().template(
                "{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {bytes}/{total_bytes} {msg}",
            ) {
                pb.set_style(style.progress_chars("#>-"));
            }
            ProgressIndicator::Indicatif(pb)
        }
        #[cfg(not(feature = "cli"))]
        {
            ProgressIndicator::NoOp
        }
    }

    /// Stream `url` to `destination`, returning the byte count and hex SHA-256
    async fn download_file(
        &self,
        url: &str,
        destination: &Path,
        progress: &ProgressIndicator,
    ) -> Result<(u64, String)> {
        if let Some(parent) = destination.parent() {
            tokio::fs::create_dir_all(parent)
                .await
                .map_err(|e| BgRemovalError::file_io_error("create model directory", parent, &e))?;
        }

        let response = self
            .client
            .get(url)
            .send()
            .await
            .map_err(|e| BgRemovalError::download(format!("Failed to download {url}: {e}")))?;
        if !response.status().is_success() {
            return Err(BgRemovalError::download(format!(
                "HTTP error {} for {}",
                response.status(),
                url
            )));
        }
        if let Some(total) = response.content_length() {
            progress.set_length(total);
        }

        let partial = partial_path(destination);
        let result = Self::write_stream(response, &partial, progress).await;
        let (bytes, sha256) = match result {
            Ok(summary) => summary,
            Err(e) => {
                if let Err(cleanup_err) = tokio::fs::remove_file(&partial).await {
                    log::warn!("Failed to remove partial download: {}", cleanup_err);
                }
                return Err(e);
            },
        };

        tokio::fs::rename(&partial, destination)
            .await
            .map_err(|e| BgRemovalError::file_io_error("move downloaded model", destination, &e))?;
        Ok((bytes, sha256))
    }

    async fn write_stream(
        response: reqwest::Response,
        partial: &Path,
        progress: &ProgressIndicator,
    ) -> Result<(u64, String)> {
        let mut file = tokio::fs::File::create(partial)
            .await
            .map_err(|e| BgRemovalError::file_io_error("create file", partial, &e))?;
        let mut hasher = Sha256::new();
        let mut downloaded = 0u64;

        let mut stream = response.bytes_stream();
        while let Some(chunk) = stream.next().await {
            let chunk = chunk.map_err(|e| {
                BgRemovalError::download(format!("Failed to read download stream: {e}"))
            })?;
            hasher.update(&chunk);
            file.write_all(&chunk)
                .await
                .map_err(|e| BgRemovalError::file_io_error("write to file", partial, &e))?;
            downloaded += chunk.len() as u64;
            progress.set_position(downloaded);
        }

        file.flush()
            .await
            .map_err(|e| BgRemovalError::file_io_error("flush file", partial, &e))?;

        if downloaded == 0 {
            return Err(BgRemovalError::download("server returned an empty model file"));
        }
        Ok((downloaded, format!("{:x}", hasher.finalize())))
    }
}

/// Check that a model URL is an absolute HTTPS link to an ONNX file
///
/// # Errors
/// - Empty URL, non-HTTPS scheme or a path not ending in `.onnx`
pub fn validate_model_url(url: &str) -> Result<()> {
    if url.is_empty() {
        return Err(BgRemovalError::invalid_config("Model URL cannot be empty"));
    }
    let Some(rest) = url.strip_prefix("https://") else {
        return Err(BgRemovalError::invalid_config(format!(
            "Unsupported URL format: {url}. Only https:// downloads are supported"
        )));
    };
    let has_host = rest.split('/').next().is_some_and(|host| !host.is_empty());
    if !has_host || !rest.ends_with(".onnx") {
        return Err(BgRemovalError::invalid_config(format!(
            "Invalid model URL: {url}. Expected https://host/path/model.onnx"
        )));
    }
    Ok(())
}

fn partial_path(destination: &Path) -> PathBuf {
    let mut name = destination.as_os_str().to_owned();
    name.push(".");
    name.push(PARTIAL_EXTENSION);
    PathBuf::from(name)
}
