//! Upload decoding and download encoding
//!
//! Keeps byte-level I/O out of the session logic so it can be tested on its own.

use crate::error::{BgRemovalError, Result};
use image::{DynamicImage, ImageFormat};
use std::io::Cursor;
use std::path::Path;

/// Upload formats accepted by the session
pub const SUPPORTED_UPLOAD_FORMATS: &[ImageFormat] = &[ImageFormat::Jpeg, ImageFormat::Png];

/// MIME type of the downloadable result
pub const DOWNLOAD_MIME_TYPE: &str = "image/png";

/// Service for image decoding, encoding and file output
pub struct ImageIOService;

impl ImageIOService {
    /// Sniff the format of uploaded bytes, accepting only JPEG and PNG
    ///
    /// # Errors
    /// - Empty or unrecognizable data
    /// - Recognized but unsupported format (e.g. GIF)
    pub fn detect_upload_format(bytes: &[u8]) -> Result<ImageFormat> {
        if bytes.is_empty() {
            return Err(BgRemovalError::decode("uploaded file is empty"));
        }
        let format = image::guess_format(bytes)
            .map_err(|e| BgRemovalError::decode(format!("unrecognized image data: {e}")))?;
        if SUPPORTED_UPLOAD_FORMATS.contains(&format) {
            Ok(format)
        } else {
            Err(BgRemovalError::unsupported_format(format!(
                "{format:?} (only JPEG and PNG uploads are accepted)"
            )))
        }
    }

    /// Decode an uploaded JPEG or PNG
    ///
    /// # Examples
    /// ```rust,no_run
    /// use bgremove_pro::services::ImageIOService;
    ///
    /// let bytes = std::fs::read("input.jpg")?;
    /// let image = ImageIOService::load_from_bytes(&bytes)?;
    /// # Ok::<(), Box<dyn std::error::Error>>(())
    /// ```
    ///
    /// # Errors
    /// - Unsupported format, see [`Self::detect_upload_format`]
    /// - Corrupt image data
    pub fn load_from_bytes(bytes: &[u8]) -> Result<DynamicImage> {
        let format = Self::detect_upload_format(bytes)?;
        image::load_from_memory_with_format(bytes, format).map_err(|e| {
            BgRemovalError::decode(format!("failed to decode {format:?} upload: {e}"))
        })
    }

    /// Read an upload from disk
    ///
    /// # Errors
    /// - File missing or unreadable
    pub async fn read_upload<P: AsRef<Path>>(path: P) -> Result<Vec<u8>> {
        let path = path.as_ref();
        tokio::fs::read(path)
            .await
            .map_err(|e| BgRemovalError::file_io_error("read upload", path, &e))
    }

    /// Encode an image as PNG bytes, keeping its alpha channel
    ///
    /// # Errors
    /// - PNG encoder failures
    pub fn encode_png(image: &DynamicImage) -> Result<Vec<u8>> {
        let mut buffer = Cursor::new(Vec::new());
        image.write_to(&mut buffer, ImageFormat::Png)?;
        Ok(buffer.into_inner())
    }

    /// Write bytes to `path`, creating parent directories as needed
    ///
    /// # Errors
    /// - Directory creation or write failures
    pub async fn save_bytes<P: AsRef<Path>>(path: P, bytes: &[u8]) -> Result<()> {
        let path = path.as_ref();
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            tokio::fs::create_dir_all(parent)
                .await
                .map_err(|e| BgRemovalError::file_io_error("create output directory", parent, &e))?;
        }
        tokio::fs::write(path, bytes)
            .await
            .map_err(|e| BgRemovalError::file_io_error("write download", path, &e))
    }

    /// Whether a path looks like a supported upload, judged by extension
    pub fn is_supported_upload_path<P: AsRef<Path>>(path: P) -> bool {
        path.as_ref()
            .extension()
            .and_then(|ext| ext.to_str())
            .map(str::to_lowercase)
            .is_some_and(|ext| matches!(ext.as_str(), "jpg" | "jpeg" | "png"))
    }
}
