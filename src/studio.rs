//! Interactive session: upload, tune, remove, download
//!
//! [`Studio`] is the state machine behind the front-end:
//!
//! ```text
//! Idle --upload--> Loaded --remove--> Processing --done--> Result
//!   ^                ^  ^                  |                  |
//!   |                |  +---task failure---+                  |
//!   +----clear-------+-------------upload---------------------+
//! ```
//!
//! Removal always runs on the most recently uploaded (and resized) image,
//! with the matting controls as they are when the action is triggered.

use crate::{
    cache::{CacheStats, CachedRemover},
    config::{AppConfig, MattingControls, MattingParams},
    error::{BgRemovalError, Result},
    notice::{Notice, NoticeBoard},
    remover::{BackgroundRemover, RemovalOutcome, RemovalStatus},
    resize::fit_within,
    runner::TaskRunner,
    segmentation::SegmentationCapability,
    services::{ImageIOService, DOWNLOAD_MIME_TYPE},
};
use image::DynamicImage;
use std::fmt;
use std::sync::Arc;
use tracing::{debug, info, instrument};

/// Where the session currently is
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StudioState {
    /// No image uploaded
    Idle,
    /// Image uploaded, resized and displayed
    Loaded,
    /// A removal task is in flight
    Processing,
    /// Processed image displayed, download available
    Result,
}

impl fmt::Display for StudioState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Idle => write!(f, "idle"),
            Self::Loaded => write!(f, "loaded"),
            Self::Processing => write!(f, "processing"),
            Self::Result => write!(f, "result"),
        }
    }
}

/// The processed image as offered for download
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Download {
    pub file_name: String,
    pub mime_type: &'static str,
    pub bytes: Vec<u8>,
}

/// One interactive background-removal session
#[derive(Debug)]
pub struct Studio {
    config: AppConfig,
    remover: Arc<CachedRemover>,
    runner: TaskRunner,
    notices: NoticeBoard,
    controls: MattingControls,
    state: StudioState,
    uploaded_dimensions: Option<(u32, u32)>,
    image: Option<Arc<DynamicImage>>,
    result: Option<RemovalOutcome>,
}

impl Studio {
    /// Start a session on top of an initialized capability
    ///
    /// An unavailable capability is reported once here as a standing warning.
    #[must_use]
    pub fn new(capability: SegmentationCapability, config: AppConfig) -> Self {
        let notices = NoticeBoard::new();
        if let Some(reason) = capability.unavailable_reason() {
            notices.warning(format!(
                "Background removal is not available: {reason}. \
                 You can still upload images, but they will be returned unchanged."
            ));
        }

        let remover = BackgroundRemover::new(capability, notices.clone());
        let remover = Arc::new(CachedRemover::new(remover, config.cache_capacity));

        Self {
            config,
            remover,
            runner: TaskRunner::new(),
            notices,
            controls: MattingControls::default(),
            state: StudioState::Idle,
            uploaded_dimensions: None,
            image: None,
            result: None,
        }
    }

    /// Decode and resize an uploaded JPEG or PNG
    ///
    /// On failure the session keeps its previous image and state.
    ///
    /// # Errors
    /// - Unsupported or corrupt upload
    #[instrument(skip(self, bytes), fields(size = bytes.len()))]
    pub fn upload(&mut self, bytes: &[u8]) -> Result<()> {
        let decoded = match ImageIOService::load_from_bytes(bytes) {
            Ok(image) => image,
            Err(e) => {
                self.notices.error(format!("Could not open the uploaded file: {e}"));
                return Err(e);
            },
        };

        let dimensions = (decoded.width(), decoded.height());
        let resized = fit_within(&decoded, self.config.max_dimension);
        info!(
            original = %format!("{}x{}", dimensions.0, dimensions.1),
            resized = %format!("{}x{}", resized.width(), resized.height()),
            "Image uploaded"
        );

        self.uploaded_dimensions = Some(dimensions);
        self.image = Some(Arc::new(resized));
        self.result = None;
        self.transition(StudioState::Loaded);
        Ok(())
    }

    /// Forget the uploaded image and any result
    pub fn clear(&mut self) {
        self.uploaded_dimensions = None;
        self.image = None;
        self.result = None;
        self.transition(StudioState::Idle);
    }

    #[must_use]
    pub fn controls(&self) -> MattingControls {
        self.controls
    }

    /// Replace the matting controls
    ///
    /// The current image and any displayed result are kept; the new values
    /// apply from the next removal.
    ///
    /// # Errors
    /// - Erode size outside 0-40
    pub fn set_controls(&mut self, controls: MattingControls) -> Result<()> {
        let mut checked = self.controls;
        checked.set_erode_size(controls.erode_size)?;
        checked.alpha_matting = controls.alpha_matting;
        checked.foreground_threshold = controls.foreground_threshold;
        checked.background_threshold = controls.background_threshold;
        self.controls = checked;
        Ok(())
    }

    pub fn set_alpha_matting(&mut self, enabled: bool) {
        self.controls.alpha_matting = enabled;
    }

    pub fn set_foreground_threshold(&mut self, value: u8) {
        self.controls.foreground_threshold = value;
    }

    pub fn set_background_threshold(&mut self, value: u8) {
        self.controls.background_threshold = value;
    }

    /// # Errors
    /// - Erode size outside 0-40
    pub fn set_erode_size(&mut self, value: u8) -> Result<()> {
        self.controls.set_erode_size(value)
    }

    /// Parameters the next removal will use
    #[must_use]
    pub fn effective_params(&self) -> MattingParams {
        self.controls.params()
    }

    /// Run one removal on the worker thread and wait for it
    ///
    /// Segmentation failures do not produce an error: the original image is
    /// shown as the result and a notice explains why.
    ///
    /// # Errors
    /// - [`BgRemovalError::NoImage`] before any upload
    /// - [`BgRemovalError::TaskBusy`] or [`BgRemovalError::Task`] when the
    ///   worker could not complete; the session returns to `Loaded`
    #[instrument(skip(self), fields(params = ?self.controls.params()))]
    pub fn remove_background(&mut self) -> Result<RemovalStatus> {
        let image = self.image.clone().ok_or(BgRemovalError::NoImage)?;
        let params = self.controls.params();
        let remover = Arc::clone(&self.remover);

        self.transition(StudioState::Processing);
        match self.runner.run(move || remover.remove(&image, params)) {
            Ok(outcome) => {
                let status = outcome.status;
                self.result = Some(outcome);
                self.transition(StudioState::Result);
                Ok(status)
            },
            Err(e) => {
                self.notices
                    .error(format!("The background removal task failed: {e}"));
                self.result = None;
                self.transition(StudioState::Loaded);
                Err(e)
            },
        }
    }

    /// Encode the processed image as PNG for download
    ///
    /// # Errors
    /// - [`BgRemovalError::NoResult`] outside the `Result` state
    /// - PNG encoding failures
    pub fn download(&self) -> Result<Download> {
        let outcome = self
            .result
            .as_ref()
            .filter(|_| self.state == StudioState::Result)
            .ok_or(BgRemovalError::NoResult)?;
        Ok(Download {
            file_name: self.config.download_file_name.clone(),
            mime_type: DOWNLOAD_MIME_TYPE,
            bytes: ImageIOService::encode_png(&outcome.image)?,
        })
    }

    fn transition(&mut self, next: StudioState) {
        if self.state != next {
            debug!(from = %self.state, to = %next, "Session state change");
            self.state = next;
        }
    }

    #[must_use]
    pub fn state(&self) -> StudioState {
        self.state
    }

    /// Dimensions of the upload before resizing
    #[must_use]
    pub fn uploaded_dimensions(&self) -> Option<(u32, u32)> {
        self.uploaded_dimensions
    }

    /// The resized upload that removals operate on
    #[must_use]
    pub fn image(&self) -> Option<&Arc<DynamicImage>> {
        self.image.as_ref()
    }

    #[must_use]
    pub fn result(&self) -> Option<&RemovalOutcome> {
        self.result.as_ref()
    }

    #[must_use]
    pub fn notices(&self) -> Vec<Notice> {
        self.notices.snapshot()
    }

    #[must_use]
    pub fn notice_board(&self) -> &NoticeBoard {
        &self.notices
    }

    #[must_use]
    pub fn is_available(&self) -> bool {
        self.remover.remover().capability().is_available()
    }

    /// Name of the loaded segmentation model, if any
    #[must_use]
    pub fn model_name(&self) -> Option<String> {
        self.remover
            .remover()
            .capability()
            .segmenter()
            .map(|s| s.name().to_string())
    }

    #[must_use]
    pub fn cache_stats(&self) -> CacheStats {
        self.remover.stats()
    }

    #[must_use]
    pub fn cached_results(&self) -> usize {
        self.remover.len()
    }

    #[must_use]
    pub fn config(&self) -> &AppConfig {
        &self.config
    }
}
