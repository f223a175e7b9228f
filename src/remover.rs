//! Fail-open background removal
//!
//! [`BackgroundRemover`] never returns an error. When segmentation is
//! unavailable or a call fails, the user gets a notice and the input image
//! comes back unchanged.

use crate::{
    config::MattingParams,
    error::{BgRemovalError, FailureKind, Result},
    notice::NoticeBoard,
    segmentation::SegmentationCapability,
};
use image::DynamicImage;
use std::fmt;
use std::sync::Arc;
use tracing::{debug, error, warn};

/// How a removal attempt ended
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RemovalStatus {
    /// Segmentation ran and produced a cutout
    Processed,
    /// The cutout came from the result cache
    Cached,
    /// Segmentation is unavailable; the input was passed through
    Unavailable,
    /// Segmentation failed; the input was passed through
    PassedThrough(FailureKind),
}

impl RemovalStatus {
    /// Whether the output is a real cutout
    #[must_use]
    pub fn is_cutout(&self) -> bool {
        matches!(self, Self::Processed | Self::Cached)
    }
}

impl fmt::Display for RemovalStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Processed => write!(f, "processed"),
            Self::Cached => write!(f, "cached"),
            Self::Unavailable => write!(f, "unavailable"),
            Self::PassedThrough(kind) => write!(f, "passed through ({kind} failure)"),
        }
    }
}

/// Image returned by a removal attempt plus how it was obtained
#[derive(Debug, Clone)]
pub struct RemovalOutcome {
    pub image: Arc<DynamicImage>,
    pub status: RemovalStatus,
}

/// Segmentation wrapper with a fail-open policy
#[derive(Debug, Clone)]
pub struct BackgroundRemover {
    capability: SegmentationCapability,
    notices: NoticeBoard,
}

impl BackgroundRemover {
    #[must_use]
    pub fn new(capability: SegmentationCapability, notices: NoticeBoard) -> Self {
        Self {
            capability,
            notices,
        }
    }

    #[must_use]
    pub fn capability(&self) -> &SegmentationCapability {
        &self.capability
    }

    #[must_use]
    pub fn notices(&self) -> &NoticeBoard {
        &self.notices
    }

    /// Segment `image`, surfacing any failure as an error
    ///
    /// # Errors
    /// - [`BgRemovalError::Unavailable`] without a segmentation capability
    /// - Any segmentation failure
    pub fn try_remove(&self, image: &DynamicImage, params: MattingParams) -> Result<DynamicImage> {
        let segmenter = self.capability.segmenter().ok_or_else(|| {
            BgRemovalError::Unavailable(
                self.capability
                    .unavailable_reason()
                    .unwrap_or("segmentation capability missing")
                    .to_string(),
            )
        })?;
        params.validate()?;
        let cutout = segmenter.segment(image, params)?;
        Ok(DynamicImage::ImageRgba8(cutout))
    }

    /// Remove the background, falling back to the input on any failure
    ///
    /// The returned image always has the dimensions of `image`.
    pub fn remove(&self, image: &Arc<DynamicImage>, params: MattingParams) -> RemovalOutcome {
        if let Some(reason) = self.capability.unavailable_reason() {
            debug!(reason, "Skipping segmentation, capability unavailable");
            self.notices.warning(format!(
                "Background removal is unavailable ({reason}). The original image is shown unchanged."
            ));
            return RemovalOutcome {
                image: Arc::clone(image),
                status: RemovalStatus::Unavailable,
            };
        }

        match self.try_remove(image, params) {
            Ok(cutout) => RemovalOutcome {
                image: Arc::new(cutout),
                status: RemovalStatus::Processed,
            },
            Err(e) => {
                let kind = e.failure_kind();
                if kind == FailureKind::Unknown {
                    error!(error = %e, ?params, "Unexpected segmentation failure");
                } else {
                    warn!(error = %e, %kind, "Segmentation failed");
                }
                self.notices
                    .error(format!("Error removing background ({kind} error): {e}"));
                RemovalOutcome {
                    image: Arc::clone(image),
                    status: RemovalStatus::PassedThrough(kind),
                }
            },
        }
    }
}
