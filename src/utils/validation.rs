//! Tensor and image dimension validation
//!
//! Shape violations are reported as [`BgRemovalError::ShapeMismatch`] so the
//! removal pipeline can classify them as unexpected model output.

use crate::error::{BgRemovalError, Result};
use ndarray::Array4;

/// Largest edge the preprocessing pipeline accepts
const MAX_DIMENSION: u32 = 16384;

/// Validator for tensor shapes and image dimensions
pub struct TensorValidator;

impl TensorValidator {
    /// Validate tensor shape matches expected dimensions
    pub fn validate_tensor_shape(
        tensor: &Array4<f32>,
        expected_shape: (usize, usize, usize, usize),
    ) -> Result<()> {
        let actual = tensor.dim();
        if actual != expected_shape {
            let (batch, channels, height, width) = expected_shape;
            return Err(BgRemovalError::shape(format!(
                "Expected [{}, {}, {}, {}], got [{}, {}, {}, {}]",
                batch, channels, height, width, actual.0, actual.1, actual.2, actual.3
            )));
        }
        Ok(())
    }

    /// Validate that tensor has batch size of 1 and a single channel
    pub fn validate_single_batch_single_channel(tensor: &Array4<f32>) -> Result<()> {
        let (batch, channels, _, _) = tensor.dim();
        if batch != 1 || channels != 1 {
            return Err(BgRemovalError::shape(format!(
                "Mask tensor must be [1, 1, H, W], got [{}, {}, ..]",
                batch, channels
            )));
        }
        Ok(())
    }

    /// Validate image dimensions are within reasonable bounds
    pub fn validate_image_dimensions(width: u32, height: u32) -> Result<()> {
        if width == 0 || height == 0 {
            return Err(BgRemovalError::decode(format!(
                "Image dimensions too small: {}x{}",
                width, height
            )));
        }

        if width > MAX_DIMENSION || height > MAX_DIMENSION {
            return Err(BgRemovalError::invalid_config(format!(
                "Image dimensions too large: {}x{}. Maximum: {}x{}",
                width, height, MAX_DIMENSION, MAX_DIMENSION
            )));
        }

        Ok(())
    }
}
