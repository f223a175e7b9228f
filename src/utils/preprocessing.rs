//! Image to tensor conversion and mask post-processing

use crate::{
    error::{BgRemovalError, Result},
    models::PreprocessingConfig,
    utils::TensorValidator,
};
use image::{imageops::FilterType, DynamicImage, GrayImage, Luma, RgbImage};
use ndarray::Array4;

/// Shared image preprocessing utilities
pub struct ImagePreprocessor;

impl ImagePreprocessor {
    /// Build the NCHW input tensor for a salient-object model
    ///
    /// The image is stretched to the square model input (aspect ratio is
    /// not preserved, the mask is stretched back afterwards). Pixel values
    /// are divided by the brightest channel value of the image, then
    /// normalized with the model mean and standard deviation.
    pub fn preprocess_for_inference(
        image: &DynamicImage,
        preprocessing_config: &PreprocessingConfig,
    ) -> Result<Array4<f32>> {
        let target_size = preprocessing_config.target_size;
        if target_size == 0 {
            return Err(BgRemovalError::invalid_config("model input size must be positive"));
        }
        TensorValidator::validate_image_dimensions(image.width(), image.height())?;

        let resized = image::imageops::resize(
            &image.to_rgb8(),
            target_size,
            target_size,
            FilterType::Lanczos3,
        );

        Ok(Self::canvas_to_tensor(&resized, preprocessing_config))
    }

    /// Convert the resized canvas to a normalized tensor
    #[allow(clippy::indexing_slicing)]
    fn canvas_to_tensor(canvas: &RgbImage, preprocessing_config: &PreprocessingConfig) -> Array4<f32> {
        let (width, height) = canvas.dimensions();
        let mut tensor = Array4::<f32>::zeros((1, 3, height as usize, width as usize));

        let max_value = canvas.as_raw().iter().copied().max().unwrap_or(0);
        let scale = f32::from(max_value).max(1e-6);
        let mean = preprocessing_config.normalization_mean;
        let std = preprocessing_config.normalization_std;

        // Safe: tensor dimensions match the canvas
        for (x, y, pixel) in canvas.enumerate_pixels() {
            for channel in 0..3 {
                let value = f32::from(pixel[channel]) / scale;
                tensor[[0, channel, y as usize, x as usize]] =
                    (value - mean[channel]) / std[channel];
            }
        }

        tensor
    }

    /// Turn the raw model output into an 8-bit mask of the given size
    ///
    /// The prediction is min-max normalized, scaled to 0-255 and resized to
    /// `width` x `height` with a Lanczos filter.
    ///
    /// # Errors
    /// - Output is not shaped `[1, 1, H, W]`
    pub fn tensor_to_mask(output: &Array4<f32>, width: u32, height: u32) -> Result<GrayImage> {
        TensorValidator::validate_single_batch_single_channel(output)?;

        let (_, _, mask_height, mask_width) = output.dim();
        if mask_height == 0 || mask_width == 0 {
            return Err(BgRemovalError::shape("model returned an empty mask"));
        }

        let (min, max) = output
            .iter()
            .fold((f32::INFINITY, f32::NEG_INFINITY), |(lo, hi), &v| {
                (lo.min(v), hi.max(v))
            });
        let range = max - min;

        let mut mask = GrayImage::new(mask_width as u32, mask_height as u32);
        for ((_, _, y, x), &value) in output.indexed_iter() {
            let normalized = if range > f32::EPSILON {
                (value - min) / range
            } else {
                0.0
            };
            let level = (normalized * 255.0).round().clamp(0.0, 255.0) as u8;
            mask.put_pixel(x as u32, y as u32, Luma([level]));
        }

        if mask.dimensions() == (width, height) {
            return Ok(mask);
        }
        Ok(image::imageops::resize(
            &mask,
            width,
            height,
            FilterType::Lanczos3,
        ))
    }
}
