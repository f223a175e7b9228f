//! Upload resizing
//!
//! Large uploads are shrunk so the longest side fits a cap before anything
//! else happens. Images already within the cap are never upscaled.

use image::{imageops::FilterType, DynamicImage};

/// Scale factor that brings the longest side of `width` x `height` down to `cap`
#[must_use]
pub fn scale_ratio(width: u32, height: u32, cap: u32) -> f64 {
    let longest = width.max(height);
    if longest == 0 {
        return 1.0;
    }
    f64::from(cap) / f64::from(longest)
}

/// Dimensions after fitting within `cap`, rounded to the nearest pixel
///
/// Returns `None` when the image already fits.
#[must_use]
pub fn fitted_dimensions(width: u32, height: u32, cap: u32) -> Option<(u32, u32)> {
    let ratio = scale_ratio(width, height, cap);
    if ratio >= 1.0 {
        return None;
    }
    let scale = |side: u32| ((f64::from(side) * ratio).round() as u32).max(1);
    Some((scale(width), scale(height)))
}

/// Shrink `image` so its longest side is at most `cap`
///
/// Uses a Lanczos3 filter. Returns an unchanged copy when the image fits.
#[must_use]
pub fn fit_within(image: &DynamicImage, cap: u32) -> DynamicImage {
    match fitted_dimensions(image.width(), image.height(), cap) {
        Some((width, height)) => {
            tracing::debug!(
                from = %format!("{}x{}", image.width(), image.height()),
                to = %format!("{}x{}", width, height),
                "Resizing upload"
            );
            image.resize_exact(width, height, FilterType::Lanczos3)
        },
        None => image.clone(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{Rgb, RgbImage};

    fn image_of(width: u32, height: u32) -> DynamicImage {
        DynamicImage::ImageRgb8(RgbImage::from_pixel(width, height, Rgb([10, 20, 30])))
    }

    #[test]
    fn test_landscape_downscale() {
        let resized = fit_within(&image_of(2000, 1000), 1000);
        assert_eq!((resized.width(), resized.height()), (1000, 500));
    }

    #[test]
    fn test_portrait_downscale_rounds_to_nearest() {
        // 333 * (1000 / 1500) = 222.0, 1001 * (1000 / 1500) = 667.33
        assert_eq!(fitted_dimensions(333, 1500, 1000), Some((222, 1000)));
        assert_eq!(fitted_dimensions(1500, 1001, 1000), Some((1000, 667)));
    }

    #[test]
    fn test_small_image_untouched() {
        let original = image_of(640, 480);
        let resized = fit_within(&original, 1000);
        assert_eq!(resized.as_bytes(), original.as_bytes());
        assert_eq!(fitted_dimensions(1000, 1000, 1000), None);
    }

    #[test]
    fn test_extreme_aspect_ratio_keeps_one_pixel() {
        assert_eq!(fitted_dimensions(5000, 1, 1000), Some((1000, 1)));
    }
}
