//! Cutout composition from a segmentation mask
//!
//! Two strategies are available:
//!
//! - **Naive cutout**: the mask becomes the alpha channel as is.
//! - **Alpha matting**: the mask is split into a trimap (sure foreground,
//!   sure background, unknown band), alpha in the unknown band is estimated
//!   with a guided filter steered by image luminance, and foreground colours
//!   are recovered with two-pass Blur-Fusion so background colour does not
//!   bleed into soft edges.

use crate::config::MattingParams;
use crate::error::{BgRemovalError, Result};
use image::{DynamicImage, GrayImage, Luma, Rgba, RgbaImage};
use imageproc::distance_transform::Norm;
use imageproc::morphology::erode;
use ndarray::{Array2, Array3, Zip};

pub const TRIMAP_FOREGROUND: u8 = 255;
pub const TRIMAP_BACKGROUND: u8 = 0;
pub const TRIMAP_UNKNOWN: u8 = 128;

const GUIDED_FILTER_RADIUS: usize = 10;
const GUIDED_FILTER_EPSILON: f32 = 1e-3;
const FOREGROUND_COARSE_RADIUS: usize = 45;
const FOREGROUND_FINE_RADIUS: usize = 3;
const FUSION_EPSILON: f32 = 1e-5;

/// Compose the cutout for `image` according to `params`
///
/// # Errors
/// - Mask and image dimensions differ
pub fn cutout(image: &DynamicImage, mask: &GrayImage, params: &MattingParams) -> Result<RgbaImage> {
    if params.alpha_matting {
        alpha_matting_cutout(image, mask, params)
    } else {
        naive_cutout(image, mask)
    }
}

/// Use the mask directly as the alpha channel
///
/// # Errors
/// - Mask and image dimensions differ
pub fn naive_cutout(image: &DynamicImage, mask: &GrayImage) -> Result<RgbaImage> {
    ensure_same_size(image, mask)?;

    let mut output = image.to_rgba8();
    for (pixel, alpha) in output.pixels_mut().zip(mask.pixels()) {
        pixel[3] = alpha[0];
    }
    Ok(output)
}

/// Refine the mask with alpha matting before composing the cutout
///
/// Falls back to [`naive_cutout`] when the trimap contains no sure
/// foreground or no sure background, since there is nothing to propagate.
///
/// # Errors
/// - Mask and image dimensions differ
pub fn alpha_matting_cutout(
    image: &DynamicImage,
    mask: &GrayImage,
    params: &MattingParams,
) -> Result<RgbaImage> {
    ensure_same_size(image, mask)?;

    let trimap = build_trimap(
        mask,
        params.foreground_threshold,
        params.background_threshold,
        params.erode_size,
    );

    let has_foreground = trimap.pixels().any(|p| p[0] == TRIMAP_FOREGROUND);
    let has_background = trimap.pixels().any(|p| p[0] == TRIMAP_BACKGROUND);
    if !has_foreground || !has_background {
        log::debug!(
            "Trimap lacks sure foreground ({}) or background ({}), using plain cutout",
            has_foreground,
            has_background
        );
        return naive_cutout(image, mask);
    }

    let rgb = rgb_planes(image);
    let alpha = estimate_alpha(&rgb, &trimap);
    let foreground = estimate_foreground(&rgb, &alpha);

    let (width, height) = mask.dimensions();
    let mut output = RgbaImage::new(width, height);
    #[allow(clippy::indexing_slicing)]
    for (x, y, pixel) in output.enumerate_pixels_mut() {
        let (xi, yi) = (x as usize, y as usize);
        *pixel = Rgba([
            to_u8(foreground[[0, yi, xi]]),
            to_u8(foreground[[1, yi, xi]]),
            to_u8(foreground[[2, yi, xi]]),
            to_u8(alpha[[yi, xi]]),
        ]);
    }
    Ok(output)
}

/// Split a mask into sure foreground, sure background and an unknown band
///
/// Both sure regions are eroded by `erode_size / 2` pixels (square
/// structuring element) so the unknown band covers the object boundary.
#[must_use]
pub fn build_trimap(
    mask: &GrayImage,
    foreground_threshold: u8,
    background_threshold: u8,
    erode_size: u8,
) -> GrayImage {
    let mut is_foreground = binarize(mask, |v| v > foreground_threshold);
    let mut is_background = binarize(mask, |v| v < background_threshold);

    let radius = erode_size / 2;
    if radius > 0 {
        is_foreground = erode(&is_foreground, Norm::LInf, radius);
        is_background = erode(&is_background, Norm::LInf, radius);
    }

    let mut trimap = GrayImage::from_pixel(mask.width(), mask.height(), Luma([TRIMAP_UNKNOWN]));
    for ((out, fg), bg) in trimap
        .pixels_mut()
        .zip(is_foreground.pixels())
        .zip(is_background.pixels())
    {
        if fg[0] > 0 {
            out[0] = TRIMAP_FOREGROUND;
        } else if bg[0] > 0 {
            out[0] = TRIMAP_BACKGROUND;
        }
    }
    trimap
}

fn binarize(mask: &GrayImage, predicate: impl Fn(u8) -> bool) -> GrayImage {
    let mut out = GrayImage::new(mask.width(), mask.height());
    for (dst, src) in out.pixels_mut().zip(mask.pixels()) {
        dst[0] = if predicate(src[0]) { 255 } else { 0 };
    }
    out
}

fn ensure_same_size(image: &DynamicImage, mask: &GrayImage) -> Result<()> {
    if (image.width(), image.height()) != mask.dimensions() {
        return Err(BgRemovalError::shape(format!(
            "Mask is {}x{} but image is {}x{}",
            mask.width(),
            mask.height(),
            image.width(),
            image.height()
        )));
    }
    Ok(())
}

fn to_u8(value: f32) -> u8 {
    (value * 255.0).round().clamp(0.0, 255.0) as u8
}

/// Image as a `[3, H, W]` array in 0..=1
fn rgb_planes(image: &DynamicImage) -> Array3<f32> {
    let rgb = image.to_rgb8();
    let (width, height) = rgb.dimensions();
    Array3::from_shape_fn((3, height as usize, width as usize), |(c, y, x)| {
        f32::from(rgb.get_pixel(x as u32, y as u32)[c]) / 255.0
    })
}

/// Estimate alpha over the unknown band with a luminance-guided filter
///
/// Known trimap regions are kept at exactly 0 or 1.
fn estimate_alpha(rgb: &Array3<f32>, trimap: &GrayImage) -> Array2<f32> {
    let (_, height, width) = rgb.dim();

    let guide = Array2::from_shape_fn((height, width), |(y, x)| {
        0.299 * rgb[[0, y, x]] + 0.587 * rgb[[1, y, x]] + 0.114 * rgb[[2, y, x]]
    });
    let prior = Array2::from_shape_fn((height, width), |(y, x)| {
        f32::from(trimap.get_pixel(x as u32, y as u32)[0]) / 255.0
    });

    let mut alpha = guided_filter(&guide, &prior, GUIDED_FILTER_RADIUS, GUIDED_FILTER_EPSILON);

    Zip::indexed(&mut alpha).for_each(|(y, x), value| {
        *value = match trimap.get_pixel(x as u32, y as u32)[0] {
            TRIMAP_FOREGROUND => 1.0,
            TRIMAP_BACKGROUND => 0.0,
            _ => value.clamp(0.0, 1.0),
        };
    });
    alpha
}

/// Grey-scale guided filter (He et al.)
fn guided_filter(guide: &Array2<f32>, input: &Array2<f32>, radius: usize, eps: f32) -> Array2<f32> {
    let mean_i = box_mean(guide, radius);
    let mean_p = box_mean(input, radius);
    let corr_ip = box_mean(&(guide * input), radius);
    let corr_ii = box_mean(&(guide * guide), radius);

    let var_i = &corr_ii - &(&mean_i * &mean_i);
    let cov_ip = &corr_ip - &(&mean_i * &mean_p);

    let a = &cov_ip / &(var_i + eps);
    let b = &mean_p - &(&a * &mean_i);

    let mean_a = box_mean(&a, radius);
    let mean_b = box_mean(&b, radius);

    mean_a * guide + mean_b
}

/// Mean over a `(2r+1)` square window, clipped at the borders
///
/// Runs in O(H*W) regardless of the radius using a summed-area table.
#[allow(clippy::indexing_slicing)]
fn box_mean(input: &Array2<f32>, radius: usize) -> Array2<f32> {
    let (height, width) = input.dim();
    let mut integral = Array2::<f64>::zeros((height + 1, width + 1));
    for y in 0..height {
        let mut row_sum = 0.0_f64;
        for x in 0..width {
            row_sum += f64::from(input[[y, x]]);
            integral[[y + 1, x + 1]] = integral[[y, x + 1]] + row_sum;
        }
    }

    Array2::from_shape_fn((height, width), |(y, x)| {
        let y0 = y.saturating_sub(radius);
        let x0 = x.saturating_sub(radius);
        let y1 = (y + radius + 1).min(height);
        let x1 = (x + radius + 1).min(width);
        let sum = integral[[y1, x1]] - integral[[y0, x1]] - integral[[y1, x0]] + integral[[y0, x0]];
        let count = ((y1 - y0) * (x1 - x0)) as f64;
        (sum / count) as f32
    })
}

/// Recover foreground colours with two passes of Blur-Fusion
fn estimate_foreground(rgb: &Array3<f32>, alpha: &Array2<f32>) -> Array3<f32> {
    let (foreground, background) =
        blur_fusion(rgb, rgb, rgb, alpha, FOREGROUND_COARSE_RADIUS);
    let (foreground, _) = blur_fusion(rgb, &foreground, &background, alpha, FOREGROUND_FINE_RADIUS);
    foreground
}

#[allow(clippy::indexing_slicing)]
fn blur_fusion(
    image: &Array3<f32>,
    foreground: &Array3<f32>,
    background: &Array3<f32>,
    alpha: &Array2<f32>,
    radius: usize,
) -> (Array3<f32>, Array3<f32>) {
    let (channels, height, width) = image.dim();
    let blurred_alpha = box_mean(alpha, radius);
    let inverse_alpha = alpha.mapv(|a| 1.0 - a);

    let mut new_foreground = Array3::<f32>::zeros((channels, height, width));
    let mut blurred_background = Array3::<f32>::zeros((channels, height, width));

    for c in 0..channels {
        let image_c = image.index_axis(ndarray::Axis(0), c);
        let fg_c = foreground.index_axis(ndarray::Axis(0), c);
        let bg_c = background.index_axis(ndarray::Axis(0), c);

        let blurred_fa = box_mean(&(&fg_c * alpha), radius);
        let blurred_bia = box_mean(&(&bg_c * &inverse_alpha), radius);

        for y in 0..height {
            for x in 0..width {
                let a = alpha[[y, x]];
                let blurred_a = blurred_alpha[[y, x]];
                let blurred_f = blurred_fa[[y, x]] / (blurred_a + FUSION_EPSILON);
                let blurred_b = blurred_bia[[y, x]] / ((1.0 - blurred_a) + FUSION_EPSILON);

                let residual = image_c[[y, x]] - a * blurred_f - (1.0 - a) * blurred_b;
                new_foreground[[c, y, x]] = (blurred_f + a * residual).clamp(0.0, 1.0);
                blurred_background[[c, y, x]] = blurred_b;
            }
        }
    }

    (new_foreground, blurred_background)
}
