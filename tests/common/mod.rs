//! Shared test doubles and image helpers for integration tests

#![allow(dead_code)]

use bgremove_pro::{
    matting, AppConfig, BgRemovalError, MattingParams, Result, SegmentationCapability, Segmenter,
    Studio,
};
use image::{DynamicImage, GrayImage, ImageFormat, Luma, Rgb, RgbImage, RgbaImage};
use std::io::Cursor;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

/// How a [`RecordingSegmenter`] misbehaves
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Failure {
    Never,
    Runtime,
    Shape,
    Panic,
}

/// Segmenter double with a call counter, recorded params and a failure switch
///
/// Successful output keeps the input colours and makes the left half transparent.
#[derive(Debug)]
pub struct RecordingSegmenter {
    calls: AtomicUsize,
    params: Mutex<Vec<MattingParams>>,
    failure: Mutex<Failure>,
}

impl RecordingSegmenter {
    pub fn new() -> Arc<Self> {
        Self::failing(Failure::Never)
    }

    pub fn failing(failure: Failure) -> Arc<Self> {
        Arc::new(Self {
            calls: AtomicUsize::new(0),
            params: Mutex::new(Vec::new()),
            failure: Mutex::new(failure),
        })
    }

    pub fn set_failure(&self, failure: Failure) {
        *self.failure.lock().unwrap() = failure;
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub fn recorded_params(&self) -> Vec<MattingParams> {
        self.params.lock().unwrap().clone()
    }

    pub fn last_params(&self) -> Option<MattingParams> {
        self.params.lock().unwrap().last().copied()
    }
}

impl Segmenter for RecordingSegmenter {
    fn name(&self) -> &str {
        "recording"
    }

    fn segment(&self, image: &DynamicImage, params: MattingParams) -> Result<RgbaImage> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.params.lock().unwrap().push(params);

        let failure = *self.failure.lock().unwrap();
        match failure {
            Failure::Never => {},
            Failure::Runtime => return Err(BgRemovalError::inference("simulated runtime fault")),
            Failure::Shape => return Err(BgRemovalError::shape("simulated shape mismatch")),
            Failure::Panic => panic!("simulated worker crash"),
        }

        let mut output = image.to_rgba8();
        let half = output.width() / 2;
        for (x, _, pixel) in output.enumerate_pixels_mut() {
            pixel[3] = if x < half { 0 } else { 255 };
        }
        Ok(output)
    }
}

/// Segmenter that predicts a centred disc and runs the real cutout code
#[derive(Debug, Default)]
pub struct DiscSegmenter;

impl DiscSegmenter {
    pub fn mask(width: u32, height: u32) -> GrayImage {
        let (cx, cy) = (width as f32 / 2.0, height as f32 / 2.0);
        let radius = width.min(height) as f32 / 3.0;
        GrayImage::from_fn(width, height, |x, y| {
            let d = ((x as f32 + 0.5 - cx).powi(2) + (y as f32 + 0.5 - cy).powi(2)).sqrt();
            let value = ((radius - d) / 4.0 + 0.5).clamp(0.0, 1.0);
            Luma([(value * 255.0).round() as u8])
        })
    }
}

impl Segmenter for DiscSegmenter {
    fn name(&self) -> &str {
        "disc"
    }

    fn segment(&self, image: &DynamicImage, params: MattingParams) -> Result<RgbaImage> {
        let mask = Self::mask(image.width(), image.height());
        matting::cutout(image, &mask, &params)
    }
}

pub fn available(segmenter: Arc<dyn Segmenter>) -> SegmentationCapability {
    SegmentationCapability::available(segmenter)
}

pub fn studio_with(segmenter: Arc<dyn Segmenter>) -> Studio {
    Studio::new(available(segmenter), AppConfig::default())
}

pub fn gradient_image(width: u32, height: u32) -> DynamicImage {
    DynamicImage::ImageRgb8(RgbImage::from_fn(width, height, |x, y| {
        Rgb([(x % 256) as u8, (y % 256) as u8, ((x + y) % 256) as u8])
    }))
}

pub fn encode(image: &DynamicImage, format: ImageFormat) -> Vec<u8> {
    let mut buffer = Cursor::new(Vec::new());
    image.write_to(&mut buffer, format).unwrap();
    buffer.into_inner()
}

pub fn png_bytes(width: u32, height: u32) -> Vec<u8> {
    encode(&gradient_image(width, height), ImageFormat::Png)
}

pub fn jpeg_bytes(width: u32, height: u32) -> Vec<u8> {
    encode(&gradient_image(width, height), ImageFormat::Jpeg)
}
