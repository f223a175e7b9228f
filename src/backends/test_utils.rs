//! Test utilities: mock backends and segmenters
//!
//! These doubles stand in for a real ONNX model so the removal pipeline,
//! cache and session logic can be tested without model files.

use crate::{
    config::{AppConfig, MattingParams},
    error::{BgRemovalError, Result},
    inference::InferenceBackend,
    models::{ModelInfo, PreprocessingConfig},
    segmentation::Segmenter,
};
use image::{DynamicImage, RgbaImage};
use instant::Duration;
use ndarray::Array4;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

/// Mock inference backend producing a soft circular mask
#[derive(Debug, Clone)]
pub(crate) struct MockBackend {
    initialized: bool,
    edge: usize,
    infer_calls: Arc<AtomicUsize>,
    should_fail_init: bool,
    should_fail_inference: bool,
    panics_remaining: Arc<AtomicUsize>,
    output_channels: usize,
}

impl MockBackend {
    pub(crate) fn new() -> Self {
        Self {
            initialized: false,
            edge: 32,
            infer_calls: Arc::new(AtomicUsize::new(0)),
            should_fail_init: false,
            should_fail_inference: false,
            panics_remaining: Arc::new(AtomicUsize::new(0)),
            output_channels: 1,
        }
    }

    pub(crate) fn new_failing_init() -> Self {
        let mut backend = Self::new();
        backend.should_fail_init = true;
        backend
    }

    pub(crate) fn new_failing_inference() -> Self {
        let mut backend = Self::new();
        backend.should_fail_inference = true;
        backend
    }

    /// Backend whose first `infer` call panics
    pub(crate) fn new_panicking_once() -> Self {
        let backend = Self::new();
        backend.panics_remaining.store(1, Ordering::SeqCst);
        backend
    }

    /// Backend whose output has the wrong channel count
    pub(crate) fn new_wrong_shape() -> Self {
        let mut backend = Self::new();
        backend.output_channels = 3;
        backend
    }

    pub(crate) fn infer_calls(&self) -> usize {
        self.infer_calls.load(Ordering::SeqCst)
    }

    /// Shared handle to the inference counter
    pub(crate) fn infer_counter(&self) -> Arc<AtomicUsize> {
        Arc::clone(&self.infer_calls)
    }

    fn generate_mock_output(&self) -> Array4<f32> {
        let edge = self.edge;
        let mut output = Array4::<f32>::zeros((1, self.output_channels, edge, edge));

        let center = edge as f32 / 2.0;
        let radius = edge as f32 / 3.0;

        for c in 0..self.output_channels {
            for y in 0..edge {
                for x in 0..edge {
                    let dx = x as f32 - center;
                    let dy = y as f32 - center;
                    let distance = (dx * dx + dy * dy).sqrt();
                    let value = if distance < radius {
                        ((radius - distance) / radius * 4.0).min(1.0)
                    } else {
                        0.0
                    };
                    output[[0, c, y, x]] = value;
                }
            }
        }

        output
    }
}

impl InferenceBackend for MockBackend {
    fn initialize(&mut self, _config: &AppConfig) -> Result<Option<Duration>> {
        if self.should_fail_init {
            return Err(BgRemovalError::model("Mock backend initialization failed"));
        }
        self.initialized = true;
        Ok(Some(Duration::from_millis(5)))
    }

    fn infer(&mut self, input: &Array4<f32>) -> Result<Array4<f32>> {
        self.infer_calls.fetch_add(1, Ordering::SeqCst);

        if !self.initialized {
            return Err(BgRemovalError::internal("Mock backend not initialized"));
        }
        if self.should_fail_inference {
            return Err(BgRemovalError::inference("Mock backend inference failed"));
        }
        if self
            .panics_remaining
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok()
        {
            panic!("mock backend crash");
        }
        if input.shape().get(1).copied() != Some(3) {
            return Err(BgRemovalError::shape("Mock backend expects 3 input channels"));
        }

        Ok(self.generate_mock_output())
    }

    fn preprocessing_config(&self) -> Result<PreprocessingConfig> {
        Ok(PreprocessingConfig {
            target_size: self.edge as u32,
            normalization_mean: [0.485, 0.456, 0.406],
            normalization_std: [0.229, 0.224, 0.225],
        })
    }

    fn model_info(&self) -> Result<ModelInfo> {
        Ok(ModelInfo {
            name: "mock-u2net".to_string(),
            size_bytes: 1024,
            input_shape: (1, 3, self.edge, self.edge),
            output_shape: (1, self.output_channels, self.edge, self.edge),
        })
    }

    fn is_initialized(&self) -> bool {
        self.initialized
    }
}

/// How a [`RecordingSegmenter`] misbehaves
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum SegmenterFailure {
    Never,
    Error,
    Panic,
}

/// Segmenter double that records every call
///
/// Output keeps the input colours and makes the left half transparent.
#[derive(Debug)]
pub(crate) struct RecordingSegmenter {
    calls: AtomicUsize,
    params: Mutex<Vec<MattingParams>>,
    failure: SegmenterFailure,
}

impl RecordingSegmenter {
    pub(crate) fn new() -> Self {
        Self::with_failure(SegmenterFailure::Never)
    }

    pub(crate) fn with_failure(failure: SegmenterFailure) -> Self {
        Self {
            calls: AtomicUsize::new(0),
            params: Mutex::new(Vec::new()),
            failure,
        }
    }

    pub(crate) fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub(crate) fn recorded_params(&self) -> Vec<MattingParams> {
        self.params.lock().unwrap().clone()
    }
}

impl Segmenter for RecordingSegmenter {
    fn name(&self) -> &str {
        "recording"
    }

    fn segment(&self, image: &DynamicImage, params: MattingParams) -> Result<RgbaImage> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.params.lock().unwrap().push(params);

        match self.failure {
            SegmenterFailure::Never => {},
            SegmenterFailure::Error => {
                return Err(BgRemovalError::inference("simulated model fault"));
            },
            SegmenterFailure::Panic => panic!("simulated worker crash"),
        }

        let mut output = image.to_rgba8();
        let half = output.width() / 2;
        for (x, _, pixel) in output.enumerate_pixels_mut() {
            pixel[3] = if x < half { 0 } else { 255 };
        }
        Ok(output)
    }
}
