//! Tract backend for segmentation models
//!
//! Pure Rust inference: no ONNX Runtime shared library is needed, at the
//! cost of CPU-only execution.

use crate::config::AppConfig;
use crate::error::{BgRemovalError, Result};
use crate::inference::InferenceBackend;
use crate::models::{ModelInfo, ModelManager, PreprocessingConfig};
use instant::{Duration, Instant};
use ndarray::Array4;
use tract_onnx::prelude::*;

/// Type alias for the optimized runnable Tract plan
type TractModel = RunnableModel<TypedFact, Box<dyn TypedOp>, Graph<TypedFact, Box<dyn TypedOp>>>;

/// Tract backend for running segmentation models using pure Rust inference
#[derive(Debug)]
pub struct TractBackend {
    model: Option<TractModel>,
    model_manager: ModelManager,
    model_size: usize,
    initialized: bool,
}

impl TractBackend {
    /// List Tract execution providers; only CPU exists
    #[must_use]
    pub fn list_providers() -> Vec<(String, bool, String)> {
        vec![(
            "CPU".to_string(),
            true,
            "Pure Rust CPU inference with no external dependencies".to_string(),
        )]
    }

    /// Create a Tract backend for the given model
    #[must_use]
    pub fn with_model_manager(model_manager: ModelManager) -> Self {
        Self {
            model: None,
            model_manager,
            model_size: 0,
            initialized: false,
        }
    }

    fn load_model(&mut self) -> Result<Duration> {
        let model_load_start = Instant::now();
        let model_data = self.model_manager.load_model()?;
        let edge = self.model_manager.preprocessing_config().target_size as usize;

        log::info!(
            "Initializing Tract backend: model={}, size={:.2} MB",
            self.model_manager.name(),
            model_data.len() as f64 / (1024.0 * 1024.0)
        );

        let model = onnx()
            .model_for_read(&mut std::io::Cursor::new(&model_data))
            .map_err(|e| BgRemovalError::model(format!("Failed to load ONNX model: {e}")))?
            .with_input_fact(0, f32::fact([1, 3, edge, edge]).into())
            .map_err(|e| BgRemovalError::model(format!("Failed to set input fact: {e}")))?
            .into_optimized()
            .map_err(|e| BgRemovalError::model(format!("Failed to optimize model: {e}")))?
            .into_runnable()
            .map_err(|e| BgRemovalError::model(format!("Failed to create runnable model: {e}")))?;

        self.model_size = model_data.len();
        self.model = Some(model);
        self.initialized = true;

        let model_load_time = model_load_start.elapsed();
        log::info!(
            "Tract backend initialized in {}ms",
            model_load_time.as_millis()
        );
        Ok(model_load_time)
    }
}

impl InferenceBackend for TractBackend {
    fn initialize(&mut self, _config: &AppConfig) -> Result<Option<Duration>> {
        if self.initialized {
            return Ok(None);
        }

        let model_load_time = self.load_model()?;
        Ok(Some(model_load_time))
    }

    fn infer(&mut self, input: &Array4<f32>) -> Result<Array4<f32>> {
        let model = self
            .model
            .as_ref()
            .ok_or_else(|| BgRemovalError::internal("Tract model not initialized"))?;

        log::debug!("Running Tract inference on {:?}", input.shape());
        let inference_start = Instant::now();

        let data: Vec<f32> = input.iter().copied().collect();
        let input_tensor = Tensor::from_shape(input.shape(), &data)
            .map_err(|e| BgRemovalError::inference(format!("Failed to build input tensor: {e}")))?;

        let outputs = model
            .run(tvec![input_tensor.into()])
            .map_err(|e| BgRemovalError::inference(format!("Tract inference failed: {e}")))?;

        let output_tensor = outputs
            .into_iter()
            .next()
            .ok_or_else(|| BgRemovalError::inference("No output tensor found"))?
            .into_arc_tensor();

        let output_view = output_tensor.to_array_view::<f32>().map_err(|e| {
            BgRemovalError::inference(format!("Failed to convert output tensor: {e}"))
        })?;

        let output_shape = output_view.shape().to_vec();
        let [n, c, h, w] = output_shape[..] else {
            return Err(BgRemovalError::shape(format!(
                "Expected 4D output tensor, got {}D",
                output_shape.len()
            )));
        };
        let output_data: Vec<f32> = output_view.iter().copied().collect();
        let output_array = Array4::from_shape_vec((n, c, h, w), output_data)
            .map_err(|e| BgRemovalError::shape(format!("Failed to reshape output tensor: {e}")))?;

        log::debug!(
            "Tract inference completed in {:.2}ms",
            inference_start.elapsed().as_secs_f64() * 1000.0
        );

        Ok(output_array)
    }

    fn preprocessing_config(&self) -> Result<PreprocessingConfig> {
        Ok(self.model_manager.preprocessing_config())
    }

    fn model_info(&self) -> Result<ModelInfo> {
        if !self.initialized {
            return Err(BgRemovalError::internal("Model not loaded yet"));
        }
        Ok(self.model_manager.info(self.model_size))
    }

    fn is_initialized(&self) -> bool {
        self.initialized
    }
}
