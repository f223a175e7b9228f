//! ONNX Runtime backend for salient-object segmentation models
//!
//! Runs `u2net`-family models through ONNX Runtime with optional CUDA or
//! `CoreML` acceleration.

use crate::config::{AppConfig, ExecutionProvider};
use crate::error::{BgRemovalError, Result};
use crate::inference::InferenceBackend;
use crate::models::{ModelInfo, ModelManager, PreprocessingConfig};
use instant::{Duration, Instant};
use ndarray::Array4;
use ort::execution_providers::{
    CUDAExecutionProvider, CoreMLExecutionProvider, ExecutionProvider as OrtExecutionProvider,
};
use ort::session::{builder::GraphOptimizationLevel, builder::SessionBuilder, Session};
use ort::{self, value::Value};

/// ONNX Runtime backend for running segmentation models
#[derive(Debug)]
pub struct OnnxBackend {
    session: Option<Session>,
    model_manager: ModelManager,
    model_size: usize,
    initialized: bool,
}

impl OnnxBackend {
    /// List ONNX Runtime execution providers with availability and a description
    ///
    /// # Examples
    /// ```rust,no_run
    /// use bgremove_pro::backends::OnnxBackend;
    ///
    /// for (name, available, description) in OnnxBackend::list_providers() {
    ///     println!("{name}: {available} - {description}");
    /// }
    /// ```
    #[must_use]
    pub fn list_providers() -> Vec<(String, bool, String)> {
        log::debug!(
            "Platform: {os}/{arch}, {cores} CPU cores",
            os = std::env::consts::OS,
            arch = std::env::consts::ARCH,
            cores = available_cores()
        );

        let cuda_available =
            OrtExecutionProvider::is_available(&CUDAExecutionProvider::default()).unwrap_or(false);
        let coreml_available =
            OrtExecutionProvider::is_available(&CoreMLExecutionProvider::default())
                .unwrap_or(false);

        vec![
            (
                "CPU".to_string(),
                true,
                "Always available, uses CPU for inference".to_string(),
            ),
            (
                "CUDA".to_string(),
                cuda_available,
                "NVIDIA GPU acceleration (requires CUDA toolkit and compatible GPU)".to_string(),
            ),
            (
                "CoreML".to_string(),
                coreml_available,
                "Apple Silicon GPU acceleration (macOS only)".to_string(),
            ),
        ]
    }

    /// Create a new ONNX backend for the given model
    #[must_use]
    pub fn with_model_manager(model_manager: ModelManager) -> Self {
        Self {
            session: None,
            model_manager,
            model_size: 0,
            initialized: false,
        }
    }

    fn configure_providers(
        session_builder: SessionBuilder,
        provider: ExecutionProvider,
    ) -> Result<SessionBuilder> {
        let cuda_provider = CUDAExecutionProvider::default();
        let coreml_provider = CoreMLExecutionProvider::default();
        let cuda_available = OrtExecutionProvider::is_available(&cuda_provider).unwrap_or(false);
        let coreml_available =
            OrtExecutionProvider::is_available(&coreml_provider).unwrap_or(false);

        let providers = match provider {
            ExecutionProvider::Cpu => {
                log::info!("Using CPU execution provider");
                Vec::new()
            },
            ExecutionProvider::Auto => {
                let mut providers = Vec::new();
                if cuda_available {
                    log::info!("CUDA execution provider is available and will be used");
                    providers.push(cuda_provider.build());
                }
                if coreml_available {
                    log::info!("CoreML execution provider is available and will be used");
                    providers.push(coreml_provider.with_subgraphs(true).build());
                }
                if providers.is_empty() {
                    log::debug!("No hardware acceleration available, using CPU");
                }
                providers
            },
            ExecutionProvider::Cuda => {
                if cuda_available {
                    log::info!("Using CUDA execution provider");
                    vec![cuda_provider.build()]
                } else {
                    log::warn!(
                        "CUDA execution provider requested but not available, falling back to CPU"
                    );
                    Vec::new()
                }
            },
            ExecutionProvider::CoreMl => {
                if coreml_available {
                    log::info!("Using CoreML execution provider (explicitly requested)");
                    vec![coreml_provider.with_subgraphs(true).build()]
                } else {
                    log::warn!(
                        "CoreML execution provider requested but not available, falling back to CPU"
                    );
                    Vec::new()
                }
            },
        };

        if providers.is_empty() {
            return Ok(session_builder);
        }
        session_builder
            .with_execution_providers(providers)
            .map_err(|e| {
                BgRemovalError::model(format!("Failed to set execution providers: {e}"))
            })
    }

    /// Load and initialize the ONNX model
    fn load_model(&mut self, config: &AppConfig) -> Result<Duration> {
        let model_load_start = Instant::now();
        let model_data = self.model_manager.load_model()?;

        let session_builder = Session::builder()
            .map_err(|e| BgRemovalError::model(format!("Failed to create session builder: {e}")))?
            .with_optimization_level(GraphOptimizationLevel::Level3)
            .map_err(|e| {
                BgRemovalError::model(format!("Failed to set optimization level: {e}"))
            })?;
        let session_builder =
            Self::configure_providers(session_builder, config.execution_provider)?;

        let intra_threads = if config.intra_threads > 0 {
            config.intra_threads
        } else {
            available_cores()
        };

        let session = session_builder
            .with_intra_threads(intra_threads)
            .map_err(|e| BgRemovalError::model(format!("Failed to set intra threads: {e}")))?
            .commit_from_memory(&model_data)
            .map_err(|e| {
                BgRemovalError::model(format!(
                    "Failed to create session from '{}': {e}",
                    self.model_manager.path().display()
                ))
            })?;

        self.model_size = model_data.len();
        self.session = Some(session);
        self.initialized = true;

        let model_load_time = model_load_start.elapsed();
        log::debug!(
            "ONNX session ready: model={}, provider={}, intra_threads={}, size={:.2} MB",
            self.model_manager.name(),
            config.execution_provider,
            intra_threads,
            self.model_size as f64 / (1024.0 * 1024.0)
        );
        log::info!(
            "Model loading complete: {:.0}ms",
            model_load_time.as_secs_f64() * 1000.0
        );

        Ok(model_load_time)
    }
}

fn available_cores() -> usize {
    std::thread::available_parallelism()
        .map(std::num::NonZeroUsize::get)
        .unwrap_or(4)
}

impl InferenceBackend for OnnxBackend {
    fn initialize(&mut self, config: &AppConfig) -> Result<Option<Duration>> {
        if self.initialized {
            return Ok(None);
        }

        let model_load_time = self.load_model(config)?;
        Ok(Some(model_load_time))
    }

    fn infer(&mut self, input: &Array4<f32>) -> Result<Array4<f32>> {
        if !self.initialized {
            return Err(BgRemovalError::internal("Backend not initialized"));
        }

        let session = self
            .session
            .as_mut()
            .ok_or_else(|| BgRemovalError::internal("ONNX session not initialized"))?;

        let inference_start = Instant::now();
        log::debug!("Starting inference with input shape: {:?}", input.dim());

        let input_value = Value::from_array(input.clone())
            .map_err(|e| BgRemovalError::inference(format!("Failed to convert input tensor: {e}")))?;

        let outputs = session
            .run(ort::inputs![input_value])
            .map_err(|e| BgRemovalError::inference(format!("ONNX inference failed: {e}")))?;

        // u2net exposes seven side outputs; the first one is the fused mask
        let keys: Vec<_> = outputs.keys().collect();
        let first_key = keys
            .first()
            .ok_or_else(|| BgRemovalError::inference("No output tensors found"))?;
        let output_tensor = outputs
            .get(first_key)
            .ok_or_else(|| BgRemovalError::inference("First output tensor not found"))?
            .try_extract_array::<f32>()
            .map_err(|e| BgRemovalError::inference(format!("Failed to extract output tensor: {e}")))?;

        let output_shape = output_tensor.shape().to_vec();
        let [n, c, h, w] = output_shape[..] else {
            return Err(BgRemovalError::shape(format!(
                "Expected 4D output tensor, got {}D",
                output_shape.len()
            )));
        };
        let output_data: Vec<f32> = output_tensor.iter().copied().collect();
        let result = Array4::from_shape_vec((n, c, h, w), output_data)
            .map_err(|e| BgRemovalError::shape(format!("Failed to reshape output tensor: {e}")))?;

        log::debug!(
            "Inference complete: {:.2}ms",
            inference_start.elapsed().as_secs_f64() * 1000.0
        );

        Ok(result)
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
