//! Inference backend abstraction

use crate::{
    config::AppConfig,
    error::Result,
    models::{ModelInfo, PreprocessingConfig},
};
use instant::Duration;
use ndarray::Array4;

/// Trait for inference backends
///
/// A backend owns one loaded model. `Send` lets the model session move
/// into the removal worker thread.
pub trait InferenceBackend: Send {
    /// Initialize the backend with the given configuration
    ///
    /// # Errors
    /// - Backend initialization failures
    /// - Model loading or validation errors
    fn initialize(&mut self, config: &AppConfig) -> Result<Option<Duration>>;

    /// Run inference on the input tensor (NCHW)
    ///
    /// # Errors
    /// - Backend not initialized
    /// - Model inference failures
    /// - Tensor conversion errors
    fn infer(&mut self, input: &Array4<f32>) -> Result<Array4<f32>>;

    /// Get preprocessing configuration for this backend
    ///
    /// # Errors
    /// - Model manager not initialized
    fn preprocessing_config(&self) -> Result<PreprocessingConfig>;

    /// Get model information for this backend
    ///
    /// # Errors
    /// - Model not loaded yet
    fn model_info(&self) -> Result<ModelInfo>;

    /// Check if backend is initialized
    fn is_initialized(&self) -> bool;
}
