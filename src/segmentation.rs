//! Segmentation capability: the model session behind every removal call
//!
//! The capability is built once at start-up by
//! [`SegmentationCapability::initialize`] and shared by reference. Building it
//! never fails: when the model cannot be loaded the capability is recorded as
//! unavailable and the application keeps running in degraded mode.

use crate::{
    config::{AppConfig, BackendType, MattingParams},
    error::{BgRemovalError, Result},
    inference::InferenceBackend,
    matting,
    models::{ModelInfo, ModelManager, PreprocessingConfig},
    utils::{ImagePreprocessor, TensorValidator},
};
use image::{DynamicImage, RgbaImage};
use instant::Instant;
use std::fmt;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use tracing::{debug, info, instrument, span, warn, Level};

/// Turns an image into a cutout with a transparent background
pub trait Segmenter: Send + Sync {
    /// Short name for logs and status output
    fn name(&self) -> &str;

    /// Segment `image` and compose an RGBA cutout of the same size
    ///
    /// # Errors
    /// - Image cannot be converted for the model
    /// - Model output has an unexpected shape
    /// - Inference runtime failures
    fn segment(&self, image: &DynamicImage, params: MattingParams) -> Result<RgbaImage>;
}

/// Factory trait for creating inference backends
pub trait BackendFactory: Send + Sync {
    /// Create a backend instance of the specified type with the given model manager
    ///
    /// # Errors
    /// - Backend type not compiled into this build
    fn create_backend(
        &self,
        backend_type: BackendType,
        model_manager: ModelManager,
    ) -> Result<Box<dyn InferenceBackend>>;

    /// List available backend types
    fn available_backends(&self) -> Vec<BackendType>;
}

/// Backend factory for the backends enabled by cargo features
#[derive(Debug, Default, Clone, Copy)]
pub struct DefaultBackendFactory;

impl BackendFactory for DefaultBackendFactory {
    fn create_backend(
        &self,
        backend_type: BackendType,
        model_manager: ModelManager,
    ) -> Result<Box<dyn InferenceBackend>> {
        match backend_type {
            #[cfg(feature = "onnx")]
            BackendType::Onnx => Ok(Box::new(crate::backends::OnnxBackend::with_model_manager(
                model_manager,
            ))),
            #[cfg(feature = "tract")]
            BackendType::Tract => Ok(Box::new(crate::backends::TractBackend::with_model_manager(
                model_manager,
            ))),
            #[allow(unreachable_patterns)]
            other => {
                drop(model_manager);
                Err(BgRemovalError::invalid_config(format!(
                    "Backend '{}' is not compiled into this build",
                    other
                )))
            },
        }
    }

    fn available_backends(&self) -> Vec<BackendType> {
        let mut backends = Vec::new();
        #[cfg(feature = "onnx")]
        backends.push(BackendType::Onnx);
        #[cfg(feature = "tract")]
        backends.push(BackendType::Tract);
        backends
    }
}

/// A loaded model plus the pipeline around it
pub struct ModelSession {
    backend: Mutex<Box<dyn InferenceBackend>>,
    preprocessing: PreprocessingConfig,
    name: String,
}

impl ModelSession {
    /// Initialize `backend` and wrap it in a session
    ///
    /// # Errors
    /// - Backend initialization failures (missing model, runtime errors)
    pub fn new(
        mut backend: Box<dyn InferenceBackend>,
        config: &AppConfig,
        name: impl Into<String>,
    ) -> Result<Self> {
        let name = name.into();
        if let Some(load_time) = backend.initialize(config)? {
            info!(
                model = %name,
                load_ms = load_time.as_millis() as u64,
                "Segmentation model loaded"
            );
        }
        let preprocessing = backend.preprocessing_config()?;
        Ok(Self {
            backend: Mutex::new(backend),
            preprocessing,
            name,
        })
    }

    /// Information about the loaded model
    ///
    /// # Errors
    /// - Backend metadata errors
    pub fn model_info(&self) -> Result<ModelInfo> {
        self.backend().model_info()
    }

    /// Lock the backend, recovering it after a panicked inference
    fn backend(&self) -> MutexGuard<'_, Box<dyn InferenceBackend>> {
        self.backend.lock().unwrap_or_else(|poisoned| {
            warn!(model = %self.name, "Recovering model session after a crashed inference");
            self.backend.clear_poison();
            PoisonError::into_inner(poisoned)
        })
    }
}

impl fmt::Debug for ModelSession {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ModelSession")
            .field("name", &self.name)
            .field("preprocessing", &self.preprocessing)
            .finish_non_exhaustive()
    }
}

impl Segmenter for ModelSession {
    fn name(&self) -> &str {
        &self.name
    }

    #[instrument(
        skip(self, image),
        fields(
            model = %self.name,
            dimensions = %format!("{}x{}", image.width(), image.height())
        )
    )]
    fn segment(&self, image: &DynamicImage, params: MattingParams) -> Result<RgbaImage> {
        let start = Instant::now();

        let input = {
            let _span = span!(Level::DEBUG, "preprocessing").entered();
            let input = ImagePreprocessor::preprocess_for_inference(image, &self.preprocessing)?;
            let edge = self.preprocessing.target_size as usize;
            TensorValidator::validate_tensor_shape(&input, (1, 3, edge, edge))?;
            input
        };

        let output = {
            let _span = span!(Level::DEBUG, "inference").entered();
            self.backend().infer(&input)?
        };

        let cutout = {
            let _span = span!(
                Level::DEBUG,
                "cutout",
                alpha_matting = params.alpha_matting
            )
            .entered();
            let mask = ImagePreprocessor::tensor_to_mask(&output, image.width(), image.height())?;
            matting::cutout(image, &mask, &params)?
        };

        debug!(
            elapsed_ms = start.elapsed().as_millis() as u64,
            "Segmentation finished"
        );
        Ok(cutout)
    }
}

/// Whether segmentation can be performed in this process
#[derive(Clone)]
pub enum SegmentationCapability {
    Available(Arc<dyn Segmenter>),
    Unavailable { reason: String },
}

impl SegmentationCapability {
    /// Load the configured model, degrading to `Unavailable` on any failure
    #[must_use]
    pub fn initialize(config: &AppConfig, factory: &dyn BackendFactory) -> Self {
        match Self::try_load(config, factory) {
            Ok(session) => {
                info!(
                    model = %session.name(),
                    backend = %config.backend,
                    "Segmentation capability available"
                );
                Self::Available(Arc::new(session))
            },
            Err(e) => {
                warn!(error = %e, "Segmentation capability unavailable");
                Self::Unavailable {
                    reason: e.to_string(),
                }
            },
        }
    }

    fn try_load(config: &AppConfig, factory: &dyn BackendFactory) -> Result<ModelSession> {
        let manager = ModelManager::from_spec(&config.model, config.model_dir.as_deref())?;
        let name = manager.name().to_string();
        debug!(
            model = %name,
            path = %manager.path().display(),
            backend = %config.backend,
            "Loading segmentation model"
        );
        let backend = factory.create_backend(config.backend, manager)?;
        ModelSession::new(backend, config, name)
    }

    /// Wrap an already constructed segmenter
    #[must_use]
    pub fn available(segmenter: Arc<dyn Segmenter>) -> Self {
        Self::Available(segmenter)
    }

    #[must_use]
    pub fn unavailable(reason: impl Into<String>) -> Self {
        Self::Unavailable {
            reason: reason.into(),
        }
    }

    #[must_use]
    pub fn is_available(&self) -> bool {
        matches!(self, Self::Available(_))
    }

    #[must_use]
    pub fn segmenter(&self) -> Option<&Arc<dyn Segmenter>> {
        match self {
            Self::Available(segmenter) => Some(segmenter),
            Self::Unavailable { .. } => None,
        }
    }

    #[must_use]
    pub fn unavailable_reason(&self) -> Option<&str> {
        match self {
            Self::Available(_) => None,
            Self::Unavailable { reason } => Some(reason),
        }
    }
}

impl fmt::Debug for SegmentationCapability {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Available(segmenter) => f
                .debug_tuple("Available")
                .field(&segmenter.name())
                .finish(),
            Self::Unavailable { reason } => f
                .debug_struct("Unavailable")
                .field("reason", reason)
                .finish(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backends::test_utils::MockBackend;
    use image::{Rgb, RgbImage};

    struct MockFactory {
        backend: MockBackend,
    }

    impl BackendFactory for MockFactory {
        fn create_backend(
            &self,
            _backend_type: BackendType,
            _model_manager: ModelManager,
        ) -> Result<Box<dyn InferenceBackend>> {
            Ok(Box::new(self.backend.clone()))
        }

        fn available_backends(&self) -> Vec<BackendType> {
            vec![BackendType::Onnx]
        }
    }

    fn test_config() -> AppConfig {
        AppConfig::builder()
            .model_dir(std::env::temp_dir())
            .build()
            .unwrap()
    }

    fn test_image() -> DynamicImage {
        DynamicImage::ImageRgb8(RgbImage::from_pixel(48, 24, Rgb([90, 140, 200])))
    }

    #[test]
    fn test_initialize_with_working_backend() {
        let factory = MockFactory {
            backend: MockBackend::new(),
        };
        let capability = SegmentationCapability::initialize(&test_config(), &factory);
        assert!(capability.is_available());
        assert_eq!(capability.segmenter().unwrap().name(), "u2net");
        assert!(capability.unavailable_reason().is_none());
    }

    #[test]
    fn test_initialize_degrades_on_backend_failure() {
        let factory = MockFactory {
            backend: MockBackend::new_failing_init(),
        };
        let capability = SegmentationCapability::initialize(&test_config(), &factory);
        assert!(!capability.is_available());
        assert!(capability
            .unavailable_reason()
            .unwrap()
            .contains("initialization failed"));
    }

    #[test]
    fn test_initialize_degrades_on_unknown_model() {
        let config = AppConfig::builder()
            .model(crate::models::ModelSpec {
                source: crate::models::ModelSource::Cached("nope".to_string()),
            })
            .build()
            .unwrap();
        let capability = SegmentationCapability::initialize(&config, &DefaultBackendFactory);
        assert!(capability.unavailable_reason().unwrap().contains("Unknown model"));
    }

    #[test]
    fn test_model_session_segments_to_same_size() {
        let backend = MockBackend::new();
        let counter = backend.infer_counter();
        let session = ModelSession::new(Box::new(backend), &test_config(), "mock").unwrap();

        let cutout = session.segment(&test_image(), MattingParams::disabled()).unwrap();
        assert_eq!(cutout.dimensions(), (48, 24));
        assert_eq!(counter.load(std::sync::atomic::Ordering::SeqCst), 1);
        // Circle centre is foreground, the corner is background
        assert!(cutout.get_pixel(24, 12)[3] > 200);
        assert!(cutout.get_pixel(0, 0)[3] < 50);
    }

    #[test]
    fn test_model_session_with_alpha_matting() {
        let session =
            ModelSession::new(Box::new(MockBackend::new()), &test_config(), "mock").unwrap();
        let params = MattingParams::enabled(200, 20, 4).unwrap();
        let cutout = session.segment(&test_image(), params).unwrap();
        assert_eq!(cutout.dimensions(), (48, 24));
    }

    #[test]
    fn test_wrong_output_shape_is_shape_mismatch() {
        let session =
            ModelSession::new(Box::new(MockBackend::new_wrong_shape()), &test_config(), "mock")
                .unwrap();
        let err = session
            .segment(&test_image(), MattingParams::disabled())
            .unwrap_err();
        assert!(matches!(err, BgRemovalError::ShapeMismatch(_)));
    }

    #[test]
    fn test_inference_failure_propagates() {
        let session = ModelSession::new(
            Box::new(MockBackend::new_failing_inference()),
            &test_config(),
            "mock",
        )
        .unwrap();
        let err = session
            .segment(&test_image(), MattingParams::disabled())
            .unwrap_err();
        assert!(matches!(err, BgRemovalError::Inference(_)));
        assert!(session.model_info().is_ok());
    }

    #[test]
    fn test_session_usable_after_panicked_inference() {
        let backend = MockBackend::new_panicking_once();
        let counter = backend.infer_counter();
        let session = Arc::new(
            ModelSession::new(Box::new(backend), &test_config(), "mock").unwrap(),
        );

        let crashed = {
            let session = Arc::clone(&session);
            std::thread::spawn(move || session.segment(&test_image(), MattingParams::disabled()))
                .join()
        };
        assert!(crashed.is_err());

        let cutout = session
            .segment(&test_image(), MattingParams::disabled())
            .unwrap();
        assert_eq!(cutout.dimensions(), (48, 24));
        assert!(session.model_info().is_ok());
        assert_eq!(counter.load(std::sync::atomic::Ordering::SeqCst), 2);
    }

    #[test]
    fn test_default_factory_lists_compiled_backends() {
        let backends = DefaultBackendFactory.available_backends();
        #[cfg(feature = "onnx")]
        assert!(backends.contains(&BackendType::Onnx));
        #[cfg(not(feature = "tract"))]
        assert!(!backends.contains(&BackendType::Tract));
    }
}
