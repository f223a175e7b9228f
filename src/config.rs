//! Configuration types for background removal operations

use crate::error::{BgRemovalError, Result};
use crate::models::ModelSpec;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Default cap on the longest side of an uploaded image
pub const DEFAULT_MAX_DIMENSION: u32 = 1000;
/// Default number of memoized removal results
pub const DEFAULT_CACHE_CAPACITY: usize = 16;
/// File name the processed image is offered under
pub const DEFAULT_DOWNLOAD_FILE_NAME: &str = "background_removed.png";

pub const DEFAULT_FOREGROUND_THRESHOLD: u8 = 240;
pub const DEFAULT_BACKGROUND_THRESHOLD: u8 = 10;
pub const DEFAULT_ERODE_SIZE: u8 = 10;
pub const MAX_ERODE_SIZE: u8 = 40;

/// Execution provider options for ONNX Runtime
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum ExecutionProvider {
    /// Auto-detect best available provider (CUDA > `CoreML` > CPU)
    #[default]
    Auto,
    /// CPU execution (always available)
    Cpu,
    /// NVIDIA CUDA GPU acceleration
    Cuda,
    /// Apple Silicon GPU acceleration
    CoreMl,
}

impl std::fmt::Display for ExecutionProvider {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Auto => write!(f, "auto"),
            Self::Cpu => write!(f, "cpu"),
            Self::Cuda => write!(f, "cuda"),
            Self::CoreMl => write!(f, "coreml"),
        }
    }
}

/// Backend type enumeration for runtime selection
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum BackendType {
    /// ONNX Runtime backend (supports GPU acceleration)
    #[default]
    Onnx,
    /// Tract backend (pure Rust, no external dependencies)
    Tract,
}

impl std::fmt::Display for BackendType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Onnx => write!(f, "onnx"),
            Self::Tract => write!(f, "tract"),
        }
    }
}

/// Alpha matting parameters handed to the segmenter
///
/// The three numeric values are only read when `alpha_matting` is enabled.
/// Use [`MattingControls::params`] to obtain the effective tuple from UI state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct MattingParams {
    pub alpha_matting: bool,
    pub foreground_threshold: u8,
    pub background_threshold: u8,
    pub erode_size: u8,
}

impl Default for MattingParams {
    fn default() -> Self {
        Self::disabled()
    }
}

impl MattingParams {
    /// Plain cutout with the fixed default thresholds
    #[must_use]
    pub fn disabled() -> Self {
        Self {
            alpha_matting: false,
            foreground_threshold: DEFAULT_FOREGROUND_THRESHOLD,
            background_threshold: DEFAULT_BACKGROUND_THRESHOLD,
            erode_size: DEFAULT_ERODE_SIZE,
        }
    }

    /// Alpha matting with explicit thresholds
    ///
    /// # Errors
    /// - `erode_size` above [`MAX_ERODE_SIZE`]
    pub fn enabled(
        foreground_threshold: u8,
        background_threshold: u8,
        erode_size: u8,
    ) -> Result<Self> {
        let params = Self {
            alpha_matting: true,
            foreground_threshold,
            background_threshold,
            erode_size,
        };
        params.validate()?;
        Ok(params)
    }

    /// Check the slider ranges; thresholds are bounded by `u8` already
    ///
    /// # Errors
    /// - `erode_size` above [`MAX_ERODE_SIZE`]
    pub fn validate(&self) -> Result<()> {
        if self.erode_size > MAX_ERODE_SIZE {
            return Err(BgRemovalError::config_value_error(
                "erode size",
                self.erode_size,
                "0-40",
                Some(DEFAULT_ERODE_SIZE),
            ));
        }
        Ok(())
    }
}

/// Checkbox and slider state of the matting controls
///
/// Slider positions survive toggling the checkbox off and on again,
/// but only reach the segmenter while the checkbox is on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct MattingControls {
    pub alpha_matting: bool,
    pub foreground_threshold: u8,
    pub background_threshold: u8,
    pub erode_size: u8,
}

impl Default for MattingControls {
    fn default() -> Self {
        Self {
            alpha_matting: false,
            foreground_threshold: DEFAULT_FOREGROUND_THRESHOLD,
            background_threshold: DEFAULT_BACKGROUND_THRESHOLD,
            erode_size: DEFAULT_ERODE_SIZE,
        }
    }
}

impl MattingControls {
    /// Set the erode slider, rejecting values outside 0-40
    ///
    /// # Errors
    /// - `erode_size` above [`MAX_ERODE_SIZE`]
    pub fn set_erode_size(&mut self, erode_size: u8) -> Result<()> {
        if erode_size > MAX_ERODE_SIZE {
            return Err(BgRemovalError::config_value_error(
                "erode size",
                erode_size,
                "0-40",
                Some(DEFAULT_ERODE_SIZE),
            ));
        }
        self.erode_size = erode_size;
        Ok(())
    }

    /// Effective parameters for the next removal
    #[must_use]
    pub fn params(&self) -> MattingParams {
        if self.alpha_matting {
            MattingParams {
                alpha_matting: true,
                foreground_threshold: self.foreground_threshold,
                background_threshold: self.background_threshold,
                erode_size: self.erode_size.min(MAX_ERODE_SIZE),
            }
        } else {
            MattingParams::disabled()
        }
    }
}

/// Application configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    /// Longest side an upload is resized down to
    pub max_dimension: u32,

    /// Number of removal results kept in the LRU cache
    pub cache_capacity: usize,

    /// Segmentation model to load at start-up
    pub model: ModelSpec,

    /// Directory holding cached models (None = `~/.u2net`)
    pub model_dir: Option<PathBuf>,

    /// Inference backend
    pub backend: BackendType,

    /// Execution provider for ONNX Runtime
    pub execution_provider: ExecutionProvider,

    /// Number of intra-op threads for inference (0 = auto)
    pub intra_threads: usize,

    /// File name of the downloadable result
    pub download_file_name: String,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            max_dimension: DEFAULT_MAX_DIMENSION,
            cache_capacity: DEFAULT_CACHE_CAPACITY,
            model: ModelSpec::default(),
            model_dir: None,
            backend: BackendType::default(),
            execution_provider: ExecutionProvider::default(),
            intra_threads: 0,
            download_file_name: DEFAULT_DOWNLOAD_FILE_NAME.to_string(),
        }
    }
}

impl AppConfig {
    /// Create a new configuration builder
    ///
    /// # Examples
    /// ```rust
    /// use bgremove_pro::AppConfig;
    ///
    /// let config = AppConfig::builder()
    ///     .max_dimension(800)
    ///     .cache_capacity(4)
    ///     .build()
    ///     .unwrap();
    /// assert_eq!(config.max_dimension, 800);
    /// ```
    #[must_use]
    pub fn builder() -> AppConfigBuilder {
        AppConfigBuilder::default()
    }

    /// Load a configuration from a JSON file; missing fields take their defaults
    ///
    /// # Errors
    /// - File cannot be read
    /// - Invalid JSON
    /// - Validation failures
    pub fn from_json_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let raw = std::fs::read_to_string(path)
            .map_err(|e| BgRemovalError::file_io_error("read config file", path, &e))?;
        let config: Self = serde_json::from_str(&raw).map_err(|e| {
            BgRemovalError::invalid_config(format!(
                "Failed to parse '{}': {}",
                path.display(),
                e
            ))
        })?;
        config.validate()?;
        Ok(config)
    }

    /// Validate all configuration parameters
    ///
    /// # Errors
    /// - `max_dimension` or `cache_capacity` of zero
    /// - Empty download file name
    pub fn validate(&self) -> Result<()> {
        if self.max_dimension == 0 {
            return Err(BgRemovalError::config_value_error(
                "max dimension",
                self.max_dimension,
                "1 or more",
                Some(DEFAULT_MAX_DIMENSION),
            ));
        }

        if self.cache_capacity == 0 {
            return Err(BgRemovalError::config_value_error(
                "cache capacity",
                self.cache_capacity,
                "1 or more",
                Some(DEFAULT_CACHE_CAPACITY),
            ));
        }

        if self.download_file_name.trim().is_empty() {
            return Err(BgRemovalError::invalid_config(
                "download file name must not be empty",
            ));
        }

        Ok(())
    }
}

/// Builder for `AppConfig`
#[derive(Debug, Default)]
pub struct AppConfigBuilder {
    config: AppConfig,
}

impl AppConfigBuilder {
    /// Start from an existing configuration (e.g. one loaded from disk)
    #[must_use]
    pub fn from_config(config: AppConfig) -> Self {
        Self { config }
    }

    #[must_use]
    pub fn max_dimension(mut self, max_dimension: u32) -> Self {
        self.config.max_dimension = max_dimension;
        self
    }

    #[must_use]
    pub fn cache_capacity(mut self, capacity: usize) -> Self {
        self.config.cache_capacity = capacity;
        self
    }

    #[must_use]
    pub fn model(mut self, model: ModelSpec) -> Self {
        self.config.model = model;
        self
    }

    #[must_use]
    pub fn model_dir<P: Into<PathBuf>>(mut self, dir: P) -> Self {
        self.config.model_dir = Some(dir.into());
        self
    }

    #[must_use]
    pub fn backend(mut self, backend: BackendType) -> Self {
        self.config.backend = backend;
        self
    }

    #[must_use]
    pub fn execution_provider(mut self, provider: ExecutionProvider) -> Self {
        self.config.execution_provider = provider;
        self
    }

    #[must_use]
    pub fn intra_threads(mut self, threads: usize) -> Self {
        self.config.intra_threads = threads;
        self
    }

    #[must_use]
    pub fn download_file_name<S: Into<String>>(mut self, name: S) -> Self {
        self.config.download_file_name = name.into();
        self
    }

    /// Build the configuration
    ///
    /// # Errors
    /// - Validation failures, see [`AppConfig::validate`]
    pub fn build(self) -> Result<AppConfig> {
        self.config.validate()?;
        Ok(self.config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::ModelSource;

    #[test]
    fn test_disabled_params_use_fixed_defaults() {
        let params = MattingParams::disabled();
        assert!(!params.alpha_matting);
        assert_eq!(params.foreground_threshold, 240);
        assert_eq!(params.background_threshold, 10);
        assert_eq!(params.erode_size, 10);
        assert_eq!(MattingParams::default(), params);
    }

    #[test]
    fn test_enabled_params_validation() {
        let params = MattingParams::enabled(200, 20, 5).unwrap();
        assert!(params.alpha_matting);
        assert_eq!(
            (params.foreground_threshold, params.background_threshold, params.erode_size),
            (200, 20, 5)
        );

        assert!(MattingParams::enabled(255, 0, 40).is_ok());
        let err = MattingParams::enabled(240, 10, 41).unwrap_err();
        assert!(err.to_string().contains("erode size"));
    }

    #[test]
    fn test_controls_ignore_sliders_when_disabled() {
        let mut controls = MattingControls {
            alpha_matting: false,
            foreground_threshold: 100,
            background_threshold: 50,
            erode_size: 3,
        };
        assert_eq!(controls.params(), MattingParams::disabled());

        controls.alpha_matting = true;
        let params = controls.params();
        assert!(params.alpha_matting);
        assert_eq!(params.foreground_threshold, 100);
        assert_eq!(params.background_threshold, 50);
        assert_eq!(params.erode_size, 3);
    }

    #[test]
    fn test_controls_erode_slider_bounds() {
        let mut controls = MattingControls::default();
        assert!(controls.set_erode_size(40).is_ok());
        assert_eq!(controls.erode_size, 40);
        assert!(controls.set_erode_size(41).is_err());
        assert_eq!(controls.erode_size, 40);
    }

    #[test]
    fn test_app_config_defaults() {
        let config = AppConfig::default();
        assert_eq!(config.max_dimension, 1000);
        assert_eq!(config.cache_capacity, 16);
        assert_eq!(config.download_file_name, "background_removed.png");
        assert_eq!(config.backend, BackendType::Onnx);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_app_config_builder_validation() {
        assert!(AppConfig::builder().max_dimension(0).build().is_err());
        assert!(AppConfig::builder().cache_capacity(0).build().is_err());
        assert!(AppConfig::builder().download_file_name("  ").build().is_err());

        let config = AppConfig::builder()
            .model(ModelSpec {
                source: ModelSource::Cached("u2netp".to_string()),
            })
            .backend(BackendType::Tract)
            .intra_threads(2)
            .build()
            .unwrap();
        assert_eq!(config.backend, BackendType::Tract);
        assert_eq!(config.intra_threads, 2);
    }

    #[test]
    fn test_app_config_json_partial() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.json");
        std::fs::write(&path, r#"{ "max_dimension": 640, "cache_capacity": 2 }"#).unwrap();

        let config = AppConfig::from_json_file(&path).unwrap();
        assert_eq!(config.max_dimension, 640);
        assert_eq!(config.cache_capacity, 2);
        assert_eq!(config.download_file_name, DEFAULT_DOWNLOAD_FILE_NAME);

        std::fs::write(&path, r#"{ "max_dimension": 0 }"#).unwrap();
        assert!(AppConfig::from_json_file(&path).is_err());
    }
}
