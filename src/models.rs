//! Model specification, registry of known segmentation models and model loading

use crate::error::{BgRemovalError, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Name of the model used when nothing else is configured
pub const DEFAULT_MODEL_NAME: &str = "u2net";

/// Directory under the home directory where models are cached
const MODEL_HOME_DIR: &str = ".u2net";

/// Model source specification
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum ModelSource {
    /// Known model cached by name in the model directory
    Cached(String),
    /// External model from filesystem path
    External(PathBuf),
}

impl ModelSource {
    /// Get a display name for tracing and logging
    #[must_use]
    pub fn display_name(&self) -> String {
        match self {
            ModelSource::Cached(name) => format!("cached:{}", name),
            ModelSource::External(path) => format!(
                "external:{}",
                path.file_name().unwrap_or_default().to_string_lossy()
            ),
        }
    }
}

/// Model specification
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ModelSpec {
    pub source: ModelSource,
}

impl Default for ModelSpec {
    fn default() -> Self {
        Self {
            source: ModelSource::Cached(DEFAULT_MODEL_NAME.to_string()),
        }
    }
}

/// Input preprocessing expected by a model
#[derive(Debug, Clone, PartialEq)]
pub struct PreprocessingConfig {
    /// Square input edge length in pixels
    pub target_size: u32,
    pub normalization_mean: [f32; 3],
    pub normalization_std: [f32; 3],
}

/// Model information and metadata
#[derive(Debug, Clone)]
pub struct ModelInfo {
    pub name: String,
    pub size_bytes: usize,
    pub input_shape: (usize, usize, usize, usize), // NCHW format
    pub output_shape: (usize, usize, usize, usize),
}

/// Segmentation models with a published download location
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct KnownModel {
    pub name: &'static str,
    pub url: &'static str,
    pub input_size: u32,
    pub mean: [f32; 3],
    pub std: [f32; 3],
}

const IMAGENET_MEAN: [f32; 3] = [0.485, 0.456, 0.406];
const IMAGENET_STD: [f32; 3] = [0.229, 0.224, 0.225];

pub const KNOWN_MODELS: &[KnownModel] = &[
    KnownModel {
        name: "u2net",
        url: "https://github.com/danielgatis/rembg/releases/download/v0.0.0/u2net.onnx",
        input_size: 320,
        mean: IMAGENET_MEAN,
        std: IMAGENET_STD,
    },
    KnownModel {
        name: "u2netp",
        url: "https://github.com/danielgatis/rembg/releases/download/v0.0.0/u2netp.onnx",
        input_size: 320,
        mean: IMAGENET_MEAN,
        std: IMAGENET_STD,
    },
    KnownModel {
        name: "silueta",
        url: "https://github.com/danielgatis/rembg/releases/download/v0.0.0/silueta.onnx",
        input_size: 320,
        mean: IMAGENET_MEAN,
        std: IMAGENET_STD,
    },
    KnownModel {
        name: "isnet-general-use",
        url: "https://github.com/danielgatis/rembg/releases/download/v0.0.0/isnet-general-use.onnx",
        input_size: 1024,
        mean: [0.5, 0.5, 0.5],
        std: [1.0, 1.0, 1.0],
    },
];

impl KnownModel {
    /// Look up a known model by name
    #[must_use]
    pub fn find(name: &str) -> Option<&'static KnownModel> {
        KNOWN_MODELS.iter().find(|model| model.name == name)
    }

    #[must_use]
    pub fn preprocessing_config(&self) -> PreprocessingConfig {
        PreprocessingConfig {
            target_size: self.input_size,
            normalization_mean: self.mean,
            normalization_std: self.std,
        }
    }
}

/// Default model directory (`~/.u2net`)
///
/// # Errors
/// - Home directory cannot be determined
pub fn default_model_dir() -> Result<PathBuf> {
    dirs::home_dir()
        .map(|home| home.join(MODEL_HOME_DIR))
        .ok_or_else(|| {
            BgRemovalError::invalid_config(
                "Failed to determine home directory. Set model_dir in the configuration.",
            )
        })
}

/// Resolves a [`ModelSpec`] to a file and loads it
#[derive(Debug, Clone)]
pub struct ModelManager {
    path: PathBuf,
    name: String,
    preprocessing: PreprocessingConfig,
}

impl ModelManager {
    /// Resolve a model specification against a model directory
    ///
    /// External models are assumed to share the `u2net` input layout.
    ///
    /// # Errors
    /// - Unknown cached model name
    /// - Home directory unavailable when `model_dir` is `None`
    pub fn from_spec(spec: &ModelSpec, model_dir: Option<&Path>) -> Result<Self> {
        match &spec.source {
            ModelSource::Cached(name) => {
                let known = KnownModel::find(name).ok_or_else(|| {
                    BgRemovalError::model(format!(
                        "Unknown model '{}'. Known models: {}",
                        name,
                        KNOWN_MODELS
                            .iter()
                            .map(|m| m.name)
                            .collect::<Vec<_>>()
                            .join(", ")
                    ))
                })?;
                let dir = match model_dir {
                    Some(dir) => dir.to_path_buf(),
                    None => default_model_dir()?,
                };
                Ok(Self {
                    path: dir.join(format!("{}.onnx", known.name)),
                    name: known.name.to_string(),
                    preprocessing: known.preprocessing_config(),
                })
            },
            ModelSource::External(path) => {
                let fallback = KnownModel::find(DEFAULT_MODEL_NAME).ok_or_else(|| {
                    BgRemovalError::internal("default model missing from registry")
                })?;
                Ok(Self {
                    path: path.clone(),
                    name: spec.source.display_name(),
                    preprocessing: fallback.preprocessing_config(),
                })
            },
        }
    }

    /// Path of the ONNX file
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Load model data as bytes
    ///
    /// # Errors
    /// - Model file missing or unreadable
    pub fn load_model(&self) -> Result<Vec<u8>> {
        if !self.path.exists() {
            return Err(BgRemovalError::model(format!(
                "Model file '{}' not found. Run with --download-model to fetch it.",
                self.path.display()
            )));
        }
        std::fs::read(&self.path)
            .map_err(|e| BgRemovalError::file_io_error("read model file", &self.path, &e))
    }

    #[must_use]
    pub fn preprocessing_config(&self) -> PreprocessingConfig {
        self.preprocessing.clone()
    }

    /// Model information for a loaded model of `size_bytes`
    #[must_use]
    pub fn info(&self, size_bytes: usize) -> ModelInfo {
        let edge = self.preprocessing.target_size as usize;
        ModelInfo {
            name: self.name.clone(),
            size_bytes,
            input_shape: (1, 3, edge, edge),
            output_shape: (1, 1, edge, edge),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_known_model_lookup() {
        let u2net = KnownModel::find("u2net").unwrap();
        assert_eq!(u2net.input_size, 320);
        assert!(u2net.url.ends_with("u2net.onnx"));

        let isnet = KnownModel::find("isnet-general-use").unwrap();
        assert_eq!(isnet.preprocessing_config().target_size, 1024);

        assert!(KnownModel::find("does-not-exist").is_none());
    }

    #[test]
    fn test_manager_resolves_cached_model_path() {
        let dir = tempfile::tempdir().unwrap();
        let manager = ModelManager::from_spec(&ModelSpec::default(), Some(dir.path())).unwrap();
        assert_eq!(manager.path(), dir.path().join("u2net.onnx"));
        assert_eq!(manager.name(), "u2net");
        assert_eq!(manager.info(10).input_shape, (1, 3, 320, 320));
    }

    #[test]
    fn test_manager_rejects_unknown_model() {
        let spec = ModelSpec {
            source: ModelSource::Cached("mystery".to_string()),
        };
        let err = ModelManager::from_spec(&spec, Some(Path::new("/tmp"))).unwrap_err();
        assert!(err.to_string().contains("Unknown model 'mystery'"));
    }

    #[test]
    fn test_missing_model_file_is_model_error() {
        let dir = tempfile::tempdir().unwrap();
        let manager = ModelManager::from_spec(&ModelSpec::default(), Some(dir.path())).unwrap();
        let err = manager.load_model().unwrap_err();
        assert!(matches!(err, BgRemovalError::Model(_)));
    }

    #[test]
    fn test_display_names() {
        assert_eq!(
            ModelSource::Cached("u2netp".to_string()).display_name(),
            "cached:u2netp"
        );
        assert_eq!(
            ModelSource::External(PathBuf::from("/models/custom.onnx")).display_name(),
            "external:custom.onnx"
        );
    }
}
