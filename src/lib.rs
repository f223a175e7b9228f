#![allow(clippy::too_many_lines)]
#![allow(clippy::missing_errors_doc)]
#![allow(clippy::missing_panics_doc)]
#![allow(clippy::uninlined_format_args)]
#![allow(clippy::unused_async)]

//! # Background Remover Pro
//!
//! Interactive background removal built on U²-Net style salient object
//! segmentation, with optional alpha matting, memoized results and PNG download.
//!
//! ## Features
//!
//! - **Segmentation Models**: `u2net`, `u2netp`, `silueta` and `isnet-general-use`
//! - **Multiple Backends**: ONNX Runtime (GPU acceleration) and Tract (Pure Rust)
//! - **Alpha Matting**: trimap, guided-filter alpha estimation and Blur-Fusion foreground
//! - **Fail-Open Removal**: segmentation faults return the original image with a notice
//! - **Result Caching**: LRU cache keyed by image content and matting parameters
//! - **Interactive Session**: `Studio` state machine behind the terminal front-end
//! - **CLI Integration**: Optional command-line interface (enable with `cli` feature)
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use bgremove_pro::{AppConfig, DefaultBackendFactory, SegmentationCapability, Studio};
//!
//! # fn example() -> anyhow::Result<()> {
//! let config = AppConfig::builder().max_dimension(1000).build()?;
//!
//! // Never fails: a missing model degrades the session instead
//! let capability = SegmentationCapability::initialize(&config, &DefaultBackendFactory);
//! let mut studio = Studio::new(capability, config);
//!
//! studio.upload(&std::fs::read("input.jpg")?)?;
//! studio.set_alpha_matting(true);
//! let status = studio.remove_background()?;
//! println!("removal {status}");
//!
//! let download = studio.download()?;
//! std::fs::write(&download.file_name, &download.bytes)?;
//! # Ok(())
//! # }
//! ```
//!
//! ### Feature Flags
//!
//! - `onnx` (default): ONNX Runtime backend with GPU acceleration support
//! - `tract`: Pure Rust backend
//! - `cli` (default): Terminal front-end, spinner and tracing subscriber
//! - `tracing-json`: JSON log output for the front-end
//!
//! ### Library-Only Usage
//!
//! ```toml
//! [dependencies]
//! bgremove-pro = { version = "0.1", default-features = false, features = ["onnx"] }
//! ```

pub mod backends;
pub mod cache;
#[cfg(feature = "cli")]
pub mod cli;
pub mod config;
pub mod download;
pub mod error;
pub mod inference;
pub mod matting;
pub mod models;
pub mod notice;
pub mod remover;
pub mod resize;
pub mod runner;
pub mod segmentation;
pub mod services;
pub mod studio;
#[cfg(feature = "cli")]
pub mod tracing_config;
pub mod utils;

// Public API exports
pub use cache::{format_size, CacheKey, CacheStats, CachedRemover, ResultCache};
pub use config::{
    AppConfig, AppConfigBuilder, BackendType, ExecutionProvider, MattingControls, MattingParams,
};
pub use download::{validate_model_url, DownloadedModel, ModelDownloader};
pub use error::{BgRemovalError, FailureKind, Result};
pub use inference::InferenceBackend;
pub use models::{KnownModel, ModelManager, ModelSource, ModelSpec, KNOWN_MODELS};
pub use notice::{Notice, NoticeBoard, NoticeLevel};
pub use remover::{BackgroundRemover, RemovalOutcome, RemovalStatus};
pub use resize::fit_within;
pub use runner::TaskRunner;
pub use segmentation::{
    BackendFactory, DefaultBackendFactory, ModelSession, SegmentationCapability, Segmenter,
};
pub use services::ImageIOService;
pub use studio::{Download, Studio, StudioState};

#[cfg(feature = "cli")]
pub use tracing_config::{init_cli_tracing, TracingConfig, TracingFormat};
