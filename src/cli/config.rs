//! Conversion from command-line arguments to library configuration

use crate::cli::main_impl::Cli;
use crate::{
    config::{AppConfig, AppConfigBuilder, BackendType, ExecutionProvider, MattingControls},
    error::{BgRemovalError, Result},
    models::{ModelSource, ModelSpec},
};
use std::path::PathBuf;

/// Builds [`AppConfig`] and the initial matting controls from [`Cli`]
pub(crate) struct CliConfigBuilder;

impl CliConfigBuilder {
    /// Merge the optional JSON config file with command-line overrides
    pub(crate) fn from_cli(cli: &Cli) -> Result<AppConfig> {
        let base = match &cli.config {
            Some(path) => AppConfig::from_json_file(path)?,
            None => AppConfig::default(),
        };
        let mut builder = AppConfigBuilder::from_config(base);

        let (backend, provider) = parse_provider_string(&cli.execution_provider)?;
        builder = builder.backend(backend).execution_provider(provider);

        if let Some(model) = &cli.model {
            builder = builder.model(parse_model_arg(model));
        }
        if let Some(dir) = &cli.model_dir {
            builder = builder.model_dir(dir.clone());
        }
        if let Some(max_dimension) = cli.max_dimension {
            builder = builder.max_dimension(max_dimension);
        }
        if let Some(capacity) = cli.cache_capacity {
            builder = builder.cache_capacity(capacity);
        }
        if let Some(threads) = cli.threads {
            builder = builder.intra_threads(threads);
        }

        builder.build()
    }

    /// Initial slider and checkbox positions
    pub(crate) fn controls(cli: &Cli) -> Result<MattingControls> {
        let mut controls = MattingControls {
            alpha_matting: cli.alpha_matting,
            foreground_threshold: cli.foreground_threshold,
            background_threshold: cli.background_threshold,
            ..MattingControls::default()
        };
        controls.set_erode_size(cli.erode_size)?;
        Ok(controls)
    }
}

/// Parse `backend:provider` (e.g. `onnx:auto`, `tract:cpu`) or a bare backend name
pub(crate) fn parse_provider_string(provider_str: &str) -> Result<(BackendType, ExecutionProvider)> {
    let Some((backend, provider)) = provider_str.split_once(':') else {
        return match provider_str {
            "onnx" => Ok((BackendType::Onnx, ExecutionProvider::Auto)),
            "tract" => Ok((BackendType::Tract, ExecutionProvider::Cpu)),
            _ => Err(BgRemovalError::invalid_config(
                "Invalid provider format. Use backend:provider (e.g., onnx:auto, tract:cpu)",
            )),
        };
    };

    match backend {
        "onnx" => {
            let execution_provider = match provider {
                "auto" => ExecutionProvider::Auto,
                "cpu" => ExecutionProvider::Cpu,
                "cuda" => ExecutionProvider::Cuda,
                "coreml" => ExecutionProvider::CoreMl,
                _ => {
                    return Err(BgRemovalError::invalid_config(format!(
                        "Unknown ONNX provider: {provider}. Supported: auto, cpu, cuda, coreml"
                    )));
                },
            };
            Ok((BackendType::Onnx, execution_provider))
        },
        "tract" => match provider {
            "cpu" => Ok((BackendType::Tract, ExecutionProvider::Cpu)),
            _ => Err(BgRemovalError::invalid_config(format!(
                "Unknown Tract provider: {provider}. Tract only supports 'cpu'"
            ))),
        },
        _ => Err(BgRemovalError::invalid_config(format!(
            "Unknown backend: {backend}. Supported backends: onnx, tract"
        ))),
    }
}

/// A path to an `.onnx` file is an external model, anything else a known name
pub(crate) fn parse_model_arg(model: &str) -> ModelSpec {
    let looks_like_path = std::path::Path::new(model)
        .extension()
        .is_some_and(|ext| ext.eq_ignore_ascii_case("onnx"))
        || model.contains(std::path::MAIN_SEPARATOR)
        || model.contains('/');

    let source = if looks_like_path {
        ModelSource::External(PathBuf::from(model))
    } else {
        ModelSource::Cached(model.to_string())
    };
    ModelSpec { source }
}
