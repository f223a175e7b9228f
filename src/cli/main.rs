//! Background Remover Pro terminal front-end
//!
//! One-shot mode runs upload, removal and download for a single image.
//! Interactive mode opens a command shell over the same session.

use super::{
    config::CliConfigBuilder,
    render,
    shell::{self, Session},
};
use crate::{
    config::{AppConfig, BackendType, MAX_ERODE_SIZE},
    download::ModelDownloader,
    models::ModelSource,
    segmentation::{BackendFactory, DefaultBackendFactory, SegmentationCapability},
    studio::Studio,
    tracing_config::{init_cli_tracing, spans, TracingFormat},
};
use anyhow::{Context, Result};
use clap::{Parser, ValueEnum};
use std::path::PathBuf;
use instant::Instant;
use tracing::{info, warn, Instrument};

/// Remove image backgrounds with optional alpha matting
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
#[command(name = "bgremove-pro")]
#[allow(clippy::struct_excessive_bools)]
pub struct Cli {
    /// Input JPEG or PNG image
    #[arg(
        value_name = "INPUT",
        required_unless_present_any = &["interactive", "download_model", "show_providers"]
    )]
    pub input: Option<PathBuf>,

    /// Directory the result is saved to [default: current directory]
    #[arg(short, long, value_name = "DIR")]
    pub output_dir: Option<PathBuf>,

    /// Enable alpha matting
    #[arg(long)]
    pub alpha_matting: bool,

    /// Alpha matting foreground threshold
    #[arg(long, default_value_t = 240, value_parser = clap::value_parser!(u8))]
    pub foreground_threshold: u8,

    /// Alpha matting background threshold
    #[arg(long, default_value_t = 10, value_parser = clap::value_parser!(u8))]
    pub background_threshold: u8,

    /// Alpha matting erode size
    #[arg(
        long,
        default_value_t = 10,
        value_parser = clap::value_parser!(u8).range(0..=i64::from(MAX_ERODE_SIZE))
    )]
    pub erode_size: u8,

    /// Execution provider in format backend:provider (e.g., onnx:auto, onnx:coreml, tract:cpu)
    #[arg(short, long, default_value = "onnx:auto")]
    pub execution_provider: String,

    /// Known model name (u2net, u2netp, silueta, isnet-general-use) or path to an .onnx file
    #[arg(short, long)]
    pub model: Option<String>,

    /// Directory holding downloaded models [default: ~/.u2net]
    #[arg(long, value_name = "PATH")]
    pub model_dir: Option<PathBuf>,

    /// Download the selected known model if it is missing
    #[arg(long)]
    pub download_model: bool,

    /// Longest side uploads are resized down to
    #[arg(long, value_parser = clap::value_parser!(u32).range(1..))]
    pub max_dimension: Option<u32>,

    /// Number of removal results kept in memory
    #[arg(long)]
    pub cache_capacity: Option<usize>,

    /// Number of inference threads (0 = auto-detect)
    #[arg(short, long)]
    pub threads: Option<usize>,

    /// JSON configuration file; flags override its values
    #[arg(long, value_name = "PATH")]
    pub config: Option<PathBuf>,

    /// Open the interactive shell
    #[arg(short, long)]
    pub interactive: bool,

    /// Show execution provider diagnostics and exit
    #[arg(long)]
    pub show_providers: bool,

    /// Enable verbose logging (-v: INFO, -vv: DEBUG, -vvv: TRACE)
    #[arg(short, long, action = clap::ArgAction::Count)]
    pub verbose: u8,

    /// Log output format
    #[arg(long, value_enum, default_value_t = CliLogFormat::Console)]
    pub log_format: CliLogFormat,
}

#[derive(Copy, Clone, PartialEq, Eq, ValueEnum, Debug)]
pub enum CliLogFormat {
    Console,
    Compact,
    #[cfg(feature = "tracing-json")]
    Json,
}

impl From<CliLogFormat> for TracingFormat {
    fn from(format: CliLogFormat) -> Self {
        match format {
            CliLogFormat::Console => Self::Console,
            CliLogFormat::Compact => Self::Compact,
            #[cfg(feature = "tracing-json")]
            CliLogFormat::Json => Self::Json,
        }
    }
}

pub async fn main() -> Result<()> {
    let cli = Cli::parse();

    let session_id = init_cli_tracing(cli.verbose, cli.log_format.into())
        .context("Failed to initialize tracing")?;

    if cli.show_providers {
        show_provider_diagnostics();
        return Ok(());
    }

    let config = CliConfigBuilder::from_cli(&cli).context("Invalid configuration")?;
    let controls = CliConfigBuilder::controls(&cli).context("Invalid matting options")?;

    if cli.download_model {
        download_model(&config).await;
        if cli.input.is_none() && !cli.interactive {
            return Ok(());
        }
    }

    render::title();

    let capability = initialize_capability(config.clone()).await?;
    let model_name = capability
        .segmenter()
        .map_or_else(|| "unavailable".to_string(), |s| s.name().to_string());
    let span = spans::session(&session_id, &model_name, &config.backend.to_string());

    let mut studio = Studio::new(capability, config);
    studio
        .set_controls(controls)
        .context("Invalid matting options")?;
    let session = Session::new(studio, cli.output_dir.clone());

    if cli.interactive {
        if let Some(input) = &cli.input {
            warn!(input = %input.display(), "Input is ignored in interactive mode; use 'open'");
        }
        shell::run(session).instrument(span).await
    } else {
        let input = cli
            .input
            .clone()
            .context("An input image is required outside interactive mode")?;
        run_once(session, input).instrument(span).await
    }
}

/// Load the model off the async runtime; never fails on a missing model
async fn initialize_capability(config: AppConfig) -> Result<SegmentationCapability> {
    tokio::task::spawn_blocking(move || {
        let start = Instant::now();
        let capability = SegmentationCapability::initialize(&config, &DefaultBackendFactory);
        info!(
            available = capability.is_available(),
            elapsed_ms = start.elapsed().as_millis(),
            "Segmentation capability initialized"
        );
        capability
    })
    .await
    .context("Model loading task failed")
}

async fn run_once(mut session: Session, input: PathBuf) -> Result<()> {
    if !session.open(&input).await {
        anyhow::bail!("Could not open {}", input.display());
    }

    session
        .remove()
        .context("Background removal did not complete")?;
    session.save(None).await?;
    Ok(())
}

/// Fetch the configured known model; failures leave the session degraded
async fn download_model(config: &AppConfig) {
    let ModelSource::Cached(name) = &config.model.source else {
        println!("⚠️  --download-model only applies to known models; using the configured file");
        return;
    };

    let downloader = match ModelDownloader::new(config.model_dir.as_deref()) {
        Ok(downloader) => downloader,
        Err(e) => {
            println!("⚠️  Model download unavailable: {e}");
            return;
        },
    };

    let destination = downloader.model_dir().join(format!("{name}.onnx"));
    let span = spans::download(name, &destination);
    match downloader.download_known(name, true).instrument(span).await {
        Ok(model) => match model.sha256 {
            Some(hash) => println!(
                "✅ Downloaded {} to {} (sha256 {})",
                model.name,
                model.path.display(),
                hash
            ),
            None => println!("✅ Model {} already present at {}", model.name, model.path.display()),
        },
        Err(e) => println!("⚠️  Model download failed: {e}"),
    }
}

fn show_provider_diagnostics() {
    println!("🔍 Backend and Execution Provider Diagnostics");

    let cpu_count = std::thread::available_parallelism()
        .map(std::num::NonZeroUsize::get)
        .unwrap_or(1);
    println!("💻 System: {cpu_count} CPU cores detected");

    println!("\n🔧 Compiled Backends:");
    for backend in DefaultBackendFactory.available_backends() {
        println!("  • {backend}");
        for (name, available, description) in providers_for(backend) {
            let status = if available {
                "✅ Available"
            } else {
                "❌ Not Available"
            };
            println!("      {name}: {status} - {description}");
        }
    }

    println!("\n💡 Usage Examples:");
    println!("  --execution-provider onnx:auto    # Auto-select best ONNX provider (default)");
    println!("  --execution-provider onnx:coreml  # Use Apple CoreML (macOS)");
    println!("  --execution-provider onnx:cuda    # Use NVIDIA CUDA");
    println!("  --execution-provider tract:cpu    # Use pure Rust Tract backend");
}

fn providers_for(backend: BackendType) -> Vec<(String, bool, String)> {
    match backend {
        #[cfg(feature = "onnx")]
        BackendType::Onnx => crate::backends::OnnxBackend::list_providers(),
        #[cfg(feature = "tract")]
        BackendType::Tract => crate::backends::TractBackend::list_providers(),
        #[allow(unreachable_patterns)]
        _ => Vec::new(),
    }
}
