//! Background Remover Pro
//!
//! Terminal front-end for interactive background removal with alpha matting.

#[cfg(feature = "cli")]
use bgremove_pro::cli;

#[cfg(feature = "cli")]
#[tokio::main]
async fn main() -> anyhow::Result<()> {
    cli::main().await
}

#[cfg(not(feature = "cli"))]
fn main() {
    eprintln!("CLI feature not enabled. Please rebuild with --features cli");
    std::process::exit(1);
}
