//! Terminal rendering of the session: title, panels, banners and status

use crate::{
    notice::{NoticeBoard, NoticeLevel},
    studio::{Studio, StudioState},
};
use indicatif::{ProgressBar, ProgressStyle};
use instant::Duration;

pub(crate) const APP_TITLE: &str = "🖼️  Background Remover Pro";
pub(crate) const APP_TAGLINE: &str = "Upload an image and remove its background with ease!";

pub(crate) const ABOUT_TEXT: &str = "This app uses a U²-Net segmentation model to quickly remove \
backgrounds from images. Open an image, adjust the settings if needed, and run 'remove' to see the result.";

pub(crate) const TIPS: &[&str] = &[
    "For faster processing, use images under 1000x1000 pixels.",
    "Disable Alpha Matting for quicker results on simple images.",
    "For complex images, enable Alpha Matting and adjust the sliders.",
];

pub(crate) const PROCESSING_MESSAGE: &str = "Processing image...";

pub(crate) fn title() {
    println!("{APP_TITLE}");
    println!("{APP_TAGLINE}");
    println!();
}

pub(crate) fn about() {
    println!("About");
    println!("  {ABOUT_TEXT}");
    println!();
    println!("Tips");
    for tip in TIPS {
        println!("  • {tip}");
    }
}

/// Prints notices that were not shown yet
#[derive(Debug, Default)]
pub(crate) struct NoticeCursor {
    shown: usize,
}

impl NoticeCursor {
    pub(crate) fn render(&mut self, board: &NoticeBoard) {
        let (fresh, next) = board.since(self.shown);
        for notice in fresh {
            match notice.level {
                NoticeLevel::Info => println!("ℹ️  {}", notice.message),
                NoticeLevel::Warning => println!("⚠️  {}", notice.message),
                NoticeLevel::Error => eprintln!("❌ {}", notice.message),
            }
        }
        self.shown = next;
    }
}

/// Steadily ticking spinner shown while the worker runs
pub(crate) fn processing_spinner() -> ProgressBar {
    let spinner = ProgressBar::new_spinner();
    if let Ok(style) = ProgressStyle::default_spinner().template("{spinner:.green} {msg}") {
        spinner.set_style(style);
    }
    spinner.set_message(PROCESSING_MESSAGE);
    spinner.enable_steady_tick(Duration::from_millis(100));
    spinner
}

pub(crate) fn original_image(studio: &Studio) {
    let (Some((width, height)), Some(image)) = (studio.uploaded_dimensions(), studio.image())
    else {
        return;
    };
    if (width, height) == (image.width(), image.height()) {
        println!("Original Image: {width}x{height}");
    } else {
        println!(
            "Original Image: {width}x{height} (resized to {}x{})",
            image.width(),
            image.height()
        );
    }
}

pub(crate) fn status(studio: &Studio) {
    let controls = studio.controls();
    println!("State: {}", studio.state());
    match studio.model_name() {
        Some(name) => println!("Model: {name}"),
        None => println!("Model: unavailable"),
    }
    match studio.state() {
        StudioState::Idle => println!("Image: none"),
        _ => original_image(studio),
    }
    if let Some(result) = studio.result() {
        println!("Result: {}", result.status);
    }

    println!("Advanced Options");
    println!(
        "  Alpha Matting: {}",
        if controls.alpha_matting { "on" } else { "off" }
    );
    if controls.alpha_matting {
        println!("  Foreground Threshold: {}", controls.foreground_threshold);
        println!("  Background Threshold: {}", controls.background_threshold);
        println!("  Erode Size: {}", controls.erode_size);
    }

    let stats = studio.cache_stats();
    println!(
        "Cache: {} result(s), {} hit(s), {} miss(es), {:.1}% hit ratio",
        studio.cached_results(),
        stats.hits,
        stats.misses,
        stats.hit_ratio()
    );
}
