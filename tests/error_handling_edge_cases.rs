//! Error conditions, boundary values and degenerate inputs

mod common;

use bgremove_pro::{
    config::{AppConfig, MattingControls, MattingParams, MAX_ERODE_SIZE},
    error::{BgRemovalError, FailureKind, Result},
    models::{ModelManager, ModelSource, ModelSpec},
    BackgroundRemover, NoticeBoard, NoticeLevel, RemovalStatus, SegmentationCapability,
};
use common::{jpeg_bytes, png_bytes, studio_with, RecordingSegmenter};
use std::path::PathBuf;
use std::sync::Arc;
use tempfile::TempDir;

#[test]
fn test_config_validation_edge_cases() -> Result<()> {
    let config = AppConfig::builder()
        .max_dimension(1)
        .cache_capacity(1)
        .build()?;
    assert_eq!(config.max_dimension, 1);
    assert_eq!(config.cache_capacity, 1);

    let error = AppConfig::builder().max_dimension(0).build().unwrap_err();
    assert!(error.to_string().contains("max dimension"));
    assert!(error.to_string().contains("Recommended: 1000"));

    let error = AppConfig::builder().cache_capacity(0).build().unwrap_err();
    assert!(error.to_string().contains("cache capacity"));

    let error = AppConfig::builder()
        .download_file_name("   ")
        .build()
        .unwrap_err();
    assert!(matches!(error, BgRemovalError::InvalidConfig(_)));

    Ok(())
}

#[test]
fn test_config_file_errors() {
    let dir = TempDir::new().unwrap();

    let missing = AppConfig::from_json_file(dir.path().join("missing.json")).unwrap_err();
    assert!(missing.to_string().contains("read config file"));

    let broken = dir.path().join("broken.json");
    std::fs::write(&broken, "{ not json").unwrap();
    let error = AppConfig::from_json_file(&broken).unwrap_err();
    assert!(matches!(error, BgRemovalError::InvalidConfig(_)));

    let invalid = dir.path().join("invalid.json");
    std::fs::write(&invalid, r#"{ "cache_capacity": 0 }"#).unwrap();
    assert!(AppConfig::from_json_file(&invalid).is_err());
}

#[test]
fn test_erode_size_boundaries() {
    assert!(MattingParams::enabled(240, 10, MAX_ERODE_SIZE).is_ok());
    let error = MattingParams::enabled(240, 10, MAX_ERODE_SIZE + 1).unwrap_err();
    assert!(error.to_string().contains("erode size"));
    assert!(error.to_string().contains("0-40"));

    let mut controls = MattingControls::default();
    assert!(controls.set_erode_size(MAX_ERODE_SIZE + 1).is_err());
    assert_eq!(controls.erode_size, 10);

    // Extreme thresholds are legal
    assert!(MattingParams::enabled(0, 255, 0).is_ok());
}

#[test]
fn test_out_of_range_params_fail_open_as_unknown() {
    let segmenter = RecordingSegmenter::new();
    let notices = NoticeBoard::new();
    let remover = BackgroundRemover::new(
        SegmentationCapability::available(segmenter.clone()),
        notices.clone(),
    );
    let image = Arc::new(common::gradient_image(8, 8));
    let params = MattingParams {
        alpha_matting: true,
        foreground_threshold: 240,
        background_threshold: 10,
        erode_size: 99,
    };

    let outcome = remover.remove(&image, params);
    assert_eq!(outcome.status, RemovalStatus::PassedThrough(FailureKind::Unknown));
    assert!(Arc::ptr_eq(&outcome.image, &image));
    assert_eq!(segmenter.calls(), 0);
    assert_eq!(notices.count(NoticeLevel::Error), 1);
}

#[test]
fn test_model_spec_edge_cases() {
    let dir = TempDir::new().unwrap();

    let unknown = ModelSpec {
        source: ModelSource::Cached(String::new()),
    };
    assert!(ModelManager::from_spec(&unknown, Some(dir.path())).is_err());

    let external = ModelSpec {
        source: ModelSource::External(PathBuf::from("/path/with spaces/and.symbols@#$.onnx")),
    };
    assert!(external.source.display_name().contains("and.symbols"));
    let manager = ModelManager::from_spec(&external, None).unwrap();
    assert!(matches!(manager.load_model(), Err(BgRemovalError::Model(_))));
}

#[test]
fn test_error_kinds_cover_fail_open_categories() {
    let cases = [
        (BgRemovalError::decode("bad bytes"), FailureKind::Decode),
        (BgRemovalError::shape("3 channels"), FailureKind::Shape),
        (BgRemovalError::inference("ort failed"), FailureKind::Runtime),
        (BgRemovalError::model("bad graph"), FailureKind::Runtime),
        (BgRemovalError::internal("???"), FailureKind::Unknown),
        (BgRemovalError::TaskBusy, FailureKind::Unknown),
    ];
    for (error, kind) in cases {
        assert_eq!(error.failure_kind(), kind, "{error}");
    }
}

#[test]
fn test_tiny_and_extreme_uploads() {
    let segmenter = RecordingSegmenter::new();
    let mut studio = studio_with(segmenter.clone());

    studio.upload(&png_bytes(1, 1)).unwrap();
    assert_eq!(studio.remove_background().unwrap(), RemovalStatus::Processed);
    assert_eq!(studio.result().unwrap().image.width(), 1);

    // Very wide panorama keeps at least one row
    studio.upload(&jpeg_bytes(3000, 2)).unwrap();
    let image = studio.image().unwrap();
    assert_eq!((image.width(), image.height()), (1000, 1));
}

#[test]
fn test_empty_and_truncated_uploads() {
    let mut studio = studio_with(RecordingSegmenter::new());

    assert!(matches!(studio.upload(&[]), Err(BgRemovalError::Decode(_))));

    let mut png = png_bytes(20, 20);
    png.truncate(png.len() / 3);
    assert!(matches!(studio.upload(&png), Err(BgRemovalError::Decode(_))));

    assert!(studio.image().is_none());
    assert_eq!(studio.notice_board().count(NoticeLevel::Error), 2);
}
