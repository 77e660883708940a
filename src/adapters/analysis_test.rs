use std::sync::Arc;

use super::*;
use crate::camera::fake::{camera, wait_until};
use crate::config::SourceConfig;
use crate::target::{MemoryTarget, TargetKind};

#[test]
fn test_analyze_builds_planar_frame() {
    let t = camera(SourceConfig::default());
    let adapter = AnalysisAdapter::new(t.camera.clone());

    let frame = adapter.analyze(64, 32, 1_234_000).expect("frame");
    assert_eq!(frame.size, Size::new(64, 32));
    assert_eq!(frame.timestamp_ns, 1_234_000);
    assert_eq!((frame.y.row_stride, frame.y.pixel_stride), (64, 1));
    assert_eq!((frame.u.row_stride, frame.u.pixel_stride), (32, 1));
    assert_eq!((frame.v.row_stride, frame.v.pixel_stride), (32, 1));
    assert_eq!(frame.y.data.len(), 64 * 32);
    assert_eq!(frame.u.data.len(), 32 * 16);
    assert_eq!(frame.v.data.len(), 32 * 16);

    let snapshot = t.camera.diagnostics().snapshot();
    assert_eq!(snapshot.active_path, "Analysis");
    assert_eq!(snapshot.pixel_format.as_deref(), Some("YUV_420_888"));
}

#[test]
fn test_analyze_falls_through_when_disabled() {
    let t = camera(SourceConfig {
        enabled: false,
        ..Default::default()
    });
    let adapter = AnalysisAdapter::new(t.camera.clone());
    assert!(adapter.analyze(64, 32, 0).is_none());
}

#[test]
fn test_take_picture_size() {
    let t = camera(SourceConfig {
        scale_mode: crate::config::ScaleMode::CenterCrop,
        ..Default::default()
    });
    let adapter = AnalysisAdapter::new(t.camera.clone());

    let frame = adapter.take_picture().expect("frame");
    assert_eq!(frame.size, DEFAULT_CAPTURE_SIZE);
    assert!(frame.timestamp_ns > 0);

    t.settings.update(|c| {
        c.manual_width = 320;
        c.manual_height = 240;
    });
    assert_eq!(adapter.take_picture().expect("frame").size, Size::new(320, 240));
}

#[test]
fn test_provide_surface_requires_injection() {
    let t = camera(SourceConfig::default());
    let adapter = AnalysisAdapter::new(t.camera.clone());
    let surface: Arc<dyn DeliveryTarget> = Arc::new(MemoryTarget::new(Size::new(16, 16)));
    assert!(adapter.provide_surface(surface).is_none());
}

#[test]
fn test_provide_surface_paints_and_unbinds() {
    let t = camera(SourceConfig {
        inject_preview: true,
        ..Default::default()
    });
    let adapter = AnalysisAdapter::new(t.camera.clone());
    let surface = Arc::new(MemoryTarget::new(Size::new(32, 18)));

    let placeholder = adapter.provide_surface(surface.clone()).expect("placeholder");
    assert_eq!(placeholder.kind(), TargetKind::Placeholder);
    assert!(wait_until(|| surface.posts() > 0));
    assert!(wait_until(|| {
        t.camera.diagnostics().snapshot().preview_size == Some(DEFAULT_CAPTURE_SIZE)
    }));

    adapter.unbind();
    assert_eq!(t.camera.scheduler().active_count(), 0);
    assert!(!surface.is_released());
}
