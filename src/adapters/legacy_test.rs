use std::sync::Arc;

use super::*;
use crate::camera::fake::{camera, wait_until};
use crate::config::SourceConfig;
use crate::media::convert::nv21_len;
use crate::target::{MemoryTarget, TargetKind};

#[test]
fn test_deliver_preview_reuses_matching_buffer() {
    let t = camera(SourceConfig::default());
    let adapter = LegacyAdapter::new(t.camera.clone());

    let mut buffer = vec![0u8; nv21_len(Size::new(64, 32))];
    let before = buffer.as_ptr();
    assert!(adapter.deliver_preview(&mut buffer, 64, 32));
    assert_eq!(buffer.as_ptr(), before);
    assert!(buffer.iter().any(|&b| b != 0));
    assert_eq!(
        t.camera.sessions().size(adapter.handle()),
        Some(Size::new(64, 32))
    );
}

#[test]
fn test_deliver_preview_replaces_mismatched_buffer() {
    let t = camera(SourceConfig::default());
    let adapter = LegacyAdapter::new(t.camera.clone());

    let mut buffer = vec![0u8; 10];
    assert!(adapter.deliver_preview(&mut buffer, 64, 32));
    assert_eq!(buffer.len(), nv21_len(Size::new(64, 32)));
    assert_eq!(t.camera.diagnostics().snapshot().active_path, "Legacy");
}

#[test]
fn test_disabled_leaves_preview_alone() {
    let t = camera(SourceConfig {
        enabled: false,
        ..Default::default()
    });
    let adapter = LegacyAdapter::new(t.camera.clone());

    let mut buffer = vec![7u8; 16];
    assert!(!adapter.deliver_preview(&mut buffer, 4, 2));
    assert_eq!(buffer, vec![7u8; 16]);
    let texture: Arc<dyn DeliveryTarget> = Arc::new(MemoryTarget::new(Size::new(8, 8)));
    assert!(adapter.set_preview_texture(Some(texture)).is_none());
    assert!(adapter.take_picture().is_none());
}

#[test]
fn test_preview_texture_is_painted_behind_placeholder() {
    let t = camera(SourceConfig::default());
    let adapter = LegacyAdapter::new(t.camera.clone());
    adapter.set_preview_size(64, 32);

    let texture = Arc::new(MemoryTarget::new(Size::new(64, 32)));
    let placeholder = adapter
        .set_preview_texture(Some(texture.clone()))
        .expect("placeholder");
    assert_eq!(placeholder.kind(), TargetKind::Placeholder);
    assert!(wait_until(|| texture.posts() > 0));
    assert!(t.camera.sessions().is_owned(adapter.handle()));

    // the same placeholder is handed out again
    let again = adapter
        .set_preview_texture(Some(texture.clone()))
        .expect("placeholder");
    assert!(Arc::ptr_eq(&placeholder, &again));
}

#[test]
fn test_replacing_texture_releases_owned_one() {
    let t = camera(SourceConfig::default());
    let adapter = LegacyAdapter::new(t.camera.clone());

    let first = Arc::new(MemoryTarget::new(Size::new(16, 16)));
    adapter.set_preview_texture(Some(first.clone()));
    let display = Arc::new(MemoryTarget::new(Size::new(16, 16)));
    adapter.set_preview_display(Some(display.clone()));

    assert!(first.is_released());
    assert!(!t.camera.sessions().is_owned(adapter.handle()));
    assert!(wait_until(|| display.posts() > 0));

    // clearing the display does not release what the app owns
    adapter.set_preview_display(None);
    assert!(!display.is_released());
    assert!(!t.camera.sessions().contains(adapter.handle()));
}

#[test]
fn test_stop_and_start_preview() {
    let t = camera(SourceConfig::default());
    let adapter = LegacyAdapter::new(t.camera.clone());
    let texture = Arc::new(MemoryTarget::new(Size::new(16, 16)));
    adapter.set_preview_texture(Some(texture.clone()));
    assert!(wait_until(|| texture.posts() > 0));

    adapter.stop_preview();
    let posts = texture.posts();
    std::thread::sleep(std::time::Duration::from_millis(50));
    assert_eq!(texture.posts(), posts);

    assert!(adapter.start_preview());
    assert!(wait_until(|| texture.posts() > posts));
}

#[test]
fn test_take_picture_sizes() {
    let t = camera(SourceConfig::default());
    let adapter = LegacyAdapter::new(t.camera.clone());

    let jpeg = adapter.take_picture().expect("jpeg");
    assert_eq!(&jpeg[..2], &[0xFF, 0xD8]);
    assert_eq!(
        t.camera.diagnostics().snapshot().preview_size,
        Some(DEFAULT_CAPTURE_SIZE)
    );

    adapter.set_picture_size(320, 240);
    adapter.take_picture().expect("jpeg");
    assert_eq!(
        t.camera.diagnostics().snapshot().preview_size,
        Some(Size::new(320, 240))
    );
}

#[test]
fn test_release_tears_down() {
    let t = camera(SourceConfig::default());
    let adapter = LegacyAdapter::new(t.camera.clone());
    let texture = Arc::new(MemoryTarget::new(Size::new(16, 16)));
    adapter.set_preview_texture(Some(texture.clone()));

    adapter.release();
    assert!(texture.is_released());
    assert!(t.camera.sessions().is_empty());
    assert_eq!(t.camera.scheduler().active_count(), 0);
}
