use std::sync::Mutex;
use std::time::Instant;

use serde::Serialize;
use tokio::sync::watch;
use tokio_stream::wrappers::WatchStream;

use crate::media::types::Size;

pub const IDLE_PATH: &str = "Idle";

/// What the pipeline is currently doing, as seen by an observer.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct DiagnosticsSnapshot {
    /// Which API surface delivered the last frame.
    pub active_path: String,
    pub preview_size: Option<Size>,
    pub pixel_format: Option<String>,
    pub requested_fps: u32,
    pub measured_fps: f32,
}

impl Default for DiagnosticsSnapshot {
    fn default() -> Self {
        Self {
            active_path: IDLE_PATH.to_string(),
            preview_size: None,
            pixel_format: None,
            requested_fps: 0,
            measured_fps: 0.0,
        }
    }
}

/// Latest-value publisher. Updates replace the whole snapshot; with racing
/// writers the last one wins.
pub struct DiagnosticsSink {
    sender: watch::Sender<DiagnosticsSnapshot>,
}

impl Default for DiagnosticsSink {
    fn default() -> Self {
        Self::new()
    }
}

impl DiagnosticsSink {
    pub fn new() -> Self {
        let (sender, _) = watch::channel(DiagnosticsSnapshot::default());
        Self { sender }
    }

    pub fn snapshot(&self) -> DiagnosticsSnapshot {
        self.sender.borrow().clone()
    }

    pub fn subscribe(&self) -> watch::Receiver<DiagnosticsSnapshot> {
        self.sender.subscribe()
    }

    pub fn stream(&self) -> WatchStream<DiagnosticsSnapshot> {
        WatchStream::new(self.subscribe())
    }

    pub fn publish(&self, snapshot: DiagnosticsSnapshot) {
        self.sender.send_replace(snapshot);
    }

    /// Builds the next snapshot from a copy of the current one.
    pub fn update(&self, f: impl FnOnce(DiagnosticsSnapshot) -> DiagnosticsSnapshot) {
        let next = f(self.snapshot());
        self.publish(next);
    }

    pub fn reset(&self) {
        self.publish(DiagnosticsSnapshot::default());
    }
}

/// Frame rate from the spacing of consecutive deliveries.
#[derive(Default)]
pub struct FpsMeter {
    last: Mutex<Option<Instant>>,
}

impl FpsMeter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Records a delivery; returns the instantaneous rate once two have been seen.
    pub fn tick(&self) -> Option<f32> {
        self.tick_at(Instant::now())
    }

    pub fn tick_at(&self, now: Instant) -> Option<f32> {
        let mut last = self.last.lock().unwrap_or_else(|e| e.into_inner());
        let previous = last.replace(now)?;
        let nanos = now.checked_duration_since(previous)?.as_nanos();
        if nanos == 0 {
            return None;
        }
        Some((1e9 / nanos as f64) as f32)
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use futures::StreamExt;

    use super::*;

    #[test]
    fn test_starts_idle() {
        let sink = DiagnosticsSink::new();
        assert_eq!(sink.snapshot().active_path, "Idle");
        assert_eq!(sink.snapshot().preview_size, None);
    }

    #[test]
    fn test_update_replaces_whole_record() {
        let sink = DiagnosticsSink::new();
        sink.update(|s| DiagnosticsSnapshot {
            active_path: "Legacy".to_string(),
            preview_size: Some(Size::new(640, 480)),
            requested_fps: 30,
            ..s
        });
        sink.update(|s| DiagnosticsSnapshot {
            measured_fps: 29.5,
            ..s
        });
        let snapshot = sink.snapshot();
        assert_eq!(snapshot.active_path, "Legacy");
        assert_eq!(snapshot.preview_size, Some(Size::new(640, 480)));
        assert_eq!(snapshot.measured_fps, 29.5);

        sink.reset();
        assert_eq!(sink.snapshot(), DiagnosticsSnapshot::default());
    }

    #[tokio::test]
    async fn test_subscribers_observe_updates() {
        let sink = DiagnosticsSink::new();
        let mut rx = sink.subscribe();
        let mut stream = sink.stream();
        // WatchStream yields the current value first
        assert_eq!(stream.next().await.unwrap().active_path, "Idle");

        sink.update(|s| DiagnosticsSnapshot {
            active_path: "Session".to_string(),
            ..s
        });
        rx.changed().await.unwrap();
        assert_eq!(rx.borrow().active_path, "Session");
        assert_eq!(stream.next().await.unwrap().active_path, "Session");
    }

    #[test]
    fn test_fps_meter() {
        let meter = FpsMeter::new();
        let start = Instant::now();
        assert_eq!(meter.tick_at(start), None);
        let fps = meter.tick_at(start + Duration::from_millis(40)).unwrap();
        assert!((fps - 25.0).abs() < 0.01);
    }
}
