use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::thread::JoinHandle;
use std::time::Duration;

use image::RgbaImage;
use tokio::runtime::Handle;
use tokio_util::sync::CancellationToken;

use crate::target::{target_key, DeliveryTarget, TargetKey, CLEAR_COLOR};

const MIN_FRAME_INTERVAL: Duration = Duration::from_millis(10);
const DEFAULT_FRAME_INTERVAL: Duration = Duration::from_millis(33);

/// Supplies frames to a painter loop.
pub trait FrameProvider: Send + Sync {
    /// Next frame to draw, or `None` to leave the canvas cleared.
    fn next_frame(&self) -> Option<RgbaImage>;

    fn fps(&self) -> u32;

    /// Called after each successful post.
    fn on_posted(&self) {}
}

/// Sleep between paints: `max(10ms, 1000/fps)`.
pub fn frame_interval(fps: u32) -> Duration {
    if fps == 0 {
        return DEFAULT_FRAME_INTERVAL;
    }
    Duration::from_millis(1000 / fps as u64).max(MIN_FRAME_INTERVAL)
}

struct Painter {
    cancel: CancellationToken,
    handle: JoinHandle<()>,
}

/// Runs one painter thread per target.
pub struct DeliveryScheduler {
    painters: Mutex<HashMap<TargetKey, Painter>>,
    // held across stop, spawn and insert so concurrent starts cannot both paint
    start_lock: Mutex<()>,
    runtime: Handle,
}

impl DeliveryScheduler {
    /// `runtime` drives the cancellable sleeps and must be a multi-thread runtime.
    pub fn new(runtime: Handle) -> Self {
        Self {
            painters: Mutex::new(HashMap::new()),
            start_lock: Mutex::new(()),
            runtime,
        }
    }

    /// Starts painting `target`, replacing any loop already painting it.
    pub fn start(
        &self,
        target: Arc<dyn DeliveryTarget>,
        provider: Arc<dyn FrameProvider>,
    ) -> anyhow::Result<()> {
        let key = target_key(&target);
        let _starting = self.start_lock.lock().unwrap_or_else(|e| e.into_inner());
        self.stop_key(key);

        let cancel = CancellationToken::new();
        let handle = std::thread::Builder::new()
            .name(format!("vcam-painter-{:x}", key))
            .spawn({
                let cancel = cancel.clone();
                let runtime = self.runtime.clone();
                move || paint_loop(target, provider, cancel, runtime)
            })?;

        let replaced = self
            .painters
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .insert(key, Painter { cancel, handle });
        if let Some(painter) = replaced {
            Self::finish(painter);
        }
        log::debug!("painter {:x} started", key);
        Ok(())
    }

    /// Stops the loop painting `target`. Once this returns no further paint
    /// calls reach the target.
    pub fn stop(&self, target: &Arc<dyn DeliveryTarget>) -> bool {
        self.stop_key(target_key(target))
    }

    pub fn is_running(&self, target: &Arc<dyn DeliveryTarget>) -> bool {
        self.painters
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .get(&target_key(target))
            .is_some_and(|p| !p.handle.is_finished())
    }

    pub fn active_count(&self) -> usize {
        self.painters
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .values()
            .filter(|p| !p.handle.is_finished())
            .count()
    }

    pub fn stop_all(&self) {
        let painters: Vec<Painter> = self
            .painters
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .drain()
            .map(|(_, p)| p)
            .collect();
        for painter in painters {
            Self::finish(painter);
        }
    }

    fn stop_key(&self, key: TargetKey) -> bool {
        let painter = self
            .painters
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .remove(&key);
        match painter {
            Some(painter) => {
                Self::finish(painter);
                log::debug!("painter {:x} stopped", key);
                true
            }
            None => false,
        }
    }

    fn finish(painter: Painter) {
        painter.cancel.cancel();
        // a painter stopping its own target cannot join itself
        if painter.handle.thread().id() == std::thread::current().id() {
            return;
        }
        if painter.handle.join().is_err() {
            log::error!("painter thread panicked");
        }
    }
}

impl Drop for DeliveryScheduler {
    fn drop(&mut self) {
        self.stop_all();
    }
}

fn paint_loop(
    target: Arc<dyn DeliveryTarget>,
    provider: Arc<dyn FrameProvider>,
    cancel: CancellationToken,
    runtime: Handle,
) {
    while !cancel.is_cancelled() && target.is_valid() {
        let mut canvas = match target.lock_canvas() {
            Ok(canvas) => canvas,
            Err(e) => {
                log::warn!("painter: lock canvas failed, stopping: {:#}", e);
                break;
            }
        };
        canvas.clear(CLEAR_COLOR);
        if let Some(frame) = provider.next_frame() {
            canvas.draw_stretched(&frame);
        }
        match target.unlock_and_post(canvas) {
            Ok(()) => provider.on_posted(),
            Err(e) => log::warn!("painter: post failed: {:#}", e),
        }

        let interval = frame_interval(provider.fps());
        let cancelled = runtime.block_on(async {
            tokio::select! {
                _ = cancel.cancelled() => true,
                _ = tokio::time::sleep(interval) => false,
            }
        });
        if cancelled {
            break;
        }
    }
}

#[cfg(test)]
#[path = "scheduler_test.rs"]
mod scheduler_test;
