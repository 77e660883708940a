use std::collections::VecDeque;
use std::sync::{LazyLock, Mutex};

use tokio::sync::broadcast;
use tokio_stream::wrappers::BroadcastStream;

/// Lines kept by the process log buffer.
pub const LOG_CAPACITY: usize = 200;

/// Bounded in-memory copy of recent log lines, for observers such as a
/// diagnostics screen.
pub struct LogBuffer {
    lines: Mutex<VecDeque<String>>,
    capacity: usize,
    sender: broadcast::Sender<String>,
}

impl LogBuffer {
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity.max(1));
        Self {
            lines: Mutex::new(VecDeque::with_capacity(capacity)),
            capacity,
            sender,
        }
    }

    /// The buffer fed by the logger installed with [`init_logging`].
    pub fn global() -> &'static LogBuffer {
        static BUFFER: LazyLock<LogBuffer> = LazyLock::new(|| LogBuffer::new(LOG_CAPACITY));
        &BUFFER
    }

    pub fn push(&self, line: String) {
        {
            let mut lines = self.lines.lock().unwrap_or_else(|e| e.into_inner());
            while lines.len() >= self.capacity {
                lines.pop_front();
            }
            if self.capacity > 0 {
                lines.push_back(line.clone());
            }
        }
        // no subscribers is fine
        let _ = self.sender.send(line);
    }

    pub fn lines(&self) -> Vec<String> {
        self.lines
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .iter()
            .cloned()
            .collect()
    }

    pub fn clear(&self) {
        self.lines.lock().unwrap_or_else(|e| e.into_inner()).clear();
    }

    /// Receives every line pushed after subscribing.
    pub fn subscribe(&self) -> broadcast::Receiver<String> {
        self.sender.subscribe()
    }

    /// [`subscribe`](Self::subscribe) as a stream. Lagging readers get a
    /// `Lagged` item instead of the lines they missed.
    pub fn stream(&self) -> BroadcastStream<String> {
        BroadcastStream::new(self.sender.subscribe())
    }
}

struct TeeLogger {
    inner: env_logger::Logger,
    buffer: &'static LogBuffer,
}

impl log::Log for TeeLogger {
    fn enabled(&self, metadata: &log::Metadata) -> bool {
        self.inner.enabled(metadata)
    }

    fn log(&self, record: &log::Record) {
        if !self.inner.matches(record) {
            return;
        }
        self.inner.log(record);
        self.buffer.push(format!(
            "{:<5} {}: {}",
            record.level(),
            record.target(),
            record.args()
        ));
    }

    fn flush(&self) {
        self.inner.flush();
    }
}

/// Installs an env_logger that also copies every line into
/// [`LogBuffer::global`]. `RUST_LOG` overrides the level chosen here.
pub fn init_logging(verbose: bool) {
    let level = if verbose {
        log::LevelFilter::Debug
    } else {
        log::LevelFilter::Info
    };
    let inner = env_logger::Builder::new()
        .filter_level(level)
        .filter_module("ffmpeg_source", level)
        .parse_default_env()
        .build();
    let max_level = inner.filter();
    let logger = TeeLogger {
        inner,
        buffer: LogBuffer::global(),
    };
    if log::set_boxed_logger(Box::new(logger)).is_ok() {
        log::set_max_level(max_level);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ring_drops_oldest() {
        let buffer = LogBuffer::new(3);
        for i in 0..5 {
            buffer.push(format!("line {}", i));
        }
        assert_eq!(buffer.lines(), vec!["line 2", "line 3", "line 4"]);
        buffer.clear();
        assert!(buffer.lines().is_empty());
    }

    #[tokio::test]
    async fn test_subscribers_see_new_lines() {
        let buffer = LogBuffer::new(LOG_CAPACITY);
        buffer.push("before".to_string());
        let mut rx = buffer.subscribe();
        buffer.push("after".to_string());
        assert_eq!(rx.recv().await.unwrap(), "after");
    }

    #[tokio::test]
    async fn test_stream_yields_pushed_lines() {
        use futures::StreamExt;

        let buffer = LogBuffer::new(LOG_CAPACITY);
        let mut lines = buffer.stream();
        buffer.push("one".to_string());
        buffer.push("two".to_string());
        assert_eq!(lines.next().await.unwrap().unwrap(), "one");
        assert_eq!(lines.next().await.unwrap().unwrap(), "two");
    }
}
