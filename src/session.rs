use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard};

use crate::media::types::Size;
use crate::scheduler::DeliveryScheduler;
use crate::target::{target_key, DeliveryTarget, PlaceholderTarget};

/// Opaque key for one delivery slot: `owner` identifies a camera or capture
/// session, `slot` one of its outputs.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct SessionHandle {
    pub owner: u64,
    pub slot: u32,
}

impl SessionHandle {
    pub const fn new(owner: u64, slot: u32) -> Self {
        Self { owner, slot }
    }
}

#[derive(Default)]
struct SessionEntry {
    target: Option<Arc<dyn DeliveryTarget>>,
    /// The pipeline is responsible for releasing `target`.
    owned: bool,
    size: Option<Size>,
    placeholder: Option<Arc<PlaceholderTarget>>,
}

/// Which target is active for each session handle, and who owns it.
pub struct SessionRegistry {
    entries: Mutex<HashMap<SessionHandle, SessionEntry>>,
    scheduler: Arc<DeliveryScheduler>,
}

impl SessionRegistry {
    pub fn new(scheduler: Arc<DeliveryScheduler>) -> Self {
        Self {
            entries: Mutex::new(HashMap::new()),
            scheduler,
        }
    }

    fn entries(&self) -> MutexGuard<'_, HashMap<SessionHandle, SessionEntry>> {
        self.entries.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Makes `target` the active target for `handle`. A different previous
    /// target stops being painted first and is released if it was owned.
    pub fn activate(&self, handle: SessionHandle, target: Arc<dyn DeliveryTarget>, owned: bool) {
        let previous = {
            let mut entries = self.entries();
            let entry = entries.entry(handle).or_default();
            let previous = match entry.target.take() {
                Some(old) if target_key(&old) != target_key(&target) => Some((old, entry.owned)),
                _ => None,
            };
            entry.target = Some(target);
            entry.owned = owned;
            previous
        };

        if let Some((old, was_owned)) = previous {
            self.scheduler.stop(&old);
            if was_owned {
                old.release();
            }
            log::debug!("session {:?}: replaced target (owned: {})", handle, was_owned);
        }
    }

    pub fn update_size(&self, handle: SessionHandle, size: Size) {
        self.entries().entry(handle).or_default().size = Some(size);
    }

    pub fn size(&self, handle: SessionHandle) -> Option<Size> {
        self.entries().get(&handle).and_then(|e| e.size)
    }

    pub fn target(&self, handle: SessionHandle) -> Option<Arc<dyn DeliveryTarget>> {
        self.entries().get(&handle).and_then(|e| e.target.clone())
    }

    pub fn is_owned(&self, handle: SessionHandle) -> bool {
        self.entries().get(&handle).is_some_and(|e| e.owned)
    }

    pub fn contains(&self, handle: SessionHandle) -> bool {
        self.entries().contains_key(&handle)
    }

    pub fn len(&self) -> usize {
        self.entries().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Stops painting the active target but keeps the entry.
    pub fn pause(&self, handle: SessionHandle) -> bool {
        match self.target(handle) {
            Some(target) => self.scheduler.stop(&target),
            None => false,
        }
    }

    /// Stops painting, releases an owned target and forgets the handle.
    pub fn teardown(&self, handle: SessionHandle) {
        let entry = self.entries().remove(&handle);
        if let Some(entry) = entry {
            Self::close(entry, &self.scheduler);
            log::debug!("session {:?} torn down", handle);
        }
    }

    /// Tears down every slot that belongs to `owner`.
    pub fn teardown_owner(&self, owner: u64) {
        let removed: Vec<SessionEntry> = {
            let mut entries = self.entries();
            let handles: Vec<SessionHandle> =
                entries.keys().filter(|h| h.owner == owner).copied().collect();
            handles
                .iter()
                .filter_map(|h| entries.remove(h))
                .collect()
        };
        for entry in removed {
            Self::close(entry, &self.scheduler);
        }
    }

    /// Stand-in target for `handle`; the same placeholder is returned until
    /// the session is torn down.
    pub fn obtain_placeholder(&self, handle: SessionHandle) -> Arc<PlaceholderTarget> {
        self.entries()
            .entry(handle)
            .or_default()
            .placeholder
            .get_or_insert_with(|| Arc::new(PlaceholderTarget::new()))
            .clone()
    }

    fn close(entry: SessionEntry, scheduler: &DeliveryScheduler) {
        if let Some(target) = entry.target {
            scheduler.stop(&target);
            if entry.owned {
                target.release();
            }
        }
        if let Some(placeholder) = entry.placeholder {
            placeholder.release();
        }
    }
}

#[cfg(test)]
#[path = "session_test.rs"]
mod session_test;
