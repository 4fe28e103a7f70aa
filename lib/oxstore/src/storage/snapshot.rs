use std::collections::BTreeMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Mutex, PoisonError};

/// Issues snapshot numbers and tracks the snapshots pinned by live readers.
pub(crate) struct SnapshotManager {
    current: AtomicU64,
    pins: Mutex<BTreeMap<u64, usize>>,
}

impl SnapshotManager {
    pub fn new() -> Self {
        Self {
            current: AtomicU64::new(0),
            pins: Mutex::new(BTreeMap::new()),
        }
    }

    /// The last published snapshot.
    #[inline]
    pub fn current(&self) -> u64 {
        self.current.load(Ordering::Acquire)
    }

    /// Makes `snapshot` the current one. Only called by the writer, with increasing values.
    #[inline]
    pub fn publish(&self, snapshot: u64) {
        self.current.store(snapshot, Ordering::Release)
    }

    /// Pins the current snapshot so that its content is not collected.
    pub fn pin(&self) -> u64 {
        let mut pins = self.pins.lock().unwrap_or_else(PoisonError::into_inner);
        // read under the lock so that a concurrent watermark computation sees this pin
        let snapshot = self.current();
        *pins.entry(snapshot).or_default() += 1;
        snapshot
    }

    pub fn unpin(&self, snapshot: u64) {
        let mut pins = self.pins.lock().unwrap_or_else(PoisonError::into_inner);
        if let Some(count) = pins.get_mut(&snapshot) {
            *count -= 1;
            if *count == 0 {
                pins.remove(&snapshot);
            }
        }
    }

    /// The oldest snapshot a live reader may observe: entries removed at or before it are unreachable.
    pub fn watermark(&self) -> u64 {
        let pins = self.pins.lock().unwrap_or_else(PoisonError::into_inner);
        pins.keys()
            .next()
            .copied()
            .unwrap_or_else(|| self.current() + 1)
    }

    pub fn pinned_count(&self) -> usize {
        self.pins
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .values()
            .sum()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn watermark_follows_oldest_pin() {
        let manager = SnapshotManager::new();
        assert_eq!(manager.watermark(), 1);
        manager.publish(3);
        let a = manager.pin();
        manager.publish(4);
        let b = manager.pin();
        let c = manager.pin();
        assert_eq!((a, b, c), (3, 4, 4));
        assert_eq!(manager.watermark(), 3);
        manager.unpin(a);
        assert_eq!(manager.watermark(), 4);
        manager.unpin(b);
        assert_eq!(manager.watermark(), 4);
        assert_eq!(manager.pinned_count(), 1);
        manager.unpin(c);
        assert_eq!(manager.watermark(), 5);
    }
}
