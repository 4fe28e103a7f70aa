use std::path::{Path, PathBuf};
use std::time::Duration;

/// Configuration of a [`Store`](crate::Store).
///
/// ```
/// use oxstore::StoreOptions;
/// use std::time::Duration;
///
/// let options = StoreOptions::default()
///     .with_default_timeout(Duration::from_secs(10))
///     .with_gc_on_commit(false);
/// assert!(options.path().is_none());
/// ```
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct StoreOptions {
    path: Option<PathBuf>,
    sync_on_commit: bool,
    default_timeout: Option<Duration>,
    gc_on_commit: bool,
}

impl Default for StoreOptions {
    fn default() -> Self {
        Self {
            path: None,
            sync_on_commit: false,
            default_timeout: None,
            gc_on_commit: true,
        }
    }
}

impl StoreOptions {
    /// Makes the store persistent: committed transactions are appended to a record log in this directory.
    #[inline]
    #[must_use]
    pub fn with_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.path = Some(path.into());
        self
    }

    /// Flushes the record log to the disk (`fsync`) on each commit.
    #[inline]
    #[must_use]
    pub fn with_sync_on_commit(mut self, sync_on_commit: bool) -> Self {
        self.sync_on_commit = sync_on_commit;
        self
    }

    /// Sets the deadline applied by the `evaluate` shortcuts.
    #[inline]
    #[must_use]
    pub fn with_default_timeout(mut self, timeout: Duration) -> Self {
        self.default_timeout = Some(timeout);
        self
    }

    /// Runs the garbage collection after each commit (enabled by default).
    ///
    /// If disabled, [`Store::collect_garbage`](crate::Store::collect_garbage) must be called explicitly.
    #[inline]
    #[must_use]
    pub fn with_gc_on_commit(mut self, gc_on_commit: bool) -> Self {
        self.gc_on_commit = gc_on_commit;
        self
    }

    #[inline]
    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    #[inline]
    pub fn sync_on_commit(&self) -> bool {
        self.sync_on_commit
    }

    #[inline]
    pub fn default_timeout(&self) -> Option<Duration> {
        self.default_timeout
    }

    #[inline]
    pub fn gc_on_commit(&self) -> bool {
        self.gc_on_commit
    }
}
