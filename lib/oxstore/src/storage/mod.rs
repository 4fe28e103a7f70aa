//! Low level storage primitives: term dictionary, versioned statement index, snapshots and record log.

use crate::error::{CorruptionError, StorageError, poison_corruption_error};
use crate::options::StoreOptions;
pub use crate::storage::dictionary::{InternedTerm, TermId, TypedValue};
pub(crate) use crate::storage::dictionary::TermDictionary;
pub(crate) use crate::storage::index::{EncodedPattern, EncodedQuad, Entry, PENDING, Scan};
use crate::storage::index::{NEVER, StatementIndex};
use crate::storage::log::{LogOperation, LogRecord, RecordLog};
use crate::storage::snapshot::SnapshotManager;
use oxterm::{GraphName, NamedNode, NamedOrBlankNode, Quad, Term};
use rustc_hash::FxHashMap;
use std::collections::BTreeMap;
use std::mem::take;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, RwLock};
use tracing::{debug, info};

mod dictionary;
mod index;
mod log;
mod snapshot;

/// The shared state of a store.
pub(crate) struct StorageCore {
    pub dictionary: TermDictionary,
    pub index: StatementIndex,
    pub snapshots: SnapshotManager,
    writer: Mutex<WriterState>,
    namespaces: RwLock<BTreeMap<String, String>>,
    pub options: StoreOptions,
}

/// State only accessed by the single writer.
struct WriterState {
    /// For each quad, the entry visible to the writer (the committed one or a staged insertion).
    live: FxHashMap<EncodedQuad, Arc<Entry>>,
    /// Removed and aborted entries waiting for the watermark to pass them.
    garbage: Vec<Arc<Entry>>,
    log: Option<RecordLog>,
}

impl StorageCore {
    pub fn open(options: StoreOptions) -> Result<Arc<Self>, StorageError> {
        let (log, records) = if let Some(path) = options.path() {
            let (log, records) = RecordLog::open(path, options.sync_on_commit())?;
            (Some(log), records)
        } else {
            (None, Vec::new())
        };
        let core = Arc::new(Self {
            dictionary: TermDictionary::new(),
            index: StatementIndex::new(),
            snapshots: SnapshotManager::new(),
            writer: Mutex::new(WriterState {
                live: FxHashMap::default(),
                garbage: Vec::new(),
                log: None,
            }),
            namespaces: RwLock::new(BTreeMap::new()),
            options,
        });
        let replayed = records.len();
        for record in records {
            core.replay(record)?;
        }
        if let Some(log) = log {
            info!(
                path = %log.path().display(),
                transactions = replayed,
                snapshot = core.snapshots.current(),
                quads = core.writer()?.live.len(),
                terms = core.dictionary.len(),
                "opened persistent store"
            );
            core.writer()?.log = Some(log);
        }
        Ok(core)
    }

    fn writer(&self) -> Result<MutexGuard<'_, WriterState>, CorruptionError> {
        self.writer.lock().map_err(poison_corruption_error)
    }

    /// Pins the current snapshot.
    pub fn pin(self: &Arc<Self>) -> SnapshotPin {
        SnapshotPin {
            snapshot: self.snapshots.pin(),
            core: Arc::clone(self),
        }
    }

    /// Starts a write transaction, blocking until the previous one is finished.
    pub fn begin(&self) -> Result<StorageWriter<'_>, StorageError> {
        Ok(StorageWriter {
            core: self,
            state: self.writer()?,
            operations: Vec::new(),
            namespace_operations: Vec::new(),
            finished: false,
        })
    }

    fn replay(&self, record: LogRecord) -> Result<(), StorageError> {
        if record.operations.is_empty() {
            return Ok(());
        }
        let current = self.snapshots.current();
        if record.snapshot <= current {
            return Err(CorruptionError::msg(format!(
                "The log record of snapshot {} follows snapshot {current}",
                record.snapshot
            ))
            .into());
        }
        let mut writer = self.begin()?;
        for operation in record.operations {
            match operation {
                LogOperation::Insert { quad, explicit } => {
                    writer.insert(&quad, explicit);
                }
                LogOperation::Remove { quad, explicit } => {
                    if !writer.remove(&quad, explicit) {
                        return Err(CorruptionError::msg(format!(
                            "The log removes {quad} that is not in the store"
                        ))
                        .into());
                    }
                }
                LogOperation::SetNamespace { prefix, namespace } => {
                    writer.set_namespace(prefix, namespace)
                }
                LogOperation::RemoveNamespace { prefix } => writer.remove_namespace(prefix),
                LogOperation::ClearNamespaces => writer.clear_namespaces(),
            }
        }
        writer.commit_at(record.snapshot, false)?;
        Ok(())
    }

    /// Encodes a pattern, returns `None` if a bound term is not in the dictionary.
    pub fn encode_pattern(
        &self,
        subject: Option<&NamedOrBlankNode>,
        predicate: Option<&NamedNode>,
        object: Option<&Term>,
        graph_name: Option<&GraphName>,
    ) -> Option<EncodedPattern> {
        let subject = match subject {
            Some(subject) => Some(self.dictionary.lookup(&subject.clone().into())?),
            None => None,
        };
        let predicate = match predicate {
            Some(predicate) => Some(self.dictionary.lookup(&predicate.clone().into())?),
            None => None,
        };
        let object = match object {
            Some(object) => Some(self.dictionary.lookup(object)?),
            None => None,
        };
        let graph_name = match graph_name {
            Some(graph_name) => Some(self.dictionary.lookup_graph_name(graph_name)?),
            None => None,
        };
        Some(EncodedPattern {
            subject,
            predicate,
            object,
            graph_name,
        })
    }

    /// Encodes a quad, returns `None` if one of its terms is not in the dictionary.
    pub fn lookup_quad(&self, quad: &Quad) -> Option<EncodedQuad> {
        Some(EncodedQuad {
            subject: self.dictionary.lookup(&quad.subject.clone().into())?,
            predicate: self.dictionary.lookup(&quad.predicate.clone().into())?,
            object: self.dictionary.lookup(&quad.object)?,
            graph_name: self.dictionary.lookup_graph_name(&quad.graph_name)?,
        })
    }

    pub fn decode_quad(&self, quad: &EncodedQuad) -> Result<Quad, CorruptionError> {
        let subject = NamedOrBlankNode::try_from(self.dictionary.resolve(quad.subject)?.term().clone())
            .map_err(CorruptionError::new)?;
        let predicate = NamedNode::try_from(self.dictionary.resolve(quad.predicate)?.term().clone())
            .map_err(CorruptionError::new)?;
        let object = self.dictionary.resolve(quad.object)?.term().clone();
        let graph_name = self.dictionary.resolve_graph_name(quad.graph_name)?;
        Ok(Quad::new(subject, predicate, object, graph_name))
    }

    pub fn namespaces(&self) -> BTreeMap<String, String> {
        self.namespaces
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Physically deletes the entries no reader can observe anymore. Returns the number of reclaimed entries.
    pub fn collect_garbage(&self) -> Result<usize, StorageError> {
        let mut state = self.writer()?;
        Ok(self.collect_garbage_with(&mut state))
    }

    fn collect_garbage_with(&self, state: &mut WriterState) -> usize {
        if state.garbage.is_empty() {
            return 0;
        }
        let watermark = self.snapshots.watermark();
        let (reclaimed, kept) = take(&mut state.garbage)
            .into_iter()
            .partition::<Vec<_>, _>(|e| e.is_aborted() || e.till() <= watermark);
        state.garbage = kept;
        self.index.remove_all(&reclaimed);
        debug!(
            watermark,
            reclaimed = reclaimed.len(),
            pending = state.garbage.len(),
            "collected garbage"
        );
        reclaimed.len()
    }

    /// Rewrites the record log as a single record holding the current state.
    pub fn compact(&self) -> Result<(), StorageError> {
        let mut state = self.writer()?;
        self.collect_garbage_with(&mut state);
        if state.log.is_none() {
            return Ok(());
        }
        let snapshot = self.snapshots.current();
        let mut operations = self
            .namespaces()
            .into_iter()
            .map(|(prefix, namespace)| LogOperation::SetNamespace { prefix, namespace })
            .collect::<Vec<_>>();
        for entry in self.index.all().iter() {
            if entry.is_visible(snapshot) {
                operations.push(LogOperation::Insert {
                    quad: self.decode_quad(&entry.quad)?,
                    explicit: entry.explicit,
                });
            }
        }
        if let Some(log) = &mut state.log {
            log.rewrite(&LogRecord {
                snapshot,
                operations,
            })?;
        }
        Ok(())
    }

    /// Checks the consistency of the index, the live map and the dictionary.
    pub fn validate(&self) -> Result<(), StorageError> {
        let state = self.writer()?;
        self.index.validate()?;
        let snapshot = self.snapshots.current();
        let mut visible = 0;
        for entry in self.index.all().iter() {
            self.decode_quad(&entry.quad)?;
            if entry.since() == PENDING || entry.till() == PENDING {
                return Err(CorruptionError::msg(format!(
                    "The entry {:?} is still staged outside of a transaction",
                    entry.quad
                ))
                .into());
            }
            if !entry.is_visible(snapshot) {
                continue;
            }
            visible += 1;
            if !state
                .live
                .get(&entry.quad)
                .is_some_and(|live| Arc::ptr_eq(live, entry))
            {
                return Err(CorruptionError::msg(format!(
                    "The visible entry {:?} is not the live one",
                    entry.quad
                ))
                .into());
            }
        }
        if visible != state.live.len() {
            return Err(CorruptionError::msg(format!(
                "{} live quads but {visible} visible entries",
                state.live.len()
            ))
            .into());
        }
        Ok(())
    }
}

/// Keeps a snapshot pinned until dropped.
pub(crate) struct SnapshotPin {
    core: Arc<StorageCore>,
    snapshot: u64,
}

impl SnapshotPin {
    #[inline]
    pub fn core(&self) -> &Arc<StorageCore> {
        &self.core
    }

    #[inline]
    pub fn snapshot(&self) -> u64 {
        self.snapshot
    }
}

impl Drop for SnapshotPin {
    fn drop(&mut self) {
        self.core.snapshots.unpin(self.snapshot)
    }
}

enum StagedOperation {
    Insert(Arc<Entry>),
    Remove(Arc<Entry>),
    /// Removal of an entry inserted by the same transaction.
    Discard(Arc<Entry>),
}

enum NamespaceOperation {
    Set { prefix: String, namespace: String },
    Remove { prefix: String },
    Clear,
}

impl NamespaceOperation {
    fn apply(&self, namespaces: &mut BTreeMap<String, String>) {
        match self {
            Self::Set { prefix, namespace } => {
                namespaces.insert(prefix.clone(), namespace.clone());
            }
            Self::Remove { prefix } => {
                namespaces.remove(prefix);
            }
            Self::Clear => namespaces.clear(),
        }
    }

    fn to_log(&self) -> LogOperation {
        match self {
            Self::Set { prefix, namespace } => LogOperation::SetNamespace {
                prefix: prefix.clone(),
                namespace: namespace.clone(),
            },
            Self::Remove { prefix } => LogOperation::RemoveNamespace {
                prefix: prefix.clone(),
            },
            Self::Clear => LogOperation::ClearNamespaces,
        }
    }
}

/// The write side of a transaction. Holds the writer lock until committed or rolled back.
///
/// Staged changes are visible at the [`PENDING`] snapshot. Dropping it rolls it back.
pub(crate) struct StorageWriter<'a> {
    core: &'a StorageCore,
    state: MutexGuard<'a, WriterState>,
    operations: Vec<StagedOperation>,
    namespace_operations: Vec<NamespaceOperation>,
    finished: bool,
}

impl StorageWriter<'_> {
    /// Stages the insertion of a quad.
    ///
    /// Returns `false` if the quad is already there, except if an explicit quad replaces an inferred one.
    pub fn insert(&mut self, quad: &Quad, explicit: bool) -> bool {
        let dictionary = &self.core.dictionary;
        let encoded = EncodedQuad {
            subject: dictionary.intern_id(&quad.subject.clone().into()),
            predicate: dictionary.intern_id(&quad.predicate.clone().into()),
            object: dictionary.intern_id(&quad.object),
            graph_name: dictionary.intern_graph_name(&quad.graph_name),
        };
        if let Some(existing) = self.state.live.get(&encoded) {
            if existing.explicit || !explicit {
                return false;
            }
            let existing = Arc::clone(existing);
            self.stage_removal(existing);
        }
        let entry = Arc::new(Entry::new(encoded, explicit, PENDING));
        self.core.index.insert(&entry);
        self.state.live.insert(encoded, Arc::clone(&entry));
        self.operations.push(StagedOperation::Insert(entry));
        true
    }

    /// Stages the removal of a quad. Returns `false` if it is not there with the given explicitness.
    pub fn remove(&mut self, quad: &Quad, explicit: bool) -> bool {
        let Some(encoded) = self.core.lookup_quad(quad) else {
            return false;
        };
        match self.state.live.get(&encoded) {
            Some(entry) if entry.explicit == explicit => {
                let entry = Arc::clone(entry);
                self.stage_removal(entry);
                true
            }
            _ => false,
        }
    }

    /// Stages the removal of all the visible quads matching the pattern with the given explicitness.
    pub fn remove_matching(&mut self, pattern: EncodedPattern, explicit: bool) -> usize {
        let matching = self
            .core
            .index
            .scan(pattern, PENDING, true)
            .filter(|e| e.explicit == explicit)
            .collect::<Vec<_>>();
        let count = matching.len();
        for entry in matching {
            self.stage_removal(entry);
        }
        count
    }

    fn stage_removal(&mut self, entry: Arc<Entry>) {
        self.state.live.remove(&entry.quad);
        if entry.since() == PENDING {
            entry.set_since(NEVER);
            self.operations.push(StagedOperation::Discard(entry));
        } else {
            entry.set_till(PENDING);
            self.operations.push(StagedOperation::Remove(entry));
        }
    }

    pub fn set_namespace(&mut self, prefix: String, namespace: String) {
        self.namespace_operations
            .push(NamespaceOperation::Set { prefix, namespace });
    }

    pub fn remove_namespace(&mut self, prefix: String) {
        self.namespace_operations
            .push(NamespaceOperation::Remove { prefix });
    }

    pub fn clear_namespaces(&mut self) {
        self.namespace_operations.push(NamespaceOperation::Clear);
    }

    /// The namespaces including the staged changes.
    pub fn namespaces(&self) -> BTreeMap<String, String> {
        let mut namespaces = self.core.namespaces();
        for operation in &self.namespace_operations {
            operation.apply(&mut namespaces);
        }
        namespaces
    }

    /// Number of quads visible to this transaction.
    pub fn len(&self) -> usize {
        self.state.live.len()
    }

    /// Commits the staged changes as a new snapshot and returns its number.
    pub fn commit(self) -> Result<u64, StorageError> {
        let snapshot = self.core.snapshots.current() + 1;
        self.commit_at(snapshot, true)
    }

    fn commit_at(mut self, snapshot: u64, write_log: bool) -> Result<u64, StorageError> {
        if write_log && self.state.log.is_some() {
            let record = self.log_record(snapshot)?;
            if !record.operations.is_empty() {
                if let Some(log) = &mut self.state.log {
                    // on failure, dropping self rolls the transaction back
                    log.append(&record)?;
                }
            }
        }
        let mut inserted = 0;
        let mut removed = 0;
        for operation in take(&mut self.operations) {
            match operation {
                StagedOperation::Insert(entry) => {
                    if entry.since() == PENDING {
                        entry.set_since(snapshot);
                        inserted += 1;
                    }
                }
                StagedOperation::Remove(entry) => {
                    entry.set_till(snapshot);
                    self.state.garbage.push(entry);
                    removed += 1;
                }
                StagedOperation::Discard(entry) => self.state.garbage.push(entry),
            }
        }
        if !self.namespace_operations.is_empty() {
            let mut namespaces = self
                .core
                .namespaces
                .write()
                .unwrap_or_else(PoisonError::into_inner);
            for operation in &self.namespace_operations {
                operation.apply(&mut namespaces);
            }
        }
        self.core.snapshots.publish(snapshot);
        self.finished = true;
        if self.core.options.gc_on_commit() {
            self.core.collect_garbage_with(&mut self.state);
        }
        debug!(snapshot, inserted, removed, "committed transaction");
        Ok(snapshot)
    }

    fn log_record(&self, snapshot: u64) -> Result<LogRecord, StorageError> {
        let mut operations = Vec::new();
        for operation in &self.operations {
            match operation {
                StagedOperation::Insert(entry) if entry.since() == PENDING => {
                    operations.push(LogOperation::Insert {
                        quad: self.core.decode_quad(&entry.quad)?,
                        explicit: entry.explicit,
                    })
                }
                StagedOperation::Remove(entry) => operations.push(LogOperation::Remove {
                    quad: self.core.decode_quad(&entry.quad)?,
                    explicit: entry.explicit,
                }),
                StagedOperation::Insert(_) | StagedOperation::Discard(_) => (),
            }
        }
        operations.extend(self.namespace_operations.iter().map(NamespaceOperation::to_log));
        Ok(LogRecord {
            snapshot,
            operations,
        })
    }

    /// Discards the staged changes without advancing the snapshot counter.
    pub fn rollback(mut self) {
        self.undo();
    }

    fn undo(&mut self) {
        if self.finished {
            return;
        }
        self.finished = true;
        let count = self.operations.len();
        for operation in take(&mut self.operations).into_iter().rev() {
            match operation {
                StagedOperation::Insert(entry) => {
                    entry.set_since(NEVER);
                    if self
                        .state
                        .live
                        .get(&entry.quad)
                        .is_some_and(|e| Arc::ptr_eq(e, &entry))
                    {
                        self.state.live.remove(&entry.quad);
                    }
                    self.state.garbage.push(entry);
                }
                StagedOperation::Remove(entry) => {
                    entry.set_till(NEVER);
                    self.state.live.insert(entry.quad, entry);
                }
                StagedOperation::Discard(entry) => {
                    entry.set_since(PENDING);
                    self.state.live.insert(entry.quad, entry);
                }
            }
        }
        self.namespace_operations.clear();
        if self.core.options.gc_on_commit() {
            self.core.collect_garbage_with(&mut self.state);
        }
        debug!(operations = count, "rolled back transaction");
    }
}

impl Drop for StorageWriter<'_> {
    fn drop(&mut self) {
        self.undo()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use oxterm::Literal;

    fn quad(o: i64) -> Quad {
        Quad::new(
            NamedNode::new_unchecked("http://example.com/s"),
            NamedNode::new_unchecked("http://example.com/p"),
            Literal::from(o),
            GraphName::DefaultGraph,
        )
    }

    fn count(core: &StorageCore, snapshot: u64) -> usize {
        core.index
            .scan(EncodedPattern::default(), snapshot, true)
            .count()
    }

    #[test]
    fn commit_stamps_and_publishes() -> Result<(), StorageError> {
        let core = StorageCore::open(StoreOptions::default())?;
        let mut writer = core.begin()?;
        assert!(writer.insert(&quad(1), true));
        assert!(!writer.insert(&quad(1), true));
        assert_eq!(count(&core, 0), 0);
        assert_eq!(count(&core, PENDING), 1);
        assert_eq!(writer.commit()?, 1);
        assert_eq!(core.snapshots.current(), 1);
        assert_eq!(count(&core, 1), 1);
        core.validate()?;
        Ok(())
    }

    #[test]
    fn rollback_restores_state() -> Result<(), StorageError> {
        let core = StorageCore::open(StoreOptions::default())?;
        let mut writer = core.begin()?;
        writer.insert(&quad(1), true);
        writer.commit()?;
        let mut writer = core.begin()?;
        assert!(writer.remove(&quad(1), true));
        writer.insert(&quad(2), true);
        assert!(writer.remove(&quad(2), true));
        writer.insert(&quad(3), true);
        drop(writer);
        assert_eq!(core.snapshots.current(), 1);
        assert_eq!(count(&core, PENDING), 1);
        assert_eq!(core.index.all().len(), 1, "aborted entries are collected");
        core.validate()?;
        Ok(())
    }

    #[test]
    fn insert_then_remove_in_same_transaction() -> Result<(), StorageError> {
        let core = StorageCore::open(StoreOptions::default())?;
        let mut writer = core.begin()?;
        writer.insert(&quad(1), true);
        assert!(writer.remove(&quad(1), true));
        writer.commit()?;
        assert_eq!(count(&core, 1), 0);
        assert!(core.index.all().is_empty());
        core.validate()?;
        Ok(())
    }

    #[test]
    fn explicit_replaces_inferred() -> Result<(), StorageError> {
        let core = StorageCore::open(StoreOptions::default())?;
        let mut writer = core.begin()?;
        assert!(writer.insert(&quad(1), false));
        assert!(!writer.insert(&quad(1), false));
        writer.commit()?;
        let mut writer = core.begin()?;
        assert!(!writer.insert(&quad(1), false));
        assert!(writer.insert(&quad(1), true));
        assert!(!writer.remove(&quad(1), false));
        writer.commit()?;
        let entries = core
            .index
            .scan(EncodedPattern::default(), 2, true)
            .collect::<Vec<_>>();
        assert_eq!(entries.len(), 1);
        assert!(entries[0].explicit);
        core.validate()?;
        Ok(())
    }

    #[test]
    fn garbage_waits_for_pinned_readers() -> Result<(), StorageError> {
        let core = StorageCore::open(StoreOptions::default())?;
        let mut writer = core.begin()?;
        writer.insert(&quad(1), true);
        writer.commit()?;
        let pin = core.pin();
        let mut writer = core.begin()?;
        writer.remove(&quad(1), true);
        writer.commit()?;
        assert_eq!(count(&core, pin.snapshot()), 1);
        assert_eq!(core.index.all().len(), 1);
        drop(pin);
        assert_eq!(core.collect_garbage()?, 1);
        assert!(core.index.all().is_empty());
        core.validate()?;
        Ok(())
    }

    #[test]
    fn namespaces_are_applied_at_commit() -> Result<(), StorageError> {
        let core = StorageCore::open(StoreOptions::default())?;
        let mut writer = core.begin()?;
        writer.set_namespace("ex".into(), "http://example.com/".into());
        assert_eq!(writer.namespaces().len(), 1);
        assert!(core.namespaces().is_empty());
        writer.commit()?;
        assert_eq!(
            core.namespaces().get("ex").map(String::as_str),
            Some("http://example.com/")
        );
        Ok(())
    }
}
