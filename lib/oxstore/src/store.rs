//! API to access an in-memory, optionally persistent, MVCC [RDF dataset](https://www.w3.org/TR/rdf11-concepts/#dfn-rdf-dataset).
//!
//! The entry point of the module is the [`Store`] struct.
//!
//! Usage example:
//! ```
//! use oxstore::{BindingSet, Store};
//! use oxalgebra::{GraphPattern, QuadPattern};
//! use oxterm::*;
//!
//! let store = Store::new()?;
//!
//! // insertion
//! let ex = NamedNode::new("http://example.com")?;
//! let quad = Quad::new(ex.clone(), ex.clone(), ex.clone(), GraphName::DefaultGraph);
//! store.insert(&quad)?;
//!
//! // quad filter
//! let results: Result<Vec<Quad>, _> = store.quads_for_pattern(None, None, None, None).into_iter().collect();
//! assert_eq!(vec![quad], results?);
//!
//! // graph pattern evaluation
//! let pattern = GraphPattern::Pattern(QuadPattern::new(Variable::new("s")?, ex.clone(), ex.clone()));
//! let mut rows = store.snapshot().evaluate(&pattern, &BindingSet::default(), true)?.into_iter();
//! assert_eq!(rows.next().transpose()?.and_then(|row| row.get("s").cloned()), Some(ex.into()));
//! # Result::<_, Box<dyn std::error::Error>>::Ok(())
//! ```

use crate::binding::BindingSet;
use crate::connection::Connection;
use crate::cursor::{Cursor, CursorIter};
use crate::error::{CorruptionError, EvaluationError, StorageError};
use crate::eval::{BindingCursor, QueryDataset, QueryEvaluator};
use crate::options::StoreOptions;
use crate::storage::{
    EncodedPattern, PENDING, Scan, SnapshotPin, StorageCore, StorageWriter, TermId,
};
use oxalgebra::GraphPattern;
use oxterm::{GraphName, NamedNode, NamedOrBlankNode, Quad, Term};
use rustc_hash::FxHashSet;
use std::collections::BTreeMap;
use std::marker::PhantomData;
use std::path::Path;
use std::sync::Arc;
use std::{fmt, vec};

/// An in-memory [RDF dataset](https://www.w3.org/TR/rdf11-concepts/#dfn-rdf-dataset) with multi-version concurrency control.
///
/// Every statement version records the snapshot it was committed in and the one it was removed in.
/// Readers work on a [`Snapshot`] that never changes, even if writers commit in the meantime.
/// Writers are serialized: [`Store::start_transaction`] blocks until the previous [`Transaction`] is finished.
///
/// If a [path](StoreOptions::with_path) is given, committed transactions are appended to a record log
/// replayed when the store is opened again.
///
/// Usage example:
/// ```
/// use oxstore::Store;
/// use oxterm::*;
///
/// let store = Store::new()?;
/// let ex = NamedNode::new("http://example.com")?;
/// let quad = Quad::new(ex.clone(), ex.clone(), ex.clone(), GraphName::DefaultGraph);
///
/// let before = store.snapshot();
/// store.insert(&quad)?;
/// assert!(!before.contains(&quad));
/// assert!(store.snapshot().contains(&quad));
/// # Result::<_, Box<dyn std::error::Error>>::Ok(())
/// ```
#[derive(Clone)]
pub struct Store {
    core: Arc<StorageCore>,
}

impl Store {
    /// Creates a temporary in-memory [`Store`].
    pub fn new() -> Result<Self, StorageError> {
        Self::with_options(StoreOptions::default())
    }

    /// Opens a persistent [`Store`] whose record log is in the directory `path`, replaying it.
    ///
    /// The directory is created if it does not exist.
    pub fn open(path: impl AsRef<Path>) -> Result<Self, StorageError> {
        Self::with_options(StoreOptions::default().with_path(path.as_ref()))
    }

    pub fn with_options(options: StoreOptions) -> Result<Self, StorageError> {
        Ok(Self {
            core: StorageCore::open(options)?,
        })
    }

    #[inline]
    pub fn options(&self) -> &StoreOptions {
        &self.core.options
    }

    /// Pins the latest committed snapshot.
    ///
    /// Statement versions visible from it are not garbage collected until it is dropped.
    pub fn snapshot(&self) -> Snapshot {
        Snapshot {
            pin: Arc::new(self.core.pin()),
        }
    }

    /// Starts a write transaction, waiting for the current one to finish if there is one.
    ///
    /// The changes are only visible to other readers after [`Transaction::commit`].
    ///
    /// ```
    /// use oxstore::Store;
    /// use oxterm::*;
    ///
    /// let store = Store::new()?;
    /// let ex = NamedNode::new("http://example.com")?;
    /// let quad = Quad::new(ex.clone(), ex.clone(), ex.clone(), GraphName::DefaultGraph);
    ///
    /// let mut transaction = store.start_transaction()?;
    /// transaction.insert(&quad);
    /// assert!(transaction.contains(&quad));
    /// assert!(!store.contains(&quad));
    /// transaction.commit()?;
    /// assert!(store.contains(&quad));
    /// # Result::<_, Box<dyn std::error::Error>>::Ok(())
    /// ```
    pub fn start_transaction(&self) -> Result<Transaction<'_>, StorageError> {
        Ok(Transaction {
            core: &self.core,
            writer: self.core.begin()?,
        })
    }

    /// Opens a [`Connection`], a stateful handle with explicit `begin`, `commit` and `rollback`.
    pub fn connection(&self) -> Connection<'_> {
        Connection::new(self)
    }

    /// Inserts an explicit quad in its own transaction.
    ///
    /// Returns `true` if the quad was not already in the store.
    pub fn insert(&self, quad: &Quad) -> Result<bool, StorageError> {
        let mut transaction = self.start_transaction()?;
        let inserted = transaction.insert(quad);
        transaction.commit()?;
        Ok(inserted)
    }

    /// Inserts explicit quads in a single transaction.
    pub fn extend<'a>(&self, quads: impl IntoIterator<Item = &'a Quad>) -> Result<(), StorageError> {
        let mut transaction = self.start_transaction()?;
        for quad in quads {
            transaction.insert(quad);
        }
        transaction.commit()?;
        Ok(())
    }

    /// Removes an explicit quad in its own transaction.
    ///
    /// Returns `true` if the quad was in the store.
    pub fn remove(&self, quad: &Quad) -> Result<bool, StorageError> {
        let mut transaction = self.start_transaction()?;
        let removed = transaction.remove(quad);
        transaction.commit()?;
        Ok(removed)
    }

    /// Retrieves the quads matching a pattern in the latest snapshot, inferred quads included.
    pub fn quads_for_pattern(
        &self,
        subject: Option<&NamedOrBlankNode>,
        predicate: Option<&NamedNode>,
        object: Option<&Term>,
        graph_name: Option<&GraphName>,
    ) -> QuadCursor<'static> {
        self.snapshot()
            .quads_for_pattern(subject, predicate, object, graph_name)
    }

    pub fn contains(&self, quad: &Quad) -> bool {
        self.snapshot().contains(quad)
    }

    /// The number of quads in the latest snapshot.
    ///
    /// <div class="warning">This function executes a full scan.</div>
    pub fn len(&self) -> usize {
        self.snapshot().len()
    }

    pub fn is_empty(&self) -> bool {
        self.snapshot().is_empty()
    }

    /// Physically removes the statement versions no pinned snapshot can see anymore.
    ///
    /// Returns the number of reclaimed versions. Only useful if [`StoreOptions::with_gc_on_commit`] is disabled.
    pub fn collect_garbage(&self) -> Result<usize, StorageError> {
        self.core.collect_garbage()
    }

    /// Rewrites the record log as a single record holding the current content.
    ///
    /// Does nothing for a store without path.
    pub fn compact(&self) -> Result<(), StorageError> {
        self.core.compact()
    }

    /// Validates that all the store invariants hold in the data.
    ///
    /// Waits for the current transaction to finish.
    #[doc(hidden)]
    pub fn validate(&self) -> Result<(), StorageError> {
        self.core.validate()
    }
}

impl fmt::Debug for Store {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Store")
            .field("options", &self.core.options)
            .field("snapshot", &self.core.snapshots.current())
            .field("pinned_snapshots", &self.core.snapshots.pinned_count())
            .field("terms", &self.core.dictionary.len())
            .finish_non_exhaustive()
    }
}

/// A read-only view of a [`Store`] at a given snapshot.
///
/// It is cheap to clone and can be sent to other threads.
#[derive(Clone)]
pub struct Snapshot {
    pin: Arc<SnapshotPin>,
}

impl Snapshot {
    /// The snapshot number, the number of committed transactions that are visible from it.
    #[inline]
    pub fn id(&self) -> u64 {
        self.pin.snapshot()
    }

    #[inline]
    fn core(&self) -> &Arc<StorageCore> {
        self.pin.core()
    }

    /// Retrieves the quads matching a pattern, inferred quads included.
    pub fn quads_for_pattern(
        &self,
        subject: Option<&NamedOrBlankNode>,
        predicate: Option<&NamedNode>,
        object: Option<&Term>,
        graph_name: Option<&GraphName>,
    ) -> QuadCursor<'static> {
        let patterns = self
            .core()
            .encode_pattern(subject, predicate, object, graph_name)
            .into_iter()
            .collect();
        self.cursor(patterns, true)
    }

    /// Retrieves the quads matching a pattern in any of the given contexts, all contexts if `contexts` is empty.
    pub fn statements(
        &self,
        subject: Option<&NamedOrBlankNode>,
        predicate: Option<&NamedNode>,
        object: Option<&Term>,
        contexts: &[GraphName],
        include_inferred: bool,
    ) -> QuadCursor<'static> {
        let patterns = encode_patterns(self.core(), subject, predicate, object, contexts);
        self.cursor(patterns, include_inferred)
    }

    fn cursor(&self, patterns: Vec<EncodedPattern>, include_inferred: bool) -> QuadCursor<'static> {
        QuadCursor::new(
            Arc::clone(self.core()),
            self.id(),
            patterns,
            include_inferred,
            Some(Arc::clone(&self.pin)),
        )
    }

    pub fn contains(&self, quad: &Quad) -> bool {
        contains(self.core(), self.id(), quad)
    }

    /// The number of quads, inferred ones included.
    pub fn len(&self) -> usize {
        count(self.core(), self.id(), &[EncodedPattern::default()], true)
    }

    pub fn is_empty(&self) -> bool {
        self.core()
            .index
            .scan(EncodedPattern::default(), self.id(), true)
            .next()
            .is_none()
    }

    /// The number of statements in the given contexts, all contexts if `contexts` is empty.
    pub fn size(&self, contexts: &[GraphName], include_inferred: bool) -> usize {
        let patterns = encode_patterns(self.core(), None, None, None, contexts);
        count(self.core(), self.id(), &patterns, include_inferred)
    }

    /// The named graphs containing at least one quad.
    pub fn context_ids(&self) -> Result<Vec<NamedOrBlankNode>, StorageError> {
        context_ids(self.core(), self.id())
    }

    /// The namespace declarations.
    ///
    /// Namespaces are not versioned: the latest committed declarations are returned.
    pub fn namespaces(&self) -> BTreeMap<String, String> {
        self.core().namespaces()
    }

    /// The namespace IRI bound to `prefix`.
    pub fn namespace(&self, prefix: &str) -> Option<String> {
        self.core().namespaces().remove(prefix)
    }

    /// The dataset to give to [`QueryEvaluator::execute`].
    pub fn dataset(&self) -> QueryDataset<'static> {
        QueryDataset::new(Arc::clone(self.core()), self.id(), Some(Arc::clone(&self.pin)))
    }

    /// Evaluates a graph pattern with the [default timeout](StoreOptions::with_default_timeout).
    pub fn evaluate(
        &self,
        pattern: &GraphPattern,
        bindings: &BindingSet,
        include_inferred: bool,
    ) -> Result<BindingCursor<'static>, EvaluationError> {
        evaluator(&self.core().options, include_inferred).execute(self.dataset(), pattern, bindings)
    }
}

impl fmt::Debug for Snapshot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Snapshot").field("id", &self.id()).finish()
    }
}

/// A read-write transaction on a [`Store`], see [`Store::start_transaction`].
///
/// Reads see the committed state the transaction started from together with its own changes.
/// Dropping the transaction without committing rolls it back.
#[must_use]
pub struct Transaction<'a> {
    core: &'a Arc<StorageCore>,
    writer: StorageWriter<'a>,
}

impl<'a> Transaction<'a> {
    /// Inserts an explicit quad. Returns `true` if it was not already there.
    ///
    /// An inferred copy of the quad is replaced by the explicit one.
    pub fn insert(&mut self, quad: &Quad) -> bool {
        self.writer.insert(quad, true)
    }

    /// Inserts an inferred quad. Returns `true` if it was not already there, explicit or inferred.
    pub fn insert_inferred(&mut self, quad: &Quad) -> bool {
        self.writer.insert(quad, false)
    }

    /// Removes an explicit quad. Returns `true` if it was there.
    pub fn remove(&mut self, quad: &Quad) -> bool {
        self.writer.remove(quad, true)
    }

    /// Removes the explicit quads matching a pattern in any of the given contexts, all contexts if `contexts` is empty.
    ///
    /// Returns the number of removed quads.
    pub fn remove_pattern(
        &mut self,
        subject: Option<&NamedOrBlankNode>,
        predicate: Option<&NamedNode>,
        object: Option<&Term>,
        contexts: &[GraphName],
    ) -> usize {
        self.remove_matching(subject, predicate, object, contexts, true)
    }

    /// Removes the inferred quads matching a pattern in any of the given contexts, all contexts if `contexts` is empty.
    pub fn remove_inferred(
        &mut self,
        subject: Option<&NamedOrBlankNode>,
        predicate: Option<&NamedNode>,
        object: Option<&Term>,
        contexts: &[GraphName],
    ) -> usize {
        self.remove_matching(subject, predicate, object, contexts, false)
    }

    /// Removes all the explicit quads of the given contexts, all contexts if `contexts` is empty.
    pub fn clear(&mut self, contexts: &[GraphName]) -> usize {
        self.remove_matching(None, None, None, contexts, true)
    }

    fn remove_matching(
        &mut self,
        subject: Option<&NamedOrBlankNode>,
        predicate: Option<&NamedNode>,
        object: Option<&Term>,
        contexts: &[GraphName],
        explicit: bool,
    ) -> usize {
        encode_patterns(self.core, subject, predicate, object, contexts)
            .into_iter()
            .map(|pattern| self.writer.remove_matching(pattern, explicit))
            .sum()
    }

    pub fn set_namespace(&mut self, prefix: impl Into<String>, namespace: impl Into<String>) {
        self.writer.set_namespace(prefix.into(), namespace.into())
    }

    pub fn remove_namespace(&mut self, prefix: impl Into<String>) {
        self.writer.remove_namespace(prefix.into())
    }

    pub fn clear_namespaces(&mut self) {
        self.writer.clear_namespaces()
    }

    /// The namespaces including the changes of this transaction.
    pub fn namespaces(&self) -> BTreeMap<String, String> {
        self.writer.namespaces()
    }

    pub fn namespace(&self, prefix: &str) -> Option<String> {
        self.writer.namespaces().remove(prefix)
    }

    /// Retrieves the quads matching a pattern, changes of this transaction and inferred quads included.
    pub fn quads_for_pattern(
        &self,
        subject: Option<&NamedOrBlankNode>,
        predicate: Option<&NamedNode>,
        object: Option<&Term>,
        graph_name: Option<&GraphName>,
    ) -> QuadCursor<'_> {
        let patterns = self
            .core
            .encode_pattern(subject, predicate, object, graph_name)
            .into_iter()
            .collect();
        QuadCursor::new(Arc::clone(self.core), PENDING, patterns, true, None)
    }

    /// Retrieves the quads matching a pattern in any of the given contexts, all contexts if `contexts` is empty.
    pub fn statements(
        &self,
        subject: Option<&NamedOrBlankNode>,
        predicate: Option<&NamedNode>,
        object: Option<&Term>,
        contexts: &[GraphName],
        include_inferred: bool,
    ) -> QuadCursor<'_> {
        let patterns = encode_patterns(self.core, subject, predicate, object, contexts);
        QuadCursor::new(Arc::clone(self.core), PENDING, patterns, include_inferred, None)
    }

    pub fn contains(&self, quad: &Quad) -> bool {
        contains(self.core, PENDING, quad)
    }

    /// The number of quads, inferred ones included.
    pub fn len(&self) -> usize {
        self.writer.len()
    }

    pub fn is_empty(&self) -> bool {
        self.writer.len() == 0
    }

    /// The number of statements in the given contexts, all contexts if `contexts` is empty.
    pub fn size(&self, contexts: &[GraphName], include_inferred: bool) -> usize {
        let patterns = encode_patterns(self.core, None, None, None, contexts);
        count(self.core, PENDING, &patterns, include_inferred)
    }

    pub fn context_ids(&self) -> Result<Vec<NamedOrBlankNode>, StorageError> {
        context_ids(self.core, PENDING)
    }

    /// The dataset to give to [`QueryEvaluator::execute`]: the state seen by this transaction.
    pub fn dataset(&self) -> QueryDataset<'_> {
        QueryDataset::new(Arc::clone(self.core), PENDING, None)
    }

    /// Evaluates a graph pattern against the state seen by this transaction.
    pub fn evaluate(
        &self,
        pattern: &GraphPattern,
        bindings: &BindingSet,
        include_inferred: bool,
    ) -> Result<BindingCursor<'_>, EvaluationError> {
        evaluator(&self.core.options, include_inferred).execute(self.dataset(), pattern, bindings)
    }

    /// Commits the changes and returns the number of the new snapshot.
    ///
    /// If the record log can't be written, the transaction is rolled back and the error returned.
    pub fn commit(self) -> Result<u64, StorageError> {
        self.writer.commit()
    }

    /// Discards the changes.
    pub fn rollback(self) {
        self.writer.rollback()
    }
}

impl fmt::Debug for Transaction<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Transaction").finish_non_exhaustive()
    }
}

fn evaluator(options: &StoreOptions, include_inferred: bool) -> QueryEvaluator {
    let mut evaluator = QueryEvaluator::new();
    if let Some(timeout) = options.default_timeout() {
        evaluator = evaluator.with_timeout(timeout);
    }
    if !include_inferred {
        evaluator = evaluator.without_inferred();
    }
    evaluator
}

/// One pattern per known context. Unknown terms match nothing.
fn encode_patterns(
    core: &StorageCore,
    subject: Option<&NamedOrBlankNode>,
    predicate: Option<&NamedNode>,
    object: Option<&Term>,
    contexts: &[GraphName],
) -> Vec<EncodedPattern> {
    let Some(pattern) = core.encode_pattern(subject, predicate, object, None) else {
        return Vec::new();
    };
    if contexts.is_empty() {
        return vec![pattern];
    }
    let mut graph_names = Vec::with_capacity(contexts.len());
    for context in contexts {
        if let Some(graph_name) = core.dictionary.lookup_graph_name(context) {
            // the same context given twice is only scanned once
            if !graph_names.contains(&graph_name) {
                graph_names.push(graph_name);
            }
        }
    }
    graph_names
        .into_iter()
        .map(|graph_name| EncodedPattern {
            graph_name: Some(graph_name),
            ..pattern
        })
        .collect()
}

fn contains(core: &StorageCore, snapshot: u64, quad: &Quad) -> bool {
    let Some(quad) = core.lookup_quad(quad) else {
        return false;
    };
    let pattern = EncodedPattern {
        subject: Some(quad.subject),
        predicate: Some(quad.predicate),
        object: Some(quad.object),
        graph_name: Some(quad.graph_name),
    };
    core.index.scan(pattern, snapshot, true).next().is_some()
}

fn count(
    core: &StorageCore,
    snapshot: u64,
    patterns: &[EncodedPattern],
    include_inferred: bool,
) -> usize {
    patterns
        .iter()
        .map(|pattern| core.index.scan(*pattern, snapshot, include_inferred).count())
        .sum()
}

fn context_ids(core: &StorageCore, snapshot: u64) -> Result<Vec<NamedOrBlankNode>, StorageError> {
    let mut seen = FxHashSet::<TermId>::default();
    let mut contexts = Vec::new();
    for entry in core.index.scan(EncodedPattern::default(), snapshot, true) {
        let graph_name = entry.quad.graph_name;
        if graph_name.is_default_graph() || !seen.insert(graph_name) {
            continue;
        }
        let term = core.dictionary.resolve(graph_name)?;
        contexts.push(
            NamedOrBlankNode::try_from(term.term().clone()).map_err(CorruptionError::new)?,
        );
    }
    Ok(contexts)
}

/// A cursor over the quads matching a pattern, see [`Snapshot::quads_for_pattern`].
///
/// It keeps its snapshot pinned until it is closed or dropped.
#[must_use]
pub struct QuadCursor<'a> {
    core: Arc<StorageCore>,
    snapshot: u64,
    include_inferred: bool,
    patterns: vec::IntoIter<EncodedPattern>,
    current: Option<Scan>,
    pin: Option<Arc<SnapshotPin>>,
    _lifetime: PhantomData<&'a ()>,
}

impl QuadCursor<'_> {
    fn new(
        core: Arc<StorageCore>,
        snapshot: u64,
        patterns: Vec<EncodedPattern>,
        include_inferred: bool,
        pin: Option<Arc<SnapshotPin>>,
    ) -> Self {
        Self {
            core,
            snapshot,
            include_inferred,
            patterns: patterns.into_iter(),
            current: None,
            pin,
            _lifetime: PhantomData,
        }
    }
}

impl Cursor for QuadCursor<'_> {
    type Item = Quad;
    type Error = StorageError;

    fn next(&mut self) -> Result<Option<Quad>, StorageError> {
        loop {
            if let Some(entry) = self.current.as_mut().and_then(Iterator::next) {
                return match self.core.decode_quad(&entry.quad) {
                    Ok(quad) => Ok(Some(quad)),
                    Err(e) => {
                        self.close();
                        Err(e.into())
                    }
                };
            }
            let Some(pattern) = self.patterns.next() else {
                self.close();
                return Ok(None);
            };
            self.current = Some(
                self.core
                    .index
                    .scan(pattern, self.snapshot, self.include_inferred),
            );
        }
    }

    fn close(&mut self) {
        self.current = None;
        self.patterns = Vec::new().into_iter();
        self.pin = None;
    }
}

impl IntoIterator for QuadCursor<'_> {
    type Item = Result<Quad, StorageError>;
    type IntoIter = CursorIter<Self>;

    #[inline]
    fn into_iter(self) -> CursorIter<Self> {
        self.into_results()
    }
}
