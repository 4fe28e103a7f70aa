use crate::error::CorruptionError;
use crate::storage::dictionary::TermId;
use dashmap::DashMap;
use rustc_hash::{FxBuildHasher, FxHashSet};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, PoisonError, RwLock};

/// Snapshot stamp of an unset bound: an entry with `since == NEVER` has been aborted
/// and an entry with `till == NEVER` has not been removed.
pub(crate) const NEVER: u64 = u64::MAX;
/// Snapshot stamp of the changes staged by the running write transaction.
///
/// It is above every committed snapshot so only the write transaction itself reads at it.
pub(crate) const PENDING: u64 = u64::MAX - 1;

#[derive(Eq, PartialEq, Debug, Clone, Copy, Hash)]
pub(crate) struct EncodedQuad {
    pub subject: TermId,
    pub predicate: TermId,
    pub object: TermId,
    pub graph_name: TermId,
}

/// A quad version with its visibility window `[since, till)`.
#[derive(Debug)]
pub(crate) struct Entry {
    pub quad: EncodedQuad,
    pub explicit: bool,
    since: AtomicU64,
    till: AtomicU64,
}

impl Entry {
    pub fn new(quad: EncodedQuad, explicit: bool, since: u64) -> Self {
        Self {
            quad,
            explicit,
            since: AtomicU64::new(since),
            till: AtomicU64::new(NEVER),
        }
    }

    #[inline]
    pub fn since(&self) -> u64 {
        self.since.load(Ordering::Acquire)
    }

    #[inline]
    pub fn till(&self) -> u64 {
        self.till.load(Ordering::Acquire)
    }

    #[inline]
    pub fn set_since(&self, since: u64) {
        self.since.store(since, Ordering::Release)
    }

    #[inline]
    pub fn set_till(&self, till: u64) {
        self.till.store(till, Ordering::Release)
    }

    #[inline]
    pub fn is_aborted(&self) -> bool {
        self.since() == NEVER
    }

    #[inline]
    pub fn is_visible(&self, snapshot: u64) -> bool {
        self.since() <= snapshot && snapshot < self.till()
    }
}

/// Copy-on-write list of entries: readers clone the `Arc` and never hold a lock while scanning.
pub(crate) type EntryList = Arc<Vec<Arc<Entry>>>;

/// A quad pattern over term identifiers, `None` being the wildcard.
#[derive(Debug, Clone, Copy, Default)]
pub(crate) struct EncodedPattern {
    pub subject: Option<TermId>,
    pub predicate: Option<TermId>,
    pub object: Option<TermId>,
    pub graph_name: Option<TermId>,
}

impl EncodedPattern {
    #[inline]
    pub fn matches(&self, quad: &EncodedQuad) -> bool {
        self.subject.is_none_or(|s| s == quad.subject)
            && self.predicate.is_none_or(|p| p == quad.predicate)
            && self.object.is_none_or(|o| o == quad.object)
            && self.graph_name.is_none_or(|g| g == quad.graph_name)
    }
}

/// The four role-indexed occurrence lists and the list of all entries.
///
/// Mutations only happen under the store writer lock.
pub(crate) struct StatementIndex {
    by_subject: DashMap<TermId, EntryList, FxBuildHasher>,
    by_predicate: DashMap<TermId, EntryList, FxBuildHasher>,
    by_object: DashMap<TermId, EntryList, FxBuildHasher>,
    by_graph: DashMap<TermId, EntryList, FxBuildHasher>,
    all: RwLock<EntryList>,
}

impl StatementIndex {
    pub fn new() -> Self {
        Self {
            by_subject: DashMap::with_hasher(FxBuildHasher),
            by_predicate: DashMap::with_hasher(FxBuildHasher),
            by_object: DashMap::with_hasher(FxBuildHasher),
            by_graph: DashMap::with_hasher(FxBuildHasher),
            all: RwLock::new(Arc::new(Vec::new())),
        }
    }

    pub fn insert(&self, entry: &Arc<Entry>) {
        let quad = entry.quad;
        for (map, key) in [
            (&self.by_subject, quad.subject),
            (&self.by_predicate, quad.predicate),
            (&self.by_object, quad.object),
            (&self.by_graph, quad.graph_name),
        ] {
            Arc::make_mut(&mut *map.entry(key).or_default()).push(Arc::clone(entry));
        }
        Arc::make_mut(&mut *self.all.write().unwrap_or_else(PoisonError::into_inner))
            .push(Arc::clone(entry));
    }

    /// Picks the smallest occurrence list able to answer the pattern.
    ///
    /// Ties prefer subject, then object, then context, then predicate.
    /// A bound component without any occurrence returns an empty list.
    pub fn candidates(&self, pattern: &EncodedPattern) -> EntryList {
        let mut best: Option<EntryList> = None;
        for (map, key) in [
            (&self.by_subject, pattern.subject),
            (&self.by_object, pattern.object),
            (&self.by_graph, pattern.graph_name),
            (&self.by_predicate, pattern.predicate),
        ] {
            let Some(key) = key else {
                continue;
            };
            let Some(list) = map.get(&key).map(|l| Arc::clone(l.value())) else {
                return Arc::default();
            };
            if best.as_ref().is_none_or(|b| list.len() < b.len()) {
                best = Some(list);
            }
        }
        best.unwrap_or_else(|| self.all())
    }

    pub fn all(&self) -> EntryList {
        Arc::clone(&self.all.read().unwrap_or_else(PoisonError::into_inner))
    }

    /// Iterates the entries matching `pattern` visible at `snapshot`.
    pub fn scan(&self, pattern: EncodedPattern, snapshot: u64, include_inferred: bool) -> Scan {
        Scan {
            list: self.candidates(&pattern),
            position: 0,
            pattern,
            snapshot,
            include_inferred,
        }
    }

    /// Physically deletes the given entries from all lists.
    pub fn remove_all(&self, garbage: &[Arc<Entry>]) {
        if garbage.is_empty() {
            return;
        }
        let dead = garbage
            .iter()
            .map(|e| Arc::as_ptr(e).addr())
            .collect::<FxHashSet<_>>();
        let mut subjects = FxHashSet::default();
        let mut predicates = FxHashSet::default();
        let mut objects = FxHashSet::default();
        let mut graphs = FxHashSet::default();
        for entry in garbage {
            subjects.insert(entry.quad.subject);
            predicates.insert(entry.quad.predicate);
            objects.insert(entry.quad.object);
            graphs.insert(entry.quad.graph_name);
        }
        for (map, keys) in [
            (&self.by_subject, subjects),
            (&self.by_predicate, predicates),
            (&self.by_object, objects),
            (&self.by_graph, graphs),
        ] {
            for key in keys {
                let is_empty = if let Some(mut list) = map.get_mut(&key) {
                    retain_alive(list.value_mut(), &dead);
                    list.is_empty()
                } else {
                    false
                };
                if is_empty {
                    map.remove_if(&key, |_, l| l.is_empty());
                }
            }
        }
        retain_alive(
            &mut self.all.write().unwrap_or_else(PoisonError::into_inner),
            &dead,
        );
    }

    /// Checks that the occurrence lists agree with the list of all entries.
    pub fn validate(&self) -> Result<(), CorruptionError> {
        let all = self.all();
        let mut expected = FxHashSet::default();
        for entry in all.iter() {
            if !expected.insert(Arc::as_ptr(entry).addr()) {
                return Err(CorruptionError::msg(format!(
                    "The entry {:?} is listed twice",
                    entry.quad
                )));
            }
            let (since, till) = (entry.since(), entry.till());
            if since != NEVER && till != NEVER && since >= till {
                return Err(CorruptionError::msg(format!(
                    "The entry {:?} is removed at {till} before being added at {since}",
                    entry.quad
                )));
            }
            for (name, map, key) in [
                ("subject", &self.by_subject, entry.quad.subject),
                ("predicate", &self.by_predicate, entry.quad.predicate),
                ("object", &self.by_object, entry.quad.object),
                ("graph", &self.by_graph, entry.quad.graph_name),
            ] {
                let listed = map
                    .get(&key)
                    .is_some_and(|l| l.iter().any(|e| Arc::ptr_eq(e, entry)));
                if !listed {
                    return Err(CorruptionError::msg(format!(
                        "The entry {:?} is missing from the {name} index",
                        entry.quad
                    )));
                }
            }
        }
        for (name, map) in [
            ("subject", &self.by_subject),
            ("predicate", &self.by_predicate),
            ("object", &self.by_object),
            ("graph", &self.by_graph),
        ] {
            let mut count = 0;
            for list in map {
                if list.is_empty() {
                    return Err(CorruptionError::msg(format!(
                        "The {name} index contains an empty list for {}",
                        list.key()
                    )));
                }
                for entry in list.iter() {
                    if !expected.contains(&(Arc::as_ptr(entry).addr())) {
                        return Err(CorruptionError::msg(format!(
                            "The {name} index contains the unknown entry {:?}",
                            entry.quad
                        )));
                    }
                }
                count += list.len();
            }
            if count != all.len() {
                return Err(CorruptionError::msg(format!(
                    "The {name} index has {count} entries instead of {}",
                    all.len()
                )));
            }
        }
        Ok(())
    }
}

fn retain_alive(list: &mut EntryList, dead: &FxHashSet<usize>) {
    if list.iter().any(|e| dead.contains(&(Arc::as_ptr(e).addr()))) {
        Arc::make_mut(list).retain(|e| !dead.contains(&(Arc::as_ptr(e).addr())));
    }
}

/// Iterator over the entries of an occurrence list matching a pattern at a given snapshot.
pub(crate) struct Scan {
    list: EntryList,
    position: usize,
    pattern: EncodedPattern,
    snapshot: u64,
    include_inferred: bool,
}

impl Iterator for Scan {
    type Item = Arc<Entry>;

    fn next(&mut self) -> Option<Arc<Entry>> {
        while let Some(entry) = self.list.get(self.position) {
            self.position += 1;
            if (self.include_inferred || entry.explicit)
                && self.pattern.matches(&entry.quad)
                && entry.is_visible(self.snapshot)
            {
                return Some(Arc::clone(entry));
            }
        }
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn quad(s: u64, p: u64, o: u64, g: u64) -> EncodedQuad {
        EncodedQuad {
            subject: TermId::for_tests(s),
            predicate: TermId::for_tests(p),
            object: TermId::for_tests(o),
            graph_name: TermId::for_tests(g),
        }
    }

    fn committed(index: &StatementIndex, quad: EncodedQuad, since: u64) -> Arc<Entry> {
        let entry = Arc::new(Entry::new(quad, true, since));
        index.insert(&entry);
        entry
    }

    #[test]
    fn visibility_window() {
        let entry = Entry::new(quad(1, 2, 3, 0), true, 2);
        assert!(!entry.is_visible(1));
        assert!(entry.is_visible(2));
        assert!(entry.is_visible(PENDING));
        entry.set_till(4);
        assert!(entry.is_visible(3));
        assert!(!entry.is_visible(4));
        let staged = Entry::new(quad(1, 2, 3, 0), true, PENDING);
        assert!(!staged.is_visible(10));
        assert!(staged.is_visible(PENDING));
    }

    #[test]
    fn selects_smallest_list() {
        let index = StatementIndex::new();
        for o in 10..20 {
            committed(&index, quad(1, 2, o, 0), 1);
        }
        committed(&index, quad(3, 2, 10, 0), 1);
        let pattern = EncodedPattern {
            subject: Some(TermId::for_tests(3)),
            predicate: Some(TermId::for_tests(2)),
            ..EncodedPattern::default()
        };
        assert_eq!(index.candidates(&pattern).len(), 1);
        let pattern = EncodedPattern {
            predicate: Some(TermId::for_tests(2)),
            object: Some(TermId::for_tests(10)),
            ..EncodedPattern::default()
        };
        assert_eq!(index.candidates(&pattern).len(), 2);
        assert_eq!(index.candidates(&EncodedPattern::default()).len(), 11);
        let pattern = EncodedPattern {
            subject: Some(TermId::for_tests(42)),
            ..EncodedPattern::default()
        };
        assert!(index.candidates(&pattern).is_empty());
    }

    #[test]
    fn scan_filters_by_pattern_and_snapshot() {
        let index = StatementIndex::new();
        committed(&index, quad(1, 2, 3, 0), 1);
        let removed = committed(&index, quad(1, 2, 4, 0), 1);
        removed.set_till(2);
        committed(&index, quad(1, 2, 5, 0), 3);
        let pattern = EncodedPattern {
            subject: Some(TermId::for_tests(1)),
            ..EncodedPattern::default()
        };
        assert_eq!(index.scan(pattern, 1, true).count(), 2);
        assert_eq!(index.scan(pattern, 2, true).count(), 1);
        assert_eq!(index.scan(pattern, 3, true).count(), 2);
    }

    #[test]
    fn scan_skips_inferred() {
        let index = StatementIndex::new();
        index.insert(&Arc::new(Entry::new(quad(1, 2, 3, 0), false, 1)));
        assert_eq!(index.scan(EncodedPattern::default(), 1, true).count(), 1);
        assert_eq!(index.scan(EncodedPattern::default(), 1, false).count(), 0);
    }

    #[test]
    fn remove_all_keeps_lists_consistent() -> Result<(), CorruptionError> {
        let index = StatementIndex::new();
        let a = committed(&index, quad(1, 2, 3, 0), 1);
        committed(&index, quad(1, 2, 4, 0), 1);
        let c = committed(&index, quad(5, 6, 7, 8), 1);
        let scan = index.all();
        index.remove_all(&[a, c]);
        index.validate()?;
        assert_eq!(index.all().len(), 1);
        assert_eq!(scan.len(), 3, "a running scan keeps its own copy");
        let pattern = EncodedPattern {
            graph_name: Some(TermId::for_tests(8)),
            ..EncodedPattern::default()
        };
        assert!(index.candidates(&pattern).is_empty());
        Ok(())
    }
}
