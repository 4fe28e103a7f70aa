use crate::binding::BindingSet;
use crate::error::{EvaluationError, StorageError, TransactionError};
use crate::eval::BindingCursor;
use crate::store::{QuadCursor, Store, Transaction};
use oxalgebra::GraphPattern;
use oxterm::{GraphName, NamedNode, NamedOrBlankNode, Quad, Term};
use std::collections::BTreeMap;

/// A stateful handle on a [`Store`] with an explicit transaction protocol.
///
/// Writes require an active transaction started by [`begin`](Self::begin).
/// Reads outside of a transaction see the latest committed snapshot, reads inside see the transaction changes.
/// Dropping the connection rolls back its active transaction.
///
/// ```
/// use oxstore::{Store, TransactionError};
/// use oxterm::*;
///
/// let store = Store::new()?;
/// let ex = NamedNode::new("http://example.com")?;
/// let quad = Quad::new(ex.clone(), ex.clone(), ex.clone(), GraphName::DefaultGraph);
///
/// let mut connection = store.connection();
/// assert!(matches!(connection.add(&quad), Err(TransactionError::NotActive)));
/// connection.begin()?;
/// connection.add(&quad)?;
/// assert_eq!(connection.size(&[]), 1);
/// connection.commit()?;
/// assert!(store.contains(&quad));
/// # Result::<_, Box<dyn std::error::Error>>::Ok(())
/// ```
#[must_use]
pub struct Connection<'a> {
    store: &'a Store,
    transaction: Option<Transaction<'a>>,
}

impl<'a> Connection<'a> {
    pub(crate) fn new(store: &'a Store) -> Self {
        Self {
            store,
            transaction: None,
        }
    }

    /// Starts a transaction, blocking until the writer of another connection is done.
    pub fn begin(&mut self) -> Result<(), TransactionError> {
        if self.transaction.is_some() {
            return Err(TransactionError::AlreadyActive);
        }
        self.transaction = Some(self.store.start_transaction()?);
        Ok(())
    }

    /// Commits the active transaction and returns the number of the new snapshot.
    pub fn commit(&mut self) -> Result<u64, TransactionError> {
        let transaction = self
            .transaction
            .take()
            .ok_or(TransactionError::NotActive)?;
        Ok(transaction.commit()?)
    }

    pub fn rollback(&mut self) -> Result<(), TransactionError> {
        self.transaction
            .take()
            .ok_or(TransactionError::NotActive)?
            .rollback();
        Ok(())
    }

    #[inline]
    pub fn is_active(&self) -> bool {
        self.transaction.is_some()
    }

    fn active(&mut self) -> Result<&mut Transaction<'a>, TransactionError> {
        self.transaction.as_mut().ok_or(TransactionError::NotActive)
    }

    /// Adds an explicit statement. Returns `true` if it was not already there.
    pub fn add(&mut self, quad: &Quad) -> Result<bool, TransactionError> {
        Ok(self.active()?.insert(quad))
    }

    /// Adds an inferred statement. Returns `true` if it was not already there.
    pub fn add_inferred(&mut self, quad: &Quad) -> Result<bool, TransactionError> {
        Ok(self.active()?.insert_inferred(quad))
    }

    /// Removes the explicit statements matching a pattern in the given contexts, all contexts if `contexts` is empty.
    pub fn remove(
        &mut self,
        subject: Option<&NamedOrBlankNode>,
        predicate: Option<&NamedNode>,
        object: Option<&Term>,
        contexts: &[GraphName],
    ) -> Result<usize, TransactionError> {
        Ok(self
            .active()?
            .remove_pattern(subject, predicate, object, contexts))
    }

    /// Removes the inferred statements matching a pattern in the given contexts, all contexts if `contexts` is empty.
    pub fn remove_inferred(
        &mut self,
        subject: Option<&NamedOrBlankNode>,
        predicate: Option<&NamedNode>,
        object: Option<&Term>,
        contexts: &[GraphName],
    ) -> Result<usize, TransactionError> {
        Ok(self
            .active()?
            .remove_inferred(subject, predicate, object, contexts))
    }

    /// Removes the explicit statements of the given contexts, all contexts if `contexts` is empty.
    pub fn clear(&mut self, contexts: &[GraphName]) -> Result<usize, TransactionError> {
        Ok(self.active()?.clear(contexts))
    }

    pub fn set_namespace(
        &mut self,
        prefix: impl Into<String>,
        namespace: impl Into<String>,
    ) -> Result<(), TransactionError> {
        self.active()?.set_namespace(prefix, namespace);
        Ok(())
    }

    pub fn remove_namespace(&mut self, prefix: impl Into<String>) -> Result<(), TransactionError> {
        self.active()?.remove_namespace(prefix);
        Ok(())
    }

    pub fn clear_namespaces(&mut self) -> Result<(), TransactionError> {
        self.active()?.clear_namespaces();
        Ok(())
    }

    pub fn namespaces(&self) -> BTreeMap<String, String> {
        match &self.transaction {
            Some(transaction) => transaction.namespaces(),
            None => self.store.snapshot().namespaces(),
        }
    }

    pub fn namespace(&self, prefix: &str) -> Option<String> {
        match &self.transaction {
            Some(transaction) => transaction.namespace(prefix),
            None => self.store.snapshot().namespace(prefix),
        }
    }

    /// Evaluates a graph pattern with the [default timeout](crate::StoreOptions::with_default_timeout).
    pub fn evaluate(
        &self,
        pattern: &GraphPattern,
        bindings: &BindingSet,
        include_inferred: bool,
    ) -> Result<BindingCursor<'_>, EvaluationError> {
        match &self.transaction {
            Some(transaction) => transaction.evaluate(pattern, bindings, include_inferred),
            None => self
                .store
                .snapshot()
                .evaluate(pattern, bindings, include_inferred),
        }
    }

    /// Retrieves the statements matching a pattern in the given contexts, all contexts if `contexts` is empty.
    pub fn get_statements(
        &self,
        subject: Option<&NamedOrBlankNode>,
        predicate: Option<&NamedNode>,
        object: Option<&Term>,
        contexts: &[GraphName],
        include_inferred: bool,
    ) -> QuadCursor<'_> {
        match &self.transaction {
            Some(transaction) => {
                transaction.statements(subject, predicate, object, contexts, include_inferred)
            }
            None => self.store.snapshot().statements(
                subject,
                predicate,
                object,
                contexts,
                include_inferred,
            ),
        }
    }

    /// The number of explicit statements in the given contexts, all contexts if `contexts` is empty.
    pub fn size(&self, contexts: &[GraphName]) -> usize {
        match &self.transaction {
            Some(transaction) => transaction.size(contexts, false),
            None => self.store.snapshot().size(contexts, false),
        }
    }

    /// The named graphs containing at least one statement.
    pub fn context_ids(&self) -> Result<Vec<NamedOrBlankNode>, StorageError> {
        match &self.transaction {
            Some(transaction) => transaction.context_ids(),
            None => self.store.snapshot().context_ids(),
        }
    }
}
