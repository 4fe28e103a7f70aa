use crate::error::CorruptionError;
use dashmap::DashMap;
use dashmap::mapref::entry::Entry;
use oxsdatatypes::{Boolean, Date, DateTime, Decimal, Double, Float, Integer, Time};
use oxterm::vocab::xsd;
use oxterm::{GraphName, Literal, NamedNode, Term};
use rustc_hash::FxBuildHasher;
use std::fmt;
use std::hash::{Hash, Hasher};
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

/// The identifier of a term interned in a store.
///
/// Identifiers are only meaningful inside the store that issued them.
#[derive(Eq, PartialEq, Ord, PartialOrd, Debug, Clone, Copy, Hash)]
pub struct TermId(u64);

impl TermId {
    /// The reserved identifier of the default graph, the "no context" marker.
    pub const DEFAULT_GRAPH: Self = Self(0);

    #[inline]
    pub fn is_default_graph(self) -> bool {
        self == Self::DEFAULT_GRAPH
    }

    #[cfg(test)]
    pub(crate) const fn for_tests(id: u64) -> Self {
        Self(id)
    }
}

impl fmt::Display for TermId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// The value of a literal with a supported XSD datatype, parsed once when the literal is interned.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum TypedValue {
    Boolean(Boolean),
    Integer(Integer),
    Decimal(Decimal),
    Float(Float),
    Double(Double),
    DateTime(DateTime),
    Date(Date),
    Time(Time),
}

impl TypedValue {
    /// Parses the value of a literal, returns `None` for unsupported datatypes and malformed lexical forms.
    pub fn parse(literal: &Literal) -> Option<Self> {
        let value = literal.value();
        Some(match literal.datatype() {
            xsd::BOOLEAN => Self::Boolean(value.parse().ok()?),
            xsd::INTEGER
            | xsd::BYTE
            | xsd::SHORT
            | xsd::INT
            | xsd::LONG
            | xsd::UNSIGNED_BYTE
            | xsd::UNSIGNED_SHORT
            | xsd::UNSIGNED_INT
            | xsd::UNSIGNED_LONG
            | xsd::POSITIVE_INTEGER
            | xsd::NEGATIVE_INTEGER
            | xsd::NON_POSITIVE_INTEGER
            | xsd::NON_NEGATIVE_INTEGER => Self::Integer(value.parse().ok()?),
            xsd::DECIMAL => Self::Decimal(value.parse().ok()?),
            xsd::FLOAT => Self::Float(value.parse().ok()?),
            xsd::DOUBLE => Self::Double(value.parse().ok()?),
            xsd::DATE_TIME | xsd::DATE_TIME_STAMP => Self::DateTime(value.parse().ok()?),
            xsd::DATE => Self::Date(value.parse().ok()?),
            xsd::TIME => Self::Time(value.parse().ok()?),
            _ => return None,
        })
    }

    #[inline]
    pub fn is_numeric(&self) -> bool {
        matches!(
            self,
            Self::Integer(_) | Self::Decimal(_) | Self::Float(_) | Self::Double(_)
        )
    }

    /// The datatype of the canonical literal representing this value.
    pub fn datatype(&self) -> &'static str {
        match self {
            Self::Boolean(_) => xsd::BOOLEAN,
            Self::Integer(_) => xsd::INTEGER,
            Self::Decimal(_) => xsd::DECIMAL,
            Self::Float(_) => xsd::FLOAT,
            Self::Double(_) => xsd::DOUBLE,
            Self::DateTime(_) => xsd::DATE_TIME,
            Self::Date(_) => xsd::DATE,
            Self::Time(_) => xsd::TIME,
        }
    }

    fn to_literal(self) -> Literal {
        let value = match self {
            Self::Boolean(v) => v.to_string(),
            Self::Integer(v) => v.to_string(),
            Self::Decimal(v) => v.to_string(),
            Self::Float(v) => v.to_string(),
            Self::Double(v) => v.to_string(),
            Self::DateTime(v) => v.to_string(),
            Self::Date(v) => v.to_string(),
            Self::Time(v) => v.to_string(),
        };
        Literal::new_typed_literal(value, NamedNode::new_unchecked(self.datatype()))
    }
}

impl From<bool> for TypedValue {
    #[inline]
    fn from(value: bool) -> Self {
        Self::Boolean(value.into())
    }
}

/// A term together with its dictionary identifier and its parsed value.
///
/// Terms computed during the evaluation (for example by a `BIND`) are not interned and have no identifier.
/// Equality and hashing only consider the term itself.
#[derive(Debug, Clone)]
pub struct InternedTerm {
    id: Option<TermId>,
    term: Term,
    value: Option<TypedValue>,
}

impl InternedTerm {
    /// Builds a term that is not part of the dictionary.
    pub fn new(term: impl Into<Term>) -> Self {
        let term = term.into();
        let value = if let Term::Literal(literal) = &term {
            TypedValue::parse(literal)
        } else {
            None
        };
        Self {
            id: None,
            term,
            value,
        }
    }

    /// Builds the canonical literal of a value.
    pub fn from_value(value: TypedValue) -> Self {
        Self {
            id: None,
            term: value.to_literal().into(),
            value: Some(value),
        }
    }

    #[inline]
    pub fn id(&self) -> Option<TermId> {
        self.id
    }

    #[inline]
    pub fn term(&self) -> &Term {
        &self.term
    }

    #[inline]
    pub fn value(&self) -> Option<&TypedValue> {
        self.value.as_ref()
    }

    #[inline]
    pub fn as_literal(&self) -> Option<&Literal> {
        if let Term::Literal(literal) = &self.term {
            Some(literal)
        } else {
            None
        }
    }

    #[inline]
    pub fn into_term(self) -> Term {
        self.term
    }
}

impl PartialEq for InternedTerm {
    #[inline]
    fn eq(&self, other: &Self) -> bool {
        if let (Some(a), Some(b)) = (self.id, other.id) {
            return a == b;
        }
        self.term == other.term
    }
}

impl Eq for InternedTerm {}

impl Hash for InternedTerm {
    #[inline]
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.term.hash(state)
    }
}

impl fmt::Display for InternedTerm {
    #[inline]
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.term.fmt(f)
    }
}

/// Interns terms into stable [`TermId`]s.
///
/// Entries are only ever added: an identifier stays valid for the lifetime of the store.
pub(crate) struct TermDictionary {
    next_id: AtomicU64,
    term2id: DashMap<Term, TermId, FxBuildHasher>,
    id2term: DashMap<TermId, Arc<InternedTerm>, FxBuildHasher>,
}

impl TermDictionary {
    pub fn new() -> Self {
        Self {
            next_id: AtomicU64::new(1),
            term2id: DashMap::with_hasher(FxBuildHasher),
            id2term: DashMap::with_hasher(FxBuildHasher),
        }
    }

    /// Returns the identifier of the term, adding it if needed.
    pub fn intern_id(&self, term: &Term) -> TermId {
        if let Some(id) = self.lookup(term) {
            return id;
        }
        match self.term2id.entry(term.clone()) {
            Entry::Occupied(entry) => *entry.get(),
            Entry::Vacant(entry) => {
                let id = TermId(self.next_id.fetch_add(1, Ordering::Relaxed));
                let mut interned = InternedTerm::new(term.clone());
                interned.id = Some(id);
                // id2term is filled before term2id so that every published id resolves
                self.id2term.insert(id, Arc::new(interned));
                entry.insert(id);
                id
            }
        }
    }

    pub fn intern_graph_name(&self, graph_name: &GraphName) -> TermId {
        match graph_name {
            GraphName::NamedNode(node) => self.intern_id(&node.clone().into()),
            GraphName::BlankNode(node) => self.intern_id(&node.clone().into()),
            GraphName::DefaultGraph => TermId::DEFAULT_GRAPH,
        }
    }

    /// Finds the identifier of a term without adding it.
    pub fn lookup(&self, term: &Term) -> Option<TermId> {
        self.term2id.get(term).map(|id| *id)
    }

    pub fn lookup_graph_name(&self, graph_name: &GraphName) -> Option<TermId> {
        match graph_name {
            GraphName::NamedNode(node) => self.lookup(&node.clone().into()),
            GraphName::BlankNode(node) => self.lookup(&node.clone().into()),
            GraphName::DefaultGraph => Some(TermId::DEFAULT_GRAPH),
        }
    }

    pub fn get(&self, term: &Term) -> Option<Arc<InternedTerm>> {
        let id = self.lookup(term)?;
        self.id2term.get(&id).map(|t| Arc::clone(t.value()))
    }

    /// Returns the interned term with the given identifier.
    pub fn resolve(&self, id: TermId) -> Result<Arc<InternedTerm>, CorruptionError> {
        self.id2term
            .get(&id)
            .map(|t| Arc::clone(t.value()))
            .ok_or_else(|| CorruptionError::msg(format!("The term {id} is not in the dictionary")))
    }

    pub fn resolve_graph_name(&self, id: TermId) -> Result<GraphName, CorruptionError> {
        if id.is_default_graph() {
            return Ok(GraphName::DefaultGraph);
        }
        match self.resolve(id)?.term() {
            Term::NamedNode(node) => Ok(node.clone().into()),
            Term::BlankNode(node) => Ok(node.clone().into()),
            Term::Literal(_) => Err(CorruptionError::msg(format!(
                "The graph name {id} is a literal"
            ))),
        }
    }

    pub fn len(&self) -> usize {
        self.id2term.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use oxterm::BlankNode;

    fn intern(dictionary: &TermDictionary, term: &Term) -> Arc<InternedTerm> {
        dictionary.resolve(dictionary.intern_id(term)).unwrap()
    }

    #[test]
    fn interning_is_idempotent() {
        let dictionary = TermDictionary::new();
        let term = Term::from(NamedNode::new_unchecked("http://example.com/s"));
        let a = intern(&dictionary, &term);
        let b = intern(&dictionary, &term);
        assert_eq!(a.id(), b.id());
        assert!(Arc::ptr_eq(&a, &b));
        assert_eq!(dictionary.len(), 1);
        assert_ne!(a.id(), Some(TermId::DEFAULT_GRAPH));
    }

    #[test]
    fn lookup_does_not_insert() {
        let dictionary = TermDictionary::new();
        let term = Term::from(BlankNode::new_unchecked("b1"));
        assert_eq!(dictionary.lookup(&term), None);
        assert_eq!(dictionary.len(), 0);
        let id = dictionary.intern_id(&term);
        assert_eq!(dictionary.lookup(&term), Some(id));
    }

    #[test]
    fn resolve_unknown_is_corruption() {
        let dictionary = TermDictionary::new();
        dictionary.resolve(TermId(42)).unwrap_err();
    }

    #[test]
    fn literal_values_are_parsed() {
        let dictionary = TermDictionary::new();
        let int = intern(&dictionary, &Literal::from(12).into());
        assert_eq!(int.value(), Some(&TypedValue::Integer(Integer::from(12_i64))));
        let short = intern(
            &dictionary,
            &Literal::new_typed_literal("3", NamedNode::new_unchecked(xsd::SHORT)).into(),
        );
        assert_eq!(short.value(), Some(&TypedValue::Integer(Integer::from(3_i64))));
        let malformed = intern(
            &dictionary,
            &Literal::new_typed_literal("foo", NamedNode::new_unchecked(xsd::INTEGER)).into(),
        );
        assert_eq!(malformed.value(), None);
        let plain = intern(&dictionary, &Literal::from("12").into());
        assert_eq!(plain.value(), None);
    }

    #[test]
    fn computed_terms_equal_interned_terms() {
        let dictionary = TermDictionary::new();
        let interned = intern(&dictionary, &Literal::from(true).into());
        let computed = InternedTerm::from_value(TypedValue::from(true));
        assert_eq!(*interned, computed);
        assert_eq!(computed.id(), None);
    }

    #[test]
    fn default_graph_is_reserved() -> Result<(), CorruptionError> {
        let dictionary = TermDictionary::new();
        assert_eq!(
            dictionary.intern_graph_name(&GraphName::DefaultGraph),
            TermId::DEFAULT_GRAPH
        );
        assert_eq!(
            dictionary.resolve_graph_name(TermId::DEFAULT_GRAPH)?,
            GraphName::DefaultGraph
        );
        Ok(())
    }
}
