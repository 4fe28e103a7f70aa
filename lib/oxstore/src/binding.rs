//! Definition of [`BindingSet`], the rows produced by the evaluator.

use oxterm::{Term, Variable};
use std::fmt;
use std::iter::Zip;
use std::ops::Index;
use std::sync::Arc;

/// A partial assignment of variables to terms.
///
/// Unbound variables have no value: a [`BindingSet`] never maps a variable to a null term.
///
/// ```
/// use oxstore::BindingSetBuilder;
/// use oxterm::{Literal, Variable};
///
/// let bindings = BindingSetBuilder::new()
///     .with(Variable::new("foo")?, Literal::from(1))
///     .build();
/// assert_eq!(bindings.get("foo"), Some(&Literal::from(1).into()));
/// assert_eq!(bindings.get("bar"), None);
/// # Result::<_, Box<dyn std::error::Error>>::Ok(())
/// ```
#[derive(Clone)]
pub struct BindingSet {
    variables: Arc<[Variable]>,
    values: Vec<Option<Term>>,
}

impl BindingSet {
    pub(crate) fn new(variables: Arc<[Variable]>, values: Vec<Option<Term>>) -> Self {
        Self { variables, values }
    }

    /// Returns the value of a variable given by name, [`Variable`] or column position.
    #[inline]
    pub fn get(&self, index: impl BindingIndex) -> Option<&Term> {
        self.values.get(index.index(self)?).and_then(Option::as_ref)
    }

    /// Is the variable bound?
    #[inline]
    pub fn contains(&self, index: impl BindingIndex) -> bool {
        self.get(index).is_some()
    }

    /// The number of bound variables.
    #[inline]
    pub fn len(&self) -> usize {
        self.values.iter().filter(|v| v.is_some()).count()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.values.iter().all(Option::is_none)
    }

    /// Iterates over the bound variables and their values.
    #[inline]
    pub fn iter(&self) -> Iter<'_> {
        self.into_iter()
    }

    /// The variables this set may bind, bound or not.
    #[inline]
    pub fn variables(&self) -> &[Variable] {
        &self.variables
    }

    /// Two binding sets are compatible if every variable bound in both has the same value.
    pub fn is_compatible(&self, other: &Self) -> bool {
        self.iter()
            .all(|(variable, value)| other.get(variable).is_none_or(|v| v == value))
    }

    /// Returns the union of the two sets, or `None` if they are not [compatible](Self::is_compatible).
    pub fn merge(&self, other: &Self) -> Option<Self> {
        if !self.is_compatible(other) {
            return None;
        }
        let mut builder = BindingSetBuilder::from(self);
        for (variable, value) in other {
            if !self.contains(variable) {
                builder.set(variable.clone(), value.clone());
            }
        }
        Some(builder.build())
    }
}

impl Default for BindingSet {
    /// The empty binding set.
    #[inline]
    fn default() -> Self {
        Self::new(Arc::new([]), Vec::new())
    }
}

impl<V: Into<Arc<[Variable]>>, S: Into<Vec<Option<Term>>>> From<(V, S)> for BindingSet {
    #[inline]
    fn from((variables, values): (V, S)) -> Self {
        Self::new(variables.into(), values.into())
    }
}

impl FromIterator<(Variable, Term)> for BindingSet {
    fn from_iter<I: IntoIterator<Item = (Variable, Term)>>(iter: I) -> Self {
        let mut builder = BindingSetBuilder::new();
        for (variable, value) in iter {
            builder.set(variable, value);
        }
        builder.build()
    }
}

impl<'a> IntoIterator for &'a BindingSet {
    type Item = (&'a Variable, &'a Term);
    type IntoIter = Iter<'a>;

    #[inline]
    fn into_iter(self) -> Iter<'a> {
        Iter {
            inner: self.variables.iter().zip(&self.values),
        }
    }
}

impl Index<&str> for BindingSet {
    type Output = Term;

    #[expect(clippy::panic)]
    #[inline]
    fn index(&self, index: &str) -> &Term {
        self.get(index)
            .unwrap_or_else(|| panic!("The variable ?{index} is not bound in this binding set"))
    }
}

impl Index<&Variable> for BindingSet {
    type Output = Term;

    #[inline]
    fn index(&self, index: &Variable) -> &Term {
        self.index(index.as_str())
    }
}

impl PartialEq for BindingSet {
    fn eq(&self, other: &Self) -> bool {
        self.len() == other.len() && self.iter().all(|(k, v)| other.get(k) == Some(v))
    }
}

impl Eq for BindingSet {}

impl fmt::Debug for BindingSet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_map().entries(self.iter()).finish()
    }
}

impl fmt::Display for BindingSet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("{")?;
        for (i, (variable, value)) in self.iter().enumerate() {
            if i > 0 {
                f.write_str(", ")?;
            }
            write!(f, "{variable} = {value}")?;
        }
        f.write_str("}")
    }
}

/// An iterator over the bound variables of a [`BindingSet`].
pub struct Iter<'a> {
    inner: Zip<std::slice::Iter<'a, Variable>, std::slice::Iter<'a, Option<Term>>>,
}

impl<'a> Iterator for Iter<'a> {
    type Item = (&'a Variable, &'a Term);

    #[inline]
    fn next(&mut self) -> Option<Self::Item> {
        for (variable, value) in &mut self.inner {
            if let Some(value) = value {
                return Some((variable, value));
            }
        }
        None
    }

    #[inline]
    fn size_hint(&self) -> (usize, Option<usize>) {
        (0, self.inner.size_hint().1)
    }
}

/// A variable name, a [`Variable`] or a column position usable with [`BindingSet::get`].
pub trait BindingIndex {
    fn index(self, bindings: &BindingSet) -> Option<usize>;
}

impl BindingIndex for usize {
    #[inline]
    fn index(self, _: &BindingSet) -> Option<usize> {
        Some(self)
    }
}

impl BindingIndex for &str {
    #[inline]
    fn index(self, bindings: &BindingSet) -> Option<usize> {
        bindings.variables.iter().position(|v| v.as_str() == self)
    }
}

impl BindingIndex for &Variable {
    #[inline]
    fn index(self, bindings: &BindingSet) -> Option<usize> {
        bindings.variables.iter().position(|v| v == self)
    }
}

/// Builds a [`BindingSet`] variable by variable.
///
/// Setting a variable twice replaces its previous value.
#[derive(Default, Clone, Debug)]
pub struct BindingSetBuilder {
    variables: Vec<Variable>,
    values: Vec<Option<Term>>,
}

impl BindingSetBuilder {
    #[inline]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set(&mut self, variable: Variable, value: impl Into<Term>) -> &mut Self {
        let value = Some(value.into());
        if let Some(position) = self.variables.iter().position(|v| *v == variable) {
            self.values[position] = value;
        } else {
            self.variables.push(variable);
            self.values.push(value);
        }
        self
    }

    #[inline]
    #[must_use]
    pub fn with(mut self, variable: Variable, value: impl Into<Term>) -> Self {
        self.set(variable, value);
        self
    }

    /// Unbinds a variable.
    pub fn remove(&mut self, variable: &Variable) -> &mut Self {
        if let Some(position) = self.variables.iter().position(|v| v == variable) {
            self.variables.remove(position);
            self.values.remove(position);
        }
        self
    }

    pub fn build(&self) -> BindingSet {
        BindingSet::new(self.variables.as_slice().into(), self.values.clone())
    }
}

impl From<&BindingSet> for BindingSetBuilder {
    fn from(bindings: &BindingSet) -> Self {
        let mut builder = Self::new();
        for (variable, value) in bindings {
            builder.set(variable.clone(), value.clone());
        }
        builder
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use oxterm::{Literal, NamedNode};

    fn var(name: &str) -> Variable {
        Variable::new_unchecked(name)
    }

    #[test]
    fn builder_replaces_and_removes() {
        let mut builder = BindingSetBuilder::new();
        builder.set(var("a"), Literal::from(1));
        builder.set(var("b"), Literal::from(2));
        builder.set(var("a"), Literal::from(3));
        let bindings = builder.build();
        assert_eq!(bindings.len(), 2);
        assert_eq!(bindings["a"], Literal::from(3).into());
        builder.remove(&var("a"));
        let bindings = builder.build();
        assert!(!bindings.contains("a"));
        assert_eq!(bindings.variables(), &[var("b")]);
    }

    #[test]
    fn unbound_columns_are_absent() {
        let bindings = BindingSet::from((vec![var("a"), var("b")], vec![None, Some(Literal::from(1).into())]));
        assert_eq!(bindings.len(), 1);
        assert_eq!(bindings.get(0), None);
        assert_eq!(bindings.iter().collect::<Vec<_>>(), vec![(&var("b"), &Literal::from(1).into())]);
        assert_eq!(bindings, [(var("b"), Literal::from(1).into())].into_iter().collect());
    }

    #[test]
    fn compatibility_and_merge() {
        let s = NamedNode::new_unchecked("http://example.com/s");
        let left = BindingSetBuilder::new()
            .with(var("s"), s.clone())
            .with(var("o"), Literal::from(1))
            .build();
        let right = BindingSetBuilder::new()
            .with(var("s"), s.clone())
            .with(var("x"), Literal::from(2))
            .build();
        assert!(left.is_compatible(&right));
        let merged = left.merge(&right).unwrap();
        assert_eq!(merged.len(), 3);
        assert_eq!(merged["x"], Literal::from(2).into());
        let conflicting = BindingSetBuilder::new()
            .with(var("o"), Literal::from(2))
            .build();
        assert!(!left.is_compatible(&conflicting));
        assert!(left.merge(&conflicting).is_none());
        assert!(left.is_compatible(&BindingSet::default()));
    }

    #[test]
    fn display() {
        let bindings = BindingSetBuilder::new()
            .with(var("o"), Literal::from(1))
            .build();
        assert_eq!(
            bindings.to_string(),
            "{?o = \"1\"^^<http://www.w3.org/2001/XMLSchema#integer>}"
        );
    }
}
