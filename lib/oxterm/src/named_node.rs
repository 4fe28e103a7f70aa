use oxiri::{Iri, IriParseError};
use std::fmt;

/// An owned RDF [IRI](https://www.w3.org/TR/rdf11-concepts/#dfn-iri).
///
/// The IRI is kept as a single string together with the position where its local name starts,
/// so that [`NamedNode::namespace()`] and [`NamedNode::local_name()`] are free.
/// The local name starts after the last `#`, or if there is none after the last `/`, or if there is none after the last `:`.
///
/// The default string formatter is returning an N-Triples, Turtle, and SPARQL compatible representation:
/// ```
/// use oxterm::NamedNode;
///
/// let node = NamedNode::new("http://example.com/foo#bar")?;
/// assert_eq!("<http://example.com/foo#bar>", node.to_string());
/// assert_eq!("http://example.com/foo#", node.namespace());
/// assert_eq!("bar", node.local_name());
/// # Result::<_,oxterm::IriParseError>::Ok(())
/// ```
#[derive(Eq, PartialEq, Ord, PartialOrd, Debug, Clone, Hash)]
pub struct NamedNode {
    iri: String,
    local_name_start: usize,
}

impl NamedNode {
    /// Builds and validate an RDF [IRI](https://www.w3.org/TR/rdf11-concepts/#dfn-iri).
    pub fn new(iri: impl Into<String>) -> Result<Self, IriParseError> {
        Ok(Self::new_unchecked(Iri::parse(iri.into())?.into_inner()))
    }

    /// Builds an RDF [IRI](https://www.w3.org/TR/rdf11-concepts/#dfn-iri) from a string.
    ///
    /// It is the caller's responsibility to ensure that `iri` is a valid IRI.
    ///
    /// [`NamedNode::new()`] is a safe version of this constructor and should be used for untrusted data.
    #[inline]
    pub fn new_unchecked(iri: impl Into<String>) -> Self {
        let iri = iri.into();
        let local_name_start = local_name_start(&iri);
        Self {
            iri,
            local_name_start,
        }
    }

    /// Builds an IRI from a namespace and a local name, validating the concatenation.
    ///
    /// ```
    /// use oxterm::NamedNode;
    ///
    /// assert_eq!(
    ///     NamedNode::from_parts("http://example.com/", "foo")?,
    ///     NamedNode::new("http://example.com/foo")?
    /// );
    /// # Result::<_,oxterm::IriParseError>::Ok(())
    /// ```
    pub fn from_parts(namespace: &str, local_name: &str) -> Result<Self, IriParseError> {
        Self::new(format!("{namespace}{local_name}"))
    }

    #[inline]
    pub fn as_str(&self) -> &str {
        &self.iri
    }

    /// The namespace part of the IRI, everything before the local name.
    #[inline]
    pub fn namespace(&self) -> &str {
        &self.iri[..self.local_name_start]
    }

    /// The local name part of the IRI.
    ///
    /// It might be empty if the IRI ends with a separator.
    #[inline]
    pub fn local_name(&self) -> &str {
        &self.iri[self.local_name_start..]
    }

    #[inline]
    pub fn into_string(self) -> String {
        self.iri
    }
}

fn local_name_start(iri: &str) -> usize {
    ['#', '/', ':']
        .into_iter()
        .find_map(|separator| iri.rfind(separator))
        .map_or(0, |position| position + 1)
}

impl fmt::Display for NamedNode {
    #[inline]
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "<{}>", self.iri)
    }
}

impl PartialEq<str> for NamedNode {
    #[inline]
    fn eq(&self, other: &str) -> bool {
        self.as_str() == other
    }
}

impl PartialEq<NamedNode> for str {
    #[inline]
    fn eq(&self, other: &NamedNode) -> bool {
        self == other.as_str()
    }
}

impl PartialEq<&str> for NamedNode {
    #[inline]
    fn eq(&self, other: &&str) -> bool {
        self == *other
    }
}

impl PartialEq<NamedNode> for &str {
    #[inline]
    fn eq(&self, other: &NamedNode) -> bool {
        *self == other
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn split_on_hash_before_slash() {
        let node = NamedNode::new_unchecked("http://example.com/a/b#c");
        assert_eq!(node.namespace(), "http://example.com/a/b#");
        assert_eq!(node.local_name(), "c");
    }

    #[test]
    fn split_on_last_slash() {
        let node = NamedNode::new_unchecked("http://example.com/a/b");
        assert_eq!(node.namespace(), "http://example.com/a/");
        assert_eq!(node.local_name(), "b");
    }

    #[test]
    fn split_on_colon() {
        let node = NamedNode::new_unchecked("urn:isbn:0451450523");
        assert_eq!(node.namespace(), "urn:isbn:");
        assert_eq!(node.local_name(), "0451450523");
    }

    #[test]
    fn equality_is_on_the_full_iri() {
        assert_eq!(
            NamedNode::new_unchecked("http://example.com/a"),
            NamedNode::from_parts("http://example.com/", "a").unwrap()
        );
        assert_eq!(NamedNode::new_unchecked("http://example.com/a"), "http://example.com/a");
    }

    #[test]
    fn invalid_iri_is_rejected() {
        NamedNode::new("not an iri").unwrap_err();
    }
}
