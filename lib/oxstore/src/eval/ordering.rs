use crate::eval::expression::NumericBinaryOperands;
use crate::storage::{InternedTerm, TypedValue};
use oxsdatatypes::{Decimal, Double};
use oxterm::Term;
use oxterm::vocab::{rdf, xsd};
use std::cmp::Ordering;

/// Equality operator (=)
///
/// Returns `None` if the two terms are literals that can't be compared.
pub(super) fn equals(a: &InternedTerm, b: &InternedTerm) -> Option<bool> {
    if let (Some(a), Some(b)) = (a.value(), b.value()) {
        return Some(partial_cmp_values(a, b) == Some(Ordering::Equal));
    }
    if a == b {
        return Some(true);
    }
    match (a.as_literal(), b.as_literal()) {
        (Some(_), Some(_)) => (is_known_literal(a) && is_known_literal(b)).then_some(false),
        _ => Some(false),
    }
}

/// Comparison for <, >, <= and >= operators
pub(super) fn partial_cmp(a: &InternedTerm, b: &InternedTerm) -> Option<Ordering> {
    if let (Some(a), Some(b)) = (a.value(), b.value()) {
        return partial_cmp_values(a, b);
    }
    let (a, b) = (a.as_literal()?, b.as_literal()?);
    if a.datatype() == xsd::STRING && b.datatype() == xsd::STRING {
        Some(a.value().cmp(b.value()))
    } else {
        None
    }
}

fn partial_cmp_values(a: &TypedValue, b: &TypedValue) -> Option<Ordering> {
    match (a, b) {
        (TypedValue::Boolean(a), TypedValue::Boolean(b)) => a.partial_cmp(b),
        (TypedValue::DateTime(a), TypedValue::DateTime(b)) => a.partial_cmp(b),
        (TypedValue::Date(a), TypedValue::Date(b)) => a.partial_cmp(b),
        (TypedValue::Time(a), TypedValue::Time(b)) => a.partial_cmp(b),
        _ => match NumericBinaryOperands::new(a, b)? {
            NumericBinaryOperands::Integer(a, b) => a.partial_cmp(&b),
            NumericBinaryOperands::Decimal(a, b) => a.partial_cmp(&b),
            NumericBinaryOperands::Float(a, b) => a.partial_cmp(&b),
            NumericBinaryOperands::Double(a, b) => a.partial_cmp(&b),
        },
    }
}

/// A literal whose value space is understood: plain literals and the supported XSD types with a valid lexical form.
fn is_known_literal(term: &InternedTerm) -> bool {
    term.value().is_some() || term.as_literal().is_some_and(|l| l.is_plain())
}

/// The total order used by `OrderBy`.
///
/// Unbound values are first, then blank nodes, IRIs and literals.
pub(super) fn cmp_terms(a: Option<&InternedTerm>, b: Option<&InternedTerm>) -> Ordering {
    let (a, b) = match (a, b) {
        (Some(a), Some(b)) => (a, b),
        (Some(_), None) => return Ordering::Greater,
        (None, Some(_)) => return Ordering::Less,
        (None, None) => return Ordering::Equal,
    };
    match (a.term(), b.term()) {
        (Term::BlankNode(a), Term::BlankNode(b)) => a.as_str().cmp(b.as_str()),
        (Term::BlankNode(_), _) => Ordering::Less,
        (_, Term::BlankNode(_)) => Ordering::Greater,
        (Term::NamedNode(a), Term::NamedNode(b)) => a.as_str().cmp(b.as_str()),
        (Term::NamedNode(_), _) => Ordering::Less,
        (_, Term::NamedNode(_)) => Ordering::Greater,
        (Term::Literal(la), Term::Literal(lb)) => {
            let rank_a = LiteralRank::of(la.datatype());
            let rank_b = LiteralRank::of(lb.datatype());
            rank_a
                .cmp(&rank_b)
                .then_with(|| match rank_a {
                    LiteralRank::Plain => la.language().cmp(&lb.language()),
                    LiteralRank::Numeric => cmp_numeric_values(a.value(), b.value()),
                    LiteralRank::Calendar | LiteralRank::Other => la
                        .datatype()
                        .cmp(lb.datatype())
                        .then_with(|| cmp_same_type_values(a.value(), b.value())),
                })
                .then_with(|| la.datatype().cmp(lb.datatype()))
                .then_with(|| la.value().cmp(lb.value()))
        }
    }
}

/// Numbers of any numeric datatype are sorted by value, malformed ones after all of them.
fn cmp_numeric_values(a: Option<&TypedValue>, b: Option<&TypedValue>) -> Ordering {
    match (a.and_then(NumericKey::of), b.and_then(NumericKey::of)) {
        (Some(a), Some(b)) => a.compare(&b),
        (Some(_), None) => Ordering::Less,
        (None, Some(_)) => Ordering::Greater,
        (None, None) => Ordering::Equal,
    }
}

/// Sort key of a numeric value.
///
/// All values are first ordered by their `xsd:double` approximation, NaN included.
/// Exact values sharing the same approximation are then ordered by their decimal value,
/// before floating point ones.
struct NumericKey {
    approximation: f64,
    exact: Option<Decimal>,
}

impl NumericKey {
    fn of(value: &TypedValue) -> Option<Self> {
        Some(match value {
            TypedValue::Integer(v) => Self {
                approximation: Double::from(*v).into(),
                exact: Some((*v).into()),
            },
            TypedValue::Decimal(v) => Self {
                approximation: Double::from(*v).into(),
                exact: Some(*v),
            },
            TypedValue::Float(v) => Self {
                approximation: Double::from(*v).into(),
                exact: None,
            },
            TypedValue::Double(v) => Self {
                approximation: (*v).into(),
                exact: None,
            },
            _ => return None,
        })
    }

    fn compare(&self, other: &Self) -> Ordering {
        self.approximation
            .total_cmp(&other.approximation)
            .then_with(|| match (self.exact, other.exact) {
                (Some(a), Some(b)) => a.cmp(&b),
                (Some(_), None) => Ordering::Less,
                (None, Some(_)) => Ordering::Greater,
                (None, None) => Ordering::Equal,
            })
    }
}

/// Values of the same datatype, malformed literals last.
///
/// Calendar values without timezone are put before the ones with a timezone,
/// the comparison between the two is not always defined.
fn cmp_same_type_values(a: Option<&TypedValue>, b: Option<&TypedValue>) -> Ordering {
    let (a, b) = match (a, b) {
        (Some(a), Some(b)) => (a, b),
        (Some(_), None) => return Ordering::Less,
        (None, Some(_)) => return Ordering::Greater,
        (None, None) => return Ordering::Equal,
    };
    match (a, b) {
        (TypedValue::Boolean(a), TypedValue::Boolean(b)) => a.cmp(b),
        (TypedValue::DateTime(a), TypedValue::DateTime(b)) => a
            .timezone_offset()
            .is_some()
            .cmp(&b.timezone_offset().is_some())
            .then_with(|| a.partial_cmp(b).unwrap_or(Ordering::Equal)),
        (TypedValue::Date(a), TypedValue::Date(b)) => a
            .timezone_offset()
            .is_some()
            .cmp(&b.timezone_offset().is_some())
            .then_with(|| a.partial_cmp(b).unwrap_or(Ordering::Equal)),
        (TypedValue::Time(a), TypedValue::Time(b)) => a
            .timezone_offset()
            .is_some()
            .cmp(&b.timezone_offset().is_some())
            .then_with(|| a.partial_cmp(b).unwrap_or(Ordering::Equal)),
        _ => Ordering::Equal,
    }
}

pub(super) fn is_numeric_datatype(datatype: &str) -> bool {
    LiteralRank::of(datatype) == LiteralRank::Numeric
}

/// Literal families, in the order they are sorted when their values are not comparable.
#[derive(Eq, PartialEq, Ord, PartialOrd, Clone, Copy, Debug)]
enum LiteralRank {
    Plain,
    Numeric,
    Calendar,
    Other,
}

impl LiteralRank {
    fn of(datatype: &str) -> Self {
        match datatype {
            xsd::STRING | rdf::LANG_STRING => Self::Plain,
            xsd::INTEGER
            | xsd::DECIMAL
            | xsd::FLOAT
            | xsd::DOUBLE
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
            | xsd::NON_NEGATIVE_INTEGER => Self::Numeric,
            xsd::DATE_TIME
            | xsd::DATE_TIME_STAMP
            | xsd::DATE
            | xsd::TIME
            | xsd::G_YEAR
            | xsd::G_YEAR_MONTH
            | xsd::G_MONTH
            | xsd::G_MONTH_DAY
            | xsd::G_DAY => Self::Calendar,
            _ => Self::Other,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use oxterm::{BlankNode, Literal, NamedNode};

    fn term(term: impl Into<Term>) -> InternedTerm {
        InternedTerm::new(term)
    }

    fn typed(value: &str, datatype: &str) -> InternedTerm {
        term(Literal::new_typed_literal(
            value,
            NamedNode::new_unchecked(datatype),
        ))
    }

    #[test]
    fn numeric_equality_promotes() {
        assert_eq!(equals(&term(Literal::from(1)), &typed("1.0", xsd::DECIMAL)), Some(true));
        assert_eq!(equals(&term(Literal::from(1)), &typed("1e0", xsd::DOUBLE)), Some(true));
        assert_eq!(equals(&term(Literal::from(1)), &term(Literal::from(true))), Some(false));
        assert_eq!(equals(&typed("NaN", xsd::DOUBLE), &typed("NaN", xsd::DOUBLE)), Some(false));
    }

    #[test]
    fn unknown_literals_are_not_comparable() {
        let a = typed("a", "http://example.com/t");
        let b = typed("b", "http://example.com/t");
        assert_eq!(equals(&a, &a), Some(true));
        assert_eq!(equals(&a, &b), None);
        assert_eq!(equals(&term(Literal::from("a")), &term(Literal::from("b"))), Some(false));
        assert_eq!(
            equals(&term(NamedNode::new_unchecked("http://example.com/a")), &term(Literal::from("a"))),
            Some(false)
        );
    }

    #[test]
    fn comparisons() {
        assert_eq!(
            partial_cmp(&term(Literal::from(2)), &typed("10.5", xsd::DECIMAL)),
            Some(Ordering::Less)
        );
        assert_eq!(
            partial_cmp(&term(Literal::from("b")), &term(Literal::from("a"))),
            Some(Ordering::Greater)
        );
        assert_eq!(
            partial_cmp(
                &typed("2020-01-01", xsd::DATE),
                &typed("2021-01-01", xsd::DATE)
            ),
            Some(Ordering::Less)
        );
        assert_eq!(partial_cmp(&term(Literal::from("b")), &term(Literal::from(1))), None);
        assert_eq!(
            partial_cmp(
                &term(NamedNode::new_unchecked("http://example.com/a")),
                &term(NamedNode::new_unchecked("http://example.com/b"))
            ),
            None
        );
    }

    #[test]
    fn order_of_kinds() {
        let unbound = None;
        let bnode = term(BlankNode::new_unchecked("b"));
        let iri = term(NamedNode::new_unchecked("http://example.com/a"));
        let literal = term(Literal::from("a"));
        let sorted = [unbound, Some(&bnode), Some(&iri), Some(&literal)];
        for (i, a) in sorted.iter().enumerate() {
            for (j, b) in sorted.iter().enumerate() {
                assert_eq!(cmp_terms(*a, *b), i.cmp(&j));
            }
        }
    }

    #[test]
    fn order_of_literals() {
        let plain = term(Literal::from("z"));
        let tagged = term(Literal::new_language_tagged_literal_unchecked("a", "en"));
        let number = term(Literal::from(100));
        let malformed = typed("foo", xsd::INTEGER);
        let date = typed("2020-01-01", xsd::DATE);
        let custom = typed("a", "http://example.com/t");
        assert_eq!(cmp_terms(Some(&plain), Some(&tagged)), Ordering::Less);
        assert_eq!(cmp_terms(Some(&tagged), Some(&number)), Ordering::Less);
        assert_eq!(cmp_terms(Some(&number), Some(&date)), Ordering::Less);
        assert_eq!(cmp_terms(Some(&date), Some(&custom)), Ordering::Less);
        assert_eq!(cmp_terms(Some(&malformed), Some(&date)), Ordering::Less);
        assert_eq!(
            cmp_terms(Some(&term(Literal::from(9))), Some(&number)),
            Ordering::Less
        );
    }

    #[test]
    fn malformed_literals_sort_after_values() {
        let malformed = typed("5a", xsd::INTEGER);
        assert_eq!(cmp_terms(Some(&malformed), Some(&term(Literal::from(10)))), Ordering::Greater);
        assert_eq!(cmp_terms(Some(&malformed), Some(&typed("9b", xsd::INTEGER))), Ordering::Less);
        assert_eq!(
            cmp_terms(Some(&typed("NaN", xsd::DOUBLE)), Some(&typed("INF", xsd::DOUBLE))),
            Ordering::Greater
        );
    }

    #[test]
    fn order_of_literals_is_total() {
        let mut literals = Vec::new();
        for i in 0..12 {
            literals.push(term(Literal::from(i)));
            literals.push(typed(&format!("{i}x"), xsd::INTEGER));
            literals.push(typed(&format!("{i}.5"), xsd::DECIMAL));
        }
        for value in ["NaN", "-INF", "INF", "1e0", "-0", "0", "bad"] {
            literals.push(typed(value, xsd::DOUBLE));
            literals.push(typed(value, xsd::FLOAT));
        }
        for value in [
            "2020-01-01T00:00:00",
            "2020-01-01T00:00:00Z",
            "2020-01-01T10:00:00+12:00",
            "2020-01-01T10:00:00",
            "not a date",
        ] {
            literals.push(typed(value, xsd::DATE_TIME));
        }
        literals.push(typed("true", xsd::BOOLEAN));
        literals.push(typed("yes", xsd::BOOLEAN));

        for a in &literals {
            for b in &literals {
                let ab = cmp_terms(Some(a), Some(b));
                assert_eq!(ab, cmp_terms(Some(b), Some(a)).reverse(), "{a:?} {b:?}");
                for c in &literals {
                    if ab != Ordering::Greater && cmp_terms(Some(b), Some(c)) != Ordering::Greater {
                        assert_ne!(cmp_terms(Some(a), Some(c)), Ordering::Greater, "{a:?} {b:?} {c:?}");
                    }
                }
            }
        }
    }
}
