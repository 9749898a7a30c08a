//! Typed values and comparison.
//!
//! A [`NodeValue`] pairs a lexical form with one of five primitive kinds:
//! string, integer, double, date, or IRI. Comparison is typed: dates are
//! compared as calendar dates, integers and doubles numerically, strings
//! lexically. IRIs compare equal iff identical and are otherwise unordered.
//!
//! Comparison is partial. `None` means the two values cannot be ordered
//! (different IRIs, an unparsable date or number); callers decide what a
//! failed comparison means for them - the rewrite passes treat it as
//! "violates every operator" and the filter algebra declines to simplify.

use crate::term::{Iri, Literal, Term};
use chrono::NaiveDate;
use graphveil_vocab::xsd;
use std::cmp::Ordering;
use std::fmt;
use std::sync::Arc;

/// Primitive kind of a [`NodeValue`].
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum ValueKind {
    String,
    Integer,
    Double,
    Date,
    Iri,
}

impl ValueKind {
    /// Parse a policy `object-type` field. The set is closed; anything
    /// else is rejected so the policy loader can skip the entry.
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "string" => Some(ValueKind::String),
            "integer" => Some(ValueKind::Integer),
            "double" => Some(ValueKind::Double),
            "date" => Some(ValueKind::Date),
            "iri" => Some(ValueKind::Iri),
            _ => None,
        }
    }

    /// Kind implied by a literal datatype IRI.
    ///
    /// Unknown datatypes fall back to string so their lexical forms still
    /// compare deterministically.
    pub fn from_datatype(datatype: &Iri) -> Self {
        match datatype.as_str() {
            xsd::INTEGER | xsd::INT | xsd::LONG => ValueKind::Integer,
            xsd::DOUBLE | xsd::FLOAT | xsd::DECIMAL => ValueKind::Double,
            xsd::DATE => ValueKind::Date,
            _ => ValueKind::String,
        }
    }
}

/// A lexical form tagged with its primitive kind.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct NodeValue {
    lexical: Arc<str>,
    kind: ValueKind,
}

impl NodeValue {
    /// Create a value of the given kind.
    pub fn new(kind: ValueKind, lexical: impl AsRef<str>) -> Self {
        Self {
            lexical: Arc::from(lexical.as_ref()),
            kind,
        }
    }

    /// Create a string value.
    pub fn string(lexical: impl AsRef<str>) -> Self {
        Self::new(ValueKind::String, lexical)
    }

    /// Create an integer value.
    pub fn integer(lexical: impl AsRef<str>) -> Self {
        Self::new(ValueKind::Integer, lexical)
    }

    /// Create a double value.
    pub fn double(lexical: impl AsRef<str>) -> Self {
        Self::new(ValueKind::Double, lexical)
    }

    /// Create a date value.
    pub fn date(lexical: impl AsRef<str>) -> Self {
        Self::new(ValueKind::Date, lexical)
    }

    /// Create an IRI value.
    pub fn iri(value: impl AsRef<str>) -> Self {
        Self::new(ValueKind::Iri, value)
    }

    /// The lexical form.
    pub fn lexical(&self) -> &str {
        &self.lexical
    }

    /// The primitive kind.
    pub fn kind(&self) -> ValueKind {
        self.kind
    }

    /// Convert a literal into a typed value using its datatype.
    pub fn from_literal(literal: &Literal) -> Self {
        Self::new(
            ValueKind::from_datatype(literal.datatype()),
            literal.lexical(),
        )
    }

    /// Convert a ground term into a typed value. Variables and blank nodes
    /// have no value.
    pub fn from_term(term: &Term) -> Option<Self> {
        match term {
            Term::Iri(i) => Some(Self::iri(i.as_str())),
            Term::Literal(l) => Some(Self::from_literal(l)),
            Term::Var(_) | Term::Blank(_) => None,
        }
    }

    /// Render this value as a term, for insertion into query patterns and
    /// for printing.
    pub fn to_term(&self) -> Term {
        match self.kind {
            ValueKind::Iri => Term::Iri(Iri::new(self.lexical.as_ref())),
            ValueKind::String => Term::Literal(Literal::string(self.lexical.as_ref())),
            ValueKind::Integer => Term::Literal(Literal::integer(self.lexical.as_ref())),
            ValueKind::Double => Term::Literal(Literal::double(self.lexical.as_ref())),
            ValueKind::Date => Term::Literal(Literal::date(self.lexical.as_ref())),
        }
    }

    /// Typed comparison. The comparison is driven by the left operand's
    /// kind; both lexical forms are interpreted under it.
    ///
    /// Returns `None` when the values cannot be ordered: distinct IRIs,
    /// or a lexical form that does not parse under the kind.
    pub fn compare(&self, other: &NodeValue) -> Option<Ordering> {
        match self.kind {
            ValueKind::Date => {
                let a = parse_date(&self.lexical)?;
                let b = parse_date(&other.lexical)?;
                Some(a.cmp(&b))
            }
            ValueKind::Double => {
                let a: f64 = self.lexical.parse().ok()?;
                let b: f64 = other.lexical.parse().ok()?;
                a.partial_cmp(&b)
            }
            ValueKind::Integer => {
                let a: i64 = self.lexical.trim().parse().ok()?;
                let b: i64 = other.lexical.trim().parse().ok()?;
                Some(a.cmp(&b))
            }
            ValueKind::String => Some(self.lexical.as_ref().cmp(other.lexical.as_ref())),
            ValueKind::Iri => {
                if self.lexical == other.lexical {
                    Some(Ordering::Equal)
                } else {
                    None
                }
            }
        }
    }

    /// True iff the two values compare equal under typed comparison.
    pub fn same_value(&self, other: &NodeValue) -> bool {
        self.compare(other) == Some(Ordering::Equal)
    }
}

fn parse_date(s: &str) -> Option<NaiveDate> {
    NaiveDate::parse_from_str(s.trim(), "%Y-%m-%d").ok()
}

impl fmt::Display for NodeValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.to_term().fmt(f)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_integer_compare() {
        let a = NodeValue::integer("7");
        let b = NodeValue::integer("19");
        assert_eq!(a.compare(&b), Some(Ordering::Less));
        assert_eq!(b.compare(&a), Some(Ordering::Greater));
        assert!(a.same_value(&NodeValue::integer("7")));
    }

    #[test]
    fn test_integer_unparsable() {
        let a = NodeValue::integer("7");
        let b = NodeValue::integer("seven");
        assert_eq!(a.compare(&b), None);
    }

    #[test]
    fn test_double_compare() {
        let a = NodeValue::double("1.5");
        let b = NodeValue::double("2.0");
        assert_eq!(a.compare(&b), Some(Ordering::Less));
    }

    #[test]
    fn test_date_compare() {
        let a = NodeValue::date("2020-01-01");
        let b = NodeValue::date("2021-06-15");
        assert_eq!(a.compare(&b), Some(Ordering::Less));
        assert_eq!(b.compare(&b), Some(Ordering::Equal));
    }

    #[test]
    fn test_date_unparsable() {
        let a = NodeValue::date("2020-01-01");
        let bad = NodeValue::date("not-a-date");
        assert_eq!(a.compare(&bad), None);
        assert_eq!(bad.compare(&a), None);
    }

    #[test]
    fn test_string_compare() {
        let a = NodeValue::string("apple");
        let b = NodeValue::string("banana");
        assert_eq!(a.compare(&b), Some(Ordering::Less));
    }

    #[test]
    fn test_iri_compare() {
        let a = NodeValue::iri("http://e.org/a");
        let b = NodeValue::iri("http://e.org/b");
        assert_eq!(a.compare(&a.clone()), Some(Ordering::Equal));
        assert_eq!(a.compare(&b), None);
        assert!(!a.same_value(&b));
    }

    #[test]
    fn test_from_literal() {
        let l = Literal::integer("42");
        let v = NodeValue::from_literal(&l);
        assert_eq!(v.kind(), ValueKind::Integer);
        assert_eq!(v.lexical(), "42");

        let l = Literal::typed("2020-03-04", Iri::new(graphveil_vocab::xsd::DATE));
        assert_eq!(NodeValue::from_literal(&l).kind(), ValueKind::Date);
    }

    #[test]
    fn test_to_term_round_trip() {
        let v = NodeValue::iri("http://e.org/a");
        assert_eq!(v.to_term(), Term::iri("http://e.org/a"));

        let v = NodeValue::integer("5");
        assert_eq!(
            NodeValue::from_term(&v.to_term()),
            Some(NodeValue::integer("5"))
        );
    }
}
