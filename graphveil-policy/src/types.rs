//! Constraint types.
//!
//! Three constraint families, mirroring the policy file format:
//! - [`NodeConstraint`] forbids a class of nodes or specific instances;
//! - [`PredicateConstraint`] forbids an edge between two classes,
//!   optionally scoped to specific subject and/or object instances;
//! - [`AttributeConstraint`] denies reads of an attribute (`X`) or
//!   constrains its permitted values with a comparison operator.
//!
//! IRIs in constraints are absolute; matching is by full-IRI equality.

use graphveil_core::{Iri, NodeValue, ValueKind};
use std::cmp::Ordering;

/// Operator of an attribute constraint. `X` denies reads; the others
/// constrain permitted values.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ConstraintOp {
    DenyRead,
    Eq,
    Ne,
    Lt,
    Le,
    Gt,
    Ge,
    Between,
    In,
    NotIn,
}

impl ConstraintOp {
    /// Parse a `symbol` field. The operator set is closed; unknown
    /// symbols are rejected so the loader can skip the entry.
    pub fn parse(symbol: &str) -> Option<Self> {
        match symbol {
            "X" => Some(ConstraintOp::DenyRead),
            "=" => Some(ConstraintOp::Eq),
            "!=" => Some(ConstraintOp::Ne),
            "<" => Some(ConstraintOp::Lt),
            "<=" => Some(ConstraintOp::Le),
            ">" => Some(ConstraintOp::Gt),
            ">=" => Some(ConstraintOp::Ge),
            "between" => Some(ConstraintOp::Between),
            "in" => Some(ConstraintOp::In),
            "notin" => Some(ConstraintOp::NotIn),
            _ => None,
        }
    }

    /// The symbol as written in the policy file.
    pub fn as_str(&self) -> &'static str {
        match self {
            ConstraintOp::DenyRead => "X",
            ConstraintOp::Eq => "=",
            ConstraintOp::Ne => "!=",
            ConstraintOp::Lt => "<",
            ConstraintOp::Le => "<=",
            ConstraintOp::Gt => ">",
            ConstraintOp::Ge => ">=",
            ConstraintOp::Between => "between",
            ConstraintOp::In => "in",
            ConstraintOp::NotIn => "notin",
        }
    }

    /// Number of values the operator requires.
    pub fn arity(&self) -> std::ops::RangeInclusive<usize> {
        match self {
            ConstraintOp::DenyRead => 0..=0,
            ConstraintOp::Between => 2..=2,
            ConstraintOp::In | ConstraintOp::NotIn => 1..=usize::MAX,
            _ => 1..=1,
        }
    }
}

/// Forbids a class of nodes, or specific instances of it.
#[derive(Clone, Debug, PartialEq)]
pub struct NodeConstraint {
    pub user: String,
    pub node_type: Iri,
    /// Specific forbidden instances; `None` forbids the whole class.
    pub nodes: Option<Vec<Iri>>,
}

impl NodeConstraint {
    /// True if the constraint targets specific instances.
    pub fn has_nodes(&self) -> bool {
        self.nodes.is_some()
    }

    /// The instance list (empty when unscoped).
    pub fn nodes(&self) -> &[Iri] {
        self.nodes.as_deref().unwrap_or(&[])
    }
}

/// Forbids an edge between a subject class and an object class,
/// optionally scoped to specific subjects and/or objects.
#[derive(Clone, Debug, PartialEq)]
pub struct PredicateConstraint {
    pub user: String,
    pub subject_type: Iri,
    pub predicate: Iri,
    pub object_type: Iri,
    pub subjects: Option<Vec<Iri>>,
    pub objects: Option<Vec<Iri>>,
}

impl PredicateConstraint {
    /// True if scoped to specific subjects.
    pub fn has_subjects(&self) -> bool {
        self.subjects.is_some()
    }

    /// True if scoped to specific objects.
    pub fn has_objects(&self) -> bool {
        self.objects.is_some()
    }

    /// The subject list (empty when unscoped).
    pub fn subjects(&self) -> &[Iri] {
        self.subjects.as_deref().unwrap_or(&[])
    }

    /// The object list (empty when unscoped).
    pub fn objects(&self) -> &[Iri] {
        self.objects.as_deref().unwrap_or(&[])
    }
}

/// Denies reads of an attribute or constrains its permitted values.
#[derive(Clone, Debug, PartialEq)]
pub struct AttributeConstraint {
    pub user: String,
    pub subject_type: Iri,
    pub predicate: Iri,
    /// Specific subjects the constraint applies to; `None` applies to the
    /// whole subject class.
    pub subjects: Option<Vec<Iri>>,
    pub op: ConstraintOp,
    /// Constraint values, already typed by the declared object-type.
    /// Empty for deny-read.
    pub values: Vec<NodeValue>,
    /// Declared primitive type of the values.
    pub value_kind: ValueKind,
}

impl AttributeConstraint {
    /// True if scoped to specific subjects.
    pub fn has_subjects(&self) -> bool {
        self.subjects.is_some()
    }

    /// The subject list (empty when unscoped).
    pub fn subjects(&self) -> &[Iri] {
        self.subjects.as_deref().unwrap_or(&[])
    }

    /// The first constraint value (comparison operators carry exactly one).
    pub fn value(&self) -> &NodeValue {
        &self.values[0]
    }

    /// Compare the first constraint value against `other` under the
    /// declared value type. `None` means the comparison failed (e.g. an
    /// unparsable date), which callers treat as a violation.
    pub fn compare_first(&self, other: &NodeValue) -> Option<Ordering> {
        self.values[0].compare(other)
    }

    /// Whether `other` lies inside `[values[0], values[1]]`. `None` when
    /// either comparison fails.
    pub fn between(&self, other: &NodeValue) -> Option<bool> {
        let lo = self.values[0].compare(other)?;
        let hi = self.values[1].compare(other)?;
        Some(lo != Ordering::Greater && hi != Ordering::Less)
    }

    /// Whether `other` matches one of the constraint values.
    pub fn contains(&self, other: &NodeValue) -> bool {
        self.values.iter().any(|v| v.same_value(other))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_op_parse_closed_set() {
        assert_eq!(ConstraintOp::parse("X"), Some(ConstraintOp::DenyRead));
        assert_eq!(ConstraintOp::parse("between"), Some(ConstraintOp::Between));
        assert_eq!(ConstraintOp::parse("<="), Some(ConstraintOp::Le));
        assert_eq!(ConstraintOp::parse("unknown"), None);
        assert_eq!(ConstraintOp::parse("IN"), None);
    }

    fn salary_constraint(op: ConstraintOp, values: &[&str]) -> AttributeConstraint {
        AttributeConstraint {
            user: "guest".into(),
            subject_type: Iri::new("http://e.org/Person"),
            predicate: Iri::new("http://e.org/hasSalary"),
            subjects: None,
            op,
            values: values.iter().map(|v| NodeValue::integer(*v)).collect(),
            value_kind: ValueKind::Integer,
        }
    }

    #[test]
    fn test_between() {
        let c = salary_constraint(ConstraintOp::Between, &["100", "200"]);
        assert_eq!(c.between(&NodeValue::integer("150")), Some(true));
        assert_eq!(c.between(&NodeValue::integer("100")), Some(true));
        assert_eq!(c.between(&NodeValue::integer("99")), Some(false));
        assert_eq!(c.between(&NodeValue::integer("201")), Some(false));
        assert_eq!(c.between(&NodeValue::integer("oops")), None);
    }

    #[test]
    fn test_contains() {
        let c = salary_constraint(ConstraintOp::In, &["1", "2", "3"]);
        assert!(c.contains(&NodeValue::integer("2")));
        assert!(!c.contains(&NodeValue::integer("9")));
    }

    #[test]
    fn test_compare_first() {
        let c = salary_constraint(ConstraintOp::Lt, &["1000"]);
        assert_eq!(
            c.compare_first(&NodeValue::integer("5000")),
            Some(Ordering::Less)
        );
    }
}
