//! Policy file loading and constraint lookups.
//!
//! The policy file is a single JSON array. Each element carries a
//! `constraint` tag (`node`, `predicate`, `attribute`); unknown tags are
//! skipped silently, while entries that fail validation (missing keys,
//! operator outside the closed set, unknown object-type, wrong value
//! count) are skipped with a warning so the rest of the policy still
//! loads.

use std::path::Path;

use graphveil_core::{Iri, NodeValue, ValueKind};
use serde::Deserialize;
use tracing::{debug, warn};

use crate::error::{PolicyError, Result};
use crate::types::{AttributeConstraint, ConstraintOp, NodeConstraint, PredicateConstraint};

/// In-memory policy store.
#[derive(Debug, Default)]
pub struct PolicyStore {
    node: Vec<NodeConstraint>,
    predicate: Vec<PredicateConstraint>,
    attribute: Vec<AttributeConstraint>,
}

#[derive(Deserialize)]
struct RawNode {
    user: String,
    #[serde(rename = "node-type")]
    node_type: String,
    nodes: Option<Vec<String>>,
}

#[derive(Deserialize)]
struct RawPredicate {
    user: String,
    #[serde(rename = "subject-type")]
    subject_type: String,
    predicate: String,
    #[serde(rename = "object-type")]
    object_type: String,
    subjects: Option<Vec<String>>,
    objects: Option<Vec<String>>,
}

#[derive(Deserialize)]
struct RawAttribute {
    user: String,
    #[serde(rename = "subject-type")]
    subject_type: String,
    predicate: String,
    subjects: Option<Vec<String>>,
    symbol: String,
    values: Option<Vec<String>>,
    #[serde(rename = "object-type")]
    object_type: Option<String>,
}

impl PolicyStore {
    /// Create an empty store (the identity policy).
    pub fn new() -> Self {
        Self::default()
    }

    /// Load a policy file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let source = std::fs::read_to_string(path).map_err(|source| PolicyError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let store = Self::from_json_str(&source)?;
        debug!(
            path = %path.display(),
            node = store.node.len(),
            predicate = store.predicate.len(),
            attribute = store.attribute.len(),
            "loaded policy"
        );
        Ok(store)
    }

    /// Parse a policy from a JSON string.
    pub fn from_json_str(source: &str) -> Result<Self> {
        let doc: serde_json::Value = serde_json::from_str(source)?;
        let entries = doc.as_array().ok_or(PolicyError::NotAnArray)?;

        let mut store = PolicyStore::new();
        for entry in entries {
            let Some(tag) = entry.get("constraint").and_then(|v| v.as_str()) else {
                warn!("skipping policy entry without a 'constraint' tag");
                continue;
            };

            match tag {
                "node" => match serde_json::from_value::<RawNode>(entry.clone()) {
                    Ok(raw) => store.node.push(NodeConstraint {
                        user: raw.user,
                        node_type: Iri::new(raw.node_type),
                        nodes: raw.nodes.map(to_iris),
                    }),
                    Err(e) => warn!(error = %e, "skipping malformed node constraint"),
                },
                "predicate" => match serde_json::from_value::<RawPredicate>(entry.clone()) {
                    Ok(raw) => store.predicate.push(PredicateConstraint {
                        user: raw.user,
                        subject_type: Iri::new(raw.subject_type),
                        predicate: Iri::new(raw.predicate),
                        object_type: Iri::new(raw.object_type),
                        subjects: raw.subjects.map(to_iris),
                        objects: raw.objects.map(to_iris),
                    }),
                    Err(e) => warn!(error = %e, "skipping malformed predicate constraint"),
                },
                "attribute" => match serde_json::from_value::<RawAttribute>(entry.clone()) {
                    Ok(raw) => {
                        if let Some(constraint) = build_attribute(raw) {
                            store.attribute.push(constraint);
                        }
                    }
                    Err(e) => warn!(error = %e, "skipping malformed attribute constraint"),
                },
                // Unknown constraint kinds are skipped silently
                _ => {}
            }
        }

        Ok(store)
    }

    /// True if no constraints were loaded.
    pub fn is_empty(&self) -> bool {
        self.node.is_empty() && self.predicate.is_empty() && self.attribute.is_empty()
    }

    /// Node constraints for (user, node type).
    ///
    /// An unscoped entry (no specific nodes) subsumes every scoped one and
    /// is returned alone; otherwise all scoped entries are returned.
    pub fn node_constraints(&self, user: &str, node_type: &Iri) -> Vec<&NodeConstraint> {
        let mut result = Vec::new();
        for c in &self.node {
            if c.user == user && c.node_type == *node_type {
                if !c.has_nodes() {
                    return vec![c];
                }
                result.push(c);
            }
        }
        result
    }

    /// Predicate constraints for (user, subject type, predicate, object
    /// type).
    ///
    /// An entry with neither subject nor object set forbids the edge
    /// absolutely and is returned alone; otherwise all scoped entries are
    /// returned.
    pub fn predicate_constraints(
        &self,
        user: &str,
        subject_type: &Iri,
        predicate: &Iri,
        object_type: &Iri,
    ) -> Vec<&PredicateConstraint> {
        let mut result = Vec::new();
        for c in &self.predicate {
            if c.user == user
                && c.subject_type == *subject_type
                && c.predicate == *predicate
                && c.object_type == *object_type
            {
                if !c.has_subjects() && !c.has_objects() {
                    return vec![c];
                }
                result.push(c);
            }
        }
        result
    }

    /// Attribute constraints for (user, subject type, predicate).
    ///
    /// Deny-read is authoritative: an unscoped `X` entry is returned
    /// alone; `X` entries scoped by subjects drop every value-operator
    /// entry; otherwise all value-operator entries are returned.
    pub fn attribute_constraints(
        &self,
        user: &str,
        subject_type: &Iri,
        predicate: &Iri,
    ) -> Vec<&AttributeConstraint> {
        let mut result = Vec::new();
        let mut deny_scoped = false;

        for c in &self.attribute {
            if c.user == user && c.subject_type == *subject_type && c.predicate == *predicate {
                if c.op == ConstraintOp::DenyRead {
                    if c.has_subjects() {
                        if !deny_scoped {
                            result.clear();
                            deny_scoped = true;
                        }
                        result.push(c);
                    } else {
                        return vec![c];
                    }
                } else if !deny_scoped {
                    result.push(c);
                }
            }
        }

        result
    }
}

fn to_iris(values: Vec<String>) -> Vec<Iri> {
    values.into_iter().map(Iri::new).collect()
}

/// Validate and build an attribute constraint; `None` skips the entry.
fn build_attribute(raw: RawAttribute) -> Option<AttributeConstraint> {
    let Some(op) = ConstraintOp::parse(&raw.symbol) else {
        warn!(symbol = %raw.symbol, "skipping attribute constraint with unknown operator");
        return None;
    };

    if op == ConstraintOp::DenyRead {
        return Some(AttributeConstraint {
            user: raw.user,
            subject_type: Iri::new(raw.subject_type),
            predicate: Iri::new(raw.predicate),
            subjects: raw.subjects.map(to_iris),
            op,
            values: Vec::new(),
            value_kind: ValueKind::Iri,
        });
    }

    let Some(kind) = raw.object_type.as_deref().and_then(ValueKind::parse) else {
        warn!(
            object_type = raw.object_type.as_deref().unwrap_or("<missing>"),
            "skipping attribute constraint with unknown object-type"
        );
        return None;
    };

    let values = raw.values.unwrap_or_default();
    if !op.arity().contains(&values.len()) {
        warn!(
            symbol = %raw.symbol,
            count = values.len(),
            "skipping attribute constraint with wrong number of values"
        );
        return None;
    }

    Some(AttributeConstraint {
        user: raw.user,
        subject_type: Iri::new(raw.subject_type),
        predicate: Iri::new(raw.predicate),
        subjects: raw.subjects.map(to_iris),
        op,
        values: values
            .into_iter()
            .map(|v| NodeValue::new(kind, v))
            .collect(),
        value_kind: kind,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn iri(s: &str) -> Iri {
        Iri::new(format!("http://example.org/{s}"))
    }

    #[test]
    fn test_load_mixed_policy() {
        let store = PolicyStore::from_json_str(
            r#"[
                {"constraint": "node", "user": "guest", "node-type": "http://example.org/Doctor"},
                {"constraint": "node", "user": "guest", "node-type": "http://example.org/Person",
                 "nodes": ["http://example.org/alice"]},
                {"constraint": "predicate", "user": "guest",
                 "subject-type": "http://example.org/Person",
                 "predicate": "http://example.org/knows",
                 "object-type": "http://example.org/Person"},
                {"constraint": "attribute", "user": "guest",
                 "subject-type": "http://example.org/Person",
                 "predicate": "http://example.org/hasSalary",
                 "symbol": "<", "object-type": "integer", "values": ["1000"]}
            ]"#,
        )
        .unwrap();

        assert!(!store.is_empty());
        assert_eq!(store.node_constraints("guest", &iri("Doctor")).len(), 1);
        assert_eq!(
            store
                .predicate_constraints("guest", &iri("Person"), &iri("knows"), &iri("Person"))
                .len(),
            1
        );
        assert_eq!(
            store
                .attribute_constraints("guest", &iri("Person"), &iri("hasSalary"))
                .len(),
            1
        );
    }

    #[test]
    fn test_unscoped_node_constraint_subsumes() {
        let store = PolicyStore::from_json_str(
            r#"[
                {"constraint": "node", "user": "guest", "node-type": "http://example.org/Doctor",
                 "nodes": ["http://example.org/carol"]},
                {"constraint": "node", "user": "guest", "node-type": "http://example.org/Doctor"}
            ]"#,
        )
        .unwrap();

        let result = store.node_constraints("guest", &iri("Doctor"));
        assert_eq!(result.len(), 1);
        assert!(!result[0].has_nodes());
    }

    #[test]
    fn test_deny_read_overrides_value_operators() {
        let store = PolicyStore::from_json_str(
            r#"[
                {"constraint": "attribute", "user": "guest",
                 "subject-type": "http://example.org/Person",
                 "predicate": "http://example.org/hasSalary",
                 "symbol": "<", "object-type": "integer", "values": ["1000"]},
                {"constraint": "attribute", "user": "guest",
                 "subject-type": "http://example.org/Person",
                 "predicate": "http://example.org/hasSalary",
                 "symbol": "X", "subjects": ["http://example.org/alice"]}
            ]"#,
        )
        .unwrap();

        let result = store.attribute_constraints("guest", &iri("Person"), &iri("hasSalary"));
        assert_eq!(result.len(), 1);
        assert_eq!(result[0].op, ConstraintOp::DenyRead);
    }

    #[test]
    fn test_unscoped_deny_read_returned_alone() {
        let store = PolicyStore::from_json_str(
            r#"[
                {"constraint": "attribute", "user": "guest",
                 "subject-type": "http://example.org/Person",
                 "predicate": "http://example.org/hasSalary",
                 "symbol": "X", "subjects": ["http://example.org/alice"]},
                {"constraint": "attribute", "user": "guest",
                 "subject-type": "http://example.org/Person",
                 "predicate": "http://example.org/hasSalary",
                 "symbol": "X"}
            ]"#,
        )
        .unwrap();

        let result = store.attribute_constraints("guest", &iri("Person"), &iri("hasSalary"));
        assert_eq!(result.len(), 1);
        assert!(!result[0].has_subjects());
    }

    #[test]
    fn test_malformed_entries_skipped() {
        let store = PolicyStore::from_json_str(
            r#"[
                {"constraint": "attribute", "user": "guest",
                 "subject-type": "http://example.org/Person",
                 "predicate": "http://example.org/hasSalary",
                 "symbol": "~~", "object-type": "integer", "values": ["1"]},
                {"constraint": "attribute", "user": "guest",
                 "subject-type": "http://example.org/Person",
                 "predicate": "http://example.org/hasSalary",
                 "symbol": "between", "object-type": "integer", "values": ["1"]},
                {"constraint": "mystery", "user": "guest"},
                {"constraint": "node", "user": "guest", "node-type": "http://example.org/Doctor"}
            ]"#,
        )
        .unwrap();

        assert_eq!(store.node_constraints("guest", &iri("Doctor")).len(), 1);
        assert!(store
            .attribute_constraints("guest", &iri("Person"), &iri("hasSalary"))
            .is_empty());
    }

    #[test]
    fn test_not_an_array() {
        assert!(matches!(
            PolicyStore::from_json_str(r#"{"constraint": "node"}"#),
            Err(PolicyError::NotAnArray)
        ));
    }

    #[test]
    fn test_user_scoping() {
        let store = PolicyStore::from_json_str(
            r#"[
                {"constraint": "node", "user": "guest", "node-type": "http://example.org/Doctor"}
            ]"#,
        )
        .unwrap();
        assert!(store.node_constraints("admin", &iri("Doctor")).is_empty());
    }
}
