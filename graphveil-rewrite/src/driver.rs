//! The rewrite driver: node, predicate, and attribute passes.
//!
//! Each pass walks the query model, consults the policy store for every
//! candidate type, and decides per constraint whether the outcome is a
//! filter addition, a triple elision, or nothing. Decisions are explicit
//! [`CheckOutcome`] values; the driver reacts to them instead of
//! unwinding through the pass.
//!
//! Elision bookkeeping: within one triple, a pass counts the `NOT EXISTS`
//! filters it generated (`not_exists`) and the candidate combinations the
//! schema ruled out (`skip`). When every surviving combination produced a
//! `NOT EXISTS`, the whole triple is unreadable and is removed instead of
//! filtered.

use graphveil_core::{Iri, NodeValue, Term, Var};
use graphveil_graph::{Graph, SchemaView};
use graphveil_policy::{AttributeConstraint, ConstraintOp, PolicyStore};
use graphveil_sparql::ast::{BinaryOp, Expression, Filter, Query, TriplePattern};
use tracing::debug;

use crate::infer;
use crate::model::QueryModel;

/// Result of a rewrite: the narrowed query and which passes changed it.
#[derive(Clone, Debug)]
pub struct RewriteOutcome {
    /// The narrowed query
    pub query: Query,
    /// True if the node pass changed the query
    pub node_applied: bool,
    /// True if the predicate pass changed the query
    pub predicate_applied: bool,
    /// True if the attribute pass changed the query
    pub attribute_applied: bool,
}

/// What a single constraint check decided.
enum CheckOutcome {
    /// Remove the triple immediately
    Drop,
    /// Add these filters
    Emit(Vec<Filter>),
    /// Nothing to do
    Noop,
}

/// Policy-driven query rewriter.
///
/// One instance serves one query at a time; the dataset, schema view,
/// and policy store are read-only for the lifetime of a rewrite.
pub struct Rewriter<'a> {
    graph: &'a Graph,
    schema: &'a SchemaView,
    policy: &'a PolicyStore,
    user: String,
}

impl<'a> Rewriter<'a> {
    /// Create a rewriter for a user identity.
    pub fn new(
        graph: &'a Graph,
        schema: &'a SchemaView,
        policy: &'a PolicyStore,
        user: impl Into<String>,
    ) -> Self {
        Self {
            graph,
            schema,
            policy,
            user: user.into(),
        }
    }

    /// Rewrite a query so it returns only data the user may see.
    pub fn rewrite(&self, query: &Query) -> RewriteOutcome {
        debug!(user = %self.user, "starting rewrite");
        let bindings = infer::infer(self.graph, self.schema, query);
        let mut model = QueryModel::new(query.clone(), bindings);

        let before = model.output().clone();
        for var in model.node_vars() {
            self.check_var_node_constraints(&var, &mut model);
        }
        for uri in model.node_uris() {
            self.check_uri_node_constraints(&uri, &mut model);
        }
        let node_applied = *model.output() != before;

        let before = model.output().clone();
        for triple in model.triples() {
            if model.contains_triple(&triple) {
                self.check_predicate_constraints(&triple, &mut model);
            }
        }
        let predicate_applied = *model.output() != before;

        let before = model.output().clone();
        for triple in model.triples() {
            if model.contains_triple(&triple) {
                self.check_attribute_constraints(&triple, &mut model);
            }
        }
        let attribute_applied = *model.output() != before;

        RewriteOutcome {
            query: model.into_output(),
            node_applied,
            predicate_applied,
            attribute_applied,
        }
    }

    // =========================================================================
    // Node pass
    // =========================================================================

    /// Entity-class denial for a variable.
    ///
    /// Instance-level constraints become `v NOT IN (nodes)`; class-level
    /// ones become `NOT EXISTS { v rdf:type T }`. When every candidate
    /// type is denied at class level the variable is unusable and every
    /// triple mentioning it is dropped instead.
    fn check_var_node_constraints(&self, var: &Var, model: &mut QueryModel) {
        let types = model.types_of_var(var);

        let mut filters = Vec::new();
        let mut not_exists = 0usize;

        for node_type in &types {
            let constraints = self.policy.node_constraints(&self.user, node_type);
            if constraints.is_empty() {
                continue;
            }

            if constraints[0].has_nodes() {
                let nodes: Vec<NodeValue> = constraints
                    .iter()
                    .flat_map(|c| c.nodes())
                    .map(|iri| NodeValue::iri(iri.as_str()))
                    .collect();
                filters.push(Filter::new(Expression::in_list(
                    Expression::Var(var.clone()),
                    nodes,
                    true,
                )));
            } else {
                filters.push(Filter::new(Expression::not_exists(TriplePattern::rdf_type(
                    Term::Var(var.clone()),
                    Term::Iri(node_type.clone()),
                ))));
                not_exists += 1;
            }
        }

        if not_exists != 0 && not_exists == types.len() {
            for triple in model.triples_with_term(&Term::Var(var.clone())) {
                model.remove_triple(&triple);
            }
        } else {
            for filter in filters {
                model.add_filter(filter);
            }
        }
    }

    /// Entity-class denial for a constant IRI: any applicable denial
    /// removes every triple mentioning the constant.
    fn check_uri_node_constraints(&self, uri: &Iri, model: &mut QueryModel) {
        for node_type in model.types_of_uri(uri) {
            let constraints = self.policy.node_constraints(&self.user, &node_type);
            if constraints.is_empty() {
                continue;
            }

            if constraints[0].has_nodes() {
                for constraint in constraints {
                    if constraint.nodes().contains(uri) {
                        for triple in model.triples_with_term(&Term::Iri(uri.clone())) {
                            model.remove_triple(&triple);
                        }
                        return;
                    }
                }
            } else {
                for triple in model.triples_with_term(&Term::Iri(uri.clone())) {
                    model.remove_triple(&triple);
                }
                return;
            }
        }
    }

    // =========================================================================
    // Predicate pass
    // =========================================================================

    /// Edge denial for one triple, over the Cartesian product of its
    /// candidate subject types, predicate IRIs, and object types.
    fn check_predicate_constraints(&self, triple: &TriplePattern, model: &mut QueryModel) {
        let subject_types = candidate_types(model, &triple.subject);
        let predicate_types = candidate_predicates(model, &triple.predicate);
        let object_types = candidate_types(model, &triple.object);

        let mut filters: Vec<Filter> = Vec::new();
        let mut not_exists = 0usize;
        let mut skip = 0usize;

        for predicate in &predicate_types {
            let domain = self.schema.domain(predicate);
            let range = self.schema.range(predicate);

            for subject_type in &subject_types {
                if !domain.is_empty() && !domain.contains(subject_type) {
                    skip += 1;
                    continue;
                }

                for object_type in &object_types {
                    if !range.is_empty() && !range.contains(object_type) {
                        skip += 1;
                        continue;
                    }

                    let constraints = self.policy.predicate_constraints(
                        &self.user,
                        subject_type,
                        predicate,
                        object_type,
                    );
                    if constraints.is_empty() {
                        continue;
                    }

                    if !constraints[0].has_subjects() && !constraints[0].has_objects() {
                        // Absolute edge denial
                        filters.push(Filter::new(Expression::not_exists(TriplePattern::new(
                            triple.subject.clone(),
                            Term::Iri(predicate.clone()),
                            triple.object.clone(),
                        ))));
                        not_exists += 1;
                        continue;
                    }

                    let mut subjects: Vec<Iri> = Vec::new();
                    let mut objects: Vec<Iri> = Vec::new();

                    for constraint in &constraints {
                        if constraint.has_subjects() && constraint.has_objects() {
                            // Forbid the specific (subject, object) pairs
                            let lhs = membership(&triple.subject, constraint.subjects());
                            let rhs = membership(&triple.object, constraint.objects());
                            filters.push(Filter::new(Expression::not(Expression::and(lhs, rhs))));
                        } else if constraint.has_subjects() {
                            subjects.extend(constraint.subjects().iter().cloned());
                        } else if constraint.has_objects() {
                            objects.extend(constraint.objects().iter().cloned());
                        }
                    }

                    match &triple.subject {
                        Term::Var(v) => {
                            if !subjects.is_empty() {
                                filters.push(Filter::new(Expression::in_list(
                                    Expression::Var(v.clone()),
                                    iri_values(&subjects),
                                    true,
                                )));
                            }
                        }
                        Term::Iri(s) => {
                            if subjects.contains(s) {
                                filters.push(Filter::new(Expression::not_exists(
                                    TriplePattern::rdf_type(
                                        Term::Iri(s.clone()),
                                        Term::Iri(subject_type.clone()),
                                    ),
                                )));
                                not_exists += 1;
                            }
                        }
                        _ => {}
                    }

                    match &triple.object {
                        Term::Var(v) => {
                            if !objects.is_empty() {
                                filters.push(Filter::new(Expression::in_list(
                                    Expression::Var(v.clone()),
                                    iri_values(&objects),
                                    true,
                                )));
                            }
                        }
                        Term::Iri(o) => {
                            if objects.contains(o) {
                                filters.push(Filter::new(Expression::not_exists(
                                    TriplePattern::rdf_type(
                                        Term::Iri(o.clone()),
                                        Term::Iri(object_type.clone()),
                                    ),
                                )));
                                not_exists += 1;
                            }
                        }
                        _ => {}
                    }
                }
            }
        }

        let product = predicate_types.len() * subject_types.len() * object_types.len();
        if not_exists != 0 && not_exists == product - skip {
            model.remove_triple(triple);
        } else {
            for filter in filters {
                model.add_filter(filter);
            }
        }
    }

    // =========================================================================
    // Attribute pass
    // =========================================================================

    /// Value denial for one triple, over its candidate (subject type,
    /// predicate) combinations.
    fn check_attribute_constraints(&self, triple: &TriplePattern, model: &mut QueryModel) {
        let subject_types = candidate_types(model, &triple.subject);
        let predicate_types = candidate_predicates(model, &triple.predicate);

        let mut filters: Vec<Filter> = Vec::new();
        let mut not_exists = 0usize;
        let mut skip = 0usize;

        for predicate in &predicate_types {
            let domain = self.schema.domain(predicate);

            for subject_type in &subject_types {
                if !domain.is_empty() && !domain.contains(subject_type) {
                    skip += 1;
                    continue;
                }

                let constraints =
                    self.policy
                        .attribute_constraints(&self.user, subject_type, predicate);

                for constraint in constraints {
                    match self.check_attribute(constraint, triple, predicate) {
                        CheckOutcome::Drop => {
                            model.remove_triple(triple);
                            return;
                        }
                        CheckOutcome::Emit(emitted) => {
                            for filter in emitted {
                                if filter.is_not_exists() {
                                    not_exists += 1;
                                }
                                filters.push(filter);
                            }
                        }
                        CheckOutcome::Noop => {}
                    }
                }
            }
        }

        let product = predicate_types.len() * subject_types.len();
        if not_exists != 0 && not_exists == product - skip {
            model.remove_triple(triple);
        } else {
            for filter in filters {
                model.add_filter(filter);
            }
        }
    }

    /// Decide what one attribute constraint does to the triple.
    fn check_attribute(
        &self,
        constraint: &AttributeConstraint,
        triple: &TriplePattern,
        predicate: &Iri,
    ) -> CheckOutcome {
        match constraint.op {
            ConstraintOp::DenyRead => {
                if constraint.has_subjects() {
                    match &triple.subject {
                        Term::Var(v) => CheckOutcome::Emit(vec![Filter::new(
                            Expression::in_list(
                                Expression::Var(v.clone()),
                                iri_values(constraint.subjects()),
                                true,
                            ),
                        )]),
                        Term::Iri(s) if constraint.subjects().contains(s) => {
                            self.deny_triple(triple, predicate)
                        }
                        _ => CheckOutcome::Noop,
                    }
                } else {
                    self.deny_triple(triple, predicate)
                }
            }

            ConstraintOp::Eq
            | ConstraintOp::Ne
            | ConstraintOp::Lt
            | ConstraintOp::Le
            | ConstraintOp::Gt
            | ConstraintOp::Ge => match &triple.object {
                Term::Var(v) => {
                    let op = comparison_op(constraint.op);
                    CheckOutcome::Emit(vec![Filter::new(Expression::compare(
                        op,
                        v.clone(),
                        constraint.value().clone(),
                    ))])
                }
                Term::Literal(literal) => {
                    let value = NodeValue::new(constraint.value_kind, literal.lexical());
                    if violates(constraint, &value) {
                        self.deny_triple(triple, predicate)
                    } else {
                        CheckOutcome::Noop
                    }
                }
                _ => CheckOutcome::Noop,
            },

            ConstraintOp::Between => match &triple.object {
                Term::Var(v) => CheckOutcome::Emit(vec![
                    Filter::new(Expression::compare(
                        BinaryOp::Ge,
                        v.clone(),
                        constraint.values[0].clone(),
                    )),
                    Filter::new(Expression::compare(
                        BinaryOp::Le,
                        v.clone(),
                        constraint.values[1].clone(),
                    )),
                ]),
                Term::Literal(literal) => {
                    let value = NodeValue::new(constraint.value_kind, literal.lexical());
                    // An unparsable value violates every operator
                    if constraint.between(&value) != Some(true) {
                        self.deny_triple(triple, predicate)
                    } else {
                        CheckOutcome::Noop
                    }
                }
                _ => CheckOutcome::Noop,
            },

            ConstraintOp::In | ConstraintOp::NotIn => match &triple.object {
                Term::Var(v) => CheckOutcome::Emit(vec![Filter::new(Expression::in_list(
                    Expression::Var(v.clone()),
                    constraint.values.clone(),
                    constraint.op == ConstraintOp::NotIn,
                ))]),
                Term::Literal(literal) => {
                    let value = NodeValue::new(constraint.value_kind, literal.lexical());
                    // A value that does not parse under the declared
                    // kind violates every operator
                    let unparsable = value.compare(&value).is_none();
                    let contained = constraint.contains(&value);
                    let permitted = if constraint.op == ConstraintOp::In {
                        contained
                    } else {
                        !contained && !unparsable
                    };
                    if permitted {
                        CheckOutcome::Noop
                    } else {
                        self.deny_triple(triple, predicate)
                    }
                }
                _ => CheckOutcome::Noop,
            },
        }
    }

    /// The triple is unreadable under this constraint: drop it when its
    /// predicate is ground, otherwise pin the candidate predicate in a
    /// `NOT EXISTS` filter.
    fn deny_triple(&self, triple: &TriplePattern, predicate: &Iri) -> CheckOutcome {
        if triple.predicate.is_var() {
            CheckOutcome::Emit(vec![Filter::new(Expression::not_exists(
                TriplePattern::new(
                    triple.subject.clone(),
                    Term::Iri(predicate.clone()),
                    triple.object.clone(),
                ),
            ))])
        } else {
            CheckOutcome::Drop
        }
    }
}

/// Candidate `rdf:type` IRIs for a triple position (empty for literals
/// and blank nodes).
fn candidate_types(model: &QueryModel, term: &Term) -> Vec<Iri> {
    match term {
        Term::Var(v) => model.types_of_var(v),
        Term::Iri(u) => model.types_of_uri(u),
        _ => Vec::new(),
    }
}

/// Candidate predicate IRIs for a triple's predicate position.
fn candidate_predicates(model: &QueryModel, term: &Term) -> Vec<Iri> {
    match term {
        Term::Var(v) => model.predicate_types_of(v),
        Term::Iri(p) => vec![p.clone()],
        _ => Vec::new(),
    }
}

/// Membership of a term in an IRI set, degenerating to an equality for
/// a singleton set.
fn membership(term: &Term, iris: &[Iri]) -> Expression {
    let subject = term_expr(term);
    if iris.len() == 1 {
        Expression::binary(
            BinaryOp::Eq,
            subject,
            Expression::Value(NodeValue::iri(iris[0].as_str())),
        )
    } else {
        Expression::in_list(subject, iri_values(iris), false)
    }
}

fn term_expr(term: &Term) -> Expression {
    match term {
        Term::Var(v) => Expression::Var(v.clone()),
        Term::Iri(iri) => Expression::Value(NodeValue::iri(iri.as_str())),
        Term::Literal(literal) => Expression::Value(NodeValue::from_literal(literal)),
        Term::Blank(label) => Expression::Value(NodeValue::string(label.as_ref())),
    }
}

fn iri_values(iris: &[Iri]) -> Vec<NodeValue> {
    iris.iter().map(|iri| NodeValue::iri(iri.as_str())).collect()
}

fn comparison_op(op: ConstraintOp) -> BinaryOp {
    match op {
        ConstraintOp::Eq => BinaryOp::Eq,
        ConstraintOp::Ne => BinaryOp::Ne,
        ConstraintOp::Lt => BinaryOp::Lt,
        ConstraintOp::Le => BinaryOp::Le,
        ConstraintOp::Gt => BinaryOp::Gt,
        ConstraintOp::Ge => BinaryOp::Ge,
        // The remaining operators never reach the comparison path
        ConstraintOp::DenyRead | ConstraintOp::Between | ConstraintOp::In | ConstraintOp::NotIn => {
            BinaryOp::Eq
        }
    }
}

/// Whether a ground literal value violates the permitted range of a
/// comparison constraint. A failed comparison violates every operator.
fn violates(constraint: &AttributeConstraint, value: &NodeValue) -> bool {
    use std::cmp::Ordering;

    let comparison = constraint.compare_first(value);
    match constraint.op {
        ConstraintOp::Eq => comparison != Some(Ordering::Equal),
        ConstraintOp::Ne => !matches!(
            comparison,
            Some(Ordering::Less) | Some(Ordering::Greater)
        ),
        // Permitted: value > bound, i.e. bound < value
        ConstraintOp::Gt => !matches!(comparison, Some(Ordering::Less)),
        ConstraintOp::Ge => !matches!(comparison, Some(Ordering::Less) | Some(Ordering::Equal)),
        ConstraintOp::Lt => !matches!(comparison, Some(Ordering::Greater)),
        ConstraintOp::Le => !matches!(comparison, Some(Ordering::Greater) | Some(Ordering::Equal)),
        ConstraintOp::DenyRead
        | ConstraintOp::Between
        | ConstraintOp::In
        | ConstraintOp::NotIn => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use graphveil_core::ValueKind;

    fn lt_constraint(values: &[&str], kind: ValueKind) -> AttributeConstraint {
        AttributeConstraint {
            user: "guest".into(),
            subject_type: Iri::new("http://e.org/Person"),
            predicate: Iri::new("http://e.org/hasSalary"),
            subjects: None,
            op: ConstraintOp::Lt,
            values: values.iter().map(|v| NodeValue::new(kind, *v)).collect(),
            value_kind: kind,
        }
    }

    #[test]
    fn test_violates_lt() {
        let c = lt_constraint(&["1000"], ValueKind::Integer);
        assert!(violates(&c, &NodeValue::integer("5000")));
        assert!(violates(&c, &NodeValue::integer("1000")));
        assert!(!violates(&c, &NodeValue::integer("999")));
    }

    #[test]
    fn test_unparsable_date_violates() {
        let c = lt_constraint(&["2020-01-01"], ValueKind::Date);
        assert!(violates(&c, &NodeValue::date("not-a-date")));
        assert!(!violates(&c, &NodeValue::date("2019-12-31")));
    }

    #[test]
    fn test_membership_degenerates_to_eq() {
        let single = membership(&Term::var("s"), &[Iri::new("http://e.org/a")]);
        assert!(matches!(
            single,
            Expression::Binary {
                op: BinaryOp::Eq,
                ..
            }
        ));

        let multi = membership(
            &Term::var("s"),
            &[Iri::new("http://e.org/a"), Iri::new("http://e.org/b")],
        );
        assert!(matches!(multi, Expression::In { negated: false, .. }));
    }
}
