//! Basic-graph-pattern probes.
//!
//! Solves a pattern (triples + filters) against the store by recursive
//! nested-loop join, then filter evaluation. This is the executor behind
//! the rewriter's ground-type probes; it is not a general query engine
//! and does not try to be fast beyond the by-predicate index.
//!
//! Filter evaluation follows SPARQL error semantics: a filter that cannot
//! be evaluated (unbound variable, incomparable values) is false.

use graphveil_core::{NodeValue, Term, Var};
use graphveil_sparql::ast::{BinaryOp, Expression, GraphPattern, TriplePattern};
use rustc_hash::FxHashMap;
use std::cmp::Ordering;

use crate::store::{DataTriple, Graph};

/// A solution: variable-to-term bindings.
pub type Bindings = FxHashMap<Var, Term>;

/// Solve the pattern against the graph, returning every solution.
pub fn solve(graph: &Graph, pattern: &GraphPattern) -> Vec<Bindings> {
    let mut solutions = Vec::new();
    join(graph, &pattern.triples, Bindings::default(), &mut solutions);

    solutions.retain(|binding| {
        pattern
            .filters
            .iter()
            .all(|f| eval(graph, &f.expr, binding))
    });
    solutions
}

/// Distinct bindings of `var` across all solutions of the pattern, in
/// first-occurrence order.
pub fn select_distinct(graph: &Graph, pattern: &GraphPattern, var: &Var) -> Vec<Term> {
    let mut result = Vec::new();
    for binding in solve(graph, pattern) {
        if let Some(term) = binding.get(var) {
            if !result.contains(term) {
                result.push(term.clone());
            }
        }
    }
    result
}

fn join(graph: &Graph, triples: &[TriplePattern], binding: Bindings, out: &mut Vec<Bindings>) {
    let Some((first, rest)) = triples.split_first() else {
        out.push(binding);
        return;
    };

    // Scan by predicate when it is ground under the current binding
    let predicate = match resolve(&first.predicate, &binding) {
        Term::Iri(iri) => Some(iri),
        _ => None,
    };

    for data in graph.matching(None, predicate.as_ref(), None) {
        if let Some(extended) = match_triple(first, data, &binding) {
            join(graph, rest, extended, out);
        }
    }
}

/// Match a pattern triple against a data triple, extending the binding.
fn match_triple(
    pattern: &TriplePattern,
    data: &DataTriple,
    binding: &Bindings,
) -> Option<Bindings> {
    let mut extended = binding.clone();
    match_term(&pattern.subject, &data.subject, &mut extended)?;
    match_term(&pattern.predicate, &Term::Iri(data.predicate.clone()), &mut extended)?;
    match_term(&pattern.object, &data.object, &mut extended)?;
    Some(extended)
}

fn match_term(pattern: &Term, data: &Term, binding: &mut Bindings) -> Option<()> {
    match pattern {
        Term::Var(v) => match binding.get(v) {
            Some(bound) => (bound == data).then_some(()),
            None => {
                binding.insert(v.clone(), data.clone());
                Some(())
            }
        },
        // Query blank nodes act as anonymous wildcards
        Term::Blank(_) => Some(()),
        _ => (pattern == data).then_some(()),
    }
}

/// Substitute bound variables into a term.
fn resolve(term: &Term, binding: &Bindings) -> Term {
    match term {
        Term::Var(v) => binding.get(v).cloned().unwrap_or_else(|| term.clone()),
        _ => term.clone(),
    }
}

/// Evaluate a filter expression under a binding. Anything that cannot be
/// evaluated is false.
fn eval(graph: &Graph, expr: &Expression, binding: &Bindings) -> bool {
    match expr {
        Expression::Binary { op, left, right } => match op {
            BinaryOp::And => {
                eval(graph, left, binding) && eval(graph, right, binding)
            }
            BinaryOp::Or => eval(graph, left, binding) || eval(graph, right, binding),
            _ => {
                let (Some(l), Some(r)) = (
                    eval_value(left, binding),
                    eval_value(right, binding),
                ) else {
                    return false;
                };
                compare(*op, &l, &r)
            }
        },
        Expression::Not(inner) => !eval(graph, inner, binding),
        Expression::In {
            expr,
            list,
            negated,
        } => {
            let Some(value) = eval_value(expr, binding) else {
                return false;
            };
            let contained = list.iter().any(|e| {
                eval_value(e, binding).is_some_and(|v| value.same_value(&v))
            });
            contained != *negated
        }
        Expression::NotExists { pattern } => {
            let substituted = substitute_pattern(pattern, binding);
            solve(graph, &substituted).is_empty()
        }
        // Bare variables, constants, and aggregates are not boolean
        Expression::Var(_) | Expression::Value(_) | Expression::Aggregate { .. } => false,
    }
}

fn compare(op: BinaryOp, left: &NodeValue, right: &NodeValue) -> bool {
    match op {
        BinaryOp::Eq => left.same_value(right),
        // Distinct IRIs are unordered but still unequal
        BinaryOp::Ne => match left.compare(right) {
            Some(ordering) => ordering != Ordering::Equal,
            None => left.kind() == graphveil_core::ValueKind::Iri
                && right.kind() == graphveil_core::ValueKind::Iri,
        },
        BinaryOp::Lt => left.compare(right) == Some(Ordering::Less),
        BinaryOp::Le => matches!(
            left.compare(right),
            Some(Ordering::Less) | Some(Ordering::Equal)
        ),
        BinaryOp::Gt => left.compare(right) == Some(Ordering::Greater),
        BinaryOp::Ge => matches!(
            left.compare(right),
            Some(Ordering::Greater) | Some(Ordering::Equal)
        ),
        BinaryOp::And | BinaryOp::Or => false,
    }
}

fn eval_value(expr: &Expression, binding: &Bindings) -> Option<NodeValue> {
    match expr {
        Expression::Value(v) => Some(v.clone()),
        Expression::Var(v) => NodeValue::from_term(binding.get(v)?),
        _ => None,
    }
}

/// Clone a pattern with bound variables replaced by their terms.
fn substitute_pattern(pattern: &GraphPattern, binding: &Bindings) -> GraphPattern {
    GraphPattern {
        triples: pattern
            .triples
            .iter()
            .map(|t| TriplePattern {
                subject: resolve(&t.subject, binding),
                predicate: resolve(&t.predicate, binding),
                object: resolve(&t.object, binding),
            })
            .collect(),
        filters: pattern.filters.clone(),
    }
}
