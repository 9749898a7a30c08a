//! Candidate-type inference.
//!
//! For every subject/object variable and constant IRI in the input
//! pattern, computes the set of `rdf:type` IRIs it can denote; for every
//! predicate variable, the set of predicate IRIs it can take. The three
//! sources, in order:
//!
//! 1. an explicit `e rdf:type C` triple in the pattern pins the set;
//! 2. otherwise a ground probe runs the pattern against the dataset with
//!    `e rdf:type ?t` added, collecting the distinct bindings of `?t`;
//! 3. the result is intersected with the schema's declared domain/range
//!    of every ground predicate that touches the entity (skipping empty
//!    declarations, which constrain nothing).
//!
//! Probes happen once, at rewriter construction; the bindings only
//! shrink afterwards.

use graphveil_core::{Iri, Term, Var};
use graphveil_graph::{select_distinct, Graph, SchemaView};
use graphveil_sparql::ast::{GraphPattern, Query, TriplePattern};
use graphveil_vocab::rdf;
use tracing::debug;

use crate::bindings::TypeBindings;

/// Compute the candidate-type bindings for a query.
pub fn infer(graph: &Graph, schema: &SchemaView, query: &Query) -> TypeBindings {
    let mut bindings = TypeBindings::new();
    let (vars, uris, predicates) = collect_entities(&query.pattern);

    for var in vars {
        let types = entity_types(graph, schema, &query.pattern, &Term::Var(var.clone()));
        debug!(var = %var, ?types, "inferred candidate types");
        bindings.insert_var(var, types);
    }

    for uri in uris {
        let types = entity_types(graph, schema, &query.pattern, &Term::Iri(uri.clone()));
        debug!(uri = %uri, ?types, "inferred candidate types");
        bindings.insert_uri(uri, types);
    }

    for predicate in predicates {
        let values = predicate_values(graph, &query.pattern, &predicate);
        debug!(predicate = %predicate, ?values, "inferred candidate predicates");
        bindings.insert_predicate(predicate, values);
    }

    bindings
}

/// Subject/object variables, constant IRIs, and predicate variables of
/// the pattern, each in first-occurrence order.
fn collect_entities(pattern: &GraphPattern) -> (Vec<Var>, Vec<Iri>, Vec<Var>) {
    let mut vars: Vec<Var> = Vec::new();
    let mut uris: Vec<Iri> = Vec::new();
    let mut predicates: Vec<Var> = Vec::new();

    for triple in &pattern.triples {
        for term in [&triple.subject, &triple.object] {
            match term {
                Term::Var(v) => {
                    if !vars.contains(v) {
                        vars.push(v.clone());
                    }
                }
                Term::Iri(u) => {
                    if !uris.contains(u) {
                        uris.push(u.clone());
                    }
                }
                _ => {}
            }
        }
        if let Term::Var(p) = &triple.predicate {
            if !predicates.contains(p) {
                predicates.push(p.clone());
            }
        }
    }

    (vars, uris, predicates)
}

/// Candidate `rdf:type` IRIs for a subject/object entity (variable or
/// constant IRI).
fn entity_types(
    graph: &Graph,
    schema: &SchemaView,
    pattern: &GraphPattern,
    entity: &Term,
) -> Vec<Iri> {
    let rdf_type = Term::iri(rdf::TYPE);

    // Explicit rdf:type triples pin the candidate set
    let mut result: Vec<Iri> = Vec::new();
    for triple in &pattern.triples {
        if triple.subject == *entity && triple.predicate == rdf_type {
            if let Term::Iri(class) = &triple.object {
                if !result.contains(class) {
                    result.push(class.clone());
                }
            }
        }
    }

    // Otherwise probe the dataset with `entity rdf:type ?t` added
    if result.is_empty() {
        let type_var = fresh_var(pattern, "type");
        let mut probe = pattern.clone();
        probe.triples.push(TriplePattern::new(
            entity.clone(),
            rdf_type,
            Term::Var(type_var.clone()),
        ));
        result = select_distinct(graph, &probe, &type_var)
            .into_iter()
            .filter_map(|term| term.as_iri().cloned())
            .collect();
    }

    // Intersect with declared domain/range of the predicates touching
    // the entity; empty declarations constrain nothing
    let mut declared: Vec<Iri> = Vec::new();
    for triple in &pattern.triples {
        if let Term::Iri(p) = &triple.predicate {
            if triple.subject == *entity {
                declared.extend(schema.domain(p));
            } else if triple.object == *entity {
                declared.extend(schema.range(p));
            }
        }
    }
    if !declared.is_empty() {
        result.retain(|class| declared.contains(class));
    }

    result
}

/// Candidate predicate IRIs for a predicate variable: the distinct values
/// it takes when the pattern runs against the dataset.
fn predicate_values(graph: &Graph, pattern: &GraphPattern, predicate: &Var) -> Vec<Iri> {
    select_distinct(graph, pattern, predicate)
        .into_iter()
        .filter_map(|term| term.as_iri().cloned())
        .collect()
}

/// A variable name not used anywhere in the pattern.
fn fresh_var(pattern: &GraphPattern, stem: &str) -> Var {
    let mut used = pattern.triple_vars();
    for filter in &pattern.filters {
        for v in filter.free_vars() {
            if !used.contains(&v) {
                used.push(v);
            }
        }
    }

    let mut candidate = Var::new(stem);
    let mut counter = 0;
    while used.contains(&candidate) {
        candidate = Var::new(format!("{stem}{counter}"));
        counter += 1;
    }
    candidate
}
