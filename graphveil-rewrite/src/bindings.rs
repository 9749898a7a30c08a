//! Candidate-type bindings.
//!
//! Three insertion-ordered maps computed once by the type inferencer and
//! only shrunk afterwards: subject/object variables to their candidate
//! `rdf:type` IRIs, constant subject/object IRIs to theirs, and predicate
//! variables to their candidate predicate IRIs.

use graphveil_core::{Iri, Term, Var};
use graphveil_sparql::ast::GraphPattern;

/// Candidate types for the entities of a query pattern.
#[derive(Clone, Debug, Default)]
pub struct TypeBindings {
    vars: Vec<(Var, Vec<Iri>)>,
    uris: Vec<(Iri, Vec<Iri>)>,
    predicates: Vec<(Var, Vec<Iri>)>,
}

impl TypeBindings {
    /// Empty bindings.
    pub fn new() -> Self {
        Self::default()
    }

    /// Record candidate types for a subject/object variable.
    pub fn insert_var(&mut self, var: Var, types: Vec<Iri>) {
        self.vars.push((var, types));
    }

    /// Record candidate types for a constant subject/object IRI.
    pub fn insert_uri(&mut self, uri: Iri, types: Vec<Iri>) {
        self.uris.push((uri, types));
    }

    /// Record candidate predicate IRIs for a predicate variable.
    pub fn insert_predicate(&mut self, var: Var, predicates: Vec<Iri>) {
        self.predicates.push((var, predicates));
    }

    /// Candidate types of a variable (empty when unknown).
    pub fn var_types(&self, var: &Var) -> &[Iri] {
        self.vars
            .iter()
            .find(|(v, _)| v == var)
            .map(|(_, types)| types.as_slice())
            .unwrap_or(&[])
    }

    /// Candidate types of a constant IRI (empty when unknown).
    pub fn uri_types(&self, uri: &Iri) -> &[Iri] {
        self.uris
            .iter()
            .find(|(u, _)| u == uri)
            .map(|(_, types)| types.as_slice())
            .unwrap_or(&[])
    }

    /// Candidate predicate IRIs of a predicate variable.
    pub fn predicate_types(&self, var: &Var) -> &[Iri] {
        self.predicates
            .iter()
            .find(|(v, _)| v == var)
            .map(|(_, types)| types.as_slice())
            .unwrap_or(&[])
    }

    /// The tracked subject/object variables, in discovery order.
    pub fn node_vars(&self) -> Vec<Var> {
        self.vars.iter().map(|(v, _)| v.clone()).collect()
    }

    /// The tracked constant IRIs, in discovery order.
    pub fn node_uris(&self) -> Vec<Iri> {
        self.uris.iter().map(|(u, _)| u.clone()).collect()
    }

    /// Drop every entry whose entity no longer occurs in the pattern.
    pub fn prune(&mut self, pattern: &GraphPattern) {
        self.vars.retain(|(v, _)| {
            let term = Term::Var(v.clone());
            pattern
                .triples
                .iter()
                .any(|t| t.subject == term || t.object == term)
        });
        self.uris.retain(|(u, _)| {
            let term = Term::Iri(u.clone());
            pattern
                .triples
                .iter()
                .any(|t| t.subject == term || t.object == term)
        });
        self.predicates.retain(|(v, _)| {
            let term = Term::Var(v.clone());
            pattern.triples.iter().any(|t| t.predicate == term)
        });
    }
}
