//! Mutable query model.
//!
//! Holds the frozen input query, the working copy being narrowed, and the
//! candidate-type bindings. All structural mutation goes through this
//! type so the well-formedness invariants hold after every step:
//! the projection only mentions variables still in the pattern, every
//! filter's variables appear in some triple, and the bindings cover only
//! entities still present.
//!
//! `add_filter` is where filter normalization happens: a new simple
//! filter on a variable that already carries simple filters is merged
//! through the filter algebra; a contradiction removes the filters and
//! every triple whose object is that variable.

use graphveil_core::{Iri, Term, Var};
use graphveil_sparql::ast::{Filter, Projection, Query, TriplePattern};
use tracing::info;

use crate::algebra::{combine, Combined};
use crate::bindings::TypeBindings;

/// The query under rewrite.
#[derive(Debug)]
pub struct QueryModel {
    input: Query,
    output: Query,
    bindings: TypeBindings,
}

impl QueryModel {
    /// Freeze the input query and start a working copy.
    pub fn new(query: Query, bindings: TypeBindings) -> Self {
        Self {
            input: query.clone(),
            output: query,
            bindings,
        }
    }

    /// The frozen input query.
    pub fn input(&self) -> &Query {
        &self.input
    }

    /// The current working copy.
    pub fn output(&self) -> &Query {
        &self.output
    }

    /// Consume the model, returning the narrowed query.
    pub fn into_output(self) -> Query {
        self.output
    }

    /// Candidate-type bindings (shrinks as triples are removed).
    pub fn bindings(&self) -> &TypeBindings {
        &self.bindings
    }

    /// Tracked subject/object variables, in discovery order.
    pub fn node_vars(&self) -> Vec<Var> {
        self.bindings.node_vars()
    }

    /// Tracked constant IRIs, in discovery order.
    pub fn node_uris(&self) -> Vec<Iri> {
        self.bindings.node_uris()
    }

    /// Candidate types of a variable.
    pub fn types_of_var(&self, var: &Var) -> Vec<Iri> {
        self.bindings.var_types(var).to_vec()
    }

    /// Candidate types of a constant IRI.
    pub fn types_of_uri(&self, uri: &Iri) -> Vec<Iri> {
        self.bindings.uri_types(uri).to_vec()
    }

    /// Candidate predicate IRIs of a predicate variable.
    pub fn predicate_types_of(&self, var: &Var) -> Vec<Iri> {
        self.bindings.predicate_types(var).to_vec()
    }

    /// Snapshot of the remaining triples.
    pub fn triples(&self) -> Vec<TriplePattern> {
        self.output.pattern.triples.clone()
    }

    /// True while the triple is still in the pattern.
    pub fn contains_triple(&self, triple: &TriplePattern) -> bool {
        self.output.pattern.triples.contains(triple)
    }

    /// Remaining triples mentioning the term in any position.
    pub fn triples_with_term(&self, term: &Term) -> Vec<TriplePattern> {
        self.output
            .pattern
            .triples
            .iter()
            .filter(|t| t.mentions(term))
            .cloned()
            .collect()
    }

    /// Add a filter, merging simple single-variable filters through the
    /// filter algebra.
    ///
    /// A structurally equal filter is never inserted twice (NOT EXISTS
    /// filters compare by inner pattern). Merging is skipped for
    /// multi-variable filters, NOT EXISTS, and variables that appear as
    /// the object of a triple with a variable predicate; those filters
    /// are appended verbatim.
    pub fn add_filter(&mut self, filter: Filter) {
        // Dedup first, then merge
        if self.output.pattern.filters.contains(&filter) {
            info!("filter already exists: {filter}");
            return;
        }

        let free = filter.free_vars();
        let mergeable_shape = free.len() == 1 && !filter.is_not_exists();

        if !mergeable_shape {
            info!("add filter: {filter}");
            self.output.pattern.filters.push(filter);
            return;
        }

        let var = free[0].clone();

        // A variable fed by an unknown predicate has no single value
        // space, so its filters are not merged
        let object_of_var_predicate = self.output.pattern.triples.iter().any(|t| {
            t.object == Term::Var(var.clone()) && t.predicate.is_var()
        });
        if object_of_var_predicate {
            info!("add filter: {filter}");
            self.output.pattern.filters.push(filter);
            return;
        }

        // Existing single-variable filters on the same variable join the
        // merge chain, in insertion order
        let mergeable: Vec<Filter> = self
            .output
            .pattern
            .filters
            .iter()
            .filter(|f| !f.is_not_exists() && f.free_vars() == [var.clone()])
            .cloned()
            .collect();

        if mergeable.is_empty() {
            info!("add filter: {filter}");
            self.output.pattern.filters.push(filter);
            return;
        }

        let mut chain = mergeable.clone();
        chain.push(filter);

        for old in &mergeable {
            info!("remove filter: {old}");
        }
        self.output
            .pattern
            .filters
            .retain(|f| !mergeable.contains(f));

        match combine(&chain) {
            Combined::Expr(expr) => {
                let merged = Filter::new(expr);
                info!("add combined filter: {merged}");
                self.output.pattern.filters.push(merged);
            }
            Combined::Contradiction => {
                info!("contradictory filters on {var}, removing triples");
                for triple in self.triples_with_term(&Term::Var(var.clone())) {
                    if triple.object == Term::Var(var.clone()) {
                        self.remove_triple(&triple);
                    }
                }
            }
        }
    }

    /// Remove a triple and cascade: prune the projection, the bindings,
    /// and any filter left without its variables.
    pub fn remove_triple(&mut self, triple: &TriplePattern) {
        if !self.contains_triple(triple) {
            return;
        }
        info!("remove triple: {triple}");
        self.output.pattern.triples.retain(|t| t != triple);

        self.prune_projection();
        self.bindings.prune(&self.output.pattern);
        self.prune_filters();
    }

    /// Remove a filter by structural equality.
    pub fn remove_filter(&mut self, filter: &Filter) {
        if self.output.pattern.filters.contains(filter) {
            info!("remove filter: {filter}");
            self.output.pattern.filters.retain(|f| f != filter);
        }
    }

    /// Drop projection entries whose variables no longer occur in any
    /// triple. `SELECT *` shrinks implicitly and is left untouched.
    fn prune_projection(&mut self) {
        let Projection::Vars(entries) = &self.output.projection else {
            return;
        };

        let remaining = self.output.pattern.triple_vars();
        let (kept, dropped): (Vec<_>, Vec<_>) = entries
            .iter()
            .cloned()
            .partition(|entry| entry.depends_on().iter().all(|v| remaining.contains(v)));

        for entry in &dropped {
            info!("remove result var: {}", entry.alias());
        }
        if !dropped.is_empty() {
            self.output.projection = Projection::Vars(kept);
        }
    }

    /// Drop filters whose free variables are no longer all present in
    /// the pattern's triples.
    fn prune_filters(&mut self) {
        let remaining = pattern_vars(&self.output.pattern.triples);
        let dangling: Vec<Filter> = self
            .output
            .pattern
            .filters
            .iter()
            .filter(|f| f.free_vars().iter().any(|v| !remaining.contains(v)))
            .cloned()
            .collect();

        for filter in dangling {
            self.remove_filter(&filter);
        }
    }
}

/// Variables occurring in any triple position.
fn pattern_vars(triples: &[TriplePattern]) -> Vec<Var> {
    let mut vars = Vec::new();
    for t in triples {
        t.collect_vars(&mut vars);
    }
    vars
}

#[cfg(test)]
mod tests {
    use super::*;
    use graphveil_core::NodeValue;
    use graphveil_sparql::ast::{BinaryOp, Expression};
    use graphveil_sparql::parse_query;

    fn model(query: &str) -> QueryModel {
        QueryModel::new(parse_query(query).unwrap(), TypeBindings::new())
    }

    fn salary_query() -> QueryModel {
        model(
            "PREFIX ex: <http://example.org/>\n\
             SELECT ?s ?v WHERE { ?s ex:hasSalary ?v . }",
        )
    }

    fn lt(var: &str, value: &str) -> Filter {
        Filter::new(Expression::compare(
            BinaryOp::Lt,
            Var::new(var),
            NodeValue::integer(value),
        ))
    }

    fn gt(var: &str, value: &str) -> Filter {
        Filter::new(Expression::compare(
            BinaryOp::Gt,
            Var::new(var),
            NodeValue::integer(value),
        ))
    }

    #[test]
    fn test_add_filter_dedup() {
        let mut m = salary_query();
        m.add_filter(lt("v", "10"));
        m.add_filter(lt("v", "10"));
        assert_eq!(m.output().pattern.filters.len(), 1);
    }

    #[test]
    fn test_not_exists_dedup() {
        let mut m = salary_query();
        let f = Filter::new(Expression::not_exists(TriplePattern::rdf_type(
            Term::var("s"),
            Term::iri("http://example.org/Doctor"),
        )));
        m.add_filter(f.clone());
        m.add_filter(f);
        assert_eq!(m.output().pattern.filters.len(), 1);
    }

    #[test]
    fn test_merge_tightening() {
        // >= 10 then = 20 collapses to the equality
        let mut m = salary_query();
        m.add_filter(Filter::new(Expression::compare(
            BinaryOp::Ge,
            Var::new("v"),
            NodeValue::integer("10"),
        )));
        m.add_filter(Filter::new(Expression::compare(
            BinaryOp::Eq,
            Var::new("v"),
            NodeValue::integer("20"),
        )));

        assert_eq!(
            m.output().pattern.filters,
            vec![Filter::new(Expression::compare(
                BinaryOp::Eq,
                Var::new("v"),
                NodeValue::integer("20"),
            ))]
        );
    }

    #[test]
    fn test_merge_contradiction_removes_triples() {
        // > 100 then < 50 is unsatisfiable
        let mut m = salary_query();
        m.add_filter(gt("v", "100"));
        m.add_filter(lt("v", "50"));

        assert!(m.output().pattern.triples.is_empty());
        assert!(m.output().pattern.filters.is_empty());
        assert_eq!(m.output().projection, Projection::Vars(vec![]));
    }

    #[test]
    fn test_remove_triple_cascade() {
        let mut m = model(
            "PREFIX ex: <http://example.org/>\n\
             SELECT ?s ?v ?n WHERE { ?s ex:hasSalary ?v ; ex:name ?n . FILTER (?v > 1) }",
        );
        let triple = m.triples()[0].clone();
        m.remove_triple(&triple);

        // ?v is gone: projection loses it, the filter on it goes too
        let out = m.output();
        assert_eq!(out.pattern.triples.len(), 1);
        assert!(out.pattern.filters.is_empty());
        match &out.projection {
            Projection::Vars(vars) => {
                let names: Vec<_> = vars.iter().map(|p| p.alias().clone()).collect();
                assert_eq!(names, vec![Var::new("s"), Var::new("n")]);
            }
            other => panic!("expected explicit projection, got {other:?}"),
        }
    }

    #[test]
    fn test_remove_triple_prunes_compound_projection() {
        let mut m = model(
            "PREFIX ex: <http://example.org/>\n\
             SELECT ?s (COUNT(?v) AS ?c) WHERE { ?s ex:hasSalary ?v ; ex:name ?n . }",
        );
        let triple = m.triples()[0].clone();
        m.remove_triple(&triple);

        match &m.output().projection {
            Projection::Vars(vars) => {
                assert_eq!(vars.len(), 1);
                assert_eq!(vars[0].alias(), &Var::new("s"));
            }
            other => panic!("expected explicit projection, got {other:?}"),
        }
    }

    #[test]
    fn test_star_projection_untouched() {
        let mut m = model(
            "PREFIX ex: <http://example.org/>\n\
             SELECT * WHERE { ?s ex:hasSalary ?v . }",
        );
        let triple = m.triples()[0].clone();
        m.remove_triple(&triple);
        assert_eq!(m.output().projection, Projection::Star);
    }

    #[test]
    fn test_no_merge_across_variable_predicate() {
        let mut m = model(
            "PREFIX ex: <http://example.org/>\n\
             SELECT ?s ?v WHERE { ?s ?p ?v . }",
        );
        m.add_filter(gt("v", "100"));
        m.add_filter(lt("v", "50"));

        // No merge: the value space of ?v is not a single predicate's
        assert_eq!(m.output().pattern.filters.len(), 2);
        assert_eq!(m.output().pattern.triples.len(), 1);
    }

    #[test]
    fn test_multi_variable_filter_appended() {
        let mut m = model(
            "PREFIX ex: <http://example.org/>\n\
             SELECT ?a ?b WHERE { ?a ex:p ?b . }",
        );
        m.add_filter(Filter::new(Expression::binary(
            BinaryOp::Ne,
            Expression::Var(Var::new("a")),
            Expression::Var(Var::new("b")),
        )));
        m.add_filter(gt("b", "1"));
        m.add_filter(gt("b", "2"));

        // The two-variable filter stays; the single-variable ones merge
        assert_eq!(m.output().pattern.filters.len(), 2);
    }
}
