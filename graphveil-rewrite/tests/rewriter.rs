//! End-to-end rewriter scenarios over an illustrative dataset:
//! `ex:Doctor` a subclass of `ex:Person`, `ex:hasSalary` an integer
//! attribute, `ex:name` a string attribute, `ex:worksWith` an edge
//! between persons.

use graphveil_core::{Term, Var};
use graphveil_graph::{Graph, SchemaView};
use graphveil_policy::PolicyStore;
use graphveil_rewrite::{RewriteOutcome, Rewriter};
use graphveil_sparql::ast::{
    BinaryOp, Expression, Filter, Projection, Query, TriplePattern,
};
use graphveil_sparql::parse_query;

const EX: &str = "http://example.org/";

fn dataset() -> Graph {
    Graph::parse_turtle(
        "@prefix ex: <http://example.org/> .\n\
         @prefix rdfs: <http://www.w3.org/2000/01/rdf-schema#> .\n\
         @prefix xsd: <http://www.w3.org/2001/XMLSchema#> .\n\
         ex:Doctor rdfs:subClassOf ex:Person .\n\
         ex:name rdfs:domain ex:Person ; rdfs:range xsd:string .\n\
         ex:hasSalary rdfs:domain ex:Person ; rdfs:range xsd:integer .\n\
         ex:worksWith rdfs:domain ex:Person ; rdfs:range ex:Person .\n\
         ex:alice a ex:Person ; ex:name \"Alice\" ; ex:hasSalary 5000 ;\n\
             ex:worksWith ex:carol .\n\
         ex:bob a ex:Person ; ex:name \"Bob\" ; ex:hasSalary 800 .\n\
         ex:carol a ex:Doctor ; ex:name \"Carol\" ; ex:hasSalary 9000 .\n",
    )
    .unwrap()
}

fn rewrite(policy_json: &str, query: &str, user: &str) -> RewriteOutcome {
    let graph = dataset();
    let schema = SchemaView::from_graph(&graph);
    let policy = PolicyStore::from_json_str(policy_json).unwrap();
    let query = parse_query(query).unwrap();
    Rewriter::new(&graph, &schema, &policy, user).rewrite(&query)
}

fn ex(local: &str) -> Term {
    Term::iri(format!("{EX}{local}"))
}

#[test]
fn node_class_denial_adds_not_exists() {
    // Guests may not see doctors
    let outcome = rewrite(
        r#"[{"constraint": "node", "user": "guest",
             "node-type": "http://example.org/Doctor"}]"#,
        "PREFIX ex: <http://example.org/>\nSELECT ?x ?n WHERE { ?x ex:name ?n }",
        "guest",
    );

    assert!(outcome.node_applied);
    let expected = Filter::new(Expression::not_exists(TriplePattern::rdf_type(
        Term::var("x"),
        ex("Doctor"),
    )));
    assert_eq!(outcome.query.pattern.filters, vec![expected]);
    assert_eq!(outcome.query.pattern.triples.len(), 1);
}

#[test]
fn node_instance_denial_drops_triples() {
    // The subject constant itself is forbidden
    let outcome = rewrite(
        r#"[{"constraint": "node", "user": "guest",
             "node-type": "http://example.org/Person",
             "nodes": ["http://example.org/alice"]}]"#,
        "PREFIX ex: <http://example.org/>\nSELECT ?n WHERE { ex:alice ex:name ?n }",
        "guest",
    );

    assert!(outcome.node_applied);
    assert!(outcome.query.pattern.triples.is_empty());
    assert_eq!(outcome.query.projection, Projection::Vars(vec![]));
}

#[test]
fn node_instance_denial_filters_variable() {
    // Instance-level denial on a variable becomes NOT IN
    let outcome = rewrite(
        r#"[{"constraint": "node", "user": "guest",
             "node-type": "http://example.org/Person",
             "nodes": ["http://example.org/alice"]}]"#,
        "PREFIX ex: <http://example.org/>\nSELECT ?x ?n WHERE { ?x ex:name ?n }",
        "guest",
    );

    assert!(outcome.node_applied);
    assert_eq!(outcome.query.pattern.filters.len(), 1);
    match &outcome.query.pattern.filters[0].expr {
        Expression::In { negated, list, .. } => {
            assert!(*negated);
            assert_eq!(list.len(), 1);
        }
        other => panic!("expected NOT IN filter, got {other}"),
    }
}

#[test]
fn node_denial_of_all_types_drops_variable_triples() {
    // Every candidate type of ?x is denied at class level
    let outcome = rewrite(
        r#"[{"constraint": "node", "user": "guest",
             "node-type": "http://example.org/Person"},
            {"constraint": "node", "user": "guest",
             "node-type": "http://example.org/Doctor"}]"#,
        "PREFIX ex: <http://example.org/>\nSELECT ?x ?n WHERE { ?x ex:name ?n }",
        "guest",
    );

    assert!(outcome.node_applied);
    assert!(outcome.query.pattern.triples.is_empty());
    assert!(outcome.query.pattern.filters.is_empty());
}

#[test]
fn attribute_comparison_on_variable_adds_filter() {
    // Guests see only salaries below 1000
    let outcome = rewrite(
        r#"[{"constraint": "attribute", "user": "guest",
             "subject-type": "http://example.org/Person",
             "predicate": "http://example.org/hasSalary",
             "symbol": "<", "object-type": "integer", "values": ["1000"]}]"#,
        "PREFIX ex: <http://example.org/>\nSELECT ?s ?v WHERE { ?s ex:hasSalary ?v }",
        "guest",
    );

    assert!(outcome.attribute_applied);
    assert_eq!(
        outcome.query.pattern.filters,
        vec![Filter::new(Expression::compare(
            BinaryOp::Lt,
            Var::new("v"),
            graphveil_core::NodeValue::integer("1000"),
        ))]
    );
}

#[test]
fn attribute_violating_literal_drops_triple() {
    // The ground literal 5000 violates < 1000
    let outcome = rewrite(
        r#"[{"constraint": "attribute", "user": "guest",
             "subject-type": "http://example.org/Person",
             "predicate": "http://example.org/hasSalary",
             "symbol": "<", "object-type": "integer", "values": ["1000"]}]"#,
        "PREFIX ex: <http://example.org/>\nSELECT * WHERE { ex:alice ex:hasSalary 5000 }",
        "guest",
    );

    assert!(outcome.attribute_applied);
    assert!(outcome.query.pattern.triples.is_empty());
}

#[test]
fn attribute_permitted_literal_untouched() {
    let outcome = rewrite(
        r#"[{"constraint": "attribute", "user": "guest",
             "subject-type": "http://example.org/Person",
             "predicate": "http://example.org/hasSalary",
             "symbol": "<", "object-type": "integer", "values": ["1000"]}]"#,
        "PREFIX ex: <http://example.org/>\nSELECT * WHERE { ex:bob ex:hasSalary 800 }",
        "guest",
    );

    assert!(!outcome.attribute_applied);
    assert_eq!(outcome.query.pattern.triples.len(), 1);
}

#[test]
fn filter_merge_contradiction_elides_triple() {
    // The query keeps ?v > 1000 while the policy demands ?v < 500
    let outcome = rewrite(
        r#"[{"constraint": "attribute", "user": "guest",
             "subject-type": "http://example.org/Person",
             "predicate": "http://example.org/hasSalary",
             "symbol": "<", "object-type": "integer", "values": ["500"]}]"#,
        "PREFIX ex: <http://example.org/>\n\
         SELECT ?s ?v WHERE { ?s ex:hasSalary ?v . FILTER (?v > 1000) }",
        "guest",
    );

    // No triple with ?v as object survives the contradiction
    assert!(outcome.query.pattern.triples.is_empty());
    assert!(outcome.query.pattern.filters.is_empty());
}

#[test]
fn filter_merge_tightens_to_single_filter() {
    // The query's >= 100 merges with the policy's < 1000
    let outcome = rewrite(
        r#"[{"constraint": "attribute", "user": "guest",
             "subject-type": "http://example.org/Person",
             "predicate": "http://example.org/hasSalary",
             "symbol": "<", "object-type": "integer", "values": ["1000"]}]"#,
        "PREFIX ex: <http://example.org/>\n\
         SELECT ?s ?v WHERE { ?s ex:hasSalary ?v . FILTER (?v >= 100) }",
        "guest",
    );

    assert_eq!(
        outcome.query.pattern.filters,
        vec![Filter::new(Expression::and(
            Expression::compare(
                BinaryOp::Ge,
                Var::new("v"),
                graphveil_core::NodeValue::integer("100"),
            ),
            Expression::compare(
                BinaryOp::Lt,
                Var::new("v"),
                graphveil_core::NodeValue::integer("1000"),
            ),
        ))]
    );
}

#[test]
fn attribute_between_adds_two_merged_bounds() {
    let outcome = rewrite(
        r#"[{"constraint": "attribute", "user": "guest",
             "subject-type": "http://example.org/Person",
             "predicate": "http://example.org/hasSalary",
             "symbol": "between", "object-type": "integer",
             "values": ["100", "2000"]}]"#,
        "PREFIX ex: <http://example.org/>\nSELECT ?s ?v WHERE { ?s ex:hasSalary ?v }",
        "guest",
    );

    // The two bounds merge into one conjunction on ?v
    assert_eq!(
        outcome.query.pattern.filters,
        vec![Filter::new(Expression::and(
            Expression::compare(
                BinaryOp::Ge,
                Var::new("v"),
                graphveil_core::NodeValue::integer("100"),
            ),
            Expression::compare(
                BinaryOp::Le,
                Var::new("v"),
                graphveil_core::NodeValue::integer("2000"),
            ),
        ))]
    );
}

#[test]
fn attribute_deny_read_drops_ground_predicate_triple() {
    let outcome = rewrite(
        r#"[{"constraint": "attribute", "user": "guest",
             "subject-type": "http://example.org/Person",
             "predicate": "http://example.org/hasSalary",
             "symbol": "X"}]"#,
        "PREFIX ex: <http://example.org/>\n\
         SELECT ?s ?v ?n WHERE { ?s ex:hasSalary ?v ; ex:name ?n }",
        "guest",
    );

    assert!(outcome.attribute_applied);
    assert_eq!(outcome.query.pattern.triples.len(), 1);
    assert_eq!(outcome.query.pattern.triples[0].predicate, ex("name"));
    match &outcome.query.projection {
        Projection::Vars(vars) => {
            let names: Vec<_> = vars.iter().map(|p| p.alias().clone()).collect();
            assert_eq!(names, vec![Var::new("s"), Var::new("n")]);
        }
        other => panic!("expected explicit projection, got {other:?}"),
    }
}

#[test]
fn predicate_absolute_denial_drops_triple() {
    let outcome = rewrite(
        r#"[{"constraint": "predicate", "user": "guest",
             "subject-type": "http://example.org/Person",
             "predicate": "http://example.org/worksWith",
             "object-type": "http://example.org/Doctor"},
            {"constraint": "predicate", "user": "guest",
             "subject-type": "http://example.org/Person",
             "predicate": "http://example.org/worksWith",
             "object-type": "http://example.org/Person"}]"#,
        "PREFIX ex: <http://example.org/>\nSELECT ?a ?b WHERE { ?a ex:worksWith ?b }",
        "guest",
    );

    // Both candidate object types are absolutely denied
    assert!(outcome.predicate_applied);
    assert!(outcome.query.pattern.triples.is_empty());
}

#[test]
fn predicate_subject_scoped_denial_filters_variable() {
    let outcome = rewrite(
        r#"[{"constraint": "predicate", "user": "guest",
             "subject-type": "http://example.org/Person",
             "predicate": "http://example.org/worksWith",
             "object-type": "http://example.org/Doctor",
             "subjects": ["http://example.org/alice"]}]"#,
        "PREFIX ex: <http://example.org/>\nSELECT ?a ?b WHERE { ?a ex:worksWith ?b }",
        "guest",
    );

    assert!(outcome.predicate_applied);
    assert_eq!(outcome.query.pattern.filters.len(), 1);
    match &outcome.query.pattern.filters[0].expr {
        Expression::In { negated, .. } => assert!(*negated),
        other => panic!("expected NOT IN filter, got {other}"),
    }
}

#[test]
fn empty_policy_is_identity() {
    // An empty policy changes nothing at all
    let query_str = "PREFIX ex: <http://example.org/>\n\
         SELECT DISTINCT ?x ?n WHERE { ?x ex:name ?n . FILTER (?n != \"Bob\") }\n\
         ORDER BY ?n LIMIT 5";
    let outcome = rewrite("[]", query_str, "guest");

    let original: Query = parse_query(query_str).unwrap();
    assert_eq!(outcome.query, original);
    assert!(!outcome.node_applied);
    assert!(!outcome.predicate_applied);
    assert!(!outcome.attribute_applied);
}

#[test]
fn rewrite_is_idempotent() {
    // Rewriting the rewritten query changes nothing
    let policy_json = r#"[
        {"constraint": "node", "user": "guest",
         "node-type": "http://example.org/Doctor"},
        {"constraint": "attribute", "user": "guest",
         "subject-type": "http://example.org/Person",
         "predicate": "http://example.org/hasSalary",
         "symbol": "<", "object-type": "integer", "values": ["1000"]}
    ]"#;
    let query_str = "PREFIX ex: <http://example.org/>\n\
         SELECT ?x ?n ?v WHERE { ?x ex:name ?n ; ex:hasSalary ?v }";

    let graph = dataset();
    let schema = SchemaView::from_graph(&graph);
    let policy = PolicyStore::from_json_str(policy_json).unwrap();
    let rewriter = Rewriter::new(&graph, &schema, &policy, "guest");

    let once = rewriter.rewrite(&parse_query(query_str).unwrap());
    let twice = rewriter.rewrite(&once.query);
    assert_eq!(once.query, twice.query);
}

#[test]
fn not_exists_filters_deduplicate() {
    // Two checks generating the same NOT EXISTS keep one copy
    let outcome = rewrite(
        r#"[{"constraint": "node", "user": "guest",
             "node-type": "http://example.org/Doctor"}]"#,
        "PREFIX ex: <http://example.org/>\n\
         SELECT ?x ?n ?v WHERE { ?x ex:name ?n ; ex:hasSalary ?v }",
        "guest",
    );

    let not_exists: Vec<_> = outcome
        .query
        .pattern
        .filters
        .iter()
        .filter(|f| f.is_not_exists())
        .collect();
    assert_eq!(not_exists.len(), 1);
}

#[test]
fn other_users_are_unaffected() {
    let outcome = rewrite(
        r#"[{"constraint": "node", "user": "guest",
             "node-type": "http://example.org/Doctor"}]"#,
        "PREFIX ex: <http://example.org/>\nSELECT ?x ?n WHERE { ?x ex:name ?n }",
        "admin",
    );

    assert!(!outcome.node_applied);
    assert!(outcome.query.pattern.filters.is_empty());
}

#[test]
fn solutions_are_a_subset_of_the_original() {
    // Executing the narrowed query returns a subset of the original
    // solutions, and the forbidden rows are gone
    let query_str = "PREFIX ex: <http://example.org/>\n\
         SELECT ?x ?v WHERE { ?x ex:hasSalary ?v }";
    let outcome = rewrite(
        r#"[{"constraint": "node", "user": "guest",
             "node-type": "http://example.org/Doctor"},
            {"constraint": "attribute", "user": "guest",
             "subject-type": "http://example.org/Person",
             "predicate": "http://example.org/hasSalary",
             "symbol": "<", "object-type": "integer", "values": ["1000"]}]"#,
        query_str,
        "guest",
    );

    let graph = dataset();
    let original = graphveil_graph::solve(&graph, &parse_query(query_str).unwrap().pattern);
    let narrowed = graphveil_graph::solve(&graph, &outcome.query.pattern);

    assert!(!narrowed.is_empty());
    for solution in &narrowed {
        assert!(original.contains(solution));
        // Doctors and salaries >= 1000 are filtered out
        assert_ne!(solution.get(&Var::new("x")), Some(&ex("carol")));
    }
    assert!(narrowed.len() < original.len());
}

#[test]
fn output_prints_as_valid_sparql() {
    // The narrowed query round-trips through the printer and parser
    let outcome = rewrite(
        r#"[{"constraint": "node", "user": "guest",
             "node-type": "http://example.org/Doctor"},
            {"constraint": "attribute", "user": "guest",
             "subject-type": "http://example.org/Person",
             "predicate": "http://example.org/hasSalary",
             "symbol": "<", "object-type": "integer", "values": ["1000"]}]"#,
        "PREFIX ex: <http://example.org/>\n\
         SELECT ?x ?v WHERE { ?x ex:hasSalary ?v }",
        "guest",
    );

    let printed = outcome.query.to_string();
    let reparsed = parse_query(&printed).unwrap();
    assert_eq!(outcome.query, reparsed);
}
