//! Query printing.
//!
//! [`Query`] prints as a well-formed SELECT query under its own prefix
//! mapping: IRIs are compacted by longest-namespace match and `rdf:type`
//! prints as `a` in predicate position. The standalone `Display` impls for
//! terms, triples, filters, and expressions print absolute IRIs; they are
//! used for log output.

use std::fmt;

use graphveil_core::{Iri, Literal, Term};
use graphveil_vocab::{rdf, xsd};

use crate::ast::{
    Expression, Filter, GraphPattern, OrderCondition, PrefixDecl, ProjectedVar, Projection, Query,
    TriplePattern,
};

struct PrefixTable<'a> {
    decls: &'a [PrefixDecl],
}

impl<'a> PrefixTable<'a> {
    fn new(decls: &'a [PrefixDecl]) -> Self {
        Self { decls }
    }

    /// Compact an IRI to `prefix:local` when a declared namespace covers it
    /// and the local part is safe to print unescaped.
    fn compact(&self, iri: &Iri) -> Option<String> {
        let full = iri.as_str();
        let mut best: Option<&PrefixDecl> = None;

        for decl in self.decls {
            if full.starts_with(decl.namespace.as_ref())
                && best.is_none_or(|b| decl.namespace.len() > b.namespace.len())
            {
                best = Some(decl);
            }
        }

        let decl = best?;
        let local = &full[decl.namespace.len()..];
        if local.chars().all(is_safe_local_char) && !local.ends_with('.') {
            Some(format!("{}:{}", decl.prefix, local))
        } else {
            None
        }
    }
}

fn is_safe_local_char(c: char) -> bool {
    c.is_alphanumeric() || matches!(c, '_' | '-' | '.')
}

fn write_iri(f: &mut fmt::Formatter<'_>, iri: &Iri, table: Option<&PrefixTable>) -> fmt::Result {
    if let Some(compacted) = table.and_then(|t| t.compact(iri)) {
        return f.write_str(&compacted);
    }
    write!(f, "<{}>", iri.as_str())
}

fn write_literal(
    f: &mut fmt::Formatter<'_>,
    literal: &Literal,
    table: Option<&PrefixTable>,
) -> fmt::Result {
    // Numeric and boolean shorthands print bare
    match literal.datatype().as_str() {
        xsd::INTEGER | xsd::DOUBLE | xsd::BOOLEAN if !literal.lexical().is_empty() => {
            return f.write_str(literal.lexical());
        }
        _ => {}
    }

    write_quoted(f, literal.lexical())?;
    if let Some(lang) = literal.lang() {
        write!(f, "@{lang}")?;
    } else if literal.datatype().as_str() != xsd::STRING {
        f.write_str("^^")?;
        write_iri(f, literal.datatype(), table)?;
    }
    Ok(())
}

fn write_quoted(f: &mut fmt::Formatter<'_>, s: &str) -> fmt::Result {
    f.write_str("\"")?;
    for c in s.chars() {
        match c {
            '"' => f.write_str("\\\"")?,
            '\\' => f.write_str("\\\\")?,
            '\n' => f.write_str("\\n")?,
            '\r' => f.write_str("\\r")?,
            '\t' => f.write_str("\\t")?,
            _ => fmt::Write::write_char(f, c)?,
        }
    }
    f.write_str("\"")
}

fn write_term(f: &mut fmt::Formatter<'_>, term: &Term, table: Option<&PrefixTable>) -> fmt::Result {
    match term {
        Term::Var(v) => write!(f, "{v}"),
        Term::Iri(iri) => write_iri(f, iri, table),
        Term::Literal(l) => write_literal(f, l, table),
        Term::Blank(label) => write!(f, "_:{label}"),
    }
}

fn write_predicate(
    f: &mut fmt::Formatter<'_>,
    term: &Term,
    table: Option<&PrefixTable>,
) -> fmt::Result {
    if term.as_iri().is_some_and(|i| i.as_str() == rdf::TYPE) {
        return f.write_str("a");
    }
    write_term(f, term, table)
}

fn write_triple(
    f: &mut fmt::Formatter<'_>,
    triple: &TriplePattern,
    table: Option<&PrefixTable>,
) -> fmt::Result {
    write_term(f, &triple.subject, table)?;
    f.write_str(" ")?;
    write_predicate(f, &triple.predicate, table)?;
    f.write_str(" ")?;
    write_term(f, &triple.object, table)
}

fn write_inline_pattern(
    f: &mut fmt::Formatter<'_>,
    pattern: &GraphPattern,
    table: Option<&PrefixTable>,
) -> fmt::Result {
    f.write_str("{ ")?;
    for triple in &pattern.triples {
        write_triple(f, triple, table)?;
        f.write_str(" . ")?;
    }
    for filter in &pattern.filters {
        write_filter(f, filter, table)?;
        f.write_str(" ")?;
    }
    f.write_str("}")
}

fn write_expr(
    f: &mut fmt::Formatter<'_>,
    expr: &Expression,
    table: Option<&PrefixTable>,
) -> fmt::Result {
    match expr {
        Expression::Var(v) => write!(f, "{v}"),
        Expression::Value(value) => write_term(f, &value.to_term(), table),
        Expression::Binary { op, left, right } => {
            write_operand(f, left, table)?;
            write!(f, " {} ", op.as_str())?;
            write_operand(f, right, table)
        }
        Expression::Not(inner) => {
            f.write_str("!(")?;
            write_expr(f, inner, table)?;
            f.write_str(")")
        }
        Expression::In {
            expr,
            list,
            negated,
        } => {
            write_operand(f, expr, table)?;
            if *negated {
                f.write_str(" NOT IN (")?;
            } else {
                f.write_str(" IN (")?;
            }
            for (i, e) in list.iter().enumerate() {
                if i > 0 {
                    f.write_str(", ")?;
                }
                write_expr(f, e, table)?;
            }
            f.write_str(")")
        }
        Expression::NotExists { pattern } => {
            f.write_str("NOT EXISTS ")?;
            write_inline_pattern(f, pattern, table)
        }
        Expression::Aggregate {
            function,
            expr,
            distinct,
        } => {
            write!(f, "{}(", function.as_str())?;
            if *distinct {
                f.write_str("DISTINCT ")?;
            }
            match expr {
                Some(e) => write_expr(f, e, table)?,
                None => f.write_str("*")?,
            }
            f.write_str(")")
        }
    }
}

/// Parenthesize compound operands so nesting survives a re-parse.
fn write_operand(
    f: &mut fmt::Formatter<'_>,
    expr: &Expression,
    table: Option<&PrefixTable>,
) -> fmt::Result {
    if matches!(expr, Expression::Binary { .. } | Expression::In { .. }) {
        f.write_str("(")?;
        write_expr(f, expr, table)?;
        f.write_str(")")
    } else {
        write_expr(f, expr, table)
    }
}

fn write_filter(
    f: &mut fmt::Formatter<'_>,
    filter: &Filter,
    table: Option<&PrefixTable>,
) -> fmt::Result {
    if let Expression::NotExists { pattern } = &filter.expr {
        f.write_str("FILTER NOT EXISTS ")?;
        return write_inline_pattern(f, pattern, table);
    }
    f.write_str("FILTER (")?;
    write_expr(f, &filter.expr, table)?;
    f.write_str(")")
}

impl fmt::Display for TriplePattern {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write_triple(f, self, None)
    }
}

impl fmt::Display for Expression {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write_expr(f, self, None)
    }
}

impl fmt::Display for Filter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write_filter(f, self, None)
    }
}

impl fmt::Display for Query {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let table = PrefixTable::new(&self.prefixes);
        let table = Some(&table);

        if let Some(base) = &self.base {
            writeln!(f, "BASE <{base}>")?;
        }
        for decl in &self.prefixes {
            writeln!(f, "PREFIX {}: <{}>", decl.prefix, decl.namespace)?;
        }

        f.write_str("SELECT ")?;
        if self.distinct {
            f.write_str("DISTINCT ")?;
        }
        match &self.projection {
            Projection::Star => f.write_str("*")?,
            Projection::Vars(vars) => {
                for (i, var) in vars.iter().enumerate() {
                    if i > 0 {
                        f.write_str(" ")?;
                    }
                    match var {
                        ProjectedVar::Var(v) => write!(f, "{v}")?,
                        ProjectedVar::Expr { expr, alias } => {
                            f.write_str("(")?;
                            write_expr(f, expr, table)?;
                            write!(f, " AS {alias})")?;
                        }
                    }
                }
            }
        }

        f.write_str("\nWHERE {\n")?;
        for triple in &self.pattern.triples {
            f.write_str("  ")?;
            write_triple(f, triple, table)?;
            f.write_str(" .\n")?;
        }
        for filter in &self.pattern.filters {
            f.write_str("  ")?;
            write_filter(f, filter, table)?;
            f.write_str("\n")?;
        }
        f.write_str("}")?;

        if !self.group_by.is_empty() {
            f.write_str("\nGROUP BY")?;
            for v in &self.group_by {
                write!(f, " {v}")?;
            }
        }
        if !self.having.is_empty() {
            f.write_str("\nHAVING")?;
            for expr in &self.having {
                f.write_str(" (")?;
                write_expr(f, expr, table)?;
                f.write_str(")")?;
            }
        }
        if !self.order_by.is_empty() {
            f.write_str("\nORDER BY")?;
            for OrderCondition { expr, descending } in &self.order_by {
                if *descending {
                    f.write_str(" DESC(")?;
                    write_expr(f, expr, table)?;
                    f.write_str(")")?;
                } else {
                    f.write_str(" ")?;
                    write_expr(f, expr, table)?;
                }
            }
        }
        if let Some(limit) = self.limit {
            write!(f, "\nLIMIT {limit}")?;
        }
        if let Some(offset) = self.offset {
            write!(f, "\nOFFSET {offset}")?;
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parse_query;

    #[test]
    fn test_print_compacts_iris() {
        let q = parse_query(
            "PREFIX ex: <http://example.org/>\n\
             SELECT ?x ?n WHERE { ?x ex:name ?n . }",
        )
        .unwrap();
        let printed = q.to_string();
        assert!(printed.contains("PREFIX ex: <http://example.org/>"));
        assert!(printed.contains("?x ex:name ?n ."));
    }

    #[test]
    fn test_print_rdf_type_as_a() {
        let q = parse_query(
            "PREFIX ex: <http://example.org/>\n\
             SELECT * WHERE { ?x a ex:Person }",
        )
        .unwrap();
        assert!(q.to_string().contains("?x a ex:Person ."));
    }

    #[test]
    fn test_print_round_trip_is_stable() {
        let q = parse_query(
            "PREFIX ex: <http://example.org/>\n\
             SELECT DISTINCT ?x (COUNT(?y) AS ?c)\n\
             WHERE { ?x ex:p ?y . FILTER (?y > 3) FILTER NOT EXISTS { ?x a ex:Hidden } }\n\
             GROUP BY ?x HAVING (COUNT(?y) > 2) ORDER BY DESC(?x) LIMIT 3 OFFSET 1",
        )
        .unwrap();
        let printed = q.to_string();
        let reparsed = parse_query(&printed).unwrap();
        assert_eq!(q, reparsed);
    }

    #[test]
    fn test_print_filter_display() {
        let q = parse_query(
            "SELECT ?v WHERE { ?s <http://e.org/p> ?v . FILTER (?v <= 10) }",
        )
        .unwrap();
        assert_eq!(q.pattern.filters[0].to_string(), "FILTER (?v <= 10)");
    }

    #[test]
    fn test_print_uncompactable_iri() {
        let q = parse_query("SELECT ?x WHERE { ?x <http://other.org/p> 5 . }").unwrap();
        assert!(q.to_string().contains("<http://other.org/p>"));
    }
}
