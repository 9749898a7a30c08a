//! SPARQL query parsing.
//!
//! Recursive descent over the token stream. Prefixed names are expanded
//! against the query's own prologue while parsing, so the resulting AST
//! carries absolute IRIs everywhere; the prologue itself is retained on
//! the [`Query`] for printing.

use std::sync::Arc;

use graphveil_core::{Iri, Literal, NodeValue, Term, Var};
use graphveil_vocab::rdf;

use crate::ast::{
    AggregateFunction, BinaryOp, Expression, Filter, GraphPattern, OrderCondition, PrefixDecl,
    ProjectedVar, Projection, Query, TriplePattern,
};
use crate::error::{ParseError, Result};
use crate::lex::{tokenize, Token, TokenKind};

/// Parse a SPARQL SELECT query string.
pub fn parse_query(source: &str) -> Result<Query> {
    let tokens = tokenize(source)?;
    Parser::new(tokens).parse_query()
}

struct Parser {
    tokens: Vec<Token>,
    pos: usize,
    prefixes: Vec<PrefixDecl>,
    base: Option<Arc<str>>,
}

impl Parser {
    fn new(tokens: Vec<Token>) -> Self {
        Self {
            tokens,
            pos: 0,
            prefixes: Vec::new(),
            base: None,
        }
    }

    // =========================================================================
    // Token stream helpers
    // =========================================================================

    fn at(&self) -> &TokenKind {
        &self.tokens[self.pos].kind
    }

    fn byte_pos(&self) -> usize {
        self.tokens[self.pos].start
    }

    fn bump(&mut self) -> TokenKind {
        let kind = self.tokens[self.pos].kind.clone();
        if !matches!(kind, TokenKind::Eof) {
            self.pos += 1;
        }
        kind
    }

    /// Consume the token if it matches exactly.
    fn eat(&mut self, kind: &TokenKind) -> bool {
        if self.at() == kind {
            self.bump();
            true
        } else {
            false
        }
    }

    fn expect(&mut self, kind: TokenKind, what: &str) -> Result<()> {
        if self.eat(&kind) {
            Ok(())
        } else {
            Err(self.error(format!("expected {what}")))
        }
    }

    fn error(&self, message: impl Into<String>) -> ParseError {
        ParseError::syntax(self.byte_pos(), message)
    }

    // =========================================================================
    // Prologue
    // =========================================================================

    fn parse_prologue(&mut self) -> Result<()> {
        loop {
            if self.eat(&TokenKind::KwPrefix) {
                let prefix = match self.bump() {
                    TokenKind::PrefixedNameNs(p) => p,
                    _ => return Err(self.error("expected 'prefix:' after PREFIX")),
                };
                let namespace = match self.bump() {
                    TokenKind::Iri(iri) => iri,
                    _ => return Err(self.error("expected IRI in PREFIX declaration")),
                };
                self.prefixes.push(PrefixDecl { prefix, namespace });
            } else if self.eat(&TokenKind::KwBase) {
                let iri = match self.bump() {
                    TokenKind::Iri(iri) => iri,
                    _ => return Err(self.error("expected IRI in BASE declaration")),
                };
                self.base = Some(iri);
            } else {
                return Ok(());
            }
        }
    }

    fn expand(&self, prefix: &str, local: &str) -> Result<Iri> {
        // Later declarations shadow earlier ones
        for decl in self.prefixes.iter().rev() {
            if decl.prefix.as_ref() == prefix {
                return Ok(Iri::new(format!("{}{}", decl.namespace, local)));
            }
        }
        Err(self.error(format!("unknown prefix '{prefix}:'")))
    }

    fn resolve_iri(&self, iri: &str) -> Iri {
        // Resolve against BASE when the reference is relative
        if !iri.contains(':') {
            if let Some(base) = &self.base {
                return Iri::new(format!("{base}{iri}"));
            }
        }
        Iri::new(iri)
    }

    // =========================================================================
    // Query
    // =========================================================================

    fn parse_query(&mut self) -> Result<Query> {
        self.parse_prologue()?;

        self.expect(TokenKind::KwSelect, "SELECT")?;
        let distinct = self.eat(&TokenKind::KwDistinct);
        let projection = self.parse_projection()?;

        self.eat(&TokenKind::KwWhere);
        self.expect(TokenKind::LBrace, "'{' to open the WHERE pattern")?;
        let pattern = self.parse_group()?;

        let (group_by, having) = self.parse_group_having()?;
        let order_by = self.parse_order_by()?;
        let (limit, offset) = self.parse_limit_offset()?;

        if !matches!(self.at(), TokenKind::Eof) {
            return Err(self.error("unexpected trailing input after query"));
        }

        Ok(Query {
            prefixes: std::mem::take(&mut self.prefixes),
            base: self.base.clone(),
            distinct,
            projection,
            pattern,
            group_by,
            having,
            order_by,
            limit,
            offset,
        })
    }

    fn parse_projection(&mut self) -> Result<Projection> {
        if self.eat(&TokenKind::Star) {
            return Ok(Projection::Star);
        }

        let mut vars = Vec::new();
        loop {
            match self.at().clone() {
                TokenKind::Var(name) => {
                    self.bump();
                    vars.push(ProjectedVar::Var(Var::new(name.as_ref())));
                }
                TokenKind::LParen => {
                    self.bump();
                    let expr = self.parse_expression()?;
                    self.expect(TokenKind::KwAs, "AS in aliased projection")?;
                    let alias = match self.bump() {
                        TokenKind::Var(name) => Var::new(name.as_ref()),
                        _ => return Err(self.error("expected variable after AS")),
                    };
                    self.expect(TokenKind::RParen, "')' after aliased projection")?;
                    vars.push(ProjectedVar::Expr { expr, alias });
                }
                _ => break,
            }
        }

        if vars.is_empty() {
            return Err(self.error("expected '*' or at least one variable in SELECT"));
        }
        Ok(Projection::Vars(vars))
    }

    // =========================================================================
    // Graph pattern
    // =========================================================================

    /// Parse the contents of a group up to and including the closing `}`.
    fn parse_group(&mut self) -> Result<GraphPattern> {
        let mut pattern = GraphPattern::new();

        loop {
            match self.at() {
                TokenKind::RBrace => {
                    self.bump();
                    return Ok(pattern);
                }
                TokenKind::Eof => return Err(self.error("unclosed group pattern")),
                TokenKind::KwFilter => {
                    self.bump();
                    pattern.filters.push(self.parse_filter()?);
                }
                _ => self.parse_triples_block(&mut pattern)?,
            }
        }
    }

    fn parse_triples_block(&mut self, pattern: &mut GraphPattern) -> Result<()> {
        let subject = self.parse_subject()?;

        loop {
            let predicate = self.parse_verb()?;

            loop {
                let object = self.parse_object()?;
                pattern.triples.push(TriplePattern {
                    subject: subject.clone(),
                    predicate: predicate.clone(),
                    object,
                });
                if !self.eat(&TokenKind::Comma) {
                    break;
                }
            }

            if self.eat(&TokenKind::Semicolon) {
                // Trailing ';' before '.' or '}' is permitted
                if matches!(self.at(), TokenKind::Dot | TokenKind::RBrace) {
                    break;
                }
                continue;
            }
            break;
        }

        self.eat(&TokenKind::Dot);
        Ok(())
    }

    fn parse_subject(&mut self) -> Result<Term> {
        let term = self.parse_term()?;
        if term.is_literal() {
            return Err(self.error("a literal cannot be the subject of a triple"));
        }
        Ok(term)
    }

    fn parse_verb(&mut self) -> Result<Term> {
        if self.eat(&TokenKind::KwA) {
            return Ok(Term::iri(rdf::TYPE));
        }
        let term = self.parse_term()?;
        if !(term.is_var() || term.is_iri()) {
            return Err(self.error("a predicate must be a variable or an IRI"));
        }
        Ok(term)
    }

    fn parse_object(&mut self) -> Result<Term> {
        self.parse_term()
    }

    /// Parse a single term in a triple position.
    fn parse_term(&mut self) -> Result<Term> {
        match self.bump() {
            TokenKind::Var(name) => Ok(Term::Var(Var::new(name.as_ref()))),
            TokenKind::Iri(iri) => Ok(Term::Iri(self.resolve_iri(&iri))),
            TokenKind::PrefixedName { prefix, local } => {
                Ok(Term::Iri(self.expand(&prefix, &local)?))
            }
            TokenKind::PrefixedNameNs(prefix) => Ok(Term::Iri(self.expand(&prefix, "")?)),
            TokenKind::BlankNodeLabel(label) => Ok(Term::Blank(label)),
            TokenKind::String(s) => Ok(Term::Literal(self.finish_string_literal(s)?)),
            TokenKind::Integer(lex) => Ok(Term::Literal(Literal::integer(lex.as_ref()))),
            TokenKind::Decimal(lex) | TokenKind::Double(lex) => {
                Ok(Term::Literal(Literal::double(lex.as_ref())))
            }
            TokenKind::KwTrue => Ok(Term::Literal(Literal::boolean(true))),
            TokenKind::KwFalse => Ok(Term::Literal(Literal::boolean(false))),
            _ => Err(self.error("expected a term")),
        }
    }

    /// Handle the optional `@lang` or `^^<datatype>` after a string.
    fn finish_string_literal(&mut self, content: Arc<str>) -> Result<Literal> {
        match self.at().clone() {
            TokenKind::LangTag(tag) => {
                self.bump();
                Ok(Literal::lang_string(content.as_ref(), tag.as_ref()))
            }
            TokenKind::DoubleCaret => {
                self.bump();
                let datatype = match self.bump() {
                    TokenKind::Iri(iri) => self.resolve_iri(&iri),
                    TokenKind::PrefixedName { prefix, local } => self.expand(&prefix, &local)?,
                    _ => return Err(self.error("expected datatype IRI after '^^'")),
                };
                Ok(Literal::typed(content.as_ref(), datatype))
            }
            _ => Ok(Literal::string(content.as_ref())),
        }
    }

    // =========================================================================
    // Filters and expressions
    // =========================================================================

    fn parse_filter(&mut self) -> Result<Filter> {
        if self.eat(&TokenKind::KwNot) {
            self.expect(TokenKind::KwExists, "EXISTS after NOT")?;
            self.expect(TokenKind::LBrace, "'{' after NOT EXISTS")?;
            let pattern = self.parse_group()?;
            return Ok(Filter::new(Expression::NotExists {
                pattern: Box::new(pattern),
            }));
        }
        if self.eat(&TokenKind::KwExists) {
            return Err(self.error("EXISTS filters are not supported"));
        }

        self.expect(TokenKind::LParen, "'(' after FILTER")?;
        let expr = self.parse_expression()?;
        self.expect(TokenKind::RParen, "')' to close the filter")?;
        Ok(Filter::new(expr))
    }

    fn parse_expression(&mut self) -> Result<Expression> {
        self.parse_or()
    }

    fn parse_or(&mut self) -> Result<Expression> {
        let mut left = self.parse_and()?;
        while self.eat(&TokenKind::OrOr) {
            let right = self.parse_and()?;
            left = Expression::binary(BinaryOp::Or, left, right);
        }
        Ok(left)
    }

    fn parse_and(&mut self) -> Result<Expression> {
        let mut left = self.parse_relational()?;
        while self.eat(&TokenKind::AndAnd) {
            let right = self.parse_relational()?;
            left = Expression::binary(BinaryOp::And, left, right);
        }
        Ok(left)
    }

    fn parse_relational(&mut self) -> Result<Expression> {
        let left = self.parse_unary()?;

        let op = match self.at() {
            TokenKind::Eq => Some(BinaryOp::Eq),
            TokenKind::Ne => Some(BinaryOp::Ne),
            TokenKind::Lt => Some(BinaryOp::Lt),
            TokenKind::Le => Some(BinaryOp::Le),
            TokenKind::Gt => Some(BinaryOp::Gt),
            TokenKind::Ge => Some(BinaryOp::Ge),
            _ => None,
        };
        if let Some(op) = op {
            self.bump();
            let right = self.parse_unary()?;
            return Ok(Expression::binary(op, left, right));
        }

        if self.eat(&TokenKind::KwIn) {
            let list = self.parse_expression_list()?;
            return Ok(Expression::In {
                expr: Box::new(left),
                list,
                negated: false,
            });
        }
        if matches!(self.at(), TokenKind::KwNot) {
            self.bump();
            self.expect(TokenKind::KwIn, "IN after NOT")?;
            let list = self.parse_expression_list()?;
            return Ok(Expression::In {
                expr: Box::new(left),
                list,
                negated: true,
            });
        }

        Ok(left)
    }

    fn parse_unary(&mut self) -> Result<Expression> {
        if self.eat(&TokenKind::Bang) {
            let inner = self.parse_unary()?;
            return Ok(Expression::not(inner));
        }
        self.parse_primary()
    }

    fn parse_primary(&mut self) -> Result<Expression> {
        if let Some(function) = self.aggregate_function() {
            return self.parse_aggregate(function);
        }

        match self.at().clone() {
            TokenKind::LParen => {
                self.bump();
                let expr = self.parse_expression()?;
                self.expect(TokenKind::RParen, "')' to close the expression")?;
                Ok(expr)
            }
            TokenKind::Var(name) => {
                self.bump();
                Ok(Expression::Var(Var::new(name.as_ref())))
            }
            _ => {
                let value = self.parse_value()?;
                Ok(Expression::Value(value))
            }
        }
    }

    fn aggregate_function(&self) -> Option<AggregateFunction> {
        match self.at() {
            TokenKind::KwCount => Some(AggregateFunction::Count),
            TokenKind::KwSum => Some(AggregateFunction::Sum),
            TokenKind::KwAvg => Some(AggregateFunction::Avg),
            TokenKind::KwMin => Some(AggregateFunction::Min),
            TokenKind::KwMax => Some(AggregateFunction::Max),
            TokenKind::KwSample => Some(AggregateFunction::Sample),
            _ => None,
        }
    }

    fn parse_aggregate(&mut self, function: AggregateFunction) -> Result<Expression> {
        self.bump();
        self.expect(TokenKind::LParen, "'(' after aggregate function")?;
        let distinct = self.eat(&TokenKind::KwDistinct);

        let expr = if self.eat(&TokenKind::Star) {
            if function != AggregateFunction::Count {
                return Err(self.error("'*' is only valid in COUNT"));
            }
            None
        } else {
            Some(Box::new(self.parse_expression()?))
        };

        self.expect(TokenKind::RParen, "')' to close the aggregate")?;
        Ok(Expression::Aggregate {
            function,
            expr,
            distinct,
        })
    }

    /// Parse a constant value in expression position.
    fn parse_value(&mut self) -> Result<NodeValue> {
        match self.bump() {
            TokenKind::Iri(iri) => Ok(NodeValue::iri(self.resolve_iri(&iri).as_str())),
            TokenKind::PrefixedName { prefix, local } => {
                Ok(NodeValue::iri(self.expand(&prefix, &local)?.as_str()))
            }
            TokenKind::Integer(lex) => Ok(NodeValue::integer(lex.as_ref())),
            TokenKind::Decimal(lex) | TokenKind::Double(lex) => {
                Ok(NodeValue::double(lex.as_ref()))
            }
            TokenKind::String(s) => {
                let literal = self.finish_string_literal(s)?;
                Ok(NodeValue::from_literal(&literal))
            }
            TokenKind::KwTrue => Ok(NodeValue::string("true")),
            TokenKind::KwFalse => Ok(NodeValue::string("false")),
            _ => Err(self.error("expected a constant value")),
        }
    }

    fn parse_expression_list(&mut self) -> Result<Vec<Expression>> {
        self.expect(TokenKind::LParen, "'(' to open the list")?;
        let mut list = Vec::new();

        if self.eat(&TokenKind::RParen) {
            return Ok(list);
        }
        loop {
            list.push(self.parse_expression()?);
            if self.eat(&TokenKind::Comma) {
                continue;
            }
            self.expect(TokenKind::RParen, "')' to close the list")?;
            return Ok(list);
        }
    }

    // =========================================================================
    // Solution modifiers
    // =========================================================================

    fn parse_group_having(&mut self) -> Result<(Vec<Var>, Vec<Expression>)> {
        let mut group_by = Vec::new();
        let mut having = Vec::new();

        if self.eat(&TokenKind::KwGroup) {
            self.expect(TokenKind::KwBy, "BY after GROUP")?;
            while let TokenKind::Var(name) = self.at().clone() {
                self.bump();
                group_by.push(Var::new(name.as_ref()));
            }
            if group_by.is_empty() {
                return Err(self.error("expected at least one variable after GROUP BY"));
            }
        }

        if self.eat(&TokenKind::KwHaving) {
            while matches!(self.at(), TokenKind::LParen) {
                self.bump();
                having.push(self.parse_expression()?);
                self.expect(TokenKind::RParen, "')' to close the HAVING constraint")?;
            }
            if having.is_empty() {
                return Err(self.error("expected '(' after HAVING"));
            }
        }

        Ok((group_by, having))
    }

    fn parse_order_by(&mut self) -> Result<Vec<OrderCondition>> {
        let mut conditions = Vec::new();
        if !self.eat(&TokenKind::KwOrder) {
            return Ok(conditions);
        }
        self.expect(TokenKind::KwBy, "BY after ORDER")?;

        loop {
            match self.at().clone() {
                TokenKind::KwAsc | TokenKind::KwDesc => {
                    let descending = matches!(self.at(), TokenKind::KwDesc);
                    self.bump();
                    self.expect(TokenKind::LParen, "'(' after ASC/DESC")?;
                    let expr = self.parse_expression()?;
                    self.expect(TokenKind::RParen, "')' to close the sort condition")?;
                    conditions.push(OrderCondition { expr, descending });
                }
                TokenKind::Var(name) => {
                    self.bump();
                    conditions.push(OrderCondition {
                        expr: Expression::Var(Var::new(name.as_ref())),
                        descending: false,
                    });
                }
                _ => break,
            }
        }

        if conditions.is_empty() {
            return Err(self.error("expected at least one ORDER BY condition"));
        }
        Ok(conditions)
    }

    fn parse_limit_offset(&mut self) -> Result<(Option<u64>, Option<u64>)> {
        let mut limit = None;
        let mut offset = None;

        // LIMIT and OFFSET may appear in either order
        loop {
            if self.eat(&TokenKind::KwLimit) {
                limit = Some(self.parse_unsigned()?);
            } else if self.eat(&TokenKind::KwOffset) {
                offset = Some(self.parse_unsigned()?);
            } else {
                return Ok((limit, offset));
            }
        }
    }

    fn parse_unsigned(&mut self) -> Result<u64> {
        match self.bump() {
            TokenKind::Integer(lex) => lex
                .parse::<u64>()
                .map_err(|_| self.error("expected a non-negative integer")),
            _ => Err(self.error("expected an integer")),
        }
    }
}
