//! Turtle subset reader.
//!
//! Covers the surface schema-bearing datasets actually use: `@prefix` and
//! `@base` directives (and their SPARQL-style spellings), prefixed names,
//! IRIs, the `a` keyword, predicate and object lists, blank node labels,
//! and string/numeric/boolean literals with `^^` datatypes and language
//! tags. Collections and anonymous blank nodes are rejected at the lexer
//! with a clear error rather than silently dropped.

use std::sync::Arc;

use winnow::ascii::digit1;
use winnow::combinator::{alt, delimited, opt, peek, preceded};
use winnow::error::ContextError;
use winnow::stream::{AsChar, Location, Stream};
use winnow::token::{any, one_of, take_till, take_while};
use winnow::{LocatingSlice, ModalResult, Parser};

use graphveil_core::{Iri, Literal, Term};
use graphveil_vocab::rdf;
use rustc_hash::FxHashMap;

use crate::error::{GraphError, Result};
use crate::store::DataTriple;

/// Parse a Turtle document into data triples.
pub fn parse_turtle(source: &str) -> Result<Vec<DataTriple>> {
    let tokens = tokenize(source)?;
    TurtleParser::new(tokens).parse()
}

// =============================================================================
// Lexer
// =============================================================================

type Input<'a> = LocatingSlice<&'a str>;

#[derive(Clone, Debug, PartialEq)]
struct Token {
    kind: TokenKind,
    start: usize,
}

#[derive(Clone, Debug, PartialEq)]
enum TokenKind {
    Iri(Arc<str>),
    PrefixedName { prefix: Arc<str>, local: Arc<str> },
    PrefixedNameNs(Arc<str>),
    BlankNodeLabel(Arc<str>),
    String(Arc<str>),
    Integer(Arc<str>),
    Decimal(Arc<str>),
    Double(Arc<str>),
    Boolean(bool),
    LangTag(Arc<str>),
    AtPrefix,
    AtBase,
    SparqlPrefix,
    SparqlBase,
    A,
    Dot,
    Semicolon,
    Comma,
    DoubleCaret,
    Eof,
}

fn tokenize(source: &str) -> Result<Vec<Token>> {
    let mut tokens = Vec::new();
    let mut input = LocatingSlice::new(source);

    loop {
        skip_ws_and_comments(&mut input);

        let start = input.current_token_start();
        if input.is_empty() {
            tokens.push(Token {
                kind: TokenKind::Eof,
                start,
            });
            break;
        }

        match next_token(&mut input) {
            Ok(kind) => tokens.push(Token { kind, start }),
            Err(_) => {
                let bad = input.as_ref().chars().next().unwrap_or('?');
                return Err(GraphError::turtle(
                    start,
                    format!("unexpected character '{bad}'"),
                ));
            }
        }
    }

    Ok(tokens)
}

fn skip_ws_and_comments(input: &mut Input<'_>) {
    loop {
        let _: ModalResult<&str, ContextError> =
            take_while(0.., |c: char| matches!(c, ' ' | '\t' | '\r' | '\n')).parse_next(input);

        if input.starts_with('#') {
            let _: ModalResult<&str, ContextError> =
                take_till(0.., |c| c == '\n' || c == '\r').parse_next(input);
        } else {
            break;
        }
    }
}

fn next_token(input: &mut Input<'_>) -> ModalResult<TokenKind> {
    alt((
        parse_double_caret,
        parse_iri_ref,
        parse_blank_node_label,
        parse_at_word,
        parse_default_prefix,
        parse_word,
        parse_string,
        parse_number,
        parse_punctuation,
    ))
    .parse_next(input)
}

fn is_pn_chars_base(c: char) -> bool {
    c.is_alphabetic()
}

fn is_pn_chars_u(c: char) -> bool {
    is_pn_chars_base(c) || c == '_'
}

fn is_pn_chars(c: char) -> bool {
    is_pn_chars_u(c) || c == '-' || c.is_ascii_digit()
}

fn is_iri_char(c: char) -> bool {
    !matches!(c, '<' | '>' | '"' | '{' | '}' | '|' | '^' | '`' | '\\' | '\x00'..='\x20')
}

fn parse_double_caret(input: &mut Input<'_>) -> ModalResult<TokenKind> {
    "^^".map(|_| TokenKind::DoubleCaret).parse_next(input)
}

fn parse_iri_ref(input: &mut Input<'_>) -> ModalResult<TokenKind> {
    delimited('<', take_while(0.., is_iri_char), '>')
        .map(|s: &str| TokenKind::Iri(Arc::from(s)))
        .parse_next(input)
}

fn parse_blank_node_label(input: &mut Input<'_>) -> ModalResult<TokenKind> {
    preceded(
        "_:",
        (
            take_while(1, |c: char| is_pn_chars_u(c) || c.is_ascii_digit()),
            take_while(0.., is_pn_chars),
        )
            .take(),
    )
    .map(|name: &str| TokenKind::BlankNodeLabel(Arc::from(name)))
    .parse_next(input)
}

/// `@prefix`, `@base`, or a language tag.
fn parse_at_word(input: &mut Input<'_>) -> ModalResult<TokenKind> {
    '@'.parse_next(input)?;
    let word: &str = (
        take_while(1.., |c: char| c.is_ascii_alphabetic()),
        take_while(0.., |c: char| c.is_ascii_alphanumeric() || c == '-'),
    )
        .take()
        .parse_next(input)?;

    Ok(match word {
        "prefix" => TokenKind::AtPrefix,
        "base" => TokenKind::AtBase,
        _ => TokenKind::LangTag(Arc::from(word)),
    })
}

fn parse_default_prefix(input: &mut Input<'_>) -> ModalResult<TokenKind> {
    ':'.parse_next(input)?;
    let local = opt(parse_pn_local).parse_next(input)?;
    Ok(match local {
        Some(local) => TokenKind::PrefixedName {
            prefix: Arc::from(""),
            local: Arc::from(local.as_str()),
        },
        None => TokenKind::PrefixedNameNs(Arc::from("")),
    })
}

/// A bare word: prefixed name, `a`, boolean, or SPARQL-style directive.
fn parse_word(input: &mut Input<'_>) -> ModalResult<TokenKind> {
    let start = input.checkpoint();

    let first_char = input
        .chars()
        .next()
        .ok_or_else(|| winnow::error::ErrMode::Backtrack(ContextError::new()))?;
    if !is_pn_chars_u(first_char) {
        return Err(winnow::error::ErrMode::Backtrack(ContextError::new()));
    }

    let mut word = String::new();
    let c: char = any.parse_next(input)?;
    word.push(c);

    loop {
        let chunk: &str = take_while(0.., is_pn_chars).parse_next(input)?;
        word.push_str(chunk);

        // Middle dots only
        if input.starts_with('.') {
            let rest = &input.as_ref()[1..];
            if rest.chars().next().is_some_and(is_pn_chars) {
                '.'.parse_next(input)?;
                word.push('.');
                continue;
            }
        }
        break;
    }

    if peek(opt(':')).parse_next(input)?.is_some() {
        ':'.parse_next(input)?;
        let local = opt(parse_pn_local).parse_next(input)?;
        return Ok(match local {
            Some(local) => TokenKind::PrefixedName {
                prefix: Arc::from(word.as_str()),
                local: Arc::from(local.as_str()),
            },
            None => TokenKind::PrefixedNameNs(Arc::from(word.as_str())),
        });
    }

    match word.as_str() {
        "a" => Ok(TokenKind::A),
        "true" => Ok(TokenKind::Boolean(true)),
        "false" => Ok(TokenKind::Boolean(false)),
        _ if word.eq_ignore_ascii_case("prefix") => Ok(TokenKind::SparqlPrefix),
        _ if word.eq_ignore_ascii_case("base") => Ok(TokenKind::SparqlBase),
        _ => {
            input.reset(&start);
            Err(winnow::error::ErrMode::Backtrack(ContextError::new()))
        }
    }
}

fn parse_pn_local(input: &mut Input<'_>) -> ModalResult<String> {
    let first_char = input
        .chars()
        .next()
        .ok_or_else(|| winnow::error::ErrMode::Backtrack(ContextError::new()))?;
    if !(is_pn_chars_u(first_char) || first_char.is_ascii_digit()) {
        return Err(winnow::error::ErrMode::Backtrack(ContextError::new()));
    }

    let mut result = String::new();
    loop {
        let chunk: &str = take_while(0.., is_pn_chars).parse_next(input)?;
        result.push_str(chunk);

        if input.starts_with('.') {
            let rest = &input.as_ref()[1..];
            if rest.chars().next().is_some_and(is_pn_chars) {
                '.'.parse_next(input)?;
                result.push('.');
                continue;
            }
        }
        break;
    }

    if result.is_empty() {
        return Err(winnow::error::ErrMode::Backtrack(ContextError::new()));
    }
    Ok(result)
}

fn parse_string(input: &mut Input<'_>) -> ModalResult<TokenKind> {
    alt((
        delimited('"', |i: &mut Input<'_>| parse_string_content(i, '"'), '"'),
        delimited('\'', |i: &mut Input<'_>| parse_string_content(i, '\''), '\''),
    ))
    .map(|s| TokenKind::String(Arc::from(s)))
    .parse_next(input)
}

fn parse_string_content(input: &mut Input<'_>, quote: char) -> ModalResult<String> {
    let mut result = String::new();

    loop {
        let chunk: &str =
            take_while(0.., |c| c != quote && c != '\\' && c != '\n' && c != '\r')
                .parse_next(input)?;
        result.push_str(chunk);

        if input.is_empty() || input.starts_with(quote) {
            break;
        }

        if input.starts_with('\\') {
            '\\'.parse_next(input)?;
            let c: char = any.parse_next(input)?;
            match c {
                't' => result.push('\t'),
                'b' => result.push('\x08'),
                'n' => result.push('\n'),
                'r' => result.push('\r'),
                'f' => result.push('\x0C'),
                '"' => result.push('"'),
                '\'' => result.push('\''),
                '\\' => result.push('\\'),
                'u' => {
                    let hex: &str =
                        take_while(4..=4, AsChar::is_hex_digit).parse_next(input)?;
                    let code = u32::from_str_radix(hex, 16)
                        .map_err(|_| winnow::error::ErrMode::Backtrack(ContextError::new()))?;
                    result.push(char::from_u32(code).ok_or_else(|| {
                        winnow::error::ErrMode::Backtrack(ContextError::new())
                    })?);
                }
                _ => return Err(winnow::error::ErrMode::Backtrack(ContextError::new())),
            }
        } else {
            break;
        }
    }

    Ok(result)
}

fn parse_number(input: &mut Input<'_>) -> ModalResult<TokenKind> {
    alt((parse_double_num, parse_decimal_num, parse_integer_num)).parse_next(input)
}

fn parse_integer_num(input: &mut Input<'_>) -> ModalResult<TokenKind> {
    let lexical: &str = (opt(one_of(['+', '-'])), digit1).take().parse_next(input)?;

    if peek(opt(one_of(['e', 'E']))).parse_next(input)?.is_some() {
        return Err(winnow::error::ErrMode::Backtrack(ContextError::new()));
    }
    if input.starts_with('.') {
        let rest = &input.as_ref()[1..];
        if rest.chars().next().is_some_and(|c| c.is_ascii_digit()) {
            return Err(winnow::error::ErrMode::Backtrack(ContextError::new()));
        }
    }

    Ok(TokenKind::Integer(Arc::from(lexical)))
}

fn parse_decimal_num(input: &mut Input<'_>) -> ModalResult<TokenKind> {
    let lexical: &str = (opt(one_of(['+', '-'])), digit1, '.', digit1)
        .take()
        .parse_next(input)?;

    if peek(opt(one_of(['e', 'E']))).parse_next(input)?.is_some() {
        return Err(winnow::error::ErrMode::Backtrack(ContextError::new()));
    }

    Ok(TokenKind::Decimal(Arc::from(lexical)))
}

fn parse_double_num(input: &mut Input<'_>) -> ModalResult<TokenKind> {
    let lexical: &str = (
        opt(one_of(['+', '-'])),
        alt(((digit1, '.', opt(digit1)).take(), digit1)),
        one_of(['e', 'E']),
        opt(one_of(['+', '-'])),
        digit1,
    )
        .take()
        .parse_next(input)?;

    Ok(TokenKind::Double(Arc::from(lexical)))
}

fn parse_punctuation(input: &mut Input<'_>) -> ModalResult<TokenKind> {
    let c: char = one_of(['.', ';', ',']).parse_next(input)?;
    Ok(match c {
        '.' => TokenKind::Dot,
        ';' => TokenKind::Semicolon,
        ',' => TokenKind::Comma,
        _ => unreachable!(),
    })
}

// =============================================================================
// Parser
// =============================================================================

struct TurtleParser {
    tokens: Vec<Token>,
    pos: usize,
    prefixes: FxHashMap<String, String>,
    base: Option<String>,
    triples: Vec<DataTriple>,
}

impl TurtleParser {
    fn new(tokens: Vec<Token>) -> Self {
        Self {
            tokens,
            pos: 0,
            prefixes: FxHashMap::default(),
            base: None,
            triples: Vec::new(),
        }
    }

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

    fn eat(&mut self, kind: &TokenKind) -> bool {
        if self.at() == kind {
            self.bump();
            true
        } else {
            false
        }
    }

    fn error(&self, message: impl Into<String>) -> GraphError {
        GraphError::turtle(self.byte_pos(), message.into())
    }

    fn parse(mut self) -> Result<Vec<DataTriple>> {
        loop {
            match self.at() {
                TokenKind::Eof => return Ok(self.triples),
                TokenKind::AtPrefix => {
                    self.bump();
                    self.parse_prefix_decl()?;
                    self.expect_dot()?;
                }
                TokenKind::SparqlPrefix => {
                    self.bump();
                    self.parse_prefix_decl()?;
                }
                TokenKind::AtBase => {
                    self.bump();
                    self.parse_base_decl()?;
                    self.expect_dot()?;
                }
                TokenKind::SparqlBase => {
                    self.bump();
                    self.parse_base_decl()?;
                }
                _ => self.parse_triples_statement()?,
            }
        }
    }

    fn expect_dot(&mut self) -> Result<()> {
        if self.eat(&TokenKind::Dot) {
            Ok(())
        } else {
            Err(self.error("expected '.'"))
        }
    }

    fn parse_prefix_decl(&mut self) -> Result<()> {
        let prefix = match self.bump() {
            TokenKind::PrefixedNameNs(p) => p,
            _ => return Err(self.error("expected 'prefix:' in prefix declaration")),
        };
        let namespace = match self.bump() {
            TokenKind::Iri(iri) => iri,
            _ => return Err(self.error("expected IRI in prefix declaration")),
        };
        self.prefixes
            .insert(prefix.to_string(), namespace.to_string());
        Ok(())
    }

    fn parse_base_decl(&mut self) -> Result<()> {
        match self.bump() {
            TokenKind::Iri(iri) => {
                self.base = Some(iri.to_string());
                Ok(())
            }
            _ => Err(self.error("expected IRI in base declaration")),
        }
    }

    fn parse_triples_statement(&mut self) -> Result<()> {
        let subject = self.parse_subject()?;

        loop {
            let predicate = self.parse_predicate()?;

            loop {
                let object = self.parse_object()?;
                self.triples
                    .push(DataTriple::new(subject.clone(), predicate.clone(), object));
                if !self.eat(&TokenKind::Comma) {
                    break;
                }
            }

            if self.eat(&TokenKind::Semicolon) {
                if matches!(self.at(), TokenKind::Dot) {
                    break;
                }
                continue;
            }
            break;
        }

        self.expect_dot()
    }

    fn parse_subject(&mut self) -> Result<Term> {
        match self.bump() {
            TokenKind::Iri(iri) => Ok(Term::Iri(self.resolve_iri(&iri))),
            TokenKind::PrefixedName { prefix, local } => {
                Ok(Term::Iri(self.expand(&prefix, &local)?))
            }
            TokenKind::PrefixedNameNs(prefix) => Ok(Term::Iri(self.expand(&prefix, "")?)),
            TokenKind::BlankNodeLabel(label) => Ok(Term::Blank(label)),
            _ => Err(self.error("expected a subject")),
        }
    }

    fn parse_predicate(&mut self) -> Result<Iri> {
        match self.bump() {
            TokenKind::A => Ok(Iri::new(rdf::TYPE)),
            TokenKind::Iri(iri) => Ok(self.resolve_iri(&iri)),
            TokenKind::PrefixedName { prefix, local } => self.expand(&prefix, &local),
            TokenKind::PrefixedNameNs(prefix) => self.expand(&prefix, ""),
            _ => Err(self.error("expected a predicate")),
        }
    }

    fn parse_object(&mut self) -> Result<Term> {
        match self.bump() {
            TokenKind::Iri(iri) => Ok(Term::Iri(self.resolve_iri(&iri))),
            TokenKind::PrefixedName { prefix, local } => {
                Ok(Term::Iri(self.expand(&prefix, &local)?))
            }
            TokenKind::PrefixedNameNs(prefix) => Ok(Term::Iri(self.expand(&prefix, "")?)),
            TokenKind::BlankNodeLabel(label) => Ok(Term::Blank(label)),
            TokenKind::String(content) => {
                Ok(Term::Literal(self.finish_string_literal(content)?))
            }
            TokenKind::Integer(lex) => Ok(Term::Literal(Literal::integer(lex.as_ref()))),
            TokenKind::Decimal(lex) | TokenKind::Double(lex) => {
                Ok(Term::Literal(Literal::double(lex.as_ref())))
            }
            TokenKind::Boolean(b) => Ok(Term::Literal(Literal::boolean(b))),
            _ => Err(self.error("expected an object")),
        }
    }

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

    fn expand(&self, prefix: &str, local: &str) -> Result<Iri> {
        match self.prefixes.get(prefix) {
            Some(namespace) => Ok(Iri::new(format!("{namespace}{local}"))),
            None => Err(self.error(format!("unknown prefix '{prefix}:'"))),
        }
    }

    fn resolve_iri(&self, iri: &str) -> Iri {
        if !iri.contains(':') {
            if let Some(base) = &self.base {
                return Iri::new(format!("{base}{iri}"));
            }
        }
        Iri::new(iri)
    }
}
