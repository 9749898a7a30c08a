//! SPARQL lexer implementation using winnow.
//!
//! Tokenizes the SELECT subset into a stream of tokens with byte offsets.
//! Fails fast on the first lexical error. Long (triple-quoted) strings and
//! PLX escapes in local names are outside the subset.

use std::sync::Arc;

use winnow::ascii::digit1;
use winnow::combinator::{alt, delimited, opt, peek, preceded};
use winnow::error::ContextError;
use winnow::stream::{AsChar, Location, Stream};
use winnow::token::{any, one_of, take_till, take_while};
use winnow::{LocatingSlice, ModalResult, Parser};

use crate::error::{ParseError, Result};

/// Input type for the lexer - tracks position for offsets.
pub type Input<'a> = LocatingSlice<&'a str>;

/// A token with its byte range.
#[derive(Clone, Debug, PartialEq)]
pub struct Token {
    /// The token kind
    pub kind: TokenKind,
    /// Start byte offset
    pub start: usize,
    /// End byte offset (exclusive)
    pub end: usize,
}

impl Token {
    /// Create a new token.
    pub fn new(kind: TokenKind, start: usize, end: usize) -> Self {
        Self { kind, start, end }
    }
}

/// Token kinds for the SELECT subset.
#[derive(Clone, Debug, PartialEq)]
pub enum TokenKind {
    /// Full IRI: `<http://example.org/>`
    Iri(Arc<str>),
    /// Prefixed name with local part: `prefix:local`
    PrefixedName {
        /// Namespace prefix (without colon; empty for the default prefix)
        prefix: Arc<str>,
        /// Local part
        local: Arc<str>,
    },
    /// Prefixed name namespace only: `prefix:`
    PrefixedNameNs(Arc<str>),
    /// Variable: `?name` or `$name` (name only)
    Var(Arc<str>),
    /// Blank node label: `_:name` (name only)
    BlankNodeLabel(Arc<str>),
    /// String literal (unescaped content)
    String(Arc<str>),
    /// Integer literal (lexical form)
    Integer(Arc<str>),
    /// Decimal literal (lexical form)
    Decimal(Arc<str>),
    /// Double literal (lexical form)
    Double(Arc<str>),
    /// Language tag: `@en` (tag only)
    LangTag(Arc<str>),

    // Keywords
    KwSelect,
    KwDistinct,
    KwWhere,
    KwFilter,
    KwPrefix,
    KwBase,
    KwGroup,
    KwBy,
    KwHaving,
    KwOrder,
    KwAsc,
    KwDesc,
    KwLimit,
    KwOffset,
    KwNot,
    KwIn,
    KwExists,
    KwAs,
    /// The `a` keyword (rdf:type shorthand, case-sensitive)
    KwA,
    KwTrue,
    KwFalse,
    KwCount,
    KwSum,
    KwAvg,
    KwMin,
    KwMax,
    KwSample,

    // Punctuation and operators
    LBrace,
    RBrace,
    LParen,
    RParen,
    Dot,
    Comma,
    Semicolon,
    Star,
    Eq,
    Ne,
    Lt,
    Le,
    Gt,
    Ge,
    AndAnd,
    OrOr,
    Bang,
    DoubleCaret,

    /// End of input
    Eof,
}

/// Map a bare word to a keyword token.
///
/// Keywords are case-insensitive except `a`, which is only a keyword in
/// its lowercase form.
pub fn keyword_from_str(s: &str) -> Option<TokenKind> {
    if s == "a" {
        return Some(TokenKind::KwA);
    }
    match s.to_ascii_uppercase().as_str() {
        "SELECT" => Some(TokenKind::KwSelect),
        "DISTINCT" => Some(TokenKind::KwDistinct),
        "WHERE" => Some(TokenKind::KwWhere),
        "FILTER" => Some(TokenKind::KwFilter),
        "PREFIX" => Some(TokenKind::KwPrefix),
        "BASE" => Some(TokenKind::KwBase),
        "GROUP" => Some(TokenKind::KwGroup),
        "BY" => Some(TokenKind::KwBy),
        "HAVING" => Some(TokenKind::KwHaving),
        "ORDER" => Some(TokenKind::KwOrder),
        "ASC" => Some(TokenKind::KwAsc),
        "DESC" => Some(TokenKind::KwDesc),
        "LIMIT" => Some(TokenKind::KwLimit),
        "OFFSET" => Some(TokenKind::KwOffset),
        "NOT" => Some(TokenKind::KwNot),
        "IN" => Some(TokenKind::KwIn),
        "EXISTS" => Some(TokenKind::KwExists),
        "AS" => Some(TokenKind::KwAs),
        "TRUE" => Some(TokenKind::KwTrue),
        "FALSE" => Some(TokenKind::KwFalse),
        "COUNT" => Some(TokenKind::KwCount),
        "SUM" => Some(TokenKind::KwSum),
        "AVG" => Some(TokenKind::KwAvg),
        "MIN" => Some(TokenKind::KwMin),
        "MAX" => Some(TokenKind::KwMax),
        "SAMPLE" => Some(TokenKind::KwSample),
        _ => None,
    }
}

/// Tokenize the entire input, failing fast on the first invalid token.
pub fn tokenize(source: &str) -> Result<Vec<Token>> {
    let mut tokens = Vec::new();
    let mut input = LocatingSlice::new(source);

    loop {
        skip_ws_and_comments(&mut input);

        if input.is_empty() {
            let pos = input.current_token_start();
            tokens.push(Token::new(TokenKind::Eof, pos, pos));
            break;
        }

        let start = input.current_token_start();

        match next_token(&mut input) {
            Ok(kind) => {
                let end = input.current_token_start();
                tokens.push(Token::new(kind, start, end));
            }
            Err(_) => {
                let bad = input.as_ref().chars().next().unwrap_or('?');
                return Err(ParseError::lex(
                    start,
                    format!("unexpected character '{bad}'"),
                ));
            }
        }
    }

    Ok(tokens)
}

/// Skip whitespace and `#` comments.
fn skip_ws_and_comments(input: &mut Input<'_>) {
    loop {
        let _: ModalResult<&str, ContextError> = take_while(0.., is_ws).parse_next(input);

        if input.starts_with('#') {
            let _: ModalResult<&str, ContextError> =
                take_till(0.., |c| c == '\n' || c == '\r').parse_next(input);
            let _: ModalResult<Option<char>, ContextError> =
                opt(one_of(['\n', '\r'])).parse_next(input);
        } else {
            break;
        }
    }
}

/// Parse the next token.
fn next_token(input: &mut Input<'_>) -> ModalResult<TokenKind> {
    alt((
        // Multi-char operators (must come before single-char)
        parse_double_caret,
        parse_double_amp,
        parse_double_pipe,
        parse_ne,
        parse_le,
        parse_ge,
        // IRIs (before the `<` operator)
        parse_iri_ref,
        // Blank nodes (before prefixed names - both can start with '_')
        parse_blank_node_label,
        // Default prefix (:name or just :)
        parse_default_prefix,
        // Prefixed names and keywords
        parse_prefixed_name_or_keyword,
        // Variables
        parse_variable,
        // Literals
        parse_string_literal,
        parse_number,
        // Language tags (before punctuation which would reject '@')
        parse_lang_tag,
        // Single-char punctuation
        parse_punctuation,
    ))
    .parse_next(input)
}

// =============================================================================
// Character classes (SPARQL 1.1 grammar productions)
// =============================================================================

fn is_ws(c: char) -> bool {
    matches!(c, ' ' | '\t' | '\r' | '\n')
}

fn is_pn_chars_base(c: char) -> bool {
    matches!(c,
        'A'..='Z' |
        'a'..='z' |
        '\u{00C0}'..='\u{00D6}' |
        '\u{00D8}'..='\u{00F6}' |
        '\u{00F8}'..='\u{02FF}' |
        '\u{0370}'..='\u{037D}' |
        '\u{037F}'..='\u{1FFF}' |
        '\u{200C}'..='\u{200D}' |
        '\u{2070}'..='\u{218F}' |
        '\u{2C00}'..='\u{2FEF}' |
        '\u{3001}'..='\u{D7FF}' |
        '\u{F900}'..='\u{FDCF}' |
        '\u{FDF0}'..='\u{FFFD}' |
        '\u{10000}'..='\u{EFFFF}'
    )
}

fn is_pn_chars_u(c: char) -> bool {
    is_pn_chars_base(c) || c == '_'
}

fn is_pn_chars(c: char) -> bool {
    is_pn_chars_u(c)
        || c == '-'
        || c.is_ascii_digit()
        || c == '\u{00B7}'
        || matches!(c, '\u{0300}'..='\u{036F}' | '\u{203F}'..='\u{2040}')
}

fn is_varname_start(c: char) -> bool {
    is_pn_chars_u(c) || c.is_ascii_digit()
}

fn is_varname_char(c: char) -> bool {
    is_pn_chars_u(c)
        || c.is_ascii_digit()
        || c == '\u{00B7}'
        || matches!(c, '\u{0300}'..='\u{036F}' | '\u{203F}'..='\u{2040}')
}

fn is_iri_char(c: char) -> bool {
    !matches!(c, '<' | '>' | '"' | '{' | '}' | '|' | '^' | '`' | '\\' | '\x00'..='\x20')
}

// =============================================================================
// Operators and punctuation
// =============================================================================

fn parse_double_caret(input: &mut Input<'_>) -> ModalResult<TokenKind> {
    "^^".map(|_| TokenKind::DoubleCaret).parse_next(input)
}

fn parse_double_amp(input: &mut Input<'_>) -> ModalResult<TokenKind> {
    "&&".map(|_| TokenKind::AndAnd).parse_next(input)
}

fn parse_double_pipe(input: &mut Input<'_>) -> ModalResult<TokenKind> {
    "||".map(|_| TokenKind::OrOr).parse_next(input)
}

fn parse_ne(input: &mut Input<'_>) -> ModalResult<TokenKind> {
    "!=".map(|_| TokenKind::Ne).parse_next(input)
}

fn parse_le(input: &mut Input<'_>) -> ModalResult<TokenKind> {
    "<=".map(|_| TokenKind::Le).parse_next(input)
}

fn parse_ge(input: &mut Input<'_>) -> ModalResult<TokenKind> {
    ">=".map(|_| TokenKind::Ge).parse_next(input)
}

fn parse_punctuation(input: &mut Input<'_>) -> ModalResult<TokenKind> {
    let c: char = one_of([
        '{', '}', '(', ')', '.', ',', ';', '*', '=', '<', '>', '!',
    ])
    .parse_next(input)?;
    Ok(match c {
        '{' => TokenKind::LBrace,
        '}' => TokenKind::RBrace,
        '(' => TokenKind::LParen,
        ')' => TokenKind::RParen,
        '.' => TokenKind::Dot,
        ',' => TokenKind::Comma,
        ';' => TokenKind::Semicolon,
        '*' => TokenKind::Star,
        '=' => TokenKind::Eq,
        '<' => TokenKind::Lt,
        '>' => TokenKind::Gt,
        '!' => TokenKind::Bang,
        _ => unreachable!(),
    })
}

// =============================================================================
// IRIs
// =============================================================================

/// Parse an IRI reference: `<...>`
fn parse_iri_ref(input: &mut Input<'_>) -> ModalResult<TokenKind> {
    delimited('<', take_while(1.., is_iri_char), '>')
        .map(|s: &str| TokenKind::Iri(Arc::from(s)))
        .parse_next(input)
}

// =============================================================================
// Prefixed names and keywords
// =============================================================================

/// Parse a default prefix name (`:local`) or namespace (`:`).
fn parse_default_prefix(input: &mut Input<'_>) -> ModalResult<TokenKind> {
    ':'.parse_next(input)?;

    let local = opt(parse_pn_local).parse_next(input)?;

    match local {
        Some(local) => Ok(TokenKind::PrefixedName {
            prefix: Arc::from(""),
            local: Arc::from(local.as_str()),
        }),
        None => Ok(TokenKind::PrefixedNameNs(Arc::from(""))),
    }
}

/// Parse a prefixed name (`prefix:local`, `prefix:`) or a keyword.
///
/// PN_PREFIX must start with PN_CHARS_BASE; keywords are any alphanumeric
/// word that matches the keyword table.
fn parse_prefixed_name_or_keyword(input: &mut Input<'_>) -> ModalResult<TokenKind> {
    let start = input.checkpoint();

    let first_char = input
        .chars()
        .next()
        .ok_or_else(|| winnow::error::ErrMode::Backtrack(ContextError::new()))?;
    let is_valid_prefix_start = is_pn_chars_base(first_char);

    // Word with optional middle dots (PN_PREFIX shape)
    let mut word = String::new();
    let c: char = any.parse_next(input)?;
    word.push(c);

    loop {
        let chunk: &str = take_while(0.., is_pn_chars).parse_next(input)?;
        word.push_str(chunk);

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
        if !is_valid_prefix_start {
            input.reset(&start);
            return Err(winnow::error::ErrMode::Backtrack(ContextError::new()));
        }

        ':'.parse_next(input)?;

        let local = opt(parse_pn_local).parse_next(input)?;
        match local {
            Some(local) => Ok(TokenKind::PrefixedName {
                prefix: Arc::from(word.as_str()),
                local: Arc::from(local.as_str()),
            }),
            None => Ok(TokenKind::PrefixedNameNs(Arc::from(word.as_str()))),
        }
    } else {
        match keyword_from_str(&word) {
            Some(kw) => Ok(kw),
            None => {
                input.reset(&start);
                Err(winnow::error::ErrMode::Backtrack(ContextError::new()))
            }
        }
    }
}

/// Parse a local name (after the colon in a prefixed name).
///
/// Local names may contain `:` and middle dots but cannot end with a dot.
fn parse_pn_local(input: &mut Input<'_>) -> ModalResult<String> {
    let first_char = input
        .chars()
        .next()
        .ok_or_else(|| winnow::error::ErrMode::Backtrack(ContextError::new()))?;

    if !(is_pn_chars_u(first_char) || first_char == ':' || first_char.is_ascii_digit()) {
        return Err(winnow::error::ErrMode::Backtrack(ContextError::new()));
    }

    let mut result = String::new();

    loop {
        let chunk: &str =
            take_while(0.., |c: char| is_pn_chars(c) || c == ':').parse_next(input)?;
        result.push_str(chunk);

        if input.starts_with('.') {
            let rest = &input.as_ref()[1..];
            if rest
                .chars()
                .next()
                .is_some_and(|c| is_pn_chars(c) || c == ':')
            {
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

// =============================================================================
// Variables and blank nodes
// =============================================================================

/// Parse a variable: `?name` or `$name`
fn parse_variable(input: &mut Input<'_>) -> ModalResult<TokenKind> {
    preceded(one_of(['?', '$']), parse_varname)
        .map(|name: &str| TokenKind::Var(Arc::from(name)))
        .parse_next(input)
}

fn parse_varname<'a>(input: &mut Input<'a>) -> ModalResult<&'a str> {
    (
        take_while(1, is_varname_start),
        take_while(0.., is_varname_char),
    )
        .take()
        .parse_next(input)
}

/// Parse a blank node label: `_:name`
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

// =============================================================================
// String literals
// =============================================================================

fn parse_string_literal(input: &mut Input<'_>) -> ModalResult<TokenKind> {
    alt((parse_string_double, parse_string_single)).parse_next(input)
}

fn parse_string_double(input: &mut Input<'_>) -> ModalResult<TokenKind> {
    delimited('"', |i: &mut Input<'_>| parse_string_content(i, '"'), '"')
        .map(|s| TokenKind::String(Arc::from(s)))
        .parse_next(input)
}

fn parse_string_single(input: &mut Input<'_>) -> ModalResult<TokenKind> {
    delimited('\'', |i: &mut Input<'_>| parse_string_content(i, '\''), '\'')
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
            let escaped = parse_escape_char(input)?;
            result.push(escaped);
        } else {
            // Bare newline inside a short string
            break;
        }
    }

    Ok(result)
}

/// Parse an escape character after a backslash.
fn parse_escape_char(input: &mut Input<'_>) -> ModalResult<char> {
    let c: char = any.parse_next(input)?;
    match c {
        't' => Ok('\t'),
        'b' => Ok('\x08'),
        'n' => Ok('\n'),
        'r' => Ok('\r'),
        'f' => Ok('\x0C'),
        '"' => Ok('"'),
        '\'' => Ok('\''),
        '\\' => Ok('\\'),
        'u' => {
            let hex: &str = take_while(4..=4, AsChar::is_hex_digit).parse_next(input)?;
            let code = u32::from_str_radix(hex, 16)
                .map_err(|_| winnow::error::ErrMode::Backtrack(ContextError::new()))?;
            char::from_u32(code)
                .ok_or_else(|| winnow::error::ErrMode::Backtrack(ContextError::new()))
        }
        'U' => {
            let hex: &str = take_while(8..=8, AsChar::is_hex_digit).parse_next(input)?;
            let code = u32::from_str_radix(hex, 16)
                .map_err(|_| winnow::error::ErrMode::Backtrack(ContextError::new()))?;
            char::from_u32(code)
                .ok_or_else(|| winnow::error::ErrMode::Backtrack(ContextError::new()))
        }
        _ => Err(winnow::error::ErrMode::Backtrack(ContextError::new())),
    }
}

// =============================================================================
// Numbers
// =============================================================================

fn parse_number(input: &mut Input<'_>) -> ModalResult<TokenKind> {
    alt((parse_double_num, parse_decimal_num, parse_integer_num)).parse_next(input)
}

fn parse_integer_num(input: &mut Input<'_>) -> ModalResult<TokenKind> {
    let lexical: &str = (opt(one_of(['+', '-'])), digit1).take().parse_next(input)?;

    // Not an integer if an exponent or fraction follows
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

// =============================================================================
// Language tags
// =============================================================================

/// Parse a language tag: `@en`, `@en-US`, ...
fn parse_lang_tag(input: &mut Input<'_>) -> ModalResult<TokenKind> {
    '@'.parse_next(input)?;

    let tag: &str = (
        take_while(1.., |c: char| c.is_ascii_alphabetic()),
        take_while(0.., |c: char| c.is_ascii_alphanumeric() || c == '-'),
    )
        .take()
        .parse_next(input)?;

    Ok(TokenKind::LangTag(Arc::from(tag)))
}
