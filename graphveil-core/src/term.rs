//! RDF term types.
//!
//! These types represent the different kinds of terms that can appear in
//! query patterns and in the dataset: variables, IRIs, literals, and blank
//! nodes. All of them are cheap to clone (`Arc<str>` backed) and compare
//! structurally.

use graphveil_vocab::xsd;
use std::fmt;
use std::sync::Arc;

/// A query variable (e.g. `?name`).
///
/// The name does not include the leading `?` or `$`.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct Var {
    name: Arc<str>,
}

impl Var {
    /// Create a new variable.
    pub fn new(name: impl AsRef<str>) -> Self {
        Self {
            name: Arc::from(name.as_ref()),
        }
    }

    /// Variable name (without the `?` prefix).
    pub fn name(&self) -> &str {
        &self.name
    }
}

impl fmt::Display for Var {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "?{}", self.name)
    }
}

/// A fully expanded IRI.
///
/// Prefixed names are resolved at parse time, so every `Iri` in the data
/// model carries its absolute form.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct Iri {
    value: Arc<str>,
}

impl Iri {
    /// Create a new IRI from its absolute form.
    pub fn new(value: impl AsRef<str>) -> Self {
        Self {
            value: Arc::from(value.as_ref()),
        }
    }

    /// The absolute IRI string.
    pub fn as_str(&self) -> &str {
        &self.value
    }
}

impl fmt::Display for Iri {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "<{}>", self.value)
    }
}

/// A literal value: lexical form, datatype IRI, optional language tag.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct Literal {
    lexical: Arc<str>,
    datatype: Iri,
    lang: Option<Arc<str>>,
}

impl Literal {
    /// Create a typed literal.
    pub fn typed(lexical: impl AsRef<str>, datatype: Iri) -> Self {
        Self {
            lexical: Arc::from(lexical.as_ref()),
            datatype,
            lang: None,
        }
    }

    /// Create a plain string literal (xsd:string).
    pub fn string(lexical: impl AsRef<str>) -> Self {
        Self::typed(lexical, Iri::new(xsd::STRING))
    }

    /// Create a language-tagged string.
    pub fn lang_string(lexical: impl AsRef<str>, lang: impl AsRef<str>) -> Self {
        Self {
            lexical: Arc::from(lexical.as_ref()),
            datatype: Iri::new(graphveil_vocab::rdf::LANG_STRING),
            lang: Some(Arc::from(lang.as_ref())),
        }
    }

    /// Create an integer literal (xsd:integer).
    pub fn integer(lexical: impl AsRef<str>) -> Self {
        Self::typed(lexical, Iri::new(xsd::INTEGER))
    }

    /// Create a double literal (xsd:double).
    pub fn double(lexical: impl AsRef<str>) -> Self {
        Self::typed(lexical, Iri::new(xsd::DOUBLE))
    }

    /// Create a boolean literal (xsd:boolean).
    pub fn boolean(value: bool) -> Self {
        Self::typed(if value { "true" } else { "false" }, Iri::new(xsd::BOOLEAN))
    }

    /// Create a date literal (xsd:date).
    pub fn date(lexical: impl AsRef<str>) -> Self {
        Self::typed(lexical, Iri::new(xsd::DATE))
    }

    /// The lexical form.
    pub fn lexical(&self) -> &str {
        &self.lexical
    }

    /// The datatype IRI.
    pub fn datatype(&self) -> &Iri {
        &self.datatype
    }

    /// The language tag, if any.
    pub fn lang(&self) -> Option<&str> {
        self.lang.as_deref()
    }
}

/// A term in a graph pattern or in the dataset.
///
/// Position constraints (subjects are never literals, predicates are only
/// variables or IRIs) are enforced by the parsers, not by this type.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub enum Term {
    /// Variable (`?x`)
    Var(Var),
    /// IRI
    Iri(Iri),
    /// Literal value
    Literal(Literal),
    /// Blank node label
    Blank(Arc<str>),
}

impl Term {
    /// Create a variable term.
    pub fn var(name: impl AsRef<str>) -> Self {
        Term::Var(Var::new(name))
    }

    /// Create an IRI term.
    pub fn iri(value: impl AsRef<str>) -> Self {
        Term::Iri(Iri::new(value))
    }

    /// Check if this term is a variable.
    pub fn is_var(&self) -> bool {
        matches!(self, Term::Var(_))
    }

    /// Get the variable if this is a variable term.
    pub fn as_var(&self) -> Option<&Var> {
        match self {
            Term::Var(v) => Some(v),
            _ => None,
        }
    }

    /// Check if this term is an IRI.
    pub fn is_iri(&self) -> bool {
        matches!(self, Term::Iri(_))
    }

    /// Get the IRI if this is an IRI term.
    pub fn as_iri(&self) -> Option<&Iri> {
        match self {
            Term::Iri(i) => Some(i),
            _ => None,
        }
    }

    /// Check if this term is a literal.
    pub fn is_literal(&self) -> bool {
        matches!(self, Term::Literal(_))
    }

    /// Get the literal if this is a literal term.
    pub fn as_literal(&self) -> Option<&Literal> {
        match self {
            Term::Literal(l) => Some(l),
            _ => None,
        }
    }
}

impl From<Var> for Term {
    fn from(v: Var) -> Self {
        Term::Var(v)
    }
}

impl From<Iri> for Term {
    fn from(i: Iri) -> Self {
        Term::Iri(i)
    }
}

impl From<Literal> for Term {
    fn from(l: Literal) -> Self {
        Term::Literal(l)
    }
}

impl fmt::Display for Term {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Term::Var(v) => v.fmt(f),
            Term::Iri(i) => i.fmt(f),
            Term::Literal(l) => {
                write!(f, "\"{}\"", l.lexical())?;
                if let Some(lang) = l.lang() {
                    write!(f, "@{lang}")?;
                } else if l.datatype().as_str() != xsd::STRING {
                    write!(f, "^^{}", l.datatype())?;
                }
                Ok(())
            }
            Term::Blank(label) => write!(f, "_:{label}"),
        }
    }
}
