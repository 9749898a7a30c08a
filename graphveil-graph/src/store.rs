//! Ground-triple store.
//!
//! Triples are stored in insertion order with a by-predicate index; that
//! is the only index the rewriter's probes need, since every probe either
//! scans a pattern with a ground predicate or is small enough to scan
//! outright.

use std::path::Path;

use graphveil_core::{Iri, Term};
use rustc_hash::FxHashMap;
use tracing::debug;

use crate::error::{GraphError, Result};
use crate::turtle;

/// A ground triple in the dataset.
///
/// Subjects and objects are IRIs, literals, or blank nodes; predicates are
/// always IRIs.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct DataTriple {
    pub subject: Term,
    pub predicate: Iri,
    pub object: Term,
}

impl DataTriple {
    /// Create a data triple.
    pub fn new(subject: Term, predicate: Iri, object: Term) -> Self {
        Self {
            subject,
            predicate,
            object,
        }
    }
}

/// In-memory triple store.
#[derive(Debug, Default)]
pub struct Graph {
    triples: Vec<DataTriple>,
    by_predicate: FxHashMap<Iri, Vec<usize>>,
}

impl Graph {
    /// Create an empty graph.
    pub fn new() -> Self {
        Self::default()
    }

    /// Load a graph from a Turtle file.
    pub fn load_turtle_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let source = std::fs::read_to_string(path).map_err(|source| GraphError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let graph = Self::parse_turtle(&source)?;
        debug!(path = %path.display(), triples = graph.len(), "loaded dataset");
        Ok(graph)
    }

    /// Parse a graph from a Turtle document.
    pub fn parse_turtle(source: &str) -> Result<Self> {
        let mut graph = Graph::new();
        for triple in turtle::parse_turtle(source)? {
            graph.insert(triple);
        }
        Ok(graph)
    }

    /// Insert a triple. Returns false if it was already present.
    pub fn insert(&mut self, triple: DataTriple) -> bool {
        if let Some(bucket) = self.by_predicate.get(&triple.predicate) {
            if bucket.iter().any(|&i| self.triples[i] == triple) {
                return false;
            }
        }
        self.by_predicate
            .entry(triple.predicate.clone())
            .or_default()
            .push(self.triples.len());
        self.triples.push(triple);
        true
    }

    /// Number of triples.
    pub fn len(&self) -> usize {
        self.triples.len()
    }

    /// True if the graph holds no triples.
    pub fn is_empty(&self) -> bool {
        self.triples.is_empty()
    }

    /// All triples, in insertion order.
    pub fn triples(&self) -> impl Iterator<Item = &DataTriple> {
        self.triples.iter()
    }

    /// Triples matching the given (optional) components.
    pub fn matching(
        &self,
        subject: Option<&Term>,
        predicate: Option<&Iri>,
        object: Option<&Term>,
    ) -> Vec<&DataTriple> {
        let matches = |t: &DataTriple| {
            subject.is_none_or(|s| t.subject == *s)
                && object.is_none_or(|o| t.object == *o)
        };

        match predicate {
            Some(p) => match self.by_predicate.get(p) {
                Some(bucket) => bucket
                    .iter()
                    .map(|&i| &self.triples[i])
                    .filter(|t| matches(t))
                    .collect(),
                None => Vec::new(),
            },
            None => self.triples.iter().filter(|t| matches(t)).collect(),
        }
    }

    /// Objects of all `(subject, predicate, ?)` triples.
    pub fn objects(&self, subject: &Term, predicate: &Iri) -> Vec<&Term> {
        self.matching(Some(subject), Some(predicate), None)
            .into_iter()
            .map(|t| &t.object)
            .collect()
    }
}
