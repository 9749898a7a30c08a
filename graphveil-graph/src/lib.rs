//! In-memory RDF dataset for graphveil
//!
//! Holds the dataset the rewriter probes: a ground-triple store loaded
//! from Turtle, a precomputed schema view over `rdfs:domain`,
//! `rdfs:range`, and `rdfs:subClassOf`, and a basic-graph-pattern solver
//! used for the rewriter's ground-type probes.
//!
//! The store is read-only after loading; the rewriter never writes to it.

mod error;
mod probe;
mod schema;
mod store;
mod turtle;

pub use error::{GraphError, Result};
pub use probe::{select_distinct, solve, Bindings};
pub use schema::SchemaView;
pub use store::{DataTriple, Graph};
