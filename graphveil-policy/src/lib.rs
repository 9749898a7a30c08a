//! Policy store for graphveil
//!
//! Loads the JSON policy file and answers the three constraint lookups the
//! rewrite driver runs: node constraints by (user, node type), predicate
//! constraints by (user, subject type, predicate, object type), and
//! attribute constraints by (user, subject type, predicate).
//!
//! Lookups encode the subsumption rules of the policy language: an
//! unscoped entry (no specific nodes / no subject or object sets) forbids
//! everything its scoped siblings would, so it is returned alone; a
//! deny-read (`X`) attribute entry overrides value-narrowing entries.
//!
//! The store is pure in-memory after load and read-only for the lifetime
//! of a rewrite.

mod error;
mod store;
mod types;

pub use error::{PolicyError, Result};
pub use store::PolicyStore;
pub use types::{AttributeConstraint, ConstraintOp, NodeConstraint, PredicateConstraint};
