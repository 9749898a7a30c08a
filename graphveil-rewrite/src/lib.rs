//! Policy-driven query rewriting for graphveil
//!
//! Given a user identity, a parsed SELECT query, the dataset, its schema
//! view, and the policy store, the [`Rewriter`] produces a semantically
//! equivalent or more restrictive query. The user never sees a permission
//! error: forbidden information is removed by adding filters, dropping
//! triples, and pruning projected variables.
//!
//! The rewrite runs in three passes over a mutable [`QueryModel`]:
//! node constraints (entity-class denial), predicate constraints (edge
//! denial), and attribute constraints (value denial). Candidate types for
//! every variable and constant are inferred once, up front, by probing
//! the dataset (see [`infer`]). Filters landing on the same variable are
//! normalized by the filter [`algebra`]; a contradiction there removes
//! the affected triples instead of producing an unsatisfiable query.
//!
//! The rewriter never fails on policy-derived conditions. In the
//! degenerate case every triple is dropped and the output query has an
//! empty pattern.

pub mod algebra;
mod bindings;
mod driver;
pub mod infer;
mod model;

pub use bindings::TypeBindings;
pub use driver::{RewriteOutcome, Rewriter};
pub use model::QueryModel;
