//! Thin command-line adapter around the rewriter.
//!
//! Loads the dataset and policy, parses the query, runs the rewrite for
//! the given user, and prints the input query, a "no ... constraints
//! applied" line per pass that made no change, and the output query.
//! Rewrite actions (removed triples, added filters) stream through
//! `tracing` on stderr; enable them with `RUST_LOG=info`.

mod error;

use std::path::PathBuf;

use clap::Parser;
use graphveil_graph::{Graph, SchemaView};
use graphveil_policy::PolicyStore;
use graphveil_rewrite::Rewriter;
use graphveil_sparql::parse_query;

use error::{CliError, CliResult};

/// Policy-driven SPARQL query rewriting.
#[derive(Parser)]
#[command(name = "graphveil", version, about)]
struct Cli {
    /// Turtle file holding the dataset and its schema
    #[arg(long)]
    dataset: PathBuf,

    /// JSON file holding the access-control policy
    #[arg(long)]
    policy: PathBuf,

    /// User identity the query runs as
    #[arg(long)]
    user: String,

    /// The SELECT query to rewrite
    #[arg(long, conflicts_with = "query_file")]
    query: Option<String>,

    /// Read the query from a file instead
    #[arg(long)]
    query_file: Option<PathBuf>,
}

fn init_tracing() {
    // Without an installed subscriber, `RUST_LOG=...` has no effect.
    // Default to "off" so stdout stays clean unless the user opts in.
    let filter =
        tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| "off".into());

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();
}

fn main() {
    init_tracing();

    if let Err(e) = run(Cli::parse()) {
        eprintln!("error: {e}");
        std::process::exit(1);
    }
}

fn run(cli: Cli) -> CliResult<()> {
    let query_string = match (&cli.query, &cli.query_file) {
        (Some(query), _) => query.clone(),
        (None, Some(path)) => std::fs::read_to_string(path).map_err(|source| CliError::Io {
            path: path.clone(),
            source,
        })?,
        (None, None) => return Err(CliError::MissingQuery),
    };

    let graph = Graph::load_turtle_file(&cli.dataset)?;
    let schema = SchemaView::from_graph(&graph);
    let policy = PolicyStore::load(&cli.policy)?;
    let query = parse_query(&query_string)?;

    println!("--- USER: {} ---", cli.user);
    println!("--- INPUT QUERY: ---");
    println!("{query}");
    println!();

    let rewriter = Rewriter::new(&graph, &schema, &policy, cli.user.as_str());
    let outcome = rewriter.rewrite(&query);

    if !outcome.node_applied {
        println!("no node constraints applied");
    }
    if !outcome.predicate_applied {
        println!("no predicate constraints applied");
    }
    if !outcome.attribute_applied {
        println!("no attribute constraints applied");
    }

    println!();
    println!("--- OUTPUT QUERY: ---");
    println!("{}", outcome.query);

    Ok(())
}
