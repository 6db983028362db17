//! Command-line surface over [`crate::facade::NewsGraphService`] (spec.md
//! §6: the core names a CLI as an out-of-core collaborator that still
//! needs a thin entrypoint to exist). Mirrors the teacher's
//! `clap`-derive, global-flags-plus-subcommand shape
//! (`llmspell-cli/src/cli.rs`), scaled down to this system's much smaller
//! command surface.

use std::path::PathBuf;

use clap::{Parser, Subcommand};

#[derive(Parser, Debug)]
#[command(name = "newsgraph")]
#[command(version)]
#[command(about = "Local-first knowledge-graph and GraphRAG core over ingested news articles")]
pub struct Cli {
    /// Path to a TOML configuration file. Falls back to
    /// `NEWSGRAPH__`-prefixed environment variables when omitted.
    #[arg(short = 'c', long, global = true, env = "NEWSGRAPH_CONFIG")]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Runs hypergraph extraction over every `pending` article.
    Process,

    /// Runs a GraphRAG query, streaming each phase update to stdout.
    Query {
        question: String,

        /// An optional role/persona prompt appended to the answer-generation
        /// system prompt.
        #[arg(long)]
        role: Option<String>,

        /// Run the two-agent deep-analysis workflow after the answer
        /// completes.
        #[arg(long)]
        deep: bool,
    },

    /// Runs the full event-clustering pipeline and reports the resulting
    /// build's clusters.
    Cluster,

    /// Finds hypergraph nodes semantically closest to a free-text query.
    Search {
        query: String,

        #[arg(long, default_value_t = 10)]
        limit: usize,
    },

    /// Lists candidate node-merge pairs above a similarity threshold.
    MergeSuggestions {
        #[arg(long, default_value_t = crate::config::DEFAULT_MERGE_THRESHOLD)]
        threshold: f64,

        #[arg(long, default_value_t = 50)]
        limit: usize,
    },

    /// Merges `source` into `target`, repointing incidences and deleting
    /// `source`.
    Merge {
        source: String,
        target: String,

        #[arg(long)]
        similarity: f64,
    },

    /// Prints aggregate node/edge/article/embedding counts.
    Stats,

    /// Query-history inspection.
    #[command(subcommand)]
    History(HistoryCommand),
}

#[derive(Subcommand, Debug)]
pub enum HistoryCommand {
    /// Lists the most recent query-history rows.
    List {
        #[arg(long, default_value_t = 20)]
        limit: usize,
    },
    /// Shows one query-history row in full.
    Show { id: String },
    /// Deletes one query-history row.
    Delete { id: String },
}
