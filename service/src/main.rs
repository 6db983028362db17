//! Thin CLI entrypoint over [`newsgraph_service::facade::NewsGraphService`].
//! Tracing setup and config loading follow the teacher's
//! `llmspell-cli/src/main.rs` shape: stderr-only tracing so stdout stays
//! clean for command output, configuration loaded once at startup before
//! any subcommand runs.

use anyhow::{Context, Result};
use clap::Parser;
use tokio_stream::StreamExt;

use newsgraph_rag::PhaseUpdate;
use newsgraph_service::cli::{Cli, Command, HistoryCommand};
use newsgraph_service::{NewsGraphConfig, NewsGraphService};

#[tokio::main]
async fn main() -> Result<()> {
    setup_tracing();

    let cli = Cli::parse();
    let config = NewsGraphConfig::load(cli.config.as_deref()).context("failed to load configuration")?;
    let service = NewsGraphService::open(config).context("failed to open newsgraph store")?;

    match cli.command {
        Command::Process => run_process(&service).await?,
        Command::Query { question, role, deep } => run_query(&service, question, role, deep).await?,
        Command::Cluster => run_cluster(&service).await?,
        Command::Search { query, limit } => run_search(&service, &query, limit).await?,
        Command::MergeSuggestions { threshold, limit } => run_merge_suggestions(&service, threshold, limit)?,
        Command::Merge {
            source,
            target,
            similarity,
        } => run_merge(&service, &source, &target, similarity)?,
        Command::Stats => run_stats(&service)?,
        Command::History(sub) => run_history(&service, sub)?,
    }

    Ok(())
}

fn setup_tracing() {
    use std::io;
    use tracing_subscriber::EnvFilter;

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")))
        .with_writer(io::stderr)
        .with_target(false)
        .init();
}

async fn run_process(service: &NewsGraphService) -> Result<()> {
    let completed = service
        .process_unprocessed_articles(|outcome| match &outcome.result {
            Ok(chunk_count) => println!("{}: completed ({chunk_count} chunks)", outcome.article_id),
            Err(e) => println!("{}: failed ({e})", outcome.article_id),
        })
        .await?;
    println!("processed {completed} article(s)");
    Ok(())
}

async fn run_query(service: &NewsGraphService, question: String, role: Option<String>, deep: bool) -> Result<()> {
    let mut stream = service.query_stream(question, role);
    let mut completed_id = None;
    while let Some(update) = stream.next().await {
        match update {
            PhaseUpdate::Status { message } => eprintln!("[status] {message}"),
            PhaseUpdate::Keywords { keywords } => eprintln!("[keywords] {}", keywords.join(", ")),
            PhaseUpdate::RelatedNodes { nodes } => {
                eprintln!("[related nodes] {} found", nodes.len());
            }
            PhaseUpdate::ReasoningPaths { paths } => {
                eprintln!("[reasoning paths] {} found", paths.len());
            }
            PhaseUpdate::GraphPaths { edges } => {
                eprintln!("[graph edges] {} found", edges.len());
            }
            PhaseUpdate::AnswerToken { text } => print!("{text}"),
            PhaseUpdate::SourceArticles { articles } => {
                eprintln!("\n[sources] {} article(s)", articles.len());
            }
            PhaseUpdate::Completed { response } => {
                println!();
                if deep {
                    completed_id = Some(persist_and_return_id(service, &response)?);
                }
            }
            PhaseUpdate::Failed { message } => {
                anyhow::bail!("graphrag query failed: {message}");
            }
        }
    }

    if let Some(id) = completed_id {
        let result = service.run_deep_analysis(&id).await?;
        println!("\n--- synthesized analysis ---\n{}", result.synthesized_analysis);
        println!("\n--- hypotheses ---\n{}", result.hypotheses);
    }

    Ok(())
}

/// Looks up the just-persisted `query_history` row's id so `--deep` can
/// chain straight into the deep-analysis workflow without the CLI having
/// to thread an id through the streaming loop itself.
fn persist_and_return_id(service: &NewsGraphService, response: &newsgraph_rag::GraphRagResponse) -> Result<String> {
    let recent = service.list_query_history(1)?;
    recent
        .into_iter()
        .find(|entry| entry.query == response.query)
        .map(|entry| entry.id)
        .context("could not locate the just-completed query in history")
}

async fn run_cluster(service: &NewsGraphService) -> Result<()> {
    let report = service
        .run_full_clustering(
            |status| eprintln!("[status] {status}"),
            |done, total| eprintln!("[labeling] {done}/{total}"),
        )
        .await?;
    println!(
        "build {}: {} events, {} clusters, {} noise",
        report.build_id, report.event_count, report.cluster_count, report.noise_count
    );
    for cluster in service.list_clusters(&report.build_id)? {
        println!(
            "  {} ({} events): {}",
            cluster.cluster_id,
            cluster.size,
            cluster.label.as_deref().unwrap_or("(unlabeled)")
        );
    }
    Ok(())
}

async fn run_search(service: &NewsGraphService, query: &str, limit: usize) -> Result<()> {
    let matches = service.search_similar_concepts(query, limit).await?;
    for m in matches {
        println!("{}\t{}\t{:.4}", m.node_id, m.label, m.distance);
    }
    Ok(())
}

fn run_merge_suggestions(service: &NewsGraphService, threshold: f64, limit: usize) -> Result<()> {
    for s in service.get_merge_suggestions(threshold, limit)? {
        println!(
            "{}\t{}\t{}\t{}\t{:.4}",
            s.id1, s.label1, s.id2, s.label2, s.similarity
        );
    }
    Ok(())
}

fn run_merge(service: &NewsGraphService, source: &str, target: &str, similarity: f64) -> Result<()> {
    service.merge_nodes(source, target, similarity)?;
    println!("merged {source} into {target}");
    Ok(())
}

fn run_stats(service: &NewsGraphService) -> Result<()> {
    let stats = service.get_statistics()?;
    println!("nodes: {}", stats.node_count);
    println!("edges: {}", stats.edge_count);
    println!("processed articles: {}", stats.processed_articles);
    println!("embeddings: {}", stats.embedding_count);
    Ok(())
}

fn run_history(service: &NewsGraphService, command: HistoryCommand) -> Result<()> {
    match command {
        HistoryCommand::List { limit } => {
            for entry in service.list_query_history(limit)? {
                println!("{}\t{}\t{}", entry.id, entry.created_at, entry.query);
            }
        }
        HistoryCommand::Show { id } => {
            let entry = service
                .get_query_history(&id)?
                .with_context(|| format!("no query_history row with id {id}"))?;
            println!("query: {}", entry.query);
            println!("answer: {}", entry.answer.unwrap_or_default());
            if let Some(analysis) = entry.synthesized_analysis {
                println!("synthesized analysis: {analysis}");
            }
            if let Some(hypotheses) = entry.hypotheses {
                println!("hypotheses: {hypotheses}");
            }
        }
        HistoryCommand::Delete { id } => {
            service.delete_query_history(&id)?;
            println!("deleted {id}");
        }
    }
    Ok(())
}
