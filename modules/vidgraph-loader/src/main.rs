use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{Context, Result};
use futures::future::try_join_all;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use vidgraph_common::{Config, VIDEO_LABEL};
use vidgraph_graph::{
    migrate, Aggregator, GraphClient, IngestPipeline, LoadStats, Neo4jStore, PageRanker,
};

const TOP_N: usize = 10;

struct Args {
    files: Vec<PathBuf>,
    clear: bool,
    json: bool,
}

/// Usage: vidgraph-loader [--clear] [--json] <file.csv>...
fn parse_args() -> Result<Args> {
    let mut args = Args {
        files: Vec::new(),
        clear: false,
        json: false,
    };
    for arg in std::env::args().skip(1) {
        match arg.as_str() {
            "--clear" => args.clear = true,
            "--json" => args.json = true,
            flag if flag.starts_with("--") => anyhow::bail!("unknown flag {flag}"),
            path => args.files.push(PathBuf::from(path)),
        }
    }
    anyhow::ensure!(
        !args.files.is_empty(),
        "usage: vidgraph-loader [--clear] [--json] <file.csv>..."
    );
    Ok(args)
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env().add_directive("vidgraph=info".parse()?))
        .init();

    info!("Video graph loader starting...");

    let args = parse_args()?;
    let config = Config::from_env()?;
    config.log_redacted();

    let client = GraphClient::from_config(&config).await?;
    let outcome = run(&client, &config, &args).await;
    client.close();
    outcome
}

async fn run(client: &GraphClient, config: &Config, args: &Args) -> Result<()> {
    migrate(client).await?;

    let store = Arc::new(Neo4jStore::new(client.clone()));
    let mut pipeline = IngestPipeline::new(store.clone());
    if args.clear {
        pipeline.clear().await?;
    }

    let files = try_join_all(args.files.iter().cloned().map(|path| async move {
        tokio::task::spawn_blocking(move || read_records(&path))
            .await
            .context("CSV reader task failed")?
    }))
    .await?;
    let expected: u64 = files.iter().map(|records| records.len() as u64).sum();

    let per_file = try_join_all(
        files
            .into_iter()
            .map(|records| pipeline.load_records(records)),
    )
    .await?;
    let mut loaded = LoadStats::default();
    for stats in per_file {
        loaded += stats;
    }
    info!(
        created = loaded.created,
        updated = loaded.updated,
        rejected = loaded.rejected,
        "Nodes loaded"
    );

    let links = pipeline.link_related_edges().await?;
    let report = pipeline.validate(expected - loaded.rejected).await?;

    let cancel = CancellationToken::new();
    let on_interrupt = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            warn!("Interrupt received, stopping PageRank");
            on_interrupt.cancel();
        }
    });

    let ranker = PageRanker::new(store.clone(), config.pagerank)?;
    let result = ranker.run(cancel).await?;
    if !result.converged {
        warn!(
            iterations = result.iterations,
            max_delta = result.max_delta,
            "PageRank did not converge; writing best effort scores"
        );
    }
    ranker.write_back(&result).await?;
    let top = result.top_k(TOP_N)?;

    let degrees = Aggregator::new(store).degree_stats(VIDEO_LABEL).await?;

    if args.json {
        let summary = serde_json::json!({
            "created": loaded.created,
            "updated": loaded.updated,
            "rejected": loaded.rejected,
            "edges_created": links.edges_created,
            "broken_references": links.broken_reference_count,
            "nodes": report.actual,
            "pagerank": {
                "iterations": result.iterations,
                "converged": result.converged,
                "top": top,
            },
            "degrees": {
                "outgoing": degrees.outgoing,
                "incoming": degrees.incoming,
                "total": degrees.total,
            },
        });
        println!("{}", serde_json::to_string_pretty(&summary)?);
        return Ok(());
    }

    println!("\n=== Top {TOP_N} videos by PageRank ===");
    for (i, (id, score)) in top.iter().enumerate() {
        println!("{:>2}. {id}  {score:.6}", i + 1);
    }
    println!(
        "\nNodes: {}  |  Edges: {}  |  Broken references: {}  |  Rejected rows: {}",
        report.actual,
        links.edges_created + links.edges_existing,
        links.broken_reference_count,
        loaded.rejected
    );
    println!(
        "Out-degree avg {:.2} max {}  |  In-degree avg {:.2} max {}",
        degrees.outgoing.avg, degrees.outgoing.max, degrees.incoming.avg, degrees.incoming.max
    );

    Ok(())
}

/// Read every data row of a CSV file as raw strings. The header row is
/// skipped; short or long rows are left for row validation to reject.
fn read_records(path: &Path) -> Result<Vec<Vec<String>>> {
    let mut reader = csv::ReaderBuilder::new()
        .has_headers(true)
        .flexible(true)
        .from_path(path)
        .with_context(|| format!("failed to open {}", path.display()))?;

    let mut records = Vec::new();
    for record in reader.records() {
        let record = record.with_context(|| format!("failed to read {}", path.display()))?;
        records.push(record.iter().map(|field| field.trim().to_string()).collect());
    }
    info!(path = %path.display(), rows = records.len(), "CSV read");
    Ok(records)
}
