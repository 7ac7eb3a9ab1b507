use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Context;
use clap::{Parser, Subcommand};
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tracing::info;
use tracing_subscriber::{fmt, EnvFilter};

use scandoc_core::chunker::Chunker;
use scandoc_core::config::{Config, Settings};
use scandoc_core::corpus::FileCorpus;
use scandoc_core::types::QueryRequest;
use scandoc_gateway::{embedder_from_settings, generator_from_settings, token_counter_from_settings};
use scandoc_rag::{PromptTemplate, QueryService};
use scandoc_vector::{IndexBuilder, StartupReport};

/// Answer questions about a document corpus with retrieval-augmented generation.
#[derive(Parser)]
#[command(name = "scandoc", version, about, long_about = None)]
struct Cli {
    /// Config file; defaults to config.toml + config.<RUST_ENV>.toml in the working directory.
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Load the index snapshot, or build it from the corpus if there is none.
    Index,
    /// Show the chunks most similar to a query.
    Search {
        query: String,
        #[arg(short, long)]
        k: Option<usize>,
    },
    /// Answer one question.
    Ask {
        message: String,
        #[arg(short, long)]
        k: Option<usize>,
    },
    /// Answer questions read line by line from stdin.
    Chat,
}

fn init_logging(settings: &Settings) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&settings.logging.level));
    fmt().with_env_filter(filter).with_target(false).with_writer(std::io::stderr).init();
}

async fn start(settings: &Settings) -> anyhow::Result<(QueryService, StartupReport)> {
    let embedder = embedder_from_settings(&settings.gateway)?;
    let generator = generator_from_settings(&settings.gateway)?;
    let tokens = token_counter_from_settings(&settings.gateway)?;

    let template = match &settings.retrieval.template_path {
        Some(path) => PromptTemplate::from_file(path)?,
        None => PromptTemplate::default(),
    };
    let service = QueryService::new(embedder.clone(), generator, template)
        .top_k(settings.retrieval.top_k)
        .timeout(settings.gateway.timeout())
        .similarity_threshold(settings.retrieval.similarity_threshold);

    let corpus = FileCorpus::new(&settings.corpus.path, settings.corpus.extensions.clone());
    let builder = IndexBuilder::new(
        &settings.index.snapshot_path,
        Arc::new(corpus),
        Chunker::new(settings.chunking.clone(), tokens),
        embedder,
    )
    .batch_size(settings.index.embed_batch_size)
    .timeout(settings.gateway.timeout())
    .progress(settings.index.progress);

    let report = service.start(&builder).await.context("index startup failed")?;
    Ok((service, report))
}

fn print_report(report: &StartupReport) {
    match report {
        StartupReport::Loaded { entries } => println!("📂 Loaded {} chunks from snapshot", entries),
        StartupReport::Built { documents, chunks, dropped_tokens } => {
            println!("📊 Indexed {} chunks from {} documents", chunks, documents);
            if *dropped_tokens > 0 {
                println!("⚠️  {} tokens past the per-document chunk limit were not indexed", dropped_tokens);
            }
        }
    }
}

async fn chat(service: &QueryService) -> anyhow::Result<()> {
    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    let mut stdout = tokio::io::stdout();
    loop {
        stdout.write_all(b"> ").await?;
        stdout.flush().await?;
        let Some(line) = lines.next_line().await? else { break };
        let message = line.trim();
        if message.is_empty() { continue; }
        if matches!(message, "exit" | "quit") { break; }
        match service.handle(QueryRequest { message: message.to_string() }).await {
            Ok(response) => println!("{}\n", response.answer),
            Err(e) => eprintln!("❌ {}", e),
        }
    }
    Ok(())
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    let config = match &cli.config {
        Some(path) => Config::from_file(path)?,
        None => Config::load()?,
    };
    let settings = config.settings()?;
    init_logging(&settings);
    info!(corpus = %settings.corpus.path.display(), snapshot = %settings.index.snapshot_path.display(), "starting");

    let (service, report) = start(&settings).await?;
    match cli.command {
        Command::Index => print_report(&report),
        Command::Search { query, k } => {
            let result = service.search(&query, k).await?;
            println!("🔍 Found {} results for: \"{}\"", result.len(), query);
            for (i, hit) in result.hits.iter().enumerate() {
                println!("\n  {}. score={:.4}  id={}", i + 1, hit.score, hit.chunk.id);
                println!("     📝 {}", hit.chunk.text);
            }
        }
        Command::Ask { message, k } => {
            let answer = service.ask(&message, k).await?;
            println!("{}", answer);
        }
        Command::Chat => chat(&service).await?,
    }
    Ok(())
}
