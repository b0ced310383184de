use std::path::PathBuf;
use std::process;
use std::sync::Arc;

use anyhow::Result;
use clap::{Parser, Subcommand};

use docent_extract::artifact::ArtifactStore;
use docent_index::indexer::VectorIndex;
use docent_index::provider::{EmbeddingProvider, HashEmbeddingProvider, RemoteEmbeddingProvider};
use docent_index::store::RecordStore;

/// A CLI tool to embed extracted code descriptions and search them.
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Path to the index database
    #[arg(long, default_value = "docent-index.db")]
    db: PathBuf,

    /// Base URL of an OpenAI-compatible embeddings endpoint
    #[arg(long, default_value = "http://localhost:8000/v1")]
    base_url: String,

    /// Embedding model identifier
    #[arg(long, default_value = "nomic-ai/nomic-embed-text-v1")]
    model: String,

    /// Embedding dimension
    #[arg(long, default_value_t = 768)]
    dimension: usize,

    /// Environment variable holding the embedding API key
    #[arg(long, default_value = "DOCENT_API_KEY")]
    api_key_env: String,

    /// Use deterministic hash embeddings instead of the remote endpoint
    #[arg(long)]
    hash_embeddings: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Read the artifact tree and (re)build the index
    Load {
        /// Output root written by the extraction pipeline
        #[arg(default_value = "./output")]
        output_root: PathBuf,
    },
    /// Search function descriptions
    SearchFunctions {
        query: String,
        /// Maximum number of results
        #[arg(short, long, default_value_t = 5)]
        limit: usize,
    },
    /// Search file descriptions
    SearchFiles {
        query: String,
        /// Maximum number of results
        #[arg(short, long, default_value_t = 5)]
        limit: usize,
    },
    /// Show index statistics
    Stats,
}

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    if let Err(e) = run().await {
        eprintln!("Error: {e:#}");
        process::exit(1);
    }
}

async fn run() -> Result<()> {
    let args = Args::parse();

    let provider: Arc<dyn EmbeddingProvider> = if args.hash_embeddings {
        Arc::new(HashEmbeddingProvider::new(args.dimension))
    } else {
        let mut provider =
            RemoteEmbeddingProvider::new(&args.base_url, &args.model, args.dimension)?;
        if let Ok(api_key) = std::env::var(&args.api_key_env) {
            provider = provider.with_api_key(api_key);
        }
        Arc::new(provider)
    };

    let store = RecordStore::open(&args.db).await?;
    let index = VectorIndex::new(store, provider);

    match args.command {
        Commands::Load { output_root } => {
            let corpus = ArtifactStore::new(&output_root).read_corpus().await?;
            let summary = index.load_corpus(&corpus).await?;
            println!(
                "Loaded {} function records and {} file records (dimension {})",
                summary.function_records, summary.file_records, summary.dimension
            );
            Ok(())
        }

        Commands::SearchFunctions { query, limit } => {
            let hits = index.search_functions(&query, limit).await?;
            println!("Found {} function descriptions:", hits.len());
            for hit in hits {
                let qualified = if hit.class_name.is_empty() {
                    hit.function_name.clone()
                } else {
                    format!("{}.{}", hit.class_name, hit.function_name)
                };
                println!(
                    "  {:.3} | {} | {} | {}",
                    hit.similarity, hit.repo_name, hit.filepath, qualified
                );
                println!("        {}", hit.text);
            }
            Ok(())
        }

        Commands::SearchFiles { query, limit } => {
            let hits = index.search_files(&query, limit).await?;
            println!("Found {} file descriptions:", hits.len());
            for hit in hits {
                println!(
                    "  {:.3} | {} | {}",
                    hit.similarity, hit.repo_name, hit.filepath
                );
                println!("        {}", hit.overall_purpose_and_domain);
            }
            Ok(())
        }

        Commands::Stats => {
            let stats = index.store().stats().await?;
            println!("Index statistics:");
            println!("  function records: {}", stats.function_records);
            println!("  file records: {}", stats.file_records);
            Ok(())
        }
    }
}
