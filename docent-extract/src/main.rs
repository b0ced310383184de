use std::path::PathBuf;
use std::process;
use std::sync::Arc;

use anyhow::{Context, Result, bail};
use clap::{Parser, Subcommand};

use docent_extract::artifact::ArtifactStore;
use docent_extract::config::ExtractConfig;
use docent_extract::extract::client::{ExtractionClient, HttpChatBackend};
use docent_extract::extract::pipeline::{ExtractionPipeline, PipelineConfig};
use docent_extract::repo::registry::RepoRegistry;
use docent_extract::repo::sync::sync_repositories;
use docent_extract::repo::Repository;
use docent_extract::select::scan_source_files;
use docent_extract::tokens::{HfTokenCounter, TokenCounter, select_work_items, token_report};

/// A CLI tool to sync repositories and extract code descriptions.
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Path to the configuration file
    #[arg(short, long, default_value = "docent.toml")]
    config: PathBuf,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Clone or update the configured repositories
    Sync,
    /// Print per-file token counts for a synced repository
    Tokens {
        /// Repository selector as group/name
        repo: String,
    },
    /// Run the extraction pipeline over synced repositories
    Extract {
        /// Only process this repository (group/name); all when omitted
        #[arg(long)]
        repo: Option<String>,
        /// Cap the number of files dispatched per repository
        #[arg(long)]
        max_files: Option<usize>,
        /// Override the configured concurrency limit
        #[arg(long)]
        concurrency: Option<usize>,
    },
    /// Summarize the artifacts currently on disk
    Corpus,
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
    let config = ExtractConfig::load_or_default(&args.config)?;

    match args.command {
        Commands::Sync => {
            let mut registry = RepoRegistry::load(&config.data_dir);
            let synced = sync_repositories(
                &mut registry,
                &config.repositories,
                &config.data_dir,
                config.pipeline.sync_workers,
            )
            .await?;

            println!("Synced repositories:");
            for repo in &synced {
                println!("- {} at {}", repo.selector(), repo.repo_path.display());
            }
            Ok(())
        }

        Commands::Tokens { repo } => {
            let registry = RepoRegistry::load(&config.data_dir);
            let repository = registry
                .find(&repo)
                .with_context(|| format!("repository {repo} is not in the registry; run sync first"))?;
            let counter = token_counter(&config)?;

            let files = scan_source_files(&repository.repo_path)?;
            let items = select_work_items(
                &files.source,
                &repository.repo_path,
                counter.as_ref(),
                config.token_limit,
            );
            let (rows, total) = token_report(&items);

            println!("Token counts for repository: {}", repository.selector());
            for (path, tokens) in rows {
                println!("{} {tokens} tokens", path.display());
            }
            println!("\nTotal tokens: {total}");
            Ok(())
        }

        Commands::Extract {
            repo,
            max_files,
            concurrency,
        } => {
            let registry = RepoRegistry::load(&config.data_dir);
            let repositories = selected_repositories(&registry, repo.as_deref())?;
            let counter = token_counter(&config)?;

            let mut backend =
                HttpChatBackend::new(&config.model.base_url, &config.model.name)
                    .context("building the model client")?;
            if let Some(api_key) = config.model.api_key() {
                backend = backend.with_api_key(api_key);
            }
            let client = ExtractionClient::new(Arc::new(backend))
                .with_retries(config.pipeline.retries)
                .with_delay(config.pipeline.delay());

            let pipeline_config = PipelineConfig::default()
                .with_concurrency(concurrency.unwrap_or(config.pipeline.concurrency))
                .with_max_files(max_files);
            let store = ArtifactStore::new(&config.output_dir);
            let pipeline = ExtractionPipeline::new(client, store, pipeline_config);

            for repository in repositories {
                let files = scan_source_files(&repository.repo_path)?;
                let items = select_work_items(
                    &files.source,
                    &repository.repo_path,
                    counter.as_ref(),
                    config.token_limit,
                );

                println!(
                    "Extracting {} ({} files selected)",
                    repository.selector(),
                    items.len()
                );
                let summary = pipeline.run(&repository, items).await;
                println!(
                    "  dispatched: {} | function artifacts: {} | file artifacts: {} | records kept: {} | dropped: {} | failed steps: {}",
                    summary.files_dispatched,
                    summary.function_artifacts,
                    summary.file_artifacts,
                    summary.records_kept,
                    summary.records_dropped,
                    summary.failed_steps,
                );
            }
            Ok(())
        }

        Commands::Corpus => {
            let store = ArtifactStore::new(&config.output_dir);
            let corpus = store.read_corpus().await?;
            println!("Corpus under {}:", store.root().display());
            println!("  file records: {}", corpus.file_records.len());
            println!("  function records: {}", corpus.function_records.len());
            Ok(())
        }
    }
}

fn token_counter(config: &ExtractConfig) -> Result<Box<dyn TokenCounter>> {
    let Some(path) = &config.tokenizer_file else {
        bail!("tokenizer_file is not set in the configuration");
    };
    Ok(Box::new(HfTokenCounter::from_file(path)?))
}

fn selected_repositories(
    registry: &RepoRegistry,
    selector: Option<&str>,
) -> Result<Vec<Repository>> {
    match selector {
        Some(selector) => {
            let repository = registry.find(selector).with_context(|| {
                format!("repository {selector} is not in the registry; run sync first")
            })?;
            Ok(vec![repository])
        }
        None => {
            let repositories = registry.repositories();
            if repositories.is_empty() {
                bail!("no repositories in the registry; run sync first");
            }
            Ok(repositories)
        }
    }
}
