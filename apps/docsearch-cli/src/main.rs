//! `docsearch`: ingest, search and ask questions over a local document store.
//!
//! Results are printed as JSON on stdout; logs go to stderr.
use std::path::Path;
use std::process::ExitCode;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use indicatif::{ProgressBar, ProgressStyle};
use serde::Serialize;
use tracing_subscriber::EnvFilter;

use docsearch_core::config::Config;
use docsearch_core::loader::DirectoryLoader;
use docsearch_core::types::DocumentDraft;
use docsearch_core::{OperationError, SearchOperation};
use docsearch_embed::load_embedder;
use docsearch_engine::{AudioUpload, Collaborators, SearchService};
use docsearch_gateway::{HttpTranscriber, OllamaGenerator};
use docsearch_store::LocalDocumentStore;

mod args;

use args::{Command, USAGE};

#[derive(Serialize)]
struct ErrorOutput<'a> {
    error: String,
    client_error: bool,
    telemetry: &'a SearchOperation,
}

#[derive(Serialize)]
struct BatchSummary {
    ingested: usize,
    ids: Vec<String>,
}

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn,docsearch=info"));
    tracing_subscriber::fmt().with_env_filter(filter).with_target(false).with_writer(std::io::stderr).init();
}

fn print_json<T: Serialize>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

#[tokio::main]
async fn main() -> ExitCode {
    init_tracing();
    let argv: Vec<String> = std::env::args().skip(1).collect();
    let command = match args::parse(&argv) {
        Ok(c) => c,
        Err(e) => {
            eprintln!("Error: {e}\n\n{USAGE}");
            return ExitCode::from(2);
        }
    };
    match run(command).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            if let Some(op) = e.downcast_ref::<OperationError>() {
                let out = ErrorOutput { error: op.to_string(), client_error: op.is_client_error(), telemetry: &op.telemetry };
                if let Ok(json) = serde_json::to_string_pretty(&out) {
                    println!("{json}");
                }
                eprintln!("Error: {op}");
                return ExitCode::from(if op.is_client_error() { 2 } else { 1 });
            }
            eprintln!("Error: {e:#}");
            ExitCode::from(1)
        }
    }
}

async fn run(command: Command) -> Result<()> {
    let config = Config::load().context("loading configuration")?;
    let settings = config.settings()?;
    let base = std::env::current_dir()?;

    let store = Arc::new(LocalDocumentStore::open(&settings, &base).await.context("opening document store")?);
    if let Command::BuildIndex = command {
        let params = store.build_vector_index(&settings.vector.index_name).await?;
        tracing::info!(index = %settings.vector.index_name, partitions = params.num_partitions, "vector index built");
        return print_json(&serde_json::json!({
            "index": settings.vector.index_name,
            "num_partitions": params.num_partitions,
            "num_sub_vectors": params.num_sub_vectors,
        }));
    }

    let embedder = load_embedder(&settings.embedding)?;
    let generator = Arc::new(OllamaGenerator::new(&settings.generation)?);
    let transcriber = Arc::new(HttpTranscriber::new(&settings.transcription)?);
    let service = SearchService::new(
        Collaborators { store, embedder, generator, transcriber: Some(transcriber) },
        settings,
    );

    match command {
        Command::Ingest { title, body, tags } => {
            print_json(&service.ingest(DocumentDraft::new(title, body).with_tags(tags)).await?)
        }
        Command::IngestAudio { file, language, title, tags } => {
            let bytes = tokio::fs::read(&file).await.with_context(|| format!("reading {}", file.display()))?;
            let file_name = file.file_name().map_or_else(|| file.display().to_string(), |n| n.to_string_lossy().into_owned());
            let upload = AudioUpload { bytes, file_name, language, title, tags };
            print_json(&service.ingest_audio(upload).await?)
        }
        Command::IngestDir { dir, limit } => ingest_dir(&service, &dir, limit).await,
        Command::List { limit, order } => print_json(&service.list_documents(limit, order).await?),
        Command::Search { query } => print_json(&service.search_lexical(&query).await?),
        Command::Semantic { query, limit, strict } => print_json(&service.search_semantic(&query, limit, strict).await?),
        Command::Chat { question, docs, system, timeout_secs } => {
            let answer = service.chat(&question, docs, system.as_deref(), timeout_secs.map(Duration::from_secs)).await?;
            print_json(&answer)
        }
        Command::Health => print_json(&service.health_probe().await),
        Command::BuildIndex => Ok(()),
    }
}

async fn ingest_dir(service: &SearchService, dir: &Path, limit: Option<usize>) -> Result<()> {
    let loader = limit.map_or_else(DirectoryLoader::new, DirectoryLoader::with_limit);
    let drafts = loader.load(dir)?;
    let pb = ProgressBar::new(drafts.len() as u64);
    pb.set_style(
        ProgressStyle::default_bar()
            .template("{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} documents ({percent}%) {msg}")?
            .progress_chars("#>-"),
    );
    let mut ids = Vec::with_capacity(drafts.len());
    for draft in drafts {
        pb.set_message(draft.title.clone());
        let receipt = service.ingest(draft).await?;
        ids.push(receipt.document.id);
        pb.inc(1);
    }
    pb.finish_with_message("done");
    print_json(&BatchSummary { ingested: ids.len(), ids })
}
