use std::path::{Path, PathBuf};

use anyhow::{Context, Result, anyhow};
use clap::{Parser, Subcommand};
use doclens::model::TenantKey;
use doclens::pipeline::{DocumentApi, DocumentService, SourceFile, SourceKind};
use doclens::{config, logging};
use walkdir::WalkDir;

#[derive(Parser)]
#[command(
    name = "doclens-admin",
    about = "Operator commands for a doclens deployment"
)]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Ingest every PDF and image under a directory as one batch.
    Ingest {
        #[arg(long)]
        tenant: String,
        dir: PathBuf,
    },
    /// Remove a tenant's indexed chunks and stored documents.
    PurgeTenant {
        #[arg(long)]
        tenant: String,
    },
    /// Answer a question from a tenant's corpus.
    Ask {
        #[arg(long)]
        tenant: String,
        /// Restrict retrieval to these documents; repeatable.
        #[arg(long = "document")]
        documents: Vec<String>,
        question: String,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let config = config::init_config().context("Failed to load configuration")?;
    logging::init_tracing();

    let service = DocumentService::connect(config)
        .await
        .context("Failed to initialize document service")?;

    let outcome = run(&service, cli.command).await;
    service
        .shutdown()
        .await
        .context("Failed to flush stores")?;
    outcome
}

async fn run(service: &DocumentService, command: Command) -> Result<()> {
    match command {
        Command::Ingest { tenant, dir } => {
            let tenant = tenant_key(&tenant)?;
            let files = collect_sources(&dir).await?;
            if files.is_empty() {
                println!("No PDF or image files under {}", dir.display());
                return Ok(());
            }
            let submitted = files.len();
            let ingested = service
                .upload_files(&tenant, files)
                .await
                .context("Ingestion failed")?;
            for filename in &ingested {
                println!("{filename}");
            }
            println!("Ingested {} of {submitted} files for {tenant}", ingested.len());
        }
        Command::PurgeTenant { tenant } => {
            let tenant = tenant_key(&tenant)?;
            let removed = service
                .purge_tenant(&tenant)
                .await
                .context("Purge failed")?;
            println!("Removed {removed} documents for {tenant}");
        }
        Command::Ask {
            tenant,
            documents,
            question,
        } => {
            let tenant = tenant_key(&tenant)?;
            let filter = (!documents.is_empty()).then_some(documents);
            let answer = service
                .query(&tenant, &question, filter)
                .await
                .context("Query failed")?;
            println!("{}", answer.response);
            for chunk in &answer.documents {
                println!(
                    "  [{}, page {}, paragraph {}] score {:.3}",
                    chunk.filename, chunk.page, chunk.paragraph, chunk.score
                );
            }
        }
    }
    Ok(())
}

fn tenant_key(raw: &str) -> Result<TenantKey> {
    TenantKey::new(raw).map_err(|error| anyhow!("Invalid --tenant: {error}"))
}

/// Supported files under `dir`, sorted by path; everything else is skipped.
async fn collect_sources(dir: &Path) -> Result<Vec<SourceFile>> {
    let mut paths = Vec::new();
    for entry in WalkDir::new(dir) {
        let entry = entry.with_context(|| format!("Failed to walk {}", dir.display()))?;
        if !entry.file_type().is_file() {
            continue;
        }
        let supported = SourceKind::from_filename(&entry.file_name().to_string_lossy()).is_some();
        if supported {
            paths.push(entry.into_path());
        } else {
            tracing::debug!(path = %entry.path().display(), "Skipping unsupported file");
        }
    }
    paths.sort();

    let mut files = Vec::with_capacity(paths.len());
    for path in paths {
        let bytes = tokio::fs::read(&path)
            .await
            .with_context(|| format!("Failed to read {}", path.display()))?;
        let filename = path
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .unwrap_or_default();
        files.push(SourceFile::new(filename, bytes));
    }
    Ok(files)
}
