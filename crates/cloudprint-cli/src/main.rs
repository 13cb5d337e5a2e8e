//! Cloudprint CLI: run the ingestion pipeline and its building blocks on local files.
//!
//! Configuration comes from the environment (and `.env`); see `PipelineConfig`.

use anyhow::{bail, Context};
use clap::{Parser, Subcommand};
use cloudprint_cli::{build_runtime, guess_content_type, init_tracing, report_error, strategy};
use cloudprint_core::constants::HASH_CHUNK_SIZE;
use cloudprint_core::Config;
use cloudprint_pipeline::stage_error;
use cloudprint_processing::{hash_stream, FileFormat, PageSource, PreviewNormalizer, PreviewOutcome};
use serde::Serialize;
use std::path::{Path, PathBuf};

#[derive(Parser)]
#[command(name = "cloudprint", about = "Cloudprint file ingestion pipeline")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Ingest a file through the full pipeline and print the final record
    Ingest {
        /// Path to the file to ingest
        file: PathBuf,
        /// Owner id recorded on the file
        #[arg(long, default_value = "1")]
        owner: i64,
        /// Declared content type (guessed from the extension when omitted)
        #[arg(long)]
        content_type: Option<String>,
        /// Reject spreadsheets and unknown formats instead of estimating
        #[arg(long)]
        strict: bool,
    },
    /// Count the printable pages of a file
    Count {
        file: PathBuf,
        /// Reject spreadsheets and unknown formats instead of estimating
        #[arg(long)]
        strict: bool,
    },
    /// Print the SHA-256 content digest of a file
    Hash { file: PathBuf },
    /// Write the PDF preview of a file
    Preview {
        file: PathBuf,
        /// Where to write the preview PDF
        #[arg(long)]
        out: PathBuf,
    },
}

#[derive(Serialize)]
struct CountOutput<'a> {
    file: &'a str,
    format: String,
    strategy: &'static str,
    pages: u32,
}

#[derive(Serialize)]
struct HashOutput<'a> {
    file: &'a str,
    digest: String,
}

#[derive(Serialize)]
struct PreviewOutput<'a> {
    file: &'a str,
    out: &'a str,
    note: Option<&'a str>,
}

fn print_json(value: &impl Serialize) -> anyhow::Result<()> {
    let out = serde_json::to_string_pretty(value).context("Serialize output")?;
    println!("{}", out);
    Ok(())
}

fn display_name(path: &Path) -> anyhow::Result<String> {
    path.file_name()
        .and_then(|n| n.to_str())
        .map(str::to_string)
        .with_context(|| format!("Invalid file name: {}", path.display()))
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    init_tracing();

    let cli = Cli::parse();

    match cli.command {
        Commands::Ingest {
            file,
            owner,
            content_type,
            strict,
        } => {
            let config = Config::from_env().context("Invalid configuration")?;
            let runtime = build_runtime(&config, strict).await?;

            let resumed = runtime
                .pipeline
                .resume_incomplete()
                .await
                .map_err(stage_error)?;
            for handle in resumed {
                if let Err(e) = handle.wait().await {
                    tracing::warn!(error = %e, "Resumed job did not complete");
                }
            }

            let name = display_name(&file)?;
            let content = tokio::fs::read(&file)
                .await
                .with_context(|| format!("Failed to read {}", file.display()))?;
            let content_type =
                content_type.unwrap_or_else(|| guess_content_type(&name).to_string());

            let receipt = match runtime
                .service
                .ingest_tracked(content, &name, &content_type, owner)
                .await
            {
                Ok(receipt) => receipt,
                Err(e) => bail!("{}", report_error(&e)),
            };

            receipt.analysis.wait().await?.map_err(stage_error)?;
            if let Some(preview) = receipt.preview {
                preview.wait().await?.map_err(stage_error)?;
            }

            let record = runtime.service.get_status(receipt.id).await?;
            print_json(&record)?;
            runtime.pipeline.pool().shutdown().await;
        }
        Commands::Count { file, strict } => {
            let name = display_name(&file)?;
            let bytes = tokio::fs::read(&file)
                .await
                .with_context(|| format!("Failed to read {}", file.display()))?;
            let format = FileFormat::from_filename(&name);
            let counter = strategy(strict);
            let pages = tokio::task::spawn_blocking({
                let counter = counter.clone();
                move || counter.count(format, PageSource::Bytes(&bytes))
            })
            .await??;
            print_json(&CountOutput {
                file: &name,
                format: format.to_string(),
                strategy: counter.name(),
                pages,
            })?;
        }
        Commands::Hash { file } => {
            let name = display_name(&file)?;
            let handle = tokio::fs::File::open(&file)
                .await
                .with_context(|| format!("Failed to open {}", file.display()))?;
            let stream = tokio_util::io::ReaderStream::with_capacity(handle, HASH_CHUNK_SIZE);
            let digest = hash_stream(stream).await?;
            print_json(&HashOutput {
                file: &name,
                digest,
            })?;
        }
        Commands::Preview { file, out } => {
            let name = display_name(&file)?;
            let bytes = tokio::fs::read(&file)
                .await
                .with_context(|| format!("Failed to read {}", file.display()))?;
            let format = FileFormat::from_filename(&name);
            let outcome = tokio::task::spawn_blocking({
                let name = name.clone();
                move || {
                    PreviewNormalizer::new()
                        .normalize(format, &bytes, &name)
                        .map(|outcome| (outcome, bytes))
                }
            })
            .await??;

            let note = outcome.0.note().map(str::to_string);
            let document = match outcome {
                (PreviewOutcome::PassThrough, original) => original,
                (PreviewOutcome::Rendered(pdf), _) => pdf,
                (PreviewOutcome::Failed { pdf, .. }, _) => pdf,
            };
            tokio::fs::write(&out, document)
                .await
                .with_context(|| format!("Failed to write {}", out.display()))?;

            let out_display = out.display().to_string();
            print_json(&PreviewOutput {
                file: &name,
                out: &out_display,
                note: note.as_deref(),
            })?;
        }
    }

    Ok(())
}
