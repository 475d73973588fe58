use case_search_core::{
    CohereEmbedder, CohereSummarizer, ChunkStore, EmbeddingProvider, IngestionOptions,
    IngestionPipeline, LopdfExtractor, RetryPolicy, SearchRequest, SummaryOptions,
    SummaryPipeline, Summarizer, SupabaseStore, DEFAULT_CHUNK_CHARS, DEFAULT_TOP_K,
    SUMMARY_CHUNK_CHARS,
};
use chrono::Utc;
use clap::{Parser, Subcommand};
use std::path::Path;
use std::sync::Arc;
use tracing::{info, warn};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

#[derive(Parser)]
#[command(name = "case-search", version)]
struct Cli {
    #[command(subcommand)]
    command: Command,

    /// Supabase project base URL
    #[arg(long, env = "SUPABASE_URL")]
    supabase_url: String,

    /// Supabase service key
    #[arg(long, env = "SUPABASE_SERVICE_KEY", hide_env_values = true)]
    supabase_key: String,

    /// Embedding API base URL
    #[arg(long, env = "COHERE_API_URL", default_value = "https://api.cohere.com")]
    cohere_url: String,

    /// Embedding API key
    #[arg(long, env = "COHERE_API_KEY", hide_env_values = true)]
    cohere_key: String,

    /// Embedding model
    #[arg(long, default_value = "embed-english-v3.0")]
    embed_model: String,

    /// Embedding vector dimensionality for the chosen model
    #[arg(long, default_value = "1024")]
    embed_dimensions: usize,

    /// Retries on top of the first attempt for transient embedding errors
    #[arg(long, default_value = "3")]
    embed_max_retries: u32,

    /// Generation model used by `summarize`
    #[arg(long, default_value = "command")]
    summary_model: String,
}

#[derive(Subcommand)]
enum Command {
    /// Create a new case container.
    CreateCase {
        /// Case title
        #[arg(long)]
        title: String,
    },
    /// List all cases.
    Cases,
    /// Ingest one PDF, or every PDF under a folder, into a case.
    Ingest {
        /// Case to ingest into
        #[arg(long)]
        case_id: String,
        /// PDF file or folder of PDFs
        #[arg(long)]
        path: String,
        /// Maximum characters per chunk
        #[arg(long, default_value_t = DEFAULT_CHUNK_CHARS)]
        chunk_max_chars: usize,
    },
    /// Semantic search over stored chunks.
    Search {
        /// Search query
        #[arg(long)]
        query: String,
        /// Limit candidates to one case
        #[arg(long)]
        case_id: Option<String>,
        /// Number of hits to return
        #[arg(long, default_value_t = DEFAULT_TOP_K)]
        top_k: usize,
    },
    /// Summarize a PDF into concise legal points.
    Summarize {
        /// PDF file to summarize
        #[arg(long)]
        path: String,
        /// Maximum characters per summarized chunk
        #[arg(long, default_value_t = SUMMARY_CHUNK_CHARS)]
        chunk_max_chars: usize,
    },
    /// Delete a case and, cascading, its files and chunks.
    DeleteCase {
        #[arg(long)]
        case_id: String,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let app_version = env!("CARGO_PKG_VERSION");

    tracing_subscriber::registry()
        .with(EnvFilter::from_default_env())
        .with(fmt::layer())
        .init();

    let cli = Cli::parse();

    let store: Arc<dyn ChunkStore> = Arc::new(
        SupabaseStore::new(&cli.supabase_url, &cli.supabase_key)
            .map_err(|error| anyhow::anyhow!(error.to_string()))?,
    );
    let provider: Arc<dyn EmbeddingProvider> = Arc::new(
        CohereEmbedder::new(
            &cli.cohere_url,
            &cli.cohere_key,
            &cli.embed_model,
            cli.embed_dimensions,
        )
        .map_err(|error| anyhow::anyhow!(error.to_string()))?
        .with_retry_policy(RetryPolicy {
            max_retries: cli.embed_max_retries,
            ..RetryPolicy::default()
        }),
    );

    info!(
        version = app_version,
        started_at = %Utc::now().to_rfc3339(),
        "case-search boot"
    );

    match cli.command {
        Command::CreateCase { title } => {
            let case = store
                .create_case(&title)
                .await
                .map_err(|error| anyhow::anyhow!(error.to_string()))?;
            println!("created case {} ({})", case.id, case.title);
        }
        Command::Cases => {
            let cases = store
                .list_cases()
                .await
                .map_err(|error| anyhow::anyhow!(error.to_string()))?;
            for case in cases {
                println!(
                    "{}  {}  created_at={}",
                    case.id,
                    case.title,
                    case.created_at.to_rfc3339()
                );
            }
        }
        Command::Ingest {
            case_id,
            path,
            chunk_max_chars,
        } => {
            let pipeline = IngestionPipeline::new(
                LopdfExtractor,
                provider,
                store,
                IngestionOptions { chunk_max_chars },
            )
            .map_err(|error| anyhow::anyhow!(error.to_string()))?;

            let target = Path::new(&path);
            if target.is_dir() {
                let report = pipeline
                    .ingest_folder(&case_id, target)
                    .await
                    .map_err(|error| anyhow::anyhow!(error.to_string()))?;

                for skipped in &report.skipped_files {
                    warn!(path = %skipped.path.display(), reason = %skipped.reason, "skipped pdf");
                }
                let total_chunks: usize = report
                    .summaries
                    .iter()
                    .map(|summary| summary.chunks_stored)
                    .sum();
                println!(
                    "{} file(s) ingested, {} chunk(s) stored, {} skipped",
                    report.summaries.len(),
                    total_chunks,
                    report.skipped_files.len()
                );
            } else {
                let summary = pipeline
                    .ingest_file(&case_id, target)
                    .await
                    .map_err(|error| anyhow::anyhow!(error.to_string()))?;
                println!(
                    "file {} ingested: {} page(s), {} chunk(s) stored",
                    summary.file_id, summary.pages, summary.chunks_stored
                );
            }
        }
        Command::Search {
            query,
            case_id,
            top_k,
        } => {
            let mut request = SearchRequest::new(query).with_top_k(top_k);
            if let Some(case_id) = case_id {
                request = request.scoped_to_case(case_id);
            }

            let pipeline = case_search_core::QueryPipeline::new(provider, store);
            let hits = pipeline
                .search_snippets(&request)
                .await
                .map_err(|error| anyhow::anyhow!(error.to_string()))?;

            if hits.is_empty() {
                println!("no hits");
            }
            for hit in hits {
                println!(
                    "score={:.4} file={} page={}",
                    hit.similarity,
                    hit.file_name.as_deref().unwrap_or("<unknown>"),
                    hit.page_number
                        .map(|page| page.to_string())
                        .unwrap_or_else(|| "?".to_string())
                );
                if let Some(url) = &hit.file_url {
                    println!("  url={url}");
                }
                println!("  snippet:\n{}", hit.text_snippet);
            }
        }
        Command::Summarize {
            path,
            chunk_max_chars,
        } => {
            let summarizer: Arc<dyn Summarizer> = Arc::new(
                CohereSummarizer::new(&cli.cohere_url, &cli.cohere_key, &cli.summary_model)
                    .map_err(|error| anyhow::anyhow!(error.to_string()))?,
            );
            let pipeline = SummaryPipeline::new(
                LopdfExtractor,
                summarizer,
                SummaryOptions { chunk_max_chars },
            )
            .map_err(|error| anyhow::anyhow!(error.to_string()))?;

            let bytes = std::fs::read(&path)?;
            let summary = pipeline
                .summarize_bytes(&bytes)
                .await
                .map_err(|error| anyhow::anyhow!(error.to_string()))?;
            println!("{summary}");
        }
        Command::DeleteCase { case_id } => {
            store
                .delete_case(&case_id)
                .await
                .map_err(|error| anyhow::anyhow!(error.to_string()))?;
            println!("case {case_id} deleted (files and chunks removed)");
        }
    }

    Ok(())
}
