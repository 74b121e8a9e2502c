use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use kb_core::persist::{load_meta, save_meta, stage, MetaFile, FORMAT_VERSION};
use kb_core::{build_corpora, load_from_path, CorpusLayout, IndexPaths};
use std::path::PathBuf;
use tracing_subscriber::{fmt, EnvFilter};

#[derive(Parser)]
#[command(name = "kb-indexer")]
#[command(about = "Build the patterns and knowledge BM25 indices", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Index the corpus directories and write both indices
    Build {
        /// Directory of reusable pattern descriptions
        #[arg(long, env = "KB_PATTERNS_DIR", default_value = "./patterns")]
        patterns: PathBuf,
        /// Directory of knowledge snippets
        #[arg(long, env = "KB_KNOWLEDGE_DIR", default_value = "./knowledge")]
        knowledge: PathBuf,
        /// Extra knowledge directory appended to the knowledge index, if it exists
        #[arg(long, env = "KB_SUPPLEMENTARY_DIR")]
        supplementary: Option<PathBuf>,
        /// Output index directory
        #[arg(long, env = "KB_INDEX_DIR", default_value = "./index")]
        output: PathBuf,
    },
    /// Print document and vocabulary counts of a built index
    Stats {
        #[arg(long, env = "KB_INDEX_DIR", default_value = "./index")]
        index: PathBuf,
    },
}

fn main() -> Result<()> {
    fmt().with_env_filter(EnvFilter::from_default_env()).init();
    let cli = Cli::parse();

    match cli.command {
        Commands::Build { patterns, knowledge, supplementary, output } => {
            let layout = CorpusLayout {
                patterns_dir: patterns,
                knowledge_dir: knowledge,
                supplementary_dir: supplementary,
            };
            build(&layout, &IndexPaths::new(output))
        }
        Commands::Stats { index } => stats(&IndexPaths::new(index)),
    }
}

fn build(layout: &CorpusLayout, out_paths: &IndexPaths) -> Result<()> {
    let corpora = build_corpora(layout).context("loading corpora")?;

    // both files are fully written before either replaces the previous build
    let patterns =
        stage(&corpora.patterns, out_paths.patterns()).context("writing patterns index")?;
    let knowledge =
        stage(&corpora.knowledge, out_paths.knowledge()).context("writing knowledge index")?;
    patterns.commit().context("replacing patterns index")?;
    knowledge.commit().context("replacing knowledge index")?;

    let created_at = time::OffsetDateTime::now_utc()
        .format(&time::format_description::well_known::Rfc3339)
        .unwrap_or_else(|_| "".into());
    let meta = MetaFile {
        patterns_documents: corpora.patterns.document_count(),
        knowledge_documents: corpora.knowledge.document_count(),
        created_at,
        version: FORMAT_VERSION,
    };
    save_meta(out_paths, &meta)?;

    tracing::info!(
        output = %out_paths.root.display(),
        patterns = meta.patterns_documents,
        knowledge = meta.knowledge_documents,
        "index build complete"
    );
    Ok(())
}

fn stats(paths: &IndexPaths) -> Result<()> {
    let patterns = load_from_path(paths.patterns()).context("reading patterns index")?;
    let knowledge = load_from_path(paths.knowledge()).context("reading knowledge index")?;
    let created_at = match load_meta(paths) {
        Ok(meta) => Some(meta.created_at),
        Err(err) => {
            tracing::warn!(error = %err, "no build metadata");
            None
        }
    };
    let report = serde_json::json!({
        "created_at": created_at,
        "patterns": patterns.stats(),
        "knowledge": knowledge.stats(),
    });
    println!("{}", serde_json::to_string_pretty(&report)?);
    Ok(())
}
