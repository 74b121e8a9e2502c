use anyhow::{Context, Result};
use clap::Parser;
use kb_core::IndexPaths;
use kb_query::{Corpus, KnowledgeBase};
use std::path::PathBuf;
use tracing_subscriber::{fmt, EnvFilter};

#[derive(Parser)]
#[command(name = "kb-query")]
#[command(about = "Query the patterns or knowledge index and print JSON results")]
struct Args {
    /// Index directory path
    #[arg(long, env = "KB_INDEX_DIR", default_value = "./index")]
    index: PathBuf,
    /// Maximum number of results, 0 for all
    #[arg(long, default_value_t = 0)]
    limit: usize,
    /// Use an empty index when a persisted one is missing or unreadable
    #[arg(long, default_value_t = false)]
    allow_missing: bool,
    /// Which index to query: patterns or knowledge
    corpus: Corpus,
    /// Free-text query
    #[arg(required = true, num_args = 1..)]
    query: Vec<String>,
}

fn main() -> Result<()> {
    fmt().with_env_filter(EnvFilter::from_default_env()).with_writer(std::io::stderr).init();
    let args = Args::parse();

    let paths = IndexPaths::new(&args.index);
    let kb = if args.allow_missing {
        KnowledgeBase::open_or_empty(&paths)
    } else {
        KnowledgeBase::open(&paths)
            .with_context(|| format!("loading indices from {}", args.index.display()))?
    };

    let results = kb.search(args.corpus, &args.query.join(" "), Some(args.limit));
    println!("{}", serde_json::to_string_pretty(&results)?);
    Ok(())
}
