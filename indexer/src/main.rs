use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use fieldnote_core::{Category, Document, DocumentStore, SearchConfig, SearchEngine, SearchFilters, SledStore};
use tracing_subscriber::{fmt, EnvFilter};
use walkdir::WalkDir;

use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::{Path, PathBuf};

#[derive(Parser)]
#[command(name = "indexer")]
#[command(about = "Import notes and query the search index from the terminal", long_about = None)]
struct Cli {
    /// sled store directory
    #[arg(long, global = true, env = "FIELDNOTE_STORE", default_value = "./notes")]
    store: String,
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Load documents from JSON/JSONL files or a directory into the store
    Import {
        /// Input path (file or directory)
        #[arg(long)]
        input: String,
    },
    /// Rebuild the inverted index from the store and report what it holds
    Rebuild,
    /// Run one query against the store
    Search {
        #[arg(long)]
        query: String,
        #[arg(long)]
        category: Option<Category>,
        #[arg(long, default_value_t = 10)]
        limit: usize,
        /// Minimum similarity for typo-tolerant matches (0.0-1.0)
        #[arg(long, default_value_t = 0.8)]
        fuzzy_threshold: f64,
    },
    /// Complete the last word of a partial query
    Suggest {
        #[arg(long)]
        prefix: String,
        #[arg(long, default_value_t = 5)]
        limit: usize,
    },
}

#[derive(Debug, Default, PartialEq, Eq)]
struct ImportStats {
    stored: usize,
    skipped: usize,
}

fn main() -> Result<()> {
    fmt().with_env_filter(EnvFilter::from_default_env()).init();
    let cli = Cli::parse();
    let store = SledStore::open(&cli.store).with_context(|| format!("opening store at {}", cli.store))?;

    match cli.command {
        Commands::Import { input } => {
            let stats = import(&store, Path::new(&input))?;
            println!("stored {} documents, skipped {} without id", stats.stored, stats.skipped);
            Ok(())
        }
        Commands::Rebuild => rebuild(store),
        Commands::Search { query, category, limit, fuzzy_threshold } => {
            search(store, &query, category, limit, fuzzy_threshold)
        }
        Commands::Suggest { prefix, limit } => {
            let engine = SearchEngine::new(store, SearchConfig::default())?;
            engine.load()?;
            for term in engine.suggest(&prefix, limit) {
                println!("{term}");
            }
            Ok(())
        }
    }
}

fn rebuild(store: SledStore) -> Result<()> {
    let engine = SearchEngine::new(store, SearchConfig::default())?;
    let stats = engine.reindex()?;
    let consistent = engine.is_consistent()?;
    println!(
        "indexed {} documents, {} terms, skipped {}; consistent: {}",
        stats.documents, stats.terms, stats.skipped, consistent
    );
    Ok(())
}

fn search(store: SledStore, query: &str, category: Option<Category>, limit: usize, fuzzy_threshold: f64) -> Result<()> {
    let mut config = SearchConfig::default();
    config.set_fuzzy_threshold(fuzzy_threshold)?;
    config.set_max_results(limit.clamp(1, 1000))?;
    let engine = SearchEngine::new(store, config)?;
    let filters = SearchFilters { category, ..Default::default() };
    let resp = engine.search_blocking(query, &filters)?;
    println!("{} hits in {:.3}s", resp.total, resp.took_s);
    for hit in resp.results {
        println!("{:>7.1}  {}  {}", hit.score, hit.document.id, hit.document.title);
    }
    Ok(())
}

fn import(store: &dyn DocumentStore, input_path: &Path) -> Result<ImportStats> {
    let mut files: Vec<PathBuf> = Vec::new();
    if input_path.is_dir() {
        for entry in WalkDir::new(input_path).into_iter().filter_map(|e| e.ok()) {
            let p = entry.path();
            if p.is_file() {
                if let Some(ext) = p.extension().and_then(|s| s.to_str()) {
                    if matches!(ext, "json" | "jsonl") {
                        files.push(p.to_path_buf());
                    }
                }
            }
        }
        files.sort();
    } else if input_path.is_file() {
        files.push(input_path.to_path_buf());
    }

    let mut stats = ImportStats::default();
    for file in files {
        let docs = if file.extension().and_then(|s| s.to_str()) == Some("jsonl") {
            read_jsonl(&file)?
        } else {
            read_json(&file)?
        };
        for doc in docs {
            ingest_doc(store, doc, &mut stats)?;
        }
    }
    tracing::info!(stored = stats.stored, skipped = stats.skipped, "import complete");
    Ok(stats)
}

fn read_jsonl(file: &Path) -> Result<Vec<Document>> {
    let f = File::open(file)?;
    let reader = BufReader::new(f);
    let mut docs = Vec::new();
    for (n, line) in reader.lines().enumerate() {
        let line = line?;
        if line.trim().is_empty() { continue; }
        let doc: Document = serde_json::from_str(&line)
            .with_context(|| format!("{}:{}", file.display(), n + 1))?;
        docs.push(doc);
    }
    Ok(docs)
}

fn read_json(file: &Path) -> Result<Vec<Document>> {
    let f = File::open(file)?;
    let reader = BufReader::new(f);
    let json: serde_json::Value = serde_json::from_reader(reader)?;
    let docs = match json {
        serde_json::Value::Array(arr) => arr
            .into_iter()
            .map(serde_json::from_value)
            .collect::<Result<Vec<Document>, _>>()?,
        serde_json::Value::Object(_) => vec![serde_json::from_value(json)?],
        _ => Vec::new(),
    };
    Ok(docs)
}

fn ingest_doc(store: &dyn DocumentStore, doc: Document, stats: &mut ImportStats) -> Result<()> {
    if !doc.has_valid_id() {
        tracing::warn!(title = %doc.title, "skipping document without id");
        stats.skipped += 1;
        return Ok(());
    }
    store.put(doc)?;
    stats.stored += 1;
    Ok(())
}
