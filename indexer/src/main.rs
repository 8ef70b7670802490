use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand, ValueEnum};
use skylore_core::bm25::Bm25Params;
use skylore_core::expand::RuleBasedExpander;
use skylore_core::lexical::LexicalIndex;
use skylore_core::persist::{load_index, save_index, IndexPaths};
use skylore_core::{Constellation, RecordStore, SearchIndex};
use tracing_subscriber::{fmt, EnvFilter};
use walkdir::WalkDir;

use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::{Path, PathBuf};

#[derive(Parser)]
#[command(name = "skylore-indexer")]
#[command(about = "Build and inspect the constellation BM25 index", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Clone, Copy, ValueEnum)]
enum Mode {
    Lexical,
    Attribute,
}

#[derive(Subcommand)]
enum Commands {
    /// Build the index from a JSON/JSONL record file or a directory of them
    Build {
        /// Input path (file or directory)
        #[arg(long)]
        input: String,
        /// Output index directory
        #[arg(long)]
        output: String,
    },
    /// Run one query against a built index
    Query {
        #[arg(long, default_value = "./index")]
        index: String,
        /// Record snapshot the index was built from
        #[arg(long)]
        input: String,
        #[arg(long, value_enum, default_value_t = Mode::Lexical)]
        mode: Mode,
        #[arg(long, default_value_t = 5)]
        k: usize,
        #[arg(long, default_value_t = 1.5)]
        k1: f64,
        #[arg(long, default_value_t = 0.75)]
        b: f64,
        query: String,
    },
    /// Print artifact and attribute statistics
    Stats {
        #[arg(long, default_value = "./index")]
        index: String,
        #[arg(long)]
        input: String,
    },
}

fn main() -> Result<()> {
    fmt().with_env_filter(EnvFilter::from_default_env()).init();
    let cli = Cli::parse();

    match cli.command {
        Commands::Build { input, output } => build_index(&input, &output),
        Commands::Query { index, input, mode, k, k1, b, query } => {
            run_query(&index, &input, mode, k, Bm25Params { k1, b }, &query)
        }
        Commands::Stats { index, input } => print_stats(&index, &input),
    }
}

fn build_index(input: &str, output: &str) -> Result<()> {
    let store = load_records(Path::new(input))?;
    if store.is_empty() {
        tracing::warn!(input, "no records found; writing an empty index");
    }
    let lexical = LexicalIndex::build(&store);
    let meta = save_index(&IndexPaths::new(output), &lexical).with_context(|| format!("writing index to {output}"))?;
    tracing::info!(output, num_docs = meta.num_docs, num_terms = meta.num_terms, avgdl = meta.avgdl, "index build complete");
    Ok(())
}

fn open_index(index: &str, input: &str) -> Result<SearchIndex> {
    let store = load_records(Path::new(input))?;
    let (lexical, _meta) = load_index(&IndexPaths::new(index)).with_context(|| format!("loading index from {index}"))?;
    Ok(SearchIndex::with_lexical(store, lexical))
}

fn run_query(index: &str, input: &str, mode: Mode, k: usize, params: Bm25Params, query: &str) -> Result<()> {
    let index = open_index(index, input)?;
    match mode {
        Mode::Lexical => {
            for hit in index.lexical.search(query, k, params) {
                let id = hit.id.unwrap_or_default();
                println!("- {} ({id}) bm25={:.3}", hit.jp_name, hit.score);
                println!("  {}", hit.snippet);
            }
        }
        Mode::Attribute => {
            let expanded = RuleBasedExpander.approximate(query);
            println!("expanded: {}", serde_json::to_string(&expanded)?);
            for (c, score) in index.attributes.search(&expanded, k, &index.store) {
                println!("- {} ({}) score={score}", c.display_name(), c.id);
            }
        }
    }
    Ok(())
}

fn print_stats(index: &str, input: &str) -> Result<()> {
    let index = open_index(index, input)?;
    println!("documents: {}", index.lexical.index.doc_count);
    println!("terms: {}", index.lexical.index.vocab.len());
    println!("avgdl: {:.2}", index.lexical.index.avgdl);
    println!("attribute keys: {}", index.attributes.num_keys());
    for (season, count) in index.attributes.season_counts() {
        println!("  {}: {count}", season.label());
    }
    Ok(())
}

fn load_records(input_path: &Path) -> Result<RecordStore> {
    let mut files: Vec<PathBuf> = Vec::new();
    if input_path.is_dir() {
        for entry in WalkDir::new(input_path).sort_by_file_name().into_iter().filter_map(|e| e.ok()) {
            let p = entry.path();
            if p.is_file() {
                if let Some(ext) = p.extension().and_then(|s| s.to_str()) {
                    if matches!(ext, "json" | "jsonl") {
                        files.push(p.to_path_buf());
                    }
                }
            }
        }
    } else if input_path.is_file() {
        files.push(input_path.to_path_buf());
    } else {
        bail!("input {} does not exist", input_path.display());
    }

    let mut records: Vec<Constellation> = Vec::new();
    for file in files {
        let before = records.len();
        if file.extension().and_then(|s| s.to_str()) == Some("jsonl") {
            read_jsonl(&file, &mut records)?;
        } else {
            read_json(&file, &mut records)?;
        }
        tracing::info!(file = %file.display(), num_records = records.len() - before, "read records");
    }
    Ok(RecordStore::new(records))
}

fn read_jsonl(file: &Path, records: &mut Vec<Constellation>) -> Result<()> {
    let reader = BufReader::new(File::open(file)?);
    for (n, line) in reader.lines().enumerate() {
        let line = line?;
        if line.trim().is_empty() { continue; }
        let rec: Constellation = serde_json::from_str(&line).with_context(|| format!("{}:{}", file.display(), n + 1))?;
        records.push(rec);
    }
    Ok(())
}

fn read_json(file: &Path, records: &mut Vec<Constellation>) -> Result<()> {
    let reader = BufReader::new(File::open(file)?);
    let json: serde_json::Value = serde_json::from_reader(reader).with_context(|| format!("parsing {}", file.display()))?;
    match json {
        serde_json::Value::Array(arr) => {
            for v in arr {
                records.push(serde_json::from_value(v)?);
            }
        }
        serde_json::Value::Object(_) => records.push(serde_json::from_value(json)?),
        _ => {}
    }
    Ok(())
}
