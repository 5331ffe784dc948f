use anyhow::{anyhow, Result};
use clap::{Parser, Subcommand};
use serde::Deserialize;
use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::{Path, PathBuf};
use tern_engine::{persist, IndexPaths, SearchIndex};
use tracing_subscriber::{fmt, EnvFilter};
use walkdir::WalkDir;

#[derive(Debug, Deserialize)]
struct InputDoc {
    id: String,
    title: String,
    body: String,
    url: Option<String>,
}

#[derive(Parser)]
#[command(name = "tern-indexer")]
#[command(about = "Build and query search index snapshots", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Build a snapshot from input JSON/JSONL files or a directory
    Build {
        /// Input path (file or directory)
        #[arg(long)]
        input: String,
        /// Output index directory
        #[arg(long)]
        output: String,
    },
    /// Search an existing snapshot from the command line
    Query {
        /// Index directory
        #[arg(long)]
        index: String,
        /// Query text
        #[arg(short, long)]
        query: String,
        /// Maximum number of results
        #[arg(short = 'k', long, default_value_t = 10)]
        top_k: usize,
    },
}

fn main() -> Result<()> {
    fmt().with_env_filter(EnvFilter::from_default_env()).init();
    let cli = Cli::parse();

    match cli.command {
        Commands::Build { input, output } => build_index(&input, &output),
        Commands::Query { index, query, top_k } => run_query(&index, &query, top_k),
    }
}

fn build_index(input: &str, output: &str) -> Result<()> {
    let mut index = SearchIndex::new();
    for file in collect_input_files(Path::new(input))? {
        ingest_file(&file, &mut index)?;
    }
    tracing::info!(
        num_docs = index.total_docs(),
        num_terms = index.num_terms(),
        "ingested documents"
    );

    persist::save(&IndexPaths::new(output), &index)?;
    tracing::info!(output, "index build complete");
    Ok(())
}

fn collect_input_files(input: &Path) -> Result<Vec<PathBuf>> {
    let mut files = Vec::new();
    if input.is_dir() {
        for entry in WalkDir::new(input).into_iter().filter_map(|e| e.ok()) {
            let p = entry.path();
            if p.is_file()
                && matches!(
                    p.extension().and_then(|s| s.to_str()),
                    Some("json" | "jsonl")
                )
            {
                files.push(p.to_path_buf());
            }
        }
        files.sort();
    } else if input.is_file() {
        files.push(input.to_path_buf());
    } else {
        return Err(anyhow!("input path {} does not exist", input.display()));
    }
    Ok(files)
}

fn ingest_file(file: &Path, index: &mut SearchIndex) -> Result<()> {
    if file.extension().and_then(|s| s.to_str()) == Some("jsonl") {
        let reader = BufReader::new(File::open(file)?);
        for line in reader.lines() {
            let line = line?;
            if line.trim().is_empty() {
                continue;
            }
            add_doc(serde_json::from_str(&line)?, index);
        }
    } else {
        let json: serde_json::Value = serde_json::from_reader(BufReader::new(File::open(file)?))?;
        match json {
            serde_json::Value::Array(arr) => {
                for value in arr {
                    add_doc(serde_json::from_value(value)?, index);
                }
            }
            value @ serde_json::Value::Object(_) => add_doc(serde_json::from_value(value)?, index),
            _ => {}
        }
    }
    Ok(())
}

fn add_doc(doc: InputDoc, index: &mut SearchIndex) {
    index.add_document(
        &doc.id,
        &doc.title,
        &doc.body,
        doc.url.as_deref().unwrap_or(""),
    );
}

fn run_query(index_dir: &str, query: &str, top_k: usize) -> Result<()> {
    let index = persist::load(&IndexPaths::new(index_dir))?
        .ok_or_else(|| anyhow!("no snapshot found in {}", index_dir))?;

    let hits = index.search(query, top_k);
    if hits.is_empty() {
        println!("no results");
        return Ok(());
    }
    for (rank, hit) in hits.iter().enumerate() {
        println!(
            "{:>2}. {:.4}  {}  {}  {}",
            rank + 1,
            hit.score,
            hit.id,
            hit.title,
            hit.url
        );
    }
    Ok(())
}
