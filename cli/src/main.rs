//! refmatch command-line entry point.
//!
//! Trains a reference corpus and tests sentences against it, printing the
//! same JSON the in-process API returns.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result, bail};
use clap::{Parser, Subcommand};
use refmatch_engine::{MatcherConfig, SentenceMatcher};
use serde::Serialize;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Parser)]
#[command(name = "refmatch")]
#[command(about = "Match sentences against a trained reference corpus")]
#[command(version)]
struct Args {
    /// TOML configuration file
    #[arg(long, short, global = true)]
    config: Option<PathBuf>,

    /// Directory holding the trained sentence list (overrides the config)
    #[arg(long, global = true)]
    data_dir: Option<PathBuf>,

    /// Minimum similarity for a confident match (overrides the config)
    #[arg(long, global = true)]
    threshold: Option<f32>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Replace the corpus with the given sentences
    Train {
        /// Sentences to train on
        sentences: Vec<String>,

        /// Read sentences from a JSON array or a file with one sentence per line
        #[arg(long, short)]
        file: Option<PathBuf>,
    },
    /// Find the best reference sentence for SENTENCE
    Test {
        sentence: String,

        /// Print the K closest sentences instead of the thresholded best match
        #[arg(long)]
        top: Option<usize>,
    },
    /// Show corpus and embedder status
    Status,
}

#[tokio::main]
async fn main() {
    let log_filter = "refmatch=info,refmatch_engine=info,refmatch_embeddings=info";

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| log_filter.into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    match run(Args::parse()).await {
        Ok(true) => {}
        Ok(false) => std::process::exit(1),
        Err(e) => {
            tracing::error!("{e:#}");
            std::process::exit(2);
        }
    }
}

/// Returns `Ok(false)` when the command ran but reported failure.
async fn run(args: Args) -> Result<bool> {
    let config = load_config(&args)?;
    let service = SentenceMatcher::from_config(config).context("invalid configuration")?;

    match args.command {
        Command::Train { sentences, file } => {
            let mut all = match file {
                Some(path) => read_sentences(&path)?,
                None => Vec::new(),
            };
            all.extend(sentences);

            let response = service.train_model(all).await;
            print_json(&response)?;
            Ok(response.success)
        }
        Command::Test {
            sentence,
            top: Some(k),
        } => {
            let ranked = service.rank(&sentence, k).await?;
            print_json(&ranked)?;
            Ok(true)
        }
        Command::Test { sentence, top: None } => {
            let response = service.test_sentence(&sentence).await;
            print_json(&response)?;
            Ok(true)
        }
        Command::Status => {
            service.ensure_ready().await?;
            print_json(&service.stats().await)?;
            Ok(true)
        }
    }
}

fn load_config(args: &Args) -> Result<MatcherConfig> {
    let mut config = match &args.config {
        Some(path) => MatcherConfig::from_toml_file(path)
            .with_context(|| format!("failed to load {}", path.display()))?,
        None => MatcherConfig::default(),
    };
    if let Some(dir) = &args.data_dir {
        config.data_dir = dir.clone();
    }
    if let Some(threshold) = args.threshold {
        config = config.with_threshold(threshold);
    }
    Ok(config)
}

/// Read sentences from `path`: a JSON array of strings when the file ends in
/// `.json`, otherwise one sentence per non-blank line.
fn read_sentences(path: &Path) -> Result<Vec<String>> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("failed to read {}", path.display()))?;
    parse_sentences(&content, path.extension().is_some_and(|ext| ext == "json"))
        .with_context(|| format!("failed to parse {}", path.display()))
}

fn parse_sentences(content: &str, json: bool) -> Result<Vec<String>> {
    if json {
        let sentences: Vec<String> = serde_json::from_str(content)?;
        return Ok(sentences);
    }

    let sentences: Vec<String> = content
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .map(str::to_string)
        .collect();
    if sentences.is_empty() {
        bail!("no sentences found");
    }
    Ok(sentences)
}

fn print_json<T: Serialize>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}
