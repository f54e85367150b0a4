//! fw-oracle: run a FoxWhisper corpus through the Rust oracle, or drive
//! the cross-language diff harness.
//!
//! Each corpus subcommand prints one PASS/FAIL line per scenario, writes
//! `<results-dir>/<language>_<suite>_summary.json`, and exits 0 only when
//! every scenario passed.

#![forbid(unsafe_code)]

use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use fw_core::report::Summary;
use fw_core::{aead, corpus, eare, epoch_fork, handshake, kdf, poisoning, schema, storm};
use fw_harness::{compare, config, diff};

#[derive(Parser, Debug)]
#[command(name = "fw-oracle")]
#[command(about = "FoxWhisper conformance oracle")]
struct Args {
    /// Directory summaries are written to
    #[arg(long, env = "FW_RESULTS_DIR", default_value = "results", global = true)]
    results_dir: PathBuf,

    /// Language label written into summaries
    #[arg(long, default_value = "rust", global = true)]
    language: String,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Validate protocol message vectors
    Schema { path: Option<PathBuf> },
    /// Verify corrupted EARE chains
    Eare { path: Option<PathBuf> },
    /// Run the replay/poisoning corpus
    Replay { path: Option<PathBuf> },
    /// Simulate queued replay-storm profiles
    Storm { path: Option<PathBuf> },
    /// Check key-derivation known answers
    Kdf { path: Option<PathBuf> },
    /// Check AEAD vectors
    Aead { path: Option<PathBuf> },
    /// Check handshake-flow derivation
    Handshake { path: Option<PathBuf> },
    /// Simulate epoch forks and reconciliation
    Fork { path: Option<PathBuf> },

    /// Run every language oracle and aggregate the outcomes
    Diff {
        /// JSON list of targets; built-in defaults otherwise
        #[arg(long)]
        targets: Option<PathBuf>,

        /// Per-target wall-clock bound
        #[arg(long, env = "FW_DIFF_TIMEOUT_SECS", default_value_t = config::DEFAULT_TIMEOUT_SECS)]
        timeout_secs: u64,
    },

    /// Compare persisted summaries for verdict agreement
    Compare {
        /// Summary files; every `*_summary.json` in the results dir otherwise
        summaries: Vec<PathBuf>,
    },
}

fn corpus_path(path: Option<PathBuf>, default: &str) -> PathBuf {
    path.unwrap_or_else(|| PathBuf::from(default))
}

fn run_suite(args: &Args) -> Result<Summary> {
    let summary = match &args.command {
        Command::Schema { path } => {
            let path = corpus_path(path.clone(), "vectors/cbor_test_vectors.json");
            schema::run_vectors(&corpus::load(&path)?)?
        }
        Command::Eare { path } => {
            let path = corpus_path(path.clone(), "vectors/corrupted_eare.json");
            eare::run_corpus(&corpus::load(&path)?)?
        }
        Command::Replay { path } => {
            let path = corpus_path(path.clone(), "vectors/replay_poisoning.json");
            poisoning::run_corpus(&corpus::load(&path)?)?
        }
        Command::Storm { path } => {
            let path = corpus_path(path.clone(), "vectors/replay_storm_profiles.json");
            storm::run_profiles(&corpus::load(&path)?)?
        }
        Command::Kdf { path } => {
            let path = corpus_path(path.clone(), "vectors/kdf_vectors.json");
            kdf::run_vectors(&corpus::load(&path)?)?
        }
        Command::Aead { path } => {
            let path = corpus_path(path.clone(), "vectors/aead_vectors.json");
            aead::run_vectors(&corpus::load(&path)?)?
        }
        Command::Handshake { path } => {
            let path = corpus_path(path.clone(), "vectors/end_to_end_test_vectors.json");
            handshake::run_flow(&corpus::load(&path)?)?
        }
        Command::Fork { path } => {
            let path = corpus_path(path.clone(), "vectors/epoch_forks.json");
            epoch_fork::run_corpus(&corpus::load(&path)?)?
        }
        Command::Diff { .. } | Command::Compare { .. } => {
            anyhow::bail!("not a corpus subcommand")
        }
    };
    Ok(summary)
}

fn write_json<T: serde::Serialize>(path: &Path, value: &T) -> Result<()> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent).with_context(|| format!("creating {}", parent.display()))?;
    }
    let json = serde_json::to_string_pretty(value)?;
    std::fs::write(path, json).with_context(|| format!("writing {}", path.display()))?;
    Ok(())
}

fn report_suite(args: &Args, mut summary: Summary) -> Result<ExitCode> {
    summary.language = args.language.clone();
    for report in &summary.scenarios {
        if report.passed() {
            println!("PASS {}", report.scenario_id);
        } else {
            println!("FAIL {}: {}", report.scenario_id, report.failures.join("; "));
        }
    }

    let out = args
        .results_dir
        .join(format!("{}_{}_summary.json", summary.language, summary.suite));
    write_json(&out, &summary)?;

    if summary.all_passed() {
        println!("All {} scenarios passed ({})", summary.scenario_count, summary.suite);
        Ok(ExitCode::SUCCESS)
    } else {
        println!(
            "{} of {} scenarios failed ({})",
            summary.failed, summary.scenario_count, summary.suite
        );
        Ok(ExitCode::FAILURE)
    }
}

fn run_diff(args: &Args, targets: Option<&Path>, timeout_secs: u64) -> Result<ExitCode> {
    let targets = match targets {
        Some(path) => config::load_targets(path)?,
        None => config::default_targets(),
    };
    let rt = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()?;
    let aggregate = rt.block_on(diff::run_all(targets, Duration::from_secs(timeout_secs)));

    for outcome in aggregate.results.values() {
        if outcome.success {
            println!("PASS {}", outcome.language);
        } else {
            println!("FAIL {}: {}", outcome.language, outcome.errors.first().map_or("", String::as_str));
        }
    }
    println!("{}/{} languages successful", aggregate.passed, aggregate.total);
    aggregate.write(&args.results_dir.join("cross_language_validation_results.json"))?;

    Ok(if aggregate.all_passed() {
        ExitCode::SUCCESS
    } else {
        ExitCode::FAILURE
    })
}

fn summary_files(dir: &Path) -> Result<Vec<PathBuf>> {
    let mut files = Vec::new();
    for entry in std::fs::read_dir(dir).with_context(|| format!("reading {}", dir.display()))? {
        let path = entry?.path();
        if path
            .file_name()
            .and_then(|n| n.to_str())
            .is_some_and(|n| n.ends_with("_summary.json"))
        {
            files.push(path);
        }
    }
    files.sort();
    Ok(files)
}

fn run_compare(args: &Args, paths: &[PathBuf]) -> Result<ExitCode> {
    let paths = if paths.is_empty() {
        summary_files(&args.results_dir)?
    } else {
        paths.to_vec()
    };
    anyhow::ensure!(!paths.is_empty(), "no summaries to compare");

    let summaries = paths
        .iter()
        .map(|p| compare::load_summary(p))
        .collect::<Result<Vec<_>>>()?;
    let divergences = compare::compare_summaries(&summaries);
    for d in &divergences {
        println!("DIVERGE {d}");
    }
    println!(
        "{} summaries compared, {} divergences",
        summaries.len(),
        divergences.len()
    );
    write_json(&args.results_dir.join("verdict_agreement.json"), &divergences)?;

    Ok(if divergences.is_empty() {
        ExitCode::SUCCESS
    } else {
        ExitCode::FAILURE
    })
}

fn main() -> Result<ExitCode> {
    fw_harness::init_tracing();

    let args = Args::parse();

    match &args.command {
        Command::Diff { targets, timeout_secs } => run_diff(&args, targets.as_deref(), *timeout_secs),
        Command::Compare { summaries } => run_compare(&args, summaries),
        _ => {
            let summary = run_suite(&args)?;
            report_suite(&args, summary)
        }
    }
}
