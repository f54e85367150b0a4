//! FoxWhisper harness: corpus runner plumbing and the cross-language
//! diff harness.
//!
//! `fw-core` owns every verdict. This crate owns the process boundary:
//! foreign-language oracles run as subprocesses, their outcomes are
//! aggregated by one caller-owned [`diff::DiffAggregate`], and persisted
//! summaries are compared with [`compare::compare_summaries`].

#![forbid(unsafe_code)]

pub mod compare;
pub mod config;
pub mod diff;

/// Initialize tracing with sensible defaults.
///
/// Log level is controlled by the `RUST_LOG` environment variable.
/// Defaults to `info` if not set.
pub fn init_tracing() {
    use tracing_subscriber::EnvFilter;

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_writer(std::io::stderr)
        .init();
}
