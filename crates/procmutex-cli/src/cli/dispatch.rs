//! Command dispatch logic for routing CLI commands to their handlers

use std::time::Duration;

use anyhow::{Context, Result};
use clap::ArgMatches;
use procmutex::{CancellationToken, Spec};

use super::args::build_cli;

/// Parse arguments and run the selected subcommand, returning the process
/// exit code.
pub async fn run() -> Result<i32> {
    let matches = build_cli().get_matches();
    match matches.subcommand() {
        Some(("run", sub_m)) => handle_run_cmd(sub_m).await,
        Some(("hold", sub_m)) => handle_hold_cmd(sub_m).await,
        _ => Err(anyhow::anyhow!("unknown command; try 'procmutex --help'")),
    }
}

/// Build an acquisition spec from the common arguments.
fn spec_from_matches(sub_m: &ArgMatches) -> Result<Spec> {
    let name = sub_m
        .get_one::<String>("name")
        .ok_or_else(|| anyhow::anyhow!("--name is required"))?;

    let mut spec = Spec::new(name.as_str());
    if let Some(prefix) = sub_m.get_one::<String>("prefix") {
        spec = spec.with_prefix(prefix.as_str());
    }
    if let Some(timeout) = sub_m.get_one::<u64>("timeout") {
        spec = spec.with_timeout(Duration::from_secs(*timeout));
    }
    if let Some(delay) = sub_m.get_one::<u64>("delay") {
        spec = spec.with_delay(Duration::from_millis(*delay));
    }
    Ok(spec)
}

/// Cancel `token` when Ctrl-C arrives.
fn watch_ctrl_c(token: CancellationToken) -> tokio::task::JoinHandle<()> {
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            token.cancel();
        }
    })
}

/// Handle run command
///
/// Acquires the mutex, runs the command, releases the mutex, and exits
/// with the command's exit code. Ctrl-C while waiting cancels the
/// acquisition without running the command.
async fn handle_run_cmd(sub_m: &ArgMatches) -> Result<i32> {
    let command: Vec<String> = sub_m
        .get_many::<String>("command")
        .map(|vals| vals.cloned().collect())
        .unwrap_or_default();
    let (program, args) = command
        .split_first()
        .ok_or_else(|| anyhow::anyhow!("missing command to run"))?;

    let cancel = CancellationToken::new();
    let spec = spec_from_matches(sub_m)?.with_cancel(cancel.clone());
    let watcher = watch_ctrl_c(cancel);

    let guard = procmutex::acquire(spec)
        .await
        .context("failed to acquire mutex")?;
    watcher.abort();

    tracing::debug!("mutex held; running {program}");
    let status = tokio::process::Command::new(program)
        .args(args)
        .status()
        .await
        .with_context(|| format!("failed to execute {program}"))?;
    guard.release();

    Ok(status.code().unwrap_or(1))
}

/// Handle hold command
///
/// Acquires the mutex, reports the backing lock file, and holds the mutex
/// until Ctrl-C.
async fn handle_hold_cmd(sub_m: &ArgMatches) -> Result<i32> {
    let cancel = CancellationToken::new();
    let spec = spec_from_matches(sub_m)?.with_cancel(cancel.clone());
    let watcher = watch_ctrl_c(cancel);

    let guard = procmutex::acquire(spec)
        .await
        .context("failed to acquire mutex")?;
    watcher.abort();

    #[allow(clippy::print_stdout)]
    {
        println!(
            "holding mutex at {}; press Ctrl-C to release",
            guard.path().display()
        );
    }
    tokio::signal::ctrl_c()
        .await
        .context("failed to wait for Ctrl-C")?;
    guard.release();
    Ok(0)
}
