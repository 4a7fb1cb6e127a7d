use std::io;
use std::path::PathBuf;

use anyhow::{bail, Context, Result};
use serde::Serialize;
use tokio::sync::mpsc;
use tracing::{info, warn};

use jflash_patch::{
    check_writable, discover, run_batch, ApplyOptions, AutoSelector, BatchControl, BatchSummary,
    FolderSelector,
};

use crate::common;
use crate::prompt::{self, PromptSelector};

#[derive(Debug, Clone)]
pub struct ApplyArgs {
    pub jflash: Option<PathBuf>,
    pub patches: Option<PathBuf>,
    pub only: Vec<String>,
    pub no_backup: bool,
    pub keep_position: bool,
    pub interactive: bool,
    pub yes: bool,
}

#[derive(Serialize)]
struct ApplyOutput {
    install_root: String,
    bundles: Vec<String>,
    applied: usize,
    failed: usize,
    not_started: usize,
    cancelled: bool,
}

/// Keep the bundles named in `only`, failing on names that match nothing.
fn filter_bundles(bundles: Vec<PathBuf>, only: &[String]) -> Result<Vec<PathBuf>> {
    if only.is_empty() {
        return Ok(bundles);
    }
    let unknown: Vec<&str> = only
        .iter()
        .map(String::as_str)
        .filter(|name| !bundles.iter().any(|bundle| common::file_name(bundle) == *name))
        .collect();
    if !unknown.is_empty() {
        bail!("unknown patch bundle(s): {}", unknown.join(", "));
    }
    Ok(bundles
        .into_iter()
        .filter(|bundle| only.contains(&common::file_name(bundle)))
        .collect())
}

pub async fn run(args: ApplyArgs, json: bool) -> Result<()> {
    let install_root = common::resolve_install_root(args.jflash)?;
    check_writable(&install_root).with_context(|| {
        format!(
            "installation directory {} is not writable; run with sufficient permissions",
            install_root.display()
        )
    })?;
    let patch_root = common::resolve_patch_root(args.patches)?;
    let bundles = discover(&patch_root)
        .with_context(|| format!("scan patch directory {}", patch_root.display()))?;
    let bundles = filter_bundles(bundles, &args.only)?;
    if bundles.is_empty() {
        bail!("no patch bundles found in {}", patch_root.display());
    }

    let names: Vec<String> = bundles.iter().map(|bundle| common::file_name(bundle)).collect();
    if !json {
        println!("Installation: {}", install_root.display());
        println!("Patches:      {}", names.join(", "));
    }
    if !args.yes {
        let question = format!(
            "Apply {} patch bundle(s) to {}?",
            bundles.len(),
            install_root.display()
        );
        let confirmed = prompt::confirm(&mut io::stdin().lock(), &mut io::stderr(), &question)
            .context("read confirmation")?;
        if !confirmed {
            eprintln!("Aborted.");
            return Ok(());
        }
    }

    let options = ApplyOptions {
        merge: common::merge_options(args.no_backup, args.keep_position),
    };
    let control = BatchControl::new();
    let (tx, mut rx) = mpsc::unbounded_channel::<String>();
    info!(bundles = bundles.len(), root = %install_root.display(), "starting batch");

    let mut worker = {
        let control = control.clone();
        let install_root = install_root.clone();
        let interactive = args.interactive;
        tokio::task::spawn_blocking(move || {
            let mut sink = |line: &str| {
                let _ = tx.send(line.to_string());
            };
            let mut asking;
            let mut auto = AutoSelector;
            let selector: &mut dyn FolderSelector = if interactive {
                asking = PromptSelector::stdio();
                &mut asking
            } else {
                &mut auto
            };
            run_batch(&bundles, &install_root, selector, &options, &control, &mut sink)
        })
    };

    let mut cancel_requested = false;
    let summary: BatchSummary = loop {
        tokio::select! {
            Some(line) = rx.recv() => common::emit_line(&line, json),
            joined = &mut worker => break joined.context("patch worker failed")?,
            signal = tokio::signal::ctrl_c(), if !cancel_requested => {
                signal.context("listen for Ctrl-C")?;
                cancel_requested = true;
                control.cancel();
                warn!(started = control.started(), "cancellation requested");
                if control.in_progress() {
                    eprintln!("Stopping after the current bundle...");
                }
            }
        }
    };
    while let Ok(line) = rx.try_recv() {
        common::emit_line(&line, json);
    }

    if json {
        common::print_json(&ApplyOutput {
            install_root: common::display_path(&install_root),
            bundles: names,
            applied: summary.applied,
            failed: summary.failed,
            not_started: summary.not_started,
            cancelled: summary.cancelled,
        })?;
    } else {
        println!(
            "{} applied, {} failed, {} not started",
            summary.applied, summary.failed, summary.not_started
        );
    }

    if summary.failed > 0 {
        bail!("{} of {} patch bundle(s) failed", summary.failed, summary.total);
    }
    Ok(())
}
