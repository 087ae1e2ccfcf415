use crate::cli::output::{colorize_diff, Output};
use crate::config::load_settings;
use crate::errors::{Result, StashError};
use crate::stash::{ApplyReport, StashStore};
use crate::svn::PathTarget;
use dialoguer::theme::ColorfulTheme;
use dialoguer::Confirm;
use std::env;
use tracing::debug;

fn open_store() -> Result<StashStore> {
    let current_dir = env::current_dir()
        .map_err(|e| StashError::config(format!("Could not get current directory: {e}")))?;
    let settings = load_settings()?;
    StashStore::open(&current_dir, &settings)
}

/// Ask on the terminal; anything but an explicit yes declines
fn prompt(message: &str) -> bool {
    Confirm::with_theme(&ColorfulTheme::default())
        .with_prompt(message)
        .default(false)
        .interact()
        .unwrap_or_else(|e| {
            debug!("Confirmation prompt failed: {}", e);
            false
        })
}

pub fn save(comment: &str) -> Result<()> {
    let mut store = open_store()?;
    let summary = store.save(comment)?.summary();
    store.persist()?;

    Output::success(format!("Saved stash: {summary}"));
    Ok(())
}

pub fn push(comment: &str) -> Result<()> {
    let mut store = open_store()?;
    let result = store.push(comment).map(|stash| stash.summary());
    // a saved stash stays recorded even if the revert failed
    store.persist()?;

    Output::success(format!("Stashed and reverted: {}", result?));
    Ok(())
}

pub fn apply(index: i64, yes: bool) -> Result<()> {
    let mut store = open_store()?;
    let report = run_apply(&mut store, index, yes, false)?;
    print_report(&report);
    Output::success(format!("Applied stash {index}"));
    Ok(())
}

pub fn pop(index: i64, yes: bool) -> Result<()> {
    let mut store = open_store()?;
    let report = run_apply(&mut store, index, yes, true)?;
    print_report(&report);
    Output::success(format!("Applied and removed stash {index}"));
    Ok(())
}

fn run_apply(store: &mut StashStore, index: i64, yes: bool, remove: bool) -> Result<ApplyReport> {
    let mut confirm = |message: &str| yes || prompt(message);

    let result = if remove {
        store.pop(index, &mut confirm)
    } else {
        store.apply(index, &mut confirm)
    };

    // a rebase that went through has already rewritten the artifact
    if !matches!(result, Err(StashError::IndexOutOfRange { .. })) {
        store.persist()?;
    }
    result
}

fn print_report(report: &ApplyReport) {
    if report.rebased() {
        Output::info(format!(
            "Rebased from r{} to r{}",
            report.previous_revision, report.revision
        ));
        for (old, target) in &report.renames {
            match target {
                PathTarget::Moved(new) => Output::sub_item(format!("{old} -> {new}")),
                PathTarget::Deleted => Output::sub_item(format!("{old} (deleted upstream)")),
            }
        }
    }

    for path in &report.registered {
        debug!("Registered {}", path);
    }
    for path in &report.deregistered {
        Output::sub_item(format!("Removed empty file {path}"));
    }
    for warning in &report.warnings {
        Output::warning(warning);
    }
    if !report.rejects.is_empty() {
        Output::warning("Some hunks did not apply cleanly:");
        for reject in &report.rejects {
            Output::sub_item(reject);
        }
    }
}

pub fn remove(index: i64) -> Result<()> {
    let mut store = open_store()?;
    let stash = store.remove(index)?;
    store.persist()?;

    Output::success(format!("Removed stash {index}: {}", stash.summary()));
    Ok(())
}

pub fn list(verbose: bool) -> Result<()> {
    let store = open_store()?;

    for (i, stash) in store.list().iter().enumerate() {
        println!("{i:<2} | {}", stash.summary());

        if verbose {
            println!("Changed paths:");
            for (status, file) in store.files(i as i64)? {
                Output::indented(format!("{status} {file}"));
            }
            Output::divider();
        }
    }
    Ok(())
}

pub fn show(index: i64, color: bool) -> Result<()> {
    let store = open_store()?;
    let artifact = store.artifact(index)?;
    let text = String::from_utf8_lossy(&artifact);

    let color = color && load_settings()?.stash.color;
    if color {
        print!("{}", colorize_diff(&text));
    } else {
        print!("{text}");
    }
    Ok(())
}
