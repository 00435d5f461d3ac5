// src/cli/cleanup.rs — Operator bulk wipe of all stored sessions

use std::io::{self, BufRead, Write};

use crate::infra::config::Config;
use crate::store::Store;

/// Enumerate every indexed session and delete both its index entry and
/// its transcript. A failure on one session is reported and the sweep
/// continues. Not part of normal request flow.
pub async fn run_cleanup(config: &Config, yes: bool) -> anyhow::Result<()> {
    if !yes && !confirm()? {
        eprintln!("Aborted.");
        return Ok(());
    }

    let store = Store::open(&config.db_path())?;
    let summaries = store.list_summaries()?;

    if summaries.is_empty() {
        println!("No stored sessions.");
        return Ok(());
    }

    let mut deleted = 0usize;
    for summary in summaries {
        let result = store
            .remove_summary(&summary.id)
            .and_then(|_| store.delete_transcript(&summary.id));
        match result {
            Ok(()) => {
                println!("Deleted session: {}", summary.id);
                deleted += 1;
            }
            Err(e) => eprintln!("Error cleaning up session {}: {e}", summary.id),
        }
    }

    println!("{deleted} session(s) cleaned up.");
    Ok(())
}

fn confirm() -> anyhow::Result<bool> {
    print!("This deletes ALL stored conversations. Type 'yes' to continue: ");
    io::stdout().flush()?;

    let mut line = String::new();
    io::stdin().lock().read_line(&mut line)?;
    Ok(line.trim() == "yes")
}
