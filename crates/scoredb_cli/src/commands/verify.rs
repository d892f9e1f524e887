//! Verify command implementation.

use super::{open_store, CliError};
use scoredb_core::Config;
use std::path::Path;

/// Runs the verify command.
pub fn run(dir: &Path, name: &str, config: Config) -> Result<(), Box<dyn std::error::Error>> {
    println!("Verifying store '{}' in {:?}", name, dir);
    println!();

    let store = open_store(dir, name, config)?;
    let report = store.verify()?;
    store.close()?;

    println!(
        "  Blocks checked: {}, bytes: {}, corrupt: {}",
        report.blocks_checked,
        report.bytes_checked,
        report.corrupt.len()
    );
    for block in &report.corrupt {
        println!(
            "    ERROR: block at offset {} does not match score {}",
            block.offset, block.score
        );
    }
    if report.torn_bytes > 0 {
        println!("  Torn tail: {} bytes", report.torn_bytes);
    }

    println!();
    if report.is_ok() {
        println!("✓ Store verification passed");
        Ok(())
    } else {
        println!("✗ Store verification failed");
        Err(CliError::VerifyFailed(report.corrupt.len()).into())
    }
}
