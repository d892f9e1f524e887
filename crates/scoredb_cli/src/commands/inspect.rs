//! Inspect command implementation.

use super::open_store;
use scoredb_core::Config;
use serde::Serialize;
use std::path::Path;

/// Store inspection result.
#[derive(Debug, Serialize)]
pub struct InspectResult {
    /// Store name.
    pub name: String,
    /// Directory holding the store files.
    pub dir: String,
    /// Digest scheme the store was opened with.
    pub score_kind: &'static str,
    /// Score width in bytes.
    pub score_size: usize,
    /// Number of distinct payloads.
    pub entries: usize,
    /// Data log size in bytes.
    pub data_bytes: u64,
    /// Index log size in bytes.
    pub index_bytes: u64,
    /// Whether a key-indirection log exists.
    pub has_keys: bool,
    /// Every indexed score in hex, if requested.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub scores: Option<Vec<String>>,
}

/// Runs the inspect command.
pub fn run(
    dir: &Path,
    name: &str,
    show_scores: bool,
    format: &str,
    config: Config,
) -> Result<(), Box<dyn std::error::Error>> {
    let store = open_store(dir, name, config)?;
    let stats = store.stats()?;
    let kind = store.score_kind();

    let scores = if show_scores {
        let mut hex: Vec<String> = store.scores()?.iter().map(|s| s.to_hex()).collect();
        hex.sort();
        Some(hex)
    } else {
        None
    };

    let result = InspectResult {
        name: name.to_string(),
        dir: dir.display().to_string(),
        score_kind: kind.name(),
        score_size: kind.size(),
        entries: stats.entries,
        data_bytes: stats.data_bytes,
        index_bytes: stats.index_bytes,
        has_keys: store.layout().is_some_and(|l| l.keys_path().exists()),
        scores,
    };
    store.close()?;

    match format {
        "json" => {
            println!("{}", serde_json::to_string_pretty(&result)?);
        }
        _ => {
            print_text_output(&result);
        }
    }

    Ok(())
}

fn print_text_output(result: &InspectResult) {
    println!("ScoreDB Store Inspection");
    println!("========================");
    println!();
    println!("Name: {}", result.name);
    println!("Dir:  {}", result.dir);
    println!("Kind: {} ({} bytes)", result.score_kind, result.score_size);
    println!();
    println!("Storage:");
    println!("  Data log:   {}", format_size(result.data_bytes));
    println!("  Index log:  {}", format_size(result.index_bytes));
    println!("  Key log:    {}", if result.has_keys { "present" } else { "none" });
    println!();
    println!("Entries: {}", result.entries);

    if let Some(scores) = &result.scores {
        println!();
        for score in scores {
            println!("  {}", score);
        }
    }
}

fn format_size(bytes: u64) -> String {
    if bytes < 1024 {
        format!("{} bytes", bytes)
    } else if bytes < 1024 * 1024 {
        format!("{:.1} KB", bytes as f64 / 1024.0)
    } else if bytes < 1024 * 1024 * 1024 {
        format!("{:.1} MB", bytes as f64 / (1024.0 * 1024.0))
    } else {
        format!("{:.1} GB", bytes as f64 / (1024.0 * 1024.0 * 1024.0))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sizes_are_human_readable() {
        assert_eq!(format_size(512), "512 bytes");
        assert_eq!(format_size(2048), "2.0 KB");
        assert_eq!(format_size(3 * 1024 * 1024), "3.0 MB");
    }

    #[test]
    fn json_omits_scores_unless_requested() {
        let result = InspectResult {
            name: "s".into(),
            dir: "/tmp".into(),
            score_kind: "md5",
            score_size: 16,
            entries: 0,
            data_bytes: 0,
            index_bytes: 0,
            has_keys: false,
            scores: None,
        };
        let json = serde_json::to_string(&result).unwrap();
        assert!(json.contains("\"score_kind\":\"md5\""));
        assert!(!json.contains("scores"));
    }
}
