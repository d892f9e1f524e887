//! Payload commands: write and read.

use super::{open_store, CliError};
use scoredb_core::{Config, Score};
use std::fs;
use std::io::{self, Read, Write};
use std::path::Path;

/// Stores a file (or stdin for `-`) and prints its score in hex.
pub fn write(dir: &Path, name: &str, file: &str, config: Config) -> Result<(), Box<dyn std::error::Error>> {
    let payload = if file == "-" {
        let mut buf = Vec::new();
        io::stdin().lock().read_to_end(&mut buf)?;
        buf
    } else {
        fs::read(file)?
    };

    let store = open_store(dir, name, config)?;
    let score = store.write(&payload)?;
    println!("{}", score);
    store.close()?;
    Ok(())
}

/// Writes the payload stored under `score` to stdout.
pub fn read(dir: &Path, name: &str, score: &str, config: Config) -> Result<(), Box<dyn std::error::Error>> {
    let width = config.score_kind.size();
    let parsed = parse_score(score, width)?;

    let store = open_store(dir, name, config)?;
    let payload = store.read(&parsed)?;

    let mut stdout = io::stdout().lock();
    stdout.write_all(&payload)?;
    stdout.flush()?;
    Ok(())
}

fn parse_score(text: &str, width: usize) -> Result<Score, CliError> {
    Score::from_hex(text)
        .filter(|score| score.len() == width)
        .ok_or_else(|| CliError::InvalidScore {
            score: text.to_string(),
            width,
        })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_score_checks_width() {
        let hex = "7113fd84e8973eb2";
        assert_eq!(parse_score(hex, 8).unwrap().to_hex(), hex);
        assert!(matches!(
            parse_score(hex, 16),
            Err(CliError::InvalidScore { width: 16, .. })
        ));
        assert!(parse_score("not hex", 8).is_err());
    }
}
