//! Benchmark support for ScoreDB.

pub mod utils;
