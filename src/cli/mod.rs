//! Argument parsing and output formatting for the `syno-*` tools.
//!
//! Only built with the `cli` feature.

pub mod args;
pub mod output;
