//! Command handlers for the AptWise CLI.
//!
//! This module organizes all CLI commands into separate submodules.

pub mod bank;
pub mod check;
pub mod search;

// Re-export command types for convenience
pub use bank::BankCommand;
pub use check::{CheckBatchCommand, CheckCommand};
pub use search::SearchCommand;
