//! Shared domain types for Anteroom: error taxonomy, structured trace
//! events, configuration, and the tool-handler boundary.

pub mod config;
pub mod error;
pub mod tool;
pub mod trace;
