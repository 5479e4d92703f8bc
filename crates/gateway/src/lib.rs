//! Anteroom gateway — the session-oriented front door for the tool
//! endpoints.
//!
//! Wires the session subsystem (store, directory, transport registry,
//! recovery, discovery) to an HTTP surface and a small set of built-in
//! tools.

pub mod api;
pub mod bootstrap;
pub mod cli;
pub mod state;
pub mod tools;
pub mod transport;
