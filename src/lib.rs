//! MultiTask library
//!
//! Checklist tasks whose completion state follows their items, with live
//! queries and an injected notification bus for keeping views in sync.

pub mod bus;
pub mod cli;
pub mod completion;
pub mod config;
pub mod coordinator;
pub mod db;
pub mod error;
pub mod feedback;
pub mod format;
pub mod logging;
pub mod types;
pub mod views;
