//! # CLI Behavior
//!
//! This is **one possible UI client** for herdmeds, not the application
//! itself. It is the only place that knows about terminal I/O, exit codes and
//! output formatting.
//!
//! ## Launch
//!
//! A phone app reconciles with its backup slot once per launch. A CLI is
//! launched for every command, so that step is its own subcommand:
//! `herdmeds startup`. Every other command finishes by taking the daily
//! automatic backup if one is due.
//!
//! ## Record Ids
//!
//! Commands that take an id accept the full UUID or any unique prefix of it,
//! as shown by `herdmeds list`.
//!
//! ## Module Structure
//!
//! - `setup`: Argument parsing via clap
//! - `commands`: Logging init, opening the store, dispatch
//! - `handlers`: One function per command; validates input and calls the API
//! - `render`: Output formatting
//! - `styles`: Terminal styling constants

mod commands;
mod handlers;
mod render;
pub mod setup;
mod styles;

pub use commands::run;
