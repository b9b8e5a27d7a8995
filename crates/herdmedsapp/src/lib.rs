//! # herdmedsapp
//!
//! Local-first storage for livestock medicine and home-remedy records, with
//! the images attached to them and a self-contained backup of both.
//!
//! ## Layers
//!
//! ```text
//! UI (CLI, app shell)
//!   └── api::HerdApi              facade, no printing
//!         ├── orchestrator        startup reconcile, auto backup
//!         ├── backup::codec       snapshot / restore / import / export
//!         └── store::records      CRUD over the `records` document
//!               └── store::blobs  managed image directory
//! ```
//!
//! Everything below the facade is generic over [`store::backend::KvBackend`],
//! so the same code runs over files on disk or an in-memory map in tests.
//!
//! ## Durability Rules
//!
//! - A record never references a file outside the managed image directory.
//!   Picker paths are copied in before the record is saved.
//! - A record's image files are deleted only after the document that stops
//!   referencing them has been written. A crash in between leaves orphans,
//!   never dangling references; orphans are swept by cleanup.
//! - All writers of the `records` document go through one mutation lock.
//!
//! ## Logging
//!
//! The crate logs through `tracing` and never installs a subscriber.

pub mod api;
pub mod backup;
pub mod clock;
pub mod config;
pub mod error;
pub mod model;
pub mod orchestrator;
pub mod store;

#[cfg(any(test, feature = "test_utils"))]
pub mod test_utils;

pub use api::{open, HerdApi};
pub use error::{HerdError, Result};
