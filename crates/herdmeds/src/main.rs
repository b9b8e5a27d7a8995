//! # herdmeds CLI
//!
//! A terminal client for the `herdmedsapp` library. The binary is thin: this
//! file only invokes `cli::run()` and handles process termination.
//!
//! ## Layering
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────┐
//! │  CLI Layer (crates/herdmeds/src/cli/)                    │
//! │  - clap argument parsing (setup.rs)                      │
//! │  - logging init + dispatch (commands.rs)                 │
//! │  - input validation + API calls (handlers.rs)            │
//! │  - terminal rendering (render.rs, styles.rs)             │
//! └──────────────────────────────────────────────────────────┘
//!                            │
//!                            ▼
//! ┌──────────────────────────────────────────────────────────┐
//! │  API Layer (herdmedsapp::api)                            │
//! │  - Record CRUD, favorites, backups, startup reconcile    │
//! │  - Returns structured values, never prints               │
//! └──────────────────────────────────────────────────────────┘
//! ```
//!
//! Everything from the API inward is UI agnostic. The CLI owns argument
//! parsing, the validation rules a form would enforce (image count, required
//! preparation method for home remedies), rendering, and exit codes.
//!
//! ## Testing Approach
//!
//! - Rendering is tested with canned records in `render.rs`.
//! - End-to-end behavior is tested in `tests/` by running the binary against
//!   a temporary data directory.

mod cli;

fn main() {
    if let Err(e) = cli::run() {
        eprintln!("Error: {}", e);
        std::process::exit(1);
    }
}
