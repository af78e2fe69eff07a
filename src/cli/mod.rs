//! Command Line Interface (CLI) layer for synthpro.
//!
//! This module defines argument parsing (`args`), error types (`errors`),
//! and the orchestration logic (`runner`): presets and flag overrides, dry
//! runs, and the full synthesis/composite/upload batch exposed via
//! `synthpro::api`.
pub mod args;
pub mod errors;
pub mod runner;

pub use args::CliArgs;
pub use runner::run;
