//! Installer image builder.
//!
//! Turns an application directory or archive, plus an optional bundled
//! runtime, into a platform installer. Every installer goes through the same
//! staged [`pipeline`]: the application tree is located and copied into an
//! image directory, the runtime is placed beside it, a [`backend`] customizes
//! the layout, unwanted files are removed, extra files are merged in, and
//! the backend finalizes the image and builds the package.
//!
//! The public API is organised into four layers:
//!
//! - **[`pattern`], [`tokens`], [`arch`]** pure helpers for glob matching,
//!   template substitution and architecture names
//! - **[`config`], [`context`]** configuration values and per-run state
//! - **[`pipeline`], [`backend`]** the staged image build and its installer
//!   formats (deb, rpm, self-extracting tar script, Inno Setup)
//! - **[`commands`]** top-level subcommand orchestration
#![deny(clippy::or_fun_call)]
#![deny(clippy::bool_to_int_with_if)]

pub mod arch;
pub mod archive;
pub mod backend;
pub mod cli;
pub mod commands;
pub mod config;
pub mod context;
pub mod error;
pub mod exec;
pub mod fsutil;
pub mod logging;
pub mod pattern;
pub mod pipeline;
pub mod templates;
pub mod tokens;
