//! Console and log file output built on `tracing`.
//!
//! Events on the [`STAGE_TARGET`] target are rendered as `==>` headers;
//! everything else is indented under the current stage.

mod subscriber;
mod utils;

pub use subscriber::init_subscriber;

/// Tracing target used for pipeline stage headers.
pub const STAGE_TARGET: &str = "app_packager::stage";

/// Serializes `XDG_CACHE_HOME` manipulation across parallel test threads.
#[cfg(test)]
pub(crate) static TEST_ENV_MUTEX: std::sync::Mutex<()> = std::sync::Mutex::new(());
