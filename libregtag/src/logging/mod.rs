//! Diagnostic logging setup.

use crate::error::{RegtagError, Result};
use tracing_subscriber::EnvFilter;


/// Filter used when `RUST_LOG` is unset.
const DEFAULT_FILTER: &str = "warn";

/// Installs the global tracing subscriber, writing to stderr.
///
/// With `debug` set every `debug` event is shown; otherwise the level comes
/// from `RUST_LOG`, defaulting to `warn`. Logging can be set up once per
/// process; later calls fail with [`RegtagError::Config`].
///
/// # Examples
///
/// ```
/// let _ = libregtag::init(false);
/// assert!(libregtag::init(true).is_err());
/// ```
pub fn init(debug: bool) -> Result<()> {
    let filter = if debug {
        EnvFilter::new("debug")
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_FILTER))
    };

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .try_init()
        .map_err(|e| {
            RegtagError::Config {
                message: "Logging is already initialized".to_string(),
                path: None,
                source: Some(e),
            }
        })
}
