//! Regtag - Container Image Reference Resolution Library
//!
//! Regtag turns a human-written image reference such as `alpine`,
//! `ghcr.io/org/app:1.2` or `localhost:5000/app@sha256:...` into either the
//! list of tags of its repository or the content digest it points to.
//!
//! # Quick Start
//!
//! ```no_run
//! use libregtag::Regtag;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     libregtag::init(false)?;
//!
//!     let regtag = Regtag::new()?;
//!     for tag in regtag.get_tags("library/alpine").await? {
//!         println!("{}", tag);
//!     }
//!
//!     let digest = regtag.get_digest("library/alpine:3.19").await?;
//!     println!("{}", digest);
//!     Ok(())
//! }
//! ```
//!
//! # How a lookup works
//!
//! 1. The reference is parsed and normalized ([`Reference`]).
//! 2. Credentials for the registry domain are resolved, by default from the
//!    Docker client configuration, and candidate endpoints are discovered.
//! 3. Candidates are probed in order; the first that confirms the v2 API
//!    becomes the session.
//! 4. The session lists tags or resolves the tag to a digest.
//!
//! References that already carry a digest are answered without any network
//! traffic.
//!
//! # Main Types
//!
//! - [`Regtag`] - Main entry point
//! - [`RegtagBuilder`] - Builder for configuration and injected collaborators
//! - [`Reference`] - Image reference parsing
//! - [`Digest`] - Content digest
//! - [`RegtagError`] - Error type of every operation

#![warn(clippy::all)]

/// Returns the libregtag crate version.
///
/// # Examples
///
/// ```
/// let version = libregtag::version();
/// assert!(!version.is_empty());
/// ```
pub fn version() -> &'static str {
    env!("CARGO_PKG_VERSION")
}

// High-level public API (main entry point)
mod regtag;
pub use regtag::{Regtag, RegtagBuilder};

pub use auth::AuthContext;
pub use config::Config;
pub use digest::Digest;
pub use error::{RegtagError, Result};
pub use logging::init;
pub use reference::Reference;

// Lower-level building blocks, public for callers that need to plug in
// their own credential store or endpoint discovery.
#[doc(hidden)]
pub mod auth;
#[doc(hidden)]
pub mod client;
#[doc(hidden)]
pub mod config;
#[doc(hidden)]
pub mod digest;
#[doc(hidden)]
pub mod endpoint;
#[doc(hidden)]
pub mod error;
#[doc(hidden)]
pub mod locator;
#[doc(hidden)]
pub mod logging;
#[doc(hidden)]
pub mod probe;
#[doc(hidden)]
pub mod reference;
#[doc(hidden)]
pub mod session;
