//! Content digest validation and manipulation.
//!
//! This module wraps `oci_spec::image::Digest` so digests parsed from
//! references and digests returned by registries go through the same
//! validation and report failures as [`ParseError::InvalidDigest`].

use crate::error::ParseError;
use oci_spec::image::Digest as OciDigest;
use sha2::{Digest as Sha2Digest, Sha256};
use std::fmt;
use std::str::FromStr;


/// A content digest such as `sha256:<hex>`.
///
/// Digests are immutable and only ever compared for equality.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Digest(OciDigest);

impl FromStr for Digest {
    type Err = ParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let oci_digest = OciDigest::from_str(s).map_err(|e| ParseError::InvalidDigest {
            digest: s.to_string(),
            source: Some(Box::new(e)),
        })?;
        Ok(Digest(oci_digest))
    }
}

impl fmt::Display for Digest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

impl Digest {
    /// Computes the sha256 digest of `bytes`.
    ///
    /// # Examples
    ///
    /// ```
    /// use libregtag::digest::Digest;
    ///
    /// let digest = Digest::sha256(b"").unwrap();
    /// assert_eq!(
    ///     digest.to_string(),
    ///     "sha256:e3b0c44298fc1c149afbf4c8996fb92427ae41e4649b934ca495991b7852b855"
    /// );
    /// ```
    pub fn sha256(bytes: &[u8]) -> Result<Self, ParseError> {
        let mut hasher = Sha256::new();
        hasher.update(bytes);
        format!("sha256:{:x}", hasher.finalize()).parse()
    }

    /// Returns the algorithm part, e.g. `sha256`.
    pub fn algorithm(&self) -> &str {
        self.0.algorithm().as_ref()
    }

    /// Returns the encoded hash part.
    pub fn hex(&self) -> &str {
        self.0.digest()
    }
}
