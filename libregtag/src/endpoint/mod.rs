//! Registry endpoints and their discovery.
//!
//! A [`RegistryEndpoint`] is one candidate base URL for a registry domain,
//! tagged with the API version it speaks and how TLS is handled. A
//! [`ServiceDiscovery`] produces the ordered candidate list for a domain;
//! [`DefaultServiceDiscovery`] derives it from the registry configuration.

use crate::config::Registries;
use crate::error::BoxError;
use crate::reference::DEFAULT_DOMAIN;
use std::fmt;
use url::Url;


/// Endpoint serving Docker Hub's v2 API.
const DOCKER_HUB_REGISTRY: &str = "https://registry-1.docker.io";

/// Legacy Docker Hub index.
const DOCKER_HUB_INDEX: &str = "https://index.docker.io";

/// Registry API version spoken by an endpoint.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ApiVersion {
    V1,
    V2,
}

impl fmt::Display for ApiVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ApiVersion::V1 => write!(f, "v1"),
            ApiVersion::V2 => write!(f, "v2"),
        }
    }
}

/// How the transport to an endpoint treats TLS.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TlsPolicy {
    /// HTTPS with certificate verification.
    Verify,
    /// HTTPS accepting any certificate.
    SkipVerify,
    /// Plain HTTP.
    Plaintext,
}

/// One candidate base URL for a registry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RegistryEndpoint {
    pub url: Url,
    pub version: ApiVersion,
    pub tls: TlsPolicy,
}

impl RegistryEndpoint {
    /// Creates an endpoint from a URL string.
    ///
    /// # Examples
    ///
    /// ```
    /// use libregtag::endpoint::{ApiVersion, RegistryEndpoint, TlsPolicy};
    ///
    /// let endpoint = RegistryEndpoint::new("https://ghcr.io", ApiVersion::V2, TlsPolicy::Verify)
    ///     .unwrap();
    /// assert_eq!(endpoint.to_string(), "https://ghcr.io/ (v2)");
    /// ```
    pub fn new(url: &str, version: ApiVersion, tls: TlsPolicy) -> Result<Self, url::ParseError> {
        Ok(Self {
            url: Url::parse(url)?,
            version,
            tls,
        })
    }

    /// Creates a v2 endpoint with verified TLS.
    pub fn v2(url: &str) -> Result<Self, url::ParseError> {
        Self::new(url, ApiVersion::V2, TlsPolicy::Verify)
    }
}

impl fmt::Display for RegistryEndpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({})", self.url, self.version)
    }
}

/// Source of candidate endpoints for registry domains.
///
/// Candidates are returned in priority order; the prober uses the first one
/// that confirms the v2 API.
pub trait ServiceDiscovery: Send + Sync {
    fn lookup_endpoints(&self, domain: &str) -> Result<Vec<RegistryEndpoint>, BoxError>;
}

/// Discovery driven by the registry configuration.
///
/// - `docker.io`: configured mirrors, then `https://registry-1.docker.io`.
/// - other domains: `https://<domain>`, plus `http://<domain>` for insecure
///   or loopback registries.
/// - when `v2_only` is disabled, a v1 candidate is appended.
#[derive(Debug, Clone, Default)]
pub struct DefaultServiceDiscovery {
    registries: Registries,
}

impl DefaultServiceDiscovery {
    pub fn new(registries: Registries) -> Self {
        Self { registries }
    }

    fn is_insecure(&self, domain: &str) -> bool {
        self.registries.insecure.iter().any(|d| d == domain)
    }

    fn hub_endpoints(&self) -> Result<Vec<RegistryEndpoint>, url::ParseError> {
        let mut endpoints = self
            .registries
            .mirrors
            .iter()
            .map(|mirror| RegistryEndpoint::v2(mirror))
            .collect::<Result<Vec<_>, _>>()?;
        endpoints.push(RegistryEndpoint::v2(DOCKER_HUB_REGISTRY)?);
        if !self.registries.v2_only {
            endpoints.push(RegistryEndpoint::new(
                DOCKER_HUB_INDEX,
                ApiVersion::V1,
                TlsPolicy::Verify,
            )?);
        }
        Ok(endpoints)
    }

    fn domain_endpoints(&self, domain: &str) -> Result<Vec<RegistryEndpoint>, url::ParseError> {
        let insecure = self.is_insecure(domain);
        let https = format!("https://{}", domain);

        let tls = if insecure {
            TlsPolicy::SkipVerify
        } else {
            TlsPolicy::Verify
        };
        let mut endpoints = vec![RegistryEndpoint::new(&https, ApiVersion::V2, tls)?];

        if insecure || is_loopback(domain) {
            endpoints.push(RegistryEndpoint::new(
                &format!("http://{}", domain),
                ApiVersion::V2,
                TlsPolicy::Plaintext,
            )?);
        }
        if !self.registries.v2_only {
            endpoints.push(RegistryEndpoint::new(&https, ApiVersion::V1, tls)?);
        }
        Ok(endpoints)
    }
}

impl ServiceDiscovery for DefaultServiceDiscovery {
    fn lookup_endpoints(&self, domain: &str) -> Result<Vec<RegistryEndpoint>, BoxError> {
        let endpoints = if domain == DEFAULT_DOMAIN {
            self.hub_endpoints()?
        } else {
            self.domain_endpoints(domain)?
        };
        Ok(endpoints)
    }
}

/// Returns true for `localhost`, `127.0.0.1` and `::1`, with or without port.
fn is_loopback(domain: &str) -> bool {
    let host = match domain.strip_prefix('[') {
        Some(rest) => rest.split(']').next().unwrap_or(rest),
        None => domain.split(':').next().unwrap_or(domain),
    };
    matches!(host, "localhost" | "127.0.0.1" | "::1")
}
