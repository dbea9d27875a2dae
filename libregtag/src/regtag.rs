//! High-level API for the regtag library.
//!
//! [`Regtag`] answers the two questions a deployment tool asks about an image
//! reference: which tags exist, and which digest a tag points to. Each call
//! parses the reference, locates the registry, probes its endpoints and
//! queries the first one that speaks the v2 API. Nothing is kept between
//! calls.
//!
//! # Examples
//!
//! ```no_run
//! use libregtag::Regtag;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let regtag = Regtag::new()?;
//!
//!     let tags = regtag.get_tags("alpine").await?;
//!     println!("{} tags", tags.len());
//!
//!     let digest = regtag.get_digest("alpine:3.19").await?;
//!     println!("{}", digest);
//!     Ok(())
//! }
//! ```

use crate::auth::{CredentialResolver, DockerCredentialResolver};
use crate::client::ClientConfig;
use crate::config::Config;
use crate::digest::Digest;
use crate::endpoint::{DefaultServiceDiscovery, ServiceDiscovery};
use crate::error::{RegtagError, Result};
use crate::locator::RepositoryLocator;
use crate::probe::EndpointProber;
use crate::reference::Reference;
use crate::session::RegistrySession;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::debug;

#[cfg(test)]
#[path = "regtag_tests.rs"]
mod tests;

/// Entry point for tag listing and digest resolution.
///
/// `Regtag` is cheap to share: it holds only configuration and the injected
/// credential and discovery sources, and is `Send + Sync`. Lookups must run
/// inside a tokio runtime; credential and discovery sources are called on
/// its blocking pool.
///
/// # Examples
///
/// ```no_run
/// use libregtag::{Config, Regtag};
///
/// # fn example() -> libregtag::Result<()> {
/// let mut config = Config::default();
/// config.registries.insecure.push("registry.local:5000".to_string());
///
/// let regtag = Regtag::builder().with_config(config).build()?;
/// # Ok(())
/// # }
/// ```
#[derive(Debug, Clone)]
pub struct Regtag {
    config: Config,
    locator: RepositoryLocator,
    prober: EndpointProber,
}

impl Regtag {
    /// Creates a client with default configuration, Docker credentials and
    /// default endpoint discovery.
    pub fn new() -> Result<Self> {
        RegtagBuilder::new().build()
    }

    /// Create a builder for advanced configuration.
    pub fn builder() -> RegtagBuilder {
        RegtagBuilder::new()
    }

    /// Returns the configuration in use.
    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Lists the tags of the repository named by `reference`.
    ///
    /// # Errors
    ///
    /// Fails with [`RegtagError::InvalidInput`] before any network contact
    /// when the reference already carries a tag.
    pub async fn get_tags(&self, reference: &str) -> Result<Vec<String>> {
        let reference: Reference = reference.parse()?;
        self.list_tags(&reference).await
    }

    /// Resolves `reference` to a content digest.
    ///
    /// A reference that carries a digest is answered directly, without
    /// contacting any registry. Otherwise its tag, or `latest`, is resolved.
    pub async fn get_digest(&self, reference: &str) -> Result<Digest> {
        let reference: Reference = reference.parse()?;
        self.resolve_digest(&reference).await
    }

    /// Lists the tags of an already parsed reference.
    pub async fn list_tags(&self, reference: &Reference) -> Result<Vec<String>> {
        if reference.tag().is_some() {
            return Err(RegtagError::invalid_input(format!(
                "reference already has a tag: {}",
                reference
            )));
        }

        let mut session = self.open_session(reference).await?;

        debug!(%reference, phase = "querying", "listing tags");
        let tags = session.list_tags().await?;

        debug!(%reference, phase = "done", count = tags.len(), "listed tags");
        Ok(tags)
    }

    /// Resolves an already parsed reference to a content digest.
    pub async fn resolve_digest(&self, reference: &Reference) -> Result<Digest> {
        if let Some(digest) = reference.digest() {
            debug!(%reference, "reference carries a digest");
            return Ok(digest.clone());
        }

        let tag = reference.tag_or_default();
        let mut session = self.open_session(reference).await?;

        debug!(%reference, %tag, phase = "querying", "resolving tag");
        let digest = session.resolve_tag(tag).await?;

        debug!(%reference, %digest, phase = "done", "resolved digest");
        Ok(digest)
    }

    async fn open_session(&self, reference: &Reference) -> Result<RegistrySession> {
        debug!(%reference, phase = "resolving", "locating repository");
        // Credential lookups read files and may run helper processes.
        let locator = self.locator.clone();
        let target = reference.clone();
        let located = tokio::task::spawn_blocking(move || locator.resolve(&target))
            .await
            .map_err(|e| RegtagError::Task {
                message: format!("locating {} did not complete", reference),
                source: Some(Box::new(e)),
            })??;

        debug!(
            %reference,
            phase = "probing",
            candidates = located.endpoints.len(),
            "probing endpoints"
        );
        let session = self
            .prober
            .probe(&located.endpoints, &located.auth, reference.path())
            .await?;

        Ok(session.with_page_size(self.config.tags.page_size))
    }
}

/// Builder for [`Regtag`].
///
/// Credential and discovery sources can be replaced, e.g. with fakes in
/// tests or with an organisation specific credential store.
#[derive(Default)]
pub struct RegtagBuilder {
    config: Option<Config>,
    config_path: Option<PathBuf>,
    credentials: Option<Arc<dyn CredentialResolver>>,
    discovery: Option<Arc<dyn ServiceDiscovery>>,
}

impl RegtagBuilder {
    /// Create a new builder.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set configuration directly.
    pub fn with_config(mut self, config: Config) -> Self {
        self.config = Some(config);
        self
    }

    /// Load configuration from a YAML file when building.
    ///
    /// Takes precedence over [`RegtagBuilder::with_config`].
    pub fn with_config_file(mut self, path: impl Into<PathBuf>) -> Self {
        self.config_path = Some(path.into());
        self
    }

    /// Set the credential source.
    pub fn with_credential_resolver(mut self, resolver: impl CredentialResolver + 'static) -> Self {
        self.credentials = Some(Arc::new(resolver));
        self
    }

    /// Set the endpoint discovery source.
    pub fn with_service_discovery(mut self, discovery: impl ServiceDiscovery + 'static) -> Self {
        self.discovery = Some(Arc::new(discovery));
        self
    }

    /// Build the `Regtag` instance.
    ///
    /// # Errors
    ///
    /// Fails with [`RegtagError::Config`] if a configuration file was given
    /// and cannot be loaded.
    pub fn build(self) -> Result<Regtag> {
        let config = match &self.config_path {
            Some(path) => Config::load(Some(path.as_path()))?,
            None => self.config.unwrap_or_default(),
        };

        let credentials = self.credentials.unwrap_or_else(|| {
            let mut resolver = DockerCredentialResolver::new();
            if let Some(path) = &config.auth.docker_config {
                resolver = resolver.with_config_path(path.clone());
            }
            Arc::new(resolver) as Arc<dyn CredentialResolver>
        });
        let discovery = self.discovery.unwrap_or_else(|| {
            Arc::new(DefaultServiceDiscovery::new(config.registries.clone()))
                as Arc<dyn ServiceDiscovery>
        });

        Ok(Regtag {
            locator: RepositoryLocator::new(credentials, discovery),
            prober: EndpointProber::new(ClientConfig::from(&config.network)),
            config,
        })
    }
}

impl std::fmt::Debug for RegtagBuilder {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RegtagBuilder")
            .field("config", &self.config)
            .field("config_path", &self.config_path)
            .finish_non_exhaustive()
    }
}
