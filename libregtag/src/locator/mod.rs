//! Repository location: credentials and candidate endpoints.

use crate::auth::{AuthContext, CredentialResolver};
use crate::endpoint::{RegistryEndpoint, ServiceDiscovery};
use crate::error::LocatorError;
use crate::reference::Reference;
use std::sync::Arc;
use tracing::debug;

#[cfg(test)]
mod tests;

/// Where and how to reach a repository.
#[derive(Debug, Clone)]
pub struct Located {
    /// Credentials for the registry index.
    pub auth: AuthContext,
    /// Candidate endpoints in priority order; never empty.
    pub endpoints: Vec<RegistryEndpoint>,
}

/// Resolves credentials and candidate endpoints for a reference.
#[derive(Clone)]
pub struct RepositoryLocator {
    credentials: Arc<dyn CredentialResolver>,
    discovery: Arc<dyn ServiceDiscovery>,
}

impl RepositoryLocator {
    pub fn new(
        credentials: Arc<dyn CredentialResolver>,
        discovery: Arc<dyn ServiceDiscovery>,
    ) -> Self {
        Self {
            credentials,
            discovery,
        }
    }

    /// Locates the repository of `reference`.
    ///
    /// Missing credentials resolve to anonymous access.
    ///
    /// # Errors
    ///
    /// - [`LocatorError::NoCredentials`] if the credential lookup fails
    /// - [`LocatorError::NoEndpoints`] if discovery fails or finds nothing
    pub fn resolve(&self, reference: &Reference) -> Result<Located, LocatorError> {
        let domain = reference.domain();

        let auth = self
            .credentials
            .lookup(domain)
            .map_err(|source| LocatorError::NoCredentials {
                domain: domain.to_string(),
                source,
            })?;

        let endpoints =
            self.discovery
                .lookup_endpoints(domain)
                .map_err(|source| LocatorError::NoEndpoints {
                    domain: domain.to_string(),
                    source: Some(source),
                })?;

        if endpoints.is_empty() {
            return Err(LocatorError::NoEndpoints {
                domain: domain.to_string(),
                source: None,
            });
        }

        debug!(
            %domain,
            anonymous = auth.is_anonymous(),
            candidates = endpoints.len(),
            "located repository"
        );
        Ok(Located { auth, endpoints })
    }
}

impl std::fmt::Debug for RepositoryLocator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RepositoryLocator").finish_non_exhaustive()
    }
}
