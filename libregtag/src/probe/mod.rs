//! Endpoint probing.
//!
//! Candidates are tried strictly in order. Only v2 endpoints are contacted;
//! the first one whose `/v2/` handshake confirms the API becomes the
//! session. Handshake failures of any kind just move on to the next
//! candidate.

use crate::auth::AuthContext;
use crate::client::{Client, ClientConfig};
use crate::endpoint::{ApiVersion, RegistryEndpoint};
use crate::error::ProbeError;
use crate::session::RegistrySession;
use tracing::debug;


/// Finds the first candidate endpoint that confirms the v2 API.
#[derive(Debug, Clone, Default)]
pub struct EndpointProber {
    config: ClientConfig,
}

impl EndpointProber {
    pub fn new(config: ClientConfig) -> Self {
        Self { config }
    }

    /// Probes `endpoints` in order and opens a session for `repository` on
    /// the first confirmed v2 endpoint.
    ///
    /// # Errors
    ///
    /// [`ProbeError::NoV2Endpoint`] once every candidate has been skipped or
    /// has failed to confirm.
    pub async fn probe(
        &self,
        endpoints: &[RegistryEndpoint],
        auth: &AuthContext,
        repository: &str,
    ) -> Result<RegistrySession, ProbeError> {
        for endpoint in endpoints {
            match endpoint.version {
                ApiVersion::V1 => {
                    debug!(endpoint = %endpoint.url, "skipping v1 endpoint");
                    continue;
                }
                ApiVersion::V2 => {}
            }

            debug!(endpoint = %endpoint.url, tls = ?endpoint.tls, "probing endpoint");

            let client = match Client::with_config(endpoint, auth.clone(), &self.config) {
                Ok(client) => client,
                Err(e) => {
                    debug!(endpoint = %endpoint.url, error = %e, "cannot create client");
                    continue;
                }
            };

            match client.check_version().await {
                Ok(version) if version.confirms_v2() => {
                    debug!(
                        endpoint = %endpoint.url,
                        status = version.status,
                        "endpoint confirmed v2"
                    );
                    return Ok(RegistrySession::new(
                        client,
                        endpoint.clone(),
                        repository,
                        version.challenge,
                    ));
                }
                Ok(version) => {
                    debug!(
                        endpoint = %endpoint.url,
                        status = version.status,
                        api_version = ?version.api_version,
                        "endpoint did not confirm v2"
                    );
                }
                Err(e) => {
                    debug!(endpoint = %endpoint.url, error = %e, "endpoint handshake failed");
                }
            }
        }

        Err(ProbeError::NoV2Endpoint {
            candidates: endpoints.len(),
        })
    }
}
