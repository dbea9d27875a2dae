//! HTTP client for registry communication.
//!
//! This module provides a thin HTTP client built on reqwest for talking to
//! one registry endpoint over the Distribution v2 API: the `/v2/` handshake,
//! paginated tag listing, manifest digests and the token exchange that
//! precedes them on most public registries.

use crate::auth::{AuthChallenge, AuthContext};
use crate::config::Network;
use crate::digest::Digest;
use crate::endpoint::{RegistryEndpoint, TlsPolicy};
use crate::error::SessionError;
use reqwest::header::{ACCEPT, AUTHORIZATION, HeaderMap, LINK, RETRY_AFTER, WWW_AUTHENTICATE};
use reqwest::{Client as ReqwestClient, Method, Response, StatusCode};
use serde::Deserialize;
use std::collections::HashSet;
use std::time::Duration;
use tracing::debug;
use url::Url;


/// Header announcing the registry API version.
pub const API_VERSION_HEADER: &str = "Docker-Distribution-API-Version";

/// Value of [`API_VERSION_HEADER`] for v2 registries.
pub const API_VERSION_V2: &str = "registry/2.0";

const CONTENT_DIGEST_HEADER: &str = "Docker-Content-Digest";

/// Manifest media types accepted when resolving a tag.
const MANIFEST_ACCEPT: &str = "application/vnd.oci.image.manifest.v1+json, \
     application/vnd.oci.image.index.v1+json, \
     application/vnd.docker.distribution.manifest.v2+json, \
     application/vnd.docker.distribution.manifest.list.v2+json";

/// Upper bound on tag pages followed in one listing.
const MAX_TAG_PAGES: usize = 10_000;

/// `client_id` sent with refresh token grants.
const TOKEN_CLIENT_ID: &str = "regtag";

/// Response from the tags list API endpoint.
#[derive(Debug, Deserialize)]
struct TagsResponse {
    /// List of tag names; `null` for repositories without tags
    #[serde(default)]
    tags: Option<Vec<String>>,
}

/// Response from a token server.
#[derive(Debug, Deserialize)]
struct TokenResponse {
    token: Option<String>,
    access_token: Option<String>,
}

/// Outcome of the `/v2/` handshake.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RegistryVersion {
    /// HTTP status of the handshake response.
    pub status: u16,

    /// The Docker-Distribution-API-Version header value, if present.
    /// Typically "registry/2.0" for v2 registries.
    pub api_version: Option<String>,

    /// Authentication challenge sent with a 401 response.
    pub challenge: Option<AuthChallenge>,
}

impl RegistryVersion {
    /// Returns true when the endpoint confirmed the v2 API.
    ///
    /// Both a 200 and a 401 count, as long as the version header declares
    /// `registry/2.0`.
    ///
    /// # Examples
    ///
    /// ```
    /// use libregtag::client::RegistryVersion;
    ///
    /// let version = RegistryVersion {
    ///     status: 401,
    ///     api_version: Some("registry/2.0".to_string()),
    ///     challenge: None,
    /// };
    /// assert!(version.confirms_v2());
    /// ```
    pub fn confirms_v2(&self) -> bool {
        let status_ok = self.status == StatusCode::OK.as_u16()
            || self.status == StatusCode::UNAUTHORIZED.as_u16();
        let declares_v2 = self.api_version.as_deref().is_some_and(|value| {
            value
                .split(|c: char| c == ',' || c.is_whitespace())
                .any(|version| version.trim() == API_VERSION_V2)
        });
        status_ok && declares_v2
    }
}

/// Configuration for the HTTP client.
///
/// # Examples
///
/// ```
/// use libregtag::client::ClientConfig;
///
/// let config = ClientConfig::new()
///     .with_timeout(60)
///     .with_probe_timeout(2)
///     .with_max_idle_per_host(20);
/// assert_eq!(config.probe_timeout_seconds, 2);
/// ```
#[derive(Debug, Clone)]
pub struct ClientConfig {
    /// Request timeout in seconds (default: 30)
    pub timeout_seconds: u64,
    /// Handshake timeout in seconds (default: 5)
    pub probe_timeout_seconds: u64,
    /// Maximum idle connections per host (default: 10)
    pub max_idle_per_host: usize,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self::from(&Network::default())
    }
}

impl From<&Network> for ClientConfig {
    fn from(network: &Network) -> Self {
        Self {
            timeout_seconds: network.timeout,
            probe_timeout_seconds: network.probe_timeout,
            max_idle_per_host: network.max_idle_per_host,
        }
    }
}

impl ClientConfig {
    /// Creates a new configuration with default values.
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the request timeout in seconds.
    pub fn with_timeout(mut self, seconds: u64) -> Self {
        self.timeout_seconds = seconds;
        self
    }

    /// Sets the handshake timeout in seconds.
    pub fn with_probe_timeout(mut self, seconds: u64) -> Self {
        self.probe_timeout_seconds = seconds;
        self
    }

    /// Sets the maximum idle connections per host.
    pub fn with_max_idle_per_host(mut self, max: usize) -> Self {
        self.max_idle_per_host = max;
        self
    }
}

/// HTTP client bound to one registry endpoint.
///
/// The client owns its connection pool and the credentials of the lookup.
/// Once a challenge has been answered, the resulting `Authorization` header
/// is sent with every following request.
#[derive(Debug, Clone)]
pub struct Client {
    /// The underlying HTTP client
    http_client: ReqwestClient,
    /// Base endpoint URL, always ending in '/'
    registry_url: Url,
    /// Credentials of the lookup
    auth: AuthContext,
    /// Authorization header obtained from a challenge
    authorization: Option<String>,
    probe_timeout: Duration,
}

impl Client {
    /// Creates a new client for the endpoint with default configuration.
    ///
    /// # Examples
    ///
    /// ```
    /// use libregtag::auth::AuthContext;
    /// use libregtag::client::Client;
    /// use libregtag::endpoint::RegistryEndpoint;
    ///
    /// let endpoint = RegistryEndpoint::v2("https://ghcr.io").unwrap();
    /// let client = Client::new(&endpoint, AuthContext::Anonymous).unwrap();
    /// assert_eq!(client.registry_url().as_str(), "https://ghcr.io/");
    /// ```
    pub fn new(endpoint: &RegistryEndpoint, auth: AuthContext) -> Result<Self, SessionError> {
        Self::with_config(endpoint, auth, &ClientConfig::default())
    }

    /// Creates a new client for the endpoint with custom configuration.
    pub fn with_config(
        endpoint: &RegistryEndpoint,
        auth: AuthContext,
        config: &ClientConfig,
    ) -> Result<Self, SessionError> {
        let registry_url = Self::normalize_url(&endpoint.url);

        let http_client = ReqwestClient::builder()
            .timeout(Duration::from_secs(config.timeout_seconds))
            .pool_max_idle_per_host(config.max_idle_per_host)
            .danger_accept_invalid_certs(endpoint.tls == TlsPolicy::SkipVerify)
            .build()
            .map_err(|e| SessionError::transport_with_source("Failed to create HTTP client", e))?;

        Ok(Self {
            http_client,
            registry_url,
            auth,
            authorization: None,
            probe_timeout: Duration::from_secs(config.probe_timeout_seconds),
        })
    }

    /// Ensures the base URL ends with '/' so relative joins keep its path.
    fn normalize_url(url: &Url) -> Url {
        let mut url = url.clone();
        if !url.path().ends_with('/') {
            let path = format!("{}/", url.path());
            url.set_path(&path);
        }
        url
    }

    /// Returns the base endpoint URL.
    pub fn registry_url(&self) -> &Url {
        &self.registry_url
    }

    fn endpoint_url(&self, path: &str) -> Result<Url, SessionError> {
        self.registry_url.join(path).map_err(|e| {
            SessionError::invalid_response_with_source(
                format!("Invalid request path '{}'", path),
                e,
            )
        })
    }

    /// Performs the `/v2/` handshake.
    ///
    /// The handshake uses the probe timeout rather than the request timeout.
    /// Any HTTP answer is returned as a [`RegistryVersion`]; only transport
    /// failures are errors. Use [`RegistryVersion::confirms_v2`] to decide
    /// whether the endpoint speaks the v2 API.
    pub async fn check_version(&self) -> Result<RegistryVersion, SessionError> {
        let url = self.endpoint_url("v2/")?;

        let mut request = self.http_client.get(url).timeout(self.probe_timeout);
        if let Some(header) = self.auth.to_header_value() {
            request = request.header(AUTHORIZATION, header);
        }

        let response = request
            .send()
            .await
            .map_err(|e| Self::translate_reqwest_error(e, self.registry_url.as_str()))?;

        let api_version = response
            .headers()
            .get(API_VERSION_HEADER)
            .and_then(|v| v.to_str().ok())
            .map(|s| s.to_string());

        let status = response.status();
        let challenge = if status == StatusCode::UNAUTHORIZED {
            Self::extract_challenge(response.headers())
        } else {
            None
        };

        Ok(RegistryVersion {
            status: status.as_u16(),
            api_version,
            challenge,
        })
    }

    /// Answers an authentication challenge for `repository`.
    ///
    /// A `Bearer` challenge is exchanged for a pull token at the challenge
    /// realm; a `Basic` challenge uses the basic credentials directly.
    pub async fn authorize(
        &mut self,
        challenge: &AuthChallenge,
        repository: &str,
    ) -> Result<(), SessionError> {
        if challenge.is_bearer() {
            if let AuthContext::Bearer { token } = &self.auth {
                self.authorization = Some(format!("Bearer {}", token));
                return Ok(());
            }
            let scope = format!("repository:{}:pull", repository);
            let token = self.fetch_token(challenge, &scope).await?;
            self.authorization = Some(format!("Bearer {}", token));
            Ok(())
        } else if challenge.is_basic() {
            match &self.auth {
                AuthContext::Basic { .. } => {
                    self.authorization = self.auth.to_header_value();
                    Ok(())
                }
                _ => Err(SessionError::unauthorized(
                    format!(
                        "{} requires basic authentication but no credentials are configured",
                        self.registry_url
                    ),
                    Some(401),
                )),
            }
        } else {
            Err(SessionError::unauthorized(
                format!("Unsupported authentication scheme '{}'", challenge.scheme),
                Some(401),
            ))
        }
    }

    /// Requests a token from the challenge realm.
    async fn fetch_token(
        &self,
        challenge: &AuthChallenge,
        scope: &str,
    ) -> Result<String, SessionError> {
        debug!(realm = %challenge.realm, %scope, "requesting registry token");

        let request = match &self.auth {
            AuthContext::IdentityToken { token } => {
                let mut form = vec![
                    ("grant_type", "refresh_token"),
                    ("refresh_token", token.as_str()),
                    ("client_id", TOKEN_CLIENT_ID),
                    ("scope", scope),
                ];
                if let Some(service) = &challenge.service {
                    form.push(("service", service.as_str()));
                }
                self.http_client.post(&challenge.realm).form(&form)
            }
            auth => {
                let mut request = self.http_client.get(&challenge.realm);
                if let Some(service) = &challenge.service {
                    request = request.query(&[("service", service.as_str())]);
                }
                request = request.query(&[("scope", scope)]);
                if let AuthContext::Basic { username, password } = auth {
                    request = request.basic_auth(username, Some(password));
                }
                request
            }
        };

        let response = request
            .send()
            .await
            .map_err(|e| Self::translate_reqwest_error(e, &challenge.realm))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(SessionError::unauthorized(
                format!(
                    "Token request to {} failed: {}",
                    challenge.realm,
                    body.trim()
                ),
                Some(status.as_u16()),
            ));
        }

        let token: TokenResponse = response.json().await.map_err(|e| {
            SessionError::invalid_response_with_source("Failed to parse token response", e)
        })?;

        token
            .token
            .or(token.access_token)
            .filter(|t| !t.is_empty())
            .ok_or_else(|| SessionError::unauthorized("No token in token response", None))
    }

    /// Sends a request, answering one authentication challenge if needed.
    async fn send(
        &mut self,
        method: Method,
        url: &Url,
        accept: Option<&str>,
        repository: &str,
    ) -> Result<Response, SessionError> {
        let response = self.execute(method.clone(), url, accept).await?;
        if response.status() != StatusCode::UNAUTHORIZED {
            return Ok(response);
        }

        // Challenges from other hosts are not answered with our credentials.
        if !self.is_registry_origin(url) {
            return Ok(response);
        }
        let Some(challenge) = Self::extract_challenge(response.headers()) else {
            return Ok(response);
        };

        debug!(%url, scheme = %challenge.scheme, "registry requested authentication");
        self.authorize(&challenge, repository).await?;
        self.execute(method, url, accept).await
    }

    async fn execute(
        &self,
        method: Method,
        url: &Url,
        accept: Option<&str>,
    ) -> Result<Response, SessionError> {
        let mut request = self.http_client.request(method, url.clone());
        if let Some(accept) = accept {
            request = request.header(ACCEPT, accept);
        }
        if let Some(authorization) = &self.authorization {
            if self.is_registry_origin(url) {
                request = request.header(AUTHORIZATION, authorization);
            } else {
                debug!(%url, "not sending credentials to a foreign origin");
            }
        }

        request
            .send()
            .await
            .map_err(|e| Self::translate_reqwest_error(e, self.registry_url.as_str()))
    }

    /// Returns true when `url` has the scheme, host and port of the endpoint.
    fn is_registry_origin(&self, url: &Url) -> bool {
        url.origin() == self.registry_url.origin()
    }

    /// Fetches the tags of `repository`, following pagination to the end.
    ///
    /// Tags are returned in the order the registry sent them. If `limit` is
    /// set it is passed as the page size (`n`). A `Link` that points back at
    /// an already fetched page fails the call with
    /// [`SessionError::InvalidResponse`], as does exceeding the page limit.
    pub async fn fetch_tags_paginated(
        &mut self,
        repository: &str,
        limit: Option<u32>,
    ) -> Result<Vec<String>, SessionError> {
        let mut all_tags = Vec::new();
        let mut url = self.endpoint_url(&format!("v2/{}/tags/list", repository))?;

        if let Some(n) = limit {
            url.query_pairs_mut().append_pair("n", &n.to_string());
        }

        let mut visited = HashSet::new();
        let mut page = 1usize;
        loop {
            if !visited.insert(url.clone()) {
                return Err(SessionError::invalid_response(format!(
                    "Tag pagination for {} loops back to {}",
                    repository, url
                )));
            }
            if page > MAX_TAG_PAGES {
                return Err(SessionError::invalid_response(format!(
                    "Tag pagination for {} exceeds {} pages",
                    repository, MAX_TAG_PAGES
                )));
            }

            let response = self.send(Method::GET, &url, None, repository).await?;

            // Extract Link header for pagination before consuming response
            let next_url = Self::extract_next_link(response.headers(), &self.registry_url);

            let response = Self::check_response_status(response, || {
                SessionError::RepositoryNotFound {
                    repository: repository.to_string(),
                }
            })
            .await?;

            let tags_response: TagsResponse = response.json().await.map_err(|e| {
                SessionError::invalid_response_with_source("Failed to parse tags response", e)
            })?;
            let tags = tags_response.tags.unwrap_or_default();

            debug!(%repository, page, count = tags.len(), "fetched tag page");
            all_tags.extend(tags);

            match next_url {
                Some(next) => {
                    url = next;
                    page += 1;
                }
                None => break,
            }
        }

        Ok(all_tags)
    }

    /// Resolves a manifest reference (usually a tag) to its content digest.
    ///
    /// Issues a `HEAD` first and reads `Docker-Content-Digest`. Registries
    /// that omit the header on `HEAD` get a `GET`, and if the header is still
    /// missing the digest is computed from the manifest body.
    pub async fn fetch_manifest_digest(
        &mut self,
        repository: &str,
        reference: &str,
    ) -> Result<Digest, SessionError> {
        let url = self.endpoint_url(&format!("v2/{}/manifests/{}", repository, reference))?;
        let not_found = || SessionError::TagNotFound {
            repository: repository.to_string(),
            tag: reference.to_string(),
        };

        let response = self
            .send(Method::HEAD, &url, Some(MANIFEST_ACCEPT), repository)
            .await?;
        let response = Self::check_response_status(response, not_found).await?;
        if let Some(digest) = Self::extract_digest(response.headers())? {
            return Ok(digest);
        }

        debug!(%repository, %reference, "HEAD carried no digest, fetching manifest");
        let response = self
            .send(Method::GET, &url, Some(MANIFEST_ACCEPT), repository)
            .await?;
        let response = Self::check_response_status(response, not_found).await?;
        if let Some(digest) = Self::extract_digest(response.headers())? {
            return Ok(digest);
        }

        let body = response
            .bytes()
            .await
            .map_err(|e| SessionError::transport_with_source("Failed to read manifest response", e))?;
        Digest::sha256(&body).map_err(|e| {
            SessionError::invalid_response_with_source("Failed to compute manifest digest", e)
        })
    }

    fn extract_digest(headers: &HeaderMap) -> Result<Option<Digest>, SessionError> {
        let Some(value) = headers
            .get(CONTENT_DIGEST_HEADER)
            .and_then(|v| v.to_str().ok())
        else {
            return Ok(None);
        };
        value.trim().parse::<Digest>().map(Some).map_err(|e| {
            SessionError::invalid_response_with_source(
                format!("Registry returned an invalid digest '{}'", value),
                e,
            )
        })
    }

    fn extract_challenge(headers: &HeaderMap) -> Option<AuthChallenge> {
        headers
            .get(WWW_AUTHENTICATE)
            .and_then(|v| v.to_str().ok())
            .and_then(|v| AuthChallenge::parse(v).ok())
    }

    /// Extracts the next page URL from the Link header.
    ///
    /// Registries paginate with `Link: </v2/<name>/tags/list?n=100&last=x>; rel="next"`.
    /// The target may be relative to the endpoint or absolute.
    fn extract_next_link(headers: &HeaderMap, base: &Url) -> Option<Url> {
        let link_str = headers.get(LINK)?.to_str().ok()?;

        for link_part in link_str.split(',') {
            let link_part = link_part.trim();

            if link_part.contains("rel=\"next\"") || link_part.contains("rel='next'") {
                if let Some(start) = link_part.find('<')
                    && let Some(end) = link_part.find('>')
                    && start < end
                {
                    return base.join(&link_part[start + 1..end]).ok();
                }
            }
        }

        None
    }

    /// Parses a Retry-After header given in seconds.
    fn parse_retry_after(headers: &HeaderMap) -> Option<u64> {
        headers
            .get(RETRY_AFTER)?
            .to_str()
            .ok()?
            .trim()
            .parse::<u64>()
            .ok()
    }

    /// Translates a reqwest error into a transport error.
    fn translate_reqwest_error(error: reqwest::Error, url: &str) -> SessionError {
        if error.is_timeout() {
            SessionError::transport_with_source(format!("Request to {} timed out", url), error)
        } else if error.is_connect() {
            SessionError::transport_with_source(format!("Failed to connect to {}", url), error)
        } else if error.is_request() {
            SessionError::transport_with_source(format!("Failed to send request to {}", url), error)
        } else {
            SessionError::transport_with_source(
                format!("Network error communicating with {}", url),
                error,
            )
        }
    }

    /// Checks the HTTP response status and translates errors.
    ///
    /// `not_found` builds the error reported for a 404, which depends on
    /// what was requested.
    async fn check_response_status<F>(
        response: Response,
        not_found: F,
    ) -> Result<Response, SessionError>
    where
        F: FnOnce() -> SessionError,
    {
        let status = response.status();

        if status.is_success() {
            return Ok(response);
        }

        let retry_after = Self::parse_retry_after(response.headers());
        let url = response.url().to_string();
        let error_body = response
            .text()
            .await
            .unwrap_or_else(|_| String::from("(unable to read response body)"));

        match status {
            StatusCode::UNAUTHORIZED => Err(SessionError::unauthorized(
                format!("Authentication required for {}: {}", url, error_body),
                Some(401),
            )),
            StatusCode::FORBIDDEN => Err(SessionError::unauthorized(
                format!("Access forbidden for {}: {}", url, error_body),
                Some(403),
            )),
            StatusCode::NOT_FOUND => Err(not_found()),
            StatusCode::TOO_MANY_REQUESTS => Err(SessionError::RateLimited {
                message: format!("Rate limit exceeded for {}", url),
                retry_after,
            }),
            s if s.is_server_error() => Err(SessionError::Server {
                message: format!("Server error from {}: {}", url, error_body),
                status_code: s.as_u16(),
            }),
            _ => Err(SessionError::invalid_response(format!(
                "HTTP {} from {}: {}",
                status.as_u16(),
                url,
                error_body
            ))),
        }
    }
}
