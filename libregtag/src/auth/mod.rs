//! Authentication handling for registries.
//!
//! This module defines the credentials a lookup runs with ([`AuthContext`]),
//! the `WWW-Authenticate` challenge a registry answers with
//! ([`AuthChallenge`]), and the [`CredentialResolver`] seam through which the
//! locator obtains credentials for a registry domain.

use crate::error::{BoxError, SessionError};
use std::collections::HashMap;

mod docker;

pub use docker::{DockerConfig, DockerCredentialResolver};


/// Credentials for one registry index.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum AuthContext {
    /// No credentials; the registry is accessed anonymously.
    #[default]
    Anonymous,

    /// HTTP Basic authentication with username and password
    Basic {
        /// Username for authentication
        username: String,
        /// Password for authentication
        password: String,
    },

    /// OAuth2 refresh token (Docker's `identitytoken`), exchanged for a
    /// registry token at the challenge realm.
    IdentityToken {
        /// The refresh token
        token: String,
    },

    /// Registry bearer token used as-is.
    Bearer {
        /// The bearer token
        token: String,
    },
}

impl AuthContext {
    /// Creates anonymous credentials.
    pub fn anonymous() -> Self {
        Self::Anonymous
    }

    /// Creates Basic authentication credentials.
    ///
    /// # Examples
    ///
    /// ```
    /// use libregtag::auth::AuthContext;
    ///
    /// let auth = AuthContext::basic("username", "password");
    /// assert!(!auth.is_anonymous());
    /// ```
    pub fn basic(username: impl Into<String>, password: impl Into<String>) -> Self {
        Self::Basic {
            username: username.into(),
            password: password.into(),
        }
    }

    /// Creates bearer token credentials.
    pub fn bearer(token: impl Into<String>) -> Self {
        Self::Bearer {
            token: token.into(),
        }
    }

    /// Creates identity token credentials.
    pub fn identity_token(token: impl Into<String>) -> Self {
        Self::IdentityToken {
            token: token.into(),
        }
    }

    /// Returns true when no credentials are present.
    pub fn is_anonymous(&self) -> bool {
        matches!(self, Self::Anonymous)
    }

    /// Returns the Authorization header value usable without a token exchange.
    ///
    /// # Examples
    ///
    /// ```
    /// use libregtag::auth::AuthContext;
    ///
    /// let auth = AuthContext::basic("user", "pass");
    /// assert_eq!(auth.to_header_value().unwrap(), "Basic dXNlcjpwYXNz");
    /// ```
    pub fn to_header_value(&self) -> Option<String> {
        match self {
            Self::Anonymous | Self::IdentityToken { .. } => None,
            Self::Basic { username, password } => {
                use base64::{Engine as _, engine::general_purpose};
                let credentials = format!("{}:{}", username, password);
                let encoded = general_purpose::STANDARD.encode(credentials);
                Some(format!("Basic {}", encoded))
            }
            Self::Bearer { token } => Some(format!("Bearer {}", token)),
        }
    }
}

/// Information parsed from a WWW-Authenticate header.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuthChallenge {
    /// The authentication scheme (e.g., "Bearer")
    pub scheme: String,

    /// The authentication realm
    pub realm: String,

    /// The service identifier
    pub service: Option<String>,

    /// The scope being requested
    pub scope: Option<String>,
}

impl AuthChallenge {
    /// Parses a WWW-Authenticate header value.
    ///
    /// Quoted values may contain commas, as in
    /// `scope="repository:alpine:pull,push"`.
    ///
    /// # Examples
    ///
    /// ```
    /// use libregtag::auth::AuthChallenge;
    ///
    /// let header = r#"Bearer realm="https://auth.example.com/token",service="registry""#;
    /// let challenge = AuthChallenge::parse(header).unwrap();
    /// assert!(challenge.is_bearer());
    /// assert_eq!(challenge.service.as_deref(), Some("registry"));
    /// ```
    pub fn parse(header: &str) -> Result<Self, SessionError> {
        let header = header.trim();

        let (scheme, params) = header.split_once(' ').ok_or_else(|| {
            SessionError::invalid_response(format!(
                "invalid WWW-Authenticate header: {}",
                header
            ))
        })?;

        let params = parse_params(params);
        let realm = params.get("realm").cloned().ok_or_else(|| {
            SessionError::invalid_response(
                "WWW-Authenticate header missing required 'realm' parameter",
            )
        })?;

        Ok(Self {
            scheme: scheme.to_string(),
            realm,
            service: params.get("service").cloned(),
            scope: params.get("scope").cloned(),
        })
    }

    /// Returns true for the `Bearer` token scheme.
    pub fn is_bearer(&self) -> bool {
        self.scheme.eq_ignore_ascii_case("bearer")
    }

    /// Returns true for the `Basic` scheme.
    pub fn is_basic(&self) -> bool {
        self.scheme.eq_ignore_ascii_case("basic")
    }
}

/// Splits `key=value` pairs separated by commas, honouring double quotes.
fn parse_params(input: &str) -> HashMap<String, String> {
    let mut params = HashMap::new();
    let mut chars = input.chars().peekable();

    loop {
        while matches!(chars.peek(), Some(c) if *c == ',' || c.is_whitespace()) {
            chars.next();
        }
        let key: String = chars.by_ref().take_while(|c| *c != '=').collect();
        if key.is_empty() {
            break;
        }

        let mut value = String::new();
        if chars.peek() == Some(&'"') {
            chars.next();
            while let Some(c) = chars.next() {
                match c {
                    '\\' => {
                        if let Some(escaped) = chars.next() {
                            value.push(escaped);
                        }
                    }
                    '"' => break,
                    c => value.push(c),
                }
            }
        } else {
            while let Some(c) = chars.peek() {
                if *c == ',' {
                    break;
                }
                value.push(*c);
                chars.next();
            }
        }

        params.insert(key.trim().to_ascii_lowercase(), value.trim().to_string());
    }

    params
}

/// Source of credentials for registry domains.
///
/// Implementations return [`AuthContext::Anonymous`] when no credentials
/// are configured and an error only when the lookup itself fails. Lookups
/// may block; the facade calls them off the async executor.
pub trait CredentialResolver: Send + Sync {
    /// Looks up credentials for a registry domain such as `docker.io`.
    fn lookup(&self, domain: &str) -> Result<AuthContext, BoxError>;
}

/// Resolver that always answers with anonymous access.
#[derive(Debug, Clone, Copy, Default)]
pub struct AnonymousResolver;

impl CredentialResolver for AnonymousResolver {
    fn lookup(&self, _domain: &str) -> Result<AuthContext, BoxError> {
        Ok(AuthContext::Anonymous)
    }
}

/// Resolver backed by a fixed domain to credentials map.
///
/// # Examples
///
/// ```
/// use libregtag::auth::{AuthContext, CredentialResolver, StaticCredentialResolver};
///
/// let resolver = StaticCredentialResolver::new()
///     .with("ghcr.io", AuthContext::basic("user", "token"));
/// assert!(!resolver.lookup("ghcr.io").unwrap().is_anonymous());
/// assert!(resolver.lookup("quay.io").unwrap().is_anonymous());
/// ```
#[derive(Debug, Clone, Default)]
pub struct StaticCredentialResolver {
    credentials: HashMap<String, AuthContext>,
}

impl StaticCredentialResolver {
    /// Creates an empty resolver.
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds credentials for `domain`.
    pub fn with(mut self, domain: impl Into<String>, auth: AuthContext) -> Self {
        self.credentials.insert(domain.into(), auth);
        self
    }
}

impl CredentialResolver for StaticCredentialResolver {
    fn lookup(&self, domain: &str) -> Result<AuthContext, BoxError> {
        Ok(self.credentials.get(domain).cloned().unwrap_or_default())
    }
}
