//! Credentials from the Docker client configuration.
//!
//! Reads `config.json` the way the Docker CLI does: per-registry credential
//! helpers first, then the global credential store, then the inline `auths`
//! entries. A missing file or entry means anonymous access; a file that
//! cannot be read or parsed, or a helper that fails, is an error.

use crate::auth::{AuthContext, CredentialResolver};
use crate::error::BoxError;
use crate::reference::DEFAULT_DOMAIN;
use serde::Deserialize;
use std::collections::HashMap;
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};
use thiserror::Error;
use tracing::debug;

#[cfg(test)]
#[path = "docker_tests.rs"]
mod tests;

/// Key under which Docker stores Docker Hub credentials.
const DOCKER_HUB_INDEX: &str = "https://index.docker.io/v1/";

/// Message helpers print when they have nothing for a server.
const HELPER_NOT_FOUND: &str = "credentials not found";

/// Username helpers report for identity tokens.
const TOKEN_USERNAME: &str = "<token>";

/// Failures while reading Docker credentials.
#[derive(Error, Debug)]
pub enum DockerConfigError {
    #[error("failed to read {path}")]
    Read {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse {path}")]
    Parse {
        path: String,
        #[source]
        source: serde_json::Error,
    },

    #[error("credential helper docker-credential-{helper} failed: {message}")]
    Helper { helper: String, message: String },

    #[error("malformed credentials for {server}: {message}")]
    Decode { server: String, message: String },
}

/// Docker config.json structure
#[derive(Debug, Clone, Deserialize, Default, PartialEq, Eq)]
pub struct DockerConfig {
    /// Registry auths keyed by server address
    #[serde(default)]
    pub auths: HashMap<String, DockerAuthEntry>,

    /// Credential store used for every registry (e.g., "osxkeychain")
    #[serde(rename = "credsStore", default)]
    pub creds_store: Option<String>,

    /// Per-registry credential helpers
    #[serde(rename = "credHelpers", default)]
    pub cred_helpers: HashMap<String, String>,
}

/// Docker auth entry
#[derive(Debug, Clone, Deserialize, Default, PartialEq, Eq)]
pub struct DockerAuthEntry {
    /// Base64-encoded "username:password"
    #[serde(default)]
    pub auth: Option<String>,

    #[serde(default)]
    pub username: Option<String>,

    #[serde(default)]
    pub password: Option<String>,

    /// OAuth2 refresh token
    #[serde(rename = "identitytoken", default)]
    pub identity_token: Option<String>,

    /// Bearer token for the registry itself
    #[serde(rename = "registrytoken", default)]
    pub registry_token: Option<String>,
}

/// Output of `docker-credential-<helper> get`.
#[derive(Debug, Deserialize)]
struct HelperCredentials {
    #[serde(rename = "Username")]
    username: String,
    #[serde(rename = "Secret")]
    secret: String,
}

impl DockerConfig {
    /// Parses a config from its JSON text.
    pub fn from_json(contents: &str, path: &Path) -> Result<Self, DockerConfigError> {
        serde_json::from_str(contents).map_err(|source| DockerConfigError::Parse {
            path: path.display().to_string(),
            source,
        })
    }

    /// Loads the config at `path`, returning `None` if it does not exist.
    pub fn load(path: &Path) -> Result<Option<Self>, DockerConfigError> {
        if !path.exists() {
            return Ok(None);
        }
        let contents = fs::read_to_string(path).map_err(|source| DockerConfigError::Read {
            path: path.display().to_string(),
            source,
        })?;
        Self::from_json(&contents, path).map(Some)
    }

    /// Returns the default config location: `$DOCKER_CONFIG/config.json` or
    /// `~/.docker/config.json`.
    pub fn default_path() -> Option<PathBuf> {
        if let Ok(dir) = std::env::var("DOCKER_CONFIG") {
            return Some(PathBuf::from(dir).join("config.json"));
        }
        dirs::home_dir().map(|home| home.join(".docker").join("config.json"))
    }

    /// Finds the inline `auths` entry for a registry domain.
    fn find_auth(&self, domain: &str) -> Option<(&str, &DockerAuthEntry)> {
        let wanted = normalize_server(&server_address(domain));
        self.auths
            .iter()
            .find(|(key, _)| normalize_server(key) == wanted)
            .map(|(key, entry)| (key.as_str(), entry))
    }

    /// Finds the credential helper responsible for a registry domain.
    fn helper_for(&self, domain: &str) -> Option<&str> {
        let wanted = normalize_server(&server_address(domain));
        self.cred_helpers
            .iter()
            .find(|(key, _)| normalize_server(key) == wanted)
            .map(|(_, helper)| helper.as_str())
            .or(self.creds_store.as_deref())
            .filter(|helper| !helper.is_empty())
    }
}

impl DockerAuthEntry {
    fn to_auth_context(&self, server: &str) -> Result<AuthContext, DockerConfigError> {
        if let Some(token) = self.identity_token.as_deref().filter(|t| !t.is_empty()) {
            return Ok(AuthContext::identity_token(token));
        }
        if let Some(token) = self.registry_token.as_deref().filter(|t| !t.is_empty()) {
            return Ok(AuthContext::bearer(token));
        }
        if let (Some(username), Some(password)) = (&self.username, &self.password) {
            return Ok(AuthContext::basic(username, password));
        }
        if let Some(encoded) = self.auth.as_deref().filter(|a| !a.is_empty()) {
            use base64::{Engine as _, engine::general_purpose};
            let decoded = general_purpose::STANDARD.decode(encoded).map_err(|e| {
                DockerConfigError::Decode {
                    server: server.to_string(),
                    message: e.to_string(),
                }
            })?;
            let decoded = String::from_utf8(decoded).map_err(|e| DockerConfigError::Decode {
                server: server.to_string(),
                message: e.to_string(),
            })?;
            let (username, password) =
                decoded
                    .split_once(':')
                    .ok_or_else(|| DockerConfigError::Decode {
                        server: server.to_string(),
                        message: "auth is not of the form username:password".to_string(),
                    })?;
            return Ok(AuthContext::basic(username, password));
        }
        Ok(AuthContext::Anonymous)
    }
}

/// Server address Docker uses as the credential key for a domain.
fn server_address(domain: &str) -> String {
    if domain == DEFAULT_DOMAIN {
        DOCKER_HUB_INDEX.to_string()
    } else {
        domain.to_string()
    }
}

/// Reduces a credential key to its host, folding Docker Hub aliases.
fn normalize_server(key: &str) -> String {
    let host = key
        .trim_start_matches("https://")
        .trim_start_matches("http://");
    let host = host.split('/').next().unwrap_or(host);
    match host {
        "docker.io" | "index.docker.io" | "registry-1.docker.io" => "index.docker.io".to_string(),
        other => other.to_string(),
    }
}

/// Credential resolver backed by the Docker client configuration.
///
/// # Examples
///
/// ```no_run
/// use libregtag::auth::{CredentialResolver, DockerCredentialResolver};
///
/// let resolver = DockerCredentialResolver::new();
/// let auth = resolver.lookup("ghcr.io").unwrap();
/// println!("anonymous: {}", auth.is_anonymous());
/// ```
#[derive(Debug, Clone, Default)]
pub struct DockerCredentialResolver {
    /// Explicit config.json path; the Docker default when unset.
    config_path: Option<PathBuf>,
    /// Directory holding `docker-credential-*` helpers; `PATH` when unset.
    helper_dir: Option<PathBuf>,
}

impl DockerCredentialResolver {
    /// Creates a resolver reading the default Docker config location.
    pub fn new() -> Self {
        Self::default()
    }

    /// Reads credentials from `path` instead of the default location.
    pub fn with_config_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.config_path = Some(path.into());
        self
    }

    /// Looks up credential helper binaries in `dir` instead of `PATH`.
    pub fn with_helper_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.helper_dir = Some(dir.into());
        self
    }

    fn config_path(&self) -> Option<PathBuf> {
        self.config_path.clone().or_else(DockerConfig::default_path)
    }

    /// Runs `docker-credential-<helper> get` for `server`.
    ///
    /// Returns `Ok(None)` when the helper has no credentials for the server.
    fn run_helper(
        &self,
        helper: &str,
        server: &str,
    ) -> Result<Option<AuthContext>, DockerConfigError> {
        let program = format!("docker-credential-{}", helper);
        let program = match &self.helper_dir {
            Some(dir) => dir.join(program),
            None => PathBuf::from(program),
        };
        let helper_error = |message: String| DockerConfigError::Helper {
            helper: helper.to_string(),
            message,
        };

        let mut child = Command::new(&program)
            .arg("get")
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()
            .map_err(|e| helper_error(e.to_string()))?;

        if let Some(mut stdin) = child.stdin.take() {
            // Helpers that exit without reading close the pipe early.
            match stdin.write_all(server.as_bytes()) {
                Err(e) if e.kind() != std::io::ErrorKind::BrokenPipe => {
                    return Err(helper_error(e.to_string()));
                }
                _ => {}
            }
        }

        let output = child
            .wait_with_output()
            .map_err(|e| helper_error(e.to_string()))?;

        if !output.status.success() {
            let stdout = String::from_utf8_lossy(&output.stdout);
            let stderr = String::from_utf8_lossy(&output.stderr);
            if stdout.contains(HELPER_NOT_FOUND) || stderr.contains(HELPER_NOT_FOUND) {
                return Ok(None);
            }
            return Err(helper_error(format!(
                "exited with {}: {}",
                output.status,
                stderr.trim()
            )));
        }

        let creds: HelperCredentials = serde_json::from_slice(&output.stdout)
            .map_err(|e| helper_error(format!("invalid output: {}", e)))?;

        if creds.username == TOKEN_USERNAME {
            Ok(Some(AuthContext::identity_token(creds.secret)))
        } else {
            Ok(Some(AuthContext::basic(creds.username, creds.secret)))
        }
    }

    fn resolve(&self, domain: &str) -> Result<AuthContext, DockerConfigError> {
        let Some(path) = self.config_path() else {
            debug!(%domain, "no docker config location, using anonymous access");
            return Ok(AuthContext::Anonymous);
        };
        let Some(config) = DockerConfig::load(&path)? else {
            debug!(%domain, path = %path.display(), "docker config not found");
            return Ok(AuthContext::Anonymous);
        };

        let server = server_address(domain);

        if let Some(helper) = config.helper_for(domain) {
            debug!(%domain, %helper, "asking credential helper");
            if let Some(auth) = self.run_helper(helper, &server)? {
                return Ok(auth);
            }
        }

        match config.find_auth(domain) {
            Some((key, entry)) => {
                debug!(%domain, %key, "using credentials from docker config");
                entry.to_auth_context(key)
            }
            None => Ok(AuthContext::Anonymous),
        }
    }
}

impl CredentialResolver for DockerCredentialResolver {
    fn lookup(&self, domain: &str) -> Result<AuthContext, BoxError> {
        self.resolve(domain).map_err(Into::into)
    }
}
