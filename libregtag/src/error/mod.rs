//! Error types for regtag
//!
//! Every stage of a lookup has its own error enum so callers can tell a
//! malformed reference apart from a broken credential store, a registry that
//! never confirmed the v2 API, or a failing tag query. All of them convert
//! into [`RegtagError`], which is what the public API returns.

use thiserror::Error;


/// Boxed error used as the `source` of wrapped failures.
pub type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// Errors raised while parsing an image reference.
#[derive(Error, Debug)]
pub enum ParseError {
    /// The input string was empty.
    #[error("invalid reference format: reference is empty")]
    Empty,

    /// The repository name violates the registry naming rules.
    #[error("invalid repository name '{name}': {reason}")]
    InvalidName { name: String, reason: String },

    /// The tag violates the tag grammar.
    #[error("invalid tag '{tag}'")]
    InvalidTag { tag: String },

    /// The digest is not a valid `algorithm:hex` value.
    #[error("invalid digest '{digest}'")]
    InvalidDigest {
        digest: String,
        #[source]
        source: Option<BoxError>,
    },

    /// The requested combination of tag and digest is not allowed.
    #[error("ambiguous reference: {message}")]
    Ambiguous { message: String },
}

/// Errors raised while locating a repository (credentials and discovery).
#[derive(Error, Debug)]
pub enum LocatorError {
    /// Credential resolution itself failed. Missing credentials are not an
    /// error; they resolve to anonymous access.
    #[error("failed to resolve credentials for {domain}")]
    NoCredentials {
        domain: String,
        #[source]
        source: BoxError,
    },

    /// Discovery produced no candidate endpoints.
    #[error("no registry endpoints found for {domain}")]
    NoEndpoints {
        domain: String,
        #[source]
        source: Option<BoxError>,
    },
}

/// Errors raised while probing candidate endpoints.
#[derive(Error, Debug)]
pub enum ProbeError {
    /// No candidate confirmed the v2 API. Covers both "only v1 endpoints"
    /// and "every v2 endpoint failed".
    #[error("no V2 endpoint found ({candidates} candidates tried)")]
    NoV2Endpoint { candidates: usize },
}

/// Errors raised by a confirmed registry session.
#[derive(Error, Debug)]
pub enum SessionError {
    /// The repository does not exist on the endpoint.
    #[error("repository not found: {repository}")]
    RepositoryNotFound { repository: String },

    /// The tag does not exist in the repository.
    #[error("tag not found: {repository}:{tag}")]
    TagNotFound { repository: String, tag: String },

    /// Credentials are missing or insufficient (401, 403, token failures).
    #[error("unauthorized (status: {status_code:?}): {message}")]
    Unauthorized {
        message: String,
        status_code: Option<u16>,
    },

    /// The registry is throttling requests (429).
    #[error("rate limit: {message}")]
    RateLimited {
        message: String,
        retry_after: Option<u64>,
    },

    /// The registry failed with a 5xx status.
    #[error("server error (status: {status_code}): {message}")]
    Server { message: String, status_code: u16 },

    /// Connection, TLS, timeout or other transport failure.
    #[error("transport error: {message}")]
    Transport {
        message: String,
        #[source]
        source: Option<BoxError>,
    },

    /// The registry answered with something that does not follow the protocol.
    #[error("invalid registry response: {message}")]
    InvalidResponse {
        message: String,
        #[source]
        source: Option<BoxError>,
    },
}

/// Main error type for regtag operations
#[derive(Error, Debug)]
pub enum RegtagError {
    #[error(transparent)]
    Parse(#[from] ParseError),

    #[error(transparent)]
    Locator(#[from] LocatorError),

    #[error(transparent)]
    Probe(#[from] ProbeError),

    #[error(transparent)]
    Session(#[from] SessionError),

    /// The caller asked for something the reference makes meaningless,
    /// e.g. listing tags of an already tagged reference.
    #[error("invalid input: {message}")]
    InvalidInput { message: String },

    /// Configuration errors (invalid config file, logging already set up)
    #[error("configuration error: {message}")]
    Config {
        message: String,
        path: Option<String>,
        #[source]
        source: Option<BoxError>,
    },

    /// A blocking lookup running off the async runtime panicked or was
    /// cancelled.
    #[error("background task failed: {message}")]
    Task {
        message: String,
        #[source]
        source: Option<BoxError>,
    },
}

/// Result type alias for regtag operations
pub type Result<T> = std::result::Result<T, RegtagError>;

impl RegtagError {
    /// Creates a new invalid input error.
    ///
    /// # Examples
    ///
    /// ```
    /// use libregtag::error::RegtagError;
    ///
    /// let err = RegtagError::invalid_input("reference already has a tag");
    /// assert!(matches!(err, RegtagError::InvalidInput { .. }));
    /// ```
    pub fn invalid_input<S: Into<String>>(message: S) -> Self {
        Self::InvalidInput {
            message: message.into(),
        }
    }

    /// Creates a new configuration error.
    ///
    /// # Examples
    ///
    /// ```
    /// use libregtag::error::RegtagError;
    ///
    /// let err = RegtagError::config("invalid config file", Some("/etc/regtag.yaml"));
    /// assert!(matches!(err, RegtagError::Config { .. }));
    /// ```
    pub fn config<S: Into<String>>(message: S, path: Option<S>) -> Self {
        Self::Config {
            message: message.into(),
            path: path.map(|p| p.into()),
            source: None,
        }
    }

    /// Creates a new configuration error with a source error.
    pub fn config_with_source<S, E>(message: S, path: Option<S>, source: E) -> Self
    where
        S: Into<String>,
        E: std::error::Error + Send + Sync + 'static,
    {
        Self::Config {
            message: message.into(),
            path: path.map(|p| p.into()),
            source: Some(Box::new(source)),
        }
    }
}

impl ParseError {
    /// Creates an invalid name error.
    pub fn invalid_name<N: Into<String>, R: Into<String>>(name: N, reason: R) -> Self {
        Self::InvalidName {
            name: name.into(),
            reason: reason.into(),
        }
    }
}

impl SessionError {
    /// Creates a new transport error.
    ///
    /// # Examples
    ///
    /// ```
    /// use libregtag::error::SessionError;
    ///
    /// let err = SessionError::transport("connection refused");
    /// assert!(matches!(err, SessionError::Transport { .. }));
    /// ```
    pub fn transport<S: Into<String>>(message: S) -> Self {
        Self::Transport {
            message: message.into(),
            source: None,
        }
    }

    /// Creates a new transport error with a source error.
    pub fn transport_with_source<S, E>(message: S, source: E) -> Self
    where
        S: Into<String>,
        E: std::error::Error + Send + Sync + 'static,
    {
        Self::Transport {
            message: message.into(),
            source: Some(Box::new(source)),
        }
    }

    /// Creates a new invalid response error.
    pub fn invalid_response<S: Into<String>>(message: S) -> Self {
        Self::InvalidResponse {
            message: message.into(),
            source: None,
        }
    }

    /// Creates a new invalid response error with a source error.
    pub fn invalid_response_with_source<S, E>(message: S, source: E) -> Self
    where
        S: Into<String>,
        E: std::error::Error + Send + Sync + 'static,
    {
        Self::InvalidResponse {
            message: message.into(),
            source: Some(Box::new(source)),
        }
    }

    /// Creates a new unauthorized error.
    pub fn unauthorized<S: Into<String>>(message: S, status_code: Option<u16>) -> Self {
        Self::Unauthorized {
            message: message.into(),
            status_code,
        }
    }
}
