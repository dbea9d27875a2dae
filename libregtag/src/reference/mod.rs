//! Image reference parsing and normalization.
//!
//! A reference is `[domain/]path[:tag][@digest]`. Parsing follows the
//! distribution reference grammar and normalizes the result the way the
//! Docker client does: unqualified names live on `docker.io`, single
//! component Docker Hub names get the `library/` prefix.
//!
//! `oci_spec::distribution::Reference` is not used here because it fills in
//! a default tag, which loses whether the caller supplied one.

use crate::digest::Digest;
use crate::error::ParseError;
use regex::Regex;
use std::fmt;
use std::str::FromStr;
use std::sync::LazyLock;


/// Domain used for names without a registry component.
pub const DEFAULT_DOMAIN: &str = "docker.io";

/// Legacy Docker Hub domain folded into [`DEFAULT_DOMAIN`].
const LEGACY_DEFAULT_DOMAIN: &str = "index.docker.io";

/// Namespace prefixed to single component Docker Hub names.
const OFFICIAL_REPO_PREFIX: &str = "library/";

/// Tag assumed when a reference carries neither tag nor digest.
pub const DEFAULT_TAG: &str = "latest";

/// Maximum length of a fully qualified name.
pub const NAME_TOTAL_LENGTH_MAX: usize = 255;

static PATH_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^[a-z0-9]+(?:(?:[._]|__|-+)[a-z0-9]+)*(?:/[a-z0-9]+(?:(?:[._]|__|-+)[a-z0-9]+)*)*$")
        .expect("path pattern is valid")
});

static DOMAIN_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"^(?:\[[a-fA-F0-9:]+\]|(?:[a-zA-Z0-9]|[a-zA-Z0-9][a-zA-Z0-9-]*[a-zA-Z0-9])(?:\.(?:[a-zA-Z0-9]|[a-zA-Z0-9][a-zA-Z0-9-]*[a-zA-Z0-9]))*)(?::[0-9]+)?$",
    )
    .expect("domain pattern is valid")
});

static TAG_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^[A-Za-z0-9_][A-Za-z0-9_.-]{0,127}$").expect("tag pattern is valid")
});

static IDENTIFIER_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[a-f0-9]{64}$").expect("identifier pattern is valid"));

/// A parsed, normalized image reference.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Reference {
    domain: String,
    path: String,
    tag: Option<String>,
    digest: Option<Digest>,
}

impl FromStr for Reference {
    type Err = ParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if s.is_empty() {
            return Err(ParseError::Empty);
        }
        if IDENTIFIER_RE.is_match(s) {
            return Err(ParseError::invalid_name(
                s,
                "cannot specify 64-byte hexadecimal strings",
            ));
        }

        let (remainder, digest) = match s.rsplit_once('@') {
            Some((left, digest)) => (left, Some(digest.parse::<Digest>()?)),
            None => (s, None),
        };

        // A ':' only separates a tag when it follows the last '/', otherwise
        // it is the port of the domain.
        let last_slash = remainder.rfind('/').map(|i| i + 1).unwrap_or(0);
        let (name, tag) = match remainder[last_slash..].rfind(':') {
            Some(i) => {
                let split = last_slash + i;
                (&remainder[..split], Some(&remainder[split + 1..]))
            }
            None => (remainder, None),
        };

        if let Some(tag) = tag
            && !TAG_RE.is_match(tag)
        {
            return Err(ParseError::InvalidTag {
                tag: tag.to_string(),
            });
        }

        let (domain, path) = split_domain(name);
        validate_name(name, &domain, &path)?;

        Ok(Self {
            domain,
            path,
            tag: tag.map(str::to_string),
            digest,
        })
    }
}

/// Splits a name into its registry domain and repository path.
fn split_domain(name: &str) -> (String, String) {
    let (domain, path) = match name.split_once('/') {
        Some((first, rest))
            if first.contains(&['.', ':'][..])
                || first == "localhost"
                || first.to_lowercase() != first =>
        {
            (first.to_string(), rest.to_string())
        }
        _ => (DEFAULT_DOMAIN.to_string(), name.to_string()),
    };

    let domain = if domain == LEGACY_DEFAULT_DOMAIN {
        DEFAULT_DOMAIN.to_string()
    } else {
        domain
    };

    let path = if domain == DEFAULT_DOMAIN && !path.contains('/') {
        format!("{}{}", OFFICIAL_REPO_PREFIX, path)
    } else {
        path
    };

    (domain, path)
}

fn validate_name(input: &str, domain: &str, path: &str) -> Result<(), ParseError> {
    if path.is_empty() {
        return Err(ParseError::invalid_name(input, "repository path is empty"));
    }
    if path.to_lowercase() != path {
        return Err(ParseError::invalid_name(
            input,
            "repository name must be lowercase",
        ));
    }
    if !PATH_RE.is_match(path) {
        return Err(ParseError::invalid_name(
            input,
            "path components must be lowercase alphanumerics joined by '.', '_', '__' or '-'",
        ));
    }
    if !DOMAIN_RE.is_match(domain) {
        return Err(ParseError::invalid_name(input, "invalid registry domain"));
    }
    if domain.len() + 1 + path.len() > NAME_TOTAL_LENGTH_MAX {
        return Err(ParseError::invalid_name(
            input,
            format!("repository name must not be longer than {NAME_TOTAL_LENGTH_MAX} characters"),
        ));
    }
    Ok(())
}

impl fmt::Display for Reference {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.domain, self.path)?;
        if let Some(tag) = &self.tag {
            write!(f, ":{}", tag)?;
        }
        if let Some(digest) = &self.digest {
            write!(f, "@{}", digest)?;
        }
        Ok(())
    }
}

impl Reference {
    /// Returns the registry domain, e.g. `docker.io` or `localhost:5000`.
    pub fn domain(&self) -> &str {
        &self.domain
    }

    /// Returns the repository path within the registry, e.g. `library/alpine`.
    pub fn path(&self) -> &str {
        &self.path
    }

    /// Returns the fully qualified name, e.g. `docker.io/library/alpine`.
    pub fn name(&self) -> String {
        format!("{}/{}", self.domain, self.path)
    }

    /// Returns the tag part of the reference, if present.
    pub fn tag(&self) -> Option<&str> {
        self.tag.as_deref()
    }

    /// Returns the digest part of the reference, if present.
    pub fn digest(&self) -> Option<&Digest> {
        self.digest.as_ref()
    }

    /// Returns the tag to resolve: the explicit tag or [`DEFAULT_TAG`].
    pub fn tag_or_default(&self) -> &str {
        self.tag().unwrap_or(DEFAULT_TAG)
    }

    /// Returns a copy of this reference with `tag` applied.
    ///
    /// # Errors
    ///
    /// Fails with [`ParseError::Ambiguous`] if the reference already carries
    /// a digest, and with [`ParseError::InvalidTag`] if `tag` is malformed.
    ///
    /// # Examples
    ///
    /// ```
    /// use libregtag::Reference;
    ///
    /// let reference: Reference = "alpine".parse().unwrap();
    /// let tagged = reference.with_tag("3.19").unwrap();
    /// assert_eq!(tagged.to_string(), "docker.io/library/alpine:3.19");
    /// ```
    pub fn with_tag(&self, tag: &str) -> Result<Self, ParseError> {
        if let Some(digest) = &self.digest {
            return Err(ParseError::Ambiguous {
                message: format!(
                    "cannot tag {} with '{}': reference is pinned to {}",
                    self.name(),
                    tag,
                    digest
                ),
            });
        }
        if !TAG_RE.is_match(tag) {
            return Err(ParseError::InvalidTag {
                tag: tag.to_string(),
            });
        }
        Ok(Self {
            tag: Some(tag.to_string()),
            ..self.clone()
        })
    }
}
