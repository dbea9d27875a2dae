//! Live handle to one confirmed v2 endpoint.
//!
//! A [`RegistrySession`] is produced by the prober once an endpoint has
//! confirmed the v2 API. It is bound to one repository and exposes the two
//! read-only queries of a lookup: listing tags and resolving a tag to its
//! manifest digest.

use crate::auth::AuthChallenge;
use crate::client::Client;
use crate::digest::Digest;
use crate::endpoint::RegistryEndpoint;
use crate::error::SessionError;
use std::collections::HashSet;
use tracing::debug;


/// Session on a confirmed v2 endpoint for one repository.
#[derive(Debug)]
pub struct RegistrySession {
    client: Client,
    endpoint: RegistryEndpoint,
    repository: String,
    /// Challenge from the handshake, answered before the first query.
    challenge: Option<AuthChallenge>,
    page_size: Option<u32>,
}

impl RegistrySession {
    /// Creates a session from a client whose endpoint confirmed v2.
    pub fn new(
        client: Client,
        endpoint: RegistryEndpoint,
        repository: impl Into<String>,
        challenge: Option<AuthChallenge>,
    ) -> Self {
        Self {
            client,
            endpoint,
            repository: repository.into(),
            challenge,
            page_size: None,
        }
    }

    /// Sets the page size requested when listing tags.
    pub fn with_page_size(mut self, page_size: Option<u32>) -> Self {
        self.page_size = page_size;
        self
    }

    /// Returns the endpoint this session talks to.
    pub fn endpoint(&self) -> &RegistryEndpoint {
        &self.endpoint
    }

    /// Returns the repository path this session is bound to.
    pub fn repository(&self) -> &str {
        &self.repository
    }

    async fn ensure_authorized(&mut self) -> Result<(), SessionError> {
        if let Some(challenge) = self.challenge.take() {
            debug!(
                endpoint = %self.endpoint.url,
                scheme = %challenge.scheme,
                "answering handshake challenge"
            );
            self.client.authorize(&challenge, &self.repository).await?;
        }
        Ok(())
    }

    /// Lists every tag of the repository.
    ///
    /// Pagination is followed to the end and the result is deduplicated in
    /// first-seen order. A failure on any page fails the whole call.
    ///
    /// # Errors
    ///
    /// - [`SessionError::RepositoryNotFound`] if the registry answers 404
    /// - [`SessionError::Unauthorized`] on 401 or 403
    pub async fn list_tags(&mut self) -> Result<Vec<String>, SessionError> {
        self.ensure_authorized().await?;

        let tags = self
            .client
            .fetch_tags_paginated(&self.repository, self.page_size)
            .await?;
        let received = tags.len();

        let mut seen = HashSet::with_capacity(received);
        let tags: Vec<String> = tags
            .into_iter()
            .filter(|tag| seen.insert(tag.clone()))
            .collect();

        debug!(
            repository = %self.repository,
            received,
            unique = tags.len(),
            "listed tags"
        );
        Ok(tags)
    }

    /// Resolves `tag` to the digest of the manifest it points to.
    ///
    /// # Errors
    ///
    /// - [`SessionError::TagNotFound`] if the registry answers 404
    /// - [`SessionError::Unauthorized`] on 401 or 403
    pub async fn resolve_tag(&mut self, tag: &str) -> Result<Digest, SessionError> {
        self.ensure_authorized().await?;

        let digest = self
            .client
            .fetch_manifest_digest(&self.repository, tag)
            .await?;

        debug!(repository = %self.repository, %tag, %digest, "resolved tag");
        Ok(digest)
    }
}
