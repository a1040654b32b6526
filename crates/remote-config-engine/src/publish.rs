//! Optimistic-concurrency publishing and rollback.
//!
//! The coordinator is the only writer to the version store. A publish
//! validates the candidate, then performs the token check and the append as
//! one atomic step under the store's write lock, so two racing publishes
//! against the same token produce exactly one new version and one conflict.
//! Rollback is sugar over publish: the historical template is re-published
//! as a new forward version, never spliced into history.

use std::sync::Arc;

use sha2::{Digest, Sha256};
use thiserror::Error;
use time::OffsetDateTime;
use tracing::{info, warn};

use crate::store::VersionStore;
use crate::template::{Template, TemplateSnapshot, UpdateOrigin, UpdateType, User, Version};
use crate::validation::{self, ValidationError};

/// Errors raised by publish and rollback.
#[derive(Debug, Error)]
pub enum PublishError {
    /// The candidate template or description failed validation. Locally
    /// recoverable: edit and retry.
    #[error("template validation failed: {0}")]
    Validation(#[from] ValidationError),
    /// The caller's token no longer matches the latest stored version.
    /// Recoverable by refetch and retry; no merge is attempted.
    #[error("concurrency token mismatch: expected '{expected}', current '{current}'")]
    Conflict { expected: String, current: String },
    /// The rollback target does not exist (never published, or pruned).
    #[error("version {version_number} not found")]
    VersionNotFound { version_number: i64 },
    /// The candidate could not be canonically encoded for token minting.
    #[error("template serialization failed: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// Caller-supplied metadata for a publish.
#[derive(Debug, Clone)]
pub struct PublishOptions {
    /// Authenticated actor recorded as the version's update user.
    pub actor: User,
    /// Where the update originated.
    pub origin: UpdateOrigin,
    /// Kind of update being published.
    pub update_type: UpdateType,
    /// Version description recorded in history.
    pub description: String,
}

impl PublishOptions {
    /// Creates options for an incremental REST-style update.
    pub fn new(actor: User) -> Self {
        Self {
            actor,
            origin: UpdateOrigin::RestApi,
            update_type: UpdateType::IncrementalUpdate,
            description: String::new(),
        }
    }

    /// Sets the update origin.
    pub fn with_origin(mut self, origin: UpdateOrigin) -> Self {
        self.origin = origin;
        self
    }

    /// Sets the update type.
    pub fn with_update_type(mut self, update_type: UpdateType) -> Self {
        self.update_type = update_type;
        self
    }

    /// Sets the version description.
    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }
}

/// Serializes publish and rollback against a shared version store.
#[derive(Debug, Clone)]
pub struct PublishCoordinator {
    store: Arc<VersionStore>,
}

impl PublishCoordinator {
    pub fn new(store: Arc<VersionStore>) -> Self {
        Self { store }
    }

    /// The store this coordinator writes to.
    pub fn store(&self) -> &Arc<VersionStore> {
        &self.store
    }

    /// Publishes a candidate template.
    ///
    /// The candidate is validated first; nothing is mutated on a validation
    /// failure. The publish then succeeds only if `expected_etag` matches the
    /// token bound to the latest stored version (or [`crate::store::INITIAL_ETAG`]
    /// for a first publish). On success the new version number is exactly the
    /// prior latest plus one and a fresh opaque token is minted.
    pub fn publish(
        &self,
        candidate: &Template,
        expected_etag: &str,
        options: PublishOptions,
    ) -> Result<TemplateSnapshot, PublishError> {
        let mut body = candidate.clone();
        // Version metadata is output-only; whatever the caller sent is
        // replaced by the store's stamp.
        body.version = None;
        self.commit(body, expected_etag, options, None)
    }

    /// Re-publishes a historical version as a new forward version.
    ///
    /// The target's template body becomes the new latest version with
    /// `updateType=ROLLBACK` and `rollbackSource` pointing at the target.
    /// The same optimistic token check applies; history is never rewritten.
    pub fn rollback(
        &self,
        target_version_number: i64,
        expected_etag: &str,
        actor: User,
    ) -> Result<TemplateSnapshot, PublishError> {
        let target = self.store.get(target_version_number).ok_or(
            PublishError::VersionNotFound {
                version_number: target_version_number,
            },
        )?;
        let mut body = (*target.template).clone();
        body.version = None;
        let options = PublishOptions::new(actor)
            .with_update_type(UpdateType::Rollback)
            .with_description(format!("Rollback to version {target_version_number}"));
        self.commit(body, expected_etag, options, Some(target_version_number))
    }

    fn commit(
        &self,
        body: Template,
        expected_etag: &str,
        options: PublishOptions,
        rollback_source: Option<i64>,
    ) -> Result<TemplateSnapshot, PublishError> {
        let limits = self.store.limits();
        validation::validate_template(&body, limits)?;
        validation::validate_description(&options.description, limits)?;

        // Canonical bytes for token minting; computed outside the store lock.
        let body_bytes = serde_json::to_vec(&body)?;
        let update_time = OffsetDateTime::now_utc();

        let stored = self
            .store
            .compare_and_append(expected_etag, |version_number| {
                let version = Version {
                    version_number,
                    description: options.description.clone(),
                    update_time,
                    update_origin: options.origin,
                    update_type: options.update_type,
                    update_user: Some(options.actor.clone()),
                    is_legacy: false,
                    rollback_source,
                };
                let etag = mint_etag(version_number, &body_bytes, update_time);
                let mut template = body;
                template.version = Some(version.clone());
                (template, version, etag)
            })
            .map_err(|current| {
                warn!(
                    "publish rejected: token '{}' does not match current '{}'",
                    expected_etag, current
                );
                PublishError::Conflict {
                    expected: expected_etag.to_string(),
                    current,
                }
            })?;

        info!(
            "published template version {} ({:?}, etag '{}')",
            stored.version.version_number, stored.version.update_type, stored.etag
        );
        Ok(stored.snapshot())
    }
}

/// Mints the opaque concurrency token for a new version.
///
/// Callers must treat the result as opaque; the digest input (canonical body
/// bytes, version number, publish instant) only guarantees tokens are fresh
/// per publish.
fn mint_etag(version_number: i64, body_bytes: &[u8], update_time: OffsetDateTime) -> String {
    let mut hasher = Sha256::new();
    hasher.update(body_bytes);
    hasher.update(version_number.to_be_bytes());
    hasher.update(update_time.unix_timestamp_nanos().to_be_bytes());
    let digest = hasher.finalize();
    format!("etag-{}-{}", version_number, hex::encode(&digest[..8]))
}
