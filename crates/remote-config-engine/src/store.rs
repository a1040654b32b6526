//! In-memory, append-only store of published template versions.
//!
//! The store owns the full history of published templates, each tagged with
//! its monotonic version number and opaque concurrency token. Reads clone
//! snapshots out under a shared lock so resolution and history listing never
//! contend with each other; the only mutation path is the compare-and-append
//! used by the publish coordinator, which holds the write lock for the token
//! check and the append as one atomic step.

use std::sync::{Arc, RwLock};

use tracing::debug;

use crate::config::EngineLimits;
use crate::template::{Template, TemplateSnapshot, Version};

/// Concurrency token reported for an empty store. The first publish must
/// present this token, which keeps the publish contract uniform instead of
/// special-casing "no template yet".
pub const INITIAL_ETAG: &str = "etag-empty";

/// A published template version held by the store.
#[derive(Debug, Clone)]
pub struct StoredVersion {
    /// The published template, version metadata stamped in.
    pub template: Arc<Template>,
    /// Version metadata (also present on the template; kept separately so
    /// history listing does not touch template bodies).
    pub version: Version,
    /// Concurrency token minted for this version.
    pub etag: String,
}

impl StoredVersion {
    /// Clones this entry into a caller-facing snapshot.
    pub fn snapshot(&self) -> TemplateSnapshot {
        TemplateSnapshot {
            template: (*self.template).clone(),
            etag: self.etag.clone(),
        }
    }
}

/// Append-only history of published template versions.
#[derive(Debug)]
pub struct VersionStore {
    limits: EngineLimits,
    /// History in ascending version order.
    history: RwLock<Vec<StoredVersion>>,
}

impl Default for VersionStore {
    fn default() -> Self {
        Self::new()
    }
}

impl VersionStore {
    /// Creates an empty store with default limits.
    pub fn new() -> Self {
        Self::with_limits(EngineLimits::default())
    }

    /// Creates an empty store with the supplied limits.
    pub fn with_limits(limits: EngineLimits) -> Self {
        Self {
            limits,
            history: RwLock::new(Vec::new()),
        }
    }

    /// The limits this store (and its publish coordinator) operate under.
    pub fn limits(&self) -> &EngineLimits {
        &self.limits
    }

    /// The latest published snapshot, if any template has been published.
    pub fn latest(&self) -> Option<TemplateSnapshot> {
        let history = self.history.read().expect("version store lock poisoned");
        history.last().map(StoredVersion::snapshot)
    }

    /// The concurrency token bound to the latest version, or [`INITIAL_ETAG`]
    /// for an empty store.
    pub fn latest_etag(&self) -> String {
        let history = self.history.read().expect("version store lock poisoned");
        history
            .last()
            .map(|stored| stored.etag.clone())
            .unwrap_or_else(|| INITIAL_ETAG.to_string())
    }

    /// The latest version number, or 0 for an empty store.
    pub fn latest_version_number(&self) -> i64 {
        let history = self.history.read().expect("version store lock poisoned");
        history.last().map(|stored| stored.version.version_number).unwrap_or(0)
    }

    /// Fetches a historical version by number.
    pub fn get(&self, version_number: i64) -> Option<StoredVersion> {
        let history = self.history.read().expect("version store lock poisoned");
        history
            .iter()
            .find(|stored| stored.version.version_number == version_number)
            .cloned()
    }

    /// Version metadata for the full retained history, newest first.
    pub fn versions_desc(&self) -> Vec<Version> {
        let history = self.history.read().expect("version store lock poisoned");
        history.iter().rev().map(|stored| stored.version.clone()).collect()
    }

    /// Number of retained versions.
    pub fn len(&self) -> usize {
        self.history.read().expect("version store lock poisoned").len()
    }

    /// `true` when nothing has been published yet.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Atomically checks the caller's concurrency token and appends the next
    /// version.
    ///
    /// `make` receives the version number the new entry must carry and builds
    /// the stamped template, its version metadata, and its fresh etag. On a
    /// token mismatch nothing is mutated and the current token is returned as
    /// the error so the caller can report both sides of the conflict.
    ///
    /// Retention is enforced on the same write: history beyond the configured
    /// bound is pruned oldest-first.
    pub(crate) fn compare_and_append<F>(
        &self,
        expected_etag: &str,
        make: F,
    ) -> Result<StoredVersion, String>
    where
        F: FnOnce(i64) -> (Template, Version, String),
    {
        let mut history = self.history.write().expect("version store lock poisoned");

        let current_etag = history
            .last()
            .map(|stored| stored.etag.as_str())
            .unwrap_or(INITIAL_ETAG);
        if current_etag != expected_etag {
            return Err(current_etag.to_string());
        }

        let next_number = history
            .last()
            .map(|stored| stored.version.version_number)
            .unwrap_or(0)
            + 1;
        let (template, version, etag) = make(next_number);
        let stored = StoredVersion {
            template: Arc::new(template),
            version,
            etag,
        };
        history.push(stored.clone());

        let retention = self.limits.version_retention;
        if history.len() > retention {
            let excess = history.len() - retention;
            history.drain(..excess);
            debug!(
                "pruned {} version(s) beyond the retention limit of {}",
                excess, retention
            );
        }

        Ok(stored)
    }
}
