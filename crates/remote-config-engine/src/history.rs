//! Cursor-paginated version history listing.
//!
//! Pages are served newest-first with an opaque token carrying the listing
//! position, the snapshot ceiling, and a fingerprint of the active filter.
//! Binding the token to its filter means a cursor minted under one query
//! cannot silently continue a different one, and pinning the ceiling at
//! mint time keeps concurrent publishes out of an in-progress listing.

use std::collections::VecDeque;

use data_encoding::BASE32_NOPAD;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use time::OffsetDateTime;
use tracing::debug;

use crate::store::VersionStore;
use crate::template::Version;

/// Errors raised while listing version history. Every variant is a form of
/// invalid cursor; recovery is restarting the listing without a token.
#[derive(Debug, Error)]
pub enum HistoryError {
    #[error("page token is not valid base32: {0}")]
    CursorEncoding(data_encoding::DecodeError),
    #[error("page token payload decode error: {0}")]
    CursorPayload(rmp_serde::decode::Error),
    #[error("page token encode error: {0}")]
    CursorMint(rmp_serde::encode::Error),
    #[error("page token does not match the active filter")]
    CursorFilterMismatch,
}

/// Query options for a version-history listing.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ListVersionsOptions {
    /// Only include versions published at or after this instant.
    pub start_time: Option<OffsetDateTime>,
    /// Only include versions published at or before this instant.
    pub end_time: Option<OffsetDateTime>,
    /// Only include versions numbered at or below this bound.
    pub end_version_number: Option<i64>,
    /// Page size; absent or zero means the engine default, oversized
    /// requests clamp to the engine maximum.
    pub page_size: Option<usize>,
    /// Opaque cursor from a previous page's `next_page_token`.
    pub page_token: Option<String>,
}

impl ListVersionsOptions {
    pub fn new() -> Self {
        Self::default()
    }

    /// Bounds the listing to versions published at or after `start`.
    pub fn with_start_time(mut self, start: OffsetDateTime) -> Self {
        self.start_time = Some(start);
        self
    }

    /// Bounds the listing to versions published at or before `end`.
    pub fn with_end_time(mut self, end: OffsetDateTime) -> Self {
        self.end_time = Some(end);
        self
    }

    /// Bounds the listing to version numbers at or below `bound`.
    pub fn with_end_version_number(mut self, bound: i64) -> Self {
        self.end_version_number = Some(bound);
        self
    }

    /// Requests a specific page size.
    pub fn with_page_size(mut self, size: usize) -> Self {
        self.page_size = Some(size);
        self
    }

    /// Continues a listing from a previous page's token.
    pub fn with_page_token(mut self, token: impl Into<String>) -> Self {
        self.page_token = Some(token.into());
        self
    }
}

/// One page of version history.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ListVersionsResponse {
    pub versions: Vec<Version>,
    /// Cursor for the next page; absent when the listing is exhausted.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub next_page_token: Option<String>,
}

/// Decoded page-token payload. Field names are kept short because the token
/// travels on every page request.
#[derive(Debug, PartialEq, Serialize, Deserialize)]
struct PageCursor {
    /// Last version number already returned; the next page starts below it.
    #[serde(rename = "last")]
    last_version: i64,
    /// Highest version number this listing may ever return, pinned when the
    /// first page was served.
    #[serde(rename = "ceil")]
    ceiling: i64,
    /// Filter fingerprint: start of the time window, in unix nanoseconds.
    #[serde(rename = "st")]
    start_time_ns: Option<i64>,
    /// Filter fingerprint: end of the time window, in unix nanoseconds.
    #[serde(rename = "et")]
    end_time_ns: Option<i64>,
    /// Filter fingerprint: requested end version bound.
    #[serde(rename = "ev")]
    end_version: Option<i64>,
}

fn encode_cursor(cursor: &PageCursor) -> Result<String, HistoryError> {
    let payload = rmp_serde::to_vec(cursor).map_err(HistoryError::CursorMint)?;
    Ok(BASE32_NOPAD.encode(&payload))
}

fn decode_cursor(token: &str) -> Result<PageCursor, HistoryError> {
    let payload = BASE32_NOPAD
        .decode(token.as_bytes())
        .map_err(HistoryError::CursorEncoding)?;
    rmp_serde::from_slice(&payload).map_err(HistoryError::CursorPayload)
}

/// Unix nanoseconds clamped into `i64` for the cursor fingerprint.
fn timestamp_nanos(instant: &OffsetDateTime) -> i64 {
    instant
        .unix_timestamp_nanos()
        .clamp(i64::MIN as i128, i64::MAX as i128) as i64
}

/// Serves one page of version history, newest first.
pub fn list_versions(
    store: &VersionStore,
    options: &ListVersionsOptions,
) -> Result<ListVersionsResponse, HistoryError> {
    let limits = store.limits();
    let page_size = match options.page_size {
        None | Some(0) => limits.default_page_size,
        Some(size) => size.min(limits.max_page_size),
    };

    let start_time_ns = options.start_time.as_ref().map(timestamp_nanos);
    let end_time_ns = options.end_time.as_ref().map(timestamp_nanos);

    let cursor = match options.page_token.as_deref() {
        Some(token) if !token.is_empty() => Some(decode_cursor(token)?),
        _ => None,
    };
    if let Some(cursor) = &cursor {
        if cursor.start_time_ns != start_time_ns
            || cursor.end_time_ns != end_time_ns
            || cursor.end_version != options.end_version_number
        {
            return Err(HistoryError::CursorFilterMismatch);
        }
    }

    let ceiling = match &cursor {
        Some(cursor) => cursor.ceiling,
        None => {
            let latest = store.latest_version_number();
            options
                .end_version_number
                .map_or(latest, |bound| bound.min(latest))
        }
    };
    let resume_below = cursor.as_ref().map(|cursor| cursor.last_version);

    let mut versions: Vec<Version> = Vec::with_capacity(page_size);
    let mut truncated = false;
    for version in store.versions_desc() {
        let number = version.version_number;
        if number > ceiling {
            continue;
        }
        if let Some(below) = resume_below {
            if number >= below {
                continue;
            }
        }
        if let Some(start) = &options.start_time {
            if version.update_time < *start {
                continue;
            }
        }
        if let Some(end) = &options.end_time {
            if version.update_time > *end {
                continue;
            }
        }
        if versions.len() == page_size {
            truncated = true;
            break;
        }
        versions.push(version);
    }

    let next_page_token = if truncated {
        // `truncated` implies at least one version was collected.
        let last_version = versions
            .last()
            .map(|version| version.version_number)
            .unwrap_or(ceiling);
        Some(encode_cursor(&PageCursor {
            last_version,
            ceiling,
            start_time_ns,
            end_time_ns,
            end_version: options.end_version_number,
        })?)
    } else {
        None
    };

    debug!(
        "serving history page of {} version(s), exhausted={}",
        versions.len(),
        next_page_token.is_none()
    );
    Ok(ListVersionsResponse {
        versions,
        next_page_token,
    })
}

/// Lazy iterator over version history, fetching pages on demand.
///
/// Yields versions newest-first; consumption may stop at any point without
/// cleanup. The first error (an invalid or mismatched cursor) is yielded
/// once, after which the iterator is exhausted.
#[derive(Debug)]
pub struct VersionIterator<'a> {
    store: &'a VersionStore,
    options: ListVersionsOptions,
    buffer: VecDeque<Version>,
    next_token: Option<String>,
    started: bool,
    done: bool,
}

impl<'a> VersionIterator<'a> {
    /// Starts (or, when the options carry a page token, resumes) a listing.
    pub fn new(store: &'a VersionStore, mut options: ListVersionsOptions) -> Self {
        let next_token = options.page_token.take();
        let started = next_token.is_some();
        Self {
            store,
            options,
            buffer: VecDeque::new(),
            next_token,
            started,
            done: false,
        }
    }

    /// Cursor resuming this listing after the last version already yielded.
    ///
    /// `None` either before the first page was fetched or once the listing
    /// is exhausted.
    pub fn page_token(&self) -> Option<&str> {
        self.next_token.as_deref()
    }
}

impl Iterator for VersionIterator<'_> {
    type Item = Result<Version, HistoryError>;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            if let Some(version) = self.buffer.pop_front() {
                return Some(Ok(version));
            }
            if self.done || (self.started && self.next_token.is_none()) {
                self.done = true;
                return None;
            }

            let mut options = self.options.clone();
            options.page_token = self.next_token.clone();
            match list_versions(self.store, &options) {
                Ok(page) => {
                    self.started = true;
                    self.next_token = page.next_page_token;
                    if page.versions.is_empty() && self.next_token.is_none() {
                        self.done = true;
                        return None;
                    }
                    self.buffer.extend(page.versions);
                }
                Err(err) => {
                    self.done = true;
                    return Some(Err(err));
                }
            }
        }
    }
}
