//! File-backed page store.
//!
//! Each entry is a single file `wc-<sha256>.html` holding `<unix-ts>:<body>`.

use std::{
    io::{self, Write},
    path::PathBuf,
};

use axum::{
    body::Body,
    http::{HeaderValue, StatusCode, header},
    response::{IntoResponse, Response},
};
use bytes::Bytes;
use http_body_util::BodyExt;
use metrics::counter;
use tempfile::NamedTempFile;
use thiserror::Error;
use time::OffsetDateTime;
use tracing::{debug, warn};

use super::{config::CacheConfig, http_date, keys::CacheKey};

const SOURCE: &str = "cache::store";
const HTML_CONTENT_TYPE: &str = "text/html; charset=utf-8";

#[derive(Debug, Error)]
pub enum CacheWriteError {
    #[error("failed to prepare cache directory: {0}")]
    Directory(io::Error),
    #[error("failed to write cache entry: {0}")]
    Io(io::Error),
    #[error("failed to buffer response body: {0}")]
    Buffer(String),
    #[error("cache writer task failed: {0}")]
    Join(String),
}

/// A stored page and the unix timestamp it was generated at.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CachedPage {
    pub created_at: i64,
    pub body: Bytes,
}

impl CachedPage {
    fn decode(raw: &[u8]) -> Option<Self> {
        let split = raw.iter().position(|byte| *byte == b':')?;
        let created_at = std::str::from_utf8(&raw[..split]).ok()?.parse().ok()?;
        Some(Self {
            created_at,
            body: Bytes::copy_from_slice(&raw[split + 1..]),
        })
    }

    fn encode(created_at: i64, body: &[u8]) -> Vec<u8> {
        let mut raw = format!("{created_at}:").into_bytes();
        raw.extend_from_slice(body);
        raw
    }

    /// `200 OK` carrying the stored body and a `Last-Modified` header.
    pub fn into_response(self) -> Response {
        let mut response = Response::new(Body::from(self.body));
        let headers = response.headers_mut();
        headers.insert(
            header::CONTENT_TYPE,
            HeaderValue::from_static(HTML_CONTENT_TYPE),
        );
        if let Some(value) =
            http_date::format(self.created_at).and_then(|date| HeaderValue::from_str(&date).ok())
        {
            headers.insert(header::LAST_MODIFIED, value);
        }
        response
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CacheLookup {
    Fresh(CachedPage),
    NotModified,
    Miss,
}

/// Whole-page cache rooted at a directory.
#[derive(Debug, Clone)]
pub struct ResponseCache {
    config: CacheConfig,
}

impl ResponseCache {
    pub fn new(config: CacheConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &CacheConfig {
        &self.config
    }

    pub fn path_for(&self, key: &CacheKey) -> PathBuf {
        self.config.directory.join(key.file_name())
    }

    pub async fn lookup(&self, key: &CacheKey, if_modified_since: Option<i64>) -> CacheLookup {
        self.lookup_at(key, if_modified_since, now_unix()).await
    }

    /// Look up `key` as of `now`.
    ///
    /// A conditional timestamp at or after the stored one yields `NotModified` even
    /// when the entry has expired; otherwise entries older than the TTL are misses.
    pub async fn lookup_at(
        &self,
        key: &CacheKey,
        if_modified_since: Option<i64>,
        now: i64,
    ) -> CacheLookup {
        let raw = match tokio::fs::read(self.path_for(key)).await {
            Ok(raw) => raw,
            Err(_) => {
                counter!("folio_cache_miss_total").increment(1);
                debug!(cache = "page", outcome = "miss", key = key.as_str(), "no cache entry");
                return CacheLookup::Miss;
            }
        };

        let Some(page) = CachedPage::decode(&raw) else {
            counter!("folio_cache_miss_total").increment(1);
            warn!(
                target = SOURCE,
                key = key.as_str(),
                result = "corrupt",
                "Ignoring malformed cache entry"
            );
            return CacheLookup::Miss;
        };

        if if_modified_since.is_some_and(|since| since >= page.created_at) {
            counter!("folio_cache_not_modified_total").increment(1);
            debug!(cache = "page", outcome = "not_modified", key = key.as_str());
            return CacheLookup::NotModified;
        }

        if now >= page.created_at.saturating_add(self.config.ttl_seconds()) {
            counter!("folio_cache_miss_total").increment(1);
            debug!(cache = "page", outcome = "stale", key = key.as_str());
            return CacheLookup::Miss;
        }

        counter!("folio_cache_hit_total").increment(1);
        debug!(cache = "page", outcome = "hit", key = key.as_str());
        CacheLookup::Fresh(page)
    }

    pub async fn store(&self, key: &CacheKey, body: &[u8]) -> Result<(), CacheWriteError> {
        self.store_at(key, body, now_unix()).await
    }

    /// Write `body` atomically, replacing any previous entry for `key`.
    pub async fn store_at(
        &self,
        key: &CacheKey,
        body: &[u8],
        created_at: i64,
    ) -> Result<(), CacheWriteError> {
        let directory = self.config.directory.clone();
        let target = self.path_for(key);
        let contents = CachedPage::encode(created_at, body);

        tokio::task::spawn_blocking(move || -> Result<(), CacheWriteError> {
            std::fs::create_dir_all(&directory).map_err(CacheWriteError::Directory)?;
            let mut file = NamedTempFile::new_in(&directory).map_err(CacheWriteError::Io)?;
            file.write_all(&contents).map_err(CacheWriteError::Io)?;
            file.flush().map_err(CacheWriteError::Io)?;
            file.persist(&target)
                .map_err(|err| CacheWriteError::Io(err.error))?;
            Ok(())
        })
        .await
        .map_err(|err| CacheWriteError::Join(err.to_string()))?
    }

    /// Store a successful, non-empty response under `key` and hand it back unchanged.
    ///
    /// Write failures are logged and otherwise ignored.
    pub async fn capture(&self, key: &CacheKey, response: Response) -> Response {
        if response.status() != StatusCode::OK {
            return response;
        }

        let (parts, body) = response.into_parts();
        let bytes = match BodyExt::collect(body).await {
            Ok(collected) => collected.to_bytes(),
            Err(err) => {
                let error = CacheWriteError::Buffer(err.to_string());
                record_write_failure(key, &error);
                return StatusCode::INTERNAL_SERVER_ERROR.into_response();
            }
        };

        if !bytes.is_empty() {
            match self.store(key, &bytes).await {
                Ok(()) => debug!(cache = "page", outcome = "stored", key = key.as_str()),
                Err(error) => record_write_failure(key, &error),
            }
        }

        Response::from_parts(parts, Body::from(bytes))
    }
}

/// `304 Not Modified` with an empty body.
pub fn not_modified() -> Response {
    StatusCode::NOT_MODIFIED.into_response()
}

fn record_write_failure(key: &CacheKey, error: &CacheWriteError) {
    counter!("folio_cache_write_failed_total").increment(1);
    warn!(
        target = SOURCE,
        key = key.as_str(),
        result = "write_failed",
        error = %error,
        "Failed to write page cache entry"
    );
}

fn now_unix() -> i64 {
    OffsetDateTime::now_utc().unix_timestamp()
}
