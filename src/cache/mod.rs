//! Whole-page response cache.
//!
//! Anonymous page responses are written to one file per (path info, locale) pair and
//! served back until they age past the configured TTL. Conditional GETs are answered
//! with `304 Not Modified` when the stored copy is not newer than the client's.

mod config;
pub mod http_date;
mod keys;
mod store;

pub use config::CacheConfig;
pub use keys::CacheKey;
pub use store::{CacheLookup, CacheWriteError, CachedPage, ResponseCache, not_modified};
