//! Cache configuration derived from the `[cache]` settings section.

use std::{path::PathBuf, time::Duration};

use crate::config::CacheSettings;

const SECONDS_PER_HOUR: u64 = 3600;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CacheConfig {
    pub enabled: bool,
    pub directory: PathBuf,
    pub ttl: Duration,
    /// Page identifiers whose anonymous responses may be cached.
    pub cacheable_pages: Vec<String>,
}

impl CacheConfig {
    pub fn ttl_seconds(&self) -> i64 {
        i64::try_from(self.ttl.as_secs()).unwrap_or(i64::MAX)
    }
}

impl From<&CacheSettings> for CacheConfig {
    fn from(settings: &CacheSettings) -> Self {
        Self {
            enabled: settings.enabled,
            directory: settings.directory.clone(),
            ttl: Duration::from_secs(u64::from(settings.ttl_hours.get()) * SECONDS_PER_HOUR),
            cacheable_pages: settings.cacheable_pages.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use std::num::NonZeroU32;

    use super::*;

    #[test]
    fn ttl_is_converted_from_hours() {
        let settings = CacheSettings {
            enabled: true,
            ttl_hours: NonZeroU32::new(2).expect("non-zero"),
            directory: PathBuf::from("/tmp/folio-cache"),
            cacheable_pages: vec!["about".to_string()],
        };
        let config = CacheConfig::from(&settings);
        assert_eq!(config.ttl_seconds(), 7200);
        assert!(config.enabled);
        assert_eq!(config.cacheable_pages, ["about"]);
    }
}
