//! Cache key derivation.

use sha2::{Digest, Sha256};

const FILE_PREFIX: &str = "wc-";
const FILE_SUFFIX: &str = ".html";

/// Hex SHA-256 digest identifying one cached page.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CacheKey(String);

impl CacheKey {
    /// Key for `path_info` rendered in `locale`.
    pub fn derive(path_info: &str, locale: &str) -> Self {
        let mut hasher = Sha256::new();
        hasher.update(path_info.as_bytes());
        hasher.update(b"-");
        hasher.update(locale.as_bytes());
        Self(hex::encode(hasher.finalize()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn file_name(&self) -> String {
        format!("{FILE_PREFIX}{}{FILE_SUFFIX}", self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn key_depends_on_locale() {
        let en = CacheKey::derive("/demo/about", "en");
        let fr = CacheKey::derive("/demo/about", "fr_CA");
        assert_ne!(en, fr);
        assert_eq!(en, CacheKey::derive("/demo/about", "en"));
        assert_eq!(en.as_str().len(), 64);
    }

    #[test]
    fn file_name_is_prefixed() {
        let key = CacheKey::derive("site", "en");
        let name = key.file_name();
        assert!(name.starts_with("wc-"));
        assert!(name.ends_with(".html"));
    }
}
