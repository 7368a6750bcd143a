//! preview handles for imported files
//!
//! a [`PreviewUrl`] is only valid while it's alive. dropping it revokes the url and frees the
//! bytes behind it, so an item that owns its preview can't leak one.
use {
    hashbrown::HashMap,
    std::{
        fmt,
        sync::{Arc, Mutex, PoisonError},
    },
    tracing::trace,
    uuid::Uuid,
};

/// the scheme and authority every preview url starts with
pub const PREVIEW_PREFIX: &str = "blob:layera/";

/// the live previews, url → bytes
type Previews = HashMap<String, Arc<[u8]>>;

/// hands out preview urls and resolves them while they're alive
#[derive(Clone, Default)]
pub struct PreviewRegistry {
    /// the live previews
    live: Arc<Mutex<Previews>>,
}

impl PreviewRegistry {
    /// make an empty registry
    pub fn new() -> Self {
        Self::default()
    }

    /// lock the previews
    fn previews(&self) -> std::sync::MutexGuard<'_, Previews> {
        self.live.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// create a preview url for some bytes
    pub fn create(&self, bytes: impl Into<Arc<[u8]>>) -> PreviewUrl {
        let url = format!("{}{}", PREVIEW_PREFIX, Uuid::new_v4());
        self.previews().insert(url.clone(), bytes.into());
        trace!(url, "created preview url");

        PreviewUrl {
            url,
            registry: self.clone(),
        }
    }

    /// the bytes behind a url, if it hasn't been revoked
    pub fn resolve(&self, url: &str) -> Option<Arc<[u8]>> {
        self.previews().get(url).cloned()
    }

    /// how many urls are alive
    pub fn live_count(&self) -> usize {
        self.previews().len()
    }

    /// revoke a url
    fn revoke(&self, url: &str) {
        if self.previews().remove(url).is_some() {
            trace!(url, "revoked preview url");
        }
    }
}

impl fmt::Debug for PreviewRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PreviewRegistry")
            .field("live", &self.live_count())
            .finish()
    }
}

/// an owned preview url, revoked on drop
pub struct PreviewUrl {
    /// the url
    url: String,
    /// the registry it was created in
    registry: PreviewRegistry,
}

impl PreviewUrl {
    /// the url
    pub fn as_str(&self) -> &str {
        &self.url
    }
}

impl fmt::Debug for PreviewUrl {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("PreviewUrl").field(&self.url).finish()
    }
}

impl fmt::Display for PreviewUrl {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.url)
    }
}

impl Drop for PreviewUrl {
    fn drop(&mut self) {
        self.registry.revoke(&self.url);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_drop_revokes() {
        let registry = PreviewRegistry::new();
        let preview = registry.create(vec![1u8, 2, 3]);
        let url = preview.as_str().to_string();

        assert!(url.starts_with(PREVIEW_PREFIX));
        assert_eq!(registry.resolve(&url).as_deref(), Some(&[1u8, 2, 3][..]));
        assert_eq!(registry.live_count(), 1);

        drop(preview);
        assert_eq!(registry.resolve(&url), None);
        assert_eq!(registry.live_count(), 0);
    }

    #[test]
    fn test_urls_are_unique() {
        let registry = PreviewRegistry::new();
        let a = registry.create(Vec::new());
        let b = registry.create(Vec::new());

        assert_ne!(a.as_str(), b.as_str());
        assert_eq!(registry.live_count(), 2);
    }
}
