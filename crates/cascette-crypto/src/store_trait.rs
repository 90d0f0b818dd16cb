//! Trait-based abstraction for TACT key lookup
//!
//! Decoders only ever read keys, so the seam is a single lookup method.
//! Applications can back it with any key source.

use crate::keys::TactKeyStore;

/// Source of TACT encryption keys
pub trait TactKeyProvider: Send + Sync {
    /// Look up a key by its 64-bit name
    fn get_key(&self, id: u64) -> Option<[u8; 16]>;

    /// Check if a key exists
    fn contains_key(&self, id: u64) -> bool {
        self.get_key(id).is_some()
    }
}

impl TactKeyProvider for TactKeyStore {
    fn get_key(&self, id: u64) -> Option<[u8; 16]> {
        self.get(id).copied()
    }
}

impl<T: TactKeyProvider + ?Sized> TactKeyProvider for &T {
    fn get_key(&self, id: u64) -> Option<[u8; 16]> {
        (**self).get_key(id)
    }
}

impl<T: TactKeyProvider + ?Sized> TactKeyProvider for std::sync::Arc<T> {
    fn get_key(&self, id: u64) -> Option<[u8; 16]> {
        (**self).get_key(id)
    }
}

#[cfg(test)]
#[allow(clippy::expect_used, clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::keys::TactKey;
    use std::collections::HashMap;
    use std::sync::Arc;

    struct MapProvider(HashMap<u64, [u8; 16]>);

    impl TactKeyProvider for MapProvider {
        fn get_key(&self, id: u64) -> Option<[u8; 16]> {
            self.0.get(&id).copied()
        }
    }

    #[test]
    fn test_store_as_provider() {
        let mut store = TactKeyStore::empty();
        store.add(TactKey::new(7, [7; 16]));

        let provider: &dyn TactKeyProvider = &store;
        assert_eq!(provider.get_key(7), Some([7; 16]));
        assert!(!provider.contains_key(8));
    }

    #[test]
    fn test_custom_provider_through_arc() {
        let provider = Arc::new(MapProvider(HashMap::from([(1, [1; 16])])));
        assert!(provider.contains_key(1));
        assert!((&provider).get_key(2).is_none());
    }
}
