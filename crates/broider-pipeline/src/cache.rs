//! Bounded caches for tiled texture sheets and orientation masks.
//!
//! Two independent LRU caches with per-entry TTL. Values are raw pixel
//! buffers and pure functions of their key, so concurrent producers
//! may race on the same key and last-write-wins is sound. A lookup either
//! sees a fully populated entry or a miss; partial entries are never
//! observable.
//!
//! Uses synchronous locking so the caches are safe to share between
//! the rayon-parallel stages without async machinery.

use std::collections::HashMap;
use std::fmt::Write as _;
use std::hash::Hash;
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use image::GrayImage;
use sha2::{Digest, Sha256};

/// Maximum number of cached full-frame tile sheets.
const TILE_CAPACITY: usize = 64;
/// Tile sheet time-to-live.
const TILE_TTL: Duration = Duration::from_secs(300);
/// Maximum number of cached orientation masks.
const MASK_CAPACITY: usize = 128;
/// Orientation mask time-to-live.
const MASK_TTL: Duration = Duration::from_secs(120);

/// Which texture family a tile sheet belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TileKind {
    /// Pre-rotated thread stripe tile.
    Thread,
    /// Hatch weave tile.
    Hatch,
}

/// Cache key for a full-frame tiled sheet.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TileKey {
    /// Texture family.
    pub kind: TileKind,
    /// Rotation bin of the source tile (0 for hatch).
    pub angle_bin: u8,
    /// Sheet width in pixels.
    pub width: u32,
    /// Sheet height in pixels.
    pub height: u32,
}

/// Cache key for a per-bin orientation mask.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct MaskKey {
    /// Orientation bin the mask selects.
    pub bin: u8,
    /// Mask width in pixels.
    pub width: u32,
    /// Mask height in pixels.
    pub height: u32,
    /// Fingerprint of the orientation source (see [`bins_signature`]).
    pub signature: String,
}

struct Entry<V> {
    value: Arc<V>,
    inserted_at: Instant,
    last_used: Instant,
}

impl<V> Entry<V> {
    fn new(value: V) -> Self {
        let now = Instant::now();
        Self {
            value: Arc::new(value),
            inserted_at: now,
            last_used: now,
        }
    }

    fn is_expired(&self, ttl: Duration) -> bool {
        self.inserted_at.elapsed() > ttl
    }
}

/// One bounded LRU store with TTL.
struct Store<K> {
    entries: Mutex<HashMap<K, Entry<Vec<u8>>>>,
    capacity: usize,
    ttl: Duration,
    label: &'static str,
}

impl<K: Eq + Hash + Clone + std::fmt::Debug> Store<K> {
    fn new(capacity: usize, ttl: Duration, label: &'static str) -> Self {
        Self {
            entries: Mutex::new(HashMap::new()),
            capacity,
            ttl,
            label,
        }
    }

    fn get(&self, key: &K) -> Option<Arc<Vec<u8>>> {
        let mut entries = self.entries.lock().ok()?;
        if entries.get(key).is_some_and(|e| e.is_expired(self.ttl)) {
            tracing::debug!(cache = self.label, key = ?key, "evicting expired cache entry");
            entries.remove(key);
            return None;
        }
        let entry = entries.get_mut(key)?;
        entry.last_used = Instant::now();
        Some(Arc::clone(&entry.value))
    }

    fn store(&self, key: K, value: Vec<u8>) -> Arc<Vec<u8>> {
        let Ok(mut entries) = self.entries.lock() else {
            // A poisoned cache degrades to a pass-through.
            return Arc::new(value);
        };
        let entry = Entry::new(value);
        let shared = Arc::clone(&entry.value);
        entries.insert(key, entry);

        while entries.len() > self.capacity {
            let oldest = entries
                .iter()
                .min_by_key(|(_, e)| e.last_used)
                .map(|(k, _)| k.clone());
            match oldest {
                Some(k) => {
                    tracing::debug!(
                        cache = self.label,
                        key = ?k,
                        len = entries.len(),
                        capacity = self.capacity,
                        "evicting least recently used cache entry"
                    );
                    entries.remove(&k);
                }
                None => break,
            }
        }
        shared
    }

    fn len(&self) -> usize {
        self.entries.lock().map(|e| e.len()).unwrap_or(0)
    }
}

/// The per-process tile and mask cache pair, owned by the pipeline.
///
/// `tiles` holds full-frame RGBA sheets (`width · height · 4` bytes);
/// `masks` holds one-byte-per-pixel orientation masks.
pub struct TileMaskCache {
    tiles: Store<TileKey>,
    masks: Store<MaskKey>,
}

impl TileMaskCache {
    /// Create an empty cache pair with the standard bounds.
    #[must_use]
    pub fn new() -> Self {
        Self {
            tiles: Store::new(TILE_CAPACITY, TILE_TTL, "tiles"),
            masks: Store::new(MASK_CAPACITY, MASK_TTL, "masks"),
        }
    }

    /// Fetch a tile sheet, or build and cache it.
    ///
    /// The builder may run concurrently for the same key; the last
    /// writer wins, which is indistinguishable because sheet content is
    /// a pure function of the key.
    pub fn tile_or_insert_with(
        &self,
        key: TileKey,
        build: impl FnOnce() -> Vec<u8>,
    ) -> Arc<Vec<u8>> {
        if let Some(hit) = self.tiles.get(&key) {
            return hit;
        }
        self.tiles.store(key, build())
    }

    /// Fetch an orientation mask, or build and cache it.
    pub fn mask_or_insert_with(
        &self,
        key: MaskKey,
        build: impl FnOnce() -> Vec<u8>,
    ) -> Arc<Vec<u8>> {
        if let Some(hit) = self.masks.get(&key) {
            return hit;
        }
        self.masks.store(key, build())
    }

    /// Current number of cached tile sheets.
    #[must_use]
    pub fn tile_len(&self) -> usize {
        self.tiles.len()
    }

    /// Current number of cached masks.
    #[must_use]
    pub fn mask_len(&self) -> usize {
        self.masks.len()
    }
}

impl Default for TileMaskCache {
    fn default() -> Self {
        Self::new()
    }
}

/// Fingerprint an orientation bins raster for use in [`MaskKey`].
///
/// Hashes the raw bin bytes together with the dimensions and bin
/// count, then keeps the first 8 digest bytes as hex: short enough
/// for a key, unique enough that masks cannot alias across different
/// source images inside the TTL window.
#[must_use]
pub fn bins_signature(bins: &GrayImage, bin_count: u8) -> String {
    let mut hasher = Sha256::new();
    hasher.update(bins.width().to_le_bytes());
    hasher.update(bins.height().to_le_bytes());
    hasher.update([bin_count]);
    hasher.update(bins.as_raw());
    let digest = hasher.finalize();
    let mut out = String::with_capacity(16);
    for byte in &digest[..8] {
        let _ = write!(out, "{byte:02x}");
    }
    out
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use image::Luma;

    fn tile_key(bin: u8) -> TileKey {
        TileKey {
            kind: TileKind::Thread,
            angle_bin: bin,
            width: 8,
            height: 8,
        }
    }

    #[test]
    fn miss_then_hit_returns_same_bytes() {
        let cache = TileMaskCache::new();
        let built = cache.tile_or_insert_with(tile_key(0), || vec![7; 8 * 8 * 4]);
        let hit = cache.tile_or_insert_with(tile_key(0), || unreachable!("must be a hit"));
        assert_eq!(*built, *hit);
        assert_eq!(cache.tile_len(), 1);
    }

    #[test]
    fn distinct_keys_do_not_collide() {
        let cache = TileMaskCache::new();
        cache.tile_or_insert_with(tile_key(0), || vec![0; 4]);
        cache.tile_or_insert_with(tile_key(1), || vec![1; 4]);
        let a = cache.tile_or_insert_with(tile_key(0), || unreachable!());
        let b = cache.tile_or_insert_with(tile_key(1), || unreachable!());
        assert_eq!(a[0], 0);
        assert_eq!(b[0], 1);
    }

    #[test]
    fn capacity_evicts_least_recently_used() {
        let store = Store::new(2, Duration::from_secs(300), "test");
        store.store(0u8, vec![0]);
        store.store(1u8, vec![1]);
        // Touch key 0 so key 1 becomes the LRU victim.
        assert!(store.get(&0).is_some());
        store.store(2u8, vec![2]);
        assert_eq!(store.len(), 2);
        assert!(store.get(&0).is_some());
        assert!(store.get(&1).is_none());
        assert!(store.get(&2).is_some());
    }

    #[test]
    fn expired_entries_are_misses() {
        let store = Store::new(4, Duration::ZERO, "test");
        store.store(0u8, vec![0]);
        std::thread::sleep(Duration::from_millis(5));
        assert!(store.get(&0).is_none());
        assert_eq!(store.len(), 0);
    }

    #[test]
    fn mask_keys_include_signature() {
        let cache = TileMaskCache::new();
        let key_a = MaskKey {
            bin: 0,
            width: 4,
            height: 4,
            signature: "aaaa".to_owned(),
        };
        let key_b = MaskKey {
            signature: "bbbb".to_owned(),
            ..key_a.clone()
        };
        cache.mask_or_insert_with(key_a.clone(), || vec![1; 16]);
        let b = cache.mask_or_insert_with(key_b, || vec![2; 16]);
        assert_eq!(b[0], 2);
        let a = cache.mask_or_insert_with(key_a, || unreachable!());
        assert_eq!(a[0], 1);
    }

    #[test]
    fn signature_differs_for_different_bins() {
        let a = GrayImage::from_pixel(4, 4, Luma([0]));
        let mut b = a.clone();
        b.put_pixel(1, 1, Luma([2]));
        assert_ne!(bins_signature(&a, 6), bins_signature(&b, 6));
        assert_ne!(bins_signature(&a, 6), bins_signature(&a, 4));
        assert_eq!(bins_signature(&a, 6), bins_signature(&a, 6));
        assert_eq!(bins_signature(&a, 6).len(), 16);
    }
}
