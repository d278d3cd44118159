//! Bidirectional tag registry.
//!
//! Tracks which cache keys were stored under which tags so a tag flush can
//! find its entries, and so an evicted entry can be dropped from every tag.

use std::collections::{HashMap, HashSet};
use std::sync::RwLock;

use super::keys::CacheTag;
use super::lock::{rw_read, rw_write};

const SOURCE: &str = "cache::registry";

#[derive(Default)]
struct Maps {
    tag_to_keys: HashMap<CacheTag, HashSet<String>>,
    key_to_tags: HashMap<String, HashSet<CacheTag>>,
}

impl Maps {
    fn detach_key(&mut self, key: &str) -> bool {
        let Some(tags) = self.key_to_tags.remove(key) else {
            return false;
        };
        for tag in tags {
            if let Some(keys) = self.tag_to_keys.get_mut(&tag) {
                keys.remove(key);
                if keys.is_empty() {
                    self.tag_to_keys.remove(&tag);
                }
            }
        }
        true
    }
}

/// Both directions live behind one lock so they never disagree.
pub struct CacheRegistry {
    maps: RwLock<Maps>,
}

impl CacheRegistry {
    pub fn new() -> Self {
        Self {
            maps: RwLock::new(Maps::default()),
        }
    }

    /// File `key` under `tags`, replacing any tags it was filed under before.
    pub fn register(&self, key: &str, tags: HashSet<CacheTag>) {
        let mut maps = rw_write(&self.maps, SOURCE, "register");
        maps.detach_key(key);

        if tags.is_empty() {
            return;
        }
        for tag in &tags {
            maps.tag_to_keys
                .entry(tag.clone())
                .or_default()
                .insert(key.to_string());
        }
        maps.key_to_tags.insert(key.to_string(), tags);
    }

    pub fn keys_for_tag(&self, tag: &CacheTag) -> HashSet<String> {
        rw_read(&self.maps, SOURCE, "keys_for_tag")
            .tag_to_keys
            .get(tag)
            .cloned()
            .unwrap_or_default()
    }

    pub fn tags_for_key(&self, key: &str) -> HashSet<CacheTag> {
        rw_read(&self.maps, SOURCE, "tags_for_key")
            .key_to_tags
            .get(key)
            .cloned()
            .unwrap_or_default()
    }

    /// Forget a key (evicted, expired or overwritten).
    pub fn unregister(&self, key: &str) -> bool {
        rw_write(&self.maps, SOURCE, "unregister").detach_key(key)
    }

    /// Remove a tag and every key filed under it, returning those keys.
    ///
    /// A removed key is also detached from its other tags since its entry is
    /// about to be dropped.
    pub fn take_tag(&self, tag: &CacheTag) -> HashSet<String> {
        let mut maps = rw_write(&self.maps, SOURCE, "take_tag");
        let keys = maps.tag_to_keys.remove(tag).unwrap_or_default();
        for key in &keys {
            maps.detach_key(key);
        }
        keys
    }

    pub fn clear(&self) {
        let mut maps = rw_write(&self.maps, SOURCE, "clear");
        maps.tag_to_keys.clear();
        maps.key_to_tags.clear();
    }

    pub fn tag_count(&self) -> usize {
        rw_read(&self.maps, SOURCE, "tag_count").tag_to_keys.len()
    }

    pub fn key_count(&self) -> usize {
        rw_read(&self.maps, SOURCE, "key_count").key_to_tags.len()
    }
}

impl Default for CacheRegistry {
    fn default() -> Self {
        Self::new()
    }
}
