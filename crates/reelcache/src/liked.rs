//! Bounded liked-flag set with insertion-order trimming
//!
//! Unlike [`BoundedCache`](crate::BoundedCache) this is not LRU: entries keep
//! the position of their first insertion, and overwriting a flag does not move
//! it. When the set grows past capacity it is cut back to the most recently
//! inserted `trim_to` entries in one step.

use ahash::RandomState;
use indexmap::IndexMap;

use crate::error::CacheError;
use crate::record::RecordId;

/// Record id → liked flag, authoritative over server-reported like state
#[derive(Debug, Clone)]
pub struct LikedFlags {
    flags: IndexMap<RecordId, bool, RandomState>,
    capacity: usize,
    trim_to: usize,
}

impl LikedFlags {
    /// Create an empty set
    pub fn new(capacity: usize, trim_to: usize) -> Result<Self, CacheError> {
        if capacity == 0 || trim_to == 0 || trim_to > capacity {
            return Err(CacheError::InvalidConfiguration(format!(
                "liked flags need 0 < trim_to ({}) <= capacity ({})",
                trim_to, capacity
            )));
        }

        Ok(Self {
            flags: IndexMap::with_capacity_and_hasher(capacity + 1, RandomState::new()),
            capacity,
            trim_to,
        })
    }

    /// Seed from a durable list of liked ids, oldest first
    pub fn load<I>(&mut self, ids: I) -> usize
    where
        I: IntoIterator<Item = RecordId>,
    {
        let mut trimmed = 0;
        for id in ids {
            trimmed += self.set(id, true);
        }
        trimmed
    }

    /// Flag override for `id`, if one is known
    pub fn get(&self, id: &str) -> Option<bool> {
        self.flags.get(id).copied()
    }

    /// Set a flag; returns how many entries were trimmed as a result
    pub fn set(&mut self, id: RecordId, liked: bool) -> usize {
        self.flags.insert(id, liked);
        if self.flags.len() <= self.capacity {
            return 0;
        }

        let excess = self.flags.len() - self.trim_to;
        self.flags.drain(..excess);
        excess
    }

    /// Put back a previously observed state; `None` forgets the override
    pub fn restore(&mut self, id: &str, previous: Option<bool>) {
        match previous {
            Some(liked) => {
                self.set(id.to_string(), liked);
            }
            None => {
                self.flags.shift_remove(id);
            }
        }
    }

    /// Ids currently flagged as liked, oldest insertion first
    pub fn liked_ids(&self) -> Vec<RecordId> {
        self.flags
            .iter()
            .filter(|(_, liked)| **liked)
            .map(|(id, _)| id.clone())
            .collect()
    }

    /// Number of known overrides (liked or not)
    pub fn len(&self) -> usize {
        self.flags.len()
    }

    /// Check if no overrides are known
    pub fn is_empty(&self) -> bool {
        self.flags.is_empty()
    }

    /// Maximum number of overrides
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Forget every override
    pub fn clear(&mut self) {
        self.flags.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn id(n: usize) -> RecordId {
        format!("clip-{}", n)
    }

    #[test]
    fn test_set_and_get() {
        let mut flags = LikedFlags::new(10, 5).unwrap();

        flags.set(id(1), true);
        flags.set(id(2), false);

        assert_eq!(flags.get("clip-1"), Some(true));
        assert_eq!(flags.get("clip-2"), Some(false));
        assert_eq!(flags.get("clip-3"), None);
        assert_eq!(flags.liked_ids(), vec![id(1)]);
    }

    #[test]
    fn test_trim_to_half_keeps_most_recent_insertions() {
        let mut flags = LikedFlags::new(1000, 500).unwrap();

        for n in 0..1000 {
            assert_eq!(flags.set(id(n), true), 0);
        }
        let trimmed = flags.set(id(1000), true);

        assert_eq!(trimmed, 501);
        assert_eq!(flags.len(), 500);
        assert_eq!(flags.get(&id(500)), None);
        assert_eq!(flags.get(&id(501)), Some(true));
        assert_eq!(flags.get(&id(1000)), Some(true));
    }

    #[test]
    fn test_reinsertion_does_not_refresh_position() {
        // Insertion order, not recency: touching an old id again does not save it.
        let mut flags = LikedFlags::new(4, 2).unwrap();

        for n in 0..4 {
            flags.set(id(n), true);
        }
        flags.set(id(0), false);
        flags.set(id(4), true);

        assert_eq!(flags.get(&id(0)), None);
        assert_eq!(flags.liked_ids(), vec![id(3), id(4)]);
    }

    #[test]
    fn test_restore() {
        let mut flags = LikedFlags::new(10, 5).unwrap();

        flags.set(id(1), true);
        flags.restore("clip-1", None);
        assert_eq!(flags.get("clip-1"), None);

        flags.set(id(2), true);
        flags.restore("clip-2", Some(false));
        assert_eq!(flags.get("clip-2"), Some(false));
    }

    #[test]
    fn test_load() {
        let mut flags = LikedFlags::new(3, 2).unwrap();

        let trimmed = flags.load((0..4).map(id));

        assert_eq!(trimmed, 2);
        assert_eq!(flags.liked_ids(), vec![id(2), id(3)]);
    }

    #[test]
    fn test_invalid_configuration() {
        assert!(LikedFlags::new(0, 0).is_err());
        assert!(LikedFlags::new(10, 11).is_err());
    }
}
