use std::collections::HashMap;
use std::hash::Hash;
use std::mem;

use crate::core::error::{Error, ErrorKind, Result};

/// Two-generation bounded write-back cache. Entries land in `fresh`;
/// when `fresh` outgrows `size` the generations rotate: `stale` entries
/// not touched since the last rotation are flushed through the caller's
/// write-back closure and dropped, and `fresh` becomes the new `stale`.
///
/// Net effect: an entry survives at least one full promotion cycle
/// before risking eviction and is persisted at most one rotation after
/// it stops being touched, in O(size) memory.
///
/// Values are exclusively owned by their slot. Promotion moves an entry
/// from `stale` back into `fresh`; rotation deduplicates on key, so the
/// flush-once behavior is the same as if both generations shared it.
pub struct GenerationalCache<K, V> {
    fresh: HashMap<K, V>,
    stale: HashMap<K, V>,
    size: usize,
}

impl<K: Eq + Hash + Clone, V> GenerationalCache<K, V> {
    pub fn new(size: usize) -> Self {
        GenerationalCache {
            fresh: HashMap::new(),
            stale: HashMap::new(),
            size,
        }
    }

    pub fn contains(&self, key: &K) -> bool {
        self.fresh.contains_key(key) || self.stale.contains_key(key)
    }

    /// Borrow an entry, promoting it out of `stale` first. Promotion
    /// counts as a touch and may itself trigger a rotation, which is why
    /// the write-back closure is needed here too.
    pub fn get_mut<F>(&mut self, key: &K, flush: &mut F) -> Result<Option<&mut V>>
    where
        F: FnMut(&K, &V) -> Result<()>,
    {
        if !self.fresh.contains_key(key) {
            match self.stale.remove(key) {
                Some(value) => self.put(key.clone(), value, flush)?,
                None => return Ok(None),
            }
        }
        // A rotation triggered by the promotion leaves the entry in stale.
        if self.fresh.contains_key(key) {
            return Ok(self.fresh.get_mut(key));
        }
        Ok(self.stale.get_mut(key))
    }

    pub fn put<F>(&mut self, key: K, value: V, flush: &mut F) -> Result<()>
    where
        F: FnMut(&K, &V) -> Result<()>,
    {
        self.fresh.insert(key, value);
        if self.fresh.len() > self.size {
            self.rotate(false, flush)?;
        }
        Ok(())
    }

    /// Flush due entries and swap generations.
    ///
    /// A stale entry whose key was re-promoted into `fresh` is newer
    /// there and is not flushed by this rotation (deferred), unless
    /// `full`, in which case the fresh value is flushed and removed.
    /// `full` additionally flushes everything left in `fresh`.
    pub fn rotate<F>(&mut self, full: bool, flush: &mut F) -> Result<()>
    where
        F: FnMut(&K, &V) -> Result<()>,
    {
        for (key, value) in self.stale.drain() {
            let due = match self.fresh.remove_entry(&key) {
                Some((key, newer)) => {
                    if !full {
                        // Newer copy stays cached for a future rotation
                        self.fresh.insert(key, newer);
                        continue;
                    }
                    (key, newer)
                }
                None => (key, value),
            };
            flush(&due.0, &due.1).map_err(flush_failure)?;
        }

        if full {
            for (key, value) in self.fresh.drain() {
                flush(&key, &value).map_err(flush_failure)?;
            }
        }

        self.stale = mem::take(&mut self.fresh);
        Ok(())
    }

    /// Must run before the enclosing transaction commits.
    pub fn close<F>(&mut self, flush: &mut F) -> Result<()>
    where
        F: FnMut(&K, &V) -> Result<()>,
    {
        self.rotate(true, flush)
    }

    /// Drop an entry from both generations without flushing it.
    pub fn remove(&mut self, key: &K) {
        self.fresh.remove(key);
        self.stale.remove(key);
    }
}

fn flush_failure(err: Error) -> Error {
    Error::new(ErrorKind::CacheFlush, err.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::RefCell;

    fn no_flush(_: &&'static str, _: &u32) -> Result<()> {
        Ok(())
    }

    #[test]
    fn get_promotes_from_stale() {
        let mut cache: GenerationalCache<&str, u32> = GenerationalCache::new(2);
        cache.put("a", 1, &mut no_flush).unwrap();
        cache.put("b", 2, &mut no_flush).unwrap();
        cache.put("c", 3, &mut no_flush).unwrap(); // rotates, nothing stale yet

        assert_eq!(cache.get_mut(&"a", &mut no_flush).unwrap(), Some(&mut 1));
        // Promoted entry is reachable again after another rotation cycle
        cache.put("d", 4, &mut no_flush).unwrap();
        assert_eq!(cache.get_mut(&"a", &mut no_flush).unwrap(), Some(&mut 1));
        assert_eq!(cache.get_mut(&"zzz", &mut no_flush).unwrap(), None);
    }

    #[test]
    fn rotation_flushes_exactly_the_unpromoted_stale_keys() {
        let flushed: RefCell<Vec<&'static str>> = RefCell::new(Vec::new());
        let mut record = |key: &&'static str, _: &u32| {
            flushed.borrow_mut().push(*key);
            Ok(())
        };

        let mut cache: GenerationalCache<&str, u32> = GenerationalCache::new(2);
        cache.put("a", 1, &mut record).unwrap();
        cache.put("b", 2, &mut record).unwrap();
        cache.put("c", 3, &mut record).unwrap();
        // First rotation had an empty stale generation
        assert!(flushed.borrow().is_empty());

        // Touch "b" so the coming rotation must not flush it
        cache.get_mut(&"b", &mut record).unwrap();
        cache.put("d", 4, &mut record).unwrap();
        cache.put("e", 5, &mut record).unwrap(); // fresh = {b, d, e} > 2 -> rotate

        let mut seen = flushed.borrow().clone();
        seen.sort();
        assert_eq!(seen, vec!["a", "c"]);
    }

    #[test]
    fn close_flushes_everything_once() {
        let flushed: RefCell<Vec<&'static str>> = RefCell::new(Vec::new());
        let mut record = |key: &&'static str, _: &u32| {
            flushed.borrow_mut().push(*key);
            Ok(())
        };

        let mut cache: GenerationalCache<&str, u32> = GenerationalCache::new(10);
        cache.put("a", 1, &mut record).unwrap();
        cache.put("b", 2, &mut record).unwrap();
        cache.rotate(false, &mut record).unwrap(); // a, b now stale
        cache.get_mut(&"a", &mut record).unwrap(); // promote a
        cache.put("c", 3, &mut record).unwrap();

        cache.close(&mut record).unwrap();
        let mut seen = flushed.borrow().clone();
        seen.sort();
        assert_eq!(seen, vec!["a", "b", "c"]);
    }

    #[test]
    fn removed_entries_are_never_flushed() {
        let flushed: RefCell<Vec<&'static str>> = RefCell::new(Vec::new());
        let mut record = |key: &&'static str, _: &u32| {
            flushed.borrow_mut().push(*key);
            Ok(())
        };

        let mut cache: GenerationalCache<&str, u32> = GenerationalCache::new(10);
        cache.put("doomed", 1, &mut record).unwrap();
        cache.rotate(false, &mut record).unwrap();
        cache.remove(&"doomed");
        cache.close(&mut record).unwrap();
        assert!(flushed.borrow().is_empty());
    }

    #[test]
    fn flush_errors_are_fatal() {
        let mut fail = |_: &&'static str, _: &u32| -> Result<()> {
            Err(Error::new(ErrorKind::Store, "disk full".to_string()))
        };
        let mut cache: GenerationalCache<&str, u32> = GenerationalCache::new(10);
        cache.put("a", 1, &mut fail).unwrap();
        cache.rotate(false, &mut fail).unwrap();
        let err = cache.close(&mut fail).unwrap_err();
        assert_eq!(err.kind, ErrorKind::CacheFlush);
        assert!(err.is_fatal());
    }
}
