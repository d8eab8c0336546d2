//! Single-writer, multi-reader access to a [`FingerTree`].
//!
//! The structure itself is single-threaded. [`SharedFingerTree`] puts one
//! `parking_lot::RwLock` around it: mutations take the write lock, queries
//! the read lock. Fingers stay valid across lock acquisitions as long as
//! their key is not removed in between.

use parking_lot::{RwLock, RwLockReadGuard, RwLockWriteGuard};

use crate::error::TreeError;
use crate::tree::{Finger, FingerTree};
use crate::Key;

/// A [`FingerTree`] behind a read-write lock.
#[derive(Debug, Default)]
pub struct SharedFingerTree {
    inner: RwLock<FingerTree>,
}

impl SharedFingerTree {
    /// Create an empty shared tree.
    #[must_use]
    pub const fn new() -> Self {
        Self {
            inner: RwLock::new(FingerTree::new()),
        }
    }

    /// Wrap an existing tree.
    #[must_use]
    pub const fn from_tree(tree: FingerTree) -> Self {
        Self {
            inner: RwLock::new(tree),
        }
    }

    /// Number of stored keys.
    #[must_use]
    pub fn len(&self) -> usize {
        self.inner.read().len()
    }

    /// Whether the tree stores no keys.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.inner.read().is_empty()
    }

    /// See [`FingerTree::insert`].
    ///
    /// # Errors
    ///
    /// As [`FingerTree::insert`].
    pub fn insert(&self, value: Key) -> Result<bool, TreeError> {
        self.inner.write().insert(value)
    }

    /// See [`FingerTree::remove`].
    ///
    /// # Errors
    ///
    /// As [`FingerTree::remove`].
    pub fn remove(&self, value: Key) -> Result<bool, TreeError> {
        self.inner.write().remove(value)
    }

    /// See [`FingerTree::contains`].
    ///
    /// # Errors
    ///
    /// As [`FingerTree::contains`].
    pub fn contains(&self, value: Key) -> Result<bool, TreeError> {
        self.inner.read().contains(value)
    }

    /// Key at the predecessor position of `value`, if the tree is not empty.
    ///
    /// # Errors
    ///
    /// As [`FingerTree::search`].
    pub fn predecessor(&self, value: Key) -> Result<Option<Key>, TreeError> {
        let tree = self.inner.read();
        match tree.search(value)? {
            Some(finger) => tree.value(finger).map(Some),
            None => Ok(None),
        }
    }

    /// See [`FingerTree::finger_search`].
    ///
    /// # Errors
    ///
    /// As [`FingerTree::finger_search`].
    pub fn finger_search(&self, finger: Finger, value: Key) -> Result<Finger, TreeError> {
        self.inner.read().finger_search(finger, value)
    }

    /// Shared access for several queries under one lock.
    pub fn read(&self) -> RwLockReadGuard<'_, FingerTree> {
        self.inner.read()
    }

    /// Exclusive access for several mutations under one lock.
    pub fn write(&self) -> RwLockWriteGuard<'_, FingerTree> {
        self.inner.write()
    }

    /// Unwrap the tree.
    #[must_use]
    pub fn into_inner(self) -> FingerTree {
        self.inner.into_inner()
    }
}

#[cfg(test)]
#[expect(clippy::unwrap_used, reason = "Fail fast in tests")]
mod tests {
    use std::sync::Arc;
    use std::thread;

    use super::*;

    #[test]
    fn test_readers_see_writer_results() {
        let shared: Arc<SharedFingerTree> = Arc::new(SharedFingerTree::new());
        for key in 0..500 {
            shared.insert(key * 2).unwrap();
        }

        let readers: Vec<_> = (0..4)
            .map(|t| {
                let shared: Arc<SharedFingerTree> = Arc::clone(&shared);
                thread::spawn(move || {
                    for key in (0..500).filter(|k| k % 4 == t) {
                        assert!(shared.contains(key * 2).unwrap());
                        assert_eq!(shared.predecessor(key * 2 + 1).unwrap(), Some(key * 2));
                    }
                })
            })
            .collect();
        for reader in readers {
            reader.join().unwrap();
        }
        assert_eq!(shared.len(), 500);
    }

    #[test]
    fn test_writers_serialize() {
        let shared: Arc<SharedFingerTree> = Arc::new(SharedFingerTree::new());
        let writers: Vec<_> = (0..4)
            .map(|t: Key| {
                let shared: Arc<SharedFingerTree> = Arc::clone(&shared);
                thread::spawn(move || {
                    for key in 0..250 {
                        shared.insert(key * 4 + t).unwrap();
                    }
                })
            })
            .collect();
        for writer in writers {
            writer.join().unwrap();
        }

        let tree = shared.read();
        assert_eq!(tree.len(), 1000);
        tree.check_invariants().unwrap();
        assert!(tree.iter().eq(0..1000));
    }
}
