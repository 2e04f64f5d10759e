//! Fixed-capacity resource pools.
//!
//! A [`Pool`] is a table of slots sized at driver creation. Acquiring takes
//! the first free slot and returns its index; the index stays valid, and is
//! never handed out again, until the slot is released.

/// A fixed-capacity table of reusable slots.
#[derive(Debug, Clone)]
pub struct Pool<T> {
    slots: Vec<Option<T>>,
}

impl<T> Pool<T> {
    /// Create a pool with `capacity` free slots.
    pub fn with_capacity(capacity: usize) -> Self {
        Pool {
            slots: (0..capacity).map(|_| None).collect(),
        }
    }

    /// Store `value` in the first free slot and return its index.
    pub fn acquire(&mut self, value: T) -> Option<usize> {
        let index = self.slots.iter().position(Option::is_none)?;
        self.slots[index] = Some(value);
        Some(index)
    }

    /// Free a slot, returning what it held.
    pub fn release(&mut self, index: usize) -> Option<T> {
        self.slots.get_mut(index).and_then(Option::take)
    }

    /// Whether the slot at `index` is in use.
    pub fn is_in_use(&self, index: usize) -> bool {
        matches!(self.slots.get(index), Some(Some(_)))
    }

    pub fn get(&self, index: usize) -> Option<&T> {
        self.slots.get(index).and_then(Option::as_ref)
    }

    pub fn get_mut(&mut self, index: usize) -> Option<&mut T> {
        self.slots.get_mut(index).and_then(Option::as_mut)
    }

    /// Index of the first in-use slot matching `pred`.
    pub fn find(&self, mut pred: impl FnMut(&T) -> bool) -> Option<usize> {
        self.slots
            .iter()
            .position(|slot| slot.as_ref().is_some_and(&mut pred))
    }

    /// Iterate over in-use slots with their indices.
    pub fn iter(&self) -> impl Iterator<Item = (usize, &T)> {
        self.slots
            .iter()
            .enumerate()
            .filter_map(|(i, slot)| slot.as_ref().map(|v| (i, v)))
    }

    /// Total number of slots.
    pub fn capacity(&self) -> usize {
        self.slots.len()
    }

    /// Number of slots in use.
    pub fn in_use(&self) -> usize {
        self.slots.iter().filter(|s| s.is_some()).count()
    }

    /// Release every slot.
    pub fn clear(&mut self) {
        self.slots.iter_mut().for_each(|s| *s = None);
    }
}

/// Declares a 1-based handle type for slots of a [`Pool`].
///
/// Handle value `n` refers to slot `n - 1`, so a zeroed handle is never
/// valid.
macro_rules! pool_handle {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
        pub struct $name(std::num::NonZeroU8);

        impl $name {
            pub(crate) fn from_index(index: usize) -> Option<Self> {
                u8::try_from(index + 1)
                    .ok()
                    .and_then(std::num::NonZeroU8::new)
                    .map($name)
            }

            /// Pool slot index this handle refers to.
            pub fn index(self) -> usize {
                usize::from(self.0.get()) - 1
            }

            /// The raw handle value, as sent to the device.
            pub fn value(self) -> u8 {
                self.0.get()
            }
        }

        impl std::fmt::Display for $name {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                write!(f, "{}#{}", stringify!($name), self.0)
            }
        }
    };
}

pub(crate) use pool_handle;

#[cfg(test)]
mod tests {
    use super::*;

    pool_handle!(TestHandle);

    #[test]
    fn test_acquire_first_free_slot() {
        let mut pool = Pool::with_capacity(2);
        assert_eq!(pool.acquire("a"), Some(0));
        assert_eq!(pool.acquire("b"), Some(1));
        assert_eq!(pool.acquire("c"), None);
        assert_eq!(pool.in_use(), 2);

        assert_eq!(pool.release(0), Some("a"));
        assert!(!pool.is_in_use(0));
        assert_eq!(pool.acquire("d"), Some(0));
        assert_eq!(pool.get(0), Some(&"d"));
    }

    #[test]
    fn test_release_out_of_range() {
        let mut pool: Pool<u32> = Pool::with_capacity(1);
        assert_eq!(pool.release(5), None);
        assert_eq!(pool.release(0), None);
        assert!(pool.get_mut(3).is_none());
    }

    #[test]
    fn test_find_and_iter() {
        let mut pool = Pool::with_capacity(4);
        pool.acquire(10);
        pool.acquire(20);
        pool.acquire(30);
        pool.release(1);
        assert_eq!(pool.find(|v| *v == 30), Some(2));
        assert_eq!(pool.find(|v| *v == 20), None);
        let collected: Vec<_> = pool.iter().map(|(i, v)| (i, *v)).collect();
        assert_eq!(collected, vec![(0, 10), (2, 30)]);
        pool.clear();
        assert_eq!(pool.in_use(), 0);
        assert_eq!(pool.capacity(), 4);
    }

    #[test]
    fn test_handle_is_one_based() {
        let h = TestHandle::from_index(0).unwrap();
        assert_eq!(h.value(), 1);
        assert_eq!(h.index(), 0);
        assert!(TestHandle::from_index(255).is_none());
        assert_eq!(h.to_string(), "TestHandle#1");
    }
}
