//! Arena storage for tree entities.
//!
//! Every entity of the structure (nodes, both block layers, groups and
//! components) lives in an [`Arena`] and is addressed by a small copyable
//! handle. Handles carry a generation number, so a handle that outlives the
//! entity it named is detected instead of silently aliasing whatever reused
//! the slot.
//!
//! Freed slots are recycled LIFO. A cascade that frees a block and creates a
//! new one in the same operation may therefore hand out the same index; the
//! bumped generation keeps the two handles distinct.

use std::fmt as StdFmt;
use std::marker::PhantomData;

use crate::error::TreeError;

// ============================================================================
//  Handles
// ============================================================================

/// Common surface of the typed handles.
pub trait Handle: Copy + Eq + StdFmt::Debug {
    /// Arena name used in error messages.
    const KIND: &'static str;

    /// Build a handle from its raw parts.
    fn from_parts(index: u32, generation: u32) -> Self;

    /// Slot index.
    fn index(self) -> u32;

    /// Generation the slot had when the handle was issued.
    fn generation(self) -> u32;
}

macro_rules! define_handle {
    ($(#[$meta:meta])* $name:ident, $kind:literal) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
        pub struct $name {
            index: u32,
            generation: u32,
        }

        impl Handle for $name {
            const KIND: &'static str = $kind;

            #[inline]
            fn from_parts(index: u32, generation: u32) -> Self {
                Self { index, generation }
            }

            #[inline]
            fn index(self) -> u32 {
                self.index
            }

            #[inline]
            fn generation(self) -> u32 {
                self.generation
            }
        }

        impl StdFmt::Display for $name {
            fn fmt(&self, f: &mut StdFmt::Formatter<'_>) -> StdFmt::Result {
                write!(f, "{}#{}.{}", $kind, self.index, self.generation)
            }
        }
    };
}

define_handle!(
    /// Handle to a [`Node`](crate::node::Node) (leaf or internal).
    NodeId,
    "node"
);
define_handle!(
    /// Handle to a [`Block1`](crate::block1::Block1).
    Block1Id,
    "block1"
);
define_handle!(
    /// Handle to a [`Block2`](crate::block2::Block2).
    Block2Id,
    "block2"
);
define_handle!(
    /// Handle to a [`Group`](crate::group::Group).
    GroupId,
    "group"
);
define_handle!(
    /// Handle to a [`Component`](crate::group::Component).
    ComponentId,
    "component"
);

// ============================================================================
//  Arena
// ============================================================================

#[derive(Debug)]
struct Slot<T> {
    generation: u32,
    value: Option<T>,
}

/// Slot vector with a free list and generation-checked access.
#[derive(Debug)]
pub struct Arena<H: Handle, T> {
    slots: Vec<Slot<T>>,
    free: Vec<u32>,
    live: usize,
    _handle: PhantomData<fn() -> H>,
}

impl<H: Handle, T> Arena<H, T> {
    /// Create an empty arena.
    #[must_use]
    pub const fn new() -> Self {
        Self {
            slots: Vec::new(),
            free: Vec::new(),
            live: 0,
            _handle: PhantomData,
        }
    }

    /// Number of live entries.
    #[inline]
    #[must_use]
    pub const fn len(&self) -> usize {
        self.live
    }

    /// Whether the arena holds no live entries.
    #[inline]
    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.live == 0
    }

    /// Store `value` and return its handle.
    ///
    /// # Errors
    ///
    /// [`TreeError::ArenaFull`] once `u32::MAX` slots are in use.
    pub fn insert(&mut self, value: T) -> Result<H, TreeError> {
        if let Some(index) = self.free.pop() {
            let slot: &mut Slot<T> = self
                .slots
                .get_mut(index as usize)
                .ok_or(TreeError::CorruptLink("arena free list"))?;
            slot.value = Some(value);
            self.live += 1;
            return Ok(H::from_parts(index, slot.generation));
        }

        let index: u32 =
            u32::try_from(self.slots.len()).map_err(|_| TreeError::ArenaFull { kind: H::KIND })?;
        self.slots.push(Slot {
            generation: 0,
            value: Some(value),
        });
        self.live += 1;
        Ok(H::from_parts(index, 0))
    }

    /// Remove the entry behind `handle` and return it.
    ///
    /// # Errors
    ///
    /// [`TreeError::StaleHandle`] if the handle does not name a live entry.
    pub fn remove(&mut self, handle: H) -> Result<T, TreeError> {
        let slot: &mut Slot<T> = self
            .slots
            .get_mut(handle.index() as usize)
            .filter(|slot| slot.generation == handle.generation())
            .ok_or_else(|| stale(handle))?;
        let value: T = slot.value.take().ok_or_else(|| stale(handle))?;
        slot.generation = slot.generation.wrapping_add(1);
        self.free.push(handle.index());
        self.live -= 1;
        Ok(value)
    }

    /// Whether `handle` names a live entry.
    #[inline]
    #[must_use]
    pub fn contains(&self, handle: H) -> bool {
        self.get(handle).is_ok()
    }

    /// Shared access to a live entry.
    ///
    /// # Errors
    ///
    /// [`TreeError::StaleHandle`] if the handle does not name a live entry.
    #[inline]
    pub fn get(&self, handle: H) -> Result<&T, TreeError> {
        self.slots
            .get(handle.index() as usize)
            .filter(|slot| slot.generation == handle.generation())
            .and_then(|slot| slot.value.as_ref())
            .ok_or_else(|| stale(handle))
    }

    /// Exclusive access to a live entry.
    ///
    /// # Errors
    ///
    /// [`TreeError::StaleHandle`] if the handle does not name a live entry.
    #[inline]
    pub fn get_mut(&mut self, handle: H) -> Result<&mut T, TreeError> {
        self.slots
            .get_mut(handle.index() as usize)
            .filter(|slot| slot.generation == handle.generation())
            .and_then(|slot| slot.value.as_mut())
            .ok_or_else(|| stale(handle))
    }

    /// Iterate over live entries with their handles.
    pub fn iter(&self) -> impl Iterator<Item = (H, &T)> {
        (0u32..).zip(self.slots.iter()).filter_map(|(index, slot)| {
            slot.value
                .as_ref()
                .map(|value| (H::from_parts(index, slot.generation), value))
        })
    }
}

impl<H: Handle, T> Default for Arena<H, T> {
    fn default() -> Self {
        Self::new()
    }
}

fn stale<H: Handle>(handle: H) -> TreeError {
    TreeError::StaleHandle {
        kind: H::KIND,
        index: handle.index(),
    }
}
