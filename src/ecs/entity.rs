//! Entity identifiers

use std::fmt;

/// Opaque id of a logical scene object.
///
/// Ids are ordered so stores can keep their slots sorted and be merge-joined.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Entity(pub(crate) u32);

impl Entity {
    /// Build an id from its raw value.
    pub const fn from_raw(raw: u32) -> Self {
        Self(raw)
    }

    pub const fn raw(self) -> u32 {
        self.0
    }
}

impl fmt::Display for Entity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Monotonic id source. Ids are never handed out twice in a session.
#[derive(Debug, Default)]
pub struct EntityAllocator {
    next: u32,
}

impl EntityAllocator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Hand out the next id, or `None` once the id space is used up.
    pub fn allocate(&mut self) -> Option<Entity> {
        let id = Entity(self.next);
        self.next = self.next.checked_add(1)?;
        Some(id)
    }

    /// Number of ids handed out so far.
    pub fn allocated(&self) -> u32 {
        self.next
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_allocator_is_monotonic() {
        let mut alloc = EntityAllocator::new();
        let a = alloc.allocate().unwrap();
        let b = alloc.allocate().unwrap();
        let c = alloc.allocate().unwrap();
        assert!(a < b && b < c);
        assert_eq!(alloc.allocated(), 3);
    }

    /// The last id is never handed out twice.
    #[test]
    fn test_allocator_stops_when_exhausted() {
        let mut alloc = EntityAllocator { next: u32::MAX - 1 };
        assert_eq!(alloc.allocate(), Some(Entity::from_raw(u32::MAX - 1)));
        assert_eq!(alloc.allocate(), None);
        assert_eq!(alloc.allocate(), None);
        assert_eq!(alloc.allocated(), u32::MAX);
    }
}
