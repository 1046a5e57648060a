//! Sorted component storage.
//!
//! A [`ComponentStore`] keeps one component type in three parallel arrays
//! (entity ids, validity flags and values), ordered by entity id at all times.
//! Removal only clears the validity flag; slots are reclaimed by
//! [`ComponentStore::compact`], which the entity manager runs at the frame
//! boundary. Keeping ids sorted lets two stores be correlated with a linear
//! merge join (see [`crate::ecs::merge`]).

use super::entity::Entity;
use thiserror::Error;

/// Store mutation errors
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum StoreError {
    #[error("entity {0} already has a live component in this store")]
    Duplicate(Entity),
    #[error("entity {0} is not alive")]
    UnknownEntity(Entity),
    #[error("re-parenting {0} would create a cycle")]
    HierarchyCycle(Entity),
    #[error("entity id space exhausted")]
    IdsExhausted,
}

/// Ordered container of one component kind, keyed by entity id.
#[derive(Debug, Clone)]
pub struct ComponentStore<T> {
    /// Entity id of each slot, non-decreasing.
    entities: Vec<Entity>,
    /// Soft-delete flag of each slot.
    valid: Vec<bool>,
    /// Component values (parallel to `entities`).
    values: Vec<T>,
}

impl<T> Default for ComponentStore<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> ComponentStore<T> {
    pub fn new() -> Self {
        Self {
            entities: Vec::new(),
            valid: Vec::new(),
            values: Vec::new(),
        }
    }

    /// Number of slots, including soft-deleted ones.
    pub fn slot_count(&self) -> usize {
        self.entities.len()
    }

    /// Number of live components.
    pub fn len(&self) -> usize {
        self.valid.iter().filter(|v| **v).count()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Insert a component for `entity`, keeping slots ordered by id.
    ///
    /// The new slot goes after any stale (invalid) slots carrying the same
    /// id, so iteration always meets the stale entry first and skips it.
    /// Fails if `entity` already has a live component here.
    pub fn insert(&mut self, entity: Entity, value: T) -> Result<(), StoreError> {
        let lower = self.entities.partition_point(|e| *e < entity);
        let upper = self.entities.partition_point(|e| *e <= entity);

        if self.valid[lower..upper].iter().any(|v| *v) {
            return Err(StoreError::Duplicate(entity));
        }

        self.entities.insert(upper, entity);
        self.valid.insert(upper, true);
        self.values.insert(upper, value);

        debug_assert!(self.is_sorted());
        Ok(())
    }

    /// Slot index of the live component for `entity`.
    fn find(&self, entity: Entity) -> Option<usize> {
        let lower = self.entities.partition_point(|e| *e < entity);
        (lower..self.entities.len())
            .take_while(|i| self.entities[*i] == entity)
            .find(|i| self.valid[*i])
    }

    /// Soft-delete the component of `entity`. Returns false if there was none.
    pub fn mark_invalid(&mut self, entity: Entity) -> bool {
        match self.find(entity) {
            Some(slot) => {
                self.valid[slot] = false;
                true
            }
            None => false,
        }
    }

    pub fn contains(&self, entity: Entity) -> bool {
        self.find(entity).is_some()
    }

    pub fn get(&self, entity: Entity) -> Option<&T> {
        self.find(entity).map(|slot| &self.values[slot])
    }

    pub fn get_mut(&mut self, entity: Entity) -> Option<&mut T> {
        self.find(entity).map(move |slot| &mut self.values[slot])
    }

    /// Live components in ascending id order.
    pub fn iter(&self) -> impl Iterator<Item = (Entity, &T)> {
        self.entities
            .iter()
            .zip(self.valid.iter())
            .zip(self.values.iter())
            .filter(|((_, valid), _)| **valid)
            .map(|((entity, _), value)| (*entity, value))
    }

    pub fn iter_mut(&mut self) -> impl Iterator<Item = (Entity, &mut T)> {
        self.entities
            .iter()
            .zip(self.valid.iter())
            .zip(self.values.iter_mut())
            .filter(|((_, valid), _)| **valid)
            .map(|((entity, _), value)| (*entity, value))
    }

    /// Ids of live components, ascending.
    pub fn entities(&self) -> impl Iterator<Item = Entity> + '_ {
        self.iter().map(|(entity, _)| entity)
    }

    /// Physically drop soft-deleted slots. Returns how many were removed.
    ///
    /// Must only run between frames, never while a merge walk is active.
    pub fn compact(&mut self) -> usize {
        let before = self.entities.len();
        if self.valid.iter().all(|v| *v) {
            return 0;
        }

        let entities = std::mem::take(&mut self.entities);
        let valid = std::mem::take(&mut self.valid);
        let values = std::mem::take(&mut self.values);

        for ((entity, keep), value) in entities.into_iter().zip(valid).zip(values) {
            if keep {
                self.entities.push(entity);
                self.valid.push(true);
                self.values.push(value);
            }
        }

        debug_assert!(self.is_sorted());
        before - self.entities.len()
    }

    /// Whether slot ids are non-decreasing.
    pub fn is_sorted(&self) -> bool {
        self.entities.windows(2).all(|w| w[0] <= w[1])
    }

    // Slot-level access for merge walks

    pub(crate) fn slot_entity(&self, slot: usize) -> Entity {
        self.entities[slot]
    }

    pub(crate) fn slot_valid(&self, slot: usize) -> bool {
        self.valid[slot]
    }

    pub(crate) fn slot_value(&self, slot: usize) -> &T {
        &self.values[slot]
    }

    pub(crate) fn slot_value_mut(&mut self, slot: usize) -> &mut T {
        &mut self.values[slot]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn e(raw: u32) -> Entity {
        Entity::from_raw(raw)
    }

    #[test]
    fn test_insert_keeps_order() {
        let mut store = ComponentStore::new();
        for id in [5, 1, 9, 3, 7] {
            store.insert(e(id), id * 10).unwrap();
            assert!(store.is_sorted());
        }
        let ids: Vec<u32> = store.entities().map(Entity::raw).collect();
        assert_eq!(ids, vec![1, 3, 5, 7, 9]);
        assert_eq!(store.get(e(7)), Some(&70));
    }

    #[test]
    fn test_duplicate_live_insert_rejected() {
        let mut store = ComponentStore::new();
        store.insert(e(2), "a").unwrap();
        assert_eq!(store.insert(e(2), "b"), Err(StoreError::Duplicate(e(2))));
        assert_eq!(store.get(e(2)), Some(&"a"));
        assert_eq!(store.slot_count(), 1);
    }

    #[test]
    fn test_reinsert_after_invalidate_goes_after_stale_slot() {
        let mut store = ComponentStore::new();
        store.insert(e(1), 1).unwrap();
        store.insert(e(4), 4).unwrap();
        assert!(store.mark_invalid(e(4)));
        store.insert(e(4), 40).unwrap();

        assert_eq!(store.slot_count(), 3);
        assert!(!store.slot_valid(1));
        assert!(store.slot_valid(2));
        assert_eq!(store.get(e(4)), Some(&40));
        assert!(store.is_sorted());
    }

    #[test]
    fn test_get_skips_invalid() {
        let mut store = ComponentStore::new();
        store.insert(e(3), 3.0).unwrap();
        store.mark_invalid(e(3));
        assert!(store.get(e(3)).is_none());
        assert!(!store.contains(e(3)));
        assert!(!store.mark_invalid(e(3)));
        assert!(store.get(e(8)).is_none());
    }

    #[test]
    fn test_compact_reclaims_invalid_slots() {
        let mut store = ComponentStore::new();
        for id in 0..6 {
            store.insert(e(id), id).unwrap();
        }
        store.mark_invalid(e(1));
        store.mark_invalid(e(4));
        assert_eq!(store.len(), 4);
        assert_eq!(store.slot_count(), 6);

        assert_eq!(store.compact(), 2);
        assert_eq!(store.slot_count(), 4);
        assert!(store.is_sorted());
        let ids: Vec<u32> = store.entities().map(Entity::raw).collect();
        assert_eq!(ids, vec![0, 2, 3, 5]);
        assert_eq!(store.compact(), 0);
    }

    #[test]
    fn test_interleaved_inserts_stay_sorted() {
        // Deterministic pseudo-random sequence of inserts and removals
        let mut store = ComponentStore::new();
        let mut seed = 17u32;
        for _ in 0..200 {
            seed = seed.wrapping_mul(1_103_515_245).wrapping_add(12_345);
            let id = (seed >> 16) % 32;
            if seed % 3 == 0 {
                store.mark_invalid(e(id));
            } else {
                let _ = store.insert(e(id), id);
            }
            assert!(store.is_sorted());
            if seed % 11 == 0 {
                store.compact();
                assert!(store.is_sorted());
            }
        }
        for (entity, value) in store.iter() {
            assert_eq!(entity.raw(), *value);
        }
    }

    #[test]
    fn test_iter_mut_updates_live_only() {
        let mut store = ComponentStore::new();
        store.insert(e(1), 1).unwrap();
        store.insert(e(2), 2).unwrap();
        store.mark_invalid(e(1));
        for (_, v) in store.iter_mut() {
            *v += 100;
        }
        assert_eq!(store.get(e(2)), Some(&102));
        assert_eq!(*store.slot_value(0), 1);
    }
}
