//! Sorted-merge join over two component stores.
//!
//! Both stores are walked with one cursor each in ascending id order. Invalid
//! slots are skipped before every comparison, so a stale slot never pairs
//! with a live slot of the same id. The walk is O(n + m) and touches memory
//! linearly.

use super::entity::Entity;
use super::store::ComponentStore;
use std::cmp::Ordering;

/// Advance `cursor` past soft-deleted slots.
fn skip_invalid<T>(store: &ComponentStore<T>, cursor: &mut usize) {
    while *cursor < store.slot_count() && !store.slot_valid(*cursor) {
        *cursor += 1;
    }
}

/// Find the next pair of slots that hold live components of the same entity.
fn next_match<A, B>(
    a: &ComponentStore<A>,
    b: &ComponentStore<B>,
    cursor_a: &mut usize,
    cursor_b: &mut usize,
) -> Option<(Entity, usize, usize)> {
    loop {
        skip_invalid(a, cursor_a);
        skip_invalid(b, cursor_b);
        if *cursor_a >= a.slot_count() || *cursor_b >= b.slot_count() {
            return None;
        }

        let id_a = a.slot_entity(*cursor_a);
        let id_b = b.slot_entity(*cursor_b);
        match id_a.cmp(&id_b) {
            Ordering::Less => *cursor_a += 1,
            Ordering::Greater => *cursor_b += 1,
            Ordering::Equal => {
                let found = (id_a, *cursor_a, *cursor_b);
                *cursor_a += 1;
                *cursor_b += 1;
                return Some(found);
            }
        }
    }
}

/// Iterator over entities live in both stores.
pub struct MergeIter<'a, A, B> {
    a: &'a ComponentStore<A>,
    b: &'a ComponentStore<B>,
    cursor_a: usize,
    cursor_b: usize,
}

impl<'a, A, B> Iterator for MergeIter<'a, A, B> {
    type Item = (Entity, &'a A, &'a B);

    fn next(&mut self) -> Option<Self::Item> {
        let (entity, slot_a, slot_b) =
            next_match(self.a, self.b, &mut self.cursor_a, &mut self.cursor_b)?;
        Some((entity, self.a.slot_value(slot_a), self.b.slot_value(slot_b)))
    }
}

/// Read-only merge join of `a` and `b`.
pub fn merge<'a, A, B>(a: &'a ComponentStore<A>, b: &'a ComponentStore<B>) -> MergeIter<'a, A, B> {
    MergeIter {
        a,
        b,
        cursor_a: 0,
        cursor_b: 0,
    }
}

/// Merge join handing out `&mut` to both sides. Returns the number of pairs visited.
pub fn merge_join_mut<A, B, F>(a: &mut ComponentStore<A>, b: &mut ComponentStore<B>, mut f: F) -> usize
where
    F: FnMut(Entity, &mut A, &mut B),
{
    let mut cursor_a = 0;
    let mut cursor_b = 0;
    let mut visited = 0;
    while let Some((entity, slot_a, slot_b)) = next_match(a, b, &mut cursor_a, &mut cursor_b) {
        f(entity, a.slot_value_mut(slot_a), b.slot_value_mut(slot_b));
        visited += 1;
    }
    visited
}

/// Merge join that mutates `a` while reading `b`.
pub fn merge_join_left_mut<A, B, F>(a: &mut ComponentStore<A>, b: &ComponentStore<B>, mut f: F) -> usize
where
    F: FnMut(Entity, &mut A, &B),
{
    let mut cursor_a = 0;
    let mut cursor_b = 0;
    let mut visited = 0;
    while let Some((entity, slot_a, slot_b)) = next_match(a, b, &mut cursor_a, &mut cursor_b) {
        f(entity, a.slot_value_mut(slot_a), b.slot_value(slot_b));
        visited += 1;
    }
    visited
}

#[cfg(test)]
mod tests {
    use super::*;

    fn e(raw: u32) -> Entity {
        Entity::from_raw(raw)
    }

    fn store(ids: &[u32]) -> ComponentStore<u32> {
        let mut s = ComponentStore::new();
        for id in ids {
            s.insert(e(*id), *id).unwrap();
        }
        s
    }

    #[test]
    fn test_merge_visits_intersection_in_order() {
        let a = store(&[1, 2, 4, 6, 8, 9]);
        let b = store(&[0, 2, 3, 6, 9, 12]);
        let ids: Vec<u32> = merge(&a, &b).map(|(id, _, _)| id.raw()).collect();
        assert_eq!(ids, vec![2, 6, 9]);
    }

    #[test]
    fn test_merge_skips_invalid_on_both_sides() {
        let mut a = store(&[1, 3, 5, 7]);
        let mut b = store(&[1, 3, 5, 7]);
        a.mark_invalid(e(3));
        b.mark_invalid(e(5));
        let ids: Vec<u32> = merge(&a, &b).map(|(id, _, _)| id.raw()).collect();
        assert_eq!(ids, vec![1, 7]);
    }

    #[test]
    fn test_stale_slot_never_pairs() {
        let mut a = store(&[2]);
        a.mark_invalid(e(2));
        a.insert(e(2), 200).unwrap();
        let b = store(&[2]);

        let pairs: Vec<(u32, u32)> = merge(&a, &b).map(|(_, x, y)| (*x, *y)).collect();
        assert_eq!(pairs, vec![(200, 2)]);
    }

    #[test]
    fn test_merge_join_mut_updates_both() {
        let mut a = store(&[1, 2, 3]);
        let mut b = store(&[2, 3, 4]);
        let visited = merge_join_mut(&mut a, &mut b, |_, x, y| {
            *x += 10;
            *y += 20;
        });
        assert_eq!(visited, 2);
        assert_eq!(a.get(e(1)), Some(&1));
        assert_eq!(a.get(e(2)), Some(&12));
        assert_eq!(b.get(e(3)), Some(&23));
        assert_eq!(b.get(e(4)), Some(&4));
    }

    #[test]
    fn test_merge_empty_stores() {
        let a = store(&[]);
        let b = store(&[1, 2]);
        assert_eq!(merge(&a, &b).count(), 0);
        assert_eq!(merge(&b, &a).count(), 0);
    }
}
