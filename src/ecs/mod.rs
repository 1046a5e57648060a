//! Entity component storage
//!
//! Components live in per-kind [`ComponentStore`]s sorted by entity id.
//! Systems correlate two stores with [`merge`] joins instead of per-entity
//! lookups.

pub mod components;
pub mod entity;
pub mod manager;
pub mod merge;
pub mod store;
pub mod sync;

pub use components::*;
pub use entity::{Entity, EntityAllocator};
pub use manager::{Component, EntityManager, Stores};
pub use merge::{merge, merge_join_left_mut, merge_join_mut, MergeIter};
pub use store::{ComponentStore, StoreError};
pub use sync::{TransformDelta, TransformSnapshot};
