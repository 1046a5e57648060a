//! Per-frame systems over the component stores.
//!
//! Run order matters: physics moves transforms, the transform system folds
//! the hierarchy into world matrices and refreshes bounds, then cameras pick
//! up the new world positions.

pub mod camera;
pub mod physics;
pub mod transform;

use crate::ecs::EntityManager;

/// Run every system once, in dependency order.
pub fn run_frame(entities: &mut EntityManager, dt: f32, aspect: f32) {
    let stores = entities.stores_mut();
    physics::integrate(stores, dt);
    transform::propagate(stores);
    camera::update_cameras(stores, aspect);
}
