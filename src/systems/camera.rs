//! Camera matrices

use crate::ecs::{merge_join_left_mut, Camera, Entity, Stores};

/// Refresh view/projection of every camera that has a transform.
pub fn update_cameras(stores: &mut Stores, aspect: f32) -> usize {
    merge_join_left_mut(&mut stores.cameras, &stores.transforms, |_, camera, transform| {
        camera.update(transform.world_position(), aspect);
    })
}

/// The camera to render with: the first game camera, or else the first
/// editor camera. Only cameras with a transform qualify.
pub fn active_camera(stores: &Stores) -> Option<(Entity, &Camera)> {
    let mut fallback = None;
    for (entity, camera, _) in crate::ecs::merge(&stores.cameras, &stores.transforms) {
        if !camera.is_editor_camera {
            return Some((entity, camera));
        }
        fallback.get_or_insert((entity, camera));
    }
    fallback
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ecs::{EntityManager, Transform};
    use glam::Vec3;

    /// A game camera wins over an editor camera; matrices follow the world position.
    #[test]
    fn test_game_camera_preferred() {
        let mut em = EntityManager::new();
        let editor = em.create_entity("editor");
        let game = em.create_entity("game");
        for e in [editor, game] {
            em.add_component(e, Transform::from_position(Vec3::Z)).unwrap();
        }
        em.add_component(editor, Camera::default().with_editor(true)).unwrap();
        assert_eq!(active_camera(em.stores()).map(|(e, _)| e), Some(editor));

        em.add_component(game, Camera::default()).unwrap();
        assert_eq!(active_camera(em.stores()).map(|(e, _)| e), Some(game));

        crate::systems::transform::propagate(em.stores_mut());
        assert_eq!(update_cameras(em.stores_mut(), 2.0), 2);
        let cam = em.get::<Camera>(game).unwrap();
        assert_eq!(cam.position(), Vec3::Z);
    }
}
