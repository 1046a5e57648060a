//! Integration tests for the engine frame loop.

mod common;

use glam::Vec3;
use scene_engine::backend::RecordingBackend;
use scene_engine::ecs::{Camera, MeshComponent, Physics, TransformDelta, Transform};
use scene_engine::resources::{Material, Mesh};
use scene_engine::{ChainTarget, Engine, EngineConfig, PostprocessConfig, StepRecord};

fn engine() -> Engine<RecordingBackend> {
    let mut engine = Engine::new(common::backend(), EngineConfig::default().with_ambient(Vec3::splat(0.1)));
    let cube = Mesh::cube();
    let mesh = engine.add_mesh("cube", &cube).unwrap();
    let material = engine.add_material(Material::matte(Vec3::ONE));

    let entities = engine.entities_mut();
    let camera = entities.create_entity("camera");
    entities.add_component(camera, Transform::from_position(Vec3::new(0.0, 1.0, 6.0))).unwrap();
    entities.add_component(camera, Camera::default()).unwrap();
    let crate_entity = entities.create_entity("crate");
    entities.add_component(crate_entity, Transform::default()).unwrap();
    entities
        .add_component(crate_entity, MeshComponent::new(mesh, material, cube.bounds()))
        .unwrap();
    engine
}

#[test]
fn test_frame_moves_bodies_and_presents() {
    let mut engine = engine();
    let ball = engine.entities_mut().create_entity("ball");
    engine.entities_mut().add_component(ball, Transform::default()).unwrap();
    engine
        .entities_mut()
        .add_component(ball, Physics::with_velocity(Vec3::Y))
        .unwrap();

    let stats = engine.frame(0.5).unwrap();
    assert!(stats.scene_rendered);
    assert!(stats.vertices_drawn > 0);
    assert_eq!(engine.backend().frames(), 1);
    assert_eq!(engine.frame_index(), 1);
    assert_eq!(engine.entities().get::<Transform>(ball).unwrap().position(), Vec3::new(0.0, 0.5, 0.0));
    assert!(engine.backend().errors().is_empty(), "{:?}", engine.backend().errors());
}

#[test]
fn test_deltas_apply_after_the_frame() {
    let mut engine = engine();
    let snapshot = engine.snapshot_transforms();
    let target = snapshot[1].entity;
    engine.queue_transform_deltas([TransformDelta::new(target).with_position(Vec3::X)]);

    engine.update(0.016);
    assert_eq!(engine.entities().get::<Transform>(target).unwrap().position(), Vec3::ZERO);
    engine.render().unwrap();
    engine.end_frame();
    assert_eq!(engine.entities().get::<Transform>(target).unwrap().position(), Vec3::X);
}

#[test]
fn test_destroyed_entity_removed_at_end_of_frame() {
    let mut engine = engine();
    let doomed = engine.entities_mut().create_entity("doomed");
    engine.entities_mut().destroy_entity(doomed);
    assert!(engine.entities().is_alive(doomed));
    engine.frame(0.016).unwrap();
    assert!(!engine.entities().is_alive(doomed));
}

#[test]
fn test_postprocess_config_reaches_display() {
    let mut engine = engine();
    engine.frame(0.016).unwrap();
    let plain = engine.backend().display_content();

    engine.configure_postprocess(&PostprocessConfig::from_records(&[StepRecord::new(
        ChainTarget::Main,
        "grayscale",
    )]));
    let stats = engine.frame(0.016).unwrap();
    assert_eq!(stats.postprocess_steps, 1);
    assert_ne!(engine.backend().display_content(), plain);
    assert_eq!(engine.renderer().chain(ChainTarget::Main).step_count(), 1);
}

#[test]
fn test_shutdown_releases_gpu_resources() {
    let mut engine = engine();
    engine.frame(0.016).unwrap();
    let backend = engine.shutdown();
    assert_eq!(backend.live_textures(), 0);
    assert_eq!(backend.live_buffers(), 0);
}
