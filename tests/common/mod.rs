//! Common utilities for the integration tests.
//!
//! Everything runs on the recording backend: texture contents are
//! fingerprints, so "identical output" means equal fingerprints.

#![allow(dead_code)]

use glam::{Quat, Vec3};
use scene_engine::backend::{FrameContext, GraphicsBackend, RecordingBackend, TextureFormat};
use scene_engine::ecs::{
    Camera, DirectionalLight, Entity, EntityManager, MeshComponent, PointLight, SpotLight, Transform,
};
use scene_engine::pipeline::{PostprocessChain, PostprocessStep};
use scene_engine::resources::{Material, Mesh, ResourceCache, ResourceLibrary};

pub const WIDTH: u32 = 64;
pub const HEIGHT: u32 = 48;

pub fn init_logging() {
    let _ = env_logger::builder().is_test(true).try_init();
}

/// Recording backend with a `WIDTH` x `HEIGHT` display
pub fn backend() -> RecordingBackend {
    init_logging();
    RecordingBackend::new(WIDTH, HEIGHT)
}

/// Begin a frame and return its context
pub fn begin(backend: &mut RecordingBackend) -> FrameContext {
    backend.begin_frame().expect("recording backend never fails to begin a frame")
}

pub fn end(backend: &mut RecordingBackend) {
    backend.end_frame().expect("recording backend never fails to end a frame");
}

/// A main chain the way the renderer creates it
pub fn main_chain(backend: &RecordingBackend, steps: Vec<PostprocessStep>) -> PostprocessChain {
    let mut chain = PostprocessChain::new("main", backend.display_format(), true, true);
    chain.configure(steps);
    chain
}

/// Give the chain's input buffer a recognisable content
pub fn fill_input(backend: &mut RecordingBackend, chain: &mut PostprocessChain, frame: &FrameContext) {
    assert!(chain.ensure_size(backend, frame.width, frame.height));
    let input = *chain.input().expect("buffers were just created");
    input.clear(backend, [0.25, 0.5, 0.75, 1.0]);
}

pub fn input_content(backend: &RecordingBackend, chain: &PostprocessChain) -> u64 {
    let input = chain.input().expect("chain has buffers");
    backend.texture_content(input.color.texture).expect("input texture is live")
}

pub fn output_content(backend: &RecordingBackend, chain: &PostprocessChain) -> u64 {
    let output = chain.output().expect("chain has buffers");
    backend.texture_content(output.color.texture).expect("output texture is live")
}

/// An offscreen chain the way the renderer creates the auxiliary ones
pub fn offscreen(backend: &RecordingBackend, steps: Vec<PostprocessStep>) -> PostprocessChain {
    let mut chain = PostprocessChain::new("offscreen", backend.display_format(), true, false);
    chain.configure(steps);
    chain
}

/// Steps named by program, without parameters
pub fn steps(names: &[&str]) -> Vec<PostprocessStep> {
    names.iter().map(|name| PostprocessStep::new(*name)).collect()
}

/// Display content after one frame of `steps` run with `render()`
pub fn render_once(names: &[&str]) -> u64 {
    let mut backend = backend();
    let cache = ResourceLibrary::with_builtin_shaders();
    let mut chain = main_chain(&backend, steps(names));
    let frame = begin(&mut backend);
    fill_input(&mut backend, &mut chain, &frame);
    assert!(chain.render(&mut backend, &cache, &frame));
    end(&mut backend);
    assert!(backend.errors().is_empty(), "{:?}", backend.errors());
    backend.display_content()
}

/// Display content after one frame of `steps` run step by step; also
/// returns the number of times the index advanced
pub fn render_stepwise(names: &[&str]) -> (u64, usize) {
    let mut backend = backend();
    let cache = ResourceLibrary::with_builtin_shaders();
    let mut chain = main_chain(&backend, steps(names));
    let frame = begin(&mut backend);
    fill_input(&mut backend, &mut chain, &frame);
    let mut index = 0;
    let mut advanced = 0;
    loop {
        let next = chain.render_step(&mut backend, &cache, &frame, index);
        if next == index {
            break;
        }
        advanced += 1;
        index = next;
    }
    end(&mut backend);
    assert!(backend.errors().is_empty(), "{:?}", backend.errors());
    (backend.display_content(), advanced)
}

/// Entities of the standard test scene
pub struct TestScene {
    pub camera: Entity,
    pub cube: Entity,
    pub glass: Entity,
    pub sun: Entity,
    pub lamp: Entity,
    pub torch: Entity,
}

/// A camera looking at an opaque cube and a glass sphere, lit by one light of each kind
pub fn build_scene(
    backend: &mut dyn GraphicsBackend,
    entities: &mut EntityManager,
    resources: &mut ResourceLibrary,
) -> TestScene {
    let cube_mesh = Mesh::cube();
    let sphere_mesh = Mesh::sphere(8, 6);
    let cube_id = resources.add_mesh(backend, "cube", &cube_mesh).expect("cube uploads");
    let sphere_id = resources
        .add_mesh(backend, "sphere", &sphere_mesh)
        .expect("sphere uploads");
    let plastic = resources.add_material(Material::plastic(Vec3::new(0.8, 0.2, 0.2)));
    let glass = resources.add_material(Material::glass());
    assert_eq!(resources.mesh_by_name("cube"), Some(cube_id));

    let camera = entities.create_entity("camera");
    entities
        .add_component(camera, Transform::from_position(Vec3::new(0.0, 0.0, 5.0)))
        .unwrap();
    entities.add_component(camera, Camera::default()).unwrap();

    let cube = entities.create_entity("cube");
    entities.add_component(cube, Transform::default()).unwrap();
    entities
        .add_component(cube, MeshComponent::new(cube_id, plastic, cube_mesh.bounds()).with_wireframe(true))
        .unwrap();

    let glass_entity = entities.create_entity("glass");
    entities
        .add_component(glass_entity, Transform::from_position(Vec3::new(1.5, 0.0, 0.0)))
        .unwrap();
    entities
        .add_component(glass_entity, MeshComponent::new(sphere_id, glass, sphere_mesh.bounds()))
        .unwrap();

    let sun = entities.create_entity("sun");
    entities
        .add_component(
            sun,
            Transform::from_position_rotation(Vec3::ZERO, Quat::from_rotation_x(-0.8)),
        )
        .unwrap();
    entities
        .add_component(sun, DirectionalLight::new(Vec3::ONE, 1.0))
        .unwrap();

    let lamp = entities.create_entity("lamp");
    entities
        .add_component(lamp, Transform::from_position(Vec3::new(2.0, 2.0, 2.0)))
        .unwrap();
    entities
        .add_component(lamp, PointLight::new(Vec3::new(1.0, 0.9, 0.7), 2.0, 4.0))
        .unwrap();

    let torch = entities.create_entity("torch");
    entities
        .add_component(torch, Transform::from_position(Vec3::new(-2.0, 1.0, 3.0)))
        .unwrap();
    entities
        .add_component(torch, SpotLight::new(Vec3::ONE, 3.0, 20f32.to_radians(), 30f32.to_radians()))
        .unwrap();

    TestScene {
        camera,
        cube,
        glass: glass_entity,
        sun,
        lamp,
        torch,
    }
}

/// The format every chain buffer uses on the recording backend
pub fn display_format() -> TextureFormat {
    TextureFormat::Bgra8UnormSrgb
}
