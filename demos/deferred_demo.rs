//! # Deferred Demo
//!
//! Opens a window, builds a small scene (a spinning crate, a falling glass
//! ball, three kinds of lights) and renders it through the deferred pipeline
//! and the postprocess chains.
//!
//! ```bash
//! cargo run --example deferred_demo -- --main grayscale --main vignette --bloom blur
//! ```

use std::sync::Arc;
use std::time::Instant;

use clap::Parser;
use glam::{Quat, Vec3};
use scene_engine::ecs::{
    Camera, DirectionalLight, MeshComponent, Physics, PointLight, SpotLight, Transform, TransformDelta,
};
use scene_engine::resources::{Material, Mesh};
use scene_engine::{
    ChainTarget, Engine, EngineConfig, ForwardExtras, PostprocessConfig, RendererConfig, StepRecord,
    WgpuBackend,
};
use winit::dpi::PhysicalSize;
use winit::event::{Event, WindowEvent};
use winit::event_loop::{ControlFlow, EventLoop, EventLoopWindowTarget};
use winit::window::WindowBuilder;

#[derive(Parser, Debug)]
#[command(about = "Deferred renderer demo")]
struct Args {
    #[arg(long, default_value_t = 1280)]
    width: u32,

    #[arg(long, default_value_t = 720)]
    height: u32,

    /// Disable vertical sync
    #[arg(long)]
    no_vsync: bool,

    /// Main chain steps, in order
    #[arg(long = "main")]
    main_steps: Vec<String>,

    /// Bloom chain steps, composited additively
    #[arg(long = "bloom")]
    bloom_steps: Vec<String>,

    /// Outline chain steps, alpha composited
    #[arg(long = "outline")]
    outline_steps: Vec<String>,

    /// Draw the world axes
    #[arg(long)]
    extras: bool,

    /// Exit after this many frames
    #[arg(long)]
    max_frames: Option<u64>,
}

impl Args {
    fn postprocess(&self) -> PostprocessConfig {
        let records: Vec<StepRecord> = [
            (ChainTarget::Main, &self.main_steps),
            (ChainTarget::Bloom, &self.bloom_steps),
            (ChainTarget::Outline, &self.outline_steps),
        ]
        .into_iter()
        .flat_map(|(target, names)| names.iter().map(move |name| StepRecord::new(target, name.as_str())))
        .collect();
        PostprocessConfig::from_records(&records)
    }
}

fn setup_scene(engine: &mut Engine<WgpuBackend>) -> scene_engine::ecs::Entity {
    let cube = Mesh::cube();
    let sphere = Mesh::sphere(24, 16);
    let floor = Mesh::plane(12.0, 12.0, 4);
    let cube_id = engine.add_mesh("cube", &cube).expect("Failed to upload cube");
    let sphere_id = engine.add_mesh("sphere", &sphere).expect("Failed to upload sphere");
    let floor_id = engine.add_mesh("floor", &floor).expect("Failed to upload floor");
    let red = engine.add_material(Material::plastic(Vec3::new(0.8, 0.2, 0.2)));
    let grey = engine.add_material(Material::matte(Vec3::splat(0.5)));
    let glass = engine.add_material(Material::glass());

    let entities = engine.entities_mut();

    let camera = entities.create_entity("camera");
    let mut eye = Transform::from_position(Vec3::new(0.0, 3.0, 8.0));
    eye.look_at(Vec3::ZERO, Vec3::Y);
    entities.add_component(camera, eye).expect("camera transform");
    entities.add_component(camera, Camera::default()).expect("camera");

    let crate_entity = entities.create_entity("crate");
    entities
        .add_component(crate_entity, Transform::default())
        .expect("crate transform");
    entities
        .add_component(crate_entity, MeshComponent::new(cube_id, red, cube.bounds()).with_wireframe(true))
        .expect("crate mesh");

    let ground = entities.create_entity("floor");
    entities
        .add_component(ground, Transform::from_position(Vec3::new(0.0, -1.0, 0.0)))
        .expect("floor transform");
    entities
        .add_component(ground, MeshComponent::new(floor_id, grey, floor.bounds()))
        .expect("floor mesh");

    let ball = entities.create_entity("ball");
    entities
        .add_component(ball, Transform::from_position(Vec3::new(1.5, 4.0, 0.5)))
        .expect("ball transform");
    entities
        .add_component(ball, MeshComponent::new(sphere_id, glass, sphere.bounds()))
        .expect("ball mesh");
    entities
        .add_component(
            ball,
            Physics {
                acceleration: Vec3::new(0.0, -2.0, 0.0),
                ..Default::default()
            },
        )
        .expect("ball physics");

    let sun = entities.create_entity("sun");
    entities
        .add_component(sun, Transform::from_position_rotation(Vec3::ZERO, Quat::from_rotation_x(-0.9)))
        .expect("sun transform");
    entities
        .add_component(sun, DirectionalLight::new(Vec3::new(1.0, 0.95, 0.9), 0.8))
        .expect("sun");

    let lamp = entities.create_entity("lamp");
    entities
        .add_component(lamp, Transform::from_position(Vec3::new(-2.0, 1.5, 1.0)))
        .expect("lamp transform");
    entities
        .add_component(lamp, PointLight::new(Vec3::new(0.3, 0.5, 1.0), 2.0, 5.0))
        .expect("lamp");

    let torch = entities.create_entity("torch");
    let mut aim = Transform::from_position(Vec3::new(2.5, 3.0, 2.5));
    aim.look_at(Vec3::ZERO, Vec3::Y);
    entities.add_component(torch, aim).expect("torch transform");
    entities
        .add_component(
            torch,
            SpotLight::new(Vec3::ONE, 4.0, 15f32.to_radians(), 25f32.to_radians()),
        )
        .expect("torch");

    log::info!("Scene ready: {} entities", entities.entity_count());
    crate_entity
}

fn main() {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
    let args = Args::parse();

    let extras = if args.extras {
        ForwardExtras {
            axis: true,
            ..Default::default()
        }
    } else {
        ForwardExtras::default()
    };
    let config = EngineConfig::default()
        .with_title("Scene Engine - Deferred Demo")
        .with_size(args.width, args.height)
        .with_vsync(!args.no_vsync)
        .with_renderer(RendererConfig::default().with_extras(extras));

    let event_loop = EventLoop::new().expect("Failed to create event loop");
    let window = Arc::new(
        WindowBuilder::new()
            .with_title(&config.title)
            .with_inner_size(PhysicalSize::new(config.width, config.height))
            .build(&event_loop)
            .expect("Failed to create window"),
    );
    let backend = WgpuBackend::new(Arc::clone(&window), config.vsync).expect("Failed to create wgpu backend");

    let mut engine = Engine::new(backend, config);
    let spinner = setup_scene(&mut engine);
    engine.configure_postprocess(&args.postprocess());

    let mut last = Instant::now();
    let mut angle = 0.0f32;
    event_loop
        .run(move |event, elwt: &EventLoopWindowTarget<()>| {
            elwt.set_control_flow(ControlFlow::Poll);

            match event {
                Event::WindowEvent { event, .. } => match event {
                    WindowEvent::CloseRequested => {
                        log::info!("Close requested, exiting...");
                        elwt.exit();
                    }
                    WindowEvent::Resized(size) => engine.resize(size.width, size.height),
                    WindowEvent::RedrawRequested => {
                        let now = Instant::now();
                        let dt = (now - last).as_secs_f32();
                        last = now;

                        // Stand-in for a script: rotate the crate through the delta queue
                        angle += dt;
                        engine.queue_transform_deltas([
                            TransformDelta::new(spinner).with_rotation(Quat::from_rotation_y(angle))
                        ]);

                        match engine.frame(dt) {
                            Ok(stats) => log::trace!(
                                "Frame {}: {} vertices, {} postprocess steps",
                                engine.frame_index(),
                                stats.vertices_drawn,
                                stats.postprocess_steps
                            ),
                            Err(e) => log::warn!("Frame skipped: {}", e),
                        }

                        if args.max_frames.is_some_and(|max| engine.frame_index() >= max) {
                            elwt.exit();
                        }
                    }
                    _ => {}
                },
                Event::AboutToWait => window.request_redraw(),
                _ => {}
            }
        })
        .expect("Event loop failed");
}
