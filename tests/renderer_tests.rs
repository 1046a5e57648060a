//! Integration tests for the deferred pipeline and the frame renderer.

mod common;

use rstest::rstest;

use common::{begin, build_scene, end, WIDTH, HEIGHT};
use scene_engine::backend::{GraphicsBackend, RecordingBackend};
use scene_engine::ecs::{Camera, EntityManager};
use scene_engine::pipeline::{
    ChainTarget, DeferredPipeline, ForwardExtras, LightKind, PostprocessConfig, RenderTarget,
    StepRecord,
};
use scene_engine::resources::ResourceLibrary;
use scene_engine::{systems, Renderer, RendererConfig};
use glam::Vec3;

struct Fixture {
    backend: RecordingBackend,
    entities: EntityManager,
    resources: ResourceLibrary,
    renderer: Renderer,
}

impl Fixture {
    fn new(config: RendererConfig) -> Self {
        let mut backend = common::backend();
        let mut entities = EntityManager::new();
        let mut resources = ResourceLibrary::with_builtin_shaders();
        build_scene(&mut backend, &mut entities, &mut resources);
        systems::run_frame(&mut entities, 0.0, WIDTH as f32 / HEIGHT as f32);
        let renderer = Renderer::new(config, backend.display_format(), Vec3::splat(0.05), [0.0, 0.0, 0.0, 1.0]);
        Self {
            backend,
            entities,
            resources,
            renderer,
        }
    }

    fn frame(&mut self) -> scene_engine::FrameStats {
        let frame = begin(&mut self.backend);
        let stats = self
            .renderer
            .render(&mut self.backend, &self.resources, self.entities.stores(), &frame);
        end(&mut self.backend);
        stats
    }

    fn main_input_content(&self) -> u64 {
        let input = self.renderer.chain(ChainTarget::Main).input().expect("main chain has buffers");
        self.backend.texture_content(input.color.texture).unwrap_or_default()
    }
}

// ============================================================================
// Frame Tests
// ============================================================================

/// A full frame runs every pass in order without validation errors.
#[test]
fn test_full_frame_runs_every_pass() {
    let mut fixture = Fixture::new(RendererConfig::default().with_extras(ForwardExtras {
        axis: true,
        ..Default::default()
    }));
    let stats = fixture.frame();

    assert!(stats.scene_rendered);
    assert!(stats.vertices_drawn > 0);
    assert_eq!(
        fixture.backend.drawn_pipelines(),
        [
            "gbuffer",
            "light_directional",
            "light_point",
            "light_spot",
            "forward_transparent",
            "wireframe",
            "axis",
        ]
    );
    assert!(fixture.backend.errors().is_empty(), "{:?}", fixture.backend.errors());
    // No skybox texture was registered
    assert!(fixture.renderer.deferred().warnings().reported("texture:skybox"));
}

/// The skybox is drawn once its texture exists.
#[test]
fn test_skybox_drawn_with_texture() {
    let mut fixture = Fixture::new(RendererConfig::default());
    fixture
        .resources
        .add_texture(&mut fixture.backend, "skybox", 2, 1, &[255; 8])
        .unwrap();
    fixture.frame();
    assert!(fixture.backend.drawn_pipelines().contains(&"skybox".to_string()));
    assert!(fixture.backend.errors().is_empty(), "{:?}", fixture.backend.errors());
}

/// Disabled extras draw nothing after lighting.
#[test]
fn test_extras_can_be_disabled() {
    let mut fixture = Fixture::new(RendererConfig::default().with_extras(ForwardExtras::none()));
    fixture.frame();
    assert_eq!(
        fixture.backend.drawn_pipelines(),
        ["gbuffer", "light_directional", "light_point", "light_spot"]
    );
}

/// Rendering an unchanged scene twice gives the same image.
#[test]
fn test_static_scene_is_stable() {
    let mut fixture = Fixture::new(RendererConfig::default());
    fixture.frame();
    let first = fixture.backend.display_content();
    fixture.frame();
    assert_eq!(fixture.backend.display_content(), first);
}

// ============================================================================
// Lighting Tests
// ============================================================================

/// Additive accumulation makes the light type order irrelevant.
#[rstest]
#[case([LightKind::Spot, LightKind::Point, LightKind::Directional])]
#[case([LightKind::Point, LightKind::Directional, LightKind::Spot])]
fn test_light_order_is_commutative(#[case] order: [LightKind; 3]) {
    let config = RendererConfig::default().with_extras(ForwardExtras::none());
    let mut reference = Fixture::new(config);
    reference.frame();

    let mut reordered = Fixture::new(config);
    reordered.renderer.set_light_order(order);
    reordered.frame();

    assert_eq!(reordered.main_input_content(), reference.main_input_content());
    assert_ne!(
        reordered.backend.drawn_pipelines(),
        reference.backend.drawn_pipelines()
    );
}

// ============================================================================
// Failure Tests
// ============================================================================

/// A missing geometry program skips the draw but not the frame.
#[test]
fn test_missing_gbuffer_shader_skips_draw() {
    let mut fixture = Fixture::new(RendererConfig::default().with_extras(ForwardExtras::none()));
    fixture.resources.remove_shader("gbuffer");
    let stats = fixture.frame();

    assert!(stats.scene_rendered);
    assert!(!fixture.backend.drawn_pipelines().contains(&"gbuffer".to_string()));
    assert!(fixture.renderer.deferred().warnings().reported("missing:gbuffer"));
    assert!(fixture.backend.errors().is_empty(), "{:?}", fixture.backend.errors());
}

/// A G-buffer creation failure disables the deferred pipeline for the session.
#[test]
fn test_gbuffer_failure_disables_pipeline() {
    let mut backend = common::backend();
    let mut entities = EntityManager::new();
    let mut resources = ResourceLibrary::with_builtin_shaders();
    build_scene(&mut backend, &mut entities, &mut resources);
    let format = backend.display_format();
    let target = RenderTarget::create(&mut backend, "target", WIDTH, HEIGHT, format, false).unwrap();
    let camera = Camera::default();
    let mut deferred = DeferredPipeline::new(ForwardExtras::none(), Vec3::ZERO, [0.0; 4]);

    backend.set_fail_texture_creation(true);
    assert!(!deferred.geometry_and_lighting_pass(&mut backend, &resources, entities.stores(), &camera, &target));
    assert!(deferred.is_disabled());
    assert!(deferred.warnings().reported("deferred-disabled"));

    backend.set_fail_texture_creation(false);
    assert!(!deferred.geometry_and_lighting_pass(&mut backend, &resources, entities.stores(), &camera, &target));
    assert_eq!(backend.draw_count(), 0);
}

/// Target creation failures skip frames; the chain recovers once creation works.
#[test]
fn test_chain_recovers_after_failed_frame() {
    let mut fixture = Fixture::new(RendererConfig::default());
    fixture.backend.set_fail_texture_creation(true);
    let stats = fixture.frame();
    assert!(!stats.scene_rendered);
    assert_eq!(fixture.backend.draw_count(), 0);

    fixture.backend.set_fail_texture_creation(false);
    let stats = fixture.frame();
    assert!(!fixture.renderer.deferred().is_disabled());
    assert!(stats.scene_rendered);
    assert_ne!(fixture.backend.display_content(), 0);
}

// ============================================================================
// Resize Tests
// ============================================================================

/// The chain buffers and the G-buffer follow the display size.
#[rstest]
#[case(128, 64)]
#[case(20, 30)]
fn test_resize_follows_display(#[case] width: u32, #[case] height: u32) {
    let mut fixture = Fixture::new(RendererConfig::default());
    fixture.frame();
    fixture.backend.resize(width, height);
    fixture.frame();

    assert_eq!(fixture.renderer.chain(ChainTarget::Main).size(), (width, height));
    let gbuffer = fixture.renderer.deferred().gbuffer().expect("G-buffer exists");
    assert_eq!(gbuffer.size(), (width, height));
    assert!(fixture.backend.errors().is_empty(), "{:?}", fixture.backend.errors());
}

// ============================================================================
// Postprocess Tests
// ============================================================================

/// Auxiliary chains run offscreen and are composited before the main chain.
#[test]
fn test_auxiliary_chains_are_composited() {
    let mut fixture = Fixture::new(RendererConfig::default().with_extras(ForwardExtras::none()));
    let records = [
        StepRecord::new(ChainTarget::Main, "vignette"),
        StepRecord::new(ChainTarget::Bloom, "blur").with_param("radius", 3.0),
        StepRecord::new(ChainTarget::Outline, "grayscale"),
    ];
    fixture
        .renderer
        .configure_postprocess(&PostprocessConfig::from_records(&records));
    let stats = fixture.frame();

    assert_eq!(stats.postprocess_steps, 3);
    let drawn = fixture.backend.drawn_pipelines();
    assert_eq!(
        &drawn[4..],
        ["grayscale", "blend", "blur", "blend", "vignette"]
    );
    assert!(fixture.backend.errors().is_empty(), "{:?}", fixture.backend.errors());
}

/// Spreading the main chain over several calls gives the same frame.
#[test]
fn test_sliced_frame_matches_full_frame() {
    let config = RendererConfig::default();
    let records = [
        StepRecord::new(ChainTarget::Main, "grayscale"),
        StepRecord::new(ChainTarget::Main, "vignette"),
        StepRecord::new(ChainTarget::Main, "blur"),
    ];
    let postprocess = PostprocessConfig::from_records(&records);

    let mut full = Fixture::new(config);
    full.renderer.configure_postprocess(&postprocess);
    full.frame();

    let mut sliced = Fixture::new(config);
    sliced.renderer.configure_postprocess(&postprocess);
    let frame = begin(&mut sliced.backend);
    assert!(sliced
        .renderer
        .prepare(&mut sliced.backend, &sliced.resources, sliced.entities.stores(), &frame));
    let mut index = 0;
    loop {
        let next = sliced
            .renderer
            .postprocess_step(&mut sliced.backend, &sliced.resources, &frame, index);
        if next == index {
            break;
        }
        index = next;
    }
    end(&mut sliced.backend);

    assert_eq!(index, 3);
    assert_eq!(sliced.backend.display_content(), full.backend.display_content());
}
