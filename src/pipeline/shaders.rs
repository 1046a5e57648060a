//! Built-in WGSL programs
//!
//! Lighting and postprocess programs are stored without their prelude; the
//! resource library prepends the prelude of the program's kind before
//! validation, so every program of a kind shares one binding layout.

/// Camera uniform, mirrors `CameraUniformData`
pub const CAMERA_STRUCT: &str = r#"
struct CameraUniforms {
    view: mat4x4<f32>,
    proj: mat4x4<f32>,
    view_proj: mat4x4<f32>,
    inv_view: mat4x4<f32>,
    inv_proj: mat4x4<f32>,
    position: vec4<f32>,
    near_far: vec4<f32>,
}
"#;

/// Per-object uniforms shared by the geometry pass and forward meshes
pub const OBJECT_BINDINGS: &str = r#"
struct ObjectUniforms {
    model: mat4x4<f32>,
    normal_matrix: mat4x4<f32>,
}

struct MaterialUniforms {
    base_color: vec4<f32>,
    // x = specular strength
    params: vec4<f32>,
}

@group(0) @binding(0) var<uniform> camera: CameraUniforms;
@group(1) @binding(0) var<uniform> object: ObjectUniforms;
@group(1) @binding(1) var<uniform> material: MaterialUniforms;

struct VertexInput {
    @location(0) position: vec3<f32>,
    @location(1) normal: vec3<f32>,
    @location(2) uv: vec2<f32>,
    @location(3) tangent: vec4<f32>,
}

struct VertexOutput {
    @builtin(position) clip_position: vec4<f32>,
    @location(0) world_position: vec3<f32>,
    @location(1) world_normal: vec3<f32>,
}

@vertex
fn vs_main(in: VertexInput) -> VertexOutput {
    var out: VertexOutput;
    let world_pos = object.model * vec4<f32>(in.position, 1.0);
    out.world_position = world_pos.xyz;
    out.clip_position = camera.view_proj * world_pos;
    out.world_normal = (object.normal_matrix * vec4<f32>(in.normal, 0.0)).xyz;
    return out;
}
"#;

/// G-buffer fill: world position, normal and albedo + specular
pub const GBUFFER_FRAGMENT: &str = r#"
struct GBufferOutput {
    @location(0) position: vec4<f32>,
    @location(1) normal: vec4<f32>,
    @location(2) albedo_spec: vec4<f32>,
}

@fragment
fn fs_main(in: VertexOutput) -> GBufferOutput {
    var out: GBufferOutput;
    // w = 1 marks the pixel as covered for the lighting passes
    out.position = vec4<f32>(in.world_position, 1.0);
    out.normal = vec4<f32>(normalize(in.world_normal), 0.0);
    out.albedo_spec = vec4<f32>(material.base_color.rgb, material.params.x);
    return out;
}
"#;

/// Forward shading for transparent meshes
pub const TRANSPARENT_FRAGMENT: &str = r#"
@fragment
fn fs_main(in: VertexOutput) -> @location(0) vec4<f32> {
    let n = normalize(in.world_normal);
    let hemisphere = 0.35 + 0.65 * max(dot(n, vec3<f32>(0.0, 1.0, 0.0)), 0.0);
    return vec4<f32>(material.base_color.rgb * hemisphere, material.base_color.a);
}
"#;

/// Flat-coloured edges for the wireframe overlay
pub const WIREFRAME_FRAGMENT: &str = r#"
@fragment
fn fs_main(in: VertexOutput) -> @location(0) vec4<f32> {
    return vec4<f32>(0.1, 1.0, 0.2, 1.0);
}
"#;

/// Fullscreen triangle, shared by the lighting and postprocess preludes
pub const FULLSCREEN_VERTEX: &str = r#"
struct VertexOutput {
    @builtin(position) position: vec4<f32>,
    @location(0) uv: vec2<f32>,
}

@vertex
fn vs_main(@builtin(vertex_index) vertex_index: u32) -> VertexOutput {
    var output: VertexOutput;
    let x = f32((vertex_index << 1u) & 2u);
    let y = f32(vertex_index & 2u);
    output.position = vec4<f32>(x * 2.0 - 1.0, y * 2.0 - 1.0, 0.0, 1.0);
    output.uv = vec2<f32>(x, 1.0 - y);
    return output;
}
"#;

/// Prelude of every lighting program (after the camera struct and fullscreen vertex)
pub const LIGHTING_BINDINGS: &str = r#"
struct LightData {
    position_radius: vec4<f32>,
    color_intensity: vec4<f32>,
    direction_type: vec4<f32>,
    spot_params: vec4<f32>,
}

struct LightingHeader {
    ambient: vec4<f32>,
    count: vec4<u32>,
}

@group(0) @binding(0) var<uniform> camera: CameraUniforms;
@group(0) @binding(1) var g_position: texture_2d<f32>;
@group(0) @binding(2) var g_normal: texture_2d<f32>;
@group(0) @binding(3) var g_albedo_spec: texture_2d<f32>;
@group(0) @binding(4) var<uniform> header: LightingHeader;
@group(0) @binding(5) var<storage, read> lights: array<LightData>;

struct Surface {
    position: vec3<f32>,
    normal: vec3<f32>,
    albedo: vec3<f32>,
    specular: f32,
    covered: bool,
}

fn load_surface(frag_coord: vec4<f32>) -> Surface {
    let coords = vec2<i32>(frag_coord.xy);
    let p = textureLoad(g_position, coords, 0);
    let n = textureLoad(g_normal, coords, 0);
    let a = textureLoad(g_albedo_spec, coords, 0);
    var s: Surface;
    s.position = p.xyz;
    s.normal = n.xyz;
    s.albedo = a.rgb;
    s.specular = a.a;
    s.covered = p.w > 0.0;
    return s;
}

fn blinn_phong(s: Surface, light_dir: vec3<f32>, radiance: vec3<f32>) -> vec3<f32> {
    let n = normalize(s.normal);
    let view_dir = normalize(camera.position.xyz - s.position);
    let halfway = normalize(light_dir + view_dir);
    let diffuse = max(dot(n, light_dir), 0.0) * s.albedo;
    let specular = pow(max(dot(n, halfway), 0.0), 32.0) * s.specular;
    return (diffuse + vec3<f32>(specular)) * radiance;
}
"#;

pub const LIGHT_DIRECTIONAL: &str = r#"
@fragment
fn fs_main(in: VertexOutput) -> @location(0) vec4<f32> {
    let s = load_surface(in.position);
    if (!s.covered) {
        return vec4<f32>(0.0);
    }
    var color = header.ambient.rgb * s.albedo;
    for (var i = 0u; i < header.count.x; i = i + 1u) {
        let light = lights[i];
        let dir = normalize(-light.direction_type.xyz);
        color += blinn_phong(s, dir, light.color_intensity.rgb * light.color_intensity.w);
    }
    return vec4<f32>(color, 0.0);
}
"#;

pub const LIGHT_POINT: &str = r#"
@fragment
fn fs_main(in: VertexOutput) -> @location(0) vec4<f32> {
    let s = load_surface(in.position);
    if (!s.covered) {
        return vec4<f32>(0.0);
    }
    var color = vec3<f32>(0.0);
    for (var i = 0u; i < header.count.x; i = i + 1u) {
        let light = lights[i];
        let to_light = light.position_radius.xyz - s.position;
        let dist2 = max(dot(to_light, to_light), 1e-4);
        let radius = light.position_radius.w;
        // Inverse square in units of the radius, capped at the max brightness
        let attenuation = min(light.spot_params.x, radius * radius / dist2);
        let radiance = light.color_intensity.rgb * light.color_intensity.w * attenuation;
        color += blinn_phong(s, normalize(to_light), radiance);
    }
    return vec4<f32>(color, 0.0);
}
"#;

pub const LIGHT_SPOT: &str = r#"
@fragment
fn fs_main(in: VertexOutput) -> @location(0) vec4<f32> {
    let s = load_surface(in.position);
    if (!s.covered) {
        return vec4<f32>(0.0);
    }
    var color = vec3<f32>(0.0);
    for (var i = 0u; i < header.count.x; i = i + 1u) {
        let light = lights[i];
        let to_light = light.position_radius.xyz - s.position;
        let dist = length(to_light);
        let dir = to_light / max(dist, 1e-4);
        let theta = dot(dir, normalize(-light.direction_type.xyz));
        let epsilon = max(light.spot_params.x - light.spot_params.y, 1e-4);
        let cone = clamp((theta - light.spot_params.y) / epsilon, 0.0, 1.0);
        let attenuation = 1.0 / (light.position_radius.w
            + light.spot_params.z * dist
            + light.spot_params.w * dist * dist);
        let radiance = light.color_intensity.rgb * light.color_intensity.w * attenuation * cone;
        color += blinn_phong(s, dir, radiance);
    }
    return vec4<f32>(color, 0.0);
}
"#;

/// Prelude of every postprocess program (after the fullscreen vertex).
///
/// Programs declare their own `@group(0) @binding(3)` parameter struct and
/// may sample `@group(0) @binding(4)` as a depth texture.
pub const POSTPROCESS_BINDINGS: &str = r#"
struct FrameUniforms {
    resolution: vec2<f32>,
    time: f32,
    _pad: f32,
}

@group(0) @binding(0) var fbt: texture_2d<f32>;
@group(0) @binding(1) var fbt_sampler: sampler;
@group(0) @binding(2) var<uniform> frame: FrameUniforms;
"#;

pub const PASSTHROUGH: &str = r#"
@fragment
fn fs_main(in: VertexOutput) -> @location(0) vec4<f32> {
    return textureSampleLevel(fbt, fbt_sampler, in.uv, 0.0);
}
"#;

pub const GRAYSCALE: &str = r#"
struct Params {
    strength: f32,
}

const strength_default: f32 = 1.0;

@group(0) @binding(3) var<uniform> params: Params;

@fragment
fn fs_main(in: VertexOutput) -> @location(0) vec4<f32> {
    let color = textureSampleLevel(fbt, fbt_sampler, in.uv, 0.0);
    let luma = dot(color.rgb, vec3<f32>(0.2126, 0.7152, 0.0722));
    return vec4<f32>(mix(color.rgb, vec3<f32>(luma), clamp(params.strength, 0.0, 1.0)), color.a);
}
"#;

pub const BLUR: &str = r#"
struct Params {
    radius: f32,
}

const radius_default: f32 = 1.0;

@group(0) @binding(3) var<uniform> params: Params;

@fragment
fn fs_main(in: VertexOutput) -> @location(0) vec4<f32> {
    let texel = 1.0 / frame.resolution;
    let r = i32(clamp(params.radius, 0.0, 8.0));
    var sum = vec4<f32>(0.0);
    var count = 0.0;
    for (var y = -r; y <= r; y = y + 1) {
        for (var x = -r; x <= r; x = x + 1) {
            let offset = vec2<f32>(f32(x), f32(y)) * texel;
            sum += textureSampleLevel(fbt, fbt_sampler, in.uv + offset, 0.0);
            count += 1.0;
        }
    }
    return sum / count;
}
"#;

pub const VIGNETTE: &str = r#"
struct Params {
    strength: f32,
    pulse: f32,
}

const strength_default: f32 = 0.5;
const pulse_default: f32 = 0.0;

@group(0) @binding(3) var<uniform> params: Params;

@fragment
fn fs_main(in: VertexOutput) -> @location(0) vec4<f32> {
    let color = textureSampleLevel(fbt, fbt_sampler, in.uv, 0.0);
    let d = distance(in.uv, vec2<f32>(0.5));
    let amount = params.strength * (1.0 + params.pulse * sin(frame.time));
    let falloff = clamp(1.0 - d * d * amount * 2.0, 0.0, 1.0);
    return vec4<f32>(color.rgb * falloff, color.a);
}
"#;

/// Depth-based fog; needs a chain with depth sampling
pub const FOG: &str = r#"
struct Params {
    color: vec4<f32>,
    density: f32,
    near: f32,
    far: f32,
}

const color_default: vec4<f32> = vec4<f32>(0.6, 0.65, 0.7, 1.0);
const density_default: f32 = 0.05;
const near_default: f32 = 0.1;
const far_default: f32 = 100.0;

@group(0) @binding(3) var<uniform> params: Params;
@group(0) @binding(4) var depth_buffer: texture_depth_2d;

@fragment
fn fs_main(in: VertexOutput) -> @location(0) vec4<f32> {
    let scene = textureSampleLevel(fbt, fbt_sampler, in.uv, 0.0);
    let d = textureLoad(depth_buffer, vec2<i32>(in.position.xy), 0);
    let linear = params.near * params.far / (params.far - d * (params.far - params.near));
    let fog = clamp(1.0 - exp(-params.density * linear), 0.0, 1.0);
    return vec4<f32>(mix(scene.rgb, params.color.rgb, fog), scene.a);
}
"#;

/// Chain composition: blends `fbt2` over `fbt`
pub const BLEND: &str = r#"
struct Params {
    mode: f32,
}

@group(0) @binding(3) var<uniform> params: Params;
@group(0) @binding(4) var fbt2: texture_2d<f32>;

@fragment
fn fs_main(in: VertexOutput) -> @location(0) vec4<f32> {
    let a = textureSampleLevel(fbt, fbt_sampler, in.uv, 0.0);
    let b = textureSampleLevel(fbt2, fbt_sampler, in.uv, 0.0);
    var rgb: vec3<f32>;
    switch u32(params.mode) {
        case 0u: {
            rgb = a.rgb + b.rgb;
        }
        case 1u: {
            rgb = mix(a.rgb, b.rgb, b.a);
        }
        case 2u: {
            rgb = a.rgb * b.rgb;
        }
        default: {
            rgb = vec3<f32>(1.0) - (vec3<f32>(1.0) - a.rgb) * (vec3<f32>(1.0) - b.rgb);
        }
    }
    return vec4<f32>(rgb, max(a.a, b.a));
}
"#;

/// Equirectangular sky behind all geometry
pub const SKYBOX: &str = r#"
const PI: f32 = 3.14159265;

@group(0) @binding(0) var<uniform> camera: CameraUniforms;
@group(1) @binding(0) var sky: texture_2d<f32>;
@group(1) @binding(1) var sky_sampler: sampler;

struct SkyOutput {
    @builtin(position) position: vec4<f32>,
    @location(0) ndc: vec2<f32>,
}

@vertex
fn vs_main(@builtin(vertex_index) vertex_index: u32) -> SkyOutput {
    var out: SkyOutput;
    let x = f32((vertex_index << 1u) & 2u);
    let y = f32(vertex_index & 2u);
    out.ndc = vec2<f32>(x * 2.0 - 1.0, y * 2.0 - 1.0);
    // Far plane, so the sky only fills uncovered pixels
    out.position = vec4<f32>(out.ndc, 1.0, 1.0);
    return out;
}

@fragment
fn fs_main(in: SkyOutput) -> @location(0) vec4<f32> {
    let view_pos = camera.inv_proj * vec4<f32>(in.ndc, 1.0, 1.0);
    let view_dir = view_pos.xyz / view_pos.w;
    let dir = normalize((camera.inv_view * vec4<f32>(view_dir, 0.0)).xyz);
    let u = atan2(dir.z, dir.x) / (2.0 * PI) + 0.5;
    let v = acos(clamp(dir.y, -1.0, 1.0)) / PI;
    return textureSampleLevel(sky, sky_sampler, vec2<f32>(u, v), 0.0);
}
"#;

/// World axis lines (position + colour vertices)
pub const AXIS: &str = r#"
@group(0) @binding(0) var<uniform> camera: CameraUniforms;

struct AxisInput {
    @location(0) position: vec3<f32>,
    @location(1) color: vec3<f32>,
}

struct AxisOutput {
    @builtin(position) position: vec4<f32>,
    @location(0) color: vec3<f32>,
}

@vertex
fn vs_main(in: AxisInput) -> AxisOutput {
    var out: AxisOutput;
    out.position = camera.view_proj * vec4<f32>(in.position, 1.0);
    out.color = in.color;
    return out;
}

@fragment
fn fs_main(in: AxisOutput) -> @location(0) vec4<f32> {
    return vec4<f32>(in.color, 1.0);
}
"#;

/// Names the built-in programs are registered under
pub mod names {
    pub const GBUFFER: &str = "gbuffer";
    pub const LIGHT_DIRECTIONAL: &str = "light_directional";
    pub const LIGHT_POINT: &str = "light_point";
    pub const LIGHT_SPOT: &str = "light_spot";
    pub const TRANSPARENT: &str = "forward_transparent";
    pub const WIREFRAME: &str = "wireframe";
    pub const SKYBOX: &str = "skybox";
    pub const AXIS: &str = "axis";
    pub const PASSTHROUGH: &str = "passthrough";
    pub const GRAYSCALE: &str = "grayscale";
    pub const BLUR: &str = "blur";
    pub const VIGNETTE: &str = "vignette";
    pub const FOG: &str = "fog";
    pub const BLEND: &str = "blend";
}
