//! Shader programs: WGSL composition, validation and parameter reflection
//!
//! Programs are validated with naga when registered. A program that fails to
//! parse or validate is kept as *unlinked* so passes can report it and skip
//! their draw instead of failing the frame.

use crate::pipeline::shaders::{
    CAMERA_STRUCT, FULLSCREEN_VERTEX, LIGHTING_BINDINGS, OBJECT_BINDINGS, POSTPROCESS_BINDINGS,
};
use glam::{Vec2, Vec3, Vec4};
use std::collections::BTreeMap;

/// Group 0 binding holding a postprocess program's parameter struct
pub const PARAMS_BINDING: u32 = 3;
/// Group 0 binding of the optional depth texture (or the second colour input of a blend)
pub const EXTRA_TEXTURE_BINDING: u32 = 4;

/// Which prelude a program body is compiled with
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ShaderKind {
    /// Per-object mesh programs (camera, object and material bindings)
    Surface,
    /// Programs with only the camera uniform (skybox, axis)
    Camera,
    /// Fullscreen lighting over the G-buffer
    Lighting,
    /// Fullscreen postprocess step
    Postprocess,
}

impl ShaderKind {
    fn compose(self, body: &str) -> String {
        match self {
            ShaderKind::Surface => format!("{CAMERA_STRUCT}{OBJECT_BINDINGS}{body}"),
            ShaderKind::Camera => format!("{CAMERA_STRUCT}{body}"),
            ShaderKind::Lighting => {
                format!("{CAMERA_STRUCT}{FULLSCREEN_VERTEX}{LIGHTING_BINDINGS}{body}")
            }
            ShaderKind::Postprocess => format!("{FULLSCREEN_VERTEX}{POSTPROCESS_BINDINGS}{body}"),
        }
    }
}

/// Value of a postprocess parameter
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ParamValue {
    Scalar(f32),
    Vec2(Vec2),
    Vec3(Vec3),
    Vec4(Vec4),
}

impl ParamValue {
    fn components(&self) -> Vec<f32> {
        match self {
            ParamValue::Scalar(v) => vec![*v],
            ParamValue::Vec2(v) => v.to_array().to_vec(),
            ParamValue::Vec3(v) => v.to_array().to_vec(),
            ParamValue::Vec4(v) => v.to_array().to_vec(),
        }
    }
}

impl From<f32> for ParamValue {
    fn from(value: f32) -> Self {
        ParamValue::Scalar(value)
    }
}

impl From<Vec2> for ParamValue {
    fn from(value: Vec2) -> Self {
        ParamValue::Vec2(value)
    }
}

impl From<Vec3> for ParamValue {
    fn from(value: Vec3) -> Self {
        ParamValue::Vec3(value)
    }
}

impl From<Vec4> for ParamValue {
    fn from(value: Vec4) -> Self {
        ParamValue::Vec4(value)
    }
}

/// A float parameter declared in a program's parameter struct
#[derive(Debug, Clone, PartialEq)]
pub struct ShaderParam {
    pub name: String,
    /// Byte offset inside the uniform struct
    pub offset: u32,
    /// Number of f32 components (1..=4)
    pub components: u32,
    pub default: [f32; 4],
}

/// Parameter bytes for one step, plus names the program does not declare
#[derive(Debug, Clone)]
pub struct ParamBlock {
    pub bytes: Vec<u8>,
    pub unknown: Vec<String>,
}

/// A compiled (or failed) program
#[derive(Debug, Clone)]
pub struct ShaderProgram {
    name: String,
    kind: ShaderKind,
    source: String,
    revision: u64,
    linked: bool,
    log: Option<String>,
    params: Vec<ShaderParam>,
    uniform_size: u64,
    samples_depth: bool,
}

impl ShaderProgram {
    /// Compose `body` with the prelude of `kind`, validate and reflect it
    pub fn compile(name: &str, kind: ShaderKind, body: &str, revision: u64) -> Self {
        let source = kind.compose(body);
        let mut program = Self {
            name: name.to_string(),
            kind,
            source,
            revision,
            linked: false,
            log: None,
            params: Vec::new(),
            uniform_size: 0,
            samples_depth: false,
        };

        match validate(&program.source) {
            Ok(module) => {
                program.linked = true;
                program.reflect(&module);
            }
            Err(message) => program.log = Some(message),
        }
        program
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn kind(&self) -> ShaderKind {
        self.kind
    }

    /// Full WGSL module including the prelude
    pub fn source(&self) -> &str {
        &self.source
    }

    /// Changes whenever a program of the same name is registered again
    pub fn revision(&self) -> u64 {
        self.revision
    }

    pub fn is_linked(&self) -> bool {
        self.linked
    }

    /// Parse or validation message of an unlinked program
    pub fn log(&self) -> Option<&str> {
        self.log.as_deref()
    }

    pub fn params(&self) -> &[ShaderParam] {
        &self.params
    }

    pub fn param(&self, name: &str) -> Option<&ShaderParam> {
        self.params.iter().find(|p| p.name == name)
    }

    pub fn has_params(&self) -> bool {
        self.uniform_size > 0
    }

    /// Whether the program reads the depth texture at binding 4
    pub fn samples_depth(&self) -> bool {
        self.samples_depth
    }

    /// Size of the parameter uniform buffer, 16-byte aligned
    pub fn uniform_size(&self) -> u64 {
        self.uniform_size.div_ceil(16).max(1) * 16
    }

    /// Defaults overridden by `overrides` by name
    pub fn pack_params(&self, overrides: &BTreeMap<String, ParamValue>) -> ParamBlock {
        let mut floats = vec![0.0f32; (self.uniform_size() / 4) as usize];
        for param in &self.params {
            let base = (param.offset / 4) as usize;
            let count = param.components as usize;
            floats[base..base + count].copy_from_slice(&param.default[..count]);
            if let Some(value) = overrides.get(&param.name) {
                for (i, v) in value.components().into_iter().take(count).enumerate() {
                    floats[base + i] = v;
                }
            }
        }
        let unknown = overrides
            .keys()
            .filter(|name| self.param(name).is_none())
            .cloned()
            .collect();
        ParamBlock {
            bytes: bytemuck::cast_slice(&floats).to_vec(),
            unknown,
        }
    }

    fn reflect(&mut self, module: &naga::Module) {
        for (_, var) in module.global_variables.iter() {
            let Some(binding) = &var.binding else {
                continue;
            };
            if binding.group != 0 {
                continue;
            }
            match (binding.binding, &module.types[var.ty].inner) {
                (PARAMS_BINDING, naga::TypeInner::Struct { members, span })
                    if self.kind == ShaderKind::Postprocess =>
                {
                    self.uniform_size = *span as u64;
                    self.params = members
                        .iter()
                        .filter_map(|member| {
                            let name = member.name.clone()?;
                            if name.starts_with('_') {
                                return None;
                            }
                            let components = float_components(&module.types[member.ty].inner)?;
                            let default = default_value(module, &name).unwrap_or([0.0; 4]);
                            Some(ShaderParam {
                                name,
                                offset: member.offset,
                                components,
                                default,
                            })
                        })
                        .collect();
                }
                (
                    EXTRA_TEXTURE_BINDING,
                    naga::TypeInner::Image {
                        class: naga::ImageClass::Depth { .. },
                        ..
                    },
                ) => self.samples_depth = true,
                _ => {}
            }
        }
        log::trace!(
            "Reflected shader '{}': {} params, depth={}",
            self.name,
            self.params.len(),
            self.samples_depth
        );
    }
}

/// Parse and validate a full WGSL module, requiring `vs_main` and `fs_main`
pub fn validate(source: &str) -> Result<naga::Module, String> {
    let module =
        naga::front::wgsl::parse_str(source).map_err(|e| format!("WGSL parse error: {e}"))?;

    let mut validator = naga::valid::Validator::new(
        naga::valid::ValidationFlags::all(),
        naga::valid::Capabilities::all(),
    );
    validator
        .validate(&module)
        .map_err(|e| format!("Validation error: {e}"))?;

    for (entry, stage) in [
        ("vs_main", naga::ShaderStage::Vertex),
        ("fs_main", naga::ShaderStage::Fragment),
    ] {
        if !module
            .entry_points
            .iter()
            .any(|ep| ep.name == entry && ep.stage == stage)
        {
            return Err(format!("Entry point '{}' not found for stage {:?}", entry, stage));
        }
    }
    Ok(module)
}

fn float_components(inner: &naga::TypeInner) -> Option<u32> {
    match inner {
        naga::TypeInner::Scalar(scalar) if scalar.kind == naga::ScalarKind::Float => Some(1),
        naga::TypeInner::Vector { size, scalar } if scalar.kind == naga::ScalarKind::Float => {
            Some(*size as u32)
        }
        _ => None,
    }
}

/// Value of the module constant `<name>_default`
fn default_value(module: &naga::Module, name: &str) -> Option<[f32; 4]> {
    let wanted = format!("{name}_default");
    let (_, constant) = module
        .constants
        .iter()
        .find(|(_, c)| c.name.as_deref() == Some(wanted.as_str()))?;
    let values = const_floats(module, constant.init)?;
    let mut out = [0.0; 4];
    for (slot, v) in out.iter_mut().zip(values) {
        *slot = v;
    }
    Some(out)
}

fn const_floats(module: &naga::Module, expr: naga::Handle<naga::Expression>) -> Option<Vec<f32>> {
    match &module.global_expressions[expr] {
        naga::Expression::Literal(literal) => match *literal {
            naga::Literal::F32(v) => Some(vec![v]),
            naga::Literal::AbstractFloat(v) => Some(vec![v as f32]),
            naga::Literal::I32(v) => Some(vec![v as f32]),
            naga::Literal::U32(v) => Some(vec![v as f32]),
            naga::Literal::AbstractInt(v) => Some(vec![v as f32]),
            _ => None,
        },
        naga::Expression::Compose { components, .. } => {
            let mut out = Vec::new();
            for component in components {
                out.extend(const_floats(module, *component)?);
            }
            Some(out)
        }
        naga::Expression::Splat { size, value } => {
            let v = const_floats(module, *value)?;
            Some(vec![*v.first()?; *size as usize])
        }
        naga::Expression::Constant(handle) => const_floats(module, module.constants[*handle].init),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pipeline::shaders;

    #[test]
    fn test_blur_reflects_radius_default() {
        let program = ShaderProgram::compile("blur", ShaderKind::Postprocess, shaders::BLUR, 0);
        assert!(program.is_linked(), "{:?}", program.log());
        let radius = program.param("radius").unwrap();
        assert_eq!(radius.components, 1);
        assert_eq!(radius.default[0], 1.0);
        assert!(!program.samples_depth());
    }

    #[test]
    fn test_fog_reflects_vector_default_and_depth() {
        let program = ShaderProgram::compile("fog", ShaderKind::Postprocess, shaders::FOG, 0);
        assert!(program.is_linked(), "{:?}", program.log());
        assert!(program.samples_depth());
        let color = program.param("color").unwrap();
        assert_eq!(color.components, 4);
        assert_eq!(color.default, [0.6, 0.65, 0.7, 1.0]);
        assert_eq!(program.param("density").unwrap().offset, 16);
    }

    #[test]
    fn test_pack_params_overrides_and_reports_unknown() {
        let program = ShaderProgram::compile("blur", ShaderKind::Postprocess, shaders::BLUR, 0);
        let mut overrides = BTreeMap::new();
        overrides.insert("radius".to_string(), ParamValue::Scalar(2.0));
        overrides.insert("sigma".to_string(), ParamValue::Scalar(3.0));
        let block = program.pack_params(&overrides);
        let radius = f32::from_ne_bytes(block.bytes[0..4].try_into().unwrap());
        assert_eq!(radius, 2.0);
        assert_eq!(block.bytes.len(), 16);
        assert_eq!(block.unknown, vec!["sigma".to_string()]);
    }

    #[test]
    fn test_invalid_program_is_unlinked() {
        let program = ShaderProgram::compile(
            "broken",
            ShaderKind::Postprocess,
            "@fragment fn fs_main() -> @location(0) vec4<f32> { return undefined_value; }",
            0,
        );
        assert!(!program.is_linked());
        assert!(program.log().is_some());
    }

    #[test]
    fn test_missing_entry_point_is_unlinked() {
        let program = ShaderProgram::compile("no_fs", ShaderKind::Camera, "", 0);
        assert!(!program.is_linked());
        assert!(program.log().unwrap().contains("vs_main"));
    }
}
