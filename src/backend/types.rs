//! Value types describing what the renderer asks of a backend

/// Formats of the colour targets, the display and uploaded images
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TextureFormat {
    Rgba8Unorm,
    Rgba8UnormSrgb,
    Bgra8Unorm,
    Bgra8UnormSrgb,
    Rgba16Float,
    Depth32Float,
}

/// Depth format of every offscreen target; copyable between targets
pub const DEPTH_FORMAT: TextureFormat = TextureFormat::Depth32Float;

/// What a texture is used for. Backends derive the usage flags from it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TextureRole {
    /// Colour attachment that later passes sample or copy
    Color,
    /// Depth attachment, copied between targets and optionally sampled
    Depth { sampled: bool },
    /// Sampled image filled from the CPU
    Upload,
}

impl TextureRole {
    pub fn attachable(self) -> bool {
        !matches!(self, Self::Upload)
    }

    pub fn sampled(self) -> bool {
        match self {
            Self::Color | Self::Upload => true,
            Self::Depth { sampled } => sampled,
        }
    }

    pub fn copy_source(self) -> bool {
        !matches!(self, Self::Upload)
    }
}

/// 2D texture with a single mip level
#[derive(Debug, Clone)]
pub struct TextureDescriptor {
    pub label: String,
    pub width: u32,
    pub height: u32,
    pub format: TextureFormat,
    pub role: TextureRole,
}

impl TextureDescriptor {
    pub fn new(label: impl Into<String>, width: u32, height: u32, format: TextureFormat, role: TextureRole) -> Self {
        Self {
            label: label.into(),
            width,
            height,
            format,
            role,
        }
    }
}

/// How a buffer is bound. Every kind accepts writes from the CPU.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BufferKind {
    Uniform,
    /// Read-only storage, such as the light array
    Storage,
    Vertex,
    /// 32-bit indices
    Index,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VertexFormat {
    Float32x2,
    Float32x3,
    Float32x4,
}

impl VertexFormat {
    pub fn size(self) -> u64 {
        match self {
            Self::Float32x2 => 8,
            Self::Float32x3 => 12,
            Self::Float32x4 => 16,
        }
    }
}

/// Interleaved per-vertex attributes of a single vertex buffer
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VertexLayout {
    stride: u64,
    attributes: Vec<(u32, VertexFormat, u64)>,
}

impl VertexLayout {
    /// Attributes packed back to back at locations 0, 1, 2 and so on
    pub fn packed(formats: &[VertexFormat]) -> Self {
        let mut offset = 0;
        let mut attributes = Vec::with_capacity(formats.len());
        for (location, &format) in formats.iter().enumerate() {
            attributes.push((location as u32, format, offset));
            offset += format.size();
        }
        Self {
            stride: offset,
            attributes,
        }
    }

    pub fn stride(&self) -> u64 {
        self.stride
    }

    /// `(location, format, offset)` of each attribute
    pub fn attributes(&self) -> &[(u32, VertexFormat, u64)] {
        &self.attributes
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Topology {
    Triangles,
    Lines,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DepthCompare {
    Less,
    LessEqual,
}

/// Depth test against a [`DEPTH_FORMAT`] attachment
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DepthTest {
    pub write: bool,
    pub compare: DepthCompare,
}

/// How a draw combines with the colour already in the target
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum Blend {
    #[default]
    Replace,
    /// Source-over with straight alpha
    Alpha,
    /// Sum of source and destination; used by the lighting passes
    Additive,
}

/// Address mode of a linear-filtering sampler
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Wrap {
    Clamp,
    Repeat,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_packed_layout_offsets() {
        let layout = VertexLayout::packed(&[VertexFormat::Float32x3, VertexFormat::Float32x2, VertexFormat::Float32x4]);
        assert_eq!(layout.stride(), 36);
        assert_eq!(
            layout.attributes(),
            &[
                (0, VertexFormat::Float32x3, 0),
                (1, VertexFormat::Float32x2, 12),
                (2, VertexFormat::Float32x4, 20),
            ]
        );
    }

    #[test]
    fn test_depth_role_sampling_is_optional() {
        assert!(TextureRole::Depth { sampled: true }.sampled());
        assert!(!TextureRole::Depth { sampled: false }.sampled());
        assert!(!TextureRole::Upload.attachable());
        assert!(!TextureRole::Upload.copy_source());
    }
}
