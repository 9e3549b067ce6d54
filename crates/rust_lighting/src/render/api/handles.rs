//! Opaque handles and parameter enums exchanged with a graphics backend

use crate::foundation::math::{Mat4, Vec3, Vec4};

/// Handle to a linked shader program
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ProgramHandle(pub u32);

/// Handle to a texture, cubemap or depth renderbuffer
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TextureId(pub u32);

/// Handle to a framebuffer object
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct FramebufferId(pub u32);

/// Handle to a vertex array object
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct VertexArrayId(pub u32);

/// Handle to a vertex or index buffer
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct BufferId(pub u32);

/// Location of a named uniform or vertex attribute inside a program
///
/// Lookups that fail resolve to [`ShaderLocation::NOT_FOUND`]; every upload
/// against such a location is skipped.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ShaderLocation(pub i32);

impl ShaderLocation {
    /// Sentinel for a name the program does not expose
    pub const NOT_FOUND: Self = Self(-1);

    /// Whether the lookup succeeded
    pub const fn is_found(self) -> bool {
        self.0 >= 0
    }
}

impl Default for ShaderLocation {
    fn default() -> Self {
        Self::NOT_FOUND
    }
}

/// Value uploaded to a uniform location
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum UniformValue {
    /// `int`, `bool` and sampler uniforms
    Int(i32),
    /// `float`
    Float(f32),
    /// `vec3`
    Vec3(Vec3),
    /// `vec4`
    Vec4(Vec4),
    /// `mat4`
    Mat4(Mat4),
}

impl From<bool> for UniformValue {
    fn from(value: bool) -> Self {
        Self::Int(i32::from(value))
    }
}

impl From<i32> for UniformValue {
    fn from(value: i32) -> Self {
        Self::Int(value)
    }
}

impl From<f32> for UniformValue {
    fn from(value: f32) -> Self {
        Self::Float(value)
    }
}

impl From<Vec3> for UniformValue {
    fn from(value: Vec3) -> Self {
        Self::Vec3(value)
    }
}

impl From<Vec4> for UniformValue {
    fn from(value: Vec4) -> Self {
        Self::Vec4(value)
    }
}

impl From<Mat4> for UniformValue {
    fn from(value: Mat4) -> Self {
        Self::Mat4(value)
    }
}

/// Texture binding target
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TextureTarget {
    /// `GL_TEXTURE_2D`
    Texture2D,
    /// `GL_TEXTURE_CUBE_MAP`
    Cubemap,
}

/// What a texture id refers to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TextureKind {
    /// Color 2D texture
    Texture2D,
    /// Color cubemap
    Cubemap,
    /// 2D depth texture
    Depth2D,
    /// Six-face depth cubemap
    DepthCubemap,
    /// Depth renderbuffer, attachable but not sampleable
    DepthRenderbuffer,
}

/// Pixel storage format
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PixelFormat {
    /// 8 bits per channel RGB
    R8G8B8,
    /// 8 bits per channel RGBA
    R8G8B8A8,
    /// 16-bit float RGB
    R16G16B16,
    /// 32-bit float RGB
    R32G32B32,
    /// 32-bit float RGBA
    R32G32B32A32,
    /// Depth component
    Depth,
}

/// Cubemap face, in the order the API enumerates them
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CubemapFace {
    /// +X
    PositiveX,
    /// -X
    NegativeX,
    /// +Y
    PositiveY,
    /// -Y
    NegativeY,
    /// +Z
    PositiveZ,
    /// -Z
    NegativeZ,
}

impl CubemapFace {
    /// All faces in attachment order
    pub const ALL: [Self; 6] = [
        Self::PositiveX,
        Self::NegativeX,
        Self::PositiveY,
        Self::NegativeY,
        Self::PositiveZ,
        Self::NegativeZ,
    ];

    /// Direction the face looks at from the cube center
    pub fn direction(self) -> Vec3 {
        match self {
            Self::PositiveX => Vec3::new(1.0, 0.0, 0.0),
            Self::NegativeX => Vec3::new(-1.0, 0.0, 0.0),
            Self::PositiveY => Vec3::new(0.0, 1.0, 0.0),
            Self::NegativeY => Vec3::new(0.0, -1.0, 0.0),
            Self::PositiveZ => Vec3::new(0.0, 0.0, 1.0),
            Self::NegativeZ => Vec3::new(0.0, 0.0, -1.0),
        }
    }

    /// Up vector matching the cubemap face orientation
    ///
    /// The Y faces use ±Z; every other face uses -Y.
    pub fn up(self) -> Vec3 {
        match self {
            Self::PositiveY => Vec3::new(0.0, 0.0, 1.0),
            Self::NegativeY => Vec3::new(0.0, 0.0, -1.0),
            _ => Vec3::new(0.0, -1.0, 0.0),
        }
    }
}

/// Framebuffer attachment point
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Attachment {
    /// Depth attachment
    Depth,
    /// Color attachment with the given channel index
    Color(u32),
}

/// What is being attached
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AttachmentTarget {
    /// A 2D texture
    Texture2D,
    /// A whole cubemap (layered rendering)
    Cubemap,
    /// One face of a cubemap
    CubemapFace(CubemapFace),
    /// A renderbuffer
    Renderbuffer,
}

/// Sampling filter
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TextureFilter {
    /// Nearest texel
    Nearest,
    /// Bilinear
    Linear,
}

/// Coordinate wrap mode
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TextureWrap {
    /// Clamp to the edge texel
    ClampToEdge,
    /// Tile
    Repeat,
}

/// Texture sampling parameter
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TextureParameter {
    /// Minification filter
    MinFilter(TextureFilter),
    /// Magnification filter
    MagFilter(TextureFilter),
    /// S coordinate wrap
    WrapS(TextureWrap),
    /// T coordinate wrap
    WrapT(TextureWrap),
    /// R coordinate wrap (cubemaps)
    WrapR(TextureWrap),
}

/// Matrix stack selector
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MatrixMode {
    /// Projection stack
    Projection,
    /// Model-view stack
    ModelView,
}

/// Component type of a vertex attribute
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum VertexAttributeType {
    /// 32-bit float
    Float,
    /// 8-bit unsigned
    UnsignedByte,
}

/// Description of a live texture
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TextureInfo {
    /// Backend id
    pub id: TextureId,
    /// Width in texels (face size for cubemaps)
    pub width: i32,
    /// Height in texels (face size for cubemaps)
    pub height: i32,
    /// Storage kind
    pub kind: TextureKind,
    /// Pixel format
    pub format: PixelFormat,
}

impl TextureInfo {
    /// Whether the texture binds to the cubemap target
    pub const fn is_cubemap(&self) -> bool {
        matches!(self.kind, TextureKind::Cubemap | TextureKind::DepthCubemap)
    }
}
