//! Plain values mirrored by the render state stacks.

use std::fmt;

/// Native name of a GL object (buffer, program, texture, ...).
pub type ObjectName = u32;

/// Server side capabilities toggled with `glEnable`/`glDisable`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum Toggle {
    Blend,
    CullFace,
    DepthTest,
    DepthClamp,
    Dither,
    Multisample,
    PolygonOffsetFill,
    ProgramPointSize,
    RasterizerDiscard,
    SampleShading,
    ScissorTest,
    StencilTest,
}

impl Toggle {
    pub const ALL: [Toggle; 12] = [
        Toggle::Blend,
        Toggle::CullFace,
        Toggle::DepthTest,
        Toggle::DepthClamp,
        Toggle::Dither,
        Toggle::Multisample,
        Toggle::PolygonOffsetFill,
        Toggle::ProgramPointSize,
        Toggle::RasterizerDiscard,
        Toggle::SampleShading,
        Toggle::ScissorTest,
        Toggle::StencilTest,
    ];

    /// The state of a freshly created context.
    pub fn initial(self) -> bool {
        match self {
            Toggle::Dither | Toggle::Multisample => true,
            _ => false,
        }
    }
}

/// Specify what kind of depth comparison to perform.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Comparison {
    Never,
    Less,
    LessOrEqual,
    Greater,
    GreaterOrEqual,
    Equal,
    NotEqual,
    Always,
}

/// Which polygons are candidates for culling.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum CullFace {
    Front,
    Back,
    FrontAndBack,
}

/// Winding order of front-facing polygons.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum FrontFaceOrder {
    Clockwise,
    CounterClockwise,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Equation {
    Add,
    Subtract,
    ReverseSubtract,
    Min,
    Max,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum BlendValue {
    SourceColor,
    SourceAlpha,
    DestinationColor,
    DestinationAlpha,
    ConstantColor,
    ConstantAlpha,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum BlendFactor {
    Zero,
    One,
    Value(BlendValue),
    OneMinusValue(BlendValue),
}

/// Separate color and alpha blend factors.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct BlendFunc {
    pub src_color: BlendFactor,
    pub dst_color: BlendFactor,
    pub src_alpha: BlendFactor,
    pub dst_alpha: BlendFactor,
}

impl BlendFunc {
    pub fn new(src: BlendFactor, dst: BlendFactor) -> Self {
        BlendFunc {
            src_color: src,
            dst_color: dst,
            src_alpha: src,
            dst_alpha: dst,
        }
    }
}

impl Default for BlendFunc {
    fn default() -> Self {
        BlendFunc::new(BlendFactor::One, BlendFactor::Zero)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct BlendEquation {
    pub color: Equation,
    pub alpha: Equation,
}

impl Default for BlendEquation {
    fn default() -> Self {
        BlendEquation {
            color: Equation::Add,
            alpha: Equation::Add,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct PolygonOffset {
    pub factor: f32,
    pub units: f32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum PolygonMode {
    Point,
    Line,
    Fill,
}

/// Default tessellation levels used when no control shader is bound.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PatchLevels {
    pub inner: [f32; 2],
    pub outer: [f32; 4],
}

impl Default for PatchLevels {
    fn default() -> Self {
        PatchLevels {
            inner: [1.0; 2],
            outer: [1.0; 4],
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct DepthRange {
    pub near: f32,
    pub far: f32,
}

impl Default for DepthRange {
    fn default() -> Self {
        DepthRange {
            near: 0.0,
            far: 1.0,
        }
    }
}

/// A window space rectangle used by viewports and scissor boxes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub struct Rect {
    pub x: i32,
    pub y: i32,
    pub width: u32,
    pub height: u32,
}

impl Rect {
    pub fn new(x: i32, y: i32, width: u32, height: u32) -> Self {
        Rect {
            x,
            y,
            width,
            height,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ColorMask {
    pub red: bool,
    pub green: bool,
    pub blue: bool,
    pub alpha: bool,
}

impl Default for ColorMask {
    fn default() -> Self {
        ColorMask {
            red: true,
            green: true,
            blue: true,
            alpha: true,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum FramebufferTarget {
    Read,
    Draw,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum BufferTarget {
    Array,
    ElementArray,
    CopyRead,
    CopyWrite,
    DrawIndirect,
    PixelPack,
    PixelUnpack,
    Texture,
    TransformFeedback,
    Uniform,
}

impl BufferTarget {
    pub const ALL: [BufferTarget; 10] = [
        BufferTarget::Array,
        BufferTarget::ElementArray,
        BufferTarget::CopyRead,
        BufferTarget::CopyWrite,
        BufferTarget::DrawIndirect,
        BufferTarget::PixelPack,
        BufferTarget::PixelUnpack,
        BufferTarget::Texture,
        BufferTarget::TransformFeedback,
        BufferTarget::Uniform,
    ];
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum TextureTarget {
    Texture1D,
    Texture2D,
    Texture3D,
    Texture2DArray,
    Texture2DMultisample,
    Rectangle,
    CubeMap,
    Buffer,
}

impl TextureTarget {
    /// The GLSL sampler type used to read from this target.
    pub fn sampler_type(self) -> &'static str {
        match self {
            TextureTarget::Texture1D => "sampler1D",
            TextureTarget::Texture2D => "sampler2D",
            TextureTarget::Texture3D => "sampler3D",
            TextureTarget::Texture2DArray => "sampler2DArray",
            TextureTarget::Texture2DMultisample => "sampler2DMS",
            TextureTarget::Rectangle => "sampler2DRect",
            TextureTarget::CubeMap => "samplerCube",
            TextureTarget::Buffer => "samplerBuffer",
        }
    }
}

/// A texture bound to one texture unit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TextureBind {
    pub target: TextureTarget,
    pub texture: ObjectName,
}

impl Default for TextureBind {
    fn default() -> Self {
        TextureBind {
            target: TextureTarget::Texture2D,
            texture: 0,
        }
    }
}

/// Kinds of native objects managed through `GLObject`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ObjectKind {
    Buffer,
    VertexArray,
    Renderbuffer,
    Texture,
    Framebuffer,
    TransformFeedback,
}

/// Programmable pipeline stages, in pipeline order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum Stage {
    Vertex,
    TessControl,
    TessEvaluation,
    Geometry,
    Fragment,
    Compute,
}

impl Stage {
    pub const ALL: [Stage; 6] = [
        Stage::Vertex,
        Stage::TessControl,
        Stage::TessEvaluation,
        Stage::Geometry,
        Stage::Fragment,
        Stage::Compute,
    ];

    /// The short prefix naming this stage in effect keys and varyings.
    pub fn prefix(self) -> &'static str {
        match self {
            Stage::Vertex => "vs",
            Stage::TessControl => "tcs",
            Stage::TessEvaluation => "tes",
            Stage::Geometry => "gs",
            Stage::Fragment => "fs",
            Stage::Compute => "cs",
        }
    }

    pub fn from_prefix(prefix: &str) -> Option<Stage> {
        Stage::ALL.iter().cloned().find(|v| v.prefix() == prefix)
    }
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        let name = match *self {
            Stage::Vertex => "vertex",
            Stage::TessControl => "tessellation control",
            Stage::TessEvaluation => "tessellation evaluation",
            Stage::Geometry => "geometry",
            Stage::Fragment => "fragment",
            Stage::Compute => "compute",
        };

        write!(f, "{}", name)
    }
}

/// Layout of captured transform feedback varyings.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum FeedbackMode {
    Interleaved,
    Separate,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum FeedbackPrimitive {
    Points,
    Lines,
    Triangles,
}

/// Outcome of a compile, link or validate request.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct BuildLog {
    pub success: bool,
    pub message: String,
}

impl BuildLog {
    pub fn ok() -> Self {
        BuildLog {
            success: true,
            message: String::new(),
        }
    }

    pub fn failed<T: Into<String>>(message: T) -> Self {
        BuildLog {
            success: false,
            message: message.into(),
        }
    }
}

/// An active uniform or attribute reported by a linked program.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ActiveVariable {
    pub name: String,
    pub location: i32,
    pub size: i32,
    pub is_sampler: bool,
}
