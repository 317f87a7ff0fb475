use gl;
use gl::types::*;

use crate::video::types::*;

impl From<Toggle> for GLenum {
    fn from(toggle: Toggle) -> Self {
        match toggle {
            Toggle::Blend => gl::BLEND,
            Toggle::CullFace => gl::CULL_FACE,
            Toggle::DepthTest => gl::DEPTH_TEST,
            Toggle::DepthClamp => gl::DEPTH_CLAMP,
            Toggle::Dither => gl::DITHER,
            Toggle::Multisample => gl::MULTISAMPLE,
            Toggle::PolygonOffsetFill => gl::POLYGON_OFFSET_FILL,
            Toggle::ProgramPointSize => gl::PROGRAM_POINT_SIZE,
            Toggle::RasterizerDiscard => gl::RASTERIZER_DISCARD,
            Toggle::SampleShading => gl::SAMPLE_SHADING,
            Toggle::ScissorTest => gl::SCISSOR_TEST,
            Toggle::StencilTest => gl::STENCIL_TEST,
        }
    }
}

impl From<Comparison> for GLenum {
    fn from(cmp: Comparison) -> Self {
        match cmp {
            Comparison::Never => gl::NEVER,
            Comparison::Less => gl::LESS,
            Comparison::LessOrEqual => gl::LEQUAL,
            Comparison::Greater => gl::GREATER,
            Comparison::GreaterOrEqual => gl::GEQUAL,
            Comparison::Equal => gl::EQUAL,
            Comparison::NotEqual => gl::NOTEQUAL,
            Comparison::Always => gl::ALWAYS,
        }
    }
}

impl From<CullFace> for GLenum {
    fn from(face: CullFace) -> Self {
        match face {
            CullFace::Front => gl::FRONT,
            CullFace::Back => gl::BACK,
            CullFace::FrontAndBack => gl::FRONT_AND_BACK,
        }
    }
}

impl From<FrontFaceOrder> for GLenum {
    fn from(order: FrontFaceOrder) -> Self {
        match order {
            FrontFaceOrder::Clockwise => gl::CW,
            FrontFaceOrder::CounterClockwise => gl::CCW,
        }
    }
}

impl From<Equation> for GLenum {
    fn from(eq: Equation) -> Self {
        match eq {
            Equation::Add => gl::FUNC_ADD,
            Equation::Subtract => gl::FUNC_SUBTRACT,
            Equation::ReverseSubtract => gl::FUNC_REVERSE_SUBTRACT,
            Equation::Min => gl::MIN,
            Equation::Max => gl::MAX,
        }
    }
}

impl From<BlendFactor> for GLenum {
    fn from(factor: BlendFactor) -> Self {
        match factor {
            BlendFactor::Zero => gl::ZERO,
            BlendFactor::One => gl::ONE,
            BlendFactor::Value(BlendValue::SourceColor) => gl::SRC_COLOR,
            BlendFactor::Value(BlendValue::SourceAlpha) => gl::SRC_ALPHA,
            BlendFactor::Value(BlendValue::DestinationColor) => gl::DST_COLOR,
            BlendFactor::Value(BlendValue::DestinationAlpha) => gl::DST_ALPHA,
            BlendFactor::Value(BlendValue::ConstantColor) => gl::CONSTANT_COLOR,
            BlendFactor::Value(BlendValue::ConstantAlpha) => gl::CONSTANT_ALPHA,
            BlendFactor::OneMinusValue(BlendValue::SourceColor) => gl::ONE_MINUS_SRC_COLOR,
            BlendFactor::OneMinusValue(BlendValue::SourceAlpha) => gl::ONE_MINUS_SRC_ALPHA,
            BlendFactor::OneMinusValue(BlendValue::DestinationColor) => gl::ONE_MINUS_DST_COLOR,
            BlendFactor::OneMinusValue(BlendValue::DestinationAlpha) => gl::ONE_MINUS_DST_ALPHA,
            BlendFactor::OneMinusValue(BlendValue::ConstantColor) => gl::ONE_MINUS_CONSTANT_COLOR,
            BlendFactor::OneMinusValue(BlendValue::ConstantAlpha) => gl::ONE_MINUS_CONSTANT_ALPHA,
        }
    }
}

impl From<PolygonMode> for GLenum {
    fn from(mode: PolygonMode) -> Self {
        match mode {
            PolygonMode::Point => gl::POINT,
            PolygonMode::Line => gl::LINE,
            PolygonMode::Fill => gl::FILL,
        }
    }
}

impl From<FramebufferTarget> for GLenum {
    fn from(target: FramebufferTarget) -> Self {
        match target {
            FramebufferTarget::Read => gl::READ_FRAMEBUFFER,
            FramebufferTarget::Draw => gl::DRAW_FRAMEBUFFER,
        }
    }
}

impl From<BufferTarget> for GLenum {
    fn from(target: BufferTarget) -> Self {
        match target {
            BufferTarget::Array => gl::ARRAY_BUFFER,
            BufferTarget::ElementArray => gl::ELEMENT_ARRAY_BUFFER,
            BufferTarget::CopyRead => gl::COPY_READ_BUFFER,
            BufferTarget::CopyWrite => gl::COPY_WRITE_BUFFER,
            BufferTarget::DrawIndirect => gl::DRAW_INDIRECT_BUFFER,
            BufferTarget::PixelPack => gl::PIXEL_PACK_BUFFER,
            BufferTarget::PixelUnpack => gl::PIXEL_UNPACK_BUFFER,
            BufferTarget::Texture => gl::TEXTURE_BUFFER,
            BufferTarget::TransformFeedback => gl::TRANSFORM_FEEDBACK_BUFFER,
            BufferTarget::Uniform => gl::UNIFORM_BUFFER,
        }
    }
}

impl From<TextureTarget> for GLenum {
    fn from(target: TextureTarget) -> Self {
        match target {
            TextureTarget::Texture1D => gl::TEXTURE_1D,
            TextureTarget::Texture2D => gl::TEXTURE_2D,
            TextureTarget::Texture3D => gl::TEXTURE_3D,
            TextureTarget::Texture2DArray => gl::TEXTURE_2D_ARRAY,
            TextureTarget::Texture2DMultisample => gl::TEXTURE_2D_MULTISAMPLE,
            TextureTarget::Rectangle => gl::TEXTURE_RECTANGLE,
            TextureTarget::CubeMap => gl::TEXTURE_CUBE_MAP,
            TextureTarget::Buffer => gl::TEXTURE_BUFFER,
        }
    }
}

impl From<Stage> for GLenum {
    fn from(stage: Stage) -> Self {
        match stage {
            Stage::Vertex => gl::VERTEX_SHADER,
            Stage::TessControl => gl::TESS_CONTROL_SHADER,
            Stage::TessEvaluation => gl::TESS_EVALUATION_SHADER,
            Stage::Geometry => gl::GEOMETRY_SHADER,
            Stage::Fragment => gl::FRAGMENT_SHADER,
            Stage::Compute => gl::COMPUTE_SHADER,
        }
    }
}

impl From<FeedbackMode> for GLenum {
    fn from(mode: FeedbackMode) -> Self {
        match mode {
            FeedbackMode::Interleaved => gl::INTERLEAVED_ATTRIBS,
            FeedbackMode::Separate => gl::SEPARATE_ATTRIBS,
        }
    }
}

impl From<FeedbackPrimitive> for GLenum {
    fn from(primitive: FeedbackPrimitive) -> Self {
        match primitive {
            FeedbackPrimitive::Points => gl::POINTS,
            FeedbackPrimitive::Lines => gl::LINES,
            FeedbackPrimitive::Triangles => gl::TRIANGLES,
        }
    }
}

/// Returns true if `ty` (as reported by `glGetActiveUniform`) is a sampler.
pub fn is_sampler(ty: GLenum) -> bool {
    match ty {
        gl::SAMPLER_1D
        | gl::SAMPLER_2D
        | gl::SAMPLER_3D
        | gl::SAMPLER_CUBE
        | gl::SAMPLER_1D_SHADOW
        | gl::SAMPLER_2D_SHADOW
        | gl::SAMPLER_1D_ARRAY
        | gl::SAMPLER_2D_ARRAY
        | gl::SAMPLER_1D_ARRAY_SHADOW
        | gl::SAMPLER_2D_ARRAY_SHADOW
        | gl::SAMPLER_2D_MULTISAMPLE
        | gl::SAMPLER_2D_MULTISAMPLE_ARRAY
        | gl::SAMPLER_CUBE_SHADOW
        | gl::SAMPLER_BUFFER
        | gl::SAMPLER_2D_RECT
        | gl::SAMPLER_2D_RECT_SHADOW
        | gl::INT_SAMPLER_1D
        | gl::INT_SAMPLER_2D
        | gl::INT_SAMPLER_3D
        | gl::INT_SAMPLER_CUBE
        | gl::INT_SAMPLER_2D_ARRAY
        | gl::INT_SAMPLER_BUFFER
        | gl::UNSIGNED_INT_SAMPLER_1D
        | gl::UNSIGNED_INT_SAMPLER_2D
        | gl::UNSIGNED_INT_SAMPLER_3D
        | gl::UNSIGNED_INT_SAMPLER_CUBE
        | gl::UNSIGNED_INT_SAMPLER_2D_ARRAY
        | gl::UNSIGNED_INT_SAMPLER_BUFFER => true,
        _ => false,
    }
}
