//! The GL calls issued by the engine, behind a swappable backend.
//!
//! `RenderState` is the only caller of the pipeline state entries, and the
//! shader pipeline is the only caller of the program entries. Backends do not
//! cache anything: redundant changes are filtered by the render state stacks.

pub mod headless;

#[cfg(not(target_arch = "wasm32"))]
pub mod gl;

use crate::errors::*;
use crate::shader::input::InputFormat;
use crate::video::types::*;

pub trait Visitor {
    unsafe fn set_toggle(&mut self, toggle: Toggle, enable: bool) -> Result<()>;
    unsafe fn use_program(&mut self, program: ObjectName) -> Result<()>;
    unsafe fn set_depth_func(&mut self, func: Comparison) -> Result<()>;
    unsafe fn set_depth_mask(&mut self, write: bool) -> Result<()>;
    unsafe fn set_depth_range(&mut self, range: DepthRange) -> Result<()>;
    unsafe fn set_cull_face(&mut self, face: CullFace) -> Result<()>;
    unsafe fn set_front_face(&mut self, order: FrontFaceOrder) -> Result<()>;
    unsafe fn set_blend_func(&mut self, func: BlendFunc) -> Result<()>;
    unsafe fn set_blend_equation(&mut self, equation: BlendEquation) -> Result<()>;
    unsafe fn set_blend_color(&mut self, color: [f32; 4]) -> Result<()>;
    unsafe fn set_polygon_offset(&mut self, offset: PolygonOffset) -> Result<()>;
    unsafe fn set_polygon_mode(&mut self, mode: PolygonMode) -> Result<()>;
    unsafe fn set_patch_vertices(&mut self, n: u32) -> Result<()>;
    unsafe fn set_patch_levels(&mut self, levels: PatchLevels) -> Result<()>;
    unsafe fn set_viewport(&mut self, rect: Rect) -> Result<()>;
    unsafe fn set_scissor(&mut self, rect: Rect) -> Result<()>;
    unsafe fn set_color_mask(&mut self, mask: ColorMask) -> Result<()>;
    unsafe fn set_clear_color(&mut self, color: [f32; 4]) -> Result<()>;
    unsafe fn set_line_width(&mut self, width: f32) -> Result<()>;
    unsafe fn set_point_size(&mut self, size: f32) -> Result<()>;
    unsafe fn bind_framebuffer(&mut self, target: FramebufferTarget, fbo: ObjectName)
        -> Result<()>;
    unsafe fn bind_vertex_array(&mut self, vao: ObjectName) -> Result<()>;
    unsafe fn bind_buffer(&mut self, target: BufferTarget, buffer: ObjectName) -> Result<()>;
    unsafe fn bind_texture(&mut self, unit: u32, bind: TextureBind) -> Result<()>;

    unsafe fn begin_feedback(&mut self, primitive: FeedbackPrimitive) -> Result<()>;
    unsafe fn end_feedback(&mut self) -> Result<()>;

    unsafe fn create_objects(&mut self, kind: ObjectKind, n: usize) -> Result<Vec<ObjectName>>;
    unsafe fn delete_objects(&mut self, kind: ObjectKind, names: &[ObjectName]) -> Result<()>;

    /// Compiles one stage. A compile error is reported through the returned
    /// `BuildLog` and the stage object still has to be deleted by the caller.
    unsafe fn compile_stage(&mut self, stage: Stage, source: &str)
        -> Result<(ObjectName, BuildLog)>;
    unsafe fn delete_stage(&mut self, stage: ObjectName) -> Result<()>;
    unsafe fn create_program(&mut self, stages: &[ObjectName]) -> Result<ObjectName>;
    /// Declares captured varyings. Must be called between attaching and linking.
    unsafe fn set_feedback_varyings(
        &mut self,
        program: ObjectName,
        varyings: &[String],
        mode: FeedbackMode,
    ) -> Result<()>;
    unsafe fn link_program(&mut self, program: ObjectName) -> Result<BuildLog>;
    unsafe fn validate_program(&mut self, program: ObjectName) -> Result<BuildLog>;
    unsafe fn delete_program(&mut self, program: ObjectName) -> Result<()>;
    unsafe fn active_uniforms(&mut self, program: ObjectName) -> Result<Vec<ActiveVariable>>;
    unsafe fn active_attributes(&mut self, program: ObjectName) -> Result<Vec<ActiveVariable>>;
    /// Uploads `count` elements of `format` to a uniform location of the
    /// program currently in use.
    unsafe fn upload_uniform(
        &mut self,
        location: i32,
        format: InputFormat,
        count: usize,
        data: &[u8],
    ) -> Result<()>;
}

/// Creates a backend bound to the current OpenGL context. The function
/// pointers must have been loaded with `gl::load_with` beforehand.
#[cfg(not(target_arch = "wasm32"))]
pub unsafe fn new() -> Result<Box<dyn Visitor>> {
    let visitor = self::gl::visitor::GLVisitor::new()?;
    Ok(Box::new(visitor))
}

/// Creates a backend that never touches a GL context.
pub fn new_headless() -> Box<dyn Visitor> {
    Box::new(self::headless::HeadlessVisitor::new())
}
