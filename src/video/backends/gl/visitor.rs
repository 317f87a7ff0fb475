use std::ffi::CString;
use std::ptr;

use gl;
use gl::types::*;

use super::super::Visitor;
use super::capabilities::{check_capabilities, Capabilities};
use super::types;
use crate::errors::*;
use crate::shader::input::{InputFormat, ScalarKind};
use crate::video::types::*;

/// The OpenGL backend. Every call maps onto one or a few GL entry points;
/// redundant changes are filtered out before reaching here.
pub struct GLVisitor {
    capabilities: Capabilities,
}

impl GLVisitor {
    pub unsafe fn new() -> Result<Self> {
        let capabilities = Capabilities::parse()?;
        info!("GLVisitor {:#?}", capabilities);
        check_capabilities(&capabilities)?;

        gl::PixelStorei(gl::UNPACK_ALIGNMENT, 1);
        check()?;

        Ok(GLVisitor { capabilities })
    }

    #[inline]
    pub fn capabilities(&self) -> &Capabilities {
        &self.capabilities
    }
}

impl Visitor for GLVisitor {
    unsafe fn set_toggle(&mut self, toggle: Toggle, enable: bool) -> Result<()> {
        if enable {
            gl::Enable(toggle.into());
        } else {
            gl::Disable(toggle.into());
        }

        check()
    }

    unsafe fn use_program(&mut self, program: ObjectName) -> Result<()> {
        gl::UseProgram(program);
        check()
    }

    unsafe fn set_depth_func(&mut self, func: Comparison) -> Result<()> {
        gl::DepthFunc(func.into());
        check()
    }

    unsafe fn set_depth_mask(&mut self, write: bool) -> Result<()> {
        gl::DepthMask(if write { gl::TRUE } else { gl::FALSE });
        check()
    }

    unsafe fn set_depth_range(&mut self, range: DepthRange) -> Result<()> {
        gl::DepthRange(f64::from(range.near), f64::from(range.far));
        check()
    }

    unsafe fn set_cull_face(&mut self, face: CullFace) -> Result<()> {
        gl::CullFace(face.into());
        check()
    }

    unsafe fn set_front_face(&mut self, order: FrontFaceOrder) -> Result<()> {
        gl::FrontFace(order.into());
        check()
    }

    unsafe fn set_blend_func(&mut self, func: BlendFunc) -> Result<()> {
        gl::BlendFuncSeparate(
            func.src_color.into(),
            func.dst_color.into(),
            func.src_alpha.into(),
            func.dst_alpha.into(),
        );
        check()
    }

    unsafe fn set_blend_equation(&mut self, equation: BlendEquation) -> Result<()> {
        gl::BlendEquationSeparate(equation.color.into(), equation.alpha.into());
        check()
    }

    unsafe fn set_blend_color(&mut self, color: [f32; 4]) -> Result<()> {
        gl::BlendColor(color[0], color[1], color[2], color[3]);
        check()
    }

    unsafe fn set_polygon_offset(&mut self, offset: PolygonOffset) -> Result<()> {
        gl::PolygonOffset(offset.factor, offset.units);
        check()
    }

    unsafe fn set_polygon_mode(&mut self, mode: PolygonMode) -> Result<()> {
        gl::PolygonMode(gl::FRONT_AND_BACK, mode.into());
        check()
    }

    unsafe fn set_patch_vertices(&mut self, n: u32) -> Result<()> {
        gl::PatchParameteri(gl::PATCH_VERTICES, n as GLint);
        check()
    }

    unsafe fn set_patch_levels(&mut self, levels: PatchLevels) -> Result<()> {
        gl::PatchParameterfv(gl::PATCH_DEFAULT_INNER_LEVEL, levels.inner.as_ptr());
        gl::PatchParameterfv(gl::PATCH_DEFAULT_OUTER_LEVEL, levels.outer.as_ptr());
        check()
    }

    unsafe fn set_viewport(&mut self, rect: Rect) -> Result<()> {
        gl::Viewport(rect.x, rect.y, rect.width as GLsizei, rect.height as GLsizei);
        check()
    }

    unsafe fn set_scissor(&mut self, rect: Rect) -> Result<()> {
        gl::Scissor(rect.x, rect.y, rect.width as GLsizei, rect.height as GLsizei);
        check()
    }

    unsafe fn set_color_mask(&mut self, mask: ColorMask) -> Result<()> {
        gl::ColorMask(
            mask.red as GLboolean,
            mask.green as GLboolean,
            mask.blue as GLboolean,
            mask.alpha as GLboolean,
        );
        check()
    }

    unsafe fn set_clear_color(&mut self, color: [f32; 4]) -> Result<()> {
        gl::ClearColor(color[0], color[1], color[2], color[3]);
        check()
    }

    unsafe fn set_line_width(&mut self, width: f32) -> Result<()> {
        gl::LineWidth(width);
        check()
    }

    unsafe fn set_point_size(&mut self, size: f32) -> Result<()> {
        gl::PointSize(size);
        check()
    }

    unsafe fn bind_framebuffer(
        &mut self,
        target: FramebufferTarget,
        fbo: ObjectName,
    ) -> Result<()> {
        gl::BindFramebuffer(target.into(), fbo);
        check()
    }

    unsafe fn bind_vertex_array(&mut self, vao: ObjectName) -> Result<()> {
        gl::BindVertexArray(vao);
        check()
    }

    unsafe fn bind_buffer(&mut self, target: BufferTarget, buffer: ObjectName) -> Result<()> {
        gl::BindBuffer(target.into(), buffer);
        check()
    }

    unsafe fn bind_texture(&mut self, unit: u32, bind: TextureBind) -> Result<()> {
        gl::ActiveTexture(gl::TEXTURE0 + unit);
        gl::BindTexture(bind.target.into(), bind.texture);
        check()
    }

    unsafe fn begin_feedback(&mut self, primitive: FeedbackPrimitive) -> Result<()> {
        gl::BeginTransformFeedback(primitive.into());
        check()
    }

    unsafe fn end_feedback(&mut self) -> Result<()> {
        gl::EndTransformFeedback();
        check()
    }

    unsafe fn create_objects(&mut self, kind: ObjectKind, n: usize) -> Result<Vec<ObjectName>> {
        let mut names = vec![0; n];
        let len = n as GLsizei;
        match kind {
            ObjectKind::Buffer => gl::GenBuffers(len, names.as_mut_ptr()),
            ObjectKind::VertexArray => gl::GenVertexArrays(len, names.as_mut_ptr()),
            ObjectKind::Renderbuffer => gl::GenRenderbuffers(len, names.as_mut_ptr()),
            ObjectKind::Texture => gl::GenTextures(len, names.as_mut_ptr()),
            ObjectKind::Framebuffer => gl::GenFramebuffers(len, names.as_mut_ptr()),
            ObjectKind::TransformFeedback => gl::GenTransformFeedbacks(len, names.as_mut_ptr()),
        }

        check()?;
        Ok(names)
    }

    unsafe fn delete_objects(&mut self, kind: ObjectKind, names: &[ObjectName]) -> Result<()> {
        let len = names.len() as GLsizei;
        match kind {
            ObjectKind::Buffer => gl::DeleteBuffers(len, names.as_ptr()),
            ObjectKind::VertexArray => gl::DeleteVertexArrays(len, names.as_ptr()),
            ObjectKind::Renderbuffer => gl::DeleteRenderbuffers(len, names.as_ptr()),
            ObjectKind::Texture => gl::DeleteTextures(len, names.as_ptr()),
            ObjectKind::Framebuffer => gl::DeleteFramebuffers(len, names.as_ptr()),
            ObjectKind::TransformFeedback => gl::DeleteTransformFeedbacks(len, names.as_ptr()),
        }

        check()
    }

    unsafe fn compile_stage(
        &mut self,
        stage: Stage,
        source: &str,
    ) -> Result<(ObjectName, BuildLog)> {
        let shader = gl::CreateShader(stage.into());
        let c_str = CString::new(source.as_bytes())?;
        gl::ShaderSource(shader, 1, &c_str.as_ptr(), ptr::null());
        gl::CompileShader(shader);

        let mut status = GLint::from(gl::FALSE);
        gl::GetShaderiv(shader, gl::COMPILE_STATUS, &mut status);

        let log = if status != GLint::from(gl::TRUE) {
            let mut len = 0;
            gl::GetShaderiv(shader, gl::INFO_LOG_LENGTH, &mut len);
            BuildLog::failed(info_log(len, |len, buf| {
                gl::GetShaderInfoLog(shader, len, ptr::null_mut(), buf)
            }))
        } else {
            BuildLog::ok()
        };

        check()?;
        Ok((shader, log))
    }

    unsafe fn delete_stage(&mut self, stage: ObjectName) -> Result<()> {
        gl::DeleteShader(stage);
        check()
    }

    unsafe fn create_program(&mut self, stages: &[ObjectName]) -> Result<ObjectName> {
        let program = gl::CreateProgram();
        for v in stages {
            gl::AttachShader(program, *v);
        }

        check()?;
        Ok(program)
    }

    unsafe fn set_feedback_varyings(
        &mut self,
        program: ObjectName,
        varyings: &[String],
        mode: FeedbackMode,
    ) -> Result<()> {
        let mut names = Vec::with_capacity(varyings.len());
        for v in varyings {
            names.push(CString::new(v.as_bytes())?);
        }

        let ptrs: Vec<*const GLchar> = names.iter().map(|v| v.as_ptr()).collect();
        gl::TransformFeedbackVaryings(
            program,
            ptrs.len() as GLsizei,
            ptrs.as_ptr(),
            mode.into(),
        );

        check()
    }

    unsafe fn link_program(&mut self, program: ObjectName) -> Result<BuildLog> {
        gl::LinkProgram(program);

        let mut status = GLint::from(gl::FALSE);
        gl::GetProgramiv(program, gl::LINK_STATUS, &mut status);
        let log = program_log(program, status);

        check()?;
        Ok(log)
    }

    unsafe fn validate_program(&mut self, program: ObjectName) -> Result<BuildLog> {
        gl::ValidateProgram(program);

        let mut status = GLint::from(gl::FALSE);
        gl::GetProgramiv(program, gl::VALIDATE_STATUS, &mut status);
        let log = program_log(program, status);

        check()?;
        Ok(log)
    }

    unsafe fn delete_program(&mut self, program: ObjectName) -> Result<()> {
        gl::DeleteProgram(program);
        check()
    }

    unsafe fn active_uniforms(&mut self, program: ObjectName) -> Result<Vec<ActiveVariable>> {
        active_variables(
            program,
            gl::ACTIVE_UNIFORMS,
            gl::ACTIVE_UNIFORM_MAX_LENGTH,
            |index, max, len, size, ty, name| {
                gl::GetActiveUniform(program, index, max, len, size, ty, name)
            },
            |name| gl::GetUniformLocation(program, name),
        )
    }

    unsafe fn active_attributes(&mut self, program: ObjectName) -> Result<Vec<ActiveVariable>> {
        active_variables(
            program,
            gl::ACTIVE_ATTRIBUTES,
            gl::ACTIVE_ATTRIBUTE_MAX_LENGTH,
            |index, max, len, size, ty, name| {
                gl::GetActiveAttrib(program, index, max, len, size, ty, name)
            },
            |name| gl::GetAttribLocation(program, name),
        )
    }

    unsafe fn upload_uniform(
        &mut self,
        location: i32,
        format: InputFormat,
        count: usize,
        data: &[u8],
    ) -> Result<()> {
        if data.len() < format.size() * count {
            bail!(
                "[GL] Uniform {} expects {} bytes but got {}.",
                location,
                format.size() * count,
                data.len()
            );
        }

        let n = count as GLsizei;
        let f = data.as_ptr() as *const GLfloat;
        let i = data.as_ptr() as *const GLint;
        let u = data.as_ptr() as *const GLuint;
        let d = data.as_ptr() as *const GLdouble;

        match format {
            InputFormat::Vector(ScalarKind::Float, 1) => gl::Uniform1fv(location, n, f),
            InputFormat::Vector(ScalarKind::Float, 2) => gl::Uniform2fv(location, n, f),
            InputFormat::Vector(ScalarKind::Float, 3) => gl::Uniform3fv(location, n, f),
            InputFormat::Vector(ScalarKind::Float, _) => gl::Uniform4fv(location, n, f),
            InputFormat::Vector(ScalarKind::Int, 1) => gl::Uniform1iv(location, n, i),
            InputFormat::Vector(ScalarKind::Int, 2) => gl::Uniform2iv(location, n, i),
            InputFormat::Vector(ScalarKind::Int, 3) => gl::Uniform3iv(location, n, i),
            InputFormat::Vector(ScalarKind::Int, _) => gl::Uniform4iv(location, n, i),
            InputFormat::Vector(ScalarKind::UInt, 1) => gl::Uniform1uiv(location, n, u),
            InputFormat::Vector(ScalarKind::UInt, 2) => gl::Uniform2uiv(location, n, u),
            InputFormat::Vector(ScalarKind::UInt, 3) => gl::Uniform3uiv(location, n, u),
            InputFormat::Vector(ScalarKind::UInt, _) => gl::Uniform4uiv(location, n, u),
            InputFormat::Vector(ScalarKind::Double, 1) => gl::Uniform1dv(location, n, d),
            InputFormat::Vector(ScalarKind::Double, 2) => gl::Uniform2dv(location, n, d),
            InputFormat::Vector(ScalarKind::Double, 3) => gl::Uniform3dv(location, n, d),
            InputFormat::Vector(ScalarKind::Double, _) => gl::Uniform4dv(location, n, d),
            InputFormat::Mat3 => gl::UniformMatrix3fv(location, n, gl::FALSE, f),
            InputFormat::Mat4 => gl::UniformMatrix4fv(location, n, gl::FALSE, f),
        }

        check()
    }
}

unsafe fn info_log<F>(len: GLint, func: F) -> String
where
    F: FnOnce(GLsizei, *mut GLchar),
{
    if len <= 1 {
        return String::new();
    }

    let mut buf = vec![0u8; len as usize];
    func(len, buf.as_mut_ptr() as *mut GLchar);
    // Skips the trailing null character.
    buf.truncate(len as usize - 1);
    String::from_utf8_lossy(&buf).into_owned()
}

unsafe fn program_log(program: ObjectName, status: GLint) -> BuildLog {
    let mut len = 0;
    gl::GetProgramiv(program, gl::INFO_LOG_LENGTH, &mut len);
    let message = info_log(len, |len, buf| {
        gl::GetProgramInfoLog(program, len, ptr::null_mut(), buf)
    });

    BuildLog {
        success: status == GLint::from(gl::TRUE),
        message,
    }
}

unsafe fn active_variables<Q, L>(
    program: ObjectName,
    count: GLenum,
    max_length: GLenum,
    query: Q,
    locate: L,
) -> Result<Vec<ActiveVariable>>
where
    Q: Fn(GLuint, GLsizei, *mut GLsizei, *mut GLint, *mut GLenum, *mut GLchar),
    L: Fn(*const GLchar) -> GLint,
{
    let mut num = 0;
    gl::GetProgramiv(program, count, &mut num);
    let mut max = 0;
    gl::GetProgramiv(program, max_length, &mut max);

    let mut variables = Vec::with_capacity(num.max(0) as usize);
    let mut buf = vec![0u8; max.max(1) as usize];
    for index in 0..num.max(0) as GLuint {
        let mut len = 0;
        let mut size = 0;
        let mut ty = 0;
        query(
            index,
            max,
            &mut len,
            &mut size,
            &mut ty,
            buf.as_mut_ptr() as *mut GLchar,
        );

        let name = String::from_utf8_lossy(&buf[..len.max(0) as usize]).into_owned();
        let c_name = CString::new(name.as_bytes())?;
        variables.push(ActiveVariable {
            location: locate(c_name.as_ptr()),
            size,
            is_sampler: types::is_sampler(ty),
            name,
        });
    }

    check()?;
    Ok(variables)
}

unsafe fn check() -> Result<()> {
    match gl::GetError() {
        gl::NO_ERROR => Ok(()),

        gl::INVALID_ENUM => Err(Error::Backend(
            "An unacceptable value is specified for an enumerated argument.".into(),
        )
        .into()),

        gl::INVALID_VALUE => Err(Error::Backend("A numeric argument is out of range.".into()).into()),

        gl::INVALID_OPERATION => Err(Error::Backend(
            "The specified operation is not allowed in the current state.".into(),
        )
        .into()),

        gl::INVALID_FRAMEBUFFER_OPERATION => Err(Error::Backend(
            "The command is trying to render to or read from the framebuffer while the \
             currently bound framebuffer is not framebuffer complete."
                .into(),
        )
        .into()),

        gl::OUT_OF_MEMORY => Err(Error::Backend(
            "There is not enough memory left to execute the command.".into(),
        )
        .into()),

        _ => Err(Error::Backend("Oops, Unknown OpenGL error.".into()).into()),
    }
}
