use std::cell::RefCell;
use std::collections::{BTreeMap, BTreeSet};
use std::rc::Rc;

use regex::Regex;

use super::Visitor;
use crate::errors::*;
use crate::shader::input::InputFormat;
use crate::video::types::*;

/// The GL-visible pipeline state as mirrored by the headless backend.
#[derive(Debug, Clone, PartialEq)]
pub struct GLSnapshot {
    pub toggles: BTreeMap<Toggle, bool>,
    pub program: ObjectName,
    pub depth_func: Comparison,
    pub depth_mask: bool,
    pub depth_range: DepthRange,
    pub cull_face: CullFace,
    pub front_face: FrontFaceOrder,
    pub blend_func: BlendFunc,
    pub blend_equation: BlendEquation,
    pub blend_color: [f32; 4],
    pub polygon_offset: PolygonOffset,
    pub polygon_mode: PolygonMode,
    pub patch_vertices: u32,
    pub patch_levels: PatchLevels,
    pub viewport: Rect,
    pub scissor: Rect,
    pub color_mask: ColorMask,
    pub clear_color: [f32; 4],
    pub line_width: f32,
    pub point_size: f32,
    pub framebuffers: BTreeMap<FramebufferTarget, ObjectName>,
    pub vertex_array: ObjectName,
    pub buffers: BTreeMap<BufferTarget, ObjectName>,
    pub textures: BTreeMap<u32, TextureBind>,
    pub feedback: Option<FeedbackPrimitive>,
}

impl Default for GLSnapshot {
    fn default() -> Self {
        GLSnapshot {
            toggles: Toggle::ALL.iter().map(|&v| (v, v.initial())).collect(),
            program: 0,
            depth_func: Comparison::Less,
            depth_mask: true,
            depth_range: DepthRange::default(),
            cull_face: CullFace::Back,
            front_face: FrontFaceOrder::CounterClockwise,
            blend_func: BlendFunc::default(),
            blend_equation: BlendEquation::default(),
            blend_color: [0.0; 4],
            polygon_offset: PolygonOffset::default(),
            polygon_mode: PolygonMode::Fill,
            patch_vertices: 3,
            patch_levels: PatchLevels::default(),
            viewport: Rect::default(),
            scissor: Rect::default(),
            color_mask: ColorMask::default(),
            clear_color: [0.0; 4],
            line_width: 1.0,
            point_size: 1.0,
            framebuffers: BTreeMap::new(),
            vertex_array: 0,
            buffers: BTreeMap::new(),
            textures: BTreeMap::new(),
            feedback: None,
        }
    }
}

#[derive(Debug, Clone)]
struct ProgramRecord {
    stages: Vec<ObjectName>,
    varyings: Vec<String>,
    linked: bool,
}

#[derive(Default)]
struct HeadlessContext {
    snapshot: GLSnapshot,
    calls: Vec<String>,
    uploads: Vec<(i32, Vec<u8>)>,
    failing: BTreeSet<Stage>,
    failing_queries: bool,
    next_name: ObjectName,
    objects: BTreeMap<ObjectName, ObjectKind>,
    stages: BTreeMap<ObjectName, (Stage, String)>,
    programs: BTreeMap<ObjectName, ProgramRecord>,
}

impl HeadlessContext {
    fn name(&mut self) -> ObjectName {
        self.next_name += 1;
        self.next_name
    }
}

/// A shared view into the headless backend, used to observe what the engine
/// did to the (imaginary) GL context.
#[derive(Clone, Default)]
pub struct HeadlessProbe {
    ctx: Rc<RefCell<HeadlessContext>>,
}

impl HeadlessProbe {
    pub fn snapshot(&self) -> GLSnapshot {
        self.ctx.borrow().snapshot.clone()
    }

    /// Every call received since the last `clear_calls`.
    pub fn calls(&self) -> Vec<String> {
        self.ctx.borrow().calls.clone()
    }

    pub fn clear_calls(&self) {
        self.ctx.borrow_mut().calls.clear();
    }

    /// Uniform uploads as `(location, bytes)`.
    pub fn uploads(&self) -> Vec<(i32, Vec<u8>)> {
        self.ctx.borrow().uploads.clone()
    }

    pub fn clear_uploads(&self) {
        self.ctx.borrow_mut().uploads.clear();
    }

    /// Makes every later compilation of `stage` fail.
    pub fn fail_compile(&self, stage: Stage) {
        self.ctx.borrow_mut().failing.insert(stage);
    }

    /// Makes every later query of active uniforms fail, as if the context
    /// was lost.
    pub fn fail_queries(&self) {
        self.ctx.borrow_mut().failing_queries = true;
    }

    pub fn live_objects(&self) -> usize {
        self.ctx.borrow().objects.len()
    }

    pub fn live_stages(&self) -> usize {
        self.ctx.borrow().stages.len()
    }

    pub fn live_programs(&self) -> usize {
        self.ctx.borrow().programs.len()
    }

    /// Returns true if `program` exists and has been linked successfully.
    pub fn is_linked(&self, program: ObjectName) -> bool {
        self.ctx
            .borrow()
            .programs
            .get(&program)
            .map(|v| v.linked)
            .unwrap_or(false)
    }

    /// The varyings declared on `program` before it was linked.
    pub fn varyings(&self, program: ObjectName) -> Vec<String> {
        self.ctx
            .borrow()
            .programs
            .get(&program)
            .map(|v| v.varyings.clone())
            .unwrap_or_default()
    }
}

/// A backend without any GL context. It mirrors pipeline state into a
/// `GLSnapshot`, and "compiles" shaders by scanning their declarations so the
/// shader pipeline could be exercised end to end.
pub struct HeadlessVisitor {
    probe: HeadlessProbe,
    uniforms: Regex,
    attributes: Regex,
}

impl HeadlessVisitor {
    pub fn new() -> Self {
        HeadlessVisitor::with_probe(HeadlessProbe::default())
    }

    pub fn with_probe(probe: HeadlessProbe) -> Self {
        HeadlessVisitor {
            probe,
            uniforms: Regex::new(
                r"(?m)^\s*(?:layout\s*\([^)]*\)\s*)?uniform\s+(\w+)\s+(\w+)\s*(\[\s*\w+\s*\])?\s*;",
            )
            .unwrap(),
            attributes: Regex::new(
                r"(?m)^\s*(?:layout\s*\([^)]*\)\s*)?in\s+(\w+)\s+(\w+)\s*(\[\s*\w+\s*\])?\s*;",
            )
            .unwrap(),
        }
    }

    pub fn probe(&self) -> HeadlessProbe {
        self.probe.clone()
    }

    #[inline]
    fn record<F>(&mut self, call: String, func: F) -> Result<()>
    where
        F: FnOnce(&mut GLSnapshot),
    {
        let mut ctx = self.probe.ctx.borrow_mut();
        ctx.calls.push(call);
        func(&mut ctx.snapshot);
        Ok(())
    }

    fn sources(&self, program: ObjectName) -> Vec<(Stage, String)> {
        let ctx = self.probe.ctx.borrow();
        ctx.programs
            .get(&program)
            .map(|p| {
                p.stages
                    .iter()
                    .filter_map(|v| ctx.stages.get(v).cloned())
                    .collect()
            })
            .unwrap_or_default()
    }

    fn scan(regex: &Regex, sources: &[String]) -> Vec<ActiveVariable> {
        let mut variables: Vec<ActiveVariable> = Vec::new();
        for source in sources {
            for cap in regex.captures_iter(source) {
                let ty = &cap[1];
                let name = match cap.get(3) {
                    Some(_) => format!("{}[0]", &cap[2]),
                    None => cap[2].to_owned(),
                };

                if variables.iter().any(|v| v.name == name) {
                    continue;
                }

                variables.push(ActiveVariable {
                    location: variables.len() as i32,
                    size: 1,
                    is_sampler: ty.starts_with("sampler")
                        || ty.starts_with("isampler")
                        || ty.starts_with("usampler"),
                    name,
                });
            }
        }

        variables
    }
}

impl Default for HeadlessVisitor {
    fn default() -> Self {
        HeadlessVisitor::new()
    }
}

impl Visitor for HeadlessVisitor {
    unsafe fn set_toggle(&mut self, toggle: Toggle, enable: bool) -> Result<()> {
        self.record(format!("set_toggle({:?}, {})", toggle, enable), |s| {
            s.toggles.insert(toggle, enable);
        })
    }

    unsafe fn use_program(&mut self, program: ObjectName) -> Result<()> {
        self.record(format!("use_program({})", program), |s| s.program = program)
    }

    unsafe fn set_depth_func(&mut self, func: Comparison) -> Result<()> {
        self.record(format!("set_depth_func({:?})", func), |s| s.depth_func = func)
    }

    unsafe fn set_depth_mask(&mut self, write: bool) -> Result<()> {
        self.record(format!("set_depth_mask({})", write), |s| s.depth_mask = write)
    }

    unsafe fn set_depth_range(&mut self, range: DepthRange) -> Result<()> {
        self.record(format!("set_depth_range({:?})", range), |s| {
            s.depth_range = range
        })
    }

    unsafe fn set_cull_face(&mut self, face: CullFace) -> Result<()> {
        self.record(format!("set_cull_face({:?})", face), |s| s.cull_face = face)
    }

    unsafe fn set_front_face(&mut self, order: FrontFaceOrder) -> Result<()> {
        self.record(format!("set_front_face({:?})", order), |s| {
            s.front_face = order
        })
    }

    unsafe fn set_blend_func(&mut self, func: BlendFunc) -> Result<()> {
        self.record(format!("set_blend_func({:?})", func), |s| s.blend_func = func)
    }

    unsafe fn set_blend_equation(&mut self, equation: BlendEquation) -> Result<()> {
        self.record(format!("set_blend_equation({:?})", equation), |s| {
            s.blend_equation = equation
        })
    }

    unsafe fn set_blend_color(&mut self, color: [f32; 4]) -> Result<()> {
        self.record(format!("set_blend_color({:?})", color), |s| {
            s.blend_color = color
        })
    }

    unsafe fn set_polygon_offset(&mut self, offset: PolygonOffset) -> Result<()> {
        self.record(format!("set_polygon_offset({:?})", offset), |s| {
            s.polygon_offset = offset
        })
    }

    unsafe fn set_polygon_mode(&mut self, mode: PolygonMode) -> Result<()> {
        self.record(format!("set_polygon_mode({:?})", mode), |s| {
            s.polygon_mode = mode
        })
    }

    unsafe fn set_patch_vertices(&mut self, n: u32) -> Result<()> {
        self.record(format!("set_patch_vertices({})", n), |s| s.patch_vertices = n)
    }

    unsafe fn set_patch_levels(&mut self, levels: PatchLevels) -> Result<()> {
        self.record(format!("set_patch_levels({:?})", levels), |s| {
            s.patch_levels = levels
        })
    }

    unsafe fn set_viewport(&mut self, rect: Rect) -> Result<()> {
        self.record(format!("set_viewport({:?})", rect), |s| s.viewport = rect)
    }

    unsafe fn set_scissor(&mut self, rect: Rect) -> Result<()> {
        self.record(format!("set_scissor({:?})", rect), |s| s.scissor = rect)
    }

    unsafe fn set_color_mask(&mut self, mask: ColorMask) -> Result<()> {
        self.record(format!("set_color_mask({:?})", mask), |s| s.color_mask = mask)
    }

    unsafe fn set_clear_color(&mut self, color: [f32; 4]) -> Result<()> {
        self.record(format!("set_clear_color({:?})", color), |s| {
            s.clear_color = color
        })
    }

    unsafe fn set_line_width(&mut self, width: f32) -> Result<()> {
        self.record(format!("set_line_width({})", width), |s| s.line_width = width)
    }

    unsafe fn set_point_size(&mut self, size: f32) -> Result<()> {
        self.record(format!("set_point_size({})", size), |s| s.point_size = size)
    }

    unsafe fn bind_framebuffer(
        &mut self,
        target: FramebufferTarget,
        fbo: ObjectName,
    ) -> Result<()> {
        self.record(format!("bind_framebuffer({:?}, {})", target, fbo), |s| {
            s.framebuffers.insert(target, fbo);
        })
    }

    unsafe fn bind_vertex_array(&mut self, vao: ObjectName) -> Result<()> {
        self.record(format!("bind_vertex_array({})", vao), |s| s.vertex_array = vao)
    }

    unsafe fn bind_buffer(&mut self, target: BufferTarget, buffer: ObjectName) -> Result<()> {
        self.record(format!("bind_buffer({:?}, {})", target, buffer), |s| {
            s.buffers.insert(target, buffer);
        })
    }

    unsafe fn bind_texture(&mut self, unit: u32, bind: TextureBind) -> Result<()> {
        self.record(format!("bind_texture({}, {:?})", unit, bind), |s| {
            s.textures.insert(unit, bind);
        })
    }

    unsafe fn begin_feedback(&mut self, primitive: FeedbackPrimitive) -> Result<()> {
        if self.probe.ctx.borrow().snapshot.feedback.is_some() {
            bail!("[GL] Transform feedback is already active.");
        }

        self.record(format!("begin_feedback({:?})", primitive), |s| {
            s.feedback = Some(primitive)
        })
    }

    unsafe fn end_feedback(&mut self) -> Result<()> {
        if self.probe.ctx.borrow().snapshot.feedback.is_none() {
            bail!("[GL] Transform feedback is not active.");
        }

        self.record("end_feedback()".to_owned(), |s| s.feedback = None)
    }

    unsafe fn create_objects(&mut self, kind: ObjectKind, n: usize) -> Result<Vec<ObjectName>> {
        let mut ctx = self.probe.ctx.borrow_mut();
        ctx.calls.push(format!("create_objects({:?}, {})", kind, n));

        let mut names = Vec::with_capacity(n);
        for _ in 0..n {
            let name = ctx.name();
            ctx.objects.insert(name, kind);
            names.push(name);
        }

        Ok(names)
    }

    unsafe fn delete_objects(&mut self, kind: ObjectKind, names: &[ObjectName]) -> Result<()> {
        let mut ctx = self.probe.ctx.borrow_mut();
        ctx.calls.push(format!("delete_objects({:?}, {:?})", kind, names));

        for v in names {
            if ctx.objects.remove(v) != Some(kind) {
                bail!("[GL] {:?} object {} does not exist.", kind, v);
            }
        }

        Ok(())
    }

    unsafe fn compile_stage(
        &mut self,
        stage: Stage,
        source: &str,
    ) -> Result<(ObjectName, BuildLog)> {
        let mut ctx = self.probe.ctx.borrow_mut();
        ctx.calls.push(format!("compile_stage({:?})", stage));

        let name = ctx.name();
        ctx.stages.insert(name, (stage, source.to_owned()));

        let error = source
            .lines()
            .position(|v| v.trim_start().starts_with("#error"));

        let log = if ctx.failing.contains(&stage) {
            BuildLog::failed(format!("0:1: {} stage rejected.", stage))
        } else if let Some(line) = error {
            BuildLog::failed(format!("0:{}: #error directive.", line + 1))
        } else {
            BuildLog::ok()
        };

        Ok((name, log))
    }

    unsafe fn delete_stage(&mut self, stage: ObjectName) -> Result<()> {
        let mut ctx = self.probe.ctx.borrow_mut();
        ctx.calls.push(format!("delete_stage({})", stage));
        ctx.stages.remove(&stage);
        Ok(())
    }

    unsafe fn create_program(&mut self, stages: &[ObjectName]) -> Result<ObjectName> {
        let mut ctx = self.probe.ctx.borrow_mut();
        ctx.calls.push(format!("create_program({:?})", stages));

        let name = ctx.name();
        let record = ProgramRecord {
            stages: stages.to_vec(),
            varyings: Vec::new(),
            linked: false,
        };

        ctx.programs.insert(name, record);
        Ok(name)
    }

    unsafe fn set_feedback_varyings(
        &mut self,
        program: ObjectName,
        varyings: &[String],
        mode: FeedbackMode,
    ) -> Result<()> {
        let mut ctx = self.probe.ctx.borrow_mut();
        ctx.calls
            .push(format!("set_feedback_varyings({}, {:?})", program, mode));

        match ctx.programs.get_mut(&program) {
            Some(v) if !v.linked => v.varyings = varyings.to_vec(),
            Some(_) => bail!("[GL] Varyings of program {} are set after linking.", program),
            None => bail!("[GL] Program {} does not exist.", program),
        }

        Ok(())
    }

    unsafe fn link_program(&mut self, program: ObjectName) -> Result<BuildLog> {
        let sources: Vec<String> = self.sources(program).into_iter().map(|v| v.1).collect();

        let mut ctx = self.probe.ctx.borrow_mut();
        ctx.calls.push(format!("link_program({})", program));

        let record = match ctx.programs.get_mut(&program) {
            Some(v) => v,
            None => bail!("[GL] Program {} does not exist.", program),
        };

        for varying in &record.varyings {
            if varying.starts_with("gl_") {
                continue;
            }

            let word = Regex::new(&format!(r"\b{}\b", regex::escape(varying)))?;
            if !sources.iter().any(|v| word.is_match(v)) {
                return Ok(BuildLog::failed(format!(
                    "Varying '{}' is not written by any stage.",
                    varying
                )));
            }
        }

        record.linked = true;
        Ok(BuildLog::ok())
    }

    unsafe fn validate_program(&mut self, program: ObjectName) -> Result<BuildLog> {
        let mut ctx = self.probe.ctx.borrow_mut();
        ctx.calls.push(format!("validate_program({})", program));

        match ctx.programs.get(&program) {
            Some(v) if v.linked => Ok(BuildLog::ok()),
            Some(_) => Ok(BuildLog::failed("Program is not linked.")),
            None => bail!("[GL] Program {} does not exist.", program),
        }
    }

    unsafe fn delete_program(&mut self, program: ObjectName) -> Result<()> {
        let mut ctx = self.probe.ctx.borrow_mut();
        ctx.calls.push(format!("delete_program({})", program));
        ctx.programs.remove(&program);
        Ok(())
    }

    unsafe fn active_uniforms(&mut self, program: ObjectName) -> Result<Vec<ActiveVariable>> {
        if self.probe.ctx.borrow().failing_queries {
            bail!("[GL] Context lost while querying program {}.", program);
        }

        let sources: Vec<String> = self.sources(program).into_iter().map(|v| v.1).collect();
        Ok(Self::scan(&self.uniforms, &sources))
    }

    unsafe fn active_attributes(&mut self, program: ObjectName) -> Result<Vec<ActiveVariable>> {
        let sources: Vec<String> = self
            .sources(program)
            .into_iter()
            .filter(|v| v.0 == Stage::Vertex)
            .map(|v| v.1)
            .collect();

        Ok(Self::scan(&self.attributes, &sources))
    }

    unsafe fn upload_uniform(
        &mut self,
        location: i32,
        format: InputFormat,
        count: usize,
        data: &[u8],
    ) -> Result<()> {
        let mut ctx = self.probe.ctx.borrow_mut();
        ctx.calls
            .push(format!("upload_uniform({}, {}, {})", location, format, count));
        ctx.uploads.push((location, data.to_vec()));
        Ok(())
    }
}
