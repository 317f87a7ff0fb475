//! The stack-based mirror of the GL pipeline state.
//!
//! Every state category is a `ValueStack`. States push their values when
//! enabled and pop them when disabled, so once a traversal unwinds the context
//! is back to what it was before. Only actual changes reach the backend.

pub mod stack;

pub use self::stack::{StackRef, ValueStack};

use std::cell::RefCell;
use std::collections::HashSet;
use std::rc::Rc;

use crate::errors::*;
use crate::settings::RenderParams;
use crate::states::StateId;
use crate::utils::pool::ObjectPool;
use crate::video::backends::{self, headless::HeadlessProbe, headless::HeadlessVisitor, Visitor};
use crate::video::objects::{GLObject, GLObjectHandle, GarbageQueue};
use crate::video::types::*;

macro_rules! stack_accessor {
    ($(#[$meta:meta])* $name:ident: $ty:ty) => {
        $(#[$meta])*
        #[inline]
        pub fn $name(&mut self) -> StackRef<$ty> {
            StackRef::new(&mut self.stacks.$name, &mut self.visitor)
        }
    };
}

macro_rules! stack {
    ($name:ident, $initial:expr, $func:ident) => {
        ValueStack::new(stringify!($name), 0, $initial, |v, _, x| unsafe { v.$func(*x) })
    };
}

struct Stacks {
    toggles: Vec<ValueStack<bool>>,
    program: ValueStack<ObjectName>,
    depth_func: ValueStack<Comparison>,
    depth_mask: ValueStack<bool>,
    depth_range: ValueStack<DepthRange>,
    cull_face: ValueStack<CullFace>,
    front_face: ValueStack<FrontFaceOrder>,
    blend_func: ValueStack<BlendFunc>,
    blend_equation: ValueStack<BlendEquation>,
    blend_color: ValueStack<[f32; 4]>,
    polygon_offset: ValueStack<PolygonOffset>,
    polygon_mode: ValueStack<PolygonMode>,
    patch_vertices: ValueStack<u32>,
    patch_levels: ValueStack<PatchLevels>,
    viewport: ValueStack<Rect>,
    scissor: ValueStack<Rect>,
    color_mask: ValueStack<ColorMask>,
    clear_color: ValueStack<[f32; 4]>,
    line_width: ValueStack<f32>,
    point_size: ValueStack<f32>,
    framebuffers: Vec<ValueStack<ObjectName>>,
    vertex_array: ValueStack<ObjectName>,
    buffers: Vec<ValueStack<ObjectName>>,
    textures: Vec<ValueStack<TextureBind>>,
}

const FRAMEBUFFER_TARGETS: [FramebufferTarget; 2] = [FramebufferTarget::Read, FramebufferTarget::Draw];

impl Stacks {
    fn new(params: &RenderParams) -> Self {
        let viewport = Rect::new(0, 0, params.dimensions.0, params.dimensions.1);

        Stacks {
            toggles: Toggle::ALL
                .iter()
                .enumerate()
                .map(|(i, toggle)| {
                    ValueStack::new("toggle", i, toggle.initial(), |v, i, x| unsafe {
                        v.set_toggle(Toggle::ALL[i], *x)
                    })
                })
                .collect(),
            program: stack!(program, 0, use_program),
            depth_func: stack!(depth_func, Comparison::Less, set_depth_func),
            depth_mask: stack!(depth_mask, true, set_depth_mask),
            depth_range: stack!(depth_range, DepthRange::default(), set_depth_range),
            cull_face: stack!(cull_face, CullFace::Back, set_cull_face),
            front_face: stack!(front_face, FrontFaceOrder::CounterClockwise, set_front_face),
            blend_func: stack!(blend_func, BlendFunc::default(), set_blend_func),
            blend_equation: stack!(blend_equation, BlendEquation::default(), set_blend_equation),
            blend_color: stack!(blend_color, [0.0; 4], set_blend_color),
            polygon_offset: stack!(polygon_offset, PolygonOffset::default(), set_polygon_offset),
            polygon_mode: stack!(polygon_mode, PolygonMode::Fill, set_polygon_mode),
            patch_vertices: stack!(patch_vertices, 3, set_patch_vertices),
            patch_levels: stack!(patch_levels, PatchLevels::default(), set_patch_levels),
            viewport: stack!(viewport, viewport, set_viewport),
            scissor: stack!(scissor, viewport, set_scissor),
            color_mask: stack!(color_mask, ColorMask::default(), set_color_mask),
            clear_color: stack!(clear_color, [0.0; 4], set_clear_color),
            line_width: stack!(line_width, 1.0, set_line_width),
            point_size: stack!(point_size, 1.0, set_point_size),
            framebuffers: (0..FRAMEBUFFER_TARGETS.len())
                .map(|i| {
                    ValueStack::new("framebuffer", i, 0, |v, i, x| unsafe {
                        v.bind_framebuffer(FRAMEBUFFER_TARGETS[i], *x)
                    })
                })
                .collect(),
            vertex_array: stack!(vertex_array, 0, bind_vertex_array),
            buffers: BufferTarget::ALL
                .iter()
                .enumerate()
                .map(|(i, _)| {
                    ValueStack::new("buffer", i, 0, |v, i, x| unsafe {
                        v.bind_buffer(BufferTarget::ALL[i], *x)
                    })
                })
                .collect(),
            textures: (0..params.max_texture_units.max(1) as usize)
                .map(|i| {
                    ValueStack::new("texture", i, TextureBind::default(), |v, i, x| unsafe {
                        v.bind_texture(i as u32, *x)
                    })
                })
                .collect(),
        }
    }

    fn reset(&mut self, visitor: &mut dyn Visitor) -> Result<()> {
        for v in &mut self.toggles {
            v.reset(visitor)?;
        }

        self.program.reset(visitor)?;
        self.depth_func.reset(visitor)?;
        self.depth_mask.reset(visitor)?;
        self.depth_range.reset(visitor)?;
        self.cull_face.reset(visitor)?;
        self.front_face.reset(visitor)?;
        self.blend_func.reset(visitor)?;
        self.blend_equation.reset(visitor)?;
        self.blend_color.reset(visitor)?;
        self.polygon_offset.reset(visitor)?;
        self.polygon_mode.reset(visitor)?;
        self.patch_vertices.reset(visitor)?;
        self.patch_levels.reset(visitor)?;
        self.viewport.reset(visitor)?;
        self.scissor.reset(visitor)?;
        self.color_mask.reset(visitor)?;
        self.clear_color.reset(visitor)?;
        self.line_width.reset(visitor)?;
        self.point_size.reset(visitor)?;

        for v in &mut self.framebuffers {
            v.reset(visitor)?;
        }

        self.vertex_array.reset(visitor)?;

        for v in &mut self.buffers {
            v.reset(visitor)?;
        }

        for v in &mut self.textures {
            v.reset(visitor)?;
        }

        Ok(())
    }
}

/// The render state of one GL context.
///
/// It is a single-threaded resource: every state enable, disable and shader
/// compilation of a context goes through its `RenderState`.
pub struct RenderState {
    visitor: Box<dyn Visitor>,
    stacks: Stacks,
    max_texture_units: u32,
    texture_channels: u32,
    feedback_depth: u32,
    hidden: HashSet<StateId>,
    active: HashSet<StateId>,
    objects: ObjectPool<GLObjectHandle, (ObjectKind, Vec<ObjectName>)>,
    garbage: GarbageQueue,
}

impl RenderState {
    /// Creates a render state on top of `visitor` and pushes the default value
    /// of every category to it.
    pub fn new(visitor: Box<dyn Visitor>, params: &RenderParams) -> Result<Self> {
        let mut rs = RenderState {
            visitor,
            stacks: Stacks::new(params),
            max_texture_units: params.max_texture_units.max(1),
            texture_channels: 0,
            feedback_depth: 0,
            hidden: HashSet::new(),
            active: HashSet::new(),
            objects: ObjectPool::new(),
            garbage: Rc::new(RefCell::new(Vec::new())),
        };

        rs.reset()?;
        Ok(rs)
    }

    /// Creates a render state on the headless backend, along with the probe
    /// that observes it.
    pub fn headless(params: &RenderParams) -> Result<(Self, HeadlessProbe)> {
        let visitor = HeadlessVisitor::new();
        let probe = visitor.probe();
        let rs = RenderState::new(Box::new(visitor), params)?;
        probe.clear_calls();
        Ok((rs, probe))
    }

    /// Creates a render state bound to the current OpenGL context.
    #[cfg(not(target_arch = "wasm32"))]
    pub unsafe fn gl(params: &RenderParams) -> Result<Self> {
        RenderState::new(backends::new()?, params)
    }

    /// Re-sends the current value of every category to the backend. Use this
    /// after foreign code touched the context.
    pub fn reset(&mut self) -> Result<()> {
        self.stacks.reset(&mut *self.visitor)
    }

    /// Direct access to the backend, for operations that have no stack of
    /// their own.
    #[inline]
    pub fn visitor(&mut self) -> &mut dyn Visitor {
        &mut *self.visitor
    }

    stack_accessor!(program: ObjectName);
    stack_accessor!(depth_func: Comparison);
    stack_accessor!(depth_mask: bool);
    stack_accessor!(depth_range: DepthRange);
    stack_accessor!(cull_face: CullFace);
    stack_accessor!(front_face: FrontFaceOrder);
    stack_accessor!(blend_func: BlendFunc);
    stack_accessor!(blend_equation: BlendEquation);
    stack_accessor!(blend_color: [f32; 4]);
    stack_accessor!(polygon_offset: PolygonOffset);
    stack_accessor!(polygon_mode: PolygonMode);
    stack_accessor!(
        /// Vertices per patch for tessellation.
        patch_vertices: u32
    );
    stack_accessor!(
        /// Default tessellation levels, used when no control stage is present.
        patch_levels: PatchLevels
    );
    stack_accessor!(viewport: Rect);
    stack_accessor!(scissor: Rect);
    stack_accessor!(color_mask: ColorMask);
    stack_accessor!(clear_color: [f32; 4]);
    stack_accessor!(line_width: f32);
    stack_accessor!(point_size: f32);
    stack_accessor!(vertex_array: ObjectName);

    #[inline]
    pub fn toggle(&mut self, toggle: Toggle) -> StackRef<bool> {
        let index = Toggle::ALL.iter().position(|&v| v == toggle).unwrap_or(0);
        StackRef::new(&mut self.stacks.toggles[index], &mut self.visitor)
    }

    #[inline]
    pub fn framebuffer(&mut self, target: FramebufferTarget) -> StackRef<ObjectName> {
        let index = match target {
            FramebufferTarget::Read => 0,
            FramebufferTarget::Draw => 1,
        };

        StackRef::new(&mut self.stacks.framebuffers[index], &mut self.visitor)
    }

    #[inline]
    pub fn buffer(&mut self, target: BufferTarget) -> StackRef<ObjectName> {
        let index = BufferTarget::ALL.iter().position(|&v| v == target).unwrap_or(0);
        StackRef::new(&mut self.stacks.buffers[index], &mut self.visitor)
    }

    /// The binding stack of texture unit `unit`.
    ///
    /// # Panics
    ///
    /// Panics if `unit` is not below `max_texture_units`.
    #[inline]
    pub fn texture(&mut self, unit: u32) -> StackRef<TextureBind> {
        StackRef::new(&mut self.stacks.textures[unit as usize], &mut self.visitor)
    }

    #[inline]
    pub fn max_texture_units(&self) -> u32 {
        self.max_texture_units
    }

    /// Hands out the next free texture channel. Channels are handed out in
    /// stack order and must be released in reverse. Once every unit is taken
    /// the last unit is shared.
    pub fn reserve_texture_channel(&mut self) -> u32 {
        let channel = self.texture_channels.min(self.max_texture_units - 1);
        if self.texture_channels >= self.max_texture_units {
            warn!(
                "[RenderState] All {} texture units are in use, sharing the last one.",
                self.max_texture_units
            );
        }

        self.texture_channels += 1;
        channel
    }

    pub fn release_texture_channel(&mut self) {
        assert!(
            self.texture_channels > 0,
            "Release of a texture channel that was never reserved."
        );

        self.texture_channels -= 1;
    }

    /// Number of texture channels currently reserved.
    #[inline]
    pub fn texture_channels(&self) -> u32 {
        self.texture_channels
    }

    /// Starts capturing into the bound feedback buffers. Nested calls only
    /// count; the outermost one reaches the backend.
    pub fn begin_feedback(&mut self, primitive: FeedbackPrimitive) -> Result<()> {
        if self.feedback_depth == 0 {
            unsafe { self.visitor.begin_feedback(primitive)? };
        }

        self.feedback_depth += 1;
        Ok(())
    }

    pub fn end_feedback(&mut self) -> Result<()> {
        assert!(
            self.feedback_depth > 0,
            "End of a transform feedback that never began."
        );

        if self.feedback_depth == 1 {
            unsafe { self.visitor.end_feedback()? };
        }

        self.feedback_depth -= 1;
        Ok(())
    }

    #[inline]
    pub fn is_feedback_active(&self) -> bool {
        self.feedback_depth > 0
    }

    /// Hides a state for this context only. Hidden states are skipped by every
    /// traversal on this render state.
    #[inline]
    pub fn hide_state(&mut self, id: StateId) {
        self.hidden.insert(id);
    }

    #[inline]
    pub fn show_state(&mut self, id: StateId) {
        self.hidden.remove(&id);
    }

    #[inline]
    pub fn is_hidden(&self, id: StateId) -> bool {
        self.hidden.contains(&id)
    }

    /// Marks a state as enabled, returning false if it already is.
    #[inline]
    pub(crate) fn mark_active(&mut self, id: StateId) -> bool {
        self.active.insert(id)
    }

    #[inline]
    pub(crate) fn unmark_active(&mut self, id: StateId) {
        self.active.remove(&id);
    }

    #[inline]
    pub fn is_active(&self, id: StateId) -> bool {
        self.active.contains(&id)
    }

    /// Creates `n` native objects of `kind`, grouped into one `GLObject`.
    pub fn create_objects(&mut self, kind: ObjectKind, n: usize) -> Result<GLObject> {
        if n == 0 {
            bail!("[RenderState] A GLObject needs at least one native object.");
        }

        let names = unsafe { self.visitor.create_objects(kind, n)? };
        let handle = self.objects.create((kind, names.clone()));
        Ok(GLObject::new(handle, kind, &names, self.garbage.clone()))
    }

    /// Number of native object groups that are alive.
    #[inline]
    pub fn live_objects(&self) -> usize {
        self.objects.len()
    }

    /// Deletes the native objects of every dropped `GLObject`. Returns the
    /// number of groups released.
    pub fn collect_garbage(&mut self) -> Result<usize> {
        let handles: Vec<_> = self.garbage.borrow_mut().drain(..).collect();

        let mut released = 0;
        for handle in handles {
            match self.objects.free(handle) {
                Some((kind, names)) => {
                    unsafe { self.visitor.delete_objects(kind, &names)? };
                    released += 1;
                }
                None => warn!("[RenderState] Tried to free stale {}.", handle),
            }
        }

        Ok(released)
    }
}

impl Drop for RenderState {
    fn drop(&mut self) {
        for (_, (kind, names)) in self.objects.drain() {
            if let Err(err) = unsafe { self.visitor.delete_objects(kind, &names) } {
                warn!("[RenderState] Failed to delete {:?} objects. {}", kind, err);
            }
        }
    }
}
