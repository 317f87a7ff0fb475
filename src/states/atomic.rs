//! States that push exactly one value to the render state.
//!
//! Composite GL setups like blending are built by joining atomic states
//! into one `State`, so unwinding on failure comes for free.

use std::rc::Rc;
use std::str::FromStr;

use crate::errors::*;
use crate::video::types::*;
use crate::video::{GLObject, RenderState};

use super::state::{State, StateEffect};

macro_rules! value_state {
    ($(#[$meta:meta])* $name:ident($ty:ty) => $stack:ident) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq)]
        pub struct $name(pub $ty);

        impl StateEffect for $name {
            fn enable(&self, rs: &mut RenderState) -> Result<()> {
                rs.$stack().push(self.0)
            }

            fn disable(&self, rs: &mut RenderState) -> Result<()> {
                rs.$stack().pop()
            }
        }
    };
}

value_state!(
    /// Specifies the depth comparison function.
    DepthFuncState(Comparison) => depth_func
);
value_state!(
    /// Enables or disables writing into the depth buffer.
    DepthMaskState(bool) => depth_mask
);
value_state!(DepthRangeState(DepthRange) => depth_range);
value_state!(CullFaceState(CullFace) => cull_face);
value_state!(FrontFaceState(FrontFaceOrder) => front_face);
value_state!(BlendFuncState(BlendFunc) => blend_func);
value_state!(BlendEquationState(BlendEquation) => blend_equation);
value_state!(BlendColorState([f32; 4]) => blend_color);
value_state!(
    /// Scale and units used to calculate depth values of filled polygons.
    PolygonOffsetState(PolygonOffset) => polygon_offset
);
value_state!(PolygonModeState(PolygonMode) => polygon_mode);
value_state!(
    /// Number of vertices per patch for tessellation.
    PatchVerticesState(u32) => patch_vertices
);
value_state!(PatchLevelsState(PatchLevels) => patch_levels);
value_state!(ViewportState(Rect) => viewport);
value_state!(ScissorState(Rect) => scissor);
value_state!(ColorMaskState(ColorMask) => color_mask);
value_state!(ClearColorState([f32; 4]) => clear_color);
value_state!(LineWidthState(f32) => line_width);
value_state!(PointSizeState(f32) => point_size);
value_state!(VertexArrayState(ObjectName) => vertex_array);

/// Toggles server side GL state.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ToggleState {
    pub toggle: Toggle,
    pub value: bool,
}

impl ToggleState {
    pub fn new(toggle: Toggle, value: bool) -> Self {
        ToggleState { toggle, value }
    }
}

impl StateEffect for ToggleState {
    fn enable(&self, rs: &mut RenderState) -> Result<()> {
        rs.toggle(self.toggle).push(self.value)
    }

    fn disable(&self, rs: &mut RenderState) -> Result<()> {
        rs.toggle(self.toggle).pop()
    }
}

/// Binds a framebuffer object to a read or draw target.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FramebufferState {
    pub target: FramebufferTarget,
    pub fbo: ObjectName,
}

impl FramebufferState {
    pub fn new(target: FramebufferTarget, fbo: ObjectName) -> Self {
        FramebufferState { target, fbo }
    }

    /// Binds the active object of `fbo`.
    pub fn from_object(target: FramebufferTarget, fbo: &GLObject) -> Self {
        FramebufferState::new(target, fbo.id())
    }
}

impl StateEffect for FramebufferState {
    fn enable(&self, rs: &mut RenderState) -> Result<()> {
        rs.framebuffer(self.target).push(self.fbo)
    }

    fn disable(&self, rs: &mut RenderState) -> Result<()> {
        rs.framebuffer(self.target).pop()
    }
}

/// Binds a buffer object to one of the buffer targets.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BufferState {
    pub target: BufferTarget,
    pub buffer: ObjectName,
}

impl BufferState {
    pub fn new(target: BufferTarget, buffer: ObjectName) -> Self {
        BufferState { target, buffer }
    }
}

impl StateEffect for BufferState {
    fn enable(&self, rs: &mut RenderState) -> Result<()> {
        rs.buffer(self.target).push(self.buffer)
    }

    fn disable(&self, rs: &mut RenderState) -> Result<()> {
        rs.buffer(self.target).pop()
    }
}

/// Common ways of combining a fragment with the framebuffer content.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BlendMode {
    /// c = c1
    Src,
    /// c = c1 * c1.a
    SrcAlpha,
    /// c = c0 * (1 - c1.a) + c1 * c1.a
    Alpha,
    /// c = c0 * (1 - c0.a) + c1 * c0.a
    BackToFront,
    /// c = c0 * c1
    Multiply,
    /// c = c0 + c1
    Add,
    /// c = 0.5 * c0 + 0.5 * c1
    SmoothAdd,
    /// c = c0 - c1
    Subtract,
    /// c = c1 - c0
    ReverseSubtract,
    /// c = max(c0, c1)
    Lighten,
    /// c = min(c0, c1)
    Darken,
    /// c = c0 - c1 * (1 - c0)
    Screen,
}

impl FromStr for BlendMode {
    type Err = ::failure::Error;

    fn from_str(s: &str) -> ::std::result::Result<Self, Self::Err> {
        let mode = match s.to_lowercase().as_str() {
            "src" => BlendMode::Src,
            "src_alpha" => BlendMode::SrcAlpha,
            "alpha" | "front_to_back" => BlendMode::Alpha,
            "dst_alpha" | "back_to_front" => BlendMode::BackToFront,
            "mul" | "multiply" => BlendMode::Multiply,
            "add" => BlendMode::Add,
            "smooth_add" | "average" => BlendMode::SmoothAdd,
            "sub" | "subtract" => BlendMode::Subtract,
            "reverse_sub" => BlendMode::ReverseSubtract,
            "lighten" => BlendMode::Lighten,
            "darken" => BlendMode::Darken,
            "screen" => BlendMode::Screen,
            _ => bail!("Unknown blend mode '{}'.", s),
        };

        Ok(mode)
    }
}

impl BlendMode {
    fn setup(self) -> (Equation, BlendFunc, Option<[f32; 4]>) {
        use crate::video::types::BlendFactor::*;
        use crate::video::types::BlendValue::*;

        let func = |src, dst| BlendFunc::new(src, dst);
        match self {
            BlendMode::Src => (Equation::Add, func(One, Zero), None),
            BlendMode::SrcAlpha => (Equation::Add, func(Value(SourceAlpha), Zero), None),
            BlendMode::Alpha => (
                Equation::Add,
                func(Value(SourceAlpha), OneMinusValue(SourceAlpha)),
                None,
            ),
            BlendMode::BackToFront => (
                Equation::Add,
                func(OneMinusValue(DestinationAlpha), Value(DestinationAlpha)),
                None,
            ),
            BlendMode::Multiply => (Equation::Add, func(Value(DestinationColor), Zero), None),
            BlendMode::Add => (Equation::Add, func(One, One), None),
            BlendMode::SmoothAdd => (
                Equation::Add,
                BlendFunc {
                    src_color: Value(ConstantAlpha),
                    dst_color: Value(ConstantAlpha),
                    src_alpha: One,
                    dst_alpha: One,
                },
                Some([0.5; 4]),
            ),
            BlendMode::Subtract => (Equation::Subtract, func(One, One), None),
            BlendMode::ReverseSubtract => (Equation::ReverseSubtract, func(One, One), None),
            BlendMode::Lighten => (Equation::Max, func(One, One), None),
            BlendMode::Darken => (Equation::Min, func(One, One), None),
            BlendMode::Screen => (
                Equation::Subtract,
                func(OneMinusValue(DestinationColor), One),
                None,
            ),
        }
    }
}

/// Enables blending with the factors and equation of `mode`.
pub fn blend_state(mode: BlendMode) -> Rc<State> {
    let (equation, func, color) = mode.setup();

    let state = State::new(format!("blend.{:?}", mode));
    state.join_states(&State::with_effect(
        "blend.toggle",
        ToggleState::new(Toggle::Blend, true),
    ));
    state.join_states(&State::with_effect("blend.func", BlendFuncState(func)));
    state.join_states(&State::with_effect(
        "blend.equation",
        BlendEquationState(BlendEquation {
            color: equation,
            alpha: equation,
        }),
    ));

    if let Some(color) = color {
        state.join_states(&State::with_effect("blend.color", BlendColorState(color)));
    }

    state
}

/// Enables the depth test with `func`, and toggles depth writes.
pub fn depth_state(func: Comparison, write: bool) -> Rc<State> {
    let state = State::new("depth");
    state.join_states(&State::with_effect(
        "depth.toggle",
        ToggleState::new(Toggle::DepthTest, true),
    ));
    state.join_states(&State::with_effect("depth.func", DepthFuncState(func)));
    state.join_states(&State::with_effect("depth.mask", DepthMaskState(write)));
    state
}

/// Enables face culling of `face`, with front faces wound as `order`.
pub fn cull_state(face: CullFace, order: FrontFaceOrder) -> Rc<State> {
    let state = State::new("cull");
    state.join_states(&State::with_effect(
        "cull.toggle",
        ToggleState::new(Toggle::CullFace, true),
    ));
    state.join_states(&State::with_effect("cull.face", CullFaceState(face)));
    state.join_states(&State::with_effect("cull.order", FrontFaceState(order)));
    state
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::settings::RenderParams;

    #[test]
    fn blend_modes() {
        assert_eq!("Average".parse::<BlendMode>().unwrap(), BlendMode::SmoothAdd);
        assert!("bogus".parse::<BlendMode>().is_err());

        let (mut rs, probe) = RenderState::headless(&RenderParams::default()).unwrap();
        let before = probe.snapshot();

        let blend = blend_state(BlendMode::SmoothAdd);
        blend.activate(&mut rs).unwrap();

        let snapshot = probe.snapshot();
        assert_eq!(snapshot.toggles[&Toggle::Blend], true);
        assert_eq!(snapshot.blend_color, [0.5; 4]);
        assert_eq!(snapshot.blend_func.src_alpha, BlendFactor::One);

        blend.deactivate(&mut rs).unwrap();
        assert_eq!(probe.snapshot(), before);
    }

    #[test]
    fn depth_and_cull() {
        let (mut rs, probe) = RenderState::headless(&RenderParams::default()).unwrap();
        let before = probe.snapshot();

        let depth = depth_state(Comparison::LessOrEqual, false);
        let cull = cull_state(CullFace::Front, FrontFaceOrder::Clockwise);
        depth.join_states(&cull);

        depth.activate(&mut rs).unwrap();
        let snapshot = probe.snapshot();
        assert_eq!(snapshot.depth_func, Comparison::LessOrEqual);
        assert!(!snapshot.depth_mask);
        assert_eq!(snapshot.cull_face, CullFace::Front);
        assert_eq!(snapshot.front_face, FrontFaceOrder::Clockwise);

        depth.deactivate(&mut rs).unwrap();
        assert_eq!(probe.snapshot(), before);
    }
}
