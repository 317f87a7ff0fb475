extern crate rand;
extern crate strata;

use rand::Rng;
use strata::prelude::*;

const FUNCS: [Comparison; 8] = [
    Comparison::Never,
    Comparison::Less,
    Comparison::LessOrEqual,
    Comparison::Greater,
    Comparison::GreaterOrEqual,
    Comparison::Equal,
    Comparison::NotEqual,
    Comparison::Always,
];

#[test]
fn restore_previous_values() {
    let (mut rs, probe) = RenderState::headless(&RenderParams::default()).unwrap();
    let initial = *rs.depth_func().top();

    rs.depth_func().push(Comparison::LessOrEqual).unwrap();
    rs.depth_func().push(Comparison::Always).unwrap();
    assert_eq!(probe.snapshot().depth_func, Comparison::Always);

    rs.depth_func().pop().unwrap();
    assert_eq!(*rs.depth_func().top(), Comparison::LessOrEqual);
    assert_eq!(probe.snapshot().depth_func, Comparison::LessOrEqual);

    rs.depth_func().pop().unwrap();
    assert_eq!(*rs.depth_func().top(), initial);
    assert_eq!(probe.snapshot().depth_func, initial);
}

#[test]
fn redundant_pushes_are_filtered() {
    let (mut rs, probe) = RenderState::headless(&RenderParams::default()).unwrap();

    rs.depth_func().push(Comparison::Less).unwrap();
    rs.toggle(Toggle::Blend).push(false).unwrap();
    assert!(probe.calls().is_empty());

    rs.toggle(Toggle::Blend).push(true).unwrap();
    rs.toggle(Toggle::Blend).push(true).unwrap();
    assert_eq!(probe.calls(), vec!["set_toggle(Blend, true)"]);

    rs.toggle(Toggle::Blend).pop().unwrap();
    rs.toggle(Toggle::Blend).pop().unwrap();
    rs.toggle(Toggle::Blend).pop().unwrap();
    rs.depth_func().pop().unwrap();
    assert_eq!(probe.calls().len(), 2);
}

#[test]
fn random_push_pop_is_symmetric() {
    let (mut rs, probe) = RenderState::headless(&RenderParams::default()).unwrap();
    let initial = probe.snapshot();
    let mut rng = rand::thread_rng();

    let mut expected = Vec::new();
    for _ in 0..1000 {
        if expected.is_empty() || rng.gen::<bool>() {
            let v = FUNCS[rng.gen_range(0, FUNCS.len())];
            rs.depth_func().push(v).unwrap();
            expected.push(v);
        } else {
            rs.depth_func().pop().unwrap();
            expected.pop();
        }

        let top = expected.last().cloned().unwrap_or(Comparison::Less);
        assert_eq!(*rs.depth_func().top(), top);
        assert_eq!(probe.snapshot().depth_func, top);
    }

    while !expected.is_empty() {
        rs.depth_func().pop().unwrap();
        expected.pop();
    }

    assert_eq!(probe.snapshot(), initial);
}

#[test]
fn locked_stacks_hold_values_back() {
    let (mut rs, probe) = RenderState::headless(&RenderParams::default()).unwrap();

    rs.cull_face().lock();
    rs.cull_face().push(CullFace::Front).unwrap();
    assert_eq!(probe.snapshot().cull_face, CullFace::Back);

    rs.cull_face().unlock().unwrap();
    assert_eq!(probe.snapshot().cull_face, CullFace::Front);

    rs.cull_face().pop().unwrap();
    assert_eq!(probe.snapshot().cull_face, CullFace::Back);
}

#[test]
#[should_panic]
fn pop_without_push() {
    let (mut rs, _) = RenderState::headless(&RenderParams::default()).unwrap();
    let _ = rs.viewport().pop();
}

#[test]
fn states_restore_the_context() {
    let (mut rs, probe) = RenderState::headless(&RenderParams::default()).unwrap();
    let initial = probe.snapshot();

    let root = StateNode::new(depth_state(Comparison::LessOrEqual, false));
    let blended = StateNode::new(blend_state(BlendMode::Alpha));
    let culled = StateNode::new(cull_state(CullFace::Front, FrontFaceOrder::Clockwise));
    root.add_child(&blended).unwrap();
    blended.add_child(&culled).unwrap();

    root.traverse(&mut rs).unwrap();
    assert_eq!(probe.snapshot(), initial);
    assert!(probe.calls().contains(&"set_depth_func(LessOrEqual)".to_owned()));
    assert!(probe.calls().contains(&"set_cull_face(Front)".to_owned()));
}

#[derive(Debug, Clone, Copy)]
enum Slot {
    Toggle(Toggle),
    Program,
    DepthFunc,
    DepthMask,
    DepthRange,
    CullFace,
    FrontFace,
    BlendFunc,
    BlendEquation,
    BlendColor,
    PolygonOffset,
    PolygonMode,
    PatchVertices,
    PatchLevels,
    Viewport,
    Scissor,
    ColorMask,
    ClearColor,
    LineWidth,
    PointSize,
    Framebuffer(FramebufferTarget),
    VertexArray,
    Buffer(BufferTarget),
    Texture(u32),
}

fn slots(rs: &RenderState) -> Vec<Slot> {
    let mut slots = vec![
        Slot::Program,
        Slot::DepthFunc,
        Slot::DepthMask,
        Slot::DepthRange,
        Slot::CullFace,
        Slot::FrontFace,
        Slot::BlendFunc,
        Slot::BlendEquation,
        Slot::BlendColor,
        Slot::PolygonOffset,
        Slot::PolygonMode,
        Slot::PatchVertices,
        Slot::PatchLevels,
        Slot::Viewport,
        Slot::Scissor,
        Slot::ColorMask,
        Slot::ClearColor,
        Slot::LineWidth,
        Slot::PointSize,
        Slot::Framebuffer(FramebufferTarget::Read),
        Slot::Framebuffer(FramebufferTarget::Draw),
        Slot::VertexArray,
    ];

    slots.extend(Toggle::ALL.iter().map(|&v| Slot::Toggle(v)));
    slots.extend(BufferTarget::ALL.iter().map(|&v| Slot::Buffer(v)));
    slots.extend((0..rs.max_texture_units()).map(Slot::Texture));
    slots
}

fn push_random<R: Rng>(rs: &mut RenderState, rng: &mut R, slot: Slot) {
    let n = rng.gen_range(0, 4u32);
    let f = n as f32;

    let result = match slot {
        Slot::Toggle(v) => rs.toggle(v).push(rng.gen()),
        Slot::Program => rs.program().push(n),
        Slot::DepthFunc => rs.depth_func().push(FUNCS[n as usize]),
        Slot::DepthMask => rs.depth_mask().push(rng.gen()),
        Slot::DepthRange => rs.depth_range().push(DepthRange { near: f * 0.1, far: 1.0 }),
        Slot::CullFace => rs.cull_face().push([CullFace::Front, CullFace::Back][n as usize % 2]),
        Slot::FrontFace => rs.front_face().push(if rng.gen() {
            FrontFaceOrder::Clockwise
        } else {
            FrontFaceOrder::CounterClockwise
        }),
        Slot::BlendFunc => rs.blend_func().push(BlendFunc::new(
            BlendFactor::Value(BlendValue::SourceAlpha),
            if rng.gen() { BlendFactor::One } else { BlendFactor::Zero },
        )),
        Slot::BlendEquation => rs.blend_equation().push(BlendEquation {
            color: [Equation::Add, Equation::Subtract, Equation::Min, Equation::Max][n as usize],
            alpha: Equation::Add,
        }),
        Slot::BlendColor => rs.blend_color().push([f, 0.0, 0.0, 1.0]),
        Slot::PolygonOffset => rs.polygon_offset().push(PolygonOffset { factor: f, units: 1.0 }),
        Slot::PolygonMode => {
            let modes = [PolygonMode::Point, PolygonMode::Line, PolygonMode::Fill];
            rs.polygon_mode().push(modes[n as usize % 3])
        }
        Slot::PatchVertices => rs.patch_vertices().push(n + 1),
        Slot::PatchLevels => rs.patch_levels().push(PatchLevels {
            inner: [f; 2],
            outer: [f; 4],
        }),
        Slot::Viewport => rs.viewport().push(Rect::new(0, 0, n * 64, n * 32)),
        Slot::Scissor => rs.scissor().push(Rect::new(n as i32, 0, 16, 16)),
        Slot::ColorMask => rs.color_mask().push(ColorMask {
            red: rng.gen(),
            green: rng.gen(),
            blue: rng.gen(),
            alpha: rng.gen(),
        }),
        Slot::ClearColor => rs.clear_color().push([0.0, f, 0.0, 1.0]),
        Slot::LineWidth => rs.line_width().push(f + 1.0),
        Slot::PointSize => rs.point_size().push(f + 1.0),
        Slot::Framebuffer(v) => rs.framebuffer(v).push(n),
        Slot::VertexArray => rs.vertex_array().push(n),
        Slot::Buffer(v) => rs.buffer(v).push(n),
        Slot::Texture(unit) => rs.texture(unit).push(TextureBind {
            target: TextureTarget::Texture2D,
            texture: n,
        }),
    };

    result.unwrap();
}

fn pop(rs: &mut RenderState, slot: Slot) {
    let result = match slot {
        Slot::Toggle(v) => rs.toggle(v).pop(),
        Slot::Program => rs.program().pop(),
        Slot::DepthFunc => rs.depth_func().pop(),
        Slot::DepthMask => rs.depth_mask().pop(),
        Slot::DepthRange => rs.depth_range().pop(),
        Slot::CullFace => rs.cull_face().pop(),
        Slot::FrontFace => rs.front_face().pop(),
        Slot::BlendFunc => rs.blend_func().pop(),
        Slot::BlendEquation => rs.blend_equation().pop(),
        Slot::BlendColor => rs.blend_color().pop(),
        Slot::PolygonOffset => rs.polygon_offset().pop(),
        Slot::PolygonMode => rs.polygon_mode().pop(),
        Slot::PatchVertices => rs.patch_vertices().pop(),
        Slot::PatchLevels => rs.patch_levels().pop(),
        Slot::Viewport => rs.viewport().pop(),
        Slot::Scissor => rs.scissor().pop(),
        Slot::ColorMask => rs.color_mask().pop(),
        Slot::ClearColor => rs.clear_color().pop(),
        Slot::LineWidth => rs.line_width().pop(),
        Slot::PointSize => rs.point_size().pop(),
        Slot::Framebuffer(v) => rs.framebuffer(v).pop(),
        Slot::VertexArray => rs.vertex_array().pop(),
        Slot::Buffer(v) => rs.buffer(v).pop(),
        Slot::Texture(unit) => rs.texture(unit).pop(),
    };

    result.unwrap();
}

#[test]
fn every_category_is_symmetric() {
    let params = RenderParams {
        max_texture_units: 4,
        ..RenderParams::default()
    };

    let (mut rs, probe) = RenderState::headless(&params).unwrap();
    let initial = probe.snapshot();
    let slots = slots(&rs);
    let mut depths = vec![0; slots.len()];
    let mut rng = rand::thread_rng();

    for _ in 0..5000 {
        let i = rng.gen_range(0, slots.len());
        if depths[i] == 0 || rng.gen::<bool>() {
            push_random(&mut rs, &mut rng, slots[i]);
            depths[i] += 1;
        } else {
            pop(&mut rs, slots[i]);
            depths[i] -= 1;
        }
    }

    for (i, depth) in depths.iter().enumerate() {
        for _ in 0..*depth {
            pop(&mut rs, slots[i]);
        }
    }

    assert_eq!(probe.snapshot(), initial);
}

#[test]
fn zero_texture_units_still_has_one() {
    let params = RenderParams {
        max_texture_units: 0,
        ..RenderParams::default()
    };

    let (mut rs, probe) = RenderState::headless(&params).unwrap();
    assert_eq!(rs.max_texture_units(), 1);

    let bind = TextureBind {
        target: TextureTarget::Texture2D,
        texture: 3,
    };

    let channel = rs.reserve_texture_channel();
    assert_eq!(channel, 0);
    rs.texture(channel).push(bind).unwrap();
    assert_eq!(probe.snapshot().textures[&0], bind);

    rs.texture(channel).pop().unwrap();
    rs.release_texture_channel();
    assert_eq!(rs.texture_channels(), 0);
}
