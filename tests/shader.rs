extern crate byteorder;
extern crate env_logger;
extern crate strata;

use std::rc::Rc;

use byteorder::{ByteOrder, NativeEndian};
use strata::prelude::*;

const MESH: &str = "
-- vs
uniform float u_scale;
uniform vec3 u_tint;
in vec3 in_pos;
out vec3 vs_pos;
void main() {
    vs_pos = in_pos * u_tint;
    gl_Position = vec4(in_pos * u_scale, 1.0);
}

-- fs
in vec3 vs_pos;
out vec4 color;
void main() {
#ifdef HAS_tint
    color = vec4(vs_pos, 1.0);
#else
    color = vec4(1.0);
#endif
}
";

fn scene() -> (Rc<StateNode>, Rc<ShaderState>, Rc<StateNode>) {
    let root = StateNode::empty("root");
    root.state()
        .join_shader_input(ShaderInput::uniform("scale", 1.0f32), None);
    root.state()
        .join_shader_input(ShaderInput::uniform("tint", [1.0f32, 0.5, 0.25]), None);

    let shader = Rc::new(ShaderState::new());
    let node = StateNode::new(State::with_effect("mesh", shader.clone()));
    root.add_child(&node).unwrap();
    (root, shader, node)
}

#[test]
fn uploads_follow_stamps() {
    let _ = env_logger::try_init();
    let (mut rs, probe) = RenderState::headless(&RenderParams::default()).unwrap();
    let mut includer = Includer::new();
    includer.add_source("mesh", MESH);

    let (root, shader, node) = scene();
    let cfg = StateConfig::from_node(&node);
    assert!(shader.create_shader(&mut rs, &mut includer, &cfg, "mesh").unwrap());

    probe.clear_uploads();
    root.traverse(&mut rs).unwrap();
    assert_eq!(probe.uploads().len(), 2);

    probe.clear_uploads();
    root.traverse(&mut rs).unwrap();
    assert!(probe.uploads().is_empty());

    let scale = root.state().find_shader_input("scale").unwrap();
    scale.set(4.0f32).unwrap();
    root.traverse(&mut rs).unwrap();

    let uploads = probe.uploads();
    assert_eq!(uploads.len(), 1);
    assert_eq!(NativeEndian::read_f32(&uploads[0].1), 4.0);
}

#[test]
fn program_is_bound_while_enabled() {
    let (mut rs, probe) = RenderState::headless(&RenderParams::default()).unwrap();
    let mut includer = Includer::new();
    includer.add_source("mesh", MESH);

    let (root, shader, node) = scene();
    let cfg = StateConfig::from_node(&node);
    shader.create_shader(&mut rs, &mut includer, &cfg, "mesh").unwrap();
    let program = shader.program().unwrap();

    probe.clear_calls();
    root.traverse(&mut rs).unwrap();
    let binds: Vec<_> = probe
        .calls()
        .into_iter()
        .filter(|v| v.starts_with("use_program"))
        .collect();

    assert_eq!(binds, vec![format!("use_program({})", program), "use_program(0)".to_owned()]);
    assert!(probe.calls().iter().any(|v| v.starts_with("upload_uniform")));
    assert_eq!(*rs.program().top(), 0);
}

#[test]
fn compile_failure_is_isolated() {
    let _ = env_logger::try_init();
    let (mut rs, probe) = RenderState::headless(&RenderParams::default()).unwrap();
    let mut includer = Includer::new();
    includer.add_source("mesh", MESH);

    let (_, broken, node) = scene();
    let (_, working, other) = scene();

    probe.fail_compile(Stage::Fragment);
    let cfg = StateConfig::from_node(&node);
    assert!(!broken.create_shader(&mut rs, &mut includer, &cfg, "mesh").unwrap());
    assert!(!broken.has_shader());
    assert_eq!(probe.live_programs(), 0);
    assert_eq!(probe.live_stages(), 0);

    let (mut rs, probe) = RenderState::headless(&RenderParams::default()).unwrap();
    let cfg = StateConfig::from_node(&other);
    assert!(working.create_shader(&mut rs, &mut includer, &cfg, "mesh").unwrap());
    assert!(probe.is_linked(working.program().unwrap()));

    working.release(&mut rs).unwrap();
    assert_eq!(probe.live_programs(), 0);
}

#[test]
fn missing_vertex_stage() {
    let (mut rs, _) = RenderState::headless(&RenderParams::default()).unwrap();
    let mut includer = Includer::new();
    includer.add_source("post", "-- fs\nout vec4 c;\nvoid main() { c = vec4(0.0); }\n");

    let shader = ShaderState::new();
    let err = shader
        .create_shader(&mut rs, &mut includer, &StateConfig::new(), "post")
        .unwrap_err();

    match err.downcast_ref::<Error>() {
        Some(Error::MissingStage { stage, .. }) => assert_eq!(*stage, Stage::Vertex),
        _ => panic!("unexpected error {}", err),
    }
}

#[test]
fn defines_reach_the_source() {
    let (mut rs, _) = RenderState::headless(&RenderParams::default()).unwrap();
    let mut includer = Includer::new();
    includer.add_source("mesh", MESH);

    let (_, shader, node) = scene();
    let cfg = StateConfig::from_node(&node);
    assert_eq!(cfg.define_value("HAS_tint"), Some("TRUE"));

    shader.create_shader(&mut rs, &mut includer, &cfg, "mesh").unwrap();
    let fragment = shader
        .with_shader(|v| v.sources()[&Stage::Fragment].clone())
        .unwrap();

    assert!(fragment.starts_with("#version "));
    assert!(fragment.contains("color = vec4(vs_pos, 1.0);"));
    assert!(!fragment.contains("color = vec4(1.0);"));
}

const TEXTURED: &str = "
-- vs
in vec3 in_pos;
void main() { gl_Position = vec4(in_pos, 1.0); }

-- fs
uniform sampler2D in_diffuse;
out vec4 color;
void main() { color = texture(in_diffuse, vec2(0.0)); }
";

fn sampler_uploads(probe: &HeadlessProbe, location: i32) -> Vec<i32> {
    probe
        .uploads()
        .into_iter()
        .filter(|v| v.0 == location)
        .map(|v| NativeEndian::read_i32(&v.1))
        .collect()
}

#[test]
fn texture_joined_to_the_shader_state() {
    let (mut rs, probe) = RenderState::headless(&RenderParams::default()).unwrap();
    let mut includer = Includer::new();
    includer.add_source("textured", TEXTURED);

    let shader = Rc::new(ShaderState::new());
    let diffuse = Rc::new(TextureState::new("diffuse", TextureTarget::Texture2D, 5));
    let state = State::with_effect("textured", shader.clone());
    state.join_states(&State::with_effect("diffuse", diffuse.clone()));

    let root = StateNode::empty("root");
    let node = StateNode::new(state);
    root.add_child(&node).unwrap();

    let cfg = StateConfig::from_node(&node);
    assert!(shader.create_shader(&mut rs, &mut includer, &cfg, "textured").unwrap());
    let location = shader
        .with_shader(|v| v.sampler_location("diffuse"))
        .unwrap()
        .unwrap();

    probe.clear_uploads();
    for _ in 0..3 {
        root.traverse(&mut rs).unwrap();
    }

    assert_eq!(sampler_uploads(&probe, location), vec![0]);
    assert_eq!(diffuse.channel(), None);
    assert_eq!(rs.texture_channels(), 0);
}

#[test]
fn texture_in_the_parent_node() {
    let (mut rs, probe) = RenderState::headless(&RenderParams::default()).unwrap();
    let mut includer = Includer::new();
    includer.add_source("textured", TEXTURED);

    let diffuse = TextureState::new("diffuse", TextureTarget::Texture2D, 5);
    let root = StateNode::new(State::with_effect("diffuse", diffuse));
    let shader = Rc::new(ShaderState::new());
    let node = StateNode::new(State::with_effect("textured", shader.clone()));
    root.add_child(&node).unwrap();

    let cfg = StateConfig::from_node(&node);
    assert!(shader.create_shader(&mut rs, &mut includer, &cfg, "textured").unwrap());
    let location = shader
        .with_shader(|v| v.sampler_location("diffuse"))
        .unwrap()
        .unwrap();

    probe.clear_uploads();
    for _ in 0..3 {
        root.traverse(&mut rs).unwrap();
    }

    assert_eq!(sampler_uploads(&probe, location), vec![0]);
}
