extern crate strata;

use std::rc::Rc;

use strata::prelude::*;

/// Puts a perspective camera into the enclosing state.
struct CameraProcessor;

impl StateProcessor for CameraProcessor {
    fn category(&self) -> &str {
        "camera"
    }

    fn process(&self, _: &ProcessorRegistry, input: &SceneInput, parent: &Rc<State>) -> Result<()> {
        let fov = input.get_f32("fov", 60.0)?;
        let projection = Projection::perspective(
            Deg(fov),
            input.get_f32("aspect", 1.0)?,
            input.get_f32("near", 0.1)?,
            input.get_f32("far", 100.0)?,
        )?;

        let mut camera = Camera::new(input.name.clone(), projection)?;
        let eye = input.get_vec3("position", Vector3::new(0.0, 0.0, 5.0))?;
        camera.look_at(
            Point3::new(eye.x, eye.y, eye.z),
            Point3::new(0.0, 0.0, 0.0),
            Vector3::unit_y(),
        )?;

        parent.join_states(camera.state());
        Ok(())
    }
}

const SCENE: &str = r#"{
    "category": "scene", "name": "root",
    "children": [
        { "category": "camera", "name": "main", "attributes": { "fov": "45", "far": "50" } },
        { "category": "node", "name": "transparent",
          "children": [
            { "category": "blend", "attributes": { "mode": "Alpha" } },
            { "category": "cull", "attributes": { "face": "Front" } },
            { "category": "node", "name": "particles", "attributes": { "iterations": "3" } }
          ] }
    ]
}"#;

#[test]
fn custom_processors() {
    let mut registry = ProcessorRegistry::with_defaults();
    assert!(!registry.has_processor("camera"));
    registry.add_state_processor(CameraProcessor);
    assert!(registry.has_processor("camera"));

    let root = registry.load(&SceneInput::from_json(SCENE).unwrap()).unwrap();
    assert!(root.state().find_shader_input("viewMatrix").is_some());
    assert!(root.state().find_shader_input("far").is_some());

    let particles = root.find_node_with_name("particles").unwrap();
    assert_eq!(particles.iterations(), 3);

    let mut cfg = StateConfig::new();
    particles.configure_shader(&mut cfg);
    assert_eq!(cfg.define_value("HAS_projectionMatrix"), Some("TRUE"));
}

#[test]
fn loaded_scene_restores_the_context() {
    let mut registry = ProcessorRegistry::with_defaults();
    registry.add_state_processor(CameraProcessor);
    let root = registry.load(&SceneInput::from_json(SCENE).unwrap()).unwrap();

    let (mut rs, probe) = RenderState::headless(&RenderParams::default()).unwrap();
    let initial = probe.snapshot();

    root.traverse(&mut rs).unwrap();
    assert!(probe.calls().contains(&"set_toggle(Blend, true)".to_owned()));
    assert!(probe.calls().contains(&"set_cull_face(Front)".to_owned()));
    assert_eq!(probe.snapshot(), initial);
}

#[test]
fn invalid_camera_is_reported() {
    let mut registry = ProcessorRegistry::with_defaults();
    registry.add_state_processor(CameraProcessor);

    let input = SceneInput::new("scene", "root").with_child(
        SceneInput::new("camera", "broken")
            .with_attribute("near", 10)
            .with_attribute("far", 1),
    );

    let err = registry.load(&input).err().unwrap();
    match err.downcast_ref::<Error>() {
        Some(Error::InvalidFrustum { near, far }) => {
            assert_eq!(*near, 10.0);
            assert_eq!(*far, 1.0);
        }
        _ => panic!("unexpected error {}", err),
    }
}

#[test]
fn settings_from_json() {
    let settings = Settings::from_json(
        r#"{ "animation": { "synchronization": "Lockstep", "step_interval_ms": 20 } }"#,
    )
    .unwrap();

    assert_eq!(settings.animation.synchronization, Synchronization::Lockstep);
    assert_eq!(settings.animation.step_interval().as_millis(), 20);
    assert_eq!(settings.animation.idle_sleep_ms, AnimationParams::default().idle_sleep_ms);
    assert_eq!(settings.render, RenderParams::default());
    assert!(Settings::from_json("{ \"render\": 3 }").is_err());
}

#[test]
fn math_comes_with_the_prelude() {
    use strata::prelude::cgmath::SquareMatrix;

    let m: Matrix4<f32> = Matrix4::identity();
    assert_eq!(m, strata::cgmath::Matrix4::identity());
    assert_eq!(m * Vector3::new(1.0, 2.0, 3.0).extend(1.0), Vector3::new(1.0, 2.0, 3.0).extend(1.0));
}
