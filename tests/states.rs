extern crate strata;

use std::cell::RefCell;
use std::rc::Rc;

use strata::prelude::*;

type Log = Rc<RefCell<Vec<String>>>;

struct Tracer {
    name: &'static str,
    log: Log,
}

impl StateEffect for Tracer {
    fn enable(&self, _: &mut RenderState) -> Result<()> {
        self.log.borrow_mut().push(format!("enable {}", self.name));
        Ok(())
    }

    fn disable(&self, _: &mut RenderState) -> Result<()> {
        self.log.borrow_mut().push(format!("disable {}", self.name));
        Ok(())
    }
}

fn tracer(name: &'static str, log: &Log) -> Rc<State> {
    State::with_effect(
        name,
        Tracer {
            name,
            log: log.clone(),
        },
    )
}

#[test]
fn joined_states_unwind_in_reverse() {
    let (mut rs, _) = RenderState::headless(&RenderParams::default()).unwrap();
    let log = Log::default();

    let a = tracer("A", &log);
    a.join_states(&tracer("B", &log));
    a.join_states(&tracer("C", &log));

    a.activate(&mut rs).unwrap();
    assert_eq!(*log.borrow(), vec!["enable A", "enable B", "enable C"]);

    log.borrow_mut().clear();
    a.deactivate(&mut rs).unwrap();
    assert_eq!(*log.borrow(), vec!["disable C", "disable B", "disable A"]);
}

#[test]
fn traversal_order() {
    let (mut rs, _) = RenderState::headless(&RenderParams::default()).unwrap();
    let log = Log::default();

    let root = StateNode::new(tracer("root", &log));
    let first = StateNode::new(tracer("first", &log));
    let second = StateNode::new(tracer("second", &log));
    root.add_child(&first).unwrap();
    root.add_child(&second).unwrap();

    second.set_iterations(2);
    root.traverse(&mut rs).unwrap();

    assert_eq!(
        *log.borrow(),
        vec![
            "enable root",
            "enable first",
            "disable first",
            "enable second",
            "disable second",
            "enable second",
            "disable second",
            "disable root",
        ]
    );

    log.borrow_mut().clear();
    first.set_hidden(true);
    rs.hide_state(second.state().id());
    root.traverse(&mut rs).unwrap();
    assert_eq!(*log.borrow(), vec!["enable root", "disable root"]);
}

#[test]
fn closest_define_wins() {
    let root = StateNode::empty("root");
    let mid = StateNode::empty("mid");
    let leaf = StateNode::empty("leaf");
    root.add_child(&mid).unwrap();
    mid.add_child(&leaf).unwrap();

    root.state().shader_define("FOO", 1);
    root.state().shader_define("BAR", "x");
    leaf.state().shader_define("FOO", 2);

    let mut cfg = StateConfig::new();
    leaf.configure_shader(&mut cfg);
    assert_eq!(cfg.define_value("FOO"), Some("2"));
    assert_eq!(cfg.define_value("BAR"), Some("x"));

    let mut cfg = StateConfig::new();
    mid.configure_shader(&mut cfg);
    assert_eq!(cfg.define_value("FOO"), Some("1"));
}

#[test]
fn failed_enable_leaves_context_untouched() {
    struct Broken;

    impl StateEffect for Broken {
        fn enable(&self, _: &mut RenderState) -> Result<()> {
            Err(Error::Backend("broken".into()).into())
        }
    }

    let (mut rs, probe) = RenderState::headless(&RenderParams::default()).unwrap();
    let initial = probe.snapshot();

    let root = StateNode::new(depth_state(Comparison::Greater, false));
    let leaf = StateNode::new(State::with_effect("broken", Broken));
    root.add_child(&leaf).unwrap();

    assert!(root.traverse(&mut rs).is_err());
    assert_eq!(probe.snapshot(), initial);
    assert!(!rs.is_active(root.state().id()));
}
