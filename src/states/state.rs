use std::cell::RefCell;
use std::collections::BTreeMap;
use std::fmt;
use std::mem;
use std::rc::Rc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use crate::errors::*;
use crate::shader::config::StateConfig;
use crate::shader::input::{NamedInput, ShaderInput};
use crate::video::RenderState;

/// The GLSL version a state asks for unless told otherwise.
pub const DEFAULT_SHADER_VERSION: u32 = 130;

static NEXT_STATE_ID: AtomicUsize = AtomicUsize::new(1);

/// Process-unique identity of a `State`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct StateId(usize);

impl StateId {
    fn next() -> Self {
        StateId(NEXT_STATE_ID.fetch_add(1, Ordering::Relaxed))
    }

    #[inline]
    pub fn value(self) -> usize {
        self.0
    }
}

impl fmt::Display for StateId {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// The behavior a leaf state contributes.
///
/// `enable` and `disable` perform exactly one GL effect and undo it. They are
/// always called in LIFO pairs by the traversal, so `disable` may rely on the
/// matching `enable` having succeeded. `configure` adds the shader-facing side
/// of the effect (defines, textures, feedback setup) to a `StateConfig`.
pub trait StateEffect {
    fn enable(&self, _: &mut RenderState) -> Result<()> {
        Ok(())
    }

    fn disable(&self, _: &mut RenderState) -> Result<()> {
        Ok(())
    }

    /// Called once the joined states of a nested state are enabled, e.g. to
    /// pick up texture channels reserved by them.
    fn joined_enabled(&self, _: &mut RenderState) -> Result<()> {
        Ok(())
    }

    fn configure(&self, _: &State, _: &mut StateConfig) {}
}

impl<E: StateEffect + ?Sized> StateEffect for Rc<E> {
    #[inline]
    fn enable(&self, rs: &mut RenderState) -> Result<()> {
        (**self).enable(rs)
    }

    #[inline]
    fn disable(&self, rs: &mut RenderState) -> Result<()> {
        (**self).disable(rs)
    }

    #[inline]
    fn joined_enabled(&self, rs: &mut RenderState) -> Result<()> {
        (**self).joined_enabled(rs)
    }

    #[inline]
    fn configure(&self, state: &State, cfg: &mut StateConfig) {
        (**self).configure(state, cfg)
    }
}

/// How a state drives its joined states.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Composition {
    /// Joined states are enabled in order after the state itself, and stay
    /// enabled until it is disabled.
    Nested,
    /// Every joined state is enabled and immediately disabled in turn, inside
    /// an optional global state. Nothing stays enabled afterwards.
    Sequence,
}

struct StateInner {
    joined: Vec<Rc<State>>,
    global: Option<Rc<State>>,
    defines: BTreeMap<String, String>,
    functions: BTreeMap<String, String>,
    inputs: Vec<NamedInput>,
    input_holder: Option<Rc<State>>,
    version: u32,
    hidden: bool,
    enabled: Vec<Rc<State>>,
}

/// A composable bundle of GL state changes and shader contributions.
///
/// A `State` owns an ordered list of joined states that are enabled after it
/// and disabled before it. States are shared with `Rc`, so the same state can
/// be joined into several parents. Enabling the same state twice within one
/// traversal is rejected with `Error::StateAlreadyEnabled`.
pub struct State {
    id: StateId,
    name: String,
    composition: Composition,
    effect: Option<Box<dyn StateEffect>>,
    inner: RefCell<StateInner>,
}

impl fmt::Debug for State {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        let inner = self.inner.borrow();
        f.debug_struct("State")
            .field("id", &self.id)
            .field("name", &self.name)
            .field("composition", &self.composition)
            .field("joined", &inner.joined.len())
            .field("hidden", &inner.hidden)
            .finish()
    }
}

impl State {
    fn build(name: String, composition: Composition, effect: Option<Box<dyn StateEffect>>) -> Self {
        State {
            id: StateId::next(),
            name,
            composition,
            effect,
            inner: RefCell::new(StateInner {
                joined: Vec::new(),
                global: None,
                defines: BTreeMap::new(),
                functions: BTreeMap::new(),
                inputs: Vec::new(),
                input_holder: None,
                version: DEFAULT_SHADER_VERSION,
                hidden: false,
                enabled: Vec::new(),
            }),
        }
    }

    /// Creates a state without GL effects of its own.
    pub fn new<T: Into<String>>(name: T) -> Rc<Self> {
        Rc::new(State::build(name.into(), Composition::Nested, None))
    }

    /// Creates a state performing `effect`. Pass an `Rc` to keep access to
    /// the effect afterwards.
    pub fn with_effect<T, E>(name: T, effect: E) -> Rc<Self>
    where
        T: Into<String>,
        E: StateEffect + 'static,
    {
        Rc::new(State::build(
            name.into(),
            Composition::Nested,
            Some(Box::new(effect)),
        ))
    }

    /// Creates a sequence. See `Composition::Sequence`.
    pub fn sequence<T: Into<String>>(name: T, global: Option<Rc<State>>) -> Rc<Self> {
        let state = State::build(name.into(), Composition::Sequence, None);
        state.inner.borrow_mut().global = global;
        Rc::new(state)
    }

    #[inline]
    pub fn id(&self) -> StateId {
        self.id
    }

    #[inline]
    pub fn name(&self) -> &str {
        &self.name
    }

    #[inline]
    pub fn composition(&self) -> Composition {
        self.composition
    }

    /// The global state of a sequence.
    pub fn global_state(&self) -> Option<Rc<State>> {
        self.inner.borrow().global.clone()
    }

    pub fn set_global_state(&self, global: Option<Rc<State>>) {
        self.inner.borrow_mut().global = global;
    }

    #[inline]
    pub fn is_hidden(&self) -> bool {
        self.inner.borrow().hidden
    }

    /// Hidden states are skipped by traversal and shader configuration.
    #[inline]
    pub fn set_hidden(&self, hidden: bool) {
        self.inner.borrow_mut().hidden = hidden;
    }
}

impl State {
    /// Appends `state` to the joined states.
    pub fn join_states(&self, state: &Rc<State>) {
        if self.can_join(state) {
            self.inner.borrow_mut().joined.push(state.clone());
        }
    }

    /// Prepends `state` to the joined states.
    pub fn join_states_front(&self, state: &Rc<State>) {
        if self.can_join(state) {
            self.inner.borrow_mut().joined.insert(0, state.clone());
        }
    }

    /// Removes `state` from the joined states. Does nothing if it is absent.
    pub fn disjoin_states(&self, state: &Rc<State>) {
        let mut inner = self.inner.borrow_mut();
        if let Some(pos) = inner.joined.iter().position(|v| Rc::ptr_eq(v, state)) {
            inner.joined.remove(pos);
        }
    }

    pub fn joined_states(&self) -> Vec<Rc<State>> {
        self.inner.borrow().joined.clone()
    }

    fn can_join(&self, state: &Rc<State>) -> bool {
        if state.id == self.id || state.contains(self.id) {
            warn!(
                "[State] Can not join `{}` into `{}`, it would form a cycle.",
                state.name, self.name
            );
            return false;
        }

        if self.inner.borrow().joined.iter().any(|v| Rc::ptr_eq(v, state)) {
            warn!(
                "[State] `{}` has been joined into `{}` already.",
                state.name, self.name
            );
            return false;
        }

        true
    }

    fn contains(&self, id: StateId) -> bool {
        let inner = self.inner.borrow();
        inner
            .joined
            .iter()
            .chain(inner.global.iter())
            .any(|v| v.id == id || v.contains(id))
    }
}

impl State {
    /// Declares `input` through an input holder joined at the front, so it is
    /// merged before anything else joined to this state.
    pub fn join_shader_input(&self, input: Arc<ShaderInput>, name: Option<&str>) {
        let holder = {
            let mut inner = self.inner.borrow_mut();
            match inner.input_holder {
                Some(ref holder) => holder.clone(),
                None => {
                    let holder = State::new(format!("{}.inputs", self.name));
                    inner.joined.insert(0, holder.clone());
                    inner.input_holder = Some(holder.clone());
                    holder
                }
            }
        };

        holder.declare_input(input, name);
    }

    /// Removes `input` from the input holder.
    pub fn disjoin_shader_input(&self, input: &Arc<ShaderInput>) {
        let holder = self.inner.borrow().input_holder.clone();
        if let Some(holder) = holder {
            holder
                .inner
                .borrow_mut()
                .inputs
                .retain(|v| !Arc::ptr_eq(&v.input, input));
        }
    }

    /// Declares `input` on this state itself. A declaration with the same
    /// name replaces the previous one.
    pub fn declare_input(&self, input: Arc<ShaderInput>, name: Option<&str>) {
        let named = NamedInput::new(input, name);
        let mut inner = self.inner.borrow_mut();
        match inner.inputs.iter().position(|v| v.name == named.name) {
            Some(pos) => inner.inputs[pos] = named,
            None => inner.inputs.push(named),
        }
    }

    /// Inputs declared on this state itself.
    pub fn shader_inputs(&self) -> Vec<NamedInput> {
        self.inner.borrow().inputs.clone()
    }

    /// Inputs of this state followed by those of the joined states.
    pub fn collect_shader_input(&self) -> Vec<NamedInput> {
        let mut out = Vec::new();
        self.collect_into(&mut out);
        out
    }

    fn collect_into(&self, out: &mut Vec<NamedInput>) {
        let inner = self.inner.borrow();
        out.extend(inner.inputs.iter().cloned());
        for v in &inner.joined {
            v.collect_into(out);
        }
    }

    /// Finds an input by declared or intrinsic name, searching this state
    /// first and the joined states front to back.
    pub fn find_shader_input(&self, name: &str) -> Option<Arc<ShaderInput>> {
        let inner = self.inner.borrow();
        inner
            .inputs
            .iter()
            .find(|v| v.name == name || v.input.name() == name)
            .map(|v| v.input.clone())
            .or_else(|| inner.joined.iter().find_map(|v| v.find_shader_input(name)))
    }

    /// Flags every reachable input as constant (or not).
    pub fn set_constant_uniforms(&self, constant: bool) {
        let inner = self.inner.borrow();
        for v in &inner.inputs {
            v.input.set_constant(constant);
        }

        for v in &inner.joined {
            v.set_constant_uniforms(constant);
        }
    }

    /// Adds a macro. `TRUE` and `FALSE` become plain `#define`/`#undef`.
    pub fn shader_define<N: Into<String>, V: ToString>(&self, name: N, value: V) {
        self.inner
            .borrow_mut()
            .defines
            .insert(name.into(), value.to_string());
    }

    pub fn shader_defines(&self) -> BTreeMap<String, String> {
        self.inner.borrow().defines.clone()
    }

    /// Adds a GLSL snippet that `#include <name>` resolves to.
    pub fn shader_function<N: Into<String>, V: Into<String>>(&self, name: N, code: V) {
        self.inner
            .borrow_mut()
            .functions
            .insert(name.into(), code.into());
    }

    pub fn shader_functions(&self) -> BTreeMap<String, String> {
        self.inner.borrow().functions.clone()
    }

    /// Raises the required GLSL version. Lower versions are ignored.
    pub fn set_shader_version(&self, version: u32) {
        let mut inner = self.inner.borrow_mut();
        inner.version = inner.version.max(version);
    }

    pub fn shader_version(&self) -> u32 {
        self.inner.borrow().version
    }

    /// Lets the effect add its shader-facing contribution.
    pub fn configure(&self, cfg: &mut StateConfig) {
        if let Some(ref effect) = self.effect {
            effect.configure(self, cfg);
        }
    }
}

impl State {
    /// Runs the effect of this state only. Joined states are not touched.
    pub fn enable(&self, rs: &mut RenderState) -> Result<()> {
        match self.effect {
            Some(ref effect) => effect.enable(rs),
            None => Ok(()),
        }
    }

    /// Undoes `enable`.
    pub fn disable(&self, rs: &mut RenderState) -> Result<()> {
        match self.effect {
            Some(ref effect) => effect.disable(rs),
            None => Ok(()),
        }
    }

    /// Enables this state and its joined states.
    ///
    /// If anything fails, whatever has been enabled so far is disabled again
    /// in reverse before the error is returned, leaving `rs` as it was.
    pub fn activate(&self, rs: &mut RenderState) -> Result<()> {
        if !rs.mark_active(self.id) {
            return Err(Error::StateAlreadyEnabled(self.name.clone()).into());
        }

        if let Err(err) = self.enable(rs) {
            rs.unmark_active(self.id);
            return Err(err);
        }

        let result = match self.composition {
            Composition::Nested => self
                .activate_joined(rs)
                .and_then(|_| self.finish_joined(rs)),
            Composition::Sequence => self.run_sequence(rs),
        };

        if let Err(err) = result {
            if let Err(v) = self.disable(rs) {
                warn!("[State] Failed to disable `{}` while unwinding. {}", self.name, v);
            }

            rs.unmark_active(self.id);
            return Err(err);
        }

        Ok(())
    }

    /// Disables what the matching `activate` enabled, in reverse order.
    ///
    /// Unwinding continues past failures so every stack stays balanced; the
    /// first error is returned.
    pub fn deactivate(&self, rs: &mut RenderState) -> Result<()> {
        let enabled = mem::replace(&mut self.inner.borrow_mut().enabled, Vec::new());

        let mut result = Ok(());
        for v in enabled.iter().rev() {
            if let Err(err) = v.deactivate(rs) {
                if result.is_ok() {
                    result = Err(err);
                }
            }
        }

        if let Err(err) = self.disable(rs) {
            if result.is_ok() {
                result = Err(err);
            }
        }

        rs.unmark_active(self.id);
        result
    }

    /// Activates this state, runs `func` and deactivates it again.
    pub fn scoped<F, R>(&self, rs: &mut RenderState, func: F) -> Result<R>
    where
        F: FnOnce(&mut RenderState) -> R,
    {
        self.activate(rs)?;
        let v = func(rs);
        self.deactivate(rs)?;
        Ok(v)
    }

    fn activate_joined(&self, rs: &mut RenderState) -> Result<()> {
        let joined = self.joined_states();
        let mut enabled = Vec::with_capacity(joined.len());

        for v in joined {
            if v.is_hidden() || rs.is_hidden(v.id) {
                continue;
            }

            if let Err(err) = v.activate(rs) {
                Self::unwind(&enabled, rs);
                return Err(err);
            }

            enabled.push(v);
        }

        self.inner.borrow_mut().enabled = enabled;
        Ok(())
    }

    fn finish_joined(&self, rs: &mut RenderState) -> Result<()> {
        let result = match self.effect {
            Some(ref effect) => effect.joined_enabled(rs),
            None => Ok(()),
        };

        if result.is_err() {
            let enabled = mem::replace(&mut self.inner.borrow_mut().enabled, Vec::new());
            Self::unwind(&enabled, rs);
        }

        result
    }

    fn run_sequence(&self, rs: &mut RenderState) -> Result<()> {
        let global = self.global_state().filter(|v| !v.is_hidden() && !rs.is_hidden(v.id));
        if let Some(ref global) = global {
            global.activate(rs)?;
        }

        let mut result = Ok(());
        for v in self.joined_states() {
            if v.is_hidden() || rs.is_hidden(v.id) {
                continue;
            }

            result = v.activate(rs).and_then(|_| v.deactivate(rs));
            if result.is_err() {
                break;
            }
        }

        if let Some(ref global) = global {
            let r = global.deactivate(rs);
            if result.is_ok() {
                result = r;
            }
        }

        result
    }

    fn unwind(enabled: &[Rc<State>], rs: &mut RenderState) {
        for v in enabled.iter().rev() {
            if let Err(err) = v.deactivate(rs) {
                warn!("[State] Failed to disable `{}` while unwinding. {}", v.name, err);
            }
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::settings::RenderParams;
    use std::cell::RefCell;

    struct Recorder {
        name: &'static str,
        log: Rc<RefCell<Vec<String>>>,
        fail: bool,
    }

    impl StateEffect for Recorder {
        fn enable(&self, _: &mut RenderState) -> Result<()> {
            if self.fail {
                bail!("{} failed.", self.name);
            }

            self.log.borrow_mut().push(format!("+{}", self.name));
            Ok(())
        }

        fn disable(&self, _: &mut RenderState) -> Result<()> {
            self.log.borrow_mut().push(format!("-{}", self.name));
            Ok(())
        }
    }

    fn recorder(name: &'static str, log: &Rc<RefCell<Vec<String>>>, fail: bool) -> Rc<State> {
        State::with_effect(
            name,
            Recorder {
                name,
                log: log.clone(),
                fail,
            },
        )
    }

    #[test]
    fn join() {
        let a = State::new("a");
        let b = State::new("b");
        let c = State::new("c");

        a.join_states(&b);
        a.join_states(&b);
        a.join_states_front(&c);
        a.join_states(&a);
        b.join_states(&a);

        let names: Vec<_> = a.joined_states().iter().map(|v| v.name().to_owned()).collect();
        assert_eq!(names, vec!["c", "b"]);
        assert!(b.joined_states().is_empty());

        a.disjoin_states(&c);
        a.disjoin_states(&c);
        assert_eq!(a.joined_states().len(), 1);
    }

    #[test]
    fn unwind_on_failure() {
        let (mut rs, _) = RenderState::headless(&RenderParams::default()).unwrap();
        let log = Rc::new(RefCell::new(Vec::new()));

        let a = recorder("a", &log, false);
        a.join_states(&recorder("b", &log, false));
        a.join_states(&recorder("c", &log, false));
        a.join_states(&recorder("d", &log, true));

        assert!(a.activate(&mut rs).is_err());
        assert_eq!(*log.borrow(), vec!["+a", "+b", "+c", "-c", "-b", "-a"]);
        assert!(!rs.is_active(a.id()));

        log.borrow_mut().clear();
        a.joined_states()[2].set_hidden(true);
        a.activate(&mut rs).unwrap();
        a.deactivate(&mut rs).unwrap();
        assert_eq!(*log.borrow(), vec!["+a", "+b", "+c", "-c", "-b", "-a"]);
    }

    #[test]
    fn double_enable() {
        let (mut rs, _) = RenderState::headless(&RenderParams::default()).unwrap();
        let shared = State::new("shared");
        let a = State::new("a");
        a.join_states(&shared);
        a.join_states(&State::new("b"));

        let root = State::new("root");
        root.join_states(&shared);
        root.join_states(&a);

        let err = root.activate(&mut rs).unwrap_err();
        match err.downcast_ref::<Error>() {
            Some(Error::StateAlreadyEnabled(name)) => assert_eq!(name, "shared"),
            _ => panic!("unexpected error {}", err),
        }

        assert!(!rs.is_active(shared.id()));
        assert!(!rs.is_active(root.id()));

        a.activate(&mut rs).unwrap();
        a.deactivate(&mut rs).unwrap();
        shared.activate(&mut rs).unwrap();
        shared.deactivate(&mut rs).unwrap();
    }

    #[test]
    fn sequence() {
        let (mut rs, _) = RenderState::headless(&RenderParams::default()).unwrap();
        let log = Rc::new(RefCell::new(Vec::new()));

        let seq = State::sequence("seq", Some(recorder("g", &log, false)));
        seq.join_states(&recorder("x", &log, false));
        seq.join_states(&recorder("y", &log, false));

        seq.activate(&mut rs).unwrap();
        seq.deactivate(&mut rs).unwrap();
        assert_eq!(*log.borrow(), vec!["+g", "+x", "-x", "+y", "-y", "-g"]);
    }

    #[test]
    fn inputs() {
        let s = State::new("s");
        let child = State::new("child");
        s.join_states(&child);

        child.declare_input(ShaderInput::uniform("lightColor", 1.0f32), None);
        s.join_shader_input(ShaderInput::uniform("time", 0.0f32), Some("frameTime"));
        s.join_shader_input(ShaderInput::uniform("scale", 2.0f32), None);

        assert_eq!(s.joined_states().len(), 2);
        assert_eq!(s.joined_states()[0].name(), "s.inputs");

        let names: Vec<_> = s.collect_shader_input().into_iter().map(|v| v.name).collect();
        assert_eq!(names, vec!["frameTime", "scale", "lightColor"]);

        assert!(s.find_shader_input("frameTime").is_some());
        assert!(s.find_shader_input("time").is_some());
        assert!(s.find_shader_input("lightColor").is_some());
        assert!(s.find_shader_input("missing").is_none());

        let scale = s.find_shader_input("scale").unwrap();
        s.disjoin_shader_input(&scale);
        assert!(s.find_shader_input("scale").is_none());

        s.set_constant_uniforms(true);
        assert!(s.find_shader_input("lightColor").unwrap().is_constant());
    }

    #[test]
    fn version() {
        let s = State::new("s");
        assert_eq!(s.shader_version(), DEFAULT_SHADER_VERSION);
        s.set_shader_version(400);
        s.set_shader_version(330);
        assert_eq!(s.shader_version(), 400);
    }
}
