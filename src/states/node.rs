use std::cell::{Cell, RefCell};
use std::rc::{Rc, Weak};

use crate::errors::*;
use crate::shader::config::StateConfig;
use crate::video::RenderState;

use super::state::State;

/// A node of the scene tree, wrapping exactly one `State`.
///
/// Nodes hold strong references to their children and a weak one to their
/// parent, so a node has at most one parent while the wrapped states may be
/// shared freely.
pub struct StateNode {
    name: RefCell<String>,
    state: Rc<State>,
    parent: RefCell<Weak<StateNode>>,
    children: RefCell<Vec<Rc<StateNode>>>,
    hidden: Cell<bool>,
    iterations: Cell<u32>,
}

impl StateNode {
    pub fn new(state: Rc<State>) -> Rc<Self> {
        let name = state.name().to_owned();
        StateNode::with_name(name, state)
    }

    pub fn with_name<T: Into<String>>(name: T, state: Rc<State>) -> Rc<Self> {
        Rc::new(StateNode {
            name: RefCell::new(name.into()),
            state,
            parent: RefCell::new(Weak::new()),
            children: RefCell::new(Vec::new()),
            hidden: Cell::new(false),
            iterations: Cell::new(1),
        })
    }

    /// Creates a node around a fresh empty state.
    pub fn empty<T: Into<String>>(name: T) -> Rc<Self> {
        let name = name.into();
        StateNode::with_name(name.clone(), State::new(name))
    }

    /// Creates a node whose subtree is traversed `iterations` times.
    pub fn looped(state: Rc<State>, iterations: u32) -> Rc<Self> {
        let node = StateNode::new(state);
        node.set_iterations(iterations);
        node
    }

    pub fn name(&self) -> String {
        self.name.borrow().clone()
    }

    pub fn set_name<T: Into<String>>(&self, name: T) {
        *self.name.borrow_mut() = name.into();
    }

    #[inline]
    pub fn state(&self) -> &Rc<State> {
        &self.state
    }

    #[inline]
    pub fn parent(&self) -> Option<Rc<StateNode>> {
        self.parent.borrow().upgrade()
    }

    #[inline]
    pub fn has_parent(&self) -> bool {
        self.parent().is_some()
    }

    pub fn children(&self) -> Vec<Rc<StateNode>> {
        self.children.borrow().clone()
    }

    #[inline]
    pub fn is_hidden(&self) -> bool {
        self.hidden.get()
    }

    #[inline]
    pub fn set_hidden(&self, hidden: bool) {
        self.hidden.set(hidden);
    }

    #[inline]
    pub fn iterations(&self) -> u32 {
        self.iterations.get()
    }

    #[inline]
    pub fn set_iterations(&self, iterations: u32) {
        self.iterations.set(iterations);
    }
}

impl StateNode {
    /// Attaches `child` after the existing children. A child that already has
    /// a parent is detached from it first.
    pub fn add_child(self: &Rc<Self>, child: &Rc<StateNode>) -> Result<()> {
        self.attach(child, false)
    }

    /// Attaches `child` before the existing children.
    pub fn add_first_child(self: &Rc<Self>, child: &Rc<StateNode>) -> Result<()> {
        self.attach(child, true)
    }

    fn attach(self: &Rc<Self>, child: &Rc<StateNode>, front: bool) -> Result<()> {
        if self.is_descendant_of(child) {
            bail!(
                "Node `{}` can not be a child of its own descendant `{}`.",
                child.name(),
                self.name()
            );
        }

        if let Some(parent) = child.parent() {
            parent.remove_child(child);
        }

        {
            let mut children = self.children.borrow_mut();
            if front {
                children.insert(0, child.clone());
            } else {
                children.push(child.clone());
            }
        }

        *child.parent.borrow_mut() = Rc::downgrade(self);
        Ok(())
    }

    /// Detaches `child`. Does nothing if it is not a child of this node.
    pub fn remove_child(&self, child: &Rc<StateNode>) {
        let mut children = self.children.borrow_mut();
        if let Some(pos) = children.iter().position(|v| Rc::ptr_eq(v, child)) {
            children.remove(pos);
            *child.parent.borrow_mut() = Weak::new();
        }
    }

    /// Detaches all children.
    pub fn clear(&self) {
        let children = ::std::mem::replace(&mut *self.children.borrow_mut(), Vec::new());
        for v in children {
            *v.parent.borrow_mut() = Weak::new();
        }
    }

    fn is_descendant_of(self: &Rc<Self>, node: &Rc<StateNode>) -> bool {
        let mut cursor = Some(self.clone());
        while let Some(v) = cursor {
            if Rc::ptr_eq(&v, node) {
                return true;
            }

            cursor = v.parent();
        }

        false
    }

    /// Depth-first search for a node named `name`, this node included.
    pub fn find_node_with_name(self: &Rc<Self>, name: &str) -> Option<Rc<StateNode>> {
        if *self.name.borrow() == name {
            return Some(self.clone());
        }

        self.children()
            .iter()
            .find_map(|v| v.find_node_with_name(name))
    }
}

impl StateNode {
    /// Enables the state, traverses the children in order and disables the
    /// state again. Hidden nodes and states hidden on `rs` are skipped with
    /// their whole subtree.
    pub fn traverse(&self, rs: &mut RenderState) -> Result<()> {
        if self.is_hidden() || self.state.is_hidden() || rs.is_hidden(self.state.id()) {
            return Ok(());
        }

        for _ in 0..self.iterations() {
            self.state.activate(rs)?;

            let mut result = Ok(());
            for v in self.children() {
                result = v.traverse(rs);
                if result.is_err() {
                    break;
                }
            }

            let deactivated = self.state.deactivate(rs);
            result?;
            deactivated?;
        }

        Ok(())
    }

    /// Adds the contributions of all ancestors, root first, and then the one
    /// of this node, so the node closest to the leaf has the final say.
    pub fn configure_shader(&self, cfg: &mut StateConfig) {
        if let Some(parent) = self.parent() {
            parent.configure_shader(cfg);
        }

        cfg.add_state(&self.state);
    }
}
