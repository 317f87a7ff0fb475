//! Native GL objects owned through the render state.

use std::cell::RefCell;
use std::rc::Rc;

use smallvec::SmallVec;

use crate::video::types::{ObjectKind, ObjectName};

impl_handle!(GLObjectHandle);

pub(crate) type GarbageQueue = Rc<RefCell<Vec<GLObjectHandle>>>;

/// A group of native objects of the same kind, created with
/// `RenderState::create_objects`.
///
/// One of the names is active at a time, which lets double or triple buffered
/// resources cycle through their objects with `next_object`. Dropping a
/// `GLObject` queues its names for deletion; they are released on the next
/// `RenderState::collect_garbage`.
#[derive(Debug)]
pub struct GLObject {
    handle: GLObjectHandle,
    kind: ObjectKind,
    names: SmallVec<[ObjectName; 2]>,
    active: usize,
    garbage: GarbageQueue,
}

impl GLObject {
    pub(crate) fn new(
        handle: GLObjectHandle,
        kind: ObjectKind,
        names: &[ObjectName],
        garbage: GarbageQueue,
    ) -> Self {
        GLObject {
            handle,
            kind,
            names: names.iter().cloned().collect(),
            active: 0,
            garbage,
        }
    }

    #[inline]
    pub fn handle(&self) -> GLObjectHandle {
        self.handle
    }

    #[inline]
    pub fn kind(&self) -> ObjectKind {
        self.kind
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.names.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.names.is_empty()
    }

    /// The active native object name.
    #[inline]
    pub fn id(&self) -> ObjectName {
        self.names[self.active]
    }

    #[inline]
    pub fn active_index(&self) -> usize {
        self.active
    }

    pub fn set_active_index(&mut self, index: usize) {
        self.active = index % self.names.len();
    }

    /// Advances to the next object, wrapping around, and returns its name.
    pub fn next_object(&mut self) -> ObjectName {
        self.active = (self.active + 1) % self.names.len();
        self.names[self.active]
    }

    #[inline]
    pub fn object_at(&self, index: usize) -> Option<ObjectName> {
        self.names.get(index).cloned()
    }

    #[inline]
    pub fn names(&self) -> &[ObjectName] {
        &self.names
    }
}

impl Drop for GLObject {
    fn drop(&mut self) {
        self.garbage.borrow_mut().push(self.handle);
    }
}
