use std::fmt::Debug;

use crate::errors::*;
use crate::video::backends::Visitor;

/// Pushes a value of one state category to the backend. The `usize` is the
/// index of the stack for indexed categories (texture units, buffer targets).
pub type Apply<T> = fn(&mut dyn Visitor, usize, &T) -> Result<()>;

/// A stack of values for one GL state category.
///
/// The bottom of the stack is the value of a fresh context, so popping every
/// pushed value restores the context default. The value last sent to the
/// backend is remembered and unchanged values are never re-sent.
///
/// While locked, pushes and pops are still recorded but nothing reaches the
/// backend. This lets an outer state pin a value for a whole subtree.
pub struct ValueStack<T> {
    label: &'static str,
    index: usize,
    initial: T,
    applied: T,
    values: Vec<T>,
    locks: u32,
    apply: Apply<T>,
}

impl<T: Clone + PartialEq + Debug> ValueStack<T> {
    pub fn new(label: &'static str, index: usize, initial: T, apply: Apply<T>) -> Self {
        ValueStack {
            label,
            index,
            applied: initial.clone(),
            initial,
            values: Vec::new(),
            locks: 0,
            apply,
        }
    }

    #[inline]
    pub fn top(&self) -> &T {
        self.values.last().unwrap_or(&self.initial)
    }

    /// Number of values pushed on top of the default.
    #[inline]
    pub fn depth(&self) -> usize {
        self.values.len()
    }

    #[inline]
    pub fn is_locked(&self) -> bool {
        self.locks > 0
    }

    pub fn push(&mut self, visitor: &mut dyn Visitor, value: T) -> Result<()> {
        self.values.push(value);
        if let Err(err) = self.sync(visitor) {
            self.values.pop();
            return Err(err);
        }

        Ok(())
    }

    /// Restores the previous value.
    ///
    /// # Panics
    ///
    /// Panics if nothing has been pushed, which means some `enable` and
    /// `disable` calls are out of balance.
    pub fn pop(&mut self, visitor: &mut dyn Visitor) -> Result<()> {
        if self.values.pop().is_none() {
            panic!("Pop on the empty `{}` stack.", self.label);
        }

        self.sync(visitor)
    }

    #[inline]
    pub fn lock(&mut self) {
        self.locks += 1;
    }

    /// Releases one lock. Releasing the last one sends the top value if it
    /// changed while locked.
    pub fn unlock(&mut self, visitor: &mut dyn Visitor) -> Result<()> {
        assert!(self.locks > 0, "Unlock of the unlocked `{}` stack.", self.label);
        self.locks -= 1;
        self.sync(visitor)
    }

    /// Sends the top value to the backend, even if it is believed unchanged.
    pub fn reset(&mut self, visitor: &mut dyn Visitor) -> Result<()> {
        let top = self.top().clone();
        (self.apply)(visitor, self.index, &top)?;
        self.applied = top;
        Ok(())
    }

    fn sync(&mut self, visitor: &mut dyn Visitor) -> Result<()> {
        if self.locks > 0 || *self.top() == self.applied {
            return Ok(());
        }

        let top = self.top().clone();
        (self.apply)(visitor, self.index, &top)?;
        trace!("[RenderState] {}[{}] = {:?}", self.label, self.index, top);
        self.applied = top;
        Ok(())
    }
}

/// Mutable access to one stack together with the backend it drives.
pub struct StackRef<'a, T> {
    stack: &'a mut ValueStack<T>,
    visitor: &'a mut Box<dyn Visitor>,
}

impl<'a, T: Clone + PartialEq + Debug> StackRef<'a, T> {
    #[inline]
    pub(crate) fn new(stack: &'a mut ValueStack<T>, visitor: &'a mut Box<dyn Visitor>) -> Self {
        StackRef { stack, visitor }
    }

    /// Makes `value` current and remembers the previous one.
    #[inline]
    pub fn push(&mut self, value: T) -> Result<()> {
        self.stack.push(&mut **self.visitor, value)
    }

    /// Restores the value that was current before the matching `push`.
    #[inline]
    pub fn pop(&mut self) -> Result<()> {
        self.stack.pop(&mut **self.visitor)
    }

    #[inline]
    pub fn top(&self) -> &T {
        self.stack.top()
    }

    #[inline]
    pub fn depth(&self) -> usize {
        self.stack.depth()
    }

    #[inline]
    pub fn lock(&mut self) {
        self.stack.lock()
    }

    #[inline]
    pub fn unlock(&mut self) -> Result<()> {
        self.stack.unlock(&mut **self.visitor)
    }

    #[inline]
    pub fn is_locked(&self) -> bool {
        self.stack.is_locked()
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::video::backends::headless::HeadlessVisitor;
    use crate::video::types::Comparison;

    fn stack() -> ValueStack<Comparison> {
        ValueStack::new("depth_func", 0, Comparison::Less, |v, _, x| unsafe {
            v.set_depth_func(*x)
        })
    }

    #[test]
    fn redundant_values() {
        let visitor = HeadlessVisitor::new();
        let probe = visitor.probe();
        let mut visitor: Box<dyn Visitor> = Box::new(visitor);
        let mut s = stack();

        s.push(&mut *visitor, Comparison::Less).unwrap();
        assert!(probe.calls().is_empty());

        s.push(&mut *visitor, Comparison::Always).unwrap();
        s.push(&mut *visitor, Comparison::Always).unwrap();
        assert_eq!(probe.calls().len(), 1);

        s.pop(&mut *visitor).unwrap();
        s.pop(&mut *visitor).unwrap();
        s.pop(&mut *visitor).unwrap();
        assert_eq!(probe.calls().len(), 2);
        assert_eq!(probe.snapshot().depth_func, Comparison::Less);
        assert_eq!(s.depth(), 0);
    }

    #[test]
    fn locked() {
        let visitor = HeadlessVisitor::new();
        let probe = visitor.probe();
        let mut visitor: Box<dyn Visitor> = Box::new(visitor);
        let mut s = stack();

        s.push(&mut *visitor, Comparison::Greater).unwrap();
        s.lock();
        s.push(&mut *visitor, Comparison::Never).unwrap();
        assert_eq!(*s.top(), Comparison::Never);
        assert_eq!(probe.snapshot().depth_func, Comparison::Greater);
        s.pop(&mut *visitor).unwrap();
        s.unlock(&mut *visitor).unwrap();
        assert_eq!(probe.calls().len(), 1);

        s.lock();
        s.push(&mut *visitor, Comparison::Always).unwrap();
        s.unlock(&mut *visitor).unwrap();
        assert_eq!(probe.snapshot().depth_func, Comparison::Always);

        s.pop(&mut *visitor).unwrap();
        s.pop(&mut *visitor).unwrap();
        assert_eq!(probe.snapshot().depth_func, Comparison::Less);
    }

    #[test]
    #[should_panic]
    fn pop_empty() {
        let mut visitor: Box<dyn Visitor> = Box::new(HeadlessVisitor::new());
        let mut s = stack();
        let _ = s.pop(&mut *visitor);
    }
}
