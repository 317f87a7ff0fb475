use std::marker::PhantomData;

use super::handle::{HandleIndex, HandleLike};

struct Slot<T> {
    generation: HandleIndex,
    value: Option<T>,
}

/// An arena of `T` addressed by generation-checked handles.
///
/// Freeing a handle bumps the generation of its slot and queues the slot for
/// reuse, so freeing the same handle twice (or reading through a stale copy)
/// is reported instead of touching whatever lives in the slot now.
pub struct ObjectPool<H: HandleLike, T> {
    slots: Vec<Slot<T>>,
    frees: Vec<HandleIndex>,
    _phantom: PhantomData<H>,
}

impl<H: HandleLike, T> Default for ObjectPool<H, T> {
    fn default() -> Self {
        ObjectPool::new()
    }
}

impl<H: HandleLike, T> ObjectPool<H, T> {
    pub fn new() -> Self {
        ObjectPool {
            slots: Vec::new(),
            frees: Vec::new(),
            _phantom: PhantomData,
        }
    }

    pub fn create(&mut self, value: T) -> H {
        if let Some(index) = self.frees.pop() {
            let slot = &mut self.slots[index as usize];
            slot.generation += 1;
            slot.value = Some(value);
            H::new(index, slot.generation)
        } else {
            self.slots.push(Slot {
                generation: 1,
                value: Some(value),
            });

            H::new(self.slots.len() as HandleIndex - 1, 1)
        }
    }

    #[inline]
    pub fn is_alive(&self, handle: H) -> bool {
        self.slots
            .get(handle.index() as usize)
            .map(|v| v.generation == handle.generation() && v.value.is_some())
            .unwrap_or(false)
    }

    #[inline]
    pub fn get(&self, handle: H) -> Option<&T> {
        if self.is_alive(handle) {
            self.slots[handle.index() as usize].value.as_ref()
        } else {
            None
        }
    }

    #[inline]
    pub fn get_mut(&mut self, handle: H) -> Option<&mut T> {
        if self.is_alive(handle) {
            self.slots[handle.index() as usize].value.as_mut()
        } else {
            None
        }
    }

    /// Takes the value out of the pool. Returns `None` if the handle is stale.
    pub fn free(&mut self, handle: H) -> Option<T> {
        if !self.is_alive(handle) {
            return None;
        }

        self.frees.push(handle.index());
        self.slots[handle.index() as usize].value.take()
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.slots.len() - self.frees.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Iterates over the alive handles and their values.
    pub fn iter(&self) -> impl Iterator<Item = (H, &T)> {
        self.slots.iter().enumerate().filter_map(|(i, slot)| {
            slot.value
                .as_ref()
                .map(|v| (H::new(i as HandleIndex, slot.generation), v))
        })
    }

    /// Drains every alive value.
    pub fn drain(&mut self) -> Vec<(H, T)> {
        let mut values = Vec::new();
        for (i, slot) in self.slots.iter_mut().enumerate() {
            if let Some(v) = slot.value.take() {
                values.push((H::new(i as HandleIndex, slot.generation), v));
                self.frees.push(i as HandleIndex);
            }
        }

        values
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::utils::handle::Handle;

    #[test]
    fn reuse() {
        let mut pool: ObjectPool<Handle, &'static str> = ObjectPool::new();
        let a = pool.create("a");
        let b = pool.create("b");
        assert_eq!(pool.len(), 2);
        assert_eq!(pool.get(a), Some(&"a"));

        assert_eq!(pool.free(a), Some("a"));
        assert_eq!(pool.free(a), None);
        assert!(!pool.is_alive(a));

        let c = pool.create("c");
        assert_eq!(c.index(), a.index());
        assert!(c.generation() > a.generation());
        assert_eq!(pool.get(a), None);
        assert_eq!(pool.get(c), Some(&"c"));
        assert_eq!(pool.get(b), Some(&"b"));
    }

    #[test]
    fn drain() {
        let mut pool: ObjectPool<Handle, u32> = ObjectPool::new();
        let handles: Vec<_> = (0..4).map(|i| pool.create(i)).collect();
        pool.free(handles[1]);

        let values: Vec<_> = pool.drain().into_iter().map(|(_, v)| v).collect();
        assert_eq!(values, vec![0, 2, 3]);
        assert!(pool.is_empty());
    }
}
