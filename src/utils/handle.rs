use std::fmt;
use std::hash::Hash;

/// Slot index of a `Handle`. Kept at 32 bits so a whole handle fits one word.
pub type HandleIndex = u32;

/// A generation-checked reference into a slot table.
///
/// `index` addresses a slot that is recycled once the handle is freed, and
/// `generation` is bumped on every recycle. A handle is only honored while its
/// generation matches the slot, so a stale copy can never reach the object that
/// took over the slot.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Handle {
    index: HandleIndex,
    generation: HandleIndex,
}

impl Handle {
    #[inline]
    pub fn new(index: HandleIndex, generation: HandleIndex) -> Self {
        Handle { index, generation }
    }

    /// Handles are born with a non-zero generation, so the default value never
    /// refers to a live slot.
    #[inline]
    pub fn is_valid(self) -> bool {
        self.generation > 0
    }

    #[inline]
    pub fn index(self) -> HandleIndex {
        self.index
    }

    #[inline]
    pub fn generation(self) -> HandleIndex {
        self.generation
    }
}

impl fmt::Display for Handle {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "Handle ({}, {})", self.index, self.generation)
    }
}

pub trait HandleLike: fmt::Debug + fmt::Display + Copy + Hash + Eq + Send + Sync {
    fn new(index: HandleIndex, generation: HandleIndex) -> Self;
    fn index(&self) -> HandleIndex;
    fn generation(&self) -> HandleIndex;
}

impl HandleLike for Handle {
    #[inline]
    fn new(index: HandleIndex, generation: HandleIndex) -> Self {
        Handle { index, generation }
    }

    #[inline]
    fn index(&self) -> HandleIndex {
        self.index
    }

    #[inline]
    fn generation(&self) -> HandleIndex {
        self.generation
    }
}

/// Declares a type-safe wrapper around `Handle`.
#[macro_export]
macro_rules! impl_handle {
    ($name:ident) => {
        #[derive(Debug, Default, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
        pub struct $name($crate::utils::handle::Handle);

        impl From<$name> for $crate::utils::handle::Handle {
            fn from(handle: $name) -> Self {
                handle.0
            }
        }

        impl $crate::utils::handle::HandleLike for $name {
            #[inline]
            fn new(
                index: $crate::utils::handle::HandleIndex,
                generation: $crate::utils::handle::HandleIndex,
            ) -> Self {
                $name($crate::utils::handle::Handle::new(index, generation))
            }

            #[inline]
            fn index(&self) -> $crate::utils::handle::HandleIndex {
                self.0.index()
            }

            #[inline]
            fn generation(&self) -> $crate::utils::handle::HandleIndex {
                self.0.generation()
            }
        }

        impl ::std::fmt::Display for $name {
            fn fmt(&self, f: &mut ::std::fmt::Formatter) -> ::std::fmt::Result {
                write!(
                    f,
                    "{} ({}, {})",
                    stringify!($name),
                    self.0.index(),
                    self.0.generation()
                )
            }
        }
    };
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn validity() {
        assert!(!Handle::default().is_valid());
        assert!(Handle::new(0, 1).is_valid());
        assert_ne!(Handle::new(3, 1), Handle::new(3, 2));
    }

    impl_handle!(FooHandle);

    #[test]
    fn type_safe_handle() {
        let h = <FooHandle as HandleLike>::new(2, 5);
        assert_eq!(h.index(), 2);
        assert_eq!(h.generation(), 5);
        assert_eq!(Handle::from(h), Handle::new(2, 5));
        assert_eq!(format!("{}", h), "FooHandle (2, 5)");
    }
}
