//! Commonly used utilities like handles and pools.

#[macro_use]
pub mod handle;
pub mod pool;

pub mod prelude {
    pub use super::handle::{Handle, HandleIndex, HandleLike};
    pub use super::pool::ObjectPool;
}
