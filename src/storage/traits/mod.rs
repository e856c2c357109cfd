//! Storage backend traits.

mod window;

pub use window::WindowStore;
