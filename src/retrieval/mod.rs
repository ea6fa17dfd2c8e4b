//! Context assembly over retrieved passages

pub mod context;

pub use context::{assemble, Context};
