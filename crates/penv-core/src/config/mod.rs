//! Configuration snapshot and per-invocation context assembly.

pub mod context;
pub mod settings;

pub use settings::*;
