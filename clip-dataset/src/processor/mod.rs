//! Clip loading and sampling building blocks.

pub mod clip_loader;
pub mod frame_store;
pub mod retry;
pub mod spatial;
pub mod temporal;

pub use clip_loader::*;
pub use frame_store::*;
pub use retry::*;
pub use spatial::*;
pub use temporal::*;
