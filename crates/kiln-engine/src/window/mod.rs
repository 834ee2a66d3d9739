//! Window + runtime loop.
//!
//! Owns the `winit` EventLoop and windows, and gives each window a GPU
//! surface and its own renderer.

mod runtime;

pub use runtime::{Runtime, RuntimeConfig, RuntimeCtx};
