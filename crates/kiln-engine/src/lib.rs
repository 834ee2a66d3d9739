//! Kiln engine crate.
//!
//! A retained-mode 2D renderer: a scene graph resolves layout into world
//! quads, and the renderer streams them through pooled, ring or triple
//! vertex buffers with state caching and front-to-back depth ordering.
//! Translucent drawables are deferred and drawn back to front.
//!
//! The window runtime and wgpu backend live here too, so a binary only
//! implements [`core::App`].

pub mod buffers;
pub mod coords;
pub mod core;
pub mod device;
pub mod error;
pub mod logging;
pub mod render;
pub mod scene;
pub mod texture;
pub mod window;

pub use error::RenderError;
