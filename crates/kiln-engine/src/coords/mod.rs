//! Coordinate and geometry types shared by the scene graph and renderers.
//!
//! Canonical CPU space:
//! - Logical pixels
//! - Origin bottom-left
//! - +X right, +Y up
//!
//! The sprite shader converts to NDC using a viewport uniform.

mod affine;
mod color;
mod quad;
mod rect;
mod vec2;
mod viewport;

pub use affine::Affine;
pub use color::ColorRgba;
pub use quad::Quad;
pub use rect::Rect;
pub use vec2::Vec2;
pub use viewport::Viewport;
