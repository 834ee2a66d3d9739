//! Retained scene graph.
//!
//! Responsibilities:
//! - hold nodes in a generational arena with parent/child links
//! - resolve local layout (anchor, origin, relative axes, fill) into world quads
//! - queue drawables to the renderer front to back
//! - the built-in [`Sprite`] drawable

mod anchor;
mod node;
mod sprite;
mod tree;

pub use anchor::{Anchor, Axes, FillMode};
pub use node::{Layout, NodeId, Resolved};
pub use sprite::{sprite_program, Sprite};
pub use tree::{SceneError, SceneTree};
