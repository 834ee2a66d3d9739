//! Renderer context, state cache and draw scheduling.
//!
//! Convention:
//! - CPU geometry is in logical pixels (bottom-left origin, +Y up).
//! - Depth grows away from the viewer; the depth test passes on less-or-equal.
//! - Opaque geometry writes depth, translucent geometry only tests it.

mod batch_tree;
mod config;
mod context;
mod depth;
mod drawable;
mod state;

pub use batch_tree::{BatchKey, DrawableBatchTree};
pub use config::RendererConfig;
pub use context::{FrameStats, RendererContext};
pub use depth::{DepthConfig, DrawDepth};
pub use drawable::{DrawInfo, Drawable};
pub use state::{GpuState, StateCache};
