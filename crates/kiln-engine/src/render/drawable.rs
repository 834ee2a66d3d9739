use crate::coords::{ColorRgba, Quad};
use crate::error::RenderError;

use super::batch_tree::BatchKey;
use super::context::RendererContext;

/// Resolved placement of one drawable for the current frame.
#[derive(Debug, Copy, Clone, PartialEq)]
pub struct DrawInfo {
    pub quad: Quad,
    pub colour: ColorRgba,
    /// Assigned by the renderer when the drawable is queued.
    pub depth: f32,
}

impl DrawInfo {
    pub fn new(quad: Quad, colour: ColorRgba) -> Self {
        Self {
            quad,
            colour,
            depth: 0.0,
        }
    }
}

/// Something that can emit geometry for a resolved quad.
pub trait Drawable {
    fn draw(&self, renderer: &mut RendererContext, info: &DrawInfo) -> Result<(), RenderError>;

    /// Drawables with transparency are deferred to the translucent pass.
    fn has_transparency(&self) -> bool {
        false
    }

    /// Program and texture this drawable binds, if known up front. Needed
    /// for opaque batching.
    fn batch_key(&self, renderer: &RendererContext) -> Option<BatchKey> {
        let _ = renderer;
        None
    }
}
