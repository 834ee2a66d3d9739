use crate::buffers::BatchConfig;
use crate::device::FencePolicy;
use crate::texture::AtlasConfig;

use super::depth::DepthConfig;

/// Renderer-wide settings, fixed at construction.
#[derive(Debug, Clone, Default)]
pub struct RendererConfig {
    pub batch: BatchConfig,
    pub depth: DepthConfig,
    pub fence: FencePolicy,
    pub atlas: AtlasConfig,
    /// Group opaque drawables by program and texture before drawing them.
    pub batch_opaque: bool,
}
