use thiserror::Error;

use crate::scene::SceneError;
use crate::texture::AtlasError;

/// Errors surfaced by the renderer and its resources.
///
/// None of these are retried internally. Configuration and invariant errors
/// indicate a programming mistake in the caller.
#[derive(Debug, Error)]
pub enum RenderError {
    #[error("renderer is already initialized")]
    AlreadyInitialized,

    #[error("renderer is not initialized")]
    NotInitialized,

    #[error("begin_frame called while a frame is already open")]
    FrameInProgress,

    #[error("no frame is open; call begin_frame first")]
    NoFrame,

    #[error("vertex pool exhausted: a frame needed more than {max} buffers of {capacity} vertices")]
    PoolExhausted { max: usize, capacity: usize },

    #[error("vertex capacity {0} must be a positive multiple of 4")]
    InvalidCapacity(usize),

    #[error("vertices for `{requested}` submitted while `{active}` is the active batch")]
    BatchMismatch {
        requested: &'static str,
        active: &'static str,
    },

    #[error("draw depth saturated after {capacity} drawables in one frame")]
    DepthSaturated { capacity: u32 },

    #[error("shader program `{label}` failed to build: {message}")]
    Program { label: String, message: String },

    #[error(transparent)]
    Scene(#[from] SceneError),

    #[error(transparent)]
    Atlas(#[from] AtlasError),
}
