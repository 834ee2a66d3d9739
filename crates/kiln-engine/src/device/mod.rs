//! GPU device, surface and the graphics backend seam.
//!
//! This module is responsible for:
//! - creating the wgpu Instance/Adapter/Device/Queue and the window surface
//! - the [`GraphicsBackend`] trait the renderer issues all GPU work through
//! - fences for synchronising CPU writes against in-flight GPU reads

mod backend;
mod fence;
mod gpu;
mod wgpu_backend;

#[cfg(test)]
pub(crate) mod mock;

pub use backend::{
    BufferDesc, BufferHandle, BufferKind, DrawPhase, FenceHandle, FenceStatus, GraphicsBackend,
    PixelRect, ProgramDesc, ProgramHandle, TextureDesc, TextureHandle,
};
pub use fence::{Fence, FencePolicy};
pub use gpu::{Gpu, GpuInit, SurfaceErrorAction, SurfaceFrame};
pub use wgpu_backend::WgpuBackend;
