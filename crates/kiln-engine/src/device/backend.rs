use std::any::Any;
use std::time::Duration;

use crate::coords::ColorRgba;
use crate::error::RenderError;

macro_rules! gpu_handle {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
        pub struct $name(u32);

        impl $name {
            #[inline]
            pub const fn from_raw(raw: u32) -> Self {
                Self(raw)
            }

            #[inline]
            pub const fn raw(self) -> u32 {
                self.0
            }

            #[inline]
            pub(crate) const fn index(self) -> usize {
                self.0 as usize
            }
        }
    };
}

gpu_handle!(
    /// GPU vertex or index buffer.
    BufferHandle
);
gpu_handle!(
    /// 2D RGBA texture with an optional mip chain.
    TextureHandle
);
gpu_handle!(
    /// Linked shader program (pipeline family).
    ProgramHandle
);
gpu_handle!(
    /// Synchronisation point placed after previously submitted work.
    FenceHandle
);

#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum BufferKind {
    Vertex,
    Index,
}

#[derive(Debug, Clone)]
pub struct BufferDesc {
    pub label: &'static str,
    pub kind: BufferKind,
    /// Size in bytes.
    pub size: u64,
    /// Written through [`GraphicsBackend::write_mapped`] instead of explicit uploads.
    pub persistent: bool,
}

#[derive(Debug, Clone)]
pub struct TextureDesc {
    pub label: &'static str,
    pub width: u32,
    pub height: u32,
    /// Downsampled levels below the base level.
    pub mip_levels: u32,
}

/// Shader program source handed over by the shader collaborator.
#[derive(Debug, Clone)]
pub struct ProgramDesc<'a> {
    pub label: &'a str,
    /// WGSL with `vs_main`/`fs_main` entry points.
    pub source: &'a str,
    pub vertex_stride: u64,
    pub attributes: &'a [wgpu::VertexAttribute],
}

/// Integer texel rectangle.
#[derive(Debug, Copy, Clone, Default, PartialEq, Eq)]
pub struct PixelRect {
    pub x: u32,
    pub y: u32,
    pub width: u32,
    pub height: u32,
}

impl PixelRect {
    #[inline]
    pub const fn new(x: u32, y: u32, width: u32, height: u32) -> Self {
        Self { x, y, width, height }
    }
}

/// Fixed-function state selected per draw.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
pub enum DrawPhase {
    /// Depth test and depth write, no blending.
    Opaque,
    /// Depth test without depth write, alpha blending.
    Translucent,
}

#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum FenceStatus {
    Signalled,
    TimedOut,
}

/// The graphics API as seen by the renderer.
///
/// Calls follow immediate-mode ordering: a buffer upload or texture write is
/// observed by every draw issued after it and by none issued before it. Writes
/// through [`write_mapped`](Self::write_mapped) carry no such guarantee; callers
/// synchronise them with fences.
pub trait GraphicsBackend {
    fn create_program(&mut self, desc: &ProgramDesc<'_>) -> Result<ProgramHandle, RenderError>;
    fn destroy_program(&mut self, program: ProgramHandle);

    fn create_buffer(&mut self, desc: &BufferDesc) -> BufferHandle;
    fn destroy_buffer(&mut self, buffer: BufferHandle);
    fn upload_buffer(&mut self, buffer: BufferHandle, offset: u64, bytes: &[u8]);
    fn write_mapped(&mut self, buffer: BufferHandle, offset: u64, bytes: &[u8]);

    fn create_texture(&mut self, desc: &TextureDesc) -> TextureHandle;
    fn destroy_texture(&mut self, texture: TextureHandle);
    /// Writes tightly packed RGBA8 rows into the base level.
    fn write_texture(&mut self, texture: TextureHandle, region: PixelRect, rgba: &[u8]);
    fn generate_mipmaps(&mut self, texture: TextureHandle);

    fn use_program(&mut self, program: ProgramHandle);
    fn bind_texture(&mut self, unit: u32, texture: TextureHandle);
    fn bind_vertex_buffer(&mut self, buffer: BufferHandle, stride: u64);
    fn bind_index_buffer(&mut self, buffer: BufferHandle);
    fn set_phase(&mut self, phase: DrawPhase);
    /// Draws `index_count` u32 indices starting at `first_index`.
    fn draw_indexed(&mut self, first_index: u32, index_count: u32);

    fn insert_fence(&mut self) -> FenceHandle;
    fn client_wait(&mut self, fence: FenceHandle, timeout: Duration) -> FenceStatus;
    fn delete_fence(&mut self, fence: FenceHandle);

    fn begin_frame(&mut self, clear: ColorRgba);
    fn end_frame(&mut self);

    fn as_any_mut(&mut self) -> &mut dyn Any;
}
