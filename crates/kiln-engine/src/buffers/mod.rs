//! Vertex batching strategies.
//!
//! A batch accepts vertices one at a time and turns them into indexed quad
//! draws. Three strategies trade memory for synchronisation differently:
//! - [`PooledBatch`]: a growing pool of explicitly uploaded buffers, reset per frame
//! - [`RingBatch`]: one persistently written buffer, fenced per submitted region
//! - [`TripleBatch`]: three buffers used round-robin

mod pooled;
mod quad_index;
mod ring;
mod triple;
mod vertex;
mod vertex_buffer;

use std::any::{Any, TypeId};

use crate::error::RenderError;
use crate::render::GpuState;

pub use pooled::PooledBatch;
pub use quad_index::{quad_indices, QuadIndexBuffer};
pub use ring::RingBatch;
pub use triple::TripleBatch;
pub use vertex::{TexturedVertex, Vertex};
pub use vertex_buffer::VertexBuffer;

/// Sizing shared by every batch the renderer creates.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BatchConfig {
    /// Vertices per buffer (per ring for [`RingBatch`]). Multiple of 4.
    pub vertices_per_buffer: usize,
    /// Upper bound on buffers a [`PooledBatch`] may use within one frame.
    pub max_buffers: usize,
}

impl Default for BatchConfig {
    fn default() -> Self {
        Self {
            vertices_per_buffer: 10_000,
            max_buffers: 100,
        }
    }
}

/// Strategy for streaming vertices to the GPU.
pub trait VertexBatch: 'static {
    type Vertex: Vertex;

    fn create(gpu: &mut GpuState, config: &BatchConfig) -> Result<Self, RenderError>
    where
        Self: Sized;

    /// Appends one vertex. A batch that runs out of room draws what it holds
    /// and continues in fresh storage.
    fn add_vertex(&mut self, gpu: &mut GpuState, vertex: Self::Vertex) -> Result<(), RenderError>;

    /// Submits every vertex added since the previous draw.
    fn draw(&mut self, gpu: &mut GpuState) -> Result<(), RenderError>;

    /// Start-of-frame reset. Vertices added but never drawn are discarded.
    fn reset(&mut self, gpu: &mut GpuState);

    fn dispose(&mut self, gpu: &mut GpuState);
}

/// Object-safe view of a [`VertexBatch`], used for heterogeneous storage.
pub(crate) trait AnyBatch {
    fn batch_type(&self) -> TypeId;
    fn type_name(&self) -> &'static str;
    fn draw_any(&mut self, gpu: &mut GpuState) -> Result<(), RenderError>;
    fn reset_any(&mut self, gpu: &mut GpuState);
    fn dispose_any(&mut self, gpu: &mut GpuState);
    fn as_any_mut(&mut self) -> &mut dyn Any;
}

impl<B: VertexBatch> AnyBatch for B {
    fn batch_type(&self) -> TypeId {
        TypeId::of::<B>()
    }

    fn type_name(&self) -> &'static str {
        std::any::type_name::<B>()
    }

    fn draw_any(&mut self, gpu: &mut GpuState) -> Result<(), RenderError> {
        self.draw(gpu)
    }

    fn reset_any(&mut self, gpu: &mut GpuState) {
        self.reset(gpu);
    }

    fn dispose_any(&mut self, gpu: &mut GpuState) {
        self.dispose(gpu);
    }

    fn as_any_mut(&mut self) -> &mut dyn Any {
        self
    }
}
