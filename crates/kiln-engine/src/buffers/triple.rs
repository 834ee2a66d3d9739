use crate::error::RenderError;
use crate::render::GpuState;

use super::vertex::Vertex;
use super::vertex_buffer::VertexBuffer;
use super::{BatchConfig, VertexBatch};

const BUFFERS: usize = 3;

/// Three vertex buffers used round-robin.
///
/// The batch moves to the next buffer whenever the current one is drawn,
/// whether because it filled up or because of an explicit draw.
#[derive(Debug)]
pub struct TripleBatch<V: Vertex> {
    buffers: Vec<VertexBuffer<V>>,
    current: usize,
}

impl<V: Vertex> TripleBatch<V> {
    /// Index of the buffer currently being filled.
    #[inline]
    pub fn current(&self) -> usize {
        self.current
    }

    fn submit(&mut self, gpu: &mut GpuState) {
        self.buffers[self.current].draw(gpu);
        self.current = (self.current + 1) % BUFFERS;
    }
}

impl<V: Vertex> VertexBatch for TripleBatch<V> {
    type Vertex = V;

    fn create(gpu: &mut GpuState, config: &BatchConfig) -> Result<Self, RenderError> {
        let buffers = (0..BUFFERS)
            .map(|_| VertexBuffer::new(gpu, config.vertices_per_buffer))
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Self { buffers, current: 0 })
    }

    fn add_vertex(&mut self, gpu: &mut GpuState, vertex: V) -> Result<(), RenderError> {
        if self.buffers[self.current].push(vertex) {
            self.submit(gpu);
        }
        Ok(())
    }

    fn draw(&mut self, gpu: &mut GpuState) -> Result<(), RenderError> {
        if !self.buffers[self.current].is_empty() {
            self.submit(gpu);
        }
        Ok(())
    }

    fn reset(&mut self, _gpu: &mut GpuState) {
        self.buffers[self.current].rewind();
    }

    fn dispose(&mut self, gpu: &mut GpuState) {
        for buffer in self.buffers.drain(..) {
            buffer.dispose(gpu);
        }
        self.current = 0;
    }
}
