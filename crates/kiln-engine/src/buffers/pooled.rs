use crate::error::RenderError;
use crate::render::GpuState;

use super::vertex::Vertex;
use super::vertex_buffer::VertexBuffer;
use super::{BatchConfig, VertexBatch};

/// A pool of vertex buffers filled one after another within a frame.
///
/// A buffer that fills up is drawn and the batch moves on to the next one,
/// creating it on first use. At the start of a frame every buffer used in the
/// previous frame is rewound and filling restarts at the first buffer.
#[derive(Debug)]
pub struct PooledBatch<V: Vertex> {
    buffers: Vec<VertexBuffer<V>>,
    current: usize,
    /// The current buffer was drawn because it filled up.
    advance_pending: bool,
    /// Buffers touched since the last reset.
    used: usize,
    capacity: usize,
    max_buffers: usize,
}

impl<V: Vertex> PooledBatch<V> {
    /// Buffers created so far.
    #[inline]
    pub fn buffer_count(&self) -> usize {
        self.buffers.len()
    }

    /// Index of the buffer currently being filled.
    #[inline]
    pub fn current(&self) -> usize {
        self.current
    }

    fn advance(&mut self, gpu: &mut GpuState) -> Result<(), RenderError> {
        let next = self.current + 1;
        if next >= self.max_buffers {
            return Err(RenderError::PoolExhausted {
                max: self.max_buffers,
                capacity: self.capacity,
            });
        }
        if next == self.buffers.len() {
            log::debug!("vertex pool grows to {} buffers", next + 1);
            self.buffers.push(VertexBuffer::new(gpu, self.capacity)?);
        }
        self.current = next;
        self.used = self.used.max(next + 1);
        Ok(())
    }
}

impl<V: Vertex> VertexBatch for PooledBatch<V> {
    type Vertex = V;

    fn create(gpu: &mut GpuState, config: &BatchConfig) -> Result<Self, RenderError> {
        if config.max_buffers == 0 {
            return Err(RenderError::PoolExhausted {
                max: 0,
                capacity: config.vertices_per_buffer,
            });
        }
        let first = VertexBuffer::new(gpu, config.vertices_per_buffer)?;
        Ok(Self {
            buffers: vec![first],
            current: 0,
            advance_pending: false,
            used: 1,
            capacity: config.vertices_per_buffer,
            max_buffers: config.max_buffers,
        })
    }

    fn add_vertex(&mut self, gpu: &mut GpuState, vertex: V) -> Result<(), RenderError> {
        if self.advance_pending {
            self.advance(gpu)?;
            self.advance_pending = false;
        }

        let buffer = &mut self.buffers[self.current];
        if buffer.push(vertex) {
            buffer.draw(gpu);
            self.advance_pending = true;
        }
        Ok(())
    }

    fn draw(&mut self, gpu: &mut GpuState) -> Result<(), RenderError> {
        self.buffers[self.current].draw(gpu);
        Ok(())
    }

    fn reset(&mut self, _gpu: &mut GpuState) {
        for buffer in &mut self.buffers[..self.used] {
            buffer.rewind();
        }
        self.current = 0;
        self.used = 1;
        self.advance_pending = false;
    }

    fn dispose(&mut self, gpu: &mut GpuState) {
        for buffer in self.buffers.drain(..) {
            buffer.dispose(gpu);
        }
        self.current = 0;
        self.used = 0;
        self.advance_pending = false;
    }
}
