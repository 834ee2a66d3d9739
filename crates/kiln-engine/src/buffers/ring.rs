use std::collections::VecDeque;
use std::marker::PhantomData;
use std::ops::Range;
use std::time::Duration;

use crate::device::{BufferDesc, BufferHandle, BufferKind, Fence, FencePolicy};
use crate::error::RenderError;
use crate::render::GpuState;

use super::vertex::Vertex;
use super::{BatchConfig, VertexBatch};

/// A submitted slice of the ring and the fence placed after its draw.
#[derive(Debug)]
struct InFlight {
    slots: Range<usize>,
    fence: Fence,
}

/// One persistently written buffer used as a ring.
///
/// Vertices are written straight into GPU-visible memory. Each draw covers
/// the slots written since the previous draw and is followed by a fence.
/// Before a slot is overwritten, the fence of the region that contains it
/// is waited on, so a write never lands while the GPU may still read it.
#[derive(Debug)]
pub struct RingBatch<V: Vertex> {
    buffer: BufferHandle,
    capacity: usize,
    /// First slot not yet submitted.
    start: usize,
    /// Next slot to write.
    cursor: usize,
    in_flight: VecDeque<InFlight>,
    policy: FencePolicy,
    stalled: Duration,
    _vertex: PhantomData<V>,
}

impl<V: Vertex> RingBatch<V> {
    #[inline]
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    #[inline]
    pub fn cursor(&self) -> usize {
        self.cursor
    }

    /// Regions submitted whose fences have not been retired yet.
    #[inline]
    pub fn in_flight(&self) -> usize {
        self.in_flight.len()
    }

    /// Total time spent blocked on fences.
    #[inline]
    pub fn stalled(&self) -> Duration {
        self.stalled
    }

    /// Retires fences until no in-flight region covers `slot`.
    fn wait_for_slot(&mut self, gpu: &mut GpuState, slot: usize) {
        while self.in_flight.front().is_some_and(|r| r.slots.contains(&slot)) {
            let Some(mut region) = self.in_flight.pop_front() else {
                break;
            };
            let waited = region.fence.wait(gpu.backend(), &self.policy);
            self.stalled += waited;
            log::trace!(
                "ring slot {slot} reclaimed from region {:?} after {:?}",
                region.slots,
                waited
            );
            region.fence.release(gpu.backend());
        }
    }

    /// Moves the cursor to the next quad boundary, wrapping at capacity, and
    /// starts a new region there. Slots skipped over are never drawn.
    fn skip_to_quad(&mut self) {
        self.cursor = self.cursor.next_multiple_of(4);
        if self.cursor >= self.capacity {
            self.cursor = 0;
        }
        self.start = self.cursor;
    }

    fn retire_all(&mut self, gpu: &mut GpuState) {
        for mut region in self.in_flight.drain(..) {
            region.fence.wait(gpu.backend(), &self.policy);
            region.fence.release(gpu.backend());
        }
    }
}

impl<V: Vertex> VertexBatch for RingBatch<V> {
    type Vertex = V;

    fn create(gpu: &mut GpuState, config: &BatchConfig) -> Result<Self, RenderError> {
        let capacity = config.vertices_per_buffer;
        if capacity == 0 || capacity % 4 != 0 {
            return Err(RenderError::InvalidCapacity(capacity));
        }

        let buffer = gpu.backend().create_buffer(&BufferDesc {
            label: "kiln vertex ring",
            kind: BufferKind::Vertex,
            size: capacity as u64 * V::STRIDE,
            persistent: true,
        });
        gpu.ensure_quads(capacity / 4);

        Ok(Self {
            buffer,
            capacity,
            start: 0,
            cursor: 0,
            in_flight: VecDeque::new(),
            policy: gpu.fence_policy().clone(),
            stalled: Duration::ZERO,
            _vertex: PhantomData,
        })
    }

    fn add_vertex(&mut self, gpu: &mut GpuState, vertex: V) -> Result<(), RenderError> {
        let slot = self.cursor;
        self.wait_for_slot(gpu, slot);

        gpu.backend()
            .write_mapped(self.buffer, slot as u64 * V::STRIDE, bytemuck::bytes_of(&vertex));
        self.cursor += 1;

        if self.cursor == self.capacity {
            self.draw(gpu)?;
        }
        Ok(())
    }

    fn draw(&mut self, gpu: &mut GpuState) -> Result<(), RenderError> {
        if self.cursor == self.start {
            return Ok(());
        }

        let quads = (self.cursor - self.start) / 4;
        let submit_end = self.start + quads * 4;
        if quads > 0 {
            gpu.bind_vertex_buffer(self.buffer, V::STRIDE);
            gpu.bind_quad_indices();
            let first_index = (self.start / 4 * 6) as u32;
            gpu.backend().draw_indexed(first_index, quads as u32 * 6);

            let fence = Fence::insert(gpu.backend());
            self.in_flight.push_back(InFlight {
                slots: self.start..submit_end,
                fence,
            });
        }

        if submit_end != self.cursor {
            log::debug!(
                "ring dropped {} vertices of an unfinished quad",
                self.cursor - submit_end
            );
        }
        self.skip_to_quad();
        Ok(())
    }

    fn reset(&mut self, _gpu: &mut GpuState) {
        self.skip_to_quad();
    }

    fn dispose(&mut self, gpu: &mut GpuState) {
        self.retire_all(gpu);
        gpu.destroy_buffer(self.buffer);
        self.start = 0;
        self.cursor = 0;
    }
}
