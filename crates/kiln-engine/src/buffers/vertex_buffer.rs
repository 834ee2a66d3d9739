use std::ops::Range;

use bytemuck::Zeroable;

use crate::device::{BufferDesc, BufferHandle, BufferKind};
use crate::error::RenderError;
use crate::render::GpuState;

use super::vertex::Vertex;

/// Fixed-capacity vertex buffer with a CPU shadow copy.
///
/// Only slots whose bytes actually changed are uploaded, as one contiguous
/// dirty range, right before a draw.
#[derive(Debug)]
pub struct VertexBuffer<V: Vertex> {
    buffer: BufferHandle,
    shadow: Vec<V>,
    len: usize,
    dirty: Option<Range<usize>>,
}

impl<V: Vertex> VertexBuffer<V> {
    pub fn new(gpu: &mut GpuState, capacity: usize) -> Result<Self, RenderError> {
        if capacity == 0 || capacity % 4 != 0 {
            return Err(RenderError::InvalidCapacity(capacity));
        }

        let buffer = gpu.backend().create_buffer(&BufferDesc {
            label: "kiln vertex buffer",
            kind: BufferKind::Vertex,
            size: capacity as u64 * V::STRIDE,
            persistent: false,
        });
        gpu.ensure_quads(capacity / 4);

        Ok(Self {
            buffer,
            shadow: vec![V::zeroed(); capacity],
            len: 0,
            dirty: None,
        })
    }

    #[inline]
    pub fn handle(&self) -> BufferHandle {
        self.buffer
    }

    #[inline]
    pub fn capacity(&self) -> usize {
        self.shadow.len()
    }

    /// Vertices written since the last draw or rewind.
    #[inline]
    pub fn len(&self) -> usize {
        self.len
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    #[inline]
    pub fn is_full(&self) -> bool {
        self.len == self.shadow.len()
    }

    /// Slots waiting to be uploaded.
    pub fn dirty_range(&self) -> Option<Range<usize>> {
        self.dirty.clone()
    }

    /// Writes the next vertex. Returns `true` once the buffer is full.
    ///
    /// Must not be called on a full buffer; draw or rewind it first.
    pub fn push(&mut self, vertex: V) -> bool {
        debug_assert!(!self.is_full(), "push into a full vertex buffer");
        let slot = self.len;

        if bytemuck::bytes_of(&self.shadow[slot]) != bytemuck::bytes_of(&vertex) {
            self.shadow[slot] = vertex;
            self.dirty = Some(match self.dirty.take() {
                Some(range) => range.start.min(slot)..range.end.max(slot + 1),
                None => slot..slot + 1,
            });
        }

        self.len += 1;
        self.is_full()
    }

    /// Uploads the dirty range, draws every complete quad written so far and
    /// rewinds. Does nothing when empty.
    pub fn draw(&mut self, gpu: &mut GpuState) {
        if self.len == 0 {
            return;
        }

        if let Some(range) = self.dirty.take() {
            let offset = range.start as u64 * V::STRIDE;
            let bytes: &[u8] = bytemuck::cast_slice(&self.shadow[range]);
            gpu.backend().upload_buffer(self.buffer, offset, bytes);
        }

        gpu.bind_vertex_buffer(self.buffer, V::STRIDE);
        gpu.bind_quad_indices();

        let quads = (self.len / 4) as u32;
        if quads > 0 {
            gpu.backend().draw_indexed(0, quads * 6);
        }
        self.len = 0;
    }

    /// Forgets the written vertices without drawing them.
    ///
    /// Pending uploads are kept; the shadow copy still describes what the GPU
    /// buffer should hold.
    #[inline]
    pub fn rewind(&mut self) {
        self.len = 0;
    }

    pub fn dispose(self, gpu: &mut GpuState) {
        gpu.destroy_buffer(self.buffer);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::buffers::TexturedVertex;
    use crate::device::mock::{Call, MockBackend};
    use crate::device::FencePolicy;

    fn vertex(x: f32) -> TexturedVertex {
        TexturedVertex {
            position: [x, 0.0],
            colour: [1.0; 4],
            ..TexturedVertex::default()
        }
    }

    fn gpu() -> (GpuState, std::rc::Rc<std::cell::RefCell<crate::device::mock::GpuSim>>) {
        let (backend, sim) = MockBackend::immediate();
        (GpuState::new(Box::new(backend), FencePolicy::default()), sim)
    }

    // ── capacity ────────────────────────────────────────────────────────────

    #[test]
    fn capacity_must_be_whole_quads() {
        let (mut gpu, _) = gpu();
        assert!(matches!(
            VertexBuffer::<TexturedVertex>::new(&mut gpu, 6),
            Err(RenderError::InvalidCapacity(6))
        ));
        assert!(matches!(
            VertexBuffer::<TexturedVertex>::new(&mut gpu, 0),
            Err(RenderError::InvalidCapacity(0))
        ));
    }

    #[test]
    fn push_reports_full() {
        let (mut gpu, _) = gpu();
        let mut buffer = VertexBuffer::new(&mut gpu, 4).unwrap();
        assert!(!buffer.push(vertex(1.0)));
        assert!(!buffer.push(vertex(2.0)));
        assert!(!buffer.push(vertex(3.0)));
        assert!(buffer.push(vertex(4.0)));
    }

    // ── dirty tracking ──────────────────────────────────────────────────────

    #[test]
    fn identical_vertices_are_not_reuploaded() {
        let (mut gpu, sim) = gpu();
        let mut buffer = VertexBuffer::new(&mut gpu, 8).unwrap();

        for x in [1.0, 2.0, 3.0, 4.0] {
            buffer.push(vertex(x));
        }
        assert_eq!(buffer.dirty_range(), Some(0..4));
        buffer.draw(&mut gpu);

        sim.borrow_mut().clear_calls();
        for x in [1.0, 2.0, 3.0, 4.0] {
            buffer.push(vertex(x));
        }
        assert_eq!(buffer.dirty_range(), None);
        buffer.draw(&mut gpu);

        let sim = sim.borrow();
        assert_eq!(sim.count(|c| matches!(c, Call::UploadBuffer { .. })), 0);
        assert_eq!(sim.count(|c| matches!(c, Call::DrawIndexed { .. })), 1);
    }

    #[test]
    fn dirty_range_spans_changed_slots_only() {
        let (mut gpu, sim) = gpu();
        let mut buffer = VertexBuffer::new(&mut gpu, 8).unwrap();
        for x in [1.0, 2.0, 3.0, 4.0] {
            buffer.push(vertex(x));
        }
        buffer.draw(&mut gpu);

        sim.borrow_mut().clear_calls();
        for x in [1.0, 9.0, 3.0, 4.0] {
            buffer.push(vertex(x));
        }
        assert_eq!(buffer.dirty_range(), Some(1..2));
        buffer.draw(&mut gpu);

        let stride = TexturedVertex::STRIDE;
        let uploads: Vec<_> = sim
            .borrow()
            .calls()
            .iter()
            .filter_map(|c| match c {
                Call::UploadBuffer { offset, len, .. } => Some((*offset, *len)),
                _ => None,
            })
            .collect();
        assert_eq!(uploads, vec![(stride, stride as usize)]);
    }

    #[test]
    fn rewind_keeps_pending_upload() {
        let (mut gpu, _) = gpu();
        let mut buffer = VertexBuffer::new(&mut gpu, 4).unwrap();
        buffer.push(vertex(5.0));
        buffer.rewind();

        assert!(buffer.is_empty());
        assert_eq!(buffer.dirty_range(), Some(0..1));
    }

    // ── draw ────────────────────────────────────────────────────────────────

    #[test]
    fn draw_issues_six_indices_per_quad_then_rewinds() {
        let (mut gpu, sim) = gpu();
        let mut buffer = VertexBuffer::new(&mut gpu, 12).unwrap();
        for i in 0..8 {
            buffer.push(vertex(i as f32));
        }
        buffer.draw(&mut gpu);
        assert!(buffer.is_empty());

        let sim = sim.borrow();
        let draws = sim.executed_draws();
        assert_eq!(draws.len(), 1);
        assert_eq!((draws[0].first_index, draws[0].index_count), (0, 12));
        let xs: Vec<f32> = draws[0]
            .vertices::<TexturedVertex>()
            .iter()
            .map(|v| v.position[0])
            .collect();
        assert_eq!(xs, vec![0.0, 1.0, 2.0, 3.0, 4.0, 5.0, 6.0, 7.0]);
    }

    #[test]
    fn empty_draw_is_a_no_op() {
        let (mut gpu, sim) = gpu();
        let mut buffer = VertexBuffer::<TexturedVertex>::new(&mut gpu, 4).unwrap();
        sim.borrow_mut().clear_calls();
        buffer.draw(&mut gpu);
        assert!(sim.borrow().calls().is_empty());
    }
}
