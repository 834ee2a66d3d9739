use crate::device::{BufferDesc, BufferHandle, BufferKind, GraphicsBackend};

/// Index list drawing `quads` quads as two triangles each.
///
/// Quad `i` uses vertices `4i..4i+4` in the order
/// `(4i, 4i+1, 4i+2, 4i+2, 4i+3, 4i)`.
pub fn quad_indices(quads: u32) -> Vec<u32> {
    (0..quads)
        .flat_map(|q| {
            let base = q * 4;
            [base, base + 1, base + 2, base + 2, base + 3, base]
        })
        .collect()
}

/// Shared, grow-only index buffer for quad batches.
#[derive(Debug, Default)]
pub struct QuadIndexBuffer {
    buffer: Option<BufferHandle>,
    quads: u32,
}

impl QuadIndexBuffer {
    pub const fn new() -> Self {
        Self { buffer: None, quads: 0 }
    }

    #[inline]
    pub fn handle(&self) -> Option<BufferHandle> {
        self.buffer
    }

    /// Number of quads the current buffer can index.
    #[inline]
    pub fn capacity(&self) -> u32 {
        self.quads
    }

    /// Makes sure at least `quads` quads can be indexed.
    ///
    /// Returns `true` when the buffer was (re)created, which invalidates any
    /// previous index buffer binding.
    pub fn ensure(&mut self, backend: &mut dyn GraphicsBackend, quads: u32) -> bool {
        if self.buffer.is_some() && quads <= self.quads {
            return false;
        }

        let quads = quads.max(1);
        if let Some(old) = self.buffer.take() {
            backend.destroy_buffer(old);
        }

        let indices = quad_indices(quads);
        let bytes: &[u8] = bytemuck::cast_slice(&indices);
        let buffer = backend.create_buffer(&BufferDesc {
            label: "kiln quad indices",
            kind: BufferKind::Index,
            size: bytes.len() as u64,
            persistent: false,
        });
        backend.upload_buffer(buffer, 0, bytes);
        log::debug!("quad index buffer sized for {quads} quads");

        self.buffer = Some(buffer);
        self.quads = quads;
        true
    }

    pub fn dispose(&mut self, backend: &mut dyn GraphicsBackend) {
        if let Some(buffer) = self.buffer.take() {
            backend.destroy_buffer(buffer);
        }
        self.quads = 0;
    }
}
