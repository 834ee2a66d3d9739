use crate::buffers::QuadIndexBuffer;
use crate::device::{
    BufferHandle, DrawPhase, FencePolicy, GraphicsBackend, ProgramHandle, TextureHandle,
};

/// Last-bound GPU state.
///
/// Every `set_*` returns `true` when the value changed and the caller must
/// forward the bind to the backend.
#[derive(Debug, Default, Clone, PartialEq)]
pub struct StateCache {
    program: Option<ProgramHandle>,
    vertex_buffer: Option<BufferHandle>,
    index_buffer: Option<BufferHandle>,
    textures: Vec<Option<TextureHandle>>,
    phase: Option<DrawPhase>,
}

impl StateCache {
    #[inline]
    pub fn program(&self) -> Option<ProgramHandle> {
        self.program
    }

    #[inline]
    pub fn vertex_buffer(&self) -> Option<BufferHandle> {
        self.vertex_buffer
    }

    #[inline]
    pub fn index_buffer(&self) -> Option<BufferHandle> {
        self.index_buffer
    }

    pub fn texture(&self, unit: u32) -> Option<TextureHandle> {
        self.textures.get(unit as usize).copied().flatten()
    }

    #[inline]
    pub fn phase(&self) -> Option<DrawPhase> {
        self.phase
    }

    pub fn set_program(&mut self, program: ProgramHandle) -> bool {
        replace(&mut self.program, program)
    }

    pub fn set_vertex_buffer(&mut self, buffer: BufferHandle) -> bool {
        replace(&mut self.vertex_buffer, buffer)
    }

    pub fn set_index_buffer(&mut self, buffer: BufferHandle) -> bool {
        replace(&mut self.index_buffer, buffer)
    }

    pub fn set_texture(&mut self, unit: u32, texture: TextureHandle) -> bool {
        let unit = unit as usize;
        if self.textures.len() <= unit {
            self.textures.resize(unit + 1, None);
        }
        replace(&mut self.textures[unit], texture)
    }

    pub fn set_phase(&mut self, phase: DrawPhase) -> bool {
        replace(&mut self.phase, phase)
    }

    /// Drops every reference to a destroyed buffer.
    pub fn forget_buffer(&mut self, buffer: BufferHandle) {
        if self.vertex_buffer == Some(buffer) {
            self.vertex_buffer = None;
        }
        if self.index_buffer == Some(buffer) {
            self.index_buffer = None;
        }
    }

    /// Drops every reference to a destroyed texture.
    pub fn forget_texture(&mut self, texture: TextureHandle) {
        for unit in &mut self.textures {
            if *unit == Some(texture) {
                *unit = None;
            }
        }
    }

    pub fn forget_program(&mut self, program: ProgramHandle) {
        if self.program == Some(program) {
            self.program = None;
        }
    }

    pub fn clear(&mut self) {
        *self = Self::default();
    }
}

fn replace<T: PartialEq>(slot: &mut Option<T>, value: T) -> bool {
    if slot.as_ref() == Some(&value) {
        return false;
    }
    *slot = Some(value);
    true
}

/// The backend together with the binding cache and shared quad indices.
///
/// Binds issued here skip the backend when the cached value already matches.
/// Flushing pending geometry before a state change is the renderer's job.
pub struct GpuState {
    backend: Box<dyn GraphicsBackend>,
    cache: StateCache,
    quads: QuadIndexBuffer,
    fence_policy: FencePolicy,
}

impl GpuState {
    pub fn new(backend: Box<dyn GraphicsBackend>, fence_policy: FencePolicy) -> Self {
        Self {
            backend,
            cache: StateCache::default(),
            quads: QuadIndexBuffer::new(),
            fence_policy,
        }
    }

    /// Raw backend access for resource creation and uploads.
    #[inline]
    pub fn backend(&mut self) -> &mut dyn GraphicsBackend {
        self.backend.as_mut()
    }

    #[inline]
    pub fn cache(&self) -> &StateCache {
        &self.cache
    }

    #[inline]
    pub fn fence_policy(&self) -> &FencePolicy {
        &self.fence_policy
    }

    /// Grows the shared quad index buffer to cover `quads` quads.
    pub fn ensure_quads(&mut self, quads: usize) {
        let quads = u32::try_from(quads).unwrap_or(u32::MAX / 6);
        if self.quads.ensure(self.backend.as_mut(), quads) {
            // The old handle is gone; the next draw must bind the new one.
            self.cache.index_buffer = None;
        }
    }

    pub fn bind_quad_indices(&mut self) {
        if let Some(buffer) = self.quads.handle() {
            if self.cache.set_index_buffer(buffer) {
                self.backend.bind_index_buffer(buffer);
            }
        }
    }

    pub fn bind_vertex_buffer(&mut self, buffer: BufferHandle, stride: u64) {
        if self.cache.set_vertex_buffer(buffer) {
            self.backend.bind_vertex_buffer(buffer, stride);
        }
    }

    pub fn use_program(&mut self, program: ProgramHandle) {
        if self.cache.set_program(program) {
            self.backend.use_program(program);
        }
    }

    pub fn bind_texture(&mut self, unit: u32, texture: TextureHandle) {
        if self.cache.set_texture(unit, texture) {
            self.backend.bind_texture(unit, texture);
        }
    }

    pub fn set_phase(&mut self, phase: DrawPhase) {
        if self.cache.set_phase(phase) {
            self.backend.set_phase(phase);
        }
    }

    pub fn destroy_buffer(&mut self, buffer: BufferHandle) {
        self.cache.forget_buffer(buffer);
        self.backend.destroy_buffer(buffer);
    }

    pub fn destroy_texture(&mut self, texture: TextureHandle) {
        self.cache.forget_texture(texture);
        self.backend.destroy_texture(texture);
    }

    pub fn destroy_program(&mut self, program: ProgramHandle) {
        self.cache.forget_program(program);
        self.backend.destroy_program(program);
    }

    /// Releases the shared index buffer and forgets all cached bindings.
    pub fn release(&mut self) {
        self.quads.dispose(self.backend.as_mut());
        self.cache.clear();
    }
}
