//! Recording backend with a simulated GPU consumer.
//!
//! Every call is logged. Draws, buffer uploads and fences are queued as GPU
//! work. In immediate mode the work runs as soon as it is queued; in deferred
//! mode it runs only when a fence is waited on (one item per poll) or when
//! [`GpuSim::finish`] is called. A draw reads vertex memory at execution
//! time, so a CPU write that lands too early corrupts what the draw records.

use std::any::Any;
use std::cell::RefCell;
use std::collections::{HashMap, VecDeque};
use std::rc::Rc;
use std::time::Duration;

use crate::coords::ColorRgba;
use crate::error::RenderError;

use super::backend::{
    BufferDesc, BufferHandle, BufferKind, DrawPhase, FenceHandle, FenceStatus, GraphicsBackend,
    PixelRect, ProgramDesc, ProgramHandle, TextureDesc, TextureHandle,
};

#[derive(Debug, Clone, PartialEq)]
pub(crate) enum Call {
    CreateProgram(ProgramHandle),
    DestroyProgram(ProgramHandle),
    CreateBuffer { buffer: BufferHandle, kind: BufferKind, size: u64, persistent: bool },
    DestroyBuffer(BufferHandle),
    UploadBuffer { buffer: BufferHandle, offset: u64, len: usize },
    WriteMapped { buffer: BufferHandle, offset: u64, len: usize },
    CreateTexture { texture: TextureHandle, width: u32, height: u32, mip_levels: u32 },
    DestroyTexture(TextureHandle),
    WriteTexture { texture: TextureHandle, region: PixelRect },
    GenerateMipmaps(TextureHandle),
    UseProgram(ProgramHandle),
    BindTexture { unit: u32, texture: TextureHandle },
    BindVertexBuffer(BufferHandle),
    BindIndexBuffer(BufferHandle),
    SetPhase(DrawPhase),
    DrawIndexed { first_index: u32, index_count: u32 },
    InsertFence(FenceHandle),
    ClientWait(FenceHandle),
    DeleteFence(FenceHandle),
    BeginFrame,
    EndFrame,
}

/// A draw as the simulated GPU consumed it.
#[derive(Debug, Clone)]
pub(crate) struct ExecutedDraw {
    pub program: Option<ProgramHandle>,
    pub texture: Option<TextureHandle>,
    pub phase: DrawPhase,
    pub vertex_buffer: Option<BufferHandle>,
    pub first_index: u32,
    pub index_count: u32,
    /// Referenced vertices in first-use order, read at execution time.
    pub vertex_bytes: Vec<u8>,
}

impl ExecutedDraw {
    pub fn vertices<V: bytemuck::Pod>(&self) -> Vec<V> {
        bytemuck::pod_collect_to_vec(&self.vertex_bytes)
    }
}

#[derive(Debug, Clone)]
struct DrawState {
    program: Option<ProgramHandle>,
    texture: Option<TextureHandle>,
    phase: DrawPhase,
    vertex_buffer: Option<(BufferHandle, u64)>,
    index_buffer: Option<BufferHandle>,
}

#[derive(Debug)]
enum Work {
    Draw { state: DrawState, first_index: u32, index_count: u32 },
    Upload { buffer: BufferHandle, offset: u64, bytes: Vec<u8> },
    Fence(FenceHandle),
}

#[derive(Debug)]
pub(crate) struct MockTexture {
    pub width: u32,
    pub height: u32,
    pub mip_levels: u32,
    pub pixels: Vec<u8>,
}

impl MockTexture {
    pub fn pixel(&self, x: u32, y: u32) -> [u8; 4] {
        let i = ((y * self.width + x) * 4) as usize;
        [self.pixels[i], self.pixels[i + 1], self.pixels[i + 2], self.pixels[i + 3]]
    }
}

#[derive(Debug)]
pub(crate) struct GpuSim {
    deferred: bool,
    next_id: u32,
    calls: Vec<Call>,
    memory: HashMap<BufferHandle, Vec<u8>>,
    textures: HashMap<TextureHandle, MockTexture>,
    fences: HashMap<FenceHandle, bool>,
    queue: VecDeque<Work>,
    executed: Vec<ExecutedDraw>,
    state: DrawState,
}

impl GpuSim {
    fn new(deferred: bool) -> Self {
        Self {
            deferred,
            next_id: 1,
            calls: Vec::new(),
            memory: HashMap::new(),
            textures: HashMap::new(),
            fences: HashMap::new(),
            queue: VecDeque::new(),
            executed: Vec::new(),
            state: DrawState {
                program: None,
                texture: None,
                phase: DrawPhase::Opaque,
                vertex_buffer: None,
                index_buffer: None,
            },
        }
    }

    pub fn calls(&self) -> &[Call] {
        &self.calls
    }

    pub fn clear_calls(&mut self) {
        self.calls.clear();
    }

    pub fn count(&self, pred: impl Fn(&Call) -> bool) -> usize {
        self.calls.iter().filter(|c| pred(c)).count()
    }

    pub fn executed_draws(&self) -> &[ExecutedDraw] {
        &self.executed
    }

    pub fn texture(&self, texture: TextureHandle) -> Option<&MockTexture> {
        self.textures.get(&texture)
    }

    pub fn live_buffers(&self) -> usize {
        self.memory.len()
    }

    pub fn live_textures(&self) -> usize {
        self.textures.len()
    }

    pub fn is_signalled(&self, fence: FenceHandle) -> bool {
        self.fences.get(&fence).copied().unwrap_or(false)
    }

    pub fn pending_work(&self) -> usize {
        self.queue.len()
    }

    /// Runs every queued work item.
    pub fn finish(&mut self) {
        while self.step() {}
    }

    fn alloc(&mut self) -> u32 {
        let id = self.next_id;
        self.next_id += 1;
        id
    }

    fn submit(&mut self, work: Work) {
        self.queue.push_back(work);
        if !self.deferred {
            self.finish();
        }
    }

    fn step(&mut self) -> bool {
        let Some(work) = self.queue.pop_front() else {
            return false;
        };
        match work {
            Work::Draw { state, first_index, index_count } => {
                let vertex_bytes = self.read_vertices(&state, first_index, index_count);
                self.executed.push(ExecutedDraw {
                    program: state.program,
                    texture: state.texture,
                    phase: state.phase,
                    vertex_buffer: state.vertex_buffer.map(|(b, _)| b),
                    first_index,
                    index_count,
                    vertex_bytes,
                });
            }
            Work::Upload { buffer, offset, bytes } => {
                write_into(self.memory.entry(buffer).or_default(), offset, &bytes);
            }
            Work::Fence(fence) => {
                self.fences.insert(fence, true);
            }
        }
        true
    }

    fn read_vertices(&self, state: &DrawState, first_index: u32, index_count: u32) -> Vec<u8> {
        let (Some((vb, stride)), Some(ib)) = (state.vertex_buffer, state.index_buffer) else {
            return Vec::new();
        };
        let (Some(vertices), Some(indices)) = (self.memory.get(&vb), self.memory.get(&ib)) else {
            return Vec::new();
        };

        let stride = stride as usize;
        let mut seen = Vec::new();
        let mut out = Vec::new();
        for i in first_index..first_index + index_count {
            let at = i as usize * 4;
            let index = u32::from_le_bytes([indices[at], indices[at + 1], indices[at + 2], indices[at + 3]]);
            if seen.contains(&index) {
                continue;
            }
            seen.push(index);
            let start = index as usize * stride;
            out.extend_from_slice(&vertices[start..start + stride]);
        }
        out
    }
}

fn write_into(memory: &mut Vec<u8>, offset: u64, bytes: &[u8]) {
    let start = offset as usize;
    let end = start + bytes.len();
    if memory.len() < end {
        memory.resize(end, 0);
    }
    memory[start..end].copy_from_slice(bytes);
}

pub(crate) struct MockBackend {
    sim: Rc<RefCell<GpuSim>>,
}

impl MockBackend {
    /// GPU work executes as soon as it is issued.
    pub fn immediate() -> (Self, Rc<RefCell<GpuSim>>) {
        Self::with_mode(false)
    }

    /// GPU work executes only when fences are waited on or the sim is finished.
    pub fn deferred() -> (Self, Rc<RefCell<GpuSim>>) {
        Self::with_mode(true)
    }

    fn with_mode(deferred: bool) -> (Self, Rc<RefCell<GpuSim>>) {
        let sim = Rc::new(RefCell::new(GpuSim::new(deferred)));
        (Self { sim: Rc::clone(&sim) }, sim)
    }

    fn record(&self, call: Call) {
        self.sim.borrow_mut().calls.push(call);
    }
}

impl GraphicsBackend for MockBackend {
    fn create_program(&mut self, _desc: &ProgramDesc<'_>) -> Result<ProgramHandle, RenderError> {
        let program = ProgramHandle::from_raw(self.sim.borrow_mut().alloc());
        self.record(Call::CreateProgram(program));
        Ok(program)
    }

    fn destroy_program(&mut self, program: ProgramHandle) {
        self.record(Call::DestroyProgram(program));
    }

    fn create_buffer(&mut self, desc: &BufferDesc) -> BufferHandle {
        let mut sim = self.sim.borrow_mut();
        let buffer = BufferHandle::from_raw(sim.alloc());
        sim.memory.insert(buffer, vec![0; desc.size as usize]);
        sim.calls.push(Call::CreateBuffer {
            buffer,
            kind: desc.kind,
            size: desc.size,
            persistent: desc.persistent,
        });
        buffer
    }

    fn destroy_buffer(&mut self, buffer: BufferHandle) {
        let mut sim = self.sim.borrow_mut();
        sim.memory.remove(&buffer);
        sim.calls.push(Call::DestroyBuffer(buffer));
    }

    fn upload_buffer(&mut self, buffer: BufferHandle, offset: u64, bytes: &[u8]) {
        let mut sim = self.sim.borrow_mut();
        sim.calls.push(Call::UploadBuffer { buffer, offset, len: bytes.len() });
        sim.submit(Work::Upload { buffer, offset, bytes: bytes.to_vec() });
    }

    fn write_mapped(&mut self, buffer: BufferHandle, offset: u64, bytes: &[u8]) {
        let mut sim = self.sim.borrow_mut();
        sim.calls.push(Call::WriteMapped { buffer, offset, len: bytes.len() });
        write_into(sim.memory.entry(buffer).or_default(), offset, bytes);
    }

    fn create_texture(&mut self, desc: &TextureDesc) -> TextureHandle {
        let mut sim = self.sim.borrow_mut();
        let texture = TextureHandle::from_raw(sim.alloc());
        sim.textures.insert(
            texture,
            MockTexture {
                width: desc.width,
                height: desc.height,
                mip_levels: desc.mip_levels,
                pixels: vec![0; (desc.width * desc.height * 4) as usize],
            },
        );
        sim.calls.push(Call::CreateTexture {
            texture,
            width: desc.width,
            height: desc.height,
            mip_levels: desc.mip_levels,
        });
        texture
    }

    fn destroy_texture(&mut self, texture: TextureHandle) {
        let mut sim = self.sim.borrow_mut();
        sim.textures.remove(&texture);
        sim.calls.push(Call::DestroyTexture(texture));
    }

    fn write_texture(&mut self, texture: TextureHandle, region: PixelRect, rgba: &[u8]) {
        let mut sim = self.sim.borrow_mut();
        if let Some(tex) = sim.textures.get_mut(&texture) {
            let row_bytes = (region.width * 4) as usize;
            for row in 0..region.height {
                let src = row as usize * row_bytes;
                let dst = (((region.y + row) * tex.width + region.x) * 4) as usize;
                tex.pixels[dst..dst + row_bytes].copy_from_slice(&rgba[src..src + row_bytes]);
            }
        }
        sim.calls.push(Call::WriteTexture { texture, region });
    }

    fn generate_mipmaps(&mut self, texture: TextureHandle) {
        self.record(Call::GenerateMipmaps(texture));
    }

    fn use_program(&mut self, program: ProgramHandle) {
        let mut sim = self.sim.borrow_mut();
        sim.state.program = Some(program);
        sim.calls.push(Call::UseProgram(program));
    }

    fn bind_texture(&mut self, unit: u32, texture: TextureHandle) {
        let mut sim = self.sim.borrow_mut();
        if unit == 0 {
            sim.state.texture = Some(texture);
        }
        sim.calls.push(Call::BindTexture { unit, texture });
    }

    fn bind_vertex_buffer(&mut self, buffer: BufferHandle, stride: u64) {
        let mut sim = self.sim.borrow_mut();
        sim.state.vertex_buffer = Some((buffer, stride));
        sim.calls.push(Call::BindVertexBuffer(buffer));
    }

    fn bind_index_buffer(&mut self, buffer: BufferHandle) {
        let mut sim = self.sim.borrow_mut();
        sim.state.index_buffer = Some(buffer);
        sim.calls.push(Call::BindIndexBuffer(buffer));
    }

    fn set_phase(&mut self, phase: DrawPhase) {
        let mut sim = self.sim.borrow_mut();
        sim.state.phase = phase;
        sim.calls.push(Call::SetPhase(phase));
    }

    fn draw_indexed(&mut self, first_index: u32, index_count: u32) {
        let mut sim = self.sim.borrow_mut();
        sim.calls.push(Call::DrawIndexed { first_index, index_count });
        let state = sim.state.clone();
        sim.submit(Work::Draw { state, first_index, index_count });
    }

    fn insert_fence(&mut self) -> FenceHandle {
        let mut sim = self.sim.borrow_mut();
        let fence = FenceHandle::from_raw(sim.alloc());
        sim.fences.insert(fence, false);
        sim.calls.push(Call::InsertFence(fence));
        sim.submit(Work::Fence(fence));
        fence
    }

    fn client_wait(&mut self, fence: FenceHandle, _timeout: Duration) -> FenceStatus {
        let mut sim = self.sim.borrow_mut();
        sim.calls.push(Call::ClientWait(fence));
        if !sim.is_signalled(fence) {
            // Each poll gives the simulated GPU time for one work item.
            let progressed = sim.step();
            assert!(
                progressed || sim.is_signalled(fence),
                "fence {fence:?} can never signal: no GPU work is pending"
            );
        }
        if sim.is_signalled(fence) {
            FenceStatus::Signalled
        } else {
            FenceStatus::TimedOut
        }
    }

    fn delete_fence(&mut self, fence: FenceHandle) {
        let mut sim = self.sim.borrow_mut();
        sim.fences.remove(&fence);
        sim.calls.push(Call::DeleteFence(fence));
    }

    fn begin_frame(&mut self, _clear: ColorRgba) {
        self.record(Call::BeginFrame);
    }

    fn end_frame(&mut self) {
        self.record(Call::EndFrame);
    }

    fn as_any_mut(&mut self) -> &mut dyn Any {
        self
    }
}
