use std::any::{Any, TypeId};
use std::collections::HashMap;
use std::rc::Rc;

use image::RgbaImage;

use crate::buffers::{AnyBatch, VertexBatch};
use crate::coords::ColorRgba;
use crate::device::{DrawPhase, GraphicsBackend, ProgramDesc, ProgramHandle, TextureHandle};
use crate::error::RenderError;
use crate::texture::{TextureRegion, TextureStore};

use super::batch_tree::DrawableBatchTree;
use super::config::RendererConfig;
use super::depth::DrawDepth;
use super::drawable::{DrawInfo, Drawable};
use super::state::{GpuState, StateCache};

struct QueuedDraw {
    drawable: Rc<dyn Drawable>,
    info: DrawInfo,
}

/// Counters for the frame being built (or the last finished one).
#[derive(Debug, Copy, Clone, Default, PartialEq, Eq)]
pub struct FrameStats {
    pub queued: u32,
    pub opaque: u32,
    pub translucent: u32,
    pub batched: u32,
}

/// Owns every GPU resource the renderer uses and schedules draws.
///
/// Typical frame:
/// 1) `begin_frame(clear)`
/// 2) `queue_drawable(..)` front to back, usually via
///    [`SceneTree::queue_draw`](crate::scene::SceneTree::queue_draw)
/// 3) `end_frame()`
///
/// Opaque drawables draw as they are queued (or are grouped into the batch
/// tree when enabled). Translucent ones are held back and drawn in reverse
/// queue order once every opaque drawable is down.
pub struct RendererContext {
    gpu: GpuState,
    config: RendererConfig,
    textures: TextureStore,

    batches: HashMap<TypeId, Box<dyn AnyBatch>>,
    active: Option<TypeId>,
    used: Vec<TypeId>,

    depth: DrawDepth,
    deferred: Vec<QueuedDraw>,
    batch_tree: DrawableBatchTree<QueuedDraw>,
    stats: FrameStats,

    initialized: bool,
    in_frame: bool,
}

impl RendererContext {
    pub fn new(backend: Box<dyn GraphicsBackend>, config: RendererConfig) -> Self {
        Self {
            gpu: GpuState::new(backend, config.fence.clone()),
            textures: TextureStore::new(config.atlas.clone()),
            batches: HashMap::new(),
            active: None,
            used: Vec::new(),
            depth: DrawDepth::new(config.depth.clone()),
            deferred: Vec::new(),
            batch_tree: DrawableBatchTree::new(),
            stats: FrameStats::default(),
            initialized: false,
            in_frame: false,
            config,
        }
    }

    /// Creates the shared quad index buffer and the blank texture.
    pub fn init(&mut self) -> Result<(), RenderError> {
        if self.initialized {
            return Err(RenderError::AlreadyInitialized);
        }
        self.gpu.ensure_quads(self.config.batch.vertices_per_buffer / 4);
        self.textures.init(&mut self.gpu);
        self.initialized = true;
        log::debug!("renderer initialized");
        Ok(())
    }

    /// Releases batches, textures and the index buffer. Safe to call more
    /// than once; also runs on drop.
    pub fn shutdown(&mut self) {
        if !self.initialized {
            return;
        }
        for (_, mut batch) in self.batches.drain() {
            batch.dispose_any(&mut self.gpu);
        }
        self.active = None;
        self.used.clear();
        self.deferred.clear();
        self.batch_tree.clear();
        self.textures.dispose(&mut self.gpu);
        self.gpu.release();
        self.initialized = false;
        self.in_frame = false;
        log::debug!("renderer shut down");
    }

    #[inline]
    pub fn is_initialized(&self) -> bool {
        self.initialized
    }

    #[inline]
    pub fn config(&self) -> &RendererConfig {
        &self.config
    }

    #[inline]
    pub fn state(&self) -> &StateCache {
        self.gpu.cache()
    }

    #[inline]
    pub fn stats(&self) -> FrameStats {
        self.stats
    }

    /// Downcasts the backend, e.g. to retarget a
    /// [`WgpuBackend`](crate::device::WgpuBackend) at the next surface frame.
    pub fn backend_mut<T: Any>(&mut self) -> Option<&mut T> {
        self.gpu.backend().as_any_mut().downcast_mut::<T>()
    }

    fn ensure_init(&self) -> Result<(), RenderError> {
        if self.initialized {
            Ok(())
        } else {
            Err(RenderError::NotInitialized)
        }
    }

    // ── resources ───────────────────────────────────────────────────────────

    pub fn create_program(&mut self, desc: &ProgramDesc<'_>) -> Result<ProgramHandle, RenderError> {
        self.ensure_init()?;
        let program = self.gpu.backend().create_program(desc)?;
        log::debug!("program `{}` created as {:?}", desc.label, program);
        Ok(program)
    }

    pub fn destroy_program(&mut self, program: ProgramHandle) -> Result<(), RenderError> {
        if self.gpu.cache().program() == Some(program) {
            self.flush()?;
        }
        self.gpu.destroy_program(program);
        Ok(())
    }

    /// Uploads `image` under `name`, or returns the region already stored
    /// under that name.
    pub fn add_texture(&mut self, name: &str, image: &RgbaImage) -> Result<TextureRegion, RenderError> {
        self.ensure_init()?;
        self.textures.add(&mut self.gpu, name, image)
    }

    pub fn texture(&self, name: &str) -> Option<TextureRegion> {
        self.textures.get(name).cloned()
    }

    /// 1×1 white texture for untextured drawables.
    pub fn blank_texture(&self) -> Result<TextureRegion, RenderError> {
        self.textures.blank().cloned().ok_or(RenderError::NotInitialized)
    }

    // ── state ───────────────────────────────────────────────────────────────

    pub fn bind_shader(&mut self, program: ProgramHandle) -> Result<(), RenderError> {
        if self.gpu.cache().program() == Some(program) {
            return Ok(());
        }
        self.flush()?;
        self.gpu.use_program(program);
        Ok(())
    }

    pub fn bind_texture(&mut self, unit: u32, texture: TextureHandle) -> Result<(), RenderError> {
        if self.gpu.cache().texture(unit) == Some(texture) {
            return Ok(());
        }
        self.flush()?;
        self.gpu.bind_texture(unit, texture);
        Ok(())
    }

    fn set_phase(&mut self, phase: DrawPhase) -> Result<(), RenderError> {
        if self.gpu.cache().phase() == Some(phase) {
            return Ok(());
        }
        self.flush()?;
        self.gpu.set_phase(phase);
        Ok(())
    }

    // ── batches ─────────────────────────────────────────────────────────────

    /// Makes `B` the active batch, creating it on first use.
    pub fn use_batch<B: VertexBatch>(&mut self) -> Result<(), RenderError> {
        let id = TypeId::of::<B>();
        if self.active == Some(id) {
            return Ok(());
        }
        self.ensure_init()?;
        self.flush()?;

        if !self.batches.contains_key(&id) {
            let batch = B::create(&mut self.gpu, &self.config.batch)?;
            log::debug!("created batch {}", std::any::type_name::<B>());
            self.batches.insert(id, Box::new(batch));
        }
        if !self.used.contains(&id) {
            self.used.push(id);
        }
        self.active = Some(id);
        Ok(())
    }

    /// Appends a vertex to the active batch, which must be `B`.
    pub fn add_vertex<B: VertexBatch>(&mut self, vertex: B::Vertex) -> Result<(), RenderError> {
        let requested = std::any::type_name::<B>();
        let Some(batch) = self.active.and_then(|id| self.batches.get_mut(&id)) else {
            return Err(RenderError::BatchMismatch {
                requested,
                active: "none",
            });
        };
        if batch.batch_type() != TypeId::of::<B>() {
            return Err(RenderError::BatchMismatch {
                requested,
                active: batch.type_name(),
            });
        }
        let Some(batch) = batch.as_any_mut().downcast_mut::<B>() else {
            return Err(RenderError::BatchMismatch {
                requested,
                active: "unknown",
            });
        };
        batch.add_vertex(&mut self.gpu, vertex)
    }

    /// Draws whatever the active batch holds.
    pub fn flush(&mut self) -> Result<(), RenderError> {
        if let Some(batch) = self.active.and_then(|id| self.batches.get_mut(&id)) {
            batch.draw_any(&mut self.gpu)?;
        }
        Ok(())
    }

    // ── frame ───────────────────────────────────────────────────────────────

    pub fn begin_frame(&mut self, clear: ColorRgba) -> Result<(), RenderError> {
        self.ensure_init()?;
        if self.in_frame {
            return Err(RenderError::FrameInProgress);
        }

        self.gpu.backend().begin_frame(clear);
        self.depth.reset();
        for id in self.used.drain(..) {
            if let Some(batch) = self.batches.get_mut(&id) {
                batch.reset_any(&mut self.gpu);
            }
        }
        self.active = None;
        self.deferred.clear();
        self.batch_tree.clear();
        self.stats = FrameStats::default();
        self.gpu.set_phase(DrawPhase::Opaque);

        self.in_frame = true;
        log::trace!("frame begun");
        Ok(())
    }

    /// Schedules `drawable` with the next depth.
    ///
    /// Queue front-most drawables first: earlier drawables get smaller
    /// depths and win the depth test.
    pub fn queue_drawable(&mut self, drawable: Rc<dyn Drawable>, info: DrawInfo) -> Result<(), RenderError> {
        if !self.in_frame {
            return Err(RenderError::NoFrame);
        }

        let depth = match self.depth.next() {
            Ok(depth) => depth,
            Err(err) => {
                log::warn!("{err}");
                return Err(err);
            }
        };
        let info = DrawInfo { depth, ..info };
        self.stats.queued += 1;

        if !info.colour.is_opaque() || drawable.has_transparency() {
            self.stats.translucent += 1;
            self.deferred.push(QueuedDraw { drawable, info });
            return Ok(());
        }

        self.stats.opaque += 1;
        if self.config.batch_opaque {
            if let Some(key) = drawable.batch_key(self) {
                self.stats.batched += 1;
                self.batch_tree.add(key, QueuedDraw { drawable, info });
                return Ok(());
            }
        }
        drawable.draw(self, &info)
    }

    /// Draws batched and deferred drawables, flushes and finishes the frame.
    ///
    /// The frame is closed even when a draw fails; the first error is
    /// returned.
    pub fn end_frame(&mut self) -> Result<(), RenderError> {
        if !self.in_frame {
            return Err(RenderError::NoFrame);
        }

        let result = self.drain_queued();
        self.gpu.backend().end_frame();
        self.in_frame = false;
        log::trace!("frame ended: {:?}", self.stats);
        result
    }

    fn drain_queued(&mut self) -> Result<(), RenderError> {
        for (_, queued) in self.batch_tree.drain() {
            queued.drawable.draw(self, &queued.info)?;
        }

        if !self.deferred.is_empty() {
            self.set_phase(DrawPhase::Translucent)?;
            while let Some(queued) = self.deferred.pop() {
                queued.drawable.draw(self, &queued.info)?;
            }
        }

        self.flush()
    }
}

impl Drop for RendererContext {
    fn drop(&mut self) {
        self.shutdown();
    }
}

#[cfg(test)]
mod tests {
    use std::cell::RefCell;

    use super::*;
    use crate::buffers::{BatchConfig, PooledBatch, RingBatch, TexturedVertex};
    use crate::coords::{Affine, Quad, Vec2};
    use crate::device::mock::{Call, GpuSim, MockBackend};
    use crate::render::BatchKey;

    fn renderer(config: RendererConfig) -> (RendererContext, Rc<RefCell<GpuSim>>) {
        let (backend, sim) = MockBackend::immediate();
        let mut renderer = RendererContext::new(Box::new(backend), config);
        renderer.init().unwrap();
        (renderer, sim)
    }

    fn small_config() -> RendererConfig {
        RendererConfig {
            batch: BatchConfig {
                vertices_per_buffer: 64,
                max_buffers: 4,
            },
            ..RendererConfig::default()
        }
    }

    /// Records the order drawables are drawn in.
    struct Probe {
        name: &'static str,
        transparent: bool,
        key: Option<BatchKey>,
        log: Rc<RefCell<Vec<(&'static str, f32)>>>,
    }

    impl Drawable for Probe {
        fn draw(&self, _renderer: &mut RendererContext, info: &DrawInfo) -> Result<(), RenderError> {
            self.log.borrow_mut().push((self.name, info.depth));
            Ok(())
        }

        fn has_transparency(&self) -> bool {
            self.transparent
        }

        fn batch_key(&self, _renderer: &RendererContext) -> Option<BatchKey> {
            self.key
        }
    }

    fn probe(name: &'static str, transparent: bool, log: &Rc<RefCell<Vec<(&'static str, f32)>>>) -> Rc<dyn Drawable> {
        Rc::new(Probe {
            name,
            transparent,
            key: None,
            log: Rc::clone(log),
        })
    }

    fn info(alpha: f32) -> DrawInfo {
        DrawInfo::new(
            Quad::from_size(Vec2::new(8.0, 8.0), &Affine::IDENTITY),
            ColorRgba::WHITE.with_alpha(alpha),
        )
    }

    fn names(log: &Rc<RefCell<Vec<(&'static str, f32)>>>) -> Vec<&'static str> {
        log.borrow().iter().map(|(n, _)| *n).collect()
    }

    // ── lifecycle ───────────────────────────────────────────────────────────

    #[test]
    fn init_twice_fails() {
        let (mut renderer, _) = renderer(small_config());
        assert!(matches!(renderer.init(), Err(RenderError::AlreadyInitialized)));
    }

    #[test]
    fn frames_need_init() {
        let (backend, _) = MockBackend::immediate();
        let mut renderer = RendererContext::new(Box::new(backend), small_config());
        assert!(matches!(
            renderer.begin_frame(ColorRgba::BLACK),
            Err(RenderError::NotInitialized)
        ));
    }

    #[test]
    fn frame_calls_must_pair_up() {
        let (mut renderer, _) = renderer(small_config());
        assert!(matches!(renderer.end_frame(), Err(RenderError::NoFrame)));
        renderer.begin_frame(ColorRgba::BLACK).unwrap();
        assert!(matches!(
            renderer.begin_frame(ColorRgba::BLACK),
            Err(RenderError::FrameInProgress)
        ));
        renderer.end_frame().unwrap();
    }

    #[test]
    fn shutdown_releases_everything_and_is_idempotent() {
        let (mut renderer, sim) = renderer(small_config());
        renderer
            .add_texture("dot", &RgbaImage::from_pixel(2, 2, image::Rgba([255; 4])))
            .unwrap();
        renderer.use_batch::<PooledBatch<TexturedVertex>>().unwrap();

        renderer.shutdown();
        renderer.shutdown();
        assert!(!renderer.is_initialized());
        let sim = sim.borrow();
        assert_eq!(sim.live_buffers(), 0);
        assert_eq!(sim.live_textures(), 0);
    }

    #[test]
    fn drop_releases_gpu_resources() {
        let (renderer, sim) = renderer(small_config());
        drop(renderer);
        assert_eq!(sim.borrow().live_textures(), 0);
        assert_eq!(sim.borrow().live_buffers(), 0);
    }

    // ── batches ─────────────────────────────────────────────────────────────

    #[test]
    fn use_batch_is_idempotent() {
        let (mut renderer, sim) = renderer(small_config());
        renderer.use_batch::<PooledBatch<TexturedVertex>>().unwrap();
        let created = sim.borrow().count(|c| matches!(c, Call::CreateBuffer { .. }));
        renderer.use_batch::<PooledBatch<TexturedVertex>>().unwrap();
        assert_eq!(sim.borrow().count(|c| matches!(c, Call::CreateBuffer { .. })), created);
    }

    #[test]
    fn vertices_for_another_batch_are_rejected() {
        let (mut renderer, _) = renderer(small_config());
        assert!(matches!(
            renderer.add_vertex::<PooledBatch<TexturedVertex>>(TexturedVertex::default()),
            Err(RenderError::BatchMismatch { active: "none", .. })
        ));

        renderer.use_batch::<RingBatch<TexturedVertex>>().unwrap();
        assert!(matches!(
            renderer.add_vertex::<PooledBatch<TexturedVertex>>(TexturedVertex::default()),
            Err(RenderError::BatchMismatch { .. })
        ));
        renderer
            .add_vertex::<RingBatch<TexturedVertex>>(TexturedVertex::default())
            .unwrap();
    }

    #[test]
    fn switching_batches_flushes_the_old_one() {
        let (mut renderer, sim) = renderer(small_config());
        renderer.use_batch::<PooledBatch<TexturedVertex>>().unwrap();
        for _ in 0..4 {
            renderer
                .add_vertex::<PooledBatch<TexturedVertex>>(TexturedVertex::default())
                .unwrap();
        }
        assert!(sim.borrow().executed_draws().is_empty());

        renderer.use_batch::<RingBatch<TexturedVertex>>().unwrap();
        assert_eq!(sim.borrow().executed_draws().len(), 1);
    }

    #[test]
    fn changing_texture_flushes_but_rebinding_does_not() {
        let (mut renderer, sim) = renderer(small_config());
        renderer.use_batch::<PooledBatch<TexturedVertex>>().unwrap();
        let t1 = TextureHandle::from_raw(100);
        let t2 = TextureHandle::from_raw(101);

        renderer.bind_texture(0, t1).unwrap();
        for _ in 0..4 {
            renderer
                .add_vertex::<PooledBatch<TexturedVertex>>(TexturedVertex::default())
                .unwrap();
        }
        renderer.bind_texture(0, t1).unwrap();
        assert!(sim.borrow().executed_draws().is_empty());

        renderer.bind_texture(0, t2).unwrap();
        let sim = sim.borrow();
        assert_eq!(sim.executed_draws().len(), 1);
        assert_eq!(sim.executed_draws()[0].texture, Some(t1));
    }

    // ── scheduling ──────────────────────────────────────────────────────────

    #[test]
    fn opaque_draws_immediately_translucent_after_in_reverse() {
        let (mut renderer, _) = renderer(small_config());
        let log = Rc::new(RefCell::new(Vec::new()));

        renderer.begin_frame(ColorRgba::BLACK).unwrap();
        renderer.queue_drawable(probe("A", false, &log), info(1.0)).unwrap();
        renderer.queue_drawable(probe("B", false, &log), info(0.5)).unwrap();
        renderer.queue_drawable(probe("C", false, &log), info(1.0)).unwrap();
        assert_eq!(names(&log), vec!["A", "C"]);
        renderer.end_frame().unwrap();

        assert_eq!(names(&log), vec!["A", "C", "B"]);
        let depths: Vec<f32> = log.borrow().iter().map(|(_, d)| *d).collect();
        let step = renderer.config().depth.step;
        assert_eq!(depths, vec![0.0, 2.0 * step, step]);
    }

    #[test]
    fn translucent_drawables_pop_last_in_first_out() {
        let (mut renderer, _) = renderer(small_config());
        let log = Rc::new(RefCell::new(Vec::new()));

        renderer.begin_frame(ColorRgba::BLACK).unwrap();
        renderer.queue_drawable(probe("B1", true, &log), info(1.0)).unwrap();
        renderer.queue_drawable(probe("B2", true, &log), info(1.0)).unwrap();
        renderer.end_frame().unwrap();

        assert_eq!(names(&log), vec!["B2", "B1"]);
    }

    #[test]
    fn translucent_pass_switches_phase() {
        let (mut renderer, sim) = renderer(small_config());
        let log = Rc::new(RefCell::new(Vec::new()));

        renderer.begin_frame(ColorRgba::BLACK).unwrap();
        renderer.queue_drawable(probe("glass", true, &log), info(1.0)).unwrap();
        renderer.end_frame().unwrap();

        let phases: Vec<DrawPhase> = sim
            .borrow()
            .calls()
            .iter()
            .filter_map(|c| match c {
                Call::SetPhase(p) => Some(*p),
                _ => None,
            })
            .collect();
        assert_eq!(phases, vec![DrawPhase::Opaque, DrawPhase::Translucent]);
    }

    #[test]
    fn depth_saturation_fails_the_drawable() {
        let mut config = small_config();
        config.depth = crate::render::DepthConfig {
            initial: 0.0,
            step: 0.5,
            max: 1.0,
        };
        let (mut renderer, _) = renderer(config);
        let log = Rc::new(RefCell::new(Vec::new()));

        renderer.begin_frame(ColorRgba::BLACK).unwrap();
        for _ in 0..3 {
            renderer.queue_drawable(probe("ok", false, &log), info(1.0)).unwrap();
        }
        assert!(matches!(
            renderer.queue_drawable(probe("late", false, &log), info(1.0)),
            Err(RenderError::DepthSaturated { capacity: 3 })
        ));
        renderer.end_frame().unwrap();

        renderer.begin_frame(ColorRgba::BLACK).unwrap();
        renderer.queue_drawable(probe("fresh", false, &log), info(1.0)).unwrap();
    }

    #[test]
    fn batch_tree_groups_opaque_drawables() {
        let mut config = small_config();
        config.batch_opaque = true;
        let (mut renderer, _) = renderer(config);
        let log = Rc::new(RefCell::new(Vec::new()));

        let keyed = |name, program, texture| -> Rc<dyn Drawable> {
            Rc::new(Probe {
                name,
                transparent: false,
                key: Some(BatchKey {
                    program: ProgramHandle::from_raw(program),
                    texture: TextureHandle::from_raw(texture),
                }),
                log: Rc::clone(&log),
            })
        };

        renderer.begin_frame(ColorRgba::BLACK).unwrap();
        renderer.queue_drawable(keyed("p1t1", 1, 1), info(1.0)).unwrap();
        renderer.queue_drawable(keyed("p2t1", 2, 1), info(1.0)).unwrap();
        renderer.queue_drawable(keyed("p1t2", 1, 2), info(1.0)).unwrap();
        renderer.queue_drawable(keyed("p1t1b", 1, 1), info(1.0)).unwrap();
        renderer.queue_drawable(probe("free", false, &log), info(1.0)).unwrap();
        assert_eq!(names(&log), vec!["free"]);
        renderer.end_frame().unwrap();

        assert_eq!(names(&log), vec!["free", "p1t1", "p1t1b", "p1t2", "p2t1"]);
        assert_eq!(renderer.stats().batched, 4);
    }
}
