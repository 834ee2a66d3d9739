use std::rc::Rc;
use std::time::Duration;

use anyhow::Result;
use image::{Rgba, RgbaImage};
use winit::event::{ElementState, WindowEvent};
use winit::keyboard::{KeyCode, PhysicalKey};
use winit::window::WindowId;

use kiln_engine::buffers::{PooledBatch, RingBatch, TexturedVertex, TripleBatch};
use kiln_engine::coords::{ColorRgba, Vec2, Viewport};
use kiln_engine::core::{App, AppControl, FrameCtx};
use kiln_engine::device::GpuInit;
use kiln_engine::logging::{init_logging, LoggingConfig};
use kiln_engine::render::{RendererConfig, RendererContext};
use kiln_engine::scene::{sprite_program, Anchor, Axes, NodeId, SceneTree, Sprite};
use kiln_engine::window::{Runtime, RuntimeConfig};
use kiln_engine::RenderError;

const CLEAR: ColorRgba = ColorRgba::new(0.06, 0.06, 0.08, 1.0);
const SPIN_DEGREES_PER_SEC: f32 = 45.0;
const STATS_EVERY: u64 = 600;

fn main() -> Result<()> {
    init_logging(LoggingConfig::default());

    let config = RuntimeConfig {
        title: "kiln studio".to_string(),
        renderer: RendererConfig {
            batch_opaque: true,
            ..RendererConfig::default()
        },
        ..RuntimeConfig::default()
    };

    Runtime::run(config, GpuInit::default(), Studio::default())
}

#[derive(Default)]
struct Studio {
    demo: Option<Demo>,
}

/// Backdrop, a spinning ring of tiles, and a translucent glow on top.
struct Demo {
    tree: SceneTree,
    spinner: NodeId,
    angle: f32,
}

impl Demo {
    fn build(renderer: &mut RendererContext) -> Result<Self, RenderError> {
        let program = renderer.create_program(&sprite_program())?;
        let checker = renderer.add_texture("checker", &checker(64, 8))?;
        let tile = renderer.add_texture("tile", &gradient(32))?;
        let glow = renderer.add_texture("glow", &glow(128))?;

        let mut tree = SceneTree::new(Viewport::new(1.0, 1.0));
        let root = tree.root();

        let backdrop = tree.create_drawable(Rc::new(Sprite::<PooledBatch<TexturedVertex>>::new(
            program,
            Some(checker),
        )));
        tree.add_child(root, backdrop)?;
        tree.set_relative_size_axes(backdrop, Axes::BOTH)?;
        tree.set_size(backdrop, Vec2::ONE)?;

        let spinner = tree.create_container();
        tree.add_child(root, spinner)?;
        tree.set_anchor(spinner, Anchor::MIDDLE_CENTRE)?;
        tree.set_origin(spinner, Anchor::MIDDLE_CENTRE)?;
        tree.set_size(spinner, Vec2::splat(240.0))?;

        let corners = [
            (Anchor::BOTTOM_LEFT, ColorRgba::from_rgba8(255, 102, 77, 255)),
            (Anchor::TOP_LEFT, ColorRgba::from_rgba8(77, 255, 128, 255)),
            (Anchor::TOP_RIGHT, ColorRgba::from_rgba8(77, 128, 255, 255)),
            (Anchor::BOTTOM_RIGHT, ColorRgba::from_rgba8(255, 230, 77, 255)),
        ];
        for (anchor, colour) in corners {
            let node = tree.create_drawable(Rc::new(Sprite::<TripleBatch<TexturedVertex>>::new(
                program,
                Some(tile.clone()),
            )));
            tree.add_child(spinner, node)?;
            tree.set_anchor(node, anchor)?;
            tree.set_origin(node, anchor)?;
            tree.set_size(node, Vec2::splat(80.0))?;
            tree.set_colour(node, colour)?;
        }

        let halo = tree.create_drawable(Rc::new(Sprite::<RingBatch<TexturedVertex>>::new(
            program,
            Some(glow),
        )));
        tree.add_child(root, halo)?;
        tree.set_anchor(halo, Anchor::MIDDLE_CENTRE)?;
        tree.set_origin(halo, Anchor::MIDDLE_CENTRE)?;
        tree.set_size(halo, Vec2::splat(320.0))?;
        tree.set_alpha(halo, 0.8)?;

        Ok(Self {
            tree,
            spinner,
            angle: 0.0,
        })
    }

    fn update(&mut self, viewport: Viewport, dt: Duration) -> Result<(), RenderError> {
        self.tree.set_viewport(viewport)?;
        self.angle = (self.angle + SPIN_DEGREES_PER_SEC * dt.as_secs_f32()) % 360.0;
        self.tree.set_rotation(self.spinner, self.angle)?;
        Ok(())
    }
}

impl App for Studio {
    fn on_init(&mut self, _window_id: WindowId, renderer: &mut RendererContext) -> Result<(), RenderError> {
        self.demo = Some(Demo::build(renderer)?);
        log::info!("studio scene built");
        Ok(())
    }

    fn on_window_event(&mut self, _window_id: WindowId, event: &WindowEvent) -> AppControl {
        match event {
            WindowEvent::KeyboardInput { event, .. }
                if event.state == ElementState::Pressed
                    && event.physical_key == PhysicalKey::Code(KeyCode::Escape) =>
            {
                AppControl::Exit
            }
            _ => AppControl::Continue,
        }
    }

    fn on_frame(&mut self, ctx: &mut FrameCtx<'_, '_>) -> AppControl {
        let Some(demo) = self.demo.as_mut() else {
            return AppControl::Exit;
        };

        if let Err(err) = demo.update(ctx.window.viewport(), ctx.dt) {
            log::error!("scene update failed: {err}");
            return AppControl::Exit;
        }

        let tree = &mut demo.tree;
        let control = ctx.render(CLEAR, |renderer| tree.queue_draw(renderer));

        if ctx.frame_index % STATS_EVERY == 0 {
            log::debug!("frame {}: {:?}", ctx.frame_index, ctx.renderer.stats());
        }
        control
    }
}

fn checker(size: u32, cell: u32) -> RgbaImage {
    RgbaImage::from_fn(size, size, |x, y| {
        if (x / cell + y / cell) % 2 == 0 {
            Rgba([38, 40, 48, 255])
        } else {
            Rgba([28, 30, 36, 255])
        }
    })
}

fn gradient(size: u32) -> RgbaImage {
    RgbaImage::from_fn(size, size, |x, y| {
        let v = 150 + ((x + y) * 105 / (2 * size.max(1))) as u8;
        Rgba([v, v, v, 255])
    })
}

fn glow(size: u32) -> RgbaImage {
    let half = size as f32 / 2.0;
    RgbaImage::from_fn(size, size, |x, y| {
        let dx = (x as f32 + 0.5 - half) / half;
        let dy = (y as f32 + 0.5 - half) / half;
        let falloff = (1.0 - (dx * dx + dy * dy).sqrt()).clamp(0.0, 1.0);
        Rgba([255, 240, 200, (falloff * falloff * 255.0) as u8])
    })
}
