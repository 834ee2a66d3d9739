use std::time::Duration;

use winit::window::{Window, WindowId};

use crate::coords::{ColorRgba, Viewport};
use crate::device::{Gpu, SurfaceErrorAction, WgpuBackend};
use crate::error::RenderError;
use crate::render::RendererContext;
use crate::window::RuntimeCtx;

use super::app::AppControl;

/// Per-window handles and immutable window metadata.
pub struct WindowCtx<'a> {
    pub id: WindowId,
    pub window: &'a Window,
}

impl<'a> WindowCtx<'a> {
    /// Logical window size; the scene's root viewport.
    pub fn viewport(&self) -> Viewport {
        let phys = self.window.inner_size();
        let logi: winit::dpi::LogicalSize<f64> = phys.to_logical(self.window.scale_factor());
        Viewport::new(logi.width as f32, logi.height as f32)
    }
}

/// Per-frame context passed to `core::App::on_frame`.
///
/// Lifetimes:
/// - `'a` is the duration of the callback invocation
/// - `'w` is the window-borrow lifetime carried by `Gpu<'w>`
pub struct FrameCtx<'a, 'w> {
    pub window: WindowCtx<'a>,
    pub gpu: &'a mut Gpu<'w>,
    pub renderer: &'a mut RendererContext,
    /// Time since the previous frame of this window.
    pub dt: Duration,
    pub frame_index: u64,
    pub runtime: &'a mut RuntimeCtx,
}

impl<'a, 'w> FrameCtx<'a, 'w> {
    /// Acquires the next surface image, runs `draw` between
    /// `begin_frame(clear)` and `end_frame`, then presents.
    ///
    /// Draw errors are logged and the frame is still closed and presented.
    /// Only an unrecoverable surface error ends the app.
    pub fn render<F>(&mut self, clear: ColorRgba, draw: F) -> AppControl
    where
        F: FnOnce(&mut RendererContext) -> Result<(), RenderError>,
    {
        let viewport = self.window.viewport();
        if !viewport.is_valid() {
            return AppControl::Continue;
        }

        let frame = match self.gpu.acquire() {
            Ok(frame) => frame,
            Err(err) => {
                return match self.gpu.handle_surface_error(err) {
                    SurfaceErrorAction::Fatal => AppControl::Exit,
                    _ => AppControl::Continue,
                };
            }
        };

        let physical = self.gpu.size();
        match self.renderer.backend_mut::<WgpuBackend>() {
            Some(backend) => backend.set_target(frame.view.clone(), (physical.width, physical.height), viewport),
            None => log::warn!("renderer is not backed by wgpu; frame has no target"),
        }

        if let Err(err) = self.renderer.begin_frame(clear) {
            log::error!("begin_frame failed: {err}");
            return AppControl::Continue;
        }

        if let Err(err) = draw(&mut *self.renderer) {
            log::error!("frame {} draw failed: {err}", self.frame_index);
        }

        if let Err(err) = self.renderer.end_frame() {
            log::error!("end_frame failed: {err}");
        }

        self.gpu.present(frame);
        AppControl::Continue
    }
}
