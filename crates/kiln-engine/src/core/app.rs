use winit::event::WindowEvent;
use winit::window::WindowId;

use crate::error::RenderError;
use crate::render::RendererContext;

use super::ctx::FrameCtx;

/// Control directive returned by app callbacks.
#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub enum AppControl {
    Continue,
    Exit,
}

/// Application contract implemented by higher layers.
pub trait App {
    /// Called once per window, after its renderer is initialized and before
    /// the first frame. Programs and textures are created here.
    fn on_init(&mut self, window_id: WindowId, renderer: &mut RendererContext) -> Result<(), RenderError> {
        let _ = (window_id, renderer);
        Ok(())
    }

    /// Called for window events.
    fn on_window_event(&mut self, window_id: WindowId, event: &WindowEvent) -> AppControl {
        let _ = (window_id, event);
        AppControl::Continue
    }

    /// Called once per rendered frame per window.
    fn on_frame(&mut self, ctx: &mut FrameCtx<'_, '_>) -> AppControl;
}
