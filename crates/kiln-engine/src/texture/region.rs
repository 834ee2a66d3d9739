use crate::coords::{Rect, Vec2};
use crate::device::{PixelRect, TextureHandle};
use crate::error::RenderError;
use crate::render::RendererContext;

use super::gpu_texture::Texture;

/// A rectangle of texels inside some texture.
///
/// Regions do not own their texture; they stay valid for as long as the
/// [`TextureStore`](super::TextureStore) that produced them.
#[derive(Debug, Clone, PartialEq)]
pub struct TextureRegion {
    texture: TextureHandle,
    pixels: PixelRect,
    /// Normalised, v down (row 0 of the image at the top).
    uv: Rect,
    has_transparency: bool,
}

impl TextureRegion {
    pub fn new(texture: TextureHandle, texture_size: (u32, u32), pixels: PixelRect, has_transparency: bool) -> Self {
        let (tw, th) = (texture_size.0 as f32, texture_size.1 as f32);
        let uv = Rect::new(
            pixels.x as f32 / tw,
            pixels.y as f32 / th,
            pixels.width as f32 / tw,
            pixels.height as f32 / th,
        );
        Self {
            texture,
            pixels,
            uv,
            has_transparency,
        }
    }

    /// The whole of `texture`.
    pub fn whole(texture: &Texture) -> Self {
        let (w, h) = texture.size();
        Self::new(texture.handle(), (w, h), PixelRect::new(0, 0, w, h), texture.has_transparency())
    }

    #[inline]
    pub fn texture(&self) -> TextureHandle {
        self.texture
    }

    #[inline]
    pub fn pixel_rect(&self) -> PixelRect {
        self.pixels
    }

    /// Size in texels.
    #[inline]
    pub fn size(&self) -> (u32, u32) {
        (self.pixels.width, self.pixels.height)
    }

    #[inline]
    pub fn uv_rect(&self) -> Rect {
        self.uv
    }

    #[inline]
    pub fn has_transparency(&self) -> bool {
        self.has_transparency
    }

    /// Maps a UV in `[0,1]²` over this region into texture space.
    #[inline]
    pub fn to_atlas_uv(&self, uv: Vec2) -> Vec2 {
        self.uv.lerp(uv)
    }

    /// Binds the backing texture to `unit`, flushing pending geometry if
    /// that changes the binding.
    pub fn bind(&self, renderer: &mut RendererContext, unit: u32) -> Result<(), RenderError> {
        renderer.bind_texture(unit, self.texture)
    }
}
