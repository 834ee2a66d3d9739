use image::RgbaImage;

use crate::device::{PixelRect, TextureDesc, TextureHandle};
use crate::render::GpuState;

/// An RGBA8 GPU texture with an optional mip chain.
#[derive(Debug)]
pub struct Texture {
    handle: TextureHandle,
    width: u32,
    height: u32,
    mip_levels: u32,
    has_transparency: bool,
}

impl Texture {
    pub fn new(gpu: &mut GpuState, label: &'static str, width: u32, height: u32, mip_levels: u32) -> Self {
        let handle = gpu.backend().create_texture(&TextureDesc {
            label,
            width,
            height,
            mip_levels,
        });
        Self {
            handle,
            width,
            height,
            mip_levels,
            has_transparency: false,
        }
    }

    #[inline]
    pub fn handle(&self) -> TextureHandle {
        self.handle
    }

    #[inline]
    pub fn size(&self) -> (u32, u32) {
        (self.width, self.height)
    }

    #[inline]
    pub fn mip_levels(&self) -> u32 {
        self.mip_levels
    }

    /// Whether any upload so far contained a texel with alpha below 255.
    #[inline]
    pub fn has_transparency(&self) -> bool {
        self.has_transparency
    }

    /// Writes `image` with its top-left texel at `(x, y)`, surrounded by up
    /// to `padding` texels of repeated edge pixels on each side. Padding
    /// that would fall outside the texture is dropped.
    ///
    /// Returns whether `image` itself contains transparency.
    pub fn upload(&mut self, gpu: &mut GpuState, image: &RgbaImage, x: u32, y: u32, padding: u32) -> bool {
        let (w, h) = image.dimensions();
        if w == 0 || h == 0 {
            return false;
        }

        let left = padding.min(x);
        let top = padding.min(y);
        let right = padding.min(self.width.saturating_sub(x + w));
        let bottom = padding.min(self.height.saturating_sub(y + h));

        let block = pad_clamped(image, left, top, right, bottom);
        let region = PixelRect::new(x - left, y - top, w + left + right, h + top + bottom);
        gpu.backend().write_texture(self.handle, region, &block);

        if self.mip_levels > 0 {
            gpu.backend().generate_mipmaps(self.handle);
        }

        let transparent = image.pixels().any(|p| p[3] < u8::MAX);
        self.has_transparency |= transparent;
        transparent
    }

    pub fn dispose(self, gpu: &mut GpuState) {
        gpu.destroy_texture(self.handle);
    }
}

/// Copies `image` into a larger RGBA8 block, extending its edge texels
/// outward by the given margins.
pub(crate) fn pad_clamped(image: &RgbaImage, left: u32, top: u32, right: u32, bottom: u32) -> Vec<u8> {
    let (w, h) = image.dimensions();
    let out_w = w + left + right;
    let out_h = h + top + bottom;

    let mut out = Vec::with_capacity((out_w * out_h * 4) as usize);
    for oy in 0..out_h {
        let sy = oy.saturating_sub(top).min(h - 1);
        for ox in 0..out_w {
            let sx = ox.saturating_sub(left).min(w - 1);
            out.extend_from_slice(&image.get_pixel(sx, sy).0);
        }
    }
    out
}
