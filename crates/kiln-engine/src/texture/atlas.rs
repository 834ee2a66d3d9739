use image::RgbaImage;

use crate::render::GpuState;

use super::gpu_texture::Texture;
use super::packer::{AtlasError, ShelfPacker};
use super::region::TextureRegion;
use super::store::AtlasConfig;
use crate::device::PixelRect;

/// One atlas page: a mipmapped texture plus its shelf packer.
#[derive(Debug)]
pub struct TextureAtlas {
    texture: Texture,
    packer: ShelfPacker,
}

impl TextureAtlas {
    pub fn new(gpu: &mut GpuState, config: &AtlasConfig) -> Self {
        let texture = Texture::new(
            gpu,
            "kiln atlas page",
            config.page_size,
            config.page_size,
            config.mip_levels,
        );
        let padding = 1u32 << config.mip_levels.min(16);
        Self {
            texture,
            packer: ShelfPacker::new(config.page_size, config.page_size, padding),
        }
    }

    #[inline]
    pub fn texture(&self) -> &Texture {
        &self.texture
    }

    /// Packs and uploads `image`.
    ///
    /// The image lands `padding` texels inside its reserved footprint; the
    /// border around it repeats edge texels so sampling from lower mip
    /// levels does not bleed in neighbours.
    pub fn try_add(&mut self, gpu: &mut GpuState, image: &RgbaImage) -> Result<TextureRegion, AtlasError> {
        let (w, h) = image.dimensions();
        let (fx, fy) = self.packer.try_add(w, h)?;
        let padding = self.packer.padding();
        let (x, y) = (fx + padding, fy + padding);

        let transparent = self.texture.upload(gpu, image, x, y, padding);
        Ok(TextureRegion::new(
            self.texture.handle(),
            self.texture.size(),
            PixelRect::new(x, y, w, h),
            transparent,
        ))
    }

    pub fn dispose(self, gpu: &mut GpuState) {
        self.texture.dispose(gpu);
    }
}
