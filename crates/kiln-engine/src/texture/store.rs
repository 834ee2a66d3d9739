use std::collections::HashMap;

use image::{Rgba, RgbaImage};

use crate::error::RenderError;
use crate::render::GpuState;

use super::atlas::TextureAtlas;
use super::gpu_texture::Texture;
use super::packer::AtlasError;
use super::region::TextureRegion;

/// Sizing for atlas pages.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AtlasConfig {
    /// Width and height of every atlas page.
    pub page_size: u32,
    /// Mip levels below the base level. Padding around packed images is
    /// `2^mip_levels` texels.
    pub mip_levels: u32,
    /// Images this large on either axis get their own texture.
    pub large_texture_threshold: u32,
}

impl Default for AtlasConfig {
    fn default() -> Self {
        Self {
            page_size: 4096,
            mip_levels: 4,
            large_texture_threshold: 2048,
        }
    }
}

/// Named texture cache backed by atlas pages.
#[derive(Debug)]
pub struct TextureStore {
    config: AtlasConfig,
    atlases: Vec<TextureAtlas>,
    standalone: Vec<Texture>,
    regions: HashMap<String, TextureRegion>,
    blank: Option<(Texture, TextureRegion)>,
}

impl TextureStore {
    pub fn new(config: AtlasConfig) -> Self {
        Self {
            config,
            atlases: Vec::new(),
            standalone: Vec::new(),
            regions: HashMap::new(),
            blank: None,
        }
    }

    /// Creates the 1×1 white texture used by untextured drawables.
    pub fn init(&mut self, gpu: &mut GpuState) {
        if self.blank.is_some() {
            return;
        }
        let mut texture = Texture::new(gpu, "kiln blank texture", 1, 1, 0);
        texture.upload(gpu, &RgbaImage::from_pixel(1, 1, Rgba([255; 4])), 0, 0, 0);
        let region = TextureRegion::whole(&texture);
        self.blank = Some((texture, region));
    }

    pub fn blank(&self) -> Option<&TextureRegion> {
        self.blank.as_ref().map(|(_, region)| region)
    }

    pub fn get(&self, name: &str) -> Option<&TextureRegion> {
        self.regions.get(name)
    }

    #[inline]
    pub fn atlas_count(&self) -> usize {
        self.atlases.len()
    }

    #[inline]
    pub fn standalone_count(&self) -> usize {
        self.standalone.len()
    }

    /// Returns the region for `name`, uploading `image` the first time the
    /// name is seen.
    pub fn add(&mut self, gpu: &mut GpuState, name: &str, image: &RgbaImage) -> Result<TextureRegion, RenderError> {
        if let Some(region) = self.regions.get(name) {
            return Ok(region.clone());
        }

        let (w, h) = image.dimensions();
        let threshold = self.config.large_texture_threshold;
        let region = if w >= threshold || h >= threshold {
            self.add_standalone(gpu, image)?
        } else {
            self.pack(gpu, image)?
        };

        log::debug!("texture `{name}` ({w}x{h}) stored at {:?}", region.pixel_rect());
        self.regions.insert(name.to_owned(), region.clone());
        Ok(region)
    }

    fn pack(&mut self, gpu: &mut GpuState, image: &RgbaImage) -> Result<TextureRegion, AtlasError> {
        for atlas in &mut self.atlases {
            match atlas.try_add(gpu, image) {
                Err(AtlasError::Full) => continue,
                other => return other,
            }
        }

        log::info!(
            "creating atlas page {} ({}x{})",
            self.atlases.len(),
            self.config.page_size,
            self.config.page_size
        );
        let mut atlas = TextureAtlas::new(gpu, &self.config);
        match atlas.try_add(gpu, image) {
            Ok(region) => {
                self.atlases.push(atlas);
                Ok(region)
            }
            Err(err) => {
                atlas.dispose(gpu);
                Err(err)
            }
        }
    }

    fn add_standalone(&mut self, gpu: &mut GpuState, image: &RgbaImage) -> Result<TextureRegion, AtlasError> {
        let (w, h) = image.dimensions();
        if w == 0 || h == 0 {
            return Err(AtlasError::EmptyImage);
        }
        let mut texture = Texture::new(gpu, "kiln standalone texture", w, h, self.config.mip_levels);
        texture.upload(gpu, image, 0, 0, 0);
        let region = TextureRegion::whole(&texture);
        self.standalone.push(texture);
        Ok(region)
    }

    /// Releases every texture. Previously returned regions become invalid.
    pub fn dispose(&mut self, gpu: &mut GpuState) {
        for atlas in self.atlases.drain(..) {
            atlas.dispose(gpu);
        }
        for texture in self.standalone.drain(..) {
            texture.dispose(gpu);
        }
        if let Some((texture, _)) = self.blank.take() {
            texture.dispose(gpu);
        }
        self.regions.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::buffers::test_support::immediate_gpu;

    fn config() -> AtlasConfig {
        AtlasConfig {
            page_size: 64,
            mip_levels: 1,
            large_texture_threshold: 32,
        }
    }

    fn solid(w: u32, h: u32, alpha: u8) -> RgbaImage {
        RgbaImage::from_pixel(w, h, Rgba([200, 100, 50, alpha]))
    }

    #[test]
    fn same_name_returns_cached_region() {
        let (mut gpu, sim) = immediate_gpu();
        let mut store = TextureStore::new(config());

        let first = store.add(&mut gpu, "grass", &solid(8, 8, 255)).unwrap();
        let writes = sim.borrow().calls().len();
        let second = store.add(&mut gpu, "grass", &solid(16, 16, 255)).unwrap();

        assert_eq!(first, second);
        assert_eq!(sim.borrow().calls().len(), writes);
        assert_eq!(store.get("grass"), Some(&first));
    }

    #[test]
    fn large_images_get_their_own_texture() {
        let (mut gpu, _) = immediate_gpu();
        let mut store = TextureStore::new(config());

        let region = store.add(&mut gpu, "backdrop", &solid(40, 8, 255)).unwrap();
        assert_eq!(store.standalone_count(), 1);
        assert_eq!(store.atlas_count(), 0);
        assert_eq!(region.uv_rect(), crate::coords::Rect::new(0.0, 0.0, 1.0, 1.0));
    }

    #[test]
    fn full_page_spills_into_a_new_one() {
        let (mut gpu, _) = immediate_gpu();
        let mut store = TextureStore::new(config());

        // 28+4 footprint: exactly four per 64×64 page.
        let regions: Vec<_> = (0..5)
            .map(|i| store.add(&mut gpu, &format!("tile{i}"), &solid(28, 28, 255)).unwrap())
            .collect();

        assert_eq!(store.atlas_count(), 2);
        assert_eq!(regions[0].texture(), regions[3].texture());
        assert_ne!(regions[3].texture(), regions[4].texture());
    }

    #[test]
    fn image_too_large_for_any_page_leaves_no_page_behind() {
        let (mut gpu, sim) = immediate_gpu();
        let mut store = TextureStore::new(AtlasConfig {
            page_size: 64,
            mip_levels: 2,
            large_texture_threshold: 1000,
        });

        // 60 + 2*4 padding overflows a 64 page.
        let err = store.add(&mut gpu, "wide", &solid(60, 10, 255)).unwrap_err();
        assert!(matches!(err, RenderError::Atlas(AtlasError::TooLarge { padding: 4, .. })));
        assert_eq!(store.atlas_count(), 0);
        assert_eq!(sim.borrow().live_textures(), 0);
        assert!(store.get("wide").is_none());
    }

    #[test]
    fn transparency_follows_the_image() {
        let (mut gpu, _) = immediate_gpu();
        let mut store = TextureStore::new(config());
        assert!(!store.add(&mut gpu, "solid", &solid(4, 4, 255)).unwrap().has_transparency());
        assert!(store.add(&mut gpu, "glass", &solid(4, 4, 128)).unwrap().has_transparency());
    }

    #[test]
    fn blank_is_white_and_dispose_frees_everything() {
        let (mut gpu, sim) = immediate_gpu();
        let mut store = TextureStore::new(config());
        store.init(&mut gpu);
        store.add(&mut gpu, "a", &solid(4, 4, 255)).unwrap();
        store.add(&mut gpu, "b", &solid(40, 40, 255)).unwrap();

        let blank = store.blank().unwrap().texture();
        assert_eq!(sim.borrow().texture(blank).unwrap().pixel(0, 0), [255; 4]);

        store.dispose(&mut gpu);
        assert_eq!(sim.borrow().live_textures(), 0);
        assert!(store.get("a").is_none());
    }
}
