use std::marker::PhantomData;

use crate::buffers::{PooledBatch, TexturedVertex, Vertex, VertexBatch};
use crate::coords::Vec2;
use crate::device::{ProgramDesc, ProgramHandle};
use crate::error::RenderError;
use crate::render::{BatchKey, DrawInfo, Drawable, RendererContext};
use crate::texture::TextureRegion;

/// Local UVs of the quad corners, in submission order
/// (bottom-left, top-left, top-right, bottom-right).
const CORNER_UVS: [Vec2; 4] = [
    Vec2::new(0.0, 1.0),
    Vec2::new(0.0, 0.0),
    Vec2::new(1.0, 0.0),
    Vec2::new(1.0, 1.0),
];

/// Program description for [`Sprite`]: the built-in WGSL sprite shader
/// with the [`TexturedVertex`] layout.
pub fn sprite_program() -> ProgramDesc<'static> {
    ProgramDesc {
        label: "kiln sprite",
        source: include_str!("shaders/sprite.wgsl"),
        vertex_stride: TexturedVertex::STRIDE,
        attributes: TexturedVertex::ATTRIBUTES,
    }
}

/// A textured quad tinted by the node's draw colour.
///
/// `B` selects the vertex streaming strategy.
pub struct Sprite<B = PooledBatch<TexturedVertex>> {
    program: ProgramHandle,
    texture: Option<TextureRegion>,
    _batch: PhantomData<fn() -> B>,
}

impl<B> Sprite<B>
where
    B: VertexBatch<Vertex = TexturedVertex>,
{
    /// Without a texture the renderer's blank texture is used, so the sprite
    /// shows as a solid block of its draw colour.
    pub fn new(program: ProgramHandle, texture: Option<TextureRegion>) -> Self {
        Self {
            program,
            texture,
            _batch: PhantomData,
        }
    }

    pub fn texture(&self) -> Option<&TextureRegion> {
        self.texture.as_ref()
    }
}

impl<B> Drawable for Sprite<B>
where
    B: VertexBatch<Vertex = TexturedVertex>,
{
    fn draw(&self, renderer: &mut RendererContext, info: &DrawInfo) -> Result<(), RenderError> {
        let region = match &self.texture {
            Some(region) => region.clone(),
            None => renderer.blank_texture()?,
        };

        renderer.use_batch::<B>()?;
        renderer.bind_shader(self.program)?;
        region.bind(renderer, 0)?;

        let colour = info.colour.to_array();
        for (corner, uv) in info.quad.corners().into_iter().zip(CORNER_UVS) {
            renderer.add_vertex::<B>(TexturedVertex {
                position: corner.to_array(),
                colour,
                uv: region.to_atlas_uv(uv).to_array(),
                depth: info.depth,
            })?;
        }
        Ok(())
    }

    fn has_transparency(&self) -> bool {
        self.texture.as_ref().is_some_and(TextureRegion::has_transparency)
    }

    fn batch_key(&self, renderer: &RendererContext) -> Option<BatchKey> {
        let texture = match &self.texture {
            Some(region) => region.texture(),
            None => renderer.blank_texture().ok()?.texture(),
        };
        Some(BatchKey {
            program: self.program,
            texture,
        })
    }
}

#[cfg(test)]
mod tests {
    use std::rc::Rc;

    use image::{Rgba, RgbaImage};

    use super::*;
    use crate::buffers::{BatchConfig, RingBatch};
    use crate::coords::{ColorRgba, Viewport};
    use crate::device::mock::{GpuSim, MockBackend};
    use crate::render::RendererConfig;
    use crate::scene::SceneTree;
    use std::cell::RefCell;

    fn renderer() -> (RendererContext, Rc<RefCell<GpuSim>>) {
        let (backend, sim) = MockBackend::immediate();
        let config = RendererConfig {
            batch: BatchConfig {
                vertices_per_buffer: 64,
                max_buffers: 4,
            },
            ..RendererConfig::default()
        };
        let mut renderer = RendererContext::new(Box::new(backend), config);
        renderer.init().unwrap();
        (renderer, sim)
    }

    #[test]
    fn emits_corners_with_region_uvs() {
        let (mut renderer, sim) = renderer();
        let program = renderer.create_program(&sprite_program()).unwrap();
        let region = renderer
            .add_texture("tile", &RgbaImage::from_pixel(8, 8, Rgba([255; 4])))
            .unwrap();

        let mut tree = SceneTree::new(Viewport::new(100.0, 100.0));
        let node = tree.create_drawable(Rc::new(Sprite::<PooledBatch<TexturedVertex>>::new(
            program,
            Some(region.clone()),
        )));
        tree.add_child(tree.root(), node).unwrap();
        tree.set_position(node, Vec2::new(10.0, 20.0)).unwrap();
        tree.set_size(node, Vec2::new(30.0, 40.0)).unwrap();

        renderer.begin_frame(ColorRgba::BLACK).unwrap();
        tree.queue_draw(&mut renderer).unwrap();
        renderer.end_frame().unwrap();

        let sim = sim.borrow();
        let draws = sim.executed_draws();
        assert_eq!(draws.len(), 1);
        assert_eq!(draws[0].program, Some(program));
        assert_eq!(draws[0].texture, Some(region.texture()));

        let vertices: Vec<TexturedVertex> = draws[0].vertices();
        let positions: Vec<[f32; 2]> = vertices.iter().map(|v| v.position).collect();
        assert_eq!(positions, vec![[10.0, 20.0], [10.0, 60.0], [40.0, 60.0], [40.0, 20.0]]);
        assert_eq!(vertices[0].uv, region.to_atlas_uv(Vec2::new(0.0, 1.0)).to_array());
        assert_eq!(vertices[2].uv, region.to_atlas_uv(Vec2::new(1.0, 0.0)).to_array());
        assert_eq!(vertices[0].depth, 0.0);
    }

    #[test]
    fn untextured_sprite_uses_blank_texture() {
        let (mut renderer, sim) = renderer();
        let program = renderer.create_program(&sprite_program()).unwrap();
        let sprite: Rc<dyn Drawable> = Rc::new(Sprite::<RingBatch<TexturedVertex>>::new(program, None));
        let blank = renderer.blank_texture().unwrap().texture();

        renderer.begin_frame(ColorRgba::BLACK).unwrap();
        let quad = crate::coords::Quad::from_size(Vec2::new(4.0, 4.0), &crate::coords::Affine::IDENTITY);
        renderer.queue_drawable(sprite, DrawInfo::new(quad, ColorRgba::WHITE)).unwrap();
        renderer.end_frame().unwrap();

        sim.borrow_mut().finish();
        let sim = sim.borrow();
        assert_eq!(sim.executed_draws()[0].texture, Some(blank));
    }

    #[test]
    fn transparent_texture_makes_sprite_translucent() {
        let (mut renderer, _) = renderer();
        let program = renderer.create_program(&sprite_program()).unwrap();
        let glass = renderer
            .add_texture("glass", &RgbaImage::from_pixel(2, 2, Rgba([255, 255, 255, 40])))
            .unwrap();

        let sprite = Sprite::<PooledBatch<TexturedVertex>>::new(program, Some(glass));
        assert!(sprite.has_transparency());
        let plain = Sprite::<PooledBatch<TexturedVertex>>::new(program, None);
        assert!(!plain.has_transparency());
        assert_eq!(
            plain.batch_key(&renderer).map(|k| k.texture),
            Some(renderer.blank_texture().unwrap().texture())
        );
    }
}
