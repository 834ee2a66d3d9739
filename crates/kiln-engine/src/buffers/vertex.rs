use bytemuck::{Pod, Zeroable};

/// A plain-data vertex that can be copied byte-for-byte into a GPU buffer.
pub trait Vertex: Pod + std::fmt::Debug + 'static {
    /// Shader locations, in the order the program declares them.
    const ATTRIBUTES: &'static [wgpu::VertexAttribute];

    /// Size of one vertex in bytes.
    const STRIDE: u64 = std::mem::size_of::<Self>() as u64;
}

/// Vertex layout used by sprites.
///
/// `colour` is straight (non-premultiplied) RGBA; the sprite shader
/// premultiplies after sampling.
#[repr(C)]
#[derive(Debug, Copy, Clone, Default, PartialEq, Pod, Zeroable)]
pub struct TexturedVertex {
    pub position: [f32; 2],
    pub colour: [f32; 4],
    pub uv: [f32; 2],
    pub depth: f32,
}

impl TexturedVertex {
    const ATTRS: [wgpu::VertexAttribute; 4] = wgpu::vertex_attr_array![
        0 => Float32x2, // position
        1 => Float32x4, // colour
        2 => Float32x2, // uv
        3 => Float32    // depth
    ];
}

impl Vertex for TexturedVertex {
    const ATTRIBUTES: &'static [wgpu::VertexAttribute] = &Self::ATTRS;
}
