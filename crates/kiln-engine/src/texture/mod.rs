//! Textures, atlas packing and the named texture store.

mod atlas;
mod gpu_texture;
mod packer;
mod region;
mod store;

pub use atlas::TextureAtlas;
pub use gpu_texture::Texture;
pub use packer::{AtlasError, ShelfPacker};
pub use region::TextureRegion;
pub use store::{AtlasConfig, TextureStore};
