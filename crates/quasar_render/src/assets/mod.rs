//! CPU-side asset data handed to the renderer
//!
//! The renderer only consumes decoded bytes: vertex/index arrays and raw
//! pixel buffers. Decoding files into these types happens here.

mod mesh;
mod texture;

pub use mesh::{MeshData, Vertex};
pub use texture::TextureData;

use thiserror::Error;

/// Asset loading errors
#[derive(Error, Debug)]
pub enum AssetError {
    /// The file could not be read or decoded
    #[error("Failed to load asset: {0}")]
    LoadFailed(String),

    /// The decoded data is inconsistent
    #[error("Invalid asset data: {0}")]
    InvalidData(String),
}
