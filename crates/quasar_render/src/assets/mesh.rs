//! Mesh data: positions, texture coordinates and indices

use super::AssetError;

/// Interleaved vertex as laid out in the vertex buffer
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Vertex {
    /// Object-space position
    pub position: [f32; 3],
    /// Texture coordinate
    pub uv: [f32; 2],
}

unsafe impl bytemuck::Zeroable for Vertex {}
unsafe impl bytemuck::Pod for Vertex {}

impl Vertex {
    /// Create a vertex
    pub const fn new(position: [f32; 3], uv: [f32; 2]) -> Self {
        Self { position, uv }
    }
}

/// Indexed triangle list
#[derive(Debug, Clone, Default, PartialEq)]
pub struct MeshData {
    /// Vertex array
    pub vertices: Vec<Vertex>,
    /// Triangle indices into `vertices`
    pub indices: Vec<u32>,
}

impl MeshData {
    /// Build a mesh from separate position, UV and index arrays
    pub fn from_arrays(
        positions: &[[f32; 3]],
        uvs: &[[f32; 2]],
        indices: Vec<u32>,
    ) -> Result<Self, AssetError> {
        if positions.len() != uvs.len() {
            return Err(AssetError::InvalidData(format!(
                "{} positions but {} texture coordinates",
                positions.len(),
                uvs.len()
            )));
        }

        let vertices = positions
            .iter()
            .zip(uvs)
            .map(|(position, uv)| Vertex::new(*position, *uv))
            .collect();

        let mesh = Self { vertices, indices };
        mesh.validate()?;
        Ok(mesh)
    }

    /// Unit quad in the XY plane facing +Z
    pub fn quad() -> Self {
        Self {
            vertices: vec![
                Vertex::new([-0.5, -0.5, 0.0], [0.0, 1.0]),
                Vertex::new([0.5, -0.5, 0.0], [1.0, 1.0]),
                Vertex::new([0.5, 0.5, 0.0], [1.0, 0.0]),
                Vertex::new([-0.5, 0.5, 0.0], [0.0, 0.0]),
            ],
            indices: vec![0, 1, 2, 2, 3, 0],
        }
    }

    /// Check index bounds and triangle completeness
    pub fn validate(&self) -> Result<(), AssetError> {
        if self.vertices.is_empty() || self.indices.is_empty() {
            return Err(AssetError::InvalidData("mesh has no geometry".to_string()));
        }
        if self.indices.len() % 3 != 0 {
            return Err(AssetError::InvalidData(format!(
                "index count {} is not a multiple of 3",
                self.indices.len()
            )));
        }
        let vertex_count = self.vertices.len();
        if let Some(bad) = self.indices.iter().find(|&&i| i as usize >= vertex_count) {
            return Err(AssetError::InvalidData(format!(
                "index {bad} out of range for {vertex_count} vertices"
            )));
        }
        Ok(())
    }

    /// Vertex data as bytes
    pub fn vertex_bytes(&self) -> &[u8] {
        bytemuck::cast_slice(&self.vertices)
    }

    /// Index data as bytes
    pub fn index_bytes(&self) -> &[u8] {
        bytemuck::cast_slice(&self.indices)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_vertex_is_tightly_packed() {
        assert_eq!(std::mem::size_of::<Vertex>(), 20);
        assert_eq!(MeshData::quad().vertex_bytes().len(), 80);
        assert_eq!(MeshData::quad().index_bytes().len(), 24);
    }

    #[test]
    fn test_quad_is_valid() {
        assert!(MeshData::quad().validate().is_ok());
    }

    #[test]
    fn test_from_arrays_rejects_mismatched_lengths() {
        let result = MeshData::from_arrays(&[[0.0; 3]; 3], &[[0.0; 2]; 2], vec![0, 1, 2]);
        assert!(matches!(result, Err(AssetError::InvalidData(_))));
    }

    #[test]
    fn test_out_of_range_index_rejected() {
        let result = MeshData::from_arrays(&[[0.0; 3]; 3], &[[0.0; 2]; 3], vec![0, 1, 3]);
        assert!(result.is_err());
    }

    #[test]
    fn test_partial_triangle_rejected() {
        let mesh = MeshData {
            vertices: vec![Vertex::default(); 3],
            indices: vec![0, 1],
        };
        assert!(mesh.validate().is_err());
    }
}
