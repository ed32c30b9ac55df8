//! Vertex types uploaded to GPU buffers.
//!
//! All types are `#[repr(C)]` and [`Pod`] so slices of them can be handed to
//! `buffer_data_u8_slice` through [`bytemuck::cast_slice`].

use bytemuck::{Pod, Zeroable};

/// A vertex of the shared cone mesh.
///
/// `x`/`y` lie on the unit circle (or at the origin for the apex) and `z` is
/// the relative depth: `-1` at the apex, `+1` on the base ring.
#[derive(Copy, Clone, Debug, PartialEq, Pod, Zeroable)]
#[repr(C)]
pub struct ConeVertex {
    /// `[x, y, z]` in cone-local space.
    pub position: [f32; 3],
}

/// Per-instance translation of the cone mesh, i.e. one site position in
/// normalized device coordinates.
#[derive(Copy, Clone, Debug, PartialEq, Pod, Zeroable)]
#[repr(C)]
pub struct SiteOffset {
    /// `[x, y]` in `[-1, 1]`.
    pub position: [f32; 2],
}

/// A corner of the full-viewport quad used by the presentation pass.
#[derive(Copy, Clone, Debug, PartialEq, Pod, Zeroable)]
#[repr(C)]
pub struct QuadVertex {
    /// `[x, y]` at a viewport corner.
    pub position: [f32; 2],
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn vertex_layouts_are_tightly_packed() {
        assert_eq!(std::mem::size_of::<ConeVertex>(), 12);
        assert_eq!(std::mem::size_of::<SiteOffset>(), 8);
        assert_eq!(std::mem::size_of::<QuadVertex>(), 8);
    }

    #[test]
    fn cone_vertices_cast_to_flat_floats() {
        let verts = [
            ConeVertex {
                position: [0.0, 0.0, -1.0],
            },
            ConeVertex {
                position: [1.0, 0.0, 1.0],
            },
        ];
        let flat: &[f32] = bytemuck::cast_slice(&verts);
        assert_eq!(flat, &[0.0, 0.0, -1.0, 1.0, 0.0, 1.0]);
    }
}
