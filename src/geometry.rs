//! CPU-side geometry: the shared cone mesh, the presentation quad, and the
//! per-site instance offsets.

use std::f32::consts::TAU;

use rand::Rng;

use crate::error::{Result, VoronoiError};
use crate::label::MAX_LABELS;
use crate::types::{ConeVertex, QuadVertex, SiteOffset};

/// Smallest tessellation that still encloses an area.
pub const MIN_CONE_RESOLUTION: usize = 3;

/// Full-viewport quad, drawn as a 4-vertex triangle fan.
pub const QUAD_VERTICES: [QuadVertex; 4] = [
    QuadVertex {
        position: [-1.0, -1.0],
    },
    QuadVertex {
        position: [1.0, -1.0],
    },
    QuadVertex {
        position: [1.0, 1.0],
    },
    QuadVertex {
        position: [-1.0, 1.0],
    },
];

/// Build the shared cone mesh as a triangle fan of `resolution + 2` vertices.
///
/// Vertex 0 is the apex at `(0, 0, -1)`. Vertices `1..=resolution + 1` walk
/// the unit base circle at depth `+1`; the last one repeats angle zero so the
/// fan closes exactly.
///
/// # Errors
///
/// Returns [`VoronoiError::ConeResolution`] if `resolution < 3`.
pub fn cone_vertices(resolution: usize) -> Result<Vec<ConeVertex>> {
    if resolution < MIN_CONE_RESOLUTION {
        return Err(VoronoiError::ConeResolution(resolution));
    }

    let mut vertices = Vec::with_capacity(resolution + 2);
    vertices.push(ConeVertex {
        position: [0.0, 0.0, -1.0],
    });
    vertices.extend((0..=resolution).map(|i| {
        let [x, y] = ring_point(i, resolution);
        ConeVertex {
            position: [x, y, 1.0],
        }
    }));
    Ok(vertices)
}

/// Unit-circle point for base vertex `i` of a cone with `resolution`
/// segments. `i == resolution` wraps back onto `i == 0` exactly.
#[expect(clippy::cast_precision_loss)] // resolutions are far below 2^24
fn ring_point(i: usize, resolution: usize) -> [f32; 2] {
    let i = i % resolution;
    let angle = TAU * i as f32 / resolution as f32;
    [angle.cos(), angle.sin()]
}

/// Site positions in normalized device coordinates, in label order.
///
/// The ordinal of each site is its identity: site `i` is drawn as instance
/// `i` and owns label `i` in the rendered image.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Sites {
    offsets: Vec<SiteOffset>,
}

impl Sites {
    /// Place `count` sites with each coordinate drawn uniformly from
    /// `[-1, 1]`.
    ///
    /// # Errors
    ///
    /// Returns [`VoronoiError::TooManySites`] if `count` exceeds the number of
    /// labels a 24-bit color can encode.
    pub fn random<R: Rng + ?Sized>(count: usize, rng: &mut R) -> Result<Self> {
        check_count(count)?;
        let offsets = (0..count)
            .map(|_| SiteOffset {
                position: [rng.random_range(-1.0..=1.0), rng.random_range(-1.0..=1.0)],
            })
            .collect();
        Ok(Self { offsets })
    }

    /// Use caller-supplied positions, in label order.
    ///
    /// # Errors
    ///
    /// Returns [`VoronoiError::SiteOutOfRange`] for a coordinate that is not a
    /// finite value in `[-1, 1]`, or [`VoronoiError::TooManySites`] if there
    /// are more positions than encodable labels.
    pub fn from_positions<I>(positions: I) -> Result<Self>
    where
        I: IntoIterator<Item = [f32; 2]>,
    {
        let offsets = positions
            .into_iter()
            .enumerate()
            .map(|(index, [x, y])| {
                if in_device_range(x) && in_device_range(y) {
                    Ok(SiteOffset { position: [x, y] })
                } else {
                    Err(VoronoiError::SiteOutOfRange { index, x, y })
                }
            })
            .collect::<Result<Vec<_>>>()?;
        check_count(offsets.len())?;
        Ok(Self { offsets })
    }

    /// Number of sites.
    #[must_use]
    pub fn len(&self) -> usize {
        self.offsets.len()
    }

    /// Whether there are no sites at all.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.offsets.is_empty()
    }

    /// Position of site `index`, if it exists.
    #[must_use]
    pub fn get(&self, index: usize) -> Option<[f32; 2]> {
        self.offsets.get(index).map(|o| o.position)
    }

    /// Iterate over site positions in label order.
    pub fn iter(&self) -> impl ExactSizeIterator<Item = [f32; 2]> + '_ {
        self.offsets.iter().map(|o| o.position)
    }

    /// The instance attribute data, ready for upload.
    #[must_use]
    pub fn offsets(&self) -> &[SiteOffset] {
        &self.offsets
    }
}

fn in_device_range(v: f32) -> bool {
    (-1.0..=1.0).contains(&v)
}

fn check_count(count: usize) -> Result<()> {
    if count > MAX_LABELS as usize {
        return Err(VoronoiError::TooManySites {
            count,
            max: MAX_LABELS,
        });
    }
    Ok(())
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    use super::*;

    #[test]
    fn cone_has_apex_plus_closed_ring() {
        let cone = cone_vertices(64).unwrap();
        assert_eq!(cone.len(), 66);
        assert_eq!(bytemuck::cast_slice::<_, f32>(&cone).len(), 66 * 3);
        assert_eq!(cone[0].position, [0.0, 0.0, -1.0]);
        assert_eq!(cone[1].position, cone[65].position);
    }

    #[test]
    fn base_ring_is_unit_circle_at_far_depth() {
        let cone = cone_vertices(7).unwrap();
        for v in &cone[1..] {
            let [x, y, z] = v.position;
            assert!((x.hypot(y) - 1.0).abs() < 1e-6);
            assert!((z - 1.0).abs() < f32::EPSILON);
        }
    }

    #[test]
    fn ring_angles_step_evenly() {
        let cone = cone_vertices(4).unwrap();
        let expected = [[1.0, 0.0], [0.0, 1.0], [-1.0, 0.0], [0.0, -1.0], [1.0, 0.0]];
        for (v, [ex, ey]) in cone[1..].iter().zip(expected) {
            assert!((v.position[0] - ex).abs() < 1e-6, "{v:?}");
            assert!((v.position[1] - ey).abs() < 1e-6, "{v:?}");
        }
    }

    #[test]
    fn degenerate_resolutions_are_rejected() {
        for n in 0..MIN_CONE_RESOLUTION {
            assert!(matches!(
                cone_vertices(n),
                Err(VoronoiError::ConeResolution(r)) if r == n
            ));
        }
        assert!(cone_vertices(MIN_CONE_RESOLUTION).is_ok());
    }

    #[test]
    fn random_sites_stay_in_device_range() {
        let mut rng = StdRng::seed_from_u64(7);
        let sites = Sites::random(500, &mut rng).unwrap();
        assert_eq!(sites.len(), 500);
        for [x, y] in sites.iter() {
            assert!(in_device_range(x) && in_device_range(y));
        }
    }

    #[test]
    fn random_sites_are_reproducible_from_a_seed() {
        let a = Sites::random(16, &mut StdRng::seed_from_u64(42)).unwrap();
        let b = Sites::random(16, &mut StdRng::seed_from_u64(42)).unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn supplied_positions_keep_their_order() {
        let sites = Sites::from_positions([[0.5, -0.5], [-1.0, 1.0]]).unwrap();
        assert_eq!(sites.get(0), Some([0.5, -0.5]));
        assert_eq!(sites.get(1), Some([-1.0, 1.0]));
        assert_eq!(sites.get(2), None);
    }

    #[test]
    fn supplied_positions_outside_device_range_are_rejected() {
        let err = Sites::from_positions([[0.0, 0.0], [1.5, 0.0]]).unwrap_err();
        assert!(matches!(err, VoronoiError::SiteOutOfRange { index: 1, .. }));

        let err = Sites::from_positions([[f32::NAN, 0.0]]).unwrap_err();
        assert!(matches!(err, VoronoiError::SiteOutOfRange { index: 0, .. }));
    }

    #[test]
    fn site_count_is_capped_by_label_space() {
        let err = check_count(MAX_LABELS as usize + 1).unwrap_err();
        assert!(matches!(err, VoronoiError::TooManySites { .. }));
        assert!(check_count(MAX_LABELS as usize).is_ok());
    }
}
