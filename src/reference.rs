//! CPU rendition of both passes.
//!
//! [`rasterize_labels`] evaluates, for every pixel center, the depth of each
//! tessellated cone exactly as the GL label pass produces it and keeps the
//! nearest under a strict less-than test in instance order. Since the cone
//! faces are planar, the window depth of cone `i` at point `p` is the
//! polygonal norm of `p - site_i` divided by the cone radius; a pixel is
//! covered while that value is below the cleared far depth of `1.0`.
//!
//! [`present`] applies the blit shader's texel mapping.

use std::f32::consts::{PI, TAU};

use crate::config::VoronoiConfig;
use crate::error::{Result, VoronoiError};
use crate::geometry::{Sites, MIN_CONE_RESOLUTION};
use crate::label::LabelImage;

/// Rasterize the label pass on the CPU.
///
/// Produces the same image as the GPU label pass for the same configuration,
/// except that exact depth ties (which the GPU may resolve either way) go to
/// the lower site index.
///
/// # Errors
///
/// Returns a validation error if `config` is invalid or the sites collide
/// with its sentinel.
pub fn rasterize_labels(config: &VoronoiConfig, sites: &Sites) -> Result<LabelImage> {
    config.validate()?;
    config.check_site_count(sites.len())?;

    let cone = ConeProfile::new(config.cone_resolution, config.cone_radius)?;
    let (width, height) = (config.width, config.height);
    let mut labels = LabelImage::filled(width, height, config.sentinel);

    log::debug!(
        "Reference label pass: {width}x{height}, {} sites, resolution {}",
        sites.len(),
        config.cone_resolution
    );

    for y in 0..height {
        for x in 0..width {
            let p = pixel_center(x, y, width, height);
            let mut best = 1.0_f32;
            let mut winner = None;
            for (i, [sx, sy]) in (0_u32..).zip(sites.iter()) {
                let depth = cone.depth([p[0] - sx, p[1] - sy]);
                if depth < best {
                    best = depth;
                    winner = Some(i);
                }
            }
            if let Some(i) = winner {
                labels.set_label(x, y, i);
            }
        }
    }

    Ok(labels)
}

/// Present `labels` into a `width × height` target the way the blit pass
/// does: one texel per pixel, clamped at the texture's far edges, never
/// filtered.
#[must_use]
pub fn present(labels: &LabelImage, width: u32, height: u32) -> LabelImage {
    let mut frame = LabelImage::filled(width, height, 0);
    if labels.width() == 0 || labels.height() == 0 {
        return frame;
    }
    for y in 0..height {
        // Fragment rows count up from the bottom of the target; texel rows
        // count up from the bottom of the texture.
        let gl_row = height - 1 - y;
        let texel_row = gl_row.min(labels.height() - 1);
        let src_y = labels.height() - 1 - texel_row;
        for x in 0..width {
            let src_x = x.min(labels.width() - 1);
            frame.set_label(x, y, labels.label_at(src_x, src_y));
        }
    }
    frame
}

/// Normalized device coordinates of the center of pixel `(x, y)`, with row 0
/// at the top of the image.
///
/// # Panics
///
/// Panics if `(x, y)` lies outside a `width` x `height` image.
#[must_use]
#[expect(clippy::cast_precision_loss)]
pub fn pixel_center(x: u32, y: u32, width: u32, height: u32) -> [f32; 2] {
    assert!(
        x < width && y < height,
        "pixel ({x}, {y}) outside {width}x{height} image"
    );
    let gl_row = height - 1 - y;
    [
        (x as f32 + 0.5) / width as f32 * 2.0 - 1.0,
        (gl_row as f32 + 0.5) / height as f32 * 2.0 - 1.0,
    ]
}

/// Depth profile of the tessellated cone.
struct ConeProfile {
    segments: usize,
    sector: f32,
    /// Apothem of the base polygon, i.e. `radius * cos(π / n)`.
    apothem: f32,
}

impl ConeProfile {
    #[expect(clippy::cast_precision_loss)]
    fn new(segments: usize, radius: f32) -> Result<Self> {
        if segments < MIN_CONE_RESOLUTION {
            return Err(VoronoiError::ConeResolution(segments));
        }
        let n = segments as f32;
        Ok(Self {
            segments,
            sector: TAU / n,
            apothem: radius * (PI / n).cos(),
        })
    }

    /// Window-space depth in `[0, ∞)` of the cone surface at offset `d` from
    /// its apex. Values `>= 1.0` lie outside the cone's base.
    #[expect(
        clippy::cast_possible_truncation,
        clippy::cast_sign_loss,
        clippy::cast_precision_loss
    )]
    fn depth(&self, [dx, dy]: [f32; 2]) -> f32 {
        if dx == 0.0 && dy == 0.0 {
            return 0.0;
        }
        let angle = dy.atan2(dx).rem_euclid(TAU);
        let k = ((angle / self.sector) as usize).min(self.segments - 1);
        let mid = (k as f32 + 0.5) * self.sector;
        let (sin, cos) = mid.sin_cos();
        (dx * cos + dy * sin) / self.apothem
    }
}
