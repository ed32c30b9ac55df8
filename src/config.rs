//! Render configuration with TOML support.
//!
//! Every field has a default, so a partial file (for example only
//! `site_count = 500`) is valid.

use std::f32::consts::SQRT_2;
use std::path::Path;

use rand::rngs::StdRng;
use rand::SeedableRng;
use serde::{Deserialize, Serialize};

use crate::error::{Result, VoronoiError};
use crate::geometry::{Sites, MIN_CONE_RESOLUTION};
use crate::label::{DEFAULT_SENTINEL, MAX_LABELS};

/// Cone radius that covers the whole viewport from its center.
pub const HALF_DIAGONAL: f32 = SQRT_2;

/// Cone radius that covers the whole viewport from any point inside it.
pub const FULL_COVERAGE_RADIUS: f32 = 2.0 * SQRT_2;

/// Parameters of a single Voronoi render.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct VoronoiConfig {
    /// Number of segments in the cone's base ring. Higher values approach
    /// the Euclidean metric; low values give a polygonal one.
    pub cone_resolution: usize,
    /// Number of randomly placed sites for [`random_sites`](Self::random_sites).
    pub site_count: usize,
    /// Label target width in pixels.
    pub width: u32,
    /// Label target height in pixels.
    pub height: u32,
    /// Base radius of every cone in normalized device units.
    ///
    /// Pixels farther than this from every site stay at the sentinel label.
    pub cone_radius: f32,
    /// Label written where no cone covers a pixel.
    pub sentinel: u32,
    /// Seed for reproducible site placement. `None` draws from OS entropy.
    pub seed: Option<u64>,
}

impl Default for VoronoiConfig {
    fn default() -> Self {
        Self {
            cone_resolution: 64,
            site_count: 100,
            width: 400,
            height: 400,
            cone_radius: 1.0,
            sentinel: DEFAULT_SENTINEL,
            seed: None,
        }
    }
}

impl VoronoiConfig {
    /// Load and validate a configuration from a TOML file.
    ///
    /// # Errors
    ///
    /// Returns an I/O, parse, or validation error.
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let config = Self::from_toml_str(&content)?;
        log::info!(
            "Loaded Voronoi config from {}: {}x{}, {} sites",
            path.display(),
            config.width,
            config.height,
            config.site_count
        );
        Ok(config)
    }

    /// Parse and validate a configuration from TOML text.
    ///
    /// # Errors
    ///
    /// Returns [`VoronoiError::ConfigParse`] for malformed TOML or any error
    /// from [`validate`](Self::validate).
    pub fn from_toml_str(content: &str) -> Result<Self> {
        let config: Self = toml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    /// Check every field against its valid range.
    ///
    /// # Errors
    ///
    /// Returns [`VoronoiError::ConeResolution`], [`VoronoiError::TooManySites`]
    /// or [`VoronoiError::InvalidConfig`] describing the first bad field.
    pub fn validate(&self) -> Result<()> {
        if self.cone_resolution < MIN_CONE_RESOLUTION {
            return Err(VoronoiError::ConeResolution(self.cone_resolution));
        }
        if self.width == 0 || self.height == 0 {
            return Err(VoronoiError::InvalidConfig(format!(
                "target size {}x{} has no pixels",
                self.width, self.height
            )));
        }
        if i32::try_from(self.width).is_err() || i32::try_from(self.height).is_err() {
            return Err(VoronoiError::InvalidConfig(format!(
                "target size {}x{} exceeds the GL size limit",
                self.width, self.height
            )));
        }
        if !(self.cone_radius.is_finite() && self.cone_radius > 0.0) {
            return Err(VoronoiError::InvalidConfig(format!(
                "cone radius must be positive, got {}",
                self.cone_radius
            )));
        }
        if self.sentinel >= MAX_LABELS {
            return Err(VoronoiError::InvalidConfig(format!(
                "sentinel {:#x} does not fit in 24 bits",
                self.sentinel
            )));
        }
        self.check_site_count(self.site_count)
    }

    /// Check that `count` sites can be labelled without colliding with the
    /// sentinel.
    ///
    /// # Errors
    ///
    /// Returns [`VoronoiError::TooManySites`] past the 24-bit ceiling, or
    /// [`VoronoiError::InvalidConfig`] if the sentinel is a valid site index.
    pub fn check_site_count(&self, count: usize) -> Result<()> {
        if count > MAX_LABELS as usize {
            return Err(VoronoiError::TooManySites {
                count,
                max: MAX_LABELS,
            });
        }
        if (self.sentinel as usize) < count {
            return Err(VoronoiError::InvalidConfig(format!(
                "sentinel {:#x} collides with a label of {count} sites",
                self.sentinel
            )));
        }
        Ok(())
    }

    /// Place [`site_count`](Self::site_count) sites uniformly at random,
    /// seeded from [`seed`](Self::seed) when present.
    ///
    /// # Errors
    ///
    /// Returns [`VoronoiError::TooManySites`] if the count exceeds the label
    /// space.
    pub fn random_sites(&self) -> Result<Sites> {
        let mut rng = match self.seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_os_rng(),
        };
        Sites::random(self.site_count, &mut rng)
    }
}
