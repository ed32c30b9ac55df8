//! Discrete Voronoi diagrams computed by the GPU rasterizer, using OpenGL via
//! [glow].
//!
//! Every site is drawn as an instance of one shared cone whose apex sits at
//! the site and whose surface slopes away from the viewer. With depth testing
//! enabled, the fragment that survives at each pixel belongs to the cone
//! nearest the viewer, which is the site nearest the pixel in the plane. The
//! vertex shader colors each instance with its own index, so the rendered
//! color attachment is a label image: every pixel holds the index of its
//! nearest site.
//!
//! [`VoronoiRenderer`] owns that label pass and a presentation pass which
//! blits the labels to the screen one texel per pixel, never filtered.
//!
//! # Features
//!
//! - **Instanced cones**: one `glDrawArraysInstanced` call for all sites; the
//!   tessellation resolution trades circularity of the metric for vertices.
//! - **24-bit labels**: site indices are packed little-endian into RGB8, for
//!   up to 2^24 sites, with a configurable sentinel for uncovered pixels.
//! - **Exact presentation** via `texelFetch`, independent of texture
//!   filtering.
//! - **CPU reference** ([`reference`]) that reproduces both passes without a
//!   GL context.
//! - **TOML configuration** through [`VoronoiConfig`].
//!
//! # Coverage
//!
//! Pixels farther than [`VoronoiConfig::cone_radius`] from every site keep
//! the sentinel label. Choosing a radius large enough for the site layout is
//! up to the caller; [`FULL_COVERAGE_RADIUS`] always suffices.
//!
//! # Safety
//!
//! Creating and using a [`VoronoiRenderer`] requires a valid, current OpenGL
//! 3.3 core context. All rendering methods are `unsafe` because they issue
//! raw GL calls.
//!
//! [glow]: https://docs.rs/glow

mod config;
mod error;
mod geometry;
mod label;
pub mod reference;
mod types;

#[cfg(feature = "glow")]
mod render;
#[cfg(feature = "glow")]
mod scope;
#[cfg(feature = "glow")]
pub mod shaders;
#[cfg(feature = "glow")]
mod target;

pub use config::{VoronoiConfig, FULL_COVERAGE_RADIUS, HALF_DIAGONAL};
pub use error::{Result, VoronoiError};
pub use geometry::{cone_vertices, Sites, MIN_CONE_RESOLUTION, QUAD_VERTICES};
pub use label::{
    decode_label, encode_label, label_color, LabelImage, DEFAULT_SENTINEL, MAX_LABELS,
};
#[cfg(feature = "glow")]
pub use render::{check_context, VoronoiRenderer};
pub use types::{ConeVertex, QuadVertex, SiteOffset};
