//! Error types for setup and configuration.
//!
//! Every failure the crate can report happens once, before steady-state
//! rendering begins. None of them are retried; the embedding application is
//! expected to report the message and exit.

use thiserror::Error;

/// Result type alias for fallible crate operations.
pub type Result<T> = std::result::Result<T, VoronoiError>;

/// Errors produced while configuring or provisioning a Voronoi render.
#[derive(Debug, Error)]
pub enum VoronoiError {
    /// The current OpenGL context does not meet the minimum version.
    #[error(
        "OpenGL context is too old (require {required_major}.{required_minor} core, \
         got {major}.{minor}{})",
        es_suffix(.embedded)
    )]
    ContextTooOld {
        /// Reported major version.
        major: u32,
        /// Reported minor version.
        minor: u32,
        /// Whether the context is an embedded (ES) context.
        embedded: bool,
        /// Minimum supported major version.
        required_major: u32,
        /// Minimum supported minor version.
        required_minor: u32,
    },

    /// A shader stage failed to compile. Carries the compiler log.
    #[error("shader compile error: {0}")]
    ShaderCompile(String),

    /// A shader program failed to link. Carries the linker log.
    #[error("program link error: {0}")]
    ProgramLink(String),

    /// A uniform the renderer depends on is absent from a linked program.
    #[error("uniform `{0}` missing from shader program")]
    MissingUniform(&'static str),

    /// The driver refused to create a GL object.
    #[error("GL resource creation failed: {0}")]
    Resource(String),

    /// The color/depth attachment combination was rejected by the driver.
    #[error("framebuffer is incomplete (status {0:#06x})")]
    IncompleteFramebuffer(u32),

    /// The cone tessellation has fewer than three segments.
    #[error("cone resolution must be at least 3, got {0}")]
    ConeResolution(usize),

    /// A site coordinate is not a finite value in `[-1, 1]`.
    #[error("site {index} at ({x}, {y}) lies outside [-1, 1]")]
    SiteOutOfRange {
        /// Ordinal of the offending site.
        index: usize,
        /// Its x coordinate.
        x: f32,
        /// Its y coordinate.
        y: f32,
    },

    /// More sites than a 24-bit label can distinguish.
    #[error("{count} sites exceed the {max} labels a 24-bit color can encode")]
    TooManySites {
        /// Requested site count.
        count: usize,
        /// Largest encodable label count.
        max: u32,
    },

    /// A configuration value is out of its valid range.
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    /// A configuration file is not valid TOML for [`VoronoiConfig`].
    ///
    /// [`VoronoiConfig`]: crate::VoronoiConfig
    #[error("failed to parse configuration: {0}")]
    ConfigParse(#[from] toml::de::Error),

    /// Generic I/O failure while reading configuration.
    #[error(transparent)]
    Io(#[from] std::io::Error),
}

#[allow(clippy::trivially_copy_pass_by_ref)] // thiserror binds fields by reference
fn es_suffix(embedded: &bool) -> &'static str {
    if *embedded {
        " ES"
    } else {
        ""
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn context_too_old_mentions_both_versions() {
        let err = VoronoiError::ContextTooOld {
            major: 2,
            minor: 1,
            embedded: false,
            required_major: 3,
            required_minor: 3,
        };
        assert_eq!(
            err.to_string(),
            "OpenGL context is too old (require 3.3 core, got 2.1)"
        );
    }

    #[test]
    fn embedded_context_is_flagged() {
        let err = VoronoiError::ContextTooOld {
            major: 3,
            minor: 0,
            embedded: true,
            required_major: 3,
            required_minor: 3,
        };
        assert!(err.to_string().ends_with("got 3.0 ES)"));
    }

    #[test]
    fn incomplete_framebuffer_formats_status_as_hex() {
        let err = VoronoiError::IncompleteFramebuffer(0x8CDD);
        assert_eq!(err.to_string(), "framebuffer is incomplete (status 0x8cdd)");
    }
}
