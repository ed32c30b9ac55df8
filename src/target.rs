//! The off-screen render target the label pass draws into.

use glow::{HasContext, PixelUnpackData};

use crate::error::{Result, VoronoiError};
use crate::scope::{Binding, Scope};

/// GL internal formats, pre-cast to the `i32` that `tex_image_2d` expects.
///
/// GL constant values are small enough that the casts are always safe.
#[expect(clippy::cast_possible_wrap)]
const RGB8_INTERNAL_FORMAT: i32 = glow::RGB8 as i32;
#[expect(clippy::cast_possible_wrap)]
const DEPTH24_INTERNAL_FORMAT: i32 = glow::DEPTH_COMPONENT24 as i32;

/// Convert a `u32` to `i32` for GL API calls.
///
/// # Panics
///
/// Panics if `value > i32::MAX`. Target sizes are validated against this
/// limit before any target is created.
pub(crate) fn gl_size(value: u32) -> i32 {
    i32::try_from(value).expect("dimension exceeds i32::MAX")
}

/// A framebuffer with an RGB8 label texture and a depth texture of the same
/// size attached.
pub(crate) struct LabelTarget {
    pub(crate) framebuffer: glow::Framebuffer,
    /// Color attachment; each texel is an encoded site label.
    pub(crate) color: glow::Texture,
    /// Depth attachment; nearest cone depth per pixel.
    pub(crate) depth: glow::Texture,
    pub(crate) size: [u32; 2],
}

impl LabelTarget {
    /// Allocate both textures, attach them, and check that the driver
    /// accepts the combination.
    ///
    /// # Safety
    ///
    /// Requires a valid, current OpenGL context.
    ///
    /// # Errors
    ///
    /// Returns [`VoronoiError::Resource`] if an object cannot be created or
    /// [`VoronoiError::IncompleteFramebuffer`] with the driver's status code.
    /// Objects created before the failure are released.
    pub(crate) unsafe fn new(gl: &glow::Context, [width, height]: [u32; 2]) -> Result<Self> {
        let framebuffer = unsafe { gl.create_framebuffer() }.map_err(VoronoiError::Resource)?;
        let textures = unsafe { gl.create_texture() }.and_then(|color| {
            unsafe { gl.create_texture() }
                .map(|depth| (color, depth))
                .inspect_err(|_| unsafe { gl.delete_texture(color) })
        });
        let (color, depth) = match textures {
            Ok(textures) => textures,
            Err(e) => {
                unsafe { gl.delete_framebuffer(framebuffer) };
                return Err(VoronoiError::Resource(e));
            }
        };

        let target = Self {
            framebuffer,
            color,
            depth,
            size: [width, height],
        };

        match unsafe { target.attach(gl) } {
            Ok(()) => Ok(target),
            Err(e) => {
                unsafe { target.destroy(gl) };
                Err(e)
            }
        }
    }

    unsafe fn attach(&self, gl: &glow::Context) -> Result<()> {
        let [width, height] = self.size;
        let w = gl_size(width);
        let h = gl_size(height);

        unsafe {
            {
                let _texture = Scope::enter(
                    gl,
                    Binding::Texture2D {
                        unit: 0,
                        texture: self.color,
                    },
                );
                gl.tex_image_2d(
                    glow::TEXTURE_2D,
                    0,
                    RGB8_INTERNAL_FORMAT,
                    w,
                    h,
                    0,
                    glow::RGB,
                    glow::UNSIGNED_BYTE,
                    PixelUnpackData::Slice(None),
                );
                // The blit fetches texels by integer coordinate, so the label
                // texture may keep linear filtering for other consumers.
                set_tex_params(gl, glow::LINEAR);
            }
            {
                let _texture = Scope::enter(
                    gl,
                    Binding::Texture2D {
                        unit: 0,
                        texture: self.depth,
                    },
                );
                gl.tex_image_2d(
                    glow::TEXTURE_2D,
                    0,
                    DEPTH24_INTERNAL_FORMAT,
                    w,
                    h,
                    0,
                    glow::DEPTH_COMPONENT,
                    glow::FLOAT,
                    PixelUnpackData::Slice(None),
                );
                set_tex_params(gl, glow::NEAREST);
            }

            let _framebuffer = Scope::enter(gl, Binding::Framebuffer(Some(self.framebuffer)));
            gl.framebuffer_texture_2d(
                glow::FRAMEBUFFER,
                glow::COLOR_ATTACHMENT0,
                glow::TEXTURE_2D,
                Some(self.color),
                0,
            );
            gl.framebuffer_texture_2d(
                glow::FRAMEBUFFER,
                glow::DEPTH_ATTACHMENT,
                glow::TEXTURE_2D,
                Some(self.depth),
                0,
            );

            let status = gl.check_framebuffer_status(glow::FRAMEBUFFER);
            if status != glow::FRAMEBUFFER_COMPLETE {
                return Err(VoronoiError::IncompleteFramebuffer(status));
            }
        }

        Ok(())
    }

    /// Release the framebuffer and both textures.
    ///
    /// # Safety
    ///
    /// Must be called with the context the target was created on, exactly
    /// once.
    pub(crate) unsafe fn destroy(&self, gl: &glow::Context) {
        unsafe {
            gl.delete_framebuffer(self.framebuffer);
            gl.delete_texture(self.color);
            gl.delete_texture(self.depth);
        }
    }
}

/// Set filtering and edge clamping on the bound 2D texture. Mipmapping is
/// never enabled, which keeps single-level textures complete.
unsafe fn set_tex_params(gl: &glow::Context, filter: u32) {
    // GL constant values are small enough that the cast is always safe.
    #[expect(clippy::cast_possible_wrap)]
    let filter = filter as i32;
    #[expect(clippy::cast_possible_wrap)]
    let clamp = glow::CLAMP_TO_EDGE as i32;
    unsafe {
        gl.tex_parameter_i32(glow::TEXTURE_2D, glow::TEXTURE_MIN_FILTER, filter);
        gl.tex_parameter_i32(glow::TEXTURE_2D, glow::TEXTURE_MAG_FILTER, filter);
        gl.tex_parameter_i32(glow::TEXTURE_2D, glow::TEXTURE_WRAP_S, clamp);
        gl.tex_parameter_i32(glow::TEXTURE_2D, glow::TEXTURE_WRAP_T, clamp);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn gl_size_passes_small_values_through() {
        assert_eq!(gl_size(0), 0);
        assert_eq!(gl_size(400), 400);
        assert_eq!(gl_size(0x7FFF_FFFF), i32::MAX);
    }

    #[test]
    #[should_panic(expected = "dimension exceeds i32::MAX")]
    fn gl_size_rejects_oversized_values() {
        let _ = gl_size(u32::MAX);
    }
}
