//! The GL renderer: owns the cone geometry, both shader programs, and the
//! label target, and issues the label and presentation passes.

use std::sync::Arc;

use glow::{HasContext, PixelPackData};

use crate::{
    config::VoronoiConfig,
    error::{Result, VoronoiError},
    geometry::{self, Sites, QUAD_VERTICES},
    label::{label_color, LabelImage},
    scope::{Binding, GlObject, Scope, Staged},
    shaders,
    target::{gl_size, LabelTarget},
    types::{ConeVertex, QuadVertex, SiteOffset},
};

/// Oldest desktop OpenGL version with instanced attribute divisors and
/// GLSL 3.30.
const REQUIRED_VERSION: (u32, u32) = (3, 3);

/// Vertex attribute slot of the cone mesh position.
const POSITION_ATTRIB: u32 = 0;
/// Vertex attribute slot of the per-instance site offset.
const OFFSET_ATTRIB: u32 = 1;

/// Byte stride of a vertex type, as the `i32` GL expects.
///
/// Vertex types are a handful of bytes, well within `i32` range.
#[expect(clippy::cast_possible_truncation, clippy::cast_possible_wrap)]
const fn stride_of<T>() -> i32 {
    std::mem::size_of::<T>() as i32
}

/// Check that `gl` is a desktop context of at least OpenGL 3.3.
///
/// # Errors
///
/// Returns [`VoronoiError::ContextTooOld`] for embedded contexts or versions
/// below 3.3.
pub fn check_context(gl: &glow::Context) -> Result<()> {
    let version = gl.version();
    let (required_major, required_minor) = REQUIRED_VERSION;
    if version.is_embedded || (version.major, version.minor) < REQUIRED_VERSION {
        return Err(VoronoiError::ContextTooOld {
            major: version.major,
            minor: version.minor,
            embedded: version.is_embedded,
            required_major,
            required_minor,
        });
    }
    Ok(())
}

/// Cached uniform locations for the label program.
struct LabelUniforms {
    /// `u_cone_radius` — base radius of every cone in NDC.
    cone_radius: glow::UniformLocation,
}

/// Cached uniform locations for the blit program.
struct BlitUniforms {
    /// `u_labels` — texture unit index (always 0).
    labels: glow::UniformLocation,
}

/// A GPU Voronoi renderer.
///
/// Draws one cone per site into an off-screen label target with depth
/// testing, so every pixel ends up holding the label of its nearest site,
/// then blits that target to the current draw framebuffer without
/// filtering.
///
/// The label pass runs on demand via [`render_labels`](Self::render_labels);
/// the presentation pass via [`present`](Self::present) may be repeated every
/// frame against the same labels. Both passes are issued on the calling
/// thread; the GL command stream orders them.
///
/// # Example
///
/// ```no_run
/// # use voronoi_cones::{VoronoiConfig, VoronoiRenderer};
/// # use std::sync::Arc;
/// # fn example(gl: Arc<glow::Context>) -> voronoi_cones::Result<()> {
/// let config = VoronoiConfig::default();
/// let sites = config.random_sites()?;
///
/// // During setup (with a current GL context):
/// let renderer = unsafe { VoronoiRenderer::new(gl, &config, &sites) }?;
/// unsafe { renderer.render_labels() };
///
/// // Each frame:
/// unsafe { renderer.present() };
/// # Ok(())
/// # }
/// ```
pub struct VoronoiRenderer {
    /// The OpenGL context, shared via [`Arc`] so it can be stored alongside
    /// resources that reference it.
    gl: Arc<glow::Context>,

    /// Compiled label-pass program (instanced cones).
    label_program: glow::Program,
    /// Cached uniform locations for [`label_program`](Self::label_program).
    label_uniforms: LabelUniforms,

    /// Compiled presentation program (full-viewport texel fetch).
    blit_program: glow::Program,
    /// Cached uniform locations for [`blit_program`](Self::blit_program).
    blit_uniforms: BlitUniforms,

    /// VAO binding the cone mesh to slot 0 and site offsets to slot 1 with a
    /// divisor of one.
    cone_vao: glow::VertexArray,
    cone_vbo: glow::Buffer,
    instance_vbo: glow::Buffer,

    /// VAO of the full-viewport quad.
    quad_vao: glow::VertexArray,
    quad_vbo: glow::Buffer,

    /// Off-screen color/depth target the label pass writes.
    target: LabelTarget,

    /// Vertices per cone fan, `resolution + 2`.
    cone_vertex_count: i32,
    site_count: i32,
    cone_radius: f32,
    sentinel: u32,
}

impl VoronoiRenderer {
    /// Create a renderer for `sites` under `config`.
    ///
    /// Checks the context version, compiles both programs, uploads the cone
    /// mesh, the site offsets and the quad, and provisions the label target.
    ///
    /// # Safety
    ///
    /// The `gl` context must be current and valid. The caller must ensure
    /// that [`destroy`](Self::destroy) is called before the context is
    /// dropped.
    ///
    /// # Errors
    ///
    /// Returns an error if the configuration is invalid, the context is too
    /// old, a shader fails to build, a GL object cannot be created, or the
    /// label target is incomplete. Every one of these is fatal to the caller.
    pub unsafe fn new(
        gl: Arc<glow::Context>,
        config: &VoronoiConfig,
        sites: &Sites,
    ) -> Result<Self> {
        config.validate()?;
        config.check_site_count(sites.len())?;
        check_context(&gl)?;

        let cone = geometry::cone_vertices(config.cone_resolution)?;
        let cone_vertex_count = i32::try_from(cone.len())
            .map_err(|_| VoronoiError::ConeResolution(config.cone_resolution))?;
        // Bounded by MAX_LABELS (2^24) after `check_site_count`.
        let site_count = i32::try_from(sites.len()).map_err(|_| VoronoiError::TooManySites {
            count: sites.len(),
            max: crate::label::MAX_LABELS,
        })?;

        // Everything created below is released if a later step fails.
        let mut stage = unsafe { Staged::new(&*gl) };

        let label_program = unsafe {
            shaders::compile_program(&gl, shaders::LABEL_VERTEX_SRC, shaders::LABEL_FRAGMENT_SRC)
        }?;
        let label_program = stage.track(label_program, GlObject::Program);
        let blit_program = unsafe {
            shaders::compile_program(&gl, shaders::QUAD_VERTEX_SRC, shaders::BLIT_FRAGMENT_SRC)
        }?;
        let blit_program = stage.track(blit_program, GlObject::Program);

        let label_uniforms = LabelUniforms {
            cone_radius: unsafe { gl.get_uniform_location(label_program, "u_cone_radius") }
                .ok_or(VoronoiError::MissingUniform("u_cone_radius"))?,
        };
        let blit_uniforms = BlitUniforms {
            labels: unsafe { gl.get_uniform_location(blit_program, "u_labels") }
                .ok_or(VoronoiError::MissingUniform("u_labels"))?,
        };

        let cone_vao = stage.track(
            unsafe { gl.create_vertex_array() }.map_err(VoronoiError::Resource)?,
            GlObject::VertexArray,
        );
        let cone_vbo = stage.track(
            unsafe { gl.create_buffer() }.map_err(VoronoiError::Resource)?,
            GlObject::Buffer,
        );
        let instance_vbo = stage.track(
            unsafe { gl.create_buffer() }.map_err(VoronoiError::Resource)?,
            GlObject::Buffer,
        );
        let quad_vao = stage.track(
            unsafe { gl.create_vertex_array() }.map_err(VoronoiError::Resource)?,
            GlObject::VertexArray,
        );
        let quad_vbo = stage.track(
            unsafe { gl.create_buffer() }.map_err(VoronoiError::Resource)?,
            GlObject::Buffer,
        );

        unsafe {
            {
                let _vao = Scope::enter(&gl, Binding::VertexArray(cone_vao));
                {
                    let _vbo = Scope::enter(&gl, Binding::ArrayBuffer(cone_vbo));
                    gl.buffer_data_u8_slice(
                        glow::ARRAY_BUFFER,
                        bytemuck::cast_slice(&cone),
                        glow::STATIC_DRAW,
                    );
                    gl.enable_vertex_attrib_array(POSITION_ATTRIB);
                    gl.vertex_attrib_pointer_f32(
                        POSITION_ATTRIB,
                        3,
                        glow::FLOAT,
                        false,
                        stride_of::<ConeVertex>(),
                        0,
                    );
                }
                {
                    let _vbo = Scope::enter(&gl, Binding::ArrayBuffer(instance_vbo));
                    gl.buffer_data_u8_slice(
                        glow::ARRAY_BUFFER,
                        bytemuck::cast_slice(sites.offsets()),
                        glow::STATIC_DRAW,
                    );
                    gl.enable_vertex_attrib_array(OFFSET_ATTRIB);
                    gl.vertex_attrib_pointer_f32(
                        OFFSET_ATTRIB,
                        2,
                        glow::FLOAT,
                        false,
                        stride_of::<SiteOffset>(),
                        0,
                    );
                    gl.vertex_attrib_divisor(OFFSET_ATTRIB, 1);
                }
            }

            {
                let _vao = Scope::enter(&gl, Binding::VertexArray(quad_vao));
                let _vbo = Scope::enter(&gl, Binding::ArrayBuffer(quad_vbo));
                gl.buffer_data_u8_slice(
                    glow::ARRAY_BUFFER,
                    bytemuck::cast_slice(&QUAD_VERTICES),
                    glow::STATIC_DRAW,
                );
                gl.enable_vertex_attrib_array(POSITION_ATTRIB);
                gl.vertex_attrib_pointer_f32(
                    POSITION_ATTRIB,
                    2,
                    glow::FLOAT,
                    false,
                    stride_of::<QuadVertex>(),
                    0,
                );
            }
        }

        // Cleans up its own objects on failure; the stage covers the rest.
        let target = unsafe { LabelTarget::new(&gl, [config.width, config.height]) }?;
        stage.commit();

        log::info!(
            "Voronoi renderer ready: {}x{} target, {} sites, cone resolution {}, radius {}",
            config.width,
            config.height,
            sites.len(),
            config.cone_resolution,
            config.cone_radius
        );

        Ok(Self {
            gl,
            label_program,
            label_uniforms,
            blit_program,
            blit_uniforms,
            cone_vao,
            cone_vbo,
            instance_vbo,
            quad_vao,
            quad_vbo,
            target,
            cone_vertex_count,
            site_count,
            cone_radius: config.cone_radius,
            sentinel: config.sentinel,
        })
    }

    /// Run the label pass.
    ///
    /// Clears the label target to the sentinel label and the far depth, then
    /// draws every site's cone in one instanced triangle-fan call. The depth
    /// test keeps, per pixel, the cone nearest the viewer. Viewport, depth
    /// test and depth mask are restored afterwards.
    ///
    /// # Safety
    ///
    /// Requires a current GL context matching the one passed to
    /// [`new`](Self::new).
    pub unsafe fn render_labels(&self) {
        let gl = &*self.gl;
        let [width, height] = self.target.size;
        let [r, g, b] = label_color(self.sentinel);

        log::debug!("Label pass: {} cones into {width}x{height}", self.site_count);

        unsafe {
            let _framebuffer =
                Scope::enter(gl, Binding::Framebuffer(Some(self.target.framebuffer)));
            let _viewport =
                Scope::enter(gl, Binding::Viewport([0, 0, gl_size(width), gl_size(height)]));
            let _depth = Scope::enter(gl, Binding::DepthTest(true));
            let _depth_mask = Scope::enter(gl, Binding::DepthMask(true));
            gl.clear_color(r, g, b, 1.0);
            gl.clear_depth_f32(1.0);
            gl.clear(glow::COLOR_BUFFER_BIT | glow::DEPTH_BUFFER_BIT);

            let _program = Scope::enter(gl, Binding::Program(self.label_program));
            gl.uniform_1_f32(Some(&self.label_uniforms.cone_radius), self.cone_radius);

            let _vao = Scope::enter(gl, Binding::VertexArray(self.cone_vao));
            gl.draw_arrays_instanced(
                glow::TRIANGLE_FAN,
                0,
                self.cone_vertex_count,
                self.site_count,
            );
        }
    }

    /// Run the presentation pass into the default framebuffer.
    ///
    /// Same as [`present_to`](Self::present_to) with `None`.
    ///
    /// # Safety
    ///
    /// Requires a current GL context matching the one passed to
    /// [`new`](Self::new).
    pub unsafe fn present(&self) {
        unsafe { self.present_to(None) };
    }

    /// Run the presentation pass into `framebuffer` (`None` for the default
    /// framebuffer).
    ///
    /// Draws a full-viewport quad over a viewport the size of the label
    /// target, fetching one label texel per pixel. The quad is drawn with the
    /// depth test off, so whatever depth state the caller left behind cannot
    /// discard it, and repeating the call without an intervening
    /// [`render_labels`](Self::render_labels) yields the same frame. Viewport
    /// and depth state are restored afterwards.
    ///
    /// # Safety
    ///
    /// Requires a current GL context matching the one passed to
    /// [`new`](Self::new). `framebuffer` must be complete and belong to that
    /// context.
    pub unsafe fn present_to(&self, framebuffer: Option<glow::Framebuffer>) {
        let gl = &*self.gl;
        let [width, height] = self.target.size;

        unsafe {
            let _framebuffer = Scope::enter(gl, Binding::Framebuffer(framebuffer));
            let _viewport =
                Scope::enter(gl, Binding::Viewport([0, 0, gl_size(width), gl_size(height)]));
            let _depth = Scope::enter(gl, Binding::DepthTest(false));
            let _depth_mask = Scope::enter(gl, Binding::DepthMask(true));
            gl.clear_color(0.0, 0.0, 0.0, 1.0);
            gl.clear_depth_f32(1.0);
            gl.clear(glow::COLOR_BUFFER_BIT | glow::DEPTH_BUFFER_BIT);

            let _program = Scope::enter(gl, Binding::Program(self.blit_program));
            let _texture = Scope::enter(
                gl,
                Binding::Texture2D {
                    unit: 0,
                    texture: self.target.color,
                },
            );
            gl.uniform_1_i32(Some(&self.blit_uniforms.labels), 0);

            let _vao = Scope::enter(gl, Binding::VertexArray(self.quad_vao));
            gl.draw_arrays(glow::TRIANGLE_FAN, 0, 4);
        }
    }

    /// Read the label target back to the CPU.
    ///
    /// Blocks until the label pass has finished on the GPU.
    ///
    /// # Safety
    ///
    /// Requires a current GL context matching the one passed to
    /// [`new`](Self::new).
    ///
    /// # Errors
    ///
    /// Returns an error only if the driver returns a short buffer, which
    /// would indicate a GL implementation bug.
    pub unsafe fn read_labels(&self) -> Result<LabelImage> {
        let gl = &*self.gl;
        let [width, height] = self.target.size;
        let mut texels = vec![0_u8; width as usize * height as usize * 3];

        unsafe {
            let _framebuffer =
                Scope::enter(gl, Binding::Framebuffer(Some(self.target.framebuffer)));
            gl.read_buffer(glow::COLOR_ATTACHMENT0);
            gl.pixel_store_i32(glow::PACK_ALIGNMENT, 1);
            gl.read_pixels(
                0,
                0,
                gl_size(width),
                gl_size(height),
                glow::RGB,
                glow::UNSIGNED_BYTE,
                PixelPackData::Slice(Some(texels.as_mut_slice())),
            );
            gl.pixel_store_i32(glow::PACK_ALIGNMENT, 4);
        }

        LabelImage::from_bottom_up_rgb(width, height, &texels)
    }

    /// The label texture (RGB8), for collaborators that sample it directly.
    #[must_use]
    pub fn label_texture(&self) -> glow::Texture {
        self.target.color
    }

    /// The depth texture written alongside the labels.
    #[must_use]
    pub fn depth_texture(&self) -> glow::Texture {
        self.target.depth
    }

    /// Label target size in pixels.
    #[must_use]
    pub fn size(&self) -> [u32; 2] {
        self.target.size
    }

    /// Label written where no cone covers a pixel.
    #[must_use]
    pub fn sentinel(&self) -> u32 {
        self.sentinel
    }

    /// Clean up all GL resources owned by this renderer.
    ///
    /// # Safety
    ///
    /// Must be called with the same GL context that was used to create the
    /// renderer, and must be called exactly once.
    pub unsafe fn destroy(&self) {
        let gl = &*self.gl;
        unsafe {
            gl.delete_program(self.label_program);
            gl.delete_program(self.blit_program);
            gl.delete_vertex_array(self.cone_vao);
            gl.delete_buffer(self.cone_vbo);
            gl.delete_buffer(self.instance_vbo);
            gl.delete_vertex_array(self.quad_vao);
            gl.delete_buffer(self.quad_vbo);
            self.target.destroy(gl);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn strides_match_vertex_layouts() {
        assert_eq!(stride_of::<ConeVertex>(), 12);
        assert_eq!(stride_of::<SiteOffset>(), 8);
        assert_eq!(stride_of::<QuadVertex>(), 8);
    }

    #[test]
    fn required_version_orders_lexicographically() {
        assert!((3, 2) < REQUIRED_VERSION);
        assert!((3, 3) >= REQUIRED_VERSION);
        assert!((4, 0) > REQUIRED_VERSION);
    }
}
