//! GLSL shader sources and compilation helpers.
//!
//! All shaders target GLSL 3.30 core (OpenGL 3.3), the first core version
//! with explicit attribute locations, `gl_InstanceID`, and instanced
//! attribute divisors.

use glow::HasContext;

use crate::error::{Result, VoronoiError};

/// Vertex shader for the label pass.
///
/// Translates the shared cone by the per-instance site offset (x/y only, so
/// the depth profile is untouched) and derives the label color from
/// `gl_InstanceID`.
///
/// # Attributes
///
/// | Location | Name         | Type   | Rate         |
/// |----------|--------------|--------|--------------|
/// | `0`      | `a_position` | `vec3` | per vertex   |
/// | `1`      | `a_offset`   | `vec2` | per instance |
///
/// # Uniforms
///
/// | Name            | Type    | Description                           |
/// |-----------------|---------|---------------------------------------|
/// | `u_cone_radius` | `float` | Scale of the unit cone's base in NDC  |
pub const LABEL_VERTEX_SRC: &str = r"#version 330 core

layout(location = 0) in vec3 a_position;
layout(location = 1) in vec2 a_offset;

uniform float u_cone_radius;

flat out vec3 v_label;

void main() {
    gl_Position = vec4(a_position.xy * u_cone_radius + a_offset, a_position.z, 1.0);

    // Little-endian base-256 site index
    int r = gl_InstanceID % 256;
    int g = (gl_InstanceID / 256) % 256;
    int b = (gl_InstanceID / 65536) % 256;
    v_label = vec3(r, g, b) / 255.0;
}
";

/// Fragment shader for the label pass. Writes the instance label unchanged.
pub const LABEL_FRAGMENT_SRC: &str = r"#version 330 core

flat in vec3 v_label;

layout(location = 0) out vec4 frag_color;

void main() {
    frag_color = vec4(v_label, 1.0);
}
";

/// Vertex shader for the full-viewport quad.
pub const QUAD_VERTEX_SRC: &str = r"#version 330 core

layout(location = 0) in vec2 a_position;

void main() {
    gl_Position = vec4(a_position, 0.0, 1.0);
}
";

/// Fragment shader for the presentation pass.
///
/// Fetches exactly one texel per fragment by integer coordinate, so labels
/// are never filtered regardless of the texture's filter mode. Fragments
/// beyond the texture repeat its last row or column.
///
/// # Uniforms
///
/// | Name       | Type        | Description                  |
/// |------------|-------------|------------------------------|
/// | `u_labels` | `sampler2D` | Label texture unit (always 0) |
pub const BLIT_FRAGMENT_SRC: &str = r"#version 330 core

uniform sampler2D u_labels;

layout(location = 0) out vec4 frag_color;

void main() {
    ivec2 last = textureSize(u_labels, 0) - 1;
    ivec2 texel = min(ivec2(gl_FragCoord.xy), last);
    frag_color = vec4(texelFetch(u_labels, texel, 0).rgb, 1.0);
}
";

/// Compile a shader program from vertex and fragment source strings.
///
/// The compiled shader objects are detached and deleted after successful
/// linking, so only the program handle needs to be cleaned up by the caller.
///
/// # Safety
///
/// Requires a valid, current OpenGL context.
///
/// # Errors
///
/// Returns [`VoronoiError::ShaderCompile`] or [`VoronoiError::ProgramLink`]
/// carrying the driver's info log, or [`VoronoiError::Resource`] if the
/// program object cannot be created.
pub unsafe fn compile_program(
    gl: &glow::Context,
    vertex_src: &str,
    fragment_src: &str,
) -> Result<glow::Program> {
    let program = unsafe { gl.create_program() }.map_err(VoronoiError::Resource)?;

    let stages = unsafe {
        compile_shader(gl, glow::VERTEX_SHADER, vertex_src).and_then(|vs| {
            compile_shader(gl, glow::FRAGMENT_SHADER, fragment_src)
                .map(|fs| (vs, fs))
                .inspect_err(|_| gl.delete_shader(vs))
        })
    };
    let (vs, fs) = match stages {
        Ok(stages) => stages,
        Err(e) => {
            unsafe { gl.delete_program(program) };
            return Err(e);
        }
    };

    unsafe {
        gl.attach_shader(program, vs);
        gl.attach_shader(program, fs);
        gl.link_program(program);

        let linked = gl.get_program_link_status(program);
        gl.detach_shader(program, vs);
        gl.detach_shader(program, fs);
        gl.delete_shader(vs);
        gl.delete_shader(fs);

        if !linked {
            let log = gl.get_program_info_log(program);
            gl.delete_program(program);
            return Err(VoronoiError::ProgramLink(log));
        }
    }

    Ok(program)
}

/// Compile a single shader stage (vertex or fragment) from source.
///
/// # Safety
///
/// Requires a valid, current OpenGL context.
unsafe fn compile_shader(
    gl: &glow::Context,
    shader_type: u32,
    source: &str,
) -> Result<glow::Shader> {
    unsafe {
        let shader = gl.create_shader(shader_type).map_err(VoronoiError::Resource)?;
        gl.shader_source(shader, source);
        gl.compile_shader(shader);

        if !gl.get_shader_compile_status(shader) {
            let log = gl.get_shader_info_log(shader);
            gl.delete_shader(shader);
            let stage = if shader_type == glow::VERTEX_SHADER {
                "vertex"
            } else {
                "fragment"
            };
            return Err(VoronoiError::ShaderCompile(format!("{stage} stage: {log}")));
        }

        Ok(shader)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const ALL: [&str; 4] = [
        LABEL_VERTEX_SRC,
        LABEL_FRAGMENT_SRC,
        QUAD_VERTEX_SRC,
        BLIT_FRAGMENT_SRC,
    ];

    #[test]
    fn sources_declare_core_330() {
        for src in ALL {
            assert!(src.starts_with("#version 330 core\n"));
        }
    }

    #[test]
    fn label_varying_is_flat_on_both_sides() {
        assert!(LABEL_VERTEX_SRC.contains("flat out vec3 v_label;"));
        assert!(LABEL_FRAGMENT_SRC.contains("flat in vec3 v_label;"));
    }

    #[test]
    fn blit_uses_integer_texel_fetch() {
        assert!(BLIT_FRAGMENT_SRC.contains("texelFetch("));
        assert!(!BLIT_FRAGMENT_SRC.contains("texture(u_labels"));
    }
}
