//! Scoped GL state.
//!
//! Each [`Scope`] applies one piece of context state when entered and puts
//! it back when dropped, so every pass leaves the context as it found it
//! even on early return. Object bindings return to the default (unbound)
//! object; capabilities, masks and the viewport return to the values they
//! held before the scope was entered.
//!
//! [`Staged`] is the creation-side counterpart: it owns GL objects while a
//! constructor is still fallible and deletes them unless the constructor
//! commits.

use glow::HasContext;

/// A piece of context state a [`Scope`] can hold.
#[derive(Clone, Copy, Debug)]
pub(crate) enum Binding {
    /// `GL_FRAMEBUFFER`; `None` targets the default framebuffer.
    Framebuffer(Option<glow::Framebuffer>),
    /// The active program.
    Program(glow::Program),
    /// The bound vertex array object.
    VertexArray(glow::VertexArray),
    /// `GL_TEXTURE_2D` on the given texture unit.
    Texture2D {
        unit: u32,
        texture: glow::Texture,
    },
    /// `GL_ARRAY_BUFFER`.
    ArrayBuffer(glow::Buffer),
    /// `GL_DEPTH_TEST` on (with `GL_LESS`) or off.
    DepthTest(bool),
    /// Depth buffer writes on or off.
    DepthMask(bool),
    /// Viewport rectangle `[x, y, width, height]`.
    Viewport([i32; 4]),
}

/// Context state captured on entry, restored on drop.
#[derive(Clone, Copy, Debug)]
enum Saved {
    Nothing,
    DepthTest { enabled: bool, func: u32 },
    Flag(bool),
    Rect([i32; 4]),
}

/// Guard that keeps a [`Binding`] active for its lifetime.
#[must_use = "the binding is released as soon as the scope is dropped"]
pub(crate) struct Scope<'gl> {
    gl: &'gl glow::Context,
    binding: Binding,
    saved: Saved,
}

impl<'gl> Scope<'gl> {
    /// Apply `binding` to the context.
    ///
    /// # Safety
    ///
    /// `gl` must be current, and must stay current until the scope drops.
    pub(crate) unsafe fn enter(gl: &'gl glow::Context, binding: Binding) -> Self {
        let saved = unsafe {
            match binding {
                Binding::Framebuffer(fbo) => {
                    gl.bind_framebuffer(glow::FRAMEBUFFER, fbo);
                    Saved::Nothing
                }
                Binding::Program(program) => {
                    gl.use_program(Some(program));
                    Saved::Nothing
                }
                Binding::VertexArray(vao) => {
                    gl.bind_vertex_array(Some(vao));
                    Saved::Nothing
                }
                Binding::Texture2D { unit, texture } => {
                    gl.active_texture(glow::TEXTURE0 + unit);
                    gl.bind_texture(glow::TEXTURE_2D, Some(texture));
                    Saved::Nothing
                }
                Binding::ArrayBuffer(buffer) => {
                    gl.bind_buffer(glow::ARRAY_BUFFER, Some(buffer));
                    Saved::Nothing
                }
                Binding::DepthTest(enable) => {
                    let enabled = gl.is_enabled(glow::DEPTH_TEST);
                    #[expect(clippy::cast_sign_loss)] // GL enums are non-negative
                    let func = gl.get_parameter_i32(glow::DEPTH_FUNC) as u32;
                    if enable {
                        gl.enable(glow::DEPTH_TEST);
                        gl.depth_func(glow::LESS);
                    } else {
                        gl.disable(glow::DEPTH_TEST);
                    }
                    Saved::DepthTest { enabled, func }
                }
                Binding::DepthMask(write) => {
                    let writing = gl.get_parameter_i32(glow::DEPTH_WRITEMASK) != 0;
                    gl.depth_mask(write);
                    Saved::Flag(writing)
                }
                Binding::Viewport([x, y, w, h]) => {
                    let mut rect = [0; 4];
                    gl.get_parameter_i32_slice(glow::VIEWPORT, &mut rect);
                    gl.viewport(x, y, w, h);
                    Saved::Rect(rect)
                }
            }
        };
        Self { gl, binding, saved }
    }
}

impl Drop for Scope<'_> {
    fn drop(&mut self) {
        let gl = self.gl;
        // SAFETY: `enter` requires the context to outlive the scope.
        unsafe {
            match (self.binding, self.saved) {
                (Binding::Framebuffer(_), _) => gl.bind_framebuffer(glow::FRAMEBUFFER, None),
                (Binding::Program(_), _) => gl.use_program(None),
                (Binding::VertexArray(_), _) => gl.bind_vertex_array(None),
                (Binding::Texture2D { unit, .. }, _) => {
                    gl.active_texture(glow::TEXTURE0 + unit);
                    gl.bind_texture(glow::TEXTURE_2D, None);
                    gl.active_texture(glow::TEXTURE0);
                }
                (Binding::ArrayBuffer(_), _) => gl.bind_buffer(glow::ARRAY_BUFFER, None),
                (Binding::DepthTest(_), Saved::DepthTest { enabled, func }) => {
                    gl.depth_func(func);
                    if enabled {
                        gl.enable(glow::DEPTH_TEST);
                    } else {
                        gl.disable(glow::DEPTH_TEST);
                    }
                }
                (Binding::DepthMask(_), Saved::Flag(writing)) => gl.depth_mask(writing),
                (Binding::Viewport(_), Saved::Rect([x, y, w, h])) => gl.viewport(x, y, w, h),
                (Binding::DepthTest(_) | Binding::DepthMask(_) | Binding::Viewport(_), _) => {
                    unreachable!("state scope entered without saving its previous value")
                }
            }
        }
    }
}

/// A GL object owned by a constructor that has not finished yet.
#[derive(Clone, Copy, Debug, PartialEq)]
pub(crate) enum GlObject {
    Program(glow::Program),
    VertexArray(glow::VertexArray),
    Buffer(glow::Buffer),
}

/// Anything that can delete [`GlObject`]s.
pub(crate) trait DeleteObject {
    /// Delete `object`.
    ///
    /// # Safety
    ///
    /// The object must belong to this context and must not be used again.
    unsafe fn delete_object(&self, object: GlObject);
}

impl DeleteObject for glow::Context {
    unsafe fn delete_object(&self, object: GlObject) {
        unsafe {
            match object {
                GlObject::Program(program) => self.delete_program(program),
                GlObject::VertexArray(vao) => self.delete_vertex_array(vao),
                GlObject::Buffer(buffer) => self.delete_buffer(buffer),
            }
        }
    }
}

/// Objects created so far by a fallible constructor.
///
/// Dropping a `Staged` deletes everything it tracks, newest first. Call
/// [`commit`](Self::commit) once the constructor can no longer fail to hand
/// ownership to the finished value.
#[must_use = "tracked objects are deleted as soon as the stage is dropped"]
pub(crate) struct Staged<'gl, D: DeleteObject + ?Sized> {
    gl: &'gl D,
    objects: Vec<GlObject>,
}

impl<'gl, D: DeleteObject + ?Sized> Staged<'gl, D> {
    /// Start tracking objects created on `gl`.
    ///
    /// # Safety
    ///
    /// `gl` must be current whenever the stage drops uncommitted.
    pub(crate) unsafe fn new(gl: &'gl D) -> Self {
        Self {
            gl,
            objects: Vec::new(),
        }
    }

    /// Take ownership of `object` until [`commit`](Self::commit).
    pub(crate) fn track<T>(&mut self, object: T, wrap: fn(T) -> GlObject) -> T
    where
        T: Copy,
    {
        self.objects.push(wrap(object));
        object
    }

    /// Release ownership of every tracked object to the caller.
    pub(crate) fn commit(mut self) {
        self.objects.clear();
    }
}

impl<D: DeleteObject + ?Sized> Drop for Staged<'_, D> {
    fn drop(&mut self) {
        if !self.objects.is_empty() {
            log::debug!("Releasing {} GL objects after failed setup", self.objects.len());
        }
        while let Some(object) = self.objects.pop() {
            // SAFETY: `new` requires the context to be current on drop, and
            // uncommitted objects were never handed out.
            unsafe { self.gl.delete_object(object) };
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use std::cell::RefCell;
    use std::num::NonZeroU32;

    use super::*;

    /// Records deletions instead of issuing GL calls.
    #[derive(Default)]
    struct Recorder {
        deleted: RefCell<Vec<GlObject>>,
    }

    impl DeleteObject for Recorder {
        unsafe fn delete_object(&self, object: GlObject) {
            self.deleted.borrow_mut().push(object);
        }
    }

    fn id(n: u32) -> NonZeroU32 {
        NonZeroU32::new(n).unwrap()
    }

    #[test]
    fn failed_setup_deletes_everything_newest_first() {
        let recorder = Recorder::default();
        let program = glow::NativeProgram(id(1));
        let vao = glow::NativeVertexArray(id(2));
        let buffer = glow::NativeBuffer(id(3));

        let result: Result<(), &str> = (|| {
            let mut stage = unsafe { Staged::new(&recorder) };
            stage.track(program, GlObject::Program);
            stage.track(vao, GlObject::VertexArray);
            stage.track(buffer, GlObject::Buffer);
            Err::<(), _>("framebuffer incomplete")?;
            stage.commit();
            Ok(())
        })();

        assert!(result.is_err());
        assert_eq!(
            *recorder.deleted.borrow(),
            [
                GlObject::Buffer(buffer),
                GlObject::VertexArray(vao),
                GlObject::Program(program),
            ]
        );
    }

    #[test]
    fn committed_objects_survive() {
        let recorder = Recorder::default();
        let mut stage = unsafe { Staged::new(&recorder) };
        let program = stage.track(glow::NativeProgram(id(7)), GlObject::Program);
        stage.commit();

        assert_eq!(program, glow::NativeProgram(id(7)));
        assert!(recorder.deleted.borrow().is_empty());
    }
}
