//! Provisional (transient) GPU resources.
//!
//! Resources are cached by a textual key derived from their parameters
//! (resolution, format, count). A cache miss registers the caller's
//! initializer; it runs exactly once, on the dispatch thread, when the
//! handle is first resolved during queue replay. Entries not touched
//! since the last [`ProvisionalGraphics::purge`] sweep are destroyed.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, OnceLock};

use glow::HasContext;
use parking_lot::Mutex;

struct Entry<T: Copy> {
    resource: OnceLock<T>,
    init: Box<dyn Fn(&glow::Context) -> T + Send + Sync>,
    used: AtomicBool,
}

impl<T: Copy> Entry<T> {
    fn resolve(&self, gl: &glow::Context) -> T {
        self.used.store(true, Ordering::Relaxed);
        *self.resource.get_or_init(|| (self.init)(gl))
    }
}

macro_rules! handle_type {
    ($(#[$doc:meta])* $name:ident, $resource:ty) => {
        $(#[$doc])*
        #[derive(Clone)]
        pub struct $name(Arc<Entry<$resource>>);

        impl $name {
            /// Dispatch thread only: creates the resource on first use.
            pub(crate) fn resolve(&self, gl: &glow::Context) -> $resource {
                self.0.resolve(gl)
            }

            pub fn same_entry(&self, other: &Self) -> bool {
                Arc::ptr_eq(&self.0, &other.0)
            }
        }

        impl std::fmt::Debug for $name {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                write!(f, concat!(stringify!($name), "({:p})"), Arc::as_ptr(&self.0))
            }
        }
    };
}

handle_type!(
    /// Transient texture reference; resolves during replay.
    TextureHandle,
    glow::Texture
);
handle_type!(
    /// Transient framebuffer reference.
    FrameBufferHandle,
    glow::Framebuffer
);
handle_type!(
    /// Transient uniform buffer reference.
    UniformBufferHandle,
    glow::Buffer
);

/// Cache of transient GPU resources, shared between the recording and
/// dispatching sides.
#[derive(Default)]
pub struct ProvisionalGraphics {
    textures: Mutex<HashMap<String, TextureHandle>>,
    framebuffers: Mutex<HashMap<String, FrameBufferHandle>>,
    uniform_buffers: Mutex<HashMap<String, UniformBufferHandle>>,
}

impl ProvisionalGraphics {
    pub fn new() -> Self {
        Self::default()
    }

    /// Texture under `name`; `init` runs once on first replay touch.
    pub fn texture(
        &self,
        name: &str,
        init: impl Fn(&glow::Context) -> glow::Texture + Send + Sync + 'static,
    ) -> TextureHandle {
        let mut map = self.textures.lock();
        map.entry(name.to_string())
            .or_insert_with(|| {
                TextureHandle(Arc::new(Entry {
                    resource: OnceLock::new(),
                    init: Box::new(init),
                    used: AtomicBool::new(false),
                }))
            })
            .clone()
    }

    /// Framebuffer for draw usage under `name`.
    pub fn frame_buffer_draw(&self, name: &str) -> FrameBufferHandle {
        let mut map = self.framebuffers.lock();
        map.entry(name.to_string())
            .or_insert_with(|| {
                FrameBufferHandle(Arc::new(Entry {
                    resource: OnceLock::new(),
                    init: Box::new(|gl| unsafe {
                        gl.create_framebuffer().expect("creating a framebuffer")
                    }),
                    used: AtomicBool::new(false),
                }))
            })
            .clone()
    }

    /// Uniform buffer under `name`; `init` creates and fills it once.
    pub fn uniform_buffer(
        &self,
        name: &str,
        init: impl Fn(&glow::Context) -> glow::Buffer + Send + Sync + 'static,
    ) -> UniformBufferHandle {
        let mut map = self.uniform_buffers.lock();
        map.entry(name.to_string())
            .or_insert_with(|| {
                UniformBufferHandle(Arc::new(Entry {
                    resource: OnceLock::new(),
                    init: Box::new(init),
                    used: AtomicBool::new(false),
                }))
            })
            .clone()
    }

    /// Destroys resources untouched since the previous sweep and clears
    /// the usage marks. Dispatch thread only.
    pub fn purge(&self, gl: &glow::Context) {
        self.textures.lock().retain(|_, h| {
            let keep = h.0.used.swap(false, Ordering::Relaxed);
            if !keep {
                if let Some(&t) = h.0.resource.get() {
                    unsafe { gl.delete_texture(t) };
                }
            }
            keep
        });
        self.framebuffers.lock().retain(|_, h| {
            let keep = h.0.used.swap(false, Ordering::Relaxed);
            if !keep {
                if let Some(&f) = h.0.resource.get() {
                    unsafe { gl.delete_framebuffer(f) };
                }
            }
            keep
        });
        self.uniform_buffers.lock().retain(|_, h| {
            let keep = h.0.used.swap(false, Ordering::Relaxed);
            if !keep {
                if let Some(&b) = h.0.resource.get() {
                    unsafe { gl.delete_buffer(b) };
                }
            }
            keep
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn same_key_shares_the_entry() {
        let p = ProvisionalGraphics::new();
        let a = p.texture("blur_256x256_1_r8", |_| unreachable!());
        let b = p.texture("blur_256x256_1_r8", |_| unreachable!());
        assert!(a.same_entry(&b));
    }

    #[test]
    fn different_keys_are_distinct() {
        let p = ProvisionalGraphics::new();
        let a = p.texture("a", |_| unreachable!());
        let b = p.texture("b", |_| unreachable!());
        assert!(!a.same_entry(&b));
        let fa = p.frame_buffer_draw("fx");
        let fb = p.frame_buffer_draw("fx");
        assert!(fa.same_entry(&fb));
    }
}
