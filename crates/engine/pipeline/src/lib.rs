//! Multi-stage frame pipeline
//!
//! The engine runtime: a fixed roster of long-lived stage threads
//! (control, graphics prepare, graphics dispatch, sound) synchronized by
//! a lifecycle barrier and a ring of semaphores, producing one rendered
//! frame and one audio tick per iteration with defined ordering and
//! back-pressure. The asset manager's per-thread queues are drained
//! inside the matching stages.
//!
//! Lifecycle: [`Engine::new`] → [`Engine::start`] (blocks until
//! [`Engine::stop`]) → [`Engine::finalize`]. See [`engine`] for the
//! semaphore protocol.

pub mod engine;
pub mod hooks;
pub mod sync;
pub mod timing;

pub use engine::{thread_index, Engine, EngineConfig, EngineContext};
pub use hooks::{
    Application, HeadlessSpeaker, HeadlessWindow, NoopApplication, Speaker, Window,
};
pub use sync::Semaphore;
pub use timing::{application_time, TimeBuffer};
