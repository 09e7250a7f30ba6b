//! Application and collaborator surfaces.
//!
//! The engine core drives these traits; windowing, audio mixing, GUI and
//! entity storage live behind them as external collaborators. Headless
//! defaults keep the pipeline runnable (and testable) without a display
//! or audio device.

use crate::engine::EngineContext;

/// Event surface of an application running on the engine.
///
/// Hooks run on the stage thread their name says. All default to no-ops.
/// A panic in any hook stops the engine cleanly.
#[allow(unused_variables)]
pub trait Application: Send + Sync {
    /// Control thread, before the gameloops start.
    fn control_initialize(&self, ctx: &EngineContext) {}
    /// Control thread, after the gameloops ended.
    fn control_finalize(&self, ctx: &EngineContext) {}
    /// Control thread, once per control tick: advance simulation state.
    /// Copy previous-frame transforms into history here for
    /// interpolation.
    fn update(&self, ctx: &EngineContext) {}
    /// Control thread, inside the emit window; peers are parked at their
    /// emit rendezvous, so publishing the snapshot is race-free.
    fn emit(&self, ctx: &EngineContext) {}

    /// Graphics-prepare thread, before its gameloop.
    fn prepare_initialize(&self, ctx: &EngineContext) {}
    fn prepare_finalize(&self, ctx: &EngineContext) {}
    /// Graphics-prepare thread: transform the last emitted snapshot into
    /// GPU command records.
    fn prepare(&self, ctx: &EngineContext) {}
    /// Graphics-prepare thread, inside the emit window.
    fn graphics_emit(&self, ctx: &EngineContext) {}

    /// Graphics-dispatch thread (GL owner), before its gameloop.
    fn dispatch_initialize(&self, ctx: &EngineContext) {}
    fn dispatch_finalize(&self, ctx: &EngineContext) {}
    /// Graphics-dispatch thread: replay the recorded queue.
    fn render(&self, ctx: &EngineContext) {}
    /// Graphics-dispatch thread, right before the buffer swap.
    fn swap(&self, ctx: &EngineContext) {}

    /// Sound thread, before its gameloop.
    fn sound_initialize(&self, ctx: &EngineContext) {}
    fn sound_finalize(&self, ctx: &EngineContext) {}
    /// Sound thread, inside the emit window.
    fn sound_emit(&self, ctx: &EngineContext) {}
    /// Sound thread, once per sound tick: produce audio state.
    fn sound(&self, ctx: &EngineContext) {}
}

/// A do-nothing application; useful as a base for tests.
pub struct NoopApplication;

impl Application for NoopApplication {}

/// Window collaborator. The dispatch thread owns the GL context; other
/// threads only touch it through `make_current`/`make_not_current` during
/// initialization and finalization.
#[allow(unused_variables)]
pub trait Window: Send + Sync {
    /// Pump the native event queue. Control thread.
    fn process_events(&self) {}
    fn resolution(&self) -> (u32, u32) {
        (0, 0)
    }
    /// Bind the GL context to the calling thread.
    fn make_current(&self) {}
    fn make_not_current(&self) {}
    /// Present the back buffer. Dispatch thread only.
    fn swap_buffers(&self) {}
}

/// Window that renders nowhere; for tests and headless tools.
pub struct HeadlessWindow;

impl Window for HeadlessWindow {}

/// Audio output collaborator.
#[allow(unused_variables)]
pub trait Speaker: Send + Sync {
    /// Produce PCM for one sound tick. Sound thread.
    fn render(&self, tick_time: u64) {}
}

/// Speaker that plays nothing.
pub struct HeadlessSpeaker;

impl Speaker for HeadlessSpeaker {}
