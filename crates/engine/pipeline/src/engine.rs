//! Engine lifecycle and the four-stage frame pipeline.
//!
//! Threads: `control` (the caller of [`Engine::start`]), `graphics
//! prepare`, `graphics dispatch` (GL owner) and `sound`, plus the asset
//! manager's private disk-IO and decompression threads. One arity-4
//! barrier gates lifecycle phases; eight semaphores order the per-frame
//! hand-offs:
//!
//! | semaphore             | initial | posted by | waited by |
//! |-----------------------|---------|-----------|-----------|
//! | graphics_prepare      | 1       | dispatch  | prepare   |
//! | graphics_dispatch     | 0       | prepare   | dispatch  |
//! | emit_graphics_start   | 0       | prepare   | control   |
//! | emit_graphics_assets  | 0       | control   | prepare   |
//! | emit_graphics_end     | 0       | prepare   | control   |
//! | emit_sound_start      | 0       | sound     | control   |
//! | emit_sound_assets     | 0       | control   | sound     |
//! | emit_sound_end        | 0       | sound     | control   |
//!
//! `emit_is_ready` is a best-effort hint that the control thread has
//! entered its emit window; peers observe it on their next loop
//! iteration. The authoritative rendezvous is the paired start/end
//! semaphores; nothing relies on the flag for correctness.

use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Barrier};
use std::time::Duration;

use tracing::{error, info, warn};

use skein_assets::{AssetManager, AssetManagerConfig};

use crate::hooks::{Application, Speaker, Window};
use crate::sync::Semaphore;
use crate::timing::{application_time, TimeBuffer, TimingBuffers};

/// Worker-thread indices for asset scheme registration.
pub mod thread_index {
    pub const CONTROL: usize = 0;
    pub const PREPARE: usize = 1;
    pub const DISPATCH: usize = 2;
    pub const SOUND: usize = 3;
}

/// Construction parameters. Tick periods are immutable after
/// [`Engine::new`].
pub struct EngineConfig {
    pub control_tick: Duration,
    pub sound_tick: Duration,
    pub assets: AssetManagerConfig,
    pub window: Box<dyn Window>,
    pub speaker: Box<dyn Speaker>,
    pub application: Box<dyn Application>,
}

impl EngineConfig {
    /// Configuration with headless collaborators; the default for tools
    /// and tests that render and play nothing.
    pub fn headless(application: Box<dyn Application>) -> Self {
        Self {
            control_tick: Duration::from_millis(20),
            sound_tick: Duration::from_millis(40),
            assets: AssetManagerConfig::default(),
            window: Box::new(crate::hooks::HeadlessWindow),
            speaker: Box::new(crate::hooks::HeadlessSpeaker),
            application,
        }
    }
}

struct Semaphores {
    graphics_prepare: Semaphore,
    graphics_dispatch: Semaphore,
    emit_graphics_start: Semaphore,
    emit_graphics_assets: Semaphore,
    emit_graphics_end: Semaphore,
    emit_sound_start: Semaphore,
    emit_sound_assets: Semaphore,
    emit_sound_end: Semaphore,
}

pub(crate) struct EngineShared {
    app: Box<dyn Application>,
    assets: AssetManager,
    window: Box<dyn Window>,
    speaker: Box<dyn Speaker>,
    barrier: Barrier,
    sems: Semaphores,
    stopping: AtomicBool,
    emit_is_ready: AtomicBool,
    current_control_time: AtomicU64,
    control_tick_us: u64,
    sound_tick_us: u64,
    timings: TimingBuffers,
}

/// Handle the engine passes to every application hook.
#[derive(Clone)]
pub struct EngineContext {
    shared: Arc<EngineShared>,
}

impl EngineContext {
    pub fn assets(&self) -> &AssetManager {
        &self.shared.assets
    }

    pub fn window(&self) -> &dyn Window {
        &*self.shared.window
    }

    /// Requests a cooperative stop; gameloops exit at their next loop
    /// head. Idempotent.
    pub fn stop(&self) {
        self.shared.stop();
    }

    pub fn stopping(&self) -> bool {
        self.shared.stopping.load(Ordering::Acquire)
    }

    /// The control stage's fixed-step clock, in microseconds.
    pub fn current_control_time(&self) -> u64 {
        self.shared.current_control_time.load(Ordering::Acquire)
    }

    /// Reads a stage timing phase; `smooth` averages the 64-sample
    /// window, otherwise the last sample is returned.
    pub fn stage_time(&self, which: TimeBuffer, smooth: bool) -> u64 {
        self.shared.timings.read(which, smooth)
    }

    /// Sum of several timing phases, e.g. a whole stage's frame cost.
    pub fn profiling_time(&self, which: &[TimeBuffer], smooth: bool) -> u64 {
        which.iter().map(|&w| self.stage_time(w, smooth)).sum()
    }
}

/// The engine runtime. `new` builds the collaborators and launches the
/// worker threads; `start` runs the control gameloop on the calling
/// thread until `stop`; `finalize` tears everything down in reverse
/// dependency order.
pub struct Engine {
    shared: Arc<EngineShared>,
    workers: Vec<std::thread::JoinHandle<()>>,
    started: bool,
}

impl EngineShared {
    fn stop(&self) {
        if !self.stopping.swap(true, Ordering::AcqRel) {
            info!(target: "engine", "stopping engine");
        }
    }

    fn context(self: &Arc<Self>) -> EngineContext {
        EngineContext { shared: self.clone() }
    }

    /// Runs a lifecycle phase, converting a panic into a logged engine
    /// stop.
    fn guarded(&self, what: &str, f: impl FnOnce()) {
        if let Err(payload) = catch_unwind(AssertUnwindSafe(f)) {
            let message = panic_message(&payload);
            error!(target: "engine", phase = what, message, "panic caught");
            self.stop();
        }
    }
}

fn panic_message(payload: &Box<dyn std::any::Any + Send>) -> &str {
    if let Some(s) = payload.downcast_ref::<&str>() {
        s
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s
    } else {
        "<non-string panic payload>"
    }
}

fn sleep_us(us: u64) {
    std::thread::sleep(Duration::from_micros(us));
}

impl Engine {
    /// Builds the engine: collaborators, synchronization objects, worker
    /// threads. Returns once every stage finished its engine-level
    /// initialization.
    pub fn new(config: EngineConfig) -> Self {
        info!(target: "engine", "initializing engine");
        let mut assets_config = config.assets;
        if assets_config.thread_count < 4 {
            assets_config.thread_count = 4;
        }
        let shared = Arc::new(EngineShared {
            app: config.application,
            assets: AssetManager::new(assets_config),
            window: config.window,
            speaker: config.speaker,
            barrier: Barrier::new(4),
            sems: Semaphores {
                graphics_prepare: Semaphore::new(1),
                graphics_dispatch: Semaphore::new(0),
                emit_graphics_start: Semaphore::new(0),
                emit_graphics_assets: Semaphore::new(0),
                emit_graphics_end: Semaphore::new(0),
                emit_sound_start: Semaphore::new(0),
                emit_sound_assets: Semaphore::new(0),
                emit_sound_end: Semaphore::new(0),
            },
            stopping: AtomicBool::new(false),
            emit_is_ready: AtomicBool::new(false),
            current_control_time: AtomicU64::new(0),
            control_tick_us: config.control_tick.as_micros() as u64,
            sound_tick_us: config.sound_tick.as_micros() as u64,
            timings: TimingBuffers::new(),
        });
        // the window arrives bound to the constructing thread; release it
        // for the dispatch thread
        shared.window.make_not_current();

        let workers = vec![
            spawn_stage(&shared, "engine graphics dispatch", dispatch_entry),
            spawn_stage(&shared, "engine graphics prepare", prepare_entry),
            spawn_stage(&shared, "engine sound", sound_entry),
        ];

        // engine-initialization gate
        shared.barrier.wait();
        info!(target: "engine", "engine initialized");
        Self { shared, workers, started: false }
    }

    pub fn context(&self) -> EngineContext {
        self.shared.context()
    }

    pub fn assets(&self) -> &AssetManager {
        &self.shared.assets
    }

    /// Runs the control gameloop on the calling thread; blocks until
    /// [`Engine::stop`] (or a stage failure) stops the engine.
    pub fn start(&mut self) {
        assert!(!self.started, "engine started twice");
        self.started = true;
        let shared = self.shared.clone();
        let ctx = shared.context();

        shared.guarded("initialization (application) in control", || {
            shared.app.control_initialize(&ctx)
        });
        info!(target: "engine", "starting engine");
        shared.barrier.wait();
        shared.barrier.wait();

        shared.guarded("gameloop in control", || control_gameloop(&shared, &ctx));
        shared.sems.emit_graphics_assets.release();
        shared.sems.emit_sound_assets.release();
        info!(target: "engine", "engine stopped");

        shared.guarded("finalization (application) in control", || {
            shared.app.control_finalize(&ctx)
        });
    }

    pub fn stop(&self) {
        self.shared.stop();
    }

    /// Tears the engine down: drains assets, joins the worker threads and
    /// drops collaborators in reverse dependency order. Call after
    /// [`Engine::start`] returned.
    pub fn finalize(mut self) {
        assert!(self.started, "finalize without start");
        info!(target: "engine", "finalizing engine");
        self.shared.stop();
        self.shared.barrier.wait();

        // control-side asset drain; worker stages drain their own queues
        // in their finalize phases until every record is gone
        while self.shared.assets.count_total() > 0 {
            loop {
                let control = self.shared.assets.process_control();
                let custom = self.shared.assets.process_custom(thread_index::CONTROL);
                if !control && !custom {
                    break;
                }
            }
            sleep_us(5000);
        }

        for worker in self.workers.drain(..) {
            if worker.join().is_err() {
                error!(target: "engine", "worker thread terminated by panic");
            }
        }
        // the dispatch thread is gone; reclaim the GL context before the
        // window is destroyed
        self.shared.window.make_current();
        info!(target: "engine", "engine finalized");
    }
}

fn spawn_stage(
    shared: &Arc<EngineShared>,
    name: &str,
    entry: fn(Arc<EngineShared>),
) -> std::thread::JoinHandle<()> {
    let shared = shared.clone();
    std::thread::Builder::new()
        .name(name.to_string())
        .spawn(move || entry(shared))
        .unwrap_or_else(|e| panic!("spawning {name:?}: {e}"))
}

/// Shared skeleton of the three worker stages: engine init, two lifecycle
/// gates, application init, gate, gameloop, gate, application and engine
/// finalize. Every phase is panic-guarded so a failing stage stops the
/// engine instead of wedging a barrier.
fn stage_entry(
    shared: Arc<EngineShared>,
    stage: &str,
    engine_initialize: impl FnOnce(&EngineShared),
    app_initialize: impl FnOnce(&EngineContext),
    gameloop: impl FnOnce(&EngineShared, &EngineContext),
    release_peers: impl Fn(&EngineShared),
    app_finalize: impl FnOnce(&EngineContext),
    asset_thread: usize,
) {
    let ctx = shared.context();
    shared.guarded(&format!("initialization (engine) in {stage}"), || {
        engine_initialize(&shared)
    });
    shared.barrier.wait();
    shared.barrier.wait();
    shared.guarded(&format!("initialization (application) in {stage}"), || {
        app_initialize(&ctx)
    });
    shared.barrier.wait();
    shared.guarded(&format!("gameloop in {stage}"), || gameloop(&shared, &ctx));
    release_peers(&shared);
    shared.barrier.wait();
    shared.guarded(&format!("finalization (application) in {stage}"), || app_finalize(&ctx));
    shared.guarded(&format!("finalization (engine) in {stage}"), || {
        while shared.assets.count_total() > 0 {
            while shared.assets.process_custom(asset_thread) {}
            sleep_us(5000);
        }
    });
}

fn prepare_entry(shared: Arc<EngineShared>) {
    stage_entry(
        shared,
        "graphics prepare",
        |_| {},
        |ctx| ctx.shared.app.prepare_initialize(ctx),
        prepare_gameloop,
        |s| {
            s.sems.emit_graphics_start.release();
            s.sems.emit_graphics_end.release();
            s.sems.graphics_dispatch.release();
        },
        |ctx| ctx.shared.app.prepare_finalize(ctx),
        thread_index::PREPARE,
    );
}

fn dispatch_entry(shared: Arc<EngineShared>) {
    stage_entry(
        shared,
        "graphics dispatch",
        |s| s.window.make_current(),
        |ctx| ctx.shared.app.dispatch_initialize(ctx),
        dispatch_gameloop,
        |s| s.sems.graphics_prepare.release(),
        |ctx| ctx.shared.app.dispatch_finalize(ctx),
        thread_index::DISPATCH,
    );
}

fn sound_entry(shared: Arc<EngineShared>) {
    stage_entry(
        shared,
        "sound",
        |_| {},
        |ctx| ctx.shared.app.sound_initialize(ctx),
        sound_gameloop,
        |s| {
            s.sems.emit_sound_start.release();
            s.sems.emit_sound_end.release();
        },
        |ctx| ctx.shared.app.sound_finalize(ctx),
        thread_index::SOUND,
    );
}

fn control_gameloop(shared: &EngineShared, ctx: &EngineContext) {
    let tick = shared.control_tick_us;
    shared.current_control_time.store(application_time(), Ordering::Release);
    while !shared.stopping.load(Ordering::Acquire) {
        let time1 = application_time();
        shared.app.update(ctx);
        shared.window.process_events();
        let time2 = application_time();

        // emit window: rendezvous with prepare and sound, publish the
        // snapshot, settle asset publication, release the peers
        shared.emit_is_ready.store(true, Ordering::Release);
        shared.sems.emit_graphics_start.acquire();
        shared.sems.emit_sound_start.acquire();
        shared.emit_is_ready.store(false, Ordering::Release);
        let time3 = application_time();
        shared.app.emit(ctx);
        loop {
            let control = shared.assets.process_control();
            let custom = shared.assets.process_custom(thread_index::CONTROL);
            if !control && !custom {
                break;
            }
        }
        shared.sems.emit_graphics_assets.release();
        shared.sems.emit_sound_assets.release();
        shared.sems.emit_graphics_end.acquire();
        shared.sems.emit_sound_end.acquire();
        let time4 = application_time();

        // fixed-step pacing with catch-up skipping
        let mut current = shared.current_control_time.load(Ordering::Acquire);
        let delay = time3.saturating_sub(current);
        if delay > tick * 2 {
            let skip = delay / tick + 1;
            warn!(target: "engine", "skipping {skip} control update ticks");
            current += skip * tick;
        } else {
            if delay < tick {
                sleep_us(tick - delay);
            }
            current += tick;
        }
        shared.current_control_time.store(current, Ordering::Release);
        let time5 = application_time();

        shared.timings.record(TimeBuffer::ControlTick, time2 - time1);
        shared.timings.record(TimeBuffer::ControlWait, time3 - time2);
        shared.timings.record(TimeBuffer::ControlEmit, time4 - time3);
        shared.timings.record(TimeBuffer::ControlSleep, time5 - time4);
    }
}

fn prepare_gameloop(shared: &EngineShared, ctx: &EngineContext) {
    while !shared.stopping.load(Ordering::Acquire) {
        let time1 = application_time();
        shared.sems.graphics_prepare.acquire();
        let time2 = application_time();
        shared.app.prepare(ctx);
        shared.sems.graphics_dispatch.release();
        while shared.assets.process_custom(thread_index::PREPARE) {}
        let time3 = application_time();
        if shared.emit_is_ready.load(Ordering::Acquire) {
            shared.sems.emit_graphics_start.release();
            shared.app.graphics_emit(ctx);
            shared.sems.emit_graphics_end.release();
            shared.sems.emit_graphics_assets.acquire();
        }
        let time4 = application_time();
        shared.timings.record(TimeBuffer::PrepareWait, time2 - time1);
        shared.timings.record(TimeBuffer::PrepareTick, time3 - time2);
        shared.timings.record(TimeBuffer::PrepareEmit, time4 - time3);
    }
}

fn dispatch_gameloop(shared: &EngineShared, ctx: &EngineContext) {
    while !shared.stopping.load(Ordering::Acquire) {
        let time1 = application_time();
        shared.sems.graphics_dispatch.acquire();
        let time2 = application_time();
        shared.app.render(ctx);
        shared.sems.graphics_prepare.release();
        while shared.assets.process_custom(thread_index::DISPATCH) {}
        let time3 = application_time();
        shared.app.swap(ctx);
        shared.window.swap_buffers();
        let time4 = application_time();
        shared.timings.record(TimeBuffer::DispatchWait, time2 - time1);
        shared.timings.record(TimeBuffer::DispatchTick, time3 - time2);
        shared.timings.record(TimeBuffer::DispatchSwap, time4 - time3);
    }
}

fn sound_gameloop(shared: &EngineShared, ctx: &EngineContext) {
    let tick = shared.sound_tick_us;
    let mut sound_tick_time = application_time();
    while !shared.stopping.load(Ordering::Acquire) {
        let time1 = application_time();
        if shared.emit_is_ready.load(Ordering::Acquire) {
            shared.sems.emit_sound_start.release();
            shared.app.sound_emit(ctx);
            shared.sems.emit_sound_end.release();
            shared.sems.emit_sound_assets.acquire();
        }
        let time2 = application_time();
        while shared.assets.process_custom(thread_index::SOUND) {}
        shared.app.sound(ctx);
        shared.speaker.render(sound_tick_time);
        let time3 = application_time();

        let delay = time3.saturating_sub(sound_tick_time);
        if delay > tick * 2 {
            let skip = delay / tick + 1;
            warn!(target: "engine", "skipping {skip} sound ticks");
            sound_tick_time += skip * tick;
        } else {
            if delay < tick {
                sleep_us(tick - delay);
            }
            sound_tick_time += tick;
        }
        let time4 = application_time();
        shared.timings.record(TimeBuffer::SoundEmit, time2 - time1);
        shared.timings.record(TimeBuffer::SoundTick, time3 - time2);
        shared.timings.record(TimeBuffer::SoundSleep, time4 - time3);
    }
}
