//! Per-stage frame timing instrumentation.
//!
//! Each stage records the wall-clock duration of its phases every tick
//! into a fixed 64-sample window. The writer is the owning stage; readers
//! run on the control thread and may observe values mid-update, which
//! profiling consumers tolerate.

use std::sync::OnceLock;
use std::time::Instant;

use parking_lot::Mutex;
use skein_core::SmoothingBuffer;

/// Microseconds since the first call in this process.
pub fn application_time() -> u64 {
    static START: OnceLock<Instant> = OnceLock::new();
    START.get_or_init(Instant::now).elapsed().as_micros() as u64
}

/// One phase of one stage.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TimeBuffer {
    ControlTick,
    ControlWait,
    ControlEmit,
    ControlSleep,
    PrepareWait,
    PrepareTick,
    PrepareEmit,
    DispatchWait,
    DispatchTick,
    DispatchSwap,
    SoundEmit,
    SoundTick,
    SoundSleep,
}

pub(crate) struct TimingBuffers {
    buffers: [Mutex<SmoothingBuffer<64>>; 13],
}

impl TimingBuffers {
    pub fn new() -> Self {
        Self { buffers: std::array::from_fn(|_| Mutex::new(SmoothingBuffer::new())) }
    }

    pub fn record(&self, which: TimeBuffer, micros: u64) {
        self.buffers[which as usize].lock().add(micros);
    }

    pub fn read(&self, which: TimeBuffer, smooth: bool) -> u64 {
        let b = self.buffers[which as usize].lock();
        if smooth {
            b.smooth()
        } else {
            b.last()
        }
    }
}
