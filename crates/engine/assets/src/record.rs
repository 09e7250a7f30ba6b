//! Asset records.

use std::any::Any;
use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};
use std::sync::Arc;

use parking_lot::Mutex;

/// Externally visible lifecycle state of an asset.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AssetState {
    /// Published and usable.
    Ready,
    /// Loading failed; dependents inherit the failure.
    Error,
    /// Known but still somewhere in the pipeline.
    Unknown,
    /// No record under this name.
    NotFound,
}

/// Opaque published payload.
pub type Payload = Arc<dyn Any + Send + Sync>;

/// Fields only ever touched by the pipeline stage currently owning the
/// record, serialized by the queue hand-offs.
#[derive(Default)]
pub(crate) struct RecordState {
    pub scheme: Option<u16>,
    pub flags: u32,
    pub text_name: String,
    pub internationalized_name: u32,
    pub internationalized_previous: u32,
    pub compressed: Vec<u8>,
    pub original: Vec<u8>,
    /// declared decoded size from the file header
    pub original_size: u32,
    /// dependency names of the last successfully loaded revision
    pub dependencies: Vec<u32>,
    /// dependency names of the revision being loaded
    pub dependencies_new: Vec<u32>,
    pub payload: Option<Payload>,
}

/// One asset. Records are shared between the index and the pipeline
/// queues; the reference count is the only lifetime authority.
pub struct AssetRecord {
    pub(crate) real_name: u32,
    pub(crate) state: Mutex<RecordState>,
    pub(crate) references: AtomicU32,
    pub(crate) processing: AtomicBool,
    pub(crate) ready: AtomicBool,
    pub(crate) error: AtomicBool,
    pub(crate) dependencies_resolved: AtomicBool,
    pub(crate) fabricated: AtomicBool,
}

impl AssetRecord {
    pub(crate) fn new(real_name: u32) -> Self {
        Self {
            real_name,
            state: Mutex::new(RecordState {
                text_name: format!("<{real_name}>"),
                ..RecordState::default()
            }),
            references: AtomicU32::new(0),
            processing: AtomicBool::new(false),
            ready: AtomicBool::new(false),
            error: AtomicBool::new(true),
            dependencies_resolved: AtomicBool::new(false),
            fabricated: AtomicBool::new(false),
        }
    }

    pub fn real_name(&self) -> u32 {
        self.real_name
    }

    pub fn text_name(&self) -> String {
        self.state.lock().text_name.clone()
    }

    pub fn state_enum(&self) -> AssetState {
        if self.error.load(Ordering::Acquire) {
            AssetState::Error
        } else if self.ready.load(Ordering::Acquire) {
            AssetState::Ready
        } else {
            AssetState::Unknown
        }
    }

    pub(crate) fn payload(&self) -> Option<Payload> {
        self.state.lock().payload.clone()
    }
}

impl std::fmt::Debug for AssetRecord {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AssetRecord")
            .field("real_name", &self.real_name)
            .field("references", &self.references.load(Ordering::Relaxed))
            .field("processing", &self.processing.load(Ordering::Relaxed))
            .field("ready", &self.ready.load(Ordering::Relaxed))
            .field("error", &self.error.load(Ordering::Relaxed))
            .field("fabricated", &self.fabricated.load(Ordering::Relaxed))
            .finish()
    }
}
