//! The asset manager.
//!
//! Thread contract: [`AssetManager::add`], [`AssetManager::remove`],
//! [`AssetManager::fabricate`], [`AssetManager::reload`] and
//! [`AssetManager::process_control`] belong to the control thread; all
//! index inserts and erases happen there. Lookups (`state`, `get`) are
//! lock-free reads and may run from any thread.
//! [`AssetManager::process_custom`] is called by whichever pipeline stage
//! owns that worker-thread index. The disk-IO and decompression threads
//! are owned by the manager itself.

use std::io::Read;
use std::net::TcpStream;
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};
use std::sync::Arc;

use crossbeam_channel::{unbounded, Receiver, Sender};
use dashmap::DashMap;
use parking_lot::{Mutex, RwLock};
use tracing::{debug, info, warn};

use skein_core::hash_name;

use crate::format;
use crate::record::{AssetRecord, AssetState, Payload, RecordState};
use crate::scheme::{AssetContext, AssetScheme};
use crate::AssetsError;

/// Construction parameters.
#[derive(Debug, Clone)]
pub struct AssetManagerConfig {
    /// directory the disk-IO thread resolves hashed names in
    pub path: PathBuf,
    /// size of the scheme slot table
    pub scheme_capacity: usize,
    /// number of per-thread custom queue pairs
    pub thread_count: usize,
}

impl Default for AssetManagerConfig {
    fn default() -> Self {
        Self { path: PathBuf::from("assets"), scheme_capacity: 50, thread_count: 5 }
    }
}

type RecordQueue = (Sender<Arc<AssetRecord>>, Receiver<Arc<AssetRecord>>);

/// Test/tool hook supplying asset bytes without disk access.
pub type FindHook = Box<dyn Fn(u32) -> Option<Vec<u8>> + Send + Sync>;

struct ReloadListener {
    stream: TcpStream,
    pending: Vec<u8>,
}

pub(crate) struct ManagerInner {
    path: PathBuf,
    find_hook: RwLock<Option<FindHook>>,
    index: DashMap<u32, Arc<AssetRecord>>,
    inter_names: Mutex<std::collections::HashMap<u32, Vec<Arc<AssetRecord>>>>,
    schemes: RwLock<Vec<Option<AssetScheme>>>,
    listener: Mutex<Option<ReloadListener>>,

    queue_load_file: RecordQueue,
    queue_decompression: RecordQueue,
    queue_custom_load: Vec<RecordQueue>,
    queue_custom_done: Vec<RecordQueue>,
    queue_add_dependencies: RecordQueue,
    queue_wait_dependencies: RecordQueue,
    queue_remove_dependencies: RecordQueue,

    count_total: AtomicU32,
    count_processing: AtomicU32,
    destroying: AtomicBool,
}

/// See the module docs.
pub struct AssetManager {
    inner: Arc<ManagerInner>,
    io_thread: Option<std::thread::JoinHandle<()>>,
    decompression_thread: Option<std::thread::JoinHandle<()>>,
}

impl AssetManager {
    pub fn new(config: AssetManagerConfig) -> Self {
        info!(target: "assets", path = %config.path.display(), "using asset path");
        let mut schemes = Vec::with_capacity(config.scheme_capacity);
        schemes.resize_with(config.scheme_capacity, || None);
        let inner = Arc::new(ManagerInner {
            path: config.path,
            find_hook: RwLock::new(None),
            index: DashMap::new(),
            inter_names: Mutex::new(std::collections::HashMap::new()),
            schemes: RwLock::new(schemes),
            listener: Mutex::new(None),
            queue_load_file: unbounded(),
            queue_decompression: unbounded(),
            queue_custom_load: (0..config.thread_count).map(|_| unbounded()).collect(),
            queue_custom_done: (0..config.thread_count).map(|_| unbounded()).collect(),
            queue_add_dependencies: unbounded(),
            queue_wait_dependencies: unbounded(),
            queue_remove_dependencies: unbounded(),
            count_total: AtomicU32::new(0),
            count_processing: AtomicU32::new(0),
            destroying: AtomicBool::new(false),
        });

        let io_inner = inner.clone();
        let io_thread = std::thread::Builder::new()
            .name("asset disk io".into())
            .spawn(move || {
                while !io_inner.destroying.load(Ordering::Acquire) {
                    while io_inner.process_io_thread() {}
                    std::thread::sleep(std::time::Duration::from_millis(5));
                }
            })
            .expect("spawning the asset disk io thread");
        let dc_inner = inner.clone();
        let decompression_thread = std::thread::Builder::new()
            .name("asset decompression".into())
            .spawn(move || {
                while !dc_inner.destroying.load(Ordering::Acquire) {
                    while dc_inner.process_decompression_thread() {}
                    std::thread::sleep(std::time::Duration::from_millis(5));
                }
            })
            .expect("spawning the asset decompression thread");

        Self { inner, io_thread: Some(io_thread), decompression_thread: Some(decompression_thread) }
    }

    /// Registers the scheme under `index`. Re-registration replaces the
    /// previous entry; indices are reserved per subsystem.
    pub fn define_scheme(&self, index: u16, scheme: AssetScheme) {
        let mut schemes = self.inner.schemes.write();
        assert!((index as usize) < schemes.len(), "scheme index {index} out of capacity");
        assert!(
            scheme.thread_index < self.inner.queue_custom_load.len(),
            "scheme thread index {} out of range",
            scheme.thread_index
        );
        schemes[index as usize] = Some(scheme);
    }

    /// Supplies asset bytes directly, bypassing the disk.
    pub fn set_find_hook(&self, hook: FindHook) {
        *self.inner.find_hook.write() = Some(hook);
    }

    pub fn count_total(&self) -> u32 {
        self.inner.count_total.load(Ordering::Acquire)
    }

    pub fn count_processing(&self) -> u32 {
        self.inner.count_processing.load(Ordering::Acquire)
    }

    pub fn state(&self, name: u32) -> AssetState {
        self.inner.state(name)
    }

    /// Whether the asset is published. An `Error` state is escalated: the
    /// failing asset's names are logged and an error is returned.
    pub fn ready(&self, name: u32) -> Result<bool, AssetsError> {
        match self.state(name) {
            AssetState::Ready => Ok(true),
            AssetState::NotFound | AssetState::Unknown => Ok(false),
            AssetState::Error => {
                let text = self.inner.index.get(&name).map(|r| r.text_name()).unwrap_or_default();
                warn!(target: "assets", name, text = %text, "asset has failed to load");
                Err(AssetsError::InvalidState(format!("asset '{text}' has failed to load")))
            }
        }
    }

    /// The published payload, downcast to its scheme type.
    pub fn get<T: Send + Sync + 'static>(&self, name: u32) -> Option<Arc<T>> {
        let rec = self.inner.index.get(&name)?.value().clone();
        if rec.state_enum() != AssetState::Ready {
            return None;
        }
        rec.payload()?.downcast::<T>().ok()
    }

    pub fn scheme(&self, name: u32) -> Option<u16> {
        let rec = self.inner.index.get(&name)?.value().clone();
        let scheme = rec.state.lock().scheme;
        scheme
    }

    /// Dependency names of the last successfully loaded revision.
    pub fn dependencies(&self, name: u32) -> Vec<u32> {
        self.inner
            .index
            .get(&name)
            .map(|r| r.state.lock().dependencies.clone())
            .unwrap_or_default()
    }

    /// Registers interest in an asset, loading it on first use.
    /// Control thread only.
    pub fn add(&self, name: u32) {
        self.inner.add(name);
    }

    /// Releases one reference; the last release starts removal.
    /// Control thread only. Removal by internationalized name is forbidden.
    pub fn remove(&self, name: u32) {
        self.inner.remove(name);
    }

    /// Creates a record whose payload comes from the caller instead of the
    /// load pipeline; publish it with [`Self::set`]. Control thread only.
    pub fn fabricate(&self, scheme: u16, name: u32, text_name: &str) {
        self.inner.fabricate(scheme, name, text_name);
    }

    /// Publishes (or withdraws, with `None`) a fabricated payload.
    pub fn set(&self, name: u32, value: Option<Payload>) -> Result<(), AssetsError> {
        self.inner.set(name, value)
    }

    /// Schedules a loaded asset to load again; with `recursive` the whole
    /// dependency closure reloads. Control thread only.
    pub fn reload(&self, name: u32, recursive: bool) {
        self.inner.reload(name, recursive);
    }

    /// Connects the hot-reload channel; newline-separated asset names
    /// received over it are reloaded.
    pub fn listen(&self, host: &str, port: u16) -> Result<(), AssetsError> {
        let stream = TcpStream::connect((host, port))?;
        stream.set_nonblocking(true)?;
        info!(target: "assets", host, port, "listening for asset updates");
        *self.inner.listener.lock() = Some(ReloadListener { stream, pending: Vec::new() });
        Ok(())
    }

    /// Drains one unit of control-thread work. Call in a loop until it
    /// returns false.
    pub fn process_control(&self) -> bool {
        self.inner.process_control()
    }

    /// Drains one unit of `load`/`done` work queued for a worker thread
    /// index. Call from the pipeline stage owning that index.
    pub fn process_custom(&self, thread_index: usize) -> bool {
        self.inner.process_custom(thread_index)
    }
}

impl Drop for AssetManager {
    fn drop(&mut self) {
        let total = self.count_total();
        let processing = self.count_processing();
        if total != 0 || processing != 0 {
            warn!(
                target: "assets",
                total, processing,
                "asset manager destroyed with live assets"
            );
        }
        self.inner.destroying.store(true, Ordering::Release);
        if let Some(t) = self.io_thread.take() {
            let _ = t.join();
        }
        if let Some(t) = self.decompression_thread.take() {
            let _ = t.join();
        }
    }
}

impl ManagerInner {
    fn state(&self, name: u32) -> AssetState {
        match self.index.get(&name) {
            Some(rec) => rec.state_enum(),
            None => AssetState::NotFound,
        }
    }

    fn add(&self, name: u32) {
        assert!(name != 0, "the zero asset name is reserved");
        let rec = match self.index.get(&name) {
            Some(r) => r.value().clone(),
            None => {
                let r = Arc::new(AssetRecord::new(name));
                self.index.insert(name, r.clone());
                self.count_total.fetch_add(1, Ordering::AcqRel);
                self.start_loading(&r);
                r
            }
        };
        rec.references.fetch_add(1, Ordering::AcqRel);
    }

    fn remove(&self, name: u32) {
        let rec = self
            .index
            .get(&name)
            .map(|r| r.value().clone())
            .expect("removing an unknown asset");
        debug_assert_eq!(
            rec.real_name, name,
            "assets cannot be removed by their internationalized names"
        );
        let previous = rec.references.fetch_sub(1, Ordering::AcqRel);
        debug_assert!(previous > 0, "unbalanced asset remove");
        if previous == 1 {
            self.start_removing(&rec);
        }
    }

    fn fabricate(&self, scheme: u16, name: u32, text_name: &str) {
        assert!(name != 0, "the zero asset name is reserved");
        assert!(
            self.schemes.read().get(scheme as usize).is_some_and(|s| s.is_some()),
            "fabricating with unregistered scheme {scheme}"
        );
        assert!(!self.index.contains_key(&name), "fabricating an already known asset");
        let rec = Arc::new(AssetRecord::new(name));
        rec.fabricated.store(true, Ordering::Release);
        rec.error.store(false, Ordering::Release);
        rec.references.store(1, Ordering::Release);
        {
            let mut st = rec.state.lock();
            st.scheme = Some(scheme);
            st.text_name = text_name.to_string();
        }
        self.index.insert(name, rec);
        self.count_total.fetch_add(1, Ordering::AcqRel);
    }

    fn set(&self, name: u32, value: Option<Payload>) -> Result<(), AssetsError> {
        let rec = self
            .index
            .get(&name)
            .map(|r| r.value().clone())
            .ok_or_else(|| AssetsError::InvalidState(format!("unknown asset {name}")))?;
        if !rec.fabricated.load(Ordering::Acquire) {
            return Err(AssetsError::InvalidState(format!(
                "asset {name} is not fabricated; its payload belongs to the load pipeline"
            )));
        }
        let mut st = rec.state.lock();
        if let Some(value) = &value {
            let scheme_idx = st.scheme.expect("fabricated records carry a scheme");
            let schemes = self.schemes.read();
            let scheme = schemes[scheme_idx as usize].as_ref().expect("scheme registered");
            if (**value).type_id() != scheme.type_id {
                rec.error.store(true, Ordering::Release);
                return Err(AssetsError::InvalidState(format!(
                    "asset '{}' published with a payload that is not a {}",
                    st.text_name, scheme.type_name
                )));
            }
        }
        let published = value.is_some();
        st.payload = value;
        drop(st);
        rec.error.store(false, Ordering::Release);
        rec.ready.store(published, Ordering::Release);
        Ok(())
    }

    fn reload(&self, name: u32, recursive: bool) {
        let Some(rec) = self.index.get(&name).map(|r| r.value().clone()) else {
            warn!(target: "assets", name, "reload of unknown asset");
            return;
        };
        self.start_loading(&rec);
        if recursive {
            let deps = rec.state.lock().dependencies.clone();
            for dep in deps {
                self.reload(dep, true);
            }
        }
    }

    fn start_loading(&self, rec: &Arc<AssetRecord>) {
        if rec.processing.load(Ordering::Acquire) || rec.fabricated.load(Ordering::Acquire) {
            return;
        }
        self.count_processing.fetch_add(1, Ordering::AcqRel);
        rec.processing.store(true, Ordering::Release);
        rec.error.store(false, Ordering::Release);
        let _ = self.queue_load_file.0.send(rec.clone());
    }

    fn start_removing(&self, rec: &Arc<AssetRecord>) {
        if rec.processing.load(Ordering::Acquire) {
            return;
        }
        self.count_processing.fetch_add(1, Ordering::AcqRel);
        rec.processing.store(true, Ordering::Release);
        rec.ready.store(false, Ordering::Release);
        let scheme = rec.state.lock().scheme;
        match scheme {
            None => {
                let _ = self.queue_remove_dependencies.0.send(rec.clone());
            }
            Some(_) if rec.fabricated.load(Ordering::Acquire) => {
                let _ = self.queue_remove_dependencies.0.send(rec.clone());
            }
            Some(s) => {
                let thread = self.scheme_thread(s);
                let _ = self.queue_custom_done[thread].0.send(rec.clone());
            }
        }
    }

    fn scheme_thread(&self, scheme: u16) -> usize {
        self.schemes.read()[scheme as usize]
            .as_ref()
            .expect("asset carries an unregistered scheme")
            .thread_index
    }

    /// Disk-IO stage: read and validate the file, stash header data and
    /// the body, and fan out to decompression / load / dependency queues.
    pub(crate) fn process_io_thread(&self) -> bool {
        let Ok(rec) = self.queue_load_file.1.try_recv() else {
            return false;
        };
        debug_assert!(rec.processing.load(Ordering::Acquire));
        debug_assert!(!rec.fabricated.load(Ordering::Acquire));

        let mut scheme_thread = 0usize;
        let mut compressed = false;
        let failed = {
            let mut st = rec.state.lock();
            st.internationalized_previous = st.internationalized_name;
            st.scheme = None;
            st.flags = 0;
            st.internationalized_name = 0;
            st.text_name = format!("<{}>", rec.real_name);
            st.dependencies_new.clear();
            st.compressed = Vec::new();
            st.original = Vec::new();
            st.original_size = 0;

            match self.load_from_disk(rec.real_name, &mut st) {
                Ok((thread, has_compressed)) => {
                    scheme_thread = thread;
                    compressed = has_compressed;
                    false
                }
                Err(e) => {
                    warn!(target: "assets", name = rec.real_name, error = %e, "asset file rejected");
                    true
                }
            }
        };

        if failed {
            // bypass the rest of the loading pipeline
            rec.error.store(true, Ordering::Release);
            rec.dependencies_resolved.store(true, Ordering::Release);
            let _ = self.queue_wait_dependencies.0.send(rec);
        } else {
            if compressed {
                let _ = self.queue_decompression.0.send(rec.clone());
            } else {
                let _ = self.queue_custom_load[scheme_thread].0.send(rec.clone());
            }
            let _ = self.queue_add_dependencies.0.send(rec);
        }
        true
    }

    fn load_from_disk(&self, name: u32, st: &mut RecordState) -> Result<(usize, bool), AssetsError> {
        let bytes = {
            let hook = self.find_hook.read();
            match hook.as_ref().and_then(|h| h(name)) {
                Some(b) => b,
                None => std::fs::read(self.path.join(name.to_string()))?,
            }
        };
        let scheme_count = self.schemes.read().len();
        let (header, deps, body) = format::parse_file(&bytes, scheme_count)?;
        let thread = {
            let schemes = self.schemes.read();
            schemes[header.scheme as usize]
                .as_ref()
                .ok_or_else(|| {
                    AssetsError::Format(format!("asset scheme {} is not registered", header.scheme))
                })?
                .thread_index
        };
        st.scheme = Some(header.scheme);
        st.flags = header.flags;
        st.internationalized_name = header.internationalized_name;
        st.text_name = header.text_name.clone();
        st.dependencies_new = deps;
        st.original_size = header.original_size;
        let compressed = header.compressed_size > 0;
        if compressed {
            st.compressed = body.to_vec();
        } else {
            st.original = body.to_vec();
        }
        Ok((thread, compressed))
    }

    /// Decompression stage.
    pub(crate) fn process_decompression_thread(&self) -> bool {
        let Ok(rec) = self.queue_decompression.1.try_recv() else {
            return false;
        };
        debug_assert!(rec.processing.load(Ordering::Acquire));
        debug_assert!(!rec.fabricated.load(Ordering::Acquire));

        let scheme_idx = rec.state.lock().scheme.expect("decompressing without a scheme");
        if !rec.error.load(Ordering::Acquire) {
            let schemes = self.schemes.read();
            let scheme = schemes[scheme_idx as usize].as_ref().expect("scheme registered");
            let mut st = rec.state.lock();
            let result = match &scheme.decompress {
                Some(f) => {
                    let RecordState { compressed, original, original_size, flags, text_name, .. } =
                        &mut *st;
                    let mut ctx = AssetContext {
                        real_name: rec.real_name,
                        text_name,
                        flags: *flags,
                        compressed: compressed.as_slice(),
                        original,
                        original_size: *original_size,
                    };
                    f(&mut ctx)
                }
                None => Err(AssetsError::Format(
                    "asset is compressed but its scheme has no decompressor".into(),
                )),
            };
            if let Err(e) = result {
                warn!(target: "assets", name = rec.real_name, error = %e, "asset decompression failed");
                rec.error.store(true, Ordering::Release);
            }
        }
        let thread = self.scheme_thread(scheme_idx);
        let _ = self.queue_custom_load[thread].0.send(rec);
        true
    }

    /// Worker-thread stage: `done` first, then `load`.
    pub(crate) fn process_custom(&self, thread_index: usize) -> bool {
        debug_assert!(thread_index < self.queue_custom_done.len());

        if let Ok(rec) = self.queue_custom_done[thread_index].1.try_recv() {
            debug_assert!(rec.processing.load(Ordering::Acquire));
            debug_assert!(!rec.fabricated.load(Ordering::Acquire));
            let (scheme_idx, payload) = {
                let mut st = rec.state.lock();
                (st.scheme.expect("done without a scheme"), st.payload.take())
            };
            if let Some(payload) = payload {
                let schemes = self.schemes.read();
                let scheme = schemes[scheme_idx as usize].as_ref().expect("scheme registered");
                if let Some(done) = &scheme.done {
                    done(payload);
                }
            }
            let _ = self.queue_remove_dependencies.0.send(rec);
            return true;
        }

        if let Ok(rec) = self.queue_custom_load[thread_index].1.try_recv() {
            debug_assert!(rec.processing.load(Ordering::Acquire));
            debug_assert!(!rec.fabricated.load(Ordering::Acquire));
            if !rec.error.load(Ordering::Acquire) {
                let schemes = self.schemes.read();
                let mut st = rec.state.lock();
                let scheme_idx = st.scheme.expect("loading without a scheme");
                let scheme = schemes[scheme_idx as usize].as_ref().expect("scheme registered");
                let result = {
                    let RecordState { compressed, original, original_size, flags, text_name, .. } =
                        &mut *st;
                    let mut ctx = AssetContext {
                        real_name: rec.real_name,
                        text_name,
                        flags: *flags,
                        compressed: compressed.as_slice(),
                        original,
                        original_size: *original_size,
                    };
                    (scheme.load)(&mut ctx)
                };
                match result {
                    Ok(payload) => {
                        if (*payload).type_id() != scheme.type_id {
                            warn!(
                                target: "assets",
                                name = rec.real_name,
                                text = %st.text_name,
                                expected = scheme.type_name,
                                "scheme loader published a payload of the wrong type"
                            );
                            rec.error.store(true, Ordering::Release);
                        } else {
                            st.payload = Some(payload);
                        }
                    }
                    Err(e) => {
                        warn!(target: "assets", name = rec.real_name, text = %st.text_name, error = %e, "asset load failed");
                        drop(st);
                        rec.error.store(true, Ordering::Release);
                    }
                }
            }
            let _ = self.queue_wait_dependencies.0.send(rec);
            return true;
        }

        false
    }

    /// Control-thread stage: dependency bookkeeping, publication, record
    /// destruction, hot-reload polling.
    pub(crate) fn process_control(&self) -> bool {
        // remove
        if let Ok(rec) = self.queue_remove_dependencies.1.try_recv() {
            debug_assert!(rec.processing.load(Ordering::Acquire));
            let deps = std::mem::take(&mut rec.state.lock().dependencies);
            for dep in deps {
                self.remove(dep);
            }
            rec.processing.store(false, Ordering::Release);
            self.count_processing.fetch_sub(1, Ordering::AcqRel);
            if rec.references.load(Ordering::Acquire) > 0 {
                self.start_loading(&rec);
            } else {
                let inter = rec.state.lock().internationalized_name;
                self.inter_name_clear(inter, &rec);
                self.index.remove(&rec.real_name);
                self.count_total.fetch_sub(1, Ordering::AcqRel);
            }
            return true;
        }

        // add
        if let Ok(rec) = self.queue_add_dependencies.1.try_recv() {
            debug_assert!(rec.processing.load(Ordering::Acquire));
            debug_assert!(!rec.fabricated.load(Ordering::Acquire));
            let (new, old) = {
                let mut st = rec.state.lock();
                let new = std::mem::take(&mut st.dependencies_new);
                let old = std::mem::replace(&mut st.dependencies, new.clone());
                (new, old)
            };
            for dep in new {
                self.add(dep);
            }
            for dep in old {
                self.remove(dep);
            }
            rec.dependencies_resolved.store(true, Ordering::Release);
            return true;
        }

        // wait
        if let Ok(rec) = self.queue_wait_dependencies.1.try_recv() {
            debug_assert!(rec.processing.load(Ordering::Acquire));
            debug_assert!(!rec.fabricated.load(Ordering::Acquire));
            let mut wait = !rec.dependencies_resolved.load(Ordering::Acquire);
            if !wait {
                let deps = rec.state.lock().dependencies.clone();
                for dep in deps {
                    match self.state(dep) {
                        AssetState::Ready => {}
                        AssetState::Error => {
                            rec.error.store(true, Ordering::Release);
                        }
                        AssetState::Unknown => wait = true,
                        AssetState::NotFound => {
                            warn!(target: "assets", name = rec.real_name, dep, "dependency record vanished");
                            rec.error.store(true, Ordering::Release);
                        }
                    }
                }
            }
            if wait {
                let _ = self.queue_wait_dependencies.0.send(rec);
                return false;
            }
            {
                let mut st = rec.state.lock();
                if st.internationalized_name != st.internationalized_previous {
                    let (inter, previous) = (st.internationalized_name, st.internationalized_previous);
                    drop(st);
                    self.inter_name_set(inter, &rec);
                    self.inter_name_clear(previous, &rec);
                    st = rec.state.lock();
                }
                st.internationalized_previous = 0;
                st.compressed = Vec::new();
                st.original = Vec::new();
            }
            rec.dependencies_resolved.store(false, Ordering::Release);
            rec.processing.store(false, Ordering::Release);
            rec.ready.store(true, Ordering::Release);
            self.count_processing.fetch_sub(1, Ordering::AcqRel);
            if rec.error.load(Ordering::Acquire) {
                warn!(target: "assets", name = rec.real_name, text = %rec.text_name(), "asset loading failed");
            }
            if rec.references.load(Ordering::Acquire) == 0 {
                self.start_removing(&rec);
            }
            return true;
        }

        self.poll_listener()
    }

    fn inter_name_set(&self, inter: u32, rec: &Arc<AssetRecord>) {
        if inter == 0 {
            return;
        }
        let mut table = self.inter_names.lock();
        let set = table.entry(inter).or_default();
        debug_assert!(!set.iter().any(|r| Arc::ptr_eq(r, rec)));
        set.push(rec.clone());
        if !self.index.contains_key(&inter) {
            self.index.insert(inter, rec.clone());
        }
    }

    fn inter_name_clear(&self, inter: u32, rec: &Arc<AssetRecord>) {
        if inter == 0 {
            return;
        }
        let mut table = self.inter_names.lock();
        let Some(set) = table.get_mut(&inter) else {
            debug_assert!(false, "clearing an unknown internationalized name");
            return;
        };
        set.retain(|r| !Arc::ptr_eq(r, rec));
        self.index.remove(&inter);
        if set.is_empty() {
            table.remove(&inter);
        } else {
            // the alias stays resolvable through any surviving record
            self.index.insert(inter, set[0].clone());
        }
    }

    fn poll_listener(&self) -> bool {
        let mut guard = self.listener.lock();
        let Some(listener) = guard.as_mut() else {
            return false;
        };
        let mut buf = [0u8; 512];
        let mut disconnect = false;
        loop {
            match listener.stream.read(&mut buf) {
                Ok(0) => {
                    disconnect = true;
                    break;
                }
                Ok(n) => listener.pending.extend_from_slice(&buf[..n]),
                Err(e) if e.kind() == std::io::ErrorKind::WouldBlock => break,
                Err(e) => {
                    debug!(target: "assets", error = %e, "hot-reload connection lost");
                    disconnect = true;
                    break;
                }
            }
        }
        let mut lines = Vec::new();
        while let Some(pos) = listener.pending.iter().position(|&b| b == b'\n') {
            let line: Vec<u8> = listener.pending.drain(..=pos).collect();
            if let Ok(text) = String::from_utf8(line[..line.len() - 1].to_vec()) {
                let token = text.trim().to_string();
                if !token.is_empty() {
                    lines.push(token);
                }
            }
        }
        if disconnect {
            *guard = None;
        }
        drop(guard);

        let mut reloaded = 0;
        for token in lines {
            let name = hash_name(&token);
            let referenced = self
                .index
                .get(&name)
                .is_some_and(|r| r.references.load(Ordering::Acquire) > 0);
            if referenced {
                info!(target: "assets", asset = %token, "asset hot-reloading");
                self.reload(name, false);
                reloaded += 1;
            } else {
                warn!(target: "assets", asset = %token, "asset will not be hot-reloaded");
            }
        }
        reloaded > 0
    }
}
