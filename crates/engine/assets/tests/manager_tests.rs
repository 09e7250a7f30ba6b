//! End-to-end tests of the asset pipeline, driving the control and worker
//! stages the way the engine's frame pipeline would.

use std::io::Write;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use skein_assets::format::{write_file, AssetHeader};
use skein_assets::{
    raw_scheme, scheme_index, AssetManager, AssetManagerConfig, AssetState,
};
use skein_core::hash_name;

fn init_logging() {
    let _ = tracing_subscriber::fmt().with_env_filter("assets=debug").try_init();
}

fn manager_with_path(path: &std::path::Path) -> AssetManager {
    init_logging();
    let m = AssetManager::new(AssetManagerConfig {
        path: path.to_path_buf(),
        ..AssetManagerConfig::default()
    });
    m.define_scheme(scheme_index::RAW, raw_scheme(0));
    m
}

/// Pumps the control and worker-0 queues until `until` holds or the
/// timeout passes. Returns whether the condition was reached.
fn drain(m: &AssetManager, timeout_ms: u64, mut until: impl FnMut() -> bool) -> bool {
    let deadline = Instant::now() + Duration::from_millis(timeout_ms);
    loop {
        loop {
            let control = m.process_control();
            let custom = m.process_custom(0);
            if !control && !custom {
                break;
            }
        }
        if until() {
            return true;
        }
        if Instant::now() > deadline {
            return false;
        }
        std::thread::sleep(Duration::from_millis(2));
    }
}

fn raw_asset(text_name: &str, deps: &[u32], body: &[u8]) -> Vec<u8> {
    let mut h = AssetHeader::new(text_name, scheme_index::RAW);
    h.original_size = body.len() as u32;
    write_file(&h, deps, body)
}

fn write_asset(dir: &std::path::Path, name: u32, bytes: &[u8]) {
    std::fs::write(dir.join(name.to_string()), bytes).unwrap();
}

#[test]
fn load_publish_and_unload() {
    let dir = tempfile::tempdir().unwrap();
    let name = hash_name("data/blob");
    write_asset(dir.path(), name, &raw_asset("data/blob", &[], b"payload bytes"));
    let m = manager_with_path(dir.path());

    m.add(name);
    assert!(drain(&m, 2000, || m.state(name) == AssetState::Ready), "asset never became ready");
    let bytes = m.get::<Vec<u8>>(name).expect("published payload");
    assert_eq!(bytes.as_slice(), b"payload bytes");
    assert!(m.ready(name).unwrap());
    assert_eq!(m.count_total(), 1);

    m.remove(name);
    assert!(drain(&m, 2000, || m.count_total() == 0));
    assert_eq!(m.state(name), AssetState::NotFound);
}

#[test]
fn compressed_assets_inflate_on_the_decompression_thread() {
    let dir = tempfile::tempdir().unwrap();
    let body: Vec<u8> = (0..2000u32).flat_map(|i| (i % 251).to_le_bytes()).collect();
    let mut enc = flate2::write::ZlibEncoder::new(Vec::new(), flate2::Compression::default());
    enc.write_all(&body).unwrap();
    let compressed = enc.finish().unwrap();

    let name = hash_name("data/compressed");
    let mut h = AssetHeader::new("data/compressed", scheme_index::RAW);
    h.original_size = body.len() as u32;
    h.compressed_size = compressed.len() as u32;
    write_asset(dir.path(), name, &write_file(&h, &[], &compressed));

    let m = manager_with_path(dir.path());
    m.add(name);
    assert!(drain(&m, 2000, || m.state(name) == AssetState::Ready));
    assert_eq!(m.get::<Vec<u8>>(name).unwrap().as_slice(), body.as_slice());
    m.remove(name);
    assert!(drain(&m, 2000, || m.count_total() == 0));
}

#[test]
fn reference_counting_balances() {
    let dir = tempfile::tempdir().unwrap();
    let name = hash_name("counted");
    write_asset(dir.path(), name, &raw_asset("counted", &[], b"x"));
    let m = manager_with_path(dir.path());

    m.add(name);
    m.add(name);
    m.remove(name);
    assert_eq!(m.count_total(), 1);
    m.remove(name);
    assert!(drain(&m, 2000, || m.count_total() == 0));
    assert_eq!(m.state(name), AssetState::NotFound);
}

#[test]
fn missing_file_is_an_error_not_a_hang() {
    let dir = tempfile::tempdir().unwrap();
    let name = hash_name("not/there");
    let m = manager_with_path(dir.path());
    m.add(name);
    assert!(drain(&m, 2000, || m.state(name) == AssetState::Error));
    assert!(m.ready(name).is_err());
    assert!(m.get::<Vec<u8>>(name).is_none());
    m.remove(name);
    assert!(drain(&m, 2000, || m.count_total() == 0));
}

#[test]
fn dependencies_load_first_and_unload_with_their_dependent() {
    let dir = tempfile::tempdir().unwrap();
    let dep = hash_name("textures/base");
    let top = hash_name("models/crate");
    write_asset(dir.path(), dep, &raw_asset("textures/base", &[], b"texels"));
    write_asset(dir.path(), top, &raw_asset("models/crate", &[dep], b"mesh"));
    let m = manager_with_path(dir.path());

    m.add(top);
    assert!(drain(&m, 2000, || m.state(top) == AssetState::Ready));
    assert_eq!(m.state(dep), AssetState::Ready, "dependency must be ready before dependent");
    assert_eq!(m.dependencies(top), vec![dep]);
    assert_eq!(m.count_total(), 2);

    m.remove(top);
    assert!(drain(&m, 2000, || m.count_total() == 0));
    assert_eq!(m.state(dep), AssetState::NotFound);
}

#[test]
fn dependency_errors_propagate_upward() {
    let dir = tempfile::tempdir().unwrap();
    let missing = hash_name("textures/missing");
    let top = hash_name("models/broken");
    write_asset(dir.path(), top, &raw_asset("models/broken", &[missing], b"mesh"));
    let m = manager_with_path(dir.path());

    m.add(top);
    assert!(drain(&m, 2000, || m.state(top) == AssetState::Error));
    assert_eq!(m.state(missing), AssetState::Error);
    m.remove(top);
    assert!(drain(&m, 2000, || m.count_total() == 0));
}

#[test]
fn fabricated_assets_bypass_the_pipeline() {
    let dir = tempfile::tempdir().unwrap();
    let m = manager_with_path(dir.path());
    let name = hash_name("runtime/generated");

    m.fabricate(scheme_index::RAW, name, "runtime/generated");
    assert_eq!(m.state(name), AssetState::Unknown);
    m.set(name, Some(Arc::new(vec![1u8, 2, 3]))).unwrap();
    assert_eq!(m.state(name), AssetState::Ready);
    assert_eq!(m.get::<Vec<u8>>(name).unwrap().as_slice(), &[1, 2, 3]);

    // publishing the wrong payload type is rejected
    let err = m.set(name, Some(Arc::new(String::from("nope"))));
    assert!(err.is_err());

    m.set(name, Some(Arc::new(vec![9u8]))).unwrap();
    m.remove(name);
    assert!(drain(&m, 2000, || m.count_total() == 0));
    assert_eq!(m.state(name), AssetState::NotFound);
}

#[test]
fn reload_picks_up_new_content() {
    let dir = tempfile::tempdir().unwrap();
    let name = hash_name("config/values");
    write_asset(dir.path(), name, &raw_asset("config/values", &[], b"first"));
    let m = manager_with_path(dir.path());

    m.add(name);
    assert!(drain(&m, 2000, || m.state(name) == AssetState::Ready));
    assert_eq!(m.get::<Vec<u8>>(name).unwrap().as_slice(), b"first");

    write_asset(dir.path(), name, &raw_asset("config/values", &[], b"second"));
    m.reload(name, false);
    assert!(drain(&m, 2000, || {
        m.get::<Vec<u8>>(name).map(|b| b.as_slice() == b"second").unwrap_or(false)
    }));

    m.remove(name);
    assert!(drain(&m, 2000, || m.count_total() == 0));
}

#[test]
fn internationalized_names_resolve_to_their_record() {
    let dir = tempfile::tempdir().unwrap();
    let name = hash_name("strings/en");
    let alias = hash_name("strings/current");
    let mut h = AssetHeader::new("strings/en", scheme_index::RAW);
    h.original_size = 5;
    h.internationalized_name = alias;
    write_asset(dir.path(), name, &write_file(&h, &[], b"hello"));
    let m = manager_with_path(dir.path());

    m.add(name);
    assert!(drain(&m, 2000, || m.state(name) == AssetState::Ready));
    assert_eq!(m.state(alias), AssetState::Ready);
    assert_eq!(m.get::<Vec<u8>>(alias).unwrap().as_slice(), b"hello");

    m.remove(name);
    assert!(drain(&m, 2000, || m.count_total() == 0));
    assert_eq!(m.state(alias), AssetState::NotFound);
}

#[test]
fn hot_reload_skips_unreferenced_assets() {
    let dir = tempfile::tempdir().unwrap();
    let loads = Arc::new(AtomicU32::new(0));

    let referenced = hash_name("live/asset");
    let m = manager_with_path(dir.path());
    {
        let loads = loads.clone();
        m.set_find_hook(Box::new(move |name| {
            if name == referenced {
                loads.fetch_add(1, Ordering::SeqCst);
                Some(raw_asset("live/asset", &[], b"bytes"))
            } else {
                None
            }
        }));
    }

    let server = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
    let port = server.local_addr().unwrap().port();
    m.listen("127.0.0.1", port).unwrap();
    let (mut conn, _) = server.accept().unwrap();

    m.add(referenced);
    assert!(drain(&m, 2000, || m.state(referenced) == AssetState::Ready));
    assert_eq!(loads.load(Ordering::SeqCst), 1);

    // one referenced name, one unknown name
    conn.write_all(b"live/asset\nsomething/unreferenced\n").unwrap();
    conn.flush().unwrap();
    assert!(drain(&m, 2000, || loads.load(Ordering::SeqCst) == 2), "referenced asset must reload");
    assert!(drain(&m, 200, || m.state(referenced) == AssetState::Ready));
    // the unreferenced name spawned no record and no disk traffic
    assert_eq!(m.state(hash_name("something/unreferenced")), AssetState::NotFound);
    assert_eq!(m.count_total(), 1);

    m.remove(referenced);
    assert!(drain(&m, 2000, || m.count_total() == 0));
}

#[test]
fn dependency_cycles_stay_unknown_without_wedging_the_manager() {
    let a = 100u32;
    let b = 200u32;
    let m = AssetManager::new(AssetManagerConfig::default());
    m.define_scheme(scheme_index::RAW, raw_scheme(0));
    m.set_find_hook(Box::new(move |name| {
        if name == a {
            Some(raw_asset("cycle/a", &[b], b"a"))
        } else if name == b {
            Some(raw_asset("cycle/b", &[a], b"b"))
        } else {
            None
        }
    }));

    m.add(a);
    // give the pipeline ample time; the strongly connected component can
    // never leave the wait stage
    assert!(!drain(&m, 300, || m.state(a) == AssetState::Ready));
    assert_eq!(m.state(a), AssetState::Unknown);
    assert_eq!(m.state(b), AssetState::Unknown);
    // the manager still serves unrelated work
    let c = hash_name("independent");
    let m2_body = raw_asset("independent", &[], b"ok");
    m.set_find_hook(Box::new(move |name| {
        if name == a {
            Some(raw_asset("cycle/a", &[b], b"a"))
        } else if name == b {
            Some(raw_asset("cycle/b", &[a], b"b"))
        } else if name == c {
            Some(m2_body.clone())
        } else {
            None
        }
    }));
    m.add(c);
    assert!(drain(&m, 2000, || m.state(c) == AssetState::Ready));
    m.remove(c);
    // dropping the manager with the wedged records joins its threads
    // cleanly; the records are reclaimed with the queues
}
