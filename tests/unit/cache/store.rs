use std::time::{Duration, SystemTime};

use super::*;
use crate::foundation::error::ErrorKind;

fn temp_dir(name: &str) -> PathBuf {
    let dir = std::env::temp_dir().join(format!(
        "mediaprep_{name}_{}_{}",
        std::process::id(),
        SystemTime::now()
            .duration_since(std::time::UNIX_EPOCH)
            .unwrap()
            .as_nanos()
    ));
    std::fs::create_dir_all(&dir).unwrap();
    dir
}

fn source_in(dir: &Path, name: &str) -> MediaSource {
    let p = dir.join(name);
    std::fs::write(&p, b"webm").unwrap();
    MediaSource::from_path(&p).unwrap()
}

fn write_frames(dir: &Path, n: usize) {
    std::fs::create_dir_all(dir).unwrap();
    for i in 1..=n {
        std::fs::write(dir.join(format!("frame_{i:04}.png")), b"png").unwrap();
    }
}

fn set_mtime(path: &Path, secs: u64) {
    let f = std::fs::File::options().write(true).open(path).unwrap();
    f.set_modified(SystemTime::UNIX_EPOCH + Duration::from_secs(secs))
        .unwrap();
}

#[test]
fn locations_are_deterministic_and_path_specific() {
    let root = temp_dir("store_locations");
    let a = temp_dir("store_loc_a");
    let b = temp_dir("store_loc_b");
    let store = SequenceCacheStore::new(&root);
    let sa = source_in(&a, "clip.webm");
    let sb = source_in(&b, "clip.webm");

    let dir_a = store.frame_dir_for(&sa);
    assert_eq!(dir_a, store.frame_dir_for(&sa));
    assert_ne!(dir_a, store.frame_dir_for(&sb));
    assert!(dir_a.starts_with(root.join("sequences")));
    let name = dir_a.file_name().unwrap().to_str().unwrap();
    assert!(name.starts_with("clip-"));
    assert_eq!(name.len(), "clip-".len() + 16);

    let conv = store.converted_path_for(&sa, "ogv");
    assert!(conv.starts_with(root.join("converted")));
    assert_eq!(conv.extension().unwrap(), "ogv");

    for d in [root, a, b] {
        let _ = std::fs::remove_dir_all(d);
    }
}

#[test]
fn written_entry_is_valid_and_loads_as_sequence() {
    let root = temp_dir("store_valid");
    let store = SequenceCacheStore::new(root.join("cache"));
    let source = source_in(&root, "clip.webm");
    let dir = store.frame_dir_for(&source);
    write_frames(&dir, 12);

    let entry = store.write(&source, &dir, Fps { num: 24, den: 1 }).unwrap();
    assert_eq!(entry.frame_count, 12);
    assert_eq!(entry.source_modified_time, source.modified_time());
    assert!(store.is_valid(&source, &dir));

    let seq = store.load_sequence(&dir).unwrap();
    assert_eq!(seq.frame_count(), 12);
    assert_eq!(seq.frame_rate(), Fps { num: 24, den: 1 });
    assert!(seq.frames()[0].ends_with("frame_0001.png"));

    let _ = std::fs::remove_dir_all(&root);
}

#[test]
fn modified_source_invalidates_and_deletes_frames() {
    let root = temp_dir("store_mtime");
    let store = SequenceCacheStore::new(root.join("cache"));
    let source = source_in(&root, "clip.webm");
    let dir = store.frame_dir_for(&source);
    write_frames(&dir, 3);
    store.write(&source, &dir, Fps { num: 30, den: 1 }).unwrap();

    set_mtime(source.path(), 1_000);
    assert!(!store.is_valid(&source, &dir));
    assert!(SequenceCacheStore::frame_files(&dir).is_empty());
    assert!(!sidecar::sidecar_path(&dir).exists());

    let _ = std::fs::remove_dir_all(&root);
}

#[test]
fn foreign_or_outdated_sidecars_are_rejected() {
    let root = temp_dir("store_foreign");
    let store = SequenceCacheStore::new(root.join("cache"));
    let source = source_in(&root, "clip.webm");
    let dir = store.frame_dir_for(&source);

    write_frames(&dir, 2);
    let mut entry = store.write(&source, &dir, Fps { num: 30, den: 1 }).unwrap();
    entry.source_path = PathBuf::from("/elsewhere/clip.webm");
    sidecar::write(&dir, &entry).unwrap();
    assert!(!store.is_valid(&source, &dir));

    write_frames(&dir, 2);
    let mut entry = store.write(&source, &dir, Fps { num: 30, den: 1 }).unwrap();
    entry.version = "0".to_owned();
    sidecar::write(&dir, &entry).unwrap();
    assert!(!store.is_valid(&source, &dir));

    let _ = std::fs::remove_dir_all(&root);
}

#[test]
fn frames_without_sidecar_are_stale() {
    let root = temp_dir("store_orphan");
    let store = SequenceCacheStore::new(root.join("cache"));
    let source = source_in(&root, "clip.webm");
    let dir = store.frame_dir_for(&source);
    write_frames(&dir, 4);

    assert!(!store.is_valid(&source, &dir));
    assert!(!dir.exists());
    // A missing directory is a plain miss.
    assert!(!store.is_valid(&source, &dir));

    let _ = std::fs::remove_dir_all(&root);
}

#[test]
fn write_without_frames_fails() {
    let root = temp_dir("store_empty");
    let store = SequenceCacheStore::new(root.join("cache"));
    let source = source_in(&root, "clip.webm");
    let dir = store.frame_dir_for(&source);
    std::fs::create_dir_all(&dir).unwrap();

    let err = store
        .write(&source, &dir, Fps { num: 30, den: 1 })
        .unwrap_err();
    assert_eq!(
        err.kind(),
        crate::foundation::error::ErrorKind::OutputMissingAfterSuccess
    );

    let _ = std::fs::remove_dir_all(&root);
}

#[test]
fn frame_files_sort_numerically_and_skip_strays() {
    let dir = temp_dir("store_sort");
    for name in [
        "frame_0010.png",
        "frame_0002.png",
        "frame_10000.png",
        "frame_9999.png",
        "frame_12.png",
        "notes.txt",
        ".mediaprep-cache.json",
    ] {
        std::fs::write(dir.join(name), b"x").unwrap();
    }
    let names: Vec<String> = SequenceCacheStore::frame_files(&dir)
        .iter()
        .map(|p| p.file_name().unwrap().to_string_lossy().into_owned())
        .collect();
    assert_eq!(
        names,
        [
            "frame_0002.png",
            "frame_0010.png",
            "frame_9999.png",
            "frame_10000.png"
        ]
    );
    let _ = std::fs::remove_dir_all(&dir);
}

#[test]
fn zero_frame_rate_in_sidecar_is_a_miss() {
    let root = temp_dir("store_zero_fps");
    let store = SequenceCacheStore::new(root.join("cache"));
    let source = source_in(&root, "clip.webm");
    let dir = store.frame_dir_for(&source);
    write_frames(&dir, 1);
    store.write(&source, &dir, Fps { num: 30, den: 1 }).unwrap();

    let path = sidecar::sidecar_path(&dir);
    let json = std::fs::read_to_string(&path).unwrap();
    assert!(json.contains("\"den\": 1"));
    std::fs::write(&path, json.replace("\"den\": 1", "\"den\": 0")).unwrap();

    assert_eq!(
        store.load_sequence(&dir).unwrap_err().kind(),
        ErrorKind::CacheCorrupt
    );
    assert!(!store.is_valid(&source, &dir));
    assert!(!path.exists());
    assert!(SequenceCacheStore::frame_files(&dir).is_empty());

    let _ = std::fs::remove_dir_all(&root);
}
