use super::*;

fn temp_dir(name: &str) -> PathBuf {
    let dir = std::env::temp_dir().join(format!(
        "mediaprep_{name}_{}_{}",
        std::process::id(),
        std::time::SystemTime::now()
            .duration_since(std::time::UNIX_EPOCH)
            .unwrap()
            .as_nanos()
    ));
    std::fs::create_dir_all(&dir).unwrap();
    dir
}

fn entry() -> SequenceCacheEntry {
    SequenceCacheEntry {
        source_path: PathBuf::from("/media/clip.webm"),
        source_modified_time: 1_700_000_000_123_456_789,
        created_time: 1_700_000_100_000_000_000,
        version: SCHEMA_VERSION.to_owned(),
        frame_count: 120,
        frame_rate: Fps { num: 30, den: 1 },
    }
}

#[test]
fn missing_sidecar_reads_as_none() {
    let dir = temp_dir("sidecar_missing");
    assert_eq!(read(&dir).unwrap(), None);
    let _ = std::fs::remove_dir_all(&dir);
}

#[test]
fn written_sidecar_uses_documented_field_names() {
    let dir = temp_dir("sidecar_fields");
    write(&dir, &entry()).unwrap();

    let raw: serde_json::Value =
        serde_json::from_slice(&std::fs::read(sidecar_path(&dir)).unwrap()).unwrap();
    assert_eq!(raw["source_path"], "/media/clip.webm");
    assert_eq!(raw["source_modified_time"], 1_700_000_000_123_456_789u64);
    assert_eq!(raw["version"], "1");
    assert_eq!(raw["frame_count"], 120);
    assert_eq!(raw["frame_rate"]["num"], 30);
    assert!(!temp_path(&dir).exists());

    assert_eq!(read(&dir).unwrap(), Some(entry()));
    let _ = std::fs::remove_dir_all(&dir);
}

#[test]
fn garbage_sidecar_is_cache_corrupt() {
    let dir = temp_dir("sidecar_garbage");
    std::fs::write(sidecar_path(&dir), b"{ not json").unwrap();
    let err = read(&dir).unwrap_err();
    assert_eq!(err.kind(), crate::foundation::error::ErrorKind::CacheCorrupt);
    let _ = std::fs::remove_dir_all(&dir);
}
