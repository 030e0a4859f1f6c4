use crate::config::PipelineConfig;
use crate::foundation::core::DEFAULT_FPS;
use crate::jobs::process::SystemLauncher;
use crate::media::classify::{ClassificationKind, DetectionMethod};

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

fn extractor(store: Arc<SequenceCacheStore>) -> AlphaExtractor {
    let cfg = PipelineConfig::default();
    let supervisor = Arc::new(JobSupervisor::new(
        Arc::new(SystemLauncher::new()),
        cfg.jobs.poll_interval(),
    ));
    AlphaExtractor::new(supervisor, store, "ffmpeg", &cfg.jobs, DEFAULT_FPS)
}

fn classification(dir: &Path, codec: Option<&str>, fps: Option<Fps>) -> Classification {
    let p = dir.join("clip.webm");
    std::fs::write(&p, b"webm").unwrap();
    Classification {
        source: MediaSource::from_path(&p).unwrap(),
        kind: ClassificationKind::NeedsAlphaExtraction,
        has_alpha: true,
        codec_name: codec.map(str::to_owned),
        pixel_format: Some("yuva420p".to_owned()),
        frame_rate: fps,
        duration: None,
        method: DetectionMethod::Probe,
    }
}

fn args_of(cmd: &CommandSpec) -> Vec<String> {
    cmd.args
        .iter()
        .map(|a| a.to_string_lossy().into_owned())
        .collect()
}

#[test]
fn vpx_codecs_force_libvpx_decoders() {
    assert_eq!(AlphaExtractor::decoder_for("vp9"), Some("libvpx-vp9"));
    assert_eq!(AlphaExtractor::decoder_for("VP8"), Some("libvpx"));
    assert_eq!(AlphaExtractor::decoder_for("prores"), None);
    assert_eq!(AlphaExtractor::decoder_for("qtrle"), None);
}

#[test]
fn vp9_command_selects_decoder_and_probed_rate() {
    let root = temp_dir("extract_cmd_vp9");
    let ex = extractor(Arc::new(SequenceCacheStore::new(root.join("cache"))));
    let c = classification(&root, Some("vp9"), Some(Fps { num: 30000, den: 1001 }));
    let out = root.join("frames");

    let cmd = ex.build_command(&c, &out);
    let src = c.source.path().to_string_lossy().into_owned();
    let pattern = out.join("frame_%04d.png").to_string_lossy().into_owned();
    assert_eq!(
        args_of(&cmd),
        [
            "-y",
            "-hide_banner",
            "-c:v",
            "libvpx-vp9",
            "-i",
            src.as_str(),
            "-vf",
            "fps=30000/1001",
            "-pix_fmt",
            "rgba",
            pattern.as_str()
        ]
    );
    let _ = std::fs::remove_dir_all(&root);
}

#[test]
fn unknown_rate_falls_back_to_default_and_no_decoder() {
    let root = temp_dir("extract_cmd_default");
    let ex = extractor(Arc::new(SequenceCacheStore::new(root.join("cache"))));
    let c = classification(&root, Some("qtrle"), None);

    let cmd = ex.build_command(&c, &root.join("frames"));
    assert_eq!(cmd.value_of("-c:v"), None);
    assert_eq!(cmd.value_of("-vf"), Some("fps=30"));
    assert_eq!(ex.frame_rate_for(&c), DEFAULT_FPS);
    let _ = std::fs::remove_dir_all(&root);
}

#[test]
fn output_writes_sidecar_on_finalize_and_clears_on_discard() {
    let root = temp_dir("extract_output");
    let store = Arc::new(SequenceCacheStore::new(root.join("cache")));
    let c = classification(&root, Some("vp9"), Some(DEFAULT_FPS));
    let dir = store.frame_dir_for(&c.source);

    let mut out = ExtractionOutput {
        store: Arc::clone(&store),
        source: c.source.clone(),
        dir: dir.clone(),
        fps: DEFAULT_FPS,
    };
    out.prepare().unwrap();
    assert!(dir.is_dir());
    assert!(!out.verify());

    std::fs::write(dir.join("frame_0001.png"), b"png").unwrap();
    std::fs::write(dir.join("frame_0002.png"), b"png").unwrap();
    assert!(out.verify());
    out.finalize().unwrap();
    assert!(store.is_valid(&c.source, &dir));

    out.discard();
    assert!(!dir.exists());
    let _ = std::fs::remove_dir_all(&root);
}

#[test]
fn prepare_removes_stale_frames() {
    let root = temp_dir("extract_stale");
    let store = Arc::new(SequenceCacheStore::new(root.join("cache")));
    let c = classification(&root, None, None);
    let dir = store.frame_dir_for(&c.source);
    std::fs::create_dir_all(&dir).unwrap();
    std::fs::write(dir.join("frame_0099.png"), b"old").unwrap();

    let mut out = ExtractionOutput {
        store: Arc::clone(&store),
        source: c.source.clone(),
        dir: dir.clone(),
        fps: DEFAULT_FPS,
    };
    out.prepare().unwrap();
    assert!(SequenceCacheStore::frame_files(&dir).is_empty());
    assert!(dir.is_dir());
    let _ = std::fs::remove_dir_all(&root);
}
