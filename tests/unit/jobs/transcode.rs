use crate::config::PipelineConfig;
use crate::jobs::process::SystemLauncher;

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

fn orchestrator(settings: TranscodeSettings) -> ConversionOrchestrator {
    let cfg = PipelineConfig::default();
    let supervisor = Arc::new(JobSupervisor::new(
        Arc::new(SystemLauncher::new()),
        cfg.jobs.poll_interval(),
    ));
    ConversionOrchestrator::new(supervisor, "ffmpeg", settings, &cfg.jobs)
}

#[test]
fn partial_path_sits_beside_target() {
    assert_eq!(
        ConversionOrchestrator::partial_path(Path::new("/cache/converted/clip-ab12.ogv")),
        PathBuf::from("/cache/converted/clip-ab12.partial.ogv")
    );
    assert_eq!(
        ConversionOrchestrator::partial_path(Path::new("/cache/out")),
        PathBuf::from("/cache/out.partial")
    );
}

#[test]
fn default_command_targets_ogg_theora() {
    let orch = orchestrator(TranscodeSettings::default());
    let cmd = orch.build_command(Path::new("/m/in.mp4"), Path::new("/c/in.partial.ogv"));
    let args: Vec<String> = cmd
        .args
        .iter()
        .map(|a| a.to_string_lossy().into_owned())
        .collect();
    assert_eq!(
        args,
        [
            "-y",
            "-hide_banner",
            "-i",
            "/m/in.mp4",
            "-c:v",
            "libtheora",
            "-q:v",
            "7",
            "-b:v",
            "8M",
            "-c:a",
            "libvorbis",
            "/c/in.partial.ogv"
        ]
    );
    assert_eq!(cmd.program, PathBuf::from("ffmpeg"));
    assert_eq!(cmd.output, PathBuf::from("/c/in.partial.ogv"));
}

#[test]
fn no_audio_codec_drops_audio() {
    let orch = orchestrator(TranscodeSettings {
        audio_codec: None,
        ..TranscodeSettings::default()
    });
    let cmd = orch.build_command(Path::new("/m/in.mp4"), Path::new("/c/out.ogv"));
    assert!(cmd.args.iter().any(|a| a == "-an"));
    assert_eq!(cmd.value_of("-c:a"), None);
}

#[test]
fn output_is_published_only_from_a_non_empty_partial() {
    let dir = temp_dir("transcode_output");
    let target = dir.join("converted").join("clip.ogv");
    let partial = ConversionOrchestrator::partial_path(&target);
    let mut out = TranscodeOutput {
        partial: partial.clone(),
        target: target.clone(),
        source_modified: SystemTime::UNIX_EPOCH + Duration::from_secs(1_700_000_000),
    };

    out.prepare().unwrap();
    assert!(target.parent().unwrap().is_dir());
    assert!(!out.verify());

    std::fs::write(&partial, b"").unwrap();
    assert!(!out.verify());

    std::fs::write(&partial, b"OggS").unwrap();
    assert!(out.verify());
    out.finalize().unwrap();
    assert!(target.is_file());
    assert!(!partial.exists());

    out.discard();
    assert!(!target.exists());

    let _ = std::fs::remove_dir_all(&dir);
}

#[test]
fn prepare_clears_stale_partial() {
    let dir = temp_dir("transcode_stale");
    let target = dir.join("clip.ogv");
    let partial = ConversionOrchestrator::partial_path(&target);
    std::fs::write(&partial, b"leftover").unwrap();

    let mut out = TranscodeOutput {
        partial: partial.clone(),
        target,
        source_modified: SystemTime::now(),
    };
    out.prepare().unwrap();
    assert!(!partial.exists());

    let _ = std::fs::remove_dir_all(&dir);
}

#[test]
fn only_a_conversion_of_the_same_source_version_is_reusable() {
    let dir = temp_dir("transcode_reuse");
    let src = dir.join("clip.mp4");
    std::fs::write(&src, b"mp4").unwrap();
    let source = MediaSource::from_path(&src).unwrap();
    let stamp = UNIX_EPOCH + Duration::from_nanos(source.modified_time());

    let target = dir.join("clip.ogv");
    assert!(!ConversionOrchestrator::reusable_output(&source, &target));

    let mut out = TranscodeOutput {
        partial: ConversionOrchestrator::partial_path(&target),
        target: target.clone(),
        source_modified: stamp,
    };
    out.prepare().unwrap();
    std::fs::write(&out.partial, b"OggS").unwrap();
    out.finalize().unwrap();
    assert!(ConversionOrchestrator::reusable_output(&source, &target));

    // A newer file that was not stamped from this source does not count.
    let f = std::fs::File::options().write(true).open(&target).unwrap();
    f.set_modified(stamp + Duration::from_secs(60)).unwrap();
    assert!(!ConversionOrchestrator::reusable_output(&source, &target));

    f.set_modified(UNIX_EPOCH + Duration::from_secs(1)).unwrap();
    assert!(!ConversionOrchestrator::reusable_output(&source, &target));

    let _ = std::fs::remove_dir_all(&dir);
}

#[test]
fn source_restored_to_an_older_version_is_converted_again() {
    let dir = temp_dir("transcode_restore");
    let src = dir.join("clip.mp4");
    std::fs::write(&src, b"mp4 v2").unwrap();
    let newer = MediaSource::from_path(&src).unwrap();

    let target = dir.join("clip.ogv");
    let mut out = TranscodeOutput {
        partial: ConversionOrchestrator::partial_path(&target),
        target: target.clone(),
        source_modified: UNIX_EPOCH + Duration::from_nanos(newer.modified_time()),
    };
    std::fs::write(&out.partial, b"OggS").unwrap();
    out.finalize().unwrap();
    assert!(ConversionOrchestrator::reusable_output(&newer, &target));

    std::fs::write(&src, b"mp4 v1").unwrap();
    let f = std::fs::File::options().write(true).open(&src).unwrap();
    f.set_modified(SystemTime::now() - Duration::from_secs(3600))
        .unwrap();
    let restored = MediaSource::from_path(&src).unwrap();
    assert!(!ConversionOrchestrator::reusable_output(&restored, &target));

    let _ = std::fs::remove_dir_all(&dir);
}
