use super::*;

#[test]
fn command_spec_builder_keeps_argument_order() {
    let spec = CommandSpec::new("ffmpeg", "/tmp/out.ogv")
        .arg("-y")
        .args(["-i", "/tmp/in.mp4"])
        .args(["-c:v", "libtheora"]);
    assert_eq!(spec.args.len(), 5);
    assert_eq!(spec.value_of("-i"), Some("/tmp/in.mp4"));
    assert_eq!(spec.value_of("-c:v"), Some("libtheora"));
    assert_eq!(spec.value_of("-c:a"), None);
    assert_eq!(
        spec.display(),
        "ffmpeg -y -i /tmp/in.mp4 -c:v libtheora"
    );
}

#[test]
fn stderr_drain_splits_carriage_returns_and_tracks_time() {
    let raw = b"Input #0, matroska\nframe=1 time=00:00:01.00 bitrate=N/A\rframe=2 time=00:00:02.50 bitrate=N/A\rlast line";
    let status = Mutex::new(StderrStatus::default());
    drain_stderr(&raw[..], &status);
    let status = status.into_inner();
    assert_eq!(status.last_time, Some(Duration::from_millis(2500)));
    assert_eq!(status.tail.len(), 4);
    assert_eq!(status.tail.back().map(String::as_str), Some("last line"));
}

#[test]
fn stderr_tail_is_bounded() {
    let mut status = StderrStatus::default();
    for i in 0..(STDERR_TAIL_LINES + 5) {
        status.push_line(&format!("line {i}"));
    }
    status.push_line("   ");
    assert_eq!(status.tail.len(), STDERR_TAIL_LINES);
    assert_eq!(status.tail.front().map(String::as_str), Some("line 5"));
}

#[test]
fn missing_program_is_unavailable_and_launch_reports_not_found() {
    let launcher = SystemLauncher::new();
    let program = PathBuf::from("/definitely/not/a/real/mediaprep-tool");
    assert!(!launcher.is_available(&program));
    // Cached answer.
    assert!(!launcher.is_available(&program));

    let spec = CommandSpec::new(&program, "/tmp/never");
    let err = launcher.launch(&spec).err().unwrap();
    assert_eq!(err.kind(), std::io::ErrorKind::NotFound);
}

#[cfg(unix)]
#[test]
fn system_process_reports_exit_and_stderr() {
    let launcher = SystemLauncher::new();
    let spec = CommandSpec::new("sh", "/tmp/never")
        .args(["-c", "echo 'time=00:00:03.00 speed=1x' >&2; echo boom >&2; exit 3"]);
    let mut proc = launcher.launch(&spec).unwrap();
    let deadline = std::time::Instant::now() + Duration::from_secs(10);
    let outcome = loop {
        if let Some(o) = proc.try_wait().unwrap() {
            break o;
        }
        assert!(std::time::Instant::now() < deadline, "sh did not exit");
        std::thread::sleep(Duration::from_millis(10));
    };
    assert!(!outcome.success);
    assert_eq!(outcome.code, Some(3));

    // The drain thread may lag the exit slightly.
    let deadline = std::time::Instant::now() + Duration::from_secs(5);
    while !proc.stderr_tail().contains("boom") && std::time::Instant::now() < deadline {
        std::thread::sleep(Duration::from_millis(10));
    }
    assert!(proc.stderr_tail().contains("boom"));
    assert_eq!(proc.reported_time(), Some(Duration::from_secs(3)));
    // Killing an exited process is a no-op.
    proc.kill().unwrap();
}
