use super::*;

#[test]
fn display_prefixes_are_stable() {
    assert!(
        MediaError::unsupported("x")
            .to_string()
            .contains("unsupported format:")
    );
    assert!(
        MediaError::tool_unavailable("x")
            .to_string()
            .contains("tool unavailable:")
    );
    assert!(
        MediaError::cache_corrupt("x")
            .to_string()
            .contains("cache corrupt:")
    );
    assert!(
        MediaError::SourceNotFound(PathBuf::from("/nope/clip.webm"))
            .to_string()
            .contains("/nope/clip.webm")
    );
}

#[test]
fn kind_matches_variant() {
    assert_eq!(
        MediaError::spawn_failed("x").kind(),
        ErrorKind::SpawnFailed
    );
    assert_eq!(
        MediaError::ProcessTimedOut("x".into()).kind(),
        ErrorKind::ProcessTimedOut
    );
    assert_eq!(
        MediaError::OutputMissingAfterSuccess(PathBuf::from("a.ogv")).kind(),
        ErrorKind::OutputMissingAfterSuccess
    );
    assert_eq!(MediaError::config("x").kind(), ErrorKind::Config);
}

#[test]
fn other_preserves_source() {
    let base = std::io::Error::other("boom");
    let err = MediaError::Other(anyhow::Error::new(base));
    assert!(err.to_string().contains("boom"));
    assert_eq!(err.kind(), ErrorKind::Other);
}

#[test]
fn failure_reason_captures_kind_and_message() {
    let err = MediaError::process_failed("exit 1");
    let reason = FailureReason::from(&err);
    assert_eq!(reason.kind, ErrorKind::ProcessFailed);
    assert!(reason.message.contains("exit 1"));
    assert!(reason.to_string().starts_with("ProcessFailed"));
}
