use super::*;

#[test]
fn parse_vp9_with_alpha_pixel_format() {
    let r = parse_compact("codec_name=vp9|pix_fmt=yuva420p|r_frame_rate=30/1|duration=4.000000\n")
        .unwrap();
    assert_eq!(r.codec_name.as_deref(), Some("vp9"));
    assert_eq!(r.pixel_format.as_deref(), Some("yuva420p"));
    assert_eq!(r.frame_rate, Some(Fps { num: 30, den: 1 }));
    assert_eq!(r.duration, Some(Duration::from_secs(4)));
    assert!(!r.alpha_mode);
}

#[test]
fn parse_alpha_mode_tag_and_missing_values() {
    let r = parse_compact(
        "\n codec_name=vp8|pix_fmt=yuv420p|r_frame_rate=0/0|duration=N/A|tag:alpha_mode=1\n",
    )
    .unwrap();
    assert_eq!(r.codec_name.as_deref(), Some("vp8"));
    assert_eq!(r.frame_rate, None);
    assert_eq!(r.duration, None);
    assert!(r.alpha_mode);
}

#[test]
fn parse_only_reads_first_stream_line() {
    let r = parse_compact("codec_name=h264|pix_fmt=yuv420p\ncodec_name=png|pix_fmt=rgba\n")
        .unwrap();
    assert_eq!(r.codec_name.as_deref(), Some("h264"));
}

#[test]
fn parse_empty_output_is_probe_unavailable() {
    let err = parse_compact("  \n").unwrap_err();
    assert!(matches!(err, MediaError::ProbeUnavailable(_)));

    let err = parse_compact("r_frame_rate=30/1").unwrap_err();
    assert!(matches!(err, MediaError::ProbeUnavailable(_)));
}

#[test]
fn missing_probe_binary_is_probe_unavailable() {
    let prober = FfprobeProber::new("/definitely/not/a/real/ffprobe");
    let err = prober.probe(Path::new("clip.webm")).unwrap_err();
    assert!(matches!(err, MediaError::ProbeUnavailable(_)));
}
