use std::path::PathBuf;

use promoreel::{RenderOpts, StyleConfig, parse_script, render_video};

fn font_available() -> bool {
    promoreel::TextShaper::new(None).is_ok()
}

fn encoder_available() -> bool {
    promoreel::is_ffmpeg_on_path() && promoreel::negotiate_codec().is_ok()
}

fn short_render() -> promoreel::VideoArtifact {
    let scenes = parse_script("Launch day | promo in one take");
    let style = StyleConfig {
        scene_duration_seconds: 0.2,
        ..StyleConfig::default()
    };
    render_video(scenes, style, RenderOpts::default()).unwrap()
}

#[test]
fn render_video_round_trips_through_the_system_encoder() {
    if !encoder_available() {
        eprintln!("skipping: no usable ffmpeg encoder");
        return;
    }
    if !font_available() {
        eprintln!("skipping: no system font available");
        return;
    }

    let artifact = short_render();
    let negotiated = promoreel::negotiate_codec().unwrap();

    assert_eq!(artifact.codec().name, negotiated.name);
    assert!(artifact.byte_len() > 0);
    assert!(artifact.path().exists());
    let ext = artifact.path().extension().and_then(|e| e.to_str()).unwrap();
    assert_eq!(ext, artifact.codec().container.extension());

    // The reported size is the muxed stream, byte for byte.
    let on_disk = std::fs::metadata(artifact.path()).unwrap().len();
    assert_eq!(on_disk, artifact.byte_len());

    let path = artifact.path().to_path_buf();
    drop(artifact);
    assert!(!path.exists());
}

#[test]
fn persisted_video_outlives_the_artifact() {
    if !encoder_available() {
        eprintln!("skipping: no usable ffmpeg encoder");
        return;
    }
    if !font_available() {
        eprintln!("skipping: no system font available");
        return;
    }

    let artifact = short_render();
    let byte_len = artifact.byte_len();

    let dir = PathBuf::from("target").join("encode_ffmpeg");
    std::fs::create_dir_all(&dir).unwrap();
    let dest = dir.join(format!(
        "round_trip.{}",
        artifact.codec().container.extension()
    ));
    let _ = std::fs::remove_file(&dest);

    let kept = artifact.persist(&dest).unwrap();

    assert_eq!(kept, dest);
    assert_eq!(std::fs::metadata(&kept).unwrap().len(), byte_len);
    std::fs::remove_file(&kept).unwrap();
}
