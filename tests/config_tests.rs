use rust_coverflow::config::Configuration;
use std::path::PathBuf;
use std::time::Duration;

#[test]
fn empty_document_yields_defaults() {
    let cfg: Configuration = serde_yaml::from_str("{}").unwrap();
    assert_eq!(cfg, Configuration::default());
    assert_eq!(cfg.physics.speed_decay, 0.85);
    assert_eq!(cfg.snap.min_settle_time, Duration::from_millis(300));
    assert_eq!(cfg.layout.rings, 5);
    assert_eq!(cfg.loader.placeholder_color, [0x33, 0x33, 0x33]);
    assert!(cfg.validated().is_ok());
}

#[test]
fn parse_kebab_case_sections() {
    let yaml = r#"
content-path: "content/projects.yaml"
physics:
  speed-decay: 0.9
  max-frame-delta: 50ms
snap:
  enabled: false
  check-interval: 250ms
layout:
  rings: 7
  camera:
    fov-degrees: 50
intro:
  stagger: 40ms
  first-index: -2
loader:
  retry-base-delay: 500ms
  max-retries: 4
"#;
    let cfg: Configuration = serde_yaml::from_str(yaml).unwrap();
    assert_eq!(cfg.content_path, Some(PathBuf::from("content/projects.yaml")));
    assert_eq!(cfg.physics.speed_decay, 0.9);
    assert_eq!(cfg.physics.max_frame_delta, Duration::from_millis(50));
    assert_eq!(cfg.physics.lerp_factor, 0.12);
    assert!(!cfg.snap.enabled);
    assert_eq!(cfg.snap.check_interval, Duration::from_millis(250));
    assert_eq!(cfg.layout.rings, 7);
    assert_eq!(cfg.layout.camera.fov_degrees, 50.0);
    assert_eq!(cfg.layout.camera.distance, 10.0);
    assert_eq!(cfg.intro.stagger, Duration::from_millis(40));
    assert_eq!(cfg.intro.first_index, -2);
    assert_eq!(cfg.loader.retry_base_delay, Duration::from_millis(500));
    assert_eq!(cfg.loader.max_retries, 4);
    assert!(cfg.validated().is_ok());
}

#[test]
fn rejects_out_of_range_decay() {
    let yaml = r#"
physics:
  speed-decay: 1.0
"#;
    let cfg: Configuration = serde_yaml::from_str(yaml).unwrap();
    assert!(cfg.validated().is_err());
}

#[test]
fn rejects_even_ring_count() {
    let yaml = r#"
layout:
  rings: 4
"#;
    let cfg: Configuration = serde_yaml::from_str(yaml).unwrap();
    let err = cfg.validated().unwrap_err();
    assert!(err.to_string().contains("rings"), "{err}");
}

#[test]
fn rejects_snap_strength_that_would_overshoot() {
    // Two reference frames per clamped step: 0.6 * 2 > 1.
    let yaml = r#"
snap:
  strength: 0.6
"#;
    let cfg: Configuration = serde_yaml::from_str(yaml).unwrap();
    assert!(cfg.validated().is_err());

    // Shorter clamp makes the same strength stable.
    let yaml = r#"
physics:
  max-frame-delta: 16ms
snap:
  strength: 0.6
"#;
    let cfg: Configuration = serde_yaml::from_str(yaml).unwrap();
    assert!(cfg.validated().is_ok());
}

#[test]
fn loads_from_file() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("coverflow.yaml");
    std::fs::write(&path, "visual:\n  dimmed-opacity: 0.4\nwindow:\n  title: Studio\n").unwrap();

    let cfg = Configuration::from_yaml_file(&path)
        .unwrap()
        .validated()
        .unwrap();
    assert_eq!(cfg.visual.dimmed_opacity, 0.4);
    assert_eq!(cfg.window.title, "Studio");
}

#[test]
fn unreadable_file_is_an_error() {
    let dir = tempfile::tempdir().unwrap();
    assert!(Configuration::from_yaml_file(dir.path().join("missing.yaml")).is_err());
}
