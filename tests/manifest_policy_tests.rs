#![allow(
    clippy::unwrap_used,
    clippy::expect_used,
    clippy::panic,
    clippy::indexing_slicing
)]
//! Manifest policy tests.
//!
//! The crate denies panicking shortcuts at the lint level and ships two
//! runnable demos. These checks fail if `Cargo.toml` drifts from that.

use std::path::PathBuf;

fn project_root() -> PathBuf {
    PathBuf::from(env!("CARGO_MANIFEST_DIR"))
}

fn manifest() -> toml::Table {
    let path = project_root().join("Cargo.toml");
    let text = std::fs::read_to_string(&path)
        .unwrap_or_else(|e| panic!("failed to read '{}': {e}", path.display()));
    toml::from_str(&text).expect("Cargo.toml should parse")
}

#[test]
fn package_identity() {
    let manifest = manifest();
    let package = manifest["package"].as_table().unwrap();
    assert_eq!(package["name"].as_str(), Some("spy-artist-client"));
    assert_eq!(package["edition"].as_str(), Some("2021"));
}

#[test]
fn clippy_denies_panicking_shortcuts() {
    let manifest = manifest();
    let clippy = manifest["lints"]["clippy"].as_table().unwrap();
    for lint in [
        "unwrap_used",
        "expect_used",
        "panic",
        "todo",
        "unimplemented",
        "indexing_slicing",
    ] {
        assert_eq!(
            clippy.get(lint).and_then(toml::Value::as_str),
            Some("deny"),
            "clippy::{lint} must be denied"
        );
    }
}

#[test]
fn websocket_transport_is_on_by_default() {
    let manifest = manifest();
    let features = manifest["features"].as_table().unwrap();
    let default: Vec<&str> = features["default"]
        .as_array()
        .unwrap()
        .iter()
        .filter_map(toml::Value::as_str)
        .collect();
    assert!(default.contains(&"transport-websocket"));

    let deps = manifest["dependencies"].as_table().unwrap();
    for optional in ["tokio-tungstenite", "futures-util"] {
        assert_eq!(
            deps[optional]["optional"].as_bool(),
            Some(true),
            "{optional} should only build with the websocket feature"
        );
    }
}

#[test]
fn demo_targets_exist() {
    let manifest = manifest();
    let demos = manifest["example"].as_array().unwrap();
    assert!(!demos.is_empty());
    for demo in demos {
        let path = demo["path"].as_str().unwrap();
        assert!(
            path.starts_with("demos/"),
            "demo '{path}' should live under demos/"
        );
        assert!(
            project_root().join(path).is_file(),
            "demo '{path}' is missing"
        );
    }
}
