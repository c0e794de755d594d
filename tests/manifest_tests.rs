#![allow(
    clippy::unwrap_used,
    clippy::expect_used,
    clippy::panic,
    clippy::indexing_slicing
)]
//! Manifest policy tests for the Connect Four client.
//!
//! These tests parse Cargo.toml and verify it conforms to project policy:
//! panic-prone lints stay denied, the WebSocket transport stays optional,
//! and every declared example target exists. All checks are synchronous
//! filesystem reads.

use std::path::PathBuf;

/// Returns the project root directory (where Cargo.toml lives).
fn project_root() -> PathBuf {
    PathBuf::from(env!("CARGO_MANIFEST_DIR"))
}

fn manifest() -> toml::Table {
    let path = project_root().join("Cargo.toml");
    let text = std::fs::read_to_string(&path)
        .unwrap_or_else(|e| panic!("Failed to read '{}': {e}", path.display()));
    text.parse::<toml::Table>()
        .unwrap_or_else(|e| panic!("Cargo.toml is not valid TOML: {e}"))
}

fn table<'a>(parent: &'a toml::Table, key: &str) -> &'a toml::Table {
    parent
        .get(key)
        .and_then(toml::Value::as_table)
        .unwrap_or_else(|| panic!("Cargo.toml is missing [{key}]"))
}

// ─────────────────────────────────────────────────────────────────────────────
// Module: lint_policy
// ─────────────────────────────────────────────────────────────────────────────

mod lint_policy {
    use super::*;

    const REQUIRED_DENY_LINTS: &[&str] = &[
        "unwrap_used",
        "expect_used",
        "panic",
        "todo",
        "unimplemented",
        "indexing_slicing",
    ];

    #[test]
    fn cargo_toml_denies_all_panic_prone_lints() {
        let manifest = manifest();
        let clippy = table(table(&manifest, "lints"), "clippy");

        for lint in REQUIRED_DENY_LINTS {
            assert_eq!(
                clippy.get(*lint).and_then(toml::Value::as_str),
                Some("deny"),
                "`{lint}` must be set to deny in [lints.clippy] to keep \
                 library code panic-free"
            );
        }
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Module: feature_policy
// ─────────────────────────────────────────────────────────────────────────────

mod feature_policy {
    use super::*;

    #[test]
    fn websocket_transport_is_default_but_optional() {
        let manifest = manifest();
        let features = table(&manifest, "features");

        let default = features["default"].as_array().unwrap();
        assert!(default
            .iter()
            .any(|f| f.as_str() == Some("transport-websocket")));

        let deps = table(&manifest, "dependencies");
        for name in ["tokio-tungstenite", "futures-util"] {
            let optional = deps[name]
                .as_table()
                .and_then(|t| t.get("optional"))
                .and_then(toml::Value::as_bool);
            assert_eq!(
                optional,
                Some(true),
                "`{name}` must stay optional so custom transports can drop it"
            );
        }
    }

    #[test]
    fn runtime_tokio_features_stay_minimal() {
        let manifest = manifest();
        let deps = table(&manifest, "dependencies");
        let features: Vec<&str> = deps["tokio"]["features"]
            .as_array()
            .unwrap()
            .iter()
            .filter_map(toml::Value::as_str)
            .collect();

        assert!(
            !features.contains(&"full"),
            "library code must not pull in tokio's `full` feature"
        );
        for needed in ["sync", "macros", "rt", "time"] {
            assert!(features.contains(&needed), "tokio is missing `{needed}`");
        }
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Module: target_policy
// ─────────────────────────────────────────────────────────────────────────────

mod target_policy {
    use super::*;

    #[test]
    fn declared_examples_exist() {
        let manifest = manifest();
        let examples = manifest["example"].as_array().unwrap();
        assert!(!examples.is_empty());

        for example in examples {
            let path = example["path"].as_str().unwrap();
            assert!(
                project_root().join(path).is_file(),
                "example target '{path}' does not exist"
            );
        }
    }

    #[test]
    fn msrv_is_declared() {
        let manifest = manifest();
        let package = table(&manifest, "package");
        let msrv = package["rust-version"].as_str().unwrap();
        assert!(
            msrv.split('.').count() >= 2,
            "rust-version '{msrv}' is not a version"
        );
    }
}
