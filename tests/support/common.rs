#![allow(dead_code)]

// Shared fixtures: build firmware roots with a descriptor and artifact files
// under a temporary directory.

use serde_json::{Value, json};
use std::fs;
use std::path::Path;
use tempfile::TempDir;

pub const ALL_ROLES: [&str; 4] = ["bootloader", "partitions", "boot_app0", "firmware"];

pub fn firmware_root() -> TempDir {
    TempDir::new().expect("temp firmware root")
}

/// A catalog entry referencing `<version>/<role>.bin` for each role.
pub fn entry(id: &str, version: &str, recommended: bool, roles: &[&str]) -> Value {
    let mut files = serde_json::Map::new();
    for role in roles {
        files.insert(
            role.to_string(),
            json!({ "path": format!("{version}/{role}.bin") }),
        );
    }
    json!({
        "id": id,
        "version": version,
        "board": "Lolin S2 Mini",
        "recommended": recommended,
        "files": Value::Object(files),
    })
}

pub fn write_catalog(root: &Path, firmwares: &[Value]) {
    let descriptor = json!({
        "firmwares": firmwares,
        "lastUpdated": "2025-01-01",
        "totalFirmwares": firmwares.len(),
    });
    fs::write(
        root.join("firmware-list.json"),
        serde_json::to_string_pretty(&descriptor).expect("serialize descriptor"),
    )
    .expect("write descriptor");
}

/// Create every artifact file an entry references.
pub fn touch_artifacts(root: &Path, entry: &Value) {
    for file in entry["files"].as_object().expect("files object").values() {
        let rel = file["path"].as_str().expect("file path");
        let path = root.join(rel);
        fs::create_dir_all(path.parent().expect("parent dir")).expect("create artifact dir");
        fs::write(&path, b"\xE9binary").expect("write artifact");
    }
}
