// Catalog loading, resolution, and default-selection guard rails.

#[path = "support/common.rs"]
mod common;

use boardflash::catalog::{ArtifactRole, CatalogError, FirmwareIndex};
use std::fs;

use common::{ALL_ROLES, entry, firmware_root, touch_artifacts, write_catalog};

#[test]
fn listing_preserves_descriptor_order() {
    let root = firmware_root();
    write_catalog(
        root.path(),
        &[
            entry("zeta_v2", "v2", false, &ALL_ROLES),
            entry("alpha_v1", "v1", false, &ALL_ROLES),
        ],
    );

    let index = FirmwareIndex::load(root.path()).unwrap();
    assert_eq!(index.ids(), vec!["zeta_v2", "alpha_v1"]);
}

#[test]
fn resolve_returns_exactly_the_declared_roles() {
    let root = firmware_root();
    let fw = entry("demo_v1", "v1", true, &ALL_ROLES);
    touch_artifacts(root.path(), &fw);
    write_catalog(root.path(), &[fw]);

    let index = FirmwareIndex::load(root.path()).unwrap();
    let files = index.resolve_files("demo_v1").unwrap();

    let roles: Vec<ArtifactRole> = files.keys().copied().collect();
    assert_eq!(
        roles,
        vec![
            ArtifactRole::Bootloader,
            ArtifactRole::Partitions,
            ArtifactRole::BootApp0,
            ArtifactRole::Firmware
        ]
    );
    for path in files.values() {
        assert!(path.is_absolute());
        assert!(path.is_file());
    }
}

#[test]
fn partial_entries_resolve_only_their_roles() {
    let root = firmware_root();
    let fw = entry("slim_v1", "v1", false, &["firmware"]);
    touch_artifacts(root.path(), &fw);
    write_catalog(root.path(), &[fw]);

    let index = FirmwareIndex::load(root.path()).unwrap();
    let files = index.resolve_files("slim_v1").unwrap();
    assert_eq!(files.len(), 1);
    assert!(files.contains_key(&ArtifactRole::Firmware));
}

#[test]
fn missing_artifacts_are_all_reported_together() {
    let root = firmware_root();
    let fw = entry("demo_v1", "v1", false, &ALL_ROLES);
    touch_artifacts(root.path(), &fw);
    write_catalog(root.path(), &[fw]);
    fs::remove_file(root.path().join("v1/bootloader.bin")).unwrap();
    fs::remove_file(root.path().join("v1/boot_app0.bin")).unwrap();

    let index = FirmwareIndex::load(root.path()).unwrap();
    let err = index.resolve_files("demo_v1").unwrap_err();
    match err {
        CatalogError::MissingArtifacts { id, missing } => {
            assert_eq!(id, "demo_v1");
            let roles: Vec<ArtifactRole> = missing.iter().map(|(role, _)| *role).collect();
            assert_eq!(roles, vec![ArtifactRole::Bootloader, ArtifactRole::BootApp0]);
            for (_, path) in &missing {
                assert!(path.to_string_lossy().ends_with(".bin"));
            }
        }
        other => panic!("expected MissingArtifacts, got {other}"),
    }
}

#[test]
fn unknown_id_reports_the_known_ids() {
    let root = firmware_root();
    write_catalog(
        root.path(),
        &[
            entry("a_v1", "v1", false, &ALL_ROLES),
            entry("b_v2", "v2", true, &ALL_ROLES),
        ],
    );

    let index = FirmwareIndex::load(root.path()).unwrap();
    let err = index.resolve_files("nope").unwrap_err();
    match err {
        CatalogError::NotFound { id, known } => {
            assert_eq!(id, "nope");
            assert_eq!(known, vec!["a_v1", "b_v2"]);
        }
        other => panic!("expected NotFound, got {other}"),
    }
}

#[test]
fn default_selection_prefers_recommended_anywhere() {
    let root = firmware_root();
    write_catalog(
        root.path(),
        &[
            entry("old_v1", "v1", false, &ALL_ROLES),
            entry("mid_v2", "v2", false, &ALL_ROLES),
            entry("new_v3", "v3", true, &ALL_ROLES),
        ],
    );

    let index = FirmwareIndex::load(root.path()).unwrap();
    assert_eq!(index.select_default().unwrap().id, "new_v3");
}

#[test]
fn default_selection_falls_back_to_first_entry() {
    let root = firmware_root();
    write_catalog(
        root.path(),
        &[
            entry("first_v1", "v1", false, &ALL_ROLES),
            entry("second_v2", "v2", false, &ALL_ROLES),
        ],
    );

    let index = FirmwareIndex::load(root.path()).unwrap();
    assert_eq!(index.select_default().unwrap().id, "first_v1");
}

#[test]
fn default_selection_resolves_round_trip() {
    let root = firmware_root();
    let fw = entry("demo_v1", "v1", true, &ALL_ROLES);
    touch_artifacts(root.path(), &fw);
    write_catalog(root.path(), &[fw]);

    let index = FirmwareIndex::load(root.path()).unwrap();
    let id = index.select_default().unwrap().id.clone();
    let files = index.resolve_files(&id).unwrap();
    assert_eq!(files.len(), 4);
}

#[test]
fn empty_catalog_has_no_default() {
    let root = firmware_root();
    write_catalog(root.path(), &[]);

    let index = FirmwareIndex::load(root.path()).unwrap();
    assert!(index.ids().is_empty());
    assert!(matches!(
        index.select_default().unwrap_err(),
        CatalogError::EmptyCatalog
    ));
}

#[test]
fn missing_descriptor_is_unavailable() {
    let root = firmware_root();
    let err = FirmwareIndex::load(root.path()).unwrap_err();
    match err {
        CatalogError::Unavailable { path } => {
            assert!(path.ends_with("firmware-list.json"));
        }
        other => panic!("expected Unavailable, got {other}"),
    }
}

#[test]
fn invalid_json_is_malformed() {
    let root = firmware_root();
    fs::write(root.path().join("firmware-list.json"), "{ not json").unwrap();

    assert!(matches!(
        FirmwareIndex::load(root.path()).unwrap_err(),
        CatalogError::Malformed { .. }
    ));
}

#[test]
fn unknown_role_is_malformed() {
    let root = firmware_root();
    fs::write(
        root.path().join("firmware-list.json"),
        serde_json::to_string(&serde_json::json!({
            "firmwares": [{
                "id": "demo_v1",
                "version": "v1",
                "board": "Lolin S2 Mini",
                "files": { "kernel": { "path": "v1/kernel.bin" } }
            }]
        }))
        .unwrap(),
    )
    .unwrap();

    let err = FirmwareIndex::load(root.path()).unwrap_err();
    assert!(matches!(err, CatalogError::Malformed { .. }));
}

#[test]
fn duplicate_ids_are_malformed() {
    let root = firmware_root();
    write_catalog(
        root.path(),
        &[
            entry("dup_v1", "v1", false, &ALL_ROLES),
            entry("dup_v1", "v1", false, &ALL_ROLES),
        ],
    );

    let err = FirmwareIndex::load(root.path()).unwrap_err();
    assert!(err.to_string().contains("duplicate firmware id 'dup_v1'"));
}
