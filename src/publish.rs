//! Catalog writer path: publish built firmware into the storage root.
//!
//! The resolver never mutates the catalog; this module is the one place the
//! descriptor is rewritten. Artifacts are copied into a per-version
//! directory and the descriptor is replaced atomically so a crashed publish
//! never leaves a half-written catalog behind.

use anyhow::{Context, Result, bail};
use chrono::Local;
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use tempfile::NamedTempFile;

use crate::catalog::{
    ArtifactRole, CatalogError, Category, FileRef, FirmwareCatalog, FirmwareEntry, descriptor_path,
    load_catalog,
};
use crate::flash::DEFAULT_BAUD;

/// Metadata for a publish operation.
#[derive(Clone, Debug)]
pub struct PublishOptions {
    /// Plain version number, e.g. `0.0.2` (stored as `v0.0.2`).
    pub version: String,
    /// Human-readable board name, e.g. `Lolin S2 Mini`.
    pub board: String,
}

/// Directory-safe slug for a board name.
pub fn board_slug(board: &str) -> String {
    let mut slug = String::with_capacity(board.len());
    let mut last_was_separator = true;
    for c in board.chars() {
        if c.is_ascii_alphanumeric() {
            slug.push(c.to_ascii_lowercase());
            last_was_separator = false;
        } else if !last_was_separator {
            slug.push('_');
            last_was_separator = true;
        }
    }
    while slug.ends_with('_') {
        slug.pop();
    }
    slug
}

/// Copy built artifacts into the firmware root and rewrite the descriptor.
///
/// An existing entry with the same version is replaced, previously
/// recommended entries lose the flag (the fresh build becomes the default),
/// and the board's category is registered if absent. Returns the published
/// entry.
pub fn publish_artifacts(
    firmware_root: &Path,
    artifacts: &BTreeMap<ArtifactRole, PathBuf>,
    options: &PublishOptions,
) -> Result<FirmwareEntry> {
    if artifacts.is_empty() {
        bail!("nothing to publish: no built artifacts were found");
    }

    let slug = board_slug(&options.board);
    if slug.is_empty() {
        bail!("board name '{}' produces an empty slug", options.board);
    }

    let version_dir = firmware_root.join(&options.version).join(&slug);
    fs::create_dir_all(&version_dir)
        .with_context(|| format!("creating {}", version_dir.display()))?;

    let mut files = BTreeMap::new();
    let mut total_bytes = 0u64;
    for (role, source) in artifacts {
        let dest = version_dir.join(role.file_name());
        fs::copy(source, &dest)
            .with_context(|| format!("copying {} to {}", source.display(), dest.display()))?;
        total_bytes += fs::metadata(&dest).map(|meta| meta.len()).unwrap_or(0);
        files.insert(
            *role,
            FileRef {
                path: format!("{}/{}/{}", options.version, slug, role.file_name()),
                address: Some(role.flash_address().to_string()),
            },
        );
    }

    let today = Local::now().format("%Y-%m-%d").to_string();
    let entry = FirmwareEntry {
        id: format!("{}_v{}", slug, options.version),
        version: format!("v{}", options.version),
        board: options.board.clone(),
        size: Some(format!("{} KB", total_bytes / 1024)),
        date: Some(today.clone()),
        changelog: Some(format!("Built from source on {today}")),
        category: Some(options.board.clone()),
        recommended: true,
        baudrate: Some(DEFAULT_BAUD),
        files,
    };

    let mut catalog = match load_catalog(firmware_root) {
        Ok(catalog) => catalog,
        Err(CatalogError::Unavailable { .. }) => FirmwareCatalog::default(),
        Err(err) => return Err(err).context("refusing to overwrite an unreadable catalog"),
    };

    catalog.firmwares.retain(|fw| fw.version != entry.version);
    for fw in &mut catalog.firmwares {
        fw.recommended = false;
    }
    catalog.firmwares.push(entry.clone());
    catalog.last_updated = today;
    catalog.total_firmwares = catalog.firmwares.len() as u64;
    if !catalog.categories.iter().any(|cat| cat.name == options.board) {
        catalog.categories.push(Category {
            name: options.board.clone(),
            description: None,
        });
    }

    write_descriptor(firmware_root, &catalog)?;
    Ok(entry)
}

/// Serialize the catalog next to its final location, then persist over the
/// descriptor in one rename.
fn write_descriptor(firmware_root: &Path, catalog: &FirmwareCatalog) -> Result<()> {
    let path = descriptor_path(firmware_root);
    let temp = NamedTempFile::new_in(firmware_root)
        .with_context(|| format!("creating temporary file in {}", firmware_root.display()))?;
    serde_json::to_writer_pretty(temp.as_file(), catalog)
        .with_context(|| format!("serializing {}", path.display()))?;
    temp.persist(&path)
        .with_context(|| format!("replacing {}", path.display()))?;
    Ok(())
}
