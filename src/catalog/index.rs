//! Indexed view of a loaded firmware catalog.
//!
//! The index enforces id uniqueness at load time and provides lookup by
//! firmware id plus the deterministic default-selection policy. Entries keep
//! descriptor order; the id map only accelerates lookups.

use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

use crate::catalog::model::{ArtifactRole, FirmwareCatalog, FirmwareEntry, load_catalog};
use crate::catalog::{CatalogError, descriptor_path};

#[derive(Debug)]
pub struct FirmwareIndex {
    firmware_root: PathBuf,
    catalog: FirmwareCatalog,
    by_id: BTreeMap<String, usize>,
}

impl FirmwareIndex {
    /// Load the descriptor under `firmware_root` and build a validated index.
    ///
    /// Reads fresh from disk on every call; nothing is cached across
    /// invocations.
    pub fn load(firmware_root: &Path) -> Result<Self, CatalogError> {
        let catalog = load_catalog(firmware_root)?;
        Self::from_catalog(firmware_root, catalog)
    }

    /// Index an already-decoded catalog, enforcing id uniqueness.
    pub fn from_catalog(
        firmware_root: &Path,
        catalog: FirmwareCatalog,
    ) -> Result<Self, CatalogError> {
        let mut by_id = BTreeMap::new();
        for (pos, entry) in catalog.firmwares.iter().enumerate() {
            if entry.id.trim().is_empty() {
                return Err(CatalogError::Malformed {
                    path: descriptor_path(firmware_root),
                    details: format!("entry #{} has an empty id", pos + 1),
                });
            }
            if by_id.insert(entry.id.clone(), pos).is_some() {
                return Err(CatalogError::Malformed {
                    path: descriptor_path(firmware_root),
                    details: format!("duplicate firmware id '{}'", entry.id),
                });
            }
        }
        Ok(Self {
            firmware_root: firmware_root.to_path_buf(),
            catalog,
            by_id,
        })
    }

    /// Entries in descriptor order, unfiltered.
    pub fn entries(&self) -> &[FirmwareEntry] {
        &self.catalog.firmwares
    }

    /// Every known id, in descriptor order.
    pub fn ids(&self) -> Vec<String> {
        self.catalog
            .firmwares
            .iter()
            .map(|entry| entry.id.clone())
            .collect()
    }

    /// Look up an entry by id.
    pub fn get(&self, id: &str) -> Option<&FirmwareEntry> {
        self.by_id
            .get(id)
            .and_then(|pos| self.catalog.firmwares.get(*pos))
    }

    /// The default entry when no explicit id is supplied: first entry marked
    /// recommended in descriptor order, else the first entry.
    pub fn select_default(&self) -> Result<&FirmwareEntry, CatalogError> {
        let entries = self.entries();
        entries
            .iter()
            .find(|entry| entry.recommended)
            .or_else(|| entries.first())
            .ok_or(CatalogError::EmptyCatalog)
    }

    /// Resolve an entry's artifact files against the firmware root.
    ///
    /// Existence is checked for every referenced file on every call, and all
    /// missing role/path pairs are reported together rather than failing on
    /// the first. The returned map's keys are exactly the roles the entry
    /// declares.
    pub fn resolve_files(&self, id: &str) -> Result<BTreeMap<ArtifactRole, PathBuf>, CatalogError> {
        let entry = self.get(id).ok_or_else(|| CatalogError::NotFound {
            id: id.to_string(),
            known: self.ids(),
        })?;

        let mut resolved = BTreeMap::new();
        let mut missing = Vec::new();
        for (role, file) in &entry.files {
            let path = self.firmware_root.join(&file.path);
            if path.is_file() {
                let absolute = fs::canonicalize(&path).unwrap_or(path);
                resolved.insert(*role, absolute);
            } else {
                missing.push((*role, path));
            }
        }

        if !missing.is_empty() {
            return Err(CatalogError::MissingArtifacts {
                id: entry.id.clone(),
                missing,
            });
        }
        Ok(resolved)
    }

    pub fn firmware_root(&self) -> &Path {
        &self.firmware_root
    }

    pub fn catalog(&self) -> &FirmwareCatalog {
        &self.catalog
    }
}
