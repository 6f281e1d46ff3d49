//! Catalog-driven firmware flashing for ESP32-S2 boards.
//!
//! The library resolves a JSON firmware catalog (`firmware-list.json`) into
//! validated artifact paths with fixed flash addresses, and plans the
//! external-tool invocations (`esptool`, PlatformIO) that the `flash-board`
//! and `flash-pio` binaries execute. All actual flashing and building is
//! delegated to those tools; nothing here talks to the chip directly.

pub mod catalog;
pub mod exec;
pub mod flash;
pub mod pio;
pub mod ports;
pub mod publish;
mod schema;

pub use catalog::{ArtifactRole, CatalogError, FirmwareCatalog, FirmwareEntry, FirmwareIndex};
pub use exec::CommandSpec;

use anyhow::{Result, bail};
use std::{
    env, fs,
    path::{Path, PathBuf},
};

/// Firmware storage directory, relative to the project root.
pub const FIRMWARE_DIR: &str = "website/binaries";

/// True when `candidate` is a project root with a published firmware catalog.
fn is_project_root(candidate: &Path) -> bool {
    candidate
        .join(FIRMWARE_DIR)
        .join(catalog::FIRMWARE_LIST_FILE)
        .is_file()
}

fn firmware_root_from_hint(hint: &str) -> Option<PathBuf> {
    if hint.is_empty() {
        return None;
    }
    let hint_path = PathBuf::from(hint);
    if !hint_path.exists() || !is_project_root(&hint_path) {
        return None;
    }
    fs::canonicalize(hint_path).ok()
}

fn search_upwards(start: &Path) -> Option<PathBuf> {
    let mut dir = fs::canonicalize(start).ok()?;
    loop {
        if is_project_root(&dir) {
            return Some(dir);
        }
        if !dir.pop() {
            break;
        }
    }
    None
}

/// Locate the firmware storage directory (`website/binaries` under the
/// project root).
///
/// Resolution order: `BOARDFLASH_ROOT`, then an upward search from the
/// current directory, then the compile-time hint baked in by `build.rs`.
pub fn find_firmware_root() -> Result<PathBuf> {
    if let Ok(env_root) = env::var("BOARDFLASH_ROOT") {
        if let Some(root) = firmware_root_from_hint(&env_root) {
            return Ok(root.join(FIRMWARE_DIR));
        }
    }

    if let Ok(cwd) = env::current_dir() {
        if let Some(root) = search_upwards(&cwd) {
            return Ok(root.join(FIRMWARE_DIR));
        }
    }

    if let Some(hint) = option_env!("BOARDFLASH_ROOT_HINT") {
        if let Some(root) = firmware_root_from_hint(hint) {
            return Ok(root.join(FIRMWARE_DIR));
        }
    }

    bail!(
        "Unable to locate the firmware catalog ({FIRMWARE_DIR}/{}). Run from inside the project, \
         set BOARDFLASH_ROOT to the project root, or pass --firmware-root.",
        catalog::FIRMWARE_LIST_FILE
    );
}

/// Find the first of `names` that resolves to an executable on PATH.
pub fn find_tool(names: &[&str]) -> Option<PathBuf> {
    let paths = env::var_os("PATH")?;
    for dir in env::split_paths(&paths) {
        for name in names {
            let candidate = dir.join(name);
            if is_executable(&candidate) {
                return Some(candidate);
            }
        }
    }
    None
}

fn is_executable(path: &Path) -> bool {
    if !path.is_file() {
        return false;
    }
    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        if let Ok(meta) = fs::metadata(path) {
            return meta.permissions().mode() & 0o111 != 0;
        }
        false
    }
    #[cfg(not(unix))]
    {
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[test]
    fn project_root_requires_descriptor_file() {
        let temp = TempRoot::new();
        assert!(!is_project_root(&temp.root));

        let binaries = temp.root.join(FIRMWARE_DIR);
        fs::create_dir_all(&binaries).unwrap();
        assert!(!is_project_root(&temp.root));

        fs::write(binaries.join(catalog::FIRMWARE_LIST_FILE), "{}").unwrap();
        assert!(is_project_root(&temp.root));
    }

    #[test]
    fn upward_search_finds_enclosing_root() {
        let temp = TempRoot::new();
        let binaries = temp.root.join(FIRMWARE_DIR);
        fs::create_dir_all(&binaries).unwrap();
        fs::write(binaries.join(catalog::FIRMWARE_LIST_FILE), "{}").unwrap();

        let nested = temp.root.join("src/deep/nested");
        fs::create_dir_all(&nested).unwrap();

        let found = search_upwards(&nested).expect("root discovered");
        assert_eq!(found, fs::canonicalize(&temp.root).unwrap());
    }

    #[test]
    fn hint_rejects_directories_without_catalog() {
        let temp = TempRoot::new();
        assert!(firmware_root_from_hint(temp.root.to_str().unwrap()).is_none());
        assert!(firmware_root_from_hint("").is_none());
    }

    struct TempRoot {
        root: PathBuf,
    }

    impl TempRoot {
        fn new() -> Self {
            static COUNTER: AtomicUsize = AtomicUsize::new(0);
            let mut dir = env::temp_dir();
            dir.push(format!(
                "boardflash-lib-test-{}-{}",
                std::process::id(),
                COUNTER.fetch_add(1, Ordering::SeqCst)
            ));
            fs::create_dir_all(&dir).unwrap();
            Self { root: dir }
        }
    }

    impl Drop for TempRoot {
        fn drop(&mut self) {
            let _ = fs::remove_dir_all(&self.root);
        }
    }
}
