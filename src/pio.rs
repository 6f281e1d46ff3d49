//! PlatformIO invocation planning and build-output discovery.
//!
//! Wraps the `pio` CLI for building, uploading, and monitoring, and knows
//! where PlatformIO leaves the four firmware artifacts under `.pio/build`.

use anyhow::{Result, anyhow, bail};
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

use crate::catalog::ArtifactRole;
use crate::exec::CommandSpec;
use crate::find_tool;

/// PlatformIO project configuration file, relative to the project root.
pub const PROJECT_CONFIG: &str = "platformio.ini";

/// Build output directory, relative to the project root.
pub const BUILD_DIR: &str = ".pio/build";

/// Locate the PlatformIO CLI on PATH.
pub fn resolve_pio() -> Result<PathBuf> {
    find_tool(&["pio", "platformio"]).ok_or_else(|| {
        anyhow!("PlatformIO not found on PATH; install it with 'pip install platformio'")
    })
}

/// Verify the project carries a PlatformIO configuration.
pub fn check_project_config(project_root: &Path) -> Result<()> {
    let config = project_root.join(PROJECT_CONFIG);
    if !config.is_file() {
        bail!(
            "PlatformIO configuration not found at {}; run from a PlatformIO project or pass --project",
            config.display()
        );
    }
    Ok(())
}

fn base_plan(pio: &Path, project_root: &Path) -> CommandSpec {
    CommandSpec::new(pio)
        .arg("--no-ansi")
        .arg("run")
        .arg("--project-dir")
        .arg(project_root)
}

/// Plan a firmware build, optionally limited to one environment.
pub fn build_plan(pio: &Path, project_root: &Path, environment: Option<&str>) -> CommandSpec {
    let mut spec = base_plan(pio, project_root);
    if let Some(env) = environment {
        spec = spec.arg("-e").arg(env);
    }
    spec
}

/// Plan a clean of the build directory.
pub fn clean_plan(pio: &Path, project_root: &Path, environment: Option<&str>) -> CommandSpec {
    build_plan(pio, project_root, environment)
        .arg("-t")
        .arg("clean")
}

/// Plan a build-and-upload to `port`.
pub fn upload_plan(
    pio: &Path,
    project_root: &Path,
    port: &str,
    environment: Option<&str>,
) -> CommandSpec {
    build_plan(pio, project_root, environment)
        .arg("--target")
        .arg("upload")
        .arg("--upload-port")
        .arg(port)
}

/// Plan the target listing used to enumerate environments.
pub fn list_targets_plan(pio: &Path, project_root: &Path) -> CommandSpec {
    base_plan(pio, project_root).arg("--list-targets")
}

/// Plan a serial monitor session.
pub fn monitor_plan(pio: &Path, port: &str, baud: u32) -> CommandSpec {
    CommandSpec::new(pio)
        .arg("device")
        .arg("monitor")
        .arg("--port")
        .arg(port)
        .arg("--baud")
        .arg(baud.to_string())
}

/// Parse `pio run --list-targets` output into a deduplicated environment
/// list, preserving first-seen order.
///
/// The listing is a table: a header row, separator lines, then one row per
/// environment/target with the environment name in the first column.
pub fn parse_target_listing(output: &str) -> Vec<String> {
    let mut environments: Vec<String> = Vec::new();
    for line in output.lines().skip(1) {
        let line = line.trim();
        if line.is_empty() || line.starts_with("---") {
            continue;
        }
        let Some(name) = line.split_whitespace().next() else {
            continue;
        };
        if !environments.iter().any(|known| known == name) {
            environments.push(name.to_string());
        }
    }
    environments
}

/// Set `upload_speed` in a platformio.ini document, returning the rewritten
/// contents.
///
/// Existing `upload_speed` lines are replaced in place; otherwise the
/// setting is inserted right after the first `[env:...]` header.
pub fn set_upload_speed(config: &str, baud: u32) -> String {
    let setting = format!("upload_speed = {baud}");

    if config
        .lines()
        .any(|line| line.trim_start().starts_with("upload_speed"))
    {
        return config
            .lines()
            .map(|line| {
                if line.trim_start().starts_with("upload_speed") {
                    setting.as_str()
                } else {
                    line
                }
            })
            .collect::<Vec<_>>()
            .join("\n");
    }

    let mut lines: Vec<&str> = Vec::new();
    let mut inserted = false;
    for line in config.lines() {
        lines.push(line);
        if !inserted && line.trim_start().starts_with("[env:") {
            lines.push(setting.as_str());
            inserted = true;
        }
    }
    if !inserted {
        lines.push(setting.as_str());
    }
    lines.join("\n")
}

/// Find built firmware artifacts under `.pio/build`.
///
/// When no environment is given, the first environment directory found is
/// used. Roles whose file is absent are simply not in the returned map;
/// callers decide whether that is a problem.
pub fn find_built_artifacts(
    project_root: &Path,
    environment: Option<&str>,
) -> Result<BTreeMap<ArtifactRole, PathBuf>> {
    let build_dir = project_root.join(BUILD_DIR);
    let env_dir = match environment {
        Some(env) => build_dir.join(env),
        None => first_subdirectory(&build_dir)?.ok_or_else(|| {
            anyhow!(
                "no build output under {}; build the firmware first",
                build_dir.display()
            )
        })?,
    };
    if !env_dir.is_dir() {
        bail!("build directory not found: {}", env_dir.display());
    }

    let mut artifacts = BTreeMap::new();
    for role in ArtifactRole::ALL {
        if let Some(path) = find_file(&env_dir, &role.file_name()) {
            artifacts.insert(role, path);
        }
    }
    Ok(artifacts)
}

fn first_subdirectory(dir: &Path) -> Result<Option<PathBuf>> {
    if !dir.is_dir() {
        return Ok(None);
    }
    let mut subdirs: Vec<PathBuf> = fs::read_dir(dir)?
        .filter_map(|entry| entry.ok())
        .map(|entry| entry.path())
        .filter(|path| path.is_dir())
        .collect();
    subdirs.sort();
    Ok(subdirs.into_iter().next())
}

fn find_file(dir: &Path, name: &str) -> Option<PathBuf> {
    let direct = dir.join(name);
    if direct.is_file() {
        return Some(direct);
    }
    let entries = fs::read_dir(dir).ok()?;
    for entry in entries.filter_map(|entry| entry.ok()) {
        let path = entry.path();
        if path.is_dir() {
            if let Some(found) = find_file(&path, name) {
                return Some(found);
            }
        }
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::env;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[test]
    fn target_listing_skips_headers_and_deduplicates() {
        let listing = "\
Environment    Group     Name     Title            Description
-------------  --------  -------  ---------------  -----------
lolin_s2_mini  Platform  upload   Upload           upload firmware
lolin_s2_mini  Platform  clean    Clean            remove build files
debug_build    Platform  upload   Upload           upload firmware
";
        assert_eq!(
            parse_target_listing(listing),
            vec!["lolin_s2_mini".to_string(), "debug_build".to_string()]
        );
    }

    #[test]
    fn target_listing_of_empty_output_is_empty() {
        assert!(parse_target_listing("").is_empty());
        assert!(parse_target_listing("Environment Group\n----\n").is_empty());
    }

    #[test]
    fn upload_plan_includes_port_and_environment() {
        let spec = upload_plan(
            Path::new("pio"),
            Path::new("/proj"),
            "/dev/ttyUSB0",
            Some("lolin_s2_mini"),
        );
        let args: Vec<String> = spec
            .args
            .iter()
            .map(|arg| arg.to_string_lossy().into_owned())
            .collect();
        assert!(args.windows(2).any(|w| w == ["-e", "lolin_s2_mini"]));
        assert!(args.windows(2).any(|w| w == ["--upload-port", "/dev/ttyUSB0"]));
        assert!(args.windows(2).any(|w| w == ["--target", "upload"]));
    }

    #[test]
    fn upload_speed_replaces_existing_setting() {
        let config = "[env:demo]\nplatform = espressif32\nupload_speed = 115200\n";
        let rewritten = set_upload_speed(config, 921600);
        assert!(rewritten.contains("upload_speed = 921600"));
        assert!(!rewritten.contains("115200"));
    }

    #[test]
    fn upload_speed_inserted_after_env_header() {
        let config = "[platformio]\ndefault_envs = demo\n\n[env:demo]\nplatform = espressif32\n";
        let rewritten = set_upload_speed(config, 460800);
        let lines: Vec<&str> = rewritten.lines().collect();
        let header = lines.iter().position(|l| *l == "[env:demo]").unwrap();
        assert_eq!(lines[header + 1], "upload_speed = 460800");
    }

    #[test]
    fn built_artifacts_found_in_nested_output() {
        let temp = TempProject::new();
        let env_dir = temp.root.join(BUILD_DIR).join("demo_env");
        fs::create_dir_all(env_dir.join("nested")).unwrap();
        fs::write(env_dir.join("firmware.bin"), b"fw").unwrap();
        fs::write(env_dir.join("nested/bootloader.bin"), b"bl").unwrap();

        let artifacts = find_built_artifacts(&temp.root, Some("demo_env")).unwrap();
        assert_eq!(artifacts.len(), 2);
        assert!(artifacts.contains_key(&ArtifactRole::Firmware));
        assert!(artifacts.contains_key(&ArtifactRole::Bootloader));
        assert!(!artifacts.contains_key(&ArtifactRole::Partitions));
    }

    #[test]
    fn built_artifacts_default_to_first_environment() {
        let temp = TempProject::new();
        let env_dir = temp.root.join(BUILD_DIR).join("a_env");
        fs::create_dir_all(&env_dir).unwrap();
        fs::write(env_dir.join("firmware.bin"), b"fw").unwrap();

        let artifacts = find_built_artifacts(&temp.root, None).unwrap();
        assert_eq!(artifacts.len(), 1);
    }

    #[test]
    fn missing_build_directory_is_an_error() {
        let temp = TempProject::new();
        assert!(find_built_artifacts(&temp.root, Some("nope")).is_err());
        assert!(find_built_artifacts(&temp.root, None).is_err());
    }

    struct TempProject {
        root: PathBuf,
    }

    impl TempProject {
        fn new() -> Self {
            static COUNTER: AtomicUsize = AtomicUsize::new(0);
            let mut dir = env::temp_dir();
            dir.push(format!(
                "boardflash-pio-test-{}-{}",
                std::process::id(),
                COUNTER.fetch_add(1, Ordering::SeqCst)
            ));
            fs::create_dir_all(&dir).unwrap();
            Self { root: dir }
        }
    }

    impl Drop for TempProject {
        fn drop(&mut self) {
            let _ = fs::remove_dir_all(&self.root);
        }
    }
}
