//! JSON-backed Pset and profile stores.
//!
//! Both stores resolve a platform config directory the same way: an
//! explicit env var override for tests and deployments that need one,
//! falling back to the OS-standard location. Missing or corrupt files
//! never propagate as a fatal error — callers get built-in defaults and a
//! warning log line instead.

use std::collections::HashMap;
use std::fs;
use std::path::PathBuf;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

use crate::pset::{Pset, ALLOWED_PSET_IDS};
use crate::profile::Profile;

const CONFIG_DIR_ENV: &str = "TOOLSIM_CONFIG_DIR";

/// Resolve (and create) the directory both stores live under.
pub fn config_dir() -> Result<PathBuf> {
    let dir = if let Ok(dir) = std::env::var(CONFIG_DIR_ENV) {
        PathBuf::from(dir)
    } else {
        dirs::config_dir()
            .context("could not determine platform config directory")?
            .join("toolsim")
    };
    fs::create_dir_all(&dir).with_context(|| format!("creating config directory {}", dir.display()))?;
    Ok(dir)
}

/// Replace anything but ASCII alphanumerics, `-`, and `_` with `_`, so a
/// controller or profile name is always safe as a filename.
pub fn sanitize_filename(name: &str) -> String {
    name.chars()
        .map(|c| if c.is_ascii_alphanumeric() || c == '-' || c == '_' { c } else { '_' })
        .collect()
}

/// On-disk shape for one Pset entry — field names match the wire/profile
/// vocabulary (`torque_min`/`torque_max`) rather than the in-memory
/// struct's (`min_torque`/`max_torque`).
#[derive(Debug, Serialize, Deserialize)]
struct PersistedPset {
    batch_size: u32,
    target_torque: f64,
    torque_min: f64,
    torque_max: f64,
    target_angle: i32,
    angle_min: i32,
    angle_max: i32,
}

impl From<&Pset> for PersistedPset {
    fn from(p: &Pset) -> Self {
        Self {
            batch_size: p.batch_size,
            target_torque: p.target_torque,
            torque_min: p.min_torque,
            torque_max: p.max_torque,
            target_angle: p.target_angle,
            angle_min: p.min_angle,
            angle_max: p.max_angle,
        }
    }
}

impl From<PersistedPset> for Pset {
    fn from(p: PersistedPset) -> Self {
        Self {
            target_torque: p.target_torque,
            min_torque: p.torque_min,
            max_torque: p.torque_max,
            target_angle: p.target_angle,
            min_angle: p.angle_min,
            max_angle: p.angle_max,
            batch_size: p.batch_size,
        }
    }
}

fn default_psets() -> HashMap<String, Pset> {
    ALLOWED_PSET_IDS
        .iter()
        .map(|id| (id.to_string(), Pset::default()))
        .collect()
}

fn pset_store_path(controller_name: &str) -> Result<PathBuf> {
    Ok(config_dir()?.join(format!("{}.psets.json", sanitize_filename(controller_name))))
}

/// Load the Pset table for `controller_name`. Falls back to built-in
/// defaults for every known Pset id on any I/O or parse failure, logged at
/// `warn` rather than propagated — per the persistence fallback policy.
pub fn load_psets(controller_name: &str) -> HashMap<String, Pset> {
    match load_psets_inner(controller_name) {
        Ok(psets) => psets,
        Err(e) => {
            log::warn!("failed to load pset table for {controller_name:?}: {e:#}; using defaults");
            default_psets()
        }
    }
}

fn load_psets_inner(controller_name: &str) -> Result<HashMap<String, Pset>> {
    let path = pset_store_path(controller_name)?;
    if !path.exists() {
        return Ok(default_psets());
    }
    let content = fs::read_to_string(&path).with_context(|| format!("reading {}", path.display()))?;
    let raw: HashMap<String, PersistedPset> =
        serde_json::from_str(&content).with_context(|| format!("parsing {}", path.display()))?;
    Ok(raw.into_iter().map(|(id, p)| (id, Pset::from(p))).collect())
}

/// Persist the Pset table for `controller_name`.
pub fn save_psets(controller_name: &str, psets: &HashMap<String, Pset>) -> Result<()> {
    let path = pset_store_path(controller_name)?;
    let raw: HashMap<&str, PersistedPset> = psets
        .iter()
        .map(|(id, p)| (id.as_str(), PersistedPset::from(p)))
        .collect();
    let json = serde_json::to_string_pretty(&raw)?;
    fs::write(&path, json).with_context(|| format!("writing {}", path.display()))
}

fn profile_dir() -> Result<PathBuf> {
    let dir = config_dir()?.join("profiles");
    fs::create_dir_all(&dir).with_context(|| format!("creating profile directory {}", dir.display()))?;
    Ok(dir)
}

fn profile_path(name: &str) -> Result<PathBuf> {
    Ok(profile_dir()?.join(format!("{}.json", sanitize_filename(name))))
}

/// Resolve a profile by name: built-ins first, then the on-disk directory.
pub fn load_profile(name: &str) -> Result<Profile> {
    if let Some(profile) = Profile::built_in(name) {
        return Ok(profile);
    }
    let path = profile_path(name)?;
    let content = fs::read_to_string(&path).with_context(|| format!("reading profile {}", path.display()))?;
    serde_json::from_str(&content).with_context(|| format!("parsing profile {}", path.display()))
}

/// Persist `profile` under its own name in the profile directory.
pub fn save_profile(profile: &Profile) -> Result<()> {
    let path = profile_path(&profile.name)?;
    let json = serde_json::to_string_pretty(profile)?;
    fs::write(&path, json).with_context(|| format!("writing profile {}", path.display()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    // config_dir() reads a process-wide env var; serialize tests that touch it.
    static ENV_LOCK: Mutex<()> = Mutex::new(());

    fn with_temp_config_dir<T>(f: impl FnOnce() -> T) -> T {
        let _guard = ENV_LOCK.lock().unwrap();
        let tmp = tempfile::TempDir::new().unwrap();
        std::env::set_var(CONFIG_DIR_ENV, tmp.path());
        let result = f();
        std::env::remove_var(CONFIG_DIR_ENV);
        result
    }

    #[test]
    fn missing_pset_file_falls_back_to_defaults() {
        with_temp_config_dir(|| {
            let psets = load_psets("sim-1");
            assert_eq!(psets.len(), ALLOWED_PSET_IDS.len());
            assert_eq!(psets["001"], Pset::default());
        });
    }

    #[test]
    fn saved_psets_round_trip() {
        with_temp_config_dir(|| {
            let mut psets = default_psets();
            psets.get_mut("001").unwrap().batch_size = 7;
            save_psets("sim-1", &psets).unwrap();

            let loaded = load_psets("sim-1");
            assert_eq!(loaded["001"].batch_size, 7);
        });
    }

    #[test]
    fn corrupt_pset_file_falls_back_to_defaults() {
        with_temp_config_dir(|| {
            let path = pset_store_path("sim-1").unwrap();
            fs::write(&path, "not json").unwrap();
            let psets = load_psets("sim-1");
            assert_eq!(psets.len(), ALLOWED_PSET_IDS.len());
        });
    }

    #[test]
    fn built_in_profile_resolves_without_touching_disk() {
        with_temp_config_dir(|| {
            let profile = load_profile("pf6000-full").unwrap();
            assert_eq!(profile.name, "pf6000-full");
        });
    }

    #[test]
    fn custom_profile_round_trips_through_disk() {
        with_temp_config_dir(|| {
            let mut profile = Profile::pf6000_basic();
            profile.name = "my-line".to_string();
            save_profile(&profile).unwrap();

            let loaded = load_profile("my-line").unwrap();
            assert_eq!(loaded.name, "my-line");
            assert_eq!(loaded.revisions, profile.revisions);
        });
    }

    #[test]
    fn unknown_profile_without_a_file_is_an_error() {
        with_temp_config_dir(|| {
            assert!(load_profile("does-not-exist").is_err());
        });
    }

    #[test]
    fn sanitizes_unsafe_characters() {
        assert_eq!(sanitize_filename("Line/1 (east)"), "Line_1__east_");
    }
}
