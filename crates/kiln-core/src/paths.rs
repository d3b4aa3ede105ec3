use dirs::home_dir;
use std::path::PathBuf;

/// Returns the primary configuration directory, or None if the user's home cannot be resolved.
pub fn try_kiln_home() -> Option<PathBuf> {
    if let Ok(val) = std::env::var("KILN_HOME") {
        return Some(PathBuf::from(val));
    }
    home_dir().map(|h| h.join(".kiln"))
}

/// Returns the kiln home directory (`~/.kiln`), falling back to a relative
/// `.kiln` when no home directory can be resolved.
pub fn kiln_home() -> PathBuf {
    try_kiln_home().unwrap_or_else(|| PathBuf::from(".kiln"))
}

/// Configuration file: ~/.kiln/config.toml
pub fn config_path() -> PathBuf {
    kiln_home().join("config.toml")
}

/// Shared package cache: ~/.kiln/repository (or `KILN_CACHE_DIR`)
pub fn cache_path() -> PathBuf {
    if let Ok(val) = std::env::var("KILN_CACHE_DIR") {
        return PathBuf::from(val);
    }
    kiln_home().join("repository")
}

/// Scratch caches for in-flight installs: ~/.kiln/tmp
pub fn scratch_path() -> PathBuf {
    kiln_home().join("tmp")
}

/// Persisted artifact records: ~/.kiln/artifacts.json
pub fn artifacts_path() -> PathBuf {
    kiln_home().join("artifacts.json")
}

/// Convert a dotted group to its relative directory (`org.x` -> `org/x`).
pub fn group_path(group: &str) -> PathBuf {
    group.split('.').collect()
}
