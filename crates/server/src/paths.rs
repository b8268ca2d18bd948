//! Central path resolution for photobridge data files.
//!
//! Resolved once at startup from: CLI `--data-dir` > `PHOTOBRIDGE_DATA_DIR` env > `~/.photobridge`.

use std::io;
use std::path::{Path, PathBuf};

const DATA_DIR_ENV: &str = "PHOTOBRIDGE_DATA_DIR";

/// Resolve the data directory.
///
/// Priority: `explicit` arg > `PHOTOBRIDGE_DATA_DIR` env > `~/.photobridge` default.
pub fn resolve_data_dir(explicit: Option<&Path>) -> io::Result<PathBuf> {
    if let Some(p) = explicit {
        return Ok(p.to_path_buf());
    }
    if let Some(env_val) = std::env::var_os(DATA_DIR_ENV).filter(|v| !v.is_empty()) {
        return Ok(PathBuf::from(env_val));
    }
    dirs::home_dir()
        .map(|home| home.join(".photobridge"))
        .ok_or_else(|| io::Error::new(io::ErrorKind::NotFound, "HOME directory not found"))
}

pub fn config_path(data_dir: &Path) -> PathBuf {
    data_dir.join("config.toml")
}

pub fn log_dir(data_dir: &Path) -> PathBuf {
    data_dir.join("logs")
}

/// Create all required subdirectories under the data dir.
pub fn ensure_dirs(data_dir: &Path) -> io::Result<()> {
    std::fs::create_dir_all(data_dir)?;
    std::fs::create_dir_all(log_dir(data_dir))?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn explicit_dir_wins() {
        let dir = resolve_data_dir(Some(Path::new("/tmp/pb-explicit"))).expect("resolve");
        assert_eq!(dir, PathBuf::from("/tmp/pb-explicit"));
        assert_eq!(config_path(&dir), PathBuf::from("/tmp/pb-explicit/config.toml"));
        assert_eq!(log_dir(&dir), PathBuf::from("/tmp/pb-explicit/logs"));
    }

    #[test]
    fn ensure_dirs_creates_log_dir() {
        let tmp = tempfile::tempdir().expect("tempdir");
        let base = tmp.path().join("data");
        ensure_dirs(&base).expect("ensure");
        assert!(log_dir(&base).is_dir());
    }
}
