use std::{
    fs,
    path::{Path, PathBuf},
};

use anyhow::{bail, Context, Result};

use crate::config::DirectoryConfig;

#[derive(Debug, Clone)]
pub struct ResolvedPaths {
    pub logs_dir: PathBuf,
    pub data_dir: PathBuf,
    pub settings_db: PathBuf,
}

/// Prepares the log and data directories shared by the CLI and a running
/// watcher. Both must be writable before tracing or the settings store start.
pub fn ensure_directories(cfg: &DirectoryConfig) -> Result<ResolvedPaths> {
    let db_name = Path::new(&cfg.settings_db_filename);
    if db_name.components().count() != 1 || db_name.file_name().is_none() {
        bail!(
            "SETTINGS_DB_FILENAME must be a plain file name, got {:?}",
            cfg.settings_db_filename
        );
    }

    let logs_dir = ensure_dir(&cfg.logs_dir)?;
    let data_dir = ensure_dir(&cfg.data_dir)?;
    probe_writable(&logs_dir, "log")?;
    probe_writable(&data_dir, "data")?;

    Ok(ResolvedPaths {
        settings_db: data_dir.join(db_name),
        logs_dir,
        data_dir,
    })
}

fn ensure_dir(path: &str) -> Result<PathBuf> {
    let dir = PathBuf::from(path);
    fs::create_dir_all(&dir).with_context(|| format!("failed to create directory {path}"))?;
    Ok(dir.canonicalize().unwrap_or(dir))
}

fn probe_writable(dir: &Path, label: &str) -> Result<()> {
    let probe = dir.join(".spoiler-guard-write-test");
    fs::write(&probe, b"ok")
        .with_context(|| format!("{label} directory {} is not writable", dir.display()))?;
    fs::remove_file(&probe).ok();
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config(root: &Path, db: &str) -> DirectoryConfig {
        DirectoryConfig {
            logs_dir: root.join("logs").display().to_string(),
            data_dir: root.join("nested/data").display().to_string(),
            settings_db_filename: db.to_string(),
        }
    }

    #[test]
    fn creates_missing_directories() {
        let root = tempfile::tempdir().unwrap();
        let paths = ensure_directories(&config(root.path(), "settings.db")).unwrap();
        assert!(paths.logs_dir.is_dir());
        assert!(paths.data_dir.is_dir());
        assert_eq!(paths.settings_db, paths.data_dir.join("settings.db"));
        assert!(fs::read_dir(&paths.data_dir).unwrap().next().is_none());
        assert!(fs::read_dir(&paths.logs_dir).unwrap().next().is_none());
    }

    #[test]
    fn settings_db_must_be_a_file_name() {
        let root = tempfile::tempdir().unwrap();
        for bad in ["../settings.db", "sub/settings.db", ""] {
            let err = ensure_directories(&config(root.path(), bad)).unwrap_err();
            assert!(err.to_string().contains("SETTINGS_DB_FILENAME"), "{bad}: {err}");
        }
    }
}
