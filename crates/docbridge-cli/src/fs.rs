use std::fs::{self, File};
use std::io::{self, Write};
use std::path::{Path, PathBuf};

use tracing::debug;

use crate::error::{SaveError, SaveResult};

/// Replaces `path` with `content` through a sibling staging file. With
/// `backup`, the previous version is kept as `<name>.bak`. The staging file
/// is removed on every failure path.
pub fn write_atomic(path: &Path, content: &str, backup: bool) -> SaveResult<()> {
    let staged = staging_path(path);
    stage(&staged, content).map_err(|source| {
        discard(&staged);
        SaveError::Stage {
            path: staged.clone(),
            source,
        }
    })?;

    if backup {
        let backup_path = path.with_extension("bak");
        if let Err(source) = fs::copy(path, &backup_path) {
            discard(&staged);
            return Err(SaveError::Backup {
                path: backup_path,
                source,
            });
        }
        debug!(backup = %backup_path.display(), "previous document kept");
    }

    fs::rename(&staged, path).map_err(|source| {
        discard(&staged);
        SaveError::Replace {
            path: path.to_path_buf(),
            source,
        }
    })
}

fn stage(staged: &Path, content: &str) -> io::Result<()> {
    let mut file = File::create(staged)?;
    file.write_all(content.as_bytes())?;
    file.sync_all()
}

fn discard(staged: &Path) {
    let _ = fs::remove_file(staged);
}

fn staging_path(path: &Path) -> PathBuf {
    (0u32..)
        .map(|counter| match counter {
            0 => path.with_extension("tmp"),
            n => path.with_extension(format!("tmp{n}")),
        })
        .find(|candidate| !candidate.exists())
        .unwrap_or_else(|| path.with_extension("tmp"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn writes_atomically_with_backup() {
        let dir = tempdir().unwrap();
        let file_path = dir.path().join("doc.txt");
        fs::write(&file_path, "draft").unwrap();

        write_atomic(&file_path, "final", true).unwrap();

        assert_eq!(fs::read_to_string(&file_path).unwrap(), "final");
        assert_eq!(
            fs::read_to_string(file_path.with_extension("bak")).unwrap(),
            "draft"
        );
    }

    #[test]
    fn skips_backup_when_disabled() {
        let dir = tempdir().unwrap();
        let file_path = dir.path().join("doc.txt");
        fs::write(&file_path, "draft").unwrap();

        write_atomic(&file_path, "final", false).unwrap();

        assert!(!file_path.with_extension("bak").exists());
        assert!(!file_path.with_extension("tmp").exists());
    }

    #[test]
    fn missing_original_fails_backup_and_cleans_up() {
        let dir = tempdir().unwrap();
        let file_path = dir.path().join("gone.txt");

        let err = write_atomic(&file_path, "final", true).unwrap_err();

        match err {
            SaveError::Backup { path, .. } => assert_eq!(path, file_path.with_extension("bak")),
            other => panic!("unexpected error: {other}"),
        }
        assert!(!file_path.with_extension("tmp").exists());
        assert!(!file_path.exists());
    }
}
