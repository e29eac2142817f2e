use std::fs;
use std::path::{Path, PathBuf};

use selfup_core::{Result, UpgradeError};
use tracing::info;

use crate::fs_utils::write_atomic;
use crate::ProjectLayout;

pub fn read_target(layout: &ProjectLayout, relative: &Path) -> Result<String> {
    let path = layout.target_path(relative);
    fs::read_to_string(&path).map_err(|err| UpgradeError::file_read(path, err))
}

/// Copies the pre-upgrade content into the backup slot for `relative`.
/// The slot's directory must already exist.
pub fn write_backup(layout: &ProjectLayout, relative: &Path, content: &str) -> Result<PathBuf> {
    let backup_path = layout.backup_path(relative);
    fs::write(&backup_path, content.as_bytes())
        .map_err(|err| UpgradeError::file_write(&backup_path, err))?;
    info!(
        file = %relative.display(),
        backup = %backup_path.display(),
        bytes = content.len(),
        "wrote backup"
    );
    Ok(backup_path)
}

/// Overwrites the tracked file with `content`. A symlinked target is written
/// through to the file it points at, which must live inside the project root.
pub fn replace_target(layout: &ProjectLayout, relative: &Path, content: &str) -> Result<PathBuf> {
    let path = layout.target_path(relative);
    let destination = write_destination(layout, relative, &path)?;
    write_atomic(&destination, content.as_bytes())
        .map_err(|err| UpgradeError::file_write(&destination, err))?;
    info!(
        file = %relative.display(),
        destination = %destination.display(),
        bytes = content.len(),
        "replaced file"
    );
    Ok(path)
}

fn write_destination(layout: &ProjectLayout, relative: &Path, path: &Path) -> Result<PathBuf> {
    let is_symlink = fs::symlink_metadata(path)
        .map(|metadata| metadata.file_type().is_symlink())
        .unwrap_or(false);
    if !is_symlink {
        return Ok(path.to_path_buf());
    }

    let resolved = fs::canonicalize(path).map_err(|err| UpgradeError::file_write(path, err))?;
    let root = fs::canonicalize(layout.root())
        .map_err(|err| UpgradeError::file_write(layout.root(), err))?;
    if !resolved.starts_with(&root) {
        return Err(UpgradeError::InvalidFilePath(relative.display().to_string()));
    }
    Ok(resolved)
}
