use std::ffi::OsString;
use std::fs;
use std::io::{self, Write};
use std::path::{Path, PathBuf};

/// Writes `contents` to a sibling temp file, syncs it, then renames it over
/// `path` so readers see either the old or the new file. An existing file's
/// permissions carry over to the replacement.
pub fn write_atomic(path: &Path, contents: &[u8]) -> io::Result<()> {
    let tmp_path = temp_sibling(path);
    let result = write_and_sync(&tmp_path, contents)
        .and_then(|()| copy_permissions(path, &tmp_path))
        .and_then(|()| fs::rename(&tmp_path, path));
    if result.is_err() {
        let _ = remove_file_if_exists(&tmp_path);
    }
    result
}

pub(crate) fn remove_file_if_exists(path: &Path) -> io::Result<()> {
    if path.exists() {
        fs::remove_file(path)?;
    }
    Ok(())
}

fn copy_permissions(from: &Path, to: &Path) -> io::Result<()> {
    match fs::metadata(from) {
        Ok(metadata) => fs::set_permissions(to, metadata.permissions()),
        Err(err) if err.kind() == io::ErrorKind::NotFound => Ok(()),
        Err(err) => Err(err),
    }
}

fn write_and_sync(path: &Path, contents: &[u8]) -> io::Result<()> {
    let mut file = fs::OpenOptions::new()
        .create(true)
        .truncate(true)
        .write(true)
        .open(path)?;
    file.write_all(contents)?;
    file.sync_all()
}

fn temp_sibling(path: &Path) -> PathBuf {
    let mut name = OsString::from(".");
    name.push(path.file_name().unwrap_or_else(|| "file".as_ref()));
    name.push(format!(".selfup-{}.tmp", std::process::id()));
    path.with_file_name(name)
}
