use std::ffi::OsString;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProjectLayout {
    root: PathBuf,
}

impl ProjectLayout {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn src_dir(&self) -> PathBuf {
        self.root.join("src")
    }

    pub fn plan_dir(&self) -> PathBuf {
        self.src_dir().join("plan")
    }

    pub fn manifest_path(&self) -> PathBuf {
        self.plan_dir().join("manifest.json")
    }

    pub fn backup_dir(&self) -> PathBuf {
        self.src_dir().join("backup")
    }

    pub fn config_path(&self) -> PathBuf {
        self.root.join("selfup.toml")
    }

    pub fn dotenv_path(&self) -> PathBuf {
        self.root.join(".env")
    }

    pub fn target_path(&self, relative: &Path) -> PathBuf {
        self.root.join(relative)
    }

    /// `src/backup/<relative dir>/<name>.bak`, one slot per tracked path.
    pub fn backup_path(&self, relative: &Path) -> PathBuf {
        let mut file_name = relative
            .file_name()
            .map(OsString::from)
            .unwrap_or_else(|| OsString::from("file"));
        file_name.push(".bak");
        let slot = self.backup_dir().join(relative);
        slot.with_file_name(file_name)
    }

    /// Creates the directory holding the backup slot for `relative`.
    pub fn ensure_backup_dir(&self, relative: &Path) -> io::Result<PathBuf> {
        let backup_path = self.backup_path(relative);
        let dir = backup_path
            .parent()
            .map(Path::to_path_buf)
            .unwrap_or_else(|| self.backup_dir());
        fs::create_dir_all(&dir)?;
        Ok(dir)
    }
}

pub fn default_project_root() -> io::Result<PathBuf> {
    std::env::current_dir()
}
