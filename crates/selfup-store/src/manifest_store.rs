use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use selfup_core::{Manifest, ManifestEntry, Result, UpgradeError};
use tracing::{debug, info, warn};

use crate::digest::sha256_hex;
use crate::fs_utils::write_atomic;
use crate::ProjectLayout;

/// What `load` does with a manifest document that exists but does not parse.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum ManifestLoadPolicy {
    /// Warn and continue with an empty manifest.
    #[default]
    Lenient,
    /// Fail with `ManifestParse`.
    Strict,
}

/// A manifest plus the revision of the document it was read from.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LoadedManifest {
    manifest: Manifest,
    revision: Option<String>,
}

impl LoadedManifest {
    pub fn manifest(&self) -> &Manifest {
        &self.manifest
    }

    /// SHA-256 of the document bytes last read or written, `None` when absent.
    pub fn revision(&self) -> Option<&str> {
        self.revision.as_deref()
    }

    pub fn upsert(&mut self, entry: ManifestEntry) -> bool {
        self.manifest.upsert(entry)
    }

    pub fn into_manifest(self) -> Manifest {
        self.manifest
    }
}

#[derive(Debug, Clone)]
pub struct ManifestStore {
    path: PathBuf,
    policy: ManifestLoadPolicy,
}

impl ManifestStore {
    pub fn new(path: impl Into<PathBuf>, policy: ManifestLoadPolicy) -> Self {
        Self {
            path: path.into(),
            policy,
        }
    }

    pub fn for_layout(layout: &ProjectLayout, policy: ManifestLoadPolicy) -> Self {
        Self::new(layout.manifest_path(), policy)
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn policy(&self) -> ManifestLoadPolicy {
        self.policy
    }

    pub fn load(&self) -> Result<LoadedManifest> {
        let Some(bytes) = read_document(&self.path)? else {
            debug!(path = %self.path.display(), "manifest absent, starting empty");
            return Ok(LoadedManifest::default());
        };
        let revision = Some(sha256_hex(&bytes));

        match serde_json::from_slice::<Manifest>(&bytes) {
            Ok(manifest) => {
                debug!(
                    path = %self.path.display(),
                    entries = manifest.len(),
                    "loaded manifest"
                );
                Ok(LoadedManifest { manifest, revision })
            }
            Err(err) if self.policy == ManifestLoadPolicy::Lenient => {
                warn!(
                    path = %self.path.display(),
                    error = %err,
                    "manifest parse failed, continuing with an empty manifest"
                );
                Ok(LoadedManifest {
                    manifest: Manifest::new(),
                    revision,
                })
            }
            Err(err) => Err(UpgradeError::ManifestParse {
                path: self.path.clone(),
                source: err,
            }),
        }
    }

    /// Replaces the document with the full manifest.
    ///
    /// Fails with `ManifestConflict`, writing nothing, when the document on
    /// disk no longer matches the revision `loaded` was read from.
    pub fn save(&self, loaded: &mut LoadedManifest) -> Result<()> {
        let on_disk = read_document(&self.path)?.map(|bytes| sha256_hex(&bytes));
        if on_disk != loaded.revision {
            return Err(UpgradeError::ManifestConflict {
                path: self.path.clone(),
            });
        }

        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent).map_err(|err| UpgradeError::file_write(parent, err))?;
        }

        let encoded = serde_json::to_vec_pretty(&loaded.manifest)
            .map_err(|err| UpgradeError::file_write(&self.path, io::Error::from(err)))?;
        write_atomic(&self.path, &encoded)
            .map_err(|err| UpgradeError::file_write(&self.path, err))?;

        loaded.revision = Some(sha256_hex(&encoded));
        info!(
            path = %self.path.display(),
            entries = loaded.manifest.len(),
            "saved manifest"
        );
        Ok(())
    }
}

fn read_document(path: &Path) -> Result<Option<Vec<u8>>> {
    match fs::read(path) {
        Ok(bytes) => Ok(Some(bytes)),
        Err(err) if err.kind() == io::ErrorKind::NotFound => Ok(None),
        Err(err) => Err(UpgradeError::file_read(path, err)),
    }
}
