use std::collections::VecDeque;

use crate::error::{Result, UpgradeError};
use crate::manifest::{Manifest, ManifestEntry};

/// Entries waiting for an upgrade cycle, taken front first.
///
/// The queue owns clones of the entries; ordering and how many items are
/// drained per run are the caller's decision.
#[derive(Debug, Clone, Default)]
pub struct PendingQueue {
    entries: VecDeque<ManifestEntry>,
}

impl PendingQueue {
    pub fn from_manifest(manifest: &Manifest) -> Self {
        Self {
            entries: manifest.entries().iter().cloned().collect(),
        }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn peek(&self) -> Option<&ManifestEntry> {
        self.entries.front()
    }

    pub fn pop_front(&mut self) -> Result<ManifestEntry> {
        self.entries.pop_front().ok_or(UpgradeError::EmptyManifest)
    }
}

/// The next file to upgrade: the manifest's first entry.
pub fn select_candidate(manifest: &Manifest) -> Result<ManifestEntry> {
    PendingQueue::from_manifest(manifest).pop_front()
}
