use std::path::PathBuf;

use chrono::{DateTime, Utc};
use selfup_completion::{CompletionClient, CompletionRequest};
use selfup_core::{
    build_payload, parse_response, ManifestEntry, PendingQueue, Result, UpgradeError,
    UpgradeResult,
};
use selfup_store::{
    read_target, replace_target, write_backup, LoadedManifest, ManifestLoadPolicy, ManifestStore,
    ProjectLayout,
};
use thiserror::Error;
use tracing::{debug, info, warn};

use crate::cancel::CancellationFlag;
use crate::stage::CycleStage;

/// A failed cycle: the last stage it reached and why it stopped.
#[derive(Debug, Error)]
#[error("upgrade cycle failed after stage {stage}")]
pub struct CycleError {
    pub stage: CycleStage,
    #[source]
    pub error: UpgradeError,
}

/// Outcome of the side-effecting tail of a cycle.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AppliedUpgrade {
    pub backup_path: PathBuf,
    pub target_path: PathBuf,
    pub entry: ManifestEntry,
    pub replaced_entry: bool,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CycleReport {
    pub file_path: String,
    pub backup_path: PathBuf,
    pub target_path: PathBuf,
    pub summary: String,
    pub next_steps: Vec<String>,
    pub updated_at: DateTime<Utc>,
    pub replaced_entry: bool,
    pub remaining: usize,
}

/// Runs upgrade cycles for one project against one completion client.
#[derive(Debug)]
pub struct Orchestrator<C> {
    layout: ProjectLayout,
    store: ManifestStore,
    client: C,
}

struct StageTracker {
    stage: CycleStage,
}

impl StageTracker {
    fn new(stage: CycleStage) -> Self {
        Self { stage }
    }

    fn advance(&mut self, next: CycleStage) {
        debug!(from = %self.stage, to = %next, "cycle stage");
        self.stage = next;
    }

    fn check_cancelled(&self, cancel: &CancellationFlag) -> Result<()> {
        if self.stage.is_cancellable() && cancel.is_cancelled() {
            return Err(UpgradeError::Cancelled);
        }
        Ok(())
    }
}

impl<C: CompletionClient> Orchestrator<C> {
    pub fn new(layout: ProjectLayout, policy: ManifestLoadPolicy, client: C) -> Self {
        let store = ManifestStore::for_layout(&layout, policy);
        Self {
            layout,
            store,
            client,
        }
    }

    pub fn layout(&self) -> &ProjectLayout {
        &self.layout
    }

    pub fn store(&self) -> &ManifestStore {
        &self.store
    }

    /// Upgrades the first pending manifest entry, end to end.
    pub fn run_cycle(
        &self,
        cancel: &CancellationFlag,
    ) -> std::result::Result<CycleReport, CycleError> {
        let mut tracker = StageTracker::new(CycleStage::Idle);
        match self.drive(&mut tracker, cancel) {
            Ok(report) => {
                info!(
                    file = %report.file_path,
                    backup = %report.backup_path.display(),
                    "upgrade cycle complete"
                );
                Ok(report)
            }
            Err(error) => {
                warn!(
                    stage = %tracker.stage,
                    reason = error.reason_code(),
                    "upgrade cycle failed"
                );
                Err(CycleError {
                    stage: tracker.stage,
                    error,
                })
            }
        }
    }

    pub fn invoke_completion(&self, payload: &str) -> Result<String> {
        let raw = self.client.complete(&CompletionRequest::upgrade(payload))?;
        if raw.trim().is_empty() {
            return Err(UpgradeError::CompletionUnavailable(
                "completion returned no content".to_string(),
            ));
        }
        Ok(raw)
    }

    /// Backs up `file_content`, overwrites the target with the upgraded code and
    /// records the outcome in the manifest, in that order.
    ///
    /// A failure after the backup leaves the backup on disk. The manifest is
    /// only touched once the target file has been written.
    pub fn apply_upgrade(
        &self,
        loaded: &mut LoadedManifest,
        entry: &ManifestEntry,
        file_content: &str,
        result: &UpgradeResult,
    ) -> Result<AppliedUpgrade> {
        let mut tracker = StageTracker::new(CycleStage::ResponseParsed);
        self.apply_tracked(&mut tracker, loaded, entry, file_content, result)
    }

    fn drive(&self, tracker: &mut StageTracker, cancel: &CancellationFlag) -> Result<CycleReport> {
        tracker.check_cancelled(cancel)?;
        let mut loaded = self.store.load()?;
        tracker.advance(CycleStage::ManifestLoaded);
        tracker.check_cancelled(cancel)?;

        let mut queue = PendingQueue::from_manifest(loaded.manifest());
        let entry = queue.pop_front()?;
        let relative = entry.relative_path()?;
        let file_content = read_target(&self.layout, relative)?;
        let payload = build_payload(&entry, &file_content);
        tracker.advance(CycleStage::PayloadBuilt);
        tracker.check_cancelled(cancel)?;

        let raw = self.invoke_completion(&payload)?;
        tracker.advance(CycleStage::ResponseReceived);
        tracker.check_cancelled(cancel)?;

        let result = parse_response(&raw)?;
        tracker.advance(CycleStage::ResponseParsed);
        tracker.check_cancelled(cancel)?;

        let applied = self.apply_tracked(tracker, &mut loaded, &entry, &file_content, &result)?;
        let updated_at = applied.entry.updated_at.unwrap_or_else(Utc::now);

        Ok(CycleReport {
            file_path: applied.entry.file_path,
            backup_path: applied.backup_path,
            target_path: applied.target_path,
            summary: applied.entry.summary,
            next_steps: applied.entry.next_steps,
            updated_at,
            replaced_entry: applied.replaced_entry,
            remaining: queue.len(),
        })
    }

    fn apply_tracked(
        &self,
        tracker: &mut StageTracker,
        loaded: &mut LoadedManifest,
        entry: &ManifestEntry,
        file_content: &str,
        result: &UpgradeResult,
    ) -> Result<AppliedUpgrade> {
        let relative = entry.relative_path()?;

        let backup_dir = self
            .layout
            .ensure_backup_dir(relative)
            .map_err(|err| UpgradeError::file_write(self.layout.backup_dir(), err))?;
        debug!(dir = %backup_dir.display(), "backup directory ready");
        let backup_path = write_backup(&self.layout, relative, file_content)?;
        tracker.advance(CycleStage::BackedUp);

        let target_path = replace_target(&self.layout, relative, &result.updated_code)?;
        tracker.advance(CycleStage::FileWritten);

        let updated = ManifestEntry::new(
            entry.file_path.clone(),
            result.summary.clone(),
            result.next_steps.clone(),
            Utc::now(),
        );
        let replaced_entry = loaded.upsert(updated.clone());
        self.store.save(loaded)?;
        tracker.advance(CycleStage::ManifestSaved);

        Ok(AppliedUpgrade {
            backup_path,
            target_path,
            entry: updated,
            replaced_entry,
        })
    }
}
