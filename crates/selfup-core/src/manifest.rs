use std::path::{Component, Path};

use chrono::{DateTime, NaiveDate, NaiveDateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use tracing::warn;

use crate::error::{Result, UpgradeError};

/// Upgrade history for one tracked file, keyed by `file_path`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ManifestEntry {
    #[serde(alias = "file_path")]
    pub file_path: String,
    #[serde(default)]
    pub summary: String,
    #[serde(default, alias = "next_steps", deserialize_with = "one_or_many")]
    pub next_steps: Vec<String>,
    /// `null` until the entry has been through a cycle.
    #[serde(default, alias = "updated_at", deserialize_with = "lenient_timestamp")]
    pub updated_at: Option<DateTime<Utc>>,
}

impl ManifestEntry {
    pub fn new(
        file_path: impl Into<String>,
        summary: impl Into<String>,
        next_steps: Vec<String>,
        updated_at: DateTime<Utc>,
    ) -> Self {
        Self {
            file_path: file_path.into(),
            summary: summary.into(),
            next_steps,
            updated_at: Some(updated_at),
        }
    }

    /// The entry's path, checked to be relative and free of `..` so it cannot
    /// address anything outside the project root.
    pub fn relative_path(&self) -> Result<&Path> {
        let trimmed = self.file_path.trim();
        if trimmed.is_empty() || trimmed != self.file_path {
            return Err(UpgradeError::InvalidFilePath(self.file_path.clone()));
        }

        let path = Path::new(trimmed);
        let mut normal_components = 0_usize;
        for component in path.components() {
            match component {
                Component::Normal(_) => normal_components += 1,
                Component::CurDir => {}
                Component::ParentDir | Component::RootDir | Component::Prefix(_) => {
                    return Err(UpgradeError::InvalidFilePath(self.file_path.clone()));
                }
            }
        }
        if normal_components == 0 {
            return Err(UpgradeError::InvalidFilePath(self.file_path.clone()));
        }

        Ok(path)
    }
}

/// Ordered list of entries with at most one entry per `file_path`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(from = "Vec<ManifestEntry>")]
pub struct Manifest {
    entries: Vec<ManifestEntry>,
}

impl Manifest {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn entries(&self) -> &[ManifestEntry] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn get(&self, file_path: &str) -> Option<&ManifestEntry> {
        self.entries
            .iter()
            .find(|entry| entry.file_path == file_path)
    }

    /// Replaces the entry with the same `file_path` in place, or appends.
    /// Returns `true` when an existing entry was replaced.
    pub fn upsert(&mut self, entry: ManifestEntry) -> bool {
        match self
            .entries
            .iter_mut()
            .find(|existing| existing.file_path == entry.file_path)
        {
            Some(existing) => {
                *existing = entry;
                true
            }
            None => {
                self.entries.push(entry);
                false
            }
        }
    }
}

impl From<Vec<ManifestEntry>> for Manifest {
    /// Later duplicates of a key win, keeping the position of the first.
    fn from(entries: Vec<ManifestEntry>) -> Self {
        let mut manifest = Self::new();
        for entry in entries {
            manifest.upsert(entry);
        }
        manifest
    }
}

impl Serialize for Manifest {
    fn serialize<S>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        self.entries.serialize(serializer)
    }
}

impl IntoIterator for Manifest {
    type Item = ManifestEntry;
    type IntoIter = std::vec::IntoIter<ManifestEntry>;

    fn into_iter(self) -> Self::IntoIter {
        self.entries.into_iter()
    }
}

#[derive(Deserialize)]
#[serde(untagged)]
enum OneOrMany {
    One(String),
    Many(Vec<String>),
}

pub(crate) fn one_or_many<'de, D>(deserializer: D) -> std::result::Result<Vec<String>, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(match OneOrMany::deserialize(deserializer)? {
        OneOrMany::One(step) => vec![step],
        OneOrMany::Many(steps) => steps,
    })
}

const NAIVE_DATE_TIME_FORMATS: &[&str] = &[
    "%Y-%m-%dT%H:%M:%S%.f",
    "%Y-%m-%d %H:%M:%S%.f",
    "%Y-%m-%dT%H:%M",
    "%Y%m%dT%H%M%SZ",
    "%Y%m%dT%H%M%S",
];

const DATE_FORMATS: &[&str] = &["%Y-%m-%d", "%Y%m%d"];

/// Accepts RFC 3339 and the common ISO-8601 variants without an offset
/// (read as UTC). Anything else is dropped with a warning so one odd stamp
/// never invalidates the whole manifest.
fn lenient_timestamp<'de, D>(
    deserializer: D,
) -> std::result::Result<Option<DateTime<Utc>>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Option::<serde_json::Value>::deserialize(deserializer)?;
    Ok(match value {
        None | Some(serde_json::Value::Null) => None,
        Some(serde_json::Value::String(raw)) => {
            let parsed = parse_timestamp(&raw);
            if parsed.is_none() {
                warn!(value = %raw, "ignoring unrecognized updatedAt timestamp");
            }
            parsed
        }
        Some(other) => {
            warn!(value = %other, "ignoring non-string updatedAt value");
            None
        }
    })
}

fn parse_timestamp(raw: &str) -> Option<DateTime<Utc>> {
    let raw = raw.trim();
    if let Ok(parsed) = DateTime::parse_from_rfc3339(raw) {
        return Some(parsed.with_timezone(&Utc));
    }
    for format in NAIVE_DATE_TIME_FORMATS {
        if let Ok(parsed) = NaiveDateTime::parse_from_str(raw, format) {
            return Some(parsed.and_utc());
        }
    }
    for format in DATE_FORMATS {
        if let Ok(date) = NaiveDate::parse_from_str(raw, format) {
            return date.and_hms_opt(0, 0, 0).map(|parsed| parsed.and_utc());
        }
    }
    None
}
