use std::io;
use std::path::PathBuf;

use thiserror::Error;

pub type Result<T> = std::result::Result<T, UpgradeError>;

/// Every way a single orchestration cycle can stop short of saving the manifest.
#[derive(Debug, Error)]
pub enum UpgradeError {
    #[error("failed parsing manifest {}: {source}", path.display())]
    ManifestParse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("manifest has no entries to upgrade")]
    EmptyManifest,

    #[error("invalid manifest file path '{0}': must be relative and stay inside the project root")]
    InvalidFilePath(String),

    #[error("failed reading {}: {source}", path.display())]
    FileRead {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("completion service unavailable: {0}")]
    CompletionUnavailable(String),

    #[error("upgrade cycle cancelled before any file was modified")]
    Cancelled,

    #[error("malformed completion response ({reason}); raw response:\n{raw}")]
    MalformedResponse { reason: String, raw: String },

    #[error("failed writing {}: {source}", path.display())]
    FileWrite {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("manifest {} changed on disk since it was loaded; refusing to overwrite", path.display())]
    ManifestConflict { path: PathBuf },
}

impl UpgradeError {
    pub fn file_read(path: impl Into<PathBuf>, source: io::Error) -> Self {
        Self::FileRead {
            path: path.into(),
            source,
        }
    }

    pub fn file_write(path: impl Into<PathBuf>, source: io::Error) -> Self {
        Self::FileWrite {
            path: path.into(),
            source,
        }
    }

    pub fn malformed(reason: impl Into<String>, raw: &str) -> Self {
        Self::MalformedResponse {
            reason: reason.into(),
            raw: raw.to_string(),
        }
    }

    /// Short stable token used in status lines and logs.
    pub fn reason_code(&self) -> &'static str {
        match self {
            Self::ManifestParse { .. } => "manifest-parse",
            Self::EmptyManifest => "empty-manifest",
            Self::InvalidFilePath(_) => "invalid-file-path",
            Self::FileRead { .. } => "file-read",
            Self::CompletionUnavailable(_) => "completion-unavailable",
            Self::Cancelled => "cancelled",
            Self::MalformedResponse { .. } => "malformed-response",
            Self::FileWrite { .. } => "file-write",
            Self::ManifestConflict { .. } => "manifest-conflict",
        }
    }
}
