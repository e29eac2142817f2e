mod error;
mod manifest;
mod payload;
mod queue;
mod response;

pub use error::{Result, UpgradeError};
pub use manifest::{Manifest, ManifestEntry};
pub use payload::{build_payload, fence_for};
pub use queue::{select_candidate, PendingQueue};
pub use response::{extract_fenced_blocks, parse_response, parse_strict, UpgradeResult};
