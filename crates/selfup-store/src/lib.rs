mod backup;
mod digest;
mod fs_utils;
mod layout;
mod manifest_store;

pub use backup::{read_target, replace_target, write_backup};
pub use digest::sha256_hex;
pub use fs_utils::write_atomic;
pub use layout::{default_project_root, ProjectLayout};
pub use manifest_store::{LoadedManifest, ManifestLoadPolicy, ManifestStore};
