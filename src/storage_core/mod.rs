//! Tiered match storage: hot (appending), warm (closed), cold (gzip archive)

pub mod archive;
pub mod error;
pub mod layout;
pub mod rotator;

pub use archive::{archive_warm_to_cold, read_cold_lines, restore_cold_to_warm, RestoreReport};
pub use error::StorageError;
pub use layout::{StorageLayout, StorageTier};
pub use rotator::{StorageRotator, StorageStats};
