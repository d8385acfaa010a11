pub mod constants;
pub mod types;

// Re-export primary types for convenience.
pub use types::{DiskConfig, FileInfo, FileState, SourceType, UNKNOWN_SIZE, UnknownSourceType};
