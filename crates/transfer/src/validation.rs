use std::path::{Component, Path};

use crate::TransferError;

/// Validates that a destination file name is a single plain component.
///
/// Rejects:
/// - Empty names
/// - Absolute paths
/// - Parent directory traversal (`..`) and `.`
/// - Names containing a directory separator
pub fn validate_file_name(name: &str) -> Result<(), TransferError> {
    if name.is_empty() {
        return Err(TransferError::InvalidFileName("empty file name".into()));
    }

    let mut components = Path::new(name).components();
    match (components.next(), components.next()) {
        (Some(Component::Normal(_)), None) => Ok(()),
        (Some(Component::ParentDir), _) => Err(TransferError::InvalidFileName(format!(
            "parent directory traversal not allowed: {name}"
        ))),
        (Some(Component::RootDir | Component::Prefix(_)), _) => Err(
            TransferError::InvalidFileName(format!("absolute path not allowed: {name}")),
        ),
        _ => Err(TransferError::InvalidFileName(format!(
            "file name must not contain directories: {name}"
        ))),
    }
}

/// Parses the declared size of an upload and checks its alignment.
///
/// The size must be a non-negative integer and an exact multiple of
/// `sector`.
pub fn parse_upload_size(raw: Option<&str>, sector: i64) -> Result<i64, TransferError> {
    let raw = raw.unwrap_or_default();
    let size: i64 = raw
        .trim()
        .parse()
        .map_err(|_| TransferError::InvalidSize(raw.to_string()))?;

    if size < 0 {
        return Err(TransferError::InvalidSize(raw.to_string()));
    }

    if size % sector != 0 {
        return Err(TransferError::MisalignedSize { size, sector });
    }

    Ok(size)
}
