use std::path::Path;

use fileprov_protocol::DiskConfig;
use fileprov_protocol::constants::DISK_CONFIG_FILE;

use crate::ProvisionError;

/// Reads the disk identifier from the identity file under `disk_path`.
pub async fn read_disk_uuid(disk_path: &Path) -> Result<String, ProvisionError> {
    let path = disk_path.join(DISK_CONFIG_FILE);
    let raw = tokio::fs::read(&path)
        .await
        .map_err(|source| ProvisionError::DiskConfigRead {
            path: path.clone(),
            source,
        })?;
    let config: DiskConfig = serde_json::from_slice(&raw)
        .map_err(|source| ProvisionError::DiskConfigParse { path, source })?;
    Ok(config.disk_uuid)
}
