use std::io::Read;
use std::path::Path;

use md5::{Digest, Md5};

use crate::TransferError;

/// Computes the MD5 of `data` and returns the hex-encoded digest.
pub fn md5_bytes(data: &[u8]) -> String {
    let mut hasher = Md5::new();
    hasher.update(data);
    hex::encode(hasher.finalize())
}

/// Computes the MD5 of an entire file and returns the hex-encoded digest.
///
/// Blocking; async callers should run it on the blocking pool.
pub fn calculate_file_md5(path: &Path) -> Result<String, TransferError> {
    let mut file = std::fs::File::open(path)?;
    let mut hasher = Md5::new();
    let mut buf = vec![0u8; 64 * 1024];
    loop {
        let n = file.read(&mut buf)?;
        if n == 0 {
            break;
        }
        hasher.update(&buf[..n]);
    }
    Ok(hex::encode(hasher.finalize()))
}
