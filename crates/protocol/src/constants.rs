use std::time::Duration;

/// Default port of the status/control API.
pub const DEFAULT_PORT: u16 = 8001;

/// Timeout for the source size probe and the idle window of a pull transfer.
pub const HTTP_TIMEOUT: Duration = Duration::from_secs(60);

/// Uploaded files must be a multiple of this many bytes.
///
/// Destination disks are written with direct I/O, which requires
/// sector-aligned lengths.
pub const DEFAULT_SECTOR_SIZE: i64 = 512;

/// Directory (under the disk root) that receives provisioned files.
pub const WORK_DIRECTORY_NAME: &str = "tmp-files";

/// Default disk root inside the container.
pub const DEFAULT_DISK_PATH: &str = "/data/";

/// Identity file stored at the root of every managed disk.
pub const DISK_CONFIG_FILE: &str = "longhorn-disk.cfg";

/// The single resource exposed by the API.
pub const FILE_ROUTE: &str = "/v1/file";

/// Query key selecting the POST action.
pub const QUERY_ACTION: &str = "action";

/// Query key carrying the declared upload size.
pub const QUERY_SIZE: &str = "size";

/// `action=upload`.
pub const ACTION_UPLOAD: &str = "upload";

/// `action=close`.
pub const ACTION_CLOSE: &str = "close";

/// Multipart field that carries the uploaded bytes.
pub const UPLOAD_FIELD_NAME: &str = "chunk";

/// Parameter key holding the source URL of a pull transfer.
pub const PARAMETER_URL: &str = "url";
