//! Remote client for a running file provisioner.
//!
//! Issues the three API operations (status, upload, close) against an
//! instance reachable at `host:port`.

mod client;

pub use client::{Error, FileProvisionerClient};
