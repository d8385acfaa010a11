//! HTTP status and control API for the file provisioner.
//!
//! Serves one resource, [`FILE_ROUTE`](fileprov_protocol::constants::FILE_ROUTE):
//!
//! | Request | Effect |
//! |---|---|
//! | `GET /v1/file` | JSON status record |
//! | `POST /v1/file?action=upload&size=N` | multipart upload, field `chunk` |
//! | `POST /v1/file?action=close` | close request |
//!
//! Handlers only translate HTTP to engine calls and engine errors to
//! status codes.

mod handlers;
mod server;

pub use server::{FileServer, ServerConfig};

/// Errors produced by the file server.
#[derive(Debug, thiserror::Error)]
pub enum ServerError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("failed to bind {addr}: {source}")]
    Bind {
        addr: std::net::SocketAddr,
        source: std::io::Error,
    },
}
