use std::net::SocketAddr;
use std::sync::Arc;

use fileprov_engine::FileProvisioner;
use fileprov_protocol::constants::DEFAULT_PORT;
use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;

use crate::ServerError;
use crate::handlers;

/// Server configuration.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Address to listen on (port 0 = OS-assigned).
    pub listen: SocketAddr,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            listen: ([0, 0, 0, 0], DEFAULT_PORT).into(),
        }
    }
}

/// The status/control server for one provisioner.
pub struct FileServer {
    listener: TcpListener,
    local_addr: SocketAddr,
    provisioner: Arc<FileProvisioner>,
}

impl FileServer {
    /// Binds the listening socket. Nothing is served until [`run`](Self::run).
    pub async fn bind(
        config: ServerConfig,
        provisioner: Arc<FileProvisioner>,
    ) -> Result<Self, ServerError> {
        let listener = TcpListener::bind(config.listen)
            .await
            .map_err(|source| ServerError::Bind {
                addr: config.listen,
                source,
            })?;
        let local_addr = listener.local_addr()?;

        Ok(Self {
            listener,
            local_addr,
            provisioner,
        })
    }

    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    /// Serves requests until `shutdown` is cancelled, then drains in-flight
    /// requests and returns.
    pub async fn run(self, shutdown: CancellationToken) -> Result<(), ServerError> {
        let app = handlers::router(self.provisioner);
        tracing::info!("file server listening on {}", self.local_addr);

        axum::serve(self.listener, app)
            .with_graceful_shutdown(async move {
                shutdown.cancelled().await;
                tracing::info!("server shutting down");
            })
            .await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;
    use std::time::Duration;

    use fileprov_engine::{EngineConfig, ProvisionRequest, TerminalReceiver};
    use fileprov_protocol::constants::{DISK_CONFIG_FILE, FILE_ROUTE};
    use fileprov_protocol::{FileInfo, FileState, SourceType};
    use reqwest::StatusCode;
    use reqwest::multipart::{Form, Part};
    use tempfile::TempDir;

    use super::*;

    struct Harness {
        _dir: TempDir,
        base: String,
        fp: Arc<FileProvisioner>,
        terminal: Option<TerminalReceiver>,
        shutdown: CancellationToken,
        handle: tokio::task::JoinHandle<Result<(), ServerError>>,
    }

    async fn start(source_type: SourceType) -> Harness {
        let dir = TempDir::new().unwrap();
        std::fs::write(dir.path().join(DISK_CONFIG_FILE), r#"{"diskUUID":"disk-7"}"#).unwrap();

        let config = EngineConfig {
            disk_path: dir.path().to_path_buf(),
            poll_interval: Duration::from_millis(20),
            ..EngineConfig::default()
        };
        let request = ProvisionRequest {
            file_name: "image.raw".into(),
            source_type,
            parameters: HashMap::new(),
        };
        let (fp, terminal) = FileProvisioner::launch(config, request, CancellationToken::new())
            .await
            .unwrap();

        let server = FileServer::bind(
            ServerConfig {
                listen: ([127, 0, 0, 1], 0).into(),
            },
            Arc::clone(&fp),
        )
        .await
        .unwrap();
        let base = format!("http://{}{FILE_ROUTE}", server.local_addr());

        let shutdown = CancellationToken::new();
        let handle = tokio::spawn(server.run(shutdown.clone()));

        Harness {
            _dir: dir,
            base,
            fp,
            terminal: Some(terminal),
            shutdown,
            handle,
        }
    }

    fn chunk_form(data: Vec<u8>) -> Form {
        Form::new().part("chunk", Part::bytes(data).file_name("blob"))
    }

    #[tokio::test]
    async fn get_returns_status_json() {
        let h = start(SourceType::Upload).await;

        let resp = reqwest::get(&h.base).await.unwrap();
        assert_eq!(resp.status(), StatusCode::OK);
        assert_eq!(
            resp.headers()["content-type"].to_str().unwrap(),
            "application/json"
        );
        let raw: serde_json::Value = resp.json().await.unwrap();
        let obj = raw.as_object().unwrap();
        for key in [
            "diskUUID",
            "sourceType",
            "parameters",
            "fileName",
            "filePath",
            "state",
            "size",
            "progress",
            "processedSize",
            "md5Checksum",
        ] {
            assert!(obj.contains_key(key), "missing {key}");
        }
        assert_eq!(raw["diskUUID"], "disk-7");
        assert_eq!(raw["state"], "starting");
        assert_eq!(raw["size"], -1);
    }

    #[tokio::test]
    async fn unknown_action_is_bad_request() {
        let h = start(SourceType::Upload).await;
        let client = reqwest::Client::new();

        let resp = client
            .post(format!("{}?action=explode", h.base))
            .send()
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::BAD_REQUEST);

        let resp = client.post(&h.base).send().await.unwrap();
        assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn upload_then_close() {
        let mut h = start(SourceType::Upload).await;
        let client = reqwest::Client::new();
        let data: Vec<u8> = (0..1024u32).map(|i| (i % 256) as u8).collect();

        let resp = client
            .post(format!("{}?action=upload&size=1024", h.base))
            .multipart(chunk_form(data))
            .send()
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::OK);
        assert!(resp.text().await.unwrap().is_empty());

        let info: FileInfo = client.get(&h.base).send().await.unwrap().json().await.unwrap();
        assert_eq!(info.state, FileState::Ready);
        assert_eq!(info.processed_size, 1024);

        let resp = client
            .post(format!("{}?action=close", h.base))
            .send()
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::OK);
        assert!(h.terminal.take().unwrap().recv().await.is_ok());

        h.shutdown.cancel();
        h.handle.await.unwrap().unwrap();
    }

    #[tokio::test]
    async fn upload_larger_than_default_body_limit() {
        let h = start(SourceType::Upload).await;
        const SIZE: usize = 4 * 1024 * 1024;
        let data: Vec<u8> = (0..SIZE).map(|i| (i % 253) as u8).collect();

        let resp = reqwest::Client::new()
            .post(format!("{}?action=upload&size={SIZE}", h.base))
            .multipart(chunk_form(data))
            .send()
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::OK);

        let info = h.fp.status();
        assert_eq!(info.state, FileState::Ready);
        assert_eq!(info.processed_size, SIZE as i64);
    }

    #[tokio::test]
    async fn misaligned_upload_is_server_error() {
        let h = start(SourceType::Upload).await;
        let client = reqwest::Client::new();

        let resp = client
            .post(format!("{}?action=upload&size=1000", h.base))
            .multipart(chunk_form(vec![0u8; 1000]))
            .send()
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::INTERNAL_SERVER_ERROR);
        assert!(resp.text().await.unwrap().contains("multiple of 512"));
        assert_eq!(h.fp.status().state, FileState::Starting);
    }

    #[tokio::test]
    async fn upload_without_multipart_body_is_server_error() {
        let h = start(SourceType::Upload).await;
        let resp = reqwest::Client::new()
            .post(format!("{}?action=upload&size=512", h.base))
            .body(vec![0u8; 512])
            .send()
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(h.fp.status().state, FileState::Starting);
    }

    #[tokio::test]
    async fn premature_close_is_server_error_and_terminal_failure() {
        let mut h = start(SourceType::Upload).await;

        let resp = reqwest::Client::new()
            .post(format!("{}?action=close", h.base))
            .send()
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::INTERNAL_SERVER_ERROR);
        assert!(resp.text().await.unwrap().contains("still in progress"));

        assert!(h.terminal.take().unwrap().recv().await.is_err());
    }

    #[tokio::test]
    async fn shutdown_stops_server() {
        let h = start(SourceType::Upload).await;
        h.shutdown.cancel();
        tokio::time::timeout(Duration::from_secs(5), h.handle)
            .await
            .unwrap()
            .unwrap()
            .unwrap();

        assert!(reqwest::get(&h.base).await.is_err());
    }
}
