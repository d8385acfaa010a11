//! Process orchestration: wires the engine to the server and decides
//! when the process ends.

use std::sync::Arc;

use anyhow::Context;
use fileprov_client::FileProvisionerClient;
use fileprov_engine::{FileProvisioner, ProvisionRequest};
use fileprov_server::FileServer;
use serde::Serialize;
use tokio_util::sync::CancellationToken;

use crate::cli::FileAction;
use crate::config::Config;

/// Runs one provisioning to its end.
///
/// Success keeps the status API up for the linger window (or until a
/// close request) and returns `Ok`. A transfer failure or Ctrl-C cancels
/// everything and returns an error.
pub async fn start(config: Config, request: ProvisionRequest) -> anyhow::Result<()> {
    let scope = CancellationToken::new();

    let (fp, terminal) = FileProvisioner::launch(config.engine_config(), request, scope.clone())
        .await
        .context("failed to start file provisioning")?;

    let server = FileServer::bind(config.server_config(), Arc::clone(&fp)).await?;
    let server_shutdown = scope.child_token();
    let mut server_task = tokio::spawn(server.run(server_shutdown.clone()));

    let outcome = tokio::select! {
        outcome = terminal.recv() => outcome,
        result = &mut server_task => {
            scope.cancel();
            result??;
            anyhow::bail!("server stopped unexpectedly");
        }
        _ = tokio::signal::ctrl_c() => {
            tracing::info!("SIGINT received, shutting down");
            scope.cancel();
            let _ = server_task.await;
            anyhow::bail!("interrupted before the file was provisioned");
        }
    };

    if let Err(e) = outcome {
        tracing::error!("file provisioning failed: {e}");
        scope.cancel();
        let _ = server_task.await;
        return Err(e.into());
    }

    let linger = config.linger();
    tracing::info!(?linger, "file is ready, serving final status");
    tokio::select! {
        _ = tokio::time::sleep(linger) => {}
        _ = fp.closed() => tracing::info!("close requested, shutting down"),
        _ = tokio::signal::ctrl_c() => tracing::info!("SIGINT received, shutting down"),
    }

    server_shutdown.cancel();
    server_task.await??;
    Ok(())
}

/// Runs a `fileprov file` subcommand against a remote instance.
pub async fn file(action: FileAction) -> anyhow::Result<()> {
    match action {
        FileAction::Get { url } => {
            let info = FileProvisionerClient::new(&url)?.get().await?;
            println!("{}", to_json_pretty(&info)?);
        }
        FileAction::Close { url } => FileProvisionerClient::new(&url)?.close().await?,
        FileAction::Upload { url, path } => {
            FileProvisionerClient::new(&url)?
                .upload(&path)
                .await
                .with_context(|| format!("failed to upload {}", path.display()))?;
        }
    }
    Ok(())
}

/// Tab-indented JSON.
fn to_json_pretty<T: Serialize>(value: &T) -> anyhow::Result<String> {
    let mut out = Vec::new();
    let formatter = serde_json::ser::PrettyFormatter::with_indent(b"\t");
    let mut ser = serde_json::Serializer::with_formatter(&mut out, formatter);
    value.serialize(&mut ser)?;
    Ok(String::from_utf8(out)?)
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;
    use std::time::{Duration, Instant};

    use fileprov_protocol::constants::{DISK_CONFIG_FILE, WORK_DIRECTORY_NAME};
    use fileprov_protocol::{FileInfo, FileState, SourceType};

    use super::*;

    fn disk(linger_secs: u64) -> (tempfile::TempDir, Config) {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join(DISK_CONFIG_FILE), r#"{"diskUUID":"app"}"#).unwrap();
        let config = Config {
            listen: "127.0.0.1:0".parse().unwrap(),
            disk_path: dir.path().to_path_buf(),
            linger_secs,
            poll_interval_ms: 20,
            ..Config::default()
        };
        (dir, config)
    }

    #[test]
    fn json_is_tab_indented() {
        let info = FileInfo {
            state: FileState::Ready,
            ..FileInfo::default()
        };
        let out = to_json_pretty(&info).unwrap();
        assert!(out.starts_with("{\n\t\"diskUUID\": \"\""));
        assert!(out.contains("\t\"state\": \"ready\""));
    }

    #[tokio::test]
    async fn failed_pull_returns_error() {
        let (_dir, config) = disk(30);
        let request = ProvisionRequest {
            file_name: "f.img".into(),
            source_type: SourceType::Url,
            parameters: HashMap::new(),
        };

        let err = tokio::time::timeout(Duration::from_secs(5), start(config, request))
            .await
            .unwrap()
            .unwrap_err();
        assert!(err.to_string().contains("no URL"), "{err}");
    }

    #[tokio::test]
    async fn missing_disk_config_is_startup_error() {
        let dir = tempfile::tempdir().unwrap();
        let config = Config {
            listen: "127.0.0.1:0".parse().unwrap(),
            disk_path: dir.path().to_path_buf(),
            ..Config::default()
        };
        let request = ProvisionRequest {
            file_name: "f.img".into(),
            source_type: SourceType::Upload,
            parameters: HashMap::new(),
        };

        let err = start(config, request).await.unwrap_err();
        assert!(err.to_string().contains("failed to start file provisioning"));
    }

    #[tokio::test]
    async fn successful_pull_exits_after_linger() {
        let (dir, config) = disk(0);
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            use tokio::io::{AsyncReadExt, AsyncWriteExt};
            while let Ok((mut stream, _)) = listener.accept().await {
                let mut buf = vec![0u8; 4096];
                let _ = stream.read(&mut buf).await;
                let _ = stream
                    .write_all(b"HTTP/1.1 200 OK\r\nContent-Length: 5\r\nConnection: close\r\n\r\nhello")
                    .await;
                let _ = stream.shutdown().await;
            }
        });

        let request = ProvisionRequest {
            file_name: "f.img".into(),
            source_type: SourceType::Url,
            parameters: HashMap::from([("url".to_string(), format!("http://{addr}/f"))]),
        };

        let started = Instant::now();
        tokio::time::timeout(Duration::from_secs(5), start(config, request))
            .await
            .unwrap()
            .unwrap();
        assert!(started.elapsed() < Duration::from_secs(5));

        let written = std::fs::read(dir.path().join(WORK_DIRECTORY_NAME).join("f.img")).unwrap();
        assert_eq!(written, b"hello");
    }
}
