use std::path::Path;
use std::time::Duration;

use fileprov_protocol::FileInfo;
use fileprov_protocol::constants::{
    ACTION_CLOSE, ACTION_UPLOAD, FILE_ROUTE, QUERY_ACTION, QUERY_SIZE, UPLOAD_FIELD_NAME,
};
use reqwest::multipart::{Form, Part};
use tokio_util::io::ReaderStream;

/// Timeout for the status and close requests. Uploads have none.
const REQUEST_TIMEOUT: Duration = Duration::from_secs(10);

/// File name sent with the upload part.
const UPLOAD_PART_FILE_NAME: &str = "blob";

/// Errors from the provisioner client.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("request failed with status {status}: {body}")]
    Api { status: u16, body: String },

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Client for one provisioner instance.
pub struct FileProvisionerClient {
    http: reqwest::Client,
    url: String,
}

impl FileProvisionerClient {
    /// Creates a client for the instance listening at `remote` (`host:port`).
    pub fn new(remote: &str) -> Result<Self, Error> {
        let http = reqwest::Client::builder().build()?;
        Ok(Self {
            http,
            url: format!("http://{remote}{FILE_ROUTE}"),
        })
    }

    /// Fetches the current status record.
    pub async fn get(&self) -> Result<FileInfo, Error> {
        tracing::debug!(url = %self.url, "get");
        let resp = self
            .http
            .get(&self.url)
            .header(reqwest::header::ACCEPT, "application/json")
            .timeout(REQUEST_TIMEOUT)
            .send()
            .await?;
        let body = check(resp).await?;
        Ok(serde_json::from_slice(&body)?)
    }

    /// Asks the instance to close. Fails if the file is not ready yet.
    pub async fn close(&self) -> Result<(), Error> {
        tracing::debug!(url = %self.url, "close");
        let resp = self
            .http
            .post(&self.url)
            .query(&[(QUERY_ACTION, ACTION_CLOSE)])
            .timeout(REQUEST_TIMEOUT)
            .send()
            .await?;
        check(resp).await?;
        Ok(())
    }

    /// Streams the file at `path` to the instance as its upload.
    pub async fn upload(&self, path: &Path) -> Result<(), Error> {
        let file = tokio::fs::File::open(path).await?;
        let size = file.metadata().await?.len();
        tracing::debug!(url = %self.url, path = %path.display(), size, "upload");

        let body = reqwest::Body::wrap_stream(ReaderStream::new(file));
        let part = Part::stream_with_length(body, size).file_name(UPLOAD_PART_FILE_NAME);
        let form = Form::new().part(UPLOAD_FIELD_NAME, part);

        let size = size.to_string();
        let resp = self
            .http
            .post(&self.url)
            .query(&[(QUERY_ACTION, ACTION_UPLOAD), (QUERY_SIZE, size.as_str())])
            .multipart(form)
            .send()
            .await?;
        check(resp).await?;
        Ok(())
    }
}

/// Returns the body of a 200 response, or the body as an [`Error::Api`].
async fn check(resp: reqwest::Response) -> Result<Vec<u8>, Error> {
    let status = resp.status();
    if status != reqwest::StatusCode::OK {
        let body = resp.text().await.unwrap_or_default();
        return Err(Error::Api {
            status: status.as_u16(),
            body,
        });
    }
    Ok(resp.bytes().await?.to_vec())
}
