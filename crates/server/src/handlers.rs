use std::sync::Arc;

use axum::Json;
use axum::Router;
use axum::body::Body;
use axum::extract::{Query, State};
use axum::http::{HeaderMap, StatusCode, header};
use axum::response::{IntoResponse, Response};
use axum::routing::get;
use fileprov_engine::FileProvisioner;
use fileprov_protocol::FileInfo;
use fileprov_protocol::constants::{ACTION_CLOSE, ACTION_UPLOAD, FILE_ROUTE};
use serde::Deserialize;

type AppState = Arc<FileProvisioner>;

pub(crate) fn router(provisioner: AppState) -> Router {
    Router::new()
        .route(FILE_ROUTE, get(get_file).post(post_file))
        .with_state(provisioner)
}

#[derive(Debug, Deserialize)]
struct FileQuery {
    action: Option<String>,
    size: Option<String>,
}

async fn get_file(State(fp): State<AppState>) -> Json<FileInfo> {
    tracing::debug!("status requested");
    Json(fp.status())
}

async fn post_file(
    State(fp): State<AppState>,
    Query(query): Query<FileQuery>,
    headers: HeaderMap,
    body: Body,
) -> Response {
    match query.action.as_deref() {
        Some(ACTION_UPLOAD) => upload(&fp, query.size.as_deref(), &headers, body).await,
        Some(ACTION_CLOSE) => close(&fp),
        other => {
            let action = other.unwrap_or_default();
            tracing::warn!(action, "unknown action");
            (StatusCode::BAD_REQUEST, format!("unknown action {action:?}")).into_response()
        }
    }
}

async fn upload(fp: &AppState, size: Option<&str>, headers: &HeaderMap, body: Body) -> Response {
    tracing::debug!(?size, "upload requested");

    let boundary = headers
        .get(header::CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .ok_or(multer::Error::NoMultipart)
        .and_then(multer::parse_boundary);
    let boundary = match boundary {
        Ok(b) => b,
        Err(e) => return internal_error(e),
    };

    let multipart = multer::Multipart::new(body.into_data_stream(), boundary);
    match fp.upload(size, multipart).await {
        Ok(()) => StatusCode::OK.into_response(),
        Err(e) => internal_error(e),
    }
}

fn close(fp: &AppState) -> Response {
    match fp.close() {
        Ok(()) => StatusCode::OK.into_response(),
        Err(e) => internal_error(e),
    }
}

fn internal_error(e: impl std::fmt::Display) -> Response {
    let message = e.to_string();
    tracing::error!("request failed: {message}");
    (StatusCode::INTERNAL_SERVER_ERROR, message).into_response()
}
