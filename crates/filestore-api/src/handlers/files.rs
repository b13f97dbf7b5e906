use crate::error::FileError;
use crate::handlers::range::parse_range;
use crate::state::AppState;
use axum::{
    body::Body,
    extract::{Path, Query, State},
    http::{header, HeaderMap, Method, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use filestore_core::{ConversionOptions, ConversionStyle};
use filestore_convert::ConvertError;
use futures::StreamExt;
use serde::Deserialize;
use std::str::FromStr;
use std::sync::Arc;
use tokio_util::io::StreamReader;

#[derive(Debug, Deserialize, Default)]
pub struct GetFileParams {
    pub format: Option<String>,
    pub style: Option<String>,
    #[serde(rename = "cacheWarm")]
    pub cache_warm: Option<bool>,
}

#[derive(Debug, Deserialize)]
pub struct CopyRequest {
    pub source: CopySource,
}

#[derive(Debug, Deserialize)]
pub struct CopySource {
    pub project_id: String,
    pub file_id: String,
}

fn conversion_options(
    params: &GetFileParams,
    range: Option<(u64, u64)>,
) -> Result<ConversionOptions, FileError> {
    let style = match &params.style {
        Some(style) => Some(
            ConversionStyle::from_str(style)
                .map_err(|_| ConvertError::InvalidFormat(style.clone()))?,
        ),
        None => None,
    };

    Ok(ConversionOptions {
        format: params.format.clone(),
        style,
        start: range.map(|(start, _)| start),
        end: range.map(|(_, end)| end),
    })
}

/// GET (and HEAD) for an object, optionally as a derived representation.
///
/// `?cacheWarm=true` primes the converted cache and returns an empty 200
/// once the derived asset is in place.
pub async fn get_file(
    State(state): State<Arc<AppState>>,
    Path((bucket, key)): Path<(String, String)>,
    Query(params): Query<GetFileParams>,
    method: Method,
    headers: HeaderMap,
) -> Result<Response, FileError> {
    if method == Method::HEAD {
        let size = state.handler.get_file_size(&bucket, &key).await?;
        return Ok((StatusCode::OK, [(header::CONTENT_LENGTH, size.to_string())]).into_response());
    }

    let options = conversion_options(&params, parse_range(&headers))?;
    let stream = state.handler.get_file(&bucket, &key, &options).await?;

    if params.cache_warm == Some(true) {
        // Conversion and cache write completed inside get_file; the body
        // itself is not wanted.
        drop(stream);
        return Ok(StatusCode::OK.into_response());
    }

    let body = Body::from_stream(stream.map(|result| result.map_err(std::io::Error::other)));
    Ok((
        StatusCode::OK,
        [(header::CONTENT_TYPE, "application/octet-stream")],
        body,
    )
        .into_response())
}

/// POST an object; the request body is streamed straight into the backend.
pub async fn insert_file(
    State(state): State<Arc<AppState>>,
    Path((bucket, key)): Path<(String, String)>,
    body: Body,
) -> Result<StatusCode, FileError> {
    let stream = body
        .into_data_stream()
        .map(|result| result.map_err(std::io::Error::other));
    let reader = Box::pin(StreamReader::new(stream));

    state.handler.insert_file(&bucket, &key, reader).await?;
    Ok(StatusCode::OK)
}

/// Server-side copy; the source object is named in the JSON body.
pub async fn copy_file(
    State(state): State<Arc<AppState>>,
    Path((bucket, key)): Path<(String, String)>,
    Json(request): Json<CopyRequest>,
) -> Result<StatusCode, FileError> {
    let from_key = format!("{}/{}", request.source.project_id, request.source.file_id);

    state.handler.copy_file(&bucket, &from_key, &key).await?;
    Ok(StatusCode::OK)
}

pub async fn delete_file(
    State(state): State<Arc<AppState>>,
    Path((bucket, key)): Path<(String, String)>,
) -> Result<StatusCode, FileError> {
    state.handler.delete_file(&bucket, &key).await?;
    Ok(StatusCode::NO_CONTENT)
}

/// Total size of every object under a key prefix.
pub async fn directory_size(
    State(state): State<Arc<AppState>>,
    Path((bucket, prefix)): Path<(String, String)>,
) -> Result<Json<serde_json::Value>, FileError> {
    let total = state.handler.get_directory_size(&bucket, &prefix).await?;
    Ok(Json(serde_json::json!({ "total bytes": total })))
}

pub async fn status() -> &'static str {
    "filestore is up"
}
