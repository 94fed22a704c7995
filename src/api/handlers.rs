use std::sync::Arc;

use axum::{
    body::Bytes,
    extract::{rejection::QueryRejection, FromRequest, Multipart, Query, Request, State},
    http::{header::CONTENT_TYPE, StatusCode},
    response::IntoResponse,
    Extension, Json,
};
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::services::{ApiDeployer, ApiSummary, DeployOptions};

use super::auth::AdminUser;
use super::error::ApiError;

const BUNDLE_FIELD: &str = "file";

#[derive(Clone)]
pub struct AdminState {
    pub deployer: Arc<ApiDeployer>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UploadParams {
    #[serde(default)]
    pub overwrite: bool,
    #[serde(default)]
    pub preserve_provider: bool,
}

#[derive(Debug, Default, Deserialize)]
pub struct ListParams {
    pub query: Option<String>,
    pub limit: Option<usize>,
}

#[derive(Debug, Default, Deserialize)]
pub struct DeleteParams {
    pub name: Option<String>,
    pub version: Option<String>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct HealthResponse {
    pub status: String,
    pub version: String,
}

pub async fn health_handler() -> Json<HealthResponse> {
    Json(HealthResponse { status: "ok".to_string(), version: crate::VERSION.to_string() })
}

pub async fn upload_apis_handler(
    State(state): State<AdminState>,
    Extension(user): Extension<AdminUser>,
    params: Result<Query<UploadParams>, QueryRejection>,
    request: Request,
) -> Result<impl IntoResponse, ApiError> {
    let Query(params) = params.map_err(|e| ApiError::bad_request(e.body_text()))?;
    let archive = read_bundle(request).await?;

    info!(
        user = %user.0,
        bytes = archive.len(),
        overwrite = params.overwrite,
        preserve_provider = params.preserve_provider,
        "Received API bundle"
    );

    let options =
        DeployOptions { overwrite: params.overwrite, preserve_provider: params.preserve_provider };
    let report = state.deployer.deploy_bundle(&archive, options, &user.0).await?;

    let status = if report.deployed.is_empty() { StatusCode::OK } else { StatusCode::CREATED };
    Ok((status, Json(report)))
}

pub async fn list_apis_handler(
    State(state): State<AdminState>,
    params: Result<Query<ListParams>, QueryRejection>,
) -> Result<Json<Vec<ApiSummary>>, ApiError> {
    let Query(params) = params.map_err(|e| ApiError::bad_request(e.body_text()))?;
    let apis = state.deployer.list_apis(params.query.as_deref(), params.limit).await;
    Ok(Json(apis))
}

pub async fn delete_api_handler(
    State(state): State<AdminState>,
    Extension(user): Extension<AdminUser>,
    params: Result<Query<DeleteParams>, QueryRejection>,
) -> Result<StatusCode, ApiError> {
    let Query(params) = params.map_err(|e| ApiError::bad_request(e.body_text()))?;
    let (Some(name), Some(version)) = (params.name, params.version) else {
        return Err(ApiError::bad_request("query parameters 'name' and 'version' are required"));
    };

    info!(user = %user.0, api = %name, version = %version, "Deleting API");
    state.deployer.delete_api(&name, &version).await?;

    Ok(StatusCode::NO_CONTENT)
}

async fn read_bundle(request: Request) -> Result<Bytes, ApiError> {
    let is_multipart = request
        .headers()
        .get(CONTENT_TYPE)
        .and_then(|value| value.to_str().ok())
        .and_then(|value| value.parse::<mime::Mime>().ok())
        .map(|mime| mime.type_() == mime::MULTIPART && mime.subtype() == mime::FORM_DATA)
        .unwrap_or(false);

    let archive = if is_multipart {
        let mut multipart = Multipart::from_request(request, &())
            .await
            .map_err(|e| ApiError::bad_request(e.body_text()))?;

        let mut archive = None;
        while let Some(field) = multipart.next_field().await.map_err(multipart_error)? {
            if field.name() == Some(BUNDLE_FIELD) {
                archive = Some(field.bytes().await.map_err(multipart_error)?);
                break;
            }
        }

        archive.ok_or_else(|| {
            ApiError::bad_request(format!("multipart body has no '{}' field", BUNDLE_FIELD))
        })?
    } else {
        Bytes::from_request(request, &()).await.map_err(|e| {
            if e.status() == StatusCode::PAYLOAD_TOO_LARGE {
                ApiError::PayloadTooLarge(e.body_text())
            } else {
                ApiError::bad_request(e.body_text())
            }
        })?
    };

    if archive.is_empty() {
        return Err(ApiError::bad_request("request body is empty"));
    }

    Ok(archive)
}

fn multipart_error(err: axum::extract::multipart::MultipartError) -> ApiError {
    if err.status() == StatusCode::PAYLOAD_TOO_LARGE {
        ApiError::PayloadTooLarge(err.body_text())
    } else {
        ApiError::bad_request(err.body_text())
    }
}
