use axum::{
    Json,
    extract::{
        Path, Query, State,
        rejection::{JsonRejection, QueryRejection},
    },
    http::{HeaderMap, StatusCode},
    response::{IntoResponse, Response},
};
use backfill_control_plane::import_metadata::ListImportsRequest;
use backfill_ingestor_core::{Caller, SubmitBatchRequest};
use backfill_resources::{ImportId, SiteName};
use tracing::warn;

use crate::{
    CALLER_HEADER, HttpIngestorState,
    error::{HttpIngestorError, Result},
    types::{
        CreateImportResponse, DeleteImportResponse, ErrorResponse, ImportResponse,
        ListImportsQuery, ListImportsResponse, SubmitBatchBody, SubmitBatchResponse,
    },
};

/// Handler for `POST /v1/sites/{site}/imports`.
pub async fn create_import_handler(
    State(state): State<HttpIngestorState>,
    Path(site): Path<String>,
    headers: HeaderMap,
) -> Response {
    match process_create_import(&state, &site, &headers).await {
        Ok(response) => (StatusCode::CREATED, Json(response)).into_response(),
        Err(err) => map_error_to_response(err),
    }
}

/// Handler for `GET /v1/sites/{site}/imports`.
pub async fn list_imports_handler(
    State(state): State<HttpIngestorState>,
    Path(site): Path<String>,
    headers: HeaderMap,
    query: std::result::Result<Query<ListImportsQuery>, QueryRejection>,
) -> Response {
    let result = match query {
        Ok(Query(query)) => process_list_imports(&state, &site, &headers, query).await,
        Err(rejection) => Err(HttpIngestorError::BadRequest {
            message: rejection.body_text(),
        }),
    };

    match result {
        Ok(response) => Json(response).into_response(),
        Err(err) => map_error_to_response(err),
    }
}

/// Handler for `GET /v1/sites/{site}/imports/{import}`.
pub async fn get_import_handler(
    State(state): State<HttpIngestorState>,
    Path((site, import_id)): Path<(String, String)>,
    headers: HeaderMap,
) -> Response {
    match process_get_import(&state, &site, &import_id, &headers).await {
        Ok(response) => Json(response).into_response(),
        Err(err) => map_error_to_response(err),
    }
}

/// Handler for `POST /v1/sites/{site}/imports/{import}/events`.
pub async fn submit_batch_handler(
    State(state): State<HttpIngestorState>,
    Path((site, import_id)): Path<(String, String)>,
    headers: HeaderMap,
    body: std::result::Result<Json<SubmitBatchBody>, JsonRejection>,
) -> Response {
    let result = match body {
        Ok(Json(body)) => process_submit_batch(&state, &site, &import_id, &headers, body).await,
        Err(rejection) => Err(map_json_rejection(rejection)),
    };

    match result {
        Ok(response) => Json(response).into_response(),
        Err(err) => map_error_to_response(err),
    }
}

/// Handler for `DELETE /v1/sites/{site}/imports/{import}`.
pub async fn delete_import_handler(
    State(state): State<HttpIngestorState>,
    Path((site, import_id)): Path<(String, String)>,
    headers: HeaderMap,
) -> Response {
    match process_delete_import(&state, &site, &import_id, &headers).await {
        Ok(response) => Json(response).into_response(),
        Err(err) => map_error_to_response(err),
    }
}

fn map_json_rejection(rejection: JsonRejection) -> HttpIngestorError {
    if rejection.status() == StatusCode::PAYLOAD_TOO_LARGE {
        HttpIngestorError::PayloadTooLarge {
            message: rejection.body_text(),
        }
    } else {
        HttpIngestorError::BadRequest {
            message: rejection.body_text(),
        }
    }
}

async fn process_create_import(
    state: &HttpIngestorState,
    site: &str,
    headers: &HeaderMap,
) -> Result<CreateImportResponse> {
    let caller = caller_from_headers(headers)?;
    let site = parse_site(site)?;
    let created = state.service.create_import(&caller, &site).await?;
    Ok(created.into())
}

async fn process_list_imports(
    state: &HttpIngestorState,
    site: &str,
    headers: &HeaderMap,
    query: ListImportsQuery,
) -> Result<ListImportsResponse> {
    let caller = caller_from_headers(headers)?;
    let site = parse_site(site)?;

    let mut request = ListImportsRequest::new(site);
    if let Some(page_size) = query.page_size {
        request = request.with_page_size(page_size);
    }
    if let Some(page_token) = query.page_token {
        request = request.with_page_token(page_token);
    }

    let listed = state.service.list_imports(&caller, request).await?;
    Ok(ListImportsResponse {
        imports: listed.imports.into_iter().map(Into::into).collect(),
        next_page_token: listed.next_page_token,
    })
}

async fn process_get_import(
    state: &HttpIngestorState,
    site: &str,
    import_id: &str,
    headers: &HeaderMap,
) -> Result<ImportResponse> {
    let caller = caller_from_headers(headers)?;
    let site = parse_site(site)?;
    let import_id = parse_import_id(import_id)?;
    let import = state.service.get_import(&caller, &site, import_id).await?;
    Ok(import.into())
}

async fn process_submit_batch(
    state: &HttpIngestorState,
    site: &str,
    import_id: &str,
    headers: &HeaderMap,
    body: SubmitBatchBody,
) -> Result<SubmitBatchResponse> {
    let caller = caller_from_headers(headers)?;
    let site = parse_site(site)?;
    let import_id = parse_import_id(import_id)?;

    let mut request =
        SubmitBatchRequest::new(site, import_id, body.events).with_last_batch(body.is_last_batch);
    if let Some(batch_id) = body.batch_id {
        request = request.with_batch_id(batch_id);
    }

    let outcome = state.service.submit_batch(&caller, request).await?;
    Ok(outcome.into())
}

async fn process_delete_import(
    state: &HttpIngestorState,
    site: &str,
    import_id: &str,
    headers: &HeaderMap,
) -> Result<DeleteImportResponse> {
    let caller = caller_from_headers(headers)?;
    let site = parse_site(site)?;
    let import_id = parse_import_id(import_id)?;
    let deleted = state.service.delete_import(&caller, &site, import_id).await?;

    Ok(DeleteImportResponse {
        message: format!("import {import_id} deleted"),
        deleted_events: deleted.deleted_events,
    })
}

fn caller_from_headers(headers: &HeaderMap) -> Result<Caller> {
    headers
        .get(CALLER_HEADER)
        .and_then(|value| value.to_str().ok())
        .map(str::trim)
        .filter(|value| !value.is_empty())
        .map(Caller::new)
        .ok_or_else(|| HttpIngestorError::Unauthenticated {
            message: format!("the {CALLER_HEADER} header is required"),
        })
}

fn parse_site(site: &str) -> Result<SiteName> {
    SiteName::new(site).map_err(|err| HttpIngestorError::BadRequest {
        message: format!("invalid site: {err}"),
    })
}

fn parse_import_id(import_id: &str) -> Result<ImportId> {
    ImportId::parse(import_id).map_err(|err| HttpIngestorError::BadRequest {
        message: err.to_string(),
    })
}

fn map_error_to_response(error: HttpIngestorError) -> Response {
    let status_code = error.status_code();

    if status_code.is_server_error() {
        warn!(err = %error, "Import request failed");
    }

    let response = Json(ErrorResponse {
        kind: error.kind().to_string(),
        message: error.to_string(),
    });

    (status_code, response).into_response()
}
