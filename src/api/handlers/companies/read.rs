//! Company list and detail handlers.

use axum::{
    Json,
    extract::{Extension, Path},
    http::{HeaderMap, StatusCode},
    response::{IntoResponse, Response},
};
use sqlx::PgPool;
use std::sync::Arc;
use uuid::Uuid;

use super::{
    storage::{find_company, list_companies as fetch_companies},
    types::{CompanyDetailResponse, CompanyResponse},
};
use crate::api::{
    error::{ApiError, ErrorResponse},
    handlers::auth::{AuthState, require_auth},
};

#[utoipa::path(
    get,
    path = "/companies",
    responses(
        (
            status = 200,
            description = "The caller's companies, newest first.",
            body = [CompanyResponse]
        ),
        (status = 401, description = "Missing or invalid session.", body = ErrorResponse)
    ),
    tag = "companies"
)]
pub async fn list_companies(
    headers: HeaderMap,
    pool: Extension<PgPool>,
    auth_state: Extension<Arc<AuthState>>,
) -> Response {
    let principal = match require_auth(&headers, &auth_state) {
        Ok(principal) => principal,
        Err(err) => return err.into_response(),
    };

    match fetch_companies(&pool, &principal.user_id).await {
        Ok(companies) => (StatusCode::OK, Json(companies)).into_response(),
        Err(err) => ApiError::Store(err).into_response(),
    }
}

#[utoipa::path(
    get,
    path = "/companies/{id}",
    params(("id" = String, Path, description = "Company id")),
    responses(
        (status = 200, description = "Company detail with founders.", body = CompanyDetailResponse),
        (status = 401, description = "Missing or invalid session.", body = ErrorResponse),
        (status = 404, description = "Company not found.", body = ErrorResponse)
    ),
    tag = "companies"
)]
/// Returns `404` for malformed ids and for companies owned by someone else.
pub async fn get_company(
    Path(id): Path<String>,
    headers: HeaderMap,
    pool: Extension<PgPool>,
    auth_state: Extension<Arc<AuthState>>,
) -> Response {
    let principal = match require_auth(&headers, &auth_state) {
        Ok(principal) => principal,
        Err(err) => return err.into_response(),
    };

    let Ok(company_id) = Uuid::parse_str(id.trim()) else {
        return ApiError::NotFound.into_response();
    };

    match find_company(&pool, &principal.user_id, company_id).await {
        Ok(Some(company)) => (StatusCode::OK, Json(company)).into_response(),
        Ok(None) => ApiError::NotFound.into_response(),
        Err(err) => ApiError::Store(err).into_response(),
    }
}
