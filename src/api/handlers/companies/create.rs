//! Company creation.

use axum::{
    Json,
    extract::{Extension, rejection::JsonRejection},
    http::{HeaderMap, StatusCode},
    response::{IntoResponse, Response},
};
use sqlx::PgPool;
use std::sync::Arc;
use tracing::info;

use super::{
    storage::{NewCompany, create_company as insert_company},
    types::{CreateCompanyRequest, CreateCompanyResponse},
};
use crate::api::{
    error::{ApiError, ErrorResponse},
    handlers::{
        auth::{AuthState, require_auth},
        json_payload, non_blank,
    },
};

#[utoipa::path(
    post,
    path = "/companies",
    request_body = CreateCompanyRequest,
    responses(
        (status = 201, description = "Company created as a draft.", body = CreateCompanyResponse),
        (status = 400, description = "Missing required fields.", body = ErrorResponse),
        (status = 401, description = "Missing or invalid session.", body = ErrorResponse),
        (status = 500, description = "Company could not be stored.", body = ErrorResponse)
    ),
    tag = "companies"
)]
/// Creates a draft company owned by the caller, with its founders.
pub async fn create_company(
    headers: HeaderMap,
    pool: Extension<PgPool>,
    auth_state: Extension<Arc<AuthState>>,
    payload: Result<Json<CreateCompanyRequest>, JsonRejection>,
) -> Response {
    let principal = match require_auth(&headers, &auth_state) {
        Ok(principal) => principal,
        Err(err) => return err.into_response(),
    };
    let request = match json_payload(payload) {
        Ok(request) => request,
        Err(err) => return err.into_response(),
    };

    let company = match required_fields(&request) {
        Ok(company) => company,
        Err(err) => return err.into_response(),
    };
    let founders = normalize_founders(request.founders.as_deref());

    match insert_company(&pool, &principal.user_id, &company, &founders).await {
        Ok(company_id) => {
            info!(company_id = %company_id, founders = founders.len(), "Company created");
            let body = CreateCompanyResponse {
                id: company_id.to_string(),
            };
            (StatusCode::CREATED, Json(body)).into_response()
        }
        Err(err) => ApiError::Store(err).into_response(),
    }
}

fn required_fields(request: &CreateCompanyRequest) -> Result<NewCompany<'_>, ApiError> {
    match (
        non_blank(request.name.as_deref()),
        non_blank(request.incorporator.as_deref()),
        non_blank(request.state.as_deref()),
        non_blank(request.entity_type.as_deref()),
    ) {
        (Some(name), Some(incorporator), Some(state), Some(entity_type)) => Ok(NewCompany {
            name,
            incorporator,
            state,
            entity_type,
        }),
        _ => Err(ApiError::validation("Missing required fields")),
    }
}

/// Trimmed founder names in request order; null and blank entries dropped.
pub(super) fn normalize_founders(founders: Option<&[Option<String>]>) -> Vec<String> {
    founders
        .unwrap_or_default()
        .iter()
        .filter_map(|name| non_blank(name.as_deref()))
        .map(str::to_string)
        .collect()
}
