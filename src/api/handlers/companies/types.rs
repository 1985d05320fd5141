//! Request/response types for company APIs.
//!
//! Field names are camelCase on the wire.

use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

#[derive(Debug, Default, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct CreateCompanyRequest {
    pub name: Option<String>,
    pub incorporator: Option<String>,
    pub state: Option<String>,
    pub entity_type: Option<String>,
    /// Founder names in display order. Null and blank entries are dropped.
    pub founders: Option<Vec<Option<String>>>,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct CreateCompanyResponse {
    pub id: String,
}

#[derive(Debug, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct CompanyResponse {
    pub id: String,
    pub user_id: String,
    pub name: String,
    pub incorporator: String,
    pub state: String,
    pub entity_type: String,
    pub status: String,
    pub created_at: String,
    pub updated_at: String,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct FounderResponse {
    pub id: String,
    pub name: String,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct CompanyDetailResponse {
    #[serde(flatten)]
    pub company: CompanyResponse,
    pub founders: Vec<FounderResponse>,
}
