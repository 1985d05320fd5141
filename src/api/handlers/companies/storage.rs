//! SQL storage helpers for companies and founders.
//!
//! Reads are always scoped by owner. A company that exists but belongs to
//! someone else is indistinguishable from one that does not exist.

use sqlx::{PgPool, Postgres, Row, Transaction, postgres::PgRow};
use tracing::{Instrument, info_span, warn};
use uuid::Uuid;

use super::{
    STATUS_DRAFT,
    types::{CompanyDetailResponse, CompanyResponse, FounderResponse},
};

const COMPANY_COLUMNS: &str = r#"
    id::text AS id,
    user_id,
    name,
    incorporator,
    state,
    entity_type,
    status,
    to_char(created_at AT TIME ZONE 'utc', 'YYYY-MM-DD"T"HH24:MI:SS"Z"') AS created_at,
    to_char(updated_at AT TIME ZONE 'utc', 'YYYY-MM-DD"T"HH24:MI:SS"Z"') AS updated_at
"#;

/// Validated fields of a company about to be created.
#[derive(Debug)]
pub(super) struct NewCompany<'a> {
    pub(super) name: &'a str,
    pub(super) incorporator: &'a str,
    pub(super) state: &'a str,
    pub(super) entity_type: &'a str,
}

fn company_from_row(row: &PgRow) -> CompanyResponse {
    CompanyResponse {
        id: row.get("id"),
        user_id: row.get("user_id"),
        name: row.get("name"),
        incorporator: row.get("incorporator"),
        state: row.get("state"),
        entity_type: row.get("entity_type"),
        status: row.get("status"),
        created_at: row.get("created_at"),
        updated_at: row.get("updated_at"),
    }
}

/// Insert a draft company and its founders in one transaction.
///
/// Either every row is written or none is.
pub(super) async fn create_company(
    pool: &PgPool,
    user_id: &str,
    company: &NewCompany<'_>,
    founders: &[String],
) -> Result<Uuid, sqlx::Error> {
    let mut tx = pool.begin().await?;
    match insert_company_rows(&mut tx, user_id, company, founders).await {
        Ok(company_id) => {
            tx.commit().await?;
            Ok(company_id)
        }
        Err(err) => {
            if let Err(rollback_err) = tx.rollback().await {
                warn!("Rollback after failed company insert also failed: {rollback_err}");
            }
            Err(err)
        }
    }
}

async fn insert_company_rows(
    tx: &mut Transaction<'_, Postgres>,
    user_id: &str,
    company: &NewCompany<'_>,
    founders: &[String],
) -> Result<Uuid, sqlx::Error> {
    // v7 ids sort by creation time, which keeps "newest first" stable.
    let company_id = Uuid::now_v7();
    let query = r"
        INSERT INTO companies (id, user_id, name, incorporator, state, entity_type, status)
        VALUES ($1, $2, $3, $4, $5, $6, $7)
    ";
    let span = info_span!(
        "db.query",
        db.system = "postgresql",
        db.operation = "INSERT",
        db.statement = query
    );
    sqlx::query(query)
        .bind(company_id)
        .bind(user_id)
        .bind(company.name)
        .bind(company.incorporator)
        .bind(company.state)
        .bind(company.entity_type)
        .bind(STATUS_DRAFT)
        .execute(&mut **tx)
        .instrument(span)
        .await?;

    let query = r"
        INSERT INTO founders (id, company_id, name, position)
        VALUES ($1, $2, $3, $4)
    ";
    for (position, name) in (0_i32..).zip(founders) {
        let span = info_span!(
            "db.query",
            db.system = "postgresql",
            db.operation = "INSERT",
            db.statement = query
        );
        sqlx::query(query)
            .bind(Uuid::new_v4())
            .bind(company_id)
            .bind(name)
            .bind(position)
            .execute(&mut **tx)
            .instrument(span)
            .await?;
    }

    Ok(company_id)
}

/// The caller's companies, newest first.
pub(super) async fn list_companies(
    pool: &PgPool,
    user_id: &str,
) -> Result<Vec<CompanyResponse>, sqlx::Error> {
    let query = format!(
        "SELECT {COMPANY_COLUMNS} FROM companies WHERE user_id = $1 \
         ORDER BY created_at DESC, id DESC"
    );
    let span = info_span!(
        "db.query",
        db.system = "postgresql",
        db.operation = "SELECT",
        db.statement = query.as_str()
    );
    let rows = sqlx::query(&query)
        .bind(user_id)
        .fetch_all(pool)
        .instrument(span)
        .await?;
    Ok(rows.iter().map(company_from_row).collect())
}

/// One of the caller's companies with its founders in insertion order.
pub(super) async fn find_company(
    pool: &PgPool,
    user_id: &str,
    company_id: Uuid,
) -> Result<Option<CompanyDetailResponse>, sqlx::Error> {
    let query = format!("SELECT {COMPANY_COLUMNS} FROM companies WHERE id = $1 AND user_id = $2");
    let span = info_span!(
        "db.query",
        db.system = "postgresql",
        db.operation = "SELECT",
        db.statement = query.as_str()
    );
    let Some(row) = sqlx::query(&query)
        .bind(company_id)
        .bind(user_id)
        .fetch_optional(pool)
        .instrument(span)
        .await?
    else {
        return Ok(None);
    };
    let company = company_from_row(&row);

    let query = r"
        SELECT id::text AS id, name
        FROM founders
        WHERE company_id = $1
        ORDER BY position
    ";
    let span = info_span!(
        "db.query",
        db.system = "postgresql",
        db.operation = "SELECT",
        db.statement = query
    );
    let founders = sqlx::query(query)
        .bind(company_id)
        .fetch_all(pool)
        .instrument(span)
        .await?
        .iter()
        .map(|row| FounderResponse {
            id: row.get("id"),
            name: row.get("name"),
        })
        .collect();

    Ok(Some(CompanyDetailResponse { company, founders }))
}
