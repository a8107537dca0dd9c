// src/routes/protocol_routes.rs

use axum::{
    extract::{Query, State},
    routing::get,
    Json, Router,
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::types::Json as DbJson;
use uuid::Uuid;

use crate::{
    appointment::{ProtocolExam, ValidationError},
    error::ApiError,
    middleware::auth_context::AuthContext,
    models::{ApiOk, AppState},
};

pub fn router() -> Router<AppState> {
    Router::new().route("/protocols", get(list_protocols).post(create_protocol))
}

/// A profesiogram: the exam bundle a job or company requires.
#[derive(Debug, Serialize, sqlx::FromRow)]
pub struct ProtocolRow {
    pub protocol_id: Uuid,
    pub name: String,
    pub company_id: Option<Uuid>,
    pub exams: DbJson<Vec<ProtocolExam>>,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Deserialize)]
pub struct ProtocolQuery {
    pub company_id: Option<Uuid>,
}

#[derive(Debug, Deserialize)]
pub struct CreateProtocolRequest {
    pub name: String,
    pub company_id: Option<Uuid>,
    pub exams: Vec<ProtocolExam>,
}

fn validate_protocol(req: &CreateProtocolRequest) -> Result<(), ValidationError> {
    if req.name.trim().is_empty() {
        return Err(ValidationError::Blank("name"));
    }
    if req.exams.is_empty() {
        return Err(ValidationError::EmptyExamList);
    }
    if req.exams.iter().any(|e| e.exam_name.trim().is_empty()) {
        return Err(ValidationError::Blank("exam_name"));
    }
    Ok(())
}

pub async fn list_protocols(
    State(state): State<AppState>,
    _auth: AuthContext,
    Query(q): Query<ProtocolQuery>,
) -> Result<Json<ApiOk<Vec<ProtocolRow>>>, ApiError> {
    // company-specific protocols plus the generic ones
    let rows = sqlx::query_as::<_, ProtocolRow>(
        r#"
        SELECT protocol_id, name, company_id, exams, is_active, created_at, updated_at
        FROM protocol
        WHERE is_active = true
          AND ($1::uuid IS NULL OR company_id IS NULL OR company_id = $1)
        ORDER BY name ASC
        "#,
    )
    .bind(q.company_id)
    .fetch_all(&state.db)
    .await
    .map_err(ApiError::db)?;

    Ok(Json(ApiOk { data: rows }))
}

pub async fn create_protocol(
    State(state): State<AppState>,
    auth: AuthContext,
    Json(req): Json<CreateProtocolRequest>,
) -> Result<Json<ApiOk<ProtocolRow>>, ApiError> {
    auth.ensure_manage()?;
    validate_protocol(&req)?;

    let exams: Vec<ProtocolExam> = req
        .exams
        .into_iter()
        .map(|e| ProtocolExam {
            exam_name: e.exam_name.trim().to_string(),
            category: e.category,
        })
        .collect();

    let row = sqlx::query_as::<_, ProtocolRow>(
        r#"
        INSERT INTO protocol (name, company_id, exams)
        VALUES ($1, $2, $3)
        RETURNING protocol_id, name, company_id, exams, is_active, created_at, updated_at
        "#,
    )
    .bind(req.name.trim())
    .bind(req.company_id)
    .bind(DbJson(exams))
    .fetch_one(&state.db)
    .await
    .map_err(|e| ApiError::BadRequest("PROTOCOL_CREATE_FAILED", format!("{e}")))?;

    tracing::info!(protocol_id = %row.protocol_id, exams = row.exams.len(), "protocol created");
    Ok(Json(ApiOk { data: row }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::appointment::ExamCategory;

    fn req(name: &str, exams: &[&str]) -> CreateProtocolRequest {
        CreateProtocolRequest {
            name: name.into(),
            company_id: None,
            exams: exams
                .iter()
                .map(|n| ProtocolExam {
                    exam_name: n.to_string(),
                    category: ExamCategory::Lab,
                })
                .collect(),
        }
    }

    #[test]
    fn protocol_validation() {
        assert!(validate_protocol(&req("Welder", &["Audiometry", "Spirometry"])).is_ok());
        assert_eq!(validate_protocol(&req("  ", &["Audiometry"])), Err(ValidationError::Blank("name")));
        assert_eq!(validate_protocol(&req("Welder", &[])), Err(ValidationError::EmptyExamList));
        assert_eq!(
            validate_protocol(&req("Welder", &["Audiometry", " "])),
            Err(ValidationError::Blank("exam_name"))
        );
    }

    #[test]
    fn create_request_parses_categories() {
        let req: CreateProtocolRequest = serde_json::from_str(
            r#"{"name":"Driver","exams":[{"exam_name":"Visual acuity","category":"specialty"},{"exam_name":"Glucose","category":"lab"}]}"#,
        )
        .unwrap();
        assert_eq!(req.exams[0].category, ExamCategory::Specialty);
        assert_eq!(req.exams[1].category, ExamCategory::Lab);
        assert!(req.company_id.is_none());
    }
}
