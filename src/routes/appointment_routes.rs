// src/routes/appointment_routes.rs

use axum::{
    extract::{Path, Query, State},
    routing::{get, patch, post},
    Json, Router,
};
use chrono::{DateTime, NaiveDate, Utc};
use serde::Deserialize;
use sqlx::types::Json as DbJson;
use sqlx::PgPool;
use uuid::Uuid;

use crate::{
    appointment::{
        lifecycle,
        model::{AppointmentDraft, RouteSheet},
        route_sheet, Appointment, AppointmentStatus, AppointmentView, ExamTask, ExamTaskPatch,
        ExamType, LifecycleError, PaymentStatus, Progress, ProtocolExam, Transition,
    },
    error::ApiError,
    middleware::auth_context::AuthContext,
    models::{ApiOk, AppState},
};

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/appointments", post(create_appointment).get(list_appointments))
        .route("/appointments/{appointment_id}", get(get_appointment))
        .route("/appointments/{appointment_id}/progress", get(get_appointment_progress))
        .route("/appointments/{appointment_id}/exams/{index}", patch(patch_exam_task))
        .route("/appointments/{appointment_id}/check_in", post(check_in))
        .route("/appointments/{appointment_id}/cancel", post(cancel))
        .route("/appointments/{appointment_id}/no_show", post(mark_no_show))
        .route("/appointments/{appointment_id}/certificate", post(issue_certificate))
        .route("/appointments/{appointment_id}/close", post(close))
        .route("/appointments/{appointment_id}/route_sheet", post(generate_route_sheet))
}

/* ============================================================
   Storage
   ============================================================ */

const APPOINTMENT_COLUMNS: &str = r#"
    appointment_id, patient_id, company_id, protocol_id, specialist_ids, invoice_id,
    scheduled_date, scheduled_time, arrived_at, completed_at,
    status, exam_type, exams_to_perform, route_sheet, payment_status, cancellation_reason,
    created_by, updated_by, created_at, updated_at, revision
"#;

#[derive(Debug, sqlx::FromRow)]
struct AppointmentRow {
    appointment_id: Uuid,
    patient_id: Uuid,
    company_id: Uuid,
    protocol_id: Uuid,
    specialist_ids: Vec<Uuid>,
    invoice_id: Option<Uuid>,
    scheduled_date: NaiveDate,
    scheduled_time: String,
    arrived_at: Option<DateTime<Utc>>,
    completed_at: Option<DateTime<Utc>>,
    status: AppointmentStatus,
    exam_type: ExamType,
    exams_to_perform: DbJson<Vec<ExamTask>>,
    route_sheet: Option<DbJson<RouteSheet>>,
    payment_status: PaymentStatus,
    cancellation_reason: Option<String>,
    created_by: Uuid,
    updated_by: Uuid,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
    revision: i64,
}

impl From<AppointmentRow> for Appointment {
    fn from(r: AppointmentRow) -> Self {
        Appointment {
            appointment_id: r.appointment_id,
            patient_id: r.patient_id,
            company_id: r.company_id,
            protocol_id: r.protocol_id,
            specialist_ids: r.specialist_ids,
            invoice_id: r.invoice_id,
            scheduled_date: r.scheduled_date,
            scheduled_time: r.scheduled_time,
            arrived_at: r.arrived_at,
            completed_at: r.completed_at,
            status: r.status,
            exam_type: r.exam_type,
            exams_to_perform: r.exams_to_perform.0,
            route_sheet: r.route_sheet.map(|j| j.0),
            payment_status: r.payment_status,
            cancellation_reason: r.cancellation_reason,
            created_by: r.created_by,
            updated_by: r.updated_by,
            created_at: r.created_at,
            updated_at: r.updated_at,
            revision: r.revision,
        }
    }
}

async fn load_appointment(db: &PgPool, appointment_id: Uuid) -> Result<Appointment, ApiError> {
    let sql = format!("SELECT {APPOINTMENT_COLUMNS} FROM appointment WHERE appointment_id = $1");
    let row = sqlx::query_as::<_, AppointmentRow>(&sql)
        .bind(appointment_id)
        .fetch_optional(db)
        .await
        .map_err(ApiError::db)?;

    let Some(row) = row else {
        return Err(ApiError::NotFound("NOT_FOUND", "appointment not found".into()));
    };
    Ok(row.into())
}

async fn insert_appointment(db: &PgPool, appt: &Appointment) -> Result<(), ApiError> {
    sqlx::query(
        r#"
        INSERT INTO appointment (
          appointment_id, patient_id, company_id, protocol_id, specialist_ids,
          scheduled_date, scheduled_time, status, exam_type, exams_to_perform,
          payment_status, created_by, updated_by, created_at, updated_at, revision
        )
        VALUES ($1,$2,$3,$4,$5,$6,$7,$8,$9,$10,$11,$12,$12,$13,$13,0)
        "#,
    )
    .bind(appt.appointment_id)
    .bind(appt.patient_id)
    .bind(appt.company_id)
    .bind(appt.protocol_id)
    .bind(&appt.specialist_ids)
    .bind(appt.scheduled_date)
    .bind(&appt.scheduled_time)
    .bind(appt.status)
    .bind(appt.exam_type)
    .bind(DbJson(&appt.exams_to_perform))
    .bind(appt.payment_status)
    .bind(appt.created_by)
    .bind(appt.created_at)
    .execute(db)
    .await
    .map_err(|e| ApiError::BadRequest("APPOINTMENT_CREATE_FAILED", format!("{e}")))?;

    Ok(())
}

/// Writes the mutable part of an appointment if nobody saved it since it was
/// loaded. Exam edits must already have gone through the lifecycle engine.
async fn save_appointment(db: &PgPool, appt: &mut Appointment, actor: Uuid) -> Result<(), ApiError> {
    let row: Option<(DateTime<Utc>, i64)> = sqlx::query_as(
        r#"
        UPDATE appointment
        SET status = $3,
            exams_to_perform = $4,
            route_sheet = $5,
            arrived_at = $6,
            completed_at = $7,
            cancellation_reason = $8,
            updated_by = $9,
            updated_at = now(),
            revision = revision + 1
        WHERE appointment_id = $1
          AND revision = $2
        RETURNING updated_at, revision
        "#,
    )
    .bind(appt.appointment_id)
    .bind(appt.revision)
    .bind(appt.status)
    .bind(DbJson(&appt.exams_to_perform))
    .bind(appt.route_sheet.as_ref().map(DbJson))
    .bind(appt.arrived_at)
    .bind(appt.completed_at)
    .bind(appt.cancellation_reason.as_deref())
    .bind(actor)
    .fetch_optional(db)
    .await
    .map_err(ApiError::db)?;

    let Some((updated_at, revision)) = row else {
        tracing::warn!(appointment_id = %appt.appointment_id, revision = appt.revision, "stale appointment write");
        return Err(ApiError::Conflict(
            "REVISION_CONFLICT",
            "appointment was modified concurrently, reload and retry".into(),
        ));
    };

    appt.updated_by = actor;
    appt.updated_at = updated_at;
    appt.revision = revision;
    tracing::debug!(appointment_id = %appt.appointment_id, status = %appt.status, revision, "appointment saved");
    Ok(())
}

/* ============================================================
   POST /appointments (create from protocol)
   ============================================================ */

pub async fn create_appointment(
    State(state): State<AppState>,
    auth: AuthContext,
    Json(draft): Json<AppointmentDraft>,
) -> Result<Json<ApiOk<AppointmentView>>, ApiError> {
    auth.ensure_manage()?;

    let exams: Option<DbJson<Vec<ProtocolExam>>> = sqlx::query_scalar(
        r#"
        SELECT exams
        FROM protocol
        WHERE protocol_id = $1
          AND is_active = true
        "#,
    )
    .bind(draft.protocol_id)
    .fetch_optional(&state.db)
    .await
    .map_err(ApiError::db)?;

    let Some(DbJson(exams)) = exams else {
        return Err(ApiError::BadRequest("PROTOCOL_NOT_FOUND", "protocol not found or inactive".into()));
    };

    let tasks = exams.iter().map(ProtocolExam::to_task).collect();
    let appt = Appointment::schedule(draft, tasks, auth.user_id, Utc::now())?;
    insert_appointment(&state.db, &appt).await?;

    tracing::info!(
        appointment_id = %appt.appointment_id,
        protocol_id = %appt.protocol_id,
        exams = appt.exams_to_perform.len(),
        "appointment scheduled"
    );
    Ok(Json(ApiOk { data: appt.view() }))
}

/* ============================================================
   GET /appointments?date=YYYY-MM-DD&status=...
   ============================================================ */

#[derive(Debug, Deserialize)]
pub struct ListQuery {
    pub date: Option<String>,
    pub status: Option<AppointmentStatus>,
}

pub async fn list_appointments(
    State(state): State<AppState>,
    _auth: AuthContext,
    Query(q): Query<ListQuery>,
) -> Result<Json<ApiOk<Vec<AppointmentView>>>, ApiError> {
    let date = match q.date.as_deref().map(str::trim) {
        Some(s) => NaiveDate::parse_from_str(s, "%Y-%m-%d").map_err(|_| {
            ApiError::BadRequest("VALIDATION_ERROR", "date must be YYYY-MM-DD".into())
        })?,
        None => Utc::now().date_naive(),
    };

    let sql = format!(
        r#"
        SELECT {APPOINTMENT_COLUMNS}
        FROM appointment
        WHERE scheduled_date = $1
          AND ($2::smallint IS NULL OR status = $2)
        ORDER BY scheduled_time ASC, created_at ASC
        "#
    );
    let rows = sqlx::query_as::<_, AppointmentRow>(&sql)
        .bind(date)
        .bind(q.status)
        .fetch_all(&state.db)
        .await
        .map_err(ApiError::db)?;

    let data = rows
        .into_iter()
        .map(|r| Appointment::from(r).view())
        .collect();
    Ok(Json(ApiOk { data }))
}

/* ============================================================
   GET /appointments/{id}, GET /appointments/{id}/progress
   ============================================================ */

pub async fn get_appointment(
    State(state): State<AppState>,
    _auth: AuthContext,
    Path(appointment_id): Path<Uuid>,
) -> Result<Json<ApiOk<AppointmentView>>, ApiError> {
    let appt = load_appointment(&state.db, appointment_id).await?;
    Ok(Json(ApiOk { data: appt.view() }))
}

pub async fn get_appointment_progress(
    State(state): State<AppState>,
    _auth: AuthContext,
    Path(appointment_id): Path<Uuid>,
) -> Result<Json<ApiOk<Progress>>, ApiError> {
    let appt = load_appointment(&state.db, appointment_id).await?;
    Ok(Json(ApiOk {
        data: lifecycle::get_progress(&appt),
    }))
}

/* ============================================================
   PATCH /appointments/{id}/exams/{index}
   ============================================================ */

pub async fn patch_exam_task(
    State(state): State<AppState>,
    auth: AuthContext,
    Path((appointment_id, index)): Path<(Uuid, usize)>,
    Json(patch): Json<ExamTaskPatch>,
) -> Result<Json<ApiOk<AppointmentView>>, ApiError> {
    auth.ensure_record_exams()?;

    let mut appt = load_appointment(&state.db, appointment_id).await?;
    lifecycle::update_exam_task(&mut appt, index, patch, Utc::now())?;
    save_appointment(&state.db, &mut appt, auth.user_id).await?;

    Ok(Json(ApiOk { data: appt.view() }))
}

/* ============================================================
   Operator transitions
   ============================================================ */

async fn run_transition(
    state: &AppState,
    auth: &AuthContext,
    appointment_id: Uuid,
    transition: Transition,
) -> Result<Json<ApiOk<AppointmentView>>, ApiError> {
    let mut appt = load_appointment(&state.db, appointment_id).await?;
    lifecycle::apply_transition(&mut appt, transition, Utc::now())?;
    save_appointment(&state.db, &mut appt, auth.user_id).await?;
    Ok(Json(ApiOk { data: appt.view() }))
}

pub async fn check_in(
    State(state): State<AppState>,
    auth: AuthContext,
    Path(appointment_id): Path<Uuid>,
) -> Result<Json<ApiOk<AppointmentView>>, ApiError> {
    auth.ensure_manage()?;
    run_transition(&state, &auth, appointment_id, Transition::CheckIn).await
}

#[derive(Debug, Deserialize)]
pub struct CancelRequest {
    pub reason: String,
}

pub async fn cancel(
    State(state): State<AppState>,
    auth: AuthContext,
    Path(appointment_id): Path<Uuid>,
    Json(req): Json<CancelRequest>,
) -> Result<Json<ApiOk<AppointmentView>>, ApiError> {
    auth.ensure_manage()?;
    run_transition(&state, &auth, appointment_id, Transition::Cancel { reason: req.reason }).await
}

pub async fn mark_no_show(
    State(state): State<AppState>,
    auth: AuthContext,
    Path(appointment_id): Path<Uuid>,
) -> Result<Json<ApiOk<AppointmentView>>, ApiError> {
    auth.ensure_manage()?;
    run_transition(&state, &auth, appointment_id, Transition::MarkNoShow).await
}

/// Certificates are issued by medical staff once every exam is done.
pub async fn issue_certificate(
    State(state): State<AppState>,
    auth: AuthContext,
    Path(appointment_id): Path<Uuid>,
) -> Result<Json<ApiOk<AppointmentView>>, ApiError> {
    auth.ensure_record_exams()?;
    run_transition(&state, &auth, appointment_id, Transition::IssueCertificate).await
}

pub async fn close(
    State(state): State<AppState>,
    auth: AuthContext,
    Path(appointment_id): Path<Uuid>,
) -> Result<Json<ApiOk<AppointmentView>>, ApiError> {
    auth.ensure_manage()?;
    run_transition(&state, &auth, appointment_id, Transition::Close).await
}

/* ============================================================
   POST /appointments/{id}/route_sheet
   ============================================================ */

pub async fn generate_route_sheet(
    State(state): State<AppState>,
    auth: AuthContext,
    Path(appointment_id): Path<Uuid>,
) -> Result<Json<ApiOk<AppointmentView>>, ApiError> {
    auth.ensure_manage()?;

    let mut appt = load_appointment(&state.db, appointment_id).await?;
    if appt.status.is_terminal() {
        return Err(LifecycleError::TerminalState(appt.status).into());
    }
    appt.route_sheet = Some(route_sheet::build_route_sheet(&appt, Utc::now()));
    save_appointment(&state.db, &mut appt, auth.user_id).await?;

    Ok(Json(ApiOk { data: appt.view() }))
}
