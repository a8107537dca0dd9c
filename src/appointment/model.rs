use std::sync::LazyLock;

use chrono::{DateTime, NaiveDate, Utc};
use regex::Regex;
use serde::de::Deserializer;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

use super::lifecycle::{self, Progress};
use super::status::{AppointmentStatus, ExamCategory, ExamTaskStatus, ExamType, PaymentStatus};

pub const MAX_NOTES_LEN: usize = 500;

static SCHEDULED_TIME: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^([01]\d|2[0-3]):([0-5]\d)$").expect("valid time pattern"));

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ValidationError {
    #[error("scheduled time must be HH:MM (24h), got {0:?}")]
    InvalidScheduledTime(String),
    #[error("an appointment needs at least one exam")]
    EmptyExamList,
    #[error("notes are limited to {max} characters, got {0}", max = MAX_NOTES_LEN)]
    NotesTooLong(usize),
    #[error("{0} must not be blank")]
    Blank(&'static str),
}

pub fn validate_scheduled_time(value: &str) -> Result<(), ValidationError> {
    if SCHEDULED_TIME.is_match(value) {
        Ok(())
    } else {
        Err(ValidationError::InvalidScheduledTime(value.to_string()))
    }
}

pub fn validate_notes(notes: &str) -> Result<(), ValidationError> {
    let len = notes.chars().count();
    if len > MAX_NOTES_LEN {
        return Err(ValidationError::NotesTooLong(len));
    }
    Ok(())
}

/// One exam entry of a protocol template.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProtocolExam {
    pub exam_name: String,
    pub category: ExamCategory,
}

impl ProtocolExam {
    pub fn to_task(&self) -> ExamTask {
        ExamTask::pending(self.exam_name.clone(), self.category)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExamTask {
    pub exam_name: String,
    pub category: ExamCategory,
    #[serde(default)]
    pub status: ExamTaskStatus,
    pub specialist_id: Option<Uuid>,
    pub started_at: Option<DateTime<Utc>>,
    pub finished_at: Option<DateTime<Utc>>,
    pub notes: Option<String>,
}

impl ExamTask {
    pub fn pending(exam_name: impl Into<String>, category: ExamCategory) -> Self {
        Self {
            exam_name: exam_name.into(),
            category,
            status: ExamTaskStatus::Pending,
            specialist_id: None,
            started_at: None,
            finished_at: None,
            notes: None,
        }
    }
}

/// Only called when the field is present, so `null` becomes `Some(None)`.
fn deserialize_double_option<'de, D, T>(deserializer: D) -> Result<Option<Option<T>>, D::Error>
where
    D: Deserializer<'de>,
    T: Deserialize<'de>,
{
    Option::<T>::deserialize(deserializer).map(Some)
}

/// Partial edit of one exam task. `Some(None)` clears a nullable field.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ExamTaskPatch {
    pub status: Option<ExamTaskStatus>,
    #[serde(default, deserialize_with = "deserialize_double_option")]
    pub specialist_id: Option<Option<Uuid>>,
    #[serde(default, deserialize_with = "deserialize_double_option")]
    pub notes: Option<Option<String>>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RouteStation {
    pub order: u32,
    pub location: String,
    pub exam_name: String,
    pub estimated_minutes: u32,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RouteSheet {
    pub generated_at: DateTime<Utc>,
    pub stations: Vec<RouteStation>,
}

/// Fields chosen by the scheduler when booking a visit.
#[derive(Debug, Clone, Deserialize)]
pub struct AppointmentDraft {
    pub patient_id: Uuid,
    pub company_id: Uuid,
    pub protocol_id: Uuid,
    #[serde(default)]
    pub specialist_ids: Vec<Uuid>,
    pub scheduled_date: NaiveDate,
    pub scheduled_time: String,
    pub exam_type: ExamType,
}

#[derive(Debug, Clone, Serialize)]
pub struct Appointment {
    pub appointment_id: Uuid,
    pub patient_id: Uuid,
    pub company_id: Uuid,
    pub protocol_id: Uuid,
    pub specialist_ids: Vec<Uuid>,
    pub invoice_id: Option<Uuid>,

    pub scheduled_date: NaiveDate,
    pub scheduled_time: String,
    pub arrived_at: Option<DateTime<Utc>>,
    pub completed_at: Option<DateTime<Utc>>,

    pub status: AppointmentStatus,
    pub exam_type: ExamType,
    pub exams_to_perform: Vec<ExamTask>,
    pub route_sheet: Option<RouteSheet>,
    pub payment_status: PaymentStatus,
    pub cancellation_reason: Option<String>,

    pub created_by: Uuid,
    pub updated_by: Uuid,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,

    /// Optimistic-concurrency marker, never sent to clients.
    #[serde(skip_serializing)]
    pub revision: i64,
}

impl Appointment {
    /// Books a new visit with the protocol's exams, all pending.
    pub fn schedule(
        draft: AppointmentDraft,
        exams: Vec<ExamTask>,
        created_by: Uuid,
        now: DateTime<Utc>,
    ) -> Result<Self, ValidationError> {
        validate_scheduled_time(&draft.scheduled_time)?;
        if exams.is_empty() {
            return Err(ValidationError::EmptyExamList);
        }

        Ok(Self {
            appointment_id: Uuid::new_v4(),
            patient_id: draft.patient_id,
            company_id: draft.company_id,
            protocol_id: draft.protocol_id,
            specialist_ids: draft.specialist_ids,
            invoice_id: None,
            scheduled_date: draft.scheduled_date,
            scheduled_time: draft.scheduled_time,
            arrived_at: None,
            completed_at: None,
            status: AppointmentStatus::Scheduled,
            exam_type: draft.exam_type,
            exams_to_perform: exams,
            route_sheet: None,
            payment_status: PaymentStatus::Pending,
            cancellation_reason: None,
            created_by,
            updated_by: created_by,
            created_at: now,
            updated_at: now,
            revision: 0,
        })
    }

    pub fn view(self) -> AppointmentView {
        let progress = lifecycle::get_progress(&self);
        AppointmentView {
            appointment: self,
            progress,
        }
    }
}

/// Wire shape of an appointment: stored fields plus computed progress.
#[derive(Debug, Serialize)]
pub struct AppointmentView {
    #[serde(flatten)]
    pub appointment: Appointment,
    pub progress: Progress,
}

#[cfg(test)]
pub(crate) mod fixtures {
    use super::*;

    pub fn draft() -> AppointmentDraft {
        AppointmentDraft {
            patient_id: Uuid::new_v4(),
            company_id: Uuid::new_v4(),
            protocol_id: Uuid::new_v4(),
            specialist_ids: vec![],
            scheduled_date: NaiveDate::from_ymd_opt(2026, 3, 14).unwrap(),
            scheduled_time: "08:30".into(),
            exam_type: ExamType::Periodic,
        }
    }

    pub fn appointment_with(statuses: &[ExamTaskStatus], status: AppointmentStatus) -> Appointment {
        let exams = statuses
            .iter()
            .enumerate()
            .map(|(i, s)| ExamTask {
                status: *s,
                ..ExamTask::pending(format!("exam-{i}"), ExamCategory::Lab)
            })
            .collect();
        let mut appt = Appointment::schedule(draft(), exams, Uuid::new_v4(), Utc::now()).unwrap();
        appt.status = status;
        appt
    }
}
