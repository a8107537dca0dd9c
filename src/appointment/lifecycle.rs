//! Appointment lifecycle engine.
//!
//! The automatic rule only ever moves an appointment to `PendingResults`
//! once every exam task is done. Every other status change is an explicit
//! operator [`Transition`]. Nothing here performs I/O; the store calls these
//! functions on the in-memory appointment right before it persists it.

use chrono::{DateTime, Utc};
use serde::Serialize;
use thiserror::Error;
use tracing::{debug, info, warn};

use super::model::{validate_notes, Appointment, ExamTaskPatch, ValidationError};
use super::status::{AppointmentStatus, ExamTaskStatus};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Progress {
    pub completed: usize,
    pub total: usize,
    pub percentage: u8,
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum LifecycleError {
    #[error("cannot move appointment from {from} to {to}")]
    InvalidTransition {
        from: AppointmentStatus,
        to: AppointmentStatus,
    },
    #[error("appointment is {0}; no further changes are allowed")]
    TerminalState(AppointmentStatus),
    #[error("not every exam is completed or skipped")]
    ExamsIncomplete,
    #[error("exam index {index} out of range (appointment has {len} exams)")]
    ExamIndexOutOfRange { index: usize, len: usize },
    #[error("a cancellation reason is required")]
    MissingCancellationReason,
    #[error("patient has not been checked in; exams cannot be recorded yet")]
    NotCheckedIn,
    #[error(transparent)]
    Validation(#[from] ValidationError),
}

/// Operator actions. The engine itself only derives `PendingResults`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Transition {
    CheckIn,
    StartExam,
    Cancel { reason: String },
    MarkNoShow,
    IssueCertificate,
    Close,
}

impl Transition {
    pub fn target(&self) -> AppointmentStatus {
        match self {
            Transition::CheckIn => AppointmentStatus::InAdmission,
            Transition::StartExam => AppointmentStatus::InExam,
            Transition::Cancel { .. } => AppointmentStatus::Cancelled,
            Transition::MarkNoShow => AppointmentStatus::NoShow,
            Transition::IssueCertificate => AppointmentStatus::CertificateAvailable,
            Transition::Close => AppointmentStatus::Completed,
        }
    }

    fn permitted_from(&self, from: AppointmentStatus) -> bool {
        use AppointmentStatus::*;
        match self {
            Transition::CheckIn => matches!(from, Scheduled),
            Transition::StartExam => matches!(from, InAdmission),
            Transition::Cancel { .. } => !from.is_terminal(),
            Transition::MarkNoShow => matches!(from, Scheduled | InAdmission),
            Transition::IssueCertificate => matches!(from, PendingResults),
            Transition::Close => matches!(from, CertificateAvailable),
        }
    }
}

/// Whether the automatic rule may overwrite `status`.
/// Only `CertificateAvailable` is protected here; terminal and not yet
/// checked-in appointments are kept away from recomputation by
/// [`update_exam_task`].
fn recompute_allowed(status: AppointmentStatus) -> bool {
    match status {
        AppointmentStatus::CertificateAvailable => false,
        AppointmentStatus::Scheduled
        | AppointmentStatus::InAdmission
        | AppointmentStatus::InExam
        | AppointmentStatus::PendingResults
        | AppointmentStatus::Cancelled
        | AppointmentStatus::NoShow
        | AppointmentStatus::Completed => true,
    }
}

pub fn are_all_exams_completed(appointment: &Appointment) -> bool {
    !appointment.exams_to_perform.is_empty()
        && appointment
            .exams_to_perform
            .iter()
            .all(|task| task.status.is_done())
}

pub fn get_progress(appointment: &Appointment) -> Progress {
    let total = appointment.exams_to_perform.len();
    let completed = appointment
        .exams_to_perform
        .iter()
        .filter(|task| task.status.is_done())
        .count();

    // round half up: floor((2c*100 + t) / 2t)
    let percentage = if total == 0 {
        0
    } else {
        ((completed * 200 + total) / (total * 2)) as u8
    };

    Progress {
        completed,
        total,
        percentage,
    }
}

/// Pre-save rule for a modified exam list.
pub fn on_exams_changed(appointment: &mut Appointment) {
    if appointment.exams_to_perform.is_empty() {
        return;
    }
    if !are_all_exams_completed(appointment) || !recompute_allowed(appointment.status) {
        return;
    }
    if appointment.status != AppointmentStatus::PendingResults {
        info!(
            appointment_id = %appointment.appointment_id,
            from = %appointment.status,
            "all exams done, awaiting results"
        );
    }
    appointment.status = AppointmentStatus::PendingResults;
}

pub fn apply_transition(
    appointment: &mut Appointment,
    transition: Transition,
    now: DateTime<Utc>,
) -> Result<(), LifecycleError> {
    let from = appointment.status;
    let to = transition.target();

    if from.is_terminal() {
        warn!(appointment_id = %appointment.appointment_id, %from, %to, "transition on terminal appointment");
        return Err(LifecycleError::TerminalState(from));
    }
    if !transition.permitted_from(from) {
        warn!(appointment_id = %appointment.appointment_id, %from, %to, "invalid status transition");
        return Err(LifecycleError::InvalidTransition { from, to });
    }

    match transition {
        Transition::CheckIn => {
            appointment.arrived_at.get_or_insert(now);
        }
        Transition::StartExam | Transition::MarkNoShow => {}
        Transition::Cancel { reason } => {
            let reason = reason.trim();
            if reason.is_empty() {
                return Err(LifecycleError::MissingCancellationReason);
            }
            appointment.cancellation_reason = Some(reason.to_string());
        }
        Transition::IssueCertificate => {
            if !are_all_exams_completed(appointment) {
                return Err(LifecycleError::ExamsIncomplete);
            }
        }
        Transition::Close => {
            appointment.completed_at.get_or_insert(now);
        }
    }

    appointment.status = to;
    info!(appointment_id = %appointment.appointment_id, %from, %to, "status transition");
    Ok(())
}

/// Edits one exam task and runs the pre-save rule.
pub fn update_exam_task(
    appointment: &mut Appointment,
    index: usize,
    patch: ExamTaskPatch,
    now: DateTime<Utc>,
) -> Result<(), LifecycleError> {
    if appointment.status.is_terminal() {
        return Err(LifecycleError::TerminalState(appointment.status));
    }
    if appointment.status == AppointmentStatus::Scheduled {
        warn!(appointment_id = %appointment.appointment_id, "exam edit before check-in");
        return Err(LifecycleError::NotCheckedIn);
    }
    let len = appointment.exams_to_perform.len();
    let Some(task) = appointment.exams_to_perform.get_mut(index) else {
        return Err(LifecycleError::ExamIndexOutOfRange { index, len });
    };

    if let Some(Some(notes)) = &patch.notes {
        validate_notes(notes)?;
    }
    if let Some(specialist_id) = patch.specialist_id {
        task.specialist_id = specialist_id;
    }
    if let Some(notes) = patch.notes {
        task.notes = notes;
    }

    let mut started = false;
    if let Some(status) = patch.status {
        debug!(exam = %task.exam_name, ?status, "exam task status");
        match status {
            ExamTaskStatus::Pending => {
                task.finished_at = None;
            }
            ExamTaskStatus::InProgress => {
                task.started_at.get_or_insert(now);
                task.finished_at = None;
                started = true;
            }
            ExamTaskStatus::Completed | ExamTaskStatus::Skipped => {
                task.finished_at = Some(now);
            }
        }
        task.status = status;
    }

    if started && appointment.status == AppointmentStatus::InAdmission {
        apply_transition(appointment, Transition::StartExam, now)?;
    }

    on_exams_changed(appointment);
    Ok(())
}
