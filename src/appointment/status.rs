use serde::{Deserialize, Serialize};

/// Clinical lifecycle of an appointment.
/// Stored as smallint; the discriminants are part of the schema.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, sqlx::Type)]
#[serde(rename_all = "snake_case")]
#[repr(i16)]
pub enum AppointmentStatus {
    Scheduled = 0,
    InAdmission = 1,
    InExam = 2,
    PendingResults = 3,
    CertificateAvailable = 4,
    Cancelled = 5,
    NoShow = 6,
    Completed = 7,
}

impl AppointmentStatus {
    #[cfg(test)]
    pub const ALL: [AppointmentStatus; 8] = [
        AppointmentStatus::Scheduled,
        AppointmentStatus::InAdmission,
        AppointmentStatus::InExam,
        AppointmentStatus::PendingResults,
        AppointmentStatus::CertificateAvailable,
        AppointmentStatus::Cancelled,
        AppointmentStatus::NoShow,
        AppointmentStatus::Completed,
    ];

    /// Terminal states are absorbing; nothing moves an appointment out of them.
    pub fn is_terminal(self) -> bool {
        match self {
            AppointmentStatus::Cancelled | AppointmentStatus::NoShow | AppointmentStatus::Completed => true,
            AppointmentStatus::Scheduled
            | AppointmentStatus::InAdmission
            | AppointmentStatus::InExam
            | AppointmentStatus::PendingResults
            | AppointmentStatus::CertificateAvailable => false,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            AppointmentStatus::Scheduled => "scheduled",
            AppointmentStatus::InAdmission => "in_admission",
            AppointmentStatus::InExam => "in_exam",
            AppointmentStatus::PendingResults => "pending_results",
            AppointmentStatus::CertificateAvailable => "certificate_available",
            AppointmentStatus::Cancelled => "cancelled",
            AppointmentStatus::NoShow => "no_show",
            AppointmentStatus::Completed => "completed",
        }
    }
}

impl std::fmt::Display for AppointmentStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Business classification of the visit. Fixed at creation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[serde(rename_all = "snake_case")]
#[repr(i16)]
pub enum ExamType {
    Intake = 0,
    Periodic = 1,
    Exit = 2,
    PostLeave = 3,
    JobChange = 4,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[serde(rename_all = "snake_case")]
#[repr(i16)]
pub enum PaymentStatus {
    Pending = 0,
    Invoiced = 1,
    Paid = 2,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExamCategory {
    Lab,
    Specialty,
    Medical,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExamTaskStatus {
    #[default]
    Pending,
    InProgress,
    Completed,
    Skipped,
}

impl ExamTaskStatus {
    /// Completed and skipped tasks both count toward progress.
    pub fn is_done(self) -> bool {
        match self {
            ExamTaskStatus::Completed | ExamTaskStatus::Skipped => true,
            ExamTaskStatus::Pending | ExamTaskStatus::InProgress => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn terminal_states() {
        let terminal: Vec<_> = AppointmentStatus::ALL
            .into_iter()
            .filter(|s| s.is_terminal())
            .collect();
        assert_eq!(
            terminal,
            vec![
                AppointmentStatus::Cancelled,
                AppointmentStatus::NoShow,
                AppointmentStatus::Completed
            ]
        );
    }

    #[test]
    fn status_serializes_as_snake_case() {
        let json = serde_json::to_string(&AppointmentStatus::CertificateAvailable).unwrap();
        assert_eq!(json, "\"certificate_available\"");
        for s in AppointmentStatus::ALL {
            assert_eq!(serde_json::to_string(&s).unwrap(), format!("\"{s}\""));
        }
    }

    #[test]
    fn unknown_task_status_is_rejected() {
        let parsed: Result<ExamTaskStatus, _> = serde_json::from_str("\"done\"");
        assert!(parsed.is_err());
        let parsed: ExamTaskStatus = serde_json::from_str("\"in_progress\"").unwrap();
        assert_eq!(parsed, ExamTaskStatus::InProgress);
    }

    #[test]
    fn done_statuses() {
        assert!(ExamTaskStatus::Completed.is_done());
        assert!(ExamTaskStatus::Skipped.is_done());
        assert!(!ExamTaskStatus::Pending.is_done());
        assert!(!ExamTaskStatus::InProgress.is_done());
    }
}
