use chrono::{DateTime, Utc};

use super::model::{Appointment, RouteSheet, RouteStation};
use super::status::ExamCategory;

fn station_for(category: ExamCategory) -> (&'static str, u32) {
    match category {
        ExamCategory::Lab => ("Laboratory", 10),
        ExamCategory::Specialty => ("Specialty consult", 20),
        ExamCategory::Medical => ("Medical office", 30),
    }
}

/// Ordered stations for the exams the patient still has to go through.
/// Derived data: rebuilding it never changes the appointment's status.
pub fn build_route_sheet(appointment: &Appointment, now: DateTime<Utc>) -> RouteSheet {
    let stations = appointment
        .exams_to_perform
        .iter()
        .filter(|task| !task.status.is_done())
        .zip(1u32..)
        .map(|(task, order)| {
            let (location, minutes) = station_for(task.category);
            RouteStation {
                order,
                location: location.to_string(),
                exam_name: task.exam_name.clone(),
                estimated_minutes: minutes.max(1),
            }
        })
        .collect();

    RouteSheet {
        generated_at: now,
        stations,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::appointment::model::fixtures::appointment_with;
    use crate::appointment::status::{AppointmentStatus, ExamTaskStatus};

    #[test]
    fn stations_follow_task_order_and_skip_done_exams() {
        let mut appt = appointment_with(
            &[
                ExamTaskStatus::Pending,
                ExamTaskStatus::Completed,
                ExamTaskStatus::InProgress,
                ExamTaskStatus::Skipped,
                ExamTaskStatus::Pending,
            ],
            AppointmentStatus::InExam,
        );
        appt.exams_to_perform[2].category = ExamCategory::Specialty;
        appt.exams_to_perform[4].category = ExamCategory::Medical;

        let now = Utc::now();
        let sheet = build_route_sheet(&appt, now);

        assert_eq!(sheet.generated_at, now);
        let summary: Vec<_> = sheet
            .stations
            .iter()
            .map(|s| (s.order, s.exam_name.as_str(), s.location.as_str(), s.estimated_minutes))
            .collect();
        assert_eq!(
            summary,
            vec![
                (1, "exam-0", "Laboratory", 10),
                (2, "exam-2", "Specialty consult", 20),
                (3, "exam-4", "Medical office", 30),
            ]
        );
        assert_eq!(appt.status, AppointmentStatus::InExam);
    }

    #[test]
    fn all_done_gives_empty_sheet() {
        let appt = appointment_with(
            &[ExamTaskStatus::Completed, ExamTaskStatus::Skipped],
            AppointmentStatus::PendingResults,
        );
        assert!(build_route_sheet(&appt, Utc::now()).stations.is_empty());
    }
}
