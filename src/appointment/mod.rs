//! Appointment domain: the value the store persists, its closed status
//! types, and the lifecycle engine that keeps `status` consistent with the
//! exam-task list.

pub mod lifecycle;
pub mod model;
pub mod route_sheet;
pub mod status;

pub use lifecycle::{LifecycleError, Progress, Transition};
pub use model::{Appointment, AppointmentView, ExamTask, ExamTaskPatch, ProtocolExam, ValidationError};
pub use status::{AppointmentStatus, ExamCategory, ExamTaskStatus, ExamType, PaymentStatus};
