use std::collections::BTreeSet;
use std::fmt;

use serde::Serialize;

use super::domain::{CourseCode, Credits, RequestId, SectionId, StudentId};
use super::repository::RepositoryError;

/// Business-rule rejections. These are expected outcomes rendered to users,
/// not failures.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, thiserror::Error)]
#[serde(tag = "code", rename_all = "snake_case")]
pub enum RejectionReason {
    #[error("course {course} has already been passed; an approved retake is required")]
    AlreadyPassed { course: CourseCode },
    #[error("projected load of {projected} credits exceeds the maximum of {maximum}")]
    CreditLoadExceeded { projected: Credits, maximum: Credits },
    #[error("projected load of {projected} credits is below the minimum of {minimum}")]
    CreditLoadBelowMinimum { projected: Credits, minimum: Credits },
    #[error("section has no remaining seats")]
    SectionFull,
    #[error("schedule conflicts with {}", join(.sections))]
    ScheduleConflict { sections: Vec<SectionId> },
    #[error("prerequisites not met: {}", join(.missing))]
    PrerequisitesNotMet { missing: BTreeSet<CourseCode> },
    #[error("student is not enrolled in this section")]
    NotEnrolled,
    #[error("grade entry is locked for this section")]
    SectionLocked,
    #[error("grade `{raw}` is outside the accepted domain")]
    InvalidGrade { raw: String },
}

impl RejectionReason {
    pub fn code(&self) -> &'static str {
        match self {
            RejectionReason::AlreadyPassed { .. } => "already_passed",
            RejectionReason::CreditLoadExceeded { .. } => "credit_load_exceeded",
            RejectionReason::CreditLoadBelowMinimum { .. } => "credit_load_below_minimum",
            RejectionReason::SectionFull => "section_full",
            RejectionReason::ScheduleConflict { .. } => "schedule_conflict",
            RejectionReason::PrerequisitesNotMet { .. } => "prerequisites_not_met",
            RejectionReason::NotEnrolled => "not_enrolled",
            RejectionReason::SectionLocked => "section_locked",
            RejectionReason::InvalidGrade { .. } => "invalid_grade",
        }
    }
}

fn join<'a, T, I>(items: I) -> String
where
    T: fmt::Display + 'a,
    I: IntoIterator<Item = &'a T>,
{
    items
        .into_iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join(", ")
}

/// Reference that could not be resolved.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EntityRef {
    Student(StudentId),
    Section(SectionId),
    Course(CourseCode),
    Enrollment(StudentId, SectionId),
    Request(RequestId),
}

impl fmt::Display for EntityRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EntityRef::Student(id) => write!(f, "student {id}"),
            EntityRef::Section(id) => write!(f, "section {id}"),
            EntityRef::Course(code) => write!(f, "course {code}"),
            EntityRef::Enrollment(student, section) => {
                write!(f, "enrollment of {student} in {section}")
            }
            EntityRef::Request(id) => write!(f, "request {id}"),
        }
    }
}

/// Error raised by the enrollment validator.
#[derive(Debug, thiserror::Error)]
pub enum EnrollmentError {
    #[error(transparent)]
    Rejected(#[from] RejectionReason),
    #[error("{0} not found")]
    NotFound(EntityRef),
    #[error(transparent)]
    Repository(#[from] RepositoryError),
}

impl EnrollmentError {
    pub fn rejection(&self) -> Option<&RejectionReason> {
        match self {
            EnrollmentError::Rejected(reason) => Some(reason),
            _ => None,
        }
    }
}
