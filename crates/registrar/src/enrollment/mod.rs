//! Enrollment eligibility, grade entry, and the approval workflow.
//!
//! [`EnrollmentValidator`] composes the grade scale, schedule overlap, prerequisite,
//! and capacity checks into one ordered verdict; [`RegistrarService`] layers the
//! request/approval state machine and the read models on top of it.

pub mod approvals;
pub mod capacity;
pub mod domain;
pub mod grading;
pub mod memory;
pub mod policy;
pub mod prerequisites;
pub mod rejection;
pub mod repository;
pub mod router;
pub mod schedule;
pub mod service;
pub mod transcript;
pub mod validator;

#[cfg(test)]
mod tests;

pub use approvals::{
    AlreadyDecided, ApprovalLog, Decision, RequestKind, RequestStatus, StudentRequest,
};
pub use domain::{
    Actor, Course, CourseCode, Credits, EnrollmentRecord, EnrollmentStatus, InstructorId,
    PrerequisiteEdge, RequestId, RequirementMode, Role, Section, SectionId, Student, StudentId,
    TermCode,
};
pub use grading::{Grade, GradeError, GradePoints, LetterGrade};
pub use memory::{Catalog, CatalogError, InMemoryRegistrar};
pub use policy::EnrollmentPolicy;
pub use rejection::{EnrollmentError, EntityRef, RejectionReason};
pub use repository::{EnrollmentWrite, RegistrarRepository, RepositoryError};
pub use router::registrar_router;
pub use schedule::{Meeting, ScheduleError};
pub use service::{
    DecisionOutcome, RegistrarService, RequestSubmission, Submission, WorkflowError,
};
pub use transcript::{RequestSummary, SectionOverview, Transcript, TranscriptLine};
pub use validator::{EnrollmentValidator, Verdict};
