use super::approvals::{ApprovalLog, StudentRequest};
use super::domain::{
    Course, CourseCode, EnrollmentRecord, RequestId, Section, SectionId, Student, StudentId,
};

/// Enrollment write, optionally guarded by a seat limit that the store must
/// re-check atomically with the write.
#[derive(Debug, Clone, PartialEq)]
pub struct EnrollmentWrite {
    pub record: EnrollmentRecord,
    pub seat_limit: Option<u32>,
}

impl EnrollmentWrite {
    /// Admission into a seat; refused when the section filled since it was read.
    pub fn admit(record: EnrollmentRecord, capacity: u32) -> Self {
        Self {
            record,
            seat_limit: Some(capacity),
        }
    }

    pub fn update(record: EnrollmentRecord) -> Self {
        Self {
            record,
            seat_limit: None,
        }
    }
}

/// Storage abstraction so the validator and workflow can be exercised in isolation.
pub trait RegistrarRepository: Send + Sync {
    fn student(&self, id: &StudentId) -> Result<Option<Student>, RepositoryError>;
    fn course(&self, code: &CourseCode) -> Result<Option<Course>, RepositoryError>;
    fn section(&self, id: &SectionId) -> Result<Option<Section>, RepositoryError>;
    fn update_section(&self, section: Section) -> Result<(), RepositoryError>;

    fn enrollment(
        &self,
        student: &StudentId,
        section: &SectionId,
    ) -> Result<Option<EnrollmentRecord>, RepositoryError>;
    fn enrollments_for_student(
        &self,
        student: &StudentId,
    ) -> Result<Vec<EnrollmentRecord>, RepositoryError>;
    fn enrollments_for_section(
        &self,
        section: &SectionId,
    ) -> Result<Vec<EnrollmentRecord>, RepositoryError>;
    /// Upserts keyed by (student, section).
    fn save_enrollment(&self, write: EnrollmentWrite) -> Result<EnrollmentRecord, RepositoryError>;

    fn insert_request(&self, request: StudentRequest) -> Result<StudentRequest, RepositoryError>;
    fn update_request(&self, request: StudentRequest) -> Result<(), RepositoryError>;
    fn fetch_request(&self, id: &RequestId) -> Result<Option<StudentRequest>, RepositoryError>;
    fn requests_for_student(
        &self,
        student: &StudentId,
    ) -> Result<Vec<StudentRequest>, RepositoryError>;
    fn pending_requests(&self, limit: usize) -> Result<Vec<StudentRequest>, RepositoryError>;

    fn append_log(&self, entry: ApprovalLog) -> Result<(), RepositoryError>;
    fn logs_for(&self, request: &RequestId) -> Result<Vec<ApprovalLog>, RepositoryError>;
}

/// Error enumeration for repository failures.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum RepositoryError {
    #[error("record already exists")]
    Conflict,
    #[error("record not found")]
    NotFound,
    #[error("record rejected: {0}")]
    Invalid(String),
    #[error("section filled before the enrollment could be written")]
    SeatsExhausted,
    #[error("repository unavailable: {0}")]
    Unavailable(String),
}
