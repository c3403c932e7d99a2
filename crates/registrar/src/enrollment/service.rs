use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};

use chrono::Utc;
use serde::{Deserialize, Serialize};
use tracing::info;

use super::approvals::{
    may_review, AlreadyDecided, ApprovalLog, Decision, RequestKind, RequestStatus, StudentRequest,
};
use super::domain::{
    Actor, EnrollmentRecord, EnrollmentStatus, RequestId, Role, Section, SectionId, StudentId,
};
use super::policy::EnrollmentPolicy;
use super::rejection::{EnrollmentError, EntityRef};
use super::repository::{RegistrarRepository, RepositoryError};
use super::transcript::{RequestSummary, SectionOverview, Transcript, TranscriptLine};
use super::validator::{Authorization, EnrollmentValidator, Verdict};

/// Incoming student request, as posted by the calling layer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RequestSubmission {
    pub student: StudentId,
    pub kind: RequestKind,
    #[serde(default)]
    pub reason: String,
}

/// Result of submitting a request: executed immediately or queued for review.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum Submission {
    Completed {
        request: StudentRequest,
        enrollment: EnrollmentRecord,
    },
    Pending {
        request: StudentRequest,
    },
}

impl Submission {
    pub fn request(&self) -> &StudentRequest {
        match self {
            Submission::Completed { request, .. } | Submission::Pending { request } => request,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DecisionOutcome {
    pub request: StudentRequest,
    pub log: ApprovalLog,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub enrollment: Option<EnrollmentRecord>,
}

/// Service composing the validator, the approval workflow, and read models.
pub struct RegistrarService<R> {
    repository: Arc<R>,
    validator: EnrollmentValidator<R>,
    decisions: Mutex<()>,
    sequence: AtomicU64,
}

impl<R> RegistrarService<R>
where
    R: RegistrarRepository + 'static,
{
    pub fn new(repository: Arc<R>, policy: EnrollmentPolicy) -> Self {
        let validator = EnrollmentValidator::new(repository.clone(), policy);
        Self {
            repository,
            validator,
            decisions: Mutex::new(()),
            sequence: AtomicU64::new(1),
        }
    }

    pub fn validator(&self) -> &EnrollmentValidator<R> {
        &self.validator
    }

    fn next_request_id(&self) -> RequestId {
        let id = self.sequence.fetch_add(1, Ordering::Relaxed);
        RequestId(format!("req-{id:06}"))
    }

    /// Submit a request. Enroll and drop execute through the validator right away
    /// and are only persisted when they succeed; every other kind waits for review.
    pub fn submit(
        &self,
        actor: &Actor,
        submission: RequestSubmission,
    ) -> Result<Submission, WorkflowError> {
        ensure_acts_for(actor, &submission.student, "submit requests")?;
        if self.repository.student(&submission.student)?.is_none() {
            return Err(not_found(EntityRef::Student(submission.student)));
        }
        let section = match submission.kind.section() {
            Some(id) => Some(self.section(id)?),
            None => None,
        };

        let now = Utc::now();
        let mut request = StudentRequest::pending(
            self.next_request_id(),
            submission.student,
            submission.kind,
            submission.reason,
            now,
        );

        let mut parked = None;
        let enrollment = match (&request.kind, &section) {
            (RequestKind::Enroll { section }, _) => Some(
                self.validator
                    .validate_and_enroll(&request.student, section)?,
            ),
            (RequestKind::Drop { section }, _) => {
                Some(self.validator.withdraw(&request.student, section)?)
            }
            (RequestKind::Retake { .. }, Some(section)) => {
                parked = self.validator.park_retake(&request.student, section)?;
                None
            }
            _ => None,
        };

        match enrollment {
            Some(enrollment) => {
                request.status = RequestStatus::Approved;
                request.reviewed_by = Some(actor.id.clone());
                request.reviewed_at = Some(now);
                let request = self.repository.insert_request(request)?;
                Ok(Submission::Completed {
                    request,
                    enrollment,
                })
            }
            None => {
                let request = match self.repository.insert_request(request) {
                    Ok(request) => request,
                    Err(error) => {
                        if let Some(placeholder) = parked {
                            self.validator
                                .release_retake(&placeholder.student, &placeholder.section)?;
                        }
                        return Err(error.into());
                    }
                };
                info!(
                    request = %request.id,
                    student = %request.student,
                    kind = request.kind.label(),
                    "request queued for review"
                );
                Ok(Submission::Pending { request })
            }
        }
    }

    /// Approve or reject a pending request. Approvals that place the student run
    /// the full rule chain first; if it fails the request stays pending.
    pub fn decide(
        &self,
        actor: &Actor,
        request_id: &RequestId,
        decision: Decision,
        note: &str,
    ) -> Result<DecisionOutcome, WorkflowError> {
        let _guard = self
            .decisions
            .lock()
            .map_err(|_| RepositoryError::Unavailable("decision lock poisoned".to_string()))?;

        let mut request = self.request(request_id)?;
        let section = match request.kind.section() {
            Some(id) => Some(self.section(id)?),
            None => None,
        };
        if !may_review(actor, &request, section.as_ref()) {
            return Err(WorkflowError::Unauthorized {
                actor: actor.id.clone(),
                action: "decide this request",
            });
        }

        let log = request.transition(decision, actor, note, Utc::now())?;
        let enrollment = match decision {
            Decision::Approved => self.apply_approval(&request)?,
            Decision::Rejected => {
                if let RequestKind::Retake { section } = &request.kind {
                    self.validator.release_retake(&request.student, section)?;
                }
                None
            }
        };

        self.repository.update_request(request.clone())?;
        self.repository.append_log(log.clone())?;
        info!(
            request = %request.id,
            reviewer = %actor.id,
            decision = request.status.label(),
            "request decided"
        );

        Ok(DecisionOutcome {
            request,
            log,
            enrollment,
        })
    }

    fn apply_approval(
        &self,
        request: &StudentRequest,
    ) -> Result<Option<EnrollmentRecord>, EnrollmentError> {
        let student = &request.student;
        let record = match &request.kind {
            RequestKind::Enroll { section } | RequestKind::CrossDepartment { section } => {
                self.validator.validate_and_enroll(student, section)?
            }
            RequestKind::Drop { section } => self.validator.withdraw(student, section)?,
            RequestKind::Retake { section } => self.validator.validate_and_enroll_authorized(
                student,
                section,
                Authorization::retake(),
            )?,
            RequestKind::CreditOverload {
                section: Some(section),
                requested,
            } => self.validator.validate_and_enroll_authorized(
                student,
                section,
                Authorization::overload(*requested),
            )?,
            RequestKind::CreditOverload { section: None, .. } => return Ok(None),
        };
        Ok(Some(record))
    }

    /// Pending requests the actor may decide, oldest first.
    pub fn approval_queue(
        &self,
        actor: &Actor,
        limit: usize,
    ) -> Result<Vec<StudentRequest>, WorkflowError> {
        if actor.role == Role::Student {
            return Err(WorkflowError::Unauthorized {
                actor: actor.id.clone(),
                action: "review requests",
            });
        }

        let mut queue = Vec::new();
        for request in self.repository.pending_requests(usize::MAX)? {
            if queue.len() == limit {
                break;
            }
            let section = match request.kind.section() {
                Some(id) => self.repository.section(id)?,
                None => None,
            };
            if may_review(actor, &request, section.as_ref()) {
                queue.push(request);
            }
        }
        Ok(queue)
    }

    pub fn approval_history(
        &self,
        request_id: &RequestId,
    ) -> Result<Vec<ApprovalLog>, WorkflowError> {
        self.request(request_id)?;
        Ok(self.repository.logs_for(request_id)?)
    }

    pub fn evaluate(
        &self,
        student: &StudentId,
        section: &SectionId,
    ) -> Result<Verdict, WorkflowError> {
        Ok(self.validator.evaluate(student, section)?)
    }

    /// Direct admission by the student or an administrator acting for them.
    pub fn enroll(
        &self,
        actor: &Actor,
        student: &StudentId,
        section: &SectionId,
    ) -> Result<EnrollmentRecord, WorkflowError> {
        ensure_acts_for(actor, student, "enroll this student")?;
        Ok(self.validator.validate_and_enroll(student, section)?)
    }

    pub fn withdraw(
        &self,
        actor: &Actor,
        student: &StudentId,
        section: &SectionId,
    ) -> Result<EnrollmentRecord, WorkflowError> {
        ensure_acts_for(actor, student, "drop this student")?;
        Ok(self.validator.withdraw(student, section)?)
    }

    /// Grade entry is open to the section's instructor and to administrators.
    pub fn record_grade(
        &self,
        actor: &Actor,
        section: &SectionId,
        student: &StudentId,
        raw_grade: &str,
    ) -> Result<EnrollmentRecord, WorkflowError> {
        let target = self.section(section)?;
        if !(actor.is_administrator() || actor.teaches(&target)) {
            return Err(WorkflowError::Unauthorized {
                actor: actor.id.clone(),
                action: "record grades for this section",
            });
        }
        Ok(self.validator.record_grade(section, student, raw_grade)?)
    }

    /// Flips the grade-entry lock. Administrators only.
    pub fn toggle_section_lock(
        &self,
        actor: &Actor,
        section: &SectionId,
    ) -> Result<Section, WorkflowError> {
        if !actor.is_administrator() {
            return Err(WorkflowError::Unauthorized {
                actor: actor.id.clone(),
                action: "lock grade entry",
            });
        }

        let mut target = self.section(section)?;
        target.grades_locked = !target.grades_locked;
        self.repository.update_section(target.clone())?;
        info!(
            section = %target.id,
            locked = target.grades_locked,
            actor = %actor.id,
            "grade lock toggled"
        );
        Ok(target)
    }

    pub fn transcript(&self, student: &StudentId) -> Result<Transcript, WorkflowError> {
        if self.repository.student(student)?.is_none() {
            return Err(not_found(EntityRef::Student(student.clone())));
        }

        let mut lines = Vec::new();
        for record in self.repository.enrollments_for_student(student)? {
            if record.status == EnrollmentStatus::RetakePending {
                continue;
            }
            let course = self
                .repository
                .course(&record.course)?
                .ok_or_else(|| not_found(EntityRef::Course(record.course.clone())))?;
            lines.push(TranscriptLine {
                term: record.term,
                course: record.course,
                section: record.section,
                credits: course.credits,
                status: record.status,
                grade: record.grade,
                grade_points: record.grade_points,
            });
        }

        Ok(Transcript::new(student.clone(), lines))
    }

    pub fn section_overview(
        &self,
        section: &SectionId,
    ) -> Result<SectionOverview, WorkflowError> {
        let section = self.section(section)?;
        let roster = self.repository.enrollments_for_section(&section.id)?;
        Ok(SectionOverview::from_roster(&section, &roster))
    }

    pub fn request_summary(
        &self,
        student: &StudentId,
    ) -> Result<RequestSummary, WorkflowError> {
        let requests = self.repository.requests_for_student(student)?;
        Ok(RequestSummary::tally(&requests))
    }

    fn section(&self, id: &SectionId) -> Result<Section, WorkflowError> {
        self.repository
            .section(id)?
            .ok_or_else(|| not_found(EntityRef::Section(id.clone())))
    }

    fn request(&self, id: &RequestId) -> Result<StudentRequest, WorkflowError> {
        self.repository
            .fetch_request(id)?
            .ok_or_else(|| not_found(EntityRef::Request(id.clone())))
    }
}

fn ensure_acts_for(
    actor: &Actor,
    student: &StudentId,
    action: &'static str,
) -> Result<(), WorkflowError> {
    let allowed = match actor.role {
        Role::Administrator => true,
        Role::Student => actor.id == student.0,
        Role::Instructor => false,
    };
    if allowed {
        Ok(())
    } else {
        Err(WorkflowError::Unauthorized {
            actor: actor.id.clone(),
            action,
        })
    }
}

fn not_found(entity: EntityRef) -> WorkflowError {
    WorkflowError::Enrollment(EnrollmentError::NotFound(entity))
}

/// Error raised by the registrar service.
#[derive(Debug, thiserror::Error)]
pub enum WorkflowError {
    #[error(transparent)]
    Enrollment(#[from] EnrollmentError),
    #[error("{actor} is not permitted to {action}")]
    Unauthorized { actor: String, action: &'static str },
    #[error(transparent)]
    AlreadyDecided(#[from] AlreadyDecided),
}

impl From<RepositoryError> for WorkflowError {
    fn from(error: RepositoryError) -> Self {
        WorkflowError::Enrollment(EnrollmentError::Repository(error))
    }
}
