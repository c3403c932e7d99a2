use std::sync::{Arc, Mutex, MutexGuard};

use chrono::Utc;
use serde::Serialize;
use tracing::{debug, info, warn};

use super::approvals::{RequestKind, RequestStatus};
use super::capacity::{projected_credit_load, remaining_seats_for};
use super::domain::{
    Course, CourseCode, Credits, EnrollmentRecord, EnrollmentStatus, Section, SectionId, Student,
    StudentId,
};
use super::grading::Grade;
use super::policy::EnrollmentPolicy;
use super::prerequisites::missing_prerequisites;
use super::rejection::{EnrollmentError, EntityRef, RejectionReason};
use super::repository::{EnrollmentWrite, RegistrarRepository, RepositoryError};
use super::schedule::conflicting_sections;

/// Outcome of a side-effect free eligibility check.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "verdict", rename_all = "snake_case")]
pub enum Verdict {
    Eligible,
    Rejected { reason: RejectionReason },
}

impl Verdict {
    pub fn is_eligible(&self) -> bool {
        matches!(self, Verdict::Eligible)
    }
}

/// Exemptions granted by an approved request.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub(crate) struct Authorization {
    pub retake: bool,
    pub max_credits: Option<Credits>,
}

impl Authorization {
    pub(crate) fn retake() -> Self {
        Self {
            retake: true,
            ..Self::default()
        }
    }

    pub(crate) fn overload(max_credits: Credits) -> Self {
        Self {
            max_credits: Some(max_credits),
            ..Self::default()
        }
    }
}

/// Everything one eligibility pass reads, loaded up front so the rule chain is pure.
struct Admission {
    student: Student,
    section: Section,
    course: Course,
    history: Vec<EnrollmentRecord>,
    roster: Vec<EnrollmentRecord>,
    /// An approved retake request targets a section of this course.
    retake_approved: bool,
    /// Credits of the student's other enrolling sections in the same term.
    term_load: Vec<Credits>,
    /// Other sections the student holds a timeslot in during the same term.
    schedule: Vec<Section>,
}

impl Admission {
    fn existing(&self) -> Option<&EnrollmentRecord> {
        self.history
            .iter()
            .find(|record| record.section == self.section.id)
    }
}

/// Composes the eligibility rules and performs the enrollment state transitions.
pub struct EnrollmentValidator<R> {
    repository: Arc<R>,
    policy: EnrollmentPolicy,
    admission: Mutex<()>,
}

impl<R> EnrollmentValidator<R>
where
    R: RegistrarRepository + 'static,
{
    pub fn new(repository: Arc<R>, policy: EnrollmentPolicy) -> Self {
        Self {
            repository,
            policy,
            admission: Mutex::new(()),
        }
    }

    pub fn policy(&self) -> &EnrollmentPolicy {
        &self.policy
    }

    /// Runs the rule chain without writing anything.
    pub fn evaluate(
        &self,
        student: &StudentId,
        section: &SectionId,
    ) -> Result<Verdict, EnrollmentError> {
        let admission = self.load(student, section)?;
        Ok(match self.assess(&admission, Authorization::default()) {
            Ok(()) => Verdict::Eligible,
            Err(reason) => Verdict::Rejected { reason },
        })
    }

    /// Admits the student into the section or reports the first violated rule.
    pub fn validate_and_enroll(
        &self,
        student: &StudentId,
        section: &SectionId,
    ) -> Result<EnrollmentRecord, EnrollmentError> {
        self.validate_and_enroll_authorized(student, section, Authorization::default())
    }

    pub(crate) fn validate_and_enroll_authorized(
        &self,
        student: &StudentId,
        section: &SectionId,
        authorization: Authorization,
    ) -> Result<EnrollmentRecord, EnrollmentError> {
        let _guard = self.serialize()?;
        let admission = self.load(student, section)?;

        if let Err(reason) = self.assess(&admission, authorization) {
            debug!(
                student = %student,
                section = %section,
                reason = reason.code(),
                "enrollment rejected"
            );
            return Err(reason.into());
        }

        let now = Utc::now();
        let record = match admission.existing() {
            Some(existing) => {
                let mut record = existing.clone();
                record.mark_enrolling(now);
                record
            }
            None => EnrollmentRecord::new(
                admission.student.id.clone(),
                &admission.section,
                EnrollmentStatus::Enrolling,
                now,
            ),
        };

        let write = EnrollmentWrite::admit(record, admission.section.capacity);
        match self.repository.save_enrollment(write) {
            Ok(stored) => {
                info!(
                    student = %student,
                    section = %section,
                    retake = authorization.retake,
                    "student enrolled"
                );
                Ok(stored)
            }
            Err(RepositoryError::SeatsExhausted) => {
                warn!(
                    student = %student,
                    section = %section,
                    "section filled during admission"
                );
                Err(RejectionReason::SectionFull.into())
            }
            Err(error) => Err(error.into()),
        }
    }

    /// Withdraws an enrolling student, honouring the drop floor when configured.
    pub fn withdraw(
        &self,
        student: &StudentId,
        section: &SectionId,
    ) -> Result<EnrollmentRecord, EnrollmentError> {
        let _guard = self.serialize()?;
        let section = self.section(section)?;
        self.student(student)?;

        let mut record = match self.repository.enrollment(student, &section.id)? {
            Some(record) if record.status == EnrollmentStatus::Enrolling => record,
            _ => return Err(RejectionReason::NotEnrolled.into()),
        };

        let remaining = self
            .term_load(student, &section)?
            .into_iter()
            .sum::<Credits>();
        if let Err(reason) = self.policy.check_drop_load(remaining) {
            debug!(
                student = %student,
                section = %section.id,
                reason = reason.code(),
                "drop rejected"
            );
            return Err(reason.into());
        }

        record.mark_dropped(Utc::now());
        let stored = self
            .repository
            .save_enrollment(EnrollmentWrite::update(record))?;
        info!(student = %student, section = %section.id, "student dropped section");
        Ok(stored)
    }

    /// Records a grade and derives the graded status from it.
    pub fn record_grade(
        &self,
        section: &SectionId,
        student: &StudentId,
        raw_grade: &str,
    ) -> Result<EnrollmentRecord, EnrollmentError> {
        let _guard = self.serialize()?;
        let section = self.section(section)?;
        if section.grades_locked {
            return Err(RejectionReason::SectionLocked.into());
        }

        let grade: Grade = raw_grade
            .parse()
            .map_err(|_| RejectionReason::InvalidGrade {
                raw: raw_grade.trim().to_string(),
            })?;

        let mut record = self
            .repository
            .enrollment(student, &section.id)?
            .ok_or_else(|| {
                let missing = EntityRef::Enrollment(student.clone(), section.id.clone());
                EnrollmentError::NotFound(missing)
            })?;
        if !(record.status == EnrollmentStatus::Enrolling || record.status.is_graded()) {
            return Err(RejectionReason::NotEnrolled.into());
        }

        record.apply_grade(grade, Utc::now());
        let stored = self
            .repository
            .save_enrollment(EnrollmentWrite::update(record))?;
        info!(
            student = %student,
            section = %section.id,
            grade = %grade,
            status = stored.status.label(),
            "grade recorded"
        );
        Ok(stored)
    }

    /// Parks a placeholder while a retake request waits for review. Existing
    /// enrolled or graded records are left untouched.
    pub(crate) fn park_retake(
        &self,
        student: &StudentId,
        section: &Section,
    ) -> Result<Option<EnrollmentRecord>, EnrollmentError> {
        let _guard = self.serialize()?;
        let now = Utc::now();
        let placeholder = match self.repository.enrollment(student, &section.id)? {
            None => EnrollmentRecord::new(
                student.clone(),
                section,
                EnrollmentStatus::RetakePending,
                now,
            ),
            Some(mut record) if record.status == EnrollmentStatus::Dropped => {
                record.mark_retake_pending(now);
                record
            }
            Some(_) => return Ok(None),
        };

        let stored = self
            .repository
            .save_enrollment(EnrollmentWrite::update(placeholder))?;
        Ok(Some(stored))
    }

    /// Releases a retake placeholder after the request was rejected.
    pub(crate) fn release_retake(
        &self,
        student: &StudentId,
        section: &SectionId,
    ) -> Result<(), EnrollmentError> {
        let _guard = self.serialize()?;
        if let Some(mut record) = self.repository.enrollment(student, section)? {
            if record.status == EnrollmentStatus::RetakePending {
                record.mark_dropped(Utc::now());
                self.repository
                    .save_enrollment(EnrollmentWrite::update(record))?;
            }
        }
        Ok(())
    }

    fn assess(
        &self,
        admission: &Admission,
        authorization: Authorization,
    ) -> Result<(), RejectionReason> {
        let course = &admission.course;

        if self.policy.retake_guard && !authorization.retake && !admission.retake_approved {
            let passed = admission.history.iter().any(|record| {
                record.course == course.code && record.status == EnrollmentStatus::Passed
            });
            if passed {
                return Err(RejectionReason::AlreadyPassed {
                    course: course.code.clone(),
                });
            }
        }

        let projected = projected_credit_load(admission.term_load.iter().copied(), course.credits);
        match authorization.max_credits {
            Some(ceiling) if ceiling > self.policy.max_credits => {
                let widened = EnrollmentPolicy {
                    max_credits: ceiling,
                    ..self.policy.clone()
                };
                widened.check_admission_load(projected)?;
            }
            _ => self.policy.check_admission_load(projected)?,
        }

        let student = &admission.student.id;
        if remaining_seats_for(&admission.section, &admission.roster, student) == 0 {
            return Err(RejectionReason::SectionFull);
        }

        let sections = conflicting_sections(&admission.section, &admission.schedule);
        if !sections.is_empty() {
            return Err(RejectionReason::ScheduleConflict { sections });
        }

        let missing = missing_prerequisites(&course.prerequisites, &admission.history);
        if !missing.is_empty() {
            return Err(RejectionReason::PrerequisitesNotMet { missing });
        }

        Ok(())
    }

    fn load(&self, student: &StudentId, section: &SectionId) -> Result<Admission, EnrollmentError> {
        let student = self.student(student)?;
        let section = self.section(section)?;
        let course = self.course(&section.course)?;
        let history = self.repository.enrollments_for_student(&student.id)?;
        let roster = self.repository.enrollments_for_section(&section.id)?;
        let retake_approved = self.retake_approved(&student.id, &course.code)?;

        let mut term_load = Vec::new();
        let mut schedule = Vec::new();
        for record in history
            .iter()
            .filter(|record| record.term == section.term && record.section != section.id)
            .filter(|record| record.status.is_active())
        {
            if record.status.occupies_seat() {
                term_load.push(self.course(&record.course)?.credits);
            }
            schedule.push(self.section(&record.section)?);
        }

        Ok(Admission {
            student,
            section,
            course,
            history,
            roster,
            retake_approved,
            term_load,
            schedule,
        })
    }

    fn retake_approved(
        &self,
        student: &StudentId,
        course: &CourseCode,
    ) -> Result<bool, EnrollmentError> {
        for request in self.repository.requests_for_student(student)? {
            let RequestKind::Retake { section } = &request.kind else {
                continue;
            };
            if request.status != RequestStatus::Approved {
                continue;
            }
            if let Some(section) = self.repository.section(section)? {
                if section.course == *course {
                    return Ok(true);
                }
            }
        }
        Ok(false)
    }

    fn term_load(
        &self,
        student: &StudentId,
        excluding: &Section,
    ) -> Result<Vec<Credits>, EnrollmentError> {
        self.repository
            .enrollments_for_student(student)?
            .iter()
            .filter(|record| record.term == excluding.term && record.section != excluding.id)
            .filter(|record| record.status.occupies_seat())
            .map(|record| self.course(&record.course).map(|course| course.credits))
            .collect()
    }

    fn student(&self, id: &StudentId) -> Result<Student, EnrollmentError> {
        self.repository
            .student(id)?
            .ok_or_else(|| EnrollmentError::NotFound(EntityRef::Student(id.clone())))
    }

    fn section(&self, id: &SectionId) -> Result<Section, EnrollmentError> {
        self.repository
            .section(id)?
            .ok_or_else(|| EnrollmentError::NotFound(EntityRef::Section(id.clone())))
    }

    fn course(&self, code: &CourseCode) -> Result<Course, EnrollmentError> {
        self.repository
            .course(code)?
            .ok_or_else(|| EnrollmentError::NotFound(EntityRef::Course(code.clone())))
    }

    fn serialize(&self) -> Result<MutexGuard<'_, ()>, RepositoryError> {
        self.admission
            .lock()
            .map_err(|_| RepositoryError::Unavailable("admission lock poisoned".to_string()))
    }
}
