use std::collections::{BTreeMap, HashMap};
use std::sync::{Mutex, MutexGuard};

use serde::Deserialize;

use super::approvals::{ApprovalLog, StudentRequest};
use super::domain::{
    Course, CourseCode, EnrollmentRecord, EnrollmentStatus, RequestId, Section, SectionId,
    Student, StudentId,
};
use super::repository::{EnrollmentWrite, RegistrarRepository, RepositoryError};

/// Seed data for the in-memory store, usually read from a JSON file.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct Catalog {
    #[serde(default)]
    pub students: Vec<Student>,
    #[serde(default)]
    pub courses: Vec<Course>,
    #[serde(default)]
    pub sections: Vec<Section>,
    #[serde(default)]
    pub enrollments: Vec<EnrollmentRecord>,
}

/// Raised when a catalog references entities it does not define.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum CatalogError {
    #[error("section {section} references unknown course {course}")]
    UnknownCourse {
        section: SectionId,
        course: CourseCode,
    },
    #[error("course {course} requires unknown course {prerequisite}")]
    UnknownPrerequisite {
        course: CourseCode,
        prerequisite: CourseCode,
    },
    #[error("enrollment references unknown section {0}")]
    UnknownSection(SectionId),
    #[error("enrollment references unknown student {0}")]
    UnknownStudent(StudentId),
    #[error("duplicate enrollment of {student} in {section}")]
    DuplicateEnrollment {
        student: StudentId,
        section: SectionId,
    },
    #[error("enrollment of {student} in {section} is inconsistent: {problem}")]
    InconsistentEnrollment {
        student: StudentId,
        section: SectionId,
        problem: &'static str,
    },
}

/// Seeded records must agree with their section and carry a grade exactly when
/// graded; missing grade points are derived from the grade.
fn checked_enrollment(
    mut record: EnrollmentRecord,
    section: &Section,
) -> Result<EnrollmentRecord, CatalogError> {
    let problem = if record.course != section.course {
        Some("course differs from its section")
    } else if record.term != section.term {
        Some("term differs from its section")
    } else {
        match (record.status, record.grade) {
            (EnrollmentStatus::Passed | EnrollmentStatus::Failed, None) => {
                Some("graded status without a grade")
            }
            (status, Some(grade)) if status.is_graded() => {
                let points = grade.points();
                if record.grade_points.is_some_and(|stored| stored != points) {
                    Some("grade points do not match the grade")
                } else if grade.is_passing() != (status == EnrollmentStatus::Passed) {
                    Some("status does not match the grade")
                } else {
                    record.grade_points = Some(points);
                    None
                }
            }
            (_, Some(_)) => Some("grade recorded on an ungraded status"),
            (_, None) if record.grade_points.is_some() => {
                Some("grade points recorded on an ungraded status")
            }
            (_, None) => None,
        }
    };

    match problem {
        Some(problem) => Err(CatalogError::InconsistentEnrollment {
            student: record.student,
            section: record.section,
            problem,
        }),
        None => Ok(record),
    }
}

#[derive(Default)]
struct Tables {
    students: HashMap<StudentId, Student>,
    courses: HashMap<CourseCode, Course>,
    sections: HashMap<SectionId, Section>,
    enrollments: BTreeMap<(StudentId, SectionId), EnrollmentRecord>,
    requests: BTreeMap<RequestId, StudentRequest>,
    logs: Vec<ApprovalLog>,
}

/// Process-local store. A single lock covers every table, so the seat re-check in
/// [`RegistrarRepository::save_enrollment`] is atomic with the write.
#[derive(Default)]
pub struct InMemoryRegistrar {
    tables: Mutex<Tables>,
}

impl InMemoryRegistrar {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_catalog(catalog: Catalog) -> Result<Self, CatalogError> {
        let mut tables = Tables::default();

        for course in catalog.courses {
            tables.courses.insert(course.code.clone(), course);
        }
        for course in tables.courses.values() {
            if let Some(edge) = course
                .prerequisites
                .iter()
                .find(|edge| !tables.courses.contains_key(&edge.prerequisite))
            {
                return Err(CatalogError::UnknownPrerequisite {
                    course: course.code.clone(),
                    prerequisite: edge.prerequisite.clone(),
                });
            }
        }
        for section in catalog.sections {
            if !tables.courses.contains_key(&section.course) {
                return Err(CatalogError::UnknownCourse {
                    section: section.id,
                    course: section.course,
                });
            }
            tables.sections.insert(section.id.clone(), section);
        }
        for student in catalog.students {
            tables.students.insert(student.id.clone(), student);
        }
        for record in catalog.enrollments {
            let Some(section) = tables.sections.get(&record.section) else {
                return Err(CatalogError::UnknownSection(record.section));
            };
            if !tables.students.contains_key(&record.student) {
                return Err(CatalogError::UnknownStudent(record.student));
            }
            let record = checked_enrollment(record, section)?;
            let key = (record.student.clone(), record.section.clone());
            if tables.enrollments.contains_key(&key) {
                return Err(CatalogError::DuplicateEnrollment {
                    student: key.0,
                    section: key.1,
                });
            }
            tables.enrollments.insert(key, record);
        }

        Ok(Self {
            tables: Mutex::new(tables),
        })
    }

    pub fn insert_student(&self, student: Student) -> Result<(), RepositoryError> {
        self.lock()?.students.insert(student.id.clone(), student);
        Ok(())
    }

    pub fn insert_course(&self, course: Course) -> Result<(), RepositoryError> {
        self.lock()?.courses.insert(course.code.clone(), course);
        Ok(())
    }

    pub fn insert_section(&self, section: Section) -> Result<(), RepositoryError> {
        self.lock()?.sections.insert(section.id.clone(), section);
        Ok(())
    }

    /// Writes a record without any seat check, for seeding history. The record
    /// must reference a known section and agree with it.
    pub fn seed_enrollment(&self, record: EnrollmentRecord) -> Result<(), RepositoryError> {
        let mut tables = self.lock()?;
        let section = tables
            .sections
            .get(&record.section)
            .ok_or(RepositoryError::NotFound)?;
        let record = checked_enrollment(record, section)
            .map_err(|error| RepositoryError::Invalid(error.to_string()))?;
        let key = (record.student.clone(), record.section.clone());
        tables.enrollments.insert(key, record);
        Ok(())
    }

    fn lock(&self) -> Result<MutexGuard<'_, Tables>, RepositoryError> {
        self.tables
            .lock()
            .map_err(|_| RepositoryError::Unavailable("registrar store lock poisoned".to_string()))
    }
}

impl RegistrarRepository for InMemoryRegistrar {
    fn student(&self, id: &StudentId) -> Result<Option<Student>, RepositoryError> {
        Ok(self.lock()?.students.get(id).cloned())
    }

    fn course(&self, code: &CourseCode) -> Result<Option<Course>, RepositoryError> {
        Ok(self.lock()?.courses.get(code).cloned())
    }

    fn section(&self, id: &SectionId) -> Result<Option<Section>, RepositoryError> {
        Ok(self.lock()?.sections.get(id).cloned())
    }

    fn update_section(&self, section: Section) -> Result<(), RepositoryError> {
        let mut tables = self.lock()?;
        match tables.sections.get_mut(&section.id) {
            Some(existing) => {
                *existing = section;
                Ok(())
            }
            None => Err(RepositoryError::NotFound),
        }
    }

    fn enrollment(
        &self,
        student: &StudentId,
        section: &SectionId,
    ) -> Result<Option<EnrollmentRecord>, RepositoryError> {
        let key = (student.clone(), section.clone());
        Ok(self.lock()?.enrollments.get(&key).cloned())
    }

    fn enrollments_for_student(
        &self,
        student: &StudentId,
    ) -> Result<Vec<EnrollmentRecord>, RepositoryError> {
        let tables = self.lock()?;
        Ok(tables
            .enrollments
            .values()
            .filter(|record| &record.student == student)
            .cloned()
            .collect())
    }

    fn enrollments_for_section(
        &self,
        section: &SectionId,
    ) -> Result<Vec<EnrollmentRecord>, RepositoryError> {
        let tables = self.lock()?;
        Ok(tables
            .enrollments
            .values()
            .filter(|record| &record.section == section)
            .cloned()
            .collect())
    }

    fn save_enrollment(&self, write: EnrollmentWrite) -> Result<EnrollmentRecord, RepositoryError> {
        let mut tables = self.lock()?;
        let EnrollmentWrite { record, seat_limit } = write;

        if let Some(limit) = seat_limit {
            let taken = tables
                .enrollments
                .values()
                .filter(|held| held.section == record.section && held.student != record.student)
                .filter(|held| held.status.occupies_seat())
                .count();
            if u32::try_from(taken).unwrap_or(u32::MAX) >= limit {
                return Err(RepositoryError::SeatsExhausted);
            }
        }

        let key = (record.student.clone(), record.section.clone());
        tables.enrollments.insert(key, record.clone());
        Ok(record)
    }

    fn insert_request(&self, request: StudentRequest) -> Result<StudentRequest, RepositoryError> {
        let mut tables = self.lock()?;
        if tables.requests.contains_key(&request.id) {
            return Err(RepositoryError::Conflict);
        }
        tables.requests.insert(request.id.clone(), request.clone());
        Ok(request)
    }

    fn update_request(&self, request: StudentRequest) -> Result<(), RepositoryError> {
        let mut tables = self.lock()?;
        match tables.requests.get_mut(&request.id) {
            Some(existing) => {
                *existing = request;
                Ok(())
            }
            None => Err(RepositoryError::NotFound),
        }
    }

    fn fetch_request(&self, id: &RequestId) -> Result<Option<StudentRequest>, RepositoryError> {
        Ok(self.lock()?.requests.get(id).cloned())
    }

    fn requests_for_student(
        &self,
        student: &StudentId,
    ) -> Result<Vec<StudentRequest>, RepositoryError> {
        let tables = self.lock()?;
        Ok(tables
            .requests
            .values()
            .filter(|request| &request.student == student)
            .cloned()
            .collect())
    }

    fn pending_requests(&self, limit: usize) -> Result<Vec<StudentRequest>, RepositoryError> {
        let tables = self.lock()?;
        let mut pending: Vec<StudentRequest> = tables
            .requests
            .values()
            .filter(|request| !request.status.is_terminal())
            .cloned()
            .collect();
        pending.sort_by(|a, b| a.submitted_at.cmp(&b.submitted_at).then(a.id.cmp(&b.id)));
        pending.truncate(limit);
        Ok(pending)
    }

    fn append_log(&self, entry: ApprovalLog) -> Result<(), RepositoryError> {
        self.lock()?.logs.push(entry);
        Ok(())
    }

    fn logs_for(&self, request: &RequestId) -> Result<Vec<ApprovalLog>, RepositoryError> {
        let tables = self.lock()?;
        Ok(tables
            .logs
            .iter()
            .filter(|entry| &entry.request == request)
            .cloned()
            .collect())
    }
}
