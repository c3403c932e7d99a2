use std::sync::Arc;

use axum::body::to_bytes;
use axum::response::Response;
use axum::Router;
use chrono::{Duration, NaiveTime, TimeZone, Utc, Weekday};
use serde_json::Value;

use crate::enrollment::approvals::{ApprovalLog, StudentRequest};
use crate::enrollment::domain::{
    Actor, Course, CourseCode, Credits, EnrollmentRecord, InstructorId, PrerequisiteEdge,
    RequestId, Role, Section, SectionId, Student, StudentId, TermCode,
};
use crate::enrollment::grading::{Grade, LetterGrade};
use crate::enrollment::memory::InMemoryRegistrar;
use crate::enrollment::policy::EnrollmentPolicy;
use crate::enrollment::repository::{EnrollmentWrite, RegistrarRepository, RepositoryError};
use crate::enrollment::schedule::Meeting;
use crate::enrollment::service::RegistrarService;
use crate::enrollment::{registrar_router, EnrollmentValidator};

pub(super) const FALL: &str = "2025FALL";
pub(super) const PREVIOUS: &str = "2024FALL";

pub(super) fn slot(day: Weekday, start: (u32, u32), end: (u32, u32)) -> Meeting {
    let start = NaiveTime::from_hms_opt(start.0, start.1, 0).expect("valid time");
    let end = NaiveTime::from_hms_opt(end.0, end.1, 0).expect("valid time");
    Meeting::new(day, start, end).expect("valid meeting")
}

pub(super) fn student(id: &str) -> Student {
    Student {
        id: StudentId::new(id),
        name: format!("Student {id}"),
        department: "Computer Science and Engineering".to_string(),
        major: "Software Engineering".to_string(),
    }
}

pub(super) fn course(code: &str, credits: u32, prerequisites: &[(&str, LetterGrade)]) -> Course {
    Course {
        code: CourseCode::new(code),
        name: format!("Course {code}"),
        credits: Credits::whole(credits),
        department: "CSE".to_string(),
        prerequisites: prerequisites
            .iter()
            .map(|(code, minimum)| {
                PrerequisiteEdge::all_of(CourseCode::new(*code), Grade::Letter(*minimum))
            })
            .collect(),
    }
}

pub(super) fn section(
    id: &str,
    course: &str,
    term: &str,
    capacity: u32,
    meetings: Vec<Meeting>,
) -> Section {
    Section {
        id: SectionId::new(id),
        course: CourseCode::new(course),
        term: TermCode::new(term),
        instructor: InstructorId::new("carol"),
        capacity,
        meetings,
        grades_locked: false,
    }
}

pub(super) fn administrator() -> Actor {
    Actor::new("registrar", Role::Administrator)
}

pub(super) fn instructor(id: &str) -> Actor {
    Actor::new(id, Role::Instructor)
}

pub(super) fn acting_student(id: &str) -> Actor {
    Actor::new(id, Role::Student)
}

/// Catalog shared by most tests:
///
/// - CSE100 (3cr), taught last year; alice passed it with an A.
/// - CSE200 (3cr, needs CSE100 >= C), Mon 09:30-11:00, one seat.
/// - CSE210 (3cr), Mon 10:30-12:00, two seats.
/// - CSE300 (3cr, needs CSE200 >= C), Tue 09:00-10:30, two seats, taught by dave.
/// - THESIS (36cr), Fri 13:00-17:00.
pub(super) fn seeded_store() -> Arc<InMemoryRegistrar> {
    let store = InMemoryRegistrar::new();
    for id in ["alice", "bob", "tom"] {
        store.insert_student(student(id)).expect("student");
    }

    for course in [
        course("CSE100", 3, &[]),
        course("CSE200", 3, &[("CSE100", LetterGrade::C)]),
        course("CSE210", 3, &[]),
        course("CSE300", 3, &[("CSE200", LetterGrade::C)]),
        course("THESIS", 36, &[]),
    ] {
        store.insert_course(course).expect("course");
    }

    let cse100 = section(
        "CSE100-01",
        "CSE100",
        PREVIOUS,
        30,
        vec![slot(Weekday::Mon, (9, 0), (10, 30))],
    );
    let mut cse300 = section(
        "CSE300-01",
        "CSE300",
        FALL,
        2,
        vec![slot(Weekday::Tue, (9, 0), (10, 30))],
    );
    cse300.instructor = InstructorId::new("dave");

    for section in [
        cse100.clone(),
        section(
            "CSE200-01",
            "CSE200",
            FALL,
            1,
            vec![slot(Weekday::Mon, (9, 30), (11, 0))],
        ),
        section(
            "CSE210-01",
            "CSE210",
            FALL,
            2,
            vec![slot(Weekday::Mon, (10, 30), (12, 0))],
        ),
        cse300,
        section(
            "THESIS-01",
            "THESIS",
            FALL,
            10,
            vec![slot(Weekday::Fri, (13, 0), (17, 0))],
        ),
    ] {
        store.insert_section(section).expect("section");
    }

    store
        .seed_enrollment(graded(
            "alice",
            &cse100,
            Grade::Letter(LetterGrade::A),
            0,
        ))
        .expect("history");

    Arc::new(store)
}

/// Graded record stamped `days` after a fixed date.
pub(super) fn graded(student: &str, section: &Section, grade: Grade, days: i64) -> EnrollmentRecord {
    let at = Utc
        .with_ymd_and_hms(2025, 5, 20, 12, 0, 0)
        .single()
        .expect("valid timestamp")
        + Duration::days(days);
    EnrollmentRecord::graded(StudentId::new(student), section, grade, at)
}

pub(super) fn section_of(store: &InMemoryRegistrar, id: &str) -> Section {
    store
        .section(&SectionId::new(id))
        .expect("lookup")
        .expect("section exists")
}

pub(super) fn validator(store: &Arc<InMemoryRegistrar>) -> EnrollmentValidator<InMemoryRegistrar> {
    EnrollmentValidator::new(store.clone(), EnrollmentPolicy::default())
}

pub(super) fn service(store: &Arc<InMemoryRegistrar>) -> RegistrarService<InMemoryRegistrar> {
    RegistrarService::new(store.clone(), EnrollmentPolicy::default())
}

pub(super) fn router(store: &Arc<InMemoryRegistrar>) -> Router {
    registrar_router(Arc::new(service(store)))
}

pub(super) fn sid(id: &str) -> StudentId {
    StudentId::new(id)
}

pub(super) fn sec(id: &str) -> SectionId {
    SectionId::new(id)
}

pub(super) async fn read_json_body(response: Response) -> Value {
    let bytes = to_bytes(response.into_body(), usize::MAX)
        .await
        .expect("body bytes");
    serde_json::from_slice(&bytes).expect("json body")
}

pub(super) struct UnavailableRepository;

fn offline<T>() -> Result<T, RepositoryError> {
    Err(RepositoryError::Unavailable("database offline".to_string()))
}

impl RegistrarRepository for UnavailableRepository {
    fn student(&self, _id: &StudentId) -> Result<Option<Student>, RepositoryError> {
        offline()
    }

    fn course(&self, _code: &CourseCode) -> Result<Option<Course>, RepositoryError> {
        offline()
    }

    fn section(&self, _id: &SectionId) -> Result<Option<Section>, RepositoryError> {
        offline()
    }

    fn update_section(&self, _section: Section) -> Result<(), RepositoryError> {
        offline()
    }

    fn enrollment(
        &self,
        _student: &StudentId,
        _section: &SectionId,
    ) -> Result<Option<EnrollmentRecord>, RepositoryError> {
        offline()
    }

    fn enrollments_for_student(
        &self,
        _student: &StudentId,
    ) -> Result<Vec<EnrollmentRecord>, RepositoryError> {
        offline()
    }

    fn enrollments_for_section(
        &self,
        _section: &SectionId,
    ) -> Result<Vec<EnrollmentRecord>, RepositoryError> {
        offline()
    }

    fn save_enrollment(&self, _write: EnrollmentWrite) -> Result<EnrollmentRecord, RepositoryError> {
        offline()
    }

    fn insert_request(&self, _request: StudentRequest) -> Result<StudentRequest, RepositoryError> {
        offline()
    }

    fn update_request(&self, _request: StudentRequest) -> Result<(), RepositoryError> {
        offline()
    }

    fn fetch_request(&self, _id: &RequestId) -> Result<Option<StudentRequest>, RepositoryError> {
        offline()
    }

    fn requests_for_student(
        &self,
        _student: &StudentId,
    ) -> Result<Vec<StudentRequest>, RepositoryError> {
        offline()
    }

    fn pending_requests(&self, _limit: usize) -> Result<Vec<StudentRequest>, RepositoryError> {
        offline()
    }

    fn append_log(&self, _entry: ApprovalLog) -> Result<(), RepositoryError> {
        offline()
    }

    fn logs_for(&self, _request: &RequestId) -> Result<Vec<ApprovalLog>, RepositoryError> {
        offline()
    }
}
