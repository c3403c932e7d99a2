use chrono::{NaiveTime, TimeZone, Utc, Weekday};
use metrics_exporter_prometheus::PrometheusHandle;
use registrar::enrollment::{
    Catalog, Course, CourseCode, Credits, EnrollmentRecord, Grade, InMemoryRegistrar,
    InstructorId, LetterGrade, Meeting, PrerequisiteEdge, Section, SectionId, Student, StudentId,
    TermCode,
};
use registrar::error::AppError;
use std::path::Path;
use std::sync::atomic::AtomicBool;
use std::sync::Arc;
use tracing::info;

#[derive(Clone)]
pub(crate) struct AppState {
    pub(crate) readiness: Arc<AtomicBool>,
    pub(crate) metrics: Arc<PrometheusHandle>,
}

pub(crate) const HISTORY_TERM: &str = "2025FALL";
pub(crate) const CURRENT_TERM: &str = "2026SPR";

/// Builds the store from a JSON catalog file, or the bundled sample catalog.
pub(crate) fn load_registrar(path: Option<&Path>) -> Result<InMemoryRegistrar, AppError> {
    let catalog = match path {
        Some(path) => {
            let raw = std::fs::read_to_string(path)?;
            let catalog: Catalog = serde_json::from_str(&raw)?;
            info!(
                path = %path.display(),
                students = catalog.students.len(),
                sections = catalog.sections.len(),
                "catalog loaded"
            );
            catalog
        }
        None => sample_catalog(),
    };

    Ok(InMemoryRegistrar::from_catalog(catalog)?)
}

fn at(hour: u32, minute: u32) -> NaiveTime {
    NaiveTime::from_hms_opt(hour, minute, 0).unwrap_or_default()
}

fn meeting(day: Weekday, start: (u32, u32), end: (u32, u32), room: &str) -> Vec<Meeting> {
    Meeting::new(day, at(start.0, start.1), at(end.0, end.1))
        .map(|meeting| vec![meeting.at(room)])
        .unwrap_or_default()
}

fn student(id: &str, name: &str, major: &str) -> Student {
    Student {
        id: StudentId::new(id),
        name: name.to_string(),
        department: "Computer Science and Engineering".to_string(),
        major: major.to_string(),
    }
}

fn course(code: &str, name: &str, prerequisite: Option<&str>) -> Course {
    Course {
        code: CourseCode::new(code),
        name: name.to_string(),
        credits: Credits::whole(3),
        department: "CSE".to_string(),
        prerequisites: prerequisite
            .map(|code| {
                vec![PrerequisiteEdge::all_of(
                    CourseCode::new(code),
                    Grade::Letter(LetterGrade::C),
                )]
            })
            .unwrap_or_default(),
    }
}

fn section(
    id: &str,
    course: &str,
    term: &str,
    instructor: &str,
    capacity: u32,
    meetings: Vec<Meeting>,
) -> Section {
    Section {
        id: SectionId::new(id),
        course: CourseCode::new(course),
        term: TermCode::new(term),
        instructor: InstructorId::new(instructor),
        capacity,
        meetings,
        grades_locked: false,
    }
}

/// Two students, two instructors, the CSE core sequence, and one graded term of
/// history: alice passed CSE100 with 95, bob failed it with 55.
pub(crate) fn sample_catalog() -> Catalog {
    let cse100_fall = section(
        "CSE100-A01",
        "CSE100",
        HISTORY_TERM,
        "carol",
        2,
        meeting(Weekday::Mon, (9, 0), (10, 30), "ENG-101"),
    );
    let graded_at = Utc
        .with_ymd_and_hms(2025, 12, 19, 17, 0, 0)
        .single()
        .unwrap_or_else(Utc::now);

    Catalog {
        students: vec![
            student("alice", "Alice Zhang", "Software Engineering"),
            student("bob", "Bob Li", "Computer Science"),
        ],
        courses: vec![
            course("CSE100", "Introduction to Programming", None),
            course("CSE200", "Data Structures", Some("CSE100")),
            course("CSE210", "Discrete Mathematics", None),
            course("CSE300", "Algorithms", Some("CSE200")),
            course("CSE350", "Operating Systems", Some("CSE200")),
            course("CSE360", "Database Systems", Some("CSE200")),
        ],
        sections: vec![
            cse100_fall.clone(),
            section(
                "CSE100-B01",
                "CSE100",
                CURRENT_TERM,
                "carol",
                30,
                meeting(Weekday::Fri, (9, 0), (10, 30), "ENG-101"),
            ),
            section(
                "CSE200-A01",
                "CSE200",
                CURRENT_TERM,
                "carol",
                1,
                meeting(Weekday::Mon, (9, 30), (11, 0), "ENG-102"),
            ),
            section(
                "CSE210-A01",
                "CSE210",
                CURRENT_TERM,
                "dave",
                2,
                meeting(Weekday::Mon, (10, 30), (12, 0), "ENG-103"),
            ),
            section(
                "CSE300-A01",
                "CSE300",
                CURRENT_TERM,
                "dave",
                2,
                meeting(Weekday::Mon, (9, 0), (10, 30), "ENG-104"),
            ),
            section(
                "CSE360-A01",
                "CSE360",
                CURRENT_TERM,
                "dave",
                2,
                meeting(Weekday::Thu, (13, 0), (14, 30), "ENG-105"),
            ),
        ],
        enrollments: vec![
            EnrollmentRecord::graded(
                StudentId::new("alice"),
                &cse100_fall,
                Grade::Score(95.0),
                graded_at,
            ),
            EnrollmentRecord::graded(
                StudentId::new("bob"),
                &cse100_fall,
                Grade::Score(55.0),
                graded_at,
            ),
        ],
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use registrar::enrollment::{EnrollmentStatus, RegistrarRepository};
    use std::io::Write;

    #[test]
    fn sample_catalog_is_consistent() {
        let store = load_registrar(None).expect("sample catalog loads");
        let bob = store
            .enrollment(&StudentId::new("bob"), &SectionId::new("CSE100-A01"))
            .expect("lookup")
            .expect("history present");
        assert_eq!(bob.status, EnrollmentStatus::Failed);
    }

    #[test]
    fn catalog_files_are_parsed_and_checked() {
        let dir = std::env::temp_dir().join(format!("registrar-catalog-{}", std::process::id()));
        std::fs::create_dir_all(&dir).expect("temp dir");

        let valid = dir.join("valid.json");
        std::fs::File::create(&valid)
            .and_then(|mut file| {
                file.write_all(
                    br#"{"courses": [{"code": "CSE100", "name": "Intro", "credits": 3, "department": "CSE"}]}"#,
                )
            })
            .expect("write catalog");
        let store = load_registrar(Some(&valid)).expect("valid catalog");
        assert!(store
            .course(&CourseCode::new("CSE100"))
            .expect("lookup")
            .is_some());

        let malformed = dir.join("malformed.json");
        std::fs::write(&malformed, b"{ not json").expect("write catalog");
        match load_registrar(Some(&malformed)) {
            Err(AppError::CatalogFormat(_)) => {}
            other => panic!("expected malformed catalog, got {:?}", other.err()),
        }

        let dangling = dir.join("dangling.json");
        std::fs::write(
            &dangling,
            br#"{"sections": [{"id": "X-01", "course": "NOPE", "term": "2026SPR", "instructor": "carol", "capacity": 1}]}"#,
        )
        .expect("write catalog");
        match load_registrar(Some(&dangling)) {
            Err(AppError::Catalog(_)) => {}
            other => panic!("expected inconsistent catalog, got {:?}", other.err()),
        }

        std::fs::remove_dir_all(&dir).ok();
    }
}
