use std::fmt;
use std::iter::Sum;
use std::ops::{Add, AddAssign};
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize, Serializer};

use super::grading::{Grade, GradePoints};
use super::schedule::Meeting;

macro_rules! string_id {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(pub String);

        impl $name {
            pub fn new(value: impl Into<String>) -> Self {
                Self(value.into())
            }

            pub fn as_str(&self) -> &str {
                &self.0
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(&self.0)
            }
        }
    };
}

string_id!(
    /// Registrar-issued student number.
    StudentId
);
string_id!(
    /// Catalog code such as `CSE200`.
    CourseCode
);
string_id!(
    /// Identifier of one scheduled offering of a course.
    SectionId
);
string_id!(InstructorId);
string_id!(
    /// Academic term code such as `2025FALL`.
    TermCode
);
string_id!(
    /// Identifier assigned to a student-initiated request.
    RequestId
);

/// Credit weight kept in tenths of a unit so sums stay exact.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Credits(u32);

impl Credits {
    pub const ZERO: Self = Credits(0);

    pub const fn from_tenths(tenths: u32) -> Self {
        Self(tenths)
    }

    pub const fn whole(units: u32) -> Self {
        Self(units * 10)
    }

    pub const fn tenths(self) -> u32 {
        self.0
    }

    pub fn as_f64(self) -> f64 {
        f64::from(self.0) / 10.0
    }

    pub const fn is_zero(self) -> bool {
        self.0 == 0
    }

    pub const fn saturating_sub(self, other: Self) -> Self {
        Self(self.0.saturating_sub(other.0))
    }

    fn from_units(units: f64) -> Result<Self, ParseCreditsError> {
        if !units.is_finite() || units < 0.0 {
            return Err(ParseCreditsError(units.to_string()));
        }
        let tenths = (units * 10.0).round();
        if tenths > f64::from(u32::MAX) {
            return Err(ParseCreditsError(units.to_string()));
        }
        Ok(Self(tenths as u32))
    }
}

impl Add for Credits {
    type Output = Self;

    fn add(self, rhs: Self) -> Self::Output {
        Self(self.0.saturating_add(rhs.0))
    }
}

impl AddAssign for Credits {
    fn add_assign(&mut self, rhs: Self) {
        *self = *self + rhs;
    }
}

impl Sum for Credits {
    fn sum<I: Iterator<Item = Self>>(iter: I) -> Self {
        iter.fold(Self::ZERO, Add::add)
    }
}

impl fmt::Display for Credits {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.0 % 10 == 0 {
            write!(f, "{}", self.0 / 10)
        } else {
            write!(f, "{}.{}", self.0 / 10, self.0 % 10)
        }
    }
}

/// Raised when a credit value is negative, non-numeric, or too large.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("invalid credit value `{0}`")]
pub struct ParseCreditsError(pub String);

impl FromStr for Credits {
    type Err = ParseCreditsError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let trimmed = s.trim();
        let units = trimmed
            .parse::<f64>()
            .map_err(|_| ParseCreditsError(trimmed.to_string()))?;
        Self::from_units(units)
    }
}

impl Serialize for Credits {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_f64(self.as_f64())
    }
}

impl<'de> Deserialize<'de> for Credits {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let units = f64::deserialize(deserializer)?;
        Self::from_units(units).map_err(serde::de::Error::custom)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Student {
    pub id: StudentId,
    pub name: String,
    pub department: String,
    pub major: String,
}

/// Whether an edge belongs to a conjunctive or disjunctive group.
///
/// The flag is carried for catalog fidelity only; evaluation treats every edge
/// as required.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RequirementMode {
    #[default]
    AllOf,
    AnyOf,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PrerequisiteEdge {
    pub prerequisite: CourseCode,
    pub minimum: Grade,
    #[serde(default)]
    pub mode: RequirementMode,
}

impl PrerequisiteEdge {
    pub fn all_of(prerequisite: CourseCode, minimum: Grade) -> Self {
        Self {
            prerequisite,
            minimum,
            mode: RequirementMode::AllOf,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Course {
    pub code: CourseCode,
    pub name: String,
    pub credits: Credits,
    pub department: String,
    #[serde(default)]
    pub prerequisites: Vec<PrerequisiteEdge>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Section {
    pub id: SectionId,
    pub course: CourseCode,
    pub term: TermCode,
    pub instructor: InstructorId,
    pub capacity: u32,
    #[serde(default)]
    pub meetings: Vec<Meeting>,
    #[serde(default)]
    pub grades_locked: bool,
}

/// Closed set of enrollment states.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EnrollmentStatus {
    Enrolling,
    Dropped,
    Passed,
    Failed,
    RetakePending,
}

impl EnrollmentStatus {
    pub const fn label(self) -> &'static str {
        match self {
            EnrollmentStatus::Enrolling => "enrolling",
            EnrollmentStatus::Dropped => "dropped",
            EnrollmentStatus::Passed => "passed",
            EnrollmentStatus::Failed => "failed",
            EnrollmentStatus::RetakePending => "retake_pending",
        }
    }

    /// Statuses that held a timeslot in their term.
    pub const fn is_active(self) -> bool {
        matches!(
            self,
            EnrollmentStatus::Enrolling | EnrollmentStatus::Passed | EnrollmentStatus::Failed
        )
    }

    pub const fn occupies_seat(self) -> bool {
        matches!(self, EnrollmentStatus::Enrolling)
    }

    pub const fn is_graded(self) -> bool {
        matches!(self, EnrollmentStatus::Passed | EnrollmentStatus::Failed)
    }
}

/// One (student, section) slot. Grade and points are present exactly when the
/// status is passed or failed; the mutators below keep that in step.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EnrollmentRecord {
    pub student: StudentId,
    pub section: SectionId,
    pub course: CourseCode,
    pub term: TermCode,
    pub status: EnrollmentStatus,
    pub grade: Option<Grade>,
    pub grade_points: Option<GradePoints>,
    pub graded_at: Option<DateTime<Utc>>,
    pub updated_at: DateTime<Utc>,
}

impl EnrollmentRecord {
    pub fn new(
        student: StudentId,
        section: &Section,
        status: EnrollmentStatus,
        now: DateTime<Utc>,
    ) -> Self {
        Self {
            student,
            section: section.id.clone(),
            course: section.course.clone(),
            term: section.term.clone(),
            status,
            grade: None,
            grade_points: None,
            graded_at: None,
            updated_at: now,
        }
    }

    /// Builds an already graded record, mostly for seeding historical data.
    pub fn graded(student: StudentId, section: &Section, grade: Grade, now: DateTime<Utc>) -> Self {
        let mut record = Self::new(student, section, EnrollmentStatus::Enrolling, now);
        record.apply_grade(grade, now);
        record
    }

    pub fn mark_enrolling(&mut self, now: DateTime<Utc>) {
        self.set_ungraded(EnrollmentStatus::Enrolling, now);
    }

    pub fn mark_dropped(&mut self, now: DateTime<Utc>) {
        self.set_ungraded(EnrollmentStatus::Dropped, now);
    }

    pub fn mark_retake_pending(&mut self, now: DateTime<Utc>) {
        self.set_ungraded(EnrollmentStatus::RetakePending, now);
    }

    pub fn apply_grade(&mut self, grade: Grade, now: DateTime<Utc>) {
        self.status = if grade.is_passing() {
            EnrollmentStatus::Passed
        } else {
            EnrollmentStatus::Failed
        };
        self.grade_points = Some(grade.points());
        self.grade = Some(grade);
        self.graded_at = Some(now);
        self.updated_at = now;
    }

    fn set_ungraded(&mut self, status: EnrollmentStatus, now: DateTime<Utc>) {
        self.status = status;
        self.grade = None;
        self.grade_points = None;
        self.graded_at = None;
        self.updated_at = now;
    }
}

/// Capability of the caller, resolved once by the authentication layer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    Student,
    Instructor,
    Administrator,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Actor {
    pub id: String,
    pub role: Role,
}

impl Actor {
    pub fn new(id: impl Into<String>, role: Role) -> Self {
        Self {
            id: id.into(),
            role,
        }
    }

    pub fn is_administrator(&self) -> bool {
        self.role == Role::Administrator
    }

    pub fn teaches(&self, section: &Section) -> bool {
        self.role == Role::Instructor && self.id == section.instructor.0
    }
}
