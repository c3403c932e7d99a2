use serde::Serialize;

use super::approvals::{RequestStatus, StudentRequest};
use super::capacity::{remaining_seats, seats_taken};
use super::domain::{
    CourseCode, Credits, EnrollmentRecord, EnrollmentStatus, Section, SectionId, StudentId,
    TermCode,
};
use super::grading::{Grade, GradePoints};

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TranscriptLine {
    pub term: TermCode,
    pub course: CourseCode,
    pub section: SectionId,
    pub credits: Credits,
    pub status: EnrollmentStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub grade: Option<Grade>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub grade_points: Option<GradePoints>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Transcript {
    pub student: StudentId,
    pub lines: Vec<TranscriptLine>,
    pub earned_credits: Credits,
    /// `None` until at least one credit-bearing enrollment is graded.
    pub gpa: Option<f64>,
}

impl Transcript {
    pub fn new(student: StudentId, mut lines: Vec<TranscriptLine>) -> Self {
        lines.sort_by(|a, b| {
            a.term
                .cmp(&b.term)
                .then_with(|| a.course.cmp(&b.course))
                .then_with(|| a.section.cmp(&b.section))
        });
        let earned_credits = lines
            .iter()
            .filter(|line| line.status == EnrollmentStatus::Passed)
            .map(|line| line.credits)
            .sum();
        let gpa = cumulative_gpa(lines.iter().map(|line| (line.credits, line.grade_points)));

        Self {
            student,
            lines,
            earned_credits,
            gpa,
        }
    }
}

/// Credit-weighted mean of grade points over graded attempts, to two decimals.
pub fn cumulative_gpa<I>(attempts: I) -> Option<f64>
where
    I: IntoIterator<Item = (Credits, Option<GradePoints>)>,
{
    let (weighted, credits) = attempts
        .into_iter()
        .filter_map(|(credits, points)| points.map(|points| (credits, points)))
        .fold((0.0_f64, 0.0_f64), |(weighted, total), (credits, points)| {
            let credits = credits.as_f64();
            (weighted + credits * f64::from(points.value()), total + credits)
        });

    if credits == 0.0 {
        None
    } else {
        Some((weighted / credits * 100.0).round() / 100.0)
    }
}

/// Seat usage and grading progress for one section.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SectionOverview {
    pub section: SectionId,
    pub course: CourseCode,
    pub term: TermCode,
    pub capacity: u32,
    pub enrolled: u32,
    pub remaining: u32,
    pub passed: u32,
    pub failed: u32,
    pub in_progress: u32,
    pub grades_locked: bool,
}

impl SectionOverview {
    pub fn from_roster(section: &Section, roster: &[EnrollmentRecord]) -> Self {
        let mut overview = Self {
            section: section.id.clone(),
            course: section.course.clone(),
            term: section.term.clone(),
            capacity: section.capacity,
            enrolled: seats_taken(roster),
            remaining: remaining_seats(section, roster),
            passed: 0,
            failed: 0,
            in_progress: 0,
            grades_locked: section.grades_locked,
        };

        for record in roster {
            match record.status {
                EnrollmentStatus::Passed => overview.passed += 1,
                EnrollmentStatus::Failed => overview.failed += 1,
                EnrollmentStatus::Enrolling => overview.in_progress += 1,
                EnrollmentStatus::Dropped | EnrollmentStatus::RetakePending => {}
            }
        }

        overview
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct RequestSummary {
    pub pending: u32,
    pub approved: u32,
    pub rejected: u32,
}

impl RequestSummary {
    pub fn tally<'a, I>(requests: I) -> Self
    where
        I: IntoIterator<Item = &'a StudentRequest>,
    {
        requests
            .into_iter()
            .fold(Self::default(), |mut summary, request| {
                match request.status {
                    RequestStatus::Pending => summary.pending += 1,
                    RequestStatus::Approved => summary.approved += 1,
                    RequestStatus::Rejected => summary.rejected += 1,
                }
                summary
            })
    }
}
