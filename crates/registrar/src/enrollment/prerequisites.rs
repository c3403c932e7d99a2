use std::collections::BTreeSet;

use serde::Serialize;

use super::domain::{CourseCode, EnrollmentRecord, PrerequisiteEdge};
use super::grading::{rank, Grade, GradePoints};

/// Per-edge evaluation, kept for previews and transcript tooling.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PrerequisiteStatus {
    pub course: CourseCode,
    pub minimum: Grade,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub attained: Option<Grade>,
    pub satisfied: bool,
}

/// Most recent graded attempt at `course`, across every section and term.
fn latest_graded<'a>(
    course: &CourseCode,
    history: &'a [EnrollmentRecord],
) -> Option<&'a EnrollmentRecord> {
    history
        .iter()
        .filter(|record| &record.course == course && record.status.is_graded())
        .filter(|record| record.grade.is_some())
        .max_by_key(|record| record.graded_at.unwrap_or(record.updated_at))
}

fn meets(attained: Option<GradePoints>, required: GradePoints) -> bool {
    matches!(attained, Some(points) if points >= required)
}

/// Evaluates every edge against the student's history. Every edge is treated as
/// required regardless of its declared mode.
pub fn prerequisite_report(
    edges: &[PrerequisiteEdge],
    history: &[EnrollmentRecord],
) -> Vec<PrerequisiteStatus> {
    edges
        .iter()
        .map(|edge| {
            let attained = latest_graded(&edge.prerequisite, history).and_then(|record| record.grade);
            let satisfied = meets(rank(attained.as_ref()), edge.minimum.points());
            PrerequisiteStatus {
                course: edge.prerequisite.clone(),
                minimum: edge.minimum,
                attained,
                satisfied,
            }
        })
        .collect()
}

/// Course codes whose requirement is unmet; empty means the student qualifies.
pub fn missing_prerequisites(
    edges: &[PrerequisiteEdge],
    history: &[EnrollmentRecord],
) -> BTreeSet<CourseCode> {
    prerequisite_report(edges, history)
        .into_iter()
        .filter(|status| !status.satisfied)
        .map(|status| status.course)
        .collect()
}
