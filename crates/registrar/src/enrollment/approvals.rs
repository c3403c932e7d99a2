use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::domain::{Actor, Credits, RequestId, Role, Section, SectionId, StudentId};

/// Student-initiated action, resolved once at the boundary.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum RequestKind {
    Enroll {
        section: SectionId,
    },
    Drop {
        section: SectionId,
    },
    Retake {
        section: SectionId,
    },
    CrossDepartment {
        section: SectionId,
    },
    CreditOverload {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        section: Option<SectionId>,
        requested: Credits,
    },
}

impl RequestKind {
    pub fn label(&self) -> &'static str {
        match self {
            RequestKind::Enroll { .. } => "enroll",
            RequestKind::Drop { .. } => "drop",
            RequestKind::Retake { .. } => "retake",
            RequestKind::CrossDepartment { .. } => "cross_department",
            RequestKind::CreditOverload { .. } => "credit_overload",
        }
    }

    pub fn section(&self) -> Option<&SectionId> {
        match self {
            RequestKind::Enroll { section }
            | RequestKind::Drop { section }
            | RequestKind::Retake { section }
            | RequestKind::CrossDepartment { section } => Some(section),
            RequestKind::CreditOverload { section, .. } => section.as_ref(),
        }
    }

    /// Kinds that wait for a reviewer instead of executing immediately.
    pub fn requires_approval(&self) -> bool {
        !matches!(self, RequestKind::Enroll { .. } | RequestKind::Drop { .. })
    }

    pub fn administrators_only(&self) -> bool {
        matches!(self, RequestKind::Retake { .. })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RequestStatus {
    Pending,
    Approved,
    Rejected,
}

impl RequestStatus {
    pub const fn label(self) -> &'static str {
        match self {
            RequestStatus::Pending => "pending",
            RequestStatus::Approved => "approved",
            RequestStatus::Rejected => "rejected",
        }
    }

    pub const fn is_terminal(self) -> bool {
        !matches!(self, RequestStatus::Pending)
    }
}

impl fmt::Display for RequestStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Decision {
    Approved,
    Rejected,
}

impl Decision {
    pub const fn status(self) -> RequestStatus {
        match self {
            Decision::Approved => RequestStatus::Approved,
            Decision::Rejected => RequestStatus::Rejected,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StudentRequest {
    pub id: RequestId,
    pub student: StudentId,
    pub kind: RequestKind,
    #[serde(default)]
    pub reason: String,
    pub status: RequestStatus,
    pub submitted_at: DateTime<Utc>,
    pub reviewed_by: Option<String>,
    pub reviewed_at: Option<DateTime<Utc>>,
}

/// Raised when a decision targets a request that is no longer pending.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("request {request} is already {status}")]
pub struct AlreadyDecided {
    pub request: RequestId,
    pub status: RequestStatus,
}

impl StudentRequest {
    pub fn pending(
        id: RequestId,
        student: StudentId,
        kind: RequestKind,
        reason: impl Into<String>,
        now: DateTime<Utc>,
    ) -> Self {
        Self {
            id,
            student,
            kind,
            reason: reason.into(),
            status: RequestStatus::Pending,
            submitted_at: now,
            reviewed_by: None,
            reviewed_at: None,
        }
    }

    /// Moves a pending request to its terminal status and returns the log entry
    /// to persist alongside it.
    pub fn transition(
        &mut self,
        decision: Decision,
        actor: &Actor,
        note: impl Into<String>,
        now: DateTime<Utc>,
    ) -> Result<ApprovalLog, AlreadyDecided> {
        if self.status.is_terminal() {
            return Err(AlreadyDecided {
                request: self.id.clone(),
                status: self.status,
            });
        }

        self.status = decision.status();
        self.reviewed_by = Some(actor.id.clone());
        self.reviewed_at = Some(now);

        Ok(ApprovalLog {
            request: self.id.clone(),
            decision,
            actor: actor.clone(),
            note: note.into(),
            recorded_at: now,
        })
    }
}

/// Audit entry written once per decision.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ApprovalLog {
    pub request: RequestId,
    pub decision: Decision,
    pub actor: Actor,
    pub note: String,
    pub recorded_at: DateTime<Utc>,
}

/// Administrators review everything; instructors review non-retake requests
/// that target one of their own sections.
pub fn may_review(actor: &Actor, request: &StudentRequest, section: Option<&Section>) -> bool {
    match actor.role {
        Role::Administrator => true,
        Role::Instructor => {
            !request.kind.administrators_only() && section.is_some_and(|s| actor.teaches(s))
        }
        Role::Student => false,
    }
}
