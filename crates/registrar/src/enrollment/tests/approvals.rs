use super::common::*;
use chrono::Weekday;

use crate::enrollment::approvals::{Decision, RequestKind, RequestStatus};
use crate::enrollment::domain::{Credits, EnrollmentStatus};
use crate::enrollment::rejection::{EnrollmentError, RejectionReason};
use crate::enrollment::repository::RegistrarRepository;
use crate::enrollment::service::{RequestSubmission, Submission, WorkflowError};
use crate::enrollment::transcript::RequestSummary;

fn submission(student: &str, kind: RequestKind) -> RequestSubmission {
    RequestSubmission {
        student: sid(student),
        kind,
        reason: "please".to_string(),
    }
}

fn with_fall_cse100(store: &crate::enrollment::InMemoryRegistrar) {
    store
        .insert_section(section(
            "CSE100-02",
            "CSE100",
            FALL,
            30,
            vec![slot(Weekday::Wed, (9, 0), (10, 30))],
        ))
        .expect("section");
}

#[test]
fn enroll_requests_execute_immediately() {
    let store = seeded_store();
    let service = service(&store);

    let outcome = service
        .submit(
            &acting_student("alice"),
            submission(
                "alice",
                RequestKind::Enroll {
                    section: sec("CSE200-01"),
                },
            ),
        )
        .expect("enroll request");

    match &outcome {
        Submission::Completed {
            request,
            enrollment,
        } => {
            assert_eq!(request.status, RequestStatus::Approved);
            assert_eq!(enrollment.status, EnrollmentStatus::Enrolling);
        }
        other => panic!("expected completed submission, got {other:?}"),
    }
    assert_eq!(
        service.request_summary(&sid("alice")).expect("summary"),
        RequestSummary {
            pending: 0,
            approved: 1,
            rejected: 0,
        }
    );
}

#[test]
fn rejected_enroll_requests_persist_nothing() {
    let store = seeded_store();
    let service = service(&store);

    match service.submit(
        &acting_student("bob"),
        submission(
            "bob",
            RequestKind::Enroll {
                section: sec("CSE200-01"),
            },
        ),
    ) {
        Err(WorkflowError::Enrollment(EnrollmentError::Rejected(
            RejectionReason::PrerequisitesNotMet { .. },
        ))) => {}
        other => panic!("expected prerequisite rejection, got {other:?}"),
    }

    assert_eq!(
        service.request_summary(&sid("bob")).expect("summary"),
        RequestSummary::default()
    );
    assert!(store
        .enrollment(&sid("bob"), &sec("CSE200-01"))
        .expect("lookup")
        .is_none());
}

#[test]
fn retake_approval_places_the_student() {
    let store = seeded_store();
    with_fall_cse100(&store);
    let service = service(&store);

    let pending = service
        .submit(
            &acting_student("alice"),
            submission(
                "alice",
                RequestKind::Retake {
                    section: sec("CSE100-02"),
                },
            ),
        )
        .expect("retake request");
    let request = match pending {
        Submission::Pending { request } => request,
        other => panic!("expected pending submission, got {other:?}"),
    };
    let placeholder = store
        .enrollment(&sid("alice"), &sec("CSE100-02"))
        .expect("lookup")
        .expect("placeholder");
    assert_eq!(placeholder.status, EnrollmentStatus::RetakePending);

    match service.decide(&instructor("carol"), &request.id, Decision::Approved, "") {
        Err(WorkflowError::Unauthorized { .. }) => {}
        other => panic!("expected instructors to be refused retakes, got {other:?}"),
    }

    let outcome = service
        .decide(
            &administrator(),
            &request.id,
            Decision::Approved,
            "grade replacement",
        )
        .expect("approval");
    assert_eq!(outcome.request.status, RequestStatus::Approved);
    assert_eq!(
        outcome.enrollment.as_ref().map(|record| record.status),
        Some(EnrollmentStatus::Enrolling)
    );
    assert_eq!(outcome.log.note, "grade replacement");

    let history = service.approval_history(&request.id).expect("history");
    assert_eq!(history.len(), 1);
    assert_eq!(history[0].decision, Decision::Approved);

    match service.decide(&administrator(), &request.id, Decision::Rejected, "") {
        Err(WorkflowError::AlreadyDecided(error)) => {
            assert_eq!(error.status, RequestStatus::Approved)
        }
        other => panic!("expected already decided, got {other:?}"),
    }
    assert_eq!(service.approval_history(&request.id).expect("history").len(), 1);
}

#[test]
fn approved_retake_outlives_a_later_drop() {
    let store = seeded_store();
    with_fall_cse100(&store);
    let service = service(&store);

    let request = service
        .submit(
            &acting_student("alice"),
            submission(
                "alice",
                RequestKind::Retake {
                    section: sec("CSE100-02"),
                },
            ),
        )
        .expect("retake request")
        .request()
        .clone();
    service
        .decide(&administrator(), &request.id, Decision::Approved, "")
        .expect("approval");

    let dropped = service
        .withdraw(&acting_student("alice"), &sid("alice"), &sec("CSE100-02"))
        .expect("drop");
    assert_eq!(dropped.status, EnrollmentStatus::Dropped);

    let record = service
        .enroll(&acting_student("alice"), &sid("alice"), &sec("CSE100-02"))
        .expect("approved retake still stands");
    assert_eq!(record.status, EnrollmentStatus::Enrolling);
}

#[test]
fn rejected_retake_releases_the_placeholder() {
    let store = seeded_store();
    with_fall_cse100(&store);
    let service = service(&store);

    let request = service
        .submit(
            &acting_student("alice"),
            submission(
                "alice",
                RequestKind::Retake {
                    section: sec("CSE100-02"),
                },
            ),
        )
        .expect("retake request")
        .request()
        .clone();

    service
        .decide(&administrator(), &request.id, Decision::Rejected, "already passed")
        .expect("rejection");

    let record = store
        .enrollment(&sid("alice"), &sec("CSE100-02"))
        .expect("lookup")
        .expect("record");
    assert_eq!(record.status, EnrollmentStatus::Dropped);
    assert_eq!(
        service.request_summary(&sid("alice")).expect("summary"),
        RequestSummary {
            pending: 0,
            approved: 0,
            rejected: 1,
        }
    );

    match service.enroll(&acting_student("alice"), &sid("alice"), &sec("CSE100-02")) {
        Err(WorkflowError::Enrollment(EnrollmentError::Rejected(
            RejectionReason::AlreadyPassed { .. },
        ))) => {}
        other => panic!("a rejected retake must not lift the guard, got {other:?}"),
    }
}

#[test]
fn failed_approval_leaves_the_request_pending() {
    let store = seeded_store();
    let service = service(&store);

    let request = service
        .submit(
            &acting_student("bob"),
            submission(
                "bob",
                RequestKind::CrossDepartment {
                    section: sec("CSE200-01"),
                },
            ),
        )
        .expect("cross-department request")
        .request()
        .clone();

    match service.decide(&instructor("carol"), &request.id, Decision::Approved, "") {
        Err(WorkflowError::Enrollment(EnrollmentError::Rejected(
            RejectionReason::PrerequisitesNotMet { .. },
        ))) => {}
        other => panic!("approval must not bypass eligibility, got {other:?}"),
    }

    let stored = store
        .fetch_request(&request.id)
        .expect("lookup")
        .expect("request");
    assert_eq!(stored.status, RequestStatus::Pending);
    assert!(service
        .approval_history(&request.id)
        .expect("history")
        .is_empty());
}

#[test]
fn overload_approval_widens_the_ceiling_for_that_admission() {
    let store = seeded_store();
    store
        .insert_course(course("ELEC101", 3, &[]))
        .expect("course");
    store
        .insert_section(section(
            "ELEC101-01",
            "ELEC101",
            FALL,
            10,
            vec![slot(Weekday::Thu, (14, 0), (15, 30))],
        ))
        .expect("section");
    let service = service(&store);
    let alice = acting_student("alice");

    service
        .enroll(&alice, &sid("alice"), &sec("THESIS-01"))
        .expect("thesis");
    service
        .enroll(&alice, &sid("alice"), &sec("CSE210-01"))
        .expect("discrete maths");
    match service.enroll(&alice, &sid("alice"), &sec("ELEC101-01")) {
        Err(WorkflowError::Enrollment(EnrollmentError::Rejected(
            RejectionReason::CreditLoadExceeded { .. },
        ))) => {}
        other => panic!("expected credit ceiling, got {other:?}"),
    }

    let request = service
        .submit(
            &alice,
            submission(
                "alice",
                RequestKind::CreditOverload {
                    section: Some(sec("ELEC101-01")),
                    requested: Credits::whole(45),
                },
            ),
        )
        .expect("overload request")
        .request()
        .clone();
    assert_eq!(request.status, RequestStatus::Pending);

    let outcome = service
        .decide(&administrator(), &request.id, Decision::Approved, "")
        .expect("approval");
    assert_eq!(
        outcome.enrollment.map(|record| record.status),
        Some(EnrollmentStatus::Enrolling)
    );
}

#[test]
fn approval_queue_is_scoped_to_the_reviewer() {
    let store = seeded_store();
    with_fall_cse100(&store);
    let service = service(&store);

    let cross = service
        .submit(
            &acting_student("bob"),
            submission(
                "bob",
                RequestKind::CrossDepartment {
                    section: sec("CSE300-01"),
                },
            ),
        )
        .expect("cross")
        .request()
        .clone();
    service
        .submit(
            &acting_student("alice"),
            submission(
                "alice",
                RequestKind::Retake {
                    section: sec("CSE100-02"),
                },
            ),
        )
        .expect("retake");
    service
        .submit(
            &acting_student("tom"),
            submission(
                "tom",
                RequestKind::CreditOverload {
                    section: None,
                    requested: Credits::whole(44),
                },
            ),
        )
        .expect("overload");

    let dave = service
        .approval_queue(&instructor("dave"), 10)
        .expect("dave's queue");
    assert_eq!(dave.len(), 1);
    assert_eq!(dave[0].id, cross.id);

    let carol = service
        .approval_queue(&instructor("carol"), 10)
        .expect("carol's queue");
    assert!(carol.is_empty(), "retakes belong to administrators");

    let admin = service
        .approval_queue(&administrator(), 10)
        .expect("admin queue");
    assert_eq!(admin.len(), 3);
    assert_eq!(
        service
            .approval_queue(&administrator(), 2)
            .expect("limited")
            .len(),
        2
    );

    match service.approval_queue(&acting_student("bob"), 10) {
        Err(WorkflowError::Unauthorized { .. }) => {}
        other => panic!("expected students to be refused, got {other:?}"),
    }
}

#[test]
fn students_only_act_for_themselves() {
    let store = seeded_store();
    let service = service(&store);

    match service.submit(
        &acting_student("bob"),
        submission(
            "alice",
            RequestKind::Drop {
                section: sec("CSE200-01"),
            },
        ),
    ) {
        Err(WorkflowError::Unauthorized { actor, .. }) => assert_eq!(actor, "bob"),
        other => panic!("expected unauthorized, got {other:?}"),
    }

    service
        .enroll(&administrator(), &sid("alice"), &sec("CSE200-01"))
        .expect("administrators may act on behalf of students");
}
