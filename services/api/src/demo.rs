use crate::infra::load_registrar;
use clap::Args;
use registrar::enrollment::{
    Actor, Decision, EnrollmentError, EnrollmentPolicy, InMemoryRegistrar, RegistrarService,
    RejectionReason, RequestKind, RequestSubmission, Role, SectionId, StudentId, Submission,
    Verdict, WorkflowError,
};
use registrar::error::AppError;
use std::path::PathBuf;
use std::sync::Arc;

#[derive(Args, Debug, Default)]
pub(crate) struct DemoArgs {
    /// JSON catalog to replay against (defaults to the bundled sample)
    #[arg(long)]
    pub(crate) catalog: Option<PathBuf>,
}

type Service = RegistrarService<InMemoryRegistrar>;

pub(crate) fn run_demo(args: DemoArgs) -> Result<(), AppError> {
    let store = Arc::new(load_registrar(args.catalog.as_deref())?);
    let service = RegistrarService::new(store, EnrollmentPolicy::default());
    let admin = Actor::new("admin", Role::Administrator);
    let carol = Actor::new("carol", Role::Instructor);
    let (alice, bob) = (StudentId::new("alice"), StudentId::new("bob"));

    println!("Enrollment demo");

    println!("\nEligibility previews");
    for (student, section) in [
        (&alice, "CSE200-A01"),
        (&bob, "CSE200-A01"),
        (&alice, "CSE100-B01"),
    ] {
        preview(&service, student, section);
    }

    println!("\nAdmissions");
    for (student, section) in [
        (&alice, "CSE200-A01"),
        (&bob, "CSE100-B01"),
        (&bob, "CSE200-A01"),
        (&alice, "CSE210-A01"),
        (&alice, "CSE360-A01"),
    ] {
        let outcome = service.enroll(&admin, student, &SectionId::new(section));
        println!(
            "  {student} -> {section}: {}",
            describe(outcome.map(|record| record.status.label().to_string()))
        );
    }

    println!("\nRetake request");
    let submission = service.submit(
        &Actor::new("alice", Role::Student),
        RequestSubmission {
            student: alice.clone(),
            kind: RequestKind::Retake {
                section: SectionId::new("CSE100-B01"),
            },
            reason: "grade replacement".to_string(),
        },
    );
    match submission {
        Ok(Submission::Pending { request }) => {
            println!("  {} queued ({})", request.id, request.kind.label());
            let decided = service
                .decide(&admin, &request.id, Decision::Approved, "approved by registrar")
                .map(|outcome| {
                    let placed = outcome
                        .enrollment
                        .map(|record| record.status.label().to_string())
                        .unwrap_or_else(|| "no placement".to_string());
                    format!("{} / {placed}", outcome.request.status)
                });
            println!("  decision: {}", describe(decided));
        }
        Ok(Submission::Completed { request, .. }) => {
            println!("  {} executed immediately", request.id);
        }
        Err(error) => println!("  submission failed: {}", describe::<String>(Err(error))),
    }

    println!("\nGrade entry");
    for (student, raw) in [(&bob, "88"), (&bob, "A+")] {
        let outcome = service.record_grade(&carol, &SectionId::new("CSE100-B01"), student, raw);
        println!(
            "  {student} CSE100-B01 '{raw}': {}",
            describe(outcome.map(|record| record.status.label().to_string()))
        );
    }

    println!("\nTranscripts");
    for student in [&alice, &bob] {
        match service.transcript(student) {
            Ok(transcript) => {
                let gpa = transcript
                    .gpa
                    .map(|gpa| format!("{gpa:.2}"))
                    .unwrap_or_else(|| "n/a".to_string());
                println!(
                    "  {student}: {} lines, {} credits earned, GPA {gpa}",
                    transcript.lines.len(),
                    transcript.earned_credits
                );
                for line in &transcript.lines {
                    let grade = line
                        .grade
                        .map(|grade| grade.to_string())
                        .unwrap_or_else(|| "-".to_string());
                    println!(
                        "    {:<8} {:<8} {:<10} {:>4} cr  {:<10} {grade}",
                        line.term.as_str(),
                        line.course.as_str(),
                        line.section.as_str(),
                        line.credits.to_string(),
                        line.status.label()
                    );
                }
            }
            Err(error) => println!("  {student}: {error}"),
        }
    }

    println!("\nSection overview");
    for section in ["CSE100-B01", "CSE200-A01"] {
        match service.section_overview(&SectionId::new(section)) {
            Ok(overview) => println!(
                "  {section}: {}/{} seats taken, {} passed, {} failed, {} in progress",
                overview.enrolled,
                overview.capacity,
                overview.passed,
                overview.failed,
                overview.in_progress
            ),
            Err(error) => println!("  {section}: {error}"),
        }
    }

    Ok(())
}

fn preview(service: &Service, student: &StudentId, section: &str) {
    let verdict = service.evaluate(student, &SectionId::new(section));
    let line = match verdict {
        Ok(Verdict::Eligible) => "eligible".to_string(),
        Ok(Verdict::Rejected { reason }) => rejection_line(&reason),
        Err(error) => format!("error: {error}"),
    };
    println!("  {student} -> {section}: {line}");
}

fn describe<T: std::fmt::Display>(outcome: Result<T, WorkflowError>) -> String {
    match outcome {
        Ok(value) => value.to_string(),
        Err(WorkflowError::Enrollment(EnrollmentError::Rejected(reason))) => rejection_line(&reason),
        Err(error) => format!("error: {error}"),
    }
}

fn rejection_line(reason: &RejectionReason) -> String {
    format!("rejected [{}] {reason}", reason.code())
}
