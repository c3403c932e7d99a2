mod common;

mod approvals;
