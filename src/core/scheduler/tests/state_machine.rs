use chrono::Duration;

use super::{date, start};
use crate::core::scheduler::{EventJob, JobState, can_transition};

#[test]
fn forward_transitions_are_allowed() {
    assert!(can_transition(JobState::Pending, JobState::Active));
    assert!(can_transition(JobState::Active, JobState::Removed));
    assert!(can_transition(JobState::Pending, JobState::Removed));
}

#[test]
fn nothing_leaves_removed_or_goes_back() {
    assert!(!can_transition(JobState::Active, JobState::Pending));
    assert!(!can_transition(JobState::Removed, JobState::Active));
    assert!(!can_transition(JobState::Removed, JobState::Pending));
}

#[test]
fn new_job_is_pending_at_start_minus_lead() {
    let job = EventJob::new("E1", start(), date(), Duration::minutes(5));
    assert_eq!(job.state, JobState::Pending);
    assert_eq!(job.next_run, start() - Duration::minutes(5));
    assert!(!job.in_flight);
    assert!(!job.terminal_observed);
}

#[test]
fn illegal_transition_leaves_state_alone() {
    let mut job = EventJob::new("E1", start(), date(), Duration::zero());
    assert!(job.transition(JobState::Active));
    assert!(!job.transition(JobState::Pending));
    assert_eq!(job.state, JobState::Active);
}
