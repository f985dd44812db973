//! Event-correlation heuristics over a merge request's notes and commits.

use chrono::{DateTime, Utc};

use crate::gitlab::types::{Commit, Note};
use crate::stats::hours_between;

const READY_PATTERNS: [&str; 2] = [
    "marked this merge request as ready",
    "marked this merge request as ready to merge",
];

/// Work is considered started when the MR was created, unless a later system
/// note marks it ready for review; with multiple ready notes the last one
/// wins. A "marked as draft" note does not reset the start time — only the
/// last ready transition counts.
pub fn find_ready_time(created_at: DateTime<Utc>, notes: &[Note]) -> DateTime<Utc> {
    let mut ready_time = created_at;
    for note in notes.iter().filter(|n| n.system) {
        let body = note.body.as_deref().unwrap_or("").to_lowercase();
        if READY_PATTERNS.iter().any(|p| body.contains(p)) {
            ready_time = note.created_at;
        }
    }
    ready_time
}

fn note_author(note: &Note) -> Option<&str> {
    note.author.as_ref().and_then(|a| a.username.as_deref())
}

fn is_review_note(note: &Note, mr_author: &str) -> bool {
    !note.system && note_author(note).is_some_and(|author| author != mr_author)
}

/// Hours from creation to the first non-system note by someone other than
/// the author, or `None` if no such note exists.
pub fn time_to_first_review(
    created_at: DateTime<Utc>,
    mr_author: &str,
    notes: &[Note],
) -> Option<f64> {
    notes
        .iter()
        .filter(|n| is_review_note(n, mr_author))
        .find(|n| n.created_at >= created_at)
        .map(|n| hours_between(created_at, n.created_at))
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Event {
    Review,
    Commit,
}

#[derive(Debug, PartialEq, Eq)]
enum RoundState {
    Idle,
    AwaitingCommit,
}

/// One review round is a reviewer note followed by an author commit. Repeated
/// reviews before a commit collapse into a single pending round; a commit
/// with no review pending is a no-op.
fn fold_rounds(events: &[(DateTime<Utc>, Event)]) -> u32 {
    let mut rounds = 0;
    let mut state = RoundState::Idle;
    for (_, event) in events {
        match event {
            Event::Review => state = RoundState::AwaitingCommit,
            Event::Commit => {
                if state == RoundState::AwaitingCommit {
                    rounds += 1;
                    state = RoundState::Idle;
                }
            }
        }
    }
    rounds
}

/// Count review rounds from the merged, time-sorted stream of reviewer notes
/// and commits inside `[start_time, merged_at]`.
pub fn count_review_rounds(
    mr_author: &str,
    notes: &[Note],
    commits: &[Commit],
    start_time: DateTime<Utc>,
    merged_at: DateTime<Utc>,
) -> u32 {
    let in_window = |t: DateTime<Utc>| t >= start_time && t <= merged_at;

    let mut events: Vec<(DateTime<Utc>, Event)> = notes
        .iter()
        .filter(|n| is_review_note(n, mr_author) && in_window(n.created_at))
        .map(|n| (n.created_at, Event::Review))
        .collect();
    events.extend(
        commits
            .iter()
            .filter(|c| in_window(c.created_at))
            .map(|c| (c.created_at, Event::Commit)),
    );
    events.sort_by_key(|(t, _)| *t);

    fold_rounds(&events)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SizeBucket {
    Xs,
    S,
    M,
    L,
    Xl,
    Unknown,
}

impl SizeBucket {
    /// Bucket boundaries are inclusive on the upper bound.
    pub fn from_files_changed(files_changed: Option<usize>) -> Self {
        match files_changed {
            None => Self::Unknown,
            Some(n) if n <= 3 => Self::Xs,
            Some(n) if n <= 10 => Self::S,
            Some(n) if n <= 25 => Self::M,
            Some(n) if n <= 50 => Self::L,
            Some(_) => Self::Xl,
        }
    }
}
