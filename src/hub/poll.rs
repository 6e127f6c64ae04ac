//! Poll ledger: vote tallies with one counted vote per identity.
//!
//! Options are fixed at construction (two in the default config; the
//! algorithm does not care how many). Counts start from configured nonzero
//! seeds, so the poll reads as already in progress. Percentages are rounded
//! half-up independently per option and need not sum to exactly 100.

use std::collections::HashMap;

use axum::{extract::State, Json};
use chrono::Utc;
use parking_lot::Mutex;
use serde::Serialize;

use crate::error::HubError;
use crate::state::AppState;

/// Per-identity record of the counted vote.
#[derive(Debug, Clone)]
struct VoteRecord {
    option: usize,
    #[allow(dead_code)]
    voted_at: u64,
}

struct OptionTally {
    label: String,
    seed: u64,
    votes: u64,
}

struct PollInner {
    options: Vec<OptionTally>,
    total: u64,
    voters: HashMap<String, VoteRecord>,
    updated_at: u64,
}

/// Read-only copy of the tally, as sent to clients.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PollState {
    pub options: Vec<PollOptionState>,
    pub total: u64,
    pub updated_at: u64,
}

#[derive(Debug, Clone, Serialize)]
pub struct PollOptionState {
    pub label: String,
    pub votes: u64,
    pub percentage: u32,
}

/// Round-half-up of votes*100/total. A zero total (only reachable when the
/// seeds are configured to zero) falls back to an even split.
fn percentage(votes: u64, total: u64, option_count: usize) -> u32 {
    if total == 0 {
        (100 / option_count.max(1)) as u32
    } else {
        ((votes * 200 + total) / (2 * total)) as u32
    }
}

impl PollInner {
    fn snapshot(&self) -> PollState {
        PollState {
            options: self
                .options
                .iter()
                .map(|o| PollOptionState {
                    label: o.label.clone(),
                    votes: o.votes,
                    percentage: percentage(o.votes, self.total, self.options.len()),
                })
                .collect(),
            total: self.total,
            updated_at: self.updated_at,
        }
    }
}

pub struct PollLedger {
    inner: Mutex<PollInner>,
}

impl PollLedger {
    /// Build a ledger from (label, seed count) pairs.
    pub fn new(options: Vec<(String, u64)>) -> Self {
        let tallies: Vec<OptionTally> = options
            .into_iter()
            .map(|(label, seed)| OptionTally {
                label,
                seed,
                votes: seed,
            })
            .collect();
        let total = tallies.iter().map(|o| o.votes).sum();
        Self {
            inner: Mutex::new(PollInner {
                options: tallies,
                total,
                voters: HashMap::new(),
                updated_at: Utc::now().timestamp_millis() as u64,
            }),
        }
    }

    /// Cast or switch a vote.
    ///
    /// First vote from an identity increments the option and the total. A
    /// repeat vote for the same option fails with `DuplicateVote` and
    /// changes nothing. A vote for a different option moves exactly one
    /// vote between options, total unchanged.
    pub fn vote(&self, identity: &str, option: &str) -> Result<PollState, HubError> {
        let mut inner = self.inner.lock();
        let index = inner
            .options
            .iter()
            .position(|o| o.label == option)
            .ok_or_else(|| HubError::InvalidOption(option.to_string()))?;

        match inner.voters.get(identity).map(|r| r.option) {
            None => {
                inner.options[index].votes += 1;
                inner.total += 1;
            }
            Some(prior) if prior == index => {
                return Err(HubError::DuplicateVote(option.to_string()));
            }
            Some(prior) => {
                inner.options[prior].votes -= 1;
                inner.options[index].votes += 1;
            }
        }

        let now = Utc::now().timestamp_millis() as u64;
        inner.voters.insert(
            identity.to_string(),
            VoteRecord {
                option: index,
                voted_at: now,
            },
        );
        inner.updated_at = now;
        Ok(inner.snapshot())
    }

    /// Restore the seeded baseline and forget every vote record.
    pub fn reset(&self) -> PollState {
        let mut inner = self.inner.lock();
        for option in &mut inner.options {
            option.votes = option.seed;
        }
        inner.total = inner.options.iter().map(|o| o.votes).sum();
        inner.voters.clear();
        inner.updated_at = Utc::now().timestamp_millis() as u64;
        inner.snapshot()
    }

    pub fn status(&self) -> PollState {
        self.inner.lock().snapshot()
    }

    pub fn vote_total(&self) -> u64 {
        self.inner.lock().total
    }
}

// --- REST endpoint handlers ---

/// GET /api/poll — Current tally, side-effect-free.
pub async fn get_poll(State(state): State<AppState>) -> Json<PollState> {
    Json(state.poll.status())
}
