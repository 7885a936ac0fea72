//! The last revealed outcome, served to listeners that join between rounds.

use rand::Rng;
use roundcast_state::{OUTCOME_LEN, OUTCOME_MAX, OUTCOME_MIN, OutcomeValues, RoundId};
use serde::Serialize;

use crate::events::{LastOutcomePayload, RoundEvent};

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LastOutcome {
    pub outcome_values: OutcomeValues,
    pub updated_at: u64,
    /// `None` for the random placeholder seeded before any round completed.
    pub round_id: Option<RoundId>,
}

impl LastOutcome {
    pub fn to_event(&self, server_now: u64) -> RoundEvent {
        RoundEvent::LastOutcome(LastOutcomePayload {
            outcome_values: self.outcome_values,
            updated_at: self.updated_at,
            round_id: self.round_id.clone(),
            server_now,
        })
    }
}

/// Holds at most one [`LastOutcome`]. Only a successful finalize replaces
/// it; reads seed it once with random values and then return the same
/// value until the next finalize.
#[derive(Debug, Default)]
pub struct OutcomeCache {
    last: Option<LastOutcome>,
}

impl OutcomeCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get_or_seed(&mut self, now: u64) -> &LastOutcome {
        self.get_or_seed_with(now, &mut rand::thread_rng())
    }

    pub fn get_or_seed_with<R: Rng>(&mut self, now: u64, rng: &mut R) -> &LastOutcome {
        self.last.get_or_insert_with(|| LastOutcome {
            outcome_values: random_outcome(rng),
            updated_at: now,
            round_id: None,
        })
    }

    pub fn record(&mut self, outcome_values: OutcomeValues, now: u64, round_id: RoundId) {
        self.last = Some(LastOutcome {
            outcome_values,
            updated_at: now,
            round_id: Some(round_id),
        });
    }
}

fn random_outcome<R: Rng>(rng: &mut R) -> OutcomeValues {
    let raw: [i64; OUTCOME_LEN] =
        std::array::from_fn(|_| rng.gen_range(OUTCOME_MIN..=OUTCOME_MAX));
    OutcomeValues::clamped(raw)
}
