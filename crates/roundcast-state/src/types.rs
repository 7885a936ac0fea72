//! Domain types for the round store.
//!
//! Timestamps are Unix epoch milliseconds. Records are serialized to JSON
//! with camelCase field names, which is also the shape the API returns.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Identifier of a tenant (one chat or channel). One round may be active per tenant.
pub type TenantId = i64;

/// Identifier of the operator who scheduled a round.
pub type UserId = i64;

/// Number of values revealed at the end of every round.
pub const OUTCOME_LEN: usize = 6;

/// Smallest allowed outcome value.
pub const OUTCOME_MIN: i64 = 1;

/// Largest allowed outcome value.
pub const OUTCOME_MAX: i64 = 6;

// ── Round id ──────────────────────────────────────────────────────

/// Identifier assigned by the store when a round is first persisted.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RoundId(String);

impl RoundId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Generate a fresh random id.
    pub fn generate() -> Self {
        Self(uuid::Uuid::new_v4().to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for RoundId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

// ── Outcome values ────────────────────────────────────────────────

/// The six values revealed when a round ends, each in `[1, 6]`.
///
/// Construction validates cardinality and range, so holding an
/// `OutcomeValues` means the input contract already holds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "Vec<i64>", into = "Vec<i64>")]
pub struct OutcomeValues([u8; OUTCOME_LEN]);

impl OutcomeValues {
    /// Validate raw input. Returns `None` unless there are exactly six
    /// values and every value is within `[1, 6]`.
    pub fn new(values: &[i64]) -> Option<Self> {
        if values.len() != OUTCOME_LEN {
            return None;
        }
        let mut out = [0u8; OUTCOME_LEN];
        for (slot, &value) in out.iter_mut().zip(values) {
            if !(OUTCOME_MIN..=OUTCOME_MAX).contains(&value) {
                return None;
            }
            *slot = value as u8;
        }
        Some(Self(out))
    }

    /// Build from raw values, clamping each into `[1, 6]`.
    pub fn clamped(values: [i64; OUTCOME_LEN]) -> Self {
        Self(values.map(|v| v.clamp(OUTCOME_MIN, OUTCOME_MAX) as u8))
    }

    pub fn as_slice(&self) -> &[u8] {
        &self.0
    }

    pub fn to_vec(&self) -> Vec<u8> {
        self.0.to_vec()
    }
}

impl TryFrom<Vec<i64>> for OutcomeValues {
    type Error = String;

    fn try_from(values: Vec<i64>) -> Result<Self, Self::Error> {
        Self::new(&values).ok_or_else(|| {
            format!("expected {OUTCOME_LEN} values in [{OUTCOME_MIN}, {OUTCOME_MAX}], got {values:?}")
        })
    }
}

impl From<OutcomeValues> for Vec<i64> {
    fn from(values: OutcomeValues) -> Self {
        values.0.iter().map(|&v| i64::from(v)).collect()
    }
}

// ── Round records ─────────────────────────────────────────────────

/// Input for [`crate::RoundGateway::create`].
#[derive(Debug, Clone, PartialEq)]
pub struct NewRound {
    pub tenant_id: TenantId,
    pub name: Option<String>,
    pub created_by: UserId,
    pub start_at: u64,
    pub end_at: u64,
}

/// A persisted round.
///
/// `outcome_values` is `None` while the round is running, the six values
/// once finalized, and an empty list when the round was cancelled.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RoundRecord {
    pub id: RoundId,
    pub tenant_id: TenantId,
    pub name: Option<String>,
    pub created_by: UserId,
    pub start_at: u64,
    pub end_at: u64,
    pub outcome_values: Option<Vec<u8>>,
    pub created_at: u64,
}

/// Where a persisted round stands, derived from its outcome column.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RoundStatus {
    Running,
    Revealed,
    Cancelled,
}

impl RoundRecord {
    pub fn status(&self) -> RoundStatus {
        match &self.outcome_values {
            None => RoundStatus::Running,
            Some(values) if values.is_empty() => RoundStatus::Cancelled,
            Some(_) => RoundStatus::Revealed,
        }
    }

    /// True once the round has either revealed or been marked cancelled.
    pub fn is_settled(&self) -> bool {
        self.outcome_values.is_some()
    }

    /// True while `now` is before the round's end.
    pub fn is_active_at(&self, now: u64) -> bool {
        self.end_at > now
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn outcome_values_accepts_six_in_range() {
        let values = OutcomeValues::new(&[1, 2, 3, 4, 5, 6]).unwrap();
        assert_eq!(values.as_slice(), &[1, 2, 3, 4, 5, 6]);
    }

    #[test]
    fn outcome_values_rejects_bad_input() {
        assert!(OutcomeValues::new(&[]).is_none());
        assert!(OutcomeValues::new(&[1, 2, 3, 4, 5]).is_none());
        assert!(OutcomeValues::new(&[1, 2, 3, 4, 5, 6, 1]).is_none());
        assert!(OutcomeValues::new(&[0, 2, 3, 4, 5, 6]).is_none());
        assert!(OutcomeValues::new(&[1, 2, 3, 4, 5, 7]).is_none());
        assert!(OutcomeValues::new(&[1, 2, 3, -4, 5, 6]).is_none());
    }

    #[test]
    fn clamped_pulls_values_into_range() {
        let values = OutcomeValues::clamped([0, 1, 6, 7, -3, 4]);
        assert_eq!(values.as_slice(), &[1, 1, 6, 6, 1, 4]);
    }

    #[test]
    fn outcome_values_json_is_a_plain_array() {
        let values = OutcomeValues::new(&[6, 5, 4, 3, 2, 1]).unwrap();
        assert_eq!(serde_json::to_string(&values).unwrap(), "[6,5,4,3,2,1]");

        let parsed: OutcomeValues = serde_json::from_str("[1,1,1,1,1,1]").unwrap();
        assert_eq!(parsed.as_slice(), &[1; 6]);

        assert!(serde_json::from_str::<OutcomeValues>("[1,1,1,1,1,9]").is_err());
    }

    #[test]
    fn record_status_follows_outcome_column() {
        let mut record = RoundRecord {
            id: RoundId::new("r1"),
            tenant_id: 7,
            name: None,
            created_by: 99,
            start_at: 1_000,
            end_at: 26_000,
            outcome_values: None,
            created_at: 1_000,
        };
        assert_eq!(record.status(), RoundStatus::Running);
        assert!(record.is_active_at(25_999));
        assert!(!record.is_active_at(26_000));

        record.outcome_values = Some(vec![]);
        assert_eq!(record.status(), RoundStatus::Cancelled);

        record.outcome_values = Some(vec![1, 2, 3, 4, 5, 6]);
        assert_eq!(record.status(), RoundStatus::Revealed);
        assert!(record.is_settled());
    }
}
