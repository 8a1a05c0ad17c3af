//! Grant records: the append-only outcome of successful grant cycles.

use chrono::{DateTime, Utc};
use serde::Serialize;
use uuid::Uuid;

use super::batch::BatchId;
use super::recipient::RecipientId;
use crate::client::GrantReceipt;

/// Unique identifier for a grant record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(transparent)]
pub struct GrantId(pub Uuid);

impl From<Uuid> for GrantId {
    fn from(uuid: Uuid) -> Self {
        GrantId(uuid)
    }
}

impl std::fmt::Display for GrantId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", &self.0.to_string()[..8])
    }
}

/// Identifier of the plan a grant was issued under.
///
/// Plans are read-only for this core; the grant collaborator resolves their
/// unit size.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(transparent)]
pub struct PlanId(pub i64);

impl std::fmt::Display for PlanId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<i64> for PlanId {
    fn from(id: i64) -> Self {
        PlanId(id)
    }
}

/// Downstream platform that issued a grant.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum PlatformType {
    A,
    B,
}

impl PlatformType {
    pub fn as_str(&self) -> &'static str {
        match self {
            PlatformType::A => "a",
            PlatformType::B => "b",
        }
    }
}

/// One issued grant.
///
/// Created once per successful grant cycle by the worker that ran the cycle
/// and never mutated afterwards.
#[derive(Debug, Clone, Serialize)]
pub struct GrantRecord {
    pub id: GrantId,
    pub recipient_id: RecipientId,
    pub batch_id: BatchId,
    pub plan_id: PlanId,
    pub amount: i64,
    pub platform: PlatformType,
    pub issued_at: DateTime<Utc>,
}

impl GrantRecord {
    /// Build a record from a collaborator receipt.
    pub fn from_receipt(
        recipient_id: RecipientId,
        batch_id: BatchId,
        plan_id: PlanId,
        receipt: GrantReceipt,
    ) -> Self {
        Self {
            id: GrantId::from(Uuid::new_v4()),
            recipient_id,
            batch_id,
            plan_id,
            amount: receipt.amount,
            platform: receipt.platform,
            issued_at: Utc::now(),
        }
    }
}
