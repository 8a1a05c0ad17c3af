//! Recipient pool types.
//!
//! Recipient identity is owned by an external pool collaborator; the core
//! only iterates over the list it is handed.

use serde::{Deserialize, Serialize};

/// Opaque recipient identity drawn from the pool.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RecipientId(pub i64);

impl std::fmt::Display for RecipientId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<i64> for RecipientId {
    fn from(id: i64) -> Self {
        RecipientId(id)
    }
}

/// Which grant platform a recipient pool belongs to.
///
/// The two platforms mock different downstream systems and differ in grant
/// amounts and latency.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RecipientType {
    PlatformA,
    PlatformB,
}

impl RecipientType {
    pub fn as_str(&self) -> &'static str {
        match self {
            RecipientType::PlatformA => "platform_a",
            RecipientType::PlatformB => "platform_b",
        }
    }
}

impl std::fmt::Display for RecipientType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One member of a recipient pool.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Recipient {
    pub id: RecipientId,
    pub recipient_type: RecipientType,
}

impl Recipient {
    pub fn new(id: impl Into<RecipientId>, recipient_type: RecipientType) -> Self {
        Self {
            id: id.into(),
            recipient_type,
        }
    }
}
