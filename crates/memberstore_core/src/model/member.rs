//! Member domain model.
//!
//! # Responsibility
//! - Define the two-column record persisted in the `member` table.
//!
//! # Invariants
//! - `member_id` is assigned by the caller and never changes after creation.
//! - Uniqueness and non-emptiness of `member_id` are enforced by the store
//!   schema, not by this type.

use serde::{Deserialize, Serialize};

/// Caller-assigned member key.
///
/// Kept as a type alias to make semantic intent explicit in signatures.
pub type MemberId = String;

/// Persisted member record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Member {
    /// Primary key, stored as `member.member_id`.
    pub member_id: MemberId,
    /// Current balance, stored as `member.money`. No range validation.
    pub money: i64,
}

impl Member {
    /// Creates a member record with the given key and balance.
    pub fn new(member_id: impl Into<MemberId>, money: i64) -> Self {
        Self {
            member_id: member_id.into(),
            money,
        }
    }
}
