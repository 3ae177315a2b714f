use chrono::{DateTime, Utc};
use entity::role::Role;
use serde::Serialize;

use crate::backfill::BackfillStrategy;
use crate::utils::batch::BatchInfo;

#[derive(Serialize, Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RoleCounts {
    pub admin: u64,
    pub moderator: u64,
    pub user: u64,
}

impl RoleCounts {
    pub fn add(&mut self, role: Role, n: u64) {
        match role {
            Role::Admin => self.admin += n,
            Role::Moderator => self.moderator += n,
            Role::User => self.user += n,
        }
    }

    pub fn get(&self, role: Role) -> u64 {
        match role {
            Role::Admin => self.admin,
            Role::Moderator => self.moderator,
            Role::User => self.user,
        }
    }

    pub fn total(&self) -> u64 {
        self.admin + self.moderator + self.user
    }
}

/// Outcome of one backfill pass.
#[derive(Serialize, Debug, Clone)]
pub struct BackfillReport {
    pub strategy: BackfillStrategy,
    pub rows_scanned: u64,
    /// Bulk: rows matched by each role's update. Row scan: rows whose role changed.
    pub rows_updated: RoleCounts,
    /// Rows with a NULL flag; left untouched.
    pub rows_skipped: u64,
    /// Row scan only: stored roles that did not parse; rewritten from the flags.
    pub rows_unrecognized: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub batches: Option<BatchInfo>,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
}

#[derive(Serialize, Debug, Clone, PartialEq, Eq)]
pub struct VerifyReport {
    pub total_rows: u64,
    /// Rows per role implied by the flag columns.
    pub derived: RoleCounts,
    /// Rows whose stored role differs from the derived one.
    pub mismatched: u64,
    /// Rows matching no role predicate (a NULL flag).
    pub unclassified: u64,
}

impl VerifyReport {
    pub fn is_consistent(&self) -> bool {
        self.mismatched == 0
    }
}
