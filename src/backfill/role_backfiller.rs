use chrono::Utc;
use entity::role::Role;
use entity::users;
use sea_orm::sea_query::Expr;
use sea_orm::{
    ColumnTrait, ConnectionTrait, DatabaseConnection, DbErr, EntityTrait, PaginatorTrait,
    QueryFilter, QueryOrder, QuerySelect, TransactionTrait,
};
use serde::Serialize;

use super::BackfillError;
use crate::types::report::{BackfillReport, RoleCounts, VerifyReport};
use crate::utils::batch::BatchInfo;

#[derive(Serialize, Debug, Clone, Copy, Default, PartialEq, Eq)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum BackfillStrategy {
    /// One conditional `UPDATE` per role.
    #[default]
    Bulk,
    /// Walk users by id and rewrite only rows whose stored role is stale.
    RowScan { batch_size: u64 },
}

/// Recomputes `users.role` from the flag columns.
///
/// Every pass runs in a single transaction, so the whole batch becomes visible
/// at once or not at all. The mapping only reads a row's own flags, which
/// makes repeated passes a no-op.
pub struct RoleBackfiller {
    db: DatabaseConnection,
    strategy: BackfillStrategy,
}

struct Pass {
    scanned: u64,
    updated: RoleCounts,
    skipped: u64,
    unrecognized: u64,
    batches: Option<BatchInfo>,
}

impl RoleBackfiller {
    pub fn new(db: DatabaseConnection, strategy: BackfillStrategy) -> Self {
        Self { db, strategy }
    }

    pub fn strategy(&self) -> BackfillStrategy {
        self.strategy
    }

    pub async fn run(&self) -> Result<BackfillReport, BackfillError> {
        let started_at = Utc::now();
        log::info!("Starting role backfill ({:?})", self.strategy);

        let txn = self.db.begin().await?;
        let pass = match self.strategy {
            BackfillStrategy::Bulk => bulk_update(&txn).await?,
            BackfillStrategy::RowScan { batch_size } => row_scan(&txn, batch_size).await?,
        };
        txn.commit().await?;

        if pass.skipped > 0 {
            log::warn!("{} users have a NULL flag and kept their role", pass.skipped);
        }
        log::info!(
            "Role backfill finished: {} scanned, {} updated",
            pass.scanned,
            pass.updated.total()
        );

        Ok(BackfillReport {
            strategy: self.strategy,
            rows_scanned: pass.scanned,
            rows_updated: pass.updated,
            rows_skipped: pass.skipped,
            rows_unrecognized: pass.unrecognized,
            batches: pass.batches,
            started_at,
            finished_at: Utc::now(),
        })
    }

    /// Compares stored roles against the flags without modifying anything.
    pub async fn verify(&self) -> Result<VerifyReport, BackfillError> {
        let total_rows = users::Entity::find().count(&self.db).await?;

        let mut derived = RoleCounts::default();
        let mut mismatched = 0;
        for role in Role::ALL {
            let matching = users::Entity::find()
                .filter(role.flags_condition())
                .count(&self.db)
                .await?;
            let stale = users::Entity::find()
                .filter(role.flags_condition())
                .filter(users::Column::Role.ne(role.as_str()))
                .count(&self.db)
                .await?;

            if stale > 0 {
                log::warn!("{} users should be '{}' but are not", stale, role);
            }
            derived.add(role, matching);
            mismatched += stale;
        }

        Ok(VerifyReport {
            total_rows,
            derived,
            mismatched,
            unclassified: total_rows.saturating_sub(derived.total()),
        })
    }

    pub async fn run_and_verify(&self) -> Result<(BackfillReport, VerifyReport), BackfillError> {
        let report = self.run().await?;
        let verification = self.verify().await?;

        if !verification.is_consistent() {
            return Err(BackfillError::Inconsistent {
                mismatched: verification.mismatched,
            });
        }

        Ok((report, verification))
    }
}

async fn bulk_update<C>(conn: &C) -> Result<Pass, DbErr>
where
    C: ConnectionTrait,
{
    let scanned = users::Entity::find().count(conn).await?;

    let mut updated = RoleCounts::default();
    for role in Role::ALL {
        let result = users::Entity::update_many()
            .col_expr(users::Column::Role, Expr::value(role.as_str()))
            .filter(role.flags_condition())
            .exec(conn)
            .await?;

        log::info!("Set role '{}' on {} users", role, result.rows_affected);
        updated.add(role, result.rows_affected);
    }

    Ok(Pass {
        scanned,
        skipped: scanned.saturating_sub(updated.total()),
        updated,
        unrecognized: 0,
        batches: None,
    })
}

async fn row_scan<C>(conn: &C, batch_size: u64) -> Result<Pass, DbErr>
where
    C: ConnectionTrait,
{
    let total = users::Entity::find().count(conn).await?;
    let batches = BatchInfo::new(total, batch_size);
    log::info!(
        "Scanning {} users in {} batches of {}",
        batches.total_items,
        batches.total_batches,
        batches.items_per_batch
    );

    let mut scanned = 0;
    let mut skipped = 0;
    let mut unrecognized = 0;
    let mut updated = RoleCounts::default();
    let mut last_id: Option<i32> = None;

    loop {
        let mut query = users::Entity::find()
            .select_only()
            .columns([
                users::Column::Id,
                users::Column::IsAdmin,
                users::Column::IsModerator,
                users::Column::Role,
            ])
            .order_by_asc(users::Column::Id)
            .limit(batches.items_per_batch);
        if let Some(id) = last_id {
            query = query.filter(users::Column::Id.gt(id));
        }

        // Role is read as plain text so legacy casings such as "User" still load.
        let rows: Vec<(i32, Option<bool>, Option<bool>, String)> =
            query.into_tuple().all(conn).await?;

        for (id, is_admin, is_moderator, stored) in &rows {
            scanned += 1;

            let (Some(is_admin), Some(is_moderator)) = (is_admin, is_moderator) else {
                skipped += 1;
                continue;
            };

            let role = Role::from_flags(*is_admin, *is_moderator);
            let stale = match stored.parse::<Role>() {
                // A legacy casing such as "User" parses but is still rewritten.
                Ok(current) => current != role || stored != role.as_str(),
                Err(err) => {
                    log::warn!("User {}: {}, replacing with '{}'", id, err, role);
                    unrecognized += 1;
                    true
                }
            };

            if stale {
                users::Entity::update_many()
                    .col_expr(users::Column::Role, Expr::value(role.as_str()))
                    .filter(users::Column::Id.eq(*id))
                    .exec(conn)
                    .await?;
                log::debug!("User {}: '{}' -> '{}'", id, stored, role);
                updated.add(role, 1);
            }
        }

        if (rows.len() as u64) < batches.items_per_batch {
            break;
        }
        last_id = rows.last().map(|row| row.0);
    }

    Ok(Pass {
        scanned,
        updated,
        skipped,
        unrecognized,
        batches: Some(batches),
    })
}
