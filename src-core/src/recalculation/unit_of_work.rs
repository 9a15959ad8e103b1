use async_trait::async_trait;
use diesel::prelude::*;
use log::debug;

use crate::allocations::allocation_repository::{finalize_allocation_rows, upsert_allocation_row};
use crate::db::WriteHandle;
use crate::errors::{DatabaseError, Error, Result};
use crate::goals::goals_repository::apply_goal_progress;
use crate::ledger::ledger_repository::insert_entry;
use crate::profiles::profile_repository::{
    load_period_snapshot, load_profile, write_period_snapshot, write_profile,
};
use crate::profiles::FinancialProfile;
use crate::recalculation::recalculation_model::{
    FinalizationChangeset, FinalizationCommit, RecalculationChangeset,
};

/// Applies engine changesets atomically
#[async_trait]
pub trait UnitOfWorkTrait: Send + Sync {
    /// Writes profile, month snapshot, allocations and ledger postings
    /// together. Fails with [`DatabaseError::Conflict`] if the balances or the
    /// month's snapshot moved since the changeset was computed.
    async fn commit_recalculation(&self, changeset: RecalculationChangeset)
        -> Result<FinancialProfile>;

    /// Adds progress to goals and freezes the month's allocation rows.
    async fn commit_finalization(&self, changeset: FinalizationChangeset)
        -> Result<FinalizationCommit>;
}

pub(crate) fn snapshot_conflict(user_id: &str) -> Error {
    DatabaseError::Conflict(format!(
        "Financial profile of user '{}' changed during recalculation",
        user_id
    ))
    .into()
}

pub struct SqliteUnitOfWork {
    writer: WriteHandle,
}

impl SqliteUnitOfWork {
    pub fn new(writer: WriteHandle) -> Self {
        SqliteUnitOfWork { writer }
    }
}

#[async_trait]
impl UnitOfWorkTrait for SqliteUnitOfWork {
    async fn commit_recalculation(
        &self,
        changeset: RecalculationChangeset,
    ) -> Result<FinancialProfile> {
        self.writer
            .exec(move |conn| {
                conn.immediate_transaction(|conn| {
                    let stored = load_profile(conn, &changeset.user_id)?.ok_or_else(|| {
                        Error::not_found("Financial profile", &changeset.user_id)
                    })?;
                    let stored_snapshot = load_period_snapshot(
                        conn,
                        &changeset.user_id,
                        &changeset.snapshot.month,
                    )?;
                    if !changeset.guard.matches(&stored, stored_snapshot.as_ref()) {
                        return Err(snapshot_conflict(&changeset.user_id));
                    }
                    let now = chrono::Utc::now().naive_utc();
                    for write in &changeset.allocations {
                        upsert_allocation_row(
                            conn,
                            &changeset.user_id,
                            &write.goal_id,
                            &write.month,
                            write.amount,
                            write.stage,
                            now,
                        )?;
                    }
                    for new_entry in &changeset.entries {
                        let entry = new_entry
                            .clone()
                            .into_entry(uuid::Uuid::new_v4().to_string(), now);
                        insert_entry(conn, &entry)?;
                    }
                    write_period_snapshot(conn, &changeset.snapshot)?;
                    write_profile(conn, &changeset.profile)?;
                    debug!(
                        "Committed recalculation for user {}: {} allocation(s), {} posting(s)",
                        changeset.user_id,
                        changeset.allocations.len(),
                        changeset.entries.len()
                    );
                    Ok(changeset.profile.clone())
                })
            })
            .await
    }

    async fn commit_finalization(
        &self,
        changeset: FinalizationChangeset,
    ) -> Result<FinalizationCommit> {
        self.writer
            .exec(move |conn| {
                conn.immediate_transaction(|conn| {
                    let now = chrono::Utc::now().naive_utc();
                    let mut goals = Vec::with_capacity(changeset.progress.len());
                    for write in &changeset.progress {
                        goals.push(apply_goal_progress(conn, &write.goal_id, write.delta, now)?);
                    }
                    let allocations_finalized =
                        finalize_allocation_rows(conn, &changeset.allocation_ids, now)?;
                    if allocations_finalized != changeset.allocation_ids.len() {
                        return Err(DatabaseError::Conflict(format!(
                            "Allocations of {} were finalized concurrently",
                            changeset.month
                        ))
                        .into());
                    }
                    Ok(FinalizationCommit {
                        goals,
                        allocations_finalized,
                        finalized_at: now,
                    })
                })
            })
            .await
    }
}
