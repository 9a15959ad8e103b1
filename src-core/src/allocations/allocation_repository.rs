use std::sync::Arc;

use async_trait::async_trait;
use chrono::NaiveDateTime;
use diesel::prelude::*;
use diesel::sqlite::SqliteConnection;
use rust_decimal::Decimal;

use crate::allocations::allocation_model::{
    group_by_goal, AllocationStage, AllocationsByGoal, GoalAllocation, GoalAllocationDB,
};
use crate::allocations::allocation_traits::AllocationRepositoryTrait;
use crate::db::{get_connection, DbPool, WriteHandle};
use crate::errors::{Result, ValidationError};
use crate::money::{parse_amount, quantize};
use crate::schema::goal_allocations;

pub struct AllocationRepository {
    pool: Arc<DbPool>,
    writer: WriteHandle,
}

impl AllocationRepository {
    pub fn new(pool: Arc<DbPool>, writer: WriteHandle) -> Self {
        AllocationRepository { pool, writer }
    }
}

fn load_rows(rows: Vec<GoalAllocationDB>) -> Result<Vec<GoalAllocation>> {
    rows.into_iter().map(GoalAllocation::try_from).collect()
}

pub(crate) fn find_allocation(
    conn: &mut SqliteConnection,
    user_id: &str,
    goal_id: &str,
    month: &str,
) -> Result<Option<GoalAllocation>> {
    goal_allocations::table
        .filter(goal_allocations::user_id.eq(user_id))
        .filter(goal_allocations::goal_id.eq(goal_id))
        .filter(goal_allocations::month.eq(month))
        .select(GoalAllocationDB::as_select())
        .first::<GoalAllocationDB>(conn)
        .optional()?
        .map(GoalAllocation::try_from)
        .transpose()
}

/// Writes the month's amount for a goal. An existing row keeps its stage
/// unless the write is a revision.
pub(crate) fn upsert_allocation_row(
    conn: &mut SqliteConnection,
    user_id: &str,
    goal_id: &str,
    month: &str,
    amount: Decimal,
    stage: AllocationStage,
    now: NaiveDateTime,
) -> Result<GoalAllocation> {
    match find_allocation(conn, user_id, goal_id, month)? {
        Some(existing) if existing.is_finalized => Err(ValidationError::MonthAlreadyFinalized {
            month: month.to_string(),
            finalized_at: existing.finalized_at.unwrap_or(existing.updated_at),
        }
        .into()),
        Some(mut existing) => {
            existing.allocated_amount = quantize(amount);
            if stage == AllocationStage::Revised {
                existing.stage = AllocationStage::Revised;
            }
            existing.updated_at = now;
            diesel::update(goal_allocations::table.find(&existing.id))
                .set(&GoalAllocationDB::from(&existing))
                .execute(conn)?;
            Ok(existing)
        }
        None => {
            let allocation = GoalAllocation {
                id: uuid::Uuid::new_v4().to_string(),
                user_id: user_id.to_string(),
                goal_id: goal_id.to_string(),
                month: month.to_string(),
                allocated_amount: quantize(amount),
                stage,
                is_finalized: false,
                finalized_at: None,
                created_at: now,
                updated_at: now,
            };
            diesel::insert_into(goal_allocations::table)
                .values(GoalAllocationDB::from(&allocation))
                .execute(conn)?;
            Ok(allocation)
        }
    }
}

/// Sum of the goal's allocations not yet finalized, across months.
pub(crate) fn pending_total(conn: &mut SqliteConnection, goal_id: &str) -> Result<Decimal> {
    let amounts = goal_allocations::table
        .filter(goal_allocations::goal_id.eq(goal_id))
        .filter(goal_allocations::is_finalized.eq(false))
        .select(goal_allocations::allocated_amount)
        .load::<String>(conn)?;
    sum_amounts(&amounts)
}

/// Marks the given rows finalized; returns how many rows changed. Rows that
/// were already finalized are left alone.
pub(crate) fn finalize_allocation_rows(
    conn: &mut SqliteConnection,
    allocation_ids: &[String],
    now: NaiveDateTime,
) -> Result<usize> {
    let updated = diesel::update(
        goal_allocations::table
            .filter(goal_allocations::id.eq_any(allocation_ids))
            .filter(goal_allocations::is_finalized.eq(false)),
    )
    .set((
        goal_allocations::is_finalized.eq(true),
        goal_allocations::finalized_at.eq(Some(now)),
        goal_allocations::stage.eq(AllocationStage::Finalized.as_str()),
        goal_allocations::updated_at.eq(now),
    ))
    .execute(conn)?;
    Ok(updated)
}

#[async_trait]
impl AllocationRepositoryTrait for AllocationRepository {
    fn get_allocation(
        &self,
        user_id: &str,
        goal_id: &str,
        month: &str,
    ) -> Result<Option<GoalAllocation>> {
        let mut conn = get_connection(&self.pool)?;
        find_allocation(&mut conn, user_id, goal_id, month)
    }

    fn get_total_allocated_for_goal(&self, goal_id: &str, month: &str) -> Result<Decimal> {
        let mut conn = get_connection(&self.pool)?;
        let amounts = goal_allocations::table
            .filter(goal_allocations::goal_id.eq(goal_id))
            .filter(goal_allocations::month.eq(month))
            .select(goal_allocations::allocated_amount)
            .load::<String>(&mut conn)?;
        sum_amounts(&amounts)
    }

    fn get_pending_total_for_goal(&self, goal_id: &str) -> Result<Decimal> {
        let mut conn = get_connection(&self.pool)?;
        pending_total(&mut conn, goal_id)
    }

    fn get_allocations_by_month(&self, month: &str) -> Result<AllocationsByGoal> {
        let mut conn = get_connection(&self.pool)?;
        let rows = goal_allocations::table
            .filter(goal_allocations::month.eq(month))
            .order((goal_allocations::goal_id.asc(), goal_allocations::created_at.asc()))
            .select(GoalAllocationDB::as_select())
            .load::<GoalAllocationDB>(&mut conn)?;
        Ok(group_by_goal(load_rows(rows)?))
    }

    fn get_allocations_by_user(&self, user_id: &str) -> Result<Vec<GoalAllocation>> {
        let mut conn = get_connection(&self.pool)?;
        let rows = goal_allocations::table
            .filter(goal_allocations::user_id.eq(user_id))
            .order((goal_allocations::month.desc(), goal_allocations::goal_id.asc()))
            .select(GoalAllocationDB::as_select())
            .load::<GoalAllocationDB>(&mut conn)?;
        load_rows(rows)
    }

    fn get_allocations_for_goal(&self, goal_id: &str) -> Result<Vec<GoalAllocation>> {
        let mut conn = get_connection(&self.pool)?;
        let rows = goal_allocations::table
            .filter(goal_allocations::goal_id.eq(goal_id))
            .order(goal_allocations::month.asc())
            .select(GoalAllocationDB::as_select())
            .load::<GoalAllocationDB>(&mut conn)?;
        load_rows(rows)
    }

    fn get_month_finalization(&self, user_id: &str, month: &str) -> Result<Option<NaiveDateTime>> {
        let mut conn = get_connection(&self.pool)?;
        let finalized = goal_allocations::table
            .filter(goal_allocations::user_id.eq(user_id))
            .filter(goal_allocations::month.eq(month))
            .filter(goal_allocations::is_finalized.eq(true))
            .select(goal_allocations::finalized_at)
            .first::<Option<NaiveDateTime>>(&mut conn)
            .optional()?;
        Ok(finalized.flatten())
    }

    async fn upsert_allocation(
        &self,
        user_id: &str,
        goal_id: &str,
        month: &str,
        amount: Decimal,
    ) -> Result<GoalAllocation> {
        let (user_id, goal_id, month) = (user_id.to_string(), goal_id.to_string(), month.to_string());
        self.writer
            .exec(move |conn| {
                conn.immediate_transaction(|conn| {
                    upsert_allocation_row(
                        conn,
                        &user_id,
                        &goal_id,
                        &month,
                        amount,
                        AllocationStage::Proposed,
                        chrono::Utc::now().naive_utc(),
                    )
                })
            })
            .await
    }
}

fn sum_amounts(amounts: &[String]) -> Result<Decimal> {
    let mut total = Decimal::ZERO;
    for raw in amounts {
        total += parse_amount(raw)?;
    }
    Ok(quantize(total))
}
