use std::sync::Arc;

use async_trait::async_trait;
use chrono::NaiveDateTime;
use diesel::prelude::*;
use diesel::sqlite::SqliteConnection;
use rust_decimal::Decimal;

use crate::allocations::allocation_repository::pending_total;
use crate::db::{get_connection, DbPool, WriteHandle};
use crate::errors::{Error, Result};
use crate::goals::goals_model::{Goal, GoalDB, GoalStatus, GoalUpdate, NewGoal};
use crate::goals::goals_traits::GoalRepositoryTrait;
use crate::money::quantize;
use crate::schema::{goal_allocations, goals};

pub struct GoalRepository {
    pool: Arc<DbPool>,
    writer: WriteHandle,
}

impl GoalRepository {
    pub fn new(pool: Arc<DbPool>, writer: WriteHandle) -> Self {
        GoalRepository { pool, writer }
    }
}

pub(crate) fn find_goal(conn: &mut SqliteConnection, goal_id: &str) -> Result<Option<Goal>> {
    goals::table
        .find(goal_id)
        .select(GoalDB::as_select())
        .first::<GoalDB>(conn)
        .optional()?
        .map(Goal::try_from)
        .transpose()
}

fn write_goal(conn: &mut SqliteConnection, goal: &Goal) -> Result<()> {
    diesel::update(goals::table.find(&goal.id))
        .set(&GoalDB::from(goal))
        .execute(conn)?;
    Ok(())
}

/// Commits finalized progress onto a goal inside the caller's transaction.
pub(crate) fn apply_goal_progress(
    conn: &mut SqliteConnection,
    goal_id: &str,
    delta: Decimal,
    now: NaiveDateTime,
) -> Result<Goal> {
    let mut goal =
        find_goal(conn, goal_id)?.ok_or_else(|| Error::not_found("Goal", goal_id))?;
    goal.current_amount = quantize(goal.current_amount + delta);
    if goal.current_amount >= goal.target_amount {
        goal.status = GoalStatus::Completed;
    }
    goal.updated_at = now;
    write_goal(conn, &goal)?;
    Ok(goal)
}

/// A new target may not fall below what is committed plus what is already
/// allocated but not yet finalized.
pub(crate) fn ensure_target_covers(goal: &Goal, target: Decimal, pending: Decimal) -> Result<()> {
    let projected = quantize(goal.current_amount + pending);
    if target < projected {
        return Err(Error::invalid_amount(
            "targetAmount",
            format!(
                "must not be below the committed and pending amount of {}",
                projected
            ),
        ));
    }
    Ok(())
}

#[async_trait]
impl GoalRepositoryTrait for GoalRepository {
    fn load_goals(&self, user_id: &str) -> Result<Vec<Goal>> {
        let mut conn = get_connection(&self.pool)?;
        goals::table
            .filter(goals::user_id.eq(user_id))
            .order(goals::created_at.asc())
            .select(GoalDB::as_select())
            .load::<GoalDB>(&mut conn)?
            .into_iter()
            .map(Goal::try_from)
            .collect()
    }

    fn get_goal(&self, goal_id: &str) -> Result<Option<Goal>> {
        let mut conn = get_connection(&self.pool)?;
        find_goal(&mut conn, goal_id)
    }

    fn get_active_goals(&self, user_id: &str) -> Result<Vec<Goal>> {
        let mut conn = get_connection(&self.pool)?;
        goals::table
            .filter(goals::user_id.eq(user_id))
            .filter(goals::is_active.eq(true))
            .order(goals::created_at.asc())
            .select(GoalDB::as_select())
            .load::<GoalDB>(&mut conn)?
            .into_iter()
            .map(Goal::try_from)
            .collect()
    }

    async fn insert_new_goal(&self, new_goal: NewGoal) -> Result<Goal> {
        self.writer
            .exec(move |conn| {
                let goal = new_goal.into_goal(
                    uuid::Uuid::new_v4().to_string(),
                    chrono::Utc::now().naive_utc(),
                );
                diesel::insert_into(goals::table)
                    .values(GoalDB::from(&goal))
                    .execute(conn)?;
                Ok(goal)
            })
            .await
    }

    async fn update_goal(&self, goal_id: &str, update: GoalUpdate) -> Result<Goal> {
        let goal_id = goal_id.to_string();
        self.writer
            .exec(move |conn| {
                conn.immediate_transaction(|conn| {
                    let mut goal = find_goal(conn, &goal_id)?
                        .ok_or_else(|| Error::not_found("Goal", &goal_id))?;
                    if let Some(target) = update.target_amount {
                        let pending = pending_total(conn, &goal_id)?;
                        ensure_target_covers(&goal, target, pending)?;
                    }
                    update.apply_to(&mut goal, chrono::Utc::now().naive_utc());
                    goal.status = if goal.current_amount >= goal.target_amount {
                        GoalStatus::Completed
                    } else {
                        GoalStatus::Active
                    };
                    write_goal(conn, &goal)?;
                    Ok(goal)
                })
            })
            .await
    }

    async fn update_goal_progress(&self, goal_id: &str, delta: Decimal) -> Result<Goal> {
        let goal_id = goal_id.to_string();
        self.writer
            .exec(move |conn| {
                conn.immediate_transaction(|conn| {
                    apply_goal_progress(conn, &goal_id, delta, chrono::Utc::now().naive_utc())
                })
            })
            .await
    }

    async fn delete_goal(&self, goal_id: String) -> Result<usize> {
        self.writer
            .exec(move |conn| {
                let has_allocations = diesel::select(diesel::dsl::exists(
                    goal_allocations::table.filter(goal_allocations::goal_id.eq(&goal_id)),
                ))
                .get_result::<bool>(conn)?;
                if has_allocations {
                    return Err(Error::invalid_input(format!(
                        "Goal '{}' has allocations; deactivate it instead of deleting",
                        goal_id
                    )));
                }
                Ok(diesel::delete(goals::table.find(&goal_id)).execute(conn)?)
            })
            .await
    }
}
