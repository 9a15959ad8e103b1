use std::sync::Arc;

use async_trait::async_trait;
use diesel::prelude::*;
use diesel::sqlite::SqliteConnection;

use crate::db::{get_connection, DbPool, WriteHandle};
use crate::errors::{Error, Result};
use crate::profiles::profile_model::{
    FinancialProfile, FinancialProfileDB, NewFinancialProfile, PeriodSnapshot, PeriodSnapshotDB,
    ProfileUpdate,
};
use crate::profiles::profile_traits::ProfileRepositoryTrait;
use crate::schema::{financial_profiles, period_snapshots};

pub struct ProfileRepository {
    pool: Arc<DbPool>,
    writer: WriteHandle,
}

impl ProfileRepository {
    pub fn new(pool: Arc<DbPool>, writer: WriteHandle) -> Self {
        ProfileRepository { pool, writer }
    }
}

pub(crate) fn load_profile(
    conn: &mut SqliteConnection,
    user_id: &str,
) -> Result<Option<FinancialProfile>> {
    financial_profiles::table
        .filter(financial_profiles::user_id.eq(user_id))
        .select(FinancialProfileDB::as_select())
        .first::<FinancialProfileDB>(conn)
        .optional()?
        .map(FinancialProfile::try_from)
        .transpose()
}

pub(crate) fn write_profile(conn: &mut SqliteConnection, profile: &FinancialProfile) -> Result<()> {
    let row = FinancialProfileDB::from(profile);
    let updated = diesel::update(financial_profiles::table.find(&row.id))
        .set(&row)
        .execute(conn)?;
    if updated == 0 {
        return Err(Error::not_found("Financial profile", &profile.user_id));
    }
    Ok(())
}

pub(crate) fn load_period_snapshot(
    conn: &mut SqliteConnection,
    user_id: &str,
    month: &str,
) -> Result<Option<PeriodSnapshot>> {
    period_snapshots::table
        .find((user_id, month))
        .select(PeriodSnapshotDB::as_select())
        .first::<PeriodSnapshotDB>(conn)
        .optional()?
        .map(PeriodSnapshot::try_from)
        .transpose()
}

pub(crate) fn write_period_snapshot(
    conn: &mut SqliteConnection,
    snapshot: &PeriodSnapshot,
) -> Result<()> {
    let row = PeriodSnapshotDB::from(snapshot);
    let updated = diesel::update(period_snapshots::table.find((&row.user_id, &row.month)))
        .set(&row)
        .execute(conn)?;
    if updated == 0 {
        diesel::insert_into(period_snapshots::table)
            .values(&row)
            .execute(conn)?;
    }
    Ok(())
}

#[async_trait]
impl ProfileRepositoryTrait for ProfileRepository {
    fn get_profile(&self, user_id: &str) -> Result<Option<FinancialProfile>> {
        let mut conn = get_connection(&self.pool)?;
        load_profile(&mut conn, user_id)
    }

    fn get_period_snapshot(&self, user_id: &str, month: &str) -> Result<Option<PeriodSnapshot>> {
        let mut conn = get_connection(&self.pool)?;
        load_period_snapshot(&mut conn, user_id, month)
    }

    async fn create_profile(&self, new_profile: NewFinancialProfile) -> Result<FinancialProfile> {
        self.writer
            .exec(move |conn| {
                if load_profile(conn, new_profile.user_id.trim())?.is_some() {
                    return Err(Error::invalid_input(format!(
                        "Financial profile for user '{}' already exists",
                        new_profile.user_id
                    )));
                }
                let now = chrono::Utc::now().naive_utc();
                let profile = new_profile.into_profile(uuid::Uuid::new_v4().to_string(), now);
                diesel::insert_into(financial_profiles::table)
                    .values(FinancialProfileDB::from(&profile))
                    .execute(conn)?;
                Ok(profile)
            })
            .await
    }

    async fn update_profile(&self, user_id: &str, update: ProfileUpdate) -> Result<FinancialProfile> {
        let user_id = user_id.to_string();
        self.writer
            .exec(move |conn| {
                let mut profile = load_profile(conn, &user_id)?
                    .ok_or_else(|| Error::not_found("Financial profile", &user_id))?;
                update.apply_to(&mut profile, chrono::Utc::now().naive_utc());
                write_profile(conn, &profile)?;
                Ok(profile)
            })
            .await
    }

    async fn save_profile(&self, profile: FinancialProfile) -> Result<FinancialProfile> {
        self.writer
            .exec(move |conn| {
                write_profile(conn, &profile)?;
                Ok(profile)
            })
            .await
    }
}
