use std::sync::Arc;

use async_trait::async_trait;
use diesel::prelude::*;
use diesel::sqlite::SqliteConnection;

use crate::db::{get_connection, DbPool, WriteHandle};
use crate::errors::{Error, Result};
use crate::ledger::ledger_model::{
    Category, CategoryDB, CategoryType, LedgerEntry, LedgerEntryDB, NewCategory, NewLedgerEntry,
    PeriodTotals,
};
use crate::ledger::ledger_traits::LedgerRepositoryTrait;
use crate::period::Period;
use crate::schema::{ledger_categories, ledger_entries};

pub struct LedgerRepository {
    pool: Arc<DbPool>,
    writer: WriteHandle,
}

impl LedgerRepository {
    pub fn new(pool: Arc<DbPool>, writer: WriteHandle) -> Self {
        LedgerRepository { pool, writer }
    }
}

pub(crate) fn insert_entry(conn: &mut SqliteConnection, entry: &LedgerEntry) -> Result<()> {
    diesel::insert_into(ledger_entries::table)
        .values(LedgerEntryDB::from(entry))
        .execute(conn)?;
    Ok(())
}

fn find_category(conn: &mut SqliteConnection, category_id: &str) -> Result<Option<Category>> {
    ledger_categories::table
        .find(category_id)
        .select(CategoryDB::as_select())
        .first::<CategoryDB>(conn)
        .optional()?
        .map(Category::try_from)
        .transpose()
}

#[async_trait]
impl LedgerRepositoryTrait for LedgerRepository {
    fn get_period_totals(&self, user_id: &str, period: &Period) -> Result<PeriodTotals> {
        let mut conn = get_connection(&self.pool)?;
        let rows = ledger_entries::table
            .inner_join(ledger_categories::table)
            .filter(ledger_entries::user_id.eq(user_id))
            .filter(ledger_entries::recorded_at.ge(period.start()))
            .filter(ledger_entries::recorded_at.lt(period.end()))
            .filter(ledger_entries::is_expected.eq(false))
            .filter(ledger_entries::is_allocation_transaction.eq(false))
            .select((LedgerEntryDB::as_select(), ledger_categories::category_type))
            .load::<(LedgerEntryDB, String)>(&mut conn)?;

        let mut entries = Vec::with_capacity(rows.len());
        for (row, category_type) in rows {
            entries.push((LedgerEntry::try_from(row)?, category_type.parse::<CategoryType>()?));
        }
        Ok(PeriodTotals::from_entries(
            entries.iter().map(|(entry, kind)| (entry, *kind)),
        ))
    }

    fn get_entries_for_period(&self, user_id: &str, period: &Period) -> Result<Vec<LedgerEntry>> {
        let mut conn = get_connection(&self.pool)?;
        ledger_entries::table
            .filter(ledger_entries::user_id.eq(user_id))
            .filter(ledger_entries::recorded_at.ge(period.start()))
            .filter(ledger_entries::recorded_at.lt(period.end()))
            .order(ledger_entries::recorded_at.asc())
            .select(LedgerEntryDB::as_select())
            .load::<LedgerEntryDB>(&mut conn)?
            .into_iter()
            .map(LedgerEntry::try_from)
            .collect()
    }

    fn find_category_by_name(&self, name: &str) -> Result<Option<Category>> {
        let mut conn = get_connection(&self.pool)?;
        ledger_categories::table
            .filter(ledger_categories::name.eq(name))
            .select(CategoryDB::as_select())
            .first::<CategoryDB>(&mut conn)
            .optional()?
            .map(Category::try_from)
            .transpose()
    }

    fn get_category(&self, category_id: &str) -> Result<Option<Category>> {
        let mut conn = get_connection(&self.pool)?;
        find_category(&mut conn, category_id)
    }

    async fn create_entry(&self, new_entry: NewLedgerEntry) -> Result<LedgerEntry> {
        self.writer
            .exec(move |conn| {
                if find_category(conn, &new_entry.category_id)?.is_none() {
                    return Err(Error::not_found("Category", &new_entry.category_id));
                }
                let entry = new_entry.into_entry(
                    uuid::Uuid::new_v4().to_string(),
                    chrono::Utc::now().naive_utc(),
                );
                insert_entry(conn, &entry)?;
                Ok(entry)
            })
            .await
    }

    fn get_entry(&self, entry_id: &str) -> Result<Option<LedgerEntry>> {
        let mut conn = get_connection(&self.pool)?;
        ledger_entries::table
            .find(entry_id)
            .select(LedgerEntryDB::as_select())
            .first::<LedgerEntryDB>(&mut conn)
            .optional()?
            .map(LedgerEntry::try_from)
            .transpose()
    }

    async fn update_entry(&self, entry: LedgerEntry) -> Result<LedgerEntry> {
        self.writer
            .exec(move |conn| {
                if find_category(conn, &entry.category_id)?.is_none() {
                    return Err(Error::not_found("Category", &entry.category_id));
                }
                let updated = diesel::update(ledger_entries::table.find(&entry.id))
                    .set(&LedgerEntryDB::from(&entry))
                    .execute(conn)?;
                if updated == 0 {
                    return Err(Error::not_found("Ledger entry", &entry.id));
                }
                Ok(entry)
            })
            .await
    }

    async fn delete_entry(&self, entry_id: &str) -> Result<usize> {
        let entry_id = entry_id.to_string();
        self.writer
            .exec(move |conn| Ok(diesel::delete(ledger_entries::table.find(&entry_id)).execute(conn)?))
            .await
    }

    async fn create_category(&self, new_category: NewCategory) -> Result<Category> {
        self.writer
            .exec(move |conn| {
                let category = new_category.into_category(uuid::Uuid::new_v4().to_string());
                diesel::insert_into(ledger_categories::table)
                    .values(CategoryDB::from(&category))
                    .execute(conn)?;
                Ok(category)
            })
            .await
    }
}
