use async_trait::async_trait;

use crate::errors::Result;
use crate::profiles::profile_model::{
    FinancialProfile, NewFinancialProfile, PeriodSnapshot, ProfileUpdate,
};

/// Storage for financial profiles
#[async_trait]
pub trait ProfileRepositoryTrait: Send + Sync {
    fn get_profile(&self, user_id: &str) -> Result<Option<FinancialProfile>>;
    /// Totals last processed for the user's month
    fn get_period_snapshot(&self, user_id: &str, month: &str) -> Result<Option<PeriodSnapshot>>;
    async fn create_profile(&self, new_profile: NewFinancialProfile) -> Result<FinancialProfile>;
    async fn update_profile(&self, user_id: &str, update: ProfileUpdate) -> Result<FinancialProfile>;
    /// Overwrites the whole row, balances and snapshots included
    async fn save_profile(&self, profile: FinancialProfile) -> Result<FinancialProfile>;
}

#[async_trait]
pub trait ProfileServiceTrait: Send + Sync {
    fn get_profile(&self, user_id: &str) -> Result<FinancialProfile>;
    async fn create_profile(&self, new_profile: NewFinancialProfile) -> Result<FinancialProfile>;
    async fn update_profile(&self, user_id: &str, update: ProfileUpdate) -> Result<FinancialProfile>;
}
