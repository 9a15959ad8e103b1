use std::sync::Arc;

use async_trait::async_trait;
use log::info;

use crate::errors::{Error, Result};
use crate::profiles::profile_model::{FinancialProfile, NewFinancialProfile, ProfileUpdate};
use crate::profiles::profile_traits::{ProfileRepositoryTrait, ProfileServiceTrait};

pub struct ProfileService<T: ProfileRepositoryTrait> {
    profile_repo: Arc<T>,
}

impl<T: ProfileRepositoryTrait> ProfileService<T> {
    pub fn new(profile_repo: Arc<T>) -> Self {
        ProfileService { profile_repo }
    }
}

#[async_trait]
impl<T: ProfileRepositoryTrait> ProfileServiceTrait for ProfileService<T> {
    fn get_profile(&self, user_id: &str) -> Result<FinancialProfile> {
        self.profile_repo
            .get_profile(user_id)?
            .ok_or_else(|| Error::not_found("Financial profile", user_id))
    }

    async fn create_profile(&self, new_profile: NewFinancialProfile) -> Result<FinancialProfile> {
        new_profile.validate()?;
        let profile = self.profile_repo.create_profile(new_profile).await?;
        info!("Created financial profile {} for user {}", profile.id, profile.user_id);
        Ok(profile)
    }

    async fn update_profile(&self, user_id: &str, update: ProfileUpdate) -> Result<FinancialProfile> {
        if update.is_empty() {
            return Err(Error::invalid_input("Profile update contains no fields"));
        }
        update.validate()?;
        self.profile_repo.update_profile(user_id, update).await
    }
}
