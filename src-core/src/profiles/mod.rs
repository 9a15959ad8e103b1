pub mod profile_model;
pub mod profile_repository;
pub mod profile_service;
pub mod profile_traits;

pub use profile_model::{
    FinancialProfile, NewFinancialProfile, PeriodSnapshot, ProfileUpdate, SnapshotGuard,
};
pub use profile_repository::ProfileRepository;
pub use profile_service::ProfileService;
pub use profile_traits::{ProfileRepositoryTrait, ProfileServiceTrait};
