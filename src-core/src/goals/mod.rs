pub mod goal_progress_model;
pub mod goals_model;
pub mod goals_repository;
pub mod goals_service;
pub mod goals_traits;

pub use goal_progress_model::{AllocationDetail, GoalProgressSnapshot};
pub use goals_model::{Goal, GoalStatus, GoalUpdate, NewGoal, ProtectionLevel};
pub use goals_repository::GoalRepository;
pub use goals_service::GoalService;
pub use goals_traits::{GoalRepositoryTrait, GoalServiceTrait};
