pub mod allocation_model;
pub mod allocation_repository;
pub mod allocation_traits;

pub use allocation_model::{group_by_goal, AllocationStage, AllocationsByGoal, GoalAllocation};
pub use allocation_repository::AllocationRepository;
pub use allocation_traits::AllocationRepositoryTrait;
