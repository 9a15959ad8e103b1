/// Tests for the recalculation waterfall: delta tracking, deficit repayment,
/// proportional distribution, savings and pullback, run against the
/// in-memory store.
mod common;

#[cfg(test)]
mod waterfall_scenario_tests {
    use super::common::*;
    use fundflow_core::allocations::AllocationStage;
    use fundflow_core::allocations::AllocationRepositoryTrait;
    use fundflow_core::recalculation::{RecalculationStatus, SavingsReason};
    use rust_decimal::Decimal;
    use rust_decimal_macros::dec;

    #[tokio::test]
    async fn test_deficit_repaid_before_anything_else() {
        let h = harness().await;
        h.profile().await;
        h.set_balances(Decimal::ZERO, dec!(50.00)).await;
        h.income(dec!(80.00), march()).await;

        let result = h.recalculation.recalculate_for_period(USER, march()).await.unwrap();

        assert_eq!(result.deficit_repaid, dec!(50.00), "Deficit should be repaid first");
        assert_eq!(result.deficit_balance, dec!(0.00));
        assert_eq!(result.savings_added, dec!(30.00), "Remaining 30 flows on to savings");
        assert_eq!(result.savings_reason, Some(SavingsReason::NoActiveGoals));
        assert_eq!(result.status, RecalculationStatus::Saved);

        let profile = h.current_profile();
        assert_eq!(profile.deficit_balance, dec!(0.00));
        assert_eq!(profile.savings_balance, dec!(30.00));
    }

    #[tokio::test]
    async fn test_two_goals_split_by_priority() {
        let h = harness().await;
        h.profile().await;
        let a = h.goal("Car", dec!(300), 70).await;
        let b = h.goal("Trip", dec!(200), 30).await;
        h.income(dec!(100.00), march()).await;

        let result = h.recalculation.recalculate_for_period(USER, march()).await.unwrap();

        assert_eq!(result.status, RecalculationStatus::Allocated);
        assert_eq!(h.month_allocation(&a, "2025-03"), dec!(70.00));
        assert_eq!(h.month_allocation(&b, "2025-03"), dec!(30.00));
        assert_eq!(result.total_allocated, dec!(100.00));
        assert_eq!(result.savings_added, Decimal::ZERO);

        let row = h.store.get_allocation(USER, &a.id, "2025-03").unwrap().unwrap();
        assert_eq!(row.stage, AllocationStage::Proposed);
        assert!(!row.is_finalized);
    }

    #[tokio::test]
    async fn test_shortfall_pulled_from_savings_then_goal() {
        let h = harness().await;
        h.profile().await;
        h.set_balances(dec!(25.00), Decimal::ZERO).await;
        let goal = h.goal("Laptop", dec!(1000), 50).await;
        h.allocate(&goal, "2025-03", dec!(20.00)).await;
        h.expense(dec!(40.00), march()).await;

        let result = h.recalculation.recalculate_for_period(USER, march()).await.unwrap();
        let pullback = result.pullback.clone().unwrap();

        assert_eq!(result.status, RecalculationStatus::ExpenseProcessed);
        assert_eq!(pullback.from_savings, dec!(25.00));
        assert_eq!(pullback.from_goals, dec!(15.00));
        assert_eq!(pullback.new_deficit, dec!(0.00), "Shortfall should be fully covered");
        assert_eq!(pullback.goal_reductions[0].resulting_allocation, dec!(5.00));

        assert_eq!(h.month_allocation(&goal, "2025-03"), dec!(5.00));
        let row = h.store.get_allocation(USER, &goal.id, "2025-03").unwrap().unwrap();
        assert_eq!(row.stage, AllocationStage::Revised);

        let profile = h.current_profile();
        assert_eq!(profile.savings_balance, dec!(0.00));
        assert_eq!(profile.deficit_balance, dec!(0.00));
    }
}

#[cfg(test)]
mod waterfall_property_tests {
    use super::common::*;
    use fundflow_core::allocations::AllocationRepositoryTrait;
    use fundflow_core::goals::{GoalServiceTrait, GoalUpdate, ProtectionLevel};
    use fundflow_core::profiles::{ProfileServiceTrait, ProfileUpdate};
    use fundflow_core::recalculation::{RecalculationStatus, SavingsReason};
    use fundflow_core::Error;
    use rust_decimal::Decimal;
    use rust_decimal_macros::dec;

    #[tokio::test]
    async fn test_second_run_without_activity_changes_nothing() {
        let h = harness().await;
        h.profile().await;
        h.goal("Car", dec!(300), 70).await;
        h.income(dec!(120.00), march()).await;

        h.recalculation.recalculate_for_period(USER, march()).await.unwrap();
        let profile_before = h.current_profile();
        let allocations_before = h.store.get_allocations_by_user(USER).unwrap();
        let entries_before = h.store.entries_for_user(USER).unwrap().len();

        let second = h.recalculation.recalculate_for_period(USER, march()).await.unwrap();

        assert_eq!(second.status, RecalculationStatus::NoActivity);
        assert_eq!(h.current_profile(), profile_before, "Profile must be untouched");
        assert_eq!(h.store.get_allocations_by_user(USER).unwrap(), allocations_before);
        assert_eq!(h.store.entries_for_user(USER).unwrap().len(), entries_before);
    }

    #[tokio::test]
    async fn test_positive_change_is_conserved() {
        let h = harness().await;
        h.profile().await;
        h.set_balances(Decimal::ZERO, dec!(12.34)).await;
        h.goal("A", dec!(40), 3).await;
        h.goal("B", dec!(1000), 7).await;
        h.income(dec!(333.33), march()).await;

        let r = h.recalculation.recalculate_for_period(USER, march()).await.unwrap();

        assert_eq!(
            r.deficit_repaid + r.total_allocated + r.savings_added,
            r.delta.net_change,
            "Every cent of the net change must be accounted for"
        );
        let profile = h.current_profile();
        assert!(!(profile.savings_balance > Decimal::ZERO && profile.deficit_balance > Decimal::ZERO));
    }

    #[tokio::test]
    async fn test_partial_deficit_stops_the_waterfall() {
        let h = harness().await;
        h.profile().await;
        h.set_balances(Decimal::ZERO, dec!(100.00)).await;
        let goal = h.goal("Car", dec!(300), 70).await;
        h.income(dec!(30.00), march()).await;

        let r = h.recalculation.recalculate_for_period(USER, march()).await.unwrap();

        assert_eq!(r.status, RecalculationStatus::DeficitPartial);
        assert_eq!(r.deficit_balance, dec!(70.00));
        assert_eq!(h.month_allocation(&goal, "2025-03"), Decimal::ZERO);
        assert_eq!(h.current_profile().savings_balance, dec!(0.00));

        // Snapshots were still committed
        let again = h.recalculation.recalculate_for_period(USER, march()).await.unwrap();
        assert_eq!(again.status, RecalculationStatus::NoActivity);
    }

    #[tokio::test]
    async fn test_exact_repayment_reports_deficit_repaid() {
        let h = harness().await;
        h.profile().await;
        h.set_balances(Decimal::ZERO, dec!(45.00)).await;
        h.income(dec!(45.00), march()).await;

        let r = h.recalculation.recalculate_for_period(USER, march()).await.unwrap();
        assert_eq!(r.status, RecalculationStatus::DeficitRepaid);
        assert_eq!(r.deficit_balance, dec!(0.00));
        assert_eq!(r.savings_added, Decimal::ZERO);
    }

    #[tokio::test]
    async fn test_allocation_never_exceeds_target() {
        let h = harness().await;
        h.profile().await;
        let goal = h.goal("Phone", dec!(50), 100).await;
        h.income(dec!(200.00), march()).await;

        let first = h.recalculation.recalculate_for_period(USER, march()).await.unwrap();
        assert_eq!(h.month_allocation(&goal, "2025-03"), dec!(50.00));
        assert_eq!(first.savings_reason, Some(SavingsReason::Leftover));
        assert_eq!(first.savings_added, dec!(150.00));

        h.income(dec!(100.00), march()).await;
        let second = h.recalculation.recalculate_for_period(USER, march()).await.unwrap();
        assert_eq!(h.month_allocation(&goal, "2025-03"), dec!(50.00), "Goal is already funded");
        assert_eq!(second.savings_reason, Some(SavingsReason::GoalsFunded));
        assert_eq!(second.status, RecalculationStatus::Saved);

        let progress = h.goals.get_goal_progress(&goal.id).unwrap();
        assert!(progress.projected_amount <= progress.target_amount);
    }

    #[tokio::test]
    async fn test_running_total_accumulates_within_month() {
        let h = harness().await;
        h.profile().await;
        let goal = h.goal("House", dec!(10000), 100).await;

        h.income(dec!(100.00), march()).await;
        h.recalculation.recalculate_for_period(USER, march()).await.unwrap();
        h.income(dec!(50.00), march()).await;
        h.recalculation.recalculate_for_period(USER, march()).await.unwrap();

        assert_eq!(h.month_allocation(&goal, "2025-03"), dec!(150.00));
        assert_eq!(h.store.get_allocations_for_goal(&goal.id).unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_protected_and_locked_goals_keep_their_allocation() {
        let h = harness().await;
        h.profile().await;
        let protected = h.goal("Rent buffer", dec!(500), 10).await;
        h.goals
            .update_goal(
                &protected.id,
                GoalUpdate {
                    protection_level: Some(ProtectionLevel::Protected),
                    protection_reason: Some("Rent".into()),
                    ..GoalUpdate::default()
                },
            )
            .await
            .unwrap();
        let locked = h.goal("Tuition", dec!(500), 10).await;
        h.allocate(&protected, "2025-03", dec!(30.00)).await;
        h.allocate(&locked, "2025-03", dec!(30.00)).await;
        h.goals
            .update_goal(
                &locked.id,
                GoalUpdate {
                    is_locked: Some(true),
                    ..GoalUpdate::default()
                },
            )
            .await
            .unwrap();
        h.expense(dec!(20.00), march()).await;

        let r = h.recalculation.recalculate_for_period(USER, march()).await.unwrap();
        let pullback = r.pullback.unwrap();

        assert_eq!(h.month_allocation(&protected, "2025-03"), dec!(30.00));
        assert_eq!(h.month_allocation(&locked, "2025-03"), dec!(30.00));
        assert!(pullback.goal_reductions.is_empty());
        assert_eq!(pullback.protected_skipped.len(), 2);
        assert_eq!(pullback.new_deficit, dec!(20.00));
        assert_eq!(h.current_profile().deficit_balance, dec!(20.00));
    }

    #[tokio::test]
    async fn test_retry_after_failed_commit_applies_once() {
        let h = harness().await;
        h.profile().await;
        h.income(dec!(75.00), march()).await;
        h.store.fail_next_commit();

        let r = h.recalculation.recalculate_for_period(USER, march()).await.unwrap();

        assert_eq!(r.savings_added, dec!(75.00));
        assert_eq!(h.current_profile().savings_balance, dec!(75.00));
        let postings = h
            .store
            .entries_for_user(USER)
            .unwrap()
            .into_iter()
            .filter(|e| e.is_allocation_transaction)
            .count();
        assert_eq!(postings, 1, "The failed attempt must leave no posting behind");
    }

    #[tokio::test]
    async fn test_new_month_starts_from_zero_snapshot() {
        let h = harness().await;
        h.profile().await;
        h.income(dec!(100.00), march()).await;
        h.recalculation.recalculate_for_period(USER, march()).await.unwrap();

        h.income(dec!(40.00), april()).await;
        let r = h.recalculation.recalculate_for_period(USER, april()).await.unwrap();

        assert_eq!(r.delta.previous_income, Decimal::ZERO);
        assert_eq!(r.delta.net_change, dec!(40.00));
        assert_eq!(h.current_profile().savings_balance, dec!(140.00));
        assert_eq!(h.current_profile().snapshot_month.as_deref(), Some("2025-04"));
    }

    #[tokio::test]
    async fn test_expected_figures_used_without_entries() {
        let h = harness().await;
        h.profile().await;
        h.profiles
            .update_profile(
                USER,
                ProfileUpdate {
                    expected_monthly_income: Some(dec!(3000)),
                    expected_monthly_expenses: Some(dec!(2000)),
                    ..ProfileUpdate::default()
                },
            )
            .await
            .unwrap();

        let r = h.recalculation.recalculate_for_period(USER, march()).await.unwrap();
        assert!(r.delta.used_expected_fallback);
        assert_eq!(r.delta.net_change, dec!(1000.00));
        assert_eq!(r.savings_added, dec!(1000.00));
    }

    #[tokio::test]
    async fn test_pooled_savings_join_the_allocation() {
        let h = harness().await;
        h.profile().await;
        h.profiles
            .update_profile(
                USER,
                ProfileUpdate {
                    include_savings_in_alloc: Some(true),
                    ..ProfileUpdate::default()
                },
            )
            .await
            .unwrap();
        h.set_balances(dec!(100.00), Decimal::ZERO).await;
        let goal = h.goal("Bike", dec!(500), 50).await;
        h.income(dec!(50.00), march()).await;

        let r = h.recalculation.recalculate_for_period(USER, march()).await.unwrap();

        assert_eq!(r.savings_pooled, dec!(100.00));
        assert_eq!(r.available_funds, dec!(150.00));
        assert_eq!(h.month_allocation(&goal, "2025-03"), dec!(150.00));
        assert_eq!(h.current_profile().savings_balance, dec!(0.00));
    }

    #[tokio::test]
    async fn test_savings_not_pooled_by_default() {
        let h = harness().await;
        h.profile().await;
        h.set_balances(dec!(100.00), Decimal::ZERO).await;
        let goal = h.goal("Bike", dec!(500), 50).await;
        h.income(dec!(50.00), march()).await;

        let r = h.recalculation.recalculate_for_period(USER, march()).await.unwrap();

        assert_eq!(r.savings_pooled, Decimal::ZERO);
        assert_eq!(h.month_allocation(&goal, "2025-03"), dec!(50.00));
        assert_eq!(h.current_profile().savings_balance, dec!(100.00));
    }

    #[tokio::test]
    async fn test_missing_profile_is_not_found() {
        let h = harness().await;
        let err = h
            .recalculation
            .recalculate_for_period("nobody", march())
            .await
            .unwrap_err();
        assert!(matches!(err, Error::NotFound(_)));
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrent_recalculations_process_delta_once() {
        let h = harness().await;
        h.profile().await;
        h.income(dec!(100.00), march()).await;

        let mut handles = Vec::new();
        for _ in 0..4 {
            let service = h.recalculation.clone();
            handles.push(tokio::spawn(async move {
                service.recalculate_for_period(USER, march()).await
            }));
        }
        let mut statuses = Vec::new();
        for handle in handles {
            statuses.push(handle.await.unwrap().unwrap().status);
        }

        let applied = statuses
            .iter()
            .filter(|s| **s != RecalculationStatus::NoActivity)
            .count();
        assert_eq!(applied, 1, "Exactly one run should see the new activity");
        assert_eq!(h.current_profile().savings_balance, dec!(100.00));
    }
}

#[cfg(test)]
mod month_ordering_tests {
    use super::common::*;
    use fundflow_core::allocations::AllocationRepositoryTrait;
    use fundflow_core::constants::INACTIVE_REASON;
    use fundflow_core::goals::{GoalServiceTrait, GoalUpdate};
    use fundflow_core::profiles::ProfileRepositoryTrait;
    use fundflow_core::recalculation::RecalculationStatus;
    use rust_decimal::Decimal;
    use rust_decimal_macros::dec;

    #[tokio::test]
    async fn test_backdated_expense_after_later_month() {
        let h = harness().await;
        h.profile().await;
        h.income(dec!(100.00), march()).await;
        h.recalculation.recalculate_for_period(USER, march()).await.unwrap();
        h.income(dec!(50.00), april()).await;
        h.recalculation.recalculate_for_period(USER, april()).await.unwrap();
        assert_eq!(h.current_profile().savings_balance, dec!(150.00));

        h.expense(dec!(10.00), march()).await;
        let backdated = h.recalculation.recalculate_for_period(USER, march()).await.unwrap();
        assert_eq!(backdated.delta.previous_income, dec!(100.00), "March keeps its own snapshot");
        assert_eq!(backdated.delta.net_change, dec!(-10.00));
        assert_eq!(backdated.status, RecalculationStatus::ExpenseProcessed);

        let april_again = h.recalculation.recalculate_for_period(USER, april()).await.unwrap();
        assert_eq!(april_again.status, RecalculationStatus::NoActivity);
        let march_again = h.recalculation.recalculate_for_period(USER, march()).await.unwrap();
        assert_eq!(march_again.status, RecalculationStatus::NoActivity);
        assert_eq!(
            h.current_profile().savings_balance,
            dec!(140.00),
            "Each month's activity is counted once"
        );
    }

    #[tokio::test]
    async fn test_later_month_processed_first() {
        let h = harness().await;
        h.profile().await;
        h.income(dec!(100.00), march()).await;
        h.income(dec!(50.00), april()).await;

        let april_first = h.recalculation.recalculate_for_period(USER, april()).await.unwrap();
        assert_eq!(april_first.delta.net_change, dec!(50.00));
        let march_after = h.recalculation.recalculate_for_period(USER, march()).await.unwrap();
        assert_eq!(march_after.delta.previous_income, Decimal::ZERO);
        assert_eq!(march_after.delta.net_change, dec!(100.00));

        let april_again = h.recalculation.recalculate_for_period(USER, april()).await.unwrap();
        assert_eq!(april_again.status, RecalculationStatus::NoActivity);
        assert_eq!(h.current_profile().savings_balance, dec!(150.00));

        let april_snapshot = h.store.get_period_snapshot(USER, "2025-04").unwrap().unwrap();
        assert_eq!(april_snapshot.total_income, dec!(50.00));
        let march_snapshot = h.store.get_period_snapshot(USER, "2025-03").unwrap().unwrap();
        assert_eq!(march_snapshot.total_income, dec!(100.00));
    }

    #[tokio::test]
    async fn test_interleaved_months_only_see_their_own_delta() {
        let h = harness().await;
        h.profile().await;
        h.income(dec!(100.00), march()).await;
        h.recalculation.recalculate_for_period(USER, march()).await.unwrap();
        h.income(dec!(60.00), april()).await;
        h.recalculation.recalculate_for_period(USER, april()).await.unwrap();

        h.income(dec!(20.00), march()).await;
        let march_late = h.recalculation.recalculate_for_period(USER, march()).await.unwrap();
        assert_eq!(march_late.delta.net_change, dec!(20.00));

        h.income(dec!(5.00), april()).await;
        let april_late = h.recalculation.recalculate_for_period(USER, april()).await.unwrap();
        assert_eq!(april_late.delta.previous_income, dec!(60.00));
        assert_eq!(april_late.delta.net_change, dec!(5.00));

        assert_eq!(h.current_profile().savings_balance, dec!(185.00));
    }

    #[tokio::test]
    async fn test_inactive_goal_allocation_is_reported_as_skipped() {
        let h = harness().await;
        h.profile().await;
        let retired = h.goal("Old plan", dec!(500), 50).await;
        h.allocate(&retired, "2025-03", dec!(40.00)).await;
        h.goals
            .update_goal(
                &retired.id,
                GoalUpdate {
                    is_active: Some(false),
                    ..GoalUpdate::default()
                },
            )
            .await
            .unwrap();
        h.expense(dec!(15.00), march()).await;

        let r = h.recalculation.recalculate_for_period(USER, march()).await.unwrap();
        let pullback = r.pullback.unwrap();

        assert!(pullback.goal_reductions.is_empty());
        assert_eq!(pullback.protected_skipped.len(), 1);
        assert_eq!(pullback.protected_skipped[0].goal_id, retired.id);
        assert_eq!(pullback.protected_skipped[0].reason, INACTIVE_REASON);
        assert_eq!(pullback.new_deficit, dec!(15.00));
        assert_eq!(h.month_allocation(&retired, "2025-03"), dec!(40.00));
        assert_eq!(h.store.get_allocations_for_goal(&retired.id).unwrap().len(), 1);
    }
}
