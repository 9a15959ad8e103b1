/// Tests for goal management: validation, the typed update allow-list,
/// deletion rules and committed versus pending progress.
mod common;

#[cfg(test)]
mod goal_validation_tests {
    use super::common::*;
    use fundflow_core::goals::{GoalServiceTrait, NewGoal, ProtectionLevel};
    use fundflow_core::Error;
    use rust_decimal::Decimal;
    use rust_decimal_macros::dec;

    fn new_goal(target: Decimal, current: Decimal, weight: i32) -> NewGoal {
        NewGoal {
            user_id: USER.into(),
            title: "Emergency fund".into(),
            target_amount: target,
            current_amount: current,
            priority_weight: weight,
            protection_level: ProtectionLevel::Flexible,
            protection_reason: None,
            is_locked: false,
            is_essential: true,
        }
    }

    #[tokio::test]
    async fn test_rejects_non_positive_target() {
        let h = harness().await;
        let err = h.goals.create_goal(new_goal(dec!(0), dec!(0), 10)).await.unwrap_err();
        assert!(matches!(err, Error::Validation(_)), "Target must be positive");
    }

    #[tokio::test]
    async fn test_rejects_priority_out_of_range() {
        let h = harness().await;
        assert!(h.goals.create_goal(new_goal(dec!(100), dec!(0), 101)).await.is_err());
        assert!(h.goals.create_goal(new_goal(dec!(100), dec!(0), -1)).await.is_err());
        assert!(h.goals.create_goal(new_goal(dec!(100), dec!(0), 0)).await.is_ok());
    }

    #[tokio::test]
    async fn test_rejects_current_above_target() {
        let h = harness().await;
        let err = h
            .goals
            .create_goal(new_goal(dec!(100), dec!(150), 10))
            .await
            .unwrap_err();
        assert!(matches!(err, Error::Validation(_)));
    }

    #[tokio::test]
    async fn test_goal_created_at_target_is_completed() {
        let h = harness().await;
        let goal = h
            .goals
            .create_goal(new_goal(dec!(100), dec!(100), 10))
            .await
            .unwrap();
        assert!(goal.is_completed());
        assert!(!goal.accepts_allocation());
    }
}

#[cfg(test)]
mod goal_update_tests {
    use super::common::*;
    use fundflow_core::goals::{GoalServiceTrait, GoalStatus, GoalUpdate};
    use fundflow_core::Error;
    use rust_decimal_macros::dec;

    #[test]
    fn test_update_rejects_unknown_fields() {
        let parsed = serde_json::from_str::<GoalUpdate>(r#"{"currentAmount": 500}"#);
        assert!(parsed.is_err(), "currentAmount is owned by finalization");

        let parsed = serde_json::from_str::<GoalUpdate>(r#"{"status": "completed"}"#);
        assert!(parsed.is_err(), "status is owned by finalization");

        let parsed = serde_json::from_str::<GoalUpdate>(r#"{"title": "New", "isLocked": true}"#);
        assert!(parsed.is_ok());
    }

    #[tokio::test]
    async fn test_empty_update_is_rejected() {
        let h = harness().await;
        let goal = h.goal("Car", dec!(300), 50).await;
        let err = h
            .goals
            .update_goal(&goal.id, GoalUpdate::default())
            .await
            .unwrap_err();
        assert!(matches!(err, Error::Validation(_)));
    }

    #[tokio::test]
    async fn test_update_applies_only_given_fields() {
        let h = harness().await;
        let goal = h.goal("Car", dec!(300), 50).await;
        let updated = h
            .goals
            .update_goal(
                &goal.id,
                GoalUpdate {
                    title: Some("  Family car ".into()),
                    priority_weight: Some(80),
                    ..GoalUpdate::default()
                },
            )
            .await
            .unwrap();
        assert_eq!(updated.title, "Family car");
        assert_eq!(updated.priority_weight, 80);
        assert_eq!(updated.target_amount, goal.target_amount);
        assert_eq!(updated.is_locked, goal.is_locked);
    }

    #[tokio::test]
    async fn test_target_below_committed_is_rejected() {
        let h = harness().await;
        let goal = h.goal("Car", dec!(300), 50).await;
        h.allocate(&goal, "2025-03", dec!(120.00)).await;
        h.finalization.finalize_month("2025-03").await.unwrap();

        let err = h
            .goals
            .update_goal(
                &goal.id,
                GoalUpdate {
                    target_amount: Some(dec!(100)),
                    ..GoalUpdate::default()
                },
            )
            .await
            .unwrap_err();
        assert!(matches!(err, Error::Validation(_)));

        let lowered = h
            .goals
            .update_goal(
                &goal.id,
                GoalUpdate {
                    target_amount: Some(dec!(120)),
                    ..GoalUpdate::default()
                },
            )
            .await
            .unwrap();
        assert_eq!(lowered.status, GoalStatus::Completed, "Target now met");
    }

    #[tokio::test]
    async fn test_target_below_pending_is_rejected() {
        let h = harness().await;
        h.profile().await;
        let goal = h.goal("Car", dec!(100), 50).await;
        h.income(dec!(80.00), march()).await;
        h.recalculation.recalculate_for_period(USER, march()).await.unwrap();
        assert_eq!(h.month_allocation(&goal, "2025-03"), dec!(80.00));

        let err = h
            .goals
            .update_goal(
                &goal.id,
                GoalUpdate {
                    target_amount: Some(dec!(50)),
                    ..GoalUpdate::default()
                },
            )
            .await
            .unwrap_err();
        assert!(matches!(err, Error::Validation(_)), "Pending allocations count");

        h.goals
            .update_goal(
                &goal.id,
                GoalUpdate {
                    target_amount: Some(dec!(80)),
                    ..GoalUpdate::default()
                },
            )
            .await
            .unwrap();
        h.finalization.finalize_month("2025-03").await.unwrap();

        let finalized = h.goals.get_goal(&goal.id).unwrap();
        assert_eq!(finalized.current_amount, dec!(80.00));
        assert!(finalized.current_amount <= finalized.target_amount);
        assert_eq!(finalized.status, GoalStatus::Completed);
    }

    #[tokio::test]
    async fn test_missing_goal_is_not_found() {
        let h = harness().await;
        let err = h
            .goals
            .update_goal(
                "missing",
                GoalUpdate {
                    is_active: Some(false),
                    ..GoalUpdate::default()
                },
            )
            .await
            .unwrap_err();
        assert!(matches!(err, Error::NotFound(_)));
    }
}

#[cfg(test)]
mod goal_lifecycle_tests {
    use super::common::*;
    use fundflow_core::goals::GoalServiceTrait;
    use fundflow_core::Error;
    use rust_decimal::Decimal;
    use rust_decimal_macros::dec;

    #[tokio::test]
    async fn test_goal_without_allocations_can_be_deleted() {
        let h = harness().await;
        let goal = h.goal("Car", dec!(300), 50).await;
        assert_eq!(h.goals.delete_goal(goal.id.clone()).await.unwrap(), 1);
        assert!(matches!(h.goals.get_goal(&goal.id), Err(Error::NotFound(_))));
    }

    #[tokio::test]
    async fn test_goal_with_allocations_cannot_be_deleted() {
        let h = harness().await;
        let goal = h.goal("Car", dec!(300), 50).await;
        h.allocate(&goal, "2025-03", dec!(10.00)).await;
        let err = h.goals.delete_goal(goal.id.clone()).await.unwrap_err();
        assert!(matches!(err, Error::Validation(_)));
        assert!(h.goals.get_goal(&goal.id).is_ok());
    }

    #[tokio::test]
    async fn test_progress_reports_allocation_details() {
        let h = harness().await;
        let goal = h.goal("Car", dec!(400), 50).await;
        h.allocate(&goal, "2025-03", dec!(100.00)).await;
        h.allocate(&goal, "2025-04", dec!(50.00)).await;

        let progress = h.goals.get_goal_progress(&goal.id).unwrap();
        assert_eq!(progress.committed_amount, Decimal::ZERO);
        assert_eq!(progress.pending_amount, dec!(150.00));
        assert_eq!(progress.remaining_gap, dec!(250.00));
        assert_eq!(progress.completion_percent, dec!(37.50));
        let months: Vec<_> = progress.allocation_details.iter().map(|d| d.month.as_str()).collect();
        assert_eq!(months, vec!["2025-03", "2025-04"]);

        let allocations = h.goals.load_goal_allocations(&goal.id).unwrap();
        assert_eq!(allocations.len(), 2);
    }

    #[tokio::test]
    async fn test_goals_are_scoped_to_user() {
        let h = harness().await;
        h.goal("Car", dec!(300), 50).await;
        assert_eq!(h.goals.get_goals(USER).unwrap().len(), 1);
        assert!(h.goals.get_goals("someone-else").unwrap().is_empty());
    }
}
