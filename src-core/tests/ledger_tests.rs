/// Tests for editing and removing recorded entries, and for how those edits
/// flow back through recalculation.
mod common;

#[cfg(test)]
mod ledger_edit_tests {
    use super::common::*;
    use fundflow_core::errors::ValidationError;
    use fundflow_core::ledger::{LedgerEntryUpdate, LedgerServiceTrait};
    use fundflow_core::recalculation::RecalculationStatus;
    use fundflow_core::Error;
    use rust_decimal_macros::dec;

    #[tokio::test]
    async fn test_deleting_income_pulls_allocation_back() {
        let h = harness().await;
        h.profile().await;
        let bike = h.goal("Bike", dec!(500), 40).await;
        let salary = h.record(h.income_category.clone(), dec!(120.00), march()).await;
        let first = h.recalculation.recalculate_for_period(USER, march()).await.unwrap();
        assert_eq!(first.status, RecalculationStatus::Allocated);
        assert_eq!(h.month_allocation(&bike, "2025-03"), dec!(120.00));

        let change = h.ledger.delete_entry(&salary.id).await.unwrap();
        assert!(change.current.is_none());
        assert_eq!(change.affected_periods(), vec![march()]);

        let r = h.recalculation.recalculate_for_period(USER, march()).await.unwrap();
        let pullback = r.pullback.clone().unwrap();
        assert_eq!(r.status, RecalculationStatus::ExpenseProcessed);
        assert_eq!(r.delta.net_change, dec!(-120.00));
        assert_eq!(pullback.goal_reductions.len(), 1);
        assert_eq!(pullback.goal_reductions[0].amount, dec!(120.00));
        assert_eq!(h.month_allocation(&bike, "2025-03"), dec!(0.00));
        assert_eq!(h.current_profile().deficit_balance, dec!(0.00));
        assert!(matches!(
            h.ledger.get_entry(&salary.id),
            Err(Error::NotFound(_))
        ));
    }

    #[tokio::test]
    async fn test_reduced_income_is_a_negative_change() {
        let h = harness().await;
        h.profile().await;
        let salary = h.record(h.income_category.clone(), dec!(100.00), march()).await;
        h.recalculation.recalculate_for_period(USER, march()).await.unwrap();
        assert_eq!(h.current_profile().savings_balance, dec!(100.00));

        let change = h
            .ledger
            .update_entry(
                &salary.id,
                LedgerEntryUpdate {
                    amount: Some(dec!(70.00)),
                    ..LedgerEntryUpdate::default()
                },
            )
            .await
            .unwrap();
        assert_eq!(change.previous.amount, dec!(100.00));
        assert_eq!(change.current.as_ref().map(|e| e.amount), Some(dec!(70.00)));

        let r = h.recalculation.recalculate_for_period(USER, march()).await.unwrap();
        assert_eq!(r.delta.income_delta, dec!(-30.00));
        assert_eq!(r.delta.net_change, dec!(-30.00));
        assert_eq!(r.status, RecalculationStatus::ExpenseProcessed);
        assert_eq!(h.current_profile().savings_balance, dec!(70.00));
    }

    #[tokio::test]
    async fn test_moving_entry_affects_both_months() {
        let h = harness().await;
        h.profile().await;
        let salary = h.record(h.income_category.clone(), dec!(80.00), march()).await;
        h.recalculation.recalculate_for_period(USER, march()).await.unwrap();

        let change = h
            .ledger
            .update_entry(
                &salary.id,
                LedgerEntryUpdate {
                    recorded_at: Some(mid(april())),
                    ..LedgerEntryUpdate::default()
                },
            )
            .await
            .unwrap();
        assert_eq!(change.affected_periods(), vec![march(), april()]);

        for period in change.affected_periods() {
            h.recalculation.recalculate_for_period(USER, period).await.unwrap();
        }
        assert_eq!(h.current_profile().savings_balance, dec!(80.00), "Moved, not duplicated");
        assert!(h
            .ledger
            .get_entries_for_period(USER, &march())
            .unwrap()
            .iter()
            .all(|e| e.is_allocation_transaction));
    }

    #[tokio::test]
    async fn test_engine_postings_cannot_be_edited() {
        let h = harness().await;
        h.profile().await;
        h.income(dec!(50.00), march()).await;
        h.recalculation.recalculate_for_period(USER, march()).await.unwrap();
        let posting = h
            .store
            .entries_for_user(USER)
            .unwrap()
            .into_iter()
            .find(|e| e.is_allocation_transaction)
            .unwrap();

        assert!(matches!(
            h.ledger.delete_entry(&posting.id).await,
            Err(Error::Validation(_))
        ));
        let update = h
            .ledger
            .update_entry(
                &posting.id,
                LedgerEntryUpdate {
                    amount: Some(dec!(1.00)),
                    ..LedgerEntryUpdate::default()
                },
            )
            .await;
        assert!(matches!(update, Err(Error::Validation(_))));
        assert!(h.ledger.get_entry(&posting.id).is_ok(), "Posting must survive");
    }

    #[tokio::test]
    async fn test_finalized_month_entries_are_frozen() {
        let h = harness().await;
        h.profile().await;
        let goal = h.goal("Console", dec!(100.00), 50).await;
        let march_salary = h.record(h.income_category.clone(), dec!(40.00), march()).await;
        let april_salary = h.record(h.income_category.clone(), dec!(10.00), april()).await;
        h.recalculation.recalculate_for_period(USER, march()).await.unwrap();
        h.finalization.finalize_month("2025-03").await.unwrap();

        let deleted = h.ledger.delete_entry(&march_salary.id).await.unwrap_err();
        assert!(matches!(
            deleted,
            Error::Validation(ValidationError::MonthAlreadyFinalized { .. })
        ));

        let moved_in = h
            .ledger
            .update_entry(
                &april_salary.id,
                LedgerEntryUpdate {
                    recorded_at: Some(mid(march())),
                    ..LedgerEntryUpdate::default()
                },
            )
            .await
            .unwrap_err();
        assert!(matches!(
            moved_in,
            Error::Validation(ValidationError::MonthAlreadyFinalized { .. })
        ));
        assert_eq!(h.ledger.get_entry(&april_salary.id).unwrap(), april_salary);
        assert_eq!(h.month_allocation(&goal, "2025-03"), dec!(40.00));
    }

    #[tokio::test]
    async fn test_unknown_entry_is_not_found() {
        let h = harness().await;
        assert!(matches!(
            h.ledger.delete_entry("missing").await,
            Err(Error::NotFound(_))
        ));
    }
}
