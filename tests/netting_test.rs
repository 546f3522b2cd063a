mod common;

use std::sync::Arc;

use anyhow::Result;
use common::{record, test_service, BUSINESS};
use saldo::application::{AppError, SummaryPeriod};
use saldo::domain::Direction;

const CONTACT: &str = "9876543210";

#[tokio::test]
async fn test_matching_amount_deletes_opposite_entry() -> Result<()> {
    let (service, _temp) = test_service().await?;

    // Out 1000, then in 1000 from the same contact
    let out = record(&service, Direction::Out, 100000, CONTACT).await?;
    let outcome = record(&service, Direction::In, 100000, CONTACT).await?;

    assert_eq!(outcome.deleted, vec![out.entry.unwrap().id]);
    assert!(outcome.updated.is_empty());
    assert!(outcome.fully_absorbed());

    let (entries, position) = service.counterparty_position(BUSINESS, CONTACT).await?;
    assert!(entries.is_empty(), "Ledger should be fully collapsed");
    assert_eq!(position, 0);
    Ok(())
}

#[tokio::test]
async fn test_partial_netting_shrinks_opposite_entry() -> Result<()> {
    let (service, _temp) = test_service().await?;

    record(&service, Direction::Out, 100000, CONTACT).await?;
    let outcome = record(&service, Direction::In, 60000, CONTACT).await?;

    assert!(outcome.deleted.is_empty());
    assert_eq!(outcome.updated.len(), 1);
    assert!(outcome.fully_absorbed(), "No remainder, so no new entry");

    let (entries, position) = service.counterparty_position(BUSINESS, CONTACT).await?;
    assert_eq!(entries.len(), 1);
    assert_eq!(entries[0].direction, Direction::Out);
    assert_eq!(entries[0].amount_paise, 40000);
    assert_eq!(position, -40000);
    Ok(())
}

#[tokio::test]
async fn test_netting_spans_entries_oldest_first() -> Result<()> {
    let (service, _temp) = test_service().await?;

    // Out 300 (oldest), then out 500
    let older = record(&service, Direction::Out, 30000, CONTACT).await?;
    record(&service, Direction::Out, 50000, CONTACT).await?;

    // In 700: 300-entry deleted, 500-entry shrunk to 100
    let outcome = record(&service, Direction::In, 70000, CONTACT).await?;
    assert_eq!(outcome.deleted, vec![older.entry.unwrap().id]);
    assert_eq!(outcome.updated.len(), 1);
    assert!(outcome.fully_absorbed());

    let (entries, _) = service.counterparty_position(BUSINESS, CONTACT).await?;
    assert_eq!(entries.len(), 1);
    assert_eq!(entries[0].amount_paise, 10000);
    assert_eq!(entries[0].direction, Direction::Out);
    Ok(())
}

#[tokio::test]
async fn test_no_opposite_entries_persists_unchanged() -> Result<()> {
    let (service, _temp) = test_service().await?;

    let outcome = record(&service, Direction::Out, 20000, CONTACT).await?;
    assert!(outcome.deleted.is_empty());
    assert!(outcome.updated.is_empty());

    let entry = outcome.entry.expect("Entry should be persisted as-is");
    assert_eq!(entry.amount_paise, 20000);
    assert_eq!(entry.direction, Direction::Out);
    Ok(())
}

#[tokio::test]
async fn test_excess_amount_leaves_remainder_entry() -> Result<()> {
    let (service, _temp) = test_service().await?;

    record(&service, Direction::Out, 100000, CONTACT).await?;
    let outcome = record(&service, Direction::In, 120000, CONTACT).await?;

    assert_eq!(outcome.deleted.len(), 1);
    let remainder = outcome.entry.expect("Remainder should become a new entry");
    assert_eq!(remainder.amount_paise, 20000);
    assert_eq!(remainder.direction, Direction::In);

    let (entries, position) = service.counterparty_position(BUSINESS, CONTACT).await?;
    assert_eq!(entries.len(), 1);
    assert_eq!(position, 20000);
    Ok(())
}

#[tokio::test]
async fn test_fifo_consumes_oldest_entry_first() -> Result<()> {
    let (service, _temp) = test_service().await?;

    let first = record(&service, Direction::Out, 50000, CONTACT).await?;
    let second = record(&service, Direction::Out, 50000, CONTACT).await?;

    // In 500 must consume the older of the two equal out entries
    let outcome = record(&service, Direction::In, 50000, CONTACT).await?;
    assert_eq!(outcome.deleted, vec![first.entry.unwrap().id]);

    let (entries, _) = service.counterparty_position(BUSINESS, CONTACT).await?;
    assert_eq!(entries.len(), 1);
    assert_eq!(entries[0].id, second.entry.unwrap().id);
    Ok(())
}

#[tokio::test]
async fn test_full_absorption_across_all_entries() -> Result<()> {
    let (service, _temp) = test_service().await?;

    record(&service, Direction::Out, 30000, CONTACT).await?;
    record(&service, Direction::Out, 50000, CONTACT).await?;

    let outcome = record(&service, Direction::In, 80000, CONTACT).await?;
    assert_eq!(outcome.deleted.len(), 2);
    assert!(outcome.updated.is_empty());
    assert!(outcome.fully_absorbed());

    let (entries, _) = service.counterparty_position(BUSINESS, CONTACT).await?;
    assert!(entries.is_empty());
    Ok(())
}

#[tokio::test]
async fn test_netting_scoped_to_counterparty() -> Result<()> {
    let (service, _temp) = test_service().await?;

    record(&service, Direction::Out, 100000, "9876543210").await?;
    let outcome = record(&service, Direction::In, 100000, "9123456780").await?;

    // Different contact: nothing nets
    assert!(outcome.deleted.is_empty());
    assert!(outcome.entry.is_some());

    let (entries, _) = service
        .counterparty_position(BUSINESS, "9876543210")
        .await?;
    assert_eq!(entries.len(), 1);
    Ok(())
}

#[tokio::test]
async fn test_netting_scoped_to_business() -> Result<()> {
    let (service, _temp) = test_service().await?;

    service
        .record_entry(1, Direction::Out, 100000, CONTACT, common::meta("A"))
        .await?;
    let outcome = service
        .record_entry(2, Direction::In, 100000, CONTACT, common::meta("A"))
        .await?;

    // Same contact, different business: nothing nets
    assert!(outcome.deleted.is_empty());
    assert!(outcome.entry.is_some());
    Ok(())
}

#[tokio::test]
async fn test_same_direction_never_nets() -> Result<()> {
    let (service, _temp) = test_service().await?;

    record(&service, Direction::Out, 50000, CONTACT).await?;
    let outcome = record(&service, Direction::Out, 50000, CONTACT).await?;

    assert!(outcome.deleted.is_empty());
    assert!(outcome.updated.is_empty());

    let (entries, _) = service.counterparty_position(BUSINESS, CONTACT).await?;
    assert_eq!(entries.len(), 2);
    Ok(())
}

#[tokio::test]
async fn test_contact_normalization_groups_entries() -> Result<()> {
    let (service, _temp) = test_service().await?;

    record(&service, Direction::Out, 100000, "98765 43210").await?;
    let outcome = record(&service, Direction::In, 100000, "987-654-3210").await?;

    // Different formatting, same normalized contact: they net
    assert_eq!(outcome.deleted.len(), 1);
    assert!(outcome.fully_absorbed());
    Ok(())
}

#[tokio::test]
async fn test_balance_invariance_under_netting() -> Result<()> {
    let (service, _temp) = test_service().await?;

    let steps = [
        (Direction::Out, 100000, "9876543210"),
        (Direction::In, 60000, "9876543210"),
        (Direction::In, 70000, "9876543210"),
        (Direction::Out, 25000, "9123456780"),
        (Direction::In, 25000, "9123456780"),
    ];

    let mut expected_balance = 0;
    for (direction, amount, contact) in steps {
        record(&service, direction, amount, contact).await?;
        expected_balance += direction.signed(amount);

        let summary = service.summary(BUSINESS, SummaryPeriod::All).await?;
        assert_eq!(
            summary.balance(),
            expected_balance,
            "Netting must never change the aggregate balance"
        );
    }
    Ok(())
}

#[tokio::test]
async fn test_all_persisted_amounts_stay_positive() -> Result<()> {
    let (service, _temp) = test_service().await?;

    record(&service, Direction::Out, 30000, CONTACT).await?;
    record(&service, Direction::Out, 45000, CONTACT).await?;
    record(&service, Direction::In, 50000, CONTACT).await?;
    record(&service, Direction::Out, 10000, CONTACT).await?;
    record(&service, Direction::In, 1, CONTACT).await?;

    let (entries, _) = service.counterparty_position(BUSINESS, CONTACT).await?;
    assert!(!entries.is_empty());
    for entry in entries {
        assert!(entry.amount_paise > 0, "Persisted amount must stay positive");
    }

    let stats = service.check_integrity(BUSINESS).await?;
    assert!(stats.is_clean());
    Ok(())
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_records_serialize_per_counterparty() -> Result<()> {
    let (service, _temp) = test_service().await?;
    let service = Arc::new(service);

    // Mixed directions racing against one contact. The group lock must
    // serialize the read-plan-apply cycles; interleaving would lose updates
    // and break the balance.
    let submissions = [
        (Direction::Out, 30000),
        (Direction::In, 45000),
        (Direction::Out, 25000),
        (Direction::In, 10000),
        (Direction::Out, 60000),
        (Direction::In, 5000),
        (Direction::Out, 15000),
        (Direction::In, 70000),
    ];
    let expected_balance: i64 = submissions.iter().map(|(d, a)| d.signed(*a)).sum();

    let mut handles = Vec::new();
    for (direction, amount) in submissions {
        let service = Arc::clone(&service);
        handles.push(tokio::spawn(async move {
            record(&service, direction, amount, CONTACT).await
        }));
    }
    for handle in handles {
        handle.await??;
    }

    let summary = service.summary(BUSINESS, SummaryPeriod::All).await?;
    assert_eq!(
        summary.balance(),
        expected_balance,
        "Concurrent records must not lose updates"
    );

    let (entries, position) = service.counterparty_position(BUSINESS, CONTACT).await?;
    assert_eq!(position, expected_balance);
    for entry in entries {
        assert!(entry.amount_paise > 0, "Persisted amount must stay positive");
    }

    let stats = service.check_integrity(BUSINESS).await?;
    assert!(stats.is_clean());
    Ok(())
}

#[tokio::test]
async fn test_zero_amount_rejected() -> Result<()> {
    let (service, _temp) = test_service().await?;

    let result = record(&service, Direction::In, 0, CONTACT).await;
    assert!(matches!(
        result.unwrap_err().downcast::<AppError>(),
        Ok(AppError::InvalidAmount(_))
    ));
    Ok(())
}

#[tokio::test]
async fn test_missing_contact_rejected() -> Result<()> {
    let (service, _temp) = test_service().await?;

    let result = record(&service, Direction::In, 1000, "  ").await;
    assert!(matches!(
        result.unwrap_err().downcast::<AppError>(),
        Ok(AppError::MissingContact)
    ));
    Ok(())
}

#[tokio::test]
async fn test_missing_name_rejected() -> Result<()> {
    let (service, _temp) = test_service().await?;

    let result = service
        .record_entry(BUSINESS, Direction::In, 1000, CONTACT, common::meta(" "))
        .await;
    assert!(matches!(result, Err(AppError::MissingName)));
    Ok(())
}
