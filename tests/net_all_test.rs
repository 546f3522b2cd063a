mod common;

use anyhow::Result;
use common::{seed, test_env, BUSINESS};
use saldo::domain::Direction;

const CONTACT: &str = "9876543210";
const OTHER: &str = "9123456780";

#[tokio::test]
async fn test_exact_pair_is_deleted() -> Result<()> {
    let (service, repo, _temp) = test_env().await?;

    seed(&repo, Direction::Out, 50000, CONTACT).await?;
    seed(&repo, Direction::In, 50000, CONTACT).await?;

    let report = service.net_counterparty(BUSINESS, CONTACT).await?;
    assert_eq!(report.netted_pairs, 1);
    assert_eq!(report.deleted_entries, 2);

    let (entries, _) = service.counterparty_position(BUSINESS, CONTACT).await?;
    assert!(entries.is_empty());
    Ok(())
}

#[tokio::test]
async fn test_unequal_amounts_are_left_alone() -> Result<()> {
    let (service, repo, _temp) = test_env().await?;

    // Manual netting is exact-match only: 500 against 300 does nothing,
    // even though a partial offset would be arithmetically possible
    seed(&repo, Direction::Out, 50000, CONTACT).await?;
    seed(&repo, Direction::In, 30000, CONTACT).await?;

    let report = service.net_counterparty(BUSINESS, CONTACT).await?;
    assert_eq!(report.netted_pairs, 0);
    assert_eq!(report.deleted_entries, 0);

    let (entries, position) = service.counterparty_position(BUSINESS, CONTACT).await?;
    assert_eq!(entries.len(), 2);
    assert_eq!(position, -20000);
    Ok(())
}

#[tokio::test]
async fn test_each_entry_matched_at_most_once() -> Result<()> {
    let (service, repo, _temp) = test_env().await?;

    // Two outs of 500 but only one in of 500: exactly one pair forms
    seed(&repo, Direction::Out, 50000, CONTACT).await?;
    seed(&repo, Direction::Out, 50000, CONTACT).await?;
    seed(&repo, Direction::In, 50000, CONTACT).await?;

    let report = service.net_counterparty(BUSINESS, CONTACT).await?;
    assert_eq!(report.netted_pairs, 1);
    assert_eq!(report.deleted_entries, 2);

    let (entries, position) = service.counterparty_position(BUSINESS, CONTACT).await?;
    assert_eq!(entries.len(), 1);
    assert_eq!(entries[0].direction, Direction::Out);
    assert_eq!(position, -50000);
    Ok(())
}

#[tokio::test]
async fn test_multiple_pairs_in_one_pass() -> Result<()> {
    let (service, repo, _temp) = test_env().await?;

    seed(&repo, Direction::Out, 50000, CONTACT).await?;
    seed(&repo, Direction::Out, 20000, CONTACT).await?;
    seed(&repo, Direction::In, 20000, CONTACT).await?;
    seed(&repo, Direction::In, 50000, CONTACT).await?;

    let report = service.net_counterparty(BUSINESS, CONTACT).await?;
    assert_eq!(report.netted_pairs, 2);
    assert_eq!(report.deleted_entries, 4);

    let (entries, _) = service.counterparty_position(BUSINESS, CONTACT).await?;
    assert!(entries.is_empty());
    Ok(())
}

#[tokio::test]
async fn test_net_all_covers_every_offsetting_counterparty() -> Result<()> {
    let (service, repo, _temp) = test_env().await?;

    seed(&repo, Direction::Out, 50000, CONTACT).await?;
    seed(&repo, Direction::In, 50000, CONTACT).await?;
    seed(&repo, Direction::Out, 30000, OTHER).await?;
    seed(&repo, Direction::In, 30000, OTHER).await?;
    // One-sided counterparty: never considered
    seed(&repo, Direction::Out, 10000, "9000000001").await?;

    let reports = service.net_all(BUSINESS).await?;
    assert_eq!(reports.len(), 2);
    for report in &reports {
        let net = report.result.as_ref().unwrap();
        assert_eq!(net.netted_pairs, 1);
        assert_eq!(net.deleted_entries, 2);
    }

    // The one-sided entry is untouched
    let (entries, _) = service
        .counterparty_position(BUSINESS, "9000000001")
        .await?;
    assert_eq!(entries.len(), 1);
    Ok(())
}

#[tokio::test]
async fn test_net_all_with_no_offsets_is_empty() -> Result<()> {
    let (service, repo, _temp) = test_env().await?;

    seed(&repo, Direction::Out, 50000, CONTACT).await?;
    seed(&repo, Direction::In, 30000, OTHER).await?;

    let reports = service.net_all(BUSINESS).await?;
    assert!(reports.is_empty());
    Ok(())
}

#[tokio::test]
async fn test_net_scoped_to_business() -> Result<()> {
    let (service, repo, _temp) = test_env().await?;

    seed(&repo, Direction::Out, 50000, CONTACT).await?;
    seed(&repo, Direction::In, 50000, CONTACT).await?;

    // A different business sees nothing to net
    let reports = service.net_all(2).await?;
    assert!(reports.is_empty());

    let (entries, _) = service.counterparty_position(BUSINESS, CONTACT).await?;
    assert_eq!(entries.len(), 2);
    Ok(())
}
