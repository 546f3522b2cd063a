// Allow dead_code because these helpers are used across different test files
// which are compiled separately
#![allow(dead_code)]

use anyhow::Result;
use chrono::{NaiveDate, Utc};
use saldo::application::{CashbookService, EntryMeta, NettingOutcome};
use saldo::domain::{plan_netting, Direction, LedgerEntry, Paise};
use saldo::storage::Repository;
use tempfile::TempDir;

pub const BUSINESS: i64 = 1;

/// Helper to create a test service with a temporary database
pub async fn test_service() -> Result<(CashbookService, TempDir)> {
    let (service, _repo, temp_dir) = test_env().await?;
    Ok((service, temp_dir))
}

/// Like `test_service`, but also hands back the repository so tests can
/// seed entries directly (bypassing the netting engine, as happens with
/// imported databases).
pub async fn test_env() -> Result<(CashbookService, Repository, TempDir)> {
    let temp_dir = TempDir::new()?;
    let db_path = temp_dir.path().join("test.db");
    let db_url = format!("sqlite:{}?mode=rwc", db_path.to_str().unwrap());
    let repo = Repository::init(&db_url).await?;
    let service = CashbookService::new(repo.clone());
    Ok((service, repo, temp_dir))
}

/// Insert an entry without running it through the netting engine. The
/// contact must already be in normalized form (digits only).
pub async fn seed(
    repo: &Repository,
    direction: Direction,
    amount: Paise,
    contact: &str,
) -> Result<LedgerEntry> {
    let mut entry = LedgerEntry::new(
        BUSINESS,
        direction,
        amount,
        contact.to_string(),
        "Seeded Party".to_string(),
        Utc::now().date_naive(),
    );
    let plan = plan_netting(amount, &[]);
    repo.apply_create_plan(&plan, Some(&mut entry)).await?;
    Ok(entry)
}

/// Helper to parse a date string into NaiveDate
pub fn parse_date(date_str: &str) -> NaiveDate {
    NaiveDate::parse_from_str(date_str, "%Y-%m-%d").unwrap()
}

/// Minimal entry metadata for tests
pub fn meta(name: &str) -> EntryMeta {
    EntryMeta::new(name, Utc::now().date_naive())
}

/// Record an entry with default metadata
pub async fn record(
    service: &CashbookService,
    direction: Direction,
    amount: Paise,
    contact: &str,
) -> Result<NettingOutcome> {
    Ok(service
        .record_entry(BUSINESS, direction, amount, contact, meta("Test Party"))
        .await?)
}
