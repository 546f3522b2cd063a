use anyhow::Result;
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::io::Write;

use crate::application::{CashbookService, SummaryPeriod};
use crate::domain::{BusinessId, LedgerEntry};
use crate::storage::{CashbookSummary, EntryFilter};

/// Cashbook snapshot for JSON export
#[derive(Debug, Clone, Serialize)]
pub struct CashbookSnapshot {
    pub version: String,
    pub exported_at: DateTime<Utc>,
    pub business_id: BusinessId,
    pub summary: CashbookSummary,
    pub entries: Vec<LedgerEntry>,
}

/// Exporter for converting cashbook data to various formats
pub struct Exporter<'a> {
    service: &'a CashbookService,
}

impl<'a> Exporter<'a> {
    pub fn new(service: &'a CashbookService) -> Self {
        Self { service }
    }

    /// Export entries to CSV format
    pub async fn export_entries_csv<W: Write>(
        &self,
        business_id: BusinessId,
        writer: W,
    ) -> Result<usize> {
        let entries = self
            .service
            .list_entries(business_id, EntryFilter::default())
            .await?;
        let mut csv_writer = csv::Writer::from_writer(writer);

        csv_writer.write_record([
            "id",
            "sequence",
            "counterparty",
            "direction",
            "amount_paise",
            "name",
            "title",
            "entry_date",
            "proof_type",
            "proof_description",
            "recorded_at",
        ])?;

        let mut count = 0;
        for entry in &entries {
            csv_writer.write_record([
                entry.id.to_string(),
                entry.sequence.to_string(),
                entry.counterparty.clone(),
                entry.direction.to_string(),
                entry.amount_paise.to_string(),
                entry.name.clone(),
                entry.title.clone().unwrap_or_default(),
                entry.entry_date.to_string(),
                entry
                    .proof_type
                    .map(|p| p.as_str().to_string())
                    .unwrap_or_default(),
                entry.proof_description.clone().unwrap_or_default(),
                entry.recorded_at.to_rfc3339(),
            ])?;
            count += 1;
        }

        csv_writer.flush()?;
        Ok(count)
    }

    /// Export the full cashbook as a JSON snapshot
    pub async fn export_full_json<W: Write>(
        &self,
        business_id: BusinessId,
        mut writer: W,
    ) -> Result<CashbookSnapshot> {
        let summary = self.service.summary(business_id, SummaryPeriod::All).await?;
        let entries = self
            .service
            .list_entries(business_id, EntryFilter::default())
            .await?;

        let snapshot = CashbookSnapshot {
            version: env!("CARGO_PKG_VERSION").to_string(),
            exported_at: Utc::now(),
            business_id,
            summary,
            entries,
        };

        let json = serde_json::to_string_pretty(&snapshot)?;
        writer.write_all(json.as_bytes())?;
        writer.flush()?;

        Ok(snapshot)
    }
}
