use anyhow::{Context, Result};
use chrono::{DateTime, NaiveDate, Utc};
use sqlx::{Row, Sqlite, SqlitePool, Transaction};
use uuid::Uuid;

use crate::domain::{
    BusinessId, Direction, EntryId, LedgerEntry, NettingPlan, Paise, ProofType,
};

use super::MIGRATION_001_INITIAL;

const ENTRY_COLUMNS: &str = "id, business_id, sequence, counterparty, direction, amount_paise, \
     name, title, entry_date, proof_type, proof_description, reminder_enabled, \
     reminder_message, recorded_at, updated_at";

/// Filter for querying ledger entries.
#[derive(Debug, Clone, Default)]
pub struct EntryFilter {
    pub direction: Option<Direction>,
    pub counterparty: Option<String>,
    pub from_date: Option<NaiveDate>,
    pub to_date: Option<NaiveDate>,
    pub limit: Option<usize>,
}

/// On-demand aggregation over all persisted entries of a business. Always
/// recomputed from current storage state, never cached.
#[derive(Debug, Clone, serde::Serialize)]
pub struct CashbookSummary {
    pub total_in: Paise,
    pub total_out: Paise,
    pub entries_in: i64,
    pub entries_out: i64,
}

impl CashbookSummary {
    pub fn balance(&self) -> Paise {
        self.total_in - self.total_out
    }

    pub fn total_entries(&self) -> i64 {
        self.entries_in + self.entries_out
    }
}

/// Statistics for cashbook integrity verification.
#[derive(Debug, Clone)]
pub struct IntegrityStats {
    pub entry_count: i64,
    pub invalid_amounts: i64,
    pub missing_counterparties: i64,
    pub duplicate_sequences: i64,
}

impl IntegrityStats {
    pub fn is_clean(&self) -> bool {
        self.invalid_amounts == 0 && self.missing_counterparties == 0 && self.duplicate_sequences == 0
    }
}

/// Repository for persisting and querying ledger entries.
#[derive(Clone)]
pub struct Repository {
    pool: SqlitePool,
}

impl Repository {
    /// Create a new repository with the given SQLite connection pool.
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// Connect to a SQLite database at the given path.
    /// Creates the database file if it doesn't exist.
    pub async fn connect(database_url: &str) -> Result<Self> {
        let pool = SqlitePool::connect(database_url)
            .await
            .context("Failed to connect to database")?;
        Ok(Self::new(pool))
    }

    /// Run database migrations.
    pub async fn migrate(&self) -> Result<()> {
        sqlx::raw_sql(MIGRATION_001_INITIAL)
            .execute(&self.pool)
            .await
            .context("Failed to run migration 001")?;
        Ok(())
    }

    /// Initialize a new database (connect + migrate).
    pub async fn init(database_url: &str) -> Result<Self> {
        let repo = Self::connect(database_url).await?;
        repo.migrate().await?;
        Ok(repo)
    }

    // ========================
    // Entry queries
    // ========================

    /// Get an entry by ID.
    pub async fn get_entry(&self, id: EntryId) -> Result<Option<LedgerEntry>> {
        let query = format!("SELECT {} FROM entries WHERE id = ?", ENTRY_COLUMNS);
        let row = sqlx::query(&query)
            .bind(id.to_string())
            .fetch_optional(&self.pool)
            .await
            .context("Failed to fetch entry")?;

        match row {
            Some(row) => Ok(Some(Self::row_to_entry(&row)?)),
            None => Ok(None),
        }
    }

    /// List entries with optional filters, newest first.
    pub async fn list_entries(
        &self,
        business_id: BusinessId,
        filter: &EntryFilter,
    ) -> Result<Vec<LedgerEntry>> {
        let mut query = format!(
            "SELECT {} FROM entries WHERE business_id = ?",
            ENTRY_COLUMNS
        );

        let from_date_str = filter.from_date.map(|d| d.to_string());
        let to_date_str = filter.to_date.map(|d| d.to_string());

        if filter.direction.is_some() {
            query.push_str(" AND direction = ?");
        }
        if filter.counterparty.is_some() {
            query.push_str(" AND counterparty = ?");
        }
        if from_date_str.is_some() {
            query.push_str(" AND entry_date >= ?");
        }
        if to_date_str.is_some() {
            query.push_str(" AND entry_date <= ?");
        }

        query.push_str(" ORDER BY sequence DESC");

        if let Some(limit) = filter.limit {
            query.push_str(&format!(" LIMIT {}", limit));
        }

        let mut sql_query = sqlx::query(&query).bind(business_id);
        if let Some(direction) = filter.direction {
            sql_query = sql_query.bind(direction.as_str());
        }
        if let Some(ref counterparty) = filter.counterparty {
            sql_query = sql_query.bind(counterparty);
        }
        if let Some(ref from_date) = from_date_str {
            sql_query = sql_query.bind(from_date);
        }
        if let Some(ref to_date) = to_date_str {
            sql_query = sql_query.bind(to_date);
        }

        let rows = sql_query
            .fetch_all(&self.pool)
            .await
            .context("Failed to list entries")?;

        rows.iter().map(Self::row_to_entry).collect()
    }

    /// All of a counterparty's entries, oldest first.
    pub async fn entries_for_counterparty(
        &self,
        business_id: BusinessId,
        counterparty: &str,
    ) -> Result<Vec<LedgerEntry>> {
        let query = format!(
            "SELECT {} FROM entries WHERE business_id = ? AND counterparty = ? ORDER BY sequence",
            ENTRY_COLUMNS
        );
        let rows = sqlx::query(&query)
            .bind(business_id)
            .bind(counterparty)
            .fetch_all(&self.pool)
            .await
            .context("Failed to list counterparty entries")?;

        rows.iter().map(Self::row_to_entry).collect()
    }

    /// A counterparty's entries in one direction, oldest first: the
    /// consumption order for the netting engine. `exclude` drops the entry
    /// being edited so it does not net against itself.
    pub async fn directed_entries(
        &self,
        business_id: BusinessId,
        counterparty: &str,
        direction: Direction,
        exclude: Option<EntryId>,
    ) -> Result<Vec<LedgerEntry>> {
        let mut query = format!(
            "SELECT {} FROM entries WHERE business_id = ? AND counterparty = ? AND direction = ?",
            ENTRY_COLUMNS
        );
        if exclude.is_some() {
            query.push_str(" AND id != ?");
        }
        query.push_str(" ORDER BY sequence");

        let mut sql_query = sqlx::query(&query)
            .bind(business_id)
            .bind(counterparty)
            .bind(direction.as_str());
        if let Some(id) = exclude {
            sql_query = sql_query.bind(id.to_string());
        }

        let rows = sql_query
            .fetch_all(&self.pool)
            .await
            .context("Failed to list directed entries")?;

        rows.iter().map(Self::row_to_entry).collect()
    }

    /// Counterparties of a business holding entries in both directions, the
    /// candidates for a manual net-all pass.
    pub async fn counterparties_with_offsets(
        &self,
        business_id: BusinessId,
    ) -> Result<Vec<String>> {
        let rows = sqlx::query(
            r#"
            SELECT counterparty
            FROM entries
            WHERE business_id = ?
            GROUP BY counterparty
            HAVING SUM(CASE WHEN direction = 'out' THEN 1 ELSE 0 END) > 0
               AND SUM(CASE WHEN direction = 'in' THEN 1 ELSE 0 END) > 0
            ORDER BY counterparty
            "#,
        )
        .bind(business_id)
        .fetch_all(&self.pool)
        .await
        .context("Failed to list netting candidates")?;

        Ok(rows.iter().map(|row| row.get("counterparty")).collect())
    }

    /// "Out" entries with reminders enabled: the read contract of the
    /// external reminder subsystem.
    pub async fn reminder_entries(&self, business_id: BusinessId) -> Result<Vec<LedgerEntry>> {
        let query = format!(
            "SELECT {} FROM entries \
             WHERE business_id = ? AND direction = 'out' AND reminder_enabled = 1 \
             ORDER BY sequence",
            ENTRY_COLUMNS
        );
        let rows = sqlx::query(&query)
            .bind(business_id)
            .fetch_all(&self.pool)
            .await
            .context("Failed to list reminder entries")?;

        rows.iter().map(Self::row_to_entry).collect()
    }

    // ========================
    // Entry mutations
    // ========================

    /// Apply the netting plan for a newly recorded amount in one transaction:
    /// delete consumed entries, shrink the partially consumed one, and insert
    /// the remainder entry (with a fresh sequence number) if there is one.
    /// On any failure the transaction rolls back and storage is unchanged.
    pub async fn apply_create_plan(
        &self,
        plan: &NettingPlan,
        remainder_entry: Option<&mut LedgerEntry>,
    ) -> Result<()> {
        let mut tx = self
            .pool
            .begin()
            .await
            .context("Failed to begin netting transaction")?;

        Self::apply_offsets(&mut tx, plan).await?;

        if let Some(entry) = remainder_entry {
            entry.sequence = Self::next_sequence(&mut tx).await?;
            Self::insert_entry(&mut tx, entry).await?;
        }

        tx.commit()
            .await
            .context("Failed to commit netting transaction")?;
        Ok(())
    }

    /// Apply an edit with its netting plan in one transaction. The raw field
    /// change is persisted first; then the plan runs against the opposite
    /// entries; finally the edited entry itself is deleted (fully absorbed)
    /// or shrunk to the remainder.
    pub async fn apply_update_plan(&self, entry: &LedgerEntry, plan: &NettingPlan) -> Result<()> {
        let mut tx = self
            .pool
            .begin()
            .await
            .context("Failed to begin netting transaction")?;

        Self::update_fields(&mut tx, entry).await?;
        Self::apply_offsets(&mut tx, plan).await?;

        if plan.remainder == 0 {
            sqlx::query("DELETE FROM entries WHERE id = ?")
                .bind(entry.id.to_string())
                .execute(&mut *tx)
                .await
                .context("Failed to delete fully netted entry")?;
        } else if plan.remainder != entry.amount_paise {
            sqlx::query("UPDATE entries SET amount_paise = ? WHERE id = ?")
                .bind(plan.remainder)
                .bind(entry.id.to_string())
                .execute(&mut *tx)
                .await
                .context("Failed to shrink edited entry")?;
        }

        tx.commit()
            .await
            .context("Failed to commit netting transaction")?;
        Ok(())
    }

    /// Persist a metadata-only edit (no netting involved).
    pub async fn update_entry_fields(&self, entry: &LedgerEntry) -> Result<()> {
        let mut tx = self
            .pool
            .begin()
            .await
            .context("Failed to begin update transaction")?;
        Self::update_fields(&mut tx, entry).await?;
        tx.commit()
            .await
            .context("Failed to commit update transaction")?;
        Ok(())
    }

    /// Delete a single entry. Returns false if no entry matched.
    pub async fn delete_entry(&self, id: EntryId) -> Result<bool> {
        let result = sqlx::query("DELETE FROM entries WHERE id = ?")
            .bind(id.to_string())
            .execute(&self.pool)
            .await
            .context("Failed to delete entry")?;
        Ok(result.rows_affected() > 0)
    }

    /// Delete a batch of entries in one transaction (manual netting).
    pub async fn delete_entries(&self, ids: &[EntryId]) -> Result<u64> {
        let mut tx = self
            .pool
            .begin()
            .await
            .context("Failed to begin delete transaction")?;

        let mut deleted = 0;
        for id in ids {
            let result = sqlx::query("DELETE FROM entries WHERE id = ?")
                .bind(id.to_string())
                .execute(&mut *tx)
                .await
                .context("Failed to delete netted entry")?;
            deleted += result.rows_affected();
        }

        tx.commit()
            .await
            .context("Failed to commit delete transaction")?;
        Ok(deleted)
    }

    // ========================
    // Aggregation
    // ========================

    /// Compute the summary with SQL aggregation, optionally restricted to
    /// entries dated on or after `since`.
    pub async fn summary(
        &self,
        business_id: BusinessId,
        since: Option<NaiveDate>,
    ) -> Result<CashbookSummary> {
        let mut query = String::from(
            r#"
            SELECT
                COALESCE(SUM(CASE WHEN direction = 'in' THEN amount_paise ELSE 0 END), 0) as total_in,
                COALESCE(SUM(CASE WHEN direction = 'out' THEN amount_paise ELSE 0 END), 0) as total_out,
                COALESCE(SUM(CASE WHEN direction = 'in' THEN 1 ELSE 0 END), 0) as entries_in,
                COALESCE(SUM(CASE WHEN direction = 'out' THEN 1 ELSE 0 END), 0) as entries_out
            FROM entries
            WHERE business_id = ?
            "#,
        );

        let since_str = since.map(|d| d.to_string());
        if since_str.is_some() {
            query.push_str(" AND entry_date >= ?");
        }

        let mut sql_query = sqlx::query(&query).bind(business_id);
        if let Some(ref since) = since_str {
            sql_query = sql_query.bind(since);
        }

        let row = sql_query
            .fetch_one(&self.pool)
            .await
            .context("Failed to compute summary")?;

        Ok(CashbookSummary {
            total_in: row.get("total_in"),
            total_out: row.get("total_out"),
            entries_in: row.get("entries_in"),
            entries_out: row.get("entries_out"),
        })
    }

    /// Get statistics for integrity checking.
    pub async fn get_integrity_stats(&self, business_id: BusinessId) -> Result<IntegrityStats> {
        let row = sqlx::query(
            r#"
            SELECT
                COUNT(*) as entry_count,
                COALESCE(SUM(CASE WHEN amount_paise <= 0 THEN 1 ELSE 0 END), 0) as invalid_amounts,
                COALESCE(SUM(CASE WHEN counterparty = '' THEN 1 ELSE 0 END), 0) as missing_counterparties
            FROM entries
            WHERE business_id = ?
            "#,
        )
        .bind(business_id)
        .fetch_one(&self.pool)
        .await
        .context("Failed to compute integrity stats")?;

        let duplicate_sequences: i64 = sqlx::query(
            r#"
            SELECT COUNT(*) as count FROM (
                SELECT sequence FROM entries WHERE business_id = ?
                GROUP BY sequence HAVING COUNT(*) > 1
            )
            "#,
        )
        .bind(business_id)
        .fetch_one(&self.pool)
        .await
        .context("Failed to check sequence uniqueness")?
        .get("count");

        Ok(IntegrityStats {
            entry_count: row.get("entry_count"),
            invalid_amounts: row.get("invalid_amounts"),
            missing_counterparties: row.get("missing_counterparties"),
            duplicate_sequences,
        })
    }

    // ========================
    // Internals
    // ========================

    /// Get the next sequence number and increment the counter.
    async fn next_sequence(tx: &mut Transaction<'_, Sqlite>) -> Result<i64> {
        let row = sqlx::query(
            r#"
            UPDATE sequence_counter
            SET value = value + 1
            WHERE name = 'entry_sequence'
            RETURNING value
            "#,
        )
        .fetch_one(&mut **tx)
        .await
        .context("Failed to get next sequence number")?;

        Ok(row.get("value"))
    }

    /// Run the offset half of a plan: deletes and amount reductions.
    async fn apply_offsets(tx: &mut Transaction<'_, Sqlite>, plan: &NettingPlan) -> Result<()> {
        for id in &plan.to_delete {
            sqlx::query("DELETE FROM entries WHERE id = ?")
                .bind(id.to_string())
                .execute(&mut **tx)
                .await
                .context("Failed to delete netted entry")?;
        }

        let now = Utc::now().to_rfc3339();
        for update in &plan.to_update {
            sqlx::query("UPDATE entries SET amount_paise = ?, updated_at = ? WHERE id = ?")
                .bind(update.new_amount)
                .bind(&now)
                .bind(update.id.to_string())
                .execute(&mut **tx)
                .await
                .context("Failed to shrink netted entry")?;
        }

        Ok(())
    }

    async fn insert_entry(tx: &mut Transaction<'_, Sqlite>, entry: &LedgerEntry) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO entries (id, business_id, sequence, counterparty, direction, amount_paise,
                                 name, title, entry_date, proof_type, proof_description,
                                 reminder_enabled, reminder_message, recorded_at, updated_at)
            VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(entry.id.to_string())
        .bind(entry.business_id)
        .bind(entry.sequence)
        .bind(&entry.counterparty)
        .bind(entry.direction.as_str())
        .bind(entry.amount_paise)
        .bind(&entry.name)
        .bind(&entry.title)
        .bind(entry.entry_date.to_string())
        .bind(entry.proof_type.map(|p| p.as_str()))
        .bind(&entry.proof_description)
        .bind(entry.reminder_enabled)
        .bind(&entry.reminder_message)
        .bind(entry.recorded_at.to_rfc3339())
        .bind(entry.updated_at.map(|dt| dt.to_rfc3339()))
        .execute(&mut **tx)
        .await
        .context("Failed to insert entry")?;
        Ok(())
    }

    async fn update_fields(tx: &mut Transaction<'_, Sqlite>, entry: &LedgerEntry) -> Result<()> {
        sqlx::query(
            r#"
            UPDATE entries
            SET direction = ?, amount_paise = ?, name = ?, title = ?, entry_date = ?,
                proof_type = ?, proof_description = ?, reminder_enabled = ?,
                reminder_message = ?, updated_at = ?
            WHERE id = ?
            "#,
        )
        .bind(entry.direction.as_str())
        .bind(entry.amount_paise)
        .bind(&entry.name)
        .bind(&entry.title)
        .bind(entry.entry_date.to_string())
        .bind(entry.proof_type.map(|p| p.as_str()))
        .bind(&entry.proof_description)
        .bind(entry.reminder_enabled)
        .bind(&entry.reminder_message)
        .bind(entry.updated_at.map(|dt| dt.to_rfc3339()))
        .bind(entry.id.to_string())
        .execute(&mut **tx)
        .await
        .context("Failed to update entry fields")?;
        Ok(())
    }

    fn row_to_entry(row: &sqlx::sqlite::SqliteRow) -> Result<LedgerEntry> {
        let id_str: String = row.get("id");
        let direction_str: String = row.get("direction");
        let entry_date_str: String = row.get("entry_date");
        let proof_type_str: Option<String> = row.get("proof_type");
        let recorded_at_str: String = row.get("recorded_at");
        let updated_at_str: Option<String> = row.get("updated_at");

        Ok(LedgerEntry {
            id: Uuid::parse_str(&id_str).context("Invalid entry ID")?,
            business_id: row.get("business_id"),
            sequence: row.get("sequence"),
            counterparty: row.get("counterparty"),
            direction: Direction::from_str(&direction_str)
                .ok_or_else(|| anyhow::anyhow!("Invalid direction: {}", direction_str))?,
            amount_paise: row.get("amount_paise"),
            name: row.get("name"),
            title: row.get("title"),
            entry_date: NaiveDate::parse_from_str(&entry_date_str, "%Y-%m-%d")
                .context("Invalid entry_date")?,
            proof_type: proof_type_str
                .map(|s| {
                    ProofType::from_str(&s)
                        .ok_or_else(|| anyhow::anyhow!("Invalid proof type: {}", s))
                })
                .transpose()?,
            proof_description: row.get("proof_description"),
            reminder_enabled: row.get::<i32, _>("reminder_enabled") != 0,
            reminder_message: row.get("reminder_message"),
            recorded_at: DateTime::parse_from_rfc3339(&recorded_at_str)
                .context("Invalid recorded_at timestamp")?
                .with_timezone(&Utc),
            updated_at: updated_at_str
                .map(|s| DateTime::parse_from_rfc3339(&s))
                .transpose()
                .context("Invalid updated_at timestamp")?
                .map(|dt| dt.with_timezone(&Utc)),
        })
    }
}
