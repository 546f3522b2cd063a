use std::collections::HashMap;
use std::sync::{Arc, Mutex as StdMutex};

use chrono::{DateTime, Duration, NaiveDate, Utc};
use tokio::sync::Mutex as AsyncMutex;
use tracing::{debug, info, warn};

use crate::domain::{
    normalize_contact, plan_exact_pairs, plan_netting, BusinessId, ContactError, Direction,
    EntryId, LedgerEntry, Paise, ProofType,
};
use crate::storage::{CashbookSummary, EntryFilter, IntegrityStats, Repository};

use super::AppError;

/// Descriptive fields for a new entry, carried through unchanged by the
/// netting engine.
#[derive(Debug, Clone)]
pub struct EntryMeta {
    pub name: String,
    pub title: Option<String>,
    pub entry_date: NaiveDate,
    pub proof_type: Option<ProofType>,
    pub proof_description: Option<String>,
    pub reminder_enabled: bool,
    pub reminder_message: Option<String>,
}

impl EntryMeta {
    pub fn new(name: impl Into<String>, entry_date: NaiveDate) -> Self {
        Self {
            name: name.into(),
            title: None,
            entry_date,
            proof_type: None,
            proof_description: None,
            reminder_enabled: false,
            reminder_message: None,
        }
    }
}

/// Partial edit of an existing entry. Unset fields keep their current value.
/// Changing the amount or direction re-runs netting for the whole group.
#[derive(Debug, Clone, Default)]
pub struct EntryPatch {
    pub amount_paise: Option<Paise>,
    pub direction: Option<Direction>,
    pub name: Option<String>,
    pub title: Option<String>,
    pub entry_date: Option<NaiveDate>,
    pub proof_type: Option<ProofType>,
    pub proof_description: Option<String>,
    pub reminder_enabled: Option<bool>,
    pub reminder_message: Option<String>,
}

impl EntryPatch {
    /// True when the edit touches the fields the netting engine cares about.
    fn triggers_netting(&self) -> bool {
        self.amount_paise.is_some() || self.direction.is_some()
    }
}

/// Result of recording or editing an entry: which opposite entries the plan
/// consumed, and what is left on the books. `entry` is `None` when the
/// submitted amount was fully absorbed (create path) or the edited entry
/// round-tripped to zero and was deleted (update path).
#[derive(Debug, Clone)]
pub struct NettingOutcome {
    pub deleted: Vec<EntryId>,
    pub updated: Vec<EntryId>,
    pub entry: Option<LedgerEntry>,
}

impl NettingOutcome {
    pub fn fully_absorbed(&self) -> bool {
        self.entry.is_none()
    }
}

/// Result of a manual netting pass for one counterparty.
#[derive(Debug, Clone)]
pub struct NetReport {
    pub netted_pairs: usize,
    pub deleted_entries: usize,
}

/// Per-counterparty result of a batch net-all pass. A failure in one group
/// never aborts the others.
#[derive(Debug)]
pub struct CounterpartyNetReport {
    pub counterparty: String,
    pub result: Result<NetReport, AppError>,
}

/// Time window for the summary, measured over the entry date.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SummaryPeriod {
    Today,
    Week,
    Month,
    Year,
    All,
}

impl SummaryPeriod {
    pub fn from_str(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "today" => Some(SummaryPeriod::Today),
            "week" => Some(SummaryPeriod::Week),
            "month" => Some(SummaryPeriod::Month),
            "year" => Some(SummaryPeriod::Year),
            "all" => Some(SummaryPeriod::All),
            _ => None,
        }
    }

    fn start_date(&self, now: DateTime<Utc>) -> Option<NaiveDate> {
        let today = now.date_naive();
        match self {
            SummaryPeriod::Today => Some(today),
            SummaryPeriod::Week => Some(today - Duration::days(7)),
            SummaryPeriod::Month => Some(today - Duration::days(30)),
            SummaryPeriod::Year => Some(today - Duration::days(365)),
            SummaryPeriod::All => None,
        }
    }
}

type GroupKey = (BusinessId, String);

/// Application service providing high-level cashbook operations.
/// This is the primary interface for any client (CLI, API, reminder
/// subsystem, etc.).
///
/// Every mutation of a `(business, counterparty)` group runs under that
/// group's lock, so concurrent read-plan-apply cycles never interleave;
/// different counterparties proceed in parallel.
pub struct CashbookService {
    repo: Repository,
    group_locks: StdMutex<HashMap<GroupKey, Arc<AsyncMutex<()>>>>,
}

impl CashbookService {
    /// Create a new cashbook service with the given repository.
    pub fn new(repo: Repository) -> Self {
        Self {
            repo,
            group_locks: StdMutex::new(HashMap::new()),
        }
    }

    /// Initialize a new database at the given path.
    pub async fn init(database_path: &str) -> Result<Self, AppError> {
        let db_url = format!("sqlite:{}?mode=rwc", database_path);
        let repo = Repository::init(&db_url).await?;
        Ok(Self::new(repo))
    }

    /// Connect to an existing database.
    pub async fn connect(database_path: &str) -> Result<Self, AppError> {
        let db_url = format!("sqlite:{}", database_path);
        let repo = Repository::connect(&db_url).await?;
        Ok(Self::new(repo))
    }

    fn group_lock(&self, business_id: BusinessId, counterparty: &str) -> Arc<AsyncMutex<()>> {
        let mut locks = self
            .group_locks
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        // Drop locks nobody holds anymore so the map does not grow with
        // every counterparty ever touched
        locks.retain(|_, lock| Arc::strong_count(lock) > 1);
        locks
            .entry((business_id, counterparty.to_string()))
            .or_default()
            .clone()
    }

    fn check_contact(&self, contact: &str) -> Result<String, AppError> {
        normalize_contact(contact).map_err(|e| match e {
            ContactError::Empty => AppError::MissingContact,
            ContactError::Invalid(raw) => AppError::InvalidContact(raw),
        })
    }

    // ========================
    // Reconciliation: create
    // ========================

    /// Record a new directed cash entry and net it against the counterparty's
    /// opposite entries. The whole plan (deletes, reductions, remainder
    /// insert) applies in a single transaction.
    pub async fn record_entry(
        &self,
        business_id: BusinessId,
        direction: Direction,
        amount_paise: Paise,
        contact: &str,
        meta: EntryMeta,
    ) -> Result<NettingOutcome, AppError> {
        if amount_paise <= 0 {
            return Err(AppError::InvalidAmount(
                "Amount must be positive".to_string(),
            ));
        }
        if meta.name.trim().is_empty() {
            return Err(AppError::MissingName);
        }
        let counterparty = self.check_contact(contact)?;

        let lock = self.group_lock(business_id, &counterparty);
        let _guard = lock.lock().await;

        let opposite = self
            .repo
            .directed_entries(business_id, &counterparty, direction.opposite(), None)
            .await?;
        let plan = plan_netting(amount_paise, &opposite);
        debug!(
            counterparty = %counterparty,
            opposite = opposite.len(),
            to_delete = plan.to_delete.len(),
            to_update = plan.to_update.len(),
            remainder = plan.remainder,
            "computed netting plan"
        );

        let mut new_entry = (plan.remainder > 0).then(|| {
            let mut entry = LedgerEntry::new(
                business_id,
                direction,
                plan.remainder,
                counterparty.clone(),
                meta.name,
                meta.entry_date,
            );
            entry.title = meta.title;
            entry.proof_type = meta.proof_type;
            entry.proof_description = meta.proof_description;
            entry.reminder_enabled = meta.reminder_enabled;
            entry.reminder_message = meta.reminder_message;
            entry
        });

        self.repo
            .apply_create_plan(&plan, new_entry.as_mut())
            .await
            .map_err(AppError::ReconciliationFailed)?;

        info!(
            counterparty = %counterparty,
            direction = %direction,
            amount = amount_paise,
            deleted = plan.to_delete.len(),
            updated = plan.to_update.len(),
            remainder = plan.remainder,
            "recorded entry"
        );

        Ok(NettingOutcome {
            deleted: plan.to_delete,
            updated: plan.to_update.into_iter().map(|u| u.id).collect(),
            entry: new_entry,
        })
    }

    // ========================
    // Reconciliation: update
    // ========================

    /// Edit an existing entry. The raw field change is persisted first; when
    /// the amount or direction changed, netting re-runs against the
    /// counterparty's opposite entries (excluding the edited entry itself).
    /// An edit can therefore shrink or delete *other* entries, and the edited
    /// entry disappears when it is fully absorbed.
    pub async fn update_entry(
        &self,
        business_id: BusinessId,
        id: EntryId,
        patch: EntryPatch,
    ) -> Result<NettingOutcome, AppError> {
        if let Some(amount) = patch.amount_paise {
            if amount <= 0 {
                return Err(AppError::InvalidAmount(
                    "Amount must be positive".to_string(),
                ));
            }
        }
        if let Some(ref name) = patch.name {
            if name.trim().is_empty() {
                return Err(AppError::MissingName);
            }
        }

        // First read resolves the counterparty for the group lock.
        let entry = self.fetch_entry(business_id, id).await?;
        let lock = self.group_lock(business_id, &entry.counterparty);
        let _guard = lock.lock().await;

        // Re-read under the lock: the group may have moved while we waited.
        let entry = self.fetch_entry(business_id, id).await?;
        let mut patched = entry.clone();
        apply_patch(&mut patched, &patch);
        patched.updated_at = Some(Utc::now());

        if !patch.triggers_netting() {
            self.repo.update_entry_fields(&patched).await?;
            return Ok(NettingOutcome {
                deleted: Vec::new(),
                updated: Vec::new(),
                entry: Some(patched),
            });
        }

        let opposite = self
            .repo
            .directed_entries(
                business_id,
                &patched.counterparty,
                patched.direction.opposite(),
                Some(id),
            )
            .await?;
        let plan = plan_netting(patched.amount_paise, &opposite);

        self.repo
            .apply_update_plan(&patched, &plan)
            .await
            .map_err(AppError::ReconciliationFailed)?;

        info!(
            entry = %id,
            counterparty = %patched.counterparty,
            deleted = plan.to_delete.len(),
            updated = plan.to_update.len(),
            remainder = plan.remainder,
            self_deleted = plan.remainder == 0,
            "edited entry"
        );

        let entry = (plan.remainder > 0).then(|| {
            let mut settled = patched;
            settled.amount_paise = plan.remainder;
            settled
        });

        Ok(NettingOutcome {
            deleted: plan.to_delete,
            updated: plan.to_update.into_iter().map(|u| u.id).collect(),
            entry,
        })
    }

    /// Delete an entry without any netting.
    pub async fn delete_entry(&self, business_id: BusinessId, id: EntryId) -> Result<(), AppError> {
        let entry = self.fetch_entry(business_id, id).await?;

        let lock = self.group_lock(business_id, &entry.counterparty);
        let _guard = lock.lock().await;

        if !self.repo.delete_entry(id).await? {
            return Err(AppError::EntryNotFound(id.to_string()));
        }
        Ok(())
    }

    // ========================
    // Manual netting
    // ========================

    /// Manual netting for one counterparty: exact-amount pairs only, no
    /// partial matching. All deletions apply in one transaction.
    pub async fn net_counterparty(
        &self,
        business_id: BusinessId,
        contact: &str,
    ) -> Result<NetReport, AppError> {
        let counterparty = self.check_contact(contact)?;

        let lock = self.group_lock(business_id, &counterparty);
        let _guard = lock.lock().await;

        let entries = self
            .repo
            .entries_for_counterparty(business_id, &counterparty)
            .await?;
        let (out_entries, in_entries): (Vec<_>, Vec<_>) = entries
            .into_iter()
            .partition(|e| e.direction == Direction::Out);

        let plan = plan_exact_pairs(&out_entries, &in_entries);
        if plan.is_empty() {
            return Ok(NetReport {
                netted_pairs: 0,
                deleted_entries: 0,
            });
        }

        let ids = plan.deleted_ids();
        let deleted = self
            .repo
            .delete_entries(&ids)
            .await
            .map_err(AppError::ReconciliationFailed)?;

        info!(
            counterparty = %counterparty,
            pairs = plan.pairs.len(),
            deleted,
            "manual netting pass"
        );

        Ok(NetReport {
            netted_pairs: plan.pairs.len(),
            deleted_entries: deleted as usize,
        })
    }

    /// Manual netting across every counterparty holding entries in both
    /// directions. A failing group is reported and skipped; the others still
    /// run.
    pub async fn net_all(
        &self,
        business_id: BusinessId,
    ) -> Result<Vec<CounterpartyNetReport>, AppError> {
        let counterparties = self.repo.counterparties_with_offsets(business_id).await?;

        let mut reports = Vec::with_capacity(counterparties.len());
        for counterparty in counterparties {
            let result = self.net_counterparty(business_id, &counterparty).await;
            if let Err(error) = &result {
                warn!(counterparty = %counterparty, %error, "netting pass failed, continuing with remaining counterparties");
            }
            reports.push(CounterpartyNetReport {
                counterparty,
                result,
            });
        }

        Ok(reports)
    }

    // ========================
    // Queries
    // ========================

    /// Get a single entry.
    pub async fn get_entry(
        &self,
        business_id: BusinessId,
        id: EntryId,
    ) -> Result<LedgerEntry, AppError> {
        self.fetch_entry(business_id, id).await
    }

    /// List entries with filters, newest first.
    pub async fn list_entries(
        &self,
        business_id: BusinessId,
        filter: EntryFilter,
    ) -> Result<Vec<LedgerEntry>, AppError> {
        let filter = match filter.counterparty {
            Some(contact) => EntryFilter {
                counterparty: Some(self.check_contact(&contact)?),
                ..filter
            },
            None => filter,
        };
        Ok(self.repo.list_entries(business_id, &filter).await?)
    }

    /// A counterparty's outstanding entries, oldest first, plus their net
    /// position (positive = the business owes the counterparty).
    pub async fn counterparty_position(
        &self,
        business_id: BusinessId,
        contact: &str,
    ) -> Result<(Vec<LedgerEntry>, Paise), AppError> {
        let counterparty = self.check_contact(contact)?;
        let entries = self
            .repo
            .entries_for_counterparty(business_id, &counterparty)
            .await?;
        let position = entries.iter().map(LedgerEntry::signed_amount).sum();
        Ok((entries, position))
    }

    /// Summary over the given period. Recomputed from storage on every call.
    pub async fn summary(
        &self,
        business_id: BusinessId,
        period: SummaryPeriod,
    ) -> Result<CashbookSummary, AppError> {
        let since = period.start_date(Utc::now());
        Ok(self.repo.summary(business_id, since).await?)
    }

    /// "Out" entries flagged for reminders (read by the external reminder
    /// subsystem).
    pub async fn reminder_entries(
        &self,
        business_id: BusinessId,
    ) -> Result<Vec<LedgerEntry>, AppError> {
        Ok(self.repo.reminder_entries(business_id).await?)
    }

    /// Check cashbook integrity.
    pub async fn check_integrity(&self, business_id: BusinessId) -> Result<IntegrityStats, AppError> {
        Ok(self.repo.get_integrity_stats(business_id).await?)
    }

    async fn fetch_entry(
        &self,
        business_id: BusinessId,
        id: EntryId,
    ) -> Result<LedgerEntry, AppError> {
        self.repo
            .get_entry(id)
            .await?
            .filter(|e| e.business_id == business_id)
            .ok_or_else(|| AppError::EntryNotFound(id.to_string()))
    }
}

fn apply_patch(entry: &mut LedgerEntry, patch: &EntryPatch) {
    if let Some(amount) = patch.amount_paise {
        entry.amount_paise = amount;
    }
    if let Some(direction) = patch.direction {
        entry.direction = direction;
    }
    if let Some(ref name) = patch.name {
        entry.name = name.clone();
    }
    if let Some(ref title) = patch.title {
        entry.title = Some(title.clone());
    }
    if let Some(entry_date) = patch.entry_date {
        entry.entry_date = entry_date;
    }
    if let Some(proof_type) = patch.proof_type {
        entry.proof_type = Some(proof_type);
    }
    if let Some(ref proof_description) = patch.proof_description {
        entry.proof_description = Some(proof_description.clone());
    }
    if let Some(reminder_enabled) = patch.reminder_enabled {
        entry.reminder_enabled = reminder_enabled;
    }
    if let Some(ref reminder_message) = patch.reminder_message {
        entry.reminder_message = Some(reminder_message.clone());
    }
}
