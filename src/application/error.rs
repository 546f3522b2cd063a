use thiserror::Error;

#[derive(Error, Debug)]
pub enum AppError {
    #[error("Ledger entry not found: {0}")]
    EntryNotFound(String),

    #[error("Invalid amount: {0}")]
    InvalidAmount(String),

    #[error("Counterparty contact number is required")]
    MissingContact,

    #[error("Invalid counterparty contact number: {0}")]
    InvalidContact(String),

    #[error("Counterparty name is required")]
    MissingName,

    #[error("Reconciliation failed and was rolled back, ledger unchanged; the operation can be retried: {0}")]
    ReconciliationFailed(#[source] anyhow::Error),

    #[error("Database error: {0}")]
    Database(#[from] anyhow::Error),
}

impl AppError {
    /// True when the failed operation left storage untouched and may simply
    /// be submitted again.
    pub fn is_retryable(&self) -> bool {
        matches!(self, AppError::ReconciliationFailed(_))
    }
}
