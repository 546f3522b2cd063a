use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::Paise;

pub type EntryId = Uuid;

/// Tenant scope. Every operation takes the business id explicitly; there is
/// no process-wide "current business".
pub type BusinessId = i64;

/// Direction of a cash entry relative to the business.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Direction {
    /// Money received by the business
    In,
    /// Money given out by the business
    Out,
}

impl Direction {
    pub fn opposite(self) -> Self {
        match self {
            Direction::In => Direction::Out,
            Direction::Out => Direction::In,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Direction::In => "in",
            Direction::Out => "out",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "in" => Some(Direction::In),
            "out" => Some(Direction::Out),
            _ => None,
        }
    }

    /// Sign of this direction's contribution to the balance.
    pub fn signed(&self, amount: Paise) -> Paise {
        match self {
            Direction::In => amount,
            Direction::Out => -amount,
        }
    }
}

impl std::fmt::Display for Direction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Kind of proof attached to an entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProofType {
    Receipt,
    Invoice,
    BankStatement,
    Other,
}

impl ProofType {
    pub fn as_str(&self) -> &'static str {
        match self {
            ProofType::Receipt => "receipt",
            ProofType::Invoice => "invoice",
            ProofType::BankStatement => "bank_statement",
            ProofType::Other => "other",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "receipt" => Some(ProofType::Receipt),
            "invoice" => Some(ProofType::Invoice),
            "bank_statement" => Some(ProofType::BankStatement),
            "other" => Some(ProofType::Other),
            _ => None,
        }
    }
}

impl std::fmt::Display for ProofType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// A directed cash entry against a counterparty. Entries are created by the
/// user or by the netting engine (as a remainder), shrunk or deleted by the
/// reconciliation service, and otherwise only touched by explicit user edits.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LedgerEntry {
    pub id: EntryId,
    pub business_id: BusinessId,
    /// Monotonically increasing creation-order key, assigned by the
    /// repository. Opposite entries are consumed in ascending order.
    pub sequence: i64,
    /// Normalized contact number identifying the other party
    pub counterparty: String,
    pub direction: Direction,
    /// Always positive; zero or negative amounts are never persisted
    pub amount_paise: Paise,
    /// Counterparty display name
    pub name: String,
    pub title: Option<String>,
    /// The day the cash changed hands
    pub entry_date: NaiveDate,
    pub proof_type: Option<ProofType>,
    pub proof_description: Option<String>,
    /// Read by the external reminder subsystem for "out" entries; never
    /// interpreted by the netting engine
    pub reminder_enabled: bool,
    pub reminder_message: Option<String>,
    pub recorded_at: DateTime<Utc>,
    pub updated_at: Option<DateTime<Utc>>,
}

impl LedgerEntry {
    /// Create a new entry. Sequence number must be assigned by the repository.
    pub fn new(
        business_id: BusinessId,
        direction: Direction,
        amount_paise: Paise,
        counterparty: String,
        name: String,
        entry_date: NaiveDate,
    ) -> Self {
        assert!(amount_paise > 0, "Entry amount must be positive");
        assert!(!counterparty.is_empty(), "Entry counterparty must not be empty");
        Self {
            id: Uuid::new_v4(),
            business_id,
            sequence: 0, // Will be set by repository
            counterparty,
            direction,
            amount_paise,
            name,
            title: None,
            entry_date,
            proof_type: None,
            proof_description: None,
            reminder_enabled: false,
            reminder_message: None,
            recorded_at: Utc::now(),
            updated_at: None,
        }
    }

    pub fn with_title(mut self, title: impl Into<String>) -> Self {
        self.title = Some(title.into());
        self
    }

    pub fn with_proof(mut self, proof_type: ProofType, description: Option<String>) -> Self {
        self.proof_type = Some(proof_type);
        self.proof_description = description;
        self
    }

    pub fn with_reminder(mut self, message: Option<String>) -> Self {
        self.reminder_enabled = true;
        self.reminder_message = message;
        self
    }

    /// This entry's contribution to the business balance.
    pub fn signed_amount(&self) -> Paise {
        self.direction.signed(self.amount_paise)
    }
}
