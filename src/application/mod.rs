// Application layer - orchestrates the netting engine against storage.
// All reconciliation (create, update, manual net-all) goes through
// CashbookService; clients never touch the repository directly.

pub mod error;
pub mod service;

pub use error::*;
pub use service::*;
