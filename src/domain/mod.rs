mod counterparty;
mod entry;
mod money;
mod netting;

pub use counterparty::*;
pub use entry::*;
pub use money::*;
pub use netting::*;
