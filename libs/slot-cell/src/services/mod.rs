pub mod ledger;
pub mod schedule;

pub use ledger::{SlotLedgerService, LOCK_LEASE_SECONDS};
pub use schedule::SlotScheduleService;
