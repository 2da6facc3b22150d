pub mod handlers;
pub mod router;
pub mod models;
pub mod store;
pub mod services;

pub use models::*;
pub use services::{SlotLedgerService, SlotScheduleService, LOCK_LEASE_SECONDS};
pub use store::{SlotStore, PostgrestSlotStore, InMemorySlotStore};
