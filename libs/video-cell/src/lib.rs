pub mod models;
pub mod provider;
pub mod daily;

pub use models::*;
pub use provider::{VideoRoomProvider, InMemoryVideoProvider};
pub use daily::DailyClient;
