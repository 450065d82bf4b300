pub mod connection;
pub mod lead_store;
pub mod migrations;

pub use connection::{connect, connect_with_settings, DbPool};
pub use lead_store::{LeadStore, SqlLeadStore, StoreError, RETAIN_LIMIT};
