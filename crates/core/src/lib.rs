pub mod aggregate;
pub mod config;
pub mod errors;
pub mod lead;

pub use aggregate::{compute_stats, merge_leads, LeadStats};
pub use errors::{ApplicationError, InterfaceError};
pub use lead::{
    format_epoch_millis, normalize_status, LeadDraft, LeadRecord, LeadSource, Priority,
};
