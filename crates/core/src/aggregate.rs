//! Merge and summary logic over the two lead sources.
//!
//! The merge is deliberately dedup-free: no key exists that ties a locally
//! committed lead to the tracker task created for it, so both entries are
//! kept and callers see the union.

use std::collections::HashMap;

use chrono::Utc;
use serde::{Deserialize, Serialize};

use crate::lead::{iso8601, LeadRecord};

/// Concatenates local leads ahead of remote leads, then sorts newest-first
/// by `created_at`. ISO-8601 strings compare lexicographically in
/// chronological order, and the sort is stable, so equal timestamps keep
/// local-before-remote ordering.
pub fn merge_leads(local: Vec<LeadRecord>, remote: Vec<LeadRecord>) -> Vec<LeadRecord> {
    let mut merged = local;
    merged.extend(remote);
    merged.sort_by(|a, b| b.created_at.cmp(&a.created_at));
    merged
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct LeadStats {
    pub total_leads: usize,
    pub by_status: HashMap<String, usize>,
    pub by_priority: HashMap<String, usize>,
    pub last_updated: String,
}

/// Frequency tally over an already-merged lead list.
pub fn compute_stats(leads: &[LeadRecord]) -> LeadStats {
    let mut by_status: HashMap<String, usize> = HashMap::new();
    let mut by_priority: HashMap<String, usize> = HashMap::new();

    for lead in leads {
        *by_status.entry(lead.status.clone()).or_default() += 1;
        *by_priority.entry(lead.priority.as_str().to_string()).or_default() += 1;
    }

    LeadStats {
        total_leads: leads.len(),
        by_status,
        by_priority,
        last_updated: iso8601(&Utc::now()),
    }
}
