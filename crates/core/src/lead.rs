//! Canonical lead shapes and the normalization rules shared by both lead
//! sources. The local store and the remote tracker disagree on how they
//! spell priority, status, and timestamps; everything funnels through the
//! helpers here before it reaches the query surface.

use chrono::{DateTime, SecondsFormat, TimeZone, Utc};
use serde::{Deserialize, Serialize};

pub const DEFAULT_NAME: &str = "Unknown";
pub const DEFAULT_INTENT: &str = "General Inquiry";
pub const DEFAULT_STATUS: &str = "TO DO";

/// Closed priority label set. Remote tasks carry a small ordinal code
/// (1=Urgent .. 4=Low); anything else collapses to Normal.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Priority {
    Urgent,
    High,
    #[default]
    Normal,
    Low,
}

impl Priority {
    pub fn from_code(code: Option<i64>) -> Self {
        match code {
            Some(1) => Self::Urgent,
            Some(2) => Self::High,
            Some(4) => Self::Low,
            _ => Self::Normal,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Urgent => "Urgent",
            Self::High => "High",
            Self::Normal => "Normal",
            Self::Low => "Low",
        }
    }
}

impl std::fmt::Display for Priority {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for Priority {
    type Err = ();

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "urgent" => Ok(Self::Urgent),
            "high" => Ok(Self::High),
            "normal" => Ok(Self::Normal),
            "low" => Ok(Self::Low),
            _ => Err(()),
        }
    }
}

/// Origin store of a lead. The same logical lead may exist under both
/// sources with unrelated ids; no cross-reference key exists upstream.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LeadSource {
    Local,
    Tracker,
}

impl LeadSource {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Local => "local",
            Self::Tracker => "tracker",
        }
    }
}

/// A captured lead, normalized regardless of which store produced it.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct LeadRecord {
    pub id: String,
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub phone: Option<String>,
    pub intent: String,
    pub original_text: String,
    pub status: String,
    pub priority: Priority,
    pub created_at: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub updated_at: Option<String>,
    pub source: LeadSource,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
}

/// Pre-commit lead fields as they arrive from a tool call or the ingest
/// endpoint. Everything is optional; defaults are applied at commit time.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct LeadDraft {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub phone: Option<String>,
    #[serde(default)]
    pub intent: Option<String>,
    #[serde(default, alias = "details")]
    pub original_text: Option<String>,
}

impl LeadDraft {
    pub fn display_name(&self) -> &str {
        match self.name.as_deref() {
            Some(name) if !name.trim().is_empty() => name,
            _ => DEFAULT_NAME,
        }
    }

    pub fn display_intent(&self) -> &str {
        match self.intent.as_deref() {
            Some(intent) if !intent.trim().is_empty() => intent,
            _ => DEFAULT_INTENT,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.name.is_none()
            && self.phone.is_none()
            && self.intent.is_none()
            && self.original_text.is_none()
    }
}

/// Uppercase the source-native status label; absent becomes "TO DO".
pub fn normalize_status(raw: Option<&str>) -> String {
    match raw.map(str::trim) {
        Some(status) if !status.is_empty() => status.to_uppercase(),
        _ => DEFAULT_STATUS.to_string(),
    }
}

/// Millisecond epoch (as the tracker transmits it, stringly) to ISO-8601.
/// Absent or unparseable input yields `None`; this never errors.
pub fn format_epoch_millis(raw: Option<&str>) -> Option<String> {
    let millis = raw?.trim().parse::<i64>().ok()?;
    let instant = Utc.timestamp_millis_opt(millis).single()?;
    Some(iso8601(&instant))
}

/// Canonical ISO-8601 rendering used everywhere a lead timestamp is
/// produced. Millisecond precision keeps lexicographic order equal to
/// chronological order across both sources.
pub fn iso8601(instant: &DateTime<Utc>) -> String {
    instant.to_rfc3339_opts(SecondsFormat::Millis, true)
}

#[cfg(test)]
mod tests {
    use chrono::{TimeZone, Utc};

    use super::{format_epoch_millis, iso8601, normalize_status, LeadDraft, Priority};

    #[test]
    fn priority_codes_map_into_closed_label_set() {
        assert_eq!(Priority::from_code(Some(1)), Priority::Urgent);
        assert_eq!(Priority::from_code(Some(2)), Priority::High);
        assert_eq!(Priority::from_code(Some(3)), Priority::Normal);
        assert_eq!(Priority::from_code(Some(4)), Priority::Low);
    }

    #[test]
    fn unknown_and_absent_priority_codes_fall_back_to_normal() {
        assert_eq!(Priority::from_code(None), Priority::Normal);
        assert_eq!(Priority::from_code(Some(0)), Priority::Normal);
        assert_eq!(Priority::from_code(Some(99)), Priority::Normal);
        assert_eq!(Priority::from_code(Some(-7)), Priority::Normal);
    }

    #[test]
    fn status_is_uppercased_and_defaulted() {
        assert_eq!(normalize_status(Some("in progress")), "IN PROGRESS");
        assert_eq!(normalize_status(Some("  to do ")), "TO DO");
        assert_eq!(normalize_status(Some("")), "TO DO");
        assert_eq!(normalize_status(None), "TO DO");
    }

    #[test]
    fn epoch_millis_round_trips_through_iso8601() {
        let instant = Utc.with_ymd_and_hms(2026, 3, 14, 9, 26, 53).single().expect("valid instant");
        let millis = instant.timestamp_millis().to_string();

        let formatted = format_epoch_millis(Some(&millis)).expect("should format");
        assert_eq!(formatted, iso8601(&instant));
    }

    #[test]
    fn garbage_timestamps_yield_none_without_panicking() {
        assert_eq!(format_epoch_millis(None), None);
        assert_eq!(format_epoch_millis(Some("")), None);
        assert_eq!(format_epoch_millis(Some("not-a-number")), None);
        assert_eq!(format_epoch_millis(Some("12.5")), None);
    }

    #[test]
    fn draft_defaults_apply_for_missing_fields() {
        let draft = LeadDraft::default();
        assert_eq!(draft.display_name(), "Unknown");
        assert_eq!(draft.display_intent(), "General Inquiry");
        assert!(draft.is_empty());

        let named = LeadDraft { name: Some("Ali".to_string()), ..LeadDraft::default() };
        assert_eq!(named.display_name(), "Ali");
        assert!(!named.is_empty());
    }
}
