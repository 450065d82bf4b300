//! Wire mapping between tracker task JSON and the canonical lead shape.

use serde::Deserialize;
use serde_json::{json, Value};

use leadline_core::lead::{
    format_epoch_millis, normalize_status, LeadRecord, LeadSource, Priority, DEFAULT_INTENT,
    DEFAULT_NAME,
};

/// Task-creation payload. Title and description carry all lead fields the
/// tracker has no native slots for; priority and status are fixed at the
/// tracker's code for Normal and its default column.
pub fn task_payload(lead: &LeadRecord) -> Value {
    let phone = lead.phone.as_deref().unwrap_or("N/A");
    json!({
        "name": format!("Lead: {} - {}", lead.name, lead.intent),
        "description": format!(
            "**Phone**: {phone}\n**Intent**: {}\n\n**Original Message**:\n{}",
            lead.intent, lead.original_text
        ),
        "priority": 3,
        "status": "TO DO",
    })
}

#[derive(Debug, Deserialize)]
pub struct RemoteTaskList {
    #[serde(default)]
    pub tasks: Vec<RemoteTask>,
}

#[derive(Debug, Deserialize)]
pub struct RemoteTask {
    pub id: String,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub status: Option<RemoteTaskStatus>,
    #[serde(default)]
    pub priority: Option<RemoteTaskPriority>,
    #[serde(default)]
    pub date_created: Option<String>,
    #[serde(default)]
    pub date_updated: Option<String>,
    #[serde(default)]
    pub url: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct RemoteTaskStatus {
    #[serde(default)]
    pub status: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct RemoteTaskPriority {
    #[serde(default)]
    pub id: Option<Value>,
}

impl RemoteTask {
    /// The tracker transmits priority codes as either numbers or strings
    /// depending on endpoint; both collapse to the same ordinal.
    fn priority_code(&self) -> Option<i64> {
        let id = self.priority.as_ref()?.id.as_ref()?;
        match id {
            Value::Number(number) => number.as_i64(),
            Value::String(text) => text.trim().parse().ok(),
            _ => None,
        }
    }

    pub fn into_lead(self) -> LeadRecord {
        let priority = Priority::from_code(self.priority_code());
        let status =
            normalize_status(self.status.as_ref().and_then(|status| status.status.as_deref()));
        let created_at = format_epoch_millis(self.date_created.as_deref()).unwrap_or_default();
        let updated_at = format_epoch_millis(self.date_updated.as_deref());

        LeadRecord {
            id: self.id,
            name: self.name.filter(|name| !name.trim().is_empty()).unwrap_or_else(|| DEFAULT_NAME.to_string()),
            phone: None,
            intent: DEFAULT_INTENT.to_string(),
            original_text: self.description.unwrap_or_default(),
            status,
            priority,
            created_at,
            updated_at,
            source: LeadSource::Tracker,
            url: self.url,
        }
    }
}

#[cfg(test)]
mod tests {
    use leadline_core::lead::{LeadRecord, LeadSource, Priority};

    use super::{task_payload, RemoteTask};

    fn committed_lead() -> LeadRecord {
        LeadRecord {
            id: "local-1".to_string(),
            name: "Ali".to_string(),
            phone: Some("0501234567".to_string()),
            intent: "Rent".to_string(),
            original_text: "I want to rent a flat".to_string(),
            status: "TO DO".to_string(),
            priority: Priority::Normal,
            created_at: "2026-01-01T10:00:00.000Z".to_string(),
            updated_at: None,
            source: LeadSource::Local,
            url: None,
        }
    }

    #[test]
    fn payload_packs_lead_fields_into_title_and_description() {
        let payload = task_payload(&committed_lead());

        assert_eq!(payload["name"], "Lead: Ali - Rent");
        assert_eq!(payload["priority"], 3);
        assert_eq!(payload["status"], "TO DO");

        let description = payload["description"].as_str().expect("description");
        assert!(description.contains("**Phone**: 0501234567"));
        assert!(description.contains("**Intent**: Rent"));
        assert!(description.contains("**Original Message**:\nI want to rent a flat"));
    }

    #[test]
    fn payload_marks_absent_phone() {
        let mut lead = committed_lead();
        lead.phone = None;

        let payload = task_payload(&lead);
        let description = payload["description"].as_str().expect("description");
        assert!(description.contains("**Phone**: N/A"));
    }

    #[test]
    fn task_json_maps_into_a_normalized_lead() {
        let task: RemoteTask = serde_json::from_value(serde_json::json!({
            "id": "86abc123",
            "name": "Lead: Ali - Rent",
            "description": "**Phone**: 0501234567",
            "status": {"status": "in progress"},
            "priority": {"id": "2"},
            "date_created": "1767261600000",
            "date_updated": "1767265200000",
            "url": "https://app.clickup.com/t/86abc123",
        }))
        .expect("deserialize task");

        let lead = task.into_lead();
        assert_eq!(lead.id, "86abc123");
        assert_eq!(lead.status, "IN PROGRESS");
        assert_eq!(lead.priority, Priority::High);
        assert_eq!(lead.source, LeadSource::Tracker);
        assert_eq!(lead.created_at, "2026-01-01T10:00:00.000Z");
        assert_eq!(lead.updated_at.as_deref(), Some("2026-01-01T11:00:00.000Z"));
        assert_eq!(lead.url.as_deref(), Some("https://app.clickup.com/t/86abc123"));
    }

    #[test]
    fn sparse_task_json_still_maps_with_defaults() {
        let task: RemoteTask =
            serde_json::from_value(serde_json::json!({"id": "86xyz"})).expect("deserialize task");

        let lead = task.into_lead();
        assert_eq!(lead.name, "Unknown");
        assert_eq!(lead.intent, "General Inquiry");
        assert_eq!(lead.status, "TO DO");
        assert_eq!(lead.priority, Priority::Normal);
        assert_eq!(lead.created_at, "");
        assert_eq!(lead.updated_at, None);
    }

    #[test]
    fn numeric_priority_codes_are_accepted() {
        let task: RemoteTask = serde_json::from_value(serde_json::json!({
            "id": "86num",
            "priority": {"id": 1},
        }))
        .expect("deserialize task");

        assert_eq!(task.into_lead().priority, Priority::Urgent);
    }
}
