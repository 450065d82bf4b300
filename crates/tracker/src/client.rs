use std::time::Duration;

use async_trait::async_trait;
use secrecy::{ExposeSecret, SecretString};
use tracing::{debug, warn};

use leadline_core::config::TrackerConfig;
use leadline_core::lead::LeadRecord;

use crate::mapping::{task_payload, RemoteTask, RemoteTaskList};

/// Identity of a task the tracker accepted.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RemoteTaskRef {
    pub id: String,
    pub url: Option<String>,
}

/// Outcome of a create attempt. There is no error variant: a failed or
/// gated-off create is `Unavailable` and the caller carries on.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum RemoteCreate {
    Created(RemoteTaskRef),
    Unavailable,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum RemoteLookup {
    Found(LeadRecord),
    NotFound,
    Unavailable,
}

#[async_trait]
pub trait RemoteTracker: Send + Sync {
    /// Both credentials present and plausible. Callers must not treat
    /// remote reads as meaningful while this is false.
    fn is_connected(&self) -> bool;

    fn list_id_configured(&self) -> bool;

    async fn create_task(&self, lead: &LeadRecord) -> RemoteCreate;

    /// Tasks in the configured list, mapped to leads. Degrades to empty.
    async fn list_tasks(&self) -> Vec<LeadRecord>;

    async fn find_task(&self, task_id: &str) -> RemoteLookup;
}

/// Stand-in for a tracker that was never configured.
#[derive(Default)]
pub struct NoopTracker;

#[async_trait]
impl RemoteTracker for NoopTracker {
    fn is_connected(&self) -> bool {
        false
    }

    fn list_id_configured(&self) -> bool {
        false
    }

    async fn create_task(&self, _lead: &LeadRecord) -> RemoteCreate {
        RemoteCreate::Unavailable
    }

    async fn list_tasks(&self) -> Vec<LeadRecord> {
        Vec::new()
    }

    async fn find_task(&self, _task_id: &str) -> RemoteLookup {
        RemoteLookup::Unavailable
    }
}

pub struct TrackerClient {
    http: reqwest::Client,
    base_url: String,
    api_key: Option<SecretString>,
    list_id: Option<String>,
}

impl TrackerClient {
    pub fn from_config(config: &TrackerConfig) -> Result<Self, reqwest::Error> {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs.max(1)))
            .build()?;

        Ok(Self {
            http,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            api_key: config.api_key.clone(),
            list_id: config.list_id.clone(),
        })
    }

    fn auth_header(&self) -> Option<&str> {
        self.api_key.as_ref().map(|key| key.expose_secret())
    }
}

fn plausible_api_key(api_key: Option<&SecretString>) -> bool {
    api_key.map(|key| key.expose_secret().starts_with("pk_")).unwrap_or(false)
}

fn plausible_list_id(list_id: Option<&str>) -> bool {
    list_id.map(|id| !id.trim().is_empty() && id.len() < 15).unwrap_or(false)
}

#[async_trait]
impl RemoteTracker for TrackerClient {
    fn is_connected(&self) -> bool {
        plausible_api_key(self.api_key.as_ref()) && plausible_list_id(self.list_id.as_deref())
    }

    fn list_id_configured(&self) -> bool {
        plausible_list_id(self.list_id.as_deref())
    }

    async fn create_task(&self, lead: &LeadRecord) -> RemoteCreate {
        if !self.is_connected() {
            debug!(event_name = "tracker.create_skipped", "tracker is not configured");
            return RemoteCreate::Unavailable;
        }
        let (Some(auth), Some(list_id)) = (self.auth_header(), self.list_id.as_deref()) else {
            return RemoteCreate::Unavailable;
        };

        let url = format!("{}/list/{}/task", self.base_url, list_id);
        let response = self
            .http
            .post(&url)
            .header("Authorization", auth)
            .json(&task_payload(lead))
            .send()
            .await;

        let response = match response {
            Ok(response) if response.status().is_success() => response,
            Ok(response) => {
                warn!(
                    event_name = "tracker.create_failed",
                    status = %response.status(),
                    lead_id = %lead.id,
                    "tracker rejected task creation"
                );
                return RemoteCreate::Unavailable;
            }
            Err(error) => {
                warn!(
                    event_name = "tracker.create_failed",
                    lead_id = %lead.id,
                    error = %error,
                    "tracker task creation request failed"
                );
                return RemoteCreate::Unavailable;
            }
        };

        match response.json::<RemoteTask>().await {
            Ok(task) => {
                debug!(event_name = "tracker.task_created", task_id = %task.id, lead_id = %lead.id);
                RemoteCreate::Created(RemoteTaskRef { id: task.id, url: task.url })
            }
            Err(error) => {
                warn!(
                    event_name = "tracker.create_failed",
                    lead_id = %lead.id,
                    error = %error,
                    "tracker create response could not be decoded"
                );
                RemoteCreate::Unavailable
            }
        }
    }

    async fn list_tasks(&self) -> Vec<LeadRecord> {
        if !self.is_connected() {
            return Vec::new();
        }
        let (Some(auth), Some(list_id)) = (self.auth_header(), self.list_id.as_deref()) else {
            return Vec::new();
        };

        let url = format!("{}/list/{}/task", self.base_url, list_id);
        let response = match self.http.get(&url).header("Authorization", auth).send().await {
            Ok(response) if response.status().is_success() => response,
            Ok(response) => {
                warn!(event_name = "tracker.list_failed", status = %response.status());
                return Vec::new();
            }
            Err(error) => {
                warn!(event_name = "tracker.list_failed", error = %error);
                return Vec::new();
            }
        };

        match response.json::<RemoteTaskList>().await {
            Ok(list) => list.tasks.into_iter().map(RemoteTask::into_lead).collect(),
            Err(error) => {
                warn!(event_name = "tracker.list_failed", error = %error);
                Vec::new()
            }
        }
    }

    async fn find_task(&self, task_id: &str) -> RemoteLookup {
        if !self.is_connected() {
            return RemoteLookup::Unavailable;
        }
        let Some(auth) = self.auth_header() else {
            return RemoteLookup::Unavailable;
        };

        let url = format!("{}/task/{}", self.base_url, task_id);
        let response = match self.http.get(&url).header("Authorization", auth).send().await {
            Ok(response) => response,
            Err(error) => {
                warn!(event_name = "tracker.lookup_failed", task_id, error = %error);
                return RemoteLookup::Unavailable;
            }
        };

        if response.status() == reqwest::StatusCode::NOT_FOUND {
            return RemoteLookup::NotFound;
        }
        if !response.status().is_success() {
            warn!(event_name = "tracker.lookup_failed", task_id, status = %response.status());
            return RemoteLookup::Unavailable;
        }

        match response.json::<RemoteTask>().await {
            Ok(task) => RemoteLookup::Found(task.into_lead()),
            Err(error) => {
                warn!(event_name = "tracker.lookup_failed", task_id, error = %error);
                RemoteLookup::Unavailable
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use leadline_core::config::TrackerConfig;
    use leadline_core::lead::{LeadRecord, LeadSource, Priority};

    use super::{RemoteCreate, RemoteLookup, RemoteTracker, TrackerClient};

    fn config(api_key: Option<&str>, list_id: Option<&str>) -> TrackerConfig {
        TrackerConfig {
            api_key: api_key.map(|key| key.to_string().into()),
            list_id: list_id.map(str::to_string),
            base_url: "https://api.clickup.com/api/v2".to_string(),
            timeout_secs: 5,
        }
    }

    fn lead() -> LeadRecord {
        LeadRecord {
            id: "local-1".to_string(),
            name: "Ali".to_string(),
            phone: None,
            intent: "Rent".to_string(),
            original_text: "rent".to_string(),
            status: "TO DO".to_string(),
            priority: Priority::Normal,
            created_at: "2026-01-01T10:00:00.000Z".to_string(),
            updated_at: None,
            source: LeadSource::Local,
            url: None,
        }
    }

    #[test]
    fn connection_gate_requires_key_prefix_and_plausible_list_id() {
        let connected = TrackerClient::from_config(&config(Some("pk_live_key"), Some("901234")))
            .expect("build client");
        assert!(connected.is_connected());
        assert!(connected.list_id_configured());

        let bad_key = TrackerClient::from_config(&config(Some("sk_wrong"), Some("901234")))
            .expect("build client");
        assert!(!bad_key.is_connected());
        assert!(bad_key.list_id_configured());

        let long_list = TrackerClient::from_config(&config(
            Some("pk_live_key"),
            Some("0123456789012345"),
        ))
        .expect("build client");
        assert!(!long_list.is_connected());
        assert!(!long_list.list_id_configured());

        let missing = TrackerClient::from_config(&config(None, None)).expect("build client");
        assert!(!missing.is_connected());
        assert!(!missing.list_id_configured());
    }

    #[tokio::test]
    async fn gated_off_client_degrades_every_operation() {
        let client = TrackerClient::from_config(&config(None, None)).expect("build client");

        assert_eq!(client.create_task(&lead()).await, RemoteCreate::Unavailable);
        assert!(client.list_tasks().await.is_empty());
        assert_eq!(client.find_task("86abc").await, RemoteLookup::Unavailable);
    }
}
