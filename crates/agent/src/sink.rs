use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use serde::Deserialize;

use leadline_core::errors::ApplicationError;
use leadline_core::lead::{LeadDraft, LeadRecord};
use leadline_db::LeadStore;

/// Where a committed lead lands. Ingress deployments that run next to the
/// query service write straight to the store; a split deployment reports
/// over HTTP to the service's ingest endpoint instead.
#[async_trait]
pub trait LeadSink: Send + Sync {
    async fn record(&self, draft: &LeadDraft) -> Result<LeadRecord, ApplicationError>;
}

pub struct StoreSink {
    store: Arc<dyn LeadStore>,
}

impl StoreSink {
    pub fn new(store: Arc<dyn LeadStore>) -> Self {
        Self { store }
    }
}

#[async_trait]
impl LeadSink for StoreSink {
    async fn record(&self, draft: &LeadDraft) -> Result<LeadRecord, ApplicationError> {
        self.store
            .append(draft)
            .await
            .map_err(|error| ApplicationError::Persistence(error.to_string()))
    }
}

pub struct HttpIngestSink {
    http: reqwest::Client,
    base_url: String,
}

#[derive(Debug, Deserialize)]
struct IngestResponse {
    lead: LeadRecord,
}

impl HttpIngestSink {
    pub fn new(base_url: &str, timeout_secs: u64) -> Result<Self, reqwest::Error> {
        let http =
            reqwest::Client::builder().timeout(Duration::from_secs(timeout_secs.max(1))).build()?;
        Ok(Self { http, base_url: base_url.trim_end_matches('/').to_string() })
    }
}

#[async_trait]
impl LeadSink for HttpIngestSink {
    async fn record(&self, draft: &LeadDraft) -> Result<LeadRecord, ApplicationError> {
        let url = format!("{}/api/leads", self.base_url);
        let response = self
            .http
            .post(&url)
            .json(draft)
            .send()
            .await
            .map_err(|error| ApplicationError::Persistence(error.to_string()))?;

        if !response.status().is_success() {
            return Err(ApplicationError::Persistence(format!(
                "ingest endpoint returned {}",
                response.status()
            )));
        }

        let ingested: IngestResponse = response
            .json()
            .await
            .map_err(|error| ApplicationError::Persistence(error.to_string()))?;
        Ok(ingested.lead)
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use axum::{http::StatusCode, routing::post, Json, Router};
    use serde_json::json;

    use leadline_core::errors::ApplicationError;
    use leadline_core::lead::{LeadDraft, LeadRecord, LeadSource, Priority};
    use leadline_db::{LeadStore, SqlLeadStore};

    use super::{HttpIngestSink, LeadSink, StoreSink};

    #[tokio::test]
    async fn store_sink_appends_to_the_local_log() {
        let pool = leadline_db::connect_with_settings("sqlite::memory:", 1, 30)
            .await
            .expect("connect");
        leadline_db::migrations::run_pending(&pool).await.expect("migrate");
        let store = Arc::new(SqlLeadStore::new(pool));

        let sink = StoreSink::new(store.clone());
        let draft = LeadDraft {
            name: Some("Ali".to_string()),
            phone: Some("0501234567".to_string()),
            intent: Some("Rent".to_string()),
            original_text: Some("studio in Marina".to_string()),
        };

        let record = sink.record(&draft).await.expect("record");
        assert_eq!(record.name, "Ali");
        assert_eq!(store.find_by_id(&record.id).await.expect("lookup"), Some(record));
    }

    async fn serve(app: Router) -> String {
        let listener =
            tokio::net::TcpListener::bind("127.0.0.1:0").await.expect("bind test listener");
        let address = listener.local_addr().expect("local addr");
        tokio::spawn(async move {
            axum::serve(listener, app).await.expect("serve");
        });
        format!("http://{address}")
    }

    fn draft() -> LeadDraft {
        LeadDraft {
            name: Some("Ali".to_string()),
            phone: Some("0501234567".to_string()),
            intent: Some("Rent".to_string()),
            original_text: Some("studio in Marina".to_string()),
        }
    }

    #[tokio::test]
    async fn http_sink_posts_the_draft_and_returns_the_stored_record() {
        let stored = LeadRecord {
            id: "local-42".to_string(),
            name: "Ali".to_string(),
            phone: Some("0501234567".to_string()),
            intent: "Rent".to_string(),
            original_text: "studio in Marina".to_string(),
            status: "TO DO".to_string(),
            priority: Priority::Normal,
            created_at: "2026-01-01T10:00:00.000Z".to_string(),
            updated_at: None,
            source: LeadSource::Local,
            url: None,
        };

        let echoed = stored.clone();
        let app = Router::new().route(
            "/api/leads",
            post(move |Json(received): Json<LeadDraft>| {
                let echoed = echoed.clone();
                async move {
                    assert_eq!(received.name.as_deref(), Some("Ali"));
                    Json(json!({"success": true, "lead": echoed}))
                }
            }),
        );
        let base_url = serve(app).await;

        let sink = HttpIngestSink::new(&base_url, 5).expect("build sink");
        let record = sink.record(&draft()).await.expect("record");
        assert_eq!(record, stored);
    }

    #[tokio::test]
    async fn http_sink_surfaces_a_rejecting_ingest_endpoint() {
        let app = Router::new()
            .route("/api/leads", post(|| async { StatusCode::SERVICE_UNAVAILABLE }));
        let base_url = serve(app).await;

        let sink = HttpIngestSink::new(&base_url, 5).expect("build sink");
        let error = sink.record(&draft()).await.expect_err("rejection should surface");
        assert!(matches!(error, ApplicationError::Persistence(_)));
    }
}
