//! JSON query surface over the merged lead view.
//!
//! Endpoints:
//! - `POST /api/leads`      — ingest a lead draft into the local log
//! - `GET  /api/leads`      — merged local + tracker view, newest first
//! - `GET  /api/leads/{id}` — single lead, local log first then tracker
//! - `GET  /api/stats`      — frequency tally over the merged view

use std::sync::Arc;

use axum::{
    extract::{rejection::JsonRejection, Path, State},
    http::StatusCode,
    routing::{get, post},
    Json, Router,
};
use serde::Serialize;
use tracing::{info, warn};
use uuid::Uuid;

use leadline_core::{
    compute_stats, merge_leads, ApplicationError, InterfaceError, LeadDraft, LeadRecord, LeadStats,
};
use leadline_db::LeadStore;
use leadline_tracker::{RemoteLookup, RemoteTracker};

#[derive(Clone)]
pub struct LeadsState {
    store: Arc<dyn LeadStore>,
    tracker: Arc<dyn RemoteTracker>,
}

#[derive(Debug, Serialize)]
pub struct ConfigStatus {
    pub tracker_connected: bool,
    pub list_id_configured: bool,
}

#[derive(Debug, Serialize)]
pub struct LeadListResponse {
    pub success: bool,
    pub count: usize,
    pub leads: Vec<LeadRecord>,
    pub config_status: ConfigStatus,
}

#[derive(Debug, Serialize)]
pub struct LeadResponse {
    pub success: bool,
    pub lead: LeadRecord,
}

#[derive(Debug, Serialize)]
pub struct StatsResponse {
    pub success: bool,
    pub stats: LeadStats,
}

#[derive(Debug, Serialize)]
pub struct ApiError {
    pub success: bool,
    pub error: String,
}

pub fn router(store: Arc<dyn LeadStore>, tracker: Arc<dyn RemoteTracker>) -> Router {
    Router::new()
        .route("/api/leads", post(create_lead).get(list_leads))
        .route("/api/leads/{id}", get(get_lead))
        .route("/api/stats", get(get_stats))
        .with_state(LeadsState { store, tracker })
}

fn error_response(error: InterfaceError) -> (StatusCode, Json<ApiError>) {
    let status = match &error {
        InterfaceError::BadRequest { .. } => StatusCode::BAD_REQUEST,
        InterfaceError::NotFound { .. } => StatusCode::NOT_FOUND,
        InterfaceError::ServiceUnavailable { .. } => StatusCode::SERVICE_UNAVAILABLE,
        InterfaceError::Internal { .. } => StatusCode::INTERNAL_SERVER_ERROR,
    };
    (status, Json(ApiError { success: false, error: error.user_message().to_string() }))
}

async fn create_lead(
    State(state): State<LeadsState>,
    draft: Result<Json<LeadDraft>, JsonRejection>,
) -> Result<(StatusCode, Json<LeadResponse>), (StatusCode, Json<ApiError>)> {
    let correlation_id = Uuid::new_v4().to_string();

    // Extractor rejections carry axum's plain-text body; keep every error on
    // this surface in the JSON envelope instead.
    let Json(draft) = draft.map_err(|rejection| {
        error_response(
            ApplicationError::InvalidInput(rejection.body_text()).into_interface(&*correlation_id),
        )
    })?;

    if draft.is_empty() {
        return Err(error_response(
            ApplicationError::InvalidInput("lead payload carried no fields".to_string())
                .into_interface(correlation_id),
        ));
    }

    let lead = state.store.append(&draft).await.map_err(|error| {
        warn!(
            event_name = "api.lead_create_failed",
            correlation_id = %correlation_id,
            error = %error,
            "lead ingest write failed"
        );
        error_response(
            ApplicationError::Persistence(error.to_string()).into_interface(&*correlation_id),
        )
    })?;

    info!(
        event_name = "api.lead_created",
        correlation_id = %correlation_id,
        lead_id = %lead.id,
        "lead ingested via http api"
    );
    Ok((StatusCode::CREATED, Json(LeadResponse { success: true, lead })))
}

async fn list_leads(State(state): State<LeadsState>) -> Json<LeadListResponse> {
    let local = state.store.list_recent_or_empty().await;
    let remote = state.tracker.list_tasks().await;
    let leads = merge_leads(local, remote);

    Json(LeadListResponse {
        success: true,
        count: leads.len(),
        leads,
        config_status: ConfigStatus {
            tracker_connected: state.tracker.is_connected(),
            list_id_configured: state.tracker.list_id_configured(),
        },
    })
}

async fn get_lead(
    State(state): State<LeadsState>,
    Path(id): Path<String>,
) -> Result<Json<LeadResponse>, (StatusCode, Json<ApiError>)> {
    let correlation_id = Uuid::new_v4().to_string();

    match state.store.find_by_id(&id).await {
        Ok(Some(lead)) => return Ok(Json(LeadResponse { success: true, lead })),
        Ok(None) => {}
        Err(error) => {
            // A broken local log still leaves the tracker lookup available.
            warn!(
                event_name = "api.lead_lookup_degraded",
                correlation_id = %correlation_id,
                lead_id = %id,
                error = %error,
                "local lookup failed; falling through to tracker"
            );
        }
    }

    match state.tracker.find_task(&id).await {
        RemoteLookup::Found(lead) => Ok(Json(LeadResponse { success: true, lead })),
        RemoteLookup::NotFound | RemoteLookup::Unavailable => {
            Err(error_response(InterfaceError::NotFound {
                message: format!("no lead with id `{id}`"),
                correlation_id,
            }))
        }
    }
}

async fn get_stats(State(state): State<LeadsState>) -> Json<StatsResponse> {
    let local = state.store.list_recent_or_empty().await;
    let remote = state.tracker.list_tasks().await;
    let stats = compute_stats(&merge_leads(local, remote));

    Json(StatsResponse { success: true, stats })
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use axum::body::{to_bytes, Body};
    use axum::http::{header, Method, Request, StatusCode};
    use axum::Router;
    use serde_json::{json, Value};
    use tower::util::ServiceExt;

    use leadline_db::{connect_with_settings, migrations, SqlLeadStore};
    use leadline_tracker::NoopTracker;

    use super::router;

    async fn test_router() -> Router {
        let pool = connect_with_settings("sqlite::memory:", 1, 30).await.expect("connect");
        migrations::run_pending(&pool).await.expect("migrate");
        router(Arc::new(SqlLeadStore::new(pool)), Arc::new(NoopTracker))
    }

    fn json_request(method: Method, uri: &str, body: Value) -> Request<Body> {
        Request::builder()
            .method(method)
            .uri(uri)
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(body.to_string()))
            .expect("request")
    }

    async fn json_body(response: axum::response::Response) -> Value {
        let bytes = to_bytes(response.into_body(), usize::MAX).await.expect("body");
        serde_json::from_slice(&bytes).expect("json body")
    }

    #[tokio::test]
    async fn listing_survives_an_unavailable_tracker() {
        let app = test_router().await;

        for name in ["Ali Hassan", "Fatima Noor"] {
            let response = app
                .clone()
                .oneshot(json_request(
                    Method::POST,
                    "/api/leads",
                    json!({"name": name, "phone": "+971501234567", "intent": "Rent",
                           "original_text": "Looking to rent"}),
                ))
                .await
                .expect("response");
            assert_eq!(response.status(), StatusCode::CREATED);
        }

        let response = app
            .oneshot(Request::builder().uri("/api/leads").body(Body::empty()).expect("request"))
            .await
            .expect("response");
        assert_eq!(response.status(), StatusCode::OK);

        let body = json_body(response).await;
        assert_eq!(body["success"], json!(true));
        assert_eq!(body["count"], json!(2));
        assert_eq!(body["leads"][0]["name"], json!("Fatima Noor"));
        assert_eq!(body["leads"][1]["name"], json!("Ali Hassan"));
        assert_eq!(body["config_status"]["tracker_connected"], json!(false));
        assert_eq!(body["config_status"]["list_id_configured"], json!(false));
    }

    #[tokio::test]
    async fn empty_drafts_are_rejected() {
        let app = test_router().await;

        let response = app
            .oneshot(json_request(Method::POST, "/api/leads", json!({})))
            .await
            .expect("response");
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);

        let body = json_body(response).await;
        assert_eq!(body["success"], json!(false));
    }

    #[tokio::test]
    async fn malformed_bodies_get_the_json_error_envelope() {
        let app = test_router().await;

        let truncated = Request::builder()
            .method(Method::POST)
            .uri("/api/leads")
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from("{\"name\": \"Ali\""))
            .expect("request");
        let response = app.clone().oneshot(truncated).await.expect("response");
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        let body = json_body(response).await;
        assert_eq!(body["success"], json!(false));
        assert!(body["error"].is_string());

        let untyped = Request::builder()
            .method(Method::POST)
            .uri("/api/leads")
            .body(Body::from("name=Ali"))
            .expect("request");
        let response = app.oneshot(untyped).await.expect("response");
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        let body = json_body(response).await;
        assert_eq!(body["success"], json!(false));
    }

    #[tokio::test]
    async fn unknown_lead_lookup_returns_not_found() {
        let app = test_router().await;

        let response = app
            .oneshot(
                Request::builder()
                    .uri("/api/leads/local-999")
                    .body(Body::empty())
                    .expect("request"),
            )
            .await
            .expect("response");
        assert_eq!(response.status(), StatusCode::NOT_FOUND);

        let body = json_body(response).await;
        assert_eq!(body["error"], json!("Lead not found"));
    }

    #[tokio::test]
    async fn lookup_by_id_returns_the_stored_lead() {
        let app = test_router().await;

        let created = app
            .clone()
            .oneshot(json_request(
                Method::POST,
                "/api/leads",
                json!({"name": "Ali Hassan", "intent": "Buy", "original_text": "I want to buy"}),
            ))
            .await
            .expect("response");
        let created = json_body(created).await;
        let id = created["lead"]["id"].as_str().expect("id").to_string();

        let response = app
            .oneshot(
                Request::builder()
                    .uri(format!("/api/leads/{id}"))
                    .body(Body::empty())
                    .expect("request"),
            )
            .await
            .expect("response");
        assert_eq!(response.status(), StatusCode::OK);

        let body = json_body(response).await;
        assert_eq!(body["lead"]["name"], json!("Ali Hassan"));
        assert_eq!(body["lead"]["source"], json!("local"));
    }

    #[tokio::test]
    async fn stats_tally_the_merged_view() {
        let app = test_router().await;

        for intent in ["Buy", "Rent"] {
            app.clone()
                .oneshot(json_request(
                    Method::POST,
                    "/api/leads",
                    json!({"name": "Ali", "intent": intent, "original_text": "hello"}),
                ))
                .await
                .expect("response");
        }

        let response = app
            .oneshot(Request::builder().uri("/api/stats").body(Body::empty()).expect("request"))
            .await
            .expect("response");
        assert_eq!(response.status(), StatusCode::OK);

        let body = json_body(response).await;
        assert_eq!(body["stats"]["total_leads"], json!(2));
        assert_eq!(body["stats"]["by_status"]["TO DO"], json!(2));
        assert_eq!(body["stats"]["by_priority"]["Normal"], json!(2));
    }
}
