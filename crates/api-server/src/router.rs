use axum::routing::{get, post, put};
use axum::Router;
use tower_http::compression::CompressionLayer;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

use crate::rest::{self, AppState};

/// Builds the full REST surface with health endpoints and middleware.
pub fn build_router(state: AppState) -> Router {
    let campaigns = Router::new()
        .route("/", post(rest::create_campaign))
        .route("/:id", get(rest::get_campaign))
        .route("/:id/status", post(rest::update_campaign_status))
        .route("/:id/cadence", put(rest::update_cadence))
        .route("/:id/prospects", post(rest::add_prospects).get(rest::list_prospects))
        .route("/:id/messages", get(rest::list_messages))
        .route("/:id/performance", get(rest::campaign_performance))
        .route("/:id/stats", post(rest::apply_stats))
        .route("/:id/delivery-events", post(rest::record_delivery_event))
        .route("/:id/destination", get(rest::select_destination))
        .route("/:id/publish", post(rest::publish_content));

    let prospects = Router::new()
        .route("/:id", get(rest::get_prospect))
        .route("/:id/research", post(rest::research_prospect))
        .route("/:id/contact", post(rest::send_contact))
        .route("/:id/responses", post(rest::record_response))
        .route("/:id/link", post(rest::record_link));

    Router::new()
        .nest("/api/v1/campaigns", campaigns)
        .nest("/api/v1/prospects", prospects)
        .route("/api/v1/follow-ups/run", post(rest::run_follow_ups))
        // Operational endpoints
        .route("/health", get(rest::health_check))
        .route("/ready", get(rest::readiness))
        .route("/live", get(rest::liveness))
        .layer(CompressionLayer::new())
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    use axum::body::{to_bytes, Body};
    use axum::http::{Request, StatusCode};
    use serde_json::{json, Value};
    use tower::ServiceExt;

    use autopilot_core::config::AppConfig;
    use autopilot_engine::{CampaignEngine, Collaborators};
    use autopilot_store::InMemoryStore;

    fn app() -> Router {
        let config = AppConfig::default();
        let engine = CampaignEngine::new(
            &config,
            Arc::new(InMemoryStore::new()),
            Collaborators::from_config(&config),
        );
        build_router(AppState::new(engine, "test-node"))
    }

    async fn call(app: &Router, method: &str, uri: &str, body: Option<Value>) -> (StatusCode, Value) {
        let request = Request::builder()
            .method(method)
            .uri(uri)
            .header("content-type", "application/json")
            .body(match body {
                Some(v) => Body::from(v.to_string()),
                None => Body::empty(),
            })
            .unwrap();
        let response = app.clone().oneshot(request).await.unwrap();
        let status = response.status();
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let value = if bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&bytes).unwrap()
        };
        (status, value)
    }

    #[tokio::test]
    async fn test_health() {
        let app = app();
        let (status, body) = call(&app, "GET", "/health", None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["node_id"], "test-node");
    }

    #[tokio::test]
    async fn test_create_and_fetch_campaign() {
        let app = app();
        let (status, created) = call(
            &app,
            "POST",
            "/api/v1/campaigns",
            Some(json!({"name": "Guest posts", "cadence": {"follow_up_delays": [3, 7], "follow_up_enabled": true}})),
        )
        .await;
        assert_eq!(status, StatusCode::CREATED);
        assert_eq!(created["status"], "draft");

        let id = created["id"].as_str().unwrap();
        let (status, fetched) = call(&app, "GET", &format!("/api/v1/campaigns/{}", id), None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(fetched["name"], "Guest posts");
    }

    #[tokio::test]
    async fn test_validation_maps_to_bad_request() {
        let app = app();
        let (status, body) = call(&app, "POST", "/api/v1/campaigns", Some(json!({"name": "  "}))).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["error"], "validation");
    }

    #[tokio::test]
    async fn test_unknown_prospect_is_not_found() {
        let app = app();
        let uri = format!("/api/v1/prospects/{}", uuid::Uuid::new_v4());
        let (status, body) = call(&app, "GET", &uri, None).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(body["error"], "not_found");
    }

    #[tokio::test]
    async fn test_illegal_status_change_conflicts() {
        let app = app();
        let (_, created) = call(&app, "POST", "/api/v1/campaigns", Some(json!({"name": "Roundup"}))).await;
        let id = created["id"].as_str().unwrap();
        let uri = format!("/api/v1/campaigns/{}/status", id);

        let (status, _) = call(&app, "POST", &uri, Some(json!({"status": "active"}))).await;
        assert_eq!(status, StatusCode::OK);
        let (status, body) = call(&app, "POST", &uri, Some(json!({"status": "draft"}))).await;
        assert_eq!(status, StatusCode::CONFLICT);
        assert_eq!(body["error"], "state_conflict");
    }

    #[tokio::test]
    async fn test_stats_endpoint_rejects_unknown_counter() {
        let app = app();
        let (_, created) = call(&app, "POST", "/api/v1/campaigns", Some(json!({"name": "Stats"}))).await;
        let uri = format!("/api/v1/campaigns/{}/stats", created["id"].as_str().unwrap());

        let (status, stats) = call(&app, "POST", &uri, Some(json!({"emails_sent": 4, "emails_replied": 1}))).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(stats["emails_sent"], 4);
        assert_eq!(stats["response_rate"], 25.0);

        let (status, _) = call(&app, "POST", &uri, Some(json!({"bogus": 1}))).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn test_follow_up_run_without_body() {
        let app = app();
        let (status, report) = call(&app, "POST", "/api/v1/follow-ups/run", None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(report["processed"], 0);
    }
}
