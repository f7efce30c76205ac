//! REST handlers over the campaign engine and health endpoints.

use std::collections::HashMap;
use std::time::Instant;

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::Json;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use autopilot_analytics::{CampaignPerformance, StatsDelta};
use autopilot_core::channels::ContentBrief;
use autopilot_core::types::{
    CadenceConfig, Campaign, CampaignStatus, ClassificationResult, DeliveryEvent, MessageKind,
    MessageRecord, Prospect, RawProspect, StatsBlock,
};
use autopilot_engine::{CampaignEngine, CreateCampaign, CycleReport, PublishOutcome};

use crate::error::ApiError;

type ApiResult<T> = Result<Json<T>, ApiError>;

/// Shared application state for REST handlers.
#[derive(Clone)]
pub struct AppState {
    pub engine: CampaignEngine,
    pub node_id: String,
    pub start_time: Instant,
}

impl AppState {
    pub fn new(engine: CampaignEngine, node_id: impl Into<String>) -> Self {
        Self {
            engine,
            node_id: node_id.into(),
            start_time: Instant::now(),
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct UpdateStatusRequest {
    pub status: CampaignStatus,
}

#[derive(Debug, Deserialize)]
pub struct SendContactRequest {
    #[serde(default = "default_kind")]
    pub kind: MessageKind,
    #[serde(default)]
    pub custom_message: Option<String>,
}

fn default_kind() -> MessageKind {
    MessageKind::Initial
}

#[derive(Debug, Deserialize)]
pub struct InboundResponseRequest {
    pub text: String,
}

#[derive(Debug, Deserialize)]
pub struct DeliveryEventRequest {
    pub event: DeliveryEvent,
}

#[derive(Debug, Default, Deserialize)]
pub struct RunCycleRequest {
    /// Evaluation time; defaults to the server clock.
    #[serde(default)]
    pub now: Option<DateTime<Utc>>,
}

#[derive(Debug, Serialize)]
pub struct DestinationResponse {
    pub campaign_id: Uuid,
    pub destination: String,
}

#[derive(Serialize)]
pub struct HealthResponse {
    pub status: String,
    pub node_id: String,
    pub uptime_secs: u64,
}

// ─── Operational ───────────────────────────────────────────────────────────

/// GET /health
pub async fn health_check(State(state): State<AppState>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "healthy".to_string(),
        node_id: state.node_id.clone(),
        uptime_secs: state.start_time.elapsed().as_secs(),
    })
}

/// GET /ready
pub async fn readiness(State(state): State<AppState>) -> StatusCode {
    if state.engine.settings().max_concurrent_prospects > 0 {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    }
}

/// GET /live
pub async fn liveness() -> StatusCode {
    StatusCode::OK
}

// ─── Campaigns ─────────────────────────────────────────────────────────────

pub async fn create_campaign(
    State(state): State<AppState>,
    Json(req): Json<CreateCampaign>,
) -> Result<(StatusCode, Json<Campaign>), ApiError> {
    let campaign = state.engine.create_campaign(req).await?;
    metrics::counter!("api.campaigns.created").increment(1);
    Ok((StatusCode::CREATED, Json(campaign)))
}

pub async fn get_campaign(State(state): State<AppState>, Path(id): Path<Uuid>) -> ApiResult<Campaign> {
    Ok(Json(state.engine.get_campaign(id).await?))
}

pub async fn update_campaign_status(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Json(req): Json<UpdateStatusRequest>,
) -> ApiResult<Campaign> {
    Ok(Json(state.engine.update_campaign_status(id, req.status).await?))
}

pub async fn update_cadence(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Json(cadence): Json<CadenceConfig>,
) -> ApiResult<Campaign> {
    Ok(Json(state.engine.update_cadence(id, cadence).await?))
}

pub async fn add_prospects(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Json(raw): Json<Vec<RawProspect>>,
) -> Result<(StatusCode, Json<Vec<Prospect>>), ApiError> {
    let prospects = state.engine.add_prospects(id, raw).await?;
    Ok((StatusCode::CREATED, Json(prospects)))
}

pub async fn list_prospects(State(state): State<AppState>, Path(id): Path<Uuid>) -> ApiResult<Vec<Prospect>> {
    Ok(Json(state.engine.list_prospects(id).await?))
}

pub async fn list_messages(State(state): State<AppState>, Path(id): Path<Uuid>) -> ApiResult<Vec<MessageRecord>> {
    Ok(Json(state.engine.list_messages(id).await?))
}

pub async fn campaign_performance(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> ApiResult<CampaignPerformance> {
    Ok(Json(state.engine.campaign_performance(id).await?))
}

/// POST /api/v1/campaigns/:id/stats with a `{counter: increment}` map.
pub async fn apply_stats(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Json(raw): Json<HashMap<String, i64>>,
) -> ApiResult<StatsBlock> {
    let delta = StatsDelta::from_raw(&raw)?;
    Ok(Json(state.engine.apply_stats_delta(id, &delta).await?))
}

pub async fn record_delivery_event(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Json(req): Json<DeliveryEventRequest>,
) -> ApiResult<StatsBlock> {
    Ok(Json(state.engine.record_delivery_event(id, req.event).await?))
}

pub async fn select_destination(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> ApiResult<DestinationResponse> {
    let destination = state.engine.select_publish_destination(id).await?;
    Ok(Json(DestinationResponse {
        campaign_id: id,
        destination,
    }))
}

pub async fn publish_content(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Json(brief): Json<ContentBrief>,
) -> Result<(StatusCode, Json<PublishOutcome>), ApiError> {
    let outcome = state.engine.publish_content(id, brief).await?;
    Ok((StatusCode::CREATED, Json(outcome)))
}

// ─── Prospects ─────────────────────────────────────────────────────────────

pub async fn get_prospect(State(state): State<AppState>, Path(id): Path<Uuid>) -> ApiResult<Prospect> {
    Ok(Json(state.engine.get_prospect(id).await?))
}

pub async fn research_prospect(State(state): State<AppState>, Path(id): Path<Uuid>) -> ApiResult<Prospect> {
    Ok(Json(state.engine.research_prospect(id).await?))
}

pub async fn send_contact(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Json(req): Json<SendContactRequest>,
) -> ApiResult<MessageRecord> {
    let record = state
        .engine
        .send_contact(id, req.kind, req.custom_message.as_deref(), Utc::now())
        .await?;
    Ok(Json(record))
}

pub async fn record_response(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Json(req): Json<InboundResponseRequest>,
) -> ApiResult<ClassificationResult> {
    Ok(Json(state.engine.record_inbound_response(id, &req.text).await?))
}

pub async fn record_link(State(state): State<AppState>, Path(id): Path<Uuid>) -> ApiResult<Prospect> {
    Ok(Json(state.engine.record_link_acquired(id).await?))
}

// ─── Follow-ups ────────────────────────────────────────────────────────────

/// POST /api/v1/follow-ups/run. The body is optional.
pub async fn run_follow_ups(
    State(state): State<AppState>,
    req: Option<Json<RunCycleRequest>>,
) -> ApiResult<CycleReport> {
    let now = req.and_then(|Json(r)| r.now).unwrap_or_else(Utc::now);
    Ok(Json(state.engine.process_due_follow_ups(now).await?))
}
