//! Sync API handlers.
//!
//! ```text
//! POST /api/sync/{entity}                   push one record
//! POST /api/sync/{entity}/resolve-conflict  apply a chosen strategy
//! ```
//!
//! `{entity}` is one of `user`, `registration`, `supply`, `task`,
//! `task-assignment`, `location`, `alert`, `notification`.

use actix_web::{post, web, HttpResponse};
use serde::Deserialize;
use serde_json::{json, Map, Value};

use crate::domain::document::{self, Document};
use crate::domain::sync::{ConflictReport, ResolveOutcome, SyncOutcome};
use crate::domain::{Error, EntityKind};
use crate::inbound::http::state::HttpState;
use crate::inbound::http::ApiResult;

/// Body of a resolve-conflict call.
#[derive(Debug, Deserialize)]
pub struct ResolveRequest {
    #[serde(alias = "resolution_strategy")]
    pub strategy: String,
    #[serde(default, alias = "clientData")]
    pub client_data: Value,
    /// Explicit primary key; defaults to the one inside `client_data`.
    #[serde(default)]
    pub id: Option<String>,
}

/// Push one record for an entity kind.
#[utoipa::path(
    post,
    path = "/api/sync/{entity}",
    params(("entity" = String, Path, description = "Entity kind route segment")),
    responses(
        (status = 200, description = "Record written or duplicate auto-merged"),
        (status = 400, description = "Validation failed"),
        (status = 404, description = "Unknown entity kind"),
        (status = 409, description = "Stale write or uniqueness conflict"),
        (status = 500, description = "Store unavailable")
    ),
    tag = "sync"
)]
#[post("/sync/{entity}")]
pub async fn sync_entity(
    state: web::Data<HttpState>,
    path: web::Path<String>,
    payload: web::Json<Value>,
) -> ApiResult<HttpResponse> {
    let kind = parse_kind(&path)?;
    let client = into_document(payload.into_inner())?;
    let outcome = state.sync.sync(kind, client).await?;
    Ok(match outcome {
        SyncOutcome::Written {
            id,
            created,
            record,
        } => {
            let mut body = Map::new();
            body.insert("success".into(), json!(true));
            body.insert(
                "message".into(),
                json!(format!("{} synced", kind.pascal())),
            );
            body.insert(kind.descriptor().primary_key.into(), json!(id));
            body.insert(format!("isNew{}", kind.pascal()), json!(created));
            body.insert("data".into(), Value::Object(record));
            HttpResponse::Ok().json(Value::Object(body))
        }
        SyncOutcome::AutoMerged {
            server_id,
            resolved_as,
            record,
        } => {
            let mut body = Map::new();
            body.insert("success".into(), json!(true));
            body.insert("resolved_as".into(), json!(resolved_as));
            body.insert(kind.descriptor().primary_key.into(), json!(server_id));
            body.insert("server_id".into(), json!(server_id));
            body.insert("data".into(), Value::Object(record));
            HttpResponse::Ok().json(Value::Object(body))
        }
        SyncOutcome::Conflict(report) => conflict_response(report),
    })
}

/// Apply a client-chosen strategy to a previously reported conflict.
#[utoipa::path(
    post,
    path = "/api/sync/{entity}/resolve-conflict",
    params(("entity" = String, Path, description = "Entity kind route segment")),
    responses(
        (status = 200, description = "Conflict resolved"),
        (status = 400, description = "Unknown or unavailable strategy"),
        (status = 404, description = "Unknown entity kind"),
        (status = 409, description = "Uniqueness re-check failed"),
        (status = 500, description = "Store unavailable")
    ),
    tag = "sync"
)]
#[post("/sync/{entity}/resolve-conflict")]
pub async fn resolve_entity(
    state: web::Data<HttpState>,
    path: web::Path<String>,
    payload: web::Json<ResolveRequest>,
) -> ApiResult<HttpResponse> {
    let kind = parse_kind(&path)?;
    let payload = payload.into_inner();
    let client = match payload.client_data {
        Value::Null => Document::new(),
        other => into_document(other)?,
    };
    let id = payload
        .id
        .clone()
        .or_else(|| {
            document::get_str(&client, kind.descriptor().primary_key).map(str::to_owned)
        })
        .ok_or_else(|| {
            Error::invalid_request("missing primary key in resolve request")
                .with_details(json!({ "field": kind.descriptor().primary_key }))
        })?;

    let outcome = state
        .sync
        .resolve_conflict(kind, &id, &payload.strategy, client)
        .await?;
    Ok(match outcome {
        ResolveOutcome::Resolved(resolution) => {
            let mut body = Map::new();
            body.insert("success".into(), json!(true));
            body.insert("status".into(), json!("resolved"));
            body.insert(
                "message".into(),
                json!(format!("{} conflict resolved", kind.pascal())),
            );
            body.insert(kind.descriptor().primary_key.into(), json!(resolution.id));
            body.insert("resolvedData".into(), Value::Object(resolution.record));
            body.insert(format!("isNew{}", kind.pascal()), json!(resolution.is_new));
            body.insert(
                "resolution_strategy".into(),
                json!(resolution.strategy.as_str()),
            );
            body.insert(
                "allowed_strategies".into(),
                json!(resolution.allowed_strategies),
            );
            body.insert("client_id".into(), json!(resolution.id));
            body.insert("server_id".into(), json!(resolution.id));
            HttpResponse::Ok().json(Value::Object(body))
        }
        ResolveOutcome::Conflict(report) => conflict_response(report),
    })
}

pub(crate) fn parse_kind(segment: &str) -> Result<EntityKind, Error> {
    EntityKind::from_route(segment).ok_or_else(|| {
        Error::not_found(format!("unknown entity kind: {segment}"))
            .with_details(json!({ "field": "entity" }))
    })
}

fn into_document(value: Value) -> Result<Document, Error> {
    match value {
        Value::Object(map) => Ok(map),
        _ => Err(Error::invalid_request("request body must be a JSON object")),
    }
}

/// Render the richer 409 body clients use to pick a strategy.
fn conflict_response(report: ConflictReport) -> HttpResponse {
    let mut body = Map::new();
    body.insert("error".into(), json!(report.message));
    body.insert("conflict_field".into(), json!(report.conflict_field));
    if let Some(conflict_type) = report.conflict_type {
        body.insert("conflict_type".into(), json!(conflict_type));
    }
    body.insert("latest_data".into(), Value::Object(report.latest_data));
    body.insert(
        "allowed_strategies".into(),
        json!(report.allowed_strategies),
    );
    body.insert("client_id".into(), json!(report.client_id));
    body.insert("server_id".into(), json!(report.server_id));
    HttpResponse::Conflict().json(Value::Object(body))
}
