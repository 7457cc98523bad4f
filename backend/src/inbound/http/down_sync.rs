//! Bulk read API for initial device hydration.

use actix_web::{get, web, HttpResponse};
use serde_json::json;

use crate::inbound::http::state::HttpState;
use crate::inbound::http::sync::parse_kind;
use crate::inbound::http::ApiResult;

/// Fetch every record of an entity kind.
#[utoipa::path(
    get,
    path = "/api/down-sync/{entity}",
    params(("entity" = String, Path, description = "Entity kind route segment")),
    responses(
        (status = 200, description = "All records of the kind"),
        (status = 404, description = "Unknown entity kind"),
        (status = 500, description = "Store unavailable")
    ),
    tag = "sync"
)]
#[get("/down-sync/{entity}")]
pub async fn down_sync_entity(
    state: web::Data<HttpState>,
    path: web::Path<String>,
) -> ApiResult<HttpResponse> {
    let kind = parse_kind(&path)?;
    let records = state.sync.down_sync(kind).await?;
    Ok(HttpResponse::Ok().json(json!({
        "success": true,
        "count": records.len(),
        "data": records,
    })))
}
