use actix_multipart::Multipart;
use actix_web::{web, HttpResponse};
use futures_util::StreamExt;
use tradelog::attachment::MAX_UPLOAD_BYTES;
use tradelog::{PlanDraft, PlanPatch, TradeDraft, TradePatch, TradelogError};

use crate::AppState;

/// Configure all API routes
pub fn configure(cfg: &mut web::ServiceConfig) {
    cfg.service(
        web::scope("/api")
            // Health
            .route("/health", web::get().to(health))
            // Trades
            .route("/trades", web::get().to(list_trades))
            .route("/trades", web::post().to(create_trade))
            .route("/trades/{id}", web::put().to(update_trade))
            .route("/trades/{id}", web::delete().to(delete_trade))
            // Plans
            .route("/plans", web::get().to(list_plans))
            .route("/plans", web::post().to(create_plan))
            .route("/plans/{id}", web::put().to(update_plan))
            .route("/plans/{id}", web::delete().to(delete_plan))
            // Screenshots
            .route("/images/{id}/{slot}", web::post().to(upload_image)),
    );
}

// ── Helpers ─────────────────────────────────────────────────────────

fn err_response(e: TradelogError) -> HttpResponse {
    match &e {
        TradelogError::NotFound { .. } => HttpResponse::NotFound().json(serde_json::json!({
            "error": e.to_string()
        })),
        TradelogError::Validation(_) => HttpResponse::BadRequest().json(serde_json::json!({
            "error": e.to_string()
        })),
        _ => {
            log::error!("Internal error: {e}");
            HttpResponse::InternalServerError().json(serde_json::json!({
                "error": "Internal server error"
            }))
        }
    }
}

// ── Health ──────────────────────────────────────────────────────────

async fn health() -> HttpResponse {
    HttpResponse::Ok().json(serde_json::json!({ "ok": true }))
}

// ── Trades ──────────────────────────────────────────────────────────

async fn list_trades(state: web::Data<AppState>) -> HttpResponse {
    match state.store.trades().read_all() {
        Ok(trades) => HttpResponse::Ok().json(trades),
        Err(e) => err_response(e),
    }
}

async fn create_trade(state: web::Data<AppState>, body: web::Json<TradeDraft>) -> HttpResponse {
    match state.store.trades().append(body.into_inner()) {
        Ok(trade) => HttpResponse::Created().json(trade),
        Err(e) => err_response(e),
    }
}

async fn update_trade(
    state: web::Data<AppState>,
    path: web::Path<String>,
    body: web::Json<TradePatch>,
) -> HttpResponse {
    match state.store.trades().update(&path, body.into_inner()) {
        Ok(trade) => HttpResponse::Ok().json(trade),
        Err(e) => err_response(e),
    }
}

async fn delete_trade(state: web::Data<AppState>, path: web::Path<String>) -> HttpResponse {
    match state.store.trades().remove(&path) {
        Ok(()) => HttpResponse::NoContent().finish(),
        Err(e) => err_response(e),
    }
}

// ── Plans ───────────────────────────────────────────────────────────

async fn list_plans(state: web::Data<AppState>) -> HttpResponse {
    match state.store.plans().read_all() {
        Ok(plans) => HttpResponse::Ok().json(plans),
        Err(e) => err_response(e),
    }
}

async fn create_plan(state: web::Data<AppState>, body: web::Json<PlanDraft>) -> HttpResponse {
    match state.store.plans().append(body.into_inner()) {
        Ok(plan) => HttpResponse::Created().json(plan),
        Err(e) => err_response(e),
    }
}

async fn update_plan(
    state: web::Data<AppState>,
    path: web::Path<String>,
    body: web::Json<PlanPatch>,
) -> HttpResponse {
    match state.store.plans().update(&path, body.into_inner()) {
        Ok(plan) => HttpResponse::Ok().json(plan),
        Err(e) => err_response(e),
    }
}

async fn delete_plan(state: web::Data<AppState>, path: web::Path<String>) -> HttpResponse {
    match state.store.plans().remove(&path) {
        Ok(()) => HttpResponse::NoContent().finish(),
        Err(e) => err_response(e),
    }
}

// ── Screenshots ─────────────────────────────────────────────────────

async fn upload_image(
    state: web::Data<AppState>,
    path: web::Path<(String, String)>,
    mut payload: Multipart,
) -> HttpResponse {
    let (entity_id, slot) = path.into_inner();

    // Single file field; anything after the first field is ignored.
    let mut file_name: Option<String> = None;
    let mut data: Vec<u8> = Vec::new();

    let Some(field) = payload.next().await else {
        return HttpResponse::BadRequest().json(serde_json::json!({
            "error": "missing file field"
        }));
    };
    let mut field = match field {
        Ok(field) => field,
        Err(e) => {
            return HttpResponse::BadRequest().json(serde_json::json!({
                "error": format!("malformed multipart payload: {e}")
            }));
        }
    };

    if let Some(name) = field.content_disposition().get_filename() {
        file_name = Some(name.to_string());
    }
    while let Some(chunk) = field.next().await {
        let chunk = match chunk {
            Ok(chunk) => chunk,
            Err(e) => {
                return HttpResponse::BadRequest().json(serde_json::json!({
                    "error": format!("upload interrupted: {e}")
                }));
            }
        };
        if data.len() + chunk.len() > MAX_UPLOAD_BYTES {
            return HttpResponse::PayloadTooLarge().json(serde_json::json!({
                "error": "upload exceeds size limit"
            }));
        }
        data.extend_from_slice(&chunk);
    }

    match state
        .store
        .attach_image(&entity_id, &slot, file_name.as_deref(), &data)
    {
        Ok(stored) => {
            if stored.linked.is_none() {
                log::warn!("stored attachment for unknown entity {entity_id} (orphaned)");
            }
            HttpResponse::Created().json(serde_json::json!({ "path": stored.path }))
        }
        Err(e) => err_response(e),
    }
}
