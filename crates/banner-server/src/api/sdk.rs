//! SDK endpoints
//!
//! Authenticated by the project-scoped `X-SDK-Key` credential. Bootstrap
//! hands a client everything it needs to evaluate locally; fast-evaluate
//! is the decision RPC for SDKs that stay server-driven.

use actix_web::{get, post, web, HttpRequest, HttpResponse, Responder, Scope};
use chrono::Utc;
use tracing::warn;

use crate::error;
use crate::middleware::auth::auth_context;
use crate::model::AppState;

use super::decisions::decide;
use super::model::{BootstrapQuery, BootstrapResponse, SdkEvaluateParam};

pub fn routes() -> Scope {
    web::scope("/sdk")
        .service(bootstrap)
        .service(evaluate)
}

/// SDK bootstrap
///
/// GET /sdk/bootstrap?environment=
///
/// Returns the project-environment snapshot list plus a server timestamp,
/// straight from the cache layer. Subscribers reconnecting to the change
/// stream re-bootstrap through this endpoint.
#[get("/bootstrap")]
pub async fn bootstrap(
    req: HttpRequest,
    data: web::Data<AppState>,
    query: web::Query<BootstrapQuery>,
) -> impl Responder {
    let context = auth_context(&req);
    let Some(project_id) = context.project_id.filter(|_| context.sdk) else {
        return error::unauthorized();
    };

    match data
        .cache
        .environment_snapshots(&data.db, project_id, &query.environment)
        .await
    {
        Ok(Some(snapshots)) => HttpResponse::Ok().json(BootstrapResponse {
            flags: snapshots.as_ref().clone(),
            server_time: Utc::now(),
        }),
        Ok(None) => error::http_error(&anyhow::Error::new(
            banner_common::BannerError::not_found("environment", &query.environment),
        )),
        Err(err) => {
            warn!(environment = %query.environment, error = %err, "bootstrap load failed");
            error::http_error(&anyhow::Error::new(banner_common::BannerError::Transient(
                "snapshot load failed".to_string(),
            )))
        }
    }
}

/// SDK fast evaluate
///
/// POST /sdk/evaluate {flag, environment, context}
///
/// Same payload and semantics as the decision RPC, authenticated by
/// `X-SDK-Key`.
#[post("/evaluate")]
pub async fn evaluate(
    req: HttpRequest,
    data: web::Data<AppState>,
    body: web::Json<SdkEvaluateParam>,
) -> impl Responder {
    let context = auth_context(&req);
    let Some(project_id) = context.project_id.filter(|_| context.sdk) else {
        return error::unauthorized();
    };

    let raw_context = body.context.clone().unwrap_or_else(|| serde_json::json!({}));
    let response = decide(
        &data,
        project_id,
        &body.flag,
        &body.environment,
        &raw_context,
        body.log.unwrap_or(true),
    )
    .await;

    HttpResponse::Ok().json(response)
}
