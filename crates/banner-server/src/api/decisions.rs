//! Decision endpoints
//!
//! The single-flag decision RPC and the bulk evaluation endpoint. Both
//! resolve snapshots through the cache and run the pure evaluator; the
//! decision path never fails open — a backend failure degrades to a
//! disabled decision with reason `error`.

use actix_web::{get, post, web, HttpRequest, HttpResponse, Responder};
use banner_core::{Context, Decision};
use chrono::Utc;
use tracing::warn;
use uuid::Uuid;

use banner_persistence::service::evaluation::EvaluationRecord;

use crate::error;
use crate::middleware::auth::auth_context;
use crate::model::AppState;

use super::model::{
    BulkEvaluationParam, BulkEvaluationResponse, BulkFlagDecision, DecisionQuery, DecisionResponse,
};

/// Evaluate one flag and optionally record the decision.
///
/// Shared by the decision RPC and the SDK fast-evaluate endpoint.
pub(super) async fn decide(
    state: &AppState,
    project_id: Uuid,
    flag_key: &str,
    environment_key: &str,
    raw_context: &serde_json::Value,
    log: bool,
) -> DecisionResponse {
    let context = Context::from_json(raw_context);

    let snapshot = match state
        .cache
        .flag_snapshot(&state.db, project_id, flag_key, environment_key)
        .await
    {
        Ok(Some(snapshot)) => snapshot,
        Ok(None) => {
            return DecisionResponse::from_decision(flag_key, &Decision::not_found());
        }
        Err(err) => {
            warn!(flag_key, environment_key, error = %err, "snapshot load failed");
            return DecisionResponse::from_decision(flag_key, &Decision::error());
        }
    };

    let decision = banner_core::evaluate(&snapshot, &context);

    if log {
        state.sink.record(EvaluationRecord {
            project_id,
            flag_key: flag_key.to_string(),
            environment_key: environment_key.to_string(),
            subject_id: decision.subject_id.clone(),
            context: serde_json::to_value(&context).unwrap_or_default(),
            enabled: decision.enabled,
            variant_key: decision.variant.clone(),
            matched_rule_id: decision.rule_id,
            reason: decision.reason.to_string(),
            evaluated_at: Utc::now(),
        });
    }

    DecisionResponse::from_decision(flag_key, &decision)
}

/// Decision RPC
///
/// GET /api/v1/decisions/{flag_key}?environment=&context=&log=
#[get("/decisions/{flag_key}")]
pub async fn get_decision(
    req: HttpRequest,
    data: web::Data<AppState>,
    path: web::Path<String>,
    query: web::Query<DecisionQuery>,
) -> impl Responder {
    let Some(project_id) = auth_context(&req).project_id else {
        return error::unauthorized();
    };

    let raw_context = match query.context.as_deref() {
        Some(raw) if !raw.is_empty() => match serde_json::from_str(raw) {
            Ok(value) => value,
            Err(err) => {
                return error::bad_request(format!("context is not valid JSON: {}", err));
            }
        },
        _ => serde_json::json!({}),
    };

    let flag_key = path.into_inner();
    let response = decide(
        &data,
        project_id,
        &flag_key,
        &query.environment,
        &raw_context,
        query.log.unwrap_or(true),
    )
    .await;

    HttpResponse::Ok().json(response)
}

/// Bulk decision
///
/// POST /api/v1/evaluations/bulk {environment, context}
///
/// Evaluates every non-archived flag of the project. Bulk decisions are
/// never written to the evaluation log.
#[post("/evaluations/bulk")]
pub async fn bulk_evaluate(
    req: HttpRequest,
    data: web::Data<AppState>,
    body: web::Json<BulkEvaluationParam>,
) -> impl Responder {
    let Some(project_id) = auth_context(&req).project_id else {
        return error::unauthorized();
    };

    let raw_context = body.context.clone().unwrap_or_else(|| serde_json::json!({}));
    let context = Context::from_json(&raw_context);

    let snapshots = match data
        .cache
        .environment_snapshots(&data.db, project_id, &body.environment)
        .await
    {
        Ok(Some(snapshots)) => snapshots,
        Ok(None) => {
            return error::http_error(&anyhow::Error::new(
                banner_common::BannerError::not_found("environment", &body.environment),
            ));
        }
        Err(err) => {
            warn!(environment = %body.environment, error = %err, "bootstrap load failed");
            // Fail closed: report every flag disabled rather than erroring
            // the decision surface.
            return HttpResponse::Ok().json(BulkEvaluationResponse { flags: vec![] });
        }
    };

    let flags = snapshots
        .iter()
        .map(|snapshot| {
            let decision = banner_core::evaluate(snapshot, &context);
            BulkFlagDecision {
                key: snapshot.key.clone(),
                enabled: decision.enabled,
                variant: decision.variant,
            }
        })
        .collect();

    HttpResponse::Ok().json(BulkEvaluationResponse { flags })
}
