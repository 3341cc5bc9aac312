//! Segment admin handlers

use actix_web::{delete, get, post, put, web, HttpRequest, HttpResponse, Responder, Scope};
use banner_common::BannerError;
use banner_core::MatchType;
use tracing::info;

use banner_persistence::service::segment::{self, SegmentDraft, SegmentRuleDraft};

use crate::error;
use crate::model::AppState;

use super::require_admin;
use crate::api::model::{SegmentCreateParam, SegmentRuleParam, SegmentUpdateParam};

pub fn routes() -> Scope {
    web::scope("/segments")
        .service(list_segments)
        .service(create_segment)
        .service(get_segment)
        .service(update_segment)
        .service(delete_segment)
}

fn to_rule_drafts(params: &[SegmentRuleParam]) -> Vec<SegmentRuleDraft> {
    params
        .iter()
        .map(|param| SegmentRuleDraft {
            attribute: param.attribute.clone(),
            operator: param.operator.clone(),
            value: param.value.clone(),
        })
        .collect()
}

/// GET /api/v1/segments
#[get("")]
pub async fn list_segments(req: HttpRequest, data: web::Data<AppState>) -> impl Responder {
    let (project_id, _) = match require_admin(&req) {
        Ok(identity) => identity,
        Err(response) => return response,
    };

    match segment::list(&data.db, project_id).await {
        Ok(segments) => HttpResponse::Ok().json(segments),
        Err(err) => error::http_error(&err),
    }
}

/// POST /api/v1/segments
#[post("")]
pub async fn create_segment(
    req: HttpRequest,
    data: web::Data<AppState>,
    body: web::Json<SegmentCreateParam>,
) -> impl Responder {
    let (project_id, actor) = match require_admin(&req) {
        Ok(identity) => identity,
        Err(response) => return response,
    };

    let Some(match_type) = MatchType::parse(&body.match_type) else {
        return error::bad_request(format!("unknown match type '{}'", body.match_type));
    };

    let draft = SegmentDraft {
        key: body.key.clone(),
        name: body.name.clone(),
        match_type,
        rules: to_rule_drafts(&body.rules),
    };

    match segment::create(&data.db, project_id, actor.as_deref(), draft).await {
        Ok(created) => {
            info!(segment_key = %created.key, "segment created");
            HttpResponse::Ok().json(created)
        }
        Err(err) => error::http_error(&err),
    }
}

/// GET /api/v1/segments/{key}
#[get("/{key}")]
pub async fn get_segment(
    req: HttpRequest,
    data: web::Data<AppState>,
    path: web::Path<String>,
) -> impl Responder {
    let (project_id, _) = match require_admin(&req) {
        Ok(identity) => identity,
        Err(response) => return response,
    };

    match segment::find_by_key(&data.db, project_id, &path).await {
        Ok(Some(model)) => {
            let rules = segment::rules_of(&data.db, model.id).await.unwrap_or_default();
            HttpResponse::Ok().json(serde_json::json!({
                "segment": model,
                "rules": rules,
            }))
        }
        Ok(None) => {
            error::http_error(&anyhow::Error::new(BannerError::not_found("segment", &path)))
        }
        Err(err) => error::http_error(&err),
    }
}

/// PUT /api/v1/segments/{key}
///
/// A segment update changes the decision surface of every flag whose
/// rules embed it; the store expands those into outbox rows and the
/// inline drain applies them.
#[put("/{key}")]
pub async fn update_segment(
    req: HttpRequest,
    data: web::Data<AppState>,
    path: web::Path<String>,
    body: web::Json<SegmentUpdateParam>,
) -> impl Responder {
    let (project_id, actor) = match require_admin(&req) {
        Ok(identity) => identity,
        Err(response) => return response,
    };

    let match_type = match body.match_type.as_deref() {
        Some(raw) => match MatchType::parse(raw) {
            Some(parsed) => Some(parsed),
            None => {
                return error::bad_request(format!("unknown match type '{}'", raw));
            }
        },
        None => None,
    };

    let rules = body.rules.as_deref().map(to_rule_drafts);

    match segment::update(
        &data.db,
        project_id,
        actor.as_deref(),
        &path,
        body.name.clone(),
        match_type,
        rules,
    )
    .await
    {
        Ok(updated) => {
            data.drain_outbox().await;
            HttpResponse::Ok().json(updated)
        }
        Err(err) => error::http_error(&err),
    }
}

/// DELETE /api/v1/segments/{key}
///
/// Rejected with 409 while any flag rule references the segment.
#[delete("/{key}")]
pub async fn delete_segment(
    req: HttpRequest,
    data: web::Data<AppState>,
    path: web::Path<String>,
) -> impl Responder {
    let (project_id, actor) = match require_admin(&req) {
        Ok(identity) => identity,
        Err(response) => return response,
    };

    match segment::delete(&data.db, project_id, actor.as_deref(), &path).await {
        Ok(()) => {
            info!(segment_key = %path, "segment deleted");
            HttpResponse::NoContent().finish()
        }
        Err(err) => error::http_error(&err),
    }
}
