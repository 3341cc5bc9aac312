//! Flag admin handlers

use actix_web::{delete, get, post, put, web, HttpRequest, HttpResponse, Responder, Scope};
use banner_common::BannerError;
use banner_core::FlagKind;
use tracing::info;

use banner_persistence::service::flag::{
    self, FlagDraft, FlagPatch, RuleDraft, RuleDraftKind, TransitionKind, VariantDraft,
};

use crate::error;
use crate::model::AppState;

use super::require_admin;
use crate::api::model::{
    FlagCreateParam, FlagListQuery, FlagUpdateParam, OverlayPutParam, RuleParam, RulesPutParam,
    SchedulePutParam, TogglePutParam, VariantsPutParam,
};

pub fn routes() -> Scope {
    web::scope("/flags")
        .service(list_flags)
        .service(create_flag)
        .service(get_flag)
        .service(update_flag)
        .service(delete_flag)
        .service(archive_flag)
        .service(put_variants)
        .service(put_overlay)
        .service(put_toggle)
        .service(put_schedule)
        .service(put_rules)
}

fn to_rule_draft(param: &RuleParam) -> Result<RuleDraft, BannerError> {
    let kind = match param.rule_type.as_str() {
        "segment" => RuleDraftKind::Segment {
            segment_key: param
                .segment
                .clone()
                .ok_or_else(|| BannerError::validation("segment rule requires 'segment'"))?,
        },
        "attribute" => RuleDraftKind::Attribute {
            attribute: param
                .attribute
                .clone()
                .ok_or_else(|| BannerError::validation("attribute rule requires 'attribute'"))?,
            operator: param
                .operator
                .clone()
                .ok_or_else(|| BannerError::validation("attribute rule requires 'operator'"))?,
            value: param
                .value
                .clone()
                .ok_or_else(|| BannerError::validation("attribute rule requires 'value'"))?,
        },
        "user_id" => RuleDraftKind::UserId {
            user_ids: param
                .user_ids
                .clone()
                .ok_or_else(|| BannerError::validation("user_id rule requires 'userIds'"))?,
        },
        other => {
            return Err(BannerError::validation(format!(
                "unknown rule type '{}'",
                other
            )));
        }
    };

    Ok(RuleDraft {
        kind,
        serve_enabled: param.serve_enabled,
        serve_variant_key: param.serve_variant.clone(),
        serve_percentage: param.serve_percentage,
    })
}

/// GET /api/v1/flags
#[get("")]
pub async fn list_flags(
    req: HttpRequest,
    data: web::Data<AppState>,
    query: web::Query<FlagListQuery>,
) -> impl Responder {
    let (project_id, _) = match require_admin(&req) {
        Ok(identity) => identity,
        Err(response) => return response,
    };

    match flag::list(
        &data.db,
        project_id,
        query.page_no,
        query.page_size,
        query.include_archived,
    )
    .await
    {
        Ok(page) => HttpResponse::Ok().json(page),
        Err(err) => error::http_error(&err),
    }
}

/// POST /api/v1/flags
#[post("")]
pub async fn create_flag(
    req: HttpRequest,
    data: web::Data<AppState>,
    body: web::Json<FlagCreateParam>,
) -> impl Responder {
    let (project_id, actor) = match require_admin(&req) {
        Ok(identity) => identity,
        Err(response) => return response,
    };

    let Some(kind) = FlagKind::parse(&body.kind) else {
        return error::bad_request(format!("unknown flag kind '{}'", body.kind));
    };

    let body = body.into_inner();
    let draft = FlagDraft {
        key: body.key,
        name: body.name,
        description: body.description,
        kind,
        tags: body.tags,
        permanent: body.permanent,
        owner_email: body.owner_email,
    };

    match flag::create(&data.db, project_id, actor.as_deref(), draft).await {
        Ok(created) => {
            info!(flag_key = %created.key, "flag created");
            data.drain_outbox().await;
            HttpResponse::Ok().json(created)
        }
        Err(err) => error::http_error(&err),
    }
}

/// GET /api/v1/flags/{key}
#[get("/{key}")]
pub async fn get_flag(
    req: HttpRequest,
    data: web::Data<AppState>,
    path: web::Path<String>,
) -> impl Responder {
    let (project_id, _) = match require_admin(&req) {
        Ok(identity) => identity,
        Err(response) => return response,
    };

    match flag::find_by_key(&data.db, project_id, &path).await {
        Ok(Some(model)) => HttpResponse::Ok().json(model),
        Ok(None) => error::http_error(&anyhow::Error::new(BannerError::not_found("flag", &path))),
        Err(err) => error::http_error(&err),
    }
}

/// PUT /api/v1/flags/{key}
#[put("/{key}")]
pub async fn update_flag(
    req: HttpRequest,
    data: web::Data<AppState>,
    path: web::Path<String>,
    body: web::Json<FlagUpdateParam>,
) -> impl Responder {
    let (project_id, actor) = match require_admin(&req) {
        Ok(identity) => identity,
        Err(response) => return response,
    };

    let body = body.into_inner();
    let patch = FlagPatch {
        name: body.name,
        description: body.description,
        tags: body.tags,
        permanent: body.permanent,
        owner_email: body.owner_email,
    };

    match flag::update(&data.db, project_id, actor.as_deref(), &path, patch).await {
        Ok(updated) => {
            data.drain_outbox().await;
            HttpResponse::Ok().json(updated)
        }
        Err(err) => error::http_error(&err),
    }
}

/// DELETE /api/v1/flags/{key}
#[delete("/{key}")]
pub async fn delete_flag(
    req: HttpRequest,
    data: web::Data<AppState>,
    path: web::Path<String>,
) -> impl Responder {
    let (project_id, actor) = match require_admin(&req) {
        Ok(identity) => identity,
        Err(response) => return response,
    };

    let overlay_ids = match flag::find_by_key(&data.db, project_id, &path).await {
        Ok(Some(model)) => flag::overlay_ids(&data.db, model.id).await.unwrap_or_default(),
        _ => vec![],
    };

    match flag::delete(&data.db, project_id, actor.as_deref(), &path).await {
        Ok(()) => {
            for overlay_id in overlay_ids {
                data.scheduler.cancel(overlay_id);
            }
            info!(flag_key = %path, "flag deleted");
            data.drain_outbox().await;
            HttpResponse::NoContent().finish()
        }
        Err(err) => error::http_error(&err),
    }
}

/// POST /api/v1/flags/{key}/archive
#[post("/{key}/archive")]
pub async fn archive_flag(
    req: HttpRequest,
    data: web::Data<AppState>,
    path: web::Path<String>,
) -> impl Responder {
    let (project_id, actor) = match require_admin(&req) {
        Ok(identity) => identity,
        Err(response) => return response,
    };

    match flag::archive(&data.db, project_id, actor.as_deref(), &path).await {
        Ok(archived) => {
            // Archival clears schedules; drop their in-process timers too.
            if let Ok(overlay_ids) = flag::overlay_ids(&data.db, archived.id).await {
                for overlay_id in overlay_ids {
                    data.scheduler.cancel(overlay_id);
                }
            }
            info!(flag_key = %path, "flag archived");
            data.drain_outbox().await;
            HttpResponse::Ok().json(archived)
        }
        Err(err) => error::http_error(&err),
    }
}

/// PUT /api/v1/flags/{key}/variants
#[put("/{key}/variants")]
pub async fn put_variants(
    req: HttpRequest,
    data: web::Data<AppState>,
    path: web::Path<String>,
    body: web::Json<VariantsPutParam>,
) -> impl Responder {
    let (project_id, actor) = match require_admin(&req) {
        Ok(identity) => identity,
        Err(response) => return response,
    };

    let drafts = body
        .into_inner()
        .variants
        .into_iter()
        .map(|param| VariantDraft {
            name: param.name.unwrap_or_else(|| param.key.clone()),
            key: param.key,
            payload: param.payload,
            weight: param.weight,
        })
        .collect();

    match flag::set_variants(&data.db, project_id, actor.as_deref(), &path, drafts).await {
        Ok(variants) => {
            data.drain_outbox().await;
            HttpResponse::Ok().json(variants)
        }
        Err(err) => error::http_error(&err),
    }
}

/// PUT /api/v1/flags/{key}/environments/{env}
#[put("/{key}/environments/{env}")]
pub async fn put_overlay(
    req: HttpRequest,
    data: web::Data<AppState>,
    path: web::Path<(String, String)>,
    body: web::Json<OverlayPutParam>,
) -> impl Responder {
    let (project_id, actor) = match require_admin(&req) {
        Ok(identity) => identity,
        Err(response) => return response,
    };
    let (flag_key, environment_key) = path.into_inner();

    match flag::update_overlay(
        &data.db,
        project_id,
        actor.as_deref(),
        &flag_key,
        &environment_key,
        body.percentage,
        body.default_variant.as_deref(),
    )
    .await
    {
        Ok(overlay) => {
            data.drain_outbox().await;
            HttpResponse::Ok().json(overlay)
        }
        Err(err) => error::http_error(&err),
    }
}

/// PUT /api/v1/flags/{key}/environments/{env}/toggle
///
/// Manual toggles clear both scheduled transition times and cancel their
/// in-process timers.
#[put("/{key}/environments/{env}/toggle")]
pub async fn put_toggle(
    req: HttpRequest,
    data: web::Data<AppState>,
    path: web::Path<(String, String)>,
    body: web::Json<TogglePutParam>,
) -> impl Responder {
    let (project_id, actor) = match require_admin(&req) {
        Ok(identity) => identity,
        Err(response) => return response,
    };
    let (flag_key, environment_key) = path.into_inner();

    match flag::toggle(
        &data.db,
        project_id,
        actor.as_deref(),
        &flag_key,
        &environment_key,
        body.enabled,
    )
    .await
    {
        Ok(overlay) => {
            data.scheduler.cancel(overlay.id);
            info!(flag_key = %flag_key, environment = %environment_key, enabled = body.enabled, "flag toggled");
            data.drain_outbox().await;
            HttpResponse::Ok().json(overlay)
        }
        Err(err) => error::http_error(&err),
    }
}

/// PUT /api/v1/flags/{key}/environments/{env}/schedule
#[put("/{key}/environments/{env}/schedule")]
pub async fn put_schedule(
    req: HttpRequest,
    data: web::Data<AppState>,
    path: web::Path<(String, String)>,
    body: web::Json<SchedulePutParam>,
) -> impl Responder {
    let (project_id, actor) = match require_admin(&req) {
        Ok(identity) => identity,
        Err(response) => return response,
    };
    let (flag_key, environment_key) = path.into_inner();

    let Some(kind) = TransitionKind::parse(&body.kind) else {
        return error::bad_request(format!("unknown transition kind '{}'", body.kind));
    };

    match flag::schedule(
        &data.db,
        project_id,
        actor.as_deref(),
        &flag_key,
        &environment_key,
        kind,
        body.at,
    )
    .await
    {
        Ok(overlay) => {
            data.scheduler.schedule(overlay.id, kind, body.at);
            info!(
                flag_key = %flag_key,
                environment = %environment_key,
                kind = kind.as_str(),
                at = %body.at,
                "transition scheduled"
            );
            data.drain_outbox().await;
            HttpResponse::Ok().json(overlay)
        }
        Err(err) => error::http_error(&err),
    }
}

/// PUT /api/v1/flags/{key}/environments/{env}/rules
#[put("/{key}/environments/{env}/rules")]
pub async fn put_rules(
    req: HttpRequest,
    data: web::Data<AppState>,
    path: web::Path<(String, String)>,
    body: web::Json<RulesPutParam>,
) -> impl Responder {
    let (project_id, actor) = match require_admin(&req) {
        Ok(identity) => identity,
        Err(response) => return response,
    };
    let (flag_key, environment_key) = path.into_inner();

    let mut drafts = Vec::with_capacity(body.rules.len());
    for param in &body.rules {
        match to_rule_draft(param) {
            Ok(draft) => drafts.push(draft),
            Err(err) => return error::http_error(&anyhow::Error::new(err)),
        }
    }

    match flag::replace_rules(
        &data.db,
        project_id,
        actor.as_deref(),
        &flag_key,
        &environment_key,
        drafts,
    )
    .await
    {
        Ok(rules) => {
            data.drain_outbox().await;
            HttpResponse::Ok().json(rules)
        }
        Err(err) => error::http_error(&err),
    }
}
