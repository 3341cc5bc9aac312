//! Environment admin handlers

use actix_web::{get, post, web, HttpRequest, HttpResponse, Responder, Scope};
use tracing::info;

use banner_persistence::service::environment;

use crate::error;
use crate::model::AppState;

use super::require_admin;
use crate::api::model::EnvironmentCreateParam;

pub fn routes() -> Scope {
    web::scope("/environments")
        .service(list_environments)
        .service(create_environment)
}

/// GET /api/v1/environments
#[get("")]
pub async fn list_environments(req: HttpRequest, data: web::Data<AppState>) -> impl Responder {
    let (project_id, _) = match require_admin(&req) {
        Ok(identity) => identity,
        Err(response) => return response,
    };

    match environment::list(&data.db, project_id).await {
        Ok(environments) => HttpResponse::Ok().json(environments),
        Err(err) => error::http_error(&err),
    }
}

/// POST /api/v1/environments
///
/// Materializes a disabled overlay for every existing flag of the
/// project.
#[post("")]
pub async fn create_environment(
    req: HttpRequest,
    data: web::Data<AppState>,
    body: web::Json<EnvironmentCreateParam>,
) -> impl Responder {
    let (project_id, actor) = match require_admin(&req) {
        Ok(identity) => identity,
        Err(response) => return response,
    };

    match environment::create(
        &data.db,
        project_id,
        actor.as_deref(),
        &body.key,
        &body.name,
        body.production_flag,
    )
    .await
    {
        Ok(created) => {
            info!(environment_key = %created.key, "environment created");
            HttpResponse::Ok().json(created)
        }
        Err(err) => error::http_error(&err),
    }
}
