//! Administrative CRUD surface
//!
//! Bearer-authenticated, project-scoped operator endpoints. Every write
//! goes through the config store (domain row + audit row + outbox rows in
//! one transaction) and drains the outbox inline afterwards, so the next
//! decision on this process observes the change.

pub mod environments;
pub mod flags;
pub mod segments;

use actix_web::{HttpRequest, HttpResponse};
use uuid::Uuid;

use crate::error;
use crate::middleware::auth::auth_context;

/// Resolve the admin identity or produce the 401 response.
///
/// SDK credentials are not valid on the admin surface.
pub(crate) fn require_admin(req: &HttpRequest) -> Result<(Uuid, Option<String>), HttpResponse> {
    let context = auth_context(req);
    match context.project_id {
        Some(project_id) if !context.sdk => Ok((project_id, context.actor)),
        _ => Err(error::unauthorized()),
    }
}
