//! HTTP API routing
//!
//! Routes:
//! - GET  /api/v1/decisions/{flag_key} - single-flag decision RPC
//! - POST /api/v1/evaluations/bulk - bulk decision over active flags
//! - GET  /api/v1/subscribe - change-bus SSE stream
//! - /api/v1/flags, /api/v1/segments, /api/v1/environments - admin CRUD
//! - GET  /sdk/bootstrap, POST /sdk/evaluate - SDK surface (X-SDK-Key)
//! - GET  /health

pub mod admin;
pub mod decisions;
pub mod health;
pub mod model;
pub mod sdk;
pub mod subscribe;

use actix_web::{web, Scope};

/// Assemble the /api/v1 scope.
pub fn routes() -> Scope {
    web::scope("/api/v1")
        .service(decisions::get_decision)
        .service(decisions::bulk_evaluate)
        .service(subscribe::subscribe)
        .service(admin::flags::routes())
        .service(admin::segments::routes())
        .service(admin::environments::routes())
}
