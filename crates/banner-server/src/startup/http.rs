//! HTTP server assembly

use std::sync::Arc;

use actix_web::{dev::Server, middleware::Logger, web, App, HttpServer};

use crate::api;
use crate::middleware::auth::Authentication;
use crate::model::AppState;

/// Create and bind the HTTP server carrying every public surface:
/// decisions, SDK endpoints, the subscribe stream, and admin CRUD.
pub fn http_server(
    app_state: Arc<AppState>,
    address: String,
    port: u16,
) -> Result<Server, std::io::Error> {
    Ok(HttpServer::new(move || {
        App::new()
            .wrap(Logger::default())
            .wrap(Authentication)
            .app_data(web::Data::from(app_state.clone()))
            .service(api::routes())
            .service(api::sdk::routes())
            .service(api::health::health)
    })
    .bind((address, port))?
    .run())
}
