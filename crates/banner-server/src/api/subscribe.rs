//! Subscribe stream
//!
//! Long-lived server-sent-events channel delivering change-bus frames for
//! the authenticated project. Delivery is at-least-once with no replay: a
//! subscriber that disconnects misses events and must re-bootstrap via the
//! SDK bootstrap endpoint on reconnect.

use std::convert::Infallible;
use std::time::Duration;

use actix_web::web::Bytes;
use actix_web::{get, web, HttpRequest, HttpResponse, Responder};
use tokio::sync::broadcast;
use tracing::debug;

use crate::error;
use crate::middleware::auth::auth_context;
use crate::model::AppState;

const HEARTBEAT_INTERVAL: Duration = Duration::from_secs(30);

fn frame(event: &str, data: &str) -> Bytes {
    Bytes::from(format!("event: {}\ndata: {}\n\n", event, data))
}

/// GET /api/v1/subscribe
#[get("/subscribe")]
pub async fn subscribe(req: HttpRequest, data: web::Data<AppState>) -> impl Responder {
    let Some(project_id) = auth_context(&req).project_id else {
        return error::unauthorized();
    };

    let mut rx = data.bus.subscribe();
    debug!(%project_id, "change-stream subscriber connected");

    let stream = async_stream::stream! {
        yield Ok::<_, Infallible>(frame("connected", "{}"));

        loop {
            tokio::select! {
                result = rx.recv() => match result {
                    Ok(event) => {
                        if event.project_id != project_id {
                            continue;
                        }
                        match serde_json::to_string(&event) {
                            Ok(payload) => yield Ok(frame("change", &payload)),
                            Err(_) => continue,
                        }
                    }
                    Err(broadcast::error::RecvError::Lagged(missed)) => {
                        // The subscriber fell behind and lost events; tell
                        // it to re-bootstrap.
                        let payload = format!("{{\"missed\":{}}}", missed);
                        yield Ok(frame("lagged", &payload));
                    }
                    Err(broadcast::error::RecvError::Closed) => break,
                },
                _ = tokio::time::sleep(HEARTBEAT_INTERVAL) => {
                    yield Ok(frame("heartbeat", "{}"));
                }
            }
        }
    };

    HttpResponse::Ok()
        .content_type("text/event-stream")
        .insert_header(("Cache-Control", "no-cache"))
        .streaming(stream)
}
