// Authentication middleware
// Resolves the request credential into an already-authenticated
// (project, actor) tuple before handlers run. Credential issuance and the
// identity of actors are external concerns; this layer only resolves
// opaque credentials against the store, with a short-lived cache in front.

use std::rc::Rc;
use std::sync::LazyLock;
use std::time::Duration;

use actix_service::forward_ready;
use actix_utils::future::{ok, Ready};
use actix_web::{
    dev::{Service, ServiceRequest, ServiceResponse, Transform},
    http::Method,
    web::Data,
    Error, HttpMessage, HttpRequest,
};
use futures::future::LocalBoxFuture;
use moka::sync::Cache;
use uuid::Uuid;

use crate::model::AppState;

const SDK_KEY_HEADER: &str = "X-SDK-Key";
const AUTHORIZATION_HEADER: &str = "Authorization";
const ACTOR_HEADER: &str = "X-Actor";
const BEARER_PREFIX: &str = "Bearer ";

/// Resolved identity of a request.
#[derive(Clone, Debug, Default)]
pub struct AuthContext {
    pub project_id: Option<Uuid>,
    /// Operator identity forwarded by the authentication layer; absent on
    /// SDK traffic.
    pub actor: Option<String>,
    /// True when the credential was a project SDK key.
    pub sdk: bool,
}

#[derive(Clone, Copy)]
struct ResolvedCredential {
    project_id: Uuid,
    sdk: bool,
}

/// Credential cache so hot decision paths do not hit the store per
/// request. Entries expire quickly; credential revocation takes at most
/// the TTL to propagate.
static CREDENTIAL_CACHE: LazyLock<Cache<String, ResolvedCredential>> = LazyLock::new(|| {
    Cache::builder()
        .max_capacity(10_000)
        .time_to_live(Duration::from_secs(60))
        .build()
});

/// Read the AuthContext a handler's request was annotated with.
pub fn auth_context(req: &HttpRequest) -> AuthContext {
    req.extensions().get::<AuthContext>().cloned().unwrap_or_default()
}

fn header_value(req: &ServiceRequest, name: &str) -> Option<String> {
    req.headers()
        .get(name)
        .and_then(|value| value.to_str().ok())
        .map(str::trim)
        .filter(|value| !value.is_empty())
        .map(str::to_string)
}

fn bearer_token(req: &ServiceRequest) -> Option<String> {
    header_value(req, AUTHORIZATION_HEADER)
        .and_then(|value| value.strip_prefix(BEARER_PREFIX).map(str::to_string))
        .map(|token| token.trim().to_string())
        .filter(|token| !token.is_empty())
}

async fn resolve(state: &AppState, req: &ServiceRequest) -> AuthContext {
    let (credential, sdk) = match header_value(req, SDK_KEY_HEADER) {
        Some(key) => (key, true),
        None => match bearer_token(req) {
            Some(token) => (token, false),
            None => return AuthContext::default(),
        },
    };

    if let Some(cached) = CREDENTIAL_CACHE.get(&credential) {
        return AuthContext {
            project_id: Some(cached.project_id),
            actor: header_value(req, ACTOR_HEADER).filter(|_| !cached.sdk),
            sdk: cached.sdk,
        };
    }

    let lookup = if sdk {
        banner_persistence::service::project::find_by_sdk_key(&state.db, &credential).await
    } else {
        banner_persistence::service::project::find_by_admin_token(&state.db, &credential).await
    };

    match lookup {
        Ok(Some(project)) => {
            CREDENTIAL_CACHE.insert(
                credential,
                ResolvedCredential {
                    project_id: project.id,
                    sdk,
                },
            );
            AuthContext {
                project_id: Some(project.id),
                actor: header_value(req, ACTOR_HEADER).filter(|_| !sdk),
                sdk,
            }
        }
        Ok(None) => AuthContext::default(),
        Err(err) => {
            tracing::warn!(error = %err, "credential lookup failed");
            AuthContext::default()
        }
    }
}

// Authentication middleware transformer
pub struct Authentication;

impl<S, B> Transform<S, ServiceRequest> for Authentication
where
    S: Service<ServiceRequest, Response = ServiceResponse<B>, Error = Error> + 'static,
    S::Future: 'static,
    B: 'static,
{
    type Response = ServiceResponse<B>;
    type Error = Error;
    type InitError = ();
    type Transform = AuthenticationMiddleware<S>;
    type Future = Ready<Result<Self::Transform, Self::InitError>>;

    fn new_transform(&self, service: S) -> Self::Future {
        ok(AuthenticationMiddleware {
            service: Rc::new(service),
        })
    }
}

pub struct AuthenticationMiddleware<S> {
    service: Rc<S>,
}

impl<S, B> Service<ServiceRequest> for AuthenticationMiddleware<S>
where
    S: Service<ServiceRequest, Response = ServiceResponse<B>, Error = Error> + 'static,
    S::Future: 'static,
    B: 'static,
{
    type Response = ServiceResponse<B>;
    type Error = Error;
    type Future = LocalBoxFuture<'static, Result<Self::Response, Self::Error>>;

    forward_ready!(service);

    fn call(&self, req: ServiceRequest) -> Self::Future {
        let service = Rc::clone(&self.service);

        Box::pin(async move {
            if Method::OPTIONS != *req.method() {
                let context = match req.app_data::<Data<AppState>>() {
                    Some(state) => resolve(state, &req).await,
                    None => {
                        tracing::error!("AppState not found in request app_data");
                        AuthContext::default()
                    }
                };
                req.extensions_mut().insert(context);
            }

            service.call(req).await
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_header_constants() {
        assert_eq!(SDK_KEY_HEADER, "X-SDK-Key");
        assert_eq!(AUTHORIZATION_HEADER, "Authorization");
        assert_eq!(BEARER_PREFIX, "Bearer ");
    }

    #[test]
    fn test_default_context_is_unauthenticated() {
        let context = AuthContext::default();
        assert!(context.project_id.is_none());
        assert!(context.actor.is_none());
        assert!(!context.sdk);
    }
}
