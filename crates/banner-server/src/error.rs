// Error handling for the HTTP surface
// Admin endpoints return the resource JSON directly on success; failures
// carry a typed envelope `{error, message}` where `error` is a
// machine-readable tag derived from the domain error enum. The decision
// path never uses this module: transient failures there collapse to a
// disabled decision with reason `error`.

use actix_web::{http::StatusCode, HttpResponse, HttpResponseBuilder};
use banner_common::BannerError;
use serde::Serialize;
use tracing::warn;

/// Machine-readable tag of a failed admin request.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ApiErrorKind {
    InvalidParameter,
    Unauthorized,
    NotFound,
    Conflict,
    BackendUnavailable,
    Internal,
}

impl ApiErrorKind {
    fn status(self) -> StatusCode {
        match self {
            ApiErrorKind::InvalidParameter => StatusCode::BAD_REQUEST,
            ApiErrorKind::Unauthorized => StatusCode::UNAUTHORIZED,
            ApiErrorKind::NotFound => StatusCode::NOT_FOUND,
            ApiErrorKind::Conflict => StatusCode::CONFLICT,
            ApiErrorKind::BackendUnavailable => StatusCode::SERVICE_UNAVAILABLE,
            ApiErrorKind::Internal => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl From<&BannerError> for ApiErrorKind {
    fn from(err: &BannerError) -> Self {
        match err {
            BannerError::NotFound(_) => ApiErrorKind::NotFound,
            BannerError::Conflict(_) => ApiErrorKind::Conflict,
            BannerError::Validation(_) => ApiErrorKind::InvalidParameter,
            BannerError::Unauthorized => ApiErrorKind::Unauthorized,
            BannerError::Transient(_) => ApiErrorKind::BackendUnavailable,
        }
    }
}

/// Failure envelope for admin responses.
#[derive(Debug, Serialize)]
pub struct ApiError {
    pub error: ApiErrorKind,
    pub message: String,
}

impl ApiError {
    pub fn new(error: ApiErrorKind, message: impl Into<String>) -> Self {
        ApiError {
            error,
            message: message.into(),
        }
    }

    pub fn to_response(&self) -> HttpResponse {
        HttpResponseBuilder::new(self.error.status()).json(self)
    }
}

/// Render a service-layer error as an admin HTTP response.
///
/// Typed domain errors map to their statuses; anything else is a 500.
pub fn http_error(err: &anyhow::Error) -> HttpResponse {
    if let Some(domain) = err.downcast_ref::<BannerError>() {
        return ApiError::new(ApiErrorKind::from(domain), domain.to_string()).to_response();
    }

    warn!(error = %err, "unhandled service error");
    ApiError::new(ApiErrorKind::Internal, err.to_string()).to_response()
}

/// 400 response for a request the handler rejected before the store.
pub fn bad_request(message: impl Into<String>) -> HttpResponse {
    ApiError::new(ApiErrorKind::InvalidParameter, message).to_response()
}

/// 401 response for endpoints that could not resolve a credential.
pub fn unauthorized() -> HttpResponse {
    ApiError::new(
        ApiErrorKind::Unauthorized,
        BannerError::Unauthorized.to_string(),
    )
    .to_response()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_domain_errors_map_to_statuses() {
        let cases = [
            (anyhow::Error::new(BannerError::not_found("flag", "x")), 404),
            (anyhow::Error::new(BannerError::conflict("dup")), 409),
            (anyhow::Error::new(BannerError::validation("bad")), 400),
            (anyhow::Error::new(BannerError::Unauthorized), 401),
            (
                anyhow::Error::new(BannerError::Transient("db down".into())),
                503,
            ),
        ];
        for (err, status) in cases {
            assert_eq!(http_error(&err).status().as_u16(), status);
        }
    }

    #[test]
    fn test_unknown_error_is_500() {
        let err = anyhow::anyhow!("boom");
        assert_eq!(http_error(&err).status().as_u16(), 500);
    }

    #[test]
    fn test_failure_envelope_shape() {
        let envelope = ApiError::new(ApiErrorKind::NotFound, "flag 'x' not found");
        let json = serde_json::to_value(&envelope).unwrap();
        assert_eq!(json["error"], "not_found");
        assert_eq!(json["message"], "flag 'x' not found");
        assert_eq!(json.as_object().unwrap().len(), 2);
    }

    #[test]
    fn test_helper_statuses() {
        assert_eq!(bad_request("nope").status().as_u16(), 400);
        assert_eq!(unauthorized().status().as_u16(), 401);
    }
}
