// [apps/server/src/errors.rs]
/*!
 * =================================================================
 * APARATO: UMBRELLA API ERROR (V1.0 - FLEET EDITION)
 * CLASIFICACIÓN: ERROR STRATUM (ESTRATO L3)
 * RESPONSABILIDAD: TRADUCCIÓN DE FALLOS DE DOMINIO A RESPUESTAS HTTP
 *
 * VISION HIPER-HOLÍSTICA:
 * Un único punto de traducción entre los errores tipados de cada
 * subsistema (cripto, coordinación, almacén de datos) y el contrato
 * JSON `{error, request_id}` que ve el llamador. Los handlers
 * propagan con `?`; nadie hace `match` sobre el error de otro crate.
 * =================================================================
 */

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use fleetops_coordination::CoordinationError;
use fleetops_crypto::CryptoError;
use serde::Serialize;
use uuid::Uuid;

#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    #[error("authentication required or invalid")]
    Auth,
    #[error("csrf token mismatch")]
    Csrf,
    #[error("not found: {0}")]
    NotFound(String),
    #[error("bad request: {0}")]
    BadRequest(String),
    #[error("conflict: {0}")]
    Conflict(String),
    #[error("rate limited")]
    RateLimited,
    #[error("coordination backend unavailable: {0}")]
    BackendUnavailable(String),
    #[error("internal error")]
    Internal(#[from] anyhow::Error),
}

impl ApiError {
    fn kind(&self) -> &'static str {
        match self {
            ApiError::Auth => "AuthError",
            ApiError::Csrf => "CsrfError",
            ApiError::NotFound(_) => "NotFound",
            ApiError::BadRequest(_) => "BadRequest",
            ApiError::Conflict(_) => "Conflict",
            ApiError::RateLimited => "RateLimited",
            ApiError::BackendUnavailable(_) => "BackendUnavailable",
            ApiError::Internal(_) => "Internal",
        }
    }

    fn status(&self) -> StatusCode {
        match self {
            ApiError::Auth => StatusCode::UNAUTHORIZED,
            ApiError::Csrf => StatusCode::FORBIDDEN,
            ApiError::NotFound(_) => StatusCode::NOT_FOUND,
            ApiError::BadRequest(_) => StatusCode::BAD_REQUEST,
            ApiError::Conflict(_) => StatusCode::CONFLICT,
            ApiError::RateLimited => StatusCode::TOO_MANY_REQUESTS,
            ApiError::BackendUnavailable(_) => StatusCode::SERVICE_UNAVAILABLE,
            ApiError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

#[derive(Serialize)]
struct ErrorBody {
    error: &'static str,
    request_id: String,
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let request_id = Uuid::new_v4().to_string();
        let status = self.status();

        if matches!(self, ApiError::Internal(_)) {
            tracing::error!(request_id = %request_id, error = %self, "internal error surfaced to caller");
        } else {
            tracing::info!(request_id = %request_id, kind = self.kind(), error = %self, "request rejected");
        }

        (status, Json(ErrorBody { error: self.kind(), request_id })).into_response()
    }
}

impl From<CryptoError> for ApiError {
    fn from(source: CryptoError) -> Self {
        ApiError::BadRequest(source.to_string())
    }
}

impl From<CoordinationError> for ApiError {
    fn from(source: CoordinationError) -> Self {
        match source {
            CoordinationError::Unavailable(_) | CoordinationError::Io(_) => {
                ApiError::BackendUnavailable(source.to_string())
            }
            CoordinationError::LockContended => ApiError::BackendUnavailable(source.to_string()),
            CoordinationError::Serialization(_) => ApiError::Internal(anyhow::anyhow!(source)),
        }
    }
}

impl From<crate::state::store::StoreError> for ApiError {
    fn from(source: crate::state::store::StoreError) -> Self {
        use crate::state::store::StoreError;
        match source {
            StoreError::UnknownMachine(id) => ApiError::NotFound(id),
            StoreError::BadCommand(id) => ApiError::NotFound(id),
            StoreError::ResultTooLarge => ApiError::BadRequest(source.to_string()),
        }
    }
}

impl From<crate::state::cluster::ClusterError> for ApiError {
    fn from(source: crate::state::cluster::ClusterError) -> Self {
        use crate::state::cluster::ClusterError;
        match source {
            ClusterError::Coordination(inner) => inner.into(),
            ClusterError::NodeIdCollision(_) => ApiError::Internal(anyhow::anyhow!(source)),
        }
    }
}

impl From<crate::state::session::SessionError> for ApiError {
    fn from(source: crate::state::session::SessionError) -> Self {
        use crate::state::session::SessionError;
        match source {
            SessionError::Coordination(inner) => inner.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn auth_error_maps_to_401() {
        assert_eq!(ApiError::Auth.status(), StatusCode::UNAUTHORIZED);
        assert_eq!(ApiError::Auth.kind(), "AuthError");
    }

    #[test]
    fn rate_limited_maps_to_429() {
        assert_eq!(ApiError::RateLimited.status(), StatusCode::TOO_MANY_REQUESTS);
    }
}
