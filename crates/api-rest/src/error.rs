//! Mapping from domain and authentication errors to HTTP responses.

use api_shared::{AuthError, ErrorRes};
use axum::extract::rejection::JsonRejection;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use raccord_core::{ErrorKind, RaccordError};

#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    #[error(transparent)]
    Core(#[from] RaccordError),
    #[error(transparent)]
    Auth(#[from] AuthError),
    #[error("invalid request body: {}", .0.body_text())]
    Body(#[from] JsonRejection),
}

impl ApiError {
    pub fn status(&self) -> StatusCode {
        match self {
            Self::Auth(_) => StatusCode::UNAUTHORIZED,
            Self::Body(_) => StatusCode::BAD_REQUEST,
            Self::Core(err) => match err.kind() {
                ErrorKind::InvalidInput => StatusCode::BAD_REQUEST,
                ErrorKind::Unauthorized => StatusCode::FORBIDDEN,
                ErrorKind::NotFound => StatusCode::NOT_FOUND,
                ErrorKind::Conflict => StatusCode::CONFLICT,
                ErrorKind::StorageFailure => StatusCode::INTERNAL_SERVER_ERROR,
            },
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        let message = if status == StatusCode::INTERNAL_SERVER_ERROR {
            tracing::error!("request failed: {self}");
            "Internal error".to_string()
        } else {
            self.to_string()
        };
        (status, Json(ErrorRes::new(message))).into_response()
    }
}

pub type ApiResult<T> = Result<T, ApiError>;

#[cfg(test)]
mod tests {
    use super::*;
    use raccord_core::uuid::Uuid;

    #[test]
    fn each_error_kind_maps_to_one_status() {
        let id = Uuid::new_v4();
        let cases = [
            (RaccordError::InvalidStatus("VALIDE".into()), StatusCode::BAD_REQUEST),
            (RaccordError::InvalidRequestType("EAU".into()), StatusCode::BAD_REQUEST),
            (RaccordError::Unauthorized("no".into()), StatusCode::FORBIDDEN),
            (RaccordError::not_found("study dossier", id), StatusCode::NOT_FOUND),
            (RaccordError::AlreadyFinal(id), StatusCode::CONFLICT),
            (RaccordError::Conflict { id, attempts: 5 }, StatusCode::CONFLICT),
            (RaccordError::Storage("disk".into()), StatusCode::INTERNAL_SERVER_ERROR),
        ];
        for (err, status) in cases {
            assert_eq!(ApiError::from(err).status(), status);
        }
        assert_eq!(
            ApiError::from(AuthError::MissingApiKey).status(),
            StatusCode::UNAUTHORIZED
        );
    }

    #[test]
    fn body_rejections_are_bad_requests() {
        use axum::extract::rejection::MissingJsonContentType;

        let err = ApiError::from(JsonRejection::from(MissingJsonContentType::default()));
        assert_eq!(err.status(), StatusCode::BAD_REQUEST);
        assert!(err.to_string().starts_with("invalid request body"));
    }

    #[test]
    fn storage_details_are_not_leaked() {
        let response = ApiError::from(RaccordError::Storage("/var/lib/secret".into())).into_response();
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    }
}
