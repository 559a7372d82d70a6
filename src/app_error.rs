use std::collections::BTreeMap;

use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use utoipa::ToSchema;

use crate::aliases::DieselError;

/// Envelope used by every endpoint of the service.
#[derive(Serialize, Deserialize, Debug, ToSchema)]
pub struct StdResponse<T, M> {
    pub data: Option<T>,
    pub message: Option<M>,
}

impl<T: Serialize, M: Serialize> IntoResponse for StdResponse<T, M> {
    fn into_response(self) -> Response {
        Json(self).into_response()
    }
}

#[derive(Error, Debug)]
pub enum AppError {
    #[error("Resource not found")]
    NotFound,

    #[error("Missing or invalid credentials")]
    Unauthorized,

    #[error("{0}")]
    ForbiddenResource(String),

    #[error("{0}")]
    BadRequest(String),

    #[error("Validation failed")]
    Validation(BTreeMap<String, String>),

    #[error("{0} is unreachable")]
    ServiceUnreachable(String),

    #[error(transparent)]
    Other(anyhow::Error),
}

// Errors raised as `AppError` and passed through `anyhow` keep their status.
impl From<anyhow::Error> for AppError {
    fn from(err: anyhow::Error) -> Self {
        match err.downcast::<AppError>() {
            Ok(app_error) => app_error,
            Err(err) => AppError::Other(err),
        }
    }
}

impl From<DieselError> for AppError {
    fn from(err: DieselError) -> Self {
        match err {
            DieselError::NotFound => AppError::NotFound,
            _ => AppError::Other(err.into()),
        }
    }
}

impl AppError {
    pub fn status_code(&self) -> StatusCode {
        match self {
            AppError::NotFound => StatusCode::NOT_FOUND,
            AppError::Unauthorized => StatusCode::UNAUTHORIZED,
            AppError::ForbiddenResource(_) => StatusCode::FORBIDDEN,
            AppError::BadRequest(_) => StatusCode::BAD_REQUEST,
            AppError::Validation(_) => StatusCode::UNPROCESSABLE_ENTITY,
            AppError::ServiceUnreachable(_) => StatusCode::BAD_GATEWAY,
            AppError::Other(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status_code();

        if status.is_server_error() {
            tracing::error!("{:#}", self);
        }

        let body = match self {
            AppError::Validation(errors) => StdResponse {
                data: Some(errors),
                message: Some("Validation failed".to_string()),
            },
            // Internal details stay in the logs.
            AppError::Other(_) => StdResponse {
                data: None,
                message: Some("Internal server error".to_string()),
            },
            err => StdResponse {
                data: None,
                message: Some(err.to_string()),
            },
        };

        (status, Json(body)).into_response()
    }
}
