use actix_web::{http::StatusCode, HttpResponse, ResponseError};
use ledgercore::{FlowError, WorkflowError};
use serde::Serialize;
use std::fmt;

/// Error response
#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub error: String,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub details: Vec<String>,
}

/// A runtime error on its way out as an HTTP response
#[derive(Debug)]
pub struct ApiError(pub FlowError);

impl From<FlowError> for ApiError {
    fn from(error: FlowError) -> Self {
        ApiError(error)
    }
}

impl From<WorkflowError> for ApiError {
    fn from(error: WorkflowError) -> Self {
        ApiError(error.into())
    }
}

impl fmt::Display for ApiError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

impl ResponseError for ApiError {
    fn status_code(&self) -> StatusCode {
        match &self.0 {
            e if e.is_not_found() => StatusCode::NOT_FOUND,
            FlowError::Workflow(
                WorkflowError::Invalid(_)
                | WorkflowError::NodeNotFound(_)
                | WorkflowError::UnknownNodeType(_),
            ) => StatusCode::BAD_REQUEST,
            FlowError::Workflow(WorkflowError::Inactive(_)) => StatusCode::CONFLICT,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    fn error_response(&self) -> HttpResponse {
        let details = match &self.0 {
            FlowError::Workflow(WorkflowError::Invalid(errors)) => errors.clone(),
            _ => Vec::new(),
        };
        if self.status_code().is_server_error() {
            tracing::error!("{}", self.0);
        }
        HttpResponse::build(self.status_code()).json(ErrorResponse {
            error: self.0.to_string(),
            details,
        })
    }
}
