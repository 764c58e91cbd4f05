use axum::{Json, http::StatusCode};
use thiserror::Error;

use crate::{config::ConfigError, dataset::DatasetError, engine::EngineError, models::ApiError};

#[derive(Debug, Error)]
pub enum AppError {
    #[error("routing engine error: {0}")]
    Engine(#[from] EngineError),
    #[error(transparent)]
    Dataset(#[from] DatasetError),
    #[error("configuration error: {0}")]
    Config(#[from] ConfigError),
    #[error("graph has {count} nodes, at most {max} are accepted")]
    TooManyNodes { count: usize, max: usize },
    #[error("server I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl AppError {
    pub fn status_code(&self) -> StatusCode {
        match self {
            AppError::Engine(EngineError::UnknownNode { .. }) => StatusCode::NOT_FOUND,
            AppError::TooManyNodes { .. } => StatusCode::BAD_REQUEST,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

pub fn api_error(err: impl Into<AppError>) -> (StatusCode, Json<ApiError>) {
    let err = err.into();
    let status = err.status_code();
    if status.is_server_error() {
        tracing::error!("{err}");
    } else {
        tracing::debug!("rejected request: {err}");
    }
    (
        status,
        Json(ApiError {
            message: err.to_string(),
        }),
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::NodeRole;

    #[test]
    fn unknown_node_maps_to_not_found() {
        let (status, Json(body)) = api_error(EngineError::UnknownNode {
            role: NodeRole::Source,
            id: 99,
        });
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert!(body.message.contains("source node 99"));
    }

    #[test]
    fn dataset_errors_are_internal() {
        let err = AppError::from(DatasetError::EmptyDataset);
        assert_eq!(err.status_code(), StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(err.to_string(), "dataset contains no nodes");
    }

    #[test]
    fn oversized_graph_is_bad_request() {
        let (status, Json(body)) = api_error(AppError::TooManyNodes { count: 6000, max: 5000 });
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body.message, "graph has 6000 nodes, at most 5000 are accepted");
    }
}
