//! Shared error types for the services crate.

use thiserror::Error;

use storage::flatfile::FlatFileInitError;
use storage::repository::StorageError;
use tutor_core::model::SessionState;

use crate::concept_graph::ConceptGraphError;

/// Input rejected at the boundary, before any Turn is written.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum ValidationError {
    #[error("answer text cannot be empty")]
    EmptyAnswer,

    #[error("user id cannot be empty")]
    EmptyUserId,
}

/// Errors emitted by `SessionEngine`.
///
/// Only `NotFound`, `InvalidState`, `InvalidBinding`, and `Validation`
/// concern a caller; `Storage` is an internal failure of the active backend.
/// Collaborator failures never appear here at all: the engine absorbs them
/// behind the static fallbacks.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum EngineError {
    #[error("session or concept not found")]
    NotFound,

    #[error("operation not valid while session is {state}")]
    InvalidState { state: SessionState },

    #[error("session concept binding is unusable: {0}")]
    InvalidBinding(String),

    #[error(transparent)]
    Validation(#[from] ValidationError),

    #[error(transparent)]
    Storage(StorageError),
}

impl From<StorageError> for EngineError {
    fn from(err: StorageError) -> Self {
        match err {
            StorageError::NotFound => Self::NotFound,
            other => Self::Storage(other),
        }
    }
}

/// Errors emitted by the text-generation collaborator.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum GenerationError {
    #[error("text generation is not configured")]
    Disabled,

    #[error("generator returned an empty response")]
    EmptyResponse,

    #[error("generator request failed with status {0}")]
    HttpStatus(reqwest::StatusCode),

    #[error("generator response could not be parsed: {0}")]
    Parse(String),

    #[error(transparent)]
    Http(#[from] reqwest::Error),
}

/// Errors emitted while bootstrapping app services.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum AppServicesError {
    #[error(transparent)]
    FlatFile(#[from] FlatFileInitError),

    #[error(transparent)]
    Storage(#[from] StorageError),

    #[error(transparent)]
    ConceptGraph(#[from] ConceptGraphError),
}
