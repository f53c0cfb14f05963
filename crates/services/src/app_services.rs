//! Composition root: wires storage, graph, and collaborator into an engine.

use std::env;
use std::path::PathBuf;
use std::sync::Arc;

use storage::repository::Storage;
use tutor_core::Clock;

use crate::concept_graph::ConceptGraph;
use crate::error::AppServicesError;
use crate::generation::ChatGenerator;
use crate::sessions::SessionEngine;

#[derive(Clone, Debug)]
pub struct StorageConfig {
    pub database_url: String,
    pub fallback_path: PathBuf,
}

impl StorageConfig {
    /// Read storage settings from the environment, with local defaults.
    #[must_use]
    pub fn from_env() -> Self {
        let database_url =
            env::var("TUTOR_DB_URL").unwrap_or_else(|_| "sqlite:tutor.sqlite3?mode=rwc".into());
        let fallback_path = env::var("TUTOR_FALLBACK_PATH")
            .map_or_else(|_| PathBuf::from("sessions_store.json"), PathBuf::from);
        Self {
            database_url,
            fallback_path,
        }
    }
}

/// Everything an adapter needs, built once at process start.
#[derive(Clone)]
pub struct AppServices {
    pub engine: SessionEngine,
}

impl AppServices {
    /// Bootstrap from the environment: built-in concept graph, SQLite with
    /// flat-file degradation, collaborator only if configured.
    ///
    /// # Errors
    ///
    /// Returns `AppServicesError` only when the fallback store itself cannot
    /// be opened; a missing or broken relational store degrades instead.
    pub async fn bootstrap() -> Result<Self, AppServicesError> {
        Self::bootstrap_with(StorageConfig::from_env(), ConceptGraph::builtin()).await
    }

    /// Bootstrap with explicit configuration and graph.
    ///
    /// # Errors
    ///
    /// Returns `AppServicesError` when neither storage backend can be opened.
    pub async fn bootstrap_with(
        config: StorageConfig,
        graph: ConceptGraph,
    ) -> Result<Self, AppServicesError> {
        let storage = Storage::sqlite_with_flat_file_fallback(
            &config.database_url,
            &config.fallback_path,
        )
        .await?;

        let mut engine = SessionEngine::new(Clock::default_clock(), Arc::new(graph), storage);
        if let Some(generator) = ChatGenerator::from_env() {
            engine = engine.with_generator(Arc::new(generator));
        } else {
            tracing::debug!("text generation not configured, running on seed data only");
        }

        Ok(Self { engine })
    }
}
