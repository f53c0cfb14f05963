#![forbid(unsafe_code)]

pub mod app_services;
pub mod concept_graph;
pub mod error;
pub mod generation;
pub mod sessions;

pub use tutor_core::Clock;

pub use app_services::{AppServices, StorageConfig};
pub use concept_graph::{ConceptGraph, ConceptGraphError};
pub use error::{AppServicesError, EngineError, GenerationError, ValidationError};
pub use generation::{ChatGenerator, GenerationConfig, TextGenerator};

pub use sessions::{
    ConceptListItem, DialogueReply, HintReply, ProgressReply, QuestionType, ReflectionReply,
    SessionEngine, StartReply, StartRequest, TurnReply, TurnRequest, TurnView,
};
