mod dto;
mod engine;
mod locks;
mod progress;
mod reflection;

// Public API of the session subsystem.
pub use crate::error::EngineError;
pub use dto::{
    ConceptListItem, DialogueReply, HintReply, ProgressReply, QuestionType, ReflectionReply,
    StartReply, StartRequest, TurnReply, TurnRequest, TurnView,
};
pub use engine::SessionEngine;
