mod concept;
mod ids;
mod progress;
mod session;
mod turn;

pub use ids::{ConceptId, ParseIdError, SessionId, UserId};

pub use concept::{Concept, ConceptError, ConceptKey, Difficulty, Question};
pub use progress::{MAX_ANSWER_GAP_SECS, Progress};
pub use session::{Session, SessionError, SessionState};
pub use turn::{Speaker, Turn, TurnKind, TurnParseError};
