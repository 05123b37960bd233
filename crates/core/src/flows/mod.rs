pub mod engine;
pub mod keywords;
pub mod replies;
pub mod service;
pub mod session;
pub mod states;

pub use engine::{ConversationEngine, EngineSettings, TurnOutcome};
pub use keywords::{Keyword, KeywordSet};
pub use service::ConversationService;
pub use session::{ConversationId, Session, SessionStore};
pub use states::{Stage, StageKind};
