//! Conversation state and the stage progression engine.

pub mod engine;
pub mod quote;
pub mod script;
pub mod state;

pub use engine::{
    COMPLETION_MESSAGE, Effect, FlowOutcome, Notification, NotificationLevel, StageEngine,
    TRACKING_ERROR_MESSAGE, Turn,
};
pub use quote::{QuoteContext, QuoteSummary};
pub use script::{ScriptStep, entry_sequence};
pub use state::{Author, ConversationState, Message};
