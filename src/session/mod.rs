//! Live sessions: the surface the presentation layer drives.

pub mod chat;
pub mod manager;
pub mod model;

pub use chat::Session;
pub use manager::SessionManager;
pub use model::{ClientAction, SessionEvent, SessionSnapshot};
