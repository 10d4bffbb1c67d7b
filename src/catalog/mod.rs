//! Stage catalog: the static, ordered script the conversation walks through.
//!
//! Stages are plain data: scripted intro lines, an optional option menu,
//! optional free-text questions, optional side content and a default
//! successor. The catalog is validated once when it is built.

pub mod model;
pub mod stages;

pub use model::{
    Animation, Capture, Catalog, ConfigDownload, LineKind, Question, ScriptLine, SideContent,
    Stage, StageOption,
};
pub use stages::builtin_stages;
