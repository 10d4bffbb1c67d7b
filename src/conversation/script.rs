//! Scripted sequences: side content emitted with fixed offsets after a
//! stage is entered.

use std::time::Duration;

use serde::Serialize;

use crate::catalog::{LineKind, Stage};

/// Offset of the first side-content line from stage entry.
const FIRST_OFFSET: Duration = Duration::from_millis(1200);
/// Gap between consecutive side-content lines.
const STEP: Duration = Duration::from_millis(800);

/// One scheduled line, relative to stage entry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ScriptStep {
    pub delay: Duration,
    pub hint: LineKind,
    pub text: String,
}

/// Ordered (delay, text) pairs for a stage's side content: checklist,
/// animation feed and follow-up, integration prompts, config downloads.
pub fn entry_sequence(stage: &Stage) -> Vec<ScriptStep> {
    let mut lines: Vec<(LineKind, String)> = Vec::new();
    let side = &stage.side;

    if !side.checklist.is_empty() {
        let items = side
            .checklist
            .iter()
            .enumerate()
            .map(|(i, item)| format!("{}. {item}", i + 1))
            .collect::<Vec<_>>()
            .join("\n");
        lines.push((LineKind::Chat, format!("Here's your checklist:\n{items}")));
    }

    if let Some(ref animation) = side.animation {
        for feed in &animation.feed {
            lines.push((LineKind::Chat, feed.clone()));
        }
        lines.push((LineKind::Voice, animation.follow_up.clone()));
    }

    for prompt in &side.integration_prompts {
        lines.push((LineKind::Chat, format!("Integration prompt:\n{prompt}")));
    }

    if !side.downloads.is_empty() {
        let files = side
            .downloads
            .iter()
            .map(|d| format!("- {} ({})", d.label, d.file))
            .collect::<Vec<_>>()
            .join("\n");
        lines.push((LineKind::Chat, format!("Downloads:\n{files}")));
    }

    lines
        .into_iter()
        .enumerate()
        .map(|(i, (hint, text))| ScriptStep {
            delay: FIRST_OFFSET + STEP * i as u32,
            hint,
            text,
        })
        .collect()
}
