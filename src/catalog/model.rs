//! Stage catalog data model.
//!
//! A catalog is an ordered, validated table of [`Stage`]s. It is built once at
//! startup and never mutated; every stage reference inside it is checked when
//! the catalog is constructed, so lookups at runtime only fail when a
//! conversation state refers to a stage from some other catalog.

use std::collections::{HashMap, HashSet};
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::CatalogError;

/// Presentation hint for a scripted line. The engine treats both the same.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LineKind {
    Voice,
    #[default]
    Chat,
}

/// One scripted utterance shown when a stage is entered.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScriptLine {
    #[serde(default)]
    pub kind: LineKind,
    pub text: String,
}

impl ScriptLine {
    pub fn chat(text: impl Into<String>) -> Self {
        Self {
            kind: LineKind::Chat,
            text: text.into(),
        }
    }

    pub fn voice(text: impl Into<String>) -> Self {
        Self {
            kind: LineKind::Voice,
            text: text.into(),
        }
    }
}

/// A user-selectable choice that jumps to another stage.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StageOption {
    pub label: String,
    /// Target stage id.
    #[serde(alias = "on_option_select")]
    pub target: String,
}

/// A free-text prompt within a stage.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Question {
    /// Key under which the answer is recorded.
    pub id: String,
    pub text: String,
    /// Shown when this question becomes current after a previous answer.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub response: Option<String>,
}

impl Question {
    pub fn new(id: impl Into<String>, text: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            text: text.into(),
            response: None,
        }
    }

    pub fn with_response(mut self, response: impl Into<String>) -> Self {
        self.response = Some(response.into());
        self
    }

    /// Text to show when this question is asked after a prior answer.
    pub fn prompt(&self) -> &str {
        self.response.as_deref().unwrap_or(&self.text)
    }
}

/// A decorative "feed" of lines followed by a single follow-up utterance.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Animation {
    pub feed: Vec<String>,
    pub follow_up: String,
}

/// A downloadable configuration file offered to the user.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConfigDownload {
    pub label: String,
    pub file: String,
}

/// Optional extra material emitted as a timed sequence on stage entry.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SideContent {
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub checklist: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub animation: Option<Animation>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub integration_prompts: Vec<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub downloads: Vec<ConfigDownload>,
}

impl SideContent {
    pub fn is_empty(&self) -> bool {
        self.checklist.is_empty()
            && self.animation.is_none()
            && self.integration_prompts.is_empty()
            && self.downloads.is_empty()
    }
}

/// Which structured value a stage collects through stage-gated extractors.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Capture {
    Amount,
    Country,
    Confirm,
}

impl std::fmt::Display for Capture {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Amount => write!(f, "amount"),
            Self::Country => write!(f, "country"),
            Self::Confirm => write!(f, "confirm"),
        }
    }
}

/// One step of the scripted conversation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Stage {
    pub id: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub lines: Vec<ScriptLine>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub options: Vec<StageOption>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub questions: Vec<Question>,
    #[serde(default, skip_serializing_if = "SideContent::is_empty")]
    pub side: SideContent,
    /// Default successor when there are no options and questions are exhausted.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub next: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub capture: Option<Capture>,
}

impl Stage {
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            lines: Vec::new(),
            options: Vec::new(),
            questions: Vec::new(),
            side: SideContent::default(),
            next: None,
            capture: None,
        }
    }

    pub fn line(mut self, line: ScriptLine) -> Self {
        self.lines.push(line);
        self
    }

    pub fn option(mut self, label: impl Into<String>, target: impl Into<String>) -> Self {
        self.options.push(StageOption {
            label: label.into(),
            target: target.into(),
        });
        self
    }

    pub fn question(mut self, question: Question) -> Self {
        self.questions.push(question);
        self
    }

    pub fn side(mut self, side: SideContent) -> Self {
        self.side = side;
        self
    }

    pub fn next(mut self, next: impl Into<String>) -> Self {
        self.next = Some(next.into());
        self
    }

    pub fn capture(mut self, capture: Capture) -> Self {
        self.capture = Some(capture);
        self
    }

    /// No successor, no options, no questions: reaching it ends the script.
    pub fn is_terminal(&self) -> bool {
        self.next.is_none() && self.options.is_empty() && self.questions.is_empty()
    }

    /// Find an option by label, ignoring case and surrounding whitespace.
    pub fn find_option(&self, label: &str) -> Option<&StageOption> {
        let wanted = label.trim();
        self.options
            .iter()
            .find(|o| o.label.eq_ignore_ascii_case(wanted))
    }

    /// Comma-separated option labels, for re-prompting.
    pub fn option_labels(&self) -> String {
        self.options
            .iter()
            .map(|o| o.label.as_str())
            .collect::<Vec<_>>()
            .join(", ")
    }

    /// The stage's intro lines joined into one chat message.
    pub fn intro(&self) -> String {
        self.lines
            .iter()
            .map(|l| l.text.as_str())
            .collect::<Vec<_>>()
            .join("\n\n")
    }
}

/// Ordered, validated stage table.
#[derive(Debug, Clone)]
pub struct Catalog {
    stages: Vec<Stage>,
    index: HashMap<String, usize>,
}

impl Catalog {
    /// Build a catalog, rejecting malformed or dangling entries.
    pub fn new(stages: Vec<Stage>) -> Result<Self, CatalogError> {
        if stages.is_empty() {
            return Err(CatalogError::Empty);
        }

        let mut index = HashMap::with_capacity(stages.len());
        for (i, stage) in stages.iter().enumerate() {
            if stage.id.trim().is_empty() {
                return Err(CatalogError::Malformed {
                    stage: format!("#{i}"),
                    reason: "empty stage id".to_string(),
                });
            }
            if index.insert(stage.id.clone(), i).is_some() {
                return Err(CatalogError::DuplicateStage(stage.id.clone()));
            }
        }

        let mut question_ids = HashSet::new();
        for stage in &stages {
            let targets = stage
                .next
                .iter()
                .chain(stage.options.iter().map(|o| &o.target));
            for target in targets {
                if !index.contains_key(target) {
                    return Err(CatalogError::DanglingReference {
                        stage: stage.id.clone(),
                        target: target.clone(),
                    });
                }
            }

            for question in &stage.questions {
                if !question_ids.insert(question.id.as_str()) {
                    return Err(CatalogError::Malformed {
                        stage: stage.id.clone(),
                        reason: format!("question id {:?} is used more than once", question.id),
                    });
                }
            }

            if let Some(capture) = stage.capture {
                if stage.questions.len() != 1 {
                    return Err(CatalogError::Malformed {
                        stage: stage.id.clone(),
                        reason: format!("{capture} stage must have exactly one question"),
                    });
                }
            }
        }

        Ok(Self { stages, index })
    }

    /// Parse a JSON array of stages and validate it.
    pub fn from_json(json: &str) -> Result<Self, CatalogError> {
        let stages: Vec<Stage> = serde_json::from_str(json)?;
        Self::new(stages)
    }

    /// Load and validate a JSON catalog file.
    pub fn from_path(path: &Path) -> Result<Self, CatalogError> {
        let raw = std::fs::read_to_string(path)?;
        Self::from_json(&raw)
    }

    /// Skip validation. Only used to exercise the engine's recovery path.
    #[cfg(test)]
    pub(crate) fn unchecked(stages: Vec<Stage>) -> Self {
        let index = stages
            .iter()
            .enumerate()
            .map(|(i, s)| (s.id.clone(), i))
            .collect();
        Self { stages, index }
    }

    /// The first stage; every session starts here.
    pub fn initial(&self) -> &Stage {
        &self.stages[0]
    }

    pub fn get(&self, id: &str) -> Option<&Stage> {
        self.index.get(id).map(|&i| &self.stages[i])
    }

    pub fn contains(&self, id: &str) -> bool {
        self.index.contains_key(id)
    }

    /// The stage to enter once `stage` is exhausted: its `next`, otherwise the
    /// following catalog entry. `None` when the script has run out.
    pub fn successor(&self, stage: &Stage) -> Option<&Stage> {
        match stage.next {
            Some(ref next) => self.get(next),
            None => {
                let position = *self.index.get(&stage.id)?;
                self.stages.get(position + 1)
            }
        }
    }

    /// First stage collecting the given capture, if any.
    pub fn find_capture(&self, capture: Capture) -> Option<&Stage> {
        self.stages.iter().find(|s| s.capture == Some(capture))
    }

    pub fn stages(&self) -> &[Stage] {
        &self.stages
    }

    pub fn len(&self) -> usize {
        self.stages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.stages.is_empty()
    }
}
