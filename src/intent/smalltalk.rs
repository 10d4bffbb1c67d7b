//! Canned replies for greetings, thanks and "what can you do".

use std::sync::LazyLock;

use regex::Regex;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SmallTalk {
    Greeting,
    Thanks,
    Capabilities,
}

static GREETING: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)^\s*(hi|hello|hey|hiya|howdy|good\s+(morning|afternoon|evening))\b")
        .expect("greeting regex")
});

static THANKS: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)\b(thanks|thank\s+you|thx|ty|cheers)\b").expect("thanks regex")
});

static CAPABILITIES: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)(what\s+can\s+you\s+do|how\s+can\s+you\s+help|what\s+do\s+you\s+do|\bhelp\b)")
        .expect("capabilities regex")
});

pub fn small_talk(text: &str) -> Option<SmallTalk> {
    if GREETING.is_match(text) {
        Some(SmallTalk::Greeting)
    } else if THANKS.is_match(text) {
        Some(SmallTalk::Thanks)
    } else if CAPABILITIES.is_match(text) {
        Some(SmallTalk::Capabilities)
    } else {
        None
    }
}

impl SmallTalk {
    pub fn reply(&self) -> &'static str {
        match self {
            Self::Greeting => "Hello! Happy to help. Ask me about rates, supported countries, or carry on where we left off.",
            Self::Thanks => "You're welcome! Anything else I can help with?",
            Self::Capabilities => {
                "I can onboard your business onto the Remit API, quote live exchange rates \
                 (try \"USD to INR\"), tell you which countries we pay out to, and walk you \
                 through sending a test transfer."
            }
        }
    }
}
