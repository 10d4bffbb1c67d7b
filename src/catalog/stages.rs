//! The built-in onboarding and money-transfer script.

use super::model::{
    Animation, Capture, Catalog, ConfigDownload, Question, ScriptLine, SideContent, Stage,
};
use crate::error::CatalogError;

pub const INIT: &str = "init";
pub const AMOUNT: &str = "amount";
pub const COUNTRY: &str = "country";
pub const CONFIRM: &str = "confirm";
pub const COMPLETED: &str = "completed";
pub const WELCOME: &str = "welcome";
pub const INFO: &str = "info";
pub const KYC: &str = "kyc";
pub const TECHNICAL: &str = "technical";
pub const ONBOARDED: &str = "onboarded";

/// Stage table shipped with the product.
pub fn builtin_stages() -> Vec<Stage> {
    vec![
        Stage::new(INIT)
            .line(ScriptLine::voice("Hi, I'm Remi, your payments API guide."))
            .line(ScriptLine::chat(
                "I can get your business onboarded onto the Remit API, or walk you \
                 through a live money transfer. What would you like to do?",
            ))
            .option("Start onboarding", WELCOME)
            .option("Send money", AMOUNT),
        Stage::new(AMOUNT)
            .capture(Capture::Amount)
            .question(Question::new(
                "transfer_amount",
                "How much would you like to send, in AED?",
            ))
            .next(COUNTRY),
        Stage::new(COUNTRY)
            .capture(Capture::Country)
            .question(Question::new(
                "transfer_country",
                "Which country is the money going to? Reply with the 2-letter country code, e.g. IN or PK.",
            ))
            .next(CONFIRM),
        Stage::new(CONFIRM)
            .capture(Capture::Confirm)
            .question(Question::new(
                "transfer_confirm",
                "Shall I go ahead with this transfer? (yes/no)",
            ))
            .next(COMPLETED),
        Stage::new(COMPLETED)
            .line(ScriptLine::chat(
                "Your transfer is on its way. I'll post status updates here as they arrive.",
            ))
            .option("Send another", AMOUNT)
            .option("Back to menu", INIT),
        Stage::new(WELCOME)
            .line(ScriptLine::voice("Welcome aboard!"))
            .line(ScriptLine::chat(
                "Onboarding takes four short steps: a few details about your business, \
                 a KYC document checklist, technical setup, and you're live.",
            ))
            .side(SideContent {
                animation: Some(Animation {
                    feed: vec![
                        "Provisioning sandbox workspace…".to_string(),
                        "Generating API client credentials…".to_string(),
                        "Registering webhook endpoints…".to_string(),
                    ],
                    follow_up: "Your sandbox is ready. Let's start with your details.".to_string(),
                }),
                ..Default::default()
            })
            .next(INFO)
            .question(Question::new(
                "ready",
                "Say anything when you're ready to begin.",
            )),
        Stage::new(INFO)
            .line(ScriptLine::chat("First, tell me a little about your business."))
            .question(Question::new("full_name", "What's your full name?"))
            .question(
                Question::new("company", "Which company are you with?")
                    .with_response("Thanks! Which company are you with?"),
            )
            .question(
                Question::new("email", "What's the best work email to reach you?")
                    .with_response("Got it. What's the best work email to reach you?"),
            )
            .question(
                Question::new(
                    "monthly_volume",
                    "Roughly how much do you expect to send per month?",
                )
                .with_response("Great. Roughly how much do you expect to send per month?"),
            )
            .next(KYC),
        Stage::new(KYC)
            .line(ScriptLine::voice("Now for compliance."))
            .line(ScriptLine::chat(
                "We need a few documents to verify your business before going live.",
            ))
            .side(SideContent {
                checklist: vec![
                    "Trade licence (valid for at least 6 months)".to_string(),
                    "Memorandum of association".to_string(),
                    "Passport copies of all shareholders above 25%".to_string(),
                    "Proof of business address (utility bill or tenancy contract)".to_string(),
                    "Bank account confirmation letter".to_string(),
                ],
                animation: Some(Animation {
                    feed: vec![
                        "Running sanctions screening…".to_string(),
                        "Checking company registry…".to_string(),
                    ],
                    follow_up: "Pre-screening passed.".to_string(),
                }),
                ..Default::default()
            })
            .question(Question::new(
                "kyc_ready",
                "Reply once you have these documents ready to upload.",
            ))
            .next(TECHNICAL),
        Stage::new(TECHNICAL)
            .line(ScriptLine::chat(
                "Last step: technical setup. Download the sandbox config and paste \
                 one of these prompts into your coding assistant to scaffold the integration.",
            ))
            .side(SideContent {
                integration_prompts: vec![
                    "Create a client that fetches an OAuth password-grant token and caches it until expiry.".to_string(),
                    "Add a function that creates a quote for AED to PKR and returns the quote_id.".to_string(),
                    "Poll enquire-transaction every 10 seconds until the status is DELIVERED, FAILED or CANCELLED.".to_string(),
                ],
                downloads: vec![
                    ConfigDownload {
                        label: "Sandbox environment".to_string(),
                        file: "remit-sandbox.env".to_string(),
                    },
                    ConfigDownload {
                        label: "Postman collection".to_string(),
                        file: "remit-api.postman_collection.json".to_string(),
                    },
                ],
                ..Default::default()
            })
            .question(Question::new(
                "stack",
                "Which language or framework will you integrate with?",
            )),
        Stage::new(ONBOARDED)
            .line(ScriptLine::voice("You're all set!"))
            .line(ScriptLine::chat(
                "Your sandbox credentials are active and our team will review your documents \
                 within one business day.",
            )),
    ]
}

impl Catalog {
    /// The product's built-in stage table.
    pub fn builtin() -> Result<Self, CatalogError> {
        Self::new(builtin_stages())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builtin_catalog_is_valid() {
        let catalog = Catalog::builtin().unwrap();
        assert_eq!(catalog.initial().id, INIT);
        assert_eq!(catalog.len(), 10);
    }

    #[test]
    fn every_reference_exists() {
        let catalog = Catalog::builtin().unwrap();
        for stage in catalog.stages() {
            if let Some(ref next) = stage.next {
                assert!(catalog.contains(next), "{} -> {}", stage.id, next);
            }
            for option in &stage.options {
                assert!(catalog.contains(&option.target), "{} -> {}", stage.id, option.target);
            }
        }
    }

    #[test]
    fn only_the_final_stage_is_terminal() {
        let catalog = Catalog::builtin().unwrap();
        let terminal: Vec<&str> = catalog
            .stages()
            .iter()
            .filter(|s| s.is_terminal())
            .map(|s| s.id.as_str())
            .collect();
        assert_eq!(terminal, vec![ONBOARDED]);
        assert_eq!(catalog.stages().last().unwrap().id, ONBOARDED);
    }

    #[test]
    fn transfer_stages_chain() {
        let catalog = Catalog::builtin().unwrap();
        let amount = catalog.find_capture(Capture::Amount).unwrap();
        assert_eq!(amount.id, AMOUNT);
        assert_eq!(catalog.successor(amount).unwrap().id, COUNTRY);
        let country = catalog.get(COUNTRY).unwrap();
        assert_eq!(catalog.successor(country).unwrap().id, CONFIRM);
        let confirm = catalog.get(CONFIRM).unwrap();
        assert_eq!(catalog.successor(confirm).unwrap().id, COMPLETED);
    }

    #[test]
    fn technical_falls_through_to_onboarded() {
        let catalog = Catalog::builtin().unwrap();
        let technical = catalog.get(TECHNICAL).unwrap();
        assert!(technical.next.is_none());
        assert_eq!(catalog.successor(technical).unwrap().id, ONBOARDED);
    }

    #[test]
    fn builtin_round_trips_through_json() {
        let json = serde_json::to_string(&builtin_stages()).unwrap();
        let reloaded = Catalog::from_json(&json).unwrap();
        assert_eq!(reloaded.len(), 10);
        assert_eq!(reloaded.get(KYC).unwrap().side.checklist.len(), 5);
    }
}
