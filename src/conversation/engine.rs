//! StageEngine: the single authority that advances a conversation.
//!
//! Every transition is a reducer over `(ConversationState, QuoteContext)`:
//! the engine mutates both and returns a [`Turn`] describing what to say,
//! which side content to schedule and which external call, if any, the
//! session must make next. Results of those calls come back through
//! [`StageEngine::apply`].

use std::sync::Arc;

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use super::quote::{QuoteContext, QuoteSummary};
use super::script::{ScriptStep, entry_sequence};
use super::state::ConversationState;
use crate::catalog::{Capture, Catalog, Stage};
use crate::intent::{self, Country, Intent, ServiceType};

/// Reply when the script has run out.
pub const COMPLETION_MESSAGE: &str =
    "That's everything. All stages are done. Reset the chat any time to start over.";

/// Reply when the state points at a stage the catalog does not have.
pub const TRACKING_ERROR_MESSAGE: &str =
    "Sorry, I've lost track of where we were. Please restart the conversation.";

/// An external call the session must perform before the turn is finished.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Effect {
    /// `source` of `None` means the rate service's base currency.
    LookupRate {
        source: Option<String>,
        target: String,
    },
    RequestQuote {
        amount: Decimal,
        country: String,
    },
    CreateTransaction,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NotificationLevel {
    Info,
    Error,
}

/// A toast/banner for the presentation layer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Notification {
    pub level: NotificationLevel,
    pub message: String,
}

impl Notification {
    pub fn error(message: impl Into<String>) -> Self {
        Self {
            level: NotificationLevel::Error,
            message: message.into(),
        }
    }

    pub fn info(message: impl Into<String>) -> Self {
        Self {
            level: NotificationLevel::Info,
            message: message.into(),
        }
    }
}

/// Result of an external call, folded back into the conversation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FlowOutcome {
    RateQuoted {
        source: String,
        target: String,
        rate: Decimal,
    },
    RateUnavailable {
        reason: String,
    },
    Quoted(QuoteSummary),
    QuoteFailed {
        reason: String,
    },
    NoValidQuote,
    TransactionCreated {
        reference: String,
    },
    TransactionFailed {
        reason: String,
    },
    TransactionStatus {
        reference: String,
        status: String,
    },
    StatusCheckFailed {
        reference: String,
        reason: String,
    },
}

/// What one transition produced.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Turn {
    /// Immediate reply text. Empty only when `effect` is set.
    pub reply: String,
    /// Side content to emit after the reply, relative to stage entry.
    pub script: Vec<ScriptStep>,
    pub effect: Option<Effect>,
    pub notification: Option<Notification>,
    /// Transaction reference to start polling.
    pub poll: Option<String>,
    /// Set when the current stage changed.
    pub entered_stage: Option<String>,
}

impl Turn {
    fn reply(text: impl Into<String>) -> Self {
        Self {
            reply: text.into(),
            ..Default::default()
        }
    }

    fn effect(effect: Effect) -> Self {
        Self {
            effect: Some(effect),
            ..Default::default()
        }
    }

    fn with_notification(mut self, notification: Notification) -> Self {
        self.notification = Some(notification);
        self
    }

    /// Put `text` in front of the existing reply.
    fn prefixed(mut self, text: &str) -> Self {
        self.reply = if self.reply.is_empty() {
            text.to_string()
        } else {
            format!("{text}\n\n{}", self.reply)
        };
        self
    }
}

/// Drives conversation state through a catalog.
#[derive(Debug, Clone)]
pub struct StageEngine {
    catalog: Arc<Catalog>,
}

impl StageEngine {
    pub fn new(catalog: Arc<Catalog>) -> Self {
        Self { catalog }
    }

    pub fn catalog(&self) -> &Catalog {
        &self.catalog
    }

    /// Opening turn for a fresh session: the first stage's intro.
    pub fn start(&self, state: &mut ConversationState) -> Turn {
        let initial = self.catalog.initial();
        self.enter(state, initial)
    }

    /// Reinitialise both scratchpads. Never calls out.
    pub fn reset(&self, state: &mut ConversationState, quote: &mut QuoteContext) {
        state.reset(&self.catalog);
        quote.clear();
    }

    /// Handle one free-text user message.
    pub fn handle_message(
        &self,
        state: &mut ConversationState,
        quote: &mut QuoteContext,
        text: &str,
    ) -> Turn {
        let Some(stage) = self.catalog.get(state.current_stage_id()) else {
            return self.tracking_error(state.current_stage_id());
        };

        // Free-text answers to onboarding questions are not second-guessed
        // by the informational extractors.
        let informational_allowed = stage.capture.is_some() || stage.questions.is_empty();

        if let Some(intent) = intent::classify(text, stage.capture) {
            if informational_allowed || !intent.is_informational() {
                debug!(stage = %stage.id, intent = intent.kind(), "Intent matched");
                return self.handle_intent(state, quote, stage, intent, text);
            }
        }

        if let Some(option) = stage.find_option(text) {
            return self.jump(state, stage, &option.target);
        }

        if stage.capture.is_some() {
            let question = stage.questions[0].text.as_str();
            return Turn::reply(format!("Sorry, I didn't catch that. {question}"));
        }

        if !stage.questions.is_empty() {
            return self.answer(state, stage, text);
        }

        if stage.is_terminal() {
            return Turn::reply(COMPLETION_MESSAGE);
        }

        if !stage.options.is_empty() {
            return Turn::reply(format!(
                "Please choose one of: {}.",
                stage.option_labels()
            ));
        }

        self.advance(state, stage)
    }

    /// UI-driven option selection.
    pub fn select_option(&self, state: &mut ConversationState, label: &str) -> Turn {
        let Some(stage) = self.catalog.get(state.current_stage_id()) else {
            return self.tracking_error(state.current_stage_id());
        };

        match stage.find_option(label) {
            Some(option) => self.jump(state, stage, &option.target),
            None if stage.options.is_empty() => {
                Turn::reply("There's nothing to choose right now.")
            }
            None => Turn::reply(format!(
                "That option isn't available here. Choose one of: {}.",
                stage.option_labels()
            )),
        }
    }

    /// Fold the result of an [`Effect`] back into the conversation.
    pub fn apply(
        &self,
        state: &mut ConversationState,
        quote: &mut QuoteContext,
        outcome: FlowOutcome,
    ) -> Turn {
        match outcome {
            FlowOutcome::RateQuoted {
                source,
                target,
                rate,
            } => Turn::reply(format!(
                "Today's rate: 1 {source} = {} {target}.",
                display_decimal(rate)
            )),
            FlowOutcome::RateUnavailable { reason } => {
                warn!(reason = %reason, "Rate lookup failed");
                Turn::reply("I couldn't fetch live rates right now. Please try again in a moment.")
                    .with_notification(Notification::error("Rate lookup failed"))
            }
            FlowOutcome::Quoted(summary) => {
                if let Err(e) = quote.record_quote(&summary) {
                    warn!(error = %e, quote_id = %summary.quote_id, "Discarding quote");
                    return self.no_valid_quote(state);
                }
                let Some(confirm) = self.catalog.find_capture(Capture::Confirm) else {
                    return self.tracking_error("confirm");
                };
                if let Some(current) = self.catalog.get(state.current_stage_id()) {
                    state.mark_completed(&current.id);
                }
                self.enter(state, confirm)
                    .prefixed(&describe_quote(quote, &summary))
            }
            FlowOutcome::QuoteFailed { reason } => {
                warn!(reason = %reason, "Quote request failed");
                quote.clear();
                self.enter(state, self.catalog.initial())
                    .prefixed("Sorry, I couldn't get a quote right now.")
                    .with_notification(Notification::error("Could not create a quote"))
            }
            FlowOutcome::NoValidQuote => self.no_valid_quote(state),
            FlowOutcome::TransactionCreated { reference } => {
                if let Err(e) = quote.record_transaction(&reference) {
                    warn!(error = %e, reference = %reference, "Discarding transaction");
                    return self.no_valid_quote(state);
                }
                let Some(confirm) = self.catalog.find_capture(Capture::Confirm) else {
                    return self.tracking_error("confirm");
                };
                let Some(done) = self.catalog.successor(confirm) else {
                    return self.tracking_error(&confirm.id);
                };
                state.mark_completed(&confirm.id);
                let mut turn = self
                    .enter(state, done)
                    .prefixed(&format!("Done! Your transaction reference is {reference}."));
                turn.poll = Some(reference);
                turn
            }
            FlowOutcome::TransactionFailed { reason } => {
                warn!(reason = %reason, "Transaction failed");
                Turn::reply(
                    "Something went wrong creating the transaction. \
                     Reply yes to try again or no to cancel.",
                )
                .with_notification(Notification::error("Transaction failed"))
            }
            FlowOutcome::TransactionStatus { reference, status } => {
                Turn::reply(format!("Update on {reference}: the transfer is now {status}."))
                    .with_notification(Notification::info(format!("{reference}: {status}")))
            }
            FlowOutcome::StatusCheckFailed { reference, reason } => {
                warn!(reference = %reference, reason = %reason, "Status inquiry failed");
                Turn::reply(format!(
                    "I couldn't check the status of {reference}, so I've stopped watching it."
                ))
                .with_notification(Notification::error("Status check failed"))
            }
        }
    }

    fn no_valid_quote(&self, state: &mut ConversationState) -> Turn {
        let Some(amount) = self.catalog.find_capture(Capture::Amount) else {
            return self.tracking_error("amount");
        };
        self.enter(state, amount)
            .prefixed("I don't have a valid quote for this transfer. Let's start again.")
    }

    fn handle_intent(
        &self,
        state: &mut ConversationState,
        quote: &mut QuoteContext,
        stage: &Stage,
        intent: Intent,
        text: &str,
    ) -> Turn {
        match intent {
            Intent::CurrencyPair { source, target } => Turn::effect(Effect::LookupRate {
                source: Some(source),
                target,
            }),
            Intent::RateInquiry {
                currency: Some(target),
            } => Turn::effect(Effect::LookupRate {
                source: None,
                target,
            }),
            Intent::RateInquiry { currency: None } => Turn::reply(
                "Which currencies are you interested in? Try something like \"USD to INR\".",
            ),
            Intent::CountryInquiry { country, .. } if stage.capture == Some(Capture::Country) => {
                self.choose_destination(state, quote, stage, country.code, text)
            }
            Intent::CountryInquiry { country, service } => {
                Turn::reply(describe_country(country, service))
            }
            Intent::Amount(amount) => {
                if amount <= Decimal::ZERO {
                    return Turn::reply(format!(
                        "The amount needs to be more than zero. {}",
                        stage.questions[0].text
                    ));
                }
                quote.set_amount(amount);
                state.record_answer(&stage.questions[0].id, text);
                self.advance(state, stage)
                    .prefixed(&format!("Got it, {} AED.", display_decimal(amount)))
            }
            Intent::CountryCode(code) => self.choose_destination(state, quote, stage, &code, text),
            Intent::Confirmation { affirmative: true } => {
                state.record_answer(&stage.questions[0].id, text);
                Turn::effect(Effect::CreateTransaction)
            }
            Intent::Confirmation { affirmative: false } => {
                quote.clear();
                state.mark_completed(&stage.id);
                self.enter(state, self.catalog.initial())
                    .prefixed("No problem, I've cancelled that transfer.")
            }
            Intent::SmallTalk(talk) => Turn::reply(talk.reply()),
        }
    }

    fn choose_destination(
        &self,
        state: &mut ConversationState,
        quote: &mut QuoteContext,
        stage: &Stage,
        code: &str,
        text: &str,
    ) -> Turn {
        let Some(amount) = quote.amount() else {
            let Some(amount_stage) = self.catalog.find_capture(Capture::Amount) else {
                return self.tracking_error("amount");
            };
            return self
                .enter(state, amount_stage)
                .prefixed("I need the amount before I can quote.");
        };
        quote.set_destination(code);
        state.record_answer(&stage.questions[0].id, text);
        Turn::effect(Effect::RequestQuote {
            amount,
            country: code.to_ascii_uppercase(),
        })
    }

    /// Record an answer to the current question and move on.
    fn answer(&self, state: &mut ConversationState, stage: &Stage, text: &str) -> Turn {
        let index = state.current_question_index();
        let Some(question) = stage.questions.get(index) else {
            return self.tracking_error(&stage.id);
        };
        state.record_answer(&question.id, text);

        match stage.questions.get(index + 1) {
            Some(next) => {
                state.advance_question();
                Turn::reply(next.prompt())
            }
            None => self.advance(state, stage),
        }
    }

    /// Leave an exhausted stage for its successor.
    fn advance(&self, state: &mut ConversationState, stage: &Stage) -> Turn {
        match (self.catalog.successor(stage), stage.next.as_deref()) {
            (Some(next), _) => {
                state.mark_completed(&stage.id);
                self.enter(state, next)
            }
            (None, Some(missing)) => self.tracking_error(missing),
            (None, None) => Turn::reply(COMPLETION_MESSAGE),
        }
    }

    fn jump(&self, state: &mut ConversationState, from: &Stage, target: &str) -> Turn {
        let Some(to) = self.catalog.get(target) else {
            return self.tracking_error(target);
        };
        state.mark_completed(&from.id);
        self.enter(state, to)
    }

    /// Make `stage` current and say its intro and first question.
    fn enter(&self, state: &mut ConversationState, stage: &Stage) -> Turn {
        state.enter_stage(&stage.id);
        debug!(stage = %stage.id, "Entered stage");

        let mut parts = Vec::new();
        let intro = stage.intro();
        if !intro.is_empty() {
            parts.push(intro);
        }
        if let Some(question) = stage.questions.first() {
            parts.push(question.text.clone());
        }
        if stage.is_terminal() {
            parts.push(COMPLETION_MESSAGE.to_string());
        }

        Turn {
            reply: parts.join("\n\n"),
            script: entry_sequence(stage),
            entered_stage: Some(stage.id.clone()),
            ..Default::default()
        }
    }

    fn tracking_error(&self, stage_id: &str) -> Turn {
        warn!(stage = %stage_id, "Conversation refers to an unknown stage");
        Turn::reply(TRACKING_ERROR_MESSAGE)
            .with_notification(Notification::error("Conversation tracking error"))
    }
}

/// Decimal without trailing zeros.
fn display_decimal(value: Decimal) -> String {
    value.normalize().to_string()
}

fn describe_quote(quote: &QuoteContext, summary: &QuoteSummary) -> String {
    let sending = match quote.amount() {
        Some(amount) => format!("{} {}", display_decimal(amount), summary.sending_currency),
        None => summary.sending_currency.clone(),
    };
    let receiving = match summary.receiving_amount {
        Some(amount) => format!("{} {}", display_decimal(amount), summary.receiving_currency),
        None => summary.receiving_currency.clone(),
    };
    let rate = summary
        .rate
        .map(|r| format!(" at a rate of {}", display_decimal(r)))
        .unwrap_or_default();
    format!(
        "Here's your quote: sending {sending} delivers {receiving}{rate}. Quote ID {}.",
        summary.quote_id
    )
}

fn describe_country(country: &Country, service: Option<ServiceType>) -> String {
    let methods = if country.methods.is_empty() {
        String::new()
    } else {
        format!(" via {}", country.methods.join(", "))
    };
    match service {
        Some(service) if country.supports(service) => match service {
            ServiceType::Payout => format!(
                "Yes, we support payouts to {} in {}{methods}.",
                country.name, country.currency
            ),
            ServiceType::Payin => format!("Yes, we support pay-ins from {}.", country.name),
        },
        Some(service) => format!(
            "Sorry, {} {service}s aren't supported yet.",
            country.name
        ),
        None => {
            let mut offered = Vec::new();
            if country.payout {
                offered.push(format!("payouts in {}{methods}", country.currency));
            }
            if country.payin {
                offered.push("pay-ins".to_string());
            }
            if offered.is_empty() {
                format!("We don't offer services in {} yet.", country.name)
            } else {
                format!("In {} we offer {}.", country.name, offered.join(" and "))
            }
        }
    }
}
