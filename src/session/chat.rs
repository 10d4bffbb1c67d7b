//! Session: one user's conversation, its effects and its timers.
//!
//! The conversation data sits behind a short-lived mutex that is never held
//! across an await. User turns are additionally serialized by an async turn
//! lock, so at most one quote or transaction call is in flight per session
//! and each typing placeholder is resolved by the turn that created it.
//!
//! Every reset bumps the session generation. Scripted lines, effect results
//! and status polls remember the generation they were started under and are
//! dropped once it is stale.

use std::ops::ControlFlow;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use chrono::{DateTime, Utc};
use tokio::sync::{broadcast, mpsc};
use tokio::time::Instant;
use tracing::{debug, info};
use uuid::Uuid;

use super::model::{SessionEvent, SessionSnapshot};
use crate::config::SessionConfig;
use crate::conversation::{
    ConversationState, Effect, FlowOutcome, Message, QuoteContext, ScriptStep, StageEngine, Turn,
};
use crate::payments::QuoteOrchestrator;

const EVENT_CAPACITY: usize = 256;

struct SessionData {
    state: ConversationState,
    quote: QuoteContext,
}

pub struct Session {
    id: Uuid,
    created_at: DateTime<Utc>,
    engine: StageEngine,
    orchestrator: Arc<QuoteOrchestrator>,
    config: SessionConfig,
    data: Mutex<SessionData>,
    turn: tokio::sync::Mutex<()>,
    generation: AtomicU64,
    tx: broadcast::Sender<SessionEvent>,
}

impl Session {
    /// Create a session at the first stage, seeding the welcome message when
    /// configured to.
    pub fn new(
        engine: StageEngine,
        orchestrator: Arc<QuoteOrchestrator>,
        config: SessionConfig,
    ) -> Arc<Self> {
        let (tx, _rx) = broadcast::channel(EVENT_CAPACITY);
        let state = ConversationState::new(engine.catalog());
        let session = Arc::new(Self {
            id: Uuid::new_v4(),
            created_at: Utc::now(),
            engine,
            orchestrator,
            config,
            data: Mutex::new(SessionData {
                state,
                quote: QuoteContext::default(),
            }),
            turn: tokio::sync::Mutex::new(()),
            generation: AtomicU64::new(0),
            tx,
        });
        session.seed_welcome(0);
        session
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn generation(&self) -> u64 {
        self.generation.load(Ordering::SeqCst)
    }

    pub fn subscribe(&self) -> broadcast::Receiver<SessionEvent> {
        self.tx.subscribe()
    }

    pub fn snapshot(&self) -> SessionSnapshot {
        let data = self.data();
        let options = self
            .engine
            .catalog()
            .get(data.state.current_stage_id())
            .map(|stage| stage.options.iter().map(|o| o.label.clone()).collect())
            .unwrap_or_default();
        SessionSnapshot {
            session_id: self.id,
            generation: self.generation(),
            created_at: self.created_at,
            state: data.state.clone(),
            quote: data.quote.clone(),
            options,
        }
    }

    /// Handle free text from the user. Blank messages are ignored.
    pub async fn send_user_message(self: &Arc<Self>, text: &str) {
        let text = text.trim();
        if text.is_empty() {
            return;
        }

        let _turn = self.turn.lock().await;
        let generation = self.generation();
        let Some((placeholder, turn, quote_before)) =
            self.begin_turn(generation, text, |engine, state, quote| {
                engine.handle_message(state, quote, text)
            })
        else {
            return;
        };
        self.finish_turn(generation, placeholder, turn, quote_before)
            .await;
    }

    /// Handle a click on one of the current stage's options.
    pub async fn select_option(self: &Arc<Self>, label: &str) {
        let label = label.trim();
        if label.is_empty() {
            return;
        }

        let _turn = self.turn.lock().await;
        let generation = self.generation();
        let Some((placeholder, turn, quote_before)) =
            self.begin_turn(generation, label, |engine, state, _| {
                engine.select_option(state, label)
            })
        else {
            return;
        };
        self.finish_turn(generation, placeholder, turn, quote_before)
            .await;
    }

    /// Start over from the first stage. Never calls out, never waits for an
    /// in-flight turn.
    pub fn reset(self: &Arc<Self>) {
        let generation = {
            let mut data = self.data();
            let generation = self.generation.fetch_add(1, Ordering::SeqCst) + 1;
            let SessionData { state, quote } = &mut *data;
            self.engine.reset(state, quote);
            generation
        };
        info!(session_id = %self.id, generation, "Session reset");
        self.emit(SessionEvent::Reset { generation });
        self.seed_welcome(generation);
    }

    fn data(&self) -> MutexGuard<'_, SessionData> {
        self.data.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn is_current(&self, generation: u64) -> bool {
        self.generation() == generation
    }

    fn emit(&self, event: SessionEvent) {
        // No subscribers is fine.
        let _ = self.tx.send(event);
    }

    fn seed_welcome(self: &Arc<Self>, generation: u64) {
        if !self.config.seed_welcome {
            return;
        }
        let (message, turn) = {
            let mut data = self.data();
            if !self.is_current(generation) {
                return;
            }
            let turn = self.engine.start(&mut data.state);
            let message = Message::assistant(turn.reply.clone());
            data.state.push_message(message.clone());
            (message, turn)
        };
        self.emit(SessionEvent::MessageAppended { message });
        self.publish(generation, &turn, None);
    }

    /// Record the user's message, show a placeholder and run the engine.
    fn begin_turn<F>(
        &self,
        generation: u64,
        text: &str,
        step: F,
    ) -> Option<(Uuid, Turn, QuoteContext)>
    where
        F: FnOnce(&StageEngine, &mut ConversationState, &mut QuoteContext) -> Turn,
    {
        let user = Message::user(text);
        let placeholder = Message::placeholder();
        let placeholder_id = placeholder.id;

        let (turn, quote_before) = {
            let mut data = self.data();
            if !self.is_current(generation) {
                return None;
            }
            let SessionData { state, quote } = &mut *data;
            state.push_message(user.clone());
            state.push_message(placeholder.clone());
            let quote_before = quote.clone();
            let turn = step(&self.engine, state, quote);
            (turn, quote_before)
        };

        debug!(
            session_id = %self.id,
            stage = ?turn.entered_stage,
            effect = ?turn.effect,
            "Turn started"
        );
        self.emit(SessionEvent::MessageAppended { message: user });
        self.emit(SessionEvent::MessageAppended {
            message: placeholder,
        });
        Some((placeholder_id, turn, quote_before))
    }

    /// Run the turn's effect, wait out the typing delay, then resolve the
    /// placeholder with the reply.
    async fn finish_turn(
        self: &Arc<Self>,
        generation: u64,
        placeholder: Uuid,
        mut turn: Turn,
        quote_before: QuoteContext,
    ) {
        if let Some(effect) = turn.effect.take() {
            let outcome = self.run_effect(effect).await;
            let mut data = self.data();
            if !self.is_current(generation) {
                debug!(session_id = %self.id, "Dropping effect result from before reset");
                return;
            }
            let SessionData { state, quote } = &mut *data;
            turn = self.engine.apply(state, quote, outcome);
        }

        tokio::time::sleep(self.config.typing_delay).await;

        let (resolved, quote_after) = {
            let mut data = self.data();
            if !self.is_current(generation) {
                return;
            }
            let resolved = data
                .state
                .resolve_placeholder(placeholder, turn.reply.clone());
            (resolved, data.quote.clone())
        };

        if let Some(message) = resolved {
            self.emit(SessionEvent::MessageUpdated { message });
        }
        let changed = (quote_after != quote_before).then_some(quote_after);
        self.publish(generation, &turn, changed);
    }

    async fn run_effect(&self, effect: Effect) -> FlowOutcome {
        match effect {
            Effect::LookupRate { source, target } => {
                self.orchestrator
                    .lookup_rate(source.as_deref(), &target)
                    .await
            }
            Effect::RequestQuote { amount, country } => {
                self.orchestrator.request_quote(amount, &country).await
            }
            Effect::CreateTransaction => {
                let quote = self.data().quote.clone();
                self.orchestrator.confirm_and_create_transaction(&quote).await
            }
        }
    }

    /// Broadcast what a turn changed and start its timers.
    fn publish(self: &Arc<Self>, generation: u64, turn: &Turn, quote: Option<QuoteContext>) {
        if let Some(ref stage_id) = turn.entered_stage {
            let options = self
                .engine
                .catalog()
                .get(stage_id)
                .map(|stage| stage.options.iter().map(|o| o.label.clone()).collect())
                .unwrap_or_default();
            self.emit(SessionEvent::StageChanged {
                stage_id: stage_id.clone(),
                options,
            });
        }
        if let Some(quote) = quote {
            self.emit(SessionEvent::QuoteUpdated { quote });
        }
        if let Some(ref notification) = turn.notification {
            self.emit(SessionEvent::Notification {
                level: notification.level,
                message: notification.message.clone(),
            });
        }
        if !turn.script.is_empty() {
            self.spawn_script(generation, turn.script.clone());
        }
        if let Some(ref reference) = turn.poll {
            if self.config.polling_enabled {
                self.spawn_status_poll(generation, reference.clone());
            }
        }
    }

    /// Fold an outcome that arrived outside a user turn (status polls).
    fn apply_outcome(self: &Arc<Self>, generation: u64, outcome: FlowOutcome) -> bool {
        let (message, turn, quote) = {
            let mut data = self.data();
            if !self.is_current(generation) {
                return false;
            }
            let SessionData { state, quote } = &mut *data;
            let before = quote.clone();
            let turn = self.engine.apply(state, quote, outcome);
            let message = Message::assistant(turn.reply.clone());
            state.push_message(message.clone());
            let changed = (*quote != before).then(|| quote.clone());
            (message, turn, changed)
        };
        self.emit(SessionEvent::MessageAppended { message });
        self.publish(generation, &turn, quote);
        true
    }

    fn append_scripted(&self, generation: u64, step: ScriptStep) -> bool {
        let message = {
            let mut data = self.data();
            if !self.is_current(generation) {
                return false;
            }
            let message = Message::assistant_with_hint(step.text, step.hint);
            data.state.push_message(message.clone());
            message
        };
        self.emit(SessionEvent::MessageAppended { message });
        true
    }

    /// Emit side content at its offsets from now. Stops when the session is
    /// dropped or reset.
    fn spawn_script(self: &Arc<Self>, generation: u64, steps: Vec<ScriptStep>) {
        let session = Arc::downgrade(self);
        let entered_at = Instant::now();
        tokio::spawn(async move {
            for step in steps {
                tokio::time::sleep_until(entered_at + step.delay).await;
                let Some(session) = session.upgrade() else {
                    return;
                };
                if !session.append_scripted(generation, step) {
                    debug!(session_id = %session.id, "Dropping scripted line from before reset");
                    return;
                }
            }
        });
    }

    /// Poll the transaction until it settles. Status replies wait for the
    /// turn lock, so they never land inside a user turn.
    fn spawn_status_poll(self: &Arc<Self>, generation: u64, reference: String) {
        info!(session_id = %self.id, reference = %reference, "Polling transaction status");
        let (tx, mut rx) = mpsc::unbounded_channel::<FlowOutcome>();

        let session = Arc::downgrade(self);
        tokio::spawn(async move {
            while let Some(outcome) = rx.recv().await {
                let Some(session) = session.upgrade() else {
                    return;
                };
                let _turn = session.turn.lock().await;
                if !session.apply_outcome(generation, outcome) {
                    debug!(session_id = %session.id, "Dropping status update from before reset");
                    return;
                }
            }
        });

        let session = Arc::downgrade(self);
        let orchestrator = self.orchestrator.clone();
        let interval = self.config.poll_interval;
        tokio::spawn(async move {
            orchestrator
                .poll_transaction_status(&reference, interval, |event| {
                    let current = session
                        .upgrade()
                        .is_some_and(|session| session.is_current(generation));
                    if current && tx.send(event.into_outcome(&reference)).is_ok() {
                        ControlFlow::Continue(())
                    } else {
                        ControlFlow::Break(())
                    }
                })
                .await;
        });
    }
}
