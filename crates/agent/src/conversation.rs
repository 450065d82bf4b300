use std::sync::Arc;
use std::time::Duration;

use thiserror::Error;
use tracing::{info, warn};

use leadline_core::lead::{iso8601, LeadDraft, LeadRecord, LeadSource, Priority, DEFAULT_STATUS};
use leadline_tracker::{RemoteCreate, RemoteTracker};

use crate::heuristics;
use crate::llm::{ChatModel, ChatTurn, ModelError, ModelOutput};
use crate::session::{ConversationPhase, Session, SessionStore};
use crate::sink::LeadSink;

const SYSTEM_PROMPT: &str = "You are a professional Real Estate Assistant for a premium agency.\n\
\n\
YOUR GOAL:\n\
Engage the user in a natural conversation to understand their needs. Do NOT create a lead immediately. You must gather the following THREE pieces of information:\n\
\n\
1. **Name**: The user's name.\n\
2. **Phone Number**: A valid contact number.\n\
3. **Intent/Requirement**: Specific details about what they are looking for (e.g., \"Buying a 3-bed villa in Dubai Hills\", \"Renting a studio in Marina\", \"Selling my property\").\n\
\n\
RULES:\n\
- If the user says \"Hi\" or \"Hello\", greet them warmly and ask how you can assist them with their real estate needs.\n\
- If the user provides partial info (e.g., just \"I want to buy\"), ask follow-up questions (e.g., \"Great! What location are you interested in?\" or \"What is your budget?\").\n\
- ONLY when you have ALL three pieces of information (Name, Phone, Intent), call the `create_lead_task` tool.\n\
- If the user asks general questions, answer them helpfully.\n\
- Be polite, professional, and concise.";

/// Operator-facing turn failures. The ingress layer maps these to its own
/// user-visible fallback; they are never shown to the end user directly.
#[derive(Debug, Error)]
pub enum EngineError {
    #[error("no language model is configured")]
    ModelDisabled,
    #[error(transparent)]
    Model(#[from] ModelError),
}

pub struct ConversationEngine {
    model: Option<Arc<dyn ChatModel>>,
    sink: Arc<dyn LeadSink>,
    tracker: Arc<dyn RemoteTracker>,
    sessions: SessionStore,
    validate_phone: bool,
}

impl ConversationEngine {
    pub fn new(
        model: Option<Arc<dyn ChatModel>>,
        sink: Arc<dyn LeadSink>,
        tracker: Arc<dyn RemoteTracker>,
        session_idle: Duration,
        validate_phone: bool,
    ) -> Self {
        Self { model, sink, tracker, sessions: SessionStore::new(session_idle), validate_phone }
    }

    /// Runs one conversation turn for `user_id`. The returned string is the
    /// reply to hand back over the chat channel.
    pub async fn handle_message(&self, user_id: &str, text: &str) -> Result<String, EngineError> {
        let slot = self.sessions.acquire(user_id).await;
        let mut session = slot.lock().await;

        if session.history.is_empty() {
            session.history.push(ChatTurn::system(SYSTEM_PROMPT));
        }
        session.history.push(ChatTurn::user(text));
        session.touch();

        let model = self.model.as_ref().ok_or(EngineError::ModelDisabled)?;

        // A failed model call leaves no assistant turn behind; the user's
        // turn stays so a retry sees the full conversation.
        let output = match model.complete(&session.history).await {
            Ok(output) => output,
            Err(error) => {
                warn!(event_name = "conversation.model_failed", user_id, error = %error);
                return Err(error.into());
            }
        };

        let reply = match output {
            ModelOutput::Reply(reply) => reply,
            ModelOutput::CreateLead(draft) => self.commit(user_id, &mut session, draft).await,
        };

        session.history.push(ChatTurn::assistant(reply.clone()));
        session.touch();
        Ok(reply)
    }

    async fn commit(&self, user_id: &str, session: &mut Session, draft: LeadDraft) -> String {
        if let ConversationPhase::Committed { turn } = session.phase {
            warn!(
                event_name = "conversation.duplicate_commit_suppressed",
                user_id,
                committed_at_turn = turn
            );
            return format!(
                "Your lead is already logged, {}. Our team will contact you shortly.",
                draft.display_name()
            );
        }

        if self.validate_phone {
            let plausible =
                draft.phone.as_deref().map(heuristics::looks_like_phone).unwrap_or(false);
            if !plausible {
                return format!(
                    "Thanks {}! Before I log this, could you share a reachable phone number for our agent?",
                    draft.display_name()
                );
            }
        }

        let record = match self.sink.record(&draft).await {
            Ok(record) => record,
            Err(error) => {
                // Local write faults must never lose the remote attempt,
                // and must stay visible to the operator.
                warn!(event_name = "lead.local_write_failed", user_id, error = %error);
                unsaved_record(&draft)
            }
        };

        let outcome = self.tracker.create_task(&record).await;
        let synced = matches!(outcome, RemoteCreate::Created(_));
        session.phase = ConversationPhase::Committed { turn: session.history.len() - 1 };

        info!(
            event_name = "conversation.lead_committed",
            user_id,
            lead_id = %record.id,
            remote_synced = synced
        );

        match outcome {
            RemoteCreate::Created(task) => {
                info!(event_name = "conversation.remote_task_created", task_id = %task.id);
                format!(
                    "Lead '{}' successfully created in the tracker and on our dashboard. Our team will contact you shortly.",
                    record.name
                )
            }
            RemoteCreate::Unavailable => format!(
                "Lead '{}' saved to our dashboard. Our team will contact you shortly.",
                record.name
            ),
        }
    }
}

fn unsaved_record(draft: &LeadDraft) -> LeadRecord {
    let now = chrono::Utc::now();
    LeadRecord {
        id: format!("local-{}", now.timestamp_nanos_opt().unwrap_or_else(|| now.timestamp_millis())),
        name: draft.display_name().to_string(),
        phone: draft.phone.clone(),
        intent: draft.display_intent().to_string(),
        original_text: draft.original_text.clone().unwrap_or_default(),
        status: DEFAULT_STATUS.to_string(),
        priority: Priority::Normal,
        created_at: iso8601(&now),
        updated_at: None,
        source: LeadSource::Local,
        url: None,
    }
}
