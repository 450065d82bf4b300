//! Offline lead capture from the terminal. Walks the same gather-then-commit
//! flow as the bot, but driven by keyword heuristics instead of a model, so
//! leads can be logged with no network access at all.

use std::io::{self, BufRead, Write};
use std::sync::Arc;

use leadline_agent::heuristics::{
    classify_intent, draft_from_text, extract_name, extract_phone, looks_like_phone,
};
use leadline_core::config::{AppConfig, LoadOptions};
use leadline_core::LeadDraft;
use leadline_db::{connect_with_settings, migrations, LeadStore, SqlLeadStore};

use crate::commands::CommandResult;

const GREETING: &str =
    "Hello! Welcome to Premium Properties. Are you looking to buy, rent, or sell a property today?";

#[derive(Clone, Debug, PartialEq, Eq)]
enum ChatState {
    AwaitingIntent,
    AwaitingName { intent: String },
    AwaitingPhone { intent: String, name: String },
    Done,
}

/// One scripted turn: the next prompt to show, plus a completed draft once
/// every slot is filled.
fn step(state: ChatState, input: &str) -> (ChatState, String, Option<LeadDraft>) {
    match state {
        ChatState::AwaitingIntent => {
            // A first message that already carries name and phone skips the
            // remaining prompts.
            let draft = draft_from_text(input);
            if draft.name.is_some() && draft.phone.is_some() {
                return (ChatState::Done, String::new(), Some(draft));
            }

            let intent = classify_intent(input).to_string();
            (
                ChatState::AwaitingName { intent },
                "Great! I can help with that. May I have your name, please?".to_string(),
                None,
            )
        }
        ChatState::AwaitingName { intent } => {
            let name = extract_name(input).unwrap_or_else(|| input.trim().to_string());
            let prompt =
                format!("Thanks, {name}! And what's the best phone number to reach you on?");
            (ChatState::AwaitingPhone { intent, name }, prompt, None)
        }
        ChatState::AwaitingPhone { intent, name } => {
            let trimmed = input.trim();
            let phone = extract_phone(input)
                .or_else(|| looks_like_phone(trimmed).then(|| trimmed.to_string()));

            let Some(phone) = phone else {
                return (
                    ChatState::AwaitingPhone { intent, name },
                    "That doesn't look like a phone number I can dial. Could you repeat it?"
                        .to_string(),
                    None,
                );
            };

            let draft = LeadDraft {
                name: Some(name),
                phone: Some(phone),
                intent: Some(intent),
                original_text: Some(trimmed.to_string()),
            };
            (ChatState::Done, String::new(), Some(draft))
        }
        ChatState::Done => (ChatState::Done, String::new(), None),
    }
}

pub fn run() -> CommandResult {
    let config = match AppConfig::load(LoadOptions::default()) {
        Ok(config) => config,
        Err(error) => {
            return CommandResult::failure(
                "chat",
                "config_validation",
                format!("configuration issue: {error}"),
                2,
            );
        }
    };

    let runtime = match tokio::runtime::Builder::new_current_thread().enable_all().build() {
        Ok(runtime) => runtime,
        Err(error) => {
            return CommandResult::failure(
                "chat",
                "runtime_init",
                format!("failed to initialize async runtime: {error}"),
                3,
            );
        }
    };

    let stdin = io::stdin();
    let draft = match gather_draft(stdin.lock()) {
        Some(draft) => draft,
        None => return CommandResult::success("chat", "no lead captured"),
    };

    let result = runtime.block_on(async {
        let pool = connect_with_settings(
            &config.database.url,
            config.database.max_connections,
            config.database.timeout_secs,
        )
        .await
        .map_err(|error| ("db_connectivity", error.to_string(), 4u8))?;
        migrations::run_pending(&pool)
            .await
            .map_err(|error| ("migration", error.to_string(), 5u8))?;

        let store = Arc::new(SqlLeadStore::new(pool.clone()));
        let record =
            store.append(&draft).await.map_err(|error| ("lead_write", error.to_string(), 6u8))?;
        pool.close().await;
        Ok::<_, (&'static str, String, u8)>(record)
    });

    match result {
        Ok(record) => CommandResult::success(
            "chat",
            format!(
                "lead logged as {} for {} ({})",
                record.id,
                record.name,
                record.phone.as_deref().unwrap_or("no phone")
            ),
        ),
        Err((error_class, message, exit_code)) => {
            CommandResult::failure("chat", error_class, message, exit_code)
        }
    }
}

fn gather_draft(reader: impl BufRead) -> Option<LeadDraft> {
    println!("{GREETING}");
    let mut state = ChatState::AwaitingIntent;

    for line in reader.lines() {
        let line = line.ok()?;
        if line.trim().eq_ignore_ascii_case("quit") {
            return None;
        }

        let (next, prompt, draft) = step(state, &line);
        state = next;
        if let Some(draft) = draft {
            return Some(draft);
        }
        println!("{prompt}");
        let _ = io::stdout().flush();
    }

    None
}

#[cfg(test)]
mod tests {
    use super::{step, ChatState};

    #[test]
    fn scripted_flow_fills_every_slot() {
        let (state, prompt, draft) = step(ChatState::AwaitingIntent, "I want to rent a flat");
        assert_eq!(state, ChatState::AwaitingName { intent: "Rent".to_string() });
        assert!(prompt.contains("your name"));
        assert!(draft.is_none());

        let (state, prompt, draft) = step(state, "My name is Ali");
        assert_eq!(
            state,
            ChatState::AwaitingPhone { intent: "Rent".to_string(), name: "Ali".to_string() }
        );
        assert!(prompt.contains("phone number"));
        assert!(draft.is_none());

        let (state, _, draft) = step(state, "+971501234567");
        assert_eq!(state, ChatState::Done);
        let draft = draft.expect("completed draft");
        assert_eq!(draft.name.as_deref(), Some("Ali"));
        assert_eq!(draft.phone.as_deref(), Some("+971501234567"));
        assert_eq!(draft.intent.as_deref(), Some("Rent"));
    }

    #[test]
    fn complete_first_message_commits_without_further_prompts() {
        let (state, prompt, draft) =
            step(ChatState::AwaitingIntent, "My name is Ali, 0501234567, want to rent");

        assert_eq!(state, ChatState::Done);
        assert!(prompt.is_empty());
        let draft = draft.expect("single-shot draft");
        assert_eq!(draft.name.as_deref(), Some("Ali"));
        assert_eq!(draft.phone.as_deref(), Some("0501234567"));
        assert_eq!(draft.intent.as_deref(), Some("Rent"));
        assert_eq!(draft.original_text.as_deref(), Some("My name is Ali, 0501234567, want to rent"));
    }

    #[test]
    fn unparseable_phone_is_asked_again() {
        let state = ChatState::AwaitingPhone {
            intent: "Buy".to_string(),
            name: "Fatima".to_string(),
        };

        let (state, prompt, draft) = step(state, "call me whenever");
        assert!(draft.is_none());
        assert!(prompt.contains("repeat"));
        assert!(matches!(state, ChatState::AwaitingPhone { .. }));
    }

    #[test]
    fn plain_name_input_is_taken_verbatim() {
        let state = ChatState::AwaitingName { intent: "Sell".to_string() };
        let (state, _, _) = step(state, "Omar Farouk");
        assert_eq!(
            state,
            ChatState::AwaitingPhone { intent: "Sell".to_string(), name: "Omar Farouk".to_string() }
        );
    }
}
