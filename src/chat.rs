//! Chat routing: "what-if" requests are answered locally by regenerating
//! the report; everything else goes to the server chatbot.

use rand::Rng;

use crate::assessment::AssessmentResult;
use crate::backend::AssessmentBackend;
use crate::intent::{extract_adjustments, is_regeneration_request};
use crate::logging::{log, log_error, obj, v_num, v_str, Domain, Level};
use crate::state::SessionState;

pub const REGENERATED_REPLY: &str =
    "I've regenerated the report with the requested adjustments. You can review the updated assessment above.";
pub const NO_RESULT_REPLY: &str =
    "There is no assessment to adjust yet. Upload a video, load a past session or run a location simulation first.";
pub const CHATBOT_ERROR_REPLY: &str =
    "Sorry, I encountered an error processing your question. Please try again.";

#[derive(Debug, Clone, PartialEq)]
pub enum ChatOutcome {
    /// Blank input.
    Ignored,
    Regenerated { reply: String, result: AssessmentResult },
    Answered { reply: String },
    Failed { reply: String },
}

impl ChatOutcome {
    pub fn reply(&self) -> Option<&str> {
        match self {
            ChatOutcome::Ignored => None,
            ChatOutcome::Regenerated { reply, .. }
            | ChatOutcome::Answered { reply }
            | ChatOutcome::Failed { reply } => Some(reply),
        }
    }
}

pub async fn route_chat<B, R>(
    state: &mut SessionState,
    text: &str,
    backend: &B,
    rng: &mut R,
) -> ChatOutcome
where
    B: AssessmentBackend + ?Sized,
    R: Rng + ?Sized,
{
    if text.trim().is_empty() {
        return ChatOutcome::Ignored;
    }

    if is_regeneration_request(text) {
        let overrides = extract_adjustments(text, state.current.as_ref(), rng);
        let Some(result) = state.regenerate(&overrides) else {
            return ChatOutcome::Failed { reply: NO_RESULT_REPLY.to_string() };
        };
        log(
            Level::Info,
            Domain::Chat,
            "regenerated",
            obj(&[
                ("session_id", v_str(&result.session_id)),
                ("fields", v_str(&overrides.keys().join(","))),
                ("fhi", v_num(result.fish_health_index)),
            ]),
        );
        return ChatOutcome::Regenerated {
            reply: REGENERATED_REPLY.to_string(),
            result: result.clone(),
        };
    }

    match backend.ask_chatbot(text, state.active_session_id.as_deref()).await {
        Ok(answer) => ChatOutcome::Answered { reply: answer.response },
        Err(err) => {
            log_error(Domain::Chat, "chatbot_failed", &err);
            ChatOutcome::Failed { reply: CHATBOT_ERROR_REPLY.to_string() }
        }
    }
}
