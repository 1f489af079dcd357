//! Interviewer capability — the conversational side of the session, wrapped
//! over the LLM gateway. The orchestrator asks it for the opening prompt at
//! session start and for a follow-up after every candidate turn; it never
//! touches session state itself.

use async_trait::async_trait;
use tracing::debug;

use crate::errors::CoreError;
use crate::llm::{ChatMessage, LlmGateway};
use crate::models::{ConversationTurn, Session, TurnRole};

/// System prompt for the interviewer persona. `{minutes}` and
/// `{resume_section}` are filled per session.
const INTERVIEWER_SYSTEM: &str = "You are a senior engineer conducting a system design interview. \
    Target length: about {minutes} minutes. \
    Ask one question at a time, probe for depth on requirements, architecture, \
    scalability, and trade-offs, and adapt to the candidate's answers. \
    Keep each reply under 120 words.{resume_section}";

const RESUME_SECTION_TEMPLATE: &str =
    "\n\nCandidate background (from resume reference {resume_ref}): tailor the \
    opening problem to their stated experience where sensible.";

const OPENING_INSTRUCTION: &str = "Open the interview: greet the candidate briefly and present \
    one system design problem appropriate for the session.";

#[async_trait]
pub trait Interviewer: Send + Sync {
    /// Produces the opening interviewer prompt for a freshly started session.
    async fn start_interview(
        &self,
        session: &Session,
        resume_ref: Option<&str>,
    ) -> Result<String, CoreError>;

    /// Produces the interviewer's follow-up to the latest candidate response,
    /// given the conversation so far and any attachment references
    /// (e.g. the latest whiteboard snapshot).
    async fn process_response(
        &self,
        session: &Session,
        history: &[ConversationTurn],
        candidate_text: &str,
        attachments: &[String],
    ) -> Result<String, CoreError>;
}

/// Gateway-backed interviewer. Holds no per-session state — the session and
/// its history are threaded through every call.
pub struct LlmInterviewer<G: LlmGateway> {
    gateway: G,
}

impl<G: LlmGateway> LlmInterviewer<G> {
    pub fn new(gateway: G) -> Self {
        LlmInterviewer { gateway }
    }

    fn system_prompt(session: &Session, resume_ref: Option<&str>) -> String {
        let resume_section = match resume_ref {
            Some(r) => RESUME_SECTION_TEMPLATE.replace("{resume_ref}", r),
            None => String::new(),
        };
        INTERVIEWER_SYSTEM
            .replace(
                "{minutes}",
                &session.config.target_duration_minutes.to_string(),
            )
            .replace("{resume_section}", &resume_section)
    }
}

#[async_trait]
impl<G: LlmGateway> Interviewer for LlmInterviewer<G> {
    async fn start_interview(
        &self,
        session: &Session,
        resume_ref: Option<&str>,
    ) -> Result<String, CoreError> {
        let messages = vec![
            ChatMessage::system(Self::system_prompt(session, resume_ref)),
            ChatMessage::user(OPENING_INSTRUCTION),
        ];
        let reply = self.gateway.invoke(&messages, "interview.open").await?;
        debug!(session_id = %session.id, "opening prompt generated");
        Ok(reply.text)
    }

    async fn process_response(
        &self,
        session: &Session,
        history: &[ConversationTurn],
        candidate_text: &str,
        attachments: &[String],
    ) -> Result<String, CoreError> {
        let mut messages = Vec::with_capacity(history.len() + 2);
        messages.push(ChatMessage::system(Self::system_prompt(
            session,
            session.config.resume_ref.as_deref(),
        )));
        for turn in history {
            messages.push(match turn.role {
                TurnRole::Interviewer => ChatMessage::assistant(turn.content.clone()),
                TurnRole::Candidate => ChatMessage::user(turn.content.clone()),
            });
        }

        let content = if attachments.is_empty() {
            candidate_text.to_string()
        } else {
            format!(
                "{candidate_text}\n\n[attached artifacts: {}]",
                attachments.join(", ")
            )
        };
        messages.push(ChatMessage::user(content));

        let reply = self.gateway.invoke(&messages, "interview.turn").await?;
        Ok(reply.text)
    }
}
