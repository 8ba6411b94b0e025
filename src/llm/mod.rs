//! Language-model collaborator: message types, the trait the orchestrator
//! calls, and the prompt builders for both conversational flows.

pub mod anthropic;

use async_trait::async_trait;
use serde::Serialize;

use crate::error::Result;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Assistant,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ChatMessage {
    pub role: Role,
    pub content: String,
}

impl ChatMessage {
    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: Role::User,
            content: content.into(),
        }
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self {
            role: Role::Assistant,
            content: content.into(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CompletionRequest {
    pub model: String,
    pub max_tokens: u32,
    pub messages: Vec<ChatMessage>,
}

/// Remote text generation. Returns the first text block of the reply.
#[async_trait]
pub trait LanguageModel: Send + Sync {
    async fn complete(&self, request: CompletionRequest) -> Result<String>;
}

/// Conversational reply to a spoken query, grounded in recent history.
pub fn reply_messages(assistant_name: &str, user_name: &str, context: &str) -> Vec<ChatMessage> {
    vec![
        ChatMessage::assistant(format!(
            "Hi, today I am your assistant named {assistant_name} and you are {user_name}. \
             I can only say up to two sentences at a time. How can I help you?"
        )),
        ChatMessage::user(format!(
            "Awesome to hear that! Here is what we talked about, say the two sentences in \
             response to all this: {context}"
        )),
    ]
}

/// One-sentence guess at the user's activity from screen text.
/// The history context goes in as a prior assistant turn when present.
pub fn analysis_messages(context: &str, screen_text: &str) -> Vec<ChatMessage> {
    let mut messages = Vec::with_capacity(2);
    if !context.trim().is_empty() {
        messages.push(ChatMessage::assistant(context));
    }
    messages.push(ChatMessage::user(format!(
        "Describe in just one relevant short sentence based on this OCR of my screen, \
         what you think I am working on: {screen_text}"
    )));
    messages
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reply_prompt_embeds_names_and_context() {
        let msgs = reply_messages("Ivee", "Sam", "User: hello");
        assert_eq!(msgs.len(), 2);
        let roles: Vec<Role> = msgs.iter().map(|m| m.role).collect();
        assert_eq!(roles, [Role::Assistant, Role::User]);
        assert!(msgs[0].content.contains("named Ivee and you are Sam"));
        assert!(msgs[1].content.ends_with("response to all this: User: hello"));
    }

    #[test]
    fn analysis_skips_empty_context() {
        let msgs = analysis_messages("", "cargo build");
        assert_eq!(msgs.len(), 1);
        assert!(msgs[0].content.ends_with("working on: cargo build"));

        let msgs = analysis_messages("User: hi", "cargo build");
        assert_eq!(msgs[0], ChatMessage::assistant("User: hi"));
        assert_eq!(msgs[1].role, Role::User);
    }

    #[test]
    fn roles_serialize_lowercase() {
        let json = serde_json::to_string(&ChatMessage::assistant("x")).unwrap();
        assert_eq!(json, r#"{"role":"assistant","content":"x"}"#);
    }
}
