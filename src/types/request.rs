//! Canonical chat-completion request.

use serde::{Deserialize, Serialize};

use super::message::Message;
use crate::{GrimnirError, Result};

/// A chat-completion request, OpenAI-compatible in shape.
///
/// Immutable once constructed; cache keys and embeddings derive from it.
/// Fields that never affect model output (`stream`, `user`) are carried
/// for pass-through but excluded from cache-key computation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatRequest {
    pub model: String,
    pub messages: Vec<Message>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub temperature: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub top_p: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_tokens: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub n: Option<u8>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub stop: Option<Vec<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub stream: Option<bool>,
    /// Opaque end-user tag forwarded to providers, never part of the key.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub user: Option<String>,
}

impl ChatRequest {
    /// Create a request with the given model and messages.
    pub fn new(model: impl Into<String>, messages: Vec<Message>) -> Self {
        Self {
            model: model.into(),
            messages,
            temperature: None,
            top_p: None,
            max_tokens: None,
            n: None,
            stop: None,
            stream: None,
            user: None,
        }
    }

    pub fn temperature(mut self, temp: f32) -> Self {
        self.temperature = Some(temp);
        self
    }

    pub fn top_p(mut self, p: f32) -> Self {
        self.top_p = Some(p);
        self
    }

    pub fn max_tokens(mut self, max: u32) -> Self {
        self.max_tokens = Some(max);
        self
    }

    pub fn n(mut self, n: u8) -> Self {
        self.n = Some(n);
        self
    }

    pub fn stop(mut self, stop: Vec<String>) -> Self {
        self.stop = Some(stop);
        self
    }

    pub fn user(mut self, user: impl Into<String>) -> Self {
        self.user = Some(user.into());
        self
    }

    /// Validate structural invariants before the request enters the
    /// pipeline. Runs before admission, so malformed requests never
    /// reach the cache or a provider.
    pub fn validate(&self) -> Result<()> {
        if self.model.trim().is_empty() {
            return Err(GrimnirError::InvalidRequest("model must not be empty".into()));
        }
        if self.messages.is_empty() {
            return Err(GrimnirError::InvalidRequest(
                "messages must not be empty".into(),
            ));
        }
        if let Some(t) = self.temperature {
            if !(0.0..=2.0).contains(&t) {
                return Err(GrimnirError::InvalidRequest(format!(
                    "temperature {t} out of range [0, 2]"
                )));
            }
        }
        if let Some(p) = self.top_p {
            if !(0.0..=1.0).contains(&p) {
                return Err(GrimnirError::InvalidRequest(format!(
                    "top_p {p} out of range [0, 1]"
                )));
            }
        }
        if self.n == Some(0) {
            return Err(GrimnirError::InvalidRequest("n must be at least 1".into()));
        }
        Ok(())
    }

    /// Flattened message text used for embedding computation.
    ///
    /// Role-tagged so "user: hello" and "system: hello" embed differently,
    /// preserving message order.
    pub fn embedding_text(&self) -> String {
        let mut out = String::new();
        for message in &self.messages {
            out.push_str(message.role.as_str());
            out.push_str(": ");
            out.push_str(&message.content);
            out.push('\n');
        }
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::Role;

    #[test]
    fn validate_rejects_empty_messages() {
        let request = ChatRequest::new("gpt-3.5-turbo", vec![]);
        assert!(matches!(
            request.validate(),
            Err(GrimnirError::InvalidRequest(_))
        ));
    }

    #[test]
    fn validate_rejects_blank_model() {
        let request = ChatRequest::new("  ", vec![Message::user("hi")]);
        assert!(request.validate().is_err());
    }

    #[test]
    fn validate_rejects_out_of_range_temperature() {
        let request = ChatRequest::new("m", vec![Message::user("hi")]).temperature(3.5);
        assert!(request.validate().is_err());
    }

    #[test]
    fn validate_accepts_typical_request() {
        let request = ChatRequest::new("gpt-3.5-turbo", vec![Message::user("Hello")])
            .temperature(0.7)
            .max_tokens(50);
        assert!(request.validate().is_ok());
    }

    #[test]
    fn embedding_text_is_role_tagged_and_ordered() {
        let request = ChatRequest::new(
            "m",
            vec![Message::system("be brief"), Message::user("hello")],
        );
        let text = request.embedding_text();
        assert_eq!(text, "system: be brief\nuser: hello\n");
        assert_eq!(request.messages[0].role, Role::System);
    }
}
