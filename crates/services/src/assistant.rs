use std::fmt::Write as _;

use reqwest::Client;
use serde::Serialize;
use serde_json::Value;
use tracing::{debug, warn};
use url::Url;

use brsr_core::model::{ActiveQuestion, QuestionType};

use crate::config::{ApiConfig, endpoint};
use crate::error::AssistantError;

/// Shown next to replies that did not match the requested JSON contract.
pub const UNEXPECTED_FORMAT: &str = "unexpected format";

#[derive(Clone, Debug)]
pub struct AssistantConfig {
    pub base_url: Url,
    pub api_token: Option<String>,
}

impl AssistantConfig {
    #[must_use]
    pub fn from_api(config: &ApiConfig) -> Self {
        Self {
            base_url: config.ai_base().clone(),
            api_token: config.api_token.clone(),
        }
    }
}

/// Reply to a prompt that asked for JSON.
#[derive(Debug, Clone, PartialEq)]
pub enum AssistantReply {
    Structured(Value),
    /// The model answered, but not in the requested shape.
    Unstructured { raw: String, notice: &'static str },
}

impl AssistantReply {
    #[must_use]
    pub fn structured(&self) -> Option<&Value> {
        match self {
            AssistantReply::Structured(value) => Some(value),
            AssistantReply::Unstructured { .. } => None,
        }
    }
}

/// Client for the text-generation endpoint used to draft answers.
#[derive(Clone)]
pub struct AssistantService {
    client: Client,
    config: Option<AssistantConfig>,
}

impl AssistantService {
    #[must_use]
    pub fn new(client: Client, config: Option<AssistantConfig>) -> Self {
        Self { client, config }
    }

    #[must_use]
    pub fn enabled(&self) -> bool {
        self.config.is_some()
    }

    /// Send a prompt with its context and return the model's text.
    ///
    /// # Errors
    ///
    /// Returns `AssistantError` when the service is disabled, the request fails,
    /// or the response is empty.
    pub async fn generate(&self, message: &str, context: &str) -> Result<String, AssistantError> {
        let config = self.config.as_ref().ok_or(AssistantError::Disabled)?;

        let mut request = self
            .client
            .post(endpoint(&config.base_url, "/ai/generate"))
            .json(&GenerateRequest { message, context });
        if let Some(token) = &config.api_token {
            request = request.bearer_auth(token);
        }
        debug!(chars = message.len(), "assistant prompt");

        let response = request.send().await?;
        if !response.status().is_success() {
            return Err(AssistantError::HttpStatus(response.status()));
        }

        let body = response.text().await?;
        let content = unwrap_envelope(body);
        let content = content.trim();
        if content.is_empty() {
            return Err(AssistantError::EmptyResponse);
        }
        Ok(content.to_string())
    }

    /// Like [`AssistantService::generate`], but read the reply as JSON.
    ///
    /// A reply that is not JSON is returned as `Unstructured` rather than
    /// failing.
    ///
    /// # Errors
    ///
    /// Returns `AssistantError` only for transport failures.
    pub async fn ask_structured(
        &self,
        message: &str,
        context: &str,
    ) -> Result<AssistantReply, AssistantError> {
        let raw = self.generate(message, context).await?;
        Ok(parse_reply(raw))
    }

    /// Ask for a draft answer to the active question.
    ///
    /// # Errors
    ///
    /// Returns `AssistantError` for transport failures.
    pub async fn draft_answer(
        &self,
        question: &ActiveQuestion,
    ) -> Result<AssistantReply, AssistantError> {
        let message = draft_instruction(question.question_type);
        let context = question_context(question);
        self.ask_structured(message, &context).await
    }
}

#[derive(Serialize)]
struct GenerateRequest<'a> {
    message: &'a str,
    context: &'a str,
}

/// The endpoint answers either with plain text or with
/// `{"response" | "text" | "content": "..."}`.
fn unwrap_envelope(body: String) -> String {
    match serde_json::from_str::<Value>(&body) {
        Ok(Value::Object(mut obj)) => ["response", "text", "content"]
            .iter()
            .find_map(|key| match obj.remove(*key) {
                Some(Value::String(text)) => Some(text),
                _ => None,
            })
            .unwrap_or(body),
        Ok(Value::String(text)) => text,
        _ => body,
    }
}

/// Parse a model reply, accepting bare JSON or JSON inside a ``` fence.
#[must_use]
pub fn parse_reply(raw: String) -> AssistantReply {
    let candidate = strip_fence(&raw);
    match serde_json::from_str::<Value>(candidate) {
        Ok(value @ (Value::Object(_) | Value::Array(_))) => AssistantReply::Structured(value),
        _ => {
            warn!(chars = raw.len(), "assistant reply was not JSON");
            AssistantReply::Unstructured {
                raw,
                notice: UNEXPECTED_FORMAT,
            }
        }
    }
}

fn strip_fence(raw: &str) -> &str {
    let trimmed = raw.trim();
    let Some(rest) = trimmed.strip_prefix("```") else {
        return trimmed;
    };
    let rest = rest.strip_prefix("json").unwrap_or(rest);
    rest.strip_suffix("```").unwrap_or(rest).trim()
}

fn draft_instruction(question_type: QuestionType) -> &'static str {
    match question_type {
        QuestionType::Table | QuestionType::TableWithAdditionalRows => {
            "Draft an answer for this BRSR disclosure table. Reply with JSON only: \
             {\"rows\": [{\"<column key>\": <value>, ...}], \"notes\": \"...\"}."
        }
        QuestionType::Boolean => {
            "Draft an answer for this BRSR disclosure. Reply with JSON only: \
             {\"answer\": true|false, \"explanation\": \"...\"}."
        }
        QuestionType::Decimal => {
            "Draft an answer for this BRSR disclosure. Reply with JSON only: \
             {\"answer\": <number>, \"unit\": \"...\", \"explanation\": \"...\"}."
        }
        QuestionType::Subjective | QuestionType::Link | QuestionType::Note => {
            "Draft an answer for this BRSR disclosure. Reply with JSON only: \
             {\"answer\": \"...\"}."
        }
    }
}

/// Plain-text context describing the question and its current answer.
#[must_use]
pub fn question_context(question: &ActiveQuestion) -> String {
    let mut context = String::new();
    let _ = writeln!(context, "Question ({}): {}", question.question_id, question.text);
    let _ = writeln!(context, "Type: {}", question.question_type.as_str());
    if !question.guidance.trim().is_empty() {
        let _ = writeln!(context, "Guidance: {}", question.guidance.trim());
    }
    match &question.current_answer {
        Some(answer) => {
            let _ = writeln!(context, "Current answer: {}", answer.to_payload());
        }
        None => context.push_str("Current answer: none\n"),
    }
    context
}

#[cfg(test)]
mod tests {
    use super::*;
    use brsr_core::model::{Answer, ModuleId, QuestionId, SubjectiveAnswer};
    use serde_json::json;

    #[test]
    fn parses_bare_json() {
        let reply = parse_reply(r#"{"answer": "yes"}"#.into());
        assert_eq!(reply.structured(), Some(&json!({"answer": "yes"})));
    }

    #[test]
    fn parses_fenced_json() {
        let reply = parse_reply("```json\n{\"rows\": []}\n```".into());
        assert_eq!(reply.structured(), Some(&json!({"rows": []})));
    }

    #[test]
    fn free_text_is_unstructured() {
        let reply = parse_reply("Here is a draft: we comply.".into());
        assert_eq!(
            reply,
            AssistantReply::Unstructured {
                raw: "Here is a draft: we comply.".into(),
                notice: UNEXPECTED_FORMAT,
            }
        );
    }

    #[test]
    fn envelope_is_unwrapped() {
        assert_eq!(unwrap_envelope(r#"{"response": "hi"}"#.into()), "hi");
        assert_eq!(unwrap_envelope(r#"{"answer": 1}"#.into()), r#"{"answer": 1}"#);
        assert_eq!(unwrap_envelope("plain".into()), "plain");
    }

    #[test]
    fn json_scalar_is_unstructured() {
        assert!(parse_reply("42".into()).structured().is_none());
    }

    #[test]
    fn context_includes_guidance_and_answer() {
        let question = ActiveQuestion {
            question_id: QuestionId::new("Q7"),
            module_id: ModuleId::new("env"),
            text: "Describe your energy policy".into(),
            guidance: "Mention renewables".into(),
            question_type: QuestionType::Subjective,
            current_answer: Some(Answer::Subjective(SubjectiveAnswer::text("Draft"))),
        };
        let context = question_context(&question);
        assert!(context.contains("Question (Q7): Describe your energy policy"));
        assert!(context.contains("Guidance: Mention renewables"));
        assert!(context.contains("Draft"));
    }

    #[tokio::test]
    async fn disabled_without_config() {
        let service = AssistantService::new(Client::new(), None);
        assert!(!service.enabled());
        assert!(matches!(
            service.generate("hi", "").await,
            Err(AssistantError::Disabled)
        ));
    }
}
