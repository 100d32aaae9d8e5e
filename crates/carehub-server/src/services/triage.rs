//! Chat-based symptom triage backed by an OpenAI-compatible chat API.
//!
//! Every provider failure is absorbed here: callers always get a reply.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};

use crate::config::AiConfig;

const OFFLINE_REPLY: &str = "AI Service is offline.";
const FALLBACK_REPLY: &str = "I'm having trouble answering right now. If your symptoms are worrying, please book an appointment with a doctor.";
const FALLBACK_ADVICE: &str = "I couldn't analyze that properly. Please consult a doctor.";

const TRIAGE_PROMPT: &str = "You are a medical triage assistant. Analyze the user's symptoms.
Return a strict JSON response with these keys:
- \"danger_level\": \"High\", \"Medium\", or \"Low\"
- \"department\": The relevant medical department (e.g., Cardiology, Neurology, General)
- \"advice\": A short, empathetic response.

CRITICAL: If symptoms are severe (chest pain, breathing trouble), set danger_level to \"High\".
Do NOT provide a diagnosis. Only triage.";

const CHAT_PROMPT: &str = "You are a helpful healthcare chatbot. Answer general health questions. If the user asks for appointments, guide them to the booking menu.";

/// Number of prior turns forwarded to the model.
const HISTORY_WINDOW: usize = 3;

#[derive(Debug, thiserror::Error)]
pub enum TriageError {
    #[error("chat request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("chat provider returned {status}: {body}")]
    Status { status: u16, body: String },

    #[error("chat provider returned no content")]
    EmptyResponse,

    #[error("model output is not valid triage JSON: {0}")]
    InvalidAssessment(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChatRole {
    System,
    User,
    Assistant,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: ChatRole,
    pub content: String,
}

impl ChatMessage {
    pub fn system(content: impl Into<String>) -> Self {
        Self {
            role: ChatRole::System,
            content: content.into(),
        }
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: ChatRole::User,
            content: content.into(),
        }
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self {
            role: ChatRole::Assistant,
            content: content.into(),
        }
    }
}

/// A prior turn sent by the client. Any role other than `user` is replayed
/// as an assistant message.
#[derive(Debug, Clone, Deserialize)]
pub struct ChatTurn {
    #[serde(default)]
    pub role: String,
    #[serde(default)]
    pub content: String,
}

impl From<&ChatTurn> for ChatMessage {
    fn from(turn: &ChatTurn) -> Self {
        if turn.role == "user" {
            ChatMessage::user(turn.content.clone())
        } else {
            ChatMessage::assistant(turn.content.clone())
        }
    }
}

/// A chat-completion backend.
#[async_trait]
pub trait ChatModel: Send + Sync {
    async fn complete(&self, messages: &[ChatMessage]) -> Result<String, TriageError>;
}

/// Groq (or any OpenAI-compatible) chat completions client.
pub struct GroqChatModel {
    http_client: Client,
    base_url: String,
    api_key: String,
    model: String,
    temperature: f32,
}

impl GroqChatModel {
    pub fn new(
        base_url: impl Into<String>,
        api_key: impl Into<String>,
        model: impl Into<String>,
        temperature: f32,
        timeout: Duration,
    ) -> Result<Self, TriageError> {
        Ok(Self {
            http_client: Client::builder().timeout(timeout).build()?,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            api_key: api_key.into(),
            model: model.into(),
            temperature,
        })
    }

    /// Returns `None` when no API key is configured.
    pub fn from_config(config: &AiConfig) -> Result<Option<Self>, TriageError> {
        let Some(api_key) = config.api_key.as_deref().filter(|k| !k.is_empty()) else {
            return Ok(None);
        };
        Self::new(
            &config.base_url,
            api_key,
            &config.model,
            config.temperature,
            config.timeout(),
        )
        .map(Some)
    }
}

#[async_trait]
impl ChatModel for GroqChatModel {
    async fn complete(&self, messages: &[ChatMessage]) -> Result<String, TriageError> {
        let body = json!({
            "model": self.model,
            "temperature": self.temperature,
            "messages": messages,
        });

        let response = self
            .http_client
            .post(format!("{}/chat/completions", self.base_url))
            .bearer_auth(&self.api_key)
            .json(&body)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(TriageError::Status {
                status: status.as_u16(),
                body,
            });
        }

        let payload: Value = response.json().await?;
        payload["choices"][0]["message"]["content"]
            .as_str()
            .map(str::to_string)
            .ok_or(TriageError::EmptyResponse)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum DangerLevel {
    #[serde(alias = "high", alias = "HIGH")]
    High,
    #[serde(alias = "medium", alias = "MEDIUM")]
    Medium,
    #[serde(alias = "low", alias = "LOW")]
    Low,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TriageAssessment {
    pub danger_level: DangerLevel,
    #[serde(default = "general_department")]
    pub department: String,
    #[serde(default)]
    pub advice: String,
}

fn general_department() -> String {
    "General".into()
}

impl TriageAssessment {
    fn fallback() -> Self {
        Self {
            danger_level: DangerLevel::Low,
            department: general_department(),
            advice: FALLBACK_ADVICE.into(),
        }
    }
}

/// Response body of `POST /patient/chat`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChatReply {
    pub response: String,
    pub recommend_action: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub department: Option<String>,
}

pub struct TriageAssistant {
    model: Option<Arc<dyn ChatModel>>,
}

impl TriageAssistant {
    pub fn new(model: Option<Arc<dyn ChatModel>>) -> Self {
        if model.is_none() {
            tracing::warn!("No chat model configured; the triage assistant is offline");
        }
        Self { model }
    }

    pub fn is_online(&self) -> bool {
        self.model.is_some()
    }

    /// Classifies a symptom description. Falls back to a low-urgency
    /// general assessment on any failure.
    pub async fn analyze_symptoms(&self, query: &str) -> TriageAssessment {
        let Some(model) = &self.model else {
            return TriageAssessment::fallback();
        };
        let messages = [ChatMessage::system(TRIAGE_PROMPT), ChatMessage::user(query)];
        let result = model
            .complete(&messages)
            .await
            .and_then(|content| parse_assessment(&content));
        match result {
            Ok(assessment) => assessment,
            Err(e) => {
                tracing::warn!(error = %e, "Symptom triage failed, using fallback");
                TriageAssessment::fallback()
            }
        }
    }

    pub async fn chat_response(&self, query: &str, history: &[ChatTurn]) -> String {
        let Some(model) = &self.model else {
            return OFFLINE_REPLY.to_string();
        };
        let skip = history.len().saturating_sub(HISTORY_WINDOW);
        let messages: Vec<ChatMessage> = std::iter::once(ChatMessage::system(CHAT_PROMPT))
            .chain(history[skip..].iter().map(ChatMessage::from))
            .chain(std::iter::once(ChatMessage::user(query)))
            .collect();

        match model.complete(&messages).await {
            Ok(reply) => reply,
            Err(e) => {
                tracing::warn!(error = %e, "Chat completion failed, using canned reply");
                FALLBACK_REPLY.to_string()
            }
        }
    }

    /// Triage first; urgent cases short-circuit to a booking recommendation.
    pub async fn respond(&self, message: &str, history: &[ChatTurn]) -> ChatReply {
        let assessment = self.analyze_symptoms(message).await;
        if assessment.danger_level == DangerLevel::High {
            return ChatReply {
                response: format!(
                    "⚠️ ALERT: Your symptoms indicate high urgency ({}). Please book an appointment immediately.",
                    assessment.department
                ),
                recommend_action: "book_appointment".into(),
                department: Some(assessment.department),
            };
        }

        let reply = self.chat_response(message, history).await;
        let lowered = reply.to_lowercase();
        let recommend_action = if lowered.contains("book") || lowered.contains("appointment") {
            "book_appointment"
        } else {
            "none"
        };
        ChatReply {
            response: reply,
            recommend_action: recommend_action.into(),
            department: None,
        }
    }
}

/// Parses the model's triage JSON, tolerating Markdown code fences.
pub fn parse_assessment(content: &str) -> Result<TriageAssessment, TriageError> {
    let mut body = content.trim();
    if let Some((_, rest)) = body.split_once("```json") {
        body = rest.split("```").next().unwrap_or(rest);
    } else if let Some((_, rest)) = body.split_once("```") {
        body = rest.split("```").next().unwrap_or(rest);
    }
    serde_json::from_str(body.trim()).map_err(|e| TriageError::InvalidAssessment(e.to_string()))
}
