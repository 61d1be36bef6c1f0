//! Gemini generateContent client
//!
//! Speaks the generative language REST API with the computer-use tool
//! declared, so the model answers with browser function calls. Request
//! building and response parsing are pure functions over JSON values; the
//! client itself is a thin reqwest wrapper around them.

use base64::engine::general_purpose::STANDARD as B64;
use base64::Engine as _;
use serde_json::{json, Map, Value};
use std::time::Duration;

use crate::core::{
    Config, ConversationTurn, FunctionCall, InlineImage, Part, Result, Role, WebpilotError,
};
use crate::llm::traits::{ModelClient, ModelTurn};

use async_trait::async_trait;

/// Client for the Gemini generateContent endpoint
pub struct GeminiClient {
    http: reqwest::Client,
    model_name: String,
    api_key: String,
    url: String,
}

impl GeminiClient {
    pub fn new(config: &Config) -> Result<Self> {
        if config.model.api_key.is_empty() {
            return Err(WebpilotError::config(
                "GEMINI_API_KEY is not set; export it or add it to a .env file",
            ));
        }

        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.model.timeout_secs))
            .build()?;

        Ok(Self {
            http,
            model_name: config.model.name.clone(),
            api_key: config.model.api_key.clone(),
            url: config.generate_url(),
        })
    }
}

#[async_trait]
impl ModelClient for GeminiClient {
    async fn generate(&self, history: &[ConversationTurn]) -> Result<ModelTurn> {
        let body = build_request_body(history);

        tracing::debug!(model = %self.model_name, turns = history.len(), "requesting model turn");

        let response = self
            .http
            .post(&self.url)
            .header("x-goog-api-key", &self.api_key)
            .json(&body)
            .send()
            .await?;

        let status = response.status();
        let payload: Value = response.json().await?;

        if !status.is_success() {
            let message = payload
                .pointer("/error/message")
                .and_then(|m| m.as_str())
                .unwrap_or("no error detail");
            return Err(WebpilotError::config(format!(
                "model request failed with {}: {}",
                status, message
            )));
        }

        parse_response(&payload)
    }

    fn name(&self) -> &str {
        &self.model_name
    }
}

/// Serialize conversation history into a generateContent request body.
///
/// Declares the computer-use tool so the model plans browser actions.
pub fn build_request_body(history: &[ConversationTurn]) -> Value {
    let contents: Vec<Value> = history.iter().map(encode_turn).collect();

    json!({
        "contents": contents,
        "tools": [{
            "computerUse": { "environment": "ENVIRONMENT_BROWSER" }
        }],
    })
}

fn encode_turn(turn: &ConversationTurn) -> Value {
    let role = match turn.role {
        Role::User => "user",
        Role::Model => "model",
    };
    let parts: Vec<Value> = turn.parts.iter().map(encode_part).collect();
    json!({ "role": role, "parts": parts })
}

fn encode_part(part: &Part) -> Value {
    match part {
        Part::Text(text) => json!({ "text": text }),
        Part::Image(image) => encode_inline_image(image),
        Part::FunctionCall(call) => json!({
            "functionCall": {
                "name": call.name,
                "args": Value::Object(call.wire_args()),
            }
        }),
        Part::FunctionResponse(resp) => {
            let mut body = json!({
                "name": resp.name,
                "response": Value::Object(resp.response.clone()),
            });
            if let Some(ref image) = resp.image {
                body["parts"] = json!([encode_inline_image(image)]);
            }
            json!({ "functionResponse": body })
        }
    }
}

fn encode_inline_image(image: &InlineImage) -> Value {
    json!({
        "inlineData": {
            "mimeType": image.mime_type,
            "data": B64.encode(&image.data),
        }
    })
}

/// Parse a generateContent response into a model turn.
///
/// A prompt-feedback block reason and an empty candidate are both fatal: the
/// loop cannot act on a turn with no content.
pub fn parse_response(payload: &Value) -> Result<ModelTurn> {
    if let Some(reason) = payload
        .pointer("/promptFeedback/blockReason")
        .and_then(|r| r.as_str())
    {
        let detail = payload
            .pointer("/promptFeedback/blockReasonMessage")
            .and_then(|m| m.as_str())
            .map(|m| format!("{}: {}", reason, m))
            .unwrap_or_else(|| reason.to_string());
        return Err(WebpilotError::ModelBlocked(detail));
    }

    let parts = payload
        .pointer("/candidates/0/content/parts")
        .and_then(|p| p.as_array())
        .ok_or(WebpilotError::EmptyModelResponse)?;

    if parts.is_empty() {
        return Err(WebpilotError::EmptyModelResponse);
    }

    let decoded: Vec<Part> = parts.iter().filter_map(decode_part).collect();
    if decoded.is_empty() {
        return Err(WebpilotError::EmptyModelResponse);
    }

    Ok(ModelTurn::new(decoded))
}

fn decode_part(part: &Value) -> Option<Part> {
    if let Some(text) = part.get("text").and_then(|t| t.as_str()) {
        return Some(Part::text(text));
    }

    if let Some(call) = part.get("functionCall") {
        let name = call.get("name")?.as_str()?;
        let args: Map<String, Value> = call
            .get("args")
            .and_then(|a| a.as_object())
            .cloned()
            .unwrap_or_default();
        return Some(Part::FunctionCall(FunctionCall::from_wire(name, args)));
    }

    None
}
