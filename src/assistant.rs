// 🤖 Compliance Assistant - External Text Service Boundary
// Mask → invoke → parse → unmask, with one masking table per request

use regex::Regex;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

use crate::config::{AssistantConfig, Catalogs};
use crate::error::{SentinelError, SentinelResult};
use crate::masking::{MaskingCodec, MaskingTable, PLACEHOLDER_SHAPE};

/// Fixed instruction sent ahead of every masked payload
pub const SYSTEM_INSTRUCTION: &str = "**Simulation Context:** You are an AI assistant for a \
financial compliance officer in a training simulation. The user's data contains placeholders \
like [Reason:...], [Location-..], and [Entity-..] to mask sensitive information. Analyze the \
data, including these placeholders, and answer the user's request. Use the placeholders in your \
response exactly as they appear in the provided data.";

// ============================================================================
// TEXT SERVICE
// ============================================================================

/// Opaque text-in/text-out model service.
///
/// `body` is a converse-style JSON request; the returned string is the raw
/// response body. Timeouts and transport belong to the implementation.
pub trait TextService: Send + Sync {
    fn invoke(&self, model_id: &str, body: &str) -> anyhow::Result<String>;
}

// ============================================================================
// WIRE SHAPES
// ============================================================================

#[derive(Debug, Serialize)]
struct ConverseRequest {
    messages: Vec<Message>,
    #[serde(rename = "inferenceConfig")]
    inference_config: InferenceConfig,
}

#[derive(Debug, Serialize, Deserialize)]
struct Message {
    #[serde(default)]
    role: String,
    #[serde(default)]
    content: Vec<ContentBlock>,
}

#[derive(Debug, Serialize, Deserialize)]
struct ContentBlock {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    text: Option<String>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct InferenceConfig {
    max_tokens: u32,
    temperature: f64,
}

#[derive(Debug, Serialize, Deserialize)]
struct ConverseResponse {
    #[serde(default)]
    output: Option<ConverseOutput>,
}

#[derive(Debug, Serialize, Deserialize)]
struct ConverseOutput {
    #[serde(default)]
    message: Option<Message>,
}

impl ConverseResponse {
    fn first_text(self) -> Option<String> {
        self.output?
            .message?
            .content
            .into_iter()
            .next()?
            .text
            .filter(|text| !text.is_empty())
    }
}

fn user_message(text: String) -> Message {
    Message {
        role: "user".to_string(),
        content: vec![ContentBlock { text: Some(text) }],
    }
}

// ============================================================================
// ASSISTANT
// ============================================================================

pub struct ComplianceAssistant {
    catalogs: Catalogs,
    settings: AssistantConfig,
    service: Arc<dyn TextService>,
}

impl ComplianceAssistant {
    pub fn new(catalogs: Catalogs, settings: AssistantConfig, service: Arc<dyn TextService>) -> Self {
        ComplianceAssistant {
            catalogs,
            settings,
            service,
        }
    }

    /// Answer `message` about `context` without disclosing catalog literals.
    ///
    /// On any service failure nothing is unmasked or returned; the caller
    /// gets `AssistantUnavailable`.
    pub fn chat(&self, message: &str, context: &serde_json::Value) -> SentinelResult<String> {
        if message.trim().is_empty() {
            return Err(SentinelError::InvalidRequest(
                "message is required".to_string(),
            ));
        }

        let table = MaskingTable::build(
            &self.catalogs.sanctioned_entities,
            &self.catalogs.high_risk_locations,
        )?;
        let codec = MaskingCodec::new(&table);

        let masked_context = codec.mask_json(context)?;
        let masked_message = codec.mask(message)?;
        let prompt = format!(
            "{}\n\nMasked Transaction Data:\n{}\n\nUSER INQUIRY: {}",
            SYSTEM_INSTRUCTION, masked_context, masked_message
        );

        let body = serde_json::to_string(&ConverseRequest {
            messages: vec![user_message(prompt)],
            inference_config: InferenceConfig {
                max_tokens: self.settings.max_tokens,
                temperature: self.settings.temperature,
            },
        })?;

        tracing::debug!(model_id = %self.settings.model_id, bytes = body.len(), "invoking text service");

        let raw = self
            .service
            .invoke(&self.settings.model_id, &body)
            .map_err(|e| {
                tracing::error!(error = %format!("{:#}", e), "text service failed");
                SentinelError::AssistantUnavailable(format!("{:#}", e))
            })?;

        let reply = serde_json::from_str::<ConverseResponse>(&raw)
            .map_err(|e| SentinelError::AssistantUnavailable(format!("malformed response: {}", e)))?
            .first_text()
            .ok_or_else(|| {
                SentinelError::AssistantUnavailable("response has no text content".to_string())
            })?;

        let unknown = codec.unknown_placeholders(&reply);
        if !unknown.is_empty() {
            tracing::warn!(?unknown, "reply contains placeholders that were never issued");
        }

        Ok(codec.unmask(&reply).into_owned())
    }
}

// ============================================================================
// OFFLINE SERVICE
// ============================================================================

/// Deterministic stand-in for a hosted model: lists the placeholders it was
/// shown. Lets the binaries run end to end without network access.
#[derive(Debug, Default, Clone, Copy)]
pub struct OfflineTextService;

impl TextService for OfflineTextService {
    fn invoke(&self, model_id: &str, body: &str) -> anyhow::Result<String> {
        let request: serde_json::Value = serde_json::from_str(body)?;
        let prompt = request["messages"][0]["content"][0]["text"]
            .as_str()
            .ok_or_else(|| anyhow::anyhow!("request has no prompt text"))?;

        let shape = Regex::new(PLACEHOLDER_SHAPE)?;
        let mut seen: Vec<&str> = Vec::new();
        for token in shape.find_iter(prompt).map(|m| m.as_str()) {
            if !seen.contains(&token) {
                seen.push(token);
            }
        }

        let text = if seen.is_empty() {
            format!("[{}] Offline review: no monitored entities or locations in scope.", model_id)
        } else {
            format!(
                "[{}] Offline review: the flagged activity references {}. Escalate for manual review.",
                model_id,
                seen.join(", ")
            )
        };

        let response = ConverseResponse {
            output: Some(ConverseOutput {
                message: Some(Message {
                    role: "assistant".to_string(),
                    content: vec![ContentBlock { text: Some(text) }],
                }),
            }),
        };
        Ok(serde_json::to_string(&response)?)
    }
}
