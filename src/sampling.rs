//! Sampling client (spec §4.5): lets server-side tools request a completion
//! from the connected host, with capability gating and graceful fallback.

use std::time::Duration;

use crate::outbound::OutboundQueue;
use crate::protocol::{ContentBlock, CreateMessageParams, ModelPreferences, SamplingMessage};

#[derive(Debug, Clone, Copy, Default)]
pub struct SamplingPriorities {
    pub intelligence: f32,
    pub speed: f32,
    pub cost: f32,
}

/// Outcome of a sampling attempt, recorded as a span attribute (spec
/// §4.5: "all outcomes are recorded"). `None` text always carries a reason.
pub struct SamplingOutcome {
    pub text: Option<String>,
    pub fallback_reason: Option<&'static str>,
}

#[derive(Clone)]
pub struct SamplingClient {
    outbound: OutboundQueue,
    client_supports_sampling: bool,
    timeout: Duration,
}

impl SamplingClient {
    pub fn new(outbound: OutboundQueue, client_supports_sampling: bool, timeout_seconds: u64) -> Self {
        Self {
            outbound,
            client_supports_sampling,
            timeout: Duration::from_secs(timeout_seconds),
        }
    }

    /// Requests a completion. Returns `SamplingOutcome { text: None, .. }`
    /// (never an error) on any of: missing capability, transport fault,
    /// timeout, or non-text content — callers must supply a deterministic
    /// fallback in every such case (spec §4.5).
    pub async fn request_ai_generation(
        &self,
        prompt: &str,
        system_prompt: Option<&str>,
        max_tokens: u32,
        temperature: Option<f32>,
        priorities: SamplingPriorities,
    ) -> SamplingOutcome {
        if !self.client_supports_sampling {
            return SamplingOutcome {
                text: None,
                fallback_reason: Some("no_client_capability"),
            };
        }

        let request_id = self.outbound.next_server_request_id();
        let receiver = self.outbound.register_pending(request_id.clone()).await;

        let params = CreateMessageParams {
            messages: vec![SamplingMessage {
                role: "user".to_string(),
                content: ContentBlock::text(prompt),
            }],
            system_prompt: system_prompt.map(str::to_string),
            max_tokens,
            temperature,
            model_preferences: ModelPreferences {
                intelligence_priority: Some(priorities.intelligence),
                speed_priority: Some(priorities.speed),
                cost_priority: Some(priorities.cost),
                hints: Vec::new(),
            },
        };

        self.outbound.send_request(crate::protocol::JsonRpcRequest {
            jsonrpc: crate::protocol::JSONRPC_VERSION.to_string(),
            id: Some(request_id.clone()),
            method: crate::protocol::methods::SAMPLING_CREATE_MESSAGE.to_string(),
            params: Some(serde_json::to_value(&params).unwrap_or(serde_json::Value::Null)),
        });

        match tokio::time::timeout(self.timeout, receiver).await {
            Ok(Ok(result)) => match result.content {
                ContentBlock::Text { text } => SamplingOutcome {
                    text: Some(text),
                    fallback_reason: None,
                },
            },
            Ok(Err(_)) => SamplingOutcome {
                text: None,
                fallback_reason: Some("client_refused"),
            },
            Err(_) => {
                self.outbound.forget_pending(&request_id).await;
                SamplingOutcome {
                    text: None,
                    fallback_reason: Some("timeout"),
                }
            }
        }
    }
}
