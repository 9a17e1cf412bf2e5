//! Screen description through an OpenAI-compatible vision model.
//!
//! Works with any `/chat/completions` endpoint that accepts `image_url`
//! content parts carrying a base64 data URL (Ollama, vLLM, hosted APIs).
//! Extended reasoning is switched off on every request.

use async_trait::async_trait;
use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use murasame_core::{
    BackendError, Generation, Role, Screenshot, Turn, VisionDescriber, VisionRequest,
};
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::debug;

use crate::http;

/// Seed used when the caller passes an empty History.
pub const VISION_SYSTEM_PROMPT: &str = "你现在要担任一个 AI 桌宠的视觉识别助手，用户会向你提供此时的屏幕截图，你要识别用户此时的行为，并进行描述。用户会将你的描述以 system 消息提供给另外一个处理语言的 AI 模型。";

/// An OpenAI-compatible vision backend.
pub struct OpenAiVision {
    name: String,
    base_url: String,
    model: String,
    api_key: Option<String>,
    client: reqwest::Client,
}

impl OpenAiVision {
    pub fn new(
        base_url: impl Into<String>,
        model: impl Into<String>,
        api_key: Option<String>,
        timeout: Duration,
    ) -> Self {
        Self {
            name: "vision".into(),
            base_url: base_url.into().trim_end_matches('/').to_string(),
            model: model.into(),
            api_key,
            client: http::client(timeout),
        }
    }

    fn data_url(image: &Screenshot) -> String {
        format!("data:{};base64,{}", image.mime, STANDARD.encode(&image.bytes))
    }

    /// Convert the History plus the new image prompt to API messages.
    fn to_api_messages(request: &VisionRequest) -> Vec<ApiMessage> {
        let mut messages: Vec<ApiMessage> = request
            .history
            .iter()
            .map(|turn| ApiMessage {
                role: role_name(turn.role),
                content: vec![ApiContent::Text {
                    text: turn.content.clone(),
                }],
            })
            .collect();

        if messages.is_empty() {
            messages.push(ApiMessage {
                role: "system",
                content: vec![ApiContent::Text {
                    text: VISION_SYSTEM_PROMPT.into(),
                }],
            });
        }

        messages.push(ApiMessage {
            role: "user",
            content: vec![
                ApiContent::ImageUrl {
                    image_url: ApiImageUrl {
                        url: Self::data_url(&request.image),
                    },
                },
                ApiContent::Text {
                    text: request.prompt.clone(),
                },
            ],
        });
        messages
    }

    fn decode(&self, body: &[u8]) -> Result<String, BackendError> {
        let api_response: ApiResponse = serde_json::from_slice(body)
            .map_err(|e| BackendError::malformed(&self.name, e.to_string()))?;
        api_response
            .choices
            .into_iter()
            .next()
            .and_then(|choice| choice.message.content)
            .ok_or_else(|| BackendError::malformed(&self.name, "no message content in response"))
    }
}

fn role_name(role: Role) -> &'static str {
    match role {
        Role::System => "system",
        Role::User => "user",
        Role::Assistant => "assistant",
    }
}

#[async_trait]
impl VisionDescriber for OpenAiVision {
    fn name(&self) -> &str {
        &self.name
    }

    async fn describe(&self, request: VisionRequest) -> Result<Generation, BackendError> {
        let url = format!("{}/chat/completions", self.base_url);
        let body = serde_json::json!({
            "model": self.model,
            "messages": Self::to_api_messages(&request),
            "stream": false,
            "thinking": { "type": "disabled" },
        });

        debug!(backend = %self.name, model = %self.model, bytes = request.image.bytes.len(), "Sending vision request");

        let mut builder = self.client.post(&url).json(&body);
        if let Some(key) = &self.api_key {
            builder = builder.header("Authorization", format!("Bearer {key}"));
        }
        let response = builder.send().await.map_err(http::send_error)?;
        let response = http::check_status(&self.name, response).await?;
        let bytes = response.bytes().await.map_err(http::send_error)?;
        let text = self.decode(&bytes)?;

        let mut history = request.history;
        history.ensure_seed(VISION_SYSTEM_PROMPT);
        history.push(Turn::user(request.prompt).with_image(request.image.mime));
        history.push(Turn::assistant(text.clone()));

        Ok(Generation { text, history })
    }
}

// --- OpenAI API types (internal) ---

#[derive(Debug, Serialize)]
struct ApiMessage {
    role: &'static str,
    content: Vec<ApiContent>,
}

#[derive(Debug, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
enum ApiContent {
    Text { text: String },
    ImageUrl { image_url: ApiImageUrl },
}

#[derive(Debug, Serialize)]
struct ApiImageUrl {
    url: String,
}

#[derive(Debug, Deserialize)]
struct ApiResponse {
    choices: Vec<ApiChoice>,
}

#[derive(Debug, Deserialize)]
struct ApiChoice {
    message: ApiResponseMessage,
}

#[derive(Debug, Deserialize)]
struct ApiResponseMessage {
    content: Option<String>,
}
