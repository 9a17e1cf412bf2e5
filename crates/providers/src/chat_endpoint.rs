//! Text generation over the companion's chat protocol.
//!
//! The endpoint takes `{model, prompt, history, role}`, appends the prompt to
//! the history under `role`, and answers `{response, history}` with the reply
//! appended. The persona model and the general assistant model speak the
//! same protocol on different routes.

use async_trait::async_trait;
use murasame_core::{
    BackendError, Generation, GenerationRequest, History, Role, TextGenerator, Turn,
};
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::debug;

use crate::http;

/// A `{prompt, history, role}` chat endpoint.
pub struct ChatEndpoint {
    name: String,
    url: String,
    model: String,
    client: reqwest::Client,
}

impl ChatEndpoint {
    pub fn new(
        name: impl Into<String>,
        url: impl Into<String>,
        model: impl Into<String>,
        timeout: Duration,
    ) -> Self {
        Self {
            name: name.into(),
            url: url.into(),
            model: model.into(),
            client: http::client(timeout),
        }
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    /// Decode a reply body. Anything but `{response: string, history: [turn]}`
    /// whose history starts with a system turn is malformed.
    fn decode(&self, body: &[u8]) -> Result<Generation, BackendError> {
        let reply: ChatReply = serde_json::from_slice(body)
            .map_err(|e| BackendError::malformed(&self.name, e.to_string()))?;
        let history = History::from_turns(reply.history).ok_or_else(|| {
            BackendError::malformed(&self.name, "history does not start with a system turn")
        })?;
        Ok(Generation {
            text: reply.response,
            history,
        })
    }
}

#[async_trait]
impl TextGenerator for ChatEndpoint {
    fn name(&self) -> &str {
        &self.name
    }

    async fn generate(&self, request: GenerationRequest) -> Result<Generation, BackendError> {
        let payload = ChatPayload {
            model: &self.model,
            prompt: &request.prompt,
            history: &request.history,
            role: request.role,
        };

        debug!(
            backend = %self.name,
            history_len = request.history.len(),
            role = %request.role,
            "Sending chat request"
        );

        let response = self
            .client
            .post(&self.url)
            .json(&payload)
            .send()
            .await
            .map_err(http::send_error)?;

        let response = http::check_status(&self.name, response).await?;
        let body = response.bytes().await.map_err(http::send_error)?;
        self.decode(&body)
    }
}

// --- Wire types (internal) ---

#[derive(Debug, Serialize)]
struct ChatPayload<'a> {
    model: &'a str,
    prompt: &'a str,
    history: &'a History,
    role: Role,
}

#[derive(Debug, Deserialize)]
struct ChatReply {
    response: String,
    history: Vec<Turn>,
}
