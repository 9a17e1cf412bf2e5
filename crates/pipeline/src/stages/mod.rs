//! The individual pipeline stages.
//!
//! Each stage is a plain async function over its collaborators; the
//! ordering, cancellation checks and bookkeeping live in
//! [`crate::pipeline::Pipeline`].

pub mod annotate;
pub mod emotion;
pub mod generate;
pub mod layers;
pub mod speech;
pub mod translate;

use murasame_core::{
    BackendError, GenerationRequest, History, Role, TextGenerator, control_prompt, strip_reasoning,
};

/// Send a control prompt to the assistant and strip any reasoning block
/// from the answer. Returns the answer and the extended History.
pub(crate) async fn ask(
    assistant: &dyn TextGenerator,
    history: History,
    prompt: &str,
) -> Result<(String, History), BackendError> {
    let generation = assistant
        .generate(GenerationRequest::new(
            control_prompt(prompt),
            history,
            Role::User,
        ))
        .await?;
    Ok((
        strip_reasoning(&generation.text).to_string(),
        generation.history,
    ))
}
