//! S2: Chinese reply to archaic-styled Japanese, one shot, no retry.

use murasame_core::{History, TextGenerator};

use crate::error::PipelineError;
use crate::job::Stage;

pub const TRANSLATE_PROMPT: &str = "你是一个翻译助手，负责将用户输入的中文翻译成日文。要求：要将中文的“本座”翻译为“吾輩（わがはい）”；将“主人”翻译为“ご主人（ごしゅじん）”；将“丛雨”翻译为“ムラサメ”；“小雨”则是丛雨的昵称，翻译为“ムラサメちゃん”。且日文要有强烈的古日语风格。你只需要返回翻译即可，不需要对其中的日文汉字进行注音。";

pub(crate) async fn translate(
    assistant: &dyn TextGenerator,
    reply: &str,
) -> Result<String, PipelineError> {
    let (translated, _) = super::ask(assistant, History::seeded(TRANSLATE_PROMPT), reply)
        .await
        .map_err(|e| PipelineError::backend(Stage::Translate, e))?;
    if translated.is_empty() {
        return Err(PipelineError::EmptyTranslation);
    }
    Ok(translated)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_helpers::{ScriptedGenerator, reply};
    use murasame_core::{BackendError, NO_THINK_MARKER};

    #[tokio::test]
    async fn sends_marked_prompt_with_fresh_history() {
        let assistant = ScriptedGenerator::new(vec![reply("<think></think>ご主人、吾輩じゃ")]);
        let translated = translate(&assistant, "主人，本座在这里").await.unwrap();
        assert_eq!(translated, "ご主人、吾輩じゃ");

        let request = assistant.last_request().unwrap();
        assert_eq!(request.prompt, format!("主人，本座在这里{NO_THINK_MARKER}"));
        assert_eq!(request.history.len(), 1);
        assert!(request.history.first().unwrap().content.contains("吾輩"));
    }

    #[tokio::test]
    async fn empty_translation_fails() {
        let assistant = ScriptedGenerator::new(vec![reply("<think>…</think>  ")]);
        let err = translate(&assistant, "嗯").await.unwrap_err();
        assert!(matches!(err, PipelineError::EmptyTranslation));
    }

    #[tokio::test]
    async fn backend_error_not_retried() {
        let assistant = ScriptedGenerator::new(vec![
            Err(BackendError::Network("down".into())),
            reply("unused"),
        ]);
        let err = translate(&assistant, "嗯").await.unwrap_err();
        assert_eq!(err.stage(), Some(Stage::Translate));
        assert_eq!(assistant.calls(), 1);
    }
}
