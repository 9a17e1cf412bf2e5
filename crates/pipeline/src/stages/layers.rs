//! S5: choose portrait layers for the reply.
//!
//! The answer must be a bare JSON array of layer ids forming a valid
//! selection for the art variant: base, expression, decorations, hair.

use murasame_core::{BackendError, History, TextGenerator};
use murasame_sprite::ArtVariant;

use crate::error::PipelineError;
use crate::job::Stage;

#[derive(Debug, Clone)]
pub(crate) struct Selected {
    pub layers: Vec<u32>,
    pub history: History,
}

/// Strictly decode a layer list.
pub fn parse_layer_ids(text: &str) -> Result<Vec<u32>, BackendError> {
    serde_json::from_str(text.trim())
        .map_err(|e| BackendError::malformed("assistant", format!("layer list: {e}")))
}

pub(crate) async fn select_layers(
    assistant: &dyn TextGenerator,
    variant: ArtVariant,
    history: &History,
    reply: &str,
) -> Result<Selected, PipelineError> {
    let mut history = history.clone();
    history.ensure_seed(&variant.layer_prompt());

    let (answer, history) = super::ask(assistant, history, reply)
        .await
        .map_err(|e| PipelineError::backend(Stage::SelectLayers, e))?;

    let layers =
        parse_layer_ids(&answer).map_err(|e| PipelineError::backend(Stage::SelectLayers, e))?;
    variant.validate_selection(&layers)?;

    Ok(Selected { layers, history })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_helpers::{ScriptedGenerator, reply};

    #[test]
    fn parse_strict_array() {
        assert_eq!(parse_layer_ids("[1717, 1475, 1261]").unwrap(), vec![1717, 1475, 1261]);
        assert_eq!(parse_layer_ids(" [1] \n").unwrap(), vec![1]);
    }

    #[test]
    fn parse_rejects_loose_forms() {
        assert!(parse_layer_ids("```json\n[1717, 1475, 1261]\n```").is_err());
        assert!(parse_layer_ids("(1717, 1475, 1261)").is_err());
        assert!(parse_layer_ids("[\"1717\"]").is_err());
        assert!(parse_layer_ids("[-1]").is_err());
        assert!(parse_layer_ids("").is_err());
    }

    #[tokio::test]
    async fn valid_selection_accepted() {
        let assistant = ScriptedGenerator::new(vec![reply("[1718, 1406, 1719, 1261]")]);
        let selected = select_layers(&assistant, ArtVariant::B, &History::new(), "呜…")
            .await
            .unwrap();
        assert_eq!(selected.layers, vec![1718, 1406, 1719, 1261]);
        assert_eq!(selected.history.len(), 3);
        assert!(selected.history.first().unwrap().content.contains("立绘图层"));
    }

    #[tokio::test]
    async fn existing_history_is_continued() {
        let mut history = History::seeded(ArtVariant::B.layer_prompt());
        history.push(murasame_core::Turn::user("上一句"));
        history.push(murasame_core::Turn::assistant("[1717, 1306, 1261]"));

        let assistant = ScriptedGenerator::new(vec![reply("[1717, 1352, 1261]")]);
        let selected = select_layers(&assistant, ArtVariant::B, &history, "嘿嘿")
            .await
            .unwrap();
        assert_eq!(selected.history.len(), 5);
        assert_eq!(assistant.last_request().unwrap().history.len(), 3);
    }

    #[tokio::test]
    async fn malformed_answer_is_backend_error() {
        let assistant = ScriptedGenerator::new(vec![reply("我选 1717")]);
        let err = select_layers(&assistant, ArtVariant::B, &History::new(), "x")
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            PipelineError::Backend {
                stage: Stage::SelectLayers,
                source: BackendError::MalformedResponse { .. }
            }
        ));
    }

    #[tokio::test]
    async fn misordered_answer_rejected() {
        let assistant = ScriptedGenerator::new(vec![reply("[1261, 1475, 1717]")]);
        let err = select_layers(&assistant, ArtVariant::B, &History::new(), "x")
            .await
            .unwrap_err();
        assert!(matches!(err, PipelineError::InvalidLayers(_)));
    }
}
