//! Pipeline errors. Cancellation is not an error; see [`crate::JobRun`].

use murasame_core::BackendError;
use murasame_sprite::SpriteError;

use crate::job::Stage;

/// Unrecoverable failures that abort a job without emitting anything.
#[derive(Debug, thiserror::Error)]
pub enum PipelineError {
    #[error("{stage} failed: {source}")]
    Backend {
        stage: Stage,
        #[source]
        source: BackendError,
    },

    #[error("translation came back empty")]
    EmptyTranslation,

    #[error("layer selection rejected: {0}")]
    InvalidLayers(#[from] SpriteError),

    #[error("job task ended without reporting an outcome")]
    Aborted,
}

impl PipelineError {
    pub(crate) fn backend(stage: Stage, source: BackendError) -> Self {
        Self::Backend { stage, source }
    }

    /// The stage that failed, when there is one.
    pub fn stage(&self) -> Option<Stage> {
        match self {
            Self::Backend { stage, .. } => Some(*stage),
            Self::EmptyTranslation => Some(Stage::Translate),
            Self::InvalidLayers(_) => Some(Stage::SelectLayers),
            Self::Aborted => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn stage_attribution() {
        let err = PipelineError::backend(Stage::Generate, BackendError::Timeout("60s".into()));
        assert_eq!(err.stage(), Some(Stage::Generate));
        assert!(err.to_string().starts_with("generate failed"));
        assert_eq!(PipelineError::EmptyTranslation.stage(), Some(Stage::Translate));
        assert_eq!(PipelineError::Aborted.stage(), None);
    }
}
