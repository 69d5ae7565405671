use thiserror::Error;

#[derive(Debug, Error)]
pub enum AnalysisError {
    #[error("insufficient audio: {message}")]
    InsufficientAudio { message: String },
    #[error("transcription engine unavailable while {context}: {message}")]
    TranscriptionUnavailable {
        context: &'static str,
        message: String,
    },
    #[error("transcription timed out after {timeout_ms} ms")]
    TranscriptionTimeout { timeout_ms: u64 },
    #[error("empty sequence in {context}")]
    EmptySequence { context: &'static str },
    #[error("analysis cancelled after {stage}")]
    Cancelled { stage: &'static str },
    #[error("I/O error while {context}: {source}")]
    Io {
        context: &'static str,
        #[source]
        source: std::io::Error,
    },
    #[error("JSON parse error while {context}: {source}")]
    Json {
        context: &'static str,
        #[source]
        source: serde_json::Error,
    },
    #[error("invalid input: {message}")]
    InvalidInput { message: String },
}

impl AnalysisError {
    pub(crate) fn insufficient_audio(message: impl Into<String>) -> Self {
        Self::InsufficientAudio {
            message: message.into(),
        }
    }

    pub(crate) fn unavailable(context: &'static str, err: impl std::fmt::Display) -> Self {
        Self::TranscriptionUnavailable {
            context,
            message: err.to_string(),
        }
    }

    pub(crate) fn empty_sequence(context: &'static str) -> Self {
        Self::EmptySequence { context }
    }

    pub(crate) fn io(context: &'static str, source: std::io::Error) -> Self {
        Self::Io { context, source }
    }

    pub(crate) fn json(context: &'static str, source: serde_json::Error) -> Self {
        Self::Json { context, source }
    }

    pub(crate) fn invalid_input(message: impl Into<String>) -> Self {
        Self::InvalidInput {
            message: message.into(),
        }
    }
}
