//! Boundary to the external speech-recognition engine.
//!
//! The engine is a black box behind [`RecognitionEngine`]; swapping models
//! must not touch alignment, rule or scoring code. The adapter owns the
//! operational policy: bounded timeout, bounded retries with backoff, and
//! the aggregate low-confidence flag.

use std::sync::mpsc;
use std::sync::Arc;
use std::time::Duration;

use crate::config::TranscriptionConfig;
use crate::error::AnalysisError;
use crate::types::{AudioClip, Token, TokenSequence};

#[derive(Debug, Clone, Copy, Default)]
pub struct EngineCapabilities {
    /// Whether the engine can produce per-word start/end timestamps.
    pub word_timestamps: bool,
}

/// Raw engine output: a flat token list with per-token confidence. This
/// is the only shape the core ever sees from a recognition service.
#[derive(Debug, Clone, Default)]
pub struct RawTranscription {
    pub tokens: Vec<RawToken>,
}

#[derive(Debug, Clone)]
pub struct RawToken {
    pub text: String,
    pub start_ms: Option<u64>,
    pub end_ms: Option<u64>,
    pub confidence: f32,
}

/// Narrow interface to the external recognition service.
pub trait RecognitionEngine: Send + Sync {
    fn capabilities(&self) -> EngineCapabilities;

    /// One transcription attempt. Errors are strings because the engine's
    /// failure type is not ours to model; the adapter wraps them.
    fn transcribe(&self, clip: &AudioClip, language: &str) -> Result<RawTranscription, String>;

    fn model_version(&self) -> String;
}

pub struct TranscriptionAdapter {
    engine: Arc<dyn RecognitionEngine>,
    config: TranscriptionConfig,
    language: String,
}

impl TranscriptionAdapter {
    pub fn new(
        engine: Arc<dyn RecognitionEngine>,
        config: TranscriptionConfig,
        language: impl Into<String>,
    ) -> Self {
        Self {
            engine,
            config,
            language: language.into(),
        }
    }

    pub fn model_version(&self) -> String {
        self.engine.model_version()
    }

    pub fn capabilities(&self) -> EngineCapabilities {
        self.engine.capabilities()
    }

    /// Transcribes with the configured timeout and retry budget.
    ///
    /// Low-confidence results are returned with the aggregate flag set, not
    /// failed; only an unreachable or persistently erroring engine aborts
    /// the analysis.
    pub fn transcribe(&self, clip: &AudioClip) -> Result<TokenSequence, AnalysisError> {
        let mut backoff_ms = self.config.retry_backoff_ms;
        let mut last_err = String::new();

        for attempt in 0..=self.config.max_retries {
            if attempt > 0 {
                tracing::debug!(attempt, backoff_ms, "retrying transcription");
                std::thread::sleep(Duration::from_millis(backoff_ms));
                backoff_ms = backoff_ms.saturating_mul(2);
            }
            match self.attempt(clip)? {
                Ok(raw) => return Ok(self.finish(raw)),
                Err(message) => {
                    tracing::warn!(attempt, %message, "transcription attempt failed");
                    last_err = message;
                }
            }
        }
        Err(AnalysisError::unavailable("transcribing audio", last_err))
    }

    /// Runs one engine call on a worker thread so the timeout can be
    /// enforced from outside. Outer error is fatal (timeout); inner error
    /// is retryable (engine-reported failure).
    fn attempt(&self, clip: &AudioClip) -> Result<Result<RawTranscription, String>, AnalysisError> {
        let (tx, rx) = mpsc::channel();
        let engine = Arc::clone(&self.engine);
        let clip = clip.clone();
        let language = self.language.clone();
        std::thread::spawn(move || {
            // Receiver may be gone after a timeout; the result is dropped.
            let _ = tx.send(engine.transcribe(&clip, &language));
        });

        match rx.recv_timeout(Duration::from_millis(self.config.timeout_ms)) {
            Ok(result) => Ok(result),
            Err(mpsc::RecvTimeoutError::Timeout) => Err(AnalysisError::TranscriptionTimeout {
                timeout_ms: self.config.timeout_ms,
            }),
            Err(mpsc::RecvTimeoutError::Disconnected) => Ok(Err(
                "engine worker terminated without producing a result".to_string(),
            )),
        }
    }

    fn finish(&self, raw: RawTranscription) -> TokenSequence {
        let has_timestamps = self.engine.capabilities().word_timestamps;
        let mut confidence_sum = 0.0f32;
        let tokens: Vec<Token> = raw
            .tokens
            .into_iter()
            .map(|t| {
                confidence_sum += t.confidence;
                Token {
                    surface: t.text,
                    start_ms: if has_timestamps { t.start_ms } else { None },
                    end_ms: if has_timestamps { t.end_ms } else { None },
                    confidence: Some(t.confidence),
                }
            })
            .collect();

        let low_confidence = !tokens.is_empty()
            && confidence_sum / (tokens.len() as f32) < self.config.confidence_floor;
        if low_confidence {
            tracing::info!(
                floor = self.config.confidence_floor,
                "transcription mean confidence below floor; feedback specificity degrades"
            );
        }
        TokenSequence {
            tokens,
            low_confidence,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};

    fn clip() -> AudioClip {
        AudioClip {
            sample_rate_hz: 16_000,
            samples: vec![0.1; 1600],
        }
    }

    fn config() -> TranscriptionConfig {
        TranscriptionConfig {
            timeout_ms: 200,
            max_retries: 2,
            retry_backoff_ms: 1,
            confidence_floor: 0.4,
        }
    }

    struct FixedEngine {
        tokens: Vec<RawToken>,
        timestamps: bool,
    }

    impl RecognitionEngine for FixedEngine {
        fn capabilities(&self) -> EngineCapabilities {
            EngineCapabilities {
                word_timestamps: self.timestamps,
            }
        }
        fn transcribe(&self, _: &AudioClip, _: &str) -> Result<RawTranscription, String> {
            Ok(RawTranscription {
                tokens: self.tokens.clone(),
            })
        }
        fn model_version(&self) -> String {
            "fixed-1".to_string()
        }
    }

    struct FlakyEngine {
        failures_left: AtomicU32,
    }

    impl RecognitionEngine for FlakyEngine {
        fn capabilities(&self) -> EngineCapabilities {
            EngineCapabilities {
                word_timestamps: true,
            }
        }
        fn transcribe(&self, _: &AudioClip, _: &str) -> Result<RawTranscription, String> {
            if self.failures_left.load(Ordering::SeqCst) > 0 {
                self.failures_left.fetch_sub(1, Ordering::SeqCst);
                return Err("transient".to_string());
            }
            Ok(RawTranscription {
                tokens: vec![RawToken {
                    text: "ok".to_string(),
                    start_ms: Some(0),
                    end_ms: Some(100),
                    confidence: 0.9,
                }],
            })
        }
        fn model_version(&self) -> String {
            "flaky-1".to_string()
        }
    }

    struct HangingEngine;

    impl RecognitionEngine for HangingEngine {
        fn capabilities(&self) -> EngineCapabilities {
            EngineCapabilities::default()
        }
        fn transcribe(&self, _: &AudioClip, _: &str) -> Result<RawTranscription, String> {
            std::thread::sleep(Duration::from_secs(5));
            Ok(RawTranscription::default())
        }
        fn model_version(&self) -> String {
            "hanging-1".to_string()
        }
    }

    struct FailingEngine;

    impl RecognitionEngine for FailingEngine {
        fn capabilities(&self) -> EngineCapabilities {
            EngineCapabilities::default()
        }
        fn transcribe(&self, _: &AudioClip, _: &str) -> Result<RawTranscription, String> {
            Err("model not loaded".to_string())
        }
        fn model_version(&self) -> String {
            "failing-1".to_string()
        }
    }

    #[test]
    fn timestamps_dropped_when_engine_lacks_capability() {
        let engine = FixedEngine {
            tokens: vec![RawToken {
                text: "word".to_string(),
                start_ms: Some(0),
                end_ms: Some(500),
                confidence: 0.9,
            }],
            timestamps: false,
        };
        let adapter = TranscriptionAdapter::new(Arc::new(engine), config(), "ar");
        let seq = adapter.transcribe(&clip()).expect("transcription");
        assert_eq!(seq.tokens[0].start_ms, None);
        assert_eq!(seq.tokens[0].end_ms, None);
        assert!(!seq.low_confidence);
    }

    #[test]
    fn low_confidence_flag_set_without_failing() {
        let engine = FixedEngine {
            tokens: vec![
                RawToken {
                    text: "a".to_string(),
                    start_ms: None,
                    end_ms: None,
                    confidence: 0.2,
                },
                RawToken {
                    text: "b".to_string(),
                    start_ms: None,
                    end_ms: None,
                    confidence: 0.3,
                },
            ],
            timestamps: false,
        };
        let adapter = TranscriptionAdapter::new(Arc::new(engine), config(), "ar");
        let seq = adapter.transcribe(&clip()).expect("transcription");
        assert!(seq.low_confidence);
        assert_eq!(seq.tokens.len(), 2);
    }

    #[test]
    fn transient_failures_are_retried() {
        let engine = FlakyEngine {
            failures_left: AtomicU32::new(2),
        };
        let adapter = TranscriptionAdapter::new(Arc::new(engine), config(), "ar");
        let seq = adapter.transcribe(&clip()).expect("retried transcription");
        assert_eq!(seq.tokens[0].surface, "ok");
    }

    #[test]
    fn persistent_failure_surfaces_unavailable() {
        let adapter = TranscriptionAdapter::new(Arc::new(FailingEngine), config(), "ar");
        let err = adapter.transcribe(&clip()).unwrap_err();
        assert!(matches!(
            err,
            AnalysisError::TranscriptionUnavailable { .. }
        ));
    }

    #[test]
    fn hanging_engine_times_out() {
        let adapter = TranscriptionAdapter::new(Arc::new(HangingEngine), config(), "ar");
        let err = adapter.transcribe(&clip()).unwrap_err();
        assert!(matches!(err, AnalysisError::TranscriptionTimeout { .. }));
    }
}
