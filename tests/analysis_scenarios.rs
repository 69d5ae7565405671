//! End-to-end scenarios through the public analyzer API with a scripted
//! recognition engine.

use std::sync::Arc;
use std::time::Duration;

use tajweed_rs::transcribe::{EngineCapabilities, RawToken, RawTranscription};
use tajweed_rs::types::FeatureSequence;
use tajweed_rs::{
    AnalysisConfig, AnalysisError, AnalysisRequest, Analyzer, AnalyzerBuilder, AudioClip,
    CancelToken, RecognitionEngine, Reference,
};

struct ScriptedEngine {
    tokens: Vec<RawToken>,
    delay: Option<Duration>,
}

impl RecognitionEngine for ScriptedEngine {
    fn capabilities(&self) -> EngineCapabilities {
        EngineCapabilities {
            word_timestamps: true,
        }
    }

    fn transcribe(&self, _: &AudioClip, _: &str) -> Result<RawTranscription, String> {
        if let Some(delay) = self.delay {
            std::thread::sleep(delay);
        }
        Ok(RawTranscription {
            tokens: self.tokens.clone(),
        })
    }

    fn model_version(&self) -> String {
        "scripted-1".to_string()
    }
}

fn token(text: &str, start_ms: u64, end_ms: u64) -> RawToken {
    RawToken {
        text: text.to_string(),
        start_ms: Some(start_ms),
        end_ms: Some(end_ms),
        confidence: 0.95,
    }
}

fn tone_clip(duration_ms: u64) -> AudioClip {
    let rate = 16_000u32;
    let samples = (0..(rate as u64 * duration_ms / 1000))
        .map(|i| (i as f32 * 2.0 * std::f32::consts::PI * 180.0 / rate as f32).sin() * 0.4)
        .collect();
    AudioClip {
        sample_rate_hz: rate,
        samples,
    }
}

fn analyzer_with(engine: ScriptedEngine, config: AnalysisConfig) -> Analyzer {
    AnalyzerBuilder::new(config)
        .with_engine(Arc::new(engine))
        .build()
        .expect("analyzer build")
}

fn basmala_request(references: Vec<Reference>) -> AnalysisRequest {
    AnalysisRequest {
        audio: tone_clip(2200),
        expected_text: "بِسْمِ اللَّهِ".to_string(),
        references,
    }
}

/// Word timings generous enough that every duration rule is satisfied:
/// the alif of Allah gets well over two beats.
fn accurate_basmala_tokens() -> Vec<RawToken> {
    vec![token("بسم", 0, 600), token("الله", 620, 2060)]
}

#[test]
fn accurate_recitation_scores_high_with_no_word_errors() {
    let analyzer = analyzer_with(
        ScriptedEngine {
            tokens: accurate_basmala_tokens(),
            delay: None,
        },
        AnalysisConfig::default(),
    );
    let report = analyzer
        .analyze(&basmala_request(Vec::new()), &CancelToken::new())
        .expect("report");

    assert!(report.word_errors.is_empty(), "{:?}", report.word_errors);
    assert!(report.phoneme_errors.is_empty(), "{:?}", report.phoneme_errors);
    assert!(
        !report.violations.iter().any(|v| v.rule == "natural_madd"),
        "{:?}",
        report.violations
    );
    assert!(report.overall_score >= 95.0, "score {}", report.overall_score);
    assert_eq!(report.model_version, "scripted-1");
}

#[test]
fn rushed_madd_lowers_the_score() {
    let accurate = analyzer_with(
        ScriptedEngine {
            tokens: accurate_basmala_tokens(),
            delay: None,
        },
        AnalysisConfig::default(),
    )
    .analyze(&basmala_request(Vec::new()), &CancelToken::new())
    .expect("accurate report");

    // Allah compressed into 400 ms: the alif cannot reach two beats.
    let rushed = analyzer_with(
        ScriptedEngine {
            tokens: vec![token("بسم", 0, 600), token("الله", 620, 1020)],
            delay: None,
        },
        AnalysisConfig::default(),
    )
    .analyze(&basmala_request(Vec::new()), &CancelToken::new())
    .expect("rushed report");

    assert!(rushed
        .violations
        .iter()
        .any(|v| v.rule == "natural_madd"));
    assert!(rushed.overall_score < accurate.overall_score);
}

#[test]
fn empty_recognition_reports_full_deletion_without_crashing() {
    let analyzer = analyzer_with(
        ScriptedEngine {
            tokens: Vec::new(),
            delay: None,
        },
        AnalysisConfig::default(),
    );
    let report = analyzer
        .analyze(&basmala_request(Vec::new()), &CancelToken::new())
        .expect("report");

    assert_eq!(report.word_errors.len(), 2);
    assert!(report.overall_score < 5.0, "score {}", report.overall_score);
}

#[test]
fn transcription_timeout_aborts_without_a_report() {
    let mut config = AnalysisConfig::default();
    config.transcription.timeout_ms = 50;
    config.transcription.max_retries = 0;
    let analyzer = analyzer_with(
        ScriptedEngine {
            tokens: accurate_basmala_tokens(),
            delay: Some(Duration::from_secs(3)),
        },
        config,
    );
    let err = analyzer
        .analyze(&basmala_request(Vec::new()), &CancelToken::new())
        .unwrap_err();
    assert!(matches!(err, AnalysisError::TranscriptionTimeout { .. }));
}

#[test]
fn closest_reference_index_is_reported() {
    let analyzer = analyzer_with(
        ScriptedEngine {
            tokens: accurate_basmala_tokens(),
            delay: None,
        },
        AnalysisConfig::default(),
    );
    // Reference 0 is a constant far-off sequence; reference 1 is the
    // user's own audio.
    let far = FeatureSequence {
        hop_ms: 10.0,
        vectors: vec![vec![50.0; 40]; 60],
    };
    let request = basmala_request(vec![
        Reference::Features(far),
        Reference::Audio(tone_clip(2200)),
    ]);
    let report = analyzer
        .analyze(&request, &CancelToken::new())
        .expect("report");
    assert_eq!(report.best_reference_index, Some(1));
    assert!(report.similarity_distance.is_some());
}

#[test]
fn cancellation_between_stages_surfaces_the_stage() {
    let analyzer = analyzer_with(
        ScriptedEngine {
            tokens: accurate_basmala_tokens(),
            delay: None,
        },
        AnalysisConfig::default(),
    );
    let cancel = CancelToken::new();
    cancel.cancel();
    let err = analyzer
        .analyze(&basmala_request(Vec::new()), &cancel)
        .unwrap_err();
    assert!(matches!(err, AnalysisError::Cancelled { .. }));
}
