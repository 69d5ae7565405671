use std::time::Instant;

use crate::align::{align_phonemes, align_words};
use crate::error::AnalysisError;
use crate::features::FeatureExtractor;
use crate::feedback::{FeedbackAggregator, FeedbackInputs};
use crate::lexicon;
use crate::pipeline::traits::CancelToken;
use crate::similarity::SimilarityScorer;
use crate::tajweed::{EvalContext, TajweedRuleEngine};
use crate::transcribe::TranscriptionAdapter;
use crate::types::{AnalysisReport, AudioClip, FeatureSequence, ProsodyTrack};

/// Relative deviations against the closest reference that earn a report
/// note.
const PITCH_NOTE_FRACTION: f32 = 0.20;
const INTENSITY_NOTE_FRACTION: f32 = 0.50;
const PACE_NOTE_FRACTION: f32 = 0.25;

/// A reference recitation, either raw audio (features are extracted with
/// the same settings as the user clip) or precomputed features.
#[derive(Debug, Clone)]
pub enum Reference {
    Audio(AudioClip),
    Features(FeatureSequence),
}

/// One analysis request. Owned by the caller; the analyzer only borrows
/// it, so requests can run concurrently against a shared analyzer.
#[derive(Debug, Clone)]
pub struct AnalysisRequest {
    pub audio: AudioClip,
    /// Fully vocalized canonical text of the target verse.
    pub expected_text: String,
    pub references: Vec<Reference>,
}

pub struct Analyzer {
    extractor: FeatureExtractor,
    adapter: TranscriptionAdapter,
    rules: TajweedRuleEngine,
    scorer: SimilarityScorer,
    aggregator: FeedbackAggregator,
}

pub(crate) struct AnalyzerParts {
    pub extractor: FeatureExtractor,
    pub adapter: TranscriptionAdapter,
    pub rules: TajweedRuleEngine,
    pub scorer: SimilarityScorer,
    pub aggregator: FeedbackAggregator,
}

impl Analyzer {
    pub(crate) fn from_parts(parts: AnalyzerParts) -> Self {
        Self {
            extractor: parts.extractor,
            adapter: parts.adapter,
            rules: parts.rules,
            scorer: parts.scorer,
            aggregator: parts.aggregator,
        }
    }

    /// Runs the full pass: features, transcription, alignment, rule
    /// evaluation, similarity, aggregation. The cancel token is checked
    /// between stages.
    pub fn analyze(
        &self,
        request: &AnalysisRequest,
        cancel: &CancelToken,
    ) -> Result<AnalysisReport, AnalysisError> {
        let started = Instant::now();
        if request.expected_text.trim().is_empty() {
            return Err(AnalysisError::invalid_input("expected text is empty"));
        }

        checkpoint(cancel, "start")?;
        let (features, prosody) = self.extractor.extract(&request.audio)?;

        checkpoint(cancel, "feature extraction")?;
        let recognized = self.adapter.transcribe(&request.audio)?;

        checkpoint(cancel, "transcription")?;
        let (expected_tokens, expected_arena) = lexicon::phonemize_verse(&request.expected_text);
        let mut recognized_arena = Vec::new();
        for (index, token) in recognized.tokens.iter().enumerate() {
            lexicon::phonemize_word(&token.surface, index, &mut recognized_arena);
        }
        lexicon::spread_word_timings(&recognized.tokens, &mut recognized_arena);

        let expected_spans = lexicon::word_spans(&expected_arena, expected_tokens.len());
        let recognized_spans = lexicon::word_spans(&recognized_arena, recognized.tokens.len());
        let word_alignment = align_words(&expected_tokens, &recognized.tokens);
        let phoneme_alignment = align_phonemes(
            &word_alignment,
            &expected_arena,
            &expected_spans,
            &recognized_arena,
            &recognized_spans,
        );

        checkpoint(cancel, "alignment")?;
        let mut evaluation = self.rules.evaluate(&EvalContext {
            expected_arena: &expected_arena,
            recognized_arena: &recognized_arena,
            phoneme_alignment: &phoneme_alignment,
            prosody: &prosody,
        });

        checkpoint(cancel, "rule evaluation")?;
        let similarity = if request.references.is_empty() {
            None
        } else {
            let mut reference_features = Vec::with_capacity(request.references.len());
            let mut reference_prosody = Vec::with_capacity(request.references.len());
            for reference in &request.references {
                match reference {
                    Reference::Audio(clip) => {
                        let (sequence, track) = self.extractor.extract(clip)?;
                        reference_features.push(sequence);
                        reference_prosody.push(Some(track));
                    }
                    Reference::Features(sequence) => {
                        reference_features.push(sequence.clone());
                        reference_prosody.push(None);
                    }
                }
            }
            let (distance, best_index) = self.scorer.score(&features, &reference_features)?;
            if let Some(Some(reference)) = reference_prosody.get(best_index) {
                evaluation.notes.extend(prosody_notes(&prosody, reference));
            }
            Some((distance, best_index))
        };

        checkpoint(cancel, "similarity")?;
        let report = self.aggregator.aggregate(
            FeedbackInputs {
                expected_tokens: &expected_tokens,
                recognized_tokens: &recognized.tokens,
                word_alignment: &word_alignment,
                expected_arena: &expected_arena,
                recognized_arena: &recognized_arena,
                phoneme_alignment: &phoneme_alignment,
                evaluation,
                similarity,
                low_confidence: recognized.low_confidence,
            },
            started.elapsed().as_millis() as u64,
            self.adapter.model_version(),
        );

        tracing::info!(
            overall_score = report.overall_score,
            word_errors = report.word_errors.len(),
            violations = report.violations.len(),
            elapsed_ms = report.processing_time_ms,
            "analysis complete"
        );
        Ok(report)
    }
}

/// Coarse prosodic comparison against the closest reference. Deviations
/// become report notes, never violations.
fn prosody_notes(user: &ProsodyTrack, reference: &ProsodyTrack) -> Vec<String> {
    let mut notes = Vec::new();
    let end = u64::MAX;
    if let (Some(u), Some(r)) = (user.mean_pitch(0, end), reference.mean_pitch(0, end)) {
        if r > 0.0 && (u - r).abs() / r > PITCH_NOTE_FRACTION {
            notes.push(format!(
                "mean pitch {u:.0} Hz differs from the reference's {r:.0} Hz"
            ));
        }
    }
    if let (Some(u), Some(r)) = (
        user.mean_intensity(0, end),
        reference.mean_intensity(0, end),
    ) {
        if r > 0.0 && (u - r).abs() / r > INTENSITY_NOTE_FRACTION {
            notes.push("overall loudness differs notably from the reference".to_string());
        }
    }
    if let (Some(user_last), Some(reference_last)) =
        (user.points.last(), reference.points.last())
    {
        let (u_ms, r_ms) = (user_last.time_ms as f32, reference_last.time_ms as f32);
        if r_ms > 0.0 && (u_ms - r_ms).abs() / r_ms > PACE_NOTE_FRACTION {
            notes.push("recitation pace differs notably from the reference".to_string());
        }
    }
    notes
}

fn checkpoint(cancel: &CancelToken, stage: &'static str) -> Result<(), AnalysisError> {
    if cancel.is_cancelled() {
        tracing::debug!(stage, "analysis cancelled");
        return Err(AnalysisError::Cancelled { stage });
    }
    Ok(())
}
