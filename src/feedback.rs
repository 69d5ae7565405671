//! Merges alignment errors, rule violations and the similarity score into
//! the final report.

use crate::align::{AlignOp, Alignment};
use crate::config::ScoreWeights;
use crate::tajweed::RuleEvaluation;
use crate::types::{
    AnalysisReport, PhonemeError, PhonemeUnit, Token, WordError, WordErrorKind,
};

/// Everything one analysis pass produced, borrowed for aggregation.
pub struct FeedbackInputs<'a> {
    pub expected_tokens: &'a [Token],
    pub recognized_tokens: &'a [Token],
    pub word_alignment: &'a Alignment,
    pub expected_arena: &'a [PhonemeUnit],
    pub recognized_arena: &'a [PhonemeUnit],
    pub phoneme_alignment: &'a Alignment,
    pub evaluation: RuleEvaluation,
    /// Normalized DTW distance and best reference index, when references
    /// were supplied.
    pub similarity: Option<(f32, usize)>,
    pub low_confidence: bool,
}

pub struct FeedbackAggregator {
    weights: ScoreWeights,
}

impl FeedbackAggregator {
    pub fn new(weights: ScoreWeights) -> Self {
        Self { weights }
    }

    /// Overall score is a weighted mean of word accuracy, phoneme accuracy
    /// and inverse DTW distance, renormalized over the components present,
    /// minus a per-violation deduction scaled by severity. Clamped to
    /// [0, 100]. Violations keep detection order.
    pub fn aggregate(
        &self,
        inputs: FeedbackInputs<'_>,
        processing_time_ms: u64,
        model_version: String,
    ) -> AnalysisReport {
        let word_errors = word_errors(
            inputs.word_alignment,
            inputs.expected_tokens,
            inputs.recognized_tokens,
        );
        let phoneme_errors = phoneme_errors(
            inputs.phoneme_alignment,
            inputs.expected_arena,
            inputs.recognized_arena,
        );

        let word_accuracy =
            inputs.word_alignment.match_count() as f64 / inputs.expected_tokens.len().max(1) as f64;
        let phoneme_accuracy = inputs.phoneme_alignment.match_count() as f64
            / inputs.expected_arena.len().max(1) as f64;

        let weights = &self.weights;
        let mut weighted = weights.word_accuracy * word_accuracy
            + weights.phoneme_accuracy * phoneme_accuracy;
        let mut weight_sum = weights.word_accuracy + weights.phoneme_accuracy;
        if let Some((distance, _)) = inputs.similarity {
            weighted += weights.similarity / (1.0 + distance as f64);
            weight_sum += weights.similarity;
        }
        let positive = if weight_sum > 0.0 {
            100.0 * weighted / weight_sum
        } else {
            0.0
        };

        let penalty: f64 = inputs
            .evaluation
            .violations
            .iter()
            .map(|v| match v.severity {
                crate::types::Severity::Critical => weights.violation_penalty.critical,
                crate::types::Severity::Major => weights.violation_penalty.major,
                crate::types::Severity::Minor => weights.violation_penalty.minor,
            })
            .sum();
        let overall_score = (positive - penalty).clamp(0.0, 100.0);

        let mut notes = inputs.evaluation.notes;
        if inputs.low_confidence {
            notes.push(
                "recognition confidence below the configured floor, feedback is less specific"
                    .to_string(),
            );
        }

        tracing::debug!(
            overall_score,
            word_accuracy,
            phoneme_accuracy,
            penalty,
            violations = inputs.evaluation.violations.len(),
            "aggregated report"
        );

        AnalysisReport {
            overall_score,
            violations: inputs.evaluation.violations,
            word_errors,
            phoneme_errors,
            similarity_distance: inputs.similarity.map(|(d, _)| d),
            best_reference_index: inputs.similarity.map(|(_, i)| i),
            notes,
            processing_time_ms,
            model_version,
        }
    }
}

/// Position is the index in the expected sequence, or in the recognized
/// sequence for insertions.
fn word_errors(
    alignment: &Alignment,
    expected: &[Token],
    recognized: &[Token],
) -> Vec<WordError> {
    let mut errors = Vec::new();
    for step in &alignment.steps {
        let kind = match step.op {
            AlignOp::Match => continue,
            AlignOp::Substitution => WordErrorKind::Substitution,
            AlignOp::Deletion => WordErrorKind::Deletion,
            AlignOp::Insertion => WordErrorKind::Insertion,
        };
        errors.push(WordError {
            position: step.expected.or(step.recognized).unwrap_or(0),
            expected_word: step.expected.map(|i| expected[i].surface.clone()),
            recognized_word: step.recognized.map(|j| recognized[j].surface.clone()),
            kind,
        });
    }
    errors
}

fn phoneme_errors(
    alignment: &Alignment,
    expected_arena: &[PhonemeUnit],
    recognized_arena: &[PhonemeUnit],
) -> Vec<PhonemeError> {
    let mut errors = Vec::new();
    for step in &alignment.steps {
        if step.op == AlignOp::Match {
            continue;
        }
        errors.push(PhonemeError {
            position: step.expected.or(step.recognized).unwrap_or(0),
            expected_phoneme: step.expected.map(|i| expected_arena[i].symbol.to_string()),
            recognized_phoneme: step
                .recognized
                .map(|j| recognized_arena[j].symbol.to_string()),
        });
    }
    errors
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::align::align_words;
    use crate::lexicon::phonemize_verse;
    use crate::tajweed::RuleEvaluation;
    use crate::types::{RuleCategory, Severity, Violation};

    fn tokens(words: &[&str]) -> Vec<Token> {
        words.iter().map(|w| Token::expected(*w)).collect()
    }

    fn violation(severity: Severity) -> Violation {
        Violation {
            rule: "natural_madd",
            category: RuleCategory::Madd,
            severity,
            start_ms: 0,
            end_ms: 100,
            expected: "held".to_string(),
            actual: "short".to_string(),
            suggestion: "hold it",
        }
    }

    fn aggregate(
        expected: &[Token],
        recognized: &[Token],
        evaluation: RuleEvaluation,
        similarity: Option<(f32, usize)>,
        low_confidence: bool,
    ) -> AnalysisReport {
        let word_alignment = align_words(expected, recognized);
        // phoneme-perfect by construction in these tests
        let (_, arena) = phonemize_verse(
            &expected
                .iter()
                .map(|t| t.surface.as_str())
                .collect::<Vec<_>>()
                .join(" "),
        );
        let phoneme_alignment = crate::align::Alignment {
            steps: (0..arena.len())
                .map(|i| crate::align::AlignmentStep {
                    op: AlignOp::Match,
                    expected: Some(i),
                    recognized: Some(i),
                })
                .collect(),
        };
        FeedbackAggregator::new(ScoreWeights::default()).aggregate(
            FeedbackInputs {
                expected_tokens: expected,
                recognized_tokens: recognized,
                word_alignment: &word_alignment,
                expected_arena: &arena,
                recognized_arena: &arena,
                phoneme_alignment: &phoneme_alignment,
                evaluation,
                similarity,
                low_confidence,
            },
            7,
            "mock-1".to_string(),
        )
    }

    #[test]
    fn perfect_recitation_scores_full_marks() {
        let expected = tokens(&["بِسْمِ", "اللَّهِ"]);
        let recognized = tokens(&["بسم", "الله"]);
        let report = aggregate(
            &expected,
            &recognized,
            RuleEvaluation::default(),
            Some((0.0, 0)),
            false,
        );
        assert!(report.word_errors.is_empty());
        assert!(report.overall_score >= 95.0, "score {}", report.overall_score);
        assert_eq!(report.best_reference_index, Some(0));
        assert_eq!(report.processing_time_ms, 7);
    }

    #[test]
    fn silence_scores_near_zero() {
        let expected = tokens(&["بِسْمِ", "اللَّهِ"]);
        let word_alignment = align_words(&expected, &[]);
        let (_, arena) = phonemize_verse("بِسْمِ اللَّهِ");
        let report = FeedbackAggregator::new(ScoreWeights::default()).aggregate(
            FeedbackInputs {
                expected_tokens: &expected,
                recognized_tokens: &[],
                word_alignment: &word_alignment,
                expected_arena: &arena,
                recognized_arena: &[],
                phoneme_alignment: &Alignment::default(),
                evaluation: RuleEvaluation::default(),
                similarity: None,
                low_confidence: false,
            },
            3,
            "mock-1".to_string(),
        );
        assert_eq!(report.word_errors.len(), 2);
        assert!(report
            .word_errors
            .iter()
            .all(|e| e.kind == WordErrorKind::Deletion));
        assert!(report.overall_score < 5.0, "score {}", report.overall_score);
    }

    #[test]
    fn score_is_monotone_in_violations() {
        let expected = tokens(&["قَالَ"]);
        let recognized = tokens(&["قال"]);
        let mut previous = f64::INFINITY;
        for count in 0..4 {
            let evaluation = RuleEvaluation {
                violations: (0..count).map(|_| violation(Severity::Major)).collect(),
                notes: Vec::new(),
            };
            let report = aggregate(&expected, &recognized, evaluation, None, false);
            assert!(report.overall_score <= previous);
            previous = report.overall_score;
        }
    }

    #[test]
    fn critical_costs_more_than_minor() {
        let expected = tokens(&["قَالَ"]);
        let recognized = tokens(&["قال"]);
        let minor = aggregate(
            &expected,
            &recognized,
            RuleEvaluation {
                violations: vec![violation(Severity::Minor)],
                notes: Vec::new(),
            },
            None,
            false,
        );
        let critical = aggregate(
            &expected,
            &recognized,
            RuleEvaluation {
                violations: vec![violation(Severity::Critical)],
                notes: Vec::new(),
            },
            None,
            false,
        );
        assert!(critical.overall_score < minor.overall_score);
    }

    #[test]
    fn substituted_word_is_reported_with_both_surfaces() {
        let expected = tokens(&["قَالَ", "رَبِّ"]);
        let recognized = tokens(&["قال", "ربك"]);
        let word_alignment = align_words(&expected, &recognized);
        let errors = word_errors(&word_alignment, &expected, &recognized);
        assert_eq!(errors.len(), 1);
        assert_eq!(errors[0].kind, WordErrorKind::Substitution);
        assert_eq!(errors[0].position, 1);
        assert_eq!(errors[0].expected_word.as_deref(), Some("رَبِّ"));
        assert_eq!(errors[0].recognized_word.as_deref(), Some("ربك"));
    }

    #[test]
    fn low_confidence_adds_a_note() {
        let expected = tokens(&["قَالَ"]);
        let recognized = tokens(&["قال"]);
        let report = aggregate(&expected, &recognized, RuleEvaluation::default(), None, true);
        assert!(report.notes.iter().any(|n| n.contains("confidence")));
    }
}
