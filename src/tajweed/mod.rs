//! Tajweed rule evaluation over the aligned phoneme timeline.
//!
//! The engine walks the catalog in order, scans the expected phoneme arena
//! for trigger sites, and checks each site against the aligned recognized
//! phoneme's timing and the prosody track. A site whose required feature
//! is missing (no timestamp, no pitch) is skipped with a note; it never
//! aborts the pass. Output is deterministic for identical inputs.

pub mod rules;

use std::collections::HashMap;

use crate::align::{AlignOp, Alignment};
use crate::config::TajweedConfig;
use crate::lexicon::HAMZA_FORMS;
use crate::types::{Manner, PhonemeUnit, ProsodyTrack, Severity, Violation};

use rules::{Check, RuleSpec, Trigger, CATALOG};

/// Tolerance band around the reciter's mean pitch for heavy/light checks.
const PITCH_BAND: f32 = 0.05;

/// Clearly-pronounced threshold for letters that should assimilate, as a
/// fraction of one beat.
const MERGED_MAX_BEAT_FRACTION: f64 = 0.5;

/// Window inspected before a qalqalah letter when measuring its bounce.
const BOUNCE_CONTEXT_MS: u64 = 200;

/// Nasal checks also want the segment voiced at least this much.
const NASAL_MIN_VOICED_RATIO: f32 = 0.5;

#[derive(Debug, Default)]
pub struct RuleEvaluation {
    /// Detection order: catalog order, then arena position.
    pub violations: Vec<Violation>,
    /// "Rule not evaluable" annotations.
    pub notes: Vec<String>,
}

pub struct EvalContext<'a> {
    pub expected_arena: &'a [PhonemeUnit],
    pub recognized_arena: &'a [PhonemeUnit],
    pub phoneme_alignment: &'a Alignment,
    pub prosody: &'a ProsodyTrack,
}

enum Outcome {
    Satisfied,
    /// Word-level alignment already reported this site.
    Skip,
    NotEvaluable(&'static str),
    Violation {
        severity: Severity,
        actual: String,
        start_ms: u64,
        end_ms: u64,
    },
}

pub struct TajweedRuleEngine {
    config: TajweedConfig,
    catalog: &'static [RuleSpec],
}

impl TajweedRuleEngine {
    pub fn new(config: TajweedConfig) -> Self {
        Self {
            config,
            catalog: CATALOG,
        }
    }

    /// Replaces the built-in catalog, for callers that trim or extend the
    /// rule set.
    pub fn with_catalog(mut self, catalog: &'static [RuleSpec]) -> Self {
        self.catalog = catalog;
        self
    }

    pub fn evaluate(&self, ctx: &EvalContext<'_>) -> RuleEvaluation {
        // expected arena index -> (op, recognized arena index)
        let mut aligned: HashMap<usize, (AlignOp, Option<usize>)> = HashMap::new();
        for step in &ctx.phoneme_alignment.steps {
            if let Some(e) = step.expected {
                aligned.insert(e, (step.op, step.recognized));
            }
        }
        let utterance_pitch = mean_track_pitch(ctx.prosody);

        let mut out = RuleEvaluation::default();
        for rule in self.catalog {
            for site in trigger_sites(&rule.trigger, ctx.expected_arena) {
                let (op, recognized) = match aligned.get(&site) {
                    Some(&(op, r)) => (Some(op), r.and_then(|i| ctx.recognized_arena.get(i))),
                    // word never matched, the word error covers it
                    None => (None, None),
                };
                let anchor = neighbor_span(site, &aligned, ctx);
                let outcome =
                    self.run_check(rule, op, recognized, ctx.prosody, utterance_pitch, anchor);
                match outcome {
                    Outcome::Satisfied | Outcome::Skip => {}
                    Outcome::NotEvaluable(reason) => {
                        tracing::debug!(rule = rule.name, site, reason, "rule not evaluable");
                        out.notes.push(format!(
                            "rule {} not evaluable at phoneme {}: {}",
                            rule.name, site, reason
                        ));
                    }
                    Outcome::Violation {
                        severity,
                        actual,
                        start_ms,
                        end_ms,
                    } => out.violations.push(Violation {
                        rule: rule.name,
                        category: rule.category,
                        severity,
                        start_ms,
                        end_ms,
                        expected: rule.expectation.to_string(),
                        actual,
                        suggestion: rule.suggestion,
                    }),
                }
            }
        }
        out
    }

    fn run_check(
        &self,
        rule: &RuleSpec,
        op: Option<AlignOp>,
        recognized: Option<&PhonemeUnit>,
        prosody: &ProsodyTrack,
        utterance_pitch: Option<f32>,
        anchor: (u64, u64),
    ) -> Outcome {
        let Some(op) = op else {
            return Outcome::Skip;
        };
        match rule.check {
            Check::MinBeats(beats) => self.check_duration(beats, rule.ceiling, recognized, None),
            Check::NasalBeats(beats) => {
                self.check_duration(beats, rule.ceiling, recognized, Some(prosody))
            }
            Check::Merged => self.check_merged(op, recognized),
            Check::BecomesMeem => self.check_becomes_meem(op, recognized),
            Check::ClearlyPronounced => check_clear(op, recognized, anchor),
            Check::Bounce => self.check_bounce(recognized, prosody),
            Check::Heavy => check_pitch_band(recognized, prosody, utterance_pitch, true),
            Check::Light => check_pitch_band(recognized, prosody, utterance_pitch, false),
            Check::Stopped => check_stopped(recognized, prosody),
            Check::Articulated => check_articulated(op, recognized, anchor),
        }
    }

    /// Shared duration logic for madd and ghunnah style checks. Only the
    /// short side violates: holding slightly long is tolerated. The
    /// severity downgrades to minor when the shortfall barely exceeds the
    /// tolerance band.
    fn check_duration(
        &self,
        beats: f64,
        ceiling: Severity,
        recognized: Option<&PhonemeUnit>,
        nasal_prosody: Option<&ProsodyTrack>,
    ) -> Outcome {
        let Some(unit) = recognized else {
            return Outcome::Skip;
        };
        let (Some(start_ms), Some(end_ms)) = (unit.start_ms, unit.end_ms) else {
            return Outcome::NotEvaluable("no phoneme timestamp");
        };
        let duration = (end_ms - start_ms) as f64;
        let expected_ms = beats * self.config.beat_ms as f64;
        let tol_ms = expected_ms * self.config.duration_tolerance;

        if let Some(prosody) = nasal_prosody {
            if let Some(voiced) = prosody.voiced_ratio(start_ms, end_ms) {
                if voiced < NASAL_MIN_VOICED_RATIO {
                    return Outcome::Violation {
                        severity: ceiling,
                        actual: "segment is mostly unvoiced, no nasal resonance".to_string(),
                        start_ms,
                        end_ms,
                    };
                }
            }
        }

        let deviation = expected_ms - duration;
        if deviation <= tol_ms {
            return Outcome::Satisfied;
        }
        let excess = deviation - tol_ms;
        Outcome::Violation {
            severity: self.downgrade_for_excess(excess, tol_ms, ceiling),
            actual: format!(
                "held for {:.0} ms, expected {:.0} ms (±{:.0})",
                duration, expected_ms, tol_ms
            ),
            start_ms,
            end_ms,
        }
    }

    fn check_merged(&self, op: AlignOp, recognized: Option<&PhonemeUnit>) -> Outcome {
        match op {
            // absorbed into the next letter, which is the point
            AlignOp::Deletion => Outcome::Satisfied,
            AlignOp::Match | AlignOp::Substitution => {
                let Some(unit) = recognized else {
                    return Outcome::Skip;
                };
                let (Some(start_ms), Some(end_ms)) = (unit.start_ms, unit.end_ms) else {
                    return Outcome::NotEvaluable("no phoneme timestamp");
                };
                let duration = (end_ms - start_ms) as f64;
                let max_ms = self.config.beat_ms as f64 * MERGED_MAX_BEAT_FRACTION;
                if duration <= max_ms {
                    return Outcome::Satisfied;
                }
                Outcome::Violation {
                    severity: Severity::Major,
                    actual: format!("pronounced distinctly for {duration:.0} ms"),
                    start_ms,
                    end_ms,
                }
            }
            AlignOp::Insertion => Outcome::Skip,
        }
    }

    fn check_becomes_meem(&self, op: AlignOp, recognized: Option<&PhonemeUnit>) -> Outcome {
        match op {
            // merged away entirely still reads as converted
            AlignOp::Deletion => Outcome::Satisfied,
            AlignOp::Match => {
                let (start_ms, end_ms) = span(recognized);
                Outcome::Violation {
                    severity: Severity::Major,
                    actual: "noon pronounced unchanged before baa".to_string(),
                    start_ms,
                    end_ms,
                }
            }
            AlignOp::Substitution => {
                let Some(unit) = recognized else {
                    return Outcome::Skip;
                };
                if unit.symbol == "m" {
                    Outcome::Satisfied
                } else {
                    let (start_ms, end_ms) = span(recognized);
                    Outcome::Violation {
                        severity: Severity::Major,
                        actual: format!("replaced with '{}' instead of meem", unit.symbol),
                        start_ms,
                        end_ms,
                    }
                }
            }
            AlignOp::Insertion => Outcome::Skip,
        }
    }

    fn check_bounce(&self, recognized: Option<&PhonemeUnit>, prosody: &ProsodyTrack) -> Outcome {
        let Some(unit) = recognized else {
            return Outcome::Skip;
        };
        let (Some(start_ms), Some(end_ms)) = (unit.start_ms, unit.end_ms) else {
            return Outcome::NotEvaluable("no phoneme timestamp");
        };
        let context_start = start_ms.saturating_sub(BOUNCE_CONTEXT_MS);
        let (Some(segment), Some(context)) = (
            prosody.mean_intensity(start_ms, end_ms.max(start_ms + 1)),
            prosody.mean_intensity(context_start, start_ms),
        ) else {
            return Outcome::NotEvaluable("no intensity frames around the letter");
        };
        if context <= f32::EPSILON || segment / context >= self.config.qalqalah_intensity_ratio {
            return Outcome::Satisfied;
        }
        Outcome::Violation {
            severity: Severity::Major,
            actual: format!(
                "no audible bounce (intensity ratio {:.2}, needs {:.2})",
                segment / context,
                self.config.qalqalah_intensity_ratio
            ),
            start_ms,
            end_ms,
        }
    }

    /// A shortfall barely outside the tolerance band reads as minor no
    /// matter what the rule's ceiling is; otherwise the ceiling applies.
    fn downgrade_for_excess(&self, excess_ms: f64, tol_ms: f64, ceiling: Severity) -> Severity {
        if tol_ms > 0.0 && excess_ms < self.config.minor_deviation_fraction * tol_ms {
            Severity::Minor
        } else {
            ceiling
        }
    }
}

fn check_clear(op: AlignOp, recognized: Option<&PhonemeUnit>, anchor: (u64, u64)) -> Outcome {
    match op {
        AlignOp::Match => Outcome::Satisfied,
        AlignOp::Deletion => Outcome::Violation {
            severity: Severity::Major,
            actual: "letter dropped or assimilated where clarity is required".to_string(),
            start_ms: anchor.0,
            end_ms: anchor.1,
        },
        AlignOp::Substitution => {
            let (start_ms, end_ms) = span(recognized);
            Outcome::Violation {
                severity: Severity::Major,
                actual: "letter mutated where clear pronunciation is required".to_string(),
                start_ms,
                end_ms,
            }
        }
        AlignOp::Insertion => Outcome::Skip,
    }
}

fn check_pitch_band(
    recognized: Option<&PhonemeUnit>,
    prosody: &ProsodyTrack,
    utterance_pitch: Option<f32>,
    heavy: bool,
) -> Outcome {
    let Some(unit) = recognized else {
        return Outcome::Skip;
    };
    let (Some(start_ms), Some(end_ms)) = (unit.start_ms, unit.end_ms) else {
        return Outcome::NotEvaluable("no phoneme timestamp");
    };
    let Some(mean) = utterance_pitch else {
        return Outcome::NotEvaluable("no voiced frames in utterance");
    };
    let Some(segment) = prosody.mean_pitch(start_ms, end_ms.max(start_ms + 1)) else {
        return Outcome::NotEvaluable("no pitch estimate over the letter");
    };
    let satisfied = if heavy {
        segment <= mean * (1.0 + PITCH_BAND)
    } else {
        segment >= mean * (1.0 - PITCH_BAND)
    };
    if satisfied {
        return Outcome::Satisfied;
    }
    Outcome::Violation {
        severity: Severity::Minor,
        actual: format!(
            "letter pitched {:.0} Hz against a {:.0} Hz recitation mean ({})",
            segment,
            mean,
            if heavy { "sounds light" } else { "sounds heavy" }
        ),
        start_ms,
        end_ms,
    }
}

fn check_stopped(recognized: Option<&PhonemeUnit>, prosody: &ProsodyTrack) -> Outcome {
    let Some(unit) = recognized else {
        return Outcome::Skip;
    };
    let (Some(start_ms), Some(end_ms)) = (unit.start_ms, unit.end_ms) else {
        return Outcome::NotEvaluable("no phoneme timestamp");
    };
    let mid = start_ms + (end_ms - start_ms) / 2;
    let (Some(head), Some(tail)) = (
        prosody.mean_intensity(start_ms, mid.max(start_ms + 1)),
        prosody.mean_intensity(mid, end_ms.max(mid + 1)),
    ) else {
        return Outcome::NotEvaluable("no intensity frames over the final letter");
    };
    if tail <= head {
        return Outcome::Satisfied;
    }
    Outcome::Violation {
        severity: Severity::Minor,
        actual: "energy rises into the stop instead of settling".to_string(),
        start_ms,
        end_ms,
    }
}

fn check_articulated(
    op: AlignOp,
    recognized: Option<&PhonemeUnit>,
    anchor: (u64, u64),
) -> Outcome {
    match op {
        AlignOp::Match => Outcome::Satisfied,
        AlignOp::Substitution => {
            let (start_ms, end_ms) = span(recognized);
            let heard = recognized.map(|u| u.symbol).unwrap_or("?");
            Outcome::Violation {
                severity: Severity::Critical,
                actual: format!("articulated as '{heard}'"),
                start_ms,
                end_ms,
            }
        }
        AlignOp::Deletion => Outcome::Violation {
            severity: Severity::Critical,
            actual: "letter not articulated".to_string(),
            start_ms: anchor.0,
            end_ms: anchor.1,
        },
        AlignOp::Insertion => Outcome::Skip,
    }
}

fn span(unit: Option<&PhonemeUnit>) -> (u64, u64) {
    match unit {
        Some(u) => (u.start_ms.unwrap_or(0), u.end_ms.unwrap_or(0)),
        None => (0, 0),
    }
}

/// Locates a site whose own recognized phoneme is missing or untimed:
/// the gap between the nearest timed neighbours, collapsing to a point
/// when only one side exists.
fn neighbor_span(
    site: usize,
    aligned: &HashMap<usize, (AlignOp, Option<usize>)>,
    ctx: &EvalContext<'_>,
) -> (u64, u64) {
    let unit_at = |i: usize| {
        aligned
            .get(&i)
            .and_then(|&(_, r)| r)
            .and_then(|r| ctx.recognized_arena.get(r))
    };
    let before = (0..site)
        .rev()
        .find_map(|i| unit_at(i).and_then(|u| u.end_ms));
    let after = (site + 1..ctx.expected_arena.len())
        .find_map(|i| unit_at(i).and_then(|u| u.start_ms));
    match (before, after) {
        (Some(a), Some(b)) if a <= b => (a, b),
        (Some(a), _) => (a, a),
        (_, Some(b)) => (b, b),
        (None, None) => (0, 0),
    }
}

fn mean_track_pitch(prosody: &ProsodyTrack) -> Option<f32> {
    let voiced: Vec<f32> = prosody.points.iter().filter_map(|p| p.pitch_hz).collect();
    if voiced.is_empty() {
        return None;
    }
    Some(voiced.iter().sum::<f32>() / voiced.len() as f32)
}

fn trigger_sites(trigger: &Trigger, arena: &[PhonemeUnit]) -> Vec<usize> {
    let last = arena.len().checked_sub(1);
    let is_hamza = |unit: &PhonemeUnit| {
        HAMZA_FORMS.contains(&unit.letter) || unit.letter == 'آ'
    };
    let mut sites = Vec::new();
    for (i, unit) in arena.iter().enumerate() {
        let next = arena.get(i + 1);
        let triggered = match *trigger {
            Trigger::NaturalMadd => {
                unit.manner == Manner::LongVowel && !next.is_some_and(is_hamza)
            }
            Trigger::MaddBeforeHamza { same_word } => {
                unit.manner == Manner::LongVowel
                    && next.is_some_and(|n| {
                        is_hamza(n) && (n.token_index == unit.token_index) == same_word
                    })
            }
            Trigger::NoonSakinahBefore(set) => {
                ((unit.letter == 'ن' && unit.sakin) || unit.tanween)
                    && next.is_some_and(|n| set.contains(&n.letter))
            }
            Trigger::MeemSakinahBefore(set) => {
                unit.letter == 'م'
                    && unit.sakin
                    && next.is_some_and(|n| set.contains(&n.letter))
            }
            Trigger::DoubledNasal => unit.doubled && matches!(unit.letter, 'ن' | 'م'),
            Trigger::QalqalahSakin { verse_final } => {
                rules::is_qalqalah_letter(unit.letter)
                    && if verse_final {
                        Some(i) == last
                    } else {
                        unit.sakin && Some(i) != last
                    }
            }
            Trigger::RaWithVowel(vowels) => {
                unit.letter == 'ر' && unit.vowel.is_some_and(|v| vowels.contains(&v))
            }
            Trigger::LetterIn(set) => set.contains(&unit.letter),
            Trigger::VerseEnd => Some(i) == last,
        };
        if triggered {
            sites.push(i);
        }
    }
    sites
}
