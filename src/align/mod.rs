//! Word- and phoneme-level edit alignment.
//!
//! Both levels run the same minimum-edit-distance dynamic program
//! (costs: match 0, substitution 1, insertion 1, deletion 1). Phoneme
//! alignment is restricted to matched-word spans so a word-level error
//! never smears across word boundaries.

use std::ops::Range;

use crate::lexicon;
use crate::types::{PhonemeUnit, Token};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AlignOp {
    Match,
    Substitution,
    Insertion,
    Deletion,
}

/// One element of an alignment. Indices point into the expected and
/// recognized sequences (or arenas); `None` marks the missing side of an
/// insertion or deletion.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AlignmentStep {
    pub op: AlignOp,
    pub expected: Option<usize>,
    pub recognized: Option<usize>,
}

/// Monotonic, non-crossing mapping between two ordered sequences. Every
/// element of both sequences appears in exactly one step, in order.
#[derive(Debug, Clone, Default)]
pub struct Alignment {
    pub steps: Vec<AlignmentStep>,
}

impl Alignment {
    pub fn match_count(&self) -> usize {
        self.steps
            .iter()
            .filter(|s| s.op == AlignOp::Match)
            .count()
    }

    pub fn is_all_matches(&self) -> bool {
        self.steps.iter().all(|s| s.op == AlignOp::Match)
    }

    /// Recognized index aligned to the given expected index, for matches
    /// and substitutions only.
    pub fn recognized_for_expected(&self, expected: usize) -> Option<usize> {
        self.steps
            .iter()
            .find(|s| s.expected == Some(expected))
            .and_then(|s| s.recognized)
    }
}

/// Core Levenshtein DP over opaque indices. `eq` decides equality.
///
/// Tie-break: diagonal (match/substitution) wins over deletion, which wins
/// over insertion, so equal-cost paths prefer one substitution over an
/// insertion+deletion pair.
fn align_by(
    expected_len: usize,
    recognized_len: usize,
    eq: impl Fn(usize, usize) -> bool,
) -> Vec<(AlignOp, Option<usize>, Option<usize>)> {
    let n = expected_len;
    let m = recognized_len;

    // dist[i][j] = cost of aligning expected[..i] with recognized[..j]
    let mut dist = vec![vec![0u32; m + 1]; n + 1];
    for i in 0..=n {
        dist[i][0] = i as u32;
    }
    for j in 0..=m {
        dist[0][j] = j as u32;
    }
    for i in 1..=n {
        for j in 1..=m {
            let sub_cost = if eq(i - 1, j - 1) { 0 } else { 1 };
            let diagonal = dist[i - 1][j - 1] + sub_cost;
            let deletion = dist[i - 1][j] + 1;
            let insertion = dist[i][j - 1] + 1;
            dist[i][j] = diagonal.min(deletion).min(insertion);
        }
    }

    let mut steps = Vec::with_capacity(n.max(m));
    let (mut i, mut j) = (n, m);
    while i > 0 || j > 0 {
        if i > 0 && j > 0 {
            let sub_cost = if eq(i - 1, j - 1) { 0 } else { 1 };
            if dist[i][j] == dist[i - 1][j - 1] + sub_cost {
                let op = if sub_cost == 0 {
                    AlignOp::Match
                } else {
                    AlignOp::Substitution
                };
                steps.push((op, Some(i - 1), Some(j - 1)));
                i -= 1;
                j -= 1;
                continue;
            }
        }
        if i > 0 && dist[i][j] == dist[i - 1][j] + 1 {
            steps.push((AlignOp::Deletion, Some(i - 1), None));
            i -= 1;
            continue;
        }
        steps.push((AlignOp::Insertion, None, Some(j - 1)));
        j -= 1;
    }
    steps.reverse();
    steps
}

/// Surface form with diacritics stripped: ASR output is typically bare
/// while canonical text is fully vocalized.
fn bare_surface(surface: &str) -> String {
    surface
        .chars()
        .filter(|&c| !lexicon::is_diacritic(c))
        .collect()
}

/// Word-level alignment of recognized tokens against the expected verse.
///
/// An empty recognized sequence yields all-deletions: every expected word
/// is flagged missing, deterministically, with no error.
pub fn align_words(expected: &[Token], recognized: &[Token]) -> Alignment {
    let expected_bare: Vec<String> = expected.iter().map(|t| bare_surface(&t.surface)).collect();
    let recognized_bare: Vec<String> =
        recognized.iter().map(|t| bare_surface(&t.surface)).collect();

    let steps = align_by(expected.len(), recognized.len(), |i, j| {
        expected_bare[i] == recognized_bare[j]
    });
    Alignment {
        steps: steps
            .into_iter()
            .map(|(op, e, r)| AlignmentStep {
                op,
                expected: e,
                recognized: r,
            })
            .collect(),
    }
}

/// Phoneme alignment inside matched-word spans only.
///
/// Steps carry arena indices (expected arena / recognized arena). Spans of
/// words that were substituted, inserted or deleted are skipped entirely;
/// their errors are already reported at word level.
pub fn align_phonemes(
    word_alignment: &Alignment,
    expected_arena: &[PhonemeUnit],
    expected_spans: &[Range<usize>],
    recognized_arena: &[PhonemeUnit],
    recognized_spans: &[Range<usize>],
) -> Alignment {
    let mut steps = Vec::new();
    for step in &word_alignment.steps {
        if step.op != AlignOp::Match {
            continue;
        }
        let (Some(e_word), Some(r_word)) = (step.expected, step.recognized) else {
            continue;
        };
        let e_span = expected_spans[e_word].clone();
        let r_span = recognized_spans[r_word].clone();
        let e_units = &expected_arena[e_span.clone()];
        let r_units = &recognized_arena[r_span.clone()];

        let word_steps = align_by(e_units.len(), r_units.len(), |i, j| {
            e_units[i].symbol == r_units[j].symbol
        });
        for (op, e, r) in word_steps {
            steps.push(AlignmentStep {
                op,
                expected: e.map(|i| e_span.start + i),
                recognized: r.map(|j| r_span.start + j),
            });
        }
    }
    Alignment { steps }
}
