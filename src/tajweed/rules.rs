//! The rule catalog as a data table.
//!
//! Each rule is a trigger pattern over the expected phoneme sequence plus a
//! check against the aligned recognized timing and prosody. Adding a rule
//! is a table entry, not a new type. Rules never read each other's output,
//! so evaluation order only affects report ordering (catalog order, then
//! position).

use crate::lexicon::{
    EMPHATIC_LETTERS, IDGHAM_LETTERS, IKHFA_LETTERS, QALQALAH_LETTERS, THROAT_LETTERS,
};
use crate::types::{RuleCategory, Severity, ShortVowel};

/// Pattern over the expected phoneme arena that makes a rule applicable at
/// a position.
#[derive(Debug, Clone, Copy)]
pub enum Trigger {
    /// Madd letter not followed by hamza: plain elongation.
    NaturalMadd,
    /// Madd letter followed by a hamza form, in the same or the next word.
    MaddBeforeHamza { same_word: bool },
    /// Noon sakinah or tanween followed by a letter from the set.
    NoonSakinahBefore(&'static [char]),
    /// Meem sakinah followed by a letter from the set.
    MeemSakinahBefore(&'static [char]),
    /// Noon or meem carrying shadda.
    DoubledNasal,
    /// Qalqalah letter with sukun mid-verse, or verse-final where stopping
    /// imposes one.
    QalqalahSakin { verse_final: bool },
    /// Ra carrying one of the given short vowels.
    RaWithVowel(&'static [ShortVowel]),
    /// Any letter from the set.
    LetterIn(&'static [char]),
    /// The final phoneme of the utterance.
    VerseEnd,
}

/// Acoustic/timing condition compared against the aligned recognized
/// phoneme and the prosody track.
#[derive(Debug, Clone, Copy)]
pub enum Check {
    /// Held for at least this many beats (within tolerance).
    MinBeats(f64),
    /// Nasalized for at least this many beats (within tolerance).
    NasalBeats(f64),
    /// Assimilated into the next letter: a clearly pronounced segment is
    /// the violation.
    Merged,
    /// Substituted with a meem sound.
    BecomesMeem,
    /// Pronounced distinctly: dropping or mutating it is the violation.
    ClearlyPronounced,
    /// Intensity bounce relative to the immediately preceding context.
    Bounce,
    /// Heavy (tafkheem) articulation: pitch at or below the reciter's mean.
    Heavy,
    /// Light (tarqeeq) articulation: pitch at or above the reciter's mean.
    Light,
    /// Energy decays over the segment (a proper stop).
    Stopped,
    /// Articulated as the expected phoneme at all.
    Articulated,
}

pub struct RuleSpec {
    pub name: &'static str,
    pub category: RuleCategory,
    /// Ceiling severity; the engine may downgrade, never upgrade.
    pub ceiling: Severity,
    pub trigger: Trigger,
    pub check: Check,
    /// Expected-condition description used in violation text.
    pub expectation: &'static str,
    /// One deterministic suggestion per rule.
    pub suggestion: &'static str,
}

const IQLAB_LETTERS: [char; 1] = ['ب'];
const MEEM_IKHFA_LETTERS: [char; 1] = ['ب'];
const RA_HEAVY_VOWELS: [ShortVowel; 2] = [ShortVowel::Fatha, ShortVowel::Damma];
const RA_LIGHT_VOWELS: [ShortVowel; 1] = [ShortVowel::Kasra];

/// The fixed catalog, in evaluation (and therefore report) order.
pub const CATALOG: &[RuleSpec] = &[
    RuleSpec {
        name: "natural_madd",
        category: RuleCategory::Madd,
        ceiling: Severity::Major,
        trigger: Trigger::NaturalMadd,
        check: Check::MinBeats(2.0),
        expectation: "natural elongation held for 2 beats",
        suggestion: "Hold the madd letter for two full beats",
    },
    RuleSpec {
        name: "connected_madd",
        category: RuleCategory::Madd,
        ceiling: Severity::Critical,
        trigger: Trigger::MaddBeforeHamza { same_word: true },
        check: Check::MinBeats(4.0),
        expectation: "madd before hamza in the same word held for 4 beats",
        suggestion: "Lengthen the madd letter to four beats before the hamza",
    },
    RuleSpec {
        name: "separated_madd",
        category: RuleCategory::Madd,
        ceiling: Severity::Major,
        trigger: Trigger::MaddBeforeHamza { same_word: false },
        check: Check::MinBeats(4.0),
        expectation: "madd before hamza in the next word held for 4 beats",
        suggestion: "Lengthen the madd letter to four beats across the word boundary",
    },
    RuleSpec {
        name: "ghunnah_mushaddadah",
        category: RuleCategory::Ghunnah,
        ceiling: Severity::Major,
        trigger: Trigger::DoubledNasal,
        check: Check::NasalBeats(2.0),
        expectation: "doubled nasal held with ghunnah for 2 beats",
        suggestion: "Sustain the nasal sound for two beats on the doubled letter",
    },
    RuleSpec {
        name: "idgham",
        category: RuleCategory::Idgham,
        ceiling: Severity::Major,
        trigger: Trigger::NoonSakinahBefore(&IDGHAM_LETTERS),
        check: Check::Merged,
        expectation: "noon sakinah assimilated into the following letter",
        suggestion: "Merge the noon into the following letter instead of pronouncing it",
    },
    RuleSpec {
        name: "iqlab",
        category: RuleCategory::Iqlab,
        ceiling: Severity::Major,
        trigger: Trigger::NoonSakinahBefore(&IQLAB_LETTERS),
        check: Check::BecomesMeem,
        expectation: "noon sakinah converted to meem before baa",
        suggestion: "Pronounce the noon as a light meem before the baa",
    },
    RuleSpec {
        name: "idhhar_halqi",
        category: RuleCategory::Idhhar,
        ceiling: Severity::Major,
        trigger: Trigger::NoonSakinahBefore(&THROAT_LETTERS),
        check: Check::ClearlyPronounced,
        expectation: "noon sakinah pronounced clearly before a throat letter",
        suggestion: "Articulate the noon distinctly, without nasalization, before throat letters",
    },
    RuleSpec {
        name: "ikhfa_haqiqi",
        category: RuleCategory::Ikhfa,
        ceiling: Severity::Major,
        trigger: Trigger::NoonSakinahBefore(&IKHFA_LETTERS),
        check: Check::NasalBeats(2.0),
        expectation: "noon sakinah hidden with nasalization for 2 beats",
        suggestion: "Hide the noon in the nose for two beats before this letter",
    },
    RuleSpec {
        name: "ikhfa_shafawi",
        category: RuleCategory::Ikhfa,
        ceiling: Severity::Major,
        trigger: Trigger::MeemSakinahBefore(&MEEM_IKHFA_LETTERS),
        check: Check::NasalBeats(2.0),
        expectation: "meem sakinah hidden on the lips with ghunnah for 2 beats",
        suggestion: "Soften the meem with a two-beat nasal hum before the baa",
    },
    RuleSpec {
        name: "qalqalah_sughra",
        category: RuleCategory::Qalqalah,
        ceiling: Severity::Major,
        trigger: Trigger::QalqalahSakin { verse_final: false },
        check: Check::Bounce,
        expectation: "light bounce on the sakin qalqalah letter",
        suggestion: "Add a short echoing bounce when this letter carries sukun",
    },
    RuleSpec {
        name: "qalqalah_kubra",
        category: RuleCategory::Qalqalah,
        ceiling: Severity::Major,
        trigger: Trigger::QalqalahSakin { verse_final: true },
        check: Check::Bounce,
        expectation: "strong bounce on the verse-final qalqalah letter",
        suggestion: "Finish the verse with a clear bounce on the final letter",
    },
    RuleSpec {
        name: "tafkheem_ra",
        category: RuleCategory::Tafkheem,
        ceiling: Severity::Minor,
        trigger: Trigger::RaWithVowel(&RA_HEAVY_VOWELS),
        check: Check::Heavy,
        expectation: "raa with fatha or damma pronounced heavy",
        suggestion: "Give the raa a full, heavy sound when it carries fatha or damma",
    },
    RuleSpec {
        name: "tarqeeq_ra",
        category: RuleCategory::Tarqeeq,
        ceiling: Severity::Minor,
        trigger: Trigger::RaWithVowel(&RA_LIGHT_VOWELS),
        check: Check::Light,
        expectation: "raa with kasra pronounced light",
        suggestion: "Keep the raa thin and light when it carries kasra",
    },
    RuleSpec {
        name: "tafkheem_emphatic",
        category: RuleCategory::Tafkheem,
        ceiling: Severity::Minor,
        trigger: Trigger::LetterIn(&EMPHATIC_LETTERS),
        check: Check::Heavy,
        expectation: "emphatic letter pronounced heavy",
        suggestion: "Raise the back of the tongue for the emphatic letters",
    },
    RuleSpec {
        name: "waqf_sukun",
        category: RuleCategory::Waqf,
        ceiling: Severity::Minor,
        trigger: Trigger::VerseEnd,
        check: Check::Stopped,
        expectation: "verse ends on a settled stop",
        suggestion: "Let the final letter settle into sukun when stopping",
    },
    RuleSpec {
        name: "makharij_throat",
        category: RuleCategory::Makharij,
        ceiling: Severity::Critical,
        trigger: Trigger::LetterIn(&THROAT_LETTERS),
        check: Check::Articulated,
        expectation: "throat letter articulated from its correct point",
        suggestion: "Practice the articulation point of this throat letter",
    },
];

/// Qalqalah letter membership, shared with the trigger scan.
pub fn is_qalqalah_letter(letter: char) -> bool {
    QALQALAH_LETTERS.contains(&letter)
}
