use serde::Serialize;

#[derive(Debug, Clone)]
pub struct AudioClip {
    pub sample_rate_hz: u32,
    pub samples: Vec<f32>,
}

impl AudioClip {
    pub fn duration_ms(&self) -> u64 {
        if self.sample_rate_hz == 0 {
            return 0;
        }
        (self.samples.len() as u64 * 1000) / self.sample_rate_hz as u64
    }
}

/// Fixed-dimension acoustic vectors, one per hop.
///
/// Time index is implicit: frame `i` starts at `i * hop_ms`. Every vector
/// has the same dimensionality.
#[derive(Debug, Clone, PartialEq)]
pub struct FeatureSequence {
    pub hop_ms: f64,
    pub vectors: Vec<Vec<f32>>,
}

impl FeatureSequence {
    pub fn len(&self) -> usize {
        self.vectors.len()
    }

    pub fn is_empty(&self) -> bool {
        self.vectors.is_empty()
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ProsodyPoint {
    pub time_ms: u64,
    /// `None` when the frame is unvoiced.
    pub pitch_hz: Option<f32>,
    /// RMS energy of the frame.
    pub intensity: f32,
    /// Milliseconds since detected speech onset; `None` before onset.
    pub since_onset_ms: Option<u64>,
}

/// Frame-rate prosodic series; points are strictly increasing in time.
#[derive(Debug, Clone, Default)]
pub struct ProsodyTrack {
    pub points: Vec<ProsodyPoint>,
}

impl ProsodyTrack {
    /// Mean intensity over [start_ms, end_ms), `None` if no frames fall inside.
    pub fn mean_intensity(&self, start_ms: u64, end_ms: u64) -> Option<f32> {
        let mut sum = 0.0f32;
        let mut count = 0usize;
        for p in &self.points {
            if p.time_ms >= start_ms && p.time_ms < end_ms {
                sum += p.intensity;
                count += 1;
            }
        }
        (count > 0).then(|| sum / count as f32)
    }

    /// Fraction of frames in [start_ms, end_ms) that carry a pitch estimate.
    pub fn voiced_ratio(&self, start_ms: u64, end_ms: u64) -> Option<f32> {
        let mut voiced = 0usize;
        let mut count = 0usize;
        for p in &self.points {
            if p.time_ms >= start_ms && p.time_ms < end_ms {
                count += 1;
                if p.pitch_hz.is_some() {
                    voiced += 1;
                }
            }
        }
        (count > 0).then(|| voiced as f32 / count as f32)
    }

    pub fn mean_pitch(&self, start_ms: u64, end_ms: u64) -> Option<f32> {
        let mut sum = 0.0f32;
        let mut count = 0usize;
        for p in &self.points {
            if p.time_ms >= start_ms && p.time_ms < end_ms {
                if let Some(f0) = p.pitch_hz {
                    sum += f0;
                    count += 1;
                }
            }
        }
        (count > 0).then(|| sum / count as f32)
    }
}

/// A recognized or expected word.
///
/// Timing is `None` when the recognition engine cannot produce word
/// timestamps; alignment then falls back to position-only matching.
#[derive(Debug, Clone, PartialEq)]
pub struct Token {
    pub surface: String,
    pub start_ms: Option<u64>,
    pub end_ms: Option<u64>,
    /// Recognized tokens only; expected tokens carry `None`.
    pub confidence: Option<f32>,
}

impl Token {
    pub fn expected(surface: impl Into<String>) -> Self {
        Self {
            surface: surface.into(),
            start_ms: None,
            end_ms: None,
            confidence: None,
        }
    }
}

#[derive(Debug, Clone)]
pub struct TokenSequence {
    pub tokens: Vec<Token>,
    /// Aggregate flag: mean confidence fell below the configured floor.
    /// Feedback specificity degrades instead of the request failing.
    pub low_confidence: bool,
}

/// Articulation point (Makhraj) of an Arabic letter.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ArticulationPoint {
    Throat,
    Tongue,
    Lips,
    Nasal,
    Empty,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Manner {
    Vowel,
    LongVowel,
    Plosive,
    Fricative,
    Nasal,
    Liquid,
    Glide,
    Diacritic,
}

/// Smallest articulatory unit. Lives in a per-utterance arena; the parent
/// word is referenced by index, never by pointer.
#[derive(Debug, Clone, PartialEq)]
pub struct PhonemeUnit {
    pub symbol: &'static str,
    /// Source letter in the canonical text.
    pub letter: char,
    pub articulation: ArticulationPoint,
    pub manner: Manner,
    /// Index into the utterance token sequence.
    pub token_index: usize,
    pub start_ms: Option<u64>,
    pub end_ms: Option<u64>,
    /// Carries a sukun (no following vowel).
    pub sakin: bool,
    /// Carries a shadda (doubled).
    pub doubled: bool,
    /// Tanween on the final vowel of the word.
    pub tanween: bool,
    /// Short vowel attached to this letter, if any.
    pub vowel: Option<ShortVowel>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ShortVowel {
    Fatha,
    Damma,
    Kasra,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Minor,
    Major,
    Critical,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum RuleCategory {
    Madd,
    Ghunnah,
    Idgham,
    Iqlab,
    Idhhar,
    Ikhfa,
    Qalqalah,
    Tafkheem,
    Tarqeeq,
    Waqf,
    Makharij,
}

/// One detected rule failure. Immutable once created; owned by the report.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Violation {
    pub rule: &'static str,
    pub category: RuleCategory,
    pub severity: Severity,
    #[serde(rename = "startTime")]
    pub start_ms: u64,
    #[serde(rename = "endTime")]
    pub end_ms: u64,
    #[serde(rename = "expectedDescription")]
    pub expected: String,
    #[serde(rename = "actualDescription")]
    pub actual: String,
    pub suggestion: &'static str,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum WordErrorKind {
    Substitution,
    Deletion,
    Insertion,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct WordError {
    pub position: usize,
    pub expected_word: Option<String>,
    pub recognized_word: Option<String>,
    #[serde(rename = "type")]
    pub kind: WordErrorKind,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PhonemeError {
    pub position: usize,
    pub expected_phoneme: Option<String>,
    pub recognized_phoneme: Option<String>,
}

/// Final per-request assessment. Built once, immutable afterwards.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AnalysisReport {
    /// Clamped to [0, 100].
    pub overall_score: f64,
    /// Detection order, not severity order.
    pub violations: Vec<Violation>,
    pub word_errors: Vec<WordError>,
    pub phoneme_errors: Vec<PhonemeError>,
    /// Normalized DTW distance against the best reference, if any
    /// references were supplied.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub similarity_distance: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub best_reference_index: Option<usize>,
    /// Non-fatal annotations: skipped rules, low confidence, prosodic
    /// deviations.
    pub notes: Vec<String>,
    pub processing_time_ms: u64,
    pub model_version: String,
}
