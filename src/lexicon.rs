//! Arabic letter profiles and phonemization of canonical verse text.
//!
//! Phonemes live in one arena per utterance; each unit references its parent
//! word by index into the token sequence (no back-pointers).

use crate::types::{ArticulationPoint, Manner, PhonemeUnit, ShortVowel, Token};

pub const FATHA: char = '\u{064E}';
pub const DAMMA: char = '\u{064F}';
pub const KASRA: char = '\u{0650}';
pub const TANWEEN_FATH: char = '\u{064B}';
pub const TANWEEN_DAMM: char = '\u{064C}';
pub const TANWEEN_KASR: char = '\u{064D}';
pub const SUKUN: char = '\u{0652}';
pub const SHADDA: char = '\u{0651}';

/// Letters articulated from the throat (the Idhhar Halqi set).
pub const THROAT_LETTERS: [char; 6] = ['ء', 'ه', 'ع', 'ح', 'غ', 'خ'];

/// Qalqalah letters (قطب جد).
pub const QALQALAH_LETTERS: [char; 5] = ['ق', 'ط', 'ب', 'ج', 'د'];

/// Letters triggering Idgham after Noon Sakinah / Tanween (يرملون).
pub const IDGHAM_LETTERS: [char; 6] = ['ي', 'ر', 'م', 'ل', 'و', 'ن'];

/// The fifteen Ikhfa letters.
pub const IKHFA_LETTERS: [char; 15] = [
    'ت', 'ث', 'ج', 'د', 'ذ', 'ز', 'س', 'ش', 'ص', 'ض', 'ط', 'ظ', 'ف', 'ق', 'ك',
];

/// Always-emphatic letters.
pub const EMPHATIC_LETTERS: [char; 4] = ['ص', 'ض', 'ط', 'ظ'];

/// Hamza in any of its orthographic carriers.
pub const HAMZA_FORMS: [char; 5] = ['ء', 'أ', 'إ', 'ؤ', 'ئ'];

struct LetterProfile {
    letter: char,
    symbol: &'static str,
    articulation: ArticulationPoint,
    manner: Manner,
}

const LETTERS: &[LetterProfile] = &[
    LetterProfile { letter: 'ء', symbol: "ʔ", articulation: ArticulationPoint::Throat, manner: Manner::Plosive },
    LetterProfile { letter: 'أ', symbol: "ʔ", articulation: ArticulationPoint::Throat, manner: Manner::Plosive },
    LetterProfile { letter: 'إ', symbol: "ʔ", articulation: ArticulationPoint::Throat, manner: Manner::Plosive },
    LetterProfile { letter: 'ؤ', symbol: "ʔ", articulation: ArticulationPoint::Throat, manner: Manner::Plosive },
    LetterProfile { letter: 'ئ', symbol: "ʔ", articulation: ArticulationPoint::Throat, manner: Manner::Plosive },
    LetterProfile { letter: 'ا', symbol: "aː", articulation: ArticulationPoint::Empty, manner: Manner::LongVowel },
    LetterProfile { letter: 'آ', symbol: "ʔaː", articulation: ArticulationPoint::Throat, manner: Manner::LongVowel },
    LetterProfile { letter: 'ى', symbol: "aː", articulation: ArticulationPoint::Empty, manner: Manner::LongVowel },
    LetterProfile { letter: 'ب', symbol: "b", articulation: ArticulationPoint::Lips, manner: Manner::Plosive },
    LetterProfile { letter: 'ت', symbol: "t", articulation: ArticulationPoint::Tongue, manner: Manner::Plosive },
    LetterProfile { letter: 'ة', symbol: "t", articulation: ArticulationPoint::Tongue, manner: Manner::Plosive },
    LetterProfile { letter: 'ث', symbol: "θ", articulation: ArticulationPoint::Tongue, manner: Manner::Fricative },
    LetterProfile { letter: 'ج', symbol: "dʒ", articulation: ArticulationPoint::Tongue, manner: Manner::Plosive },
    LetterProfile { letter: 'ح', symbol: "ħ", articulation: ArticulationPoint::Throat, manner: Manner::Fricative },
    LetterProfile { letter: 'خ', symbol: "x", articulation: ArticulationPoint::Throat, manner: Manner::Fricative },
    LetterProfile { letter: 'د', symbol: "d", articulation: ArticulationPoint::Tongue, manner: Manner::Plosive },
    LetterProfile { letter: 'ذ', symbol: "ð", articulation: ArticulationPoint::Tongue, manner: Manner::Fricative },
    LetterProfile { letter: 'ر', symbol: "r", articulation: ArticulationPoint::Tongue, manner: Manner::Liquid },
    LetterProfile { letter: 'ز', symbol: "z", articulation: ArticulationPoint::Tongue, manner: Manner::Fricative },
    LetterProfile { letter: 'س', symbol: "s", articulation: ArticulationPoint::Tongue, manner: Manner::Fricative },
    LetterProfile { letter: 'ش', symbol: "ʃ", articulation: ArticulationPoint::Tongue, manner: Manner::Fricative },
    LetterProfile { letter: 'ص', symbol: "sˤ", articulation: ArticulationPoint::Tongue, manner: Manner::Fricative },
    LetterProfile { letter: 'ض', symbol: "dˤ", articulation: ArticulationPoint::Tongue, manner: Manner::Plosive },
    LetterProfile { letter: 'ط', symbol: "tˤ", articulation: ArticulationPoint::Tongue, manner: Manner::Plosive },
    LetterProfile { letter: 'ظ', symbol: "ðˤ", articulation: ArticulationPoint::Tongue, manner: Manner::Fricative },
    LetterProfile { letter: 'ع', symbol: "ʕ", articulation: ArticulationPoint::Throat, manner: Manner::Fricative },
    LetterProfile { letter: 'غ', symbol: "ɣ", articulation: ArticulationPoint::Throat, manner: Manner::Fricative },
    LetterProfile { letter: 'ف', symbol: "f", articulation: ArticulationPoint::Lips, manner: Manner::Fricative },
    LetterProfile { letter: 'ق', symbol: "q", articulation: ArticulationPoint::Tongue, manner: Manner::Plosive },
    LetterProfile { letter: 'ك', symbol: "k", articulation: ArticulationPoint::Tongue, manner: Manner::Plosive },
    LetterProfile { letter: 'ل', symbol: "l", articulation: ArticulationPoint::Tongue, manner: Manner::Liquid },
    LetterProfile { letter: 'م', symbol: "m", articulation: ArticulationPoint::Lips, manner: Manner::Nasal },
    LetterProfile { letter: 'ن', symbol: "n", articulation: ArticulationPoint::Tongue, manner: Manner::Nasal },
    LetterProfile { letter: 'ه', symbol: "h", articulation: ArticulationPoint::Throat, manner: Manner::Fricative },
    LetterProfile { letter: 'و', symbol: "w", articulation: ArticulationPoint::Lips, manner: Manner::Glide },
    LetterProfile { letter: 'ي', symbol: "j", articulation: ArticulationPoint::Tongue, manner: Manner::Glide },
];

fn profile(letter: char) -> Option<&'static LetterProfile> {
    LETTERS.iter().find(|p| p.letter == letter)
}

pub fn is_letter(c: char) -> bool {
    profile(c).is_some()
}

pub fn is_diacritic(c: char) -> bool {
    matches!(
        c,
        FATHA | DAMMA | KASRA | TANWEEN_FATH | TANWEEN_DAMM | TANWEEN_KASR | SUKUN | SHADDA
    )
}

/// Phonemize one word into the shared arena.
///
/// Diacritics attach to the preceding letter. Alif (and و/ي after a
/// matching short vowel, with no mark of their own) become long vowels;
/// that is the shape every Madd trigger looks for.
pub fn phonemize_word(word: &str, token_index: usize, arena: &mut Vec<PhonemeUnit>) {
    let start = arena.len();
    for c in word.chars() {
        if let Some(p) = profile(c) {
            let mut manner = p.manner;
            if manner == Manner::Glide {
                // و after damma / ي after kasra with no own diacritic is a
                // madd letter; the following-diacritic pass below restores
                // glide manner if a mark shows up.
                let prev_vowel = arena[start..].last().and_then(|u| u.vowel);
                let lengthens = matches!(
                    (c, prev_vowel),
                    ('و', Some(ShortVowel::Damma)) | ('ي', Some(ShortVowel::Kasra))
                );
                if lengthens {
                    manner = Manner::LongVowel;
                }
            }
            arena.push(PhonemeUnit {
                symbol: p.symbol,
                letter: c,
                articulation: p.articulation,
                manner,
                token_index,
                start_ms: None,
                end_ms: None,
                sakin: false,
                doubled: false,
                tanween: false,
                vowel: None,
            });
            continue;
        }
        let Some(unit) = arena.last_mut() else {
            continue;
        };
        if unit.token_index != token_index {
            continue;
        }
        match c {
            FATHA => unit.vowel = Some(ShortVowel::Fatha),
            DAMMA => unit.vowel = Some(ShortVowel::Damma),
            KASRA => unit.vowel = Some(ShortVowel::Kasra),
            TANWEEN_FATH => {
                unit.vowel = Some(ShortVowel::Fatha);
                unit.tanween = true;
            }
            TANWEEN_DAMM => {
                unit.vowel = Some(ShortVowel::Damma);
                unit.tanween = true;
            }
            TANWEEN_KASR => {
                unit.vowel = Some(ShortVowel::Kasra);
                unit.tanween = true;
            }
            SUKUN => unit.sakin = true,
            SHADDA => unit.doubled = true,
            _ => {}
        }
        // A diacritic on a would-be madd letter means it is consonantal.
        if unit.manner == Manner::LongVowel
            && matches!(unit.letter, 'و' | 'ي')
            && (unit.vowel.is_some() || unit.sakin)
        {
            unit.manner = Manner::Glide;
        }
    }
}

/// Phonemize a whole verse. Returns the expected tokens and the phoneme
/// arena; arena order follows token order.
pub fn phonemize_verse(text: &str) -> (Vec<Token>, Vec<PhonemeUnit>) {
    let mut tokens = Vec::new();
    let mut arena = Vec::new();
    for word in text.split_whitespace() {
        let token_index = tokens.len();
        phonemize_word(word, token_index, &mut arena);
        tokens.push(Token::expected(word));
    }
    (tokens, arena)
}

/// Distribute each word's recognized time span over its phonemes.
///
/// Long vowels and doubled letters take two shares, everything else one,
/// so an elongated word stretches its madd rather than every consonant.
/// Words without timestamps leave their phonemes untimed; duration-based
/// rules then skip those sites as not evaluable.
pub fn spread_word_timings(tokens: &[Token], arena: &mut [PhonemeUnit]) {
    let mut i = 0;
    while i < arena.len() {
        let token_index = arena[i].token_index;
        let begin = i;
        while i < arena.len() && arena[i].token_index == token_index {
            i += 1;
        }
        let span = &mut arena[begin..i];
        let (Some(start_ms), Some(end_ms)) = (
            tokens.get(token_index).and_then(|t| t.start_ms),
            tokens.get(token_index).and_then(|t| t.end_ms),
        ) else {
            continue;
        };
        if end_ms <= start_ms {
            continue;
        }

        let weight = |u: &PhonemeUnit| -> u64 {
            if u.manner == Manner::LongVowel || u.doubled {
                2
            } else {
                1
            }
        };
        let total: u64 = span.iter().map(|u| weight(u)).sum();
        if total == 0 {
            continue;
        }
        let duration = end_ms - start_ms;
        let mut consumed = 0u64;
        for unit in span.iter_mut() {
            let share = duration * weight(unit) / total;
            unit.start_ms = Some(start_ms + consumed);
            consumed += share;
            unit.end_ms = Some(start_ms + consumed);
        }
        // rounding remainder goes to the final unit
        if let Some(last) = span.last_mut() {
            last.end_ms = Some(end_ms);
        }
    }
}

/// Contiguous arena span for each token index (empty spans for words that
/// produced no phonemes).
pub fn word_spans(arena: &[PhonemeUnit], word_count: usize) -> Vec<std::ops::Range<usize>> {
    let mut spans = vec![0..0; word_count];
    let mut i = 0;
    while i < arena.len() {
        let token_index = arena[i].token_index;
        let begin = i;
        while i < arena.len() && arena[i].token_index == token_index {
            i += 1;
        }
        if token_index < word_count {
            spans[token_index] = begin..i;
        }
    }
    // fix up empty spans so they sit between their neighbors
    let mut cursor = 0;
    for span in spans.iter_mut() {
        if span.start == 0 && span.end == 0 {
            *span = cursor..cursor;
        } else {
            cursor = span.end;
        }
    }
    spans
}
