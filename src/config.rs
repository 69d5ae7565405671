use std::path::Path;

use crate::error::AnalysisError;

#[derive(Debug, Clone, serde::Deserialize)]
#[serde(default)]
pub struct AnalysisConfig {
    pub expected_sample_rate_hz: u32,
    /// Inputs shorter than this are rejected before any heavy processing.
    pub min_duration_ms: u64,
    /// Peak amplitude below this counts as silence.
    pub silence_floor: f32,
    pub language: String,

    pub feature: FeatureConfig,
    pub transcription: TranscriptionConfig,
    pub tajweed: TajweedConfig,
    pub similarity: SimilarityConfig,
    pub weights: ScoreWeights,
}

#[derive(Debug, Clone, serde::Deserialize)]
#[serde(default)]
pub struct FeatureConfig {
    /// Analysis window in samples (25 ms at 16 kHz).
    pub window_size: usize,
    /// Hop between frames in samples (10 ms at 16 kHz).
    pub hop_size: usize,
    pub fft_size: usize,
    pub num_mels: usize,
    pub low_freq_hz: f64,
    pub high_freq_hz: f64,
    pub pre_emphasis: f64,
    /// Pitch search band, recitation sits well inside 50-500 Hz.
    pub pitch_min_hz: f64,
    pub pitch_max_hz: f64,
}

#[derive(Debug, Clone, serde::Deserialize)]
#[serde(default)]
pub struct TranscriptionConfig {
    pub timeout_ms: u64,
    pub max_retries: u32,
    pub retry_backoff_ms: u64,
    /// Mean token confidence below this sets the aggregate low-confidence
    /// flag on the returned sequence.
    pub confidence_floor: f32,
}

#[derive(Debug, Clone, serde::Deserialize)]
#[serde(default)]
pub struct TajweedConfig {
    /// Length of one beat (harakah). Calibrated, not canonical.
    pub beat_ms: u64,
    /// Relative tolerance on expected durations.
    pub duration_tolerance: f64,
    /// Deviations under this fraction of the tolerance are downgraded
    /// to minor severity.
    pub minor_deviation_fraction: f64,
    /// Intensity rise over the immediately preceding context accepted as a
    /// Qalqalah bounce.
    pub qalqalah_intensity_ratio: f32,
}

#[derive(Debug, Clone, serde::Deserialize)]
#[serde(default)]
pub struct SimilarityConfig {
    /// Sequences longer than this short-circuit to `max_distance`.
    pub length_ceiling: usize,
    pub max_distance: f32,
}

#[derive(Debug, Clone, serde::Deserialize)]
#[serde(default)]
pub struct ScoreWeights {
    pub word_accuracy: f64,
    pub phoneme_accuracy: f64,
    pub similarity: f64,
    pub violation_penalty: ViolationPenalty,
}

/// Score deduction per violation, in points on the 0-100 scale.
#[derive(Debug, Clone, serde::Deserialize)]
#[serde(default)]
pub struct ViolationPenalty {
    pub critical: f64,
    pub major: f64,
    pub minor: f64,
}

impl AnalysisConfig {
    pub const DEFAULT_SAMPLE_RATE_HZ: u32 = 16_000;

    pub fn load(path: &Path) -> Result<Self, AnalysisError> {
        let data = std::fs::read_to_string(path)
            .map_err(|e| AnalysisError::io("read analysis config", e))?;
        serde_json::from_str(&data).map_err(|e| AnalysisError::json("parse analysis config", e))
    }

    pub(crate) fn validate(&self) -> Result<(), AnalysisError> {
        if self.expected_sample_rate_hz == 0 {
            return Err(AnalysisError::invalid_input("sample rate must be non-zero"));
        }
        if !self.feature.fft_size.is_power_of_two() {
            return Err(AnalysisError::invalid_input(format!(
                "fft_size must be a power of two, got {}",
                self.feature.fft_size
            )));
        }
        if self.feature.hop_size == 0 || self.feature.window_size == 0 {
            return Err(AnalysisError::invalid_input(
                "window_size and hop_size must be non-zero",
            ));
        }
        if self.feature.window_size > self.feature.fft_size {
            return Err(AnalysisError::invalid_input(
                "window_size must not exceed fft_size",
            ));
        }
        if self.tajweed.beat_ms == 0 {
            return Err(AnalysisError::invalid_input("beat_ms must be non-zero"));
        }
        Ok(())
    }

    pub fn hop_ms(&self) -> f64 {
        self.feature.hop_size as f64 / self.expected_sample_rate_hz as f64 * 1000.0
    }
}

impl Default for AnalysisConfig {
    fn default() -> Self {
        Self {
            expected_sample_rate_hz: Self::DEFAULT_SAMPLE_RATE_HZ,
            min_duration_ms: 300,
            silence_floor: 1e-3,
            language: "ar".to_string(),
            feature: FeatureConfig::default(),
            transcription: TranscriptionConfig::default(),
            tajweed: TajweedConfig::default(),
            similarity: SimilarityConfig::default(),
            weights: ScoreWeights::default(),
        }
    }
}

impl Default for FeatureConfig {
    fn default() -> Self {
        Self {
            window_size: 400,
            hop_size: 160,
            fft_size: 512,
            num_mels: 40,
            low_freq_hz: 20.0,
            high_freq_hz: 7600.0,
            pre_emphasis: 0.97,
            pitch_min_hz: 50.0,
            pitch_max_hz: 500.0,
        }
    }
}

impl Default for TranscriptionConfig {
    fn default() -> Self {
        Self {
            timeout_ms: 30_000,
            max_retries: 2,
            retry_backoff_ms: 250,
            confidence_floor: 0.4,
        }
    }
}

impl Default for TajweedConfig {
    fn default() -> Self {
        Self {
            beat_ms: 240,
            duration_tolerance: 0.15,
            minor_deviation_fraction: 0.10,
            qalqalah_intensity_ratio: 1.15,
        }
    }
}

impl Default for SimilarityConfig {
    fn default() -> Self {
        Self {
            length_ceiling: 4000,
            max_distance: 1000.0,
        }
    }
}

impl Default for ScoreWeights {
    fn default() -> Self {
        Self {
            word_accuracy: 0.30,
            phoneme_accuracy: 0.30,
            similarity: 0.25,
            violation_penalty: ViolationPenalty::default(),
        }
    }
}

impl Default for ViolationPenalty {
    fn default() -> Self {
        Self {
            critical: 12.0,
            major: 6.0,
            minor: 2.0,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_is_valid() {
        let config = AnalysisConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(
            config.expected_sample_rate_hz,
            AnalysisConfig::DEFAULT_SAMPLE_RATE_HZ
        );
        // 160 samples at 16 kHz = 10 ms hop
        assert!((config.hop_ms() - 10.0).abs() < 1e-9);
    }

    #[test]
    fn partial_json_falls_back_to_defaults() {
        let json = r#"{
            "min_duration_ms": 500,
            "weights": { "word_accuracy": 0.5 }
        }"#;
        let config: AnalysisConfig = serde_json::from_str(json).expect("valid config json");
        assert_eq!(config.min_duration_ms, 500);
        assert!((config.weights.word_accuracy - 0.5).abs() < 1e-12);
        // untouched sections keep defaults
        assert_eq!(config.feature.num_mels, 40);
        assert_eq!(config.transcription.max_retries, 2);
    }

    #[test]
    fn non_power_of_two_fft_rejected() {
        let mut config = AnalysisConfig::default();
        config.feature.fft_size = 500;
        assert!(config.validate().is_err());
    }

    #[test]
    fn zero_beat_rejected() {
        let mut config = AnalysisConfig::default();
        config.tajweed.beat_ms = 0;
        assert!(config.validate().is_err());
    }
}
