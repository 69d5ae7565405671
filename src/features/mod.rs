//! Acoustic front end: log mel filterbank features plus a prosodic track.
//!
//! Deterministic by construction: identical samples and config always
//! produce identical output. Input validation happens here so the rest of
//! the pipeline never sees silent or too-short clips.

mod fft;
pub(crate) mod prosody;

use std::f64::consts::PI;

use crate::config::{AnalysisConfig, FeatureConfig};
use crate::error::AnalysisError;
use crate::types::{AudioClip, FeatureSequence, ProsodyTrack};

/// Quietest-frame quantile used to estimate the stationary noise floor.
const NOISE_FLOOR_QUANTILE: f64 = 0.10;

pub struct FeatureExtractor {
    config: FeatureConfig,
    expected_sample_rate_hz: u32,
    min_duration_ms: u64,
    silence_floor: f32,
    hop_ms: f64,
    window: Vec<f64>,
    mel_bank: Vec<Vec<f64>>,
    pitch_min_hz: f64,
    pitch_max_hz: f64,
}

impl FeatureExtractor {
    pub fn new(config: &AnalysisConfig) -> Self {
        let feature = config.feature.clone();
        let window = hamming_window(feature.window_size);
        let mel_bank = mel_filter_bank(
            feature.num_mels,
            feature.fft_size,
            config.expected_sample_rate_hz as usize,
            feature.low_freq_hz,
            feature.high_freq_hz,
        );
        Self {
            expected_sample_rate_hz: config.expected_sample_rate_hz,
            min_duration_ms: config.min_duration_ms,
            silence_floor: config.silence_floor,
            hop_ms: config.hop_ms(),
            pitch_min_hz: feature.pitch_min_hz,
            pitch_max_hz: feature.pitch_max_hz,
            config: feature,
            window,
            mel_bank,
        }
    }

    /// Validates the clip and computes (features, prosody). Pure over the
    /// input buffer.
    pub fn extract(
        &self,
        clip: &AudioClip,
    ) -> Result<(FeatureSequence, ProsodyTrack), AnalysisError> {
        if clip.duration_ms() < self.min_duration_ms {
            return Err(AnalysisError::insufficient_audio(format!(
                "clip is {} ms, minimum is {} ms",
                clip.duration_ms(),
                self.min_duration_ms
            )));
        }
        let peak = clip.samples.iter().fold(0.0f32, |m, &s| m.max(s.abs()));
        if peak < self.silence_floor {
            return Err(AnalysisError::insufficient_audio(
                "clip is silent (peak amplitude below floor)",
            ));
        }
        if clip.sample_rate_hz != self.expected_sample_rate_hz {
            tracing::warn!(
                expected_rate_hz = self.expected_sample_rate_hz,
                actual_rate_hz = clip.sample_rate_hz,
                "feature extractor expects a specific sample rate; quality may degrade"
            );
        }

        // Peak-normalize so the gate thresholds behave the same regardless
        // of recording level.
        let scale = 1.0 / peak;
        let samples: Vec<f32> = clip.samples.iter().map(|&s| s * scale).collect();

        let features = self.log_mel(&samples);
        let prosody = prosody::track(
            &samples,
            clip.sample_rate_hz,
            self.config.window_size,
            self.config.hop_size,
            self.hop_ms,
            self.pitch_min_hz,
            self.pitch_max_hz,
        );

        Ok((
            FeatureSequence {
                hop_ms: self.hop_ms,
                vectors: features,
            },
            prosody,
        ))
    }

    fn log_mel(&self, samples: &[f32]) -> Vec<Vec<f32>> {
        let cfg = &self.config;
        let n = samples.len();
        if n < cfg.window_size {
            return Vec::new();
        }

        let num_frames = (n - cfg.window_size) / cfg.hop_size + 1;
        let nfft = cfg.fft_size;
        let half_fft = nfft / 2 + 1;

        let mut power_frames = Vec::with_capacity(num_frames);
        let mut real = vec![0.0f64; nfft];
        let mut imag = vec![0.0f64; nfft];

        for t in 0..num_frames {
            let start = t * cfg.hop_size;

            for i in 0..cfg.window_size {
                let mut s = samples[start + i] as f64;
                if start + i > 0 {
                    s -= cfg.pre_emphasis * samples[start + i - 1] as f64;
                }
                real[i] = s * self.window[i];
            }
            for v in real[cfg.window_size..].iter_mut() {
                *v = 0.0;
            }
            for v in imag.iter_mut() {
                *v = 0.0;
            }
            fft::fft(&mut real, &mut imag);

            let mut power = vec![0.0f64; half_fft];
            for i in 0..half_fft {
                power[i] = real[i] * real[i] + imag[i] * imag[i];
            }
            power_frames.push(power);
        }

        subtract_noise_floor(&mut power_frames);

        let mut features = Vec::with_capacity(num_frames);
        for power in &power_frames {
            let mut mel = vec![0.0f32; cfg.num_mels];
            for (m, filter) in self.mel_bank.iter().enumerate() {
                let mut sum = 0.0f64;
                for (k, &w) in filter.iter().enumerate() {
                    sum += w * power[k];
                }
                mel[m] = (sum.max(1e-10)).ln() as f32;
            }
            features.push(mel);
        }
        features
    }
}

/// Stationary spectral gate: per-bin floor estimated from the quietest
/// frames is subtracted everywhere, clamped at zero.
fn subtract_noise_floor(power_frames: &mut [Vec<f64>]) {
    if power_frames.is_empty() {
        return;
    }
    let half_fft = power_frames[0].len();
    let quiet_count = ((power_frames.len() as f64 * NOISE_FLOOR_QUANTILE).ceil() as usize).max(1);

    let mut energies: Vec<(f64, usize)> = power_frames
        .iter()
        .enumerate()
        .map(|(i, p)| (p.iter().sum::<f64>(), i))
        .collect();
    energies.sort_by(|a, b| a.0.partial_cmp(&b.0).unwrap_or(std::cmp::Ordering::Equal));

    let mut floor = vec![0.0f64; half_fft];
    for &(_, idx) in energies.iter().take(quiet_count) {
        for (k, &p) in power_frames[idx].iter().enumerate() {
            floor[k] += p;
        }
    }
    for f in floor.iter_mut() {
        *f /= quiet_count as f64;
    }

    for power in power_frames.iter_mut() {
        for (k, p) in power.iter_mut().enumerate() {
            *p = (*p - floor[k]).max(0.0);
        }
    }
}

fn hamming_window(n: usize) -> Vec<f64> {
    if n <= 1 {
        return vec![1.0; n];
    }
    (0..n)
        .map(|i| 0.54 - 0.46 * (2.0 * PI * i as f64 / (n - 1) as f64).cos())
        .collect()
}

fn hz_to_mel(hz: f64) -> f64 {
    2595.0 * (1.0 + hz / 700.0).log10()
}

fn mel_to_hz(mel: f64) -> f64 {
    700.0 * (10.0_f64.powf(mel / 2595.0) - 1.0)
}

/// Triangular mel filterbank, `[num_mels][fft_size / 2 + 1]`.
fn mel_filter_bank(
    num_mels: usize,
    fft_size: usize,
    sample_rate: usize,
    low_freq: f64,
    high_freq: f64,
) -> Vec<Vec<f64>> {
    let half_fft = fft_size / 2 + 1;
    let low_mel = hz_to_mel(low_freq);
    let high_mel = hz_to_mel(high_freq);

    let step = (high_mel - low_mel) / (num_mels + 1) as f64;
    let mel_points: Vec<f64> = (0..num_mels + 2)
        .map(|i| low_mel + i as f64 * step)
        .collect();

    let mut bins: Vec<usize> = mel_points
        .iter()
        .map(|&m| {
            let hz = mel_to_hz(m);
            let bin = (hz * fft_size as f64 / sample_rate as f64).round() as usize;
            bin.min(half_fft - 1)
        })
        .collect();

    // Each filter needs at least one bin of width.
    for i in 1..bins.len() {
        if bins[i] <= bins[i - 1] {
            bins[i] = bins[i - 1] + 1;
        }
    }

    let mut bank = Vec::with_capacity(num_mels);
    for m in 0..num_mels {
        let mut filter = vec![0.0f64; half_fft];
        let left = bins[m];
        let center = bins[m + 1];
        let right = bins[m + 2];

        for k in left..center.min(half_fft) {
            if center != left {
                filter[k] = (k - left) as f64 / (center - left) as f64;
            }
        }
        for k in center..=right.min(half_fft - 1) {
            if right != center {
                filter[k] = (right - k) as f64 / (right - center) as f64;
            }
        }
        bank.push(filter);
    }
    bank
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::AnalysisConfig;
    use crate::types::AudioClip;

    fn tone(freq_hz: f64, duration_s: f64, sample_rate: u32) -> Vec<f32> {
        let n = (duration_s * sample_rate as f64) as usize;
        (0..n)
            .map(|i| (2.0 * PI * freq_hz * i as f64 / sample_rate as f64).sin() as f32 * 0.5)
            .collect()
    }

    #[test]
    fn too_short_clip_rejected() {
        let extractor = FeatureExtractor::new(&AnalysisConfig::default());
        let clip = AudioClip {
            sample_rate_hz: 16_000,
            samples: tone(220.0, 0.1, 16_000),
        };
        let err = extractor.extract(&clip).unwrap_err();
        assert!(matches!(err, AnalysisError::InsufficientAudio { .. }));
    }

    #[test]
    fn silent_clip_rejected() {
        let extractor = FeatureExtractor::new(&AnalysisConfig::default());
        let clip = AudioClip {
            sample_rate_hz: 16_000,
            samples: vec![0.0; 16_000],
        };
        let err = extractor.extract(&clip).unwrap_err();
        assert!(matches!(err, AnalysisError::InsufficientAudio { .. }));
    }

    #[test]
    fn feature_dimensions_are_uniform() {
        let config = AnalysisConfig::default();
        let extractor = FeatureExtractor::new(&config);
        let clip = AudioClip {
            sample_rate_hz: 16_000,
            samples: tone(220.0, 1.0, 16_000),
        };
        let (features, prosody) = extractor.extract(&clip).expect("extraction");
        assert!(!features.is_empty());
        assert!(features
            .vectors
            .iter()
            .all(|v| v.len() == config.feature.num_mels));
        assert_eq!(features.len(), prosody.points.len());
        // prosody timestamps strictly increase
        assert!(prosody
            .points
            .windows(2)
            .all(|w| w[0].time_ms < w[1].time_ms));
    }

    #[test]
    fn extraction_is_deterministic() {
        let extractor = FeatureExtractor::new(&AnalysisConfig::default());
        let clip = AudioClip {
            sample_rate_hz: 16_000,
            samples: tone(300.0, 0.5, 16_000),
        };
        let (a, _) = extractor.extract(&clip).expect("first run");
        let (b, _) = extractor.extract(&clip).expect("second run");
        assert_eq!(a, b);
    }

    #[test]
    fn mel_bank_shape() {
        let bank = mel_filter_bank(40, 512, 16_000, 20.0, 7600.0);
        assert_eq!(bank.len(), 40);
        assert_eq!(bank[0].len(), 257);
        assert!(bank.iter().flatten().all(|&v| v >= 0.0));
    }
}
