//! Frame-rate prosody: RMS intensity, autocorrelation pitch, time since
//! speech onset.

use crate::types::{ProsodyPoint, ProsodyTrack};

const ONSET_MIN_CONSEC_FRAMES: usize = 3;
const ONSET_BASELINE_FRAMES: usize = 10;
const ONSET_THRESHOLD_MULTIPLIER: f32 = 4.0;
const ONSET_MIN_THRESHOLD: f32 = 0.01;

/// Voicing decision: normalized autocorrelation peak below this is treated
/// as unvoiced.
const VOICING_THRESHOLD: f64 = 0.45;

pub(crate) fn track(
    samples: &[f32],
    sample_rate_hz: u32,
    window_size: usize,
    hop_size: usize,
    hop_ms: f64,
    pitch_min_hz: f64,
    pitch_max_hz: f64,
) -> ProsodyTrack {
    let n = samples.len();
    if n < window_size || sample_rate_hz == 0 {
        return ProsodyTrack::default();
    }
    let num_frames = (n - window_size) / hop_size + 1;

    let mut rms = Vec::with_capacity(num_frames);
    for t in 0..num_frames {
        let frame = &samples[t * hop_size..t * hop_size + window_size];
        let mean_sq =
            frame.iter().map(|&x| (x as f64) * (x as f64)).sum::<f64>() / frame.len() as f64;
        rms.push(mean_sq.sqrt() as f32);
    }

    let onset_frame = detect_onset_frame(&rms);

    let lag_min = (sample_rate_hz as f64 / pitch_max_hz).floor() as usize;
    let lag_max = ((sample_rate_hz as f64 / pitch_min_hz).ceil() as usize).min(window_size - 1);

    let mut points = Vec::with_capacity(num_frames);
    for t in 0..num_frames {
        let frame = &samples[t * hop_size..t * hop_size + window_size];
        let pitch_hz = estimate_pitch(frame, sample_rate_hz, lag_min, lag_max);
        let time_ms = (t as f64 * hop_ms) as u64;
        let since_onset_ms = onset_frame.and_then(|onset| {
            (t >= onset).then(|| ((t - onset) as f64 * hop_ms) as u64)
        });
        points.push(ProsodyPoint {
            time_ms,
            pitch_hz,
            intensity: rms[t],
            since_onset_ms,
        });
    }
    ProsodyTrack { points }
}

/// First sustained run of frames above a noise-floor-relative threshold.
fn detect_onset_frame(frame_rms: &[f32]) -> Option<usize> {
    if frame_rms.is_empty() {
        return None;
    }
    let baseline_frames = frame_rms.len().min(ONSET_BASELINE_FRAMES);
    let noise_floor =
        frame_rms.iter().take(baseline_frames).copied().sum::<f32>() / baseline_frames as f32;
    let threshold = (noise_floor * ONSET_THRESHOLD_MULTIPLIER).max(ONSET_MIN_THRESHOLD);

    let mut run_start = 0usize;
    let mut run_len = 0usize;
    for (frame_idx, rms) in frame_rms.iter().copied().enumerate() {
        if rms >= threshold {
            if run_len == 0 {
                run_start = frame_idx;
            }
            run_len += 1;
            if run_len >= ONSET_MIN_CONSEC_FRAMES {
                return Some(run_start);
            }
            continue;
        }
        run_len = 0;
    }
    None
}

/// Normalized autocorrelation pitch estimate over [lag_min, lag_max].
fn estimate_pitch(
    frame: &[f32],
    sample_rate_hz: u32,
    lag_min: usize,
    lag_max: usize,
) -> Option<f32> {
    if lag_min == 0 || lag_max <= lag_min || lag_max >= frame.len() {
        return None;
    }
    let energy: f64 = frame.iter().map(|&x| (x as f64) * (x as f64)).sum();
    if energy < 1e-9 {
        return None;
    }

    let mut best_lag = 0usize;
    let mut best_corr = 0.0f64;
    for lag in lag_min..=lag_max {
        let mut corr = 0.0f64;
        for i in 0..frame.len() - lag {
            corr += frame[i] as f64 * frame[i + lag] as f64;
        }
        if corr > best_corr {
            best_corr = corr;
            best_lag = lag;
        }
    }
    if best_lag == 0 || best_corr / energy < VOICING_THRESHOLD {
        return None;
    }
    Some(sample_rate_hz as f32 / best_lag as f32)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::f64::consts::PI;

    fn tone(freq_hz: f64, n: usize, sample_rate: u32, amp: f32) -> Vec<f32> {
        (0..n)
            .map(|i| (2.0 * PI * freq_hz * i as f64 / sample_rate as f64).sin() as f32 * amp)
            .collect()
    }

    #[test]
    fn pitch_of_pure_tone_recovered() {
        let samples = tone(200.0, 8000, 16_000, 0.5);
        let track = track(&samples, 16_000, 400, 160, 10.0, 50.0, 500.0);
        let voiced: Vec<f32> = track.points.iter().filter_map(|p| p.pitch_hz).collect();
        assert!(!voiced.is_empty());
        let mean = voiced.iter().sum::<f32>() / voiced.len() as f32;
        assert!(
            (mean - 200.0).abs() < 10.0,
            "expected ~200 Hz, got {mean} Hz"
        );
    }

    #[test]
    fn silence_has_no_pitch() {
        let samples = vec![0.0f32; 8000];
        let track = track(&samples, 16_000, 400, 160, 10.0, 50.0, 500.0);
        assert!(track.points.iter().all(|p| p.pitch_hz.is_none()));
        assert!(track.points.iter().all(|p| p.since_onset_ms.is_none()));
    }

    #[test]
    fn onset_detected_after_leading_silence() {
        let mut samples = vec![0.0f32; 4000];
        samples.extend(tone(200.0, 8000, 16_000, 0.5));
        let track = track(&samples, 16_000, 400, 160, 10.0, 50.0, 500.0);
        let first_onset = track
            .points
            .iter()
            .find(|p| p.since_onset_ms == Some(0))
            .expect("onset frame");
        // 4000 samples of silence = 250 ms; onset should land near there
        assert!(
            first_onset.time_ms >= 200 && first_onset.time_ms <= 300,
            "onset at {} ms",
            first_onset.time_ms
        );
    }
}
