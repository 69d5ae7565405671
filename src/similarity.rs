//! DTW-based similarity between the user's feature sequence and one or
//! more reference recitations.

use crate::config::SimilarityConfig;
use crate::error::AnalysisError;
use crate::types::FeatureSequence;

pub struct SimilarityScorer {
    config: SimilarityConfig,
}

impl SimilarityScorer {
    pub fn new(config: SimilarityConfig) -> Self {
        Self { config }
    }

    /// Normalized DTW distance to each reference; returns the minimum and
    /// its index. Zero-length input on either side is an upstream contract
    /// violation, not a degraded comparison.
    pub fn score(
        &self,
        user: &FeatureSequence,
        references: &[FeatureSequence],
    ) -> Result<(f32, usize), AnalysisError> {
        if user.is_empty() {
            return Err(AnalysisError::empty_sequence("user feature sequence"));
        }
        if references.is_empty() {
            return Err(AnalysisError::empty_sequence("reference feature list"));
        }

        let mut best_distance = f32::INFINITY;
        let mut best_index = 0usize;
        for (index, reference) in references.iter().enumerate() {
            if reference.is_empty() {
                return Err(AnalysisError::empty_sequence("reference feature sequence"));
            }
            let distance = self.dtw_distance(&user.vectors, &reference.vectors);
            if distance < best_distance {
                best_distance = distance;
                best_index = index;
            }
        }
        Ok((best_distance, best_index))
    }

    /// Standard DTW with Euclidean local cost, O(n·m) time, two-row space.
    /// Distance is normalized by max(n, m) so utterances of different
    /// lengths stay comparable. Oversized inputs short-circuit to the
    /// capped maximum to bound worst-case latency.
    fn dtw_distance(&self, user: &[Vec<f32>], reference: &[Vec<f32>]) -> f32 {
        let n = user.len();
        let m = reference.len();
        if n > self.config.length_ceiling || m > self.config.length_ceiling {
            tracing::warn!(
                user_len = n,
                reference_len = m,
                ceiling = self.config.length_ceiling,
                "sequence exceeds DTW length ceiling, returning capped distance"
            );
            return self.config.max_distance;
        }

        let mut prev = vec![0.0f64; m];
        let mut curr = vec![0.0f64; m];

        prev[0] = local_cost(&user[0], &reference[0]);
        for j in 1..m {
            prev[j] = prev[j - 1] + local_cost(&user[0], &reference[j]);
        }
        for i in 1..n {
            curr[0] = prev[0] + local_cost(&user[i], &reference[0]);
            for j in 1..m {
                let cost = local_cost(&user[i], &reference[j]);
                curr[j] = cost + prev[j].min(curr[j - 1]).min(prev[j - 1]);
            }
            std::mem::swap(&mut prev, &mut curr);
        }

        (prev[m - 1] / n.max(m) as f64) as f32
    }
}

fn local_cost(a: &[f32], b: &[f32]) -> f64 {
    debug_assert_eq!(a.len(), b.len(), "feature dimensionality must be uniform");
    let mut sum = 0.0f64;
    for (x, y) in a.iter().zip(b) {
        let d = (*x - *y) as f64;
        sum += d * d;
    }
    sum.sqrt()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::SimilarityConfig;

    fn seq(vectors: Vec<Vec<f32>>) -> FeatureSequence {
        FeatureSequence {
            hop_ms: 10.0,
            vectors,
        }
    }

    fn ramp(len: usize, offset: f32) -> FeatureSequence {
        seq((0..len)
            .map(|i| vec![i as f32 * 0.1 + offset, (i as f32 * 0.05) + offset])
            .collect())
    }

    #[test]
    fn self_distance_is_zero() {
        let scorer = SimilarityScorer::new(SimilarityConfig::default());
        let a = ramp(50, 0.0);
        let (distance, index) = scorer.score(&a, &[a.clone()]).expect("score");
        assert_eq!(index, 0);
        assert!(distance.abs() < 1e-6);
    }

    #[test]
    fn closer_reference_wins() {
        let scorer = SimilarityScorer::new(SimilarityConfig::default());
        let user = ramp(50, 0.0);
        let far = ramp(50, 5.0);
        let near = ramp(55, 0.05);
        let (distance, index) = scorer.score(&user, &[far, near]).expect("score");
        assert_eq!(index, 1);
        let (self_distance, _) = scorer.score(&user, &[user.clone()]).expect("score");
        assert!(self_distance < distance);
    }

    #[test]
    fn different_lengths_are_comparable() {
        let scorer = SimilarityScorer::new(SimilarityConfig::default());
        let user = ramp(40, 0.0);
        let stretched = ramp(80, 0.0);
        let (distance, _) = scorer.score(&user, &[stretched]).expect("score");
        // warped, not punished linearly for length
        assert!(distance < 2.0, "distance was {distance}");
    }

    #[test]
    fn empty_user_sequence_is_an_error() {
        let scorer = SimilarityScorer::new(SimilarityConfig::default());
        let err = scorer.score(&seq(vec![]), &[ramp(10, 0.0)]).unwrap_err();
        assert!(matches!(err, AnalysisError::EmptySequence { .. }));
    }

    #[test]
    fn empty_reference_is_an_error() {
        let scorer = SimilarityScorer::new(SimilarityConfig::default());
        let err = scorer.score(&ramp(10, 0.0), &[seq(vec![])]).unwrap_err();
        assert!(matches!(err, AnalysisError::EmptySequence { .. }));
    }

    #[test]
    fn oversized_sequence_hits_the_cap() {
        let scorer = SimilarityScorer::new(SimilarityConfig {
            length_ceiling: 20,
            max_distance: 1000.0,
        });
        let (distance, _) = scorer
            .score(&ramp(21, 0.0), &[ramp(10, 0.0)])
            .expect("capped score");
        assert_eq!(distance, 1000.0);
    }
}
