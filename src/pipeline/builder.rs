use std::sync::Arc;

use crate::config::AnalysisConfig;
use crate::error::AnalysisError;
use crate::features::FeatureExtractor;
use crate::feedback::FeedbackAggregator;
use crate::pipeline::runtime::{Analyzer, AnalyzerParts};
use crate::similarity::SimilarityScorer;
use crate::tajweed::rules::RuleSpec;
use crate::tajweed::TajweedRuleEngine;
use crate::transcribe::{RecognitionEngine, TranscriptionAdapter};

pub struct AnalyzerBuilder {
    config: AnalysisConfig,
    engine: Option<Arc<dyn RecognitionEngine>>,
    rule_catalog: Option<&'static [RuleSpec]>,
}

impl AnalyzerBuilder {
    pub fn new(config: AnalysisConfig) -> Self {
        Self {
            config,
            engine: None,
            rule_catalog: None,
        }
    }

    pub fn with_engine(mut self, engine: Arc<dyn RecognitionEngine>) -> Self {
        self.engine = Some(engine);
        self
    }

    pub fn with_rule_catalog(mut self, catalog: &'static [RuleSpec]) -> Self {
        self.rule_catalog = Some(catalog);
        self
    }

    pub fn build(self) -> Result<Analyzer, AnalysisError> {
        self.config.validate()?;
        let engine = self.engine.ok_or_else(|| {
            AnalysisError::invalid_input("a recognition engine is required")
        })?;

        let extractor = FeatureExtractor::new(&self.config);
        let adapter = TranscriptionAdapter::new(
            engine,
            self.config.transcription.clone(),
            self.config.language.clone(),
        );
        let mut rules = TajweedRuleEngine::new(self.config.tajweed.clone());
        if let Some(catalog) = self.rule_catalog {
            rules = rules.with_catalog(catalog);
        }
        Ok(Analyzer::from_parts(AnalyzerParts {
            extractor,
            adapter,
            rules,
            scorer: SimilarityScorer::new(self.config.similarity.clone()),
            aggregator: FeedbackAggregator::new(self.config.weights.clone()),
        }))
    }
}
