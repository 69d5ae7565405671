pub mod align;
pub mod config;
pub mod error;
pub mod features;
pub mod feedback;
pub mod lexicon;
pub mod pipeline;
pub mod similarity;
pub mod tajweed;
pub mod transcribe;
pub mod types;

pub use config::AnalysisConfig;
pub use error::AnalysisError;
pub use features::FeatureExtractor;
pub use pipeline::builder::AnalyzerBuilder;
pub use pipeline::runtime::{AnalysisRequest, Analyzer, Reference};
pub use pipeline::traits::CancelToken;
pub use transcribe::{EngineCapabilities, RawToken, RawTranscription, RecognitionEngine};
pub use types::{AnalysisReport, AudioClip, Severity, Violation};
