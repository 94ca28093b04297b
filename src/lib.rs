//! vidaux - auxiliary data fetcher for a video-processing pipeline
//!
//! This library fetches timed transcripts from a third-party transcript provider and
//! normalizes whatever shape the provider answers with into a uniform list of segments.
//! It also gathers best-effort video metadata and drives an external text-to-speech tool.

pub mod cli;
pub mod config;
pub mod extractors;
pub mod output;
pub mod speech;
pub mod transcribe;
pub mod utils;

pub use cli::{Cli, Commands};
pub use config::Config;
pub use extractors::{MetadataCollector, MetadataSource, VideoMetadata};
pub use transcribe::{Segment, TranscriptFailure, TranscriptPipeline, TranscriptResult};

/// Result type used throughout the library
pub type Result<T> = anyhow::Result<T>;

/// Errors produced on the transcript path
#[derive(thiserror::Error, Debug)]
pub enum FetchError {
    #[error("{0} not set in environment variables")]
    ConfigurationMissing(&'static str),

    #[error("Transcript fetch failed: {0}")]
    NetworkFailure(String),

    #[error("Transcript response is not valid JSON: {0}")]
    MalformedPayload(#[from] serde_json::Error),

    #[error("Unexpected response format - found {found} but no transcript data. Keys: {keys:?}")]
    UnexpectedShape { found: String, keys: Vec<String> },

    #[error("Provider error: {0}")]
    UpstreamError(String),

    #[error("Only English transcripts are supported. {0}")]
    UnsupportedLanguage(String),

    #[error("No English transcript found")]
    NoEnglishContent,

    #[error("No transcript data found in API response")]
    EmptyTranscript,
}

impl FetchError {
    /// Stable identifier used in log fields
    pub fn kind(&self) -> &'static str {
        match self {
            FetchError::ConfigurationMissing(_) => "configuration_missing",
            FetchError::NetworkFailure(_) => "network_failure",
            FetchError::MalformedPayload(_) => "malformed_payload",
            FetchError::UnexpectedShape { .. } => "unexpected_shape",
            FetchError::UpstreamError(_) => "upstream_error",
            FetchError::UnsupportedLanguage(_) => "unsupported_language",
            FetchError::NoEnglishContent => "no_english_content",
            FetchError::EmptyTranscript => "empty_transcript",
        }
    }
}

impl From<reqwest::Error> for FetchError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            FetchError::NetworkFailure(format!("request timed out: {err}"))
        } else {
            FetchError::NetworkFailure(err.to_string())
        }
    }
}
