use async_trait::async_trait;
use regex::Regex;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::sync::OnceLock;

pub mod oembed;
pub mod youtube;

use crate::config::Config;
use crate::Result;

/// Best-effort video metadata; unresolved fields stay `None`
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct VideoMetadata {
    pub title: Option<String>,
    pub description: Option<String>,
    /// Clock-formatted length, "M:SS" or "H:MM:SS"
    pub duration: Option<String>,
    pub thumbnail: Option<String>,
}

impl VideoMetadata {
    /// Overlay the non-empty fields of `other` onto `self`
    pub fn merge(&mut self, other: VideoMetadata) {
        fn take(slot: &mut Option<String>, value: Option<String>) {
            if let Some(value) = value.filter(|v| !v.is_empty()) {
                *slot = Some(value);
            }
        }

        take(&mut self.title, other.title);
        take(&mut self.description, other.description);
        take(&mut self.duration, other.duration);
        take(&mut self.thumbnail, other.thumbnail);
    }
}

/// Trait for a single metadata source
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait MetadataSource: Send + Sync {
    /// Fetch whatever this source knows about a video
    async fn fetch(&self, video_id: &str) -> Result<VideoMetadata>;

    /// Name used in diagnostics
    fn source_name(&self) -> &'static str;
}

/// Queries every registered source in order and merges what they return
pub struct MetadataCollector {
    sources: Vec<Box<dyn MetadataSource>>,
}

impl MetadataCollector {
    /// Create a collector with the oEmbed and watch-page sources
    pub fn new(config: &Config) -> Result<Self> {
        let client = Client::builder()
            .timeout(config.metadata_timeout())
            .build()?;

        let mut collector = Self::empty();
        collector.register(Box::new(oembed::OEmbedSource::new(client.clone())));
        collector.register(Box::new(youtube::WatchPageSource::new(
            client,
            config.metadata.user_agent.clone(),
        )));

        Ok(collector)
    }

    pub fn empty() -> Self {
        Self {
            sources: Vec::new(),
        }
    }

    /// Register a new source; later sources override earlier ones
    pub fn register(&mut self, source: Box<dyn MetadataSource>) {
        self.sources.push(source);
    }

    pub fn source_names(&self) -> Vec<&'static str> {
        self.sources.iter().map(|source| source.source_name()).collect()
    }

    /// Collect metadata; a failing source is logged and skipped
    pub async fn collect(&self, video_id: &str) -> VideoMetadata {
        let mut metadata = VideoMetadata::default();

        for source in &self.sources {
            match source.fetch(video_id).await {
                Ok(found) => metadata.merge(found),
                Err(err) => {
                    tracing::debug!("{} failed: {:#}", source.source_name(), err);
                }
            }
        }

        metadata
    }
}

/// Resolve a bare video id or a YouTube URL into a video id
pub fn resolve_video_id(input: &str) -> Result<String> {
    if !input.starts_with("http") {
        return Ok(input.to_string());
    }

    extract_video_id(input)
        .ok_or_else(|| anyhow::anyhow!("Could not extract video ID from URL"))
}

/// Extract the video id from watch, short and embed URLs
pub fn extract_video_id(url: &str) -> Option<String> {
    static PATTERNS: OnceLock<[Regex; 2]> = OnceLock::new();
    let patterns = PATTERNS.get_or_init(|| {
        [
            Regex::new(r"(?:youtube\.com/watch\?v=|youtu\.be/)([^&\n?#]+)").expect("valid regex"),
            Regex::new(r"youtube\.com/embed/([^&\n?#]+)").expect("valid regex"),
        ]
    });

    patterns
        .iter()
        .find_map(|pattern| pattern.captures(url))
        .and_then(|caps| caps.get(1))
        .map(|m| m.as_str().to_string())
}

/// Canonical watch page URL for a video id
pub fn watch_url(video_id: &str) -> String {
    format!("https://www.youtube.com/watch?v={}", video_id)
}
