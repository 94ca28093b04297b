use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;

use super::{watch_url, MetadataSource, VideoMetadata};
use crate::Result;

const OEMBED_ENDPOINT: &str = "https://www.youtube.com/oembed";

/// Title and thumbnail from the public oEmbed endpoint
pub struct OEmbedSource {
    client: Client,
}

#[derive(Debug, Deserialize)]
struct OEmbedResponse {
    title: Option<String>,
    thumbnail_url: Option<String>,
}

impl From<OEmbedResponse> for VideoMetadata {
    fn from(response: OEmbedResponse) -> Self {
        VideoMetadata {
            title: response.title,
            description: None,
            duration: None,
            thumbnail: response.thumbnail_url,
        }
    }
}

impl OEmbedSource {
    pub fn new(client: Client) -> Self {
        Self { client }
    }
}

#[async_trait]
impl MetadataSource for OEmbedSource {
    async fn fetch(&self, video_id: &str) -> Result<VideoMetadata> {
        let watch = watch_url(video_id);
        tracing::debug!("Fetching oEmbed metadata for: {}", watch);

        let response = self
            .client
            .get(OEMBED_ENDPOINT)
            .query(&[("url", watch.as_str()), ("format", "json")])
            .send()
            .await?;

        if !response.status().is_success() {
            anyhow::bail!("oEmbed request failed: HTTP {}", response.status());
        }

        let body: OEmbedResponse = response.json().await?;
        Ok(body.into())
    }

    fn source_name(&self) -> &'static str {
        "oEmbed"
    }
}
