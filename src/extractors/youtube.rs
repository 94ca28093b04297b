use async_trait::async_trait;
use regex::Regex;
use reqwest::header::USER_AGENT;
use reqwest::Client;

use super::{watch_url, MetadataSource, VideoMetadata};
use crate::utils::{format_clock_duration, sanitize_text};
use crate::Result;

/// Scrapes Open Graph tags and the length field from the watch page
pub struct WatchPageSource {
    client: Client,
    user_agent: String,
    parser: WatchPageParser,
}

impl WatchPageSource {
    pub fn new(client: Client, user_agent: String) -> Self {
        Self {
            client,
            user_agent,
            parser: WatchPageParser::new(),
        }
    }
}

#[async_trait]
impl MetadataSource for WatchPageSource {
    async fn fetch(&self, video_id: &str) -> Result<VideoMetadata> {
        let url = watch_url(video_id);
        tracing::debug!("Fetching watch page: {}", url);

        let response = self
            .client
            .get(&url)
            .header(USER_AGENT, &self.user_agent)
            .send()
            .await?;

        if !response.status().is_success() {
            anyhow::bail!("Watch page request failed: HTTP {}", response.status());
        }

        let html = response.text().await?;
        Ok(self.parser.parse(&html))
    }

    fn source_name(&self) -> &'static str {
        "watch page"
    }
}

/// Regex-based extraction of the few fields we need from the page HTML
#[derive(Debug, Clone)]
pub struct WatchPageParser {
    title: Regex,
    description: Regex,
    image: Regex,
    length_seconds: Regex,
}

impl WatchPageParser {
    pub fn new() -> Self {
        Self {
            title: og_pattern("og:title"),
            description: og_pattern("og:description"),
            image: og_pattern("og:image"),
            length_seconds: Regex::new(r#""lengthSeconds":"(\d+)""#).expect("valid regex"),
        }
    }

    pub fn parse(&self, html: &str) -> VideoMetadata {
        let capture = |re: &Regex| {
            re.captures(html)
                .and_then(|caps| caps.get(1))
                .map(|m| sanitize_text(m.as_str()))
        };

        let duration = self
            .length_seconds
            .captures(html)
            .and_then(|caps| caps[1].parse::<u64>().ok())
            .map(format_clock_duration);

        VideoMetadata {
            title: capture(&self.title),
            description: capture(&self.description),
            duration,
            thumbnail: capture(&self.image),
        }
    }
}

impl Default for WatchPageParser {
    fn default() -> Self {
        Self::new()
    }
}

fn og_pattern(property: &str) -> Regex {
    Regex::new(&format!(
        r#"<meta\s+property="{}"\s+content="([^"]*)""#,
        regex::escape(property)
    ))
    .expect("valid regex")
}
