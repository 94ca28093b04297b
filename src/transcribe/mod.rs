use reqwest::header::CONTENT_TYPE;
use reqwest::{Client, Request, StatusCode};
use serde::Serialize;
use std::borrow::Cow;
use std::time::{Duration, Instant};
use url::Url;

use crate::config::ProviderCredentials;
use crate::utils::{decode_body, decode_latin1};
use crate::FetchError;

pub mod processor;

pub use processor::{normalize_response, normalize_text, normalize_value, TranscriptPayload};

/// One timed caption unit
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Segment {
    /// Entity-decoded, NFC-normalized text
    pub text: String,

    /// Start offset in seconds
    pub start: f64,

    /// Duration in seconds
    pub duration: f64,
}

/// Failure report printed in place of a transcript
#[derive(Debug, Clone, Serialize)]
pub struct TranscriptFailure {
    pub error: String,
    pub video_id: String,
    pub elapsed_time: f64,
}

impl TranscriptFailure {
    pub fn new(error: impl ToString, video_id: &str, elapsed: Duration) -> Self {
        Self {
            error: error.to_string(),
            video_id: video_id.to_string(),
            elapsed_time: elapsed.as_secs_f64(),
        }
    }
}

pub type TranscriptResult = std::result::Result<Vec<Segment>, TranscriptFailure>;

/// Undecoded provider response
#[derive(Debug, Clone)]
pub struct RawResponse {
    pub status: StatusCode,
    pub charset: Option<String>,
    pub body: Vec<u8>,
}

/// Charset labels decoded as ISO-8859-1 without trying UTF-8 first
const LATIN1_LABELS: &[&str] = &[
    "iso-8859-1",
    "iso8859-1",
    "iso_8859-1",
    "latin1",
    "latin-1",
    "windows-1252",
    "cp1252",
];

impl RawResponse {
    /// Decode the body, honoring a declared Latin-1 charset
    pub fn decoded_body(&self) -> Cow<'_, str> {
        match self.charset.as_deref() {
            Some(charset) if LATIN1_LABELS.contains(&charset) => {
                Cow::Owned(decode_latin1(&self.body))
            }
            _ => decode_body(&self.body),
        }
    }

    /// Decoded body of a 200 response; any other status is a network failure
    /// carrying the status code and the decoded body
    pub fn into_text(self) -> Result<String, FetchError> {
        let text = self.decoded_body().into_owned();
        if self.status != StatusCode::OK {
            return Err(FetchError::NetworkFailure(format!(
                "provider returned status {}: {}",
                self.status.as_u16(),
                text
            )));
        }
        Ok(text)
    }
}

/// HTTP client for the transcript provider
pub struct TranscriptClient {
    client: Client,
    credentials: ProviderCredentials,
}

impl TranscriptClient {
    pub fn new(credentials: ProviderCredentials, timeout: Duration) -> Result<Self, FetchError> {
        let client = Client::builder().timeout(timeout).build()?;
        Ok(Self {
            client,
            credentials,
        })
    }

    /// Build the transcript endpoint for a video
    pub fn endpoint(&self, video_id: &str) -> Result<Url, FetchError> {
        let mut url = Url::parse(&format!("https://{}/api/transcript", self.credentials.api_host))
            .map_err(|e| {
                FetchError::NetworkFailure(format!(
                    "invalid API host '{}': {}",
                    self.credentials.api_host, e
                ))
            })?;
        url.query_pairs_mut().append_pair("videoId", video_id);
        Ok(url)
    }

    /// Build the authenticated transcript request
    pub fn request(&self, video_id: &str) -> Result<Request, FetchError> {
        let url = self.endpoint(video_id)?;
        let request = self
            .client
            .get(url)
            .header("x-rapidapi-key", &self.credentials.api_key)
            .header("x-rapidapi-host", &self.credentials.api_host)
            .build()?;
        Ok(request)
    }

    /// Fetch the raw transcript response without interpreting the body
    pub async fn fetch_raw(&self, video_id: &str) -> Result<RawResponse, FetchError> {
        let request = self.request(video_id)?;
        tracing::debug!("Requesting transcript: {}", request.url());

        let response = self.client.execute(request).await?;

        let status = response.status();
        let charset = response
            .headers()
            .get(CONTENT_TYPE)
            .and_then(|value| value.to_str().ok())
            .and_then(charset_from_content_type);
        let body = response.bytes().await?.to_vec();

        tracing::debug!(
            status = status.as_u16(),
            charset = charset.as_deref().unwrap_or("unspecified"),
            bytes = body.len(),
            "Transcript response received"
        );

        Ok(RawResponse {
            status,
            charset,
            body,
        })
    }
}

fn charset_from_content_type(content_type: &str) -> Option<String> {
    content_type
        .split(';')
        .skip(1)
        .filter_map(|param| param.split_once('='))
        .find(|(name, _)| name.trim().eq_ignore_ascii_case("charset"))
        .map(|(_, value)| value.trim().trim_matches('"').to_ascii_lowercase())
}

/// Fetch-and-normalize pipeline for one video
pub struct TranscriptPipeline {
    client: TranscriptClient,
}

impl TranscriptPipeline {
    pub fn new(credentials: ProviderCredentials, timeout: Duration) -> Result<Self, FetchError> {
        Ok(Self {
            client: TranscriptClient::new(credentials, timeout)?,
        })
    }

    /// Fetch the transcript and normalize it into segments
    pub async fn fetch(&self, video_id: &str) -> Result<Vec<Segment>, FetchError> {
        let raw = self.client.fetch_raw(video_id).await?;
        normalize_text(&raw.into_text()?)
    }

    /// Run the pipeline and time it, converting any error into a failure report
    pub async fn run(&self, video_id: &str) -> TranscriptResult {
        let started = Instant::now();
        tracing::info!("Fetching transcript for video: {}", video_id);

        match self.fetch(video_id).await {
            Ok(segments) => {
                tracing::info!(
                    "Fetched {} segments in {:.2}s",
                    segments.len(),
                    started.elapsed().as_secs_f64()
                );
                Ok(segments)
            }
            Err(err) => Err(report_failure(err, video_id, started)),
        }
    }
}

/// Normalize a saved raw response, timed like a live fetch
pub fn normalize_saved(body: &[u8], video_id: &str) -> TranscriptResult {
    let started = Instant::now();
    normalize_response(body).map_err(|err| report_failure(err, video_id, started))
}

/// Convert an error into the failure report, logging its kind
pub fn report_failure(err: FetchError, video_id: &str, started: Instant) -> TranscriptFailure {
    tracing::warn!(kind = err.kind(), video_id, "Transcript fetch failed: {}", err);
    TranscriptFailure::new(err, video_id, started.elapsed())
}
