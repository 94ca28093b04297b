use anyhow::Result;
use serde::Serialize;
use std::io::Write;

use crate::extractors::VideoMetadata;
use crate::transcribe::TranscriptResult;

/// Metadata line printed by the metadata command
#[derive(Debug, Clone, Default, Serialize)]
pub struct MetadataReport {
    #[serde(flatten)]
    pub metadata: VideoMetadata,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub video_id: Option<String>,
}

impl MetadataReport {
    pub fn found(metadata: VideoMetadata) -> Self {
        Self {
            metadata,
            ..Default::default()
        }
    }

    /// Null metadata carrying the reason and the original input
    pub fn failed(error: impl ToString, input: &str) -> Self {
        Self {
            metadata: VideoMetadata::default(),
            error: Some(error.to_string()),
            video_id: Some(input.to_string()),
        }
    }
}

/// Render a value as one line of JSON; non-ASCII characters stay unescaped
pub fn to_json_line<T: Serialize>(value: &T) -> Result<String> {
    Ok(serde_json::to_string(value)?)
}

/// Render a transcript result: the segment list, or the failure report
pub fn format_transcript(result: &TranscriptResult) -> Result<String> {
    match result {
        Ok(segments) => to_json_line(segments),
        Err(failure) => to_json_line(failure),
    }
}

/// Print a transcript result to stdout and return the process exit code
pub fn print_transcript(result: &TranscriptResult) -> Result<u8> {
    let line = format_transcript(result)?;
    print_line(&line)?;
    Ok(if result.is_ok() { 0 } else { 1 })
}

/// Print a metadata report to stdout
pub fn print_metadata(report: &MetadataReport) -> Result<()> {
    print_line(&to_json_line(report)?)
}

fn print_line(line: &str) -> Result<()> {
    let stdout = std::io::stdout();
    let mut handle = stdout.lock();
    writeln!(handle, "{}", line)?;
    handle.flush()?;
    Ok(())
}
