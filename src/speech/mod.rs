use anyhow::{Context, Result};
use indicatif::{ProgressBar, ProgressStyle};
use std::path::{Path, PathBuf};
use std::process::Stdio;
use tokio::process::Command;

use crate::config::SpeechConfig;
use crate::utils::generate_unique_filename;

/// A single text-to-speech job
#[derive(Debug, Clone, PartialEq)]
pub struct SpeechRequest {
    pub text: String,
    pub voice: String,
    /// Signed percentage, e.g. "+10%"
    pub rate: String,
    pub output: PathBuf,
}

impl SpeechRequest {
    /// Build a request, filling unset values from the speech config
    pub fn new(
        text: String,
        voice: Option<String>,
        rate: Option<String>,
        output: Option<PathBuf>,
        config: &SpeechConfig,
    ) -> Result<Self> {
        if text.trim().is_empty() {
            anyhow::bail!("Text to synthesize must not be empty");
        }

        let rate = normalize_rate(rate.as_deref().unwrap_or(&config.default_rate))?;
        let output = output.unwrap_or_else(default_output_path);

        Ok(Self {
            text,
            voice: voice.unwrap_or_else(|| config.default_voice.clone()),
            rate,
            output,
        })
    }
}

/// Normalize a speaking rate into the signed percentage edge-tts expects.
///
/// Accepts "+10%", "-5%", "10%" and "10".
pub fn normalize_rate(rate: &str) -> Result<String> {
    let trimmed = rate.trim();
    let body = trimmed.strip_suffix('%').unwrap_or(trimmed);
    let (sign, digits) = match body.chars().next() {
        Some(c @ ('+' | '-')) => (c, &body[1..]),
        _ => ('+', body),
    };

    if digits.is_empty() || !digits.chars().all(|c| c.is_ascii_digit()) {
        anyhow::bail!("Invalid speech rate '{}': expected a percentage like +10% or -5%", rate);
    }

    Ok(format!("{}{}%", sign, digits))
}

fn default_output_path() -> PathBuf {
    std::env::temp_dir().join(generate_unique_filename("speech", "mp3"))
}

/// Speech synthesizer backed by the edge-tts command line tool
pub struct EdgeTtsSynthesizer {
    command: String,
    show_progress: bool,
}

impl EdgeTtsSynthesizer {
    pub fn new(config: &SpeechConfig, show_progress: bool) -> Self {
        Self {
            command: config.command.clone(),
            show_progress,
        }
    }

    /// Command line arguments for a request
    pub fn arguments(request: &SpeechRequest) -> Vec<String> {
        vec![
            format!("--text={}", request.text),
            "--voice".to_string(),
            request.voice.clone(),
            format!("--rate={}", request.rate),
            "--write-media".to_string(),
            request.output.to_string_lossy().into_owned(),
        ]
    }

    /// Generate the audio file and return its path
    pub async fn synthesize(&self, request: &SpeechRequest) -> Result<PathBuf> {
        tracing::debug!(
            voice = %request.voice,
            rate = %request.rate,
            "Synthesizing speech to {}",
            request.output.display()
        );

        if let Some(parent) = request.output.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs_err::create_dir_all(parent)?;
        }

        let progress = self.spinner();

        let output = Command::new(&self.command)
            .args(Self::arguments(request))
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .output()
            .await;

        let output = match output {
            Ok(output) => output,
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => {
                progress.finish_and_clear();
                anyhow::bail!(
                    "{} is not available. Please install it: pip install edge-tts",
                    self.command
                );
            }
            Err(err) => {
                progress.finish_and_clear();
                return Err(err).context("Failed to run speech synthesizer");
            }
        };

        if !output.status.success() {
            progress.finish_with_message("Speech generation failed");
            let error = String::from_utf8_lossy(&output.stderr);
            anyhow::bail!("{} failed: {}", self.command, error.trim());
        }

        ensure_written(&request.output)?;
        progress.finish_with_message("Speech generated");

        Ok(request.output.clone())
    }

    fn spinner(&self) -> ProgressBar {
        if !self.show_progress {
            return ProgressBar::hidden();
        }

        let progress = ProgressBar::new_spinner();
        if let Ok(style) = ProgressStyle::default_spinner().template("{spinner:.green} [{elapsed_precise}] {msg}") {
            progress.set_style(style);
        }
        progress.set_message("Generating speech...");
        progress.enable_steady_tick(std::time::Duration::from_millis(120));
        progress
    }
}

fn ensure_written(path: &Path) -> Result<()> {
    let metadata = fs_err::metadata(path).context("Speech synthesizer produced no output file")?;
    if metadata.len() == 0 {
        anyhow::bail!("Speech synthesizer wrote an empty file: {}", path.display());
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normalize_rate() {
        assert_eq!(normalize_rate("+10%").unwrap(), "+10%");
        assert_eq!(normalize_rate("-5%").unwrap(), "-5%");
        assert_eq!(normalize_rate("10%").unwrap(), "+10%");
        assert_eq!(normalize_rate(" 25 ").unwrap(), "+25%");
        assert!(normalize_rate("fast").is_err());
        assert!(normalize_rate("+%").is_err());
        assert!(normalize_rate("1.5").is_err());
    }

    #[test]
    fn test_request_uses_config_defaults() {
        let config = SpeechConfig::default();
        let request = SpeechRequest::new("Xin chào".into(), None, None, None, &config).unwrap();

        assert_eq!(request.voice, "vi-VN-HoaiMyNeural");
        assert_eq!(request.rate, "+0%");
        assert!(request.output.starts_with(std::env::temp_dir()));
        assert_eq!(request.output.extension().and_then(|e| e.to_str()), Some("mp3"));
    }

    #[test]
    fn test_request_rejects_empty_text() {
        let config = SpeechConfig::default();
        assert!(SpeechRequest::new("   ".into(), None, None, None, &config).is_err());
    }

    #[test]
    fn test_arguments() {
        let request = SpeechRequest {
            text: "hello".into(),
            voice: "en-US-AriaNeural".into(),
            rate: "-10%".into(),
            output: PathBuf::from("out/hello.mp3"),
        };
        assert_eq!(
            EdgeTtsSynthesizer::arguments(&request),
            vec![
                "--text=hello",
                "--voice",
                "en-US-AriaNeural",
                "--rate=-10%",
                "--write-media",
                "out/hello.mp3"
            ]
        );
    }

    #[test]
    fn test_arguments_keep_dash_led_text_attached() {
        let request = SpeechRequest {
            text: "-5 degrees today".into(),
            voice: "en-US-AriaNeural".into(),
            rate: "+0%".into(),
            output: PathBuf::from("out.mp3"),
        };
        let args = EdgeTtsSynthesizer::arguments(&request);
        assert_eq!(args[0], "--text=-5 degrees today");
        assert_eq!(args.len(), 5);
    }

    #[tokio::test]
    async fn test_missing_command_is_reported() {
        let config = SpeechConfig {
            command: "definitely-not-an-installed-tts-tool".into(),
            ..SpeechConfig::default()
        };
        let dir = tempfile::tempdir().unwrap();
        let request = SpeechRequest::new(
            "hello".into(),
            None,
            None,
            Some(dir.path().join("out.mp3")),
            &config,
        )
        .unwrap();

        let err = EdgeTtsSynthesizer::new(&config, false)
            .synthesize(&request)
            .await
            .unwrap_err();
        assert!(err.to_string().contains("is not available"));
    }
}
