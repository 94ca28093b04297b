use anyhow::{Context, Result};
use clap::Parser;
use std::io::Read;
use std::process::ExitCode;
use std::time::Instant;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use vidaux::extractors::resolve_video_id;
use vidaux::output::{self, MetadataReport};
use vidaux::speech::{EdgeTtsSynthesizer, SpeechRequest};
use vidaux::transcribe::{normalize_saved, report_failure};
use vidaux::{Cli, Commands, Config, MetadataCollector, TranscriptFailure, TranscriptPipeline, TranscriptResult};

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();
    init_tracing(cli.verbose, cli.log_json);

    match run(cli).await {
        Ok(code) => ExitCode::from(code),
        Err(err) => {
            eprintln!("Error: {:#}", err);
            ExitCode::FAILURE
        }
    }
}

/// Logs go to stderr; stdout is reserved for the JSON result line
fn init_tracing(verbose: bool, json: bool) {
    let filter = if verbose {
        EnvFilter::new("vidaux=debug")
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| "vidaux=warn".into())
    };

    let registry = tracing_subscriber::registry().with(filter);
    if json {
        registry
            .with(tracing_subscriber::fmt::layer().json().with_writer(std::io::stderr))
            .init();
    } else {
        registry
            .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
            .init();
    }
}

fn load_config(cli: &Cli) -> Result<Config> {
    Ok(Config::load()?.with_provider_overrides(cli.api_key.clone(), cli.api_host.clone()))
}

async fn run(cli: Cli) -> Result<u8> {
    let config = load_config(&cli);

    match cli.command {
        Commands::Transcript { video_id } => {
            let result = match config {
                Ok(config) => fetch_transcript(&config, &video_id).await,
                Err(err) => Err(TranscriptFailure::new(
                    format!("{:#}", err),
                    &video_id,
                    std::time::Duration::ZERO,
                )),
            };
            output::print_transcript(&result)
        }
        Commands::Normalize { video_id, input } => {
            let started = Instant::now();
            let result = match read_input(input.as_deref()) {
                Ok(body) => normalize_saved(&body, &video_id),
                Err(err) => Err(TranscriptFailure::new(
                    format!("{:#}", err),
                    &video_id,
                    started.elapsed(),
                )),
            };
            output::print_transcript(&result)
        }
        Commands::Metadata { video } => {
            let config = config.unwrap_or_else(|err| {
                tracing::debug!("Using default config: {:#}", err);
                Config::default()
            });
            let report = fetch_metadata(&config, &video).await;
            output::print_metadata(&report)?;
            Ok(0)
        }
        Commands::Speak {
            text,
            out,
            voice,
            rate,
        } => {
            let config = config?;
            let request = SpeechRequest::new(text, voice, rate, out, &config.speech)?;
            let synthesizer = EdgeTtsSynthesizer::new(&config.speech, !cli.quiet);

            let path = synthesizer.synthesize(&request).await?;
            println!("Audio saved to {}", path.display());
            Ok(0)
        }
        Commands::Config { show, init } => {
            let config = config?;
            if init {
                let path = config.save().context("Failed to write default config")?;
                println!("Configuration written to: {}", path.display());
            } else {
                if !show {
                    tracing::debug!("No config action requested, showing configuration");
                }
                config.display();
            }
            Ok(0)
        }
    }
}

async fn fetch_transcript(config: &Config, video_id: &str) -> TranscriptResult {
    let started = Instant::now();
    let pipeline = config
        .provider_credentials()
        .and_then(|credentials| TranscriptPipeline::new(credentials, config.transcript_timeout()));

    match pipeline {
        Ok(pipeline) => pipeline.run(video_id).await,
        Err(err) => Err(report_failure(err, video_id, started)),
    }
}

async fn fetch_metadata(config: &Config, input: &str) -> MetadataReport {
    let video_id = match resolve_video_id(input) {
        Ok(video_id) => video_id,
        Err(err) => return MetadataReport::failed(err, input),
    };
    tracing::debug!("Fetching metadata for video: {}", video_id);

    match MetadataCollector::new(config) {
        Ok(collector) => MetadataReport::found(collector.collect(&video_id).await),
        Err(err) => MetadataReport::failed(format!("{:#}", err), input),
    }
}

fn read_input(path: Option<&std::path::Path>) -> Result<Vec<u8>> {
    match path {
        Some(path) => fs_err::read(path).context("Failed to read raw response"),
        None => {
            let mut body = Vec::new();
            std::io::stdin()
                .read_to_end(&mut body)
                .context("Failed to read raw response from stdin")?;
            Ok(body)
        }
    }
}
