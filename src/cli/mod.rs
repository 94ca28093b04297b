use clap::{Parser, Subcommand};
use std::path::PathBuf;

use crate::config::{API_HOST_VAR, API_KEY_VAR};

#[derive(Parser, Debug)]
#[command(
    name = "vidaux",
    about = "Fetch transcripts, metadata and generated speech for video processing",
    version,
    long_about = "Fetches timed transcripts from a third-party transcript provider and normalizes them into a uniform JSON segment list, gathers best-effort video metadata, and generates speech audio through edge-tts. Every data command prints a single line of JSON to stdout."
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Enable verbose (debug) logging on stderr
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Disable progress indicators
    #[arg(short, long, global = true)]
    pub quiet: bool,

    /// Emit logs as JSON lines
    #[arg(long, global = true)]
    pub log_json: bool,

    /// Transcript provider API key
    #[arg(long, global = true, env = API_KEY_VAR, hide_env_values = true)]
    pub api_key: Option<String>,

    /// Transcript provider API host
    #[arg(long, global = true, env = API_HOST_VAR)]
    pub api_host: Option<String>,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Fetch and normalize the transcript of a video
    Transcript {
        /// Video identifier
        #[arg(value_name = "VIDEO_ID")]
        video_id: String,
    },

    /// Normalize a saved raw provider response (reads stdin when no file is given)
    Normalize {
        /// Video identifier to report in errors
        #[arg(long, default_value = "unknown")]
        video_id: String,

        /// File holding the raw response body
        #[arg(value_name = "FILE")]
        input: Option<PathBuf>,
    },

    /// Fetch best-effort metadata for a video
    Metadata {
        /// Video identifier or YouTube URL
        #[arg(value_name = "VIDEO_ID_OR_URL")]
        video: String,
    },

    /// Generate speech audio from text
    Speak {
        /// Text to synthesize
        #[arg(long)]
        text: String,

        /// Output audio file (a temporary file when omitted)
        #[arg(long, value_name = "FILE")]
        out: Option<PathBuf>,

        /// Voice name
        #[arg(long)]
        voice: Option<String>,

        /// Speaking rate as a signed percentage, e.g. +10% or -5%
        #[arg(long, allow_hyphen_values = true)]
        rate: Option<String>,
    },

    /// Show or initialize the configuration file
    Config {
        /// Show current configuration
        #[arg(short, long)]
        show: bool,

        /// Write the default configuration to the user config directory
        #[arg(long, conflicts_with = "show")]
        init: bool,
    },
}
