use crate::global;
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use tracing::info;

#[derive(Debug, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub storage: StorageConfig,
    pub transcription: TranscriptionConfig,
    pub recording: RecordingConfig,
    pub summary: SummaryConfig,
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct StorageConfig {
    /// Directory scanned for new audio files; recordings land here too.
    pub watch_dir: String,
    /// Directory for raw transcript documents.
    pub transcripts_dir: String,
    /// Directory for generated summaries.
    pub summaries_dir: String,
    /// Transcribed audio is moved here so rescans skip it.
    pub archive_dir: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TranscriptionConfig {
    pub provider: String,
    pub api_key: Option<String>,
    pub api_endpoint: Option<String>,
    /// Seconds between job-status polls.
    pub poll_interval_seconds: u64,
    /// Give up polling after this many seconds. 0 waits indefinitely.
    pub poll_timeout_seconds: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RecordingConfig {
    /// PulseAudio source for the microphone input.
    pub mic_source: String,
    /// Seconds to wait after SIGINT before force-killing the capture process.
    pub stop_grace_seconds: u64,
    /// Optional shell command used instead of the built-in ffmpeg capture.
    /// Receives the output path via $SCRIBA_OUTPUT.
    pub capture_command: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SummaryConfig {
    /// Shell command that reads the prompt on stdin and writes the summary
    /// to stdout.
    pub command: String,
    /// Timeout in seconds for the summary command.
    pub timeout_seconds: u64,
    /// Path to the prompt template prepended to every summarization request.
    pub prompt_file: Option<String>,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            watch_dir: "~/recordings".to_string(),
            transcripts_dir: "~/transcripts/raw".to_string(),
            summaries_dir: "~/transcripts/summaries".to_string(),
            archive_dir: "~/recordings/.done".to_string(),
        }
    }
}

impl Default for TranscriptionConfig {
    fn default() -> Self {
        Self {
            provider: "assembly-ai".to_string(),
            api_key: None,
            api_endpoint: None,
            poll_interval_seconds: 5,
            poll_timeout_seconds: 0,
        }
    }
}

impl Default for RecordingConfig {
    fn default() -> Self {
        Self {
            mic_source: "default".to_string(),
            stop_grace_seconds: 3,
            capture_command: None,
        }
    }
}

impl Default for SummaryConfig {
    fn default() -> Self {
        Self {
            command: "claude -p".to_string(),
            timeout_seconds: 3600,
            prompt_file: None,
        }
    }
}

impl Config {
    pub fn load() -> Result<Self> {
        let config_path = global::config_file()?;
        if !config_path.exists() {
            info!(
                "Config file not found, creating default at {:?}",
                config_path
            );
            let config = Self::default();
            config.save()?;
            return Ok(config);
        }

        let content =
            std::fs::read_to_string(&config_path).context("Failed to read config file")?;

        let config: Self = toml::from_str(&content).context("Failed to parse config file")?;

        info!("Loaded config from {:?}", config_path);
        Ok(config)
    }

    pub fn save(&self) -> Result<()> {
        let config_path = global::config_file()?;

        if let Some(parent) = config_path.parent() {
            std::fs::create_dir_all(parent).context("Failed to create config directory")?;
        }

        let content = toml::to_string_pretty(self).context("Failed to serialize config")?;

        std::fs::write(&config_path, content).context("Failed to write config file")?;

        Ok(())
    }

    pub fn watch_dir(&self) -> Result<PathBuf> {
        expand_path(&self.storage.watch_dir)
    }

    pub fn transcripts_dir(&self) -> Result<PathBuf> {
        expand_path(&self.storage.transcripts_dir)
    }

    pub fn summaries_dir(&self) -> Result<PathBuf> {
        expand_path(&self.storage.summaries_dir)
    }

    pub fn archive_dir(&self) -> Result<PathBuf> {
        expand_path(&self.storage.archive_dir)
    }
}

/// Expand a leading `~` to the home directory.
pub fn expand_path(path: &str) -> Result<PathBuf> {
    if let Some(rest) = path.strip_prefix("~/") {
        return Ok(global::home_dir()?.join(rest));
    }
    if path == "~" {
        return global::home_dir();
    }
    Ok(PathBuf::from(path))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_round_trip_through_toml() {
        let config = Config::default();
        let text = toml::to_string_pretty(&config).unwrap();
        let parsed: Config = toml::from_str(&text).unwrap();
        assert_eq!(parsed.transcription.poll_interval_seconds, 5);
        assert_eq!(parsed.transcription.poll_timeout_seconds, 0);
        assert_eq!(parsed.recording.stop_grace_seconds, 3);
        assert_eq!(parsed.storage.watch_dir, "~/recordings");
    }

    #[test]
    fn test_partial_config_fills_defaults() {
        let parsed: Config = toml::from_str(
            r#"
            [transcription]
            api_key = "secret"
            poll_timeout_seconds = 600
            "#,
        )
        .unwrap();
        assert_eq!(parsed.transcription.api_key.as_deref(), Some("secret"));
        assert_eq!(parsed.transcription.poll_timeout_seconds, 600);
        assert_eq!(parsed.transcription.poll_interval_seconds, 5);
        assert_eq!(parsed.summary.command, "claude -p");
    }

    #[test]
    fn test_expand_path_absolute_unchanged() {
        let path = expand_path("/var/tmp/recordings").unwrap();
        assert_eq!(path, PathBuf::from("/var/tmp/recordings"));
    }

    #[test]
    fn test_expand_path_tilde() {
        let path = expand_path("~/recordings").unwrap();
        assert!(path.ends_with("recordings"));
        assert!(!path.to_string_lossy().contains('~'));
    }
}
