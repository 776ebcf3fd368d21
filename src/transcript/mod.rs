//! On-disk transcript document.
//!
//! A transcript is a single JSON document: a metadata block (source file,
//! transcription time, duration, labeling state, speaker roster) followed by
//! the ordered utterance list. Round-trippable via serde.

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::Path;

use crate::error::PipelineError;

/// One diarized speaker. `id` is the provider-issued identifier ("A", "B",
/// ...); `name` is filled in by a human during labeling.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Speaker {
    pub id: String,
    pub name: Option<String>,
}

/// One timestamped unit of speech. Before labeling is finalized, `speaker`
/// holds the provider id; afterwards it holds the assigned display name.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Utterance {
    pub speaker: String,
    pub start: f64,
    pub end: f64,
    pub text: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TranscriptDoc {
    pub source_file: String,
    pub transcribed_at: DateTime<Utc>,
    pub duration_seconds: u64,
    pub labeled: bool,
    pub speakers: Vec<Speaker>,
    pub utterances: Vec<Utterance>,
}

impl TranscriptDoc {
    pub fn speaker(&self, speaker_id: &str) -> Option<&Speaker> {
        self.speakers.iter().find(|s| s.id == speaker_id)
    }

    pub fn speaker_mut(&mut self, speaker_id: &str) -> Option<&mut Speaker> {
        self.speakers.iter_mut().find(|s| s.id == speaker_id)
    }

    /// Names of all speakers that have been assigned one, in roster order.
    pub fn participants(&self) -> Vec<String> {
        self.speakers
            .iter()
            .filter_map(|s| s.name.clone())
            .collect()
    }

    /// Transcript body as plain text, one line per utterance.
    pub fn plain_text(&self) -> String {
        let mut out = String::new();
        for utt in &self.utterances {
            out.push_str(&format!("{}: {}\n", utt.speaker, utt.text));
        }
        out
    }

    pub fn save(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create directory {:?}", parent))?;
        }
        let content =
            serde_json::to_string_pretty(self).context("Failed to serialize transcript")?;
        std::fs::write(path, content)
            .with_context(|| format!("Failed to write transcript {:?}", path))?;
        Ok(())
    }

    pub fn load(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Err(PipelineError::ArtifactNotFound(path.to_path_buf()).into());
        }
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read transcript {:?}", path))?;
        serde_json::from_str(&content)
            .with_context(|| format!("Failed to parse transcript {:?}", path))
    }
}

#[cfg(test)]
pub(crate) fn two_speaker_doc() -> TranscriptDoc {
    TranscriptDoc {
        source_file: "meeting.mp4".to_string(),
        transcribed_at: Utc::now(),
        duration_seconds: 120,
        labeled: false,
        speakers: vec![
            Speaker {
                id: "A".to_string(),
                name: None,
            },
            Speaker {
                id: "B".to_string(),
                name: None,
            },
        ],
        utterances: vec![
            Utterance {
                speaker: "A".to_string(),
                start: 0.0,
                end: 2.5,
                text: "hi".to_string(),
            },
            Utterance {
                speaker: "B".to_string(),
                start: 2.5,
                end: 4.0,
                text: "hi".to_string(),
            },
        ],
    }
}
