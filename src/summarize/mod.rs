//! Summary generation.
//!
//! Feeds a fully labeled transcript through an external summarizer command
//! and writes the result as a Markdown document with frontmatter. The
//! summarizer is any shell command that reads the prompt on stdin and
//! prints the summary on stdout, so the model backend is swappable from
//! config without touching code.

use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use regex::Regex;
use rusqlite::Connection;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::time::Duration;
use tokio::io::AsyncWriteExt;
use tokio::process::Command;
use tracing::{debug, info, warn};

use crate::config::SummaryConfig;
use crate::db::TranscriptRepository;
use crate::error::PipelineError;
use crate::transcript::TranscriptDoc;

const DEFAULT_PROMPT: &str = "You are given a meeting transcript with named speakers. \
Write a concise summary in Markdown. Start with a '### Meeting Title' heading \
followed by a short descriptive title on its own line, then cover the key \
discussion points, decisions, and action items per participant.";

#[async_trait]
pub trait SummaryProvider: Send + Sync {
    async fn summarize(&self, prompt: &str) -> Result<String>;
}

/// Runs the configured shell command with the prompt on stdin and the
/// summary expected on stdout.
pub struct CommandSummarizer {
    command: String,
    timeout: Duration,
}

impl CommandSummarizer {
    pub fn new(command: String, timeout: Duration) -> Self {
        Self { command, timeout }
    }

    pub fn from_config(config: &SummaryConfig) -> Self {
        Self::new(
            config.command.clone(),
            Duration::from_secs(config.timeout_seconds.max(1)),
        )
    }
}

#[async_trait]
impl SummaryProvider for CommandSummarizer {
    async fn summarize(&self, prompt: &str) -> Result<String> {
        info!("Running summarizer command: {}", self.command);

        let mut child = Command::new("sh")
            .arg("-c")
            .arg(&self.command)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .with_context(|| format!("Failed to spawn summarizer: {}", self.command))?;

        if let Some(mut stdin) = child.stdin.take() {
            stdin
                .write_all(prompt.as_bytes())
                .await
                .context("Failed to write prompt to summarizer stdin")?;
        }

        let output = match tokio::time::timeout(self.timeout, child.wait_with_output()).await {
            Ok(result) => result.context("Failed to wait for summarizer")?,
            Err(_) => {
                return Err(PipelineError::Summarization(format!(
                    "summarizer timed out after {}s",
                    self.timeout.as_secs()
                ))
                .into());
            }
        };

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(PipelineError::Summarization(format!(
                "summarizer exited with {}: {}",
                output.status,
                stderr.trim()
            ))
            .into());
        }

        let summary = String::from_utf8_lossy(&output.stdout).trim().to_string();
        if summary.is_empty() {
            return Err(PipelineError::Summarization(
                "summarizer produced no output".to_string(),
            )
            .into());
        }

        debug!("Summarizer produced {} bytes", summary.len());
        Ok(summary)
    }
}

/// Summarize one labeled transcript: build the prompt, run the provider,
/// write the Markdown document under `summaries_dir`, and record
/// `summarized_at`. Unlabeled transcripts are rejected before any remote
/// work happens.
pub async fn summarize_transcript(
    conn: &Connection,
    provider: &dyn SummaryProvider,
    transcript_path: &Path,
    title: &str,
    summaries_dir: &Path,
    prompt_template: Option<&str>,
) -> Result<PathBuf> {
    let doc = TranscriptDoc::load(transcript_path)?;
    if !doc.labeled {
        let unnamed = doc.speakers.iter().filter(|s| s.name.is_none()).count();
        return Err(PipelineError::LabelingIncomplete { unnamed }.into());
    }
    TranscriptRepository::register(conn, transcript_path, None)?;

    let prompt = build_prompt(prompt_template, title, &doc);
    let body = provider.summarize(&prompt).await?;

    // A title heading in the generated summary wins over the requested one.
    let title = extract_title(&body).unwrap_or_else(|| title.to_string());
    let participants = doc.participants();

    let file_name = summary_file_name(doc.transcribed_at, &participants, &title);
    let summary_path = summaries_dir.join(file_name);

    let rendered = render_summary(&doc, &title, &body, transcript_path);
    std::fs::create_dir_all(summaries_dir).context("Failed to create summaries directory")?;
    std::fs::write(&summary_path, rendered)
        .with_context(|| format!("Failed to write summary {:?}", summary_path))?;

    if let Err(e) = TranscriptRepository::mark_summarized(conn, transcript_path, &summary_path) {
        // No orphaned summary the registry knows nothing about.
        let _ = std::fs::remove_file(&summary_path);
        return Err(e);
    }

    info!("Summary saved: {:?}", summary_path);
    Ok(summary_path)
}

fn build_prompt(template: Option<&str>, title: &str, doc: &TranscriptDoc) -> String {
    let instructions = template.unwrap_or(DEFAULT_PROMPT);
    format!(
        "{instructions}\n\n\
         Meeting Title: {title}\n\
         Date: {date}\n\
         Participants: {participants}\n\n\
         BEGIN TRANSCRIPT\n{transcript}END TRANSCRIPT\n",
        date = doc.transcribed_at.format("%Y-%m-%d"),
        participants = doc.participants().join(", "),
        transcript = doc.plain_text(),
    )
}

/// Pull the title from a `### Meeting Title` heading, if the summarizer
/// emitted one. Markdown emphasis characters around the title are stripped.
pub fn extract_title(summary: &str) -> Option<String> {
    let re = Regex::new(r"(?mi)^###\s*Meeting\s*Title\s*\r?\n+\s*(.+)$").ok()?;
    let raw = re.captures(summary)?.get(1)?.as_str();
    let title = raw.trim_matches(|c: char| c == '*' || c == '_' || c == '`').trim();
    if title.is_empty() {
        None
    } else {
        Some(title.to_string())
    }
}

/// Lowercase, alphanumerics kept, everything else collapsed to single `-`.
fn slug(text: &str) -> String {
    let mut out = String::new();
    let mut last_dash = true;
    for c in text.chars() {
        if c.is_alphanumeric() {
            out.extend(c.to_lowercase());
            last_dash = false;
        } else if !last_dash {
            out.push('-');
            last_dash = true;
        }
    }
    while out.ends_with('-') {
        out.pop();
    }
    out
}

fn summary_file_name(
    transcribed_at: DateTime<Utc>,
    participants: &[String],
    title: &str,
) -> String {
    let date = transcribed_at.format("%Y-%m-%d");
    let people = slug(&participants.join(" "));
    let title = slug(title);
    match (people.is_empty(), title.is_empty()) {
        (false, false) => format!("{date}-{people}-{title}.md"),
        (false, true) => format!("{date}-{people}.md"),
        (true, false) => format!("{date}-{title}.md"),
        (true, true) => {
            warn!("Summary has no participants or title, using date-only name");
            format!("{date}-summary.md")
        }
    }
}

fn render_summary(doc: &TranscriptDoc, title: &str, body: &str, transcript_path: &Path) -> String {
    format!(
        "---\n\
         date: {date}\n\
         title: {title}\n\
         participants: {participants}\n\
         ---\n\n\
         [Raw transcript]({transcript})\n\n\
         {body}\n",
        date = doc.transcribed_at.format("%Y-%m-%d"),
        participants = doc.participants().join(", "),
        transcript = transcript_path.display(),
    )
}
