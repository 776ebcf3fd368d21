//! Speaker resolution engine.
//!
//! Maps provider-issued speaker ids ("A", "B", ...) to human-assigned
//! display names and propagates the rename consistently. Transcript
//! utterances are rewritten field by field on the parsed records, never by
//! whole-document text replacement, so one speaker's name can never
//! corrupt another's utterances, even when a name is a substring of another
//! identifier. Summaries are unstructured prose, so the rename there is a
//! whole-token text substitution and explicitly best-effort.

use anyhow::{bail, Context, Result};
use regex::Regex;
use rusqlite::Connection;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

use crate::db::TranscriptRepository;
use crate::error::PipelineError;
use crate::transcript::TranscriptDoc;

/// Record of one name assignment, kept so a re-label after finalization can
/// rewrite utterances (and summaries) that carry the previous name.
#[derive(Debug, Clone)]
pub struct NameAssignment {
    pub speaker_id: String,
    pub previous: Option<String>,
    pub name: String,
}

/// First `n` utterance texts for a speaker, in transcript order. Recomputed
/// from the document each call; enough context for a human to recognize the
/// voice.
pub fn sample_utterances<'a>(
    doc: &'a TranscriptDoc,
    speaker_id: &str,
    n: usize,
) -> Result<Vec<&'a str>> {
    let speaker = doc
        .speaker(speaker_id)
        .ok_or_else(|| PipelineError::UnknownSpeaker(speaker_id.to_string()))?;

    // After finalization the utterances carry the display name, not the id.
    let name = speaker.name.as_deref();
    Ok(doc
        .utterances
        .iter()
        .filter(|u| u.speaker == speaker_id || name.is_some_and(|nm| u.speaker == nm))
        .take(n)
        .map(|u| u.text.as_str())
        .collect())
}

/// Assign a display name to a speaker. Only the roster entry changes here;
/// utterance rewriting happens in `finalize_labeling` (or `apply_rename`
/// when re-labeling an already-finalized transcript).
pub fn assign_name(
    doc: &mut TranscriptDoc,
    speaker_id: &str,
    name: &str,
) -> Result<NameAssignment> {
    let name = name.trim();
    if name.is_empty() {
        bail!("speaker name must not be empty");
    }

    let speaker = doc
        .speaker_mut(speaker_id)
        .ok_or_else(|| PipelineError::UnknownSpeaker(speaker_id.to_string()))?;

    let previous = speaker.name.replace(name.to_string());
    debug!(
        "Assigned speaker {}: {:?} -> {}",
        speaker_id, previous, name
    );

    Ok(NameAssignment {
        speaker_id: speaker_id.to_string(),
        previous,
        name: name.to_string(),
    })
}

/// True iff every speaker carries a non-empty display name.
pub fn is_fully_labeled(doc: &TranscriptDoc) -> bool {
    !doc.speakers.is_empty()
        && doc
            .speakers
            .iter()
            .all(|s| s.name.as_deref().is_some_and(|n| !n.trim().is_empty()))
}

/// Finalize labeling: rewrite every utterance's speaker field from the
/// provider id to the assigned name, mark the document labeled, persist it,
/// and set `labeled_at` in the registry. Refuses with `LabelingIncomplete`
/// while any speaker is unnamed; the provider ids survive only in the
/// roster after this point.
pub fn finalize_labeling(
    conn: &Connection,
    doc: &mut TranscriptDoc,
    transcript_path: &Path,
) -> Result<()> {
    let unnamed = doc
        .speakers
        .iter()
        .filter(|s| s.name.as_deref().map_or(true, |n| n.trim().is_empty()))
        .count();
    if unnamed > 0 {
        return Err(PipelineError::LabelingIncomplete { unnamed }.into());
    }

    // Exact id equality per utterance record. A name that happens to be a
    // substring of another speaker's id can never bleed across records.
    let id_to_name: HashMap<&str, &str> = doc
        .speakers
        .iter()
        .map(|s| (s.id.as_str(), s.name.as_deref().unwrap_or_default()))
        .collect();

    let rewrites: Vec<(usize, String)> = doc
        .utterances
        .iter()
        .enumerate()
        .filter_map(|(i, u)| {
            id_to_name
                .get(u.speaker.as_str())
                .map(|name| (i, name.to_string()))
        })
        .collect();
    for (i, name) in rewrites {
        doc.utterances[i].speaker = name;
    }

    doc.labeled = true;
    doc.save(transcript_path)?;
    TranscriptRepository::mark_labeled(conn, transcript_path)?;

    info!(
        "Labeling finalized for {:?}: {}",
        transcript_path,
        doc.participants().join(", ")
    );
    Ok(())
}

/// Re-apply one assignment to an already-finalized transcript: utterances
/// still carrying the provider id or the previous display name take the new
/// name. Field-by-field, same as finalize.
pub fn apply_rename(doc: &mut TranscriptDoc, assignment: &NameAssignment) {
    for utt in &mut doc.utterances {
        let matches_id = utt.speaker == assignment.speaker_id;
        let matches_previous = assignment
            .previous
            .as_deref()
            .is_some_and(|prev| utt.speaker == prev);
        if matches_id || matches_previous {
            utt.speaker = assignment.name.clone();
        }
    }
}

/// Whole-token substitution of old speaker tokens inside summary prose.
/// All tokens are replaced in a single pass so a chain of renames cannot
/// cascade (X→Y plus Y→Z never turns an original X into Z). Everything
/// outside matched tokens is preserved byte for byte.
pub fn propagate_rename_to_summary(summary: &str, renames: &[(String, String)]) -> Result<String> {
    if renames.is_empty() {
        return Ok(summary.to_string());
    }

    let mut tokens: Vec<&str> = renames.iter().map(|(old, _)| old.as_str()).collect();
    // Longest first so "Speaker A" wins over "A" inside the alternation.
    tokens.sort_by_key(|t| std::cmp::Reverse(t.len()));
    let alternation = tokens
        .iter()
        .map(|t| regex::escape(t))
        .collect::<Vec<_>>()
        .join("|");
    let pattern = Regex::new(&format!(r"\b(?:{alternation})\b"))
        .context("Failed to build rename pattern")?;

    let map: HashMap<&str, &str> = renames
        .iter()
        .map(|(old, new)| (old.as_str(), new.as_str()))
        .collect();

    Ok(pattern
        .replace_all(summary, |caps: &regex::Captures<'_>| {
            map.get(&caps[0]).copied().unwrap_or(&caps[0]).to_string()
        })
        .into_owned())
}

/// Apply a rename to the summary file recorded for a transcript, if one
/// exists. Returns the summary path when a file was rewritten.
pub fn rename_in_summary_file(
    conn: &Connection,
    transcript_path: &Path,
    renames: &[(String, String)],
) -> Result<Option<PathBuf>> {
    let Some(summary_path) = TranscriptRepository::summary_path(conn, transcript_path)? else {
        return Ok(None);
    };
    let summary_path = PathBuf::from(summary_path);
    if !summary_path.exists() {
        return Ok(None);
    }

    let content = std::fs::read_to_string(&summary_path)
        .with_context(|| format!("Failed to read summary {:?}", summary_path))?;
    let updated = propagate_rename_to_summary(&content, renames)?;
    if updated != content {
        std::fs::write(&summary_path, updated)
            .with_context(|| format!("Failed to write summary {:?}", summary_path))?;
        info!("Speaker rename propagated to summary {:?}", summary_path);
    }
    Ok(Some(summary_path))
}

/// Rename tokens for one assignment: the raw provider id plus the previous
/// display name when there was one.
pub fn rename_tokens(assignment: &NameAssignment) -> Vec<(String, String)> {
    let mut tokens = vec![(assignment.speaker_id.clone(), assignment.name.clone())];
    if let Some(prev) = &assignment.previous {
        if prev != &assignment.name {
            tokens.push((prev.clone(), assignment.name.clone()));
        }
    }
    tokens
}
