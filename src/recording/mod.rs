//! Recording session manager.
//!
//! Owns the lifecycle of at most one capture process at a time. The session
//! is persisted as a single JSON file created with `O_EXCL` semantics so two
//! concurrent `start` calls cannot both win, and so a separate process (a
//! status bar, another CLI invocation) can observe the session. A session
//! whose pid is no longer alive is treated as stale and discarded on the
//! next status check.

use anyhow::{Context, Result};
use chrono::{DateTime, Local, Utc};
use serde::{Deserialize, Serialize};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::{debug, info, warn};

use crate::config::RecordingConfig;
use crate::error::PipelineError;

/// Persisted record of the active capture process.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionRecord {
    pub pid: i32,
    pub output_path: PathBuf,
    pub started_at: DateTime<Utc>,
}

/// Current recording state as seen by `status()`.
#[derive(Debug, Clone, PartialEq)]
pub enum RecordingStatus {
    Idle,
    Recording {
        duration: Duration,
        path: PathBuf,
    },
}

/// Outcome of `stop()`. The session is always cleared; a missing output
/// file is reported rather than treated as a hard failure.
#[derive(Debug)]
pub struct StopOutcome {
    pub output_path: PathBuf,
    pub artifact_missing: bool,
}

fn process_alive(pid: i32) -> bool {
    unsafe { libc::kill(pid, 0) == 0 }
}

/// Collect the exit status if `pid` is a zombie child of this process.
/// When the recorder outlives the CLI that spawned it, init reaps instead
/// and this is a harmless ECHILD.
fn reap(pid: i32) {
    unsafe {
        libc::waitpid(pid, std::ptr::null_mut(), libc::WNOHANG);
    }
}

/// Atomic create/read/remove of the session file.
pub struct SessionStore {
    path: PathBuf,
}

impl SessionStore {
    pub fn new(path: PathBuf) -> Self {
        Self { path }
    }

    /// Exclusive create. Fails with `AlreadyRecording` if a session file
    /// already exists.
    pub fn create(&self, record: &SessionRecord) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent).context("Failed to create session directory")?;
        }

        let mut file = match std::fs::OpenOptions::new()
            .write(true)
            .create_new(true)
            .open(&self.path)
        {
            Ok(f) => f,
            Err(e) if e.kind() == std::io::ErrorKind::AlreadyExists => {
                return Err(PipelineError::AlreadyRecording.into());
            }
            Err(e) => return Err(e).context("Failed to create session file"),
        };

        let content = serde_json::to_string_pretty(record)
            .context("Failed to serialize session record")?;
        file.write_all(content.as_bytes())
            .context("Failed to write session record")?;
        Ok(())
    }

    pub fn read(&self) -> Result<Option<SessionRecord>> {
        if !self.path.exists() {
            return Ok(None);
        }
        let content =
            std::fs::read_to_string(&self.path).context("Failed to read session file")?;
        let record =
            serde_json::from_str(&content).context("Failed to parse session record")?;
        Ok(Some(record))
    }

    pub fn remove(&self) -> Result<()> {
        match std::fs::remove_file(&self.path) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e).context("Failed to remove session file"),
        }
    }
}

pub struct RecordingManager {
    store: SessionStore,
    output_dir: PathBuf,
    config: RecordingConfig,
}

impl RecordingManager {
    pub fn new(session_path: PathBuf, output_dir: PathBuf, config: RecordingConfig) -> Self {
        Self {
            store: SessionStore::new(session_path),
            output_dir,
            config,
        }
    }

    /// Start a capture process. Fails with `AlreadyRecording` when a live
    /// session exists. The session record is written as soon as the process
    /// is spawned, before it is confirmed healthy, so a mid-spawn crash is
    /// still visible on restart.
    pub fn start(&self) -> Result<SessionRecord> {
        if let RecordingStatus::Recording { .. } = self.status()? {
            return Err(PipelineError::AlreadyRecording.into());
        }

        std::fs::create_dir_all(&self.output_dir)
            .context("Failed to create recording output directory")?;

        let timestamp = Local::now().format("%Y-%m-%d-%H-%M-%S");
        let output_path = self.output_dir.join(format!("recording-{timestamp}.mp4"));

        let mut child = self.spawn_capture(&output_path)?;

        let record = SessionRecord {
            pid: child.id() as i32,
            output_path: output_path.clone(),
            started_at: Utc::now(),
        };

        if let Err(e) = self.store.create(&record) {
            // Lost the create race to a concurrent start.
            let _ = child.kill();
            let _ = child.wait();
            return Err(e);
        }

        info!(
            "Recording started (pid {}): {:?}",
            record.pid, record.output_path
        );
        Ok(record)
    }

    /// Stop the active capture process. SIGINT first for a clean container
    /// finalize, SIGKILL after the grace period. The session record is
    /// removed unconditionally once termination has been attempted.
    pub fn stop(&self) -> Result<StopOutcome> {
        let record = self
            .store
            .read()?
            .ok_or(PipelineError::NoActiveRecording)?;

        if process_alive(record.pid) {
            debug!("Sending SIGINT to capture process {}", record.pid);
            unsafe {
                libc::kill(record.pid, libc::SIGINT);
            }

            let grace = Duration::from_secs(self.config.stop_grace_seconds);
            let deadline = std::time::Instant::now() + grace;
            while process_alive(record.pid) && std::time::Instant::now() < deadline {
                std::thread::sleep(Duration::from_millis(100));
                reap(record.pid);
            }

            if process_alive(record.pid) {
                warn!(
                    "Capture process {} did not exit within {}s, killing",
                    record.pid, self.config.stop_grace_seconds
                );
                unsafe {
                    libc::kill(record.pid, libc::SIGKILL);
                }
                std::thread::sleep(Duration::from_millis(100));
                reap(record.pid);
            }
        } else {
            warn!(
                "Capture process {} already gone, clearing session",
                record.pid
            );
        }

        self.store.remove()?;

        let artifact_missing = !record.output_path.exists();
        if artifact_missing {
            warn!(
                "Recording stopped but output file is missing: {:?}",
                record.output_path
            );
        } else {
            info!("Recording saved: {:?}", record.output_path);
        }

        Ok(StopOutcome {
            output_path: record.output_path,
            artifact_missing,
        })
    }

    /// Read the current session state. A record whose process is dead is
    /// removed as a side effect and reported as `Idle`.
    pub fn status(&self) -> Result<RecordingStatus> {
        let Some(record) = self.store.read()? else {
            return Ok(RecordingStatus::Idle);
        };

        if !process_alive(record.pid) {
            warn!(
                "Stale session found (pid {} not alive), discarding",
                record.pid
            );
            self.store.remove()?;
            return Ok(RecordingStatus::Idle);
        }

        let elapsed = (Utc::now() - record.started_at).num_seconds().max(0) as u64;
        Ok(RecordingStatus::Recording {
            duration: Duration::from_secs(elapsed),
            path: record.output_path,
        })
    }

    fn spawn_capture(&self, output_path: &Path) -> Result<std::process::Child> {
        if let Some(command) = &self.config.capture_command {
            debug!("Spawning capture command: {}", command);
            return std::process::Command::new("sh")
                .arg("-c")
                .arg(command)
                .env("SCRIBA_OUTPUT", output_path)
                .stdin(std::process::Stdio::null())
                .stdout(std::process::Stdio::null())
                .stderr(std::process::Stdio::null())
                .spawn()
                .context("Failed to spawn capture command");
        }

        let ffmpeg =
            which::which("ffmpeg").context("ffmpeg not found in PATH, cannot record")?;

        let mut cmd = std::process::Command::new(ffmpeg);
        for arg in capture_args(&self.config.mic_source, detect_monitor_source().as_deref()) {
            cmd.arg(arg);
        }
        cmd.arg(output_path);

        cmd.stdin(std::process::Stdio::null())
            .stdout(std::process::Stdio::null())
            .stderr(std::process::Stdio::null())
            .spawn()
            .context("Failed to spawn ffmpeg")
    }
}

/// ffmpeg arguments for capturing the mic, merged with the system monitor
/// source when one is available. The output path is appended by the caller.
fn capture_args(mic_source: &str, monitor_source: Option<&str>) -> Vec<String> {
    let mut args: Vec<String> = vec!["-f".into(), "pulse".into(), "-i".into(), mic_source.into()];
    if let Some(monitor) = monitor_source {
        args.extend([
            "-f".into(),
            "pulse".into(),
            "-i".into(),
            monitor.into(),
            "-filter_complex".into(),
            "amerge=inputs=2".into(),
            "-ac".into(),
            "2".into(),
        ]);
    }
    args.push("-y".into());
    args
}

/// Probe PulseAudio for a monitor source so system audio can be captured
/// alongside the mic. Absence of pactl (or of a monitor) is not an error.
fn detect_monitor_source() -> Option<String> {
    let output = std::process::Command::new("pactl")
        .args(["list", "short", "sources"])
        .output()
        .ok()?;
    if !output.status.success() {
        return None;
    }
    let stdout = String::from_utf8_lossy(&output.stdout);
    stdout
        .lines()
        .find(|line| line.to_lowercase().contains("monitor"))
        .and_then(|line| line.split_whitespace().nth(1))
        .map(|name| name.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    // Way above any real pid_max.
    const DEAD_PID: i32 = 999_999_999;

    fn manager(dir: &TempDir) -> RecordingManager {
        let config = RecordingConfig {
            capture_command: Some("sleep 30".to_string()),
            stop_grace_seconds: 1,
            ..RecordingConfig::default()
        };
        RecordingManager::new(
            dir.path().join("session.json"),
            dir.path().join("recordings"),
            config,
        )
    }

    #[test]
    fn test_status_idle_without_session() {
        let dir = TempDir::new().unwrap();
        assert_eq!(manager(&dir).status().unwrap(), RecordingStatus::Idle);
    }

    #[test]
    fn test_start_twice_is_already_recording() {
        let dir = TempDir::new().unwrap();
        let manager = manager(&dir);

        let record = manager.start().unwrap();
        assert!(process_alive(record.pid));

        let err = manager.start().unwrap_err();
        assert!(matches!(
            err.downcast_ref::<PipelineError>(),
            Some(PipelineError::AlreadyRecording)
        ));

        manager.stop().unwrap();
    }

    #[test]
    fn test_stop_clears_session_and_reports_missing_artifact() {
        let dir = TempDir::new().unwrap();
        let manager = manager(&dir);

        let record = manager.start().unwrap();
        // "sleep" never writes the output file.
        let outcome = manager.stop().unwrap();
        assert_eq!(outcome.output_path, record.output_path);
        assert!(outcome.artifact_missing);
        assert!(!process_alive(record.pid) || {
            // SIGKILL delivery can lag; give it a moment.
            std::thread::sleep(Duration::from_millis(200));
            !process_alive(record.pid)
        });

        assert_eq!(manager.status().unwrap(), RecordingStatus::Idle);
    }

    #[test]
    fn test_stop_finds_artifact_when_present() {
        let dir = TempDir::new().unwrap();
        let manager = manager(&dir);

        let record = manager.start().unwrap();
        std::fs::write(&record.output_path, b"audio").unwrap();

        let outcome = manager.stop().unwrap();
        assert!(!outcome.artifact_missing);
        assert_eq!(outcome.output_path, record.output_path);
    }

    #[test]
    fn test_stop_without_session_is_no_active_recording() {
        let dir = TempDir::new().unwrap();
        let err = manager(&dir).stop().unwrap_err();
        assert!(matches!(
            err.downcast_ref::<PipelineError>(),
            Some(PipelineError::NoActiveRecording)
        ));
    }

    #[test]
    fn test_stale_session_self_heals() {
        let dir = TempDir::new().unwrap();
        let manager = manager(&dir);

        let store = SessionStore::new(dir.path().join("session.json"));
        store
            .create(&SessionRecord {
                pid: DEAD_PID,
                output_path: dir.path().join("recordings/recording-x.mp4"),
                started_at: Utc::now(),
            })
            .unwrap();

        assert_eq!(manager.status().unwrap(), RecordingStatus::Idle);
        // The stale record was discarded.
        assert!(store.read().unwrap().is_none());
    }

    #[test]
    fn test_session_store_exclusive_create() {
        let dir = TempDir::new().unwrap();
        let store = SessionStore::new(dir.path().join("session.json"));
        let record = SessionRecord {
            pid: DEAD_PID,
            output_path: PathBuf::from("/tmp/out.mp4"),
            started_at: Utc::now(),
        };

        store.create(&record).unwrap();
        let err = store.create(&record).unwrap_err();
        assert!(matches!(
            err.downcast_ref::<PipelineError>(),
            Some(PipelineError::AlreadyRecording)
        ));
    }

    #[test]
    fn test_capture_args_mic_only() {
        let args = capture_args("default", None);
        assert_eq!(args, vec!["-f", "pulse", "-i", "default", "-y"]);
    }

    #[test]
    fn test_capture_args_with_monitor() {
        let args = capture_args("default", Some("alsa_output.monitor"));
        assert!(args.contains(&"amerge=inputs=2".to_string()));
        assert!(args.contains(&"alsa_output.monitor".to_string()));
    }
}
