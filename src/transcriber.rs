//! Speech-to-text collaborators.
//!
//! The indexer only needs an ordered list of timed text segments per video.
//! Both backends consume the JSON document written by the `whisper`
//! command line tool: either produced on the fly, or left next to the
//! video by an earlier run.

use std::{
    fs::File,
    path::{Path, PathBuf},
    process::{Command, ExitStatus, Stdio},
    time::Duration,
};

use serde::Deserialize;

use crate::{
    error::{Error, Result},
    persistence,
    pipeline::CancelToken,
};

/// How often a running `whisper` process is checked for exit or cancel.
const POLL_INTERVAL: Duration = Duration::from_millis(50);

/// One timed piece of transcript.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct Segment {
    pub text: String,
    pub start: f64,
    pub end: f64,
}

/// Turns a video into transcript segments, ordered by start time.
///
/// Implementations that block for long should return early once `cancel`
/// is set; the returned value is then discarded.
pub trait Transcriber: Send + Sync {
    fn transcribe(
        &self,
        video: &Path,
        cancel: &CancelToken,
    ) -> Result<Vec<Segment>>;

    /// Short backend name for status output.
    fn name(&self) -> &str;
}

#[derive(Debug, Deserialize)]
struct WhisperDocument {
    segments: Vec<Segment>,
}

/// Parse a whisper JSON document into trimmed segments.
///
/// Unknown fields (`id`, `tokens`, `avg_logprob`, ...) are ignored.
pub fn parse_whisper_json(bytes: &[u8]) -> Result<Vec<Segment>> {
    let doc: WhisperDocument = serde_json::from_slice(bytes)?;
    Ok(doc
        .segments
        .into_iter()
        .map(|s| Segment {
            text: s.text.trim().to_string(),
            ..s
        })
        .collect())
}

fn file_label(video: &Path) -> String {
    video
        .file_name()
        .map(|n| n.to_string_lossy().to_string())
        .unwrap_or_else(|| video.display().to_string())
}

fn transcription_error(video: &Path, reason: impl ToString) -> Error {
    Error::Transcription {
        file: file_label(video),
        reason: reason.to_string(),
    }
}

/// Runs the `whisper` command line tool for every video.
#[derive(Debug, Clone)]
pub struct WhisperCli {
    program: PathBuf,
    model: String,
    task: String,
}

impl WhisperCli {
    pub fn new(program: PathBuf, model: String, task: String) -> Self {
        Self {
            program,
            model,
            task,
        }
    }

    pub fn program(&self) -> &Path {
        &self.program
    }

    pub fn model(&self) -> &str {
        &self.model
    }
}

impl WhisperCli {
    /// Wait for `whisper` to exit, killing it if the run is cancelled.
    fn wait_or_kill(
        &self,
        video: &Path,
        child: &mut std::process::Child,
        cancel: &CancelToken,
    ) -> Result<Option<ExitStatus>> {
        loop {
            if let Some(status) = child.try_wait()? {
                return Ok(Some(status));
            }
            if cancel.is_cancelled() {
                tracing::debug!(
                    video = %video.display(),
                    pid = child.id(),
                    "cancelled, stopping whisper"
                );
                if let Err(e) = child.kill() {
                    tracing::warn!(error = %e, "failed to stop whisper");
                }
                child.wait()?;
                return Ok(None);
            }
            std::thread::sleep(POLL_INTERVAL);
        }
    }
}

impl Transcriber for WhisperCli {
    fn transcribe(
        &self,
        video: &Path,
        cancel: &CancelToken,
    ) -> Result<Vec<Segment>> {
        let out_dir = tempfile::tempdir()?;
        let log_path = out_dir.path().join("whisper.log");
        tracing::debug!(
            video = %video.display(),
            model = %self.model,
            "running whisper"
        );

        let mut child = Command::new(&self.program)
            .arg(video)
            .args(["--model", &self.model])
            .args(["--task", &self.task])
            .args(["--output_format", "json"])
            .arg("--output_dir")
            .arg(out_dir.path())
            .args(["--verbose", "False"])
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(File::create(&log_path)?)
            .spawn()
            .map_err(|e| transcription_error(video, e))?;

        let Some(status) = self.wait_or_kill(video, &mut child, cancel)? else {
            return Err(transcription_error(video, "cancelled"));
        };

        if !status.success() {
            let log = std::fs::read_to_string(&log_path).unwrap_or_default();
            let last_line = log.lines().last().unwrap_or("").trim();
            return Err(transcription_error(
                video,
                format!("whisper exited with {status}: {last_line}"),
            ));
        }

        let stem = video
            .file_stem()
            .ok_or_else(|| transcription_error(video, "no file stem"))?;
        let mut json_name = stem.to_os_string();
        json_name.push(".json");
        let json_path = out_dir.path().join(json_name);
        let bytes = std::fs::read(&json_path).map_err(|e| {
            transcription_error(
                video,
                format!("missing whisper output {}: {e}", json_path.display()),
            )
        })?;

        parse_whisper_json(&bytes).map_err(|e| transcription_error(video, e))
    }

    fn name(&self) -> &str {
        "whisper"
    }
}

/// Reads whisper JSON output stored next to each video.
///
/// `talk.mp4.json` is preferred; `talk.json` is accepted when it is not the
/// folder's index snapshot.
#[derive(Debug, Clone, Default)]
pub struct SidecarTranscriber;

impl SidecarTranscriber {
    /// Candidate transcript paths for `video`, most specific first.
    pub fn candidates(video: &Path) -> Vec<PathBuf> {
        let mut candidates = Vec::with_capacity(2);
        if let Some(name) = video.file_name() {
            let mut full = name.to_os_string();
            full.push(".json");
            candidates.push(video.with_file_name(full));
        }
        let stem = video.with_extension("json");
        if stem
            .file_name()
            .is_some_and(|n| n != persistence::INDEX_FILE_NAME)
        {
            candidates.push(stem);
        }
        candidates
    }

    /// First existing transcript for `video`.
    pub fn sidecar_path(video: &Path) -> Option<PathBuf> {
        Self::candidates(video).into_iter().find(|p| p.is_file())
    }
}

impl Transcriber for SidecarTranscriber {
    fn transcribe(
        &self,
        video: &Path,
        _cancel: &CancelToken,
    ) -> Result<Vec<Segment>> {
        let path = Self::sidecar_path(video).ok_or_else(|| {
            let tried: Vec<_> = Self::candidates(video)
                .iter()
                .filter_map(|p| p.file_name())
                .map(|n| n.to_string_lossy().into_owned())
                .collect();
            transcription_error(
                video,
                format!("no transcript found (tried {})", tried.join(", ")),
            )
        })?;
        let bytes = std::fs::read(&path).map_err(|e| {
            transcription_error(
                video,
                format!("cannot read transcript {}: {e}", path.display()),
            )
        })?;
        parse_whisper_json(&bytes).map_err(|e| transcription_error(video, e))
    }

    fn name(&self) -> &str {
        "sidecar"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const WHISPER_OUTPUT: &str = r#"{
        "text": " Hello there. General Kenobi.",
        "segments": [
            {"id": 0, "seek": 0, "start": 0.0, "end": 1.5, "text": " Hello there.", "tokens": [1, 2]},
            {"id": 1, "seek": 0, "start": 1.5, "end": 3.25, "text": " General Kenobi.", "tokens": [3]}
        ],
        "language": "en"
    }"#;

    #[test]
    fn parses_whisper_segments() {
        let segments = parse_whisper_json(WHISPER_OUTPUT.as_bytes()).unwrap();
        assert_eq!(
            segments,
            vec![
                Segment {
                    text: "Hello there.".to_string(),
                    start: 0.0,
                    end: 1.5,
                },
                Segment {
                    text: "General Kenobi.".to_string(),
                    start: 1.5,
                    end: 3.25,
                },
            ]
        );
    }

    #[test]
    fn rejects_document_without_segments() {
        assert!(parse_whisper_json(br#"{"text": "hi"}"#).is_err());
        assert!(parse_whisper_json(b"garbage").is_err());
    }

    #[test]
    fn sidecar_reads_json_next_to_video() {
        let tmp = tempfile::tempdir().unwrap();
        let video = tmp.path().join("talk.mp4");
        std::fs::write(&video, b"not really a video").unwrap();
        std::fs::write(tmp.path().join("talk.json"), WHISPER_OUTPUT).unwrap();

        let segments = SidecarTranscriber
            .transcribe(&video, &CancelToken::new())
            .unwrap();
        assert_eq!(segments.len(), 2);
        assert_eq!(segments[1].text, "General Kenobi.");
    }

    #[test]
    fn sidecar_missing_transcript_names_the_file() {
        let tmp = tempfile::tempdir().unwrap();
        let video = tmp.path().join("silent.mov");
        std::fs::write(&video, b"x").unwrap();

        match SidecarTranscriber.transcribe(&video, &CancelToken::new()) {
            Err(Error::Transcription { file, .. }) => {
                assert_eq!(file, "silent.mov")
            }
            other => panic!("expected transcription error, got {other:?}"),
        }
    }

    #[test]
    fn whisper_cli_reports_missing_program() {
        let cli = WhisperCli::new(
            PathBuf::from("/definitely/not/a/whisper-binary"),
            "base".to_string(),
            "translate".to_string(),
        );
        let err = cli
            .transcribe(Path::new("clip.mp4"), &CancelToken::new())
            .unwrap_err();
        assert!(matches!(err, Error::Transcription { .. }));
    }

    #[test]
    fn sidecar_prefers_full_file_name() {
        let tmp = tempfile::tempdir().unwrap();
        for name in ["talk.mp4", "talk.mov"] {
            std::fs::write(tmp.path().join(name), b"x").unwrap();
        }
        std::fs::write(tmp.path().join("talk.json"), WHISPER_OUTPUT).unwrap();
        std::fs::write(
            tmp.path().join("talk.mov.json"),
            r#"{"segments": [{"text": "other take", "start": 0.0, "end": 1.0}]}"#,
        )
        .unwrap();

        let cancel = CancelToken::new();
        let mov = SidecarTranscriber
            .transcribe(&tmp.path().join("talk.mov"), &cancel)
            .unwrap();
        assert_eq!(mov[0].text, "other take");

        let mp4 = SidecarTranscriber
            .transcribe(&tmp.path().join("talk.mp4"), &cancel)
            .unwrap();
        assert_eq!(mp4.len(), 2);
    }

    #[test]
    fn sidecar_never_reads_the_index_snapshot() {
        let tmp = tempfile::tempdir().unwrap();
        let video = tmp.path().join("video_index.mp4");
        std::fs::write(&video, b"x").unwrap();
        std::fs::write(
            persistence::index_path(tmp.path()),
            r#"{"index": {}, "words": [], "segments": []}"#,
        )
        .unwrap();

        assert_eq!(SidecarTranscriber::candidates(&video).len(), 1);
        assert!(SidecarTranscriber::sidecar_path(&video).is_none());
        assert!(matches!(
            SidecarTranscriber.transcribe(&video, &CancelToken::new()),
            Err(Error::Transcription { .. })
        ));
    }

    /// Write a shell script standing in for `whisper` and return a
    /// transcriber that runs it through `/bin/sh`.
    ///
    /// `/bin/sh` is the program and the script is passed as the "video", so
    /// inside the script `$7` is `--output_dir` and `$8` its value.
    #[cfg(unix)]
    fn fake_whisper(dir: &Path, body: &str) -> (WhisperCli, PathBuf) {
        let script = dir.join("clip.mp4");
        std::fs::write(&script, body).unwrap();
        let cli = WhisperCli::new(
            PathBuf::from("/bin/sh"),
            "base".to_string(),
            "translate".to_string(),
        );
        (cli, script)
    }

    #[cfg(unix)]
    fn is_alive(pid: &str) -> bool {
        Command::new("kill")
            .args(["-0", pid])
            .stderr(Stdio::null())
            .status()
            .is_ok_and(|s| s.success())
    }

    #[cfg(unix)]
    #[test]
    fn whisper_cli_reads_json_from_output_dir() {
        let tmp = tempfile::tempdir().unwrap();
        let (cli, video) = fake_whisper(
            tmp.path(),
            r#"printf '%s' '{"segments": [{"text": " hi ", "start": 0.5, "end": 1.0}]}' > "$8/clip.json""#,
        );

        let segments = cli.transcribe(&video, &CancelToken::new()).unwrap();
        assert_eq!(segments.len(), 1);
        assert_eq!(segments[0].text, "hi");
    }

    #[cfg(unix)]
    #[test]
    fn whisper_cli_failure_reports_last_log_line() {
        let tmp = tempfile::tempdir().unwrap();
        let (cli, video) = fake_whisper(
            tmp.path(),
            "echo 'loading model' >&2\necho 'CUDA out of memory' >&2\nexit 3\n",
        );

        match cli.transcribe(&video, &CancelToken::new()) {
            Err(Error::Transcription { reason, .. }) => {
                assert!(reason.contains("CUDA out of memory"), "got {reason}");
            }
            other => panic!("expected transcription error, got {other:?}"),
        }
    }

    #[cfg(unix)]
    #[test]
    fn cancel_kills_running_whisper() {
        let tmp = tempfile::tempdir().unwrap();
        let pid_file = tmp.path().join("pid");
        let (cli, video) = fake_whisper(
            tmp.path(),
            &format!("echo $$ > '{}'\nexec sleep 30\n", pid_file.display()),
        );

        let cancel = CancelToken::new();
        let worker_cancel = cancel.clone();
        let worker =
            std::thread::spawn(move || cli.transcribe(&video, &worker_cancel));

        let pid = loop {
            if let Ok(pid) = std::fs::read_to_string(&pid_file)
                && !pid.trim().is_empty()
            {
                break pid.trim().to_string();
            }
            std::thread::sleep(Duration::from_millis(10));
        };
        assert!(is_alive(&pid));

        let started = std::time::Instant::now();
        cancel.cancel();
        let result = worker.join().unwrap();

        assert!(started.elapsed() < Duration::from_secs(5));
        assert!(matches!(result, Err(Error::Transcription { .. })));
        assert!(!is_alive(&pid), "whisper {pid} still running after cancel");
    }
}
