//! Playback of a search result's time range in an external player.

use std::{
    ffi::OsString,
    path::{Path, PathBuf},
    process::{Child, Command, Stdio},
};

use crate::{
    error::{Error, Result},
    index_store::Occurrence,
};

pub const DEFAULT_PLAYER: &str = "mpv";

/// A video clip to play, bounded in milliseconds.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlaybackRequest {
    pub path: PathBuf,
    pub start_ms: u64,
    pub end_ms: u64,
}

impl PlaybackRequest {
    pub fn from_occurrence(folder: &Path, occurrence: &Occurrence) -> Self {
        Self {
            path: folder.join(&occurrence.video),
            start_ms: seconds_to_ms(occurrence.start),
            end_ms: seconds_to_ms(occurrence.end),
        }
    }
}

/// Truncating conversion; negative and NaN inputs saturate to 0.
pub fn seconds_to_ms(seconds: f64) -> u64 {
    (seconds * 1000.0) as u64
}

fn format_seconds(ms: u64) -> String {
    format!("{}.{:03}", ms / 1000, ms % 1000)
}

pub trait Player {
    fn play(&mut self, request: &PlaybackRequest) -> Result<()>;
}

/// Command-line flavours the player arguments are rendered for.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Flavor {
    Mpv,
    Vlc,
    Ffplay,
}

impl Flavor {
    fn detect(program: &Path) -> Self {
        let stem = program
            .file_stem()
            .and_then(|s| s.to_str())
            .unwrap_or_default()
            .to_ascii_lowercase();
        match stem.as_str() {
            "vlc" | "cvlc" => Self::Vlc,
            "ffplay" => Self::Ffplay,
            _ => Self::Mpv,
        }
    }
}

/// Spawns an external player for each request.
///
/// Starting a new clip stops the one still playing.
pub struct CommandPlayer {
    program: PathBuf,
    flavor: Flavor,
    current: Option<Child>,
}

impl CommandPlayer {
    pub fn new(program: impl Into<PathBuf>) -> Self {
        let program = program.into();
        let flavor = Flavor::detect(&program);
        Self {
            program,
            flavor,
            current: None,
        }
    }

    pub fn program(&self) -> &Path {
        &self.program
    }

    pub fn args(&self, request: &PlaybackRequest) -> Vec<OsString> {
        let start = format_seconds(request.start_ms);
        let end = format_seconds(request.end_ms);
        let mut args: Vec<OsString> = match self.flavor {
            Flavor::Mpv => vec![
                format!("--start={start}").into(),
                format!("--end={end}").into(),
            ],
            Flavor::Vlc => vec![
                format!("--start-time={start}").into(),
                format!("--stop-time={end}").into(),
                "--play-and-exit".into(),
            ],
            Flavor::Ffplay => vec![
                "-ss".into(),
                start.into(),
                "-t".into(),
                format_seconds(request.end_ms.saturating_sub(request.start_ms))
                    .into(),
                "-autoexit".into(),
            ],
        };
        args.push(request.path.clone().into_os_string());
        args
    }

    /// Block until the current clip finishes.
    pub fn wait(&mut self) -> Result<()> {
        if let Some(mut child) = self.current.take() {
            let status = child.wait()?;
            if !status.success() {
                return Err(Error::Playback(format!(
                    "{} exited with {status}",
                    self.program.display()
                )));
            }
        }
        Ok(())
    }

    /// Stop the current clip if one is still playing.
    pub fn stop(&mut self) {
        if let Some(mut child) = self.current.take()
            && let Ok(None) = child.try_wait()
        {
            if let Err(e) = child.kill() {
                tracing::debug!(error = %e, "failed to stop player");
            }
            let _ = child.wait();
        }
    }
}

impl Player for CommandPlayer {
    fn play(&mut self, request: &PlaybackRequest) -> Result<()> {
        if !request.path.is_file() {
            return Err(Error::NotFound {
                kind: "video",
                name: request.path.display().to_string(),
            });
        }

        self.stop();

        tracing::info!(
            path = %request.path.display(),
            start_ms = request.start_ms,
            end_ms = request.end_ms,
            "starting playback"
        );
        let child = Command::new(&self.program)
            .args(self.args(request))
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .spawn()
            .map_err(|e| {
                Error::Playback(format!(
                    "failed to start {}: {e}",
                    self.program.display()
                ))
            })?;
        self.current = Some(child);
        Ok(())
    }
}
