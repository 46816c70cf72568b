//! One indexing run over a video folder.
//!
//! A run walks the folder, transcribes each video in turn, and adds every
//! token of every segment to an [`IndexStore`]. A video that cannot be
//! transcribed is reported and skipped; it never aborts the run.

use std::{
    path::Path,
    sync::{
        Arc,
        atomic::{AtomicBool, Ordering},
    },
};

use crate::{
    error::Result,
    index_store::{IndexStore, Occurrence},
    tokenizer,
    transcriber::{Segment, Transcriber},
    walker::{self, ExtensionMatch},
};

pub const COMPLETED_MESSAGE: &str = "Indexing completed!";

/// Cooperative cancellation flag shared between a run and its owner.
#[derive(Debug, Clone, Default)]
pub struct CancelToken(Arc<AtomicBool>);

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::Release);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::Acquire)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProgressKind {
    /// A video is about to be transcribed.
    Processing,
    /// A video was transcribed and indexed.
    FileIndexed,
    /// A video could not be transcribed and was skipped.
    FileFailed,
    /// The run finished every video.
    Completed,
    /// The run stopped early on request.
    Cancelled,
}

/// A progress update: a status line and a percentage in `0..=100`.
#[derive(Debug, Clone, PartialEq)]
pub struct ProgressEvent {
    pub kind: ProgressKind,
    pub message: String,
    pub percent: u8,
    /// File the event is about, if any.
    pub file: Option<String>,
}

impl ProgressEvent {
    fn for_file(
        kind: ProgressKind,
        file: &str,
        message: String,
        percent: u8,
    ) -> Self {
        Self {
            kind,
            message,
            percent,
            file: Some(file.to_string()),
        }
    }
}

/// A video that was skipped, with the reason.
#[derive(Debug, Clone, PartialEq)]
pub struct FileFailure {
    pub file: String,
    pub error: String,
}

/// Outcome of a run.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RunReport {
    /// Videos found in the folder.
    pub total: usize,
    /// Videos transcribed and indexed.
    pub indexed: usize,
    /// Segments added to the index.
    pub segments: usize,
    pub failures: Vec<FileFailure>,
    pub cancelled: bool,
    /// Set when the run finished but its snapshot could not be written.
    pub save_error: Option<String>,
}

impl RunReport {
    pub fn summary(&self) -> String {
        let mut line = format!(
            "{}/{} videos indexed, {} segments",
            self.indexed, self.total, self.segments
        );
        if !self.failures.is_empty() {
            line.push_str(&format!(", {} failed", self.failures.len()));
        }
        if self.cancelled {
            line.push_str(" (cancelled)");
        }
        line
    }
}

/// Percentage of `done` out of `total`, rounded down.
pub fn percent(done: usize, total: usize) -> u8 {
    if total == 0 {
        return 100;
    }
    (done * 100 / total).min(100) as u8
}

/// Index every segment of one transcribed video.
pub fn index_segments(
    store: &mut IndexStore,
    video: &str,
    segments: &[Segment],
) {
    for segment in segments {
        for token in tokenizer::tokenize(&segment.text) {
            store.add(
                &token,
                Occurrence {
                    video: video.to_string(),
                    text: segment.text.clone(),
                    start: segment.start,
                    end: segment.end,
                },
            );
        }
    }
}

/// Transcribe and index every video in `folder` into `store`.
///
/// Videos are processed one at a time. `on_progress` receives a
/// `Processing` event before each video and a `FileIndexed` or
/// `FileFailed` event after it, then a final `Completed` (or `Cancelled`)
/// event. Only listing the folder can fail the run as a whole.
pub fn run(
    folder: &Path,
    matching: ExtensionMatch,
    store: &mut IndexStore,
    transcriber: &dyn Transcriber,
    cancel: &CancelToken,
    mut on_progress: impl FnMut(ProgressEvent),
) -> Result<RunReport> {
    let videos = walker::discover_videos(folder, matching)?;
    let total = videos.len();
    let mut report = RunReport {
        total,
        ..Default::default()
    };

    tracing::info!(
        folder = %folder.display(),
        videos = total,
        backend = transcriber.name(),
        "indexing run started"
    );

    for (done, video) in videos.iter().enumerate() {
        if cancel.is_cancelled() {
            break;
        }

        let name = &video.file_name;
        on_progress(ProgressEvent::for_file(
            ProgressKind::Processing,
            name,
            format!("Processing {name}..."),
            percent(done, total),
        ));

        let transcribed = transcriber.transcribe(&video.path, cancel);
        if cancel.is_cancelled() {
            break;
        }
        match transcribed {
            Ok(segments) => {
                index_segments(store, name, &segments);
                report.indexed += 1;
                report.segments += segments.len();
                tracing::debug!(
                    video = %name,
                    segments = segments.len(),
                    "video indexed"
                );
                on_progress(ProgressEvent::for_file(
                    ProgressKind::FileIndexed,
                    name,
                    format!("Indexed {name} ({} segments)", segments.len()),
                    percent(done + 1, total),
                ));
            }
            Err(e) => {
                tracing::warn!(video = %name, error = %e, "skipping video");
                report.failures.push(FileFailure {
                    file: name.clone(),
                    error: e.to_string(),
                });
                on_progress(ProgressEvent::for_file(
                    ProgressKind::FileFailed,
                    name,
                    format!("Error processing {name}: {e}"),
                    percent(done + 1, total),
                ));
            }
        }
    }

    if cancel.is_cancelled() {
        report.cancelled = true;
        tracing::info!(summary = %report.summary(), "indexing run cancelled");
        on_progress(ProgressEvent {
            kind: ProgressKind::Cancelled,
            message: "Indexing cancelled".to_string(),
            percent: percent(report.indexed + report.failures.len(), total),
            file: None,
        });
        return Ok(report);
    }

    tracing::info!(summary = %report.summary(), "indexing run finished");
    on_progress(ProgressEvent {
        kind: ProgressKind::Completed,
        message: COMPLETED_MESSAGE.to_string(),
        percent: 100,
        file: None,
    });
    Ok(report)
}
