use std::{
    path::{Path, PathBuf},
    str::FromStr,
};

use crate::error::{Error, Result};

/// Video extensions picked up from a folder.
pub const VIDEO_EXTENSIONS: &[&str] = &["mp4", "avi", "mov"];

/// How file extensions are compared against [`VIDEO_EXTENSIONS`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum ExtensionMatch {
    /// `clip.MP4` is ignored.
    #[default]
    Exact,
    /// `clip.MP4` is indexed.
    IgnoreCase,
}

impl ExtensionMatch {
    pub fn as_str(self) -> &'static str {
        match self {
            ExtensionMatch::Exact => "exact",
            ExtensionMatch::IgnoreCase => "ignore-case",
        }
    }

    fn matches(self, ext: &str) -> bool {
        match self {
            ExtensionMatch::Exact => VIDEO_EXTENSIONS.contains(&ext),
            ExtensionMatch::IgnoreCase => VIDEO_EXTENSIONS
                .iter()
                .any(|known| known.eq_ignore_ascii_case(ext)),
        }
    }
}

impl FromStr for ExtensionMatch {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "exact" => Ok(ExtensionMatch::Exact),
            "ignore-case" => Ok(ExtensionMatch::IgnoreCase),
            other => Err(Error::Config(format!(
                "unknown extension_match '{other}' (expected exact or ignore-case)"
            ))),
        }
    }
}

/// A video found directly inside the indexed folder.
#[derive(Debug, Clone)]
pub struct DiscoveredVideo {
    /// File name, used as the `video` field of every occurrence.
    pub file_name: String,
    pub path: PathBuf,
}

/// List the videos directly under `folder`, sorted by file name.
///
/// Subdirectories are not descended into and hidden files are skipped.
pub fn discover_videos(
    folder: &Path,
    matching: ExtensionMatch,
) -> Result<Vec<DiscoveredVideo>> {
    let mut results = Vec::new();

    for entry in std::fs::read_dir(folder)? {
        let entry = entry?;
        let file_name = entry.file_name();
        let Some(name) = file_name.to_str() else {
            tracing::warn!(
                name = %file_name.to_string_lossy(),
                "skipping file with non UTF-8 name"
            );
            continue;
        };

        if name.starts_with('.') {
            continue;
        }

        let path = entry.path();
        // Follows symlinks, so a link to a video counts as a video.
        if !path.is_file() || !is_video(&path, matching) {
            continue;
        }

        results.push(DiscoveredVideo {
            file_name: name.to_string(),
            path,
        });
    }

    results.sort_by(|a, b| a.file_name.cmp(&b.file_name));
    Ok(results)
}

fn is_video(path: &Path, matching: ExtensionMatch) -> bool {
    path.extension()
        .and_then(|ext| ext.to_str())
        .is_some_and(|ext| matching.matches(ext))
}
