use std::{
    ffi::OsString,
    path::{Path, PathBuf},
};

use crate::error::{Error, Result};

pub const DATA_DIR_ENV_VAR: &str = "VIDSEEK_DATA_DIR";

const CONFIG_DB_FILE: &str = "config.redb";

/// Where the data directory location came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Source {
    Flag,
    Env,
    Xdg,
}

impl Source {
    pub fn as_str(self) -> &'static str {
        match self {
            Source::Flag => "--data-dir",
            Source::Env => DATA_DIR_ENV_VAR,
            Source::Xdg => "xdg",
        }
    }
}

/// vidseek's own state: settings and the list of indexed folders.
///
/// Indexes are not kept here; each one lives in its video folder.
#[derive(Debug, Clone)]
pub struct DataDir {
    root: PathBuf,
    source: Source,
}

impl DataDir {
    /// Resolve and create the data directory. `--data-dir` wins over
    /// `VIDSEEK_DATA_DIR`, which wins over `$XDG_DATA_HOME/vidseek`.
    pub fn resolve(explicit: Option<&Path>) -> Result<Self> {
        let (root, source) =
            locate(explicit, std::env::var_os(DATA_DIR_ENV_VAR))?;

        std::fs::create_dir_all(&root)
            .map_err(|_| Error::DataDir(root.clone()))?;
        tracing::debug!(
            root = %root.display(),
            source = source.as_str(),
            "data directory"
        );

        Ok(Self { root, source })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn source(&self) -> Source {
        self.source
    }

    pub fn config_db(&self) -> PathBuf {
        self.root.join(CONFIG_DB_FILE)
    }
}

/// An empty environment value counts as unset.
fn locate(
    explicit: Option<&Path>,
    env: Option<OsString>,
) -> Result<(PathBuf, Source)> {
    if let Some(path) = explicit {
        return Ok((path.to_path_buf(), Source::Flag));
    }
    if let Some(val) = env.filter(|v| !v.is_empty()) {
        return Ok((PathBuf::from(val), Source::Env));
    }
    xdg::BaseDirectories::with_prefix("vidseek")
        .get_data_home()
        .map(|home| (home, Source::Xdg))
        .ok_or_else(|| {
            Error::Config("could not determine XDG data home directory".into())
        })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn flag_wins_over_env() {
        let (root, source) = locate(
            Some(Path::new("/from/flag")),
            Some(OsString::from("/from/env")),
        )
        .unwrap();
        assert_eq!(root, PathBuf::from("/from/flag"));
        assert_eq!(source, Source::Flag);
    }

    #[test]
    fn env_is_used_without_flag() {
        let (root, source) =
            locate(None, Some(OsString::from("/from/env"))).unwrap();
        assert_eq!(root, PathBuf::from("/from/env"));
        assert_eq!(source, Source::Env);
    }

    #[test]
    fn empty_env_falls_through() {
        if let Ok((root, source)) = locate(None, Some(OsString::new())) {
            assert_eq!(source, Source::Xdg);
            assert!(root.ends_with("vidseek"));
        }
    }

    #[test]
    fn resolve_creates_nested_dir() {
        let tmp = tempfile::tempdir().unwrap();
        let nested = tmp.path().join("a").join("b");
        let dir = DataDir::resolve(Some(&nested)).unwrap();

        assert!(nested.is_dir());
        assert_eq!(dir.root(), nested);
        assert_eq!(dir.source(), Source::Flag);
        assert_eq!(dir.config_db(), nested.join("config.redb"));
    }

    #[test]
    fn uncreatable_dir_is_reported() {
        let tmp = tempfile::tempdir().unwrap();
        let file = tmp.path().join("plain-file");
        std::fs::write(&file, b"x").unwrap();

        assert!(matches!(
            DataDir::resolve(Some(&file.join("sub"))),
            Err(Error::DataDir(_))
        ));
    }
}
