use std::{
    io::Write,
    path::{Path, PathBuf},
};

use crate::{
    error::{Error, Result},
    index_store::IndexStore,
};

/// Name of the snapshot file kept inside every indexed folder.
pub const INDEX_FILE_NAME: &str = "video_index.json";

pub fn index_path(folder: &Path) -> PathBuf {
    folder.join(INDEX_FILE_NAME)
}

/// Write the snapshot of `store` into `folder`.
///
/// The JSON is written to a temporary file in the same folder and renamed
/// over the previous snapshot, so readers never see a half-written file.
pub fn save(folder: &Path, store: &IndexStore) -> Result<PathBuf> {
    let path = index_path(folder);
    let bytes = store.to_json()?;

    let mut tmp = tempfile::NamedTempFile::new_in(folder)?;
    tmp.write_all(&bytes)?;
    tmp.as_file().sync_all()?;
    tmp.persist(&path).map_err(|e| Error::Io(e.error))?;

    tracing::debug!(
        path = %path.display(),
        words = store.len(),
        bytes = bytes.len(),
        "saved index snapshot"
    );
    Ok(path)
}

/// Load the snapshot stored in `folder`, if there is one.
pub fn load(folder: &Path) -> Result<Option<IndexStore>> {
    let path = index_path(folder);
    let bytes = match std::fs::read(&path) {
        Ok(bytes) => bytes,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
        Err(e) => return Err(e.into()),
    };

    let store = IndexStore::from_json(&bytes).map_err(|e| match e {
        Error::CorruptState { reason, .. } => Error::CorruptState {
            path: path.clone(),
            reason,
        },
        other => other,
    })?;

    tracing::debug!(
        path = %path.display(),
        words = store.len(),
        "loaded index snapshot"
    );
    Ok(Some(store))
}

pub fn exists(folder: &Path) -> bool {
    index_path(folder).is_file()
}
