use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// One transcript segment recorded under a word.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Occurrence {
    /// File name of the video, relative to the indexed folder.
    pub video: String,
    /// Full text of the segment the word was found in.
    pub text: String,
    /// Segment start, in seconds.
    pub start: f64,
    /// Segment end, in seconds.
    pub end: f64,
}

/// Serialized form of an [`IndexStore`].
///
/// `words` mirrors the keys of `index`. It is written for readers of the
/// file and ignored on restore, where the vocabulary is derived again.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Snapshot {
    pub index: BTreeMap<String, Vec<Occurrence>>,
    pub words: Vec<String>,
}

/// In-memory inverted index: word -> postings list in insertion order.
///
/// The vocabulary is the key set of the map, so it can never drift from
/// the postings.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct IndexStore {
    postings: BTreeMap<String, Vec<Occurrence>>,
}

impl IndexStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn clear(&mut self) {
        self.postings.clear();
    }

    /// Append `occurrence` to the postings list of `word`.
    pub fn add(&mut self, word: &str, occurrence: Occurrence) {
        match self.postings.get_mut(word) {
            Some(list) => list.push(occurrence),
            None => {
                self.postings.insert(word.to_string(), vec![occurrence]);
            }
        }
    }

    pub fn get(&self, word: &str) -> Option<&[Occurrence]> {
        self.postings.get(word).map(Vec::as_slice)
    }

    /// Vocabulary in code point order.
    pub fn words(&self) -> Vec<String> {
        self.postings.keys().cloned().collect()
    }

    /// Number of distinct words.
    pub fn len(&self) -> usize {
        self.postings.len()
    }

    pub fn is_empty(&self) -> bool {
        self.postings.is_empty()
    }

    /// Total number of postings across all words.
    pub fn occurrence_count(&self) -> usize {
        self.postings.values().map(Vec::len).sum()
    }

    /// Append every postings list of `other` after the existing entries.
    pub fn extend_from(&mut self, other: IndexStore) {
        for (word, list) in other.postings {
            self.postings.entry(word).or_default().extend(list);
        }
    }

    pub fn snapshot(&self) -> Snapshot {
        Snapshot {
            index: self.postings.clone(),
            words: self.words(),
        }
    }

    pub fn to_json(&self) -> Result<Vec<u8>> {
        Ok(serde_json::to_vec(&self.snapshot())?)
    }

    /// Build a store from serialized snapshot bytes.
    pub fn from_json(bytes: &[u8]) -> Result<Self> {
        let snapshot: Snapshot =
            serde_json::from_slice(bytes).map_err(|e| Error::CorruptState {
                path: Default::default(),
                reason: e.to_string(),
            })?;
        Ok(Self::from_snapshot(snapshot))
    }

    pub fn from_snapshot(snapshot: Snapshot) -> Self {
        let stray = snapshot
            .words
            .iter()
            .filter(|w| !snapshot.index.contains_key(*w))
            .count();
        if stray > 0 || snapshot.words.len() != snapshot.index.len() {
            tracing::warn!(
                listed = snapshot.words.len(),
                indexed = snapshot.index.len(),
                "word list disagrees with index keys, using index keys"
            );
        }

        Self {
            postings: snapshot.index,
        }
    }

    /// Replace the contents with the snapshot in `bytes`.
    ///
    /// The bytes are fully parsed before anything is replaced, so a
    /// malformed snapshot leaves the store as it was.
    pub fn restore(&mut self, bytes: &[u8]) -> Result<()> {
        let restored = Self::from_json(bytes)?;
        *self = restored;
        Ok(())
    }
}
