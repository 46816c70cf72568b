use crate::{
    index_store::{IndexStore, Occurrence},
    tokenizer,
};

/// Find every occurrence of any word in `query`.
///
/// Query words are combined with OR: each word present in the index
/// contributes its whole postings list, duplicates included. Results are
/// ordered by video file name, then by segment start, keeping insertion
/// order among equal keys.
pub fn search(store: &IndexStore, query: &str) -> Vec<Occurrence> {
    let mut results = Vec::new();

    for token in tokenizer::tokenize(query) {
        if let Some(postings) = store.get(&token) {
            results.extend_from_slice(postings);
        }
    }

    // sort_by is stable.
    results.sort_by(|a, b| {
        a.video
            .cmp(&b.video)
            .then_with(|| a.start.total_cmp(&b.start))
    });

    tracing::debug!(query, hits = results.len(), "search finished");
    results
}

/// Render a single result line, e.g. `intro.mp4  Hello there (1.0s - 2.5s)`.
pub fn format_result(occurrence: &Occurrence) -> String {
    format!(
        "{}  {} ({:.1}s - {:.1}s)",
        occurrence.video,
        occurrence.text.trim(),
        occurrence.start,
        occurrence.end
    )
}
