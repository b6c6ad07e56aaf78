use thiserror::Error;

use crate::model::{
    KEY_AUTHOR, KEY_DEFINITION, KEY_HISTORY_NOTE, KEY_IN_SCHEME, KEY_PREF_LABEL, Plant, RawEntry,
};

/// A required display attribute was absent from an entry. The whole batch
/// fails; callers treat this the same way as a failed request.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum NormalizeError {
    #[error("entry {descriptor:?} is missing required attribute {key:?}")]
    MissingAttribute {
        descriptor: String,
        key: &'static str,
    },
}

fn required<'a>(entry: &'a RawEntry, key: &'static str) -> Result<&'a str, NormalizeError> {
    entry
        .attribute(key)
        .ok_or_else(|| NormalizeError::MissingAttribute {
            descriptor: entry.descriptor.clone(),
            key,
        })
}

/// Resolves the five known schema keys of one entry into a flat display
/// record. Label, scheme, note, and definition must be present; the author
/// defaults to an empty string.
pub fn extract(entry: &RawEntry) -> Result<Plant, NormalizeError> {
    Ok(Plant {
        descriptor: entry.descriptor.clone(),
        pref_label: required(entry, KEY_PREF_LABEL)?.to_string(),
        in_scheme: required(entry, KEY_IN_SCHEME)?.to_string(),
        history_note: required(entry, KEY_HISTORY_NOTE)?.to_string(),
        definition: required(entry, KEY_DEFINITION)?.to_string(),
        author: entry.attribute(KEY_AUTHOR).unwrap_or_default().to_string(),
    })
}

/// Maps raw entries into display records, preserving order and count.
pub fn normalize(entries: &[RawEntry]) -> Result<Vec<Plant>, NormalizeError> {
    entries.iter().map(extract).collect()
}

/// Orders a normalized hierarchy walk for display. The graph service returns
/// the walk in traversal order; the interface shows it reversed.
pub fn display_order(mut chain: Vec<Plant>) -> Vec<Plant> {
    chain.reverse();
    chain
}
