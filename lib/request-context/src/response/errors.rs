use std::{
    ops::Range,
    sync::atomic::{AtomicUsize, Ordering},
};

use dashmap::DashMap;

use crate::response::graphql_error::GraphQLError;

/// Collects GraphQL errors reported by concurrently running resolvers.
///
/// Every error is stored under a sequence number taken from an atomic counter, and errors are
/// always materialized in ascending sequence order. The iteration order of the underlying map is
/// never exposed.
#[derive(Default)]
pub struct ErrorStore {
    entries: DashMap<usize, GraphQLError>,
    next_sequence: AtomicUsize,
}

impl ErrorStore {
    pub fn push(&self, error: GraphQLError) -> usize {
        let sequence = self.next_sequence.fetch_add(1, Ordering::Relaxed);
        self.entries.insert(sequence, error);
        sequence
    }

    /// Reserves one contiguous range of sequence numbers for the whole batch, so errors of
    /// another writer can't end up between them.
    pub fn extend(&self, errors: Vec<GraphQLError>) -> Range<usize> {
        let len = errors.len();
        if len == 0 {
            let next = self.next_sequence.load(Ordering::Relaxed);
            return next..next;
        }

        let start = self.next_sequence.fetch_add(len, Ordering::Relaxed);
        for (offset, error) in errors.into_iter().enumerate() {
            self.entries.insert(start + offset, error);
        }

        start..start + len
    }

    pub fn to_vec(&self) -> Vec<GraphQLError> {
        let mut sequenced: Vec<(usize, GraphQLError)> = self
            .entries
            .iter()
            .map(|entry| (*entry.key(), entry.value().clone()))
            .collect();
        sequenced.sort_unstable_by_key(|(sequence, _)| *sequence);

        sequenced.into_iter().map(|(_, error)| error).collect()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    #[cfg(test)]
    fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    // The sequence counter is left as is, errors added afterwards keep sorting after
    // anything that raced with the reset.
    pub fn clear(&self) {
        self.entries.clear();
    }
}
