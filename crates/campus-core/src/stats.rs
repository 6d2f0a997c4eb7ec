use serde::Serialize;
use std::collections::HashMap;

use crate::store::Collection;

/// Counters for snapshots received from live queries
#[derive(Debug, Default, Clone)]
pub struct SnapshotStats {
    /// Accepted snapshots by collection
    pub accepted_by_collection: HashMap<Collection, u64>,
    /// Document count of the latest accepted snapshot per collection
    pub last_size_by_collection: HashMap<Collection, usize>,
    /// Deliveries dropped because they belonged to a torn-down scope
    pub discarded_stale: u64,
    /// Total snapshots accepted
    pub total: u64,
}

impl SnapshotStats {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record(&mut self, collection: Collection, size: usize) {
        self.total += 1;
        *self.accepted_by_collection.entry(collection).or_insert(0) += 1;
        self.last_size_by_collection.insert(collection, size);
    }

    pub fn record_stale(&mut self) {
        self.discarded_stale += 1;
    }

    /// Collections sorted by accepted snapshot count (descending)
    pub fn collections_by_count(&self) -> Vec<(Collection, u64)> {
        let mut collections: Vec<_> = self
            .accepted_by_collection
            .iter()
            .map(|(&c, &n)| (c, n))
            .collect();
        collections.sort_by(|a, b| b.1.cmp(&a.1).then_with(|| a.0.cmp(&b.0)));
        collections
    }

    pub fn summary(&self) -> StatsSummary {
        StatsSummary {
            total: self.total,
            discarded_stale: self.discarded_stale,
            by_collection: self
                .collections_by_count()
                .into_iter()
                .map(|(c, n)| (c.name().to_string(), n))
                .collect(),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StatsSummary {
    pub total: u64,
    pub discarded_stale: u64,
    pub by_collection: Vec<(String, u64)>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_record_and_order() {
        let mut stats = SnapshotStats::new();
        stats.record(Collection::Posts, 3);
        stats.record(Collection::Posts, 4);
        stats.record(Collection::Users, 10);
        stats.record_stale();

        assert_eq!(stats.total, 3);
        assert_eq!(stats.discarded_stale, 1);
        assert_eq!(stats.last_size_by_collection[&Collection::Posts], 4);
        assert_eq!(
            stats.collections_by_count(),
            vec![(Collection::Posts, 2), (Collection::Users, 1)]
        );
    }
}
