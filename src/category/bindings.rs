// Copyright 2025 Cowboy AI, LLC.

//! Live-binding registry of a functor
//!
//! For every (source, image) pair a functor has materialized it keeps the
//! subscription handles of the observers it installed, so tearing a pair
//! down unsubscribes exactly those observers and nothing else.

use indexmap::IndexMap;

use crate::identifiers::{SubscriptionId, Uid};

/// Subscription handles keyed by (source uid, image uid)
#[derive(Debug, Clone, PartialEq, Default)]
pub struct BindingRegistry {
    pairs: IndexMap<(Uid, Uid), Vec<SubscriptionId>>,
}

impl BindingRegistry {
    /// Record a handle for the pair
    pub fn record(&mut self, source: Uid, image: Uid, id: SubscriptionId) {
        self.pairs.entry((source, image)).or_default().push(id);
    }

    /// Remove the pair and hand back its handles
    pub fn take(&mut self, source: Uid, image: Uid) -> Vec<SubscriptionId> {
        self.pairs.shift_remove(&(source, image)).unwrap_or_default()
    }

    /// Remove every pair and hand back all handles
    pub fn drain(&mut self) -> Vec<SubscriptionId> {
        self.pairs.drain(..).flat_map(|(_, ids)| ids).collect()
    }

    /// True if the pair has live observers
    pub fn contains(&self, source: Uid, image: Uid) -> bool {
        self.pairs.contains_key(&(source, image))
    }

    /// Handles installed for the pair
    pub fn handles(&self, source: Uid, image: Uid) -> &[SubscriptionId] {
        self.pairs
            .get(&(source, image))
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }

    /// True if any pair mentions `uid` as source or image
    pub fn references(&self, uid: Uid) -> bool {
        self.pairs.keys().any(|(x, y)| *x == uid || *y == uid)
    }

    /// Registered pairs
    pub fn pairs(&self) -> impl Iterator<Item = (Uid, Uid)> + '_ {
        self.pairs.keys().copied()
    }

    /// Number of registered pairs
    pub fn len(&self) -> usize {
        self.pairs.len()
    }

    /// True when no pair is registered
    pub fn is_empty(&self) -> bool {
        self.pairs.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_take_removes_only_that_pair() {
        let mut registry = BindingRegistry::default();
        let (x, y, z) = (Uid::new(), Uid::new(), Uid::new());
        registry.record(x, y, SubscriptionId::from_raw(1));
        registry.record(x, y, SubscriptionId::from_raw(2));
        registry.record(z, y, SubscriptionId::from_raw(3));

        let ids = registry.take(x, y);
        assert_eq!(ids, vec![SubscriptionId::from_raw(1), SubscriptionId::from_raw(2)]);
        assert!(!registry.contains(x, y));
        assert!(registry.contains(z, y));
        assert!(!registry.references(x));
        assert!(registry.references(y));
    }

    #[test]
    fn test_drain_empties_registry() {
        let mut registry = BindingRegistry::default();
        registry.record(Uid::new(), Uid::new(), SubscriptionId::from_raw(7));
        assert_eq!(registry.drain().len(), 1);
        assert!(registry.is_empty());
        assert!(registry.take(Uid::new(), Uid::new()).is_empty());
    }
}
