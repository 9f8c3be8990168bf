use std::sync::Arc;

use dashmap::DashMap;

use crate::types::DealRecord;

// ---------------------------------------------------------------------------
// DealStore
// ---------------------------------------------------------------------------

/// Outcome of folding one observed listing into the store.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ObserveOutcome {
    /// Link not seen before.
    New,
    /// Link known, price_numeric changed since the last observation.
    PriceChanged,
    /// Link known, same price.
    Unchanged,
}

/// In-memory view of the latest observation per deal link. The DB is the
/// source of truth; this store exists so the hot path (scrape cycle) can
/// deduplicate and detect price changes without a read query per listing.
pub struct DealStore {
    /// link → latest DealRecord
    deals: DashMap<String, DealRecord>,
    /// link → last observed price, kept even when the listing later loses its
    /// price text so a recovered price still registers as a change
    last_price: DashMap<String, f64>,
}

impl DealStore {
    pub fn new() -> Arc<Self> {
        Arc::new(Self {
            deals: DashMap::new(),
            last_price: DashMap::new(),
        })
    }

    /// Fold one observation in and report what changed.
    pub fn observe(&self, deal: DealRecord) -> ObserveOutcome {
        let link = deal.link.clone();
        let price = deal.price_numeric;
        let existed = self.deals.insert(link.clone(), deal).is_some();

        let outcome = match (existed, price) {
            (false, _) => ObserveOutcome::New,
            (true, Some(p)) => match self.last_price.get(&link) {
                Some(prev) if (*prev - p).abs() < 0.005 => ObserveOutcome::Unchanged,
                Some(_) => ObserveOutcome::PriceChanged,
                None => ObserveOutcome::PriceChanged,
            },
            (true, None) => ObserveOutcome::Unchanged,
        };

        if let Some(p) = price {
            self.last_price.insert(link, p);
        }
        outcome
    }

    pub fn deal_count(&self) -> usize {
        self.deals.len()
    }

    /// Count of deals that currently carry a usable price.
    pub fn priced_deal_count(&self) -> usize {
        self.deals
            .iter()
            .filter(|entry| entry.value().price_numeric.is_some())
            .count()
    }

    /// Snapshot of every stored deal. Used by the cycle CSV backup.
    pub fn snapshot(&self) -> Vec<DealRecord> {
        self.deals.iter().map(|e| e.value().clone()).collect()
    }

    /// Seed the store from rows already in the DB so a restart does not
    /// re-report every known deal as new.
    pub fn seed(&self, deals: Vec<DealRecord>) {
        for deal in deals {
            if let Some(p) = deal.price_numeric {
                self.last_price.insert(deal.link.clone(), p);
            }
            self.deals.insert(deal.link.clone(), deal);
        }
    }
}

impl Default for DealStore {
    fn default() -> Self {
        Self {
            deals: DashMap::new(),
            last_price: DashMap::new(),
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::Source;

    fn deal(link: &str, price: Option<f64>) -> DealRecord {
        DealRecord {
            title: "Test deal".to_string(),
            link: link.to_string(),
            price_text: price.map(|p| format!("${p:.2}")),
            price_numeric: price,
            original_price: None,
            discount_percent: Some(25.0),
            category: None,
            source: Source::Slickdeals,
            rating: None,
            reviews_count: None,
            in_stock: true,
            scraped_at: 1_700_000_000,
        }
    }

    #[test]
    fn first_observation_is_new() {
        let store = DealStore::new();
        assert_eq!(store.observe(deal("l1", Some(99.99))), ObserveOutcome::New);
        assert_eq!(store.deal_count(), 1);
    }

    #[test]
    fn same_price_is_unchanged() {
        let store = DealStore::new();
        store.observe(deal("l1", Some(99.99)));
        assert_eq!(
            store.observe(deal("l1", Some(99.99))),
            ObserveOutcome::Unchanged
        );
    }

    #[test]
    fn new_price_registers_change() {
        let store = DealStore::new();
        store.observe(deal("l1", Some(99.99)));
        assert_eq!(
            store.observe(deal("l1", Some(89.99))),
            ObserveOutcome::PriceChanged
        );
    }

    #[test]
    fn missing_price_does_not_poison_last_price() {
        let store = DealStore::new();
        store.observe(deal("l1", Some(99.99)));
        // Listing temporarily loses its price text
        assert_eq!(store.observe(deal("l1", None)), ObserveOutcome::Unchanged);
        // Price comes back unchanged — still not a change
        assert_eq!(
            store.observe(deal("l1", Some(99.99))),
            ObserveOutcome::Unchanged
        );
    }

    #[test]
    fn seed_suppresses_new_for_known_links() {
        let store = DealStore::new();
        store.seed(vec![deal("l1", Some(50.0))]);
        assert_eq!(
            store.observe(deal("l1", Some(50.0))),
            ObserveOutcome::Unchanged
        );
        assert_eq!(store.priced_deal_count(), 1);
    }
}
