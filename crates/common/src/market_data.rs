//! Market-data snapshots and the feed adapter seam.

use crate::security::SecurityId;
use dashmap::DashMap;
use std::sync::Arc;

/// Top-of-book trade fields.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct Trade {
    pub open: f64,
    pub high: f64,
    pub low: f64,
    pub close: f64,
    pub qty: f64,
    pub volume: f64,
    pub vwap: f64,
}

/// One depth level.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct Depth {
    pub ask_price: f64,
    pub ask_size: f64,
    pub bid_price: f64,
    pub bid_size: f64,
}

/// The most recently observed record for one security: trade fields plus
/// the top 5 depth levels. `tm` is seconds since epoch; an unchanged `tm`
/// means the snapshot has not moved since the last observation.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct MarketData {
    pub tm: i64,
    pub trade: Trade,
    pub depth: [Depth; 5],
}

/// A concrete market-data feed connection.
pub trait FeedAdapter: Send + Sync {
    fn name(&self) -> &str;
    fn connected(&self) -> bool;
    fn reconnect(&self);
}

/// Lock-free snapshot store plus the feed adapter registry.
///
/// Feeds write snapshots concurrently; sessions only read.
pub struct MarketDataManager {
    snapshots: DashMap<SecurityId, MarketData>,
    adapters: DashMap<String, Arc<dyn FeedAdapter>>,
}

impl MarketDataManager {
    pub fn new() -> Self {
        Self {
            snapshots: DashMap::new(),
            adapters: DashMap::new(),
        }
    }

    /// Current snapshot; zeroed if this security has never printed.
    pub fn get(&self, id: SecurityId) -> MarketData {
        self.snapshots.get(&id).map(|m| *m).unwrap_or_default()
    }

    pub fn set(&self, id: SecurityId, md: MarketData) {
        self.snapshots.insert(id, md);
    }

    pub fn add_adapter(&self, adapter: Arc<dyn FeedAdapter>) {
        self.adapters.insert(adapter.name().to_string(), adapter);
    }

    pub fn get_adapter(&self, name: &str) -> Option<Arc<dyn FeedAdapter>> {
        self.adapters.get(name).map(|a| a.clone())
    }

    /// Adapter list sorted by name for deterministic fan-out.
    pub fn adapters(&self) -> Vec<Arc<dyn FeedAdapter>> {
        let mut out: Vec<Arc<dyn FeedAdapter>> =
            self.adapters.iter().map(|e| e.clone()).collect();
        out.sort_by(|a, b| a.name().cmp(b.name()));
        out
    }
}

impl Default for MarketDataManager {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_missing_snapshot_is_zeroed() {
        let m = MarketDataManager::new();
        let md = m.get(42);
        assert_eq!(md.tm, 0);
        assert_eq!(md.trade.close, 0.0);
    }

    #[test]
    fn test_set_then_get() {
        let m = MarketDataManager::new();
        let mut md = MarketData::default();
        md.tm = 100;
        md.trade.close = 9.5;
        md.depth[0].bid_price = 9.4;
        m.set(42, md);
        let got = m.get(42);
        assert_eq!(got.tm, 100);
        assert_eq!(got.trade.close, 9.5);
        assert_eq!(got.depth[0].bid_price, 9.4);
    }
}
