//! Security master and the order enumerations shared across the platform.

use dashmap::DashMap;
use std::sync::Arc;

/// Unique security identifier.
pub type SecurityId = i64;

/// A tradable instrument with its listing and classification attributes.
#[derive(Debug, Clone, Default)]
pub struct Security {
    pub id: SecurityId,
    pub symbol: String,
    pub local_symbol: String,
    /// Listing exchange name; also keys the exchange-connectivity adapter.
    pub exchange: String,
    pub sec_type: String,
    pub lot_size: f64,
    pub multiplier: f64,
    pub close_price: f64,
    /// FX rate into the platform base currency.
    pub rate: f64,
    pub currency: String,
    pub adv20: f64,
    pub market_cap: f64,
    pub sector: i64,
    pub industry_group: i64,
    pub industry: i64,
    pub sub_industry: i64,
    pub bbgid: String,
    pub cusip: String,
    pub sedol: String,
    pub isin: String,
}

/// Order side.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OrderSide {
    Buy,
    Sell,
    Short,
}

impl OrderSide {
    /// Parse the wire form. Unknown strings are rejected.
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "buy" => Some(Self::Buy),
            "sell" => Some(Self::Sell),
            "short" => Some(Self::Short),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Buy => "buy",
            Self::Sell => "sell",
            Self::Short => "short",
        }
    }
}

/// Order type. Unknown wire values fall back to `Limit`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum OrderType {
    #[default]
    Limit,
    Market,
    Stop,
    StopLimit,
    Otc,
}

impl OrderType {
    /// Case-insensitive parse; anything unrecognized stays `Limit`.
    pub fn parse(s: &str) -> Self {
        if s.eq_ignore_ascii_case("market") {
            Self::Market
        } else if s.eq_ignore_ascii_case("stop") {
            Self::Stop
        } else if s.eq_ignore_ascii_case("stop limit") || s.eq_ignore_ascii_case("stop_limit") {
            Self::StopLimit
        } else if s.eq_ignore_ascii_case("otc") {
            Self::Otc
        } else {
            Self::Limit
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Limit => "limit",
            Self::Market => "market",
            Self::Stop => "stop",
            Self::StopLimit => "stop_limit",
            Self::Otc => "otc",
        }
    }
}

/// Time in force. Unknown wire values fall back to `Day`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum TimeInForce {
    #[default]
    Day,
    Ioc,
    Gtc,
    Opg,
    Fok,
    Gtx,
}

impl TimeInForce {
    /// Case-insensitive parse; anything unrecognized stays `Day`.
    pub fn parse(s: &str) -> Self {
        if s.eq_ignore_ascii_case("GTC") {
            Self::Gtc
        } else if s.eq_ignore_ascii_case("OPG") {
            Self::Opg
        } else if s.eq_ignore_ascii_case("IOC") {
            Self::Ioc
        } else if s.eq_ignore_ascii_case("FOK") {
            Self::Fok
        } else if s.eq_ignore_ascii_case("GTX") {
            Self::Gtx
        } else {
            Self::Day
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Day => "Day",
            Self::Ioc => "IOC",
            Self::Gtc => "GTC",
            Self::Opg => "OPG",
            Self::Fok => "FOK",
            Self::Gtx => "GTX",
        }
    }
}

/// Lock-free security master.
///
/// Read-mostly: populated at startup from reference data, read concurrently
/// by every session.
pub struct SecurityManager {
    securities: DashMap<SecurityId, Arc<Security>>,
}

impl SecurityManager {
    pub fn new() -> Self {
        Self {
            securities: DashMap::new(),
        }
    }

    pub fn insert(&self, sec: Security) -> Arc<Security> {
        let sec = Arc::new(sec);
        self.securities.insert(sec.id, sec.clone());
        sec
    }

    pub fn get(&self, id: SecurityId) -> Option<Arc<Security>> {
        self.securities.get(&id).map(|s| s.clone())
    }

    /// Full catalog, sorted by id for deterministic streaming.
    pub fn all(&self) -> Vec<Arc<Security>> {
        let mut out: Vec<Arc<Security>> = self.securities.iter().map(|e| e.clone()).collect();
        out.sort_by_key(|s| s.id);
        out
    }

    pub fn len(&self) -> usize {
        self.securities.len()
    }

    pub fn is_empty(&self) -> bool {
        self.securities.is_empty()
    }

    /// Order-independent checksum of the catalog, reported to clients at
    /// login so they can detect a stale local copy.
    pub fn check_sum(&self) -> u64 {
        let mut ids: Vec<SecurityId> = self.securities.iter().map(|e| e.id).collect();
        ids.sort_unstable();
        ids.iter().fold(0u64, |h, id| {
            h.wrapping_mul(31).wrapping_add(*id as u64)
        })
    }
}

impl Default for SecurityManager {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_side_parse() {
        assert_eq!(OrderSide::parse("buy"), Some(OrderSide::Buy));
        assert_eq!(OrderSide::parse("sell"), Some(OrderSide::Sell));
        assert_eq!(OrderSide::parse("short"), Some(OrderSide::Short));
        assert_eq!(OrderSide::parse("BUY"), None);
        assert_eq!(OrderSide::parse("cover"), None);
    }

    #[test]
    fn test_type_parse_defaults_to_limit() {
        assert_eq!(OrderType::parse("Market"), OrderType::Market);
        assert_eq!(OrderType::parse("STOP"), OrderType::Stop);
        assert_eq!(OrderType::parse("stop limit"), OrderType::StopLimit);
        assert_eq!(OrderType::parse("stop_limit"), OrderType::StopLimit);
        assert_eq!(OrderType::parse("otc"), OrderType::Otc);
        assert_eq!(OrderType::parse("limit"), OrderType::Limit);
        assert_eq!(OrderType::parse("iceberg"), OrderType::Limit);
    }

    #[test]
    fn test_tif_parse_defaults_to_day() {
        assert_eq!(TimeInForce::parse("gtc"), TimeInForce::Gtc);
        assert_eq!(TimeInForce::parse("OPG"), TimeInForce::Opg);
        assert_eq!(TimeInForce::parse("ioc"), TimeInForce::Ioc);
        assert_eq!(TimeInForce::parse("FOK"), TimeInForce::Fok);
        assert_eq!(TimeInForce::parse("gtx"), TimeInForce::Gtx);
        assert_eq!(TimeInForce::parse("Day"), TimeInForce::Day);
        assert_eq!(TimeInForce::parse("GTD"), TimeInForce::Day);
    }

    #[test]
    fn test_check_sum_is_order_independent() {
        let a = SecurityManager::new();
        a.insert(Security { id: 1, ..Default::default() });
        a.insert(Security { id: 2, ..Default::default() });

        let b = SecurityManager::new();
        b.insert(Security { id: 2, ..Default::default() });
        b.insert(Security { id: 1, ..Default::default() });

        assert_eq!(a.check_sum(), b.check_sum());
        assert_ne!(a.check_sum(), 0);
    }

    #[test]
    fn test_all_sorted_by_id() {
        let m = SecurityManager::new();
        m.insert(Security { id: 9, ..Default::default() });
        m.insert(Security { id: 3, ..Default::default() });
        let ids: Vec<_> = m.all().iter().map(|s| s.id).collect();
        assert_eq!(ids, vec![3, 9]);
    }
}
