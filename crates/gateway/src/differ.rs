//! Market-data diffing against the last-sent snapshot.
//!
//! Only changed fields travel: the sub-object carries `t` plus whichever
//! of the trade fields and top-5 depth fields moved since the snapshot
//! last sent on this session.

use common::{MarketData, SecurityId};
use serde_json::{json, Map, Value};

/// Diff `md` against `last`. Returns `None` when the timestamp has not
/// advanced or when nothing but the timestamp changed.
pub fn diff(md: &MarketData, last: &MarketData) -> Option<Map<String, Value>> {
    if md.tm == last.tm {
        return None;
    }
    let mut obj = Map::new();
    obj.insert("t".into(), json!(md.tm));
    let t = &md.trade;
    let t0 = &last.trade;
    if t.open != t0.open {
        obj.insert("o".into(), json!(t.open));
    }
    if t.high != t0.high {
        obj.insert("h".into(), json!(t.high));
    }
    if t.low != t0.low {
        obj.insert("l".into(), json!(t.low));
    }
    if t.close != t0.close {
        obj.insert("c".into(), json!(t.close));
    }
    if t.qty != t0.qty {
        obj.insert("q".into(), json!(t.qty));
    }
    if t.volume != t0.volume {
        obj.insert("v".into(), json!(t.volume));
    }
    if t.vwap != t0.vwap {
        obj.insert("V".into(), json!(t.vwap));
    }
    for i in 0..5 {
        let d = &md.depth[i];
        let d0 = &last.depth[i];
        if d.ask_price != d0.ask_price {
            obj.insert(format!("a{}", i), json!(d.ask_price));
        }
        if d.ask_size != d0.ask_size {
            obj.insert(format!("A{}", i), json!(d.ask_size));
        }
        if d.bid_price != d0.bid_price {
            obj.insert(format!("b{}", i), json!(d.bid_price));
        }
        if d.bid_size != d0.bid_size {
            obj.insert(format!("B{}", i), json!(d.bid_size));
        }
    }
    if obj.len() == 1 {
        return None;
    }
    Some(obj)
}

/// Append `[id, diff]` to an accumulating `"md"` frame when there is a
/// diff to report.
pub fn push_diff(out: &mut Vec<Value>, id: SecurityId, md: &MarketData, last: &MarketData) {
    if let Some(obj) = diff(md, last) {
        out.push(json!([id, obj]));
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn snapshot(tm: i64, close: f64) -> MarketData {
        let mut md = MarketData::default();
        md.tm = tm;
        md.trade.close = close;
        md
    }

    #[test]
    fn test_same_timestamp_skips() {
        let a = snapshot(100, 9.0);
        let mut b = snapshot(100, 9.5);
        b.trade.volume = 1000.0;
        assert!(diff(&b, &a).is_none());
    }

    #[test]
    fn test_only_changed_fields_travel() {
        let a = snapshot(100, 9.0);
        let mut b = snapshot(101, 9.5);
        b.depth[2].bid_size = 300.0;
        let obj = diff(&b, &a).unwrap();
        assert_eq!(obj["t"], json!(101));
        assert_eq!(obj["c"], json!(9.5));
        assert_eq!(obj["B2"], json!(300.0));
        assert!(!obj.contains_key("o"));
        assert!(!obj.contains_key("b2"));
    }

    #[test]
    fn test_timestamp_only_change_emits_nothing() {
        let a = snapshot(100, 9.0);
        let b = snapshot(101, 9.0);
        assert!(diff(&b, &a).is_none());
    }

    #[test]
    fn test_initial_diff_against_zero_snapshot() {
        let zero = MarketData::default();
        let mut md = snapshot(100, 9.0);
        md.depth[0].ask_price = 9.1;
        let obj = diff(&md, &zero).unwrap();
        assert_eq!(obj["c"], json!(9.0));
        assert_eq!(obj["a0"], json!(9.1));
    }

    #[test]
    fn test_push_diff_accumulates() {
        let mut frame = vec![json!("md")];
        let zero = MarketData::default();
        push_diff(&mut frame, 42, &snapshot(1, 2.0), &zero);
        push_diff(&mut frame, 43, &zero, &zero);
        assert_eq!(frame.len(), 2);
        assert_eq!(frame[1][0], json!(42));
    }
}
