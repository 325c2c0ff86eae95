//! Outbound frame encoding for order confirmations and algo events.
//!
//! Offline replays use the capitalized verb with the same field layout.

use common::{AlgoEvent, Confirmation, ExecType, TransType};
use serde_json::{json, Value};

/// Encode a confirmation. Returns `None` for report types the wire does
/// not carry (and for fills with an unknown transaction type).
pub fn encode_confirmation(cm: &Confirmation, offline: bool) -> Option<String> {
    let cmd = if offline { "Order" } else { "order" };
    let order = &cm.order;
    let mut j = vec![
        json!(cmd),
        json!(order.id),
        json!(cm.transaction_time / 1_000_000),
        json!(cm.seq),
    ];
    match cm.exec_type {
        ExecType::UnconfirmedNew => {
            j.push(json!("unconfirmed"));
            j.push(json!(order.sec.id));
            j.push(json!(order.algo_id));
            j.push(json!(order.user.id));
            j.push(json!(order.sub_account.id));
            j.push(json!(order.broker_account_id));
            j.push(json!(order.qty));
            j.push(json!(order.price));
            j.push(json!(order.side.as_str()));
            j.push(json!(order.order_type.as_str()));
            j.push(json!(order.tif.as_str()));
        }
        ExecType::PendingNew | ExecType::PendingCancel | ExecType::New | ExecType::Canceled => {
            let status = match cm.exec_type {
                ExecType::PendingNew => "pending",
                ExecType::PendingCancel => "pending_cancel",
                ExecType::New => "new",
                _ => "cancelled",
            };
            j.push(json!(status));
            if cm.exec_type == ExecType::New {
                j.push(json!(cm.order_id));
            }
            if !cm.text.is_empty() {
                j.push(json!(cm.text));
            }
        }
        ExecType::Filled | ExecType::PartiallyFilled => {
            let status = if cm.exec_type == ExecType::Filled {
                "filled"
            } else {
                "partial"
            };
            j.push(json!(status));
            j.push(json!(cm.last_qty));
            j.push(json!(cm.last_px));
            j.push(json!(cm.exec_id));
            match cm.trans_type {
                TransType::New => j.push(json!("new")),
                TransType::Cancel => j.push(json!("cancel")),
                TransType::Other => return None,
            }
        }
        ExecType::Rejected | ExecType::CancelRejected | ExecType::RiskRejected => {
            let status = match cm.exec_type {
                ExecType::Rejected => "new_rejected",
                ExecType::CancelRejected => "cancel_rejected",
                _ => "risk_rejected",
            };
            j.push(json!(status));
            j.push(json!(cm.text));
            if cm.exec_type == ExecType::RiskRejected {
                j.push(json!(order.sec.id));
                j.push(json!(order.algo_id));
                j.push(json!(order.user.id));
                j.push(json!(order.sub_account.id));
                j.push(json!(order.qty));
                j.push(json!(order.price));
                j.push(json!(order.side.as_str()));
                j.push(json!(order.order_type.as_str()));
                j.push(json!(order.tif.as_str()));
                if order.orig_id != 0 {
                    j.push(json!(order.orig_id));
                }
            }
        }
    }
    Some(Value::Array(j).to_string())
}

/// Encode an algo lifecycle event.
pub fn encode_algo_event(ev: &AlgoEvent, offline: bool) -> String {
    let cmd = if offline { "Algo" } else { "algo" };
    json!([cmd, ev.seq, ev.algo_id, ev.tm, ev.token, ev.name, ev.status, ev.body]).to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use common::{
        Order, OrderSide, OrderType, Security, SubAccount, TimeInForce, User,
    };
    use std::sync::Arc;

    fn order() -> Arc<Order> {
        Arc::new(Order {
            id: 5,
            sec: Arc::new(Security { id: 42, ..Default::default() }),
            user: Arc::new(User { id: 1, ..Default::default() }),
            sub_account: Arc::new(SubAccount { id: 10, name: "desk1".into() }),
            broker_account_id: 7,
            algo_id: 0,
            orig_id: 0,
            side: OrderSide::Buy,
            order_type: OrderType::Limit,
            tif: TimeInForce::Day,
            qty: 100.0,
            price: 10.0,
            stop_price: 0.0,
        })
    }

    fn confirm(exec_type: ExecType) -> Confirmation {
        let mut cm = Confirmation::new(order(), exec_type, 1_700_000_000_000_000);
        cm.seq = 9;
        cm
    }

    fn decode(s: &str) -> Vec<Value> {
        serde_json::from_str::<Value>(s).unwrap().as_array().unwrap().clone()
    }

    #[test]
    fn test_unconfirmed_layout() {
        let j = decode(&encode_confirmation(&confirm(ExecType::UnconfirmedNew), false).unwrap());
        assert_eq!(j[0], json!("order"));
        assert_eq!(j[1], json!(5));
        assert_eq!(j[2], json!(1_700_000_000));
        assert_eq!(j[3], json!(9));
        assert_eq!(j[4], json!("unconfirmed"));
        assert_eq!(j[5], json!(42));
        assert_eq!(j[8], json!(10));
        assert_eq!(j[9], json!(7));
        assert_eq!(j[12], json!("buy"));
        assert_eq!(j[13], json!("limit"));
        assert_eq!(j[14], json!("Day"));
    }

    #[test]
    fn test_new_carries_exchange_order_id_and_text() {
        let mut cm = confirm(ExecType::New);
        cm.order_id = "X123".into();
        cm.text = "accepted".into();
        let j = decode(&encode_confirmation(&cm, false).unwrap());
        assert_eq!(j[4], json!("new"));
        assert_eq!(j[5], json!("X123"));
        assert_eq!(j[6], json!("accepted"));

        let cm = confirm(ExecType::PendingNew);
        let j = decode(&encode_confirmation(&cm, false).unwrap());
        assert_eq!(j[4], json!("pending"));
        assert_eq!(j.len(), 5, "no exchange id, empty text omitted");
    }

    #[test]
    fn test_fill_requires_known_trans_type() {
        let mut cm = confirm(ExecType::PartiallyFilled);
        cm.last_qty = 40.0;
        cm.last_px = 9.9;
        cm.exec_id = "E1".into();
        cm.trans_type = TransType::New;
        let j = decode(&encode_confirmation(&cm, false).unwrap());
        assert_eq!(j[4], json!("partial"));
        assert_eq!(j[5], json!(40.0));
        assert_eq!(j[6], json!(9.9));
        assert_eq!(j[7], json!("E1"));
        assert_eq!(j[8], json!("new"));

        cm.trans_type = TransType::Other;
        assert!(encode_confirmation(&cm, false).is_none());
    }

    #[test]
    fn test_risk_rejected_appends_order_snapshot() {
        let mut cm = confirm(ExecType::RiskRejected);
        cm.text = "limit breached".into();
        let j = decode(&encode_confirmation(&cm, false).unwrap());
        assert_eq!(j[4], json!("risk_rejected"));
        assert_eq!(j[5], json!("limit breached"));
        assert_eq!(j[6], json!(42));
        assert_eq!(j.len(), 15, "orig_id of 0 omitted");
    }

    #[test]
    fn test_offline_uses_capitalized_verb() {
        let j = decode(&encode_confirmation(&confirm(ExecType::PendingNew), true).unwrap());
        assert_eq!(j[0], json!("Order"));

        let ev = AlgoEvent {
            seq: 3,
            algo_id: 17,
            tm: 1_700_000_000,
            token: "tok".into(),
            name: "TWAP".into(),
            status: "started".into(),
            body: String::new(),
            user_id: 1,
        };
        let j = decode(&encode_algo_event(&ev, true));
        assert_eq!(j[0], json!("Algo"));
        assert_eq!(j[1], json!(3));
        assert_eq!(j[2], json!(17));
        let j = decode(&encode_algo_event(&ev, false));
        assert_eq!(j[0], json!("algo"));
    }
}
