//! Order placement, cancel routing and algo actions.
//!
//! Validation failures surface as error reply frames before anything
//! reaches the exchange; placement itself is fire-and-forget, with
//! confirmations flowing back asynchronously through the registry.

use crate::codec;
use crate::error::{GatewayError, Result};
use crate::params;
use crate::session::Session;
use common::{Order, OrderSide, OrderType, ParamScalar, ParamValue, SecurityTuple, TimeInForce};
use serde_json::{json, Value};
use std::sync::Arc;
use tracing::debug;

impl Session {
    pub(crate) fn on_order(&self, arr: &[Value]) -> Result<()> {
        let user = self.current_user()?;
        let security_id = codec::get_i64(arr, 1)?;
        let sub_account = codec::get_str(arr, 2)?;
        let acc = self
            .engines
            .accounts
            .get_sub_account_by_name(sub_account)
            .ok_or_else(|| {
                GatewayError::reject(
                    "order",
                    "sub_account",
                    format!("Invalid sub_account: {}", sub_account),
                )
            })?;
        let side_str = codec::get_str(arr, 3)?;
        let type_str = codec::get_str(arr, 4)?;
        let tif_str = codec::get_str(arr, 5)?;
        let qty = codec::get_num(arr, 6)?;
        let price = codec::get_num(arr, 7)?;
        let stop_price = codec::get_num(arr, 8)?;
        let sec = self.engines.securities.get(security_id).ok_or_else(|| {
            GatewayError::reject(
                "order",
                "security id",
                format!("Invalid security id: {}", security_id),
            )
        })?;
        let side = OrderSide::parse(side_str).ok_or_else(|| {
            GatewayError::reject("order", "side", format!("Invalid side: {}", side_str))
        })?;
        let order_type = OrderType::parse(type_str);
        if stop_price <= 0.0 && matches!(order_type, OrderType::Stop | OrderType::StopLimit) {
            return Err(GatewayError::reject(
                "order",
                "stop price",
                "Miss stop price for stop order",
            ));
        }
        let tif = TimeInForce::parse(tif_str);
        let broker_account_id = self
            .engines
            .accounts
            .broker_for(&acc, &sec)
            .map(|b| b.id)
            .unwrap_or(0);
        let order = Order {
            id: 0,
            sec,
            user,
            sub_account: acc,
            broker_account_id,
            algo_id: 0,
            orig_id: 0,
            side,
            order_type,
            tif,
            qty,
            price,
            stop_price,
        };
        if let Err(e) = self.engines.exchange.place(order) {
            debug!("{}: place failed: {}", self.shared.addr, e);
        }
        Ok(())
    }

    pub(crate) fn on_cancel(&self, arr: &[Value]) -> Result<()> {
        let id = codec::get_i64(arr, 1)?;
        let order = self.engines.order_book.get(id).ok_or_else(|| {
            GatewayError::reject("cancel", "order id", format!("Invalid order id: {}", id))
        })?;
        if let Err(e) = self.engines.exchange.cancel(&order) {
            debug!("{}: cancel failed: {}", self.shared.addr, e);
        }
        Ok(())
    }

    pub(crate) fn on_algo(&self, arr: &[Value]) -> Result<()> {
        let action = codec::get_str(arr, 1)?;
        match action {
            "cancel" => {
                // The key's JSON kind decides the lookup: string = token,
                // integer = algo id.
                let result = if at_is_string(arr, 2) {
                    self.engines.algos.stop_by_token(codec::get_str(arr, 2)?)
                } else {
                    self.engines.algos.stop_by_id(codec::get_i64(arr, 2)?)
                };
                if let Err(e) = result {
                    debug!("{}: algo cancel: {}", self.shared.addr, e);
                }
                Ok(())
            }
            "modify" => {
                let key_token = if at_is_string(arr, 2) {
                    codec::get_str(arr, 2)?.to_string()
                } else {
                    codec::get_i64(arr, 2)?.to_string()
                };
                let params = match params::parse_params(
                    arr.get(3).unwrap_or(&Value::Null),
                    &self.engines.securities,
                    &self.engines.accounts,
                ) {
                    Ok(m) => Arc::new(m),
                    Err(text) => {
                        self.send(json!(["error", "algo", "invalid params", key_token, text]));
                        return Ok(());
                    }
                };
                let result = if at_is_string(arr, 2) {
                    self.engines.algos.modify_by_token(&key_token, params)
                } else {
                    self.engines.algos.modify_by_id(codec::get_i64(arr, 2)?, params)
                };
                if let Err(e) = result {
                    debug!("{}: algo modify: {}", self.shared.addr, e);
                }
                Ok(())
            }
            "new" | "test" => self.on_algo_start(action, arr),
            other => Err(GatewayError::reject("algo", "invalid action", other)),
        }
    }

    fn on_algo_start(&self, action: &str, arr: &[Value]) -> Result<()> {
        let user = self.current_user()?;
        let algo_name = codec::get_str(arr, 2)?;
        let token = codec::get_str(arr, 3)?;
        if self.engines.algos.get_token(token).is_some() {
            return Err(GatewayError::reject("algo", "duplicate token", token));
        }
        let raw = arr.get(4).map(|v| v.to_string()).unwrap_or_default();
        let params = if action == "new" {
            let m = match params::parse_params(
                arr.get(4).unwrap_or(&Value::Null),
                &self.engines.securities,
                &self.engines.accounts,
            ) {
                Ok(m) => m,
                Err(text) => {
                    debug!("{}: algo params: {}", self.shared.addr, text);
                    self.send(json!(["error", "algo", "invalid params", token, text]));
                    return Ok(());
                }
            };
            for value in m.values() {
                for tuple in security_tuples(value) {
                    if !user.owns(tuple.acc.id) {
                        let text =
                            format!("No permission to trade with account: {}", tuple.acc.name);
                        debug!("{}: algo params: {}", self.shared.addr, text);
                        self.send(json!(["error", "algo", "invalid params", token, text]));
                        return Ok(());
                    }
                }
            }
            Some(Arc::new(m))
        } else {
            if !token.is_empty() {
                self.shared.test_algo_tokens.insert(token.to_string());
            }
            None
        };
        let had_params = params.is_some();
        if let Err(e) = self
            .engines
            .algos
            .spawn(params, algo_name, &user, raw, token)
        {
            debug!("{}: algo spawn: {}", self.shared.addr, e);
            // Test runs without params fail silently.
            if had_params {
                self.send(json!(["error", "algo", "invalid params", token, e.to_string()]));
            }
        }
        Ok(())
    }
}

fn at_is_string(arr: &[Value], i: usize) -> bool {
    arr.get(i).map(|v| v.is_string()).unwrap_or(false)
}

fn security_tuples(value: &ParamValue) -> Vec<&SecurityTuple> {
    match value {
        ParamValue::Scalar(ParamScalar::Security(t)) => vec![t],
        ParamValue::Vector(items) => items
            .iter()
            .filter_map(|s| match s {
                ParamScalar::Security(t) => Some(t),
                _ => None,
            })
            .collect(),
        _ => Vec::new(),
    }
}
