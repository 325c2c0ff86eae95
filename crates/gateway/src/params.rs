//! The typed parameter domain: untyped JSON in, `ParamValue` out.
//!
//! Scalars keep their JSON numeric kind, objects become security-tuples,
//! arrays become flat vectors of scalars. The encoder is total: every
//! value that parses can be re-encoded for `algo_def` frames.

use crate::codec;
use common::{
    AccountManager, OrderSide, ParamMap, ParamScalar, ParamValue, SecurityManager, SecurityTuple,
};
use serde_json::{json, Value};

/// Parse an untyped parameter mapping. The error string is the human text
/// of the `invalid params` reply frame.
pub fn parse_params(
    j: &Value,
    securities: &SecurityManager,
    accounts: &AccountManager,
) -> Result<ParamMap, String> {
    let obj = j
        .as_object()
        .ok_or_else(|| format!("wrong json value: {}, expect object", j))?;
    let mut m = ParamMap::new();
    for (k, v) in obj {
        m.insert(k.clone(), parse_value(v, securities, accounts)?);
    }
    Ok(m)
}

fn parse_value(
    j: &Value,
    securities: &SecurityManager,
    accounts: &AccountManager,
) -> Result<ParamValue, String> {
    if let Value::Array(items) = j {
        let mut v = Vec::with_capacity(items.len());
        for it in items {
            v.push(parse_scalar(it, securities, accounts)?);
        }
        return Ok(ParamValue::Vector(v));
    }
    Ok(ParamValue::Scalar(parse_scalar(j, securities, accounts)?))
}

fn parse_scalar(
    j: &Value,
    securities: &SecurityManager,
    accounts: &AccountManager,
) -> Result<ParamScalar, String> {
    match j {
        Value::Bool(b) => Ok(ParamScalar::Bool(*b)),
        Value::Number(n) => {
            if let Some(i) = n.as_i64() {
                Ok(ParamScalar::Int(i))
            } else {
                Ok(ParamScalar::Float(n.as_f64().unwrap_or_default()))
            }
        }
        Value::String(s) => Ok(ParamScalar::Str(s.clone())),
        Value::Object(map) => parse_security_tuple(map, securities, accounts),
        _ => Err(format!("wrong json value: {}, expect scalar", j)),
    }
}

fn parse_security_tuple(
    map: &serde_json::Map<String, Value>,
    securities: &SecurityManager,
    accounts: &AccountManager,
) -> Result<ParamScalar, String> {
    let mut src = String::new();
    let mut sec = None;
    let mut acc = None;
    let mut side = None;
    let mut qty = 0.0;
    for (k, v) in map {
        match k.as_str() {
            "qty" => qty = codec::num_of(v).map_err(|e| e.to_string())?,
            "side" => {
                let s = codec::str_of(v).map_err(|e| e.to_string())?;
                side = Some(
                    OrderSide::parse(s).ok_or_else(|| format!("Unknown order side: {}", s))?,
                );
            }
            "src" => src = codec::str_of(v).map_err(|e| e.to_string())?.to_string(),
            "sec" => {
                let id = codec::i64_of(v).map_err(|e| e.to_string())?;
                sec = Some(
                    securities
                        .get(id)
                        .ok_or_else(|| format!("Unknown security id: {}", id))?,
                );
            }
            "acc" => match v {
                Value::Number(_) => {
                    let id = codec::i64_of(v).map_err(|e| e.to_string())?;
                    acc = Some(
                        accounts
                            .get_sub_account(id)
                            .ok_or_else(|| format!("Unknown account id: {}", id))?,
                    );
                }
                Value::String(s) => {
                    acc = Some(
                        accounts
                            .get_sub_account_by_name(s)
                            .ok_or_else(|| format!("Unknown account: {}", s))?,
                    );
                }
                _ => {}
            },
            // Unknown keys are ignored.
            _ => {}
        }
    }
    if qty <= 0.0 {
        return Err("Empty quantity".into());
    }
    let side = side.ok_or("Empty side")?;
    let sec = sec.ok_or("Empty security")?;
    let acc = acc.ok_or("Empty account")?;
    Ok(ParamScalar::Security(SecurityTuple {
        src,
        sec,
        acc,
        side,
        qty,
    }))
}

/// Append the encoded form of a value: a kind tag followed by the payload.
/// Security-tuples encode as the bare `"security"` tag; vectors as
/// `"vector"` plus the list of encoded elements.
pub fn encode_value(v: &ParamValue, out: &mut Vec<Value>) {
    match v {
        ParamValue::Scalar(s) => encode_scalar(s, out),
        ParamValue::Vector(items) => {
            out.push(json!("vector"));
            let mut list = Vec::with_capacity(items.len());
            for s in items {
                let mut elem = Vec::new();
                encode_scalar(s, &mut elem);
                list.push(Value::Array(elem));
            }
            out.push(Value::Array(list));
        }
    }
}

fn encode_scalar(s: &ParamScalar, out: &mut Vec<Value>) {
    match s {
        ParamScalar::Bool(b) => {
            out.push(json!("bool"));
            out.push(json!(b));
        }
        ParamScalar::Int(i) => {
            out.push(json!("int"));
            out.push(json!(i));
        }
        ParamScalar::Float(f) => {
            out.push(json!("float"));
            out.push(json!(f));
        }
        ParamScalar::Str(s) => {
            out.push(json!("string"));
            out.push(json!(s));
        }
        ParamScalar::Security(_) => {
            out.push(json!("security"));
        }
    }
}
