//! Wire codec: line-delimited JSON arrays with strict typed getters.
//!
//! Every inbound message is a JSON array whose first element is the action
//! verb. The getters fail with a descriptive `BadValue` when an element is
//! not of the expected concrete kind; a missing index reads as `null` and
//! fails the same way. `get_num` is the one lenient accessor: it takes
//! either integer or float and returns a float.

use crate::error::{GatewayError, Result};
use serde_json::Value;

/// Parse an inbound message into its array form.
pub fn parse_array(msg: &str) -> Result<Vec<Value>> {
    let v: Value = serde_json::from_str(msg)?;
    match v {
        Value::Array(arr) => Ok(arr),
        other => Err(kind_err(&other, "array")),
    }
}

fn kind_err(j: &Value, expect: &str) -> GatewayError {
    GatewayError::BadValue(format!("wrong json value: {}, expect {}", j, expect))
}

fn at(arr: &[Value], i: usize) -> &Value {
    arr.get(i).unwrap_or(&Value::Null)
}

pub fn get_str<'a>(arr: &'a [Value], i: usize) -> Result<&'a str> {
    str_of(at(arr, i))
}

pub fn get_i64(arr: &[Value], i: usize) -> Result<i64> {
    i64_of(at(arr, i))
}

pub fn get_bool(arr: &[Value], i: usize) -> Result<bool> {
    bool_of(at(arr, i))
}

/// Integer or float, returned as a float.
pub fn get_num(arr: &[Value], i: usize) -> Result<f64> {
    num_of(at(arr, i))
}

pub fn str_of(j: &Value) -> Result<&str> {
    j.as_str().ok_or_else(|| kind_err(j, "string"))
}

pub fn i64_of(j: &Value) -> Result<i64> {
    match j {
        Value::Number(n) if n.is_i64() || n.is_u64() => {
            n.as_i64().ok_or_else(|| kind_err(j, "integer"))
        }
        _ => Err(kind_err(j, "integer")),
    }
}

pub fn bool_of(j: &Value) -> Result<bool> {
    j.as_bool().ok_or_else(|| kind_err(j, "bool"))
}

pub fn num_of(j: &Value) -> Result<f64> {
    match j {
        Value::Number(n) => n
            .as_f64()
            .ok_or_else(|| kind_err(j, "number")),
        _ => Err(kind_err(j, "number")),
    }
}
