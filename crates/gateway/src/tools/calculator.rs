//! Arithmetic tool verbs. Pure functions over `{a, b}` number pairs.

use ar_domain::tool::{ToolError, ToolResult};
use serde::Deserialize;

#[derive(Debug, Deserialize)]
struct Pair {
    a: f64,
    b: f64,
}

fn pair(args: &serde_json::Value) -> Result<Pair, ToolError> {
    serde_json::from_value(args.clone())
        .map_err(|e| ToolError::invalid_args(format!("expected numeric fields a and b: {e}")))
}

fn finite(value: f64) -> ToolResult {
    if value.is_finite() {
        Ok(serde_json::json!({ "result": value }))
    } else {
        Err(ToolError::invalid_args("result is not a finite number"))
    }
}

pub fn add(args: &serde_json::Value) -> ToolResult {
    let p = pair(args)?;
    finite(p.a + p.b)
}

pub fn subtract(args: &serde_json::Value) -> ToolResult {
    let p = pair(args)?;
    finite(p.a - p.b)
}

pub fn multiply(args: &serde_json::Value) -> ToolResult {
    let p = pair(args)?;
    finite(p.a * p.b)
}

pub fn divide(args: &serde_json::Value) -> ToolResult {
    let p = pair(args)?;
    if p.b == 0.0 {
        return Err(ToolError::invalid_args("division by zero is not allowed"));
    }
    finite(p.a / p.b)
}
