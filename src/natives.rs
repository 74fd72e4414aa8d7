//! Native (Rust-implemented) functions callable from Lox.
//!
//! `clock` is the only native the language ships with; embedders can widen
//! the surface through [`crate::Vm::register_native`], which uses the same
//! `(name, arity, fn pointer)` registration shape.

use std::time::{SystemTime, UNIX_EPOCH};

use crate::value::Value;

/// Returns the number of seconds since the Unix epoch, as a Lox number.
pub fn clock(_args: &[Value]) -> Result<Value, String> {
    let now = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map_err(|_| "System time is before the Unix epoch.".to_string())?;
    Ok(Value::Number(now.as_secs_f64()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn clock_returns_a_positive_number() {
        let result = clock(&[]).unwrap();
        assert!(result.as_number().unwrap() > 0.0);
    }
}
