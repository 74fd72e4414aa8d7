//! Stateless arithmetic/comparison helpers for the VM's binary and unary
//! opcodes. Each returns `Err(message)` with the exact wording the VM wraps
//! into a runtime error; callers own the line/stack-trace context.

use crate::value::Value;

pub fn add(a: &Value, b: &Value) -> Result<Value, String> {
    match (a, b) {
        (Value::Number(x), Value::Number(y)) => Ok(Value::Number(x + y)),
        (Value::Obj(_), Value::Obj(_)) => match (a.as_str(), b.as_str()) {
            (Some(x), Some(y)) => Ok(Value::string(format!("{x}{y}"))),
            _ => Err("Operands must be two numbers or two strings.".to_string()),
        },
        _ => Err("Operands must be two numbers or two strings.".to_string()),
    }
}

pub fn subtract(a: &Value, b: &Value) -> Result<Value, String> {
    numeric_binop(a, b, |x, y| x - y)
}

pub fn multiply(a: &Value, b: &Value) -> Result<Value, String> {
    numeric_binop(a, b, |x, y| x * y)
}

pub fn divide(a: &Value, b: &Value) -> Result<Value, String> {
    numeric_binop(a, b, |x, y| x / y)
}

fn numeric_binop(a: &Value, b: &Value, f: impl Fn(f64, f64) -> f64) -> Result<Value, String> {
    match (a.as_number(), b.as_number()) {
        (Some(x), Some(y)) => Ok(Value::Number(f(x, y))),
        _ => Err("Operands must be numbers.".to_string()),
    }
}

pub fn greater(a: &Value, b: &Value) -> Result<Value, String> {
    numeric_cmp(a, b, |x, y| x > y)
}

pub fn less(a: &Value, b: &Value) -> Result<Value, String> {
    numeric_cmp(a, b, |x, y| x < y)
}

fn numeric_cmp(a: &Value, b: &Value, f: impl Fn(f64, f64) -> bool) -> Result<Value, String> {
    match (a.as_number(), b.as_number()) {
        (Some(x), Some(y)) => Ok(Value::Bool(f(x, y))),
        _ => Err("Operands must be numbers.".to_string()),
    }
}

pub fn negate(a: &Value) -> Result<Value, String> {
    match a.as_number() {
        Some(n) => Ok(Value::Number(-n)),
        None => Err("Operand must be a number.".to_string()),
    }
}

pub fn not(a: &Value) -> Value {
    Value::Bool(!a.is_truthy())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn add_concatenates_strings() {
        let result = add(&Value::string("foo".into()), &Value::string("bar".into())).unwrap();
        assert_eq!(result.as_str(), Some("foobar"));
    }

    #[test]
    fn add_rejects_mixed_operands() {
        assert!(add(&Value::Number(1.0), &Value::string("x".into())).is_err());
    }

    #[test]
    fn negate_rejects_non_numbers() {
        assert!(negate(&Value::Bool(true)).is_err());
    }
}
